//! Device transport.
//!
//! The protocol runs over one persistent bidirectional connection
//! carrying length-prefixed frames: a 4-byte little-endian length, then
//! the payload — a JSON message, or the raw image bytes announced by a
//! preceding `SendImage`.
//!
//! [`ArtTransport`] is the seam between the session state machine and
//! the actual wire: production uses [`TcpArtTransport`], tests substitute
//! an in-memory fake.

use std::io;

use async_trait::async_trait;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;

use crate::core::constants::CONNECT_TIMEOUT;
use crate::core::{DeviceError, DeviceId};

/// Length prefix size.
pub const FRAME_HEADER_SIZE: usize = 4;

/// Upper bound on a single frame. A normalized 4K JPEG fits with a wide
/// margin; anything larger is a corrupt or hostile peer.
pub const MAX_FRAME_SIZE: usize = 64 * 1024 * 1024;

/// A framed bidirectional connection to one device.
#[async_trait]
pub trait ArtTransport: Send {
    /// Send one frame.
    async fn send_frame(&mut self, payload: &[u8]) -> io::Result<()>;

    /// Receive the next frame.
    async fn recv_frame(&mut self) -> io::Result<Vec<u8>>;

    /// Release the connection.
    async fn shutdown(&mut self) -> io::Result<()>;
}

/// Opens transports to devices. The seam that lets the orchestrator and
/// session tests run against fake devices.
#[async_trait]
pub trait DeviceConnector: Send + Sync {
    /// The transport type this connector produces.
    type Transport: ArtTransport + 'static;

    /// Open a transport, bounded by [`CONNECT_TIMEOUT`].
    async fn connect(&self, device: &DeviceId) -> Result<Self::Transport, DeviceError>;
}

#[async_trait]
impl<C: DeviceConnector + ?Sized> DeviceConnector for std::sync::Arc<C> {
    type Transport = C::Transport;

    async fn connect(&self, device: &DeviceId) -> Result<Self::Transport, DeviceError> {
        (**self).connect(device).await
    }
}

/// [`ArtTransport`] over a TCP stream.
#[derive(Debug)]
pub struct TcpArtTransport {
    stream: TcpStream,
}

impl TcpArtTransport {
    /// Wrap an established stream.
    pub fn from_stream(stream: TcpStream) -> Self {
        Self { stream }
    }
}

#[async_trait]
impl ArtTransport for TcpArtTransport {
    async fn send_frame(&mut self, payload: &[u8]) -> io::Result<()> {
        if payload.len() > MAX_FRAME_SIZE {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("frame of {} bytes exceeds maximum", payload.len()),
            ));
        }
        self.stream
            .write_all(&(payload.len() as u32).to_le_bytes())
            .await?;
        self.stream.write_all(payload).await?;
        self.stream.flush().await
    }

    async fn recv_frame(&mut self) -> io::Result<Vec<u8>> {
        let mut header = [0u8; FRAME_HEADER_SIZE];
        self.stream.read_exact(&mut header).await?;
        let len = u32::from_le_bytes(header) as usize;
        if len > MAX_FRAME_SIZE {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                format!("peer announced a {len} byte frame"),
            ));
        }
        let mut payload = vec![0u8; len];
        self.stream.read_exact(&mut payload).await?;
        Ok(payload)
    }

    async fn shutdown(&mut self) -> io::Result<()> {
        self.stream.shutdown().await
    }
}

/// The production connector: TCP with a bounded connect timeout.
#[derive(Debug, Clone, Copy, Default)]
pub struct TcpConnector;

#[async_trait]
impl DeviceConnector for TcpConnector {
    type Transport = TcpArtTransport;

    async fn connect(&self, device: &DeviceId) -> Result<TcpArtTransport, DeviceError> {
        match tokio::time::timeout(CONNECT_TIMEOUT, TcpStream::connect(device.as_str())).await {
            Ok(Ok(stream)) => Ok(TcpArtTransport::from_stream(stream)),
            Ok(Err(err)) => Err(DeviceError::Unreachable(format!("{device}: {err}"))),
            Err(_) => Err(DeviceError::Unreachable(format!(
                "{device}: no response within {}s",
                CONNECT_TIMEOUT.as_secs()
            ))),
        }
    }
}
