//! Device session state machine.
//!
//! One instance per target device, driving the protocol as a single
//! sequential conversation:
//!
//! ```text
//! Disconnected → Connecting → Handshaking → Ready
//!                                             │
//!                        ┌────────────────────┼──────────────┐
//!                   Uploading            Selecting        Styling
//!                        └────────────────────┼──────────────┘
//!                                           Ready → Closed
//! ```
//!
//! Any state can transition to `Failed` on an unrecoverable protocol
//! error. Only `Connecting` and `Handshaking` are retried (transient
//! connectivity, small fixed bound); every later step runs at most once.

use tokio::time::timeout;
use tracing::{debug, info, warn};

use super::protocol::{self, ArtRequest, ArtResponse, ErrorCode};
use super::transport::{ArtTransport, DeviceConnector};
use crate::core::constants::{
    CALL_TIMEOUT, HANDSHAKE_MAX_RETRIES, RETRY_BACKOFF, UPLOAD_TIMEOUT,
};
use crate::core::{Delivery, DeviceError, DeviceId, Matte, NormalizedAsset, StyleSpec};
use crate::ledger::{Ledger, LedgerEntry};

/// Session lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionPhase {
    /// No transport open.
    Disconnected,
    /// Opening the transport.
    Connecting,
    /// Capability/version exchange in progress.
    Handshaking,
    /// Idle between operations.
    Ready,
    /// Transferring content (or checking whether a transfer is needed).
    Uploading,
    /// Switching the active display.
    Selecting,
    /// Applying matte/filter styling.
    Styling,
    /// Transport released after a graceful end.
    Closed,
    /// Unrecoverable error; only `close` is meaningful now.
    Failed,
}

/// Protocol session with one device.
#[derive(Debug)]
pub struct DeviceSession<T: ArtTransport> {
    device: DeviceId,
    transport: Option<T>,
    phase: SessionPhase,
}

impl<T: ArtTransport> DeviceSession<T> {
    /// Create a session for `device`, not yet connected.
    pub fn new(device: DeviceId) -> Self {
        Self {
            device,
            transport: None,
            phase: SessionPhase::Disconnected,
        }
    }

    /// The targeted device.
    pub fn device(&self) -> &DeviceId {
        &self.device
    }

    /// Current lifecycle state.
    pub fn phase(&self) -> SessionPhase {
        self.phase
    }

    /// Connect and handshake, retrying transient connectivity failures up
    /// to [`HANDSHAKE_MAX_RETRIES`] times.
    ///
    /// Fails with [`DeviceError::Unreachable`] when the device never
    /// responds and [`DeviceError::UnsupportedDevice`] when it responds
    /// but does not advertise artwork management — the latter is a
    /// definitive answer and is never retried.
    pub async fn establish<C>(&mut self, connector: &C) -> Result<(), DeviceError>
    where
        C: DeviceConnector<Transport = T>,
    {
        let mut attempt = 0u32;
        loop {
            match self.try_establish(connector).await {
                Ok(()) => return Ok(()),
                Err(err) if transient(&err) && attempt < HANDSHAKE_MAX_RETRIES => {
                    attempt += 1;
                    warn!(
                        device = %self.device,
                        error = %err,
                        attempt,
                        "connect/handshake failed, retrying"
                    );
                    self.transport = None;
                    self.phase = SessionPhase::Disconnected;
                    tokio::time::sleep(RETRY_BACKOFF).await;
                }
                Err(err) => {
                    self.phase = SessionPhase::Failed;
                    return Err(err);
                }
            }
        }
    }

    async fn try_establish<C>(&mut self, connector: &C) -> Result<(), DeviceError>
    where
        C: DeviceConnector<Transport = T>,
    {
        self.phase = SessionPhase::Connecting;
        let transport = connector.connect(&self.device).await?;
        self.transport = Some(transport);

        self.phase = SessionPhase::Handshaking;
        match self.call(&ArtRequest::GetApiVersion, "handshake").await? {
            ArtResponse::ApiVersion {
                version,
                art_mode_supported: true,
            } => {
                debug!(device = %self.device, version = %version, "handshake complete");
                self.phase = SessionPhase::Ready;
                Ok(())
            }
            ArtResponse::ApiVersion { version, .. } => {
                Err(DeviceError::UnsupportedDevice(version))
            }
            other => Err(unexpected("handshake", &other)),
        }
    }

    /// Make sure the normalized asset exists on the device, transferring
    /// bytes only when necessary.
    ///
    /// With a recorded ledger entry, a lightweight existence check
    /// decides: confirmed means the recorded handle is returned without
    /// a transfer; reported missing means the stale entry is invalidated
    /// and a fresh upload runs. The check-then-act sequence is
    /// best-effort idempotent, not a transaction — the device's own
    /// answer is ground truth at the moment of the call.
    pub async fn ensure_uploaded(
        &mut self,
        asset: &NormalizedAsset,
        matte_intent: Matte,
        ledger: &Ledger,
        force_upload: bool,
    ) -> Result<Delivery, DeviceError> {
        self.expect_ready("upload")?;
        self.phase = SessionPhase::Uploading;
        let result = self
            .ensure_uploaded_inner(asset, matte_intent, ledger, force_upload)
            .await;
        self.phase = match result {
            Ok(_) => SessionPhase::Ready,
            Err(_) => SessionPhase::Failed,
        };
        result
    }

    async fn ensure_uploaded_inner(
        &mut self,
        asset: &NormalizedAsset,
        matte_intent: Matte,
        ledger: &Ledger,
        force_upload: bool,
    ) -> Result<Delivery, DeviceError> {
        let recorded = if force_upload {
            None
        } else {
            ledger.lookup(&asset.source_identity, &self.device).await
        };

        if let Some(entry) = recorded {
            if self.content_exists(&entry.remote_content_id).await? {
                info!(
                    device = %self.device,
                    content_id = %entry.remote_content_id,
                    "content already on device, skipping transfer"
                );
                return Ok(Delivery {
                    remote_content_id: entry.remote_content_id,
                    reused: true,
                });
            }
            // Deleted out-of-band; the recorded handle is dead.
            info!(
                device = %self.device,
                content_id = %entry.remote_content_id,
                "recorded content gone from device, invalidating ledger entry"
            );
            ledger
                .invalidate(&asset.source_identity, &self.device)
                .await?;
        }

        let request = ArtRequest::SendImage {
            file_type: "JPEG".into(),
            file_size: asset.bytes.len() as u64,
            width: asset.width(),
            height: asset.height(),
            matte: matte_intent,
            generate_thumbnail: true,
        };
        let content_id = self.upload_exchange(&request, &asset.bytes).await?;
        info!(
            device = %self.device,
            content_id = %content_id,
            bytes = asset.bytes.len(),
            "uploaded"
        );

        ledger
            .record(
                &asset.source_identity,
                &self.device,
                LedgerEntry::new(content_id.clone()),
            )
            .await?;

        Ok(Delivery {
            remote_content_id: content_id,
            reused: false,
        })
    }

    /// Switch the device's active display to the given content.
    pub async fn select(&mut self, content_id: &str) -> Result<(), DeviceError> {
        self.expect_ready("selection")?;
        self.phase = SessionPhase::Selecting;
        let request = ArtRequest::SelectImage {
            content_id: content_id.to_owned(),
            show: true,
        };
        let result = match self.call(&request, "selection").await {
            Ok(ArtResponse::Ok) => Ok(()),
            Ok(ArtResponse::Error { message, .. }) => Err(DeviceError::SelectionRejected(message)),
            Ok(other) => Err(unexpected("selection", &other)),
            Err(err) => Err(err),
        };
        self.phase = match result {
            Ok(()) => SessionPhase::Ready,
            Err(_) => SessionPhase::Failed,
        };
        result
    }

    /// Apply matte and photo filter to content, then have the device
    /// re-render so the change is visible immediately.
    ///
    /// Works on freshly uploaded and on reused content alike; no
    /// transfer is involved.
    pub async fn apply_style(
        &mut self,
        content_id: &str,
        style: &StyleSpec,
    ) -> Result<(), DeviceError> {
        self.expect_ready("styling")?;
        self.phase = SessionPhase::Styling;
        let result = self.apply_style_inner(content_id, style).await;
        self.phase = match result {
            Ok(()) => SessionPhase::Ready,
            Err(_) => SessionPhase::Failed,
        };
        result
    }

    async fn apply_style_inner(
        &mut self,
        content_id: &str,
        style: &StyleSpec,
    ) -> Result<(), DeviceError> {
        let request = ArtRequest::SetStyle {
            content_id: content_id.to_owned(),
            matte: style.matte,
            matte_color: match style.matte {
                Matte::None => None,
                _ => style.matte_color,
            },
            photo_filter: style.photo_filter,
        };
        match self.call(&request, "styling").await? {
            ArtResponse::Ok => {}
            ArtResponse::Error { message, .. } => return Err(DeviceError::StyleRejected(message)),
            other => return Err(unexpected("styling", &other)),
        }
        match self.call(&ArtRequest::Refresh, "refresh").await? {
            ArtResponse::Ok => Ok(()),
            ArtResponse::Error { message, .. } => Err(DeviceError::StyleRejected(message)),
            other => Err(unexpected("refresh", &other)),
        }
    }

    /// Release the transport. Safe on every exit path, including after
    /// failures; a best-effort farewell is sent when the connection is
    /// still usable.
    pub async fn close(&mut self) {
        if let Some(mut transport) = self.transport.take() {
            let farewell = async {
                if let Ok(frame) = protocol::encode_request(&ArtRequest::Close) {
                    let _ = transport.send_frame(&frame).await;
                }
                let _ = transport.shutdown().await;
            };
            let _ = timeout(CALL_TIMEOUT, farewell).await;
        }
        if self.phase != SessionPhase::Failed {
            self.phase = SessionPhase::Closed;
        }
        debug!(device = %self.device, phase = ?self.phase, "session closed");
    }

    /// Existence check for a previously recorded handle. A device that
    /// deleted the content out-of-band answers either `exists: false` or
    /// a `content_not_found` refusal; both mean "gone".
    async fn content_exists(&mut self, content_id: &str) -> Result<bool, DeviceError> {
        let request = ArtRequest::GetContentInfo {
            content_id: content_id.to_owned(),
        };
        match self.call(&request, "existence check").await? {
            ArtResponse::ContentInfo { exists, .. } => Ok(exists),
            ArtResponse::Error {
                code: ErrorCode::ContentNotFound,
                ..
            } => Ok(false),
            other => Err(unexpected("existence check", &other)),
        }
    }

    /// One request/response exchange bounded by [`CALL_TIMEOUT`].
    async fn call(
        &mut self,
        request: &ArtRequest,
        op: &'static str,
    ) -> Result<ArtResponse, DeviceError> {
        let exchange = async {
            self.send(request).await?;
            self.recv().await
        };
        timeout(CALL_TIMEOUT, exchange)
            .await
            .map_err(|_| DeviceError::Timeout(op))?
    }

    /// The upload exchange: announcement, payload frame, completion —
    /// bounded as one call by [`UPLOAD_TIMEOUT`].
    async fn upload_exchange(
        &mut self,
        request: &ArtRequest,
        payload: &[u8],
    ) -> Result<String, DeviceError> {
        let exchange = async {
            self.send(request).await?;
            match self.recv().await? {
                ArtResponse::ReadyToReceive => {}
                ArtResponse::Error { message, .. } => {
                    return Err(DeviceError::UploadRejected(message));
                }
                other => return Err(unexpected("upload announcement", &other)),
            }
            self.transport_mut()?.send_frame(payload).await?;
            match self.recv().await? {
                ArtResponse::ImageAdded { content_id } => Ok(content_id),
                ArtResponse::Error { message, .. } => Err(DeviceError::UploadRejected(message)),
                other => Err(unexpected("upload completion", &other)),
            }
        };
        timeout(UPLOAD_TIMEOUT, exchange)
            .await
            .map_err(|_| DeviceError::Timeout("upload"))?
    }

    async fn send(&mut self, request: &ArtRequest) -> Result<(), DeviceError> {
        let frame = protocol::encode_request(request)
            .map_err(|err| DeviceError::Protocol(format!("encoding request: {err}")))?;
        self.transport_mut()?.send_frame(&frame).await?;
        Ok(())
    }

    async fn recv(&mut self) -> Result<ArtResponse, DeviceError> {
        let frame = self.transport_mut()?.recv_frame().await?;
        protocol::decode_response(&frame)
            .map_err(|err| DeviceError::Protocol(format!("malformed response: {err}")))
    }

    fn transport_mut(&mut self) -> Result<&mut T, DeviceError> {
        self.transport
            .as_mut()
            .ok_or_else(|| DeviceError::Protocol("transport not open".into()))
    }

    fn expect_ready(&self, op: &str) -> Result<(), DeviceError> {
        if self.phase != SessionPhase::Ready {
            return Err(DeviceError::Protocol(format!(
                "{op} requested in phase {:?}",
                self.phase
            )));
        }
        Ok(())
    }
}

/// Whether a connect/handshake error is worth another attempt.
fn transient(err: &DeviceError) -> bool {
    matches!(
        err,
        DeviceError::Unreachable(_) | DeviceError::Timeout(_) | DeviceError::Io(_)
    )
}

fn unexpected(op: &str, response: &ArtResponse) -> DeviceError {
    DeviceError::Protocol(format!("unexpected response during {op}: {response:?}"))
}
