//! Device protocol layer.
//!
//! Everything needed to drive one display's artwork-management session:
//!
//! - **Wire messages**: [`ArtRequest`], [`ArtResponse`] and their framing
//! - **Transport seam**: [`ArtTransport`] with the TCP implementation
//!   [`TcpArtTransport`], and [`DeviceConnector`] for opening transports
//! - **Session state machine**: [`DeviceSession`] with the
//!   connect → handshake → upload/select/style → close lifecycle
//!
//! The session is one logical conversation: strictly sequential protocol
//! calls over one persistent connection, each bounded by a per-call
//! timeout. Sessions for distinct devices are independent and run
//! concurrently under the orchestrator.

mod protocol;
mod session;
#[cfg(test)]
pub(crate) mod testing;
mod transport;

pub use protocol::*;
pub use session::*;
pub use transport::*;
