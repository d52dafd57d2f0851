//! Error taxonomy for the delivery pipeline.
//!
//! Two tiers, mirroring the run structure: [`SourceError`] and
//! [`NormalizeError`] abort the whole run (there is nothing to deliver),
//! while [`DeviceError`] is fatal only for the device that raised it.

use thiserror::Error;

/// Errors raised while fetching the requested asset.
///
/// Fatal for the whole run. An explicit id that does not resolve is
/// reported as [`SourceError::NotFound`] and never silently substituted
/// with different content.
#[derive(Debug, Error)]
pub enum SourceError {
    /// The backend could not be reached or answered abnormally.
    #[error("source unavailable: {0}")]
    Unavailable(String),

    /// An explicit path, id, or URL did not resolve to an image.
    #[error("source not found: {0}")]
    NotFound(String),

    /// The curated photo provider was invoked without a credential.
    #[error("curated photo provider requires a credential (set ARTCAST_CURATED_TOKEN)")]
    AuthRequired,
}

/// Errors raised while normalizing fetched bytes.
#[derive(Debug, Error)]
pub enum NormalizeError {
    /// The bytes are not a supported raster image.
    #[error("decode error: {0}")]
    Decode(#[source] image::ImageError),

    /// Re-encoding the normalized pixel buffer failed.
    #[error("encode error: {0}")]
    Encode(#[source] image::ImageError),
}

/// Errors raised by the upload ledger.
#[derive(Debug, Error)]
pub enum LedgerError {
    /// Reading or writing the backing document failed.
    #[error("ledger i/o error: {0}")]
    Io(#[from] std::io::Error),

    /// The backing document exists but is not a valid ledger.
    #[error("ledger document malformed: {0}")]
    Malformed(#[from] serde_json::Error),

    /// Atomic replacement of the backing document failed.
    #[error("ledger persist failed: {0}")]
    Persist(String),

    /// The writer task is gone; no further mutations are possible.
    #[error("ledger writer closed")]
    WriterClosed,
}

/// Per-device errors.
///
/// Recorded in that device's [`DeliveryResult`](super::DeliveryResult) and
/// never propagated to the other targets.
#[derive(Debug, Error)]
pub enum DeviceError {
    /// The device did not respond within the connect timeout.
    #[error("device unreachable: {0}")]
    Unreachable(String),

    /// The device answered but does not advertise the artwork-management
    /// capability. Surfaced distinctly from connectivity failures.
    #[error("device does not support artwork management (api {0})")]
    UnsupportedDevice(String),

    /// The device refused the upload.
    #[error("upload rejected: {0}")]
    UploadRejected(String),

    /// The device refused to switch its active display.
    #[error("selection rejected: {0}")]
    SelectionRejected(String),

    /// The device refused the matte/filter change.
    #[error("style rejected: {0}")]
    StyleRejected(String),

    /// The device sent something the protocol does not allow here.
    #[error("protocol error: {0}")]
    Protocol(String),

    /// A protocol call exceeded its bounded timeout.
    #[error("timed out during {0}")]
    Timeout(&'static str),

    /// Transport-level I/O failure mid-session.
    #[error("transport error: {0}")]
    Io(#[from] std::io::Error),

    /// Recording or invalidating this device's ledger entry failed.
    #[error("ledger error: {0}")]
    Ledger(#[from] LedgerError),
}

/// Run-fatal errors from the fetch/normalize stage.
#[derive(Debug, Error)]
pub enum DeliveryError {
    /// Fetching the requested asset failed.
    #[error(transparent)]
    Source(#[from] SourceError),

    /// Normalizing the fetched asset failed.
    #[error(transparent)]
    Normalize(#[from] NormalizeError),

    /// Opening the upload ledger failed.
    #[error(transparent)]
    Ledger(#[from] LedgerError),

    /// Writing a debug image dump failed.
    #[error("debug image dump failed: {0}")]
    DebugDump(#[source] std::io::Error),
}
