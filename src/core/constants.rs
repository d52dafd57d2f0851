//! Fixed parameters of the delivery pipeline.
//!
//! The normalization target and the protocol timing bounds are fixed by
//! design: the ledger's reuse path assumes every invocation produces the
//! same device-side format for a given source.

use std::time::Duration;

// =============================================================================
// NORMALIZATION TARGET
// =============================================================================

/// Output width of every normalized asset.
pub const TARGET_WIDTH: u32 = 3840;

/// Output height of every normalized asset.
pub const TARGET_HEIGHT: u32 = 2160;

/// JPEG quality of the normalized encoding. Fixed so identical input
/// bytes always re-encode identically.
pub const JPEG_QUALITY: u8 = 90;

// =============================================================================
// DEVICE PROTOCOL TIMING
// =============================================================================

/// Timeout for opening the transport to a device.
pub const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Per-call timeout for protocol exchanges (handshake, existence check,
/// select, style). Timeouts are per-call, not per-session, so partial
/// progress survives a later stall.
pub const CALL_TIMEOUT: Duration = Duration::from_secs(30);

/// Per-call timeout for the upload exchange, which carries the full
/// normalized payload.
pub const UPLOAD_TIMEOUT: Duration = Duration::from_secs(120);

/// Retries for the `Connecting` and `Handshaking` phases before the
/// session is marked failed. Later phases are never retried.
pub const HANDSHAKE_MAX_RETRIES: u32 = 2;

/// Delay between connect/handshake retry attempts.
pub const RETRY_BACKOFF: Duration = Duration::from_millis(500);

// =============================================================================
// DEVICE ADDRESSING
// =============================================================================

/// Port assumed when a target address omits one.
pub const DEFAULT_DEVICE_PORT: u16 = 8001;
