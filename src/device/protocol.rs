//! Wire messages for the artwork-management protocol.
//!
//! One JSON message per frame, tagged by `method` (requests) or `event`
//! (responses). An image upload is the only exception to
//! one-message-per-frame: the `SendImage` request announces a payload
//! size and the raw bytes follow in the next frame.

use serde::{Deserialize, Serialize};

use crate::core::{Matte, MatteColor, PhotoFilter};

/// Client → device requests.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "method", rename_all = "snake_case")]
pub enum ArtRequest {
    /// Capability and version exchange; the first call of every session.
    GetApiVersion,

    /// Lightweight existence check for a previously assigned handle.
    GetContentInfo {
        /// Handle to check.
        content_id: String,
    },

    /// Announce an image payload. The binary frame follows immediately.
    SendImage {
        /// Encoding of the payload (`"JPEG"`).
        file_type: String,
        /// Payload size in bytes.
        file_size: u64,
        /// Pixel width.
        width: u32,
        /// Pixel height.
        height: u32,
        /// Matte the content is intended to be shown with.
        matte: Matte,
        /// Ask the device to derive its own browsing thumbnail.
        generate_thumbnail: bool,
    },

    /// Switch the active display to the given content.
    SelectImage {
        /// Handle to display.
        content_id: String,
        /// Bring the display out of standby if needed.
        show: bool,
    },

    /// Set matte and photo filter on existing content.
    SetStyle {
        /// Handle to restyle.
        content_id: String,
        /// Matte frame.
        matte: Matte,
        /// Matte color; omitted when the matte is `none`.
        #[serde(skip_serializing_if = "Option::is_none")]
        matte_color: Option<MatteColor>,
        /// Photo filter.
        photo_filter: PhotoFilter,
    },

    /// Re-render the active display so style changes become visible
    /// without a second invocation.
    Refresh,

    /// Graceful end of session.
    Close,
}

/// Device → client responses.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum ArtResponse {
    /// Answer to [`ArtRequest::GetApiVersion`].
    ApiVersion {
        /// Firmware/protocol version string.
        version: String,
        /// Whether the device supports artwork management at all.
        art_mode_supported: bool,
    },

    /// Answer to [`ArtRequest::GetContentInfo`].
    ContentInfo {
        /// The queried handle.
        content_id: String,
        /// Whether the device still holds that content. Content can
        /// disappear out-of-band (deleted from the device's own UI).
        exists: bool,
    },

    /// The device accepted a `SendImage` announcement and awaits the
    /// payload frame.
    ReadyToReceive,

    /// Upload complete; the device assigned this handle.
    ImageAdded {
        /// Newly assigned handle.
        content_id: String,
    },

    /// Generic success.
    Ok,

    /// The device refused the last request.
    Error {
        /// Machine-readable refusal category.
        code: ErrorCode,
        /// Human-readable detail.
        message: String,
    },
}

/// Refusal categories a device can answer with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCode {
    /// The referenced handle does not exist (anymore).
    ContentNotFound,
    /// The device cannot service the request right now.
    Busy,
    /// The content is incompatible with the requested operation.
    Incompatible,
    /// The requested matte/filter is not available on this device.
    StyleUnsupported,
    /// Unspecified device-side failure.
    Internal,
}

/// Encode a request for the wire.
pub fn encode_request(request: &ArtRequest) -> serde_json::Result<Vec<u8>> {
    serde_json::to_vec(request)
}

/// Decode a response frame.
pub fn decode_response(frame: &[u8]) -> serde_json::Result<ArtResponse> {
    serde_json::from_slice(frame)
}

/// Decode a request frame (device side; used by the test fake).
pub fn decode_request(frame: &[u8]) -> serde_json::Result<ArtRequest> {
    serde_json::from_slice(frame)
}

/// Encode a response for the wire (device side; used by the test fake).
pub fn encode_response(response: &ArtResponse) -> serde_json::Result<Vec<u8>> {
    serde_json::to_vec(response)
}
