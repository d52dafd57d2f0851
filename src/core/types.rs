//! Data model for the delivery pipeline.

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use clap::ValueEnum;
use serde::{Deserialize, Serialize};

use super::constants::{DEFAULT_DEVICE_PORT, TARGET_HEIGHT, TARGET_WIDTH};
use super::error::DeviceError;

/// The requested asset source. Exactly one variant is active per
/// invocation; the variants are a closed set, not a plugin surface.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceRequest {
    /// Read an image from the local filesystem.
    LocalFile(PathBuf),
    /// Today's wallpaper from the daily-rotating endpoint.
    DailyWallpaper,
    /// A photo from the curated provider: explicit id, or a random
    /// landscape pick when `None`.
    CuratedPhoto(Option<String>),
    /// A museum-catalog artwork: explicit id or URL, or a random catalog
    /// entry when `None`.
    CatalogArt(Option<String>),
}

impl fmt::Display for SourceRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::LocalFile(path) => write!(f, "local file {}", path.display()),
            Self::DailyWallpaper => write!(f, "daily wallpaper"),
            Self::CuratedPhoto(Some(id)) => write!(f, "curated photo {id}"),
            Self::CuratedPhoto(None) => write!(f, "random curated photo"),
            Self::CatalogArt(Some(id)) => write!(f, "catalog art {id}"),
            Self::CatalogArt(None) => write!(f, "random catalog art"),
        }
    }
}

/// Raw image bytes plus the stable identity of their source.
///
/// `identity` distinguishes one logical piece of content from another
/// independent of re-fetch. It is a provider token (path, date key,
/// provider id) — never a hash of `bytes`, since providers may re-encode
/// the same content differently between fetches.
#[derive(Debug, Clone)]
pub struct FetchedAsset {
    /// Stable identity of the content.
    pub identity: String,
    /// Raw encoded image bytes as served by the source.
    pub bytes: Vec<u8>,
    /// MIME type reported or inferred for `bytes`.
    pub content_type: String,
}

/// A normalized asset: JPEG, exactly [`TARGET_WIDTH`]×[`TARGET_HEIGHT`].
///
/// Produced by [`normalize`](crate::normalize::normalize) as a pure
/// function of the fetched bytes, with the source identity carried
/// through unchanged.
#[derive(Debug, Clone)]
pub struct NormalizedAsset {
    /// JPEG-encoded pixels at the fixed target resolution.
    pub bytes: Vec<u8>,
    /// Identity of the source the bytes were derived from.
    pub source_identity: String,
}

impl NormalizedAsset {
    /// Width of the encoded image.
    pub fn width(&self) -> u32 {
        TARGET_WIDTH
    }

    /// Height of the encoded image.
    pub fn height(&self) -> u32 {
        TARGET_HEIGHT
    }
}

/// Matte frame styles a device can render around the content.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Matte {
    /// No matte frame.
    None,
    /// Flat modern frame.
    Modern,
    /// Wide modern frame.
    ModernWide,
    /// Deep shadowbox frame.
    Shadowbox,
    /// Proportional flexible frame.
    Flexible,
    /// Edge-to-edge panoramic frame.
    Panoramic,
}

/// Matte colors. Only meaningful when the matte is not [`Matte::None`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatteColor {
    /// Black.
    Black,
    /// Neutral grey.
    Neutral,
    /// Antique white.
    Antique,
    /// Warm cream.
    Warm,
    /// Polar white.
    Polar,
    /// Sand beige.
    Sand,
}

/// Device-side photo filters applied to content independent of its pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PhotoFilter {
    /// No filter.
    None,
    /// Ink wash.
    Ink,
    /// Sepia tone.
    Sepia,
    /// Pastel softening.
    Pastel,
    /// Aqua tint.
    Aqua,
}

/// A malformed matte/color combination.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
#[error("matte \"{0:?}\" requires a matte color")]
pub struct InvalidStyle(pub Matte);

/// Visual styling for the delivered content.
///
/// Immutable per invocation and applied on every path, including
/// ledger-hit reuse where no bytes are transferred.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StyleSpec {
    /// Matte frame around the content.
    pub matte: Matte,
    /// Matte color; required iff `matte` is not [`Matte::None`],
    /// ignored otherwise.
    pub matte_color: Option<MatteColor>,
    /// Photo filter applied to the content.
    pub photo_filter: PhotoFilter,
}

impl Default for StyleSpec {
    fn default() -> Self {
        Self {
            matte: Matte::None,
            matte_color: None,
            photo_filter: PhotoFilter::None,
        }
    }
}

impl StyleSpec {
    /// Check the matte/color pairing rule.
    pub fn validate(&self) -> Result<(), InvalidStyle> {
        if self.matte != Matte::None && self.matte_color.is_none() {
            return Err(InvalidStyle(self.matte));
        }
        Ok(())
    }
}

/// Network address of a target display.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DeviceId(String);

impl DeviceId {
    /// Create a device id from a `host:port` address.
    pub fn new(addr: impl Into<String>) -> Self {
        Self(addr.into())
    }

    /// The `host:port` form of the address.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DeviceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for DeviceId {
    /// Adopt a target address, assuming [`DEFAULT_DEVICE_PORT`] when the
    /// port is omitted.
    fn from(addr: &str) -> Self {
        if addr.contains(':') {
            Self(addr.to_owned())
        } else {
            Self(format!("{addr}:{DEFAULT_DEVICE_PORT}"))
        }
    }
}

impl FromStr for DeviceId {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self::from(s))
    }
}

/// A completed delivery to one device.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Delivery {
    /// The device-assigned handle for the displayed content.
    pub remote_content_id: String,
    /// Whether the reuse path was taken (no bytes transferred).
    pub reused: bool,
}

/// Per-device outcome of a delivery run.
#[derive(Debug)]
pub struct DeliveryResult {
    /// The targeted device.
    pub device: DeviceId,
    /// Delivery, or the error that stopped this device.
    pub outcome: Result<Delivery, DeviceError>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_device_id_default_port() {
        let id: DeviceId = "10.0.0.5".parse().unwrap();
        assert_eq!(id.as_str(), "10.0.0.5:8001");

        let explicit: DeviceId = "10.0.0.5:9000".parse().unwrap();
        assert_eq!(explicit.as_str(), "10.0.0.5:9000");
    }

    #[test]
    fn test_style_requires_color_with_matte() {
        let style = StyleSpec {
            matte: Matte::Modern,
            matte_color: None,
            photo_filter: PhotoFilter::None,
        };
        assert_eq!(style.validate(), Err(InvalidStyle(Matte::Modern)));

        let ok = StyleSpec {
            matte: Matte::Modern,
            matte_color: Some(MatteColor::Black),
            photo_filter: PhotoFilter::None,
        };
        assert!(ok.validate().is_ok());
    }

    #[test]
    fn test_style_color_ignored_without_matte() {
        // A stray color with no matte is ignored, not rejected.
        let style = StyleSpec {
            matte: Matte::None,
            matte_color: Some(MatteColor::Black),
            photo_filter: PhotoFilter::Sepia,
        };
        assert!(style.validate().is_ok());
    }
}
