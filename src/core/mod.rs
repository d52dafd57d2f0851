//! Core types for artcast.
//!
//! Shared building blocks used by every other module:
//!
//! - **Data model**: [`SourceRequest`], [`FetchedAsset`], [`NormalizedAsset`],
//!   [`StyleSpec`], [`DeviceId`], [`DeliveryResult`]
//! - **Error taxonomy**: [`SourceError`], [`NormalizeError`], [`LedgerError`],
//!   [`DeviceError`], [`DeliveryError`]
//! - **Fixed constants**: target resolution, timeouts, retry bounds

pub mod constants;
mod error;
mod types;

pub use error::*;
pub use types::*;
