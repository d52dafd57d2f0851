//! # artcast
//!
//! Delivers a visual asset to one or more networked art-mode displays.
//! One invocation runs the whole pipeline to completion:
//!
//! - **Acquire**: fetch image bytes and a stable identity from one of the
//!   interchangeable sources (local file, daily wallpaper, curated photo
//!   service, museum catalog)
//! - **Normalize**: deterministically scale, crop, and re-encode into the
//!   device's required 3840×2160 JPEG
//! - **Deliver**: drive each target device's session protocol — upload
//!   (skipped when the upload ledger and the device agree the content is
//!   already there), select, and style
//!
//! ## Modules
//!
//! - [`core`]: data model, error taxonomy, fixed constants
//! - [`source`]: source providers
//! - [`normalize`]: the image normalization transform
//! - [`ledger`]: the content-addressed upload ledger
//! - [`device`]: wire protocol, transport, and the session state machine
//! - [`deliver`]: the orchestrator fanning out over devices
//!
//! ## Example
//!
//! ```no_run
//! use artcast::{Ledger, Orchestrator, SourceConfig, TcpConnector};
//! use artcast::core::{DeviceId, SourceRequest, StyleSpec};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let ledger = Ledger::open("artcast-ledger.json").await?;
//! let orchestrator = Orchestrator::new(
//!     reqwest::Client::new(),
//!     SourceConfig::default(),
//!     TcpConnector,
//!     ledger,
//! );
//! let results = orchestrator
//!     .deliver(
//!         &SourceRequest::DailyWallpaper,
//!         &[DeviceId::new("10.0.0.5:8001")],
//!         StyleSpec::default(),
//!     )
//!     .await?;
//! for result in &results {
//!     println!("{}: {:?}", result.device, result.outcome);
//! }
//! # Ok(())
//! # }
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod core;
pub mod deliver;
pub mod device;
pub mod ledger;
pub mod normalize;
pub mod source;

pub use crate::core::{
    Delivery, DeliveryError, DeliveryResult, DeviceError, DeviceId, FetchedAsset, Matte,
    MatteColor, NormalizeError, NormalizedAsset, PhotoFilter, SourceError, SourceRequest,
    StyleSpec,
};
pub use crate::deliver::{DeliverOptions, Orchestrator};
pub use crate::device::{ArtTransport, DeviceConnector, DeviceSession, SessionPhase, TcpConnector};
pub use crate::ledger::{Ledger, LedgerEntry};
pub use crate::source::SourceConfig;
