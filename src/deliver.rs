//! Delivery orchestration.
//!
//! The top of the pipeline: resolve the requested source once, normalize
//! once, then fan out one device session per target, consulting the
//! shared ledger per device. Sessions run concurrently and fail
//! independently — one dark device never stops the others.

use std::path::PathBuf;
use std::sync::Arc;

use tokio::task::JoinSet;
use tracing::{info, warn};

use crate::core::{
    DeliveryError, DeliveryResult, DeviceId, FetchedAsset, NormalizedAsset, SourceRequest,
    StyleSpec,
};
use crate::device::{DeviceConnector, DeviceSession};
use crate::ledger::Ledger;
use crate::normalize::normalize;
use crate::source::{self, SourceConfig};

/// Knobs that alter a run without changing what is delivered.
#[derive(Debug, Clone, Default)]
pub struct DeliverOptions {
    /// Transfer bytes even when the ledger and the device agree the
    /// content is already there.
    pub force_upload: bool,
    /// Dump the fetched and normalized images into this directory for
    /// inspection.
    pub debug_image_dir: Option<PathBuf>,
}

/// Coordinates one delivery run end to end.
pub struct Orchestrator<C: DeviceConnector> {
    client: reqwest::Client,
    source_config: SourceConfig,
    connector: Arc<C>,
    ledger: Ledger,
    options: DeliverOptions,
}

impl<C> Orchestrator<C>
where
    C: DeviceConnector + Send + Sync + 'static,
{
    /// Create an orchestrator with default options.
    pub fn new(
        client: reqwest::Client,
        source_config: SourceConfig,
        connector: C,
        ledger: Ledger,
    ) -> Self {
        Self {
            client,
            source_config,
            connector: Arc::new(connector),
            ledger,
            options: DeliverOptions::default(),
        }
    }

    /// Replace the run options.
    pub fn with_options(mut self, options: DeliverOptions) -> Self {
        self.options = options;
        self
    }

    /// Deliver the requested asset to every target device.
    ///
    /// Fetch and normalization happen exactly once regardless of the
    /// number of targets. The returned results are in input order, one
    /// per device; a per-device failure is recorded there rather than
    /// propagated.
    pub async fn deliver(
        &self,
        request: &SourceRequest,
        devices: &[DeviceId],
        style: StyleSpec,
    ) -> Result<Vec<DeliveryResult>, DeliveryError> {
        let fetched = source::fetch(&self.client, &self.source_config, request).await?;
        info!(
            identity = %fetched.identity,
            bytes = fetched.bytes.len(),
            content_type = %fetched.content_type,
            "fetched asset"
        );
        self.dump_debug("original", &fetched)?;

        let normalized = tokio::task::spawn_blocking(move || normalize(&fetched))
            .await
            .expect("normalize task panicked")?;
        info!(
            identity = %normalized.source_identity,
            bytes = normalized.bytes.len(),
            "normalized to {}x{}",
            normalized.width(),
            normalized.height()
        );
        self.dump_normalized(&normalized)?;

        let normalized = Arc::new(normalized);
        let mut sessions = JoinSet::new();
        for (index, device) in devices.iter().cloned().enumerate() {
            let connector = Arc::clone(&self.connector);
            let ledger = self.ledger.clone();
            let normalized = Arc::clone(&normalized);
            let force_upload = self.options.force_upload;
            sessions.spawn(async move {
                let outcome = run_session(
                    connector.as_ref(),
                    &ledger,
                    &normalized,
                    device.clone(),
                    style,
                    force_upload,
                )
                .await;
                (index, DeliveryResult { device, outcome })
            });
        }

        let mut results: Vec<Option<DeliveryResult>> =
            devices.iter().map(|_| None).collect();
        while let Some(joined) = sessions.join_next().await {
            let (index, result) = joined.expect("device session task panicked");
            match &result.outcome {
                Ok(delivery) => info!(
                    device = %result.device,
                    content_id = %delivery.remote_content_id,
                    reused = delivery.reused,
                    "delivered"
                ),
                Err(err) => warn!(device = %result.device, error = %err, "delivery failed"),
            }
            results[index] = Some(result);
        }

        Ok(results
            .into_iter()
            .map(|slot| slot.expect("every device produced a result"))
            .collect())
    }

    fn dump_debug(&self, label: &str, asset: &FetchedAsset) -> Result<(), DeliveryError> {
        let Some(dir) = &self.options.debug_image_dir else {
            return Ok(());
        };
        let name = format!(
            "{}-{label}.{}",
            sanitize(&asset.identity),
            extension_for(&asset.content_type)
        );
        write_dump(dir, &name, &asset.bytes)
    }

    fn dump_normalized(&self, asset: &NormalizedAsset) -> Result<(), DeliveryError> {
        let Some(dir) = &self.options.debug_image_dir else {
            return Ok(());
        };
        let name = format!("{}-normalized.jpg", sanitize(&asset.source_identity));
        write_dump(dir, &name, &asset.bytes)
    }
}

/// One device's full session: establish, ensure-uploaded, select, style —
/// with the transport released on every exit path.
async fn run_session<C>(
    connector: &C,
    ledger: &Ledger,
    asset: &NormalizedAsset,
    device: DeviceId,
    style: StyleSpec,
    force_upload: bool,
) -> Result<crate::core::Delivery, crate::core::DeviceError>
where
    C: DeviceConnector,
{
    let mut session = DeviceSession::new(device);
    let result = async {
        session.establish(connector).await?;
        let delivery = session
            .ensure_uploaded(asset, style.matte, ledger, force_upload)
            .await?;
        session.select(&delivery.remote_content_id).await?;
        session
            .apply_style(&delivery.remote_content_id, &style)
            .await?;
        Ok(delivery)
    }
    .await;
    session.close().await;
    result
}

fn write_dump(dir: &std::path::Path, name: &str, bytes: &[u8]) -> Result<(), DeliveryError> {
    std::fs::create_dir_all(dir).map_err(DeliveryError::DebugDump)?;
    let path = dir.join(name);
    std::fs::write(&path, bytes).map_err(DeliveryError::DebugDump)?;
    info!(path = %path.display(), "debug image written");
    Ok(())
}

fn sanitize(identity: &str) -> String {
    identity
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '-' })
        .collect()
}

fn extension_for(content_type: &str) -> &'static str {
    if content_type.contains("png") {
        "png"
    } else if content_type.contains("webp") {
        "webp"
    } else {
        "jpg"
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use tempfile::TempDir;

    use super::*;
    use crate::core::{DeviceError, Matte, MatteColor, PhotoFilter};
    use crate::device::testing::FakeConnector;

    fn local_request(dir: &TempDir) -> SourceRequest {
        let path = dir.path().join("input.png");
        image::RgbImage::from_pixel(64, 36, image::Rgb([120, 40, 200]))
            .save(&path)
            .unwrap();
        SourceRequest::LocalFile(path)
    }

    fn orchestrator(
        connector: Arc<FakeConnector>,
        ledger: Ledger,
    ) -> Orchestrator<Arc<FakeConnector>> {
        Orchestrator::new(
            reqwest::Client::new(),
            SourceConfig::default(),
            connector,
            ledger,
        )
    }

    fn style() -> StyleSpec {
        StyleSpec {
            matte: Matte::Shadowbox,
            matte_color: Some(MatteColor::Neutral),
            photo_filter: PhotoFilter::None,
        }
    }

    #[tokio::test]
    async fn test_one_dark_device_does_not_stop_the_others() {
        let dir = TempDir::new().unwrap();
        let connector = Arc::new(FakeConnector::new());
        let devices: Vec<DeviceId> = (1..=3)
            .map(|i| DeviceId::new(format!("10.0.0.{i}:8001")))
            .collect();
        connector.set_unreachable(&devices[1]);

        let orchestrator = orchestrator(Arc::clone(&connector), Ledger::in_memory());
        let results = orchestrator
            .deliver(&local_request(&dir), &devices, style())
            .await
            .unwrap();

        assert_eq!(results.len(), 3);
        assert!(results[0].outcome.is_ok());
        assert!(matches!(
            results[1].outcome,
            Err(DeviceError::Unreachable(_))
        ));
        assert!(results[2].outcome.is_ok());

        // The two reachable devices got the full treatment.
        for device in [&devices[0], &devices[2]] {
            let state = connector.device(device);
            let state = state.lock().unwrap();
            assert_eq!(state.uploads, 1);
            assert!(state.selected.is_some());
            assert_eq!(state.styled.len(), 1);
        }
    }

    #[tokio::test]
    async fn test_second_run_takes_the_reuse_path() {
        let dir = TempDir::new().unwrap();
        let connector = Arc::new(FakeConnector::new());
        let device = DeviceId::new("10.0.0.5:8001");
        let request = local_request(&dir);

        let orchestrator = orchestrator(Arc::clone(&connector), Ledger::in_memory());
        let first = orchestrator
            .deliver(&request, std::slice::from_ref(&device), style())
            .await
            .unwrap();
        assert!(!first[0].outcome.as_ref().unwrap().reused);

        let second = orchestrator
            .deliver(&request, std::slice::from_ref(&device), style())
            .await
            .unwrap();
        let delivery = second[0].outcome.as_ref().unwrap();
        assert!(delivery.reused);
        assert_eq!(
            delivery.remote_content_id,
            first[0].outcome.as_ref().unwrap().remote_content_id
        );

        let state = connector.device(&device);
        let state = state.lock().unwrap();
        // One physical transfer across both runs, but selection and
        // styling happened both times.
        assert_eq!(state.uploads, 1);
        assert_eq!(state.selects, 2);
        assert_eq!(state.styled.len(), 2);
    }

    #[tokio::test]
    async fn test_out_of_band_delete_triggers_fresh_upload() {
        let dir = TempDir::new().unwrap();
        let connector = Arc::new(FakeConnector::new());
        let device = DeviceId::new("10.0.0.5:8001");
        let request = local_request(&dir);

        let orchestrator = orchestrator(Arc::clone(&connector), Ledger::in_memory());
        let first = orchestrator
            .deliver(&request, std::slice::from_ref(&device), style())
            .await
            .unwrap();
        let first_id = first[0].outcome.as_ref().unwrap().remote_content_id.clone();

        // Someone deletes the content from the device's own UI.
        connector.device(&device).lock().unwrap().contents.clear();

        let second = orchestrator
            .deliver(&request, std::slice::from_ref(&device), style())
            .await
            .unwrap();
        let delivery = second[0].outcome.as_ref().unwrap();
        assert!(!delivery.reused);
        assert_ne!(delivery.remote_content_id, first_id);
        assert_eq!(connector.device(&device).lock().unwrap().uploads, 2);
    }

    #[tokio::test]
    async fn test_force_upload_transfers_again() {
        let dir = TempDir::new().unwrap();
        let connector = Arc::new(FakeConnector::new());
        let device = DeviceId::new("10.0.0.5:8001");
        let request = local_request(&dir);
        let ledger = Ledger::in_memory();

        let orchestrator =
            orchestrator(Arc::clone(&connector), ledger.clone());
        orchestrator
            .deliver(&request, std::slice::from_ref(&device), style())
            .await
            .unwrap();

        let forcing = super::Orchestrator::new(
            reqwest::Client::new(),
            SourceConfig::default(),
            Arc::clone(&connector),
            ledger,
        )
        .with_options(DeliverOptions {
            force_upload: true,
            debug_image_dir: None,
        });
        let results = forcing
            .deliver(&request, std::slice::from_ref(&device), style())
            .await
            .unwrap();

        assert!(!results[0].outcome.as_ref().unwrap().reused);
        assert_eq!(connector.device(&device).lock().unwrap().uploads, 2);
    }

    #[tokio::test]
    async fn test_fetch_failure_is_run_fatal() {
        let connector = Arc::new(FakeConnector::new());
        let device = DeviceId::new("10.0.0.5:8001");

        let orchestrator = orchestrator(connector, Ledger::in_memory());
        let err = orchestrator
            .deliver(
                &SourceRequest::LocalFile("/no/such/file.png".into()),
                std::slice::from_ref(&device),
                StyleSpec::default(),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, DeliveryError::Source(_)));
    }

    #[tokio::test]
    async fn test_debug_images_are_dumped() {
        let dir = TempDir::new().unwrap();
        let dump = TempDir::new().unwrap();
        let connector = Arc::new(FakeConnector::new());
        let device = DeviceId::new("10.0.0.5:8001");

        let orchestrator = Orchestrator::new(
            reqwest::Client::new(),
            SourceConfig::default(),
            connector,
            Ledger::in_memory(),
        )
        .with_options(DeliverOptions {
            force_upload: false,
            debug_image_dir: Some(dump.path().to_path_buf()),
        });
        orchestrator
            .deliver(&local_request(&dir), std::slice::from_ref(&device), style())
            .await
            .unwrap();

        let names: Vec<String> = std::fs::read_dir(dump.path())
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        assert!(names.iter().any(|n| n.ends_with("-original.png")));
        assert!(names.iter().any(|n| n.ends_with("-normalized.jpg")));
    }
}
