//! artcast - deliver artwork to networked art-mode displays.
//!
//! Selects exactly one source, one or more target devices, and an
//! optional style, then runs the delivery pipeline to completion.
//! Prints one outcome line per device; the exit code is success when at
//! least one device received the asset.

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Context;
use clap::{ArgGroup, Parser};
use tracing_subscriber::EnvFilter;

use artcast::core::constants::CALL_TIMEOUT;
use artcast::core::{DeviceId, Matte, MatteColor, PhotoFilter, SourceRequest, StyleSpec};
use artcast::deliver::{DeliverOptions, Orchestrator};
use artcast::device::TcpConnector;
use artcast::ledger::Ledger;
use artcast::source::SourceConfig;

/// Deliver artwork to networked art-mode displays.
#[derive(Parser, Debug)]
#[command(name = "artcast")]
#[command(version, about, long_about = None)]
#[command(group = ArgGroup::new("source").required(true).multiple(false))]
struct Cli {
    /// Target display addresses (host[:port]); repeat the flag or
    /// comma-separate.
    #[arg(long = "tv", required = true, value_delimiter = ',')]
    tvs: Vec<String>,

    /// Deliver a local image file.
    #[arg(long, value_name = "PATH", group = "source")]
    image: Option<PathBuf>,

    /// Deliver today's daily wallpaper.
    #[arg(long, group = "source")]
    daily_wallpaper: bool,

    /// Deliver a curated photo by id; pass the flag alone for a random
    /// landscape pick. Requires ARTCAST_CURATED_TOKEN.
    #[arg(long, value_name = "ID", group = "source", num_args = 0..=1, default_missing_value = "")]
    curated_photo: Option<String>,

    /// Deliver a catalog artwork by id or URL; pass the flag alone for a
    /// random catalog entry.
    #[arg(long, value_name = "ID_OR_URL", group = "source", num_args = 0..=1, default_missing_value = "")]
    catalog_art: Option<String>,

    /// Matte frame around the content.
    #[arg(long, value_enum, default_value_t = Matte::None)]
    matte: Matte,

    /// Matte color; required when --matte is not "none".
    #[arg(long, value_enum)]
    matte_color: Option<MatteColor>,

    /// Photo filter applied by the device.
    #[arg(long, value_enum, default_value_t = PhotoFilter::None)]
    photo_filter: PhotoFilter,

    /// Path of the upload ledger document.
    #[arg(long, value_name = "PATH", default_value = "artcast-ledger.json")]
    ledger: PathBuf,

    /// Transfer bytes even when the device already holds the content.
    #[arg(long)]
    force_upload: bool,

    /// Dump the fetched and normalized images here for inspection.
    #[arg(long, value_name = "DIR")]
    debug_image_dir: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error).
    #[arg(long, default_value = "info")]
    log_level: String,
}

impl Cli {
    fn source_request(&self) -> anyhow::Result<SourceRequest> {
        if let Some(path) = &self.image {
            Ok(SourceRequest::LocalFile(path.clone()))
        } else if self.daily_wallpaper {
            Ok(SourceRequest::DailyWallpaper)
        } else if let Some(id) = &self.curated_photo {
            Ok(SourceRequest::CuratedPhoto(none_if_empty(id)))
        } else if let Some(id) = &self.catalog_art {
            Ok(SourceRequest::CatalogArt(none_if_empty(id)))
        } else {
            anyhow::bail!("no source selected")
        }
    }

    fn style(&self) -> anyhow::Result<StyleSpec> {
        let style = StyleSpec {
            matte: self.matte,
            matte_color: self.matte_color,
            photo_filter: self.photo_filter,
        };
        style.validate()?;
        Ok(style)
    }
}

fn none_if_empty(id: &str) -> Option<String> {
    if id.is_empty() {
        None
    } else {
        Some(id.to_owned())
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    // Pick up ARTCAST_CURATED_TOKEN and friends from a .env if present.
    let _ = dotenvy::dotenv();

    let filter =
        EnvFilter::try_new(&cli.log_level).unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();

    match run(cli).await {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(err) => {
            eprintln!("artcast: {err:#}");
            ExitCode::FAILURE
        }
    }
}

/// Returns whether at least one device received the asset.
async fn run(cli: Cli) -> anyhow::Result<bool> {
    let request = cli.source_request()?;
    let style = cli.style()?;
    let devices: Vec<DeviceId> = cli.tvs.iter().map(|addr| DeviceId::from(addr.as_str())).collect();

    let client = reqwest::Client::builder()
        .timeout(CALL_TIMEOUT)
        .user_agent(concat!("artcast/", env!("CARGO_PKG_VERSION")))
        .build()
        .context("building http client")?;

    let source_config = SourceConfig {
        curated_token: std::env::var("ARTCAST_CURATED_TOKEN").ok(),
        ..SourceConfig::default()
    };

    let ledger = Ledger::open(&cli.ledger)
        .await
        .with_context(|| format!("opening ledger {}", cli.ledger.display()))?;

    let orchestrator = Orchestrator::new(client, source_config, TcpConnector, ledger)
        .with_options(DeliverOptions {
            force_upload: cli.force_upload,
            debug_image_dir: cli.debug_image_dir.clone(),
        });

    let results = orchestrator.deliver(&request, &devices, style).await?;

    let mut delivered = 0usize;
    for result in &results {
        match &result.outcome {
            Ok(delivery) => {
                delivered += 1;
                println!(
                    "{}: delivered {} ({})",
                    result.device,
                    delivery.remote_content_id,
                    if delivery.reused { "reused" } else { "uploaded" }
                );
            }
            Err(err) => println!("{}: failed: {err}", result.device),
        }
    }
    println!("{delivered}/{} devices updated", results.len());

    Ok(delivered > 0)
}
