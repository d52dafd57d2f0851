//! Curated photo source.
//!
//! Talks to the curated photo API with a bearer credential. An explicit
//! id fetches that photo directly; with no id a randomized landscape
//! search picks one, and the chosen photo's provider id becomes the
//! identity — so an explicit re-request of the same photo later is a
//! ledger hit, while two random runs are (with high probability) not.

use rand::seq::SliceRandom;
use serde::Deserialize;
use tracing::info;

use super::{SourceConfig, get_bytes, get_json};
use crate::core::{FetchedAsset, SourceError};

/// Search terms used for the random landscape pick.
const LANDSCAPE_QUERIES: &[&str] = &[
    "mountains",
    "coastline",
    "forest",
    "desert",
    "aurora",
    "waterfall",
    "canyon",
    "glacier",
    "vineyard",
    "archipelago",
];

#[derive(Debug, Deserialize)]
struct PhotoDescriptor {
    id: String,
    urls: PhotoUrls,
    #[serde(default)]
    description: Option<String>,
}

#[derive(Debug, Deserialize)]
struct PhotoUrls {
    full: String,
}

/// Fetch a curated photo by id, or a random landscape pick.
pub(super) async fn fetch(
    client: &reqwest::Client,
    config: &SourceConfig,
    id: Option<&str>,
) -> Result<FetchedAsset, SourceError> {
    let token = config
        .curated_token
        .as_deref()
        .ok_or(SourceError::AuthRequired)?;

    let descriptor: PhotoDescriptor = match id {
        Some(id) => {
            let url = format!("{}/photos/{id}", config.curated_base_url);
            get_json(client, &url, Some(token)).await?
        }
        None => {
            let query = random_query();
            let url = format!(
                "{}/photos/random?orientation=landscape&query={query}",
                config.curated_base_url
            );
            get_json(client, &url, Some(token)).await?
        }
    };
    info!(
        id = %descriptor.id,
        description = descriptor.description.as_deref().unwrap_or("untitled"),
        "resolved curated photo"
    );

    let (bytes, content_type) = get_bytes(client, &descriptor.urls.full, Some(token)).await?;
    Ok(FetchedAsset {
        identity: format!("curated:{}", descriptor.id),
        bytes,
        content_type,
    })
}

fn random_query() -> &'static str {
    LANDSCAPE_QUERIES
        .choose(&mut rand::thread_rng())
        .expect("query list is non-empty")
}
