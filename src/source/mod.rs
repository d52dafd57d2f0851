//! Source providers.
//!
//! Fetches raw image bytes plus a stable identity token from one of the
//! interchangeable backends behind [`SourceRequest`]:
//!
//! - [`local`]: a file on the local filesystem
//! - [`daily`]: the daily-rotating wallpaper endpoint
//! - [`curated`]: the curated photo service (bearer credential required)
//! - [`catalog`]: the museum-art catalog
//!
//! The variant set is a closed enumeration dispatched here — adding a
//! backend means adding a variant, not implementing a plugin trait.

mod catalog;
mod curated;
mod daily;
mod local;

use reqwest::StatusCode;
use reqwest::header::CONTENT_TYPE;
use serde::de::DeserializeOwned;
use tracing::debug;

use crate::core::{FetchedAsset, SourceError, SourceRequest};

/// Endpoints and credentials for the remote backends.
///
/// Defaults point at the public services; tests and unusual deployments
/// override the URLs. The curated credential is injected by the caller
/// (the binary reads it from the environment).
#[derive(Debug, Clone)]
pub struct SourceConfig {
    /// Base URL of the daily wallpaper archive.
    pub daily_base_url: String,
    /// Region key for the daily wallpaper.
    pub daily_region: String,
    /// Language key for the daily wallpaper.
    pub daily_lang: String,
    /// Base URL of the curated photo API.
    pub curated_base_url: String,
    /// Bearer credential for the curated photo API.
    pub curated_token: Option<String>,
    /// Base URL of the museum catalog API.
    pub catalog_base_url: String,
    /// Base URL of the catalog's IIIF image service.
    pub catalog_iiif_url: String,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            daily_base_url: "https://bing.npanuhin.me".into(),
            daily_region: "US".into(),
            daily_lang: "en".into(),
            curated_base_url: "https://api.unsplash.com".into(),
            curated_token: None,
            catalog_base_url: "https://api.artic.edu/api/v1".into(),
            catalog_iiif_url: "https://www.artic.edu/iiif/2".into(),
        }
    }
}

/// Fetch the requested asset from its backend.
pub async fn fetch(
    client: &reqwest::Client,
    config: &SourceConfig,
    request: &SourceRequest,
) -> Result<FetchedAsset, SourceError> {
    debug!(source = %request, "fetching asset");
    match request {
        SourceRequest::LocalFile(path) => local::fetch(path).await,
        SourceRequest::DailyWallpaper => daily::fetch(client, config).await,
        SourceRequest::CuratedPhoto(id) => curated::fetch(client, config, id.as_deref()).await,
        SourceRequest::CatalogArt(id) => catalog::fetch(client, config, id.as_deref()).await,
    }
}

/// Map a non-success status to the source error taxonomy.
fn status_error(url: &str, status: StatusCode) -> SourceError {
    match status {
        StatusCode::NOT_FOUND => SourceError::NotFound(url.to_owned()),
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => SourceError::AuthRequired,
        other => SourceError::Unavailable(format!("{url}: http {other}")),
    }
}

/// GET a URL and return its body bytes plus the reported content type.
async fn get_bytes(
    client: &reqwest::Client,
    url: &str,
    bearer: Option<&str>,
) -> Result<(Vec<u8>, String), SourceError> {
    let mut req = client.get(url);
    if let Some(token) = bearer {
        req = req.bearer_auth(token);
    }
    let resp = req
        .send()
        .await
        .map_err(|err| SourceError::Unavailable(format!("{url}: {err}")))?;
    if !resp.status().is_success() {
        return Err(status_error(url, resp.status()));
    }
    let content_type = resp
        .headers()
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("image/jpeg")
        .to_owned();
    let bytes = resp
        .bytes()
        .await
        .map_err(|err| SourceError::Unavailable(format!("{url}: {err}")))?;
    Ok((bytes.to_vec(), content_type))
}

/// GET a URL and decode its JSON descriptor body.
async fn get_json<T: DeserializeOwned>(
    client: &reqwest::Client,
    url: &str,
    bearer: Option<&str>,
) -> Result<T, SourceError> {
    let mut req = client.get(url);
    if let Some(token) = bearer {
        req = req.bearer_auth(token);
    }
    let resp = req
        .send()
        .await
        .map_err(|err| SourceError::Unavailable(format!("{url}: {err}")))?;
    if !resp.status().is_success() {
        return Err(status_error(url, resp.status()));
    }
    resp.json()
        .await
        .map_err(|err| SourceError::Unavailable(format!("{url}: malformed descriptor: {err}")))
}
