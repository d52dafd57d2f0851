//! Museum catalog source.
//!
//! Resolves an artwork record (by id, by a URL containing an id, or by a
//! random pick from the queryable listing) and downloads its image from
//! the catalog's IIIF service at the delivery width.

use rand::Rng;
use serde::Deserialize;
use tracing::info;

use super::{SourceConfig, get_bytes, get_json};
use crate::core::constants::TARGET_WIDTH;
use crate::core::{FetchedAsset, SourceError};

/// Upper bound on the listing page drawn for a random pick. The catalog
/// is far larger; a bounded window keeps the request cheap while leaving
/// ~unlimited variety.
const RANDOM_PAGE_SPAN: u32 = 500;

const RECORD_FIELDS: &str = "id,title,image_id";

#[derive(Debug, Deserialize)]
struct RecordEnvelope {
    data: ArtworkRecord,
}

#[derive(Debug, Deserialize)]
struct ListingEnvelope {
    data: Vec<ArtworkRecord>,
}

#[derive(Debug, Deserialize)]
struct ArtworkRecord {
    id: u64,
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    image_id: Option<String>,
}

/// Fetch a catalog artwork by id/URL, or a random catalog entry.
pub(super) async fn fetch(
    client: &reqwest::Client,
    config: &SourceConfig,
    id_or_url: Option<&str>,
) -> Result<FetchedAsset, SourceError> {
    let record = match id_or_url {
        Some(raw) => {
            let id = parse_artwork_id(raw)
                .ok_or_else(|| SourceError::NotFound(format!("no artwork id in \"{raw}\"")))?;
            let url = format!(
                "{}/artworks/{id}?fields={RECORD_FIELDS}",
                config.catalog_base_url
            );
            get_json::<RecordEnvelope>(client, &url, None).await?.data
        }
        None => {
            let page = rand::thread_rng().gen_range(1..=RANDOM_PAGE_SPAN);
            let url = format!(
                "{}/artworks?page={page}&limit=1&fields={RECORD_FIELDS}",
                config.catalog_base_url
            );
            get_json::<ListingEnvelope>(client, &url, None)
                .await?
                .data
                .into_iter()
                .next()
                .ok_or_else(|| {
                    SourceError::Unavailable(format!("catalog page {page} came back empty"))
                })?
        }
    };
    info!(
        id = record.id,
        title = record.title.as_deref().unwrap_or("untitled"),
        "resolved catalog artwork"
    );

    let image_id = record.image_id.ok_or_else(|| {
        SourceError::NotFound(format!("artwork {} has no published image", record.id))
    })?;
    let url = format!(
        "{}/{image_id}/full/{TARGET_WIDTH},/0/default.jpg",
        config.catalog_iiif_url
    );
    let (bytes, content_type) = get_bytes(client, &url, None).await?;
    Ok(FetchedAsset {
        identity: format!("catalog:{}", record.id),
        bytes,
        content_type,
    })
}

/// Extract an artwork id from a bare number or a catalog URL.
fn parse_artwork_id(raw: &str) -> Option<u64> {
    if let Ok(id) = raw.parse() {
        return Some(id);
    }
    let rest = &raw[raw.find("/artworks/")? + "/artworks/".len()..];
    let digits: &str = rest.split(|c: char| !c.is_ascii_digit()).next()?;
    digits.parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_bare_id() {
        assert_eq!(parse_artwork_id("129884"), Some(129884));
    }

    #[test]
    fn test_parse_id_from_url() {
        assert_eq!(
            parse_artwork_id("https://www.artic.edu/artworks/129884/starry-night"),
            Some(129884)
        );
        assert_eq!(
            parse_artwork_id("https://api.artic.edu/api/v1/artworks/27992"),
            Some(27992)
        );
    }

    #[test]
    fn test_parse_rejects_junk() {
        assert_eq!(parse_artwork_id("starry-night"), None);
        assert_eq!(parse_artwork_id("https://example.com/paintings/42"), None);
        assert_eq!(parse_artwork_id("https://example.com/artworks/none"), None);
    }

    #[test]
    fn test_random_page_stays_in_span() {
        for _ in 0..100 {
            let page = rand::thread_rng().gen_range(1..=RANDOM_PAGE_SPAN);
            assert!((1..=RANDOM_PAGE_SPAN).contains(&page));
        }
    }

    #[test]
    fn test_listing_decodes_catalog_json() {
        let listing: ListingEnvelope = serde_json::from_str(
            r#"{"pagination":{"total":126335},"data":[{"id":27992,"title":"A Sunday on La Grande Jatte","image_id":"2d484387-2509-5e8e-2c43-22f9981972eb"}]}"#,
        )
        .unwrap();
        assert_eq!(listing.data.len(), 1);
        assert_eq!(listing.data[0].id, 27992);
        assert!(listing.data[0].image_id.is_some());
    }
}
