//! Daily wallpaper source.
//!
//! The archive serves one 4K image per region/language/day at a
//! predictable URL. The identity is the calendar-day key, so repeated
//! runs on the same day resolve to the same source identity and hit the
//! ledger's reuse path.

use chrono::{NaiveDate, Utc};

use super::{SourceConfig, get_bytes};
use crate::core::{FetchedAsset, SourceError};

/// Fetch today's wallpaper.
pub(super) async fn fetch(
    client: &reqwest::Client,
    config: &SourceConfig,
) -> Result<FetchedAsset, SourceError> {
    let today = Utc::now().date_naive();
    let url = image_url(config, today);
    let (bytes, content_type) = get_bytes(client, &url, None).await?;
    Ok(FetchedAsset {
        identity: identity(config, today),
        bytes,
        content_type,
    })
}

fn image_url(config: &SourceConfig, date: NaiveDate) -> String {
    format!(
        "{}/{}/{}/{}.jpg",
        config.daily_base_url,
        config.daily_region,
        config.daily_lang,
        date.format("%Y-%m-%d")
    )
}

fn identity(config: &SourceConfig, date: NaiveDate) -> String {
    format!(
        "daily:{}/{}/{}",
        config.daily_region,
        config.daily_lang,
        date.format("%Y-%m-%d")
    )
}
