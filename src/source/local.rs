//! Local file source.

use std::path::Path;

use crate::core::{FetchedAsset, SourceError};

/// Read an image from the local filesystem.
///
/// Identity is the canonical absolute path, so the same file reached
/// through different relative paths is recognized as one source.
pub(super) async fn fetch(path: &Path) -> Result<FetchedAsset, SourceError> {
    let absolute = tokio::fs::canonicalize(path)
        .await
        .map_err(|_| SourceError::NotFound(path.display().to_string()))?;
    let bytes = tokio::fs::read(&absolute)
        .await
        .map_err(|_| SourceError::NotFound(absolute.display().to_string()))?;

    // Reject files that are not decodable raster images up front, before
    // any device work starts.
    let format = image::guess_format(&bytes)
        .map_err(|_| SourceError::NotFound(format!("{}: not an image", absolute.display())))?;

    Ok(FetchedAsset {
        identity: absolute.display().to_string(),
        bytes,
        content_type: format.to_mime_type().to_owned(),
    })
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    #[tokio::test]
    async fn test_missing_file_is_not_found() {
        let err = fetch(Path::new("/definitely/not/here.jpg"))
            .await
            .unwrap_err();
        assert!(matches!(err, SourceError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_non_image_file_is_not_found() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(b"plain text, not pixels").unwrap();
        let err = fetch(file.path()).await.unwrap_err();
        assert!(matches!(err, SourceError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_identity_is_absolute_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("art.png");
        let img = image::RgbImage::from_pixel(4, 4, image::Rgb([1, 2, 3]));
        img.save(&path).unwrap();

        let asset = fetch(&path).await.unwrap();
        assert!(Path::new(&asset.identity).is_absolute());
        assert_eq!(asset.content_type, "image/png");
        assert!(!asset.bytes.is_empty());
    }
}
