//! Save-as support.

use crate::error::Result;
use std::path::Path;
use tracing::info;

/// File name offered when the image has no name of its own.
pub const DEFAULT_EXPORT_NAME: &str = "cropped-image.png";

const EXPORT_PREFIX: &str = "cropped-";

/// Name offered in the save dialog. Exports are always PNG.
pub fn suggested_filename(original: Option<&str>) -> String {
    let stem = original
        .map(Path::new)
        .and_then(Path::file_stem)
        .map(|stem| stem.to_string_lossy().trim().to_string())
        .filter(|stem| !stem.is_empty());

    match stem {
        None => DEFAULT_EXPORT_NAME.to_string(),
        Some(stem) if stem.starts_with(EXPORT_PREFIX) => format!("{}.png", stem),
        Some(stem) => format!("{}{}.png", EXPORT_PREFIX, stem),
    }
}

/// Writes exported bytes, creating missing parent directories.
pub async fn write_export(path: &Path, data: &[u8]) -> Result<()> {
    if let Some(parent) = path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent).await?;
    }
    tokio::fs::write(path, data).await?;
    info!(path = %path.display(), bytes = data.len(), "image exported");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn names_are_prefixed_once() {
        assert_eq!(suggested_filename(None), "cropped-image.png");
        assert_eq!(suggested_filename(Some("")), "cropped-image.png");
        assert_eq!(suggested_filename(Some("receipt.jpg")), "cropped-receipt.png");
        assert_eq!(suggested_filename(Some("/tmp/scan.final.png")), "cropped-scan.final.png");
        assert_eq!(suggested_filename(Some("cropped-receipt.png")), "cropped-receipt.png");
    }

    #[tokio::test]
    async fn export_creates_directories() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested/out.png");
        write_export(&path, b"png").await.unwrap();
        assert_eq!(std::fs::read(&path).unwrap(), b"png");
    }
}
