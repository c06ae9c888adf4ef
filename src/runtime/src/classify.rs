//! Signature-based format classification.

use std::path::Path;

use imgstream_core::error::{ImageError, Result};
use imgstream_core::ImageFormat;
use tokio::io::AsyncReadExt;

/// gzip magic bytes (1f 8b).
const GZIP_MAGIC: [u8; 2] = [0x1f, 0x8b];
/// bzip2 "BZh" followed by a block-size digit.
const BZIP2_MAGIC: [u8; 3] = [b'B', b'Z', b'h'];
/// xz stream header magic.
const XZ_MAGIC: [u8; 6] = [0xFD, b'7', b'z', b'X', b'Z', 0x00];
/// zip local file header, and the end-of-central-directory of an empty zip.
const ZIP_MAGIC: [u8; 4] = [b'P', b'K', 0x03, 0x04];
const ZIP_EMPTY_MAGIC: [u8; 4] = [b'P', b'K', 0x05, 0x06];

/// Longest signature we need to look at.
const SNIFF_LEN: usize = 6;

/// Classify a file header. Anything unrecognized is raw.
pub fn classify_bytes(header: &[u8]) -> ImageFormat {
    if header.starts_with(&XZ_MAGIC) {
        ImageFormat::Xz
    } else if header.starts_with(&GZIP_MAGIC) {
        ImageFormat::Gzip
    } else if header.starts_with(&BZIP2_MAGIC)
        && header.get(3).map(|b| (b'1'..=b'9').contains(b)).unwrap_or(false)
    {
        ImageFormat::Bzip2
    } else if header.starts_with(&ZIP_MAGIC) || header.starts_with(&ZIP_EMPTY_MAGIC) {
        ImageFormat::Zip
    } else {
        ImageFormat::Raw
    }
}

/// Read the leading bytes of `path` and classify them.
pub async fn classify(path: &Path) -> Result<ImageFormat> {
    let mut file = tokio::fs::File::open(path).await.map_err(|e| {
        ImageError::IoError(std::io::Error::new(
            e.kind(),
            format!("Failed to open {}: {}", path.display(), e),
        ))
    })?;

    let mut header = [0u8; SNIFF_LEN];
    let mut filled = 0;
    while filled < SNIFF_LEN {
        let n = file.read(&mut header[filled..]).await?;
        if n == 0 {
            break;
        }
        filled += n;
    }

    let format = classify_bytes(&header[..filled]);
    tracing::debug!(path = %path.display(), format = %format, "Classified image");
    Ok(format)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_classify_signatures() {
        assert_eq!(classify_bytes(&[0x1f, 0x8b, 0x08, 0x00]), ImageFormat::Gzip);
        assert_eq!(classify_bytes(b"BZh91AY&SY"), ImageFormat::Bzip2);
        assert_eq!(classify_bytes(&XZ_MAGIC), ImageFormat::Xz);
        assert_eq!(classify_bytes(b"PK\x03\x04\x14\x00"), ImageFormat::Zip);
        assert_eq!(classify_bytes(b"PK\x05\x06\x00\x00"), ImageFormat::Zip);
    }

    #[test]
    fn test_classify_unknown_is_raw() {
        assert_eq!(classify_bytes(b""), ImageFormat::Raw);
        assert_eq!(classify_bytes(b"\x00\x00\x00\x00"), ImageFormat::Raw);
        assert_eq!(classify_bytes(b"BZhX"), ImageFormat::Raw);
        assert_eq!(classify_bytes(b"PK"), ImageFormat::Raw);
    }

    #[tokio::test]
    async fn test_classify_file() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("image.bin");
        std::fs::write(&path, [0xFD, b'7', b'z', b'X', b'Z', 0x00, 0x00, 0x04]).unwrap();
        assert_eq!(classify(&path).await.unwrap(), ImageFormat::Xz);
    }

    #[tokio::test]
    async fn test_classify_short_file() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("tiny.img");
        std::fs::write(&path, [0x1f]).unwrap();
        assert_eq!(classify(&path).await.unwrap(), ImageFormat::Raw);
    }

    #[tokio::test]
    async fn test_classify_missing_file() {
        let err = classify(Path::new("/nonexistent/image.img")).await.unwrap_err();
        assert!(matches!(err, ImageError::IoError(_)));
    }
}
