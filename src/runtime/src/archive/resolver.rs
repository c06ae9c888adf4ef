//! Single-image selection and sidecar extraction for container archives.

use std::io::Read;
use std::path::{Path, PathBuf};

use imgstream_core::error::{ImageError, Result};
use imgstream_core::format::is_image_extension;
use imgstream_core::{ImageFormat, ResolverConfig};
use serde_json::{Map, Value};

use super::{ArchiveAccess, ArchiveEntry, EntryStream};
use crate::descriptor::{FinalSize, ImageDescriptor, ImageMetadata, Transform};
use crate::run_blocking;

/// Sidecar paths, relative to the archive's root folder.
pub const MANIFEST_PATH: &str = "_info/manifest.json";
pub const LOGO_PATH: &str = "_info/logo.svg";
pub const BMAP_PATH: &str = "_info/image.bmap";

/// Resolve the single disk image held by a container archive.
///
/// The image stream and the three sidecars are opened concurrently; any
/// failure among them fails the whole resolution.
pub async fn resolve_archive_image(
    archive: &Path,
    access: &dyn ArchiveAccess,
    config: &ResolverConfig,
) -> Result<ImageDescriptor> {
    let entries: Vec<ArchiveEntry> = access
        .list_entries(archive)
        .await?
        .into_iter()
        .filter(|entry| !entry.is_placeholder())
        .collect();

    let image_entry = select_image_entry(archive, &entries, config.case_insensitive_extensions)?;
    tracing::debug!(
        archive = %archive.display(),
        entry = %image_entry.name,
        size = image_entry.size,
        "Selected archive image"
    );

    let limit = config.max_sidecar_bytes;
    let (stream, manifest, logo, bmap) = tokio::try_join!(
        access.open_entry_stream(archive, &image_entry.name),
        read_sidecar(access, archive, &entries, MANIFEST_PATH, limit),
        read_sidecar(access, archive, &entries, LOGO_PATH, limit),
        read_sidecar(access, archive, &entries, BMAP_PATH, limit),
    )?;

    let manifest = parse_manifest(archive, manifest.as_deref())?;
    let metadata = ImageMetadata {
        name: manifest_field(&manifest, "name"),
        version: manifest_field(&manifest, "version"),
        url: manifest_field(&manifest, "url"),
        support_url: manifest_field(&manifest, "supportUrl"),
        release_notes_url: manifest_field(&manifest, "releaseNotesUrl"),
        checksum_type: manifest_field(&manifest, "checksumType"),
        checksum: manifest_field(&manifest, "checksum"),
        logo,
        bmap,
    };

    tracing::info!(
        archive = %archive.display(),
        entry = %image_entry.name,
        name = metadata.name.as_deref().unwrap_or(""),
        "Resolved archive image"
    );

    Ok(ImageDescriptor {
        path: archive.to_path_buf(),
        format: ImageFormat::Zip,
        stream,
        size: image_entry.size,
        final_size: Some(FinalSize::exact(image_entry.size)),
        transform: Transform::Identity,
        metadata: Some(metadata),
    })
}

/// Pick the one entry whose extension is a registered image extension.
///
/// Zero or several candidates are both `InvalidArchiveImage`.
pub fn select_image_entry<'a>(
    archive: &Path,
    entries: &'a [ArchiveEntry],
    case_insensitive: bool,
) -> Result<&'a ArchiveEntry> {
    let images: Vec<&ArchiveEntry> = entries
        .iter()
        .filter(|entry| {
            entry
                .extension()
                .map(|ext| is_image_extension(ext, case_insensitive))
                .unwrap_or(false)
        })
        .collect();

    match images.as_slice() {
        [image] => Ok(*image),
        _ => Err(ImageError::InvalidArchiveImage {
            archive: archive.to_path_buf(),
            found: images.len(),
        }),
    }
}

/// Read a sidecar fully as text, or `None` if the archive lacks it.
async fn read_sidecar(
    access: &dyn ArchiveAccess,
    archive: &Path,
    entries: &[ArchiveEntry],
    sidecar: &str,
    limit: u64,
) -> Result<Option<String>> {
    let Some(entry) = entries.iter().find(|entry| entry.matches_sidecar(sidecar)) else {
        return Ok(None);
    };

    if entry.size > limit {
        return Err(ImageError::SidecarTooLarge {
            entry: entry.name.clone(),
            limit,
        });
    }

    let stream = access.open_entry_stream(archive, &entry.name).await?;
    let archive = archive.to_path_buf();
    let name = entry.name.clone();
    let text = run_blocking(move || read_text(stream, limit, archive, name)).await?;
    Ok(Some(text))
}

fn read_text(stream: EntryStream, limit: u64, archive: PathBuf, entry: String) -> Result<String> {
    // One extra byte tells an oversized entry apart from one at the limit.
    let mut buf = Vec::new();
    stream
        .take(limit + 1)
        .read_to_end(&mut buf)
        .map_err(|source| ImageError::EntryIo {
            archive,
            entry: entry.clone(),
            source,
        })?;

    if buf.len() as u64 > limit {
        return Err(ImageError::SidecarTooLarge { entry, limit });
    }

    Ok(String::from_utf8_lossy(&buf).into_owned())
}

fn parse_manifest(archive: &Path, text: Option<&str>) -> Result<Map<String, Value>> {
    let Some(text) = text else {
        return Ok(Map::new());
    };

    let value: Value = serde_json::from_str(text).map_err(|e| ImageError::InvalidManifest {
        archive: archive.to_path_buf(),
        message: e.to_string(),
    })?;

    match value {
        Value::Object(map) => Ok(map),
        other => Err(ImageError::InvalidManifest {
            archive: archive.to_path_buf(),
            message: format!("expected a JSON object, found {}", json_kind(&other)),
        }),
    }
}

/// Strings are taken as-is and scalars are stringified. Empty strings, null
/// and nested values count as absent.
fn manifest_field(manifest: &Map<String, Value>, key: &str) -> Option<String> {
    match manifest.get(key)? {
        Value::String(s) if s.is_empty() => None,
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        Value::Null | Value::Array(_) | Value::Object(_) => None,
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::collections::BTreeMap;
    use std::io::Cursor;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// In-memory archive keyed by entry name.
    #[derive(Default)]
    struct MemoryArchive {
        files: BTreeMap<String, Vec<u8>>,
        opened: AtomicUsize,
    }

    impl MemoryArchive {
        fn with(files: &[(&str, &[u8])]) -> Self {
            Self {
                files: files
                    .iter()
                    .map(|(name, data)| (name.to_string(), data.to_vec()))
                    .collect(),
                opened: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl ArchiveAccess for MemoryArchive {
        async fn list_entries(&self, _archive: &Path) -> Result<Vec<ArchiveEntry>> {
            Ok(self
                .files
                .iter()
                .map(|(name, data)| ArchiveEntry::new(name.clone(), data.len() as u64))
                .collect())
        }

        async fn open_entry_stream(&self, archive: &Path, entry: &str) -> Result<EntryStream> {
            self.opened.fetch_add(1, Ordering::SeqCst);
            let data = self
                .files
                .get(entry)
                .cloned()
                .ok_or_else(|| ImageError::EntryNotFound {
                    archive: archive.to_path_buf(),
                    entry: entry.to_string(),
                })?;
            Ok(Box::new(Cursor::new(data)))
        }
    }

    fn archive_path() -> &'static Path {
        Path::new("memory.zip")
    }

    async fn resolve(archive: &MemoryArchive) -> Result<ImageDescriptor> {
        resolve_archive_image(archive_path(), archive, &ResolverConfig::default()).await
    }

    #[tokio::test]
    async fn test_single_image_without_info() {
        let archive = MemoryArchive::with(&[("rpi/raspberrypi.img", b"0123456789")]);

        let mut image = resolve(&archive).await.unwrap();
        assert_eq!(image.size, 10);
        assert_eq!(image.transform, Transform::Identity);
        assert_eq!(image.metadata, Some(ImageMetadata::default()));

        let mut out = Vec::new();
        image.stream.read_to_end(&mut out).unwrap();
        assert_eq!(out, b"0123456789");
        assert_eq!(archive.opened.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_no_image_entries() {
        let archive = MemoryArchive::with(&[("rpi/README.md", b"docs"), ("rpi/boot.txt", b"x")]);
        let err = resolve(&archive).await.unwrap_err();
        assert!(err.is_invalid_archive_image());
        assert!(matches!(err, ImageError::InvalidArchiveImage { found: 0, .. }));
    }

    #[tokio::test]
    async fn test_multiple_image_entries() {
        let archive = MemoryArchive::with(&[("rpi/a.img", b"a"), ("rpi/b.iso", b"b")]);
        let err = resolve(&archive).await.unwrap_err();
        assert!(matches!(err, ImageError::InvalidArchiveImage { found: 2, .. }));
    }

    #[tokio::test]
    async fn test_empty_image_entry_is_ignored() {
        let archive = MemoryArchive::with(&[("rpi/placeholder.img", b""), ("rpi/real.img", b"data")]);
        let image = resolve(&archive).await.unwrap();
        assert_eq!(image.size, 4);
    }

    #[tokio::test]
    async fn test_extension_case_follows_config() {
        let archive = MemoryArchive::with(&[("rpi/DISK.IMG", b"data")]);
        let err = resolve(&archive).await.unwrap_err();
        assert!(err.is_invalid_archive_image());

        let config = ResolverConfig {
            case_insensitive_extensions: true,
            ..Default::default()
        };
        let image = resolve_archive_image(archive_path(), &archive, &config)
            .await
            .unwrap();
        assert_eq!(image.size, 4);
    }

    #[tokio::test]
    async fn test_uppercase_extension_is_not_an_image_by_default() {
        let archive = MemoryArchive::with(&[
            ("rpi/raspberrypi.img", b"image"),
            ("rpi/BACKUP.IMG", b"backup"),
        ]);

        let mut image = resolve(&archive).await.unwrap();
        let mut out = Vec::new();
        image.stream.read_to_end(&mut out).unwrap();
        assert_eq!(out, b"image");

        let config = ResolverConfig {
            case_insensitive_extensions: true,
            ..Default::default()
        };
        let err = resolve_archive_image(archive_path(), &archive, &config)
            .await
            .unwrap_err();
        assert!(matches!(err, ImageError::InvalidArchiveImage { found: 2, .. }));
    }

    #[tokio::test]
    async fn test_sidecars_populate_metadata() {
        let manifest = br#"{
            "name": "Raspberry Pi",
            "version": "2017-04-10",
            "url": "https://www.raspberrypi.org",
            "supportUrl": "https://www.raspberrypi.org/forums/",
            "releaseNotesUrl": "https://example.com/notes",
            "checksumType": "md5",
            "checksum": "add4f1e8d1c5bb3e1b9a8b5a3e0cfb2f",
            "unknown": "ignored"
        }"#;
        let archive = MemoryArchive::with(&[
            ("rpi/raspberrypi.img", b"image"),
            ("rpi/_info/manifest.json", manifest),
            ("rpi/_info/logo.svg", b"<svg/>"),
            ("rpi/_info/image.bmap", b"<bmap/>"),
        ]);

        let image = resolve(&archive).await.unwrap();
        let metadata = image.metadata.unwrap();
        assert_eq!(metadata.name.as_deref(), Some("Raspberry Pi"));
        assert_eq!(metadata.version.as_deref(), Some("2017-04-10"));
        assert_eq!(metadata.url.as_deref(), Some("https://www.raspberrypi.org"));
        assert_eq!(
            metadata.support_url.as_deref(),
            Some("https://www.raspberrypi.org/forums/")
        );
        assert_eq!(
            metadata.release_notes_url.as_deref(),
            Some("https://example.com/notes")
        );
        assert_eq!(metadata.checksum_type.as_deref(), Some("md5"));
        assert!(metadata.checksum.is_some());
        assert_eq!(metadata.logo.as_deref(), Some("<svg/>"));
        assert_eq!(metadata.bmap.as_deref(), Some("<bmap/>"));
        assert_eq!(archive.opened.load(Ordering::SeqCst), 4);
    }

    #[tokio::test]
    async fn test_top_level_info_is_not_a_sidecar() {
        let archive = MemoryArchive::with(&[
            ("raspberrypi.img", b"image"),
            ("_info/logo.svg", b"<svg/>"),
        ]);

        let image = resolve(&archive).await.unwrap();
        assert!(image.metadata.unwrap().logo.is_none());
    }

    #[tokio::test]
    async fn test_invalid_manifest_fails_resolution() {
        let archive = MemoryArchive::with(&[
            ("rpi/raspberrypi.img", b"image"),
            ("rpi/_info/manifest.json", b"{ \"name\": "),
            ("rpi/_info/logo.svg", b"<svg/>"),
            ("rpi/_info/image.bmap", b"<bmap/>"),
        ]);

        let err = resolve(&archive).await.unwrap_err();
        assert!(err.is_invalid_manifest());
        assert!(err.to_string().starts_with("Invalid archive manifest.json"));
    }

    #[tokio::test]
    async fn test_non_object_manifest_is_invalid() {
        let archive = MemoryArchive::with(&[
            ("rpi/raspberrypi.img", b"image"),
            ("rpi/_info/manifest.json", b"[1, 2, 3]"),
        ]);

        let err = resolve(&archive).await.unwrap_err();
        assert!(err.is_invalid_manifest());
        assert!(err.to_string().contains("an array"));
    }

    #[tokio::test]
    async fn test_oversized_sidecar() {
        let bmap = vec![b'x'; 64];
        let archive = MemoryArchive::with(&[
            ("rpi/raspberrypi.img", b"image"),
            ("rpi/_info/image.bmap", &bmap),
        ]);
        let config = ResolverConfig {
            max_sidecar_bytes: 16,
            ..Default::default()
        };

        let err = resolve_archive_image(archive_path(), &archive, &config)
            .await
            .unwrap_err();
        assert!(matches!(err, ImageError::SidecarTooLarge { limit: 16, .. }));
    }

    #[test]
    fn test_manifest_field_types() {
        let manifest: Map<String, Value> = serde_json::from_str(
            r#"{"name": "Pi", "version": 3, "url": null, "checksum": ["a"], "supportUrl": true, "checksumType": ""}"#,
        )
        .unwrap();
        assert_eq!(manifest_field(&manifest, "name").as_deref(), Some("Pi"));
        assert_eq!(manifest_field(&manifest, "version").as_deref(), Some("3"));
        assert_eq!(manifest_field(&manifest, "supportUrl").as_deref(), Some("true"));
        assert!(manifest_field(&manifest, "url").is_none());
        assert!(manifest_field(&manifest, "checksum").is_none());
        assert!(manifest_field(&manifest, "checksumType").is_none());
        assert!(manifest_field(&manifest, "missing").is_none());
    }

    #[test]
    fn test_parse_manifest_absent_is_empty() {
        assert!(parse_manifest(archive_path(), None).unwrap().is_empty());
    }
}
