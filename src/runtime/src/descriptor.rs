//! Resolution output: the image stream, its size, and how to decode it.

use std::io::Read;
use std::path::PathBuf;

use bzip2::read::MultiBzDecoder;
use flate2::read::MultiGzDecoder;
use imgstream_core::ImageFormat;
use serde::Serialize;
use xz2::read::XzDecoder;

/// Owned, sequential byte source handed to the caller.
pub type ByteStream = Box<dyn Read + Send>;

/// Decompression applied to [`ImageDescriptor::stream`] to obtain image bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Transform {
    /// Pass-through
    Identity,
    /// gzip inflate, all members
    Gunzip,
    /// bzip2 inflate, all streams
    Bunzip2,
    /// xz decompress, all streams
    Unxz,
}

impl Transform {
    /// Wrap `reader` so that reading it yields decoded bytes.
    pub fn apply<'a, R>(self, reader: R) -> Box<dyn Read + Send + 'a>
    where
        R: Read + Send + 'a,
    {
        match self {
            Transform::Identity => Box::new(reader),
            Transform::Gunzip => Box::new(MultiGzDecoder::new(reader)),
            Transform::Bunzip2 => Box::new(MultiBzDecoder::new(reader)),
            Transform::Unxz => Box::new(XzDecoder::new_multi_decoder(reader)),
        }
    }
}

/// Decompressed size, when the format lets us know it before streaming.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct FinalSize {
    pub value: u64,
    /// `true` when `value` is a hint rather than an exact count
    pub estimated: bool,
}

impl FinalSize {
    pub fn exact(value: u64) -> Self {
        Self {
            value,
            estimated: false,
        }
    }

    pub fn estimate(value: u64) -> Self {
        Self {
            value,
            estimated: true,
        }
    }
}

/// Descriptive metadata supplied by a container archive.
///
/// Every field is `None` unless the archive provided it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageMetadata {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub support_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub release_notes_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub checksum_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub checksum: Option<String>,
    /// Raw SVG text of `_info/logo.svg`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub logo: Option<String>,
    /// Raw XML text of `_info/image.bmap`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bmap: Option<String>,
}

impl ImageMetadata {
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

/// A resolved disk image.
///
/// Read `stream` through `transform` (or call [`ImageDescriptor::into_image_reader`])
/// to obtain the image bytes. Dropping the descriptor releases the underlying
/// file handle.
pub struct ImageDescriptor {
    /// Input file the descriptor was resolved from
    pub path: PathBuf,
    /// Classified input format
    pub format: ImageFormat,
    pub stream: ByteStream,
    /// File length for raw, gzip and bzip2; exact image size for xz and zip entries
    pub size: u64,
    pub final_size: Option<FinalSize>,
    pub transform: Transform,
    /// Present only for container archives
    pub metadata: Option<ImageMetadata>,
}

impl ImageDescriptor {
    /// Best known size of the decoded image.
    ///
    /// Falls back to `size`, which for bzip2 is the compressed length.
    pub fn estimated_final_size(&self) -> u64 {
        self.final_size.map(|f| f.value).unwrap_or(self.size)
    }

    /// Consume the descriptor, returning a reader over the decoded image.
    pub fn into_image_reader(self) -> ByteStream {
        self.transform.apply(self.stream)
    }

    /// Metadata-only view with absent keys dropped.
    pub fn summary(&self) -> ImageSummary {
        let metadata = self.metadata.clone().unwrap_or_default();
        ImageSummary {
            estimated_size: self.estimated_final_size(),
            name: metadata.name,
            url: metadata.url,
            support_url: metadata.support_url,
            release_notes_url: metadata.release_notes_url,
            checksum_type: metadata.checksum_type,
            checksum: metadata.checksum,
            logo: metadata.logo,
            bmap: metadata.bmap,
        }
    }
}

impl std::fmt::Debug for ImageDescriptor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ImageDescriptor")
            .field("path", &self.path)
            .field("format", &self.format)
            .field("size", &self.size)
            .field("final_size", &self.final_size)
            .field("transform", &self.transform)
            .field("metadata", &self.metadata)
            .finish_non_exhaustive()
    }
}

/// Serializable metadata view returned by `get_metadata`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageSummary {
    pub estimated_size: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub support_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub release_notes_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub checksum_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub checksum: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub logo: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bmap: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{Cursor, Write};

    fn descriptor(size: u64, final_size: Option<FinalSize>) -> ImageDescriptor {
        ImageDescriptor {
            path: PathBuf::from("image.img"),
            format: ImageFormat::Raw,
            stream: Box::new(Cursor::new(Vec::new())),
            size,
            final_size,
            transform: Transform::Identity,
            metadata: None,
        }
    }

    #[test]
    fn test_identity_transform_passes_bytes() {
        let mut out = Vec::new();
        Transform::Identity
            .apply(Cursor::new(b"disk".to_vec()))
            .read_to_end(&mut out)
            .unwrap();
        assert_eq!(out, b"disk");
    }

    #[test]
    fn test_gunzip_transform_reads_all_members() {
        use flate2::write::GzEncoder;
        use flate2::Compression;

        let mut data = Vec::new();
        for part in [&b"first-"[..], &b"second"[..]] {
            let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
            encoder.write_all(part).unwrap();
            data.extend(encoder.finish().unwrap());
        }

        let mut out = Vec::new();
        Transform::Gunzip
            .apply(Cursor::new(data))
            .read_to_end(&mut out)
            .unwrap();
        assert_eq!(out, b"first-second");
    }

    #[test]
    fn test_estimated_final_size_prefers_final() {
        assert_eq!(descriptor(10, Some(FinalSize::estimate(40))).estimated_final_size(), 40);
        assert_eq!(descriptor(10, None).estimated_final_size(), 10);
    }

    #[test]
    fn test_summary_omits_absent_keys() {
        let mut image = descriptor(512, Some(FinalSize::exact(512)));
        image.metadata = Some(ImageMetadata {
            name: Some("Raspberry Pi".to_string()),
            version: Some("1.0".to_string()),
            ..Default::default()
        });

        let value = serde_json::to_value(image.summary()).unwrap();
        let object = value.as_object().unwrap();
        assert_eq!(object.len(), 2);
        assert_eq!(object["estimatedSize"], 512);
        assert_eq!(object["name"], "Raspberry Pi");
    }

    #[test]
    fn test_metadata_is_empty() {
        assert!(ImageMetadata::default().is_empty());
        let metadata = ImageMetadata {
            logo: Some(String::new()),
            ..Default::default()
        };
        assert!(!metadata.is_empty());
    }

    #[test]
    fn test_debug_skips_stream() {
        let debug = format!("{:?}", descriptor(1, None));
        assert!(debug.contains("ImageDescriptor"));
        assert!(debug.contains("Identity"));
    }
}
