//! Supported formats and the static file-type table.
//!
//! [`ImageFormat`] is the closed set of identifiers the classifier can
//! produce. [`SUPPORTED_FILE_TYPES`] lists every extension callers may
//! offer, and its `Image` rows define which archive entries count as the
//! disk image inside a container.

use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::ImageError;

/// Format identifier produced by classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ImageFormat {
    /// Uncompressed image
    Raw,
    /// gzip (.gz)
    Gzip,
    /// bzip2 (.bz2)
    Bzip2,
    /// xz/LZMA2 (.xz)
    Xz,
    /// zip container archive
    Zip,
}

impl ImageFormat {
    /// Every identifier, in classification order.
    pub const ALL: [ImageFormat; 5] = [
        ImageFormat::Raw,
        ImageFormat::Gzip,
        ImageFormat::Bzip2,
        ImageFormat::Xz,
        ImageFormat::Zip,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ImageFormat::Raw => "raw",
            ImageFormat::Gzip => "gzip",
            ImageFormat::Bzip2 => "bzip2",
            ImageFormat::Xz => "xz",
            ImageFormat::Zip => "zip",
        }
    }

    pub fn mime_type(&self) -> &'static str {
        match self {
            ImageFormat::Raw => "application/octet-stream",
            ImageFormat::Gzip => "application/gzip",
            ImageFormat::Bzip2 => "application/x-bzip2",
            ImageFormat::Xz => "application/x-xz",
            ImageFormat::Zip => "application/zip",
        }
    }

    /// Whether the format bundles the image with other entries.
    pub fn is_container(&self) -> bool {
        matches!(self, ImageFormat::Zip)
    }
}

impl std::fmt::Display for ImageFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ImageFormat {
    type Err = ImageError;

    /// Accepts identifiers, MIME types, and the table's extensions.
    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let needle = s.trim().to_ascii_lowercase();
        if let Some(format) = ImageFormat::ALL
            .iter()
            .find(|f| f.as_str() == needle || f.mime_type() == needle)
        {
            return Ok(*format);
        }

        match lookup_extension(&needle, true) {
            Some(file_type) => Ok(file_type.format),
            None => Err(ImageError::UnsupportedFormat(s.to_string())),
        }
    }
}

/// Role of an extension in the file-type table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FileKind {
    Archive,
    Compressed,
    Image,
}

impl std::fmt::Display for FileKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FileKind::Archive => f.write_str("archive"),
            FileKind::Compressed => f.write_str("compressed"),
            FileKind::Image => f.write_str("image"),
        }
    }
}

/// One row of the supported file-type table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SupportedFileType {
    pub extension: &'static str,
    pub kind: FileKind,
    pub format: ImageFormat,
}

const fn row(extension: &'static str, kind: FileKind, format: ImageFormat) -> SupportedFileType {
    SupportedFileType {
        extension,
        kind,
        format,
    }
}

/// Extensions accepted as input, and what they mean.
pub const SUPPORTED_FILE_TYPES: &[SupportedFileType] = &[
    row("zip", FileKind::Archive, ImageFormat::Zip),
    row("etch", FileKind::Archive, ImageFormat::Zip),
    row("gz", FileKind::Compressed, ImageFormat::Gzip),
    row("bz2", FileKind::Compressed, ImageFormat::Bzip2),
    row("xz", FileKind::Compressed, ImageFormat::Xz),
    row("img", FileKind::Image, ImageFormat::Raw),
    row("iso", FileKind::Image, ImageFormat::Raw),
    row("dsk", FileKind::Image, ImageFormat::Raw),
    row("hddimg", FileKind::Image, ImageFormat::Raw),
    row("raw", FileKind::Image, ImageFormat::Raw),
    row("dmg", FileKind::Image, ImageFormat::Raw),
    row("sdcard", FileKind::Image, ImageFormat::Raw),
    row("rpi-sdimg", FileKind::Image, ImageFormat::Raw),
    row("wic", FileKind::Image, ImageFormat::Raw),
];

/// Extensions that identify the disk image inside a container archive.
pub fn image_extensions() -> impl Iterator<Item = &'static str> {
    SUPPORTED_FILE_TYPES
        .iter()
        .filter(|t| t.kind == FileKind::Image)
        .map(|t| t.extension)
}

/// Find the table row for an extension (without the leading dot).
pub fn lookup_extension(extension: &str, case_insensitive: bool) -> Option<&'static SupportedFileType> {
    SUPPORTED_FILE_TYPES.iter().find(|t| {
        if case_insensitive {
            t.extension.eq_ignore_ascii_case(extension)
        } else {
            t.extension == extension
        }
    })
}

/// Whether `extension` names an image in the file-type table.
pub fn is_image_extension(extension: &str, case_insensitive: bool) -> bool {
    lookup_extension(extension, case_insensitive)
        .map(|t| t.kind == FileKind::Image)
        .unwrap_or(false)
}
