//! Codec registry for single-file (non-container) formats.
//!
//! Each [`Codec`] opens the input file as the descriptor stream and pairs it
//! with the matching [`Transform`]. Sizes follow what each format can tell us
//! without decoding:
//!
//! | codec | `size`                  | `final_size`              |
//! |-------|-------------------------|---------------------------|
//! | raw   | file length             | exact, file length        |
//! | gzip  | file length             | estimate, ISIZE trailer   |
//! | bzip2 | file length             | unknown                   |
//! | xz    | uncompressed (index)    | exact, uncompressed       |

pub mod xz_index;

use std::fs::File;
use std::io::{Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};

use imgstream_core::error::{ImageError, Result};
use imgstream_core::ImageFormat;

use crate::descriptor::{FinalSize, ImageDescriptor, Transform};
use crate::run_blocking;

/// Smallest well-formed gzip member: 10-byte header, empty body, 8-byte trailer.
const GZIP_MIN_SIZE: u64 = 18;

/// Decompression codec registered for a non-container format.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Codec {
    Raw,
    Gzip,
    Bzip2,
    Xz,
}

impl Codec {
    /// Every registered codec.
    pub const ALL: [Codec; 4] = [Codec::Raw, Codec::Gzip, Codec::Bzip2, Codec::Xz];

    /// Look up the codec registered for `format`.
    ///
    /// Container formats have no codec and yield `UnsupportedFormat`.
    pub fn for_format(format: ImageFormat) -> Result<Self> {
        match format {
            ImageFormat::Raw => Ok(Codec::Raw),
            ImageFormat::Gzip => Ok(Codec::Gzip),
            ImageFormat::Bzip2 => Ok(Codec::Bzip2),
            ImageFormat::Xz => Ok(Codec::Xz),
            ImageFormat::Zip => Err(ImageError::UnsupportedFormat(format!(
                "{} is a container format with no codec",
                format
            ))),
        }
    }

    pub fn format(&self) -> ImageFormat {
        match self {
            Codec::Raw => ImageFormat::Raw,
            Codec::Gzip => ImageFormat::Gzip,
            Codec::Bzip2 => ImageFormat::Bzip2,
            Codec::Xz => ImageFormat::Xz,
        }
    }

    pub fn transform(&self) -> Transform {
        match self {
            Codec::Raw => Transform::Identity,
            Codec::Gzip => Transform::Gunzip,
            Codec::Bzip2 => Transform::Bunzip2,
            Codec::Xz => Transform::Unxz,
        }
    }

    /// Open `path` as an image descriptor for this codec.
    ///
    /// For xz the index is read through its own file handle before the
    /// streaming handle is opened; the two never share a cursor.
    pub async fn open(self, path: &Path) -> Result<ImageDescriptor> {
        let path = path.to_path_buf();
        run_blocking(move || self.open_blocking(path)).await
    }

    fn open_blocking(self, path: PathBuf) -> Result<ImageDescriptor> {
        let (size, final_size) = match self {
            Codec::Raw => {
                let len = file_len(&path)?;
                (len, Some(FinalSize::exact(len)))
            }
            Codec::Gzip => {
                let len = file_len(&path)?;
                (len, gzip_isize(&path, len)?.map(FinalSize::estimate))
            }
            Codec::Bzip2 => (file_len(&path)?, None),
            Codec::Xz => {
                let uncompressed = xz_uncompressed_size(&path)?;
                (uncompressed, Some(FinalSize::exact(uncompressed)))
            }
        };

        let stream = open_file(&path)?;

        tracing::debug!(
            path = %path.display(),
            codec = ?self,
            size,
            final_size = ?final_size,
            "Opened image"
        );

        Ok(ImageDescriptor {
            path,
            format: self.format(),
            stream: Box::new(stream),
            size,
            final_size,
            transform: self.transform(),
            metadata: None,
        })
    }
}

/// Resolve a non-container image through the codec registry.
pub async fn resolve(format: ImageFormat, path: &Path) -> Result<ImageDescriptor> {
    Codec::for_format(format)?.open(path).await
}

/// Wrap an I/O error as "Failed to {action} {path}: {error}".
fn with_path(action: &str, path: &Path, e: std::io::Error) -> ImageError {
    ImageError::IoError(std::io::Error::new(
        e.kind(),
        format!("Failed to {} {}: {}", action, path.display(), e),
    ))
}

fn open_file(path: &Path) -> Result<File> {
    File::open(path).map_err(|e| with_path("open", path, e))
}

fn file_len(path: &Path) -> Result<u64> {
    let metadata = std::fs::metadata(path).map_err(|e| with_path("stat", path, e))?;
    Ok(metadata.len())
}

/// Decompressed length modulo 2^32 from the last gzip member's trailer.
///
/// Only a hint: multi-member files and images over 4 GiB report less than
/// the real size.
fn gzip_isize(path: &Path, len: u64) -> Result<Option<u64>> {
    if len < GZIP_MIN_SIZE {
        return Ok(None);
    }

    let mut file = open_file(path)?;
    let mut trailer = [0u8; 4];
    file.seek(SeekFrom::End(-4))
        .and_then(|_| file.read_exact(&mut trailer))
        .map_err(|e| with_path("read gzip trailer of", path, e))?;
    Ok(Some(u64::from(u32::from_le_bytes(trailer))))
}

fn xz_uncompressed_size(path: &Path) -> Result<u64> {
    let mut file = open_file(path)?;
    xz_index::uncompressed_size(&mut file).map_err(|e| ImageError::XzIndexError {
        path: path.to_path_buf(),
        message: e.to_string(),
    })
}
