//! zip backend for [`ArchiveAccess`].
//!
//! Entries are served from their raw byte range in the archive file, wrapped
//! in the decoder for the entry's compression method. This gives each stream
//! its own file handle with no borrow on a `ZipArchive`, so streams can
//! outlive the listing and several can be open at once.
//!
//! Bypassing `ZipFile` also bypasses its integrity check, so every stream is
//! wrapped in [`CrcVerified`], which checks the decoded bytes against the CRC32
//! and size from the central directory when the entry is fully read. Only
//! Stored, Deflated and Bzip2 entries are decoded; Deflate64, LZMA, Zstd and
//! the rest fail with `ArchiveError`.

use std::fs::File;
use std::io::{self, BufReader, Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use bzip2::read::BzDecoder;
use flate2::read::DeflateDecoder;
use flate2::Crc;
use imgstream_core::error::{ImageError, Result};
use zip::{CompressionMethod, ZipArchive};

use super::{ArchiveAccess, ArchiveEntry, EntryStream};
use crate::run_blocking;

/// Reads `.zip` containers from disk.
#[derive(Debug, Clone, Copy, Default)]
pub struct ZipArchiveAccess;

impl ZipArchiveAccess {
    pub fn new() -> Self {
        Self
    }

    fn open_archive(archive: &Path) -> Result<ZipArchive<BufReader<File>>> {
        let file = File::open(archive).map_err(|e| ImageError::ArchiveError {
            archive: archive.to_path_buf(),
            message: format!("Failed to open archive: {}", e),
        })?;

        ZipArchive::new(BufReader::new(file)).map_err(|e| ImageError::ArchiveError {
            archive: archive.to_path_buf(),
            message: format!("Failed to read central directory: {}", e),
        })
    }

    fn list_blocking(archive: &Path) -> Result<Vec<ArchiveEntry>> {
        let mut zip = Self::open_archive(archive)?;
        let mut entries = Vec::with_capacity(zip.len());

        for index in 0..zip.len() {
            let file = zip.by_index_raw(index).map_err(|e| ImageError::ArchiveError {
                archive: archive.to_path_buf(),
                message: format!("Failed to read entry #{}: {}", index, e),
            })?;
            if file.is_dir() {
                continue;
            }
            entries.push(ArchiveEntry::new(file.name(), file.size()));
        }

        tracing::debug!(
            archive = %archive.display(),
            entries = entries.len(),
            "Listed zip entries"
        );

        Ok(entries)
    }

    fn open_blocking(archive: PathBuf, entry: String) -> Result<EntryStream> {
        let mut zip = Self::open_archive(&archive)?;
        let index = zip
            .index_for_name(&entry)
            .ok_or_else(|| ImageError::EntryNotFound {
                archive: archive.clone(),
                entry: entry.clone(),
            })?;

        let (data_start, compressed_size, size, crc32, method, encrypted) = {
            let file = zip.by_index_raw(index).map_err(|e| ImageError::ArchiveError {
                archive: archive.clone(),
                message: format!("Failed to read entry {}: {}", entry, e),
            })?;
            (
                file.data_start(),
                file.compressed_size(),
                file.size(),
                file.crc32(),
                file.compression(),
                file.encrypted(),
            )
        };

        if encrypted {
            return Err(ImageError::ArchiveError {
                archive,
                message: format!("Entry {} is encrypted", entry),
            });
        }

        let mut reader = zip.into_inner();
        reader
            .seek(SeekFrom::Start(data_start))
            .map_err(|source| ImageError::EntryIo {
                archive: archive.clone(),
                entry: entry.clone(),
                source,
            })?;
        let raw = reader.take(compressed_size);

        let stream: EntryStream = match method {
            CompressionMethod::Stored => Box::new(CrcVerified::new(raw, crc32, size)),
            CompressionMethod::Deflated => {
                Box::new(CrcVerified::new(DeflateDecoder::new(raw), crc32, size))
            }
            CompressionMethod::Bzip2 => {
                Box::new(CrcVerified::new(BzDecoder::new(raw), crc32, size))
            }
            other => {
                return Err(ImageError::ArchiveError {
                    archive,
                    message: format!(
                        "Entry {} uses unsupported compression method {:?}",
                        entry, other
                    ),
                })
            }
        };

        tracing::debug!(
            archive = %archive.display(),
            entry = %entry,
            method = ?method,
            "Opened zip entry"
        );

        Ok(stream)
    }
}

/// Checks decoded entry bytes against the recorded CRC32 and size at EOF.
struct CrcVerified<R> {
    inner: R,
    crc: Crc,
    read: u64,
    expected_crc: u32,
    expected_size: u64,
    verified: bool,
}

impl<R: Read> CrcVerified<R> {
    fn new(inner: R, expected_crc: u32, expected_size: u64) -> Self {
        Self {
            inner,
            crc: Crc::new(),
            read: 0,
            expected_crc,
            expected_size,
            verified: false,
        }
    }

    fn verify(&mut self) -> io::Result<()> {
        if self.verified {
            return Ok(());
        }
        self.verified = true;

        if self.read != self.expected_size {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                format!(
                    "entry decoded to {} bytes, archive declares {}",
                    self.read, self.expected_size
                ),
            ));
        }
        if self.crc.sum() != self.expected_crc {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                format!(
                    "entry CRC32 {:08x} does not match archive CRC32 {:08x}",
                    self.crc.sum(),
                    self.expected_crc
                ),
            ));
        }
        Ok(())
    }
}

impl<R: Read> Read for CrcVerified<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let n = self.inner.read(buf)?;
        if n == 0 && !buf.is_empty() {
            self.verify()?;
        } else {
            self.crc.update(&buf[..n]);
            self.read += n as u64;
        }
        Ok(n)
    }
}

#[async_trait]
impl ArchiveAccess for ZipArchiveAccess {
    async fn list_entries(&self, archive: &Path) -> Result<Vec<ArchiveEntry>> {
        let archive = archive.to_path_buf();
        run_blocking(move || Self::list_blocking(&archive)).await
    }

    async fn open_entry_stream(&self, archive: &Path, entry: &str) -> Result<EntryStream> {
        let archive = archive.to_path_buf();
        let entry = entry.to_string();
        run_blocking(move || Self::open_blocking(archive, entry)).await
    }
}
