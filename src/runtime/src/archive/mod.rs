//! Container archive support.
//!
//! The resolver only talks to archives through [`ArchiveAccess`], a two-call
//! capability (list entries, open one entry). [`ZipArchiveAccess`] is the
//! zip backend used for `.zip` and `.etch` inputs.

mod resolver;
mod zip_access;

use std::io::Read;
use std::path::Path;

use async_trait::async_trait;
use imgstream_core::Result;

pub use resolver::{
    resolve_archive_image, select_image_entry, BMAP_PATH, LOGO_PATH, MANIFEST_PATH,
};
pub use zip_access::ZipArchiveAccess;

/// Owned reader over one archive entry's decoded contents.
pub type EntryStream = Box<dyn Read + Send>;

/// An entry as listed in the archive's own index.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchiveEntry {
    /// Path within the archive, `/`-separated
    pub name: String,
    /// Declared uncompressed size
    pub size: u64,
}

impl ArchiveEntry {
    pub fn new(name: impl Into<String>, size: u64) -> Self {
        Self {
            name: name.into(),
            size,
        }
    }

    /// Directory markers and zero-size placeholders carry no content.
    pub fn is_placeholder(&self) -> bool {
        let base_name = self.name.rsplit('/').next().unwrap_or_default();
        self.name.is_empty() || base_name.is_empty() || base_name == "." || self.size == 0
    }

    /// Final extension of the entry name, without the dot.
    pub fn extension(&self) -> Option<&str> {
        Path::new(&self.name).extension().and_then(|e| e.to_str())
    }

    /// Whether this entry is `sidecar` once the first path segment is dropped.
    ///
    /// `rpi/_info/logo.svg` matches `_info/logo.svg`; a top-level
    /// `_info/logo.svg` does not, since its first segment is `_info`.
    pub fn matches_sidecar(&self, sidecar: &str) -> bool {
        match self.name.split_once('/') {
            Some((_, rest)) => rest == sidecar,
            None => false,
        }
    }
}

/// Capability a container backend provides to the archive resolver.
#[async_trait]
pub trait ArchiveAccess: Send + Sync {
    /// List the archive's file entries with their declared sizes.
    async fn list_entries(&self, archive: &Path) -> Result<Vec<ArchiveEntry>>;

    /// Open a listed entry for sequential reading.
    ///
    /// Fails with `EntryNotFound` if `entry` is not in the archive.
    async fn open_entry_stream(&self, archive: &Path, entry: &str) -> Result<EntryStream>;
}
