//! Public entry points: classify, dispatch, assemble.

use std::path::Path;
use std::sync::Arc;

use imgstream_core::error::Result;
use imgstream_core::format::{SupportedFileType, SUPPORTED_FILE_TYPES};
use imgstream_core::{ImageFormat, ResolverConfig};

use crate::archive::{resolve_archive_image, ArchiveAccess, ZipArchiveAccess};
use crate::classify::classify;
use crate::codec;
use crate::descriptor::{ImageDescriptor, ImageSummary};

/// Resolves input files into [`ImageDescriptor`]s.
///
/// Holds no per-call state; every call opens its own file and archive
/// handles, so one resolver can serve concurrent callers.
#[derive(Clone)]
pub struct ImageResolver {
    config: ResolverConfig,
    archive_access: Arc<dyn ArchiveAccess>,
}

impl Default for ImageResolver {
    fn default() -> Self {
        Self::new(ResolverConfig::default())
    }
}

impl ImageResolver {
    /// Create a resolver that reads containers with the zip backend.
    pub fn new(config: ResolverConfig) -> Self {
        Self::with_archive_access(config, Arc::new(ZipArchiveAccess::new()))
    }

    /// Create a resolver with a custom container backend.
    pub fn with_archive_access(config: ResolverConfig, archive_access: Arc<dyn ArchiveAccess>) -> Self {
        Self {
            config,
            archive_access,
        }
    }

    pub fn config(&self) -> &ResolverConfig {
        &self.config
    }

    /// Classify `path` and resolve it into a descriptor.
    pub async fn get_image_descriptor(&self, path: impl AsRef<Path>) -> Result<ImageDescriptor> {
        let path = path.as_ref();
        let format = classify(path).await?;
        self.resolve_format(path, format).await
    }

    /// Resolve `path` as the named format, skipping classification.
    ///
    /// `format` may be an identifier (`"xz"`), a MIME type or an extension.
    pub async fn resolve_as(&self, path: impl AsRef<Path>, format: &str) -> Result<ImageDescriptor> {
        let format: ImageFormat = format.parse()?;
        self.resolve_format(path.as_ref(), format).await
    }

    /// Dispatch an already-classified file.
    pub async fn resolve_format(&self, path: &Path, format: ImageFormat) -> Result<ImageDescriptor> {
        tracing::debug!(path = %path.display(), format = %format, "Resolving image");

        match format {
            ImageFormat::Raw | ImageFormat::Gzip | ImageFormat::Bzip2 | ImageFormat::Xz => {
                codec::resolve(format, path).await
            }
            ImageFormat::Zip => {
                resolve_archive_image(path, self.archive_access.as_ref(), &self.config).await
            }
        }
    }

    /// Best known decompressed size of the image in `path`.
    ///
    /// Exact for raw, xz and zip entries. For gzip it comes from the trailer and
    /// may wrap above 4 GiB. For bzip2 it is the compressed size.
    pub async fn get_estimated_final_size(&self, path: impl AsRef<Path>) -> Result<u64> {
        let image = self.get_image_descriptor(path).await?;
        Ok(image.estimated_final_size())
    }

    /// Metadata-only view of the image in `path`; the stream is released.
    pub async fn get_metadata(&self, path: impl AsRef<Path>) -> Result<ImageSummary> {
        let image = self.get_image_descriptor(path).await?;
        Ok(image.summary())
    }
}

impl std::fmt::Debug for ImageResolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ImageResolver")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

/// Resolve `path` with the default configuration.
pub async fn get_image_descriptor(path: impl AsRef<Path>) -> Result<ImageDescriptor> {
    ImageResolver::default().get_image_descriptor(path).await
}

/// Estimated decompressed size of `path` with the default configuration.
pub async fn get_estimated_final_size(path: impl AsRef<Path>) -> Result<u64> {
    ImageResolver::default().get_estimated_final_size(path).await
}

/// Metadata-only view of `path` with the default configuration.
pub async fn get_metadata(path: impl AsRef<Path>) -> Result<ImageSummary> {
    ImageResolver::default().get_metadata(path).await
}

/// Every extension accepted as input, with its role.
pub fn supported_file_types() -> &'static [SupportedFileType] {
    SUPPORTED_FILE_TYPES
}
