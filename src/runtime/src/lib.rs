//! imgstream Runtime - disk image resolution.
//!
//! Turns an input file (raw, gzip, bzip2, xz, or a zip container) into an
//! [`ImageDescriptor`]: a byte stream, its size, the transform that decodes
//! it, and any metadata the container carried.
//!
//! ```no_run
//! # async fn run() -> imgstream_core::Result<()> {
//! let image = imgstream_runtime::get_image_descriptor("rpi.img.xz").await?;
//! let mut reader = image.into_image_reader();
//! std::io::copy(&mut reader, &mut std::io::sink())?;
//! # Ok(())
//! # }
//! ```

pub mod archive;
pub mod classify;
pub mod codec;
pub mod descriptor;
mod resolve;

use imgstream_core::error::{ImageError, Result};

// Re-export common types
pub use archive::{ArchiveAccess, ArchiveEntry, EntryStream, ZipArchiveAccess};
pub use classify::{classify, classify_bytes};
pub use codec::Codec;
pub use descriptor::{ByteStream, FinalSize, ImageDescriptor, ImageMetadata, ImageSummary, Transform};
pub use resolve::{
    get_estimated_final_size, get_image_descriptor, get_metadata, supported_file_types,
    ImageResolver,
};

/// imgstream Runtime version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Run blocking file I/O off the async executor.
pub(crate) async fn run_blocking<T, F>(f: F) -> Result<T>
where
    F: FnOnce() -> Result<T> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| ImageError::Other(format!("Blocking task failed: {}", e)))?
}
