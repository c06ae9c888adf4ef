//! imgstream Core - Foundational Types
//!
//! This module provides the format table, error taxonomy and configuration
//! shared by the resolver runtime and the CLI.

pub mod config;
pub mod error;
pub mod format;

// Re-export commonly used types
pub use config::{LogLevel, ResolverConfig};
pub use error::{ImageError, Result};
pub use format::{FileKind, ImageFormat, SupportedFileType, SUPPORTED_FILE_TYPES};

/// imgstream version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
