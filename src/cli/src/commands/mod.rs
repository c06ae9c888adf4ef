//! CLI command definitions and dispatch.

mod extract;
mod formats;
mod inspect;
mod version;

use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};
use imgstream_core::ResolverConfig;
use imgstream_runtime::{ImageDescriptor, ImageResolver};

/// imgstream - inspect and extract raw, compressed and zipped disk images.
#[derive(Parser)]
#[command(name = "imgstream", version, about)]
pub struct Cli {
    /// Resolver configuration file (YAML)
    #[arg(long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

/// Available commands.
#[derive(Subcommand)]
pub enum Command {
    /// Print image metadata as JSON
    Inspect(inspect::InspectArgs),
    /// Write the decompressed image to a file
    Extract(extract::ExtractArgs),
    /// List supported file extensions
    Formats(formats::FormatsArgs),
    /// Show version information
    Version(version::VersionArgs),
}

/// Load the resolver configuration, or the defaults when no file is given.
pub fn load_config(path: Option<&Path>) -> Result<ResolverConfig, Box<dyn std::error::Error>> {
    match path {
        Some(path) => Ok(ResolverConfig::from_yaml_file(path)?),
        None => Ok(ResolverConfig::default()),
    }
}

/// Resolve `path`, honoring an explicit format override.
pub(crate) async fn resolve(
    resolver: &ImageResolver,
    path: &Path,
    format: Option<&str>,
) -> Result<ImageDescriptor, Box<dyn std::error::Error>> {
    let image = match format {
        Some(format) => resolver.resolve_as(path, format).await?,
        None => resolver.get_image_descriptor(path).await?,
    };
    Ok(image)
}

/// Dispatch a parsed CLI to the appropriate command handler.
pub async fn dispatch(cli: Cli, config: ResolverConfig) -> Result<(), Box<dyn std::error::Error>> {
    let resolver = ImageResolver::new(config);
    match cli.command {
        Command::Inspect(args) => inspect::execute(args, &resolver).await,
        Command::Extract(args) => extract::execute(args, &resolver).await,
        Command::Formats(args) => formats::execute(args).await,
        Command::Version(args) => version::execute(args).await,
    }
}
