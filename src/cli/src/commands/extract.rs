//! `imgstream extract` command - write the decompressed image to a file.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use clap::Args;
use imgstream_runtime::{ImageDescriptor, ImageResolver};

use crate::output;

#[derive(Args)]
pub struct ExtractArgs {
    /// Image file to extract
    pub path: PathBuf,

    /// Destination file for the image bytes
    #[arg(short, long)]
    pub output: PathBuf,

    /// Treat the input as this format instead of sniffing it (e.g. "gzip")
    #[arg(long)]
    pub format: Option<String>,
}

pub async fn execute(
    args: ExtractArgs,
    resolver: &ImageResolver,
) -> Result<(), Box<dyn std::error::Error>> {
    let image = super::resolve(resolver, &args.path, args.format.as_deref()).await?;
    let final_size = image.final_size;

    tracing::info!(
        path = %args.path.display(),
        format = %image.format,
        size = image.size,
        "Extracting image"
    );

    let output_path = args.output.clone();
    let written = tokio::task::spawn_blocking(move || write_image(image, &output_path)).await??;

    match final_size {
        Some(expected) if !expected.estimated && expected.value != written => {
            tracing::warn!(
                expected = expected.value,
                written,
                "Extracted size differs from the declared image size"
            );
        }
        _ => {}
    }

    println!(
        "Extracted {} to {}",
        output::describe_size(written),
        args.output.display()
    );
    Ok(())
}

/// Copy the decoded image into `output`, returning the byte count.
fn write_image(image: ImageDescriptor, output: &Path) -> std::io::Result<u64> {
    let mut reader = image.into_image_reader();
    let mut writer = BufWriter::new(File::create(output)?);
    let written = std::io::copy(&mut reader, &mut writer)?;
    writer.flush()?;
    Ok(written)
}
