//! `imgstream inspect` command - display image metadata as JSON.

use std::path::PathBuf;

use clap::Args;
use imgstream_runtime::ImageResolver;

#[derive(Args)]
pub struct InspectArgs {
    /// Image file to inspect
    pub path: PathBuf,

    /// Treat the input as this format instead of sniffing it (e.g. "xz")
    #[arg(long)]
    pub format: Option<String>,
}

pub async fn execute(
    args: InspectArgs,
    resolver: &ImageResolver,
) -> Result<(), Box<dyn std::error::Error>> {
    let image = super::resolve(resolver, &args.path, args.format.as_deref()).await?;
    let summary = image.summary();
    drop(image);

    println!("{}", serde_json::to_string_pretty(&summary)?);
    Ok(())
}
