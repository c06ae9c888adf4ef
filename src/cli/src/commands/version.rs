//! `imgstream version` command.

use clap::Args;
use imgstream_core::ImageFormat;

#[derive(Args)]
pub struct VersionArgs;

pub async fn execute(_args: VersionArgs) -> Result<(), Box<dyn std::error::Error>> {
    println!("{}", version_text());
    Ok(())
}

fn version_text() -> String {
    let formats: Vec<&str> = ImageFormat::ALL.iter().map(|f| f.as_str()).collect();
    format!(
        "imgstream {}\nformats: {}",
        imgstream_runtime::VERSION,
        formats.join(", ")
    )
}
