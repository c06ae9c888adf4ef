//! `imgstream formats` command - list supported file extensions.

use clap::Args;
use imgstream_core::SupportedFileType;

use crate::output;

#[derive(Args)]
pub struct FormatsArgs {
    /// Print as JSON instead of a table
    #[arg(long)]
    pub json: bool,
}

pub async fn execute(args: FormatsArgs) -> Result<(), Box<dyn std::error::Error>> {
    let types = imgstream_runtime::supported_file_types();
    if args.json {
        println!("{}", serde_json::to_string_pretty(types)?);
    } else {
        println!("{}", render_table(types));
    }
    Ok(())
}

fn render_table(types: &[SupportedFileType]) -> String {
    let mut table = output::new_table(["EXTENSION", "KIND", "FORMAT", "MIME TYPE"]);
    for file_type in types {
        table.add_row([
            format!(".{}", file_type.extension),
            file_type.kind.to_string(),
            file_type.format.to_string(),
            file_type.format.mime_type().to_string(),
        ]);
    }
    table.to_string()
}
