//! Detect command - Print the command tags found in a text.

use anyhow::Result;
use clap::Args;
use craft_chat::plan;
use craft_tags::detect;
use serde_json::json;

use super::read_input;

#[derive(Args)]
pub struct DetectArgs {
    /// File to scan, or `-` for stdin
    input: String,

    /// Print the commands in the order they would be applied instead
    #[arg(long)]
    commands: bool,
}

pub async fn execute(args: DetectArgs) -> Result<()> {
    let text = read_input(&args.input)?;
    let tags = detect(&text);

    let output = if args.commands {
        let (commands, skipped) = plan(&tags);
        json!({"commands": commands, "skipped": skipped})
    } else {
        serde_json::to_value(&tags)?
    };

    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}
