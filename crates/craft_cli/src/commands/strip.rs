//! Strip command - Print a text without its command tags.

use anyhow::Result;
use clap::Args;
use craft_tags::strip_tags;

use super::read_input;

#[derive(Args)]
pub struct StripArgs {
    /// File to clean, or `-` for stdin
    input: String,
}

pub async fn execute(args: StripArgs) -> Result<()> {
    let text = read_input(&args.input)?;
    println!("{}", strip_tags(&text));
    Ok(())
}
