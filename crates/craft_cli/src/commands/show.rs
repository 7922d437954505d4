//! Show command - Print the local project state.

use anyhow::Result;
use clap::Args;
use craft_store::ProjectStore;
use tracing::debug;

use super::ConfigArgs;

#[derive(Args)]
pub struct ShowArgs {
    /// Also print the live preview HTML
    #[arg(long)]
    html: bool,
}

pub async fn execute(args: ShowArgs, config: &ConfigArgs) -> Result<()> {
    let config = config.load()?;
    let store = ProjectStore::new(config.store_root());
    debug!("Reading store at {}", store.root().display());

    let snapshot = store.snapshot(&config.user_id)?;
    println!("{}", serde_json::to_string_pretty(&snapshot)?);

    if args.html {
        match store.live_html(&config.user_id)? {
            Some(html) => println!("{}", html),
            None => println!("(no preview yet)"),
        }
    }
    Ok(())
}
