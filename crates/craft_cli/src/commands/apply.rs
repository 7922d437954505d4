//! Apply command - Dispatch the tags in a text against the local store.

use std::sync::Arc;

use anyhow::Result;
use clap::Args;
use craft_chat::{
    ChatError, CommandDispatcher, DispatchReport, EventBus, PreviewSynchronizer,
    ProjectStateGateway, SectionApproval,
};
use craft_client::ResilientClient;
use craft_store::{ProjectStore, StoreTransport};
use parking_lot::Mutex;
use tracing::info;

use super::{read_input, ConfigArgs};

#[derive(Args)]
pub struct ApplyArgs {
    /// File holding an assistant reply, or `-` for stdin
    input: String,

    /// Approve the pending preview afterwards
    #[arg(long)]
    approve: bool,

    /// Print every published event as a JSON line
    #[arg(long)]
    events: bool,
}

pub async fn execute(args: ApplyArgs, config: &ConfigArgs) -> Result<()> {
    let config = config.load()?;
    let text = read_input(&args.input)?;

    let store = ProjectStore::new(config.store_root());
    info!("Applying to {} (session {})", store.root().display(), config.user_id);

    let client = ResilientClient::new(
        Arc::new(StoreTransport::new(store.clone())),
        config.retry.clone(),
    );
    let gateway = Arc::new(ProjectStateGateway::new(client, config.user_id.clone()));
    let preview = Arc::new(Mutex::new(PreviewSynchronizer::new(config.preview_url())));
    let events = EventBus::default();
    let mut receiver = events.subscribe();

    let dispatcher = CommandDispatcher::new(gateway.clone(), preview, events);
    let report = dispatcher.dispatch_text(&text).await;

    if args.events {
        while let Ok(event) = receiver.try_recv() {
            println!("{}", serde_json::to_string(&event)?);
        }
    }
    print_report(&report);

    if args.approve {
        let pending = store
            .snapshot(&config.user_id)?
            .pending_preview
            .ok_or(ChatError::NoPendingPreview)?;
        let messages = gateway.load_conversation().await?.messages;
        let approval = SectionApproval {
            section: pending.section,
            html: pending.html,
        };
        gateway.save_conversation(&messages, Some(&approval)).await?;
        println!("✅ Approved section '{}'", approval.section);
    }

    if !report.is_clean() {
        anyhow::bail!(
            "{} of {} commands failed",
            report.failures.len(),
            report.failures.len() + report.applied.len()
        );
    }
    Ok(())
}

fn print_report(report: &DispatchReport) {
    if report.is_empty() {
        println!("No command tags found");
        return;
    }
    for kind in &report.applied {
        println!("✅ {}", kind);
    }
    for kind in &report.skipped {
        println!("⏭️  {} (skipped)", kind);
    }
    for (kind, error) in &report.failures {
        println!("❌ {}: {}", kind, error);
    }
}
