//! Chat command - Interactive session against the assistant backend.

use std::io::Write;
use std::sync::Arc;

use anyhow::Result;
use clap::Args;
use craft_chat::{
    ChatEndpoint, ChatError, ConversationSession, LayoutPreferences, PreferenceStore,
    PreviewDevice, PreviewSignal, ProjectStateGateway, SiteEvent, TurnReport,
};
use craft_client::{HttpTransport, ResilientClient};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::broadcast::{error::TryRecvError, Receiver};
use tracing::{debug, info, warn};

use super::ConfigArgs;

#[derive(Args)]
pub struct ChatArgs {
    /// Start a new session instead of resuming the saved one
    ///
    /// The previous session's conversation stays in storage under its old id.
    #[arg(long)]
    fresh: bool,
}

/// What one line of input asks for.
#[derive(Debug, PartialEq)]
enum Input<'a> {
    Empty,
    Quit,
    Approve,
    Device(PreviewDevice),
    Width(f32),
    TogglePreview,
    Unknown(&'a str),
    Message(&'a str),
}

fn parse_input(line: &str) -> Input<'_> {
    let line = line.trim();
    if line.is_empty() {
        return Input::Empty;
    }
    if !line.starts_with('/') {
        return Input::Message(line);
    }

    let mut parts = line.split_whitespace();
    let command = parts.next().unwrap_or_default();
    let argument = parts.next();
    match (command, argument) {
        ("/quit" | "/exit", _) => Input::Quit,
        ("/approve", _) => Input::Approve,
        ("/preview", _) => Input::TogglePreview,
        ("/device", Some("desktop")) => Input::Device(PreviewDevice::Desktop),
        ("/device", Some("tablet")) => Input::Device(PreviewDevice::Tablet),
        ("/device", Some("mobile")) => Input::Device(PreviewDevice::Mobile),
        ("/width", Some(raw)) => raw.parse().map(Input::Width).unwrap_or(Input::Unknown(line)),
        _ => Input::Unknown(line),
    }
}

pub async fn execute(args: ChatArgs, config: &ConfigArgs) -> Result<()> {
    let mut config = config.load()?;
    if args.fresh {
        config.start_new_session()?;
    }
    info!("Connecting to {} as {}", config.base_url(), config.user_id);

    let client = ResilientClient::new(
        Arc::new(HttpTransport::new(config.base_url())),
        config.retry.clone(),
    );
    let session = ConversationSession::new(
        ChatEndpoint::new(client.clone()),
        Arc::new(ProjectStateGateway::new(client, config.user_id.clone())),
        config.preview_url(),
    );
    let mut events = session.subscribe();

    let prefs_store = PreferenceStore::new(&config.workspace);
    let mut prefs = prefs_store.load().unwrap_or_else(|e| {
        warn!("Ignoring unreadable layout preferences: {}", e);
        LayoutPreferences::default()
    });
    let prefs_writer = prefs_store.debounced(config.debounce());

    println!("💬 sitecraft chat (session {})", config.user_id);
    println!("   /approve approves the pending section, /quit exits\n");

    ensure_resumed(&session).await;
    drain(&mut events);

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        print!("> ");
        std::io::stdout().flush()?;

        let Some(line) = lines.next_line().await? else {
            break;
        };

        let input = parse_input(&line);
        if matches!(input, Input::Approve | Input::Message(_)) && !ensure_resumed(&session).await {
            println!("Not sent: the saved conversation could not be loaded.");
            drain(&mut events);
            continue;
        }

        match input {
            Input::Empty => continue,
            Input::Quit => break,
            Input::Approve => match session.approve_pending().await {
                Ok(section) => println!("✅ Approved section '{}'", section),
                Err(e @ ChatError::NoPendingPreview) => println!("{}", e.user_notice()),
                Err(e) => debug!("Approval failed: {}", e),
            },
            Input::Device(device) => {
                prefs.device = device;
                prefs_writer.update(prefs.clone());
                println!("Preview device: {:?}", device);
            }
            Input::Width(ratio) => {
                prefs = prefs.with_chat_width_ratio(ratio);
                prefs_writer.update(prefs.clone());
                println!("Chat pane width: {:.0}%", prefs.chat_width_ratio * 100.0);
            }
            Input::TogglePreview => {
                prefs.preview_visible = !prefs.preview_visible;
                prefs_writer.update(prefs.clone());
            }
            Input::Unknown(command) => println!("Unknown command: {}", command),
            Input::Message(text) => {
                if let Ok(report) = session.send_turn(text).await {
                    print_reply(&report);
                }
            }
        }
        drain(&mut events);
    }

    prefs_writer.close().await;
    println!("👋 Bye");
    Ok(())
}

/// Load the stored conversation if that has not happened yet.
///
/// Returns whether the session is ready for turns. Failures are already
/// published as notices by the session.
async fn ensure_resumed(session: &ConversationSession) -> bool {
    if session.is_loaded() {
        return true;
    }
    match session.resume().await {
        Ok(Some(report)) => print_reply(&report),
        Ok(None) => {}
        Err(e) => debug!("Resume failed: {}", e),
    }
    session.is_loaded()
}

fn print_reply(report: &TurnReport) {
    if !report.visible.is_empty() {
        println!("\n{}\n", report.visible);
    }
    for (kind, error) in &report.dispatch.failures {
        println!("⚠️  Could not apply {}: {}", kind, error);
    }
    if !report.persisted {
        println!("⚠️  Conversation not saved; it will be retried next turn");
    }
}

/// Render whatever the session published since the last call.
fn drain(events: &mut Receiver<SiteEvent>) {
    loop {
        match events.try_recv() {
            Ok(event) => render_event(&event),
            Err(TryRecvError::Lagged(skipped)) => warn!("Missed {} events", skipped),
            Err(_) => break,
        }
    }
}

fn render_event(event: &SiteEvent) {
    match event {
        SiteEvent::SystemNotice { message } => println!("⚠️  {}", message),
        SiteEvent::SitemapUpdated { pages } => {
            let names: Vec<_> = pages.iter().map(|p| p.name.as_str()).collect();
            println!("🗺️  Sitemap: {}", names.join(", "));
        }
        SiteEvent::PreviewSignal { signal } => match signal {
            PreviewSignal::RefreshPreview { url } => println!("🔄 Preview: {}", url),
            PreviewSignal::ShowApprovalControls { section } => {
                println!("📝 Section '{}' awaits approval (/approve)", section)
            }
            PreviewSignal::ShowFinalSite { url } => println!("🎉 Final site: {}", url),
            PreviewSignal::HideApprovalControls => {}
        },
        other => debug!("{:?}", other),
    }
}
