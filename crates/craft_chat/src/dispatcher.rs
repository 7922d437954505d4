//! Applies the commands found in one assistant reply.
//!
//! Commands run one at a time in a fixed order. A failing command is recorded
//! and the rest still run; the caller gets every outcome in one
//! [`DispatchReport`].

use std::sync::Arc;

use craft_tags::{detect, Command, DetectedTags, TagKind};
use parking_lot::Mutex;
use tracing::{info, warn};

use crate::error::{ChatError, ChatResult};
use crate::events::{EventBus, SiteEvent};
use crate::gateway::ProjectStateGateway;
use crate::preview::PreviewSynchronizer;

/// Outcome of dispatching one message.
#[derive(Debug, Default)]
pub struct DispatchReport {
    /// Kinds applied successfully, in application order
    pub applied: Vec<TagKind>,
    pub failures: Vec<(TagKind, ChatError)>,
    /// Kinds detected but deliberately not applied
    pub skipped: Vec<TagKind>,
}

impl DispatchReport {
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }

    /// Nothing was detected at all.
    pub fn is_empty(&self) -> bool {
        self.applied.is_empty() && self.failures.is_empty() && self.skipped.is_empty()
    }
}

/// Resolve detected tags into the commands to run, in order.
///
/// A clear-preview tag wins over a preview tag in the same message; the
/// preview is returned in the skipped list.
pub fn plan(tags: &DetectedTags) -> (Vec<Command>, Vec<TagKind>) {
    let mut skipped = Vec::new();
    let commands = tags
        .commands()
        .into_iter()
        .filter(|command| {
            let dropped = tags.clear_preview && matches!(command, Command::SetPreview { .. });
            if dropped {
                skipped.push(TagKind::Preview);
            }
            !dropped
        })
        .collect();
    (commands, skipped)
}

/// Runs commands against the project document and the preview surface.
pub struct CommandDispatcher {
    gateway: Arc<ProjectStateGateway>,
    preview: Arc<Mutex<PreviewSynchronizer>>,
    events: EventBus,
}

impl CommandDispatcher {
    pub fn new(
        gateway: Arc<ProjectStateGateway>,
        preview: Arc<Mutex<PreviewSynchronizer>>,
        events: EventBus,
    ) -> Self {
        Self {
            gateway,
            preview,
            events,
        }
    }

    /// Detect and apply every tag in `text`.
    pub async fn dispatch_text(&self, text: &str) -> DispatchReport {
        self.dispatch(&detect(text)).await
    }

    /// Apply detected tags in dispatch order, collecting failures.
    pub async fn dispatch(&self, tags: &DetectedTags) -> DispatchReport {
        let (commands, skipped) = plan(tags);
        for kind in &skipped {
            warn!("Ignoring {} tag: clear-preview in the same message", kind);
        }

        let mut report = DispatchReport {
            skipped,
            ..Default::default()
        };

        for command in &commands {
            let kind = command.kind();
            match self.apply(command).await {
                Ok(()) => report.applied.push(kind),
                Err(e) => {
                    warn!("Failed to apply {} command: {}", kind, e);
                    report.failures.push((kind, e));
                }
            }
        }

        if !report.is_empty() {
            info!(
                "Dispatched {} commands ({} failed, {} skipped)",
                report.applied.len() + report.failures.len(),
                report.failures.len(),
                report.skipped.len()
            );
        }
        report
    }

    /// Apply a single command and publish what changed.
    pub async fn apply(&self, command: &Command) -> ChatResult<()> {
        match command {
            Command::SetSitemap { pages } => {
                let pages = self.gateway.set_sitemap(pages).await?;
                self.events.publish(SiteEvent::SitemapUpdated { pages });
            }
            Command::MergeMetadata { entries } => {
                let metadata = self.gateway.merge_metadata(entries).await?;
                self.events.publish(SiteEvent::MetadataUpdated { metadata });
            }
            Command::MergeStyles { entries } => {
                let styles = self.gateway.merge_styles(entries).await?;
                self.events.publish(SiteEvent::StylesUpdated { styles });
            }
            Command::SetPreview { section, html } => {
                let receipt = self.gateway.set_preview(section, html).await?;
                let signals =
                    self.preview
                        .lock()
                        .set_preview(section, html, Some(&receipt.preview_url));
                self.events.publish(SiteEvent::PreviewUpdated {
                    section: receipt.section,
                    preview_url: receipt.preview_url,
                });
                self.events.publish_signals(signals);
            }
            Command::ClearPreview => {
                self.gateway.clear_preview().await?;
                let signals = self.preview.lock().clear();
                self.events.publish(SiteEvent::PreviewCleared);
                self.events.publish_signals(signals);
            }
            Command::RequestApprovedSections => {
                let sections = self.gateway.fetch_approved_sections().await?;
                self.preview.lock().sync_approved(sections.clone());
                self.events
                    .publish(SiteEvent::ApprovedSectionsLoaded { sections });
            }
            Command::GenerateFinalSite { html } => {
                self.gateway.finalize(html).await?;
                let signals = self.preview.lock().finalize();
                self.events.publish(SiteEvent::IndexGenerated);
                self.events.publish_signals(signals);
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use craft_client::{MockReply, ResilientClient, RetryConfig, ScriptedTransport};
    use serde_json::json;

    use crate::preview::{PreviewSignal, PreviewState};
    use crate::wire::paths;

    struct Fixture {
        transport: ScriptedTransport,
        dispatcher: CommandDispatcher,
        preview: Arc<Mutex<PreviewSynchronizer>>,
        events: EventBus,
    }

    fn fixture(transport: ScriptedTransport) -> Fixture {
        let client = ResilientClient::new(
            Arc::new(transport.clone()),
            RetryConfig::new().with_max_attempts(1),
        );
        let gateway = Arc::new(ProjectStateGateway::new(client, "u1"));
        let preview = Arc::new(Mutex::new(PreviewSynchronizer::new("/preview/u1")));
        let events = EventBus::default();
        Fixture {
            dispatcher: CommandDispatcher::new(gateway, preview.clone(), events.clone()),
            transport,
            preview,
            events,
        }
    }

    fn paths_called(transport: &ScriptedTransport) -> Vec<String> {
        transport.calls().into_iter().map(|c| c.path).collect()
    }

    #[test]
    fn test_plan_clear_wins() {
        let tags = detect("[PREVIEW: hero]<h1/>[/PREVIEW]\n[CLEAR_PREVIEW]");
        let (commands, skipped) = plan(&tags);
        assert_eq!(commands, vec![Command::ClearPreview]);
        assert_eq!(skipped, vec![TagKind::Preview]);
    }

    #[tokio::test]
    async fn test_fixed_order() {
        let transport = ScriptedTransport::new()
            .on(
                paths::SITEMAP,
                MockReply::json(json!({"success": true, "sitemap": []})),
            )
            .on(
                paths::METADATA,
                MockReply::json(json!({"success": true, "metadata": {"a": "1"}})),
            )
            .on(
                paths::STYLES,
                MockReply::json(json!({"success": true, "styles": {}})),
            )
            .on(
                paths::PREVIEW,
                MockReply::json(
                    json!({"success": true, "section": "hero", "previewUrl": "/preview/u1"}),
                ),
            );
        let f = fixture(transport);

        let text = "[PREVIEW: hero]<h1>Hi</h1>[/PREVIEW]\n[STYLES: font=Inter]\n\
                    [METADATA: a=1]\n[SITEMAP: Home]";
        let report = f.dispatcher.dispatch_text(text).await;

        assert!(report.is_clean());
        assert_eq!(
            report.applied,
            vec![
                TagKind::Sitemap,
                TagKind::Metadata,
                TagKind::Styles,
                TagKind::Preview
            ]
        );
        assert_eq!(
            paths_called(&f.transport),
            vec![paths::SITEMAP, paths::METADATA, paths::STYLES, paths::PREVIEW]
        );
        assert_eq!(f.preview.lock().pending().unwrap().section, "hero");
    }

    #[tokio::test]
    async fn test_failure_does_not_stop_later_commands() {
        let transport = ScriptedTransport::new()
            .on(paths::SITEMAP, MockReply::status(400, "bad"))
            .on(
                paths::STYLES,
                MockReply::json(json!({"success": true, "styles": {"font": "Inter"}})),
            );
        let f = fixture(transport);
        let mut rx = f.events.subscribe();

        let report = f
            .dispatcher
            .dispatch_text("[SITEMAP: Home]\n[STYLES: font=Inter]")
            .await;

        assert_eq!(report.applied, vec![TagKind::Styles]);
        assert_eq!(report.failures.len(), 1);
        assert_eq!(report.failures[0].0, TagKind::Sitemap);

        // Only the successful command produced an event
        assert!(matches!(
            rx.try_recv().unwrap(),
            SiteEvent::StylesUpdated { .. }
        ));
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_clear_preview_signals() {
        let f = fixture(ScriptedTransport::new());
        f.preview.lock().set_preview("hero", "x", None);
        let mut rx = f.events.subscribe();

        let report = f.dispatcher.dispatch_text("Starting over. [CLEAR_PREVIEW]").await;
        assert_eq!(report.applied, vec![TagKind::ClearPreview]);
        assert_eq!(f.preview.lock().state(), &PreviewState::Empty);

        assert_eq!(rx.try_recv().unwrap(), SiteEvent::PreviewCleared);
        assert_eq!(
            rx.try_recv().unwrap(),
            SiteEvent::PreviewSignal {
                signal: PreviewSignal::HideApprovalControls
            }
        );
    }

    #[tokio::test]
    async fn test_generate_index_runs_last() {
        let transport = ScriptedTransport::new().on(
            "/api/conversation/u1",
            MockReply::json(json!({"success": true, "conversation": {}})),
        );
        let f = fixture(transport);

        let report = f
            .dispatcher
            .dispatch_text("[GENERATE_INDEX]<html></html>[/GENERATE_INDEX] [GET_APPROVED_SECTIONS]")
            .await;

        assert_eq!(
            report.applied,
            vec![TagKind::GetApprovedSections, TagKind::GenerateIndex]
        );
        assert_eq!(f.preview.lock().state(), &PreviewState::Finalized);
    }

    #[tokio::test]
    async fn test_plain_text_dispatches_nothing() {
        let f = fixture(ScriptedTransport::new());
        let report = f.dispatcher.dispatch_text("Sounds good!").await;
        assert!(report.is_empty());
        assert_eq!(f.transport.call_count(), 0);
    }
}
