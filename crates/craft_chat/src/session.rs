//! Conversation session.
//!
//! Owns the message history and runs one round trip per user turn:
//! compose the request, call the assistant, dispatch the reply's commands,
//! then persist the history.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use craft_tags::strip_tags;
use parking_lot::Mutex;
use tokio::sync::broadcast;
use tracing::{debug, info, warn};

use crate::dispatcher::{CommandDispatcher, DispatchReport};
use crate::error::{ChatError, ChatResult};
use crate::events::{EventBus, SiteEvent};
use crate::gateway::ProjectStateGateway;
use crate::llm::ChatEndpoint;
use crate::preview::{PreviewState, PreviewSynchronizer};
use crate::types::{
    ApprovedSections, ConversationHistory, ConversationMessage, PendingPreview, SectionApproval,
};

/// Sent on resumption so the assistant rebuilds its picture of the project.
pub const RESUME_INSTRUCTION: &str = "The user has returned to continue an earlier session. \
Re-establish context from the persisted project state (sitemap, metadata, styles and approved \
sections), briefly summarize where the site stands, and suggest the next step.";

/// Result of one completed turn.
#[derive(Debug)]
pub struct TurnReport {
    /// Raw assistant reply, tags included
    pub reply: String,
    /// Reply as shown to the user
    pub visible: String,
    pub dispatch: DispatchReport,
    /// Whether the history reached storage
    pub persisted: bool,
}

/// Releases the single-flight flag on every exit path.
struct FlightGuard<'a> {
    flag: &'a AtomicBool,
}

impl<'a> FlightGuard<'a> {
    fn acquire(flag: &'a AtomicBool) -> ChatResult<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .map_err(|_| ChatError::TurnInFlight)?;
        Ok(Self { flag })
    }
}

impl Drop for FlightGuard<'_> {
    fn drop(&mut self) {
        self.flag.store(false, Ordering::Release);
    }
}

/// One user's conversation with the assistant.
///
/// At most one turn (or approval) is in flight at a time; a second caller
/// gets [`ChatError::TurnInFlight`] instead of waiting.
///
/// Turns and approvals are refused with [`ChatError::HistoryNotLoaded`]
/// until [`resume`](Self::resume) has read the stored conversation, since
/// every save replaces the stored message list.
pub struct ConversationSession {
    endpoint: ChatEndpoint,
    gateway: Arc<ProjectStateGateway>,
    dispatcher: CommandDispatcher,
    preview: Arc<Mutex<PreviewSynchronizer>>,
    events: EventBus,
    history: Mutex<ConversationHistory>,
    in_flight: AtomicBool,
    loaded: AtomicBool,
}

impl ConversationSession {
    /// Create a session with an empty history.
    pub fn new(
        endpoint: ChatEndpoint,
        gateway: Arc<ProjectStateGateway>,
        preview_url: impl Into<String>,
    ) -> Self {
        let events = EventBus::default();
        let preview = Arc::new(Mutex::new(PreviewSynchronizer::new(preview_url)));
        let dispatcher = CommandDispatcher::new(gateway.clone(), preview.clone(), events.clone());

        Self {
            endpoint,
            gateway,
            dispatcher,
            preview,
            events,
            history: Mutex::new(ConversationHistory::new()),
            in_flight: AtomicBool::new(false),
            loaded: AtomicBool::new(false),
        }
    }

    pub fn user_id(&self) -> &str {
        self.gateway.user_id()
    }

    pub fn events(&self) -> &EventBus {
        &self.events
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SiteEvent> {
        self.events.subscribe()
    }

    /// Snapshot of the history.
    pub fn history(&self) -> ConversationHistory {
        self.history.lock().clone()
    }

    pub fn is_busy(&self) -> bool {
        self.in_flight.load(Ordering::Acquire)
    }

    /// Whether the stored conversation has been read into this session.
    pub fn is_loaded(&self) -> bool {
        self.loaded.load(Ordering::Acquire)
    }

    pub fn preview_state(&self) -> PreviewState {
        self.preview.lock().state().clone()
    }

    pub fn pending_preview(&self) -> Option<PendingPreview> {
        self.preview.lock().pending().cloned()
    }

    pub fn approved_sections(&self) -> ApprovedSections {
        self.preview.lock().approved_sections().clone()
    }

    /// Run one user turn.
    ///
    /// The user message and the reply are appended together once the reply
    /// arrives; a failed turn leaves the history untouched.
    pub async fn send_turn(&self, text: &str) -> ChatResult<TurnReport> {
        let _guard = FlightGuard::acquire(&self.in_flight)?;
        self.require_loaded()?;
        let outcome = self.run_turn(ConversationMessage::user(text)).await;
        self.surface(outcome)
    }

    /// Pick up a previous conversation.
    ///
    /// Loads the persisted history once. If it holds messages, a resumption
    /// instruction is sent as a turn and its report is returned; an empty
    /// store or an already loaded session returns `None`. A failed load
    /// leaves the session unloaded so the call can be repeated.
    pub async fn resume(&self) -> ChatResult<Option<TurnReport>> {
        let _guard = FlightGuard::acquire(&self.in_flight)?;
        if self.is_loaded() {
            debug!("History already loaded, nothing to resume");
            return Ok(None);
        }

        let stored = match self.gateway.load_conversation().await {
            Ok(stored) => stored,
            Err(e) => return self.surface(Err(e)),
        };
        self.preview.lock().sync_approved(stored.approved_sections);

        if stored.messages.is_empty() {
            info!("Starting a new conversation for {}", self.user_id());
            self.loaded.store(true, Ordering::Release);
            return Ok(None);
        }

        info!(
            "Resuming conversation for {} ({} messages)",
            self.user_id(),
            stored.messages.len()
        );
        *self.history.lock() = ConversationHistory::from_messages(stored.messages);
        self.loaded.store(true, Ordering::Release);

        let outcome = self
            .run_turn(ConversationMessage::system(RESUME_INSTRUCTION))
            .await;
        self.surface(outcome).map(Some)
    }

    /// Approve the section awaiting approval.
    ///
    /// The approval is persisted before it is committed locally, so a failed
    /// save leaves the section pending. Returns the approved section name.
    pub async fn approve_pending(&self) -> ChatResult<String> {
        let _guard = FlightGuard::acquire(&self.in_flight)?;
        self.require_loaded()?;
        let pending = self
            .preview
            .lock()
            .pending()
            .cloned()
            .ok_or(ChatError::NoPendingPreview)?;

        let approval = SectionApproval {
            section: pending.section.clone(),
            html: pending.html,
        };
        let messages = self.history.lock().messages().to_vec();
        let saved = self
            .gateway
            .save_conversation(&messages, Some(&approval))
            .await;
        self.surface(saved)?;

        let signals = self.preview.lock().approve(&approval.section)?;
        self.events.publish(SiteEvent::SectionApproved {
            section: approval.section.clone(),
        });
        self.events.publish_signals(signals);
        Ok(approval.section)
    }

    fn require_loaded(&self) -> ChatResult<()> {
        if self.is_loaded() {
            Ok(())
        } else {
            Err(ChatError::HistoryNotLoaded)
        }
    }

    async fn run_turn(&self, message: ConversationMessage) -> ChatResult<TurnReport> {
        let mut messages = self.history.lock().messages().to_vec();
        messages.push(message.clone());

        let reply = self.endpoint.complete(&messages).await?;
        {
            let mut history = self.history.lock();
            history.append(message);
            history.append(ConversationMessage::assistant(reply.clone()));
        }

        let dispatch = self.dispatcher.dispatch_text(&reply).await;
        let persisted = self.persist().await;

        Ok(TurnReport {
            visible: strip_tags(&reply),
            reply,
            dispatch,
            persisted,
        })
    }

    async fn persist(&self) -> bool {
        let messages = self.history.lock().messages().to_vec();
        match self.gateway.save_conversation(&messages, None).await {
            Ok(count) => {
                debug!("Persisted {} messages", count);
                true
            }
            Err(e) => {
                warn!("Failed to persist conversation: {}", e);
                false
            }
        }
    }

    /// Publish a fatal failure as a notice before handing it back.
    fn surface<T>(&self, outcome: ChatResult<T>) -> ChatResult<T> {
        if let Err(e) = &outcome {
            warn!("Turn failed: {}", e);
            self.events.publish(SiteEvent::notice(e.user_notice()));
        }
        outcome
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use craft_client::{ClientError, MockReply, ResilientClient, RetryConfig, ScriptedTransport};
    use serde_json::json;
    use std::time::Duration;

    use crate::wire::paths;

    fn session(transport: &ScriptedTransport) -> ConversationSession {
        let client = ResilientClient::new(
            Arc::new(transport.clone()),
            RetryConfig::new().with_base_delay_ms(10).with_timeout_ms(5_000),
        );
        ConversationSession::new(
            ChatEndpoint::new(client.clone()),
            Arc::new(ProjectStateGateway::new(client, "u1")),
            "/preview/u1",
        )
    }

    fn reply(text: &str) -> MockReply {
        MockReply::json(json!({"content": [{"type": "text", "text": text}]}))
    }

    fn empty_conversation() -> MockReply {
        MockReply::json(json!({"success": true, "conversation": {"messages": []}}))
    }

    /// A session whose (empty) stored conversation has been loaded.
    async fn loaded(transport: &ScriptedTransport) -> ConversationSession {
        transport.push("/api/conversation/u1", empty_conversation());
        let session = session(transport);
        assert!(session.resume().await.unwrap().is_none());
        session
    }

    #[tokio::test]
    async fn test_turn_appends_and_persists() {
        let transport = ScriptedTransport::new()
            .on(paths::CHAT, reply("Hello! [CLEAR_PREVIEW]"))
            .on(paths::CONVERSATION, MockReply::json(json!({"success": true, "messageCount": 2})));
        let session = loaded(&transport).await;

        let report = session.send_turn("hi").await.unwrap();
        assert_eq!(report.visible, "Hello!");
        assert!(report.persisted);

        let history = session.history();
        assert_eq!(history.len(), 2);
        assert_eq!(history.messages()[0].content, "hi");
        assert_eq!(history.messages()[1].content, "Hello! [CLEAR_PREVIEW]");

        let saved = transport.calls_to(paths::CONVERSATION);
        assert_eq!(saved.len(), 1);
        assert_eq!(saved[0].body.as_ref().unwrap()["messages"].as_array().unwrap().len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_turn_publishes_notice_and_releases_guard() {
        let transport = ScriptedTransport::new()
            .on(paths::CHAT, MockReply::status(400, "bad request"))
            .on(paths::CHAT, reply("Recovered"));
        let session = loaded(&transport).await;
        let mut rx = session.subscribe();

        let err = session.send_turn("hi").await.unwrap_err();
        assert!(matches!(
            err,
            ChatError::Client(ClientError::ClientRejected { status: 400, .. })
        ));
        assert!(session.history().is_empty());
        assert!(!session.is_busy());
        assert!(matches!(
            rx.try_recv().unwrap(),
            SiteEvent::SystemNotice { .. }
        ));

        session.send_turn("hi again").await.unwrap();
        assert_eq!(session.history().len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_concurrent_turn_rejected() {
        let transport = ScriptedTransport::new().on(
            paths::CHAT,
            reply("slow").delayed(Duration::from_millis(500)),
        );
        let session = loaded(&transport).await;

        let (first, second) = tokio::join!(session.send_turn("one"), session.send_turn("two"));
        assert!(first.is_ok());
        assert!(matches!(second, Err(ChatError::TurnInFlight)));
        assert_eq!(transport.calls_to(paths::CHAT).len(), 1);
        assert_eq!(session.history().len(), 2);
    }

    #[tokio::test]
    async fn test_approve_without_pending() {
        let transport = ScriptedTransport::new();
        let session = loaded(&transport).await;
        transport.clear_calls();

        assert!(matches!(
            session.approve_pending().await,
            Err(ChatError::NoPendingPreview)
        ));
        assert_eq!(transport.call_count(), 0);
        assert!(!session.is_busy());
    }

    #[tokio::test]
    async fn test_approve_failure_keeps_pending() {
        let transport = ScriptedTransport::new()
            .on(paths::CHAT, reply("[PREVIEW: hero]<h1>Hi</h1>[/PREVIEW]"))
            .on(
                paths::PREVIEW,
                MockReply::json(
                    json!({"success": true, "section": "hero", "previewUrl": "/preview/u1"}),
                ),
            )
            .on(paths::CONVERSATION, MockReply::json(json!({"success": true, "messageCount": 2})))
            .on(paths::CONVERSATION, MockReply::status(422, "rejected"));
        let session = loaded(&transport).await;

        session.send_turn("make a hero").await.unwrap();
        assert!(session.approve_pending().await.is_err());
        assert_eq!(session.pending_preview().unwrap().section, "hero");
        assert!(session.approved_sections().is_empty());
    }

    #[tokio::test]
    async fn test_resume_fresh_session() {
        let transport = ScriptedTransport::new().on("/api/conversation/u1", empty_conversation());
        let session = session(&transport);

        assert!(!session.is_loaded());
        assert!(session.resume().await.unwrap().is_none());
        assert!(session.is_loaded());
        assert!(session.history().is_empty());
        assert!(transport.calls_to(paths::CHAT).is_empty());
    }

    #[tokio::test]
    async fn test_turn_refused_before_resume() {
        let transport = ScriptedTransport::new();
        let session = session(&transport);

        assert!(matches!(
            session.send_turn("hi").await,
            Err(ChatError::HistoryNotLoaded)
        ));
        assert!(matches!(
            session.approve_pending().await,
            Err(ChatError::HistoryNotLoaded)
        ));
        assert_eq!(transport.call_count(), 0);
        assert!(!session.is_busy());
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_resume_can_be_repeated() {
        let transport = ScriptedTransport::new();
        for _ in 0..3 {
            transport.push("/api/conversation/u1", MockReply::status(503, "down"));
        }
        transport.push("/api/conversation/u1", empty_conversation());
        let session = session(&transport);

        assert!(session.resume().await.is_err());
        assert!(!session.is_loaded());
        assert!(matches!(
            session.send_turn("hi").await,
            Err(ChatError::HistoryNotLoaded)
        ));
        assert!(transport.calls_to(paths::CONVERSATION).is_empty());

        assert!(session.resume().await.unwrap().is_none());
        assert!(session.is_loaded());
    }
}
