//! # craft_chat
//!
//! Conversation session, command dispatch and preview approval for
//! sitecraft.
//!
//! A [`ConversationSession`] runs one round trip per user turn: the whole
//! history goes to the assistant, the reply's command tags are applied by the
//! [`CommandDispatcher`] through the [`ProjectStateGateway`], the
//! [`PreviewSynchronizer`] tracks which section awaits approval, and the
//! history is persisted. Everything the UI needs to react to is published on
//! the [`EventBus`].
//!
//! # Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use craft_chat::{ChatEndpoint, ConversationSession, ProjectStateGateway, SiteConfig};
//! use craft_client::{HttpTransport, ResilientClient};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let mut config = SiteConfig::load(".")?;
//!     config.ensure_user_id();
//!
//!     let transport = Arc::new(HttpTransport::new(config.base_url()));
//!     let client = ResilientClient::new(transport, config.retry.clone());
//!     let session = ConversationSession::new(
//!         ChatEndpoint::new(client.clone()),
//!         Arc::new(ProjectStateGateway::new(client, config.user_id.clone())),
//!         config.preview_url(),
//!     );
//!
//!     session.resume().await?;
//!     let report = session.send_turn("A site for my bakery, please").await?;
//!     println!("{}", report.visible);
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod dispatcher;
pub mod error;
pub mod events;
pub mod gateway;
pub mod llm;
pub mod prefs;
pub mod preview;
pub mod session;
pub mod types;
pub mod wire;

pub use config::SiteConfig;
pub use dispatcher::{plan, CommandDispatcher, DispatchReport};
pub use error::{ChatError, ChatResult};
pub use events::{EventBus, SiteEvent};
pub use gateway::{PreviewReceipt, ProjectStateGateway};
pub use llm::{extract_reply_text, ChatEndpoint};
pub use prefs::{Debouncer, LayoutPreferences, PreferenceStore, PreviewDevice};
pub use preview::{PreviewSignal, PreviewState, PreviewSynchronizer};
pub use session::{ConversationSession, TurnReport, RESUME_INSTRUCTION};
pub use types::{
    is_valid_user_id, slugify, ApprovedSection, ApprovedSections, ConversationHistory, ConversationMessage, Page,
    PendingPreview, Role, SectionApproval,
};
