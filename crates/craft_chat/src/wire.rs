//! Request and response envelopes of the backend contract.
//!
//! Field names here are the wire contract; both the gateway and any storage
//! backend speak exactly these shapes.

use craft_tags::Entries;
use serde::{Deserialize, Serialize};

use crate::types::{ApprovedSections, ConversationMessage, Page, SectionApproval};

/// Endpoint paths, relative to the backend base URL.
pub mod paths {
    pub const CHAT: &str = "/api/chat";
    pub const SITEMAP: &str = "/api/sitemap";
    pub const METADATA: &str = "/api/metadata";
    pub const STYLES: &str = "/api/styles";
    pub const PREVIEW: &str = "/api/preview";
    pub const PREVIEW_CLEAR: &str = "/api/preview/clear";
    pub const FINALIZE: &str = "/api/finalize";
    pub const CONVERSATION: &str = "/api/conversation";

    /// `GET /api/conversation/{userId}`
    pub fn conversation_of(user_id: &str) -> String {
        format!("{}/{}", CONVERSATION, user_id)
    }
}

/// Storage responses all carry a `success` flag.
pub trait Acknowledged {
    fn success(&self) -> bool;
}

macro_rules! acknowledged {
    ($($ty:ty),* $(,)?) => {
        $(impl Acknowledged for $ty {
            fn success(&self) -> bool {
                self.success
            }
        })*
    };
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatRequest {
    pub messages: Vec<ConversationMessage>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SitemapRequest {
    pub user_id: String,
    pub pages: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SitemapResponse {
    pub success: bool,
    pub sitemap: Vec<Page>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MetadataRequest {
    pub user_id: String,
    pub data: Entries,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetadataResponse {
    pub success: bool,
    pub metadata: Entries,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StylesRequest {
    pub user_id: String,
    pub styles: Entries,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StylesResponse {
    pub success: bool,
    pub styles: Entries,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PreviewRequest {
    pub user_id: String,
    pub section: String,
    pub html: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PreviewResponse {
    pub success: bool,
    pub section: String,
    pub preview_url: String,
}

/// Body of requests that only identify the session (clear preview).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserRequest {
    pub user_id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FinalizeRequest {
    pub user_id: String,
    pub html: String,
}

/// Bare `{success}` acknowledgement.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Ack {
    pub success: bool,
}

/// Persisted conversation document.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredConversation {
    #[serde(default)]
    pub messages: Vec<ConversationMessage>,
    #[serde(default)]
    pub approved_sections: ApprovedSections,
    #[serde(default)]
    pub message_count: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversationResponse {
    pub success: bool,
    pub conversation: StoredConversation,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SaveConversationRequest {
    pub user_id: String,
    pub messages: Vec<ConversationMessage>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub approved_section: Option<SectionApproval>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SaveConversationResponse {
    pub success: bool,
    pub message_count: usize,
}

acknowledged!(
    SitemapResponse,
    MetadataResponse,
    StylesResponse,
    PreviewResponse,
    Ack,
    ConversationResponse,
    SaveConversationResponse,
);
