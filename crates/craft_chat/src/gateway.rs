//! Typed façade over the remote project document.
//!
//! One method per mutation, each a single round trip through the resilient
//! client. Merge semantics live on the storage side; the gateway only makes
//! sure the answer is a well-formed acknowledgement.

use craft_client::{ApiRequest, ClientError, ResilientClient};
use craft_tags::Entries;
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{debug, info};

use crate::error::ChatResult;
use crate::types::{ApprovedSections, ConversationMessage, Page, SectionApproval};
use crate::wire::{
    paths, Ack, Acknowledged, ConversationResponse, FinalizeRequest, MetadataRequest,
    MetadataResponse, PreviewRequest, PreviewResponse, SaveConversationRequest,
    SaveConversationResponse, SitemapRequest, SitemapResponse, StoredConversation, StylesRequest,
    StylesResponse, UserRequest,
};

/// Where storage put a freshly proposed section.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PreviewReceipt {
    pub section: String,
    pub preview_url: String,
}

/// Gateway to one session's project document.
pub struct ProjectStateGateway {
    client: ResilientClient,
    user_id: String,
}

impl ProjectStateGateway {
    pub fn new(client: ResilientClient, user_id: impl Into<String>) -> Self {
        Self {
            client,
            user_id: user_id.into(),
        }
    }

    /// Get the session identifier
    pub fn user_id(&self) -> &str {
        &self.user_id
    }

    /// Replace the sitemap with the given page names.
    pub async fn set_sitemap(&self, pages: &[String]) -> ChatResult<Vec<Page>> {
        let body = SitemapRequest {
            user_id: self.user_id.clone(),
            pages: pages.to_vec(),
        };
        let response: SitemapResponse = self.post(paths::SITEMAP, &body).await?;
        info!("Sitemap set to {} pages", response.sitemap.len());
        Ok(response.sitemap)
    }

    /// Merge entries into the metadata document; returns the merged map.
    pub async fn merge_metadata(&self, entries: &Entries) -> ChatResult<Entries> {
        let body = MetadataRequest {
            user_id: self.user_id.clone(),
            data: entries.clone(),
        };
        let response: MetadataResponse = self.post(paths::METADATA, &body).await?;
        Ok(response.metadata)
    }

    /// Merge entries into the styles document; returns the merged map.
    pub async fn merge_styles(&self, entries: &Entries) -> ChatResult<Entries> {
        let body = StylesRequest {
            user_id: self.user_id.clone(),
            styles: entries.clone(),
        };
        let response: StylesResponse = self.post(paths::STYLES, &body).await?;
        Ok(response.styles)
    }

    /// Store a section as the pending preview.
    pub async fn set_preview(&self, section: &str, html: &str) -> ChatResult<PreviewReceipt> {
        let body = PreviewRequest {
            user_id: self.user_id.clone(),
            section: section.to_string(),
            html: html.to_string(),
        };
        let response: PreviewResponse = self.post(paths::PREVIEW, &body).await?;
        Ok(PreviewReceipt {
            section: response.section,
            preview_url: response.preview_url,
        })
    }

    /// Drop the pending preview. Approved sections are untouched.
    pub async fn clear_preview(&self) -> ChatResult<()> {
        let body = UserRequest {
            user_id: self.user_id.clone(),
        };
        let _: Ack = self.post(paths::PREVIEW_CLEAR, &body).await?;
        Ok(())
    }

    /// Publish the generated site.
    pub async fn finalize(&self, html: &str) -> ChatResult<()> {
        let body = FinalizeRequest {
            user_id: self.user_id.clone(),
            html: html.to_string(),
        };
        let _: Ack = self.post(paths::FINALIZE, &body).await?;
        info!("Final site published for {}", self.user_id);
        Ok(())
    }

    /// Read the approved sections from the conversation document.
    pub async fn fetch_approved_sections(&self) -> ChatResult<ApprovedSections> {
        Ok(self.load_conversation().await?.approved_sections)
    }

    /// Read the whole conversation document.
    pub async fn load_conversation(&self) -> ChatResult<StoredConversation> {
        let path = paths::conversation_of(&self.user_id);
        let response: ConversationResponse =
            self.client.execute_json(&ApiRequest::get(&path)).await?;
        let response = ensure_success(&path, response)?;
        debug!(
            "Loaded conversation with {} messages",
            response.conversation.messages.len()
        );
        Ok(response.conversation)
    }

    /// Persist the full history, optionally recording an approval.
    ///
    /// Returns the stored message count.
    pub async fn save_conversation(
        &self,
        messages: &[ConversationMessage],
        approval: Option<&SectionApproval>,
    ) -> ChatResult<usize> {
        let body = SaveConversationRequest {
            user_id: self.user_id.clone(),
            messages: messages.to_vec(),
            approved_section: approval.cloned(),
        };
        let response: SaveConversationResponse = self.post(paths::CONVERSATION, &body).await?;
        Ok(response.message_count)
    }

    async fn post<B, R>(&self, path: &str, body: &B) -> ChatResult<R>
    where
        B: Serialize,
        R: DeserializeOwned + Acknowledged,
    {
        let request = ApiRequest::post_json(path, body)?;
        let response: R = self.client.execute_json(&request).await?;
        ensure_success(path, response)
    }
}

fn ensure_success<R: Acknowledged>(path: &str, response: R) -> ChatResult<R> {
    if response.success() {
        Ok(response)
    } else {
        Err(ClientError::InvalidResponseShape(format!("{} answered success=false", path)).into())
    }
}
