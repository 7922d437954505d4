//! Chat completion endpoint.

use craft_client::{ApiRequest, ClientError, ClientResult, ResilientClient};
use serde::Deserialize;
use serde_json::Value;
use tracing::debug;

use crate::error::ChatResult;
use crate::types::ConversationMessage;
use crate::wire::{paths, ChatRequest};

/// The assistant backend, seen as one POST per turn.
#[derive(Clone)]
pub struct ChatEndpoint {
    client: ResilientClient,
}

impl ChatEndpoint {
    pub fn new(client: ResilientClient) -> Self {
        Self { client }
    }

    /// Send the whole history and return the reply text.
    pub async fn complete(&self, messages: &[ConversationMessage]) -> ChatResult<String> {
        let request = ApiRequest::post_json(
            paths::CHAT,
            &ChatRequest {
                messages: messages.to_vec(),
            },
        )?;

        debug!("Requesting completion over {} messages", messages.len());
        let response = self.client.execute(&request).await?;
        Ok(extract_reply_text(&response)?)
    }
}

#[derive(Debug, Deserialize)]
struct ChatReply {
    content: Vec<ContentBlock>,
}

#[derive(Debug, Deserialize)]
struct ContentBlock {
    #[serde(rename = "type", default)]
    kind: Option<String>,
    #[serde(default)]
    text: Option<String>,
}

/// Pull the reply text out of a chat response.
///
/// The envelope must hold a non-empty `content` list whose first block
/// carries non-blank `text`.
pub fn extract_reply_text(response: &Value) -> ClientResult<String> {
    let reply = ChatReply::deserialize(response)
        .map_err(|e| ClientError::InvalidResponseShape(format!("chat reply: {}", e)))?;

    let first = reply
        .content
        .into_iter()
        .next()
        .ok_or_else(|| ClientError::InvalidResponseShape("empty content list".to_string()))?;

    match first.text {
        Some(text) if !text.trim().is_empty() => Ok(text),
        _ => Err(ClientError::InvalidResponseShape(format!(
            "first content block ({}) has no text",
            first.kind.as_deref().unwrap_or("untyped")
        ))),
    }
}
