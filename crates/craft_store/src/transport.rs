//! The storage contract served from a [`ProjectStore`].
//!
//! Routes requests the way the HTTP backend would, so a resilient client can
//! talk to local files without knowing it.

use async_trait::async_trait;
use craft_chat::wire::{
    paths, Ack, ConversationResponse, FinalizeRequest, MetadataRequest, MetadataResponse,
    PreviewRequest, PreviewResponse, SaveConversationRequest, SaveConversationResponse,
    SitemapRequest, SitemapResponse, StoredConversation, StylesRequest, StylesResponse,
    UserRequest,
};
use craft_client::{ApiRequest, ApiResponse, ClientResult, Method, Transport};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::json;
use tracing::{debug, warn};

use crate::error::StoreResult;
use crate::store::ProjectStore;

/// Answers storage requests from the local store.
///
/// Malformed bodies answer 400, unknown routes 404, and store failures the
/// status of the error. Chat requests are not served.
#[derive(Debug, Clone)]
pub struct StoreTransport {
    store: ProjectStore,
}

impl StoreTransport {
    pub fn new(store: ProjectStore) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &ProjectStore {
        &self.store
    }

    /// Route one request to the store.
    pub fn handle(&self, request: &ApiRequest) -> ApiResponse {
        let path = request.path.as_str();
        debug!("store: {:?} {}", request.method, path);

        match (request.method, path) {
            (Method::Post, paths::SITEMAP) => self.with_body(request, |body: SitemapRequest| {
                let sitemap = self.store.set_sitemap(&body.user_id, &body.pages)?;
                Ok(SitemapResponse {
                    success: true,
                    sitemap,
                })
            }),
            (Method::Post, paths::METADATA) => self.with_body(request, |body: MetadataRequest| {
                let metadata = self.store.merge_metadata(&body.user_id, &body.data)?;
                Ok(MetadataResponse {
                    success: true,
                    metadata,
                })
            }),
            (Method::Post, paths::STYLES) => self.with_body(request, |body: StylesRequest| {
                let styles = self.store.merge_styles(&body.user_id, &body.styles)?;
                Ok(StylesResponse {
                    success: true,
                    styles,
                })
            }),
            (Method::Post, paths::PREVIEW) => self.with_body(request, |body: PreviewRequest| {
                let preview_url = self
                    .store
                    .set_preview(&body.user_id, &body.section, &body.html)?;
                Ok(PreviewResponse {
                    success: true,
                    section: body.section,
                    preview_url,
                })
            }),
            (Method::Post, paths::PREVIEW_CLEAR) => self.with_body(request, |body: UserRequest| {
                self.store.clear_preview(&body.user_id)?;
                Ok(Ack { success: true })
            }),
            (Method::Post, paths::FINALIZE) => self.with_body(request, |body: FinalizeRequest| {
                self.store.finalize(&body.user_id, &body.html)?;
                Ok(Ack { success: true })
            }),
            (Method::Post, paths::CONVERSATION) => {
                self.with_body(request, |body: SaveConversationRequest| {
                    let message_count = self.store.save_conversation(
                        &body.user_id,
                        &body.messages,
                        body.approved_section.as_ref(),
                    )?;
                    Ok(SaveConversationResponse {
                        success: true,
                        message_count,
                    })
                })
            }
            (Method::Get, _) => match conversation_user(path) {
                Some(user_id) => respond(self.load_conversation(user_id)),
                None => not_found(path),
            },
            _ => not_found(path),
        }
    }

    fn load_conversation(&self, user_id: &str) -> StoreResult<ConversationResponse> {
        let (messages, approved_sections) = self.store.load_conversation(user_id)?;
        Ok(ConversationResponse {
            success: true,
            conversation: StoredConversation {
                message_count: messages.len(),
                messages,
                approved_sections,
            },
        })
    }

    fn with_body<B, R, F>(&self, request: &ApiRequest, handler: F) -> ApiResponse
    where
        B: DeserializeOwned,
        R: Serialize,
        F: FnOnce(B) -> StoreResult<R>,
    {
        let body = match request.body.clone().map(serde_json::from_value::<B>) {
            Some(Ok(body)) => body,
            Some(Err(e)) => return error_response(400, &format!("malformed body: {}", e)),
            None => return error_response(400, "missing body"),
        };
        respond(handler(body))
    }
}

#[async_trait]
impl Transport for StoreTransport {
    async fn send(&self, request: &ApiRequest) -> ClientResult<ApiResponse> {
        Ok(self.handle(request))
    }
}

/// `/api/conversation/{userId}` → `userId`
fn conversation_user(path: &str) -> Option<&str> {
    path.strip_prefix(paths::CONVERSATION)?
        .strip_prefix('/')
        .filter(|rest| !rest.is_empty() && !rest.contains('/'))
}

fn respond<R: Serialize>(result: StoreResult<R>) -> ApiResponse {
    match result {
        Ok(body) => match serde_json::to_value(&body) {
            Ok(value) => ApiResponse::json(200, &value),
            Err(e) => error_response(500, &e.to_string()),
        },
        Err(e) => {
            warn!("Store request failed: {}", e);
            error_response(e.status(), &e.to_string())
        }
    }
}

fn not_found(path: &str) -> ApiResponse {
    error_response(404, &format!("no route for {}", path))
}

fn error_response(status: u16, message: &str) -> ApiResponse {
    ApiResponse::json(status, &json!({"success": false, "error": message}))
}
