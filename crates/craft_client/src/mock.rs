//! Scripted transport for testing.
//!
//! Provides a configurable [`Transport`] that returns predefined replies per
//! path and records every request, for use in tests without a backend.

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::RwLock;
use serde_json::Value;

use crate::error::{ClientError, ClientResult};
use crate::transport::{ApiRequest, ApiResponse, Transport};

/// Predefined reply for one request.
#[derive(Debug, Clone)]
pub enum MockReply {
    /// Respond with a status and raw body
    Respond(ApiResponse),
    /// Fail at the connection level
    Fail(ClientError),
    /// Never answer (exercises timeouts)
    Hang,
    /// Wait before producing the inner reply
    Delayed(Duration, Box<MockReply>),
}

impl MockReply {
    /// 200 with a JSON body.
    pub fn json(value: Value) -> Self {
        Self::Respond(ApiResponse::json(200, &value))
    }

    /// Arbitrary status with a raw body.
    pub fn status(status: u16, body: impl Into<String>) -> Self {
        Self::Respond(ApiResponse::new(status, body))
    }

    pub fn connection_failure(message: impl Into<String>) -> Self {
        Self::Fail(ClientError::ConnectionFailure(message.into()))
    }

    pub fn delayed(self, delay: Duration) -> Self {
        Self::Delayed(delay, Box::new(self))
    }
}

/// Scripted transport.
///
/// Replies are queued per path and consumed in order. A path with no queued
/// reply answers `200 {"success": true}`.
#[derive(Clone, Default)]
pub struct ScriptedTransport {
    /// Queued replies keyed by request path.
    replies: Arc<RwLock<HashMap<String, VecDeque<MockReply>>>>,
    /// Captured requests for verification.
    captured: Arc<RwLock<Vec<ApiRequest>>>,
}

impl ScriptedTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a reply for the next request to `path`.
    pub fn on(self, path: impl Into<String>, reply: MockReply) -> Self {
        self.push(path, reply);
        self
    }

    /// Queue a reply without consuming the transport.
    pub fn push(&self, path: impl Into<String>, reply: MockReply) {
        self.replies
            .write()
            .entry(path.into())
            .or_default()
            .push_back(reply);
    }

    /// Get all captured requests.
    pub fn calls(&self) -> Vec<ApiRequest> {
        self.captured.read().clone()
    }

    /// Get captured requests to a specific path.
    pub fn calls_to(&self, path: &str) -> Vec<ApiRequest> {
        self.captured
            .read()
            .iter()
            .filter(|r| r.path == path)
            .cloned()
            .collect()
    }

    pub fn call_count(&self) -> usize {
        self.captured.read().len()
    }

    /// Clear all captured requests.
    pub fn clear_calls(&self) {
        self.captured.write().clear();
    }

    fn next_reply(&self, path: &str) -> MockReply {
        self.replies
            .write()
            .get_mut(path)
            .and_then(VecDeque::pop_front)
            .unwrap_or_else(|| MockReply::json(serde_json::json!({ "success": true })))
    }
}

#[async_trait]
impl Transport for ScriptedTransport {
    async fn send(&self, request: &ApiRequest) -> ClientResult<ApiResponse> {
        self.captured.write().push(request.clone());

        let mut reply = self.next_reply(&request.path);
        loop {
            match reply {
                MockReply::Respond(response) => return Ok(response),
                MockReply::Fail(e) => return Err(e),
                MockReply::Hang => return std::future::pending().await,
                MockReply::Delayed(delay, inner) => {
                    tokio::time::sleep(delay).await;
                    reply = *inner;
                }
            }
        }
    }
}
