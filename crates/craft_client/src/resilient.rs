//! Bounded retry with per-attempt timeout.

use std::future::Future;
use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde_json::Value;
use tokio::time::{sleep, timeout};
use tracing::{debug, warn};

use crate::config::RetryConfig;
use crate::error::{ClientError, ClientResult};
use crate::transport::{ApiRequest, ApiResponse, Transport};

/// Executes requests with a timeout on every attempt and linear backoff
/// between retryable failures.
///
/// Cloning is cheap; clones share the transport.
#[derive(Clone)]
pub struct ResilientClient {
    transport: Arc<dyn Transport>,
    config: RetryConfig,
}

impl ResilientClient {
    pub fn new(transport: Arc<dyn Transport>, config: RetryConfig) -> Self {
        Self { transport, config }
    }

    pub fn config(&self) -> &RetryConfig {
        &self.config
    }

    /// Run an operation until it succeeds, fails fatally, or runs out of
    /// attempts.
    ///
    /// `op` receives the 1-based attempt number. An attempt that outlives the
    /// timeout is dropped, which aborts whatever it was awaiting.
    pub async fn run<T, F, Fut>(&self, label: &str, mut op: F) -> ClientResult<T>
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = ClientResult<T>>,
    {
        let max_attempts = self.config.attempts();
        let mut attempt = 1;

        loop {
            debug!("{}: attempt {}/{}", label, attempt, max_attempts);

            let outcome = match self.config.timeout() {
                Some(limit) => match timeout(limit, op(attempt)).await {
                    Ok(result) => result,
                    Err(_) => Err(ClientError::Timeout {
                        after_ms: self.config.timeout_ms,
                    }),
                },
                None => op(attempt).await,
            };

            match outcome {
                Ok(value) => return Ok(value),
                Err(e) if e.is_retryable() && attempt < max_attempts => {
                    let delay = self.config.delay_before(attempt + 1);
                    warn!(
                        "{}: attempt {}/{} failed ({}), retrying in {:?}",
                        label, attempt, max_attempts, e, delay
                    );
                    sleep(delay).await;
                    attempt += 1;
                }
                Err(e) => {
                    if e.is_retryable() {
                        warn!("{}: giving up after {} attempts: {}", label, attempt, e);
                    }
                    return Err(e);
                }
            }
        }
    }

    /// Send a request and return its JSON object payload.
    pub async fn execute(&self, request: &ApiRequest) -> ClientResult<Value> {
        let transport = &self.transport;
        self.run(&request.path, |_| async move {
            let response = transport.send(request).await?;
            validate_response(response)
        })
        .await
    }

    /// Send a request and decode the payload into the expected envelope.
    pub async fn execute_json<T: DeserializeOwned>(&self, request: &ApiRequest) -> ClientResult<T> {
        let value = self.execute(request).await?;
        serde_json::from_value(value).map_err(|e| {
            ClientError::InvalidResponseShape(format!("{}: {}", request.path, e))
        })
    }
}

/// Classify a raw response.
///
/// A 2xx response still fails when the body is empty, not JSON, or not a
/// JSON object.
pub fn validate_response(response: ApiResponse) -> ClientResult<Value> {
    if !response.is_success() {
        return Err(ClientError::from_status(response.status, response.body));
    }

    if response.body.trim().is_empty() {
        return Err(ClientError::InvalidResponseShape("empty body".to_string()));
    }

    let value: Value = serde_json::from_str(&response.body)
        .map_err(|e| ClientError::InvalidResponseShape(format!("body is not JSON: {}", e)))?;

    if !value.is_object() {
        return Err(ClientError::InvalidResponseShape(
            "expected a JSON object".to_string(),
        ));
    }

    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::MockTransport;
    use std::sync::atomic::{AtomicU32, Ordering};
    use tokio::time::{Duration, Instant};

    fn client_with(mock: MockTransport, config: RetryConfig) -> ResilientClient {
        ResilientClient::new(Arc::new(mock), config)
    }

    #[tokio::test(start_paused = true)]
    async fn test_server_errors_retried_until_success() {
        let calls = Arc::new(AtomicU32::new(0));
        let counter = calls.clone();

        let mut mock = MockTransport::new();
        mock.expect_send().times(3).returning(move |_| {
            let n = counter.fetch_add(1, Ordering::SeqCst) + 1;
            if n < 3 {
                Ok(ApiResponse::new(500, "boom"))
            } else {
                Ok(ApiResponse::new(200, r#"{"success": true}"#))
            }
        });

        let client = client_with(mock, RetryConfig::default());
        let started = Instant::now();
        let value = client.execute(&ApiRequest::get("/api/x")).await.unwrap();

        assert_eq!(value["success"], true);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        // 1x base before attempt 2, 2x base before attempt 3
        assert!(started.elapsed() >= Duration::from_millis(3_000));
    }

    #[tokio::test(start_paused = true)]
    async fn test_client_error_not_retried() {
        let mut mock = MockTransport::new();
        mock.expect_send()
            .times(1)
            .returning(|_| Ok(ApiResponse::new(404, "not found")));

        let client = client_with(mock, RetryConfig::default());
        let err = client.execute(&ApiRequest::get("/api/x")).await.unwrap_err();
        assert_eq!(
            err,
            ClientError::ClientRejected {
                status: 404,
                body: "not found".to_string()
            }
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_invalid_shape_not_retried() {
        let mut mock = MockTransport::new();
        mock.expect_send()
            .times(1)
            .returning(|_| Ok(ApiResponse::new(200, "")));

        let client = client_with(mock, RetryConfig::default());
        let err = client.execute(&ApiRequest::get("/api/x")).await.unwrap_err();
        assert!(matches!(err, ClientError::InvalidResponseShape(_)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_exhaustion_surfaces_last_failure() {
        let mut mock = MockTransport::new();
        mock.expect_send()
            .times(2)
            .returning(|_| Err(ClientError::ConnectionFailure("refused".into())));

        let client = client_with(mock, RetryConfig::new().with_max_attempts(2));
        let err = client.execute(&ApiRequest::get("/api/x")).await.unwrap_err();
        assert_eq!(err, ClientError::ConnectionFailure("refused".into()));
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_aborts_and_retries() {
        let client = ResilientClient::new(
            Arc::new(MockTransport::new()),
            RetryConfig::new().with_timeout_ms(50).with_base_delay_ms(10),
        );

        let value = client
            .run("slow", |attempt| async move {
                if attempt < 3 {
                    std::future::pending::<ClientResult<u32>>().await
                } else {
                    Ok(attempt)
                }
            })
            .await
            .unwrap();
        assert_eq!(value, 3);

        let err = client
            .run("stuck", |_| std::future::pending::<ClientResult<u32>>())
            .await
            .unwrap_err();
        assert_eq!(err, ClientError::Timeout { after_ms: 50 });
    }

    #[tokio::test]
    async fn test_execute_json_rejects_wrong_envelope() {
        #[derive(Debug, serde::Deserialize)]
        #[allow(dead_code)]
        struct Envelope {
            success: bool,
        }

        let mut mock = MockTransport::new();
        mock.expect_send()
            .times(1)
            .returning(|_| Ok(ApiResponse::new(200, r#"{"ok": 1}"#)));

        let client = client_with(mock, RetryConfig::default());
        let err = client
            .execute_json::<Envelope>(&ApiRequest::get("/api/x"))
            .await
            .unwrap_err();
        assert!(matches!(err, ClientError::InvalidResponseShape(_)));
    }

    #[test]
    fn test_validate_response_requires_object() {
        assert!(validate_response(ApiResponse::new(200, "[1,2]")).is_err());
        assert!(validate_response(ApiResponse::new(200, "not json")).is_err());
        assert!(validate_response(ApiResponse::new(201, "{}")).is_ok());
    }
}
