//! # craft_client
//!
//! Resilient request layer for sitecraft.
//!
//! Every outward call (chat turns and project storage) goes through a
//! [`ResilientClient`], which applies a per-attempt timeout and a bounded,
//! linearly backed-off retry to retryable failures only.
//!
//! # Features
//!
//! - **Transport seam**: [`Transport`] trait with an HTTP implementation
//! - **Failure taxonomy**: timeouts, connection failures and 5xx are retried;
//!   4xx and malformed payloads are fatal
//! - **Envelope validation**: empty or non-object payloads never count as
//!   success
//! - **Scripted transport**: for testing without a backend
//!
//! # Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use craft_client::{ApiRequest, HttpTransport, ResilientClient, RetryConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let transport = Arc::new(HttpTransport::new("http://localhost:3000"));
//!     let client = ResilientClient::new(transport, RetryConfig::default());
//!
//!     let reply = client.execute(&ApiRequest::get("/api/conversation/demo")).await?;
//!     println!("{}", reply);
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod error;
pub mod mock;
pub mod resilient;
pub mod transport;

pub use config::RetryConfig;
pub use error::{ClientError, ClientResult};
pub use mock::{MockReply, ScriptedTransport};
pub use resilient::{validate_response, ResilientClient};
pub use transport::{ApiRequest, ApiResponse, HttpTransport, Method, Transport};
