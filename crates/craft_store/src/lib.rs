//! # craft_store
//!
//! Local filesystem backend for sitecraft project state.
//!
//! [`ProjectStore`] keeps one directory of JSON documents per session and
//! applies the merge-on-write rules of the storage contract.
//! [`StoreTransport`] serves that contract through the same
//! [`craft_client::Transport`] seam the HTTP backend uses, so a
//! `ProjectStateGateway` can run entirely offline.
//!
//! # Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use craft_chat::ProjectStateGateway;
//! use craft_client::{ResilientClient, RetryConfig};
//! use craft_store::{ProjectStore, StoreTransport};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let transport = StoreTransport::new(ProjectStore::new(".sitecraft/store"));
//!     let client = ResilientClient::new(Arc::new(transport), RetryConfig::default());
//!     let gateway = ProjectStateGateway::new(client, "demo");
//!
//!     let pages = gateway.set_sitemap(&["Home".into(), "Contact".into()]).await?;
//!     println!("{} pages", pages.len());
//!     Ok(())
//! }
//! ```

pub mod error;
pub mod store;
pub mod transport;

pub use error::{StoreError, StoreResult};
pub use store::{ProjectSnapshot, ProjectStore};
pub use transport::StoreTransport;
