//! Async Rust client for the Meilisearch REST API.
//!
//! Public API layers:
//! - [`MeiliClient`]: top-level operations (indexes, stats, dumps, keys, health).
//! - [`IndexRef`]: operations on one index (documents, settings, search).
//! - [`ApiClient`]: the JSON transport shared by both.
//! - [`wait_for_task`]: polls an accepted task until it is terminal.
//! - [`ClientError`]: unified error type used by all clients.
//!
//! Mutating operations return a [`TaskInfo`] as soon as the server accepts
//! them. Waiting is always a separate step:
//!
//! ```no_run
//! # async fn run() -> Result<(), meilisearch_async_client::ClientError> {
//! use meilisearch_async_client::{MeiliClient, TaskStatus};
//!
//! let client = MeiliClient::new("http://localhost:7700")?.with_api_key("masterKey");
//! let accepted = client.create_index("movies", Some("id")).await?;
//! let task = client.wait_for_task(accepted.uid).await?;
//! assert_eq!(task.status, TaskStatus::Succeeded);
//! client.close();
//! # Ok(())
//! # }
//! ```

mod client;
pub mod documents;
mod error;
mod index;
mod meili_client;
mod models;
pub mod response;
mod settings;
pub mod task;
pub mod timestamp;

/// Generic async JSON REST transport.
pub use client::{API_KEY_HEADER, ApiClient, RequestBody};
/// Error types returned by all client operations.
pub use error::{ApiError, ClientError, ErrorCode};
pub use index::IndexRef;
pub use meili_client::MeiliClient;
pub use models::{
    ClientStats, DumpInfo, Health, IndexInfo, IndexStats, Keys, SearchQuery, SearchResults,
    Version,
};
pub use settings::{MinWordSizeForTypos, Settings, TypoTolerance};
pub use task::{PollInterval, Task, TaskInfo, TaskSource, TaskStatus, WaitOptions, wait_for_task};
