use std::time::Duration;

use reqwest::Method;
use serde::Serialize;
use tracing::{debug, info};

use crate::index::IndexRef;
use crate::models::{ClientStats, DumpInfo, Health, IndexInfo, Keys, Version};
use crate::task::{self, Task, TaskInfo, WaitOptions};
use crate::{ApiClient, ClientError};

/// Async Meilisearch client.
///
/// Owns the transport shared by every [`IndexRef`] it hands out. Call
/// [`MeiliClient::close`] when done, or let the last handle drop.
#[derive(Clone, Debug)]
pub struct MeiliClient {
    inner: ApiClient,
    wait_options: WaitOptions,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct CreateIndexRequest<'a> {
    uid: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    primary_key: Option<&'a str>,
}

impl MeiliClient {
    /// Creates a client for the server at `url` (for example `http://localhost:7700`).
    pub fn new(url: impl AsRef<str>) -> Result<Self, ClientError> {
        Ok(Self {
            inner: ApiClient::new(url)?,
            wait_options: WaitOptions::default(),
        })
    }

    /// Returns a new client sending `X-Meili-Api-Key: <key>` on every request.
    #[must_use]
    pub fn with_api_key(mut self, key: impl Into<String>) -> Self {
        self.inner = self.inner.with_api_key(key);
        self
    }

    /// Returns a new client applying `timeout` to every HTTP request.
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.inner = self.inner.with_timeout(timeout);
        self
    }

    /// Polling options used by operations that wait for their task.
    #[must_use]
    pub fn with_wait_options(mut self, options: WaitOptions) -> Self {
        self.wait_options = options;
        self
    }

    pub fn api_client(&self) -> &ApiClient {
        &self.inner
    }

    /// Releases the connection pool. Safe to call more than once.
    pub fn close(&self) {
        self.inner.close();
    }

    /// Local reference to an index; no request is sent.
    pub fn index(&self, uid: impl Into<String>) -> IndexRef {
        IndexRef::new(self.inner.clone(), uid, self.wait_options)
    }

    /// Polls the task until it is terminal, with the client's wait options.
    pub async fn wait_for_task(&self, task_uid: u64) -> Result<Task, ClientError> {
        self.wait_for_task_with(task_uid, &self.wait_options).await
    }

    pub async fn wait_for_task_with(
        &self,
        task_uid: u64,
        options: &WaitOptions,
    ) -> Result<Task, ClientError> {
        task::wait_for_task(&self.inner, task_uid, options).await
    }

    pub async fn get_task(&self, task_uid: u64) -> Result<Task, ClientError> {
        self.inner.get(&format!("tasks/{task_uid}")).await
    }

    /// Asks the server to create an index. Does not wait for the task.
    pub async fn create_index(
        &self,
        uid: &str,
        primary_key: Option<&str>,
    ) -> Result<TaskInfo, ClientError> {
        self.inner
            .post("indexes", &CreateIndexRequest { uid, primary_key })
            .await
    }

    /// Creates an index, waits for the task and returns the index metadata.
    pub async fn create_and_fetch_index(
        &self,
        uid: &str,
        primary_key: Option<&str>,
    ) -> Result<IndexInfo, ClientError> {
        let accepted = self.create_index(uid, primary_key).await?;
        self.wait_for_task(accepted.uid).await?.into_result()?;
        info!(uid, "created index");
        self.index(uid).fetch().await
    }

    pub async fn get_index(&self, uid: &str) -> Result<IndexInfo, ClientError> {
        self.index(uid).fetch().await
    }

    /// Like [`Self::get_index`], with a missing index as `None`.
    pub async fn get_raw_index(&self, uid: &str) -> Result<Option<IndexInfo>, ClientError> {
        match self.get_index(uid).await {
            Ok(info) => Ok(Some(info)),
            Err(error) if error.is_index_not_found() => Ok(None),
            Err(error) => Err(error),
        }
    }

    /// All indexes; no index at all is `None`.
    pub async fn get_indexes(&self) -> Result<Option<Vec<IndexInfo>>, ClientError> {
        let indexes: Vec<IndexInfo> = self.inner.get("indexes").await?;
        if indexes.is_empty() {
            Ok(None)
        } else {
            Ok(Some(indexes))
        }
    }

    /// Returns the index, creating it when the server reports `index_not_found`.
    pub async fn get_or_create_index(
        &self,
        uid: &str,
        primary_key: Option<&str>,
    ) -> Result<IndexInfo, ClientError> {
        match self.get_index(uid).await {
            Ok(info) => Ok(info),
            Err(error) if error.is_index_not_found() => {
                debug!(uid, "index not found, creating it");
                self.create_and_fetch_index(uid, primary_key).await
            }
            Err(error) => Err(error),
        }
    }

    pub async fn delete_index(&self, uid: &str) -> Result<TaskInfo, ClientError> {
        self.index(uid).delete().await
    }

    /// Deletes the index if it exists; see [`IndexRef::delete_if_exists`].
    pub async fn delete_index_if_exists(&self, uid: &str) -> Result<bool, ClientError> {
        self.index(uid).delete_if_exists().await
    }

    pub async fn get_all_stats(&self) -> Result<ClientStats, ClientError> {
        self.inner.get("stats").await
    }

    pub async fn create_dump(&self) -> Result<DumpInfo, ClientError> {
        self.inner.request(Method::POST, "dumps", &[], None).await
    }

    pub async fn get_dump_status(&self, uid: &str) -> Result<DumpInfo, ClientError> {
        self.inner.get(&format!("dumps/{uid}/status")).await
    }

    pub async fn get_keys(&self) -> Result<Keys, ClientError> {
        self.inner.get("keys").await
    }

    pub async fn get_version(&self) -> Result<Version, ClientError> {
        self.inner.get("version").await
    }

    pub async fn health(&self) -> Result<Health, ClientError> {
        self.inner.get("health").await
    }
}
