use std::collections::HashMap;
use std::path::Path;

use reqwest::Method;
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::{debug, info};
use url::form_urlencoded::byte_serialize;

use crate::client::{ApiClient, RequestBody};
use crate::documents::{self, DocumentFormat};
use crate::error::ErrorCode;
use crate::models::{IndexInfo, IndexStats, SearchQuery, SearchResults};
use crate::settings::{Settings, TypoTolerance};
use crate::task::{self, Task, TaskInfo, TaskStatus, WaitOptions};
use crate::ClientError;

/// Local reference to an index.
///
/// Building one performs no I/O; it holds the index uid and a clone of the
/// shared transport. Use [`IndexRef::fetch`] to read the index metadata.
#[derive(Clone, Debug)]
pub struct IndexRef {
    uid: String,
    client: ApiClient,
    wait_options: WaitOptions,
}

#[derive(Clone, Copy, Debug)]
enum DocumentWrite {
    Add,
    Update,
}

impl DocumentWrite {
    fn method(self) -> Method {
        match self {
            Self::Add => Method::POST,
            Self::Update => Method::PUT,
        }
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct UpdateIndexRequest<'a> {
    primary_key: &'a str,
}

impl IndexRef {
    pub(crate) fn new(client: ApiClient, uid: impl Into<String>, wait_options: WaitOptions) -> Self {
        Self {
            uid: uid.into(),
            client,
            wait_options,
        }
    }

    pub fn uid(&self) -> &str {
        &self.uid
    }

    pub fn client(&self) -> &ApiClient {
        &self.client
    }

    /// Waits for a task using the options this reference was created with.
    pub async fn wait_for_task(&self, task_uid: u64) -> Result<Task, ClientError> {
        task::wait_for_task(&self.client, task_uid, &self.wait_options).await
    }

    /// Reads the index metadata.
    pub async fn fetch(&self) -> Result<IndexInfo, ClientError> {
        self.client.get(&self.path("")).await
    }

    pub async fn get_primary_key(&self) -> Result<Option<String>, ClientError> {
        Ok(self.fetch().await?.primary_key)
    }

    /// Sets the primary key of the index.
    pub async fn update(&self, primary_key: &str) -> Result<TaskInfo, ClientError> {
        self.client
            .put(&self.path(""), &UpdateIndexRequest { primary_key })
            .await
    }

    /// Sets the primary key, waits for the task and returns the refreshed metadata.
    pub async fn update_and_fetch(&self, primary_key: &str) -> Result<IndexInfo, ClientError> {
        let accepted = self.update(primary_key).await?;
        self.wait_for_task(accepted.uid).await?.into_result()?;
        self.fetch().await
    }

    pub async fn delete(&self) -> Result<TaskInfo, ClientError> {
        self.client.delete(&self.path("")).await
    }

    /// Deletes the index and waits for the deletion.
    ///
    /// Returns `false` when the server reports `index_not_found`, either on
    /// the request or on the deletion task. Every other error is returned.
    pub async fn delete_if_exists(&self) -> Result<bool, ClientError> {
        let accepted = match self.delete().await {
            Ok(accepted) => accepted,
            Err(error) if error.is_index_not_found() => {
                debug!(uid = %self.uid, "index to delete does not exist");
                return Ok(false);
            }
            Err(error) => return Err(error),
        };

        let task = self.wait_for_task(accepted.uid).await?;
        if task.status == TaskStatus::Succeeded {
            info!(uid = %self.uid, "deleted index");
            return Ok(true);
        }
        let not_found = task
            .error
            .as_ref()
            .is_some_and(|error| error.code == ErrorCode::IndexNotFound);
        if not_found {
            Ok(false)
        } else {
            Err(ClientError::TaskFailed(Box::new(task)))
        }
    }

    pub async fn get_stats(&self) -> Result<IndexStats, ClientError> {
        self.client.get(&self.path("/stats")).await
    }

    pub async fn search<T: DeserializeOwned>(
        &self,
        query: &SearchQuery,
    ) -> Result<SearchResults<T>, ClientError> {
        self.client.post(&self.path("/search"), query).await
    }

    pub async fn get_document<T: DeserializeOwned>(&self, document_id: &str) -> Result<T, ClientError> {
        let path = format!(
            "{}/{}",
            self.path("/documents"),
            encode_path_segment(document_id)
        );
        self.client.get(&path).await
    }

    /// Reads a page of documents; an empty page is `None`.
    ///
    /// `attributes_to_retrieve` restricts the returned fields when set.
    pub async fn get_documents<T: DeserializeOwned>(
        &self,
        offset: usize,
        limit: usize,
        attributes_to_retrieve: Option<&[&str]>,
    ) -> Result<Option<Vec<T>>, ClientError> {
        let offset = offset.to_string();
        let limit = limit.to_string();
        let attributes = attributes_to_retrieve.map(|attributes| attributes.join(","));
        let mut query = vec![("offset", offset.as_str()), ("limit", limit.as_str())];
        if let Some(attributes) = &attributes {
            query.push(("attributesToRetrieve", attributes.as_str()));
        }

        let documents: Vec<T> = self
            .client
            .get_with_query(&self.path("/documents"), &query)
            .await?;
        Ok(non_empty(documents))
    }

    /// Adds documents, replacing existing ones with the same primary key.
    ///
    /// `primary_key` is ignored by the server when the index already has one.
    pub async fn add_documents<T: Serialize>(
        &self,
        documents: &[T],
        primary_key: Option<&str>,
    ) -> Result<TaskInfo, ClientError> {
        self.write_documents(DocumentWrite::Add, documents, primary_key)
            .await
    }

    /// Adds documents in requests of at most `batch_size` documents.
    pub async fn add_documents_in_batches<T: Serialize>(
        &self,
        documents: &[T],
        batch_size: usize,
        primary_key: Option<&str>,
    ) -> Result<Vec<TaskInfo>, ClientError> {
        self.write_in_batches(DocumentWrite::Add, documents, batch_size, primary_key)
            .await
    }

    /// Adds documents in as few requests as `max_payload_size` bytes allow.
    pub async fn add_documents_auto_batch<T: Serialize>(
        &self,
        documents: &[T],
        max_payload_size: usize,
        primary_key: Option<&str>,
    ) -> Result<Vec<TaskInfo>, ClientError> {
        self.write_auto_batch(DocumentWrite::Add, documents, max_payload_size, primary_key)
            .await
    }

    /// Adds documents read from a json, ndjson or csv file.
    pub async fn add_documents_from_file(
        &self,
        path: &Path,
        primary_key: Option<&str>,
    ) -> Result<TaskInfo, ClientError> {
        let documents = documents::load_documents_from_file(path).await?;
        self.add_documents(&documents, primary_key).await
    }

    /// Uploads a csv or ndjson file without parsing it.
    pub async fn add_documents_from_raw_file(
        &self,
        path: &Path,
        primary_key: Option<&str>,
    ) -> Result<TaskInfo, ClientError> {
        self.write_raw_file(DocumentWrite::Add, path, primary_key)
            .await
    }

    /// Adds the documents of every `format` file in `directory`.
    ///
    /// With `combine` all files go in a single request, otherwise one request
    /// is sent per file.
    pub async fn add_documents_from_directory(
        &self,
        directory: &Path,
        format: DocumentFormat,
        combine: bool,
        primary_key: Option<&str>,
    ) -> Result<Vec<TaskInfo>, ClientError> {
        self.write_directory(DocumentWrite::Add, directory, format, combine, primary_key)
            .await
    }

    /// Updates documents, merging fields into existing ones.
    pub async fn update_documents<T: Serialize>(
        &self,
        documents: &[T],
        primary_key: Option<&str>,
    ) -> Result<TaskInfo, ClientError> {
        self.write_documents(DocumentWrite::Update, documents, primary_key)
            .await
    }

    pub async fn update_documents_in_batches<T: Serialize>(
        &self,
        documents: &[T],
        batch_size: usize,
        primary_key: Option<&str>,
    ) -> Result<Vec<TaskInfo>, ClientError> {
        self.write_in_batches(DocumentWrite::Update, documents, batch_size, primary_key)
            .await
    }

    pub async fn update_documents_auto_batch<T: Serialize>(
        &self,
        documents: &[T],
        max_payload_size: usize,
        primary_key: Option<&str>,
    ) -> Result<Vec<TaskInfo>, ClientError> {
        self.write_auto_batch(DocumentWrite::Update, documents, max_payload_size, primary_key)
            .await
    }

    pub async fn update_documents_from_file(
        &self,
        path: &Path,
        primary_key: Option<&str>,
    ) -> Result<TaskInfo, ClientError> {
        let documents = documents::load_documents_from_file(path).await?;
        self.update_documents(&documents, primary_key).await
    }

    pub async fn update_documents_from_raw_file(
        &self,
        path: &Path,
        primary_key: Option<&str>,
    ) -> Result<TaskInfo, ClientError> {
        self.write_raw_file(DocumentWrite::Update, path, primary_key)
            .await
    }

    pub async fn update_documents_from_directory(
        &self,
        directory: &Path,
        format: DocumentFormat,
        combine: bool,
        primary_key: Option<&str>,
    ) -> Result<Vec<TaskInfo>, ClientError> {
        self.write_directory(DocumentWrite::Update, directory, format, combine, primary_key)
            .await
    }

    pub async fn delete_document(&self, document_id: &str) -> Result<TaskInfo, ClientError> {
        let path = format!(
            "{}/{}",
            self.path("/documents"),
            encode_path_segment(document_id)
        );
        self.client.delete(&path).await
    }

    pub async fn delete_documents(&self, ids: &[&str]) -> Result<TaskInfo, ClientError> {
        self.client
            .post(&self.path("/documents/delete-batch"), ids)
            .await
    }

    pub async fn delete_all_documents(&self) -> Result<TaskInfo, ClientError> {
        self.client.delete(&self.path("/documents")).await
    }

    pub async fn get_settings(&self) -> Result<Settings, ClientError> {
        self.client.get(&self.path("/settings")).await
    }

    /// Updates the fields set in `settings`; `None` fields are left unchanged.
    pub async fn update_settings(&self, settings: &Settings) -> Result<TaskInfo, ClientError> {
        self.client.post(&self.path("/settings"), settings).await
    }

    pub async fn reset_settings(&self) -> Result<TaskInfo, ClientError> {
        self.client.delete(&self.path("/settings")).await
    }

    pub async fn get_ranking_rules(&self) -> Result<Vec<String>, ClientError> {
        self.get_setting("ranking-rules").await
    }

    pub async fn update_ranking_rules(&self, rules: &[&str]) -> Result<TaskInfo, ClientError> {
        self.update_setting("ranking-rules", rules).await
    }

    pub async fn reset_ranking_rules(&self) -> Result<TaskInfo, ClientError> {
        self.reset_setting("ranking-rules").await
    }

    pub async fn get_distinct_attribute(&self) -> Result<Option<String>, ClientError> {
        let attribute: Option<String> = self.get_setting("distinct-attribute").await?;
        Ok(attribute.filter(|attribute| !attribute.is_empty()))
    }

    pub async fn update_distinct_attribute(&self, attribute: &str) -> Result<TaskInfo, ClientError> {
        self.update_setting("distinct-attribute", attribute).await
    }

    pub async fn reset_distinct_attribute(&self) -> Result<TaskInfo, ClientError> {
        self.reset_setting("distinct-attribute").await
    }

    pub async fn get_searchable_attributes(&self) -> Result<Vec<String>, ClientError> {
        self.get_setting("searchable-attributes").await
    }

    pub async fn update_searchable_attributes(
        &self,
        attributes: &[&str],
    ) -> Result<TaskInfo, ClientError> {
        self.update_setting("searchable-attributes", attributes)
            .await
    }

    pub async fn reset_searchable_attributes(&self) -> Result<TaskInfo, ClientError> {
        self.reset_setting("searchable-attributes").await
    }

    pub async fn get_displayed_attributes(&self) -> Result<Vec<String>, ClientError> {
        self.get_setting("displayed-attributes").await
    }

    pub async fn update_displayed_attributes(
        &self,
        attributes: &[&str],
    ) -> Result<TaskInfo, ClientError> {
        self.update_setting("displayed-attributes", attributes)
            .await
    }

    pub async fn reset_displayed_attributes(&self) -> Result<TaskInfo, ClientError> {
        self.reset_setting("displayed-attributes").await
    }

    /// No stop words configured is `None`.
    pub async fn get_stop_words(&self) -> Result<Option<Vec<String>>, ClientError> {
        let words: Option<Vec<String>> = self.get_setting("stop-words").await?;
        Ok(words.and_then(non_empty))
    }

    pub async fn update_stop_words(&self, words: &[&str]) -> Result<TaskInfo, ClientError> {
        self.update_setting("stop-words", words).await
    }

    pub async fn reset_stop_words(&self) -> Result<TaskInfo, ClientError> {
        self.reset_setting("stop-words").await
    }

    /// No synonyms configured is `None`.
    pub async fn get_synonyms(&self) -> Result<Option<HashMap<String, Vec<String>>>, ClientError> {
        let synonyms: Option<HashMap<String, Vec<String>>> = self.get_setting("synonyms").await?;
        Ok(synonyms.filter(|synonyms| !synonyms.is_empty()))
    }

    pub async fn update_synonyms(
        &self,
        synonyms: &HashMap<String, Vec<String>>,
    ) -> Result<TaskInfo, ClientError> {
        self.update_setting("synonyms", synonyms).await
    }

    pub async fn reset_synonyms(&self) -> Result<TaskInfo, ClientError> {
        self.reset_setting("synonyms").await
    }

    /// No filterable attributes configured is `None`.
    pub async fn get_filterable_attributes(&self) -> Result<Option<Vec<String>>, ClientError> {
        let attributes: Option<Vec<String>> = self.get_setting("filterable-attributes").await?;
        Ok(attributes.and_then(non_empty))
    }

    pub async fn update_filterable_attributes(
        &self,
        attributes: &[&str],
    ) -> Result<TaskInfo, ClientError> {
        self.update_setting("filterable-attributes", attributes)
            .await
    }

    pub async fn reset_filterable_attributes(&self) -> Result<TaskInfo, ClientError> {
        self.reset_setting("filterable-attributes").await
    }

    pub async fn get_sortable_attributes(&self) -> Result<Vec<String>, ClientError> {
        self.get_setting("sortable-attributes").await
    }

    pub async fn update_sortable_attributes(
        &self,
        attributes: &[&str],
    ) -> Result<TaskInfo, ClientError> {
        self.update_setting("sortable-attributes", attributes)
            .await
    }

    pub async fn reset_sortable_attributes(&self) -> Result<TaskInfo, ClientError> {
        self.reset_setting("sortable-attributes").await
    }

    pub async fn get_typo_tolerance(&self) -> Result<TypoTolerance, ClientError> {
        self.get_setting("typo-tolerance").await
    }

    pub async fn update_typo_tolerance(
        &self,
        typo_tolerance: &TypoTolerance,
    ) -> Result<TaskInfo, ClientError> {
        self.update_setting("typo-tolerance", typo_tolerance)
            .await
    }

    pub async fn reset_typo_tolerance(&self) -> Result<TaskInfo, ClientError> {
        self.reset_setting("typo-tolerance").await
    }

    async fn get_setting<T: DeserializeOwned>(&self, name: &str) -> Result<T, ClientError> {
        self.client.get(&self.setting_path(name)).await
    }

    async fn update_setting<B>(&self, name: &str, body: &B) -> Result<TaskInfo, ClientError>
    where
        B: Serialize + ?Sized,
    {
        self.client.post(&self.setting_path(name), body).await
    }

    async fn reset_setting(&self, name: &str) -> Result<TaskInfo, ClientError> {
        self.client.delete(&self.setting_path(name)).await
    }

    async fn write_documents<T: Serialize>(
        &self,
        mode: DocumentWrite,
        documents: &[T],
        primary_key: Option<&str>,
    ) -> Result<TaskInfo, ClientError> {
        let body = RequestBody::json(documents)?;
        self.send_documents(mode, body, primary_key).await
    }

    async fn write_in_batches<T: Serialize>(
        &self,
        mode: DocumentWrite,
        documents: &[T],
        batch_size: usize,
        primary_key: Option<&str>,
    ) -> Result<Vec<TaskInfo>, ClientError> {
        let mut accepted = Vec::new();
        for batch in documents.chunks(batch_size.max(1)) {
            accepted.push(self.write_documents(mode, batch, primary_key).await?);
        }
        Ok(accepted)
    }

    async fn write_auto_batch<T: Serialize>(
        &self,
        mode: DocumentWrite,
        documents: &[T],
        max_payload_size: usize,
        primary_key: Option<&str>,
    ) -> Result<Vec<TaskInfo>, ClientError> {
        let mut accepted = Vec::new();
        for range in documents::auto_batch_ranges(documents, max_payload_size)? {
            accepted.push(
                self.write_documents(mode, &documents[range], primary_key)
                    .await?,
            );
        }
        Ok(accepted)
    }

    async fn write_raw_file(
        &self,
        mode: DocumentWrite,
        path: &Path,
        primary_key: Option<&str>,
    ) -> Result<TaskInfo, ClientError> {
        let format = DocumentFormat::from_path(path)?;
        let content_type = format.raw_content_type().ok_or_else(|| {
            ClientError::InvalidDocument(format!(
                "'{}' must be a csv or ndjson file to upload as-is",
                path.display()
            ))
        })?;
        let bytes = tokio::fs::read(path).await?;
        let body = RequestBody::Raw {
            content_type,
            bytes,
        };
        self.send_documents(mode, body, primary_key).await
    }

    async fn write_directory(
        &self,
        mode: DocumentWrite,
        directory: &Path,
        format: DocumentFormat,
        combine: bool,
        primary_key: Option<&str>,
    ) -> Result<Vec<TaskInfo>, ClientError> {
        let loaded = documents::load_documents_from_directory(directory, format).await?;
        if combine {
            let combined: Vec<_> = loaded.into_iter().flatten().collect();
            return Ok(vec![
                self.write_documents(mode, &combined, primary_key).await?,
            ]);
        }

        let mut accepted = Vec::with_capacity(loaded.len());
        for documents in &loaded {
            accepted.push(self.write_documents(mode, documents, primary_key).await?);
        }
        Ok(accepted)
    }

    async fn send_documents(
        &self,
        mode: DocumentWrite,
        body: RequestBody,
        primary_key: Option<&str>,
    ) -> Result<TaskInfo, ClientError> {
        let query: Vec<(&str, &str)> = primary_key
            .map(|key| vec![("primaryKey", key)])
            .unwrap_or_default();
        self.client
            .request(mode.method(), &self.path("/documents"), &query, Some(body))
            .await
    }

    fn path(&self, suffix: &str) -> String {
        format!("indexes/{}{suffix}", encode_path_segment(&self.uid))
    }

    fn setting_path(&self, name: &str) -> String {
        self.path(&format!("/settings/{name}"))
    }
}

fn non_empty<T>(items: Vec<T>) -> Option<Vec<T>> {
    if items.is_empty() { None } else { Some(items) }
}

/// Percent-encodes one path segment.
///
/// `byte_serialize` writes a space as `+`; a literal `+` always comes out as
/// `%2B`, so every `+` left in the output stands for a space.
fn encode_path_segment(value: &str) -> String {
    byte_serialize(value.as_bytes())
        .collect::<String>()
        .replace('+', "%20")
}

#[cfg(test)]
mod tests {
    use super::{IndexRef, encode_path_segment};
    use crate::ApiClient;
    use crate::task::WaitOptions;

    fn index(uid: &str) -> IndexRef {
        let client = ApiClient::new("http://localhost:7700").expect("valid url");
        IndexRef::new(client, uid, WaitOptions::default())
    }

    #[test]
    fn builds_resource_paths() {
        let movies = index("movies");
        assert_eq!(movies.path(""), "indexes/movies");
        assert_eq!(
            movies.setting_path("typo-tolerance"),
            "indexes/movies/settings/typo-tolerance"
        );
    }

    #[test]
    fn encodes_reserved_characters() {
        assert_eq!(encode_path_segment("a/b?c"), "a%2Fb%3Fc");
    }

    #[test]
    fn spaces_stay_distinct_from_plus_signs() {
        assert_eq!(encode_path_segment("tom hanks"), "tom%20hanks");
        assert_eq!(encode_path_segment("c++"), "c%2B%2B");
        assert_eq!(index("my movies").path(""), "indexes/my%20movies");
    }
}
