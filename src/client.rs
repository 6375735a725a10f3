use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use reqwest::header::{CONTENT_TYPE, HeaderValue};
use reqwest::{Method, Url};
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::{debug, info};

use crate::response::{RawResponse, check_status};
use crate::task::{Task, TaskSource};
use crate::ClientError;

/// Header carrying the API key.
pub const API_KEY_HEADER: &str = "X-Meili-Api-Key";

/// Request payload accepted by [`ApiClient::send`].
#[derive(Clone, Debug)]
pub enum RequestBody {
    /// Serialized as JSON with `Content-Type: application/json`.
    Json(Value),
    /// Sent as-is with the given content type (csv, ndjson uploads).
    Raw {
        content_type: &'static str,
        bytes: Vec<u8>,
    },
}

impl RequestBody {
    /// Serializes any value into a JSON body.
    pub fn json<T: Serialize + ?Sized>(value: &T) -> Result<Self, ClientError> {
        Ok(Self::Json(serde_json::to_value(value)?))
    }
}

/// Async JSON REST transport shared by every resource client.
///
/// Cloning is cheap: clones share the underlying connection pool and the
/// closed state, so closing any clone closes all of them.
#[derive(Clone, Debug)]
pub struct ApiClient {
    base_url: Url,
    api_key: Option<String>,
    timeout: Option<Duration>,
    http: Arc<Mutex<Option<reqwest::Client>>>,
}

impl ApiClient {
    /// Creates a new client with the given base URL.
    ///
    /// The URL is normalized to include a trailing slash, so relative endpoint
    /// paths join correctly.
    pub fn new(base_url: impl AsRef<str>) -> Result<Self, ClientError> {
        let parsed = Url::parse(base_url.as_ref())
            .map_err(|_| ClientError::InvalidBaseUrl(base_url.as_ref().to_owned()))?;

        Ok(Self {
            base_url: ensure_trailing_slash(parsed),
            api_key: None,
            timeout: None,
            http: Arc::new(Mutex::new(Some(reqwest::Client::new()))),
        })
    }

    /// Returns a new client sending `X-Meili-Api-Key: <key>` on every request.
    #[must_use]
    pub fn with_api_key(mut self, key: impl Into<String>) -> Self {
        self.api_key = Some(key.into());
        self
    }

    /// Returns a new client applying `timeout` to every request.
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Releases the connection pool.
    ///
    /// Idempotent. Every later request through this client or any clone of it
    /// fails with [`ClientError::Closed`].
    pub fn close(&self) {
        let released = self
            .http
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if released.is_some() {
            info!(base_url = %self.base_url, "closed client");
        }
    }

    pub fn is_closed(&self) -> bool {
        self.http
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .is_none()
    }

    /// Sends a `GET` request and decodes the response.
    pub async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T, ClientError> {
        self.request(Method::GET, path, &[], None).await
    }

    /// Sends a `GET` request with query parameters and decodes the response.
    pub async fn get_with_query<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, &str)],
    ) -> Result<T, ClientError> {
        self.request(Method::GET, path, query, None).await
    }

    /// Sends a `POST` request with a JSON body and decodes the response.
    pub async fn post<B, T>(&self, path: &str, body: &B) -> Result<T, ClientError>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let body = RequestBody::json(body)?;
        self.request(Method::POST, path, &[], Some(body)).await
    }

    /// Sends a `PUT` request with a JSON body and decodes the response.
    pub async fn put<B, T>(&self, path: &str, body: &B) -> Result<T, ClientError>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let body = RequestBody::json(body)?;
        self.request(Method::PUT, path, &[], Some(body)).await
    }

    /// Sends a `PATCH` request with a JSON body and decodes the response.
    pub async fn patch<B, T>(&self, path: &str, body: &B) -> Result<T, ClientError>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let body = RequestBody::json(body)?;
        self.request(Method::PATCH, path, &[], Some(body)).await
    }

    /// Sends a `DELETE` request and decodes the response.
    pub async fn delete<T: DeserializeOwned>(&self, path: &str) -> Result<T, ClientError> {
        self.request(Method::DELETE, path, &[], None).await
    }

    /// Sends a request, maps error statuses and decodes the response.
    pub async fn request<T: DeserializeOwned>(
        &self,
        method: Method,
        path: &str,
        query: &[(&str, &str)],
        body: Option<RequestBody>,
    ) -> Result<T, ClientError> {
        let response = check_status(self.send(method, path, query, body).await?)?;
        response.json()
    }

    /// Sends a request and returns the raw response, whatever its status.
    ///
    /// Only failures to complete the exchange are errors here; use
    /// [`crate::response::check_status`] to map error statuses.
    pub async fn send(
        &self,
        method: Method,
        path: &str,
        query: &[(&str, &str)],
        body: Option<RequestBody>,
    ) -> Result<RawResponse, ClientError> {
        let http = self.http()?;
        let url = self.build_url(path)?;
        debug!(%method, %url, "sending request");

        let content_type = match &body {
            Some(RequestBody::Raw { content_type, .. }) => *content_type,
            _ => "application/json",
        };
        let mut request = http
            .request(method, url)
            .header(CONTENT_TYPE, HeaderValue::from_static(content_type));

        if !query.is_empty() {
            request = request.query(query);
        }

        if let Some(key) = &self.api_key {
            request = request.header(API_KEY_HEADER, key);
        }

        if let Some(timeout) = self.timeout {
            request = request.timeout(timeout);
        }

        request = match body {
            Some(RequestBody::Json(json_body)) => request.json(&json_body),
            Some(RequestBody::Raw { bytes, .. }) => request.body(bytes),
            None => request,
        };

        let response = request.send().await?;
        let status = response.status();
        let body = response.text().await?;
        debug!(%status, "received response");

        Ok(RawResponse { status, body })
    }

    fn http(&self) -> Result<reqwest::Client, ClientError> {
        self.http
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
            .ok_or(ClientError::Closed)
    }

    fn build_url(&self, path: &str) -> Result<Url, ClientError> {
        let relative = path.trim_start_matches('/');
        self.base_url
            .join(relative)
            .map_err(|_| ClientError::InvalidPath(path.to_owned()))
    }
}

impl TaskSource for ApiClient {
    async fn fetch_task(&self, task_uid: u64) -> Result<Task, ClientError> {
        self.get(&format!("tasks/{task_uid}")).await
    }
}

fn ensure_trailing_slash(mut url: Url) -> Url {
    if !url.path().ends_with('/') {
        let mut path = url.path().to_owned();
        path.push('/');
        url.set_path(&path);
    }
    url
}

#[cfg(test)]
mod tests {
    use serde_json::{Value, json};
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::ApiClient;
    use crate::ClientError;

    #[test]
    fn joins_paths_from_base_with_nested_prefix() {
        let client = ApiClient::new("https://example.com/meili").expect("valid url");
        let resolved = client.build_url("indexes/movies").expect("valid path");
        assert_eq!(resolved.as_str(), "https://example.com/meili/indexes/movies");
    }

    #[test]
    fn rejects_relative_base_url() {
        let error = ApiClient::new("not a url").expect_err("invalid url");
        assert!(matches!(error, ClientError::InvalidBaseUrl(_)));
    }

    #[tokio::test]
    async fn sends_default_headers() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/health"))
            .and(header("X-Meili-Api-Key", "masterKey"))
            .and(header("Content-Type", "application/json"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"status": "available"})))
            .expect(1)
            .mount(&server)
            .await;

        let client = ApiClient::new(server.uri())
            .expect("valid url")
            .with_api_key("masterKey");
        let health: Value = client.get("health").await.expect("request succeeds");
        assert_eq!(health["status"], "available");
    }

    #[tokio::test]
    async fn closed_client_fails_fast() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;

        let client = ApiClient::new(server.uri()).expect("valid url");
        let clone = client.clone();
        client.close();
        client.close();

        assert!(clone.is_closed());
        let error = clone.get::<Value>("health").await.expect_err("closed");
        assert!(matches!(error, ClientError::Closed));
    }

    #[tokio::test]
    async fn invalid_api_key_header_fails_before_sending() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;

        let client = ApiClient::new(server.uri())
            .expect("valid url")
            .with_api_key("master\nKey");
        let error = client.get::<Value>("health").await.expect_err("bad header");
        assert!(matches!(error, ClientError::InvalidRequest(_)), "got {error:?}");
    }

    #[tokio::test]
    async fn unreachable_host_is_communication_error() {
        let client = ApiClient::new("http://127.0.0.1:1").expect("valid url");
        let error = client.get::<Value>("health").await.expect_err("refused");
        assert!(matches!(error, ClientError::Communication(_)));
    }
}
