use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::task::Task;

/// Errors returned by client operations.
#[derive(Debug, Error)]
pub enum ClientError {
    /// Base URL is not a valid absolute URL.
    #[error("invalid base URL '{0}'")]
    InvalidBaseUrl(String),

    /// Endpoint path could not be joined to the base URL.
    #[error("invalid endpoint path '{0}'")]
    InvalidPath(String),

    /// The HTTP exchange could not be completed (DNS, connection, timeout).
    #[error("communication with the server failed: {0}")]
    Communication(#[source] reqwest::Error),

    /// The request could not be built, for example a header value with
    /// control characters. Nothing was sent.
    #[error("failed to build request: {0}")]
    InvalidRequest(#[source] reqwest::Error),

    /// Non-success HTTP status carrying a structured error body.
    #[error("server returned status {status}: {error}")]
    Api {
        status: reqwest::StatusCode,
        error: ApiError,
    },

    /// Non-success HTTP status whose body is not a structured error.
    #[error("server returned status {status}: {body}")]
    HttpStatus {
        status: reqwest::StatusCode,
        body: String,
    },

    /// Response body did not match the expected shape.
    #[error("failed to parse JSON: {0}")]
    Json(#[from] serde_json::Error),

    /// The task did not reach a terminal status before the wait deadline.
    #[error("task {task_uid} did not finish within {elapsed:?}")]
    Timeout { task_uid: u64, elapsed: Duration },

    /// A task awaited by a composite operation ended in a non-success status.
    #[error("task {} ended with status {}{}", .0.uid, .0.status, task_error_suffix(.0))]
    TaskFailed(Box<Task>),

    /// The client was closed; no further requests are sent.
    #[error("client is closed")]
    Closed,

    /// A single document exceeds the maximum payload size of a batch.
    #[error("payload size {size} is greater than the maximum payload size of {max}")]
    PayloadTooLarge { size: usize, max: usize },

    /// Documents could not be read from the provided source.
    #[error("invalid documents: {0}")]
    InvalidDocument(String),

    /// A timestamp returned by the server could not be parsed.
    #[error("invalid timestamp '{0}'")]
    InvalidTimestamp(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to read CSV: {0}")]
    Csv(#[from] csv::Error),
}

impl ClientError {
    /// Returns the structured server error code, if this is an API error.
    pub fn api_code(&self) -> Option<&ErrorCode> {
        match self {
            Self::Api { error, .. } => Some(&error.code),
            _ => None,
        }
    }

    /// True when the server reported that the index does not exist.
    pub fn is_index_not_found(&self) -> bool {
        self.api_code() == Some(&ErrorCode::IndexNotFound)
    }
}

impl From<reqwest::Error> for ClientError {
    fn from(error: reqwest::Error) -> Self {
        if error.is_builder() {
            Self::InvalidRequest(error)
        } else {
            Self::Communication(error)
        }
    }
}

fn task_error_suffix(task: &Task) -> String {
    task.error
        .as_ref()
        .map(|error| format!(": {error}"))
        .unwrap_or_default()
}

/// Structured error body returned by the server.
///
/// The same shape is embedded in failed [`Task`] records.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize, Error)]
#[error("{code}: {message} ({link})")]
pub struct ApiError {
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub code: ErrorCode,
    #[serde(default, rename = "type")]
    pub error_type: String,
    #[serde(default)]
    pub link: String,
}

/// Error codes the client branches on.
///
/// Codes are matched by exact equality. Anything else is kept verbatim in
/// [`ErrorCode::Unknown`].
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum ErrorCode {
    IndexNotFound,
    IndexAlreadyExists,
    IndexCreationFailed,
    IndexPrimaryKeyAlreadyExists,
    PrimaryKeyInferenceFailed,
    DocumentNotFound,
    InvalidApiKey,
    MissingAuthorizationHeader,
    DumpNotFound,
    DumpAlreadyProcessing,
    TaskNotFound,
    PayloadTooLarge,
    BadRequest,
    Internal,
    Unknown(String),
}

const KNOWN_CODES: &[(ErrorCode, &str)] = &[
    (ErrorCode::IndexNotFound, "index_not_found"),
    (ErrorCode::IndexAlreadyExists, "index_already_exists"),
    (ErrorCode::IndexCreationFailed, "index_creation_failed"),
    (
        ErrorCode::IndexPrimaryKeyAlreadyExists,
        "index_primary_key_already_exists",
    ),
    (
        ErrorCode::PrimaryKeyInferenceFailed,
        "primary_key_inference_failed",
    ),
    (ErrorCode::DocumentNotFound, "document_not_found"),
    (ErrorCode::InvalidApiKey, "invalid_api_key"),
    (
        ErrorCode::MissingAuthorizationHeader,
        "missing_authorization_header",
    ),
    (ErrorCode::DumpNotFound, "dump_not_found"),
    (ErrorCode::DumpAlreadyProcessing, "dump_already_processing"),
    (ErrorCode::TaskNotFound, "task_not_found"),
    (ErrorCode::PayloadTooLarge, "payload_too_large"),
    (ErrorCode::BadRequest, "bad_request"),
    (ErrorCode::Internal, "internal"),
];

impl ErrorCode {
    /// Wire representation of the code.
    pub fn as_str(&self) -> &str {
        if let Self::Unknown(raw) = self {
            return raw;
        }
        KNOWN_CODES
            .iter()
            .find(|(code, _)| code == self)
            .map_or("", |(_, name)| name)
    }
}

impl Default for ErrorCode {
    fn default() -> Self {
        Self::Unknown(String::new())
    }
}

impl From<String> for ErrorCode {
    fn from(raw: String) -> Self {
        KNOWN_CODES
            .iter()
            .find(|(_, name)| *name == raw)
            .map_or(Self::Unknown(raw), |(code, _)| code.clone())
    }
}

impl From<&str> for ErrorCode {
    fn from(raw: &str) -> Self {
        Self::from(raw.to_owned())
    }
}

impl From<ErrorCode> for String {
    fn from(code: ErrorCode) -> Self {
        code.as_str().to_owned()
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
