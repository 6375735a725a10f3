use reqwest::StatusCode;
use serde::de::DeserializeOwned;

use crate::error::ApiError;
use crate::ClientError;

/// Status and body of a completed HTTP exchange.
#[derive(Clone, Debug)]
pub struct RawResponse {
    pub status: StatusCode,
    pub body: String,
}

impl RawResponse {
    /// Decodes the body as JSON.
    ///
    /// An empty body decodes as JSON `null`, so `Option<T>` and `()` targets
    /// accept it.
    pub fn json<T: DeserializeOwned>(&self) -> Result<T, ClientError> {
        if self.body.trim().is_empty() {
            Ok(serde_json::from_value(serde_json::Value::Null)?)
        } else {
            Ok(serde_json::from_str(&self.body)?)
        }
    }
}

/// Passes 2xx responses through and turns everything else into an error.
///
/// Bodies in the server's `{message, code, type, link}` shape become
/// [`ClientError::Api`]; anything else keeps the raw text in
/// [`ClientError::HttpStatus`].
pub fn check_status(response: RawResponse) -> Result<RawResponse, ClientError> {
    if response.status.is_success() {
        return Ok(response);
    }

    match serde_json::from_str::<ApiError>(&response.body) {
        Ok(error) if !error.message.is_empty() || !error.code.as_str().is_empty() => {
            Err(ClientError::Api {
                status: response.status,
                error,
            })
        }
        _ => Err(ClientError::HttpStatus {
            status: response.status,
            body: response.body,
        }),
    }
}

#[cfg(test)]
mod tests {
    use reqwest::StatusCode;

    use super::{RawResponse, check_status};
    use crate::{ClientError, ErrorCode};

    fn raw(status: StatusCode, body: &str) -> RawResponse {
        RawResponse {
            status,
            body: body.to_owned(),
        }
    }

    #[test]
    fn success_passes_through() {
        let response = check_status(raw(StatusCode::ACCEPTED, "{}")).expect("2xx");
        assert_eq!(response.status, StatusCode::ACCEPTED);
    }

    #[test]
    fn structured_error_becomes_api_error() {
        let body = r#"{"message":"Index `x` not found.","code":"index_not_found","type":"invalid_request","link":"https://docs.meilisearch.com/errors#index_not_found"}"#;
        let error = check_status(raw(StatusCode::NOT_FOUND, body)).expect_err("404");
        match error {
            ClientError::Api { status, error } => {
                assert_eq!(status, StatusCode::NOT_FOUND);
                assert_eq!(error.code, ErrorCode::IndexNotFound);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn unstructured_error_keeps_raw_body() {
        let error =
            check_status(raw(StatusCode::BAD_GATEWAY, "upstream down")).expect_err("502");
        match error {
            ClientError::HttpStatus { status, body } => {
                assert_eq!(status, StatusCode::BAD_GATEWAY);
                assert_eq!(body, "upstream down");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn empty_body_decodes_as_null() {
        let response = raw(StatusCode::NO_CONTENT, "");
        let decoded: Option<Vec<String>> = response.json().expect("null");
        assert!(decoded.is_none());
    }
}
