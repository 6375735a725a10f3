#![allow(dead_code)]

use serde_json::{Value, json};
use wiremock::ResponseTemplate;

pub const ENQUEUED_AT: &str = "2021-05-11T03:12:22.563960100Z";

pub fn accepted(uid: u64, index_uid: &str, kind: &str) -> ResponseTemplate {
    ResponseTemplate::new(202).set_body_json(json!({
        "uid": uid,
        "indexUid": index_uid,
        "status": "enqueued",
        "type": kind,
        "enqueuedAt": ENQUEUED_AT
    }))
}

pub fn task(uid: u64, status: &str, error: Option<Value>) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_json(json!({
        "uid": uid,
        "indexUid": "movies",
        "status": status,
        "type": "indexDeletion",
        "error": error,
        "duration": "PT0.001S",
        "enqueuedAt": ENQUEUED_AT,
        "startedAt": ENQUEUED_AT,
        "finishedAt": null
    }))
}

pub fn api_error(status: u16, code: &str, message: &str) -> ResponseTemplate {
    ResponseTemplate::new(status).set_body_json(error_body(code, message))
}

pub fn error_body(code: &str, message: &str) -> Value {
    json!({
        "message": message,
        "code": code,
        "type": "invalid_request",
        "link": format!("https://docs.meilisearch.com/errors#{code}")
    })
}

pub fn index_info(uid: &str, primary_key: Option<&str>) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_json(json!({
        "uid": uid,
        "primaryKey": primary_key,
        "createdAt": "2021-05-11T03:12:22.563960100Z",
        "updatedAt": "2021-05-11T03:12:23.1Z"
    }))
}
