use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::timestamp;

/// Metadata of an index as returned by `GET /indexes/{uid}`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IndexInfo {
    pub uid: String,
    #[serde(default)]
    pub primary_key: Option<String>,
    #[serde(default, deserialize_with = "timestamp::deserialize_option")]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default, deserialize_with = "timestamp::deserialize_option")]
    pub updated_at: Option<DateTime<Utc>>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IndexStats {
    pub number_of_documents: u64,
    pub is_indexing: bool,
    #[serde(default)]
    pub field_distribution: HashMap<String, u64>,
}

/// Database-wide statistics from `GET /stats`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClientStats {
    pub database_size: u64,
    #[serde(default, deserialize_with = "timestamp::deserialize_option")]
    pub last_update: Option<DateTime<Utc>>,
    #[serde(default)]
    pub indexes: HashMap<String, IndexStats>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DumpInfo {
    pub uid: String,
    pub status: String,
    #[serde(default, deserialize_with = "timestamp::deserialize_option")]
    pub started_at: Option<DateTime<Utc>>,
    #[serde(default, deserialize_with = "timestamp::deserialize_option")]
    pub finished_at: Option<DateTime<Utc>>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Health {
    pub status: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Version {
    pub commit_sha: String,
    #[serde(default, deserialize_with = "timestamp::deserialize_option")]
    pub commit_date: Option<DateTime<Utc>>,
    pub pkg_version: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Keys {
    #[serde(default)]
    pub public: Option<String>,
    #[serde(default)]
    pub private: Option<String>,
}

/// Body of `POST /indexes/{uid}/search`.
///
/// Unset fields are omitted and take the server defaults.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchQuery {
    #[serde(rename = "q", skip_serializing_if = "Option::is_none")]
    pub query: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub offset: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub limit: Option<usize>,
    /// A filter expression string or a nested array of expressions.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub filter: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub facets_distribution: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub attributes_to_retrieve: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub attributes_to_crop: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub crop_length: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub crop_marker: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub attributes_to_highlight: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub highlight_pre_tag: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub highlight_post_tag: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sort: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub matches: Option<bool>,
}

impl SearchQuery {
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            query: Some(query.into()),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    #[must_use]
    pub fn with_offset(mut self, offset: usize) -> Self {
        self.offset = Some(offset);
        self
    }

    #[must_use]
    pub fn with_filter(mut self, filter: impl Into<Value>) -> Self {
        self.filter = Some(filter.into());
        self
    }

    #[must_use]
    pub fn with_sort(mut self, sort: Vec<String>) -> Self {
        self.sort = Some(sort);
        self
    }

    #[must_use]
    pub fn with_attributes_to_highlight(mut self, attributes: Vec<String>) -> Self {
        self.attributes_to_highlight = Some(attributes);
        self
    }
}

#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchResults<T = Value> {
    pub hits: Vec<T>,
    pub offset: usize,
    pub limit: usize,
    #[serde(default)]
    pub nb_hits: Option<u64>,
    #[serde(default)]
    pub exhaustive_nb_hits: Option<bool>,
    #[serde(default)]
    pub facets_distribution: Option<HashMap<String, HashMap<String, u64>>>,
    #[serde(default)]
    pub processing_time_ms: u64,
    #[serde(default)]
    pub query: String,
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::{IndexInfo, SearchQuery};

    #[test]
    fn index_info_parses_nanosecond_timestamps() {
        let info: IndexInfo = serde_json::from_value(json!({
            "uid": "movies",
            "primaryKey": null,
            "createdAt": "2021-05-11T03:12:22.563960100Z",
            "updatedAt": "2021-05-11T03:12:22.563960100Z"
        }))
        .expect("valid index");
        let created = info.created_at.expect("created_at present");
        assert_eq!(created.timestamp_subsec_micros(), 563_960);
        assert_eq!(created.timestamp_subsec_nanos(), 563_960_000);
        assert!(info.primary_key.is_none());
    }

    #[test]
    fn search_query_omits_unset_fields() {
        let body = serde_json::to_value(SearchQuery::new("dragon").with_limit(5)).expect("json");
        assert_eq!(body, json!({"q": "dragon", "limit": 5}));
    }
}
