//! Document batching and loading from files.

use std::ops::Range;
use std::path::Path;

use serde::Serialize;
use serde_json::{Map, Value};
use tracing::debug;

use crate::ClientError;

/// Default number of documents per request for the `*_in_batches` helpers.
pub const DEFAULT_BATCH_SIZE: usize = 1000;

/// Default payload limit for the `*_auto_batch` helpers (100 MiB).
pub const DEFAULT_MAX_PAYLOAD_SIZE: usize = 100 * 1024 * 1024;

/// File formats accepted by the document loaders.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DocumentFormat {
    Json,
    Ndjson,
    Csv,
}

impl DocumentFormat {
    pub fn from_path(path: &Path) -> Result<Self, ClientError> {
        match path.extension().and_then(|ext| ext.to_str()) {
            Some("json") => Ok(Self::Json),
            Some("ndjson") => Ok(Self::Ndjson),
            Some("csv") => Ok(Self::Csv),
            _ => Err(ClientError::InvalidDocument(format!(
                "'{}' must be a json, ndjson, or csv file",
                path.display()
            ))),
        }
    }

    pub fn extension(self) -> &'static str {
        match self {
            Self::Json => "json",
            Self::Ndjson => "ndjson",
            Self::Csv => "csv",
        }
    }

    /// Content type used when uploading the file unparsed.
    pub fn raw_content_type(self) -> Option<&'static str> {
        match self {
            Self::Json => None,
            Self::Ndjson => Some("application/x-ndjson"),
            Self::Csv => Some("text/csv"),
        }
    }
}

/// Splits documents so each batch serializes to at most `max_payload_size` bytes.
///
/// All documents go in one batch when they fit. A single document larger than
/// the limit is [`ClientError::PayloadTooLarge`].
pub fn auto_batch_ranges<T: Serialize>(
    documents: &[T],
    max_payload_size: usize,
) -> Result<Vec<Range<usize>>, ClientError> {
    let total = serde_json::to_vec(documents)?.len();
    if total <= max_payload_size {
        return Ok(vec![0..documents.len()]);
    }

    let mut ranges = Vec::new();
    let mut start = 0;
    // `[]` around the batch
    let mut batch_size = 2;

    for (position, document) in documents.iter().enumerate() {
        let size = serde_json::to_vec(document)?.len();
        if size + 2 > max_payload_size {
            return Err(ClientError::PayloadTooLarge {
                size,
                max: max_payload_size,
            });
        }

        let separator = usize::from(position > start);
        if batch_size + separator + size > max_payload_size {
            ranges.push(start..position);
            start = position;
            batch_size = 2 + size;
        } else {
            batch_size += separator + size;
        }
    }

    if start < documents.len() {
        ranges.push(start..documents.len());
    }
    debug!(batches = ranges.len(), "split documents by payload size");
    Ok(ranges)
}

/// Loads documents from a json (array), ndjson or csv file.
pub async fn load_documents_from_file(path: &Path) -> Result<Vec<Value>, ClientError> {
    let format = DocumentFormat::from_path(path)?;
    let raw = tokio::fs::read_to_string(path).await?;
    parse_documents(&raw, format)
}

/// Parses documents from the text of a file in the given format.
pub fn parse_documents(raw: &str, format: DocumentFormat) -> Result<Vec<Value>, ClientError> {
    match format {
        DocumentFormat::Json => match serde_json::from_str::<Value>(raw)? {
            Value::Array(documents) => Ok(documents),
            _ => Err(ClientError::InvalidDocument(
                "documents must be in a JSON array".to_owned(),
            )),
        },
        DocumentFormat::Ndjson => raw
            .lines()
            .filter(|line| !line.trim().is_empty())
            .map(|line| serde_json::from_str(line).map_err(ClientError::from))
            .collect(),
        DocumentFormat::Csv => {
            let mut reader = csv::Reader::from_reader(raw.as_bytes());
            let headers = reader.headers()?.clone();
            reader
                .records()
                .map(|record| -> Result<Value, ClientError> {
                    let record = record?;
                    let document: Map<String, Value> = headers
                        .iter()
                        .zip(record.iter())
                        .map(|(key, value)| (key.to_owned(), Value::String(value.to_owned())))
                        .collect();
                    Ok(Value::Object(document))
                })
                .collect()
        }
    }
}

/// Loads every `format` file in `directory`, one document list per file.
///
/// Files are visited in name order. Finding none is an error.
pub async fn load_documents_from_directory(
    directory: &Path,
    format: DocumentFormat,
) -> Result<Vec<Vec<Value>>, ClientError> {
    let mut paths = Vec::new();
    let mut entries = tokio::fs::read_dir(directory).await?;
    while let Some(entry) = entries.next_entry().await? {
        let path = entry.path();
        if path.extension().and_then(|ext| ext.to_str()) == Some(format.extension()) {
            paths.push(path);
        }
    }
    paths.sort();

    if paths.is_empty() {
        return Err(ClientError::InvalidDocument(format!(
            "no {} files found in {}",
            format.extension(),
            directory.display()
        )));
    }

    let mut loaded = Vec::with_capacity(paths.len());
    for path in &paths {
        loaded.push(load_documents_from_file(path).await?);
    }
    Ok(loaded)
}

#[cfg(test)]
mod tests {
    use std::path::Path;

    use serde_json::json;

    use super::{
        DocumentFormat, auto_batch_ranges, load_documents_from_directory, parse_documents,
    };
    use crate::ClientError;

    #[test]
    fn everything_fits_in_one_batch() {
        let documents = vec![json!({"id": 1}), json!({"id": 2})];
        let ranges = auto_batch_ranges(&documents, 1024).expect("fits");
        assert_eq!(ranges, vec![0..2]);
    }

    #[test]
    fn batches_never_exceed_the_limit() {
        let documents: Vec<_> = (0..20).map(|id| json!({"id": id, "title": "abcdefgh"})).collect();
        let max = 100;
        let ranges = auto_batch_ranges(&documents, max).expect("splits");

        assert!(ranges.len() > 1);
        let mut covered = 0;
        for range in &ranges {
            assert_eq!(range.start, covered);
            covered = range.end;
            let size = serde_json::to_vec(&documents[range.clone()]).unwrap().len();
            assert!(size <= max, "batch of {size} bytes");
        }
        assert_eq!(covered, documents.len());
    }

    #[test]
    fn oversized_document_is_rejected() {
        let documents = vec![json!({"id": 1}), json!({"id": 2, "body": "x".repeat(200)})];
        let error = auto_batch_ranges(&documents, 64).expect_err("too large");
        assert!(matches!(error, ClientError::PayloadTooLarge { max: 64, .. }));
    }

    #[test]
    fn parses_each_format() {
        let json = parse_documents(r#"[{"id": 1}]"#, DocumentFormat::Json).expect("json");
        assert_eq!(json, vec![json!({"id": 1})]);

        let ndjson =
            parse_documents("{\"id\": 1}\n\n{\"id\": 2}\n", DocumentFormat::Ndjson).expect("ndjson");
        assert_eq!(ndjson.len(), 2);

        let csv = parse_documents("id,title\n1,Tron\n", DocumentFormat::Csv).expect("csv");
        assert_eq!(csv, vec![json!({"id": "1", "title": "Tron"})]);
    }

    #[test]
    fn json_object_is_not_a_document_list() {
        let error = parse_documents(r#"{"id": 1}"#, DocumentFormat::Json).expect_err("object");
        assert!(matches!(error, ClientError::InvalidDocument(_)));
    }

    #[test]
    fn rejects_unknown_extension() {
        assert!(DocumentFormat::from_path(Path::new("movies.xml")).is_err());
        assert_eq!(
            DocumentFormat::from_path(Path::new("movies.ndjson")).expect("known"),
            DocumentFormat::Ndjson
        );
    }

    #[tokio::test]
    async fn loads_directory_in_name_order() {
        let dir = tempfile::tempdir().expect("temp dir");
        std::fs::write(dir.path().join("b.json"), r#"[{"id": 2}]"#).unwrap();
        std::fs::write(dir.path().join("a.json"), r#"[{"id": 1}]"#).unwrap();
        std::fs::write(dir.path().join("ignored.csv"), "id\n3\n").unwrap();

        let loaded = load_documents_from_directory(dir.path(), DocumentFormat::Json)
            .await
            .expect("loads");
        assert_eq!(loaded, vec![vec![json!({"id": 1})], vec![json!({"id": 2})]]);

        let empty = tempfile::tempdir().expect("temp dir");
        let error = load_documents_from_directory(empty.path(), DocumentFormat::Json)
            .await
            .expect_err("no files");
        assert!(matches!(error, ClientError::InvalidDocument(_)));
    }
}
