//! Qdrant store
//!
//! Document chunks carry a `text`, `url` and `title` payload. Structured
//! records additionally carry `key`, `entity_type` and the extracted
//! `structured_data` map; `get` finds them with a scroll filtered on `key`.

use crate::config::FileStoreConfig;
use crate::error::ConfigError;
use async_trait::async_trait;
use ragline_application::ports::vector_store::{SearchFilter, StoreError, VectorStore};
use ragline_domain::{Citation, DatasetRecord, RetrievedChunk};
use serde::Deserialize;
use serde_json::{Map, Value, json};
use std::time::Duration;
use tracing::debug;

#[derive(Debug, Clone)]
pub struct QdrantStore {
    client: reqwest::Client,
    base_url: String,
    collection: String,
}

#[derive(Deserialize)]
struct SearchResponse {
    #[serde(default)]
    result: Vec<ScoredPoint>,
}

#[derive(Deserialize)]
struct ScoredPoint {
    id: Value,
    #[serde(default)]
    score: f64,
    #[serde(default)]
    payload: Map<String, Value>,
}

#[derive(Deserialize)]
struct ScrollResponse {
    result: ScrollResult,
}

#[derive(Deserialize)]
struct ScrollResult {
    #[serde(default)]
    points: Vec<ScoredPoint>,
}

impl QdrantStore {
    pub fn new(config: &FileStoreConfig) -> Result<Self, ConfigError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs.max(1)))
            .build()
            .map_err(|e| ConfigError::Endpoint(e.to_string()))?;
        Ok(Self {
            client,
            base_url: config.url.trim_end_matches('/').to_string(),
            collection: config.collection.clone(),
        })
    }

    fn url(&self, suffix: &str) -> String {
        format!("{}/collections/{}{}", self.base_url, self.collection, suffix)
    }

    async fn send(&self, request: reqwest::RequestBuilder) -> Result<Value, StoreError> {
        let response = request.send().await.map_err(|e| {
            if e.is_timeout() {
                StoreError::Timeout
            } else {
                StoreError::Unreachable(e.to_string())
            }
        })?;
        let status = response.status();
        if status.as_u16() == 404 {
            return Err(StoreError::NotFound(format!("collection {}", self.collection)));
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let error = format!("HTTP {}: {}", status.as_u16(), body);
            return Err(if status.is_server_error() {
                StoreError::Unreachable(error)
            } else {
                StoreError::Malformed(error)
            });
        }
        response
            .json::<Value>()
            .await
            .map_err(|e| StoreError::Malformed(e.to_string()))
    }
}

fn filter_body(filter: &SearchFilter) -> Value {
    let must: Vec<Value> = filter
        .must
        .iter()
        .map(|(key, value)| json!({ "key": key, "match": { "value": value } }))
        .collect();
    json!({ "must": must })
}

fn payload_str<'a>(payload: &'a Map<String, Value>, key: &str) -> Option<&'a str> {
    payload.get(key).and_then(Value::as_str).filter(|s| !s.is_empty())
}

fn chunk_from_point(point: ScoredPoint) -> Option<RetrievedChunk> {
    let text = payload_str(&point.payload, "text")?.to_string();
    let url = payload_str(&point.payload, "url").unwrap_or_default();
    let title = payload_str(&point.payload, "title").unwrap_or(url);
    let id = match &point.id {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    };
    Some(RetrievedChunk {
        id,
        text,
        score: point.score,
        citation: Citation::new(url, title),
    })
}

fn record_from_point(point: &ScoredPoint) -> Result<DatasetRecord, StoreError> {
    let payload = &point.payload;
    let key = payload_str(payload, "key")
        .ok_or_else(|| StoreError::Malformed("record without key".to_string()))?;
    let entity_type = payload_str(payload, "entity_type").unwrap_or("structured");

    let mut record = DatasetRecord::new(entity_type, key);
    if let Some(Value::Object(fields)) = payload.get("structured_data") {
        record.fields = fields.iter().map(|(k, v)| (k.clone(), v.clone())).collect();
    }
    if let Some(text) = payload_str(payload, "text") {
        record = record.with_excerpt(text);
    }
    if let Some(url) = payload_str(payload, "url") {
        let title = payload_str(payload, "title").unwrap_or(url);
        record = record.with_citation(Citation::new(url, title));
    }
    record.note = payload_str(payload, "note").map(str::to_string);
    Ok(record)
}

#[async_trait]
impl VectorStore for QdrantStore {
    async fn search(
        &self,
        vector: &[f32],
        filter: &SearchFilter,
        top_k: usize,
    ) -> Result<Vec<RetrievedChunk>, StoreError> {
        let mut body = json!({
            "vector": vector,
            "limit": top_k,
            "with_payload": true,
        });
        if !filter.is_empty() {
            body["filter"] = filter_body(filter);
        }
        let value = self
            .send(self.client.post(self.url("/points/search")).json(&body))
            .await?;
        let response: SearchResponse =
            serde_json::from_value(value).map_err(|e| StoreError::Malformed(e.to_string()))?;
        let chunks: Vec<RetrievedChunk> = response.result.into_iter().filter_map(chunk_from_point).collect();
        debug!("Qdrant search returned {} chunk(s)", chunks.len());
        Ok(chunks)
    }

    async fn get(&self, key: &str) -> Result<DatasetRecord, StoreError> {
        let body = json!({
            "filter": filter_body(&SearchFilter::default().with("key", key)),
            "limit": 1,
            "with_payload": true,
            "with_vector": false,
        });
        let value = self
            .send(self.client.post(self.url("/points/scroll")).json(&body))
            .await?;
        let response: ScrollResponse =
            serde_json::from_value(value).map_err(|e| StoreError::Malformed(e.to_string()))?;
        let point = response
            .result
            .points
            .first()
            .ok_or_else(|| StoreError::NotFound(key.to_string()))?;
        record_from_point(point)
    }

    async fn health(&self) -> Result<(), StoreError> {
        self.send(self.client.get(self.url(""))).await.map(|_| ())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn point(value: Value) -> ScoredPoint {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn test_filter_body_shape() {
        let filter = SearchFilter::default().with("type", "pdf");
        assert_eq!(
            filter_body(&filter),
            json!({"must": [{"key": "type", "match": {"value": "pdf"}}]})
        );
    }

    #[test]
    fn test_chunk_from_point() {
        let chunk = chunk_from_point(point(json!({
            "id": 7,
            "score": 0.82,
            "payload": {"text": "Meals are reimbursed at 75%.", "url": "https://example.gov/ftr", "title": "FTR 301-11"}
        })))
        .unwrap();
        assert_eq!(chunk.id, "7");
        assert_eq!(chunk.citation.title, "FTR 301-11");
        assert!(chunk.citation.is_valid());
    }

    #[test]
    fn test_point_without_text_skipped() {
        assert!(chunk_from_point(point(json!({"id": "a", "score": 0.5, "payload": {}}))).is_none());
    }

    #[test]
    fn test_record_from_point() {
        let record = record_from_point(&point(json!({
            "id": "b",
            "payload": {
                "key": "Denver, CO",
                "entity_type": "location_rate",
                "text": "CO | Denver | 199 | 79",
                "url": "https://example.gov/rates/co",
                "structured_data": {"lodging": 199, "meals": 79}
            }
        })))
        .unwrap();
        assert_eq!(record.key, "Denver, CO");
        assert_eq!(record.fields.len(), 2);
        assert_eq!(record.citation.unwrap().title, "https://example.gov/rates/co");
    }

    #[test]
    fn test_collection_urls() {
        let store = QdrantStore::new(&FileStoreConfig::default()).unwrap();
        assert_eq!(store.url("/points/search"), "http://localhost:6333/collections/ragline/points/search");
        assert_eq!(store.url(""), "http://localhost:6333/collections/ragline");
    }
}
