//! Vector / structured store port

use async_trait::async_trait;
use ragline_domain::{DatasetRecord, RetrievedChunk};
use std::collections::BTreeMap;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum StoreError {
    #[error("Store unreachable: {0}")]
    Unreachable(String),

    #[error("Store timed out")]
    Timeout,

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Malformed store response: {0}")]
    Malformed(String),

    #[error("Operation cancelled")]
    Cancelled,
}

impl StoreError {
    pub fn is_retryable(&self) -> bool {
        matches!(self, StoreError::Unreachable(_) | StoreError::Timeout)
    }
}

/// Exact-match payload filter (`field == value` for every entry).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SearchFilter {
    pub must: BTreeMap<String, String>,
}

impl SearchFilter {
    pub fn with(mut self, field: impl Into<String>, value: impl Into<String>) -> Self {
        self.must.insert(field.into(), value.into());
        self
    }

    pub fn is_empty(&self) -> bool {
        self.must.is_empty()
    }
}

#[async_trait]
pub trait VectorStore: Send + Sync {
    /// Nearest chunks to `vector`, best first.
    async fn search(
        &self,
        vector: &[f32],
        filter: &SearchFilter,
        top_k: usize,
    ) -> Result<Vec<RetrievedChunk>, StoreError>;

    /// Structured record by canonical key.
    async fn get(&self, key: &str) -> Result<DatasetRecord, StoreError>;

    async fn health(&self) -> Result<(), StoreError>;
}
