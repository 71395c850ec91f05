//! Test doubles for the ports.

use crate::ports::language_provider::{Embedder, GenerateRequest, LanguageProvider, ProviderError};
use crate::ports::vector_store::{SearchFilter, StoreError, VectorStore};
use async_trait::async_trait;
use ragline_domain::{Citation, DatasetRecord, RetrievedChunk};
use std::collections::{BTreeMap, VecDeque};
use std::sync::Mutex;

type Responder = Box<dyn Fn(&GenerateRequest) -> Result<String, ProviderError> + Send + Sync>;

/// Replies from a script in order, then from a responder if one is set.
pub(crate) struct MockProvider {
    script: Mutex<VecDeque<Result<String, ProviderError>>>,
    responder: Option<Responder>,
    pub requests: Mutex<Vec<GenerateRequest>>,
}

impl MockProvider {
    pub fn scripted(replies: Vec<Result<String, ProviderError>>) -> Self {
        Self {
            script: Mutex::new(replies.into()),
            responder: None,
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn responding(
        f: impl Fn(&GenerateRequest) -> Result<String, ProviderError> + Send + Sync + 'static,
    ) -> Self {
        Self {
            script: Mutex::new(VecDeque::new()),
            responder: Some(Box::new(f)),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn call_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }
}

#[async_trait]
impl LanguageProvider for MockProvider {
    async fn generate(&self, request: &GenerateRequest) -> Result<String, ProviderError> {
        self.requests.lock().unwrap().push(request.clone());
        if let Some(reply) = self.script.lock().unwrap().pop_front() {
            return reply;
        }
        match &self.responder {
            Some(f) => f(request),
            None => Err(ProviderError::Unreachable("script exhausted".to_string())),
        }
    }

    async fn health(&self) -> Result<Vec<String>, ProviderError> {
        Ok(vec!["mock".to_string()])
    }
}

pub(crate) struct MockEmbedder;

#[async_trait]
impl Embedder for MockEmbedder {
    async fn embed(&self, _text: &str) -> Result<Vec<f32>, ProviderError> {
        Ok(vec![1.0, 0.0, 0.0])
    }
}

#[derive(Default)]
pub(crate) struct MockStore {
    pub chunks: Vec<RetrievedChunk>,
    pub records: BTreeMap<String, DatasetRecord>,
    pub down: bool,
    pub searches: Mutex<Vec<usize>>,
}

impl MockStore {
    pub fn with_chunks(chunks: Vec<RetrievedChunk>) -> Self {
        Self {
            chunks,
            ..Self::default()
        }
    }
}

#[async_trait]
impl VectorStore for MockStore {
    async fn search(
        &self,
        _vector: &[f32],
        _filter: &SearchFilter,
        top_k: usize,
    ) -> Result<Vec<RetrievedChunk>, StoreError> {
        self.searches.lock().unwrap().push(top_k);
        if self.down {
            return Err(StoreError::Unreachable("connection refused".to_string()));
        }
        Ok(self.chunks.iter().take(top_k).cloned().collect())
    }

    async fn get(&self, key: &str) -> Result<DatasetRecord, StoreError> {
        self.records
            .get(key)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(key.to_string()))
    }

    async fn health(&self) -> Result<(), StoreError> {
        if self.down {
            Err(StoreError::Unreachable("connection refused".to_string()))
        } else {
            Ok(())
        }
    }
}

pub(crate) fn chunk(id: &str, text: &str, score: f64) -> RetrievedChunk {
    RetrievedChunk {
        id: id.to_string(),
        text: text.to_string(),
        score,
        citation: Citation::new(format!("https://docs.example.gov/{}", id), format!("Doc {}", id)),
    }
}

pub(crate) fn classification_json(intent: &str, confidence: f64, extra: &str) -> String {
    format!(
        r#"{{"intent_type": "{}", "confidence": {}, "reasoning": "test"{}}}"#,
        intent, confidence, extra
    )
}
