//! Ollama provider
//!
//! Endpoints used:
//! - `POST /api/generate` (non-streaming, `format: "json"` for structured calls)
//! - `POST /api/embeddings`
//! - `GET /api/tags` for health

use crate::config::FileProviderConfig;
use crate::error::ConfigError;
use async_trait::async_trait;
use ragline_application::ports::language_provider::{
    Embedder, GenerateRequest, LanguageProvider, ModelRole, ProviderError,
};
use serde::Deserialize;
use serde_json::{Value, json};
use std::time::Duration;
use tracing::debug;

#[derive(Debug, Clone)]
pub struct OllamaProvider {
    client: reqwest::Client,
    base_url: String,
    classifier_model: String,
    generator_model: String,
    embedding_model: String,
    temperature: f64,
}

#[derive(Deserialize)]
struct GenerateResponse {
    response: String,
}

#[derive(Deserialize)]
struct EmbeddingResponse {
    embedding: Vec<f32>,
}

#[derive(Deserialize)]
struct TagsResponse {
    #[serde(default)]
    models: Vec<TagEntry>,
}

#[derive(Deserialize)]
struct TagEntry {
    name: String,
}

impl OllamaProvider {
    pub fn new(config: &FileProviderConfig) -> Result<Self, ConfigError> {
        let timeout = Duration::from_secs(config.timeout_secs.max(1));
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ConfigError::Endpoint(e.to_string()))?;
        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            classifier_model: config.classifier_model.clone(),
            generator_model: config.generator_model.clone(),
            embedding_model: config.embedding_model.clone(),
            temperature: config.temperature,
        })
    }

    fn model_for(&self, role: ModelRole) -> &str {
        match role {
            ModelRole::Classifier => &self.classifier_model,
            ModelRole::Generator => &self.generator_model,
        }
    }

    fn generate_body(&self, request: &GenerateRequest) -> Value {
        let mut body = json!({
            "model": self.model_for(request.role),
            "prompt": request.prompt,
            "stream": false,
            "options": { "temperature": self.temperature },
        });
        if let Some(system) = &request.system {
            body["system"] = Value::String(system.clone());
        }
        if request.expect_structured {
            body["format"] = Value::String("json".to_string());
        }
        body
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn post_json(&self, path: &str, body: &Value) -> Result<Value, ProviderError> {
        let response = self
            .client
            .post(self.url(path))
            .json(body)
            .send()
            .await
            .map_err(transport_error)?;
        read_json(response).await
    }
}

fn transport_error(e: reqwest::Error) -> ProviderError {
    if e.is_timeout() {
        ProviderError::Timeout
    } else {
        ProviderError::Unreachable(e.to_string())
    }
}

async fn read_json(response: reqwest::Response) -> Result<Value, ProviderError> {
    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(ProviderError::Http {
            status: status.as_u16(),
            body,
        });
    }
    response
        .json::<Value>()
        .await
        .map_err(|e| ProviderError::Malformed(e.to_string()))
}

fn decode<T: for<'de> Deserialize<'de>>(value: Value) -> Result<T, ProviderError> {
    serde_json::from_value(value).map_err(|e| ProviderError::Malformed(e.to_string()))
}

#[async_trait]
impl LanguageProvider for OllamaProvider {
    async fn generate(&self, request: &GenerateRequest) -> Result<String, ProviderError> {
        debug!(
            "Ollama generate ({}, structured={})",
            self.model_for(request.role),
            request.expect_structured
        );
        let value = self.post_json("/api/generate", &self.generate_body(request)).await?;
        let reply: GenerateResponse = decode(value)?;
        Ok(reply.response)
    }

    async fn health(&self) -> Result<Vec<String>, ProviderError> {
        let response = self
            .client
            .get(self.url("/api/tags"))
            .send()
            .await
            .map_err(transport_error)?;
        let tags: TagsResponse = decode(read_json(response).await?)?;
        Ok(tags.models.into_iter().map(|m| m.name).collect())
    }
}

#[async_trait]
impl Embedder for OllamaProvider {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, ProviderError> {
        let body = json!({ "model": self.embedding_model, "prompt": text });
        let reply: EmbeddingResponse = decode(self.post_json("/api/embeddings", &body).await?)?;
        if reply.embedding.is_empty() {
            return Err(ProviderError::Malformed("empty embedding".to_string()));
        }
        Ok(reply.embedding)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn provider() -> OllamaProvider {
        let config = FileProviderConfig {
            base_url: "http://localhost:11434/".to_string(),
            classifier_model: "small".to_string(),
            generator_model: "large".to_string(),
            ..FileProviderConfig::default()
        };
        OllamaProvider::new(&config).unwrap()
    }

    #[test]
    fn test_structured_request_asks_for_json() {
        let body = provider().generate_body(&GenerateRequest::structured("classify"));
        assert_eq!(body["model"], "small");
        assert_eq!(body["format"], "json");
        assert_eq!(body["stream"], false);
    }

    #[test]
    fn test_text_request_uses_generator_model() {
        let request = GenerateRequest::text("answer").with_system("be brief");
        let body = provider().generate_body(&request);
        assert_eq!(body["model"], "large");
        assert_eq!(body["system"], "be brief");
        assert!(body.get("format").is_none());
    }

    #[test]
    fn test_base_url_trailing_slash_trimmed() {
        assert_eq!(provider().url("/api/tags"), "http://localhost:11434/api/tags");
    }

    #[test]
    fn test_decode_replies() {
        let reply: GenerateResponse = decode(json!({"response": "hi", "done": true})).unwrap();
        assert_eq!(reply.response, "hi");

        let tags: TagsResponse = decode(json!({"models": [{"name": "llama3.1:8b"}]})).unwrap();
        assert_eq!(tags.models[0].name, "llama3.1:8b");

        let bad: Result<EmbeddingResponse, _> = decode(json!({"vector": []}));
        assert!(matches!(bad, Err(ProviderError::Malformed(_))));
    }

    #[tokio::test]
    async fn test_unreachable_host_is_retryable() {
        let config = FileProviderConfig {
            base_url: "http://127.0.0.1:9".to_string(),
            timeout_secs: 2,
            ..FileProviderConfig::default()
        };
        let err = OllamaProvider::new(&config).unwrap().health().await.unwrap_err();
        assert!(err.is_retryable());
    }
}
