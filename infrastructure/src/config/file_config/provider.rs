//! Language provider configuration from TOML (`[provider]` section)

use serde::{Deserialize, Serialize};

/// Ollama-compatible provider settings.
///
/// # Example
///
/// ```toml
/// [provider]
/// base_url = "http://localhost:11434"
/// classifier_model = "llama3.1:8b"
/// generator_model = "llama3.1:70b"
/// embedding_model = "nomic-embed-text"
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FileProviderConfig {
    pub base_url: String,
    /// Model used for classification and decomposition.
    pub classifier_model: String,
    /// Model used for answer generation and synthesis.
    pub generator_model: String,
    pub embedding_model: String,
    pub temperature: f64,
    /// Per-call timeout.
    pub timeout_secs: u64,
}

impl Default for FileProviderConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:11434".to_string(),
            classifier_model: "llama3.1:8b".to_string(),
            generator_model: "llama3.1:8b".to_string(),
            embedding_model: "nomic-embed-text".to_string(),
            temperature: 0.1,
            timeout_secs: 30,
        }
    }
}
