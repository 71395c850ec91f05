//! Ollama HTTP adapter for the language provider and embedder ports.

mod provider;

pub use provider::OllamaProvider;
