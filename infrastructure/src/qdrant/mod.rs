//! Qdrant HTTP adapter for the vector store port.

mod store;

pub use store::QdrantStore;
