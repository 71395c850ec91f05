//! Port definitions (interfaces for external adapters)
//!
//! Ports define the contracts that infrastructure adapters must implement.

pub mod language_provider;
pub mod transcript_logger;
pub mod vector_store;
