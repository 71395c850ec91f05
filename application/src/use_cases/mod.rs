//! Use cases
//!
//! Application-level operations that orchestrate domain logic.

pub mod classify_intent;
pub mod dispatch;
pub mod emitter;
pub mod plan_query;
pub mod rag_search;
pub mod request;
pub mod run_ask;
pub(crate) mod shared;
