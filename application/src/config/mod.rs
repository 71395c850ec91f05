//! Application-level configuration.
//!
//! - [`PipelineParams`]: thresholds, retry budget, retrieval limits, timeouts

pub mod params;

pub use params::{MAX_RETRIES_CAP, PipelineParams};
