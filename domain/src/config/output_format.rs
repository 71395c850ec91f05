//! Output format value object

use serde::{Deserialize, Serialize};

/// How the `ask` entry point renders its result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// One human-readable line per event (default)
    #[default]
    Human,
    /// `event: <type>\ndata: <json>` frames
    Sse,
    /// Final answer only, as JSON
    Json,
}

impl OutputFormat {
    /// Whether the event stream is shown at all.
    pub fn is_streaming(&self) -> bool {
        !matches!(self, OutputFormat::Json)
    }
}
