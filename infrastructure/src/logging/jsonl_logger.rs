//! JSONL file writer for request transcripts.
//!
//! Each [`TranscriptEvent`] is serialized as a single JSON line carrying
//! `type`, `request_id` and `timestamp`, appended through a buffered writer.

use ragline_application::ports::transcript_logger::{TranscriptEvent, TranscriptLogger};
use serde_json::Value;
use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing::warn;

/// JSONL transcript logger that writes one JSON object per line.
///
/// Thread-safe via `Mutex<BufWriter<File>>`. Appends to an existing file.
pub struct JsonlTranscriptLogger {
    writer: Mutex<BufWriter<File>>,
    path: PathBuf,
}

impl JsonlTranscriptLogger {
    /// Open (or create) the transcript file at `path`.
    ///
    /// Returns `None` if the file cannot be opened; callers fall back to no
    /// transcript.
    pub fn new(path: impl AsRef<Path>) -> Option<Self> {
        let path = path.as_ref();

        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
            && let Err(e) = std::fs::create_dir_all(parent)
        {
            warn!(
                "Could not create transcript directory {}: {}",
                parent.display(),
                e
            );
            return None;
        }

        let file = match OpenOptions::new().create(true).append(true).open(path) {
            Ok(f) => f,
            Err(e) => {
                warn!("Could not open transcript file {}: {}", path.display(), e);
                return None;
            }
        };

        Some(Self {
            writer: Mutex::new(BufWriter::new(file)),
            path: path.to_path_buf(),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl TranscriptLogger for JsonlTranscriptLogger {
    fn log(&self, event: TranscriptEvent) {
        let timestamp = chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Millis, true);

        let mut record = match event.payload {
            Value::Object(map) => map,
            other => {
                let mut map = serde_json::Map::new();
                map.insert("data".to_string(), other);
                map
            }
        };
        record.insert("type".to_string(), Value::String(event.event_type.to_string()));
        record.insert("request_id".to_string(), Value::String(event.request_id));
        record.insert("timestamp".to_string(), Value::String(timestamp));

        let Ok(line) = serde_json::to_string(&record) else {
            return;
        };

        if let Ok(mut writer) = self.writer.lock() {
            let _ = writeln!(writer, "{}", line);
            let _ = writer.flush();
        }
    }
}

impl Drop for JsonlTranscriptLogger {
    fn drop(&mut self) {
        if let Ok(mut writer) = self.writer.lock() {
            let _ = writer.flush();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn read_lines(path: &Path) -> Vec<Value> {
        std::fs::read_to_string(path)
            .unwrap()
            .lines()
            .map(|l| serde_json::from_str(l).unwrap())
            .collect()
    }

    #[test]
    fn test_writes_one_line_per_event() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("transcripts").join("ragline.jsonl");
        let logger = JsonlTranscriptLogger::new(&path).unwrap();

        logger.log(TranscriptEvent::new(
            "observation",
            "req-1",
            json!({"content": "Intent structured_lookup", "session_id": "s1"}),
        ));
        logger.log(TranscriptEvent::new("final_answer", "req-1", json!({"content": "199"})));
        drop(logger);

        let lines = read_lines(&path);
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0]["type"], "observation");
        assert_eq!(lines[0]["request_id"], "req-1");
        assert_eq!(lines[0]["session_id"], "s1");
        assert!(lines[1]["timestamp"].as_str().unwrap().ends_with('Z'));
    }

    #[test]
    fn test_non_object_payload_nested_under_data() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("t.jsonl");
        let logger = JsonlTranscriptLogger::new(&path).unwrap();
        logger.log(TranscriptEvent::new("thought", "req-2", json!("plain text")));
        drop(logger);

        let lines = read_lines(&path);
        assert_eq!(lines[0]["data"], "plain text");
        assert_eq!(lines[0]["type"], "thought");
    }

    #[test]
    fn test_reopening_appends() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("t.jsonl");
        for id in ["a", "b"] {
            let logger = JsonlTranscriptLogger::new(&path).unwrap();
            logger.log(TranscriptEvent::new("error", id, json!({})));
        }
        assert_eq!(read_lines(&path).len(), 2);
    }
}
