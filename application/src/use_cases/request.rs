//! Request-scoped state.

use ragline_domain::DatasetSnapshot;
use std::sync::Arc;
use std::time::Instant;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

/// State owned by one request.
///
/// Nothing here is shared with other requests except the read-only
/// snapshot. The retry counter is what guarantees the validate/re-plan loop
/// terminates.
#[derive(Debug, Clone)]
pub struct RequestContext {
    pub request_id: String,
    pub session_id: Option<String>,
    pub snapshot: Arc<DatasetSnapshot>,
    pub cancel: CancellationToken,
    pub started: Instant,
    retries_used: u32,
    max_retries: u32,
}

impl RequestContext {
    pub fn new(snapshot: Arc<DatasetSnapshot>, max_retries: u32) -> Self {
        Self {
            request_id: Uuid::now_v7().to_string(),
            session_id: None,
            snapshot,
            cancel: CancellationToken::new(),
            started: Instant::now(),
            retries_used: 0,
            max_retries,
        }
    }

    pub fn with_session(mut self, session_id: Option<String>) -> Self {
        self.session_id = session_id;
        self
    }

    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    /// Take one retry from the budget; false once it is spent.
    pub fn try_consume_retry(&mut self) -> bool {
        if self.retries_used >= self.max_retries {
            return false;
        }
        self.retries_used += 1;
        true
    }

    pub fn retries_used(&self) -> u32 {
        self.retries_used
    }

    pub fn elapsed_ms(&self) -> u64 {
        self.started.elapsed().as_millis() as u64
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }
}
