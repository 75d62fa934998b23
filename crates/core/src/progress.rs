//! Output accumulation and progress broadcast payloads.
//!
//! The accumulator keeps the full per-stream buffers for persistence
//! while handing back only the newly arrived text, so broadcast payloads
//! stay small no matter how long the job has been running. Persistence
//! is batched: the store is written once per threshold crossing, not
//! once per output line.

use std::time::{Duration, Instant};

use serde::Serialize;

use crate::status::JobStatus;
use crate::supervisor::StreamKind;
use crate::types::DbId;

/// Maximum buffered size per stream (10 MiB). Output beyond this limit
/// is dropped from the buffer to prevent memory exhaustion from
/// extremely verbose tools; deltas keep flowing.
const MAX_BUFFER_BYTES: usize = 10 * 1024 * 1024;

/// When accumulated output should be flushed to the job record store.
#[derive(Debug, Clone)]
pub struct PersistPolicy {
    /// Flush after this many unsaved lines.
    pub max_lines: usize,
    /// Flush when this much time has passed since the last flush and
    /// unsaved output exists.
    pub max_interval: Duration,
}

impl Default for PersistPolicy {
    fn default() -> Self {
        Self {
            max_lines: 25,
            max_interval: Duration::from_secs(2),
        }
    }
}

/// The newly arrived text from a single chunk, split by stream. At most
/// one side is non-empty per [`ProgressAccumulator::on_chunk`] call.
#[derive(Debug, Clone, Default)]
pub struct OutputDelta {
    pub log_data: String,
    pub error_data: String,
}

/// Accumulates streamed process output and decides when to persist.
pub struct ProgressAccumulator {
    log: String,
    error: String,
    unsaved_lines: usize,
    last_persist: Instant,
    policy: PersistPolicy,
}

impl ProgressAccumulator {
    pub fn new(policy: PersistPolicy) -> Self {
        Self {
            log: String::new(),
            error: String::new(),
            unsaved_lines: 0,
            last_persist: Instant::now(),
            policy,
        }
    }

    /// Append a chunk to the matching stream buffer and return the delta
    /// carrying only the newly arrived text.
    pub fn on_chunk(&mut self, stream: StreamKind, text: &str) -> OutputDelta {
        let buffer = match stream {
            StreamKind::Stdout => &mut self.log,
            StreamKind::Stderr => &mut self.error,
        };
        if buffer.len() < MAX_BUFFER_BYTES {
            buffer.push_str(text);
        }
        self.unsaved_lines += 1;

        match stream {
            StreamKind::Stdout => OutputDelta {
                log_data: text.to_string(),
                ..Default::default()
            },
            StreamKind::Stderr => OutputDelta {
                error_data: text.to_string(),
                ..Default::default()
            },
        }
    }

    /// Whether a periodic flush to the store is due.
    pub fn should_persist(&self) -> bool {
        self.unsaved_lines > 0
            && (self.unsaved_lines >= self.policy.max_lines
                || self.last_persist.elapsed() >= self.policy.max_interval)
    }

    /// Reset the batching counters after a successful flush.
    pub fn mark_persisted(&mut self) {
        self.unsaved_lines = 0;
        self.last_persist = Instant::now();
    }

    /// The full accumulated buffers, in per-stream arrival order.
    pub fn snapshot(&self) -> (&str, &str) {
        (&self.log, &self.error)
    }
}

/// One progress update broadcast to every live viewer of a session.
///
/// Immutable once constructed; `log_data`/`error_data` carry only the
/// delta for this event and `message` is set only on the start and
/// terminal events.
#[derive(Debug, Clone, Serialize)]
pub struct ProgressEvent {
    pub job_id: DbId,
    pub status: JobStatus,
    pub session_id: String,
    pub log_data: String,
    pub error_data: String,
    pub message: String,
}

impl ProgressEvent {
    /// Create a status-only event with empty deltas and message.
    pub fn new(job_id: DbId, session_id: impl Into<String>, status: JobStatus) -> Self {
        Self {
            job_id,
            status,
            session_id: session_id.into(),
            log_data: String::new(),
            error_data: String::new(),
            message: String::new(),
        }
    }

    /// Attach a human-readable note (start and terminal events only).
    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = message.into();
        self
    }

    /// Attach the newly arrived output text.
    pub fn with_delta(mut self, delta: OutputDelta) -> Self {
        self.log_data = delta.log_data;
        self.error_data = delta.error_data;
        self
    }

    /// The event as the JSON object published to the session group.
    pub fn to_value(&self) -> serde_json::Value {
        serde_json::json!({
            "job_id": self.job_id,
            "status": self.status,
            "session_id": self.session_id,
            "log_data": self.log_data,
            "error_data": self.error_data,
            "message": self.message,
        })
    }
}
