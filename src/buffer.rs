//! Thread-safe sink for a process's captured stream text.
//!
//! Each supervised run owns two independent buffers, one per stream. Chunks
//! arrive from background pump tasks while the host reads from its own
//! thread, so every access goes through one internal lock.

use std::collections::VecDeque;
use std::sync::Mutex;

#[derive(Debug, Default)]
struct BufferInner {
    /// Accumulated full text since the last clear.
    log: String,
    /// Chunks appended but not yet consumed by an incremental read.
    pending: VecDeque<String>,
}

/// Append-only sink for text chunks from a process output or error stream.
///
/// Supports incremental drain-and-clear reads and a full-content snapshot.
/// Every chunk appended is visible exactly once through [`read`](Self::read)
/// and always visible in [`snapshot`](Self::snapshot) until
/// [`clear`](Self::clear).
#[derive(Debug, Default)]
pub struct StreamBuffer {
    inner: Mutex<BufferInner>,
}

impl StreamBuffer {
    /// Create an empty buffer.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a chunk to the pending queue and the full-text log.
    pub fn append(&self, chunk: impl Into<String>) {
        let chunk = chunk.into();
        if let Ok(mut inner) = self.inner.lock() {
            inner.log.push_str(&chunk);
            inner.pending.push_back(chunk);
        }
    }

    /// Append a chunk followed by a newline.
    pub fn append_line(&self, line: &str) {
        let mut chunk = String::with_capacity(line.len() + 1);
        chunk.push_str(line);
        chunk.push('\n');
        self.append(chunk);
    }

    /// Atomically dequeue and concatenate all pending chunks.
    ///
    /// Returns empty text if nothing is pending. Does not affect the
    /// full-text log.
    pub fn read(&self) -> String {
        let Ok(mut inner) = self.inner.lock() else {
            return String::new();
        };
        if inner.pending.is_empty() {
            return String::new();
        }
        let mut out = String::new();
        while let Some(chunk) = inner.pending.pop_front() {
            out.push_str(&chunk);
        }
        out
    }

    /// Full accumulated text since the last clear, regardless of reads.
    pub fn snapshot(&self) -> String {
        self.inner
            .lock()
            .map(|inner| inner.log.clone())
            .unwrap_or_default()
    }

    /// True iff at least one chunk is pending an incremental read.
    pub fn has_unread_data(&self) -> bool {
        self.inner
            .lock()
            .map(|inner| !inner.pending.is_empty())
            .unwrap_or(false)
    }

    /// Empty both the log and the pending queue.
    pub fn clear(&self) {
        if let Ok(mut inner) = self.inner.lock() {
            inner.log.clear();
            inner.pending.clear();
        }
    }
}
