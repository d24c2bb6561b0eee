//! Last-error bookkeeping shared by every public engine operation.
//!
//! The scripting hosts this crate targets cannot catch exceptions, so the
//! engine never propagates failures across its boundary. Instead each public
//! operation resets this state on entry and records any failure here, leaving
//! the outcome queryable through `last_error`/`last_error_detail`.

use std::sync::Mutex;

use crate::error::WardenError;

/// Message reported when no operation has failed since the last reset.
pub const NO_ERROR: &str = "no error";

#[derive(Debug)]
struct StatusInner {
    message: String,
    detail: String,
}

/// Holds the last human-readable error message and optional detail.
///
/// Overwritten on every failing operation, reset on every operation that
/// starts cleanly. Thread-safe; shared between the caller and the engine's
/// background tasks.
#[derive(Debug)]
pub struct StatusState {
    inner: Mutex<StatusInner>,
}

impl StatusState {
    /// Create a status state holding the "no error" sentinel.
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(StatusInner {
                message: NO_ERROR.to_string(),
                detail: String::new(),
            }),
        }
    }

    /// Reset to the "no error" sentinel and clear the detail.
    pub fn reset(&self) {
        if let Ok(mut inner) = self.inner.lock() {
            inner.message.clear();
            inner.message.push_str(NO_ERROR);
            inner.detail.clear();
        }
    }

    /// Overwrite the last-error message, clearing any detail.
    pub fn set_error(&self, message: impl Into<String>) {
        if let Ok(mut inner) = self.inner.lock() {
            inner.message = message.into();
            inner.detail.clear();
        }
    }

    /// Overwrite the last-error message and detail.
    pub fn set_error_with_detail(&self, message: impl Into<String>, detail: impl Into<String>) {
        if let Ok(mut inner) = self.inner.lock() {
            inner.message = message.into();
            inner.detail = detail.into();
        }
    }

    /// Record a failure from the internal error type.
    ///
    /// `context` names the failing operation; the error's debug rendering
    /// lands in the detail field.
    pub fn record(&self, context: &str, err: &WardenError) {
        self.set_error_with_detail(format!("{}: {}", context, err), format!("{:?}", err));
    }

    /// The last error message, or the "no error" sentinel.
    pub fn last_error(&self) -> String {
        self.inner
            .lock()
            .map(|inner| inner.message.clone())
            .unwrap_or_else(|_| "internal lock poisoned".to_string())
    }

    /// Additional detail for the last error, empty if none.
    pub fn last_error_detail(&self) -> String {
        self.inner
            .lock()
            .map(|inner| inner.detail.clone())
            .unwrap_or_default()
    }

    /// True when the state holds the "no error" sentinel.
    pub fn is_clear(&self) -> bool {
        self.last_error() == NO_ERROR
    }
}

impl Default for StatusState {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_starts_clear() {
        let status = StatusState::new();
        assert_eq!(status.last_error(), NO_ERROR);
        assert_eq!(status.last_error_detail(), "");
        assert!(status.is_clear());
    }

    #[test]
    fn test_set_error() {
        let status = StatusState::new();
        status.set_error("something broke");
        assert_eq!(status.last_error(), "something broke");
        assert!(!status.is_clear());
    }

    #[test]
    fn test_set_error_clears_stale_detail() {
        let status = StatusState::new();
        status.set_error_with_detail("first", "detail of first");
        status.set_error("second");
        assert_eq!(status.last_error(), "second");
        assert_eq!(status.last_error_detail(), "");
    }

    #[test]
    fn test_reset_restores_sentinel() {
        let status = StatusState::new();
        status.set_error_with_detail("boom", "stack");
        status.reset();
        assert_eq!(status.last_error(), NO_ERROR);
        assert_eq!(status.last_error_detail(), "");
    }

    #[test]
    fn test_record_includes_context() {
        let status = StatusState::new();
        status.record("unable to kill process", &WardenError::NotRunning);
        assert!(status.last_error().contains("unable to kill process"));
        assert!(status.last_error().contains("not running"));
        assert!(!status.last_error_detail().is_empty());
    }
}
