//! # proc-warden
//!
//! Process supervision engine for embedding in scripting hosts.
//!
//! This crate launches and supervises external OS processes on behalf of a
//! caller that cannot itself handle native events or exceptions. It enforces
//! fixed or activity-based timeouts through a watchdog, captures standard
//! output and error either incrementally or in one shot at exit, reports
//! exit status and resource metrics, and surfaces every failure as a plain
//! status flag plus a retrievable last-error message — never as a panic.
//!
//! ## Features
//!
//! - **Supervised execution**: lifecycle state machine with idempotent
//!   teardown from kill, normal exit, or drop
//! - **Timeout watchdog**: restartable single-shot timer; optionally slides
//!   forward on any input/output activity
//! - **Stream capture**: thread-safe per-stream buffers with incremental
//!   drain reads and full-content snapshots
//! - **Non-throwing surface**: every operation returns a success flag and
//!   leaves failure detail queryable
//!
//! ## Quick Start
//!
//! ```no_run
//! use proc_warden::{ProcessConfig, ProcessEngine};
//!
//! #[tokio::main]
//! async fn main() {
//!     // Initialize logging
//!     proc_warden::logging::try_init().ok();
//!
//!     let engine = ProcessEngine::with_config(
//!         ProcessConfig::new("/bin/echo")
//!             .arg("hello")
//!             .capture_output()
//!             .timeout_ms(5_000),
//!     );
//!
//!     if engine.start().await && engine.wait_for_exit().await {
//!         println!("{}", engine.output());
//!     } else {
//!         eprintln!("{}", engine.last_error());
//!     }
//! }
//! ```

pub mod buffer;
pub mod config;
pub mod credential;
pub mod encoding;
pub mod engine;
pub mod error;
pub mod logging;
pub mod priority;
pub mod status;
pub mod watchdog;

// Re-export commonly used types
pub use buffer::StreamBuffer;
pub use config::{ProcessConfig, WindowMode, DEFAULT_TIMEOUT_MS};
pub use credential::{Credentials, Secret};
pub use encoding::OutputEncoding;
pub use engine::{ProcessEngine, RunMetrics};
pub use error::{Result, WardenError};
pub use priority::PriorityClass;
pub use status::{StatusState, NO_ERROR};
pub use watchdog::Watchdog;
