//! Launch configuration for a supervised process.
//!
//! Configuration is caller-set and immutable once a run begins; the engine
//! snapshots it at start. A config can also be loaded from a JSON file with
//! environment-variable overrides, with the same priority chain used for the
//! rest of the crate's configuration: env vars > file > defaults.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::encoding::OutputEncoding;
use crate::priority::PriorityClass;

/// Default timeout applied when the configured value is zero or negative:
/// five minutes.
pub const DEFAULT_TIMEOUT_MS: u64 = 5 * 60 * 1000;

/// Window visibility mode requested for the launched process.
///
/// Stored for start-parameter parity with hosts that have a window concept;
/// it has no effect on unix.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WindowMode {
    /// Normal window.
    #[default]
    Normal,
    /// No window shown.
    Hidden,
    /// Minimized window.
    Minimized,
    /// Maximized window.
    Maximized,
}

/// Caller-set start parameters for one supervised run.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProcessConfig {
    /// Executable path. Resolved via the environment path when relative.
    pub file_name: String,
    /// Command-line arguments.
    pub arguments: Vec<String>,
    /// Working directory; applied only when non-empty.
    pub working_dir: Option<PathBuf>,
    /// Window visibility mode.
    pub window_mode: WindowMode,
    /// Launch through the OS shell instead of direct process creation.
    ///
    /// Forced off whenever any stream is redirected, because redirection
    /// requires direct process creation.
    pub use_shell_execute: bool,
    /// Redirect standard input for writing.
    pub redirect_stdin: bool,
    /// Capture standard output.
    pub redirect_stdout: bool,
    /// Capture standard error.
    pub redirect_stderr: bool,
    /// Encoding used to decode captured standard output.
    pub output_encoding: OutputEncoding,
    /// Encoding used to decode captured standard error.
    pub error_encoding: OutputEncoding,
    /// Timeout in milliseconds; a value <= 0 selects the default (5 minutes).
    pub timeout_ms: i64,
    /// Slide the timeout deadline forward on any input/output activity
    /// instead of fixing it at launch. Must be set before start.
    pub activity_timeout: bool,
    /// Scheduling priority applied at launch.
    pub priority: PriorityClass,
    /// Processor-affinity mask applied at launch; zero leaves it untouched.
    pub processor_affinity: u64,
    /// Environment variables set on the launched process.
    pub env: HashMap<String, String>,
}

impl Default for ProcessConfig {
    fn default() -> Self {
        Self {
            file_name: String::new(),
            arguments: Vec::new(),
            working_dir: None,
            window_mode: WindowMode::Normal,
            use_shell_execute: true,
            redirect_stdin: false,
            redirect_stdout: false,
            redirect_stderr: false,
            output_encoding: OutputEncoding::default(),
            error_encoding: OutputEncoding::default(),
            timeout_ms: DEFAULT_TIMEOUT_MS as i64,
            activity_timeout: false,
            priority: PriorityClass::Normal,
            processor_affinity: 0,
            env: HashMap::new(),
        }
    }
}

impl ProcessConfig {
    /// Create a config for the given executable.
    pub fn new(file_name: impl Into<String>) -> Self {
        Self {
            file_name: file_name.into(),
            ..Default::default()
        }
    }

    /// Add a command-line argument.
    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.arguments.push(arg.into());
        self
    }

    /// Add multiple command-line arguments.
    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.arguments.extend(args.into_iter().map(Into::into));
        self
    }

    /// Set the working directory.
    pub fn working_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.working_dir = Some(dir.into());
        self
    }

    /// Add an environment variable.
    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.insert(key.into(), value.into());
        self
    }

    /// Set the timeout.
    pub fn timeout(mut self, duration: Duration) -> Self {
        self.timeout_ms = duration.as_millis() as i64;
        self
    }

    /// Set the timeout in milliseconds. Values <= 0 select the default.
    pub fn timeout_ms(mut self, ms: i64) -> Self {
        self.timeout_ms = ms;
        self
    }

    /// Enable or disable activity-based timeout.
    pub fn activity_timeout(mut self, enabled: bool) -> Self {
        self.activity_timeout = enabled;
        self
    }

    /// Redirect all three standard streams.
    pub fn redirect_all(mut self) -> Self {
        self.redirect_stdin = true;
        self.redirect_stdout = true;
        self.redirect_stderr = true;
        self
    }

    /// Capture standard output and standard error.
    pub fn capture_output(mut self) -> Self {
        self.redirect_stdout = true;
        self.redirect_stderr = true;
        self
    }

    /// True when any standard stream is redirected.
    pub fn any_redirection(&self) -> bool {
        self.redirect_stdin || self.redirect_stdout || self.redirect_stderr
    }

    /// The effective timeout: the configured value, or the 5-minute default
    /// when the configured value is zero or negative.
    pub fn effective_timeout(&self) -> Duration {
        if self.timeout_ms <= 0 {
            Duration::from_millis(DEFAULT_TIMEOUT_MS)
        } else {
            Duration::from_millis(self.timeout_ms as u64)
        }
    }

    /// Load a config from a JSON file.
    pub fn from_file(path: &Path) -> std::io::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        serde_json::from_str(&content)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))
    }

    /// Apply environment-variable overrides.
    ///
    /// `PROC_WARDEN_TIMEOUT_MS` overrides the timeout and
    /// `PROC_WARDEN_WORKING_DIR` the working directory.
    pub fn apply_env(&mut self) {
        if let Ok(ms) = std::env::var("PROC_WARDEN_TIMEOUT_MS") {
            if let Ok(ms) = ms.parse() {
                self.timeout_ms = ms;
            }
        }
        if let Ok(dir) = std::env::var("PROC_WARDEN_WORKING_DIR") {
            if !dir.is_empty() {
                self.working_dir = Some(PathBuf::from(dir));
            }
        }
    }
}
