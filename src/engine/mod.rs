//! Process execution engine.
//!
//! [`ProcessEngine`] launches and supervises one OS process at a time on
//! behalf of a host that cannot handle native events or exceptions. Every
//! public operation resets the last-error state on entry, returns a plain
//! success flag, and records failures for retrieval through
//! [`last_error`](ProcessEngine::last_error) — nothing escapes the engine
//! boundary as a panic or error value.
//!
//! # Example
//!
//! ```no_run
//! use proc_warden::{ProcessConfig, ProcessEngine};
//!
//! #[tokio::main]
//! async fn main() {
//!     let engine = ProcessEngine::with_config(
//!         ProcessConfig::new("/bin/echo").arg("hello").capture_output(),
//!     );
//!     if engine.start().await && engine.wait_for_exit().await {
//!         println!("exit code {:?}: {}", engine.exit_code(), engine.output());
//!     } else {
//!         eprintln!("run failed: {}", engine.last_error());
//!     }
//! }
//! ```

mod launcher;
mod metrics;
mod run;

pub use metrics::RunMetrics;

use std::sync::{Arc, Mutex, MutexGuard, RwLock, RwLockWriteGuard};
use std::time::Instant;

use chrono::{DateTime, Utc};
use tokio::io::AsyncWriteExt;
use tokio::process::ChildStdin;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::buffer::StreamBuffer;
use crate::config::ProcessConfig;
use crate::credential::Credentials;
use crate::encoding::OutputEncoding;
use crate::error::{Result, WardenError};
use crate::priority::PriorityClass;
use crate::status::StatusState;
use crate::watchdog::Watchdog;

use metrics::MemorySampler;
use run::{RunShared, RunState};

/// Handles tied to the current run, retired on teardown.
struct ActiveRun {
    exit_rx: watch::Receiver<bool>,
    kill_tx: mpsc::UnboundedSender<()>,
    watchdog: Watchdog,
    stdin: Option<Arc<tokio::sync::Mutex<ChildStdin>>>,
    supervisor: JoinHandle<()>,
    activity_timeout: bool,
}

/// Supervises the execution of one external OS process at a time.
///
/// Thread-safe: operations take `&self` and may be issued while background
/// stream pumps, the exit supervisor, and the timeout watchdog run
/// concurrently. The engine is reusable — teardown returns it to idle,
/// ready for the next start.
pub struct ProcessEngine {
    config: RwLock<ProcessConfig>,
    credentials: Mutex<Credentials>,
    status: Arc<StatusState>,
    stdout_buf: Arc<StreamBuffer>,
    stderr_buf: Arc<StreamBuffer>,
    shared: Arc<RunShared>,
    sampler: Mutex<MemorySampler>,
    active: Mutex<Option<ActiveRun>>,
}

impl ProcessEngine {
    /// Create an engine with a default (empty) configuration.
    pub fn new() -> Self {
        Self::with_config(ProcessConfig::default())
    }

    /// Create an engine with the given launch configuration.
    pub fn with_config(config: ProcessConfig) -> Self {
        Self {
            config: RwLock::new(config),
            credentials: Mutex::new(Credentials::new()),
            status: Arc::new(StatusState::new()),
            stdout_buf: Arc::new(StreamBuffer::new()),
            stderr_buf: Arc::new(StreamBuffer::new()),
            shared: Arc::new(RunShared::new()),
            sampler: Mutex::new(MemorySampler::new()),
            active: Mutex::new(None),
        }
    }

    // ---- control operations -------------------------------------------------

    /// Launch the configured process with synchronous output capture.
    ///
    /// Captured streams are appended to the buffers in one shot when the
    /// process exits. Fails when a process is already running.
    pub async fn start(&self) -> bool {
        self.status.reset();
        self.record("unable to start process", self.start_inner(false))
    }

    /// Launch the configured process, choosing the output capture mode.
    ///
    /// With `async_output` the captured streams are pumped line by line into
    /// the buffers while the process runs, readable incrementally through
    /// [`output_read`](Self::output_read) / [`error_output_read`](Self::error_output_read).
    pub async fn start_with_async_output(&self, async_output: bool) -> bool {
        self.status.reset();
        self.record("unable to start process", self.start_inner(async_output))
    }

    /// Run the configured process to completion: force both output streams
    /// captured, start, and wait for exit.
    pub async fn run(&self) -> bool {
        self.status.reset();
        let prepared = if self.shared.is_running() {
            Err(WardenError::AlreadyRunning)
        } else {
            self.guarded_config_mut().map(|mut config| {
                config.redirect_stdout = true;
                config.redirect_stderr = true;
            })
        };
        if !self.record("unable to run process", prepared) {
            return false;
        }
        if !self.record("unable to run process", self.start_inner(false)) {
            return false;
        }
        let waited = self.wait_inner().await;
        self.record("unable to run process", waited)
    }

    /// Block until the process terminates and its exit bookkeeping is done.
    ///
    /// Returns immediately once the run has already finished. Fails with a
    /// not-running error when no process was ever started, and with a wait
    /// error when the native wait failed.
    pub async fn wait_for_exit(&self) -> bool {
        self.status.reset();
        let waited = self.wait_inner().await;
        self.record("unable to wait for process exit", waited)
    }

    /// Terminate the running process and collect its exit code and end time.
    ///
    /// Fails when the process is not running. Racing against a watchdog kill
    /// (or a second caller) is safe: termination of an already-exited
    /// process is a no-op and the exit bookkeeping happens exactly once.
    pub async fn kill(&self) -> bool {
        self.status.reset();
        let killed = self.kill_inner().await;
        self.record("unable to kill process", killed)
    }

    /// Write text to the process standard input, flushing immediately.
    pub async fn input_write(&self, text: &str) -> bool {
        self.status.reset();
        let wrote = self.input_inner(text, false).await;
        self.record("unable to write process input", wrote)
    }

    /// Write text followed by a newline to the process standard input.
    pub async fn input_write_line(&self, text: &str) -> bool {
        self.status.reset();
        let wrote = self.input_inner(text, true).await;
        self.record("unable to write process input", wrote)
    }

    /// Change the processor affinity of the running process immediately.
    ///
    /// Unlike [`set_processor_affinity`](Self::set_processor_affinity) this
    /// applies to the live process rather than the stored configuration, and
    /// requires the process to be running.
    pub fn apply_processor_affinity(&self, mask: u64) -> bool {
        self.status.reset();
        let applied = self.apply_affinity_inner(mask);
        self.record("unable to apply processor affinity", applied)
    }

    /// Re-sample the memory counters of the running process.
    pub fn refresh(&self) -> bool {
        self.status.reset();
        let refreshed = self.refresh_inner();
        self.record("unable to refresh process metrics", refreshed)
    }

    /// Idempotent teardown: kill a running process, wait for the in-flight
    /// exit bookkeeping, and release the run handles.
    ///
    /// Safe to call multiple times and safe to call while running or
    /// concurrently with a kill; dropping the engine converges on the same
    /// teardown through the kill-on-drop child and task cleanup.
    pub async fn shutdown(&self) -> bool {
        self.status.reset();
        let down = self.shutdown_inner().await;
        self.record("unable to shut down", down)
    }

    // ---- configuration ------------------------------------------------------

    /// Replace the whole launch configuration. Rejected while running.
    pub fn configure(&self, config: ProcessConfig) -> bool {
        self.status.reset();
        let set = self.guarded_config_mut().map(|mut current| *current = config);
        self.record("unable to configure", set)
    }

    /// A snapshot of the current launch configuration.
    pub fn config(&self) -> ProcessConfig {
        self.config
            .read()
            .map(|config| config.clone())
            .unwrap_or_default()
    }

    /// Set the executable path. Rejected while running.
    pub fn set_file_name(&self, file_name: &str) -> bool {
        self.status.reset();
        let set = self
            .guarded_config_mut()
            .map(|mut config| config.file_name = file_name.to_string());
        self.record("unable to set file name", set)
    }

    /// Set the command-line arguments. Rejected while running.
    pub fn set_arguments<I, S>(&self, args: I) -> bool
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.status.reset();
        let set = self
            .guarded_config_mut()
            .map(|mut config| config.arguments = args.into_iter().map(Into::into).collect());
        self.record("unable to set arguments", set)
    }

    /// Set the working directory. Rejected while running.
    pub fn set_working_dir(&self, dir: &str) -> bool {
        self.status.reset();
        let set = self.guarded_config_mut().map(|mut config| {
            config.working_dir = if dir.is_empty() {
                None
            } else {
                Some(dir.into())
            };
        });
        self.record("unable to set working directory", set)
    }

    /// Set the window visibility mode. Rejected while running.
    pub fn set_window_mode(&self, mode: crate::config::WindowMode) -> bool {
        self.status.reset();
        let set = self
            .guarded_config_mut()
            .map(|mut config| config.window_mode = mode);
        self.record("unable to set window mode", set)
    }

    /// Launch through the OS shell instead of direct process creation.
    /// Ignored whenever any stream is redirected. Rejected while running.
    pub fn set_use_shell_execute(&self, enabled: bool) -> bool {
        self.status.reset();
        let set = self
            .guarded_config_mut()
            .map(|mut config| config.use_shell_execute = enabled);
        self.record("unable to set shell execute", set)
    }

    /// Choose which standard streams are redirected. Rejected while running.
    pub fn set_redirects(&self, stdin: bool, stdout: bool, stderr: bool) -> bool {
        self.status.reset();
        let set = self.guarded_config_mut().map(|mut config| {
            config.redirect_stdin = stdin;
            config.redirect_stdout = stdout;
            config.redirect_stderr = stderr;
        });
        self.record("unable to set stream redirection", set)
    }

    /// Set the timeout in milliseconds; values <= 0 select the 5-minute
    /// default. Rejected while running.
    pub fn set_timeout_ms(&self, ms: i64) -> bool {
        self.status.reset();
        let set = self
            .guarded_config_mut()
            .map(|mut config| config.timeout_ms = ms);
        self.record("unable to set timeout", set)
    }

    /// Enable or disable activity-based timeout. Rejected while running.
    pub fn set_activity_timeout(&self, enabled: bool) -> bool {
        self.status.reset();
        let set = self
            .guarded_config_mut()
            .map(|mut config| config.activity_timeout = enabled);
        self.record("unable to set activity timeout", set)
    }

    /// Select the priority class by name (case-insensitive: `idle`,
    /// `belownormal`, `normal`, `abovenormal`, `high`, `realtime`).
    /// Rejected while running; an unknown name changes nothing.
    pub fn set_priority_class(&self, name: &str) -> bool {
        self.status.reset();
        let set = PriorityClass::from_name(name)
            .and_then(|priority| self.guarded_config_mut().map(|mut c| c.priority = priority));
        self.record("unable to set priority class", set)
    }

    /// Store the processor-affinity mask in the configuration, applied at
    /// the next launch. Rejected while running — use
    /// [`apply_processor_affinity`](Self::apply_processor_affinity) on a
    /// live process.
    pub fn set_processor_affinity(&self, mask: u64) -> bool {
        self.status.reset();
        let set = self
            .guarded_config_mut()
            .map(|mut config| config.processor_affinity = mask);
        self.record("unable to set processor affinity", set)
    }

    /// Select the standard-output encoding by name (case-insensitive:
    /// `ascii`, `utf8`, `unicode`, `bigendianunicode`, `utf32`).
    /// Rejected while running; an unknown name changes nothing.
    pub fn set_output_encoding(&self, name: &str) -> bool {
        self.status.reset();
        let set = OutputEncoding::from_name(name)
            .and_then(|enc| self.guarded_config_mut().map(|mut c| c.output_encoding = enc));
        self.record("unable to set output encoding", set)
    }

    /// Select the standard-error encoding by name. Same accepted set as
    /// [`set_output_encoding`](Self::set_output_encoding).
    pub fn set_error_output_encoding(&self, name: &str) -> bool {
        self.status.reset();
        let set = OutputEncoding::from_name(name)
            .and_then(|enc| self.guarded_config_mut().map(|mut c| c.error_encoding = enc));
        self.record("unable to set error output encoding", set)
    }

    /// Set the run-as username. Empty clears it.
    pub fn set_user_name(&self, username: &str) -> bool {
        self.status.reset();
        let set = self
            .credentials()
            .map(|mut creds| creds.set_username(username));
        self.record("unable to set user name", set)
    }

    /// Set the run-as domain. Empty clears it.
    pub fn set_user_domain(&self, domain: &str) -> bool {
        self.status.reset();
        let set = self.credentials().map(|mut creds| creds.set_domain(domain));
        self.record("unable to set user domain", set)
    }

    /// Set or clear the run-as password.
    ///
    /// An empty string clears any held secret and succeeds even when none
    /// was set. The secret participates in a launch only when username,
    /// domain, and password are all present.
    pub fn set_password(&self, password: &str) -> bool {
        self.status.reset();
        let set = self
            .credentials()
            .map(|mut creds| creds.set_password(password));
        self.record("unable to set password", set)
    }

    // ---- queries ------------------------------------------------------------

    /// True from a successful start until the engine is reset by the next
    /// start.
    pub fn is_started(&self) -> bool {
        self.shared.read(|st| st.is_started)
    }

    /// True while the process is running.
    pub fn is_running(&self) -> bool {
        self.shared.is_running()
    }

    /// True when the last run was terminated by the timeout watchdog.
    pub fn did_timeout(&self) -> bool {
        self.shared.read(|st| st.did_timeout)
    }

    /// Exit code of the finished process. On unix a signal-terminated
    /// process reports the negated signal number.
    pub fn exit_code(&self) -> Option<i32> {
        self.shared.read(|st| st.metrics.exit_code)
    }

    /// OS process identifier of the current or most recent run.
    pub fn process_id(&self) -> Option<u32> {
        self.shared.read(|st| st.pid)
    }

    /// When the process was started.
    pub fn started_on(&self) -> Option<DateTime<Utc>> {
        self.shared.read(|st| st.started_on)
    }

    /// When the process ended.
    pub fn ended_on(&self) -> Option<DateTime<Utc>> {
        self.shared.read(|st| st.ended_on)
    }

    /// Wall-clock runtime of the finished process in milliseconds.
    pub fn run_time_ms(&self) -> u64 {
        self.shared.read(|st| st.metrics.run_time_ms)
    }

    /// Total CPU time of the finished process in milliseconds.
    pub fn cpu_time_ms(&self) -> u64 {
        self.shared.read(|st| st.metrics.total_cpu_ms)
    }

    /// User-mode CPU time of the finished process in milliseconds.
    pub fn user_cpu_time_ms(&self) -> u64 {
        self.shared.read(|st| st.metrics.user_cpu_ms)
    }

    /// Snapshot of the run metrics (exit code, timing, memory counters).
    pub fn metrics(&self) -> RunMetrics {
        self.shared.read(|st| st.metrics.clone())
    }

    /// Drain and return output not yet seen by an incremental read.
    pub fn output_read(&self) -> String {
        self.stdout_buf.read()
    }

    /// Drain and return error output not yet seen by an incremental read.
    pub fn error_output_read(&self) -> String {
        self.stderr_buf.read()
    }

    /// Full captured output since the run started.
    pub fn output(&self) -> String {
        self.stdout_buf.snapshot()
    }

    /// Full captured error output since the run started.
    pub fn error_output(&self) -> String {
        self.stderr_buf.snapshot()
    }

    /// True when unread output is pending an incremental read.
    pub fn is_output_available(&self) -> bool {
        self.stdout_buf.has_unread_data()
    }

    /// True when unread error output is pending an incremental read.
    pub fn is_error_available(&self) -> bool {
        self.stderr_buf.has_unread_data()
    }

    /// Merged convenience view over both captured streams.
    ///
    /// Returns the full output when non-empty, otherwise the full error
    /// output, otherwise a placeholder when the process failed silently.
    /// The two underlying buffers stay independent.
    pub fn program_output(&self) -> String {
        let output = self.stdout_buf.snapshot();
        if !output.is_empty() {
            return output;
        }
        let error = self.stderr_buf.snapshot();
        if !error.is_empty() {
            return error;
        }
        let failed_silently = self.shared.read(|st| {
            st.is_started && !st.is_running && st.metrics.exit_code.map_or(false, |c| c != 0)
        });
        if failed_silently {
            "unreported error occurred".to_string()
        } else {
            String::new()
        }
    }

    /// The last error message, or `"no error"`.
    pub fn last_error(&self) -> String {
        self.status.last_error()
    }

    /// Additional detail for the last error, empty if none.
    pub fn last_error_detail(&self) -> String {
        self.status.last_error_detail()
    }

    // ---- internals ----------------------------------------------------------

    fn record<T>(&self, context: &'static str, result: Result<T>) -> bool {
        match result {
            Ok(_) => true,
            Err(err) => {
                debug!("{}: {}", context, err);
                self.status.record(context, &err);
                false
            }
        }
    }

    fn active_lock(&self) -> Result<MutexGuard<'_, Option<ActiveRun>>> {
        self.active.lock().map_err(|_| WardenError::LockPoisoned)
    }

    fn credentials(&self) -> Result<MutexGuard<'_, Credentials>> {
        self.credentials.lock().map_err(|_| WardenError::LockPoisoned)
    }

    /// Configuration write access, rejected while the process is running.
    fn guarded_config_mut(&self) -> Result<RwLockWriteGuard<'_, ProcessConfig>> {
        if self.shared.is_running() {
            return Err(WardenError::ProcessIsRunning);
        }
        self.config.write().map_err(|_| WardenError::LockPoisoned)
    }

    fn start_inner(&self, async_output: bool) -> Result<()> {
        let mut active = self.active_lock()?;

        {
            let mut st = self.shared.lock()?;
            if st.is_running {
                return Err(WardenError::AlreadyRunning);
            }
            // fresh flags and metrics for the new run
            *st = RunState::default();
        }
        self.stdout_buf.clear();
        self.stderr_buf.clear();

        let config = self
            .config
            .read()
            .map_err(|_| WardenError::LockPoisoned)?
            .clone();
        let mut cmd = {
            let creds = self.credentials()?;
            launcher::build_command(&config, &creds)?
        };

        let mut child = cmd
            .spawn()
            .map_err(|e| WardenError::LaunchFailed(e.to_string()))?;
        let pid = child.id();

        let baseline = metrics::children_cpu_times();
        {
            let mut st = self.shared.lock()?;
            st.is_started = true;
            st.is_running = true;
            st.pid = pid;
            st.priority = config.priority;
            st.affinity = config.processor_affinity;
            st.started_on = Some(Utc::now());
            st.started_at = Some(Instant::now());
            st.cpu_baseline = baseline;
        }

        if let Some(pid) = pid {
            if config.priority != PriorityClass::Normal {
                if let Err(e) = config.priority.apply_to(pid) {
                    warn!(pid, "priority class {} not applied: {}", config.priority.name(), e);
                }
            }
            if config.processor_affinity != 0 {
                if let Err(e) = apply_affinity_mask(pid, config.processor_affinity) {
                    warn!(pid, "processor affinity not applied: {}", e);
                }
            }
            if let Ok(mut sampler) = self.sampler.lock() {
                if let Some(sample) = sampler.sample(pid) {
                    if let Ok(mut st) = self.shared.lock() {
                        st.metrics.record_memory(sample);
                    }
                }
            }
        }

        let (fire_tx, fire_rx) = mpsc::channel(4);
        let watchdog = Watchdog::new(fire_tx);
        watchdog.arm(config.effective_timeout());

        let mut pumps = Vec::new();
        if config.redirect_stdout {
            if let Some(stream) = child.stdout.take() {
                let buffer = Arc::clone(&self.stdout_buf);
                pumps.push(if async_output {
                    let dog = config.activity_timeout.then(|| watchdog.clone());
                    run::spawn_line_pump(stream, buffer, config.output_encoding, dog, "stdout")
                } else {
                    run::spawn_drain_pump(stream, buffer, config.output_encoding, "stdout")
                });
            }
        }
        if config.redirect_stderr {
            if let Some(stream) = child.stderr.take() {
                let buffer = Arc::clone(&self.stderr_buf);
                pumps.push(if async_output {
                    let dog = config.activity_timeout.then(|| watchdog.clone());
                    run::spawn_line_pump(stream, buffer, config.error_encoding, dog, "stderr")
                } else {
                    run::spawn_drain_pump(stream, buffer, config.error_encoding, "stderr")
                });
            }
        }

        let stdin = if config.redirect_stdin {
            child
                .stdin
                .take()
                .map(|s| Arc::new(tokio::sync::Mutex::new(s)))
        } else {
            None
        };

        let (kill_tx, kill_rx) = mpsc::unbounded_channel();
        let (exit_tx, exit_rx) = watch::channel(false);
        let supervisor = tokio::spawn(run::supervise(run::Supervision {
            child,
            shared: Arc::clone(&self.shared),
            status: Arc::clone(&self.status),
            watchdog: watchdog.clone(),
            fire_rx,
            kill_rx,
            exit_tx,
            pumps,
        }));

        *active = Some(ActiveRun {
            exit_rx,
            kill_tx,
            watchdog,
            stdin,
            supervisor,
            activity_timeout: config.activity_timeout,
        });

        info!(?pid, file = %config.file_name, "process started");
        Ok(())
    }

    async fn wait_inner(&self) -> Result<()> {
        let mut exit_rx = {
            let active = self.active_lock()?;
            let current = active.as_ref().ok_or(WardenError::NotRunning)?;
            current.exit_rx.clone()
        };
        exit_rx
            .wait_for(|done| *done)
            .await
            .map_err(|_| WardenError::ChannelClosed)?;

        if let Some(msg) = self.shared.read(|st| st.wait_error.clone()) {
            return Err(WardenError::WaitFailed(msg));
        }
        Ok(())
    }

    async fn kill_inner(&self) -> Result<()> {
        let (kill_tx, mut exit_rx) = {
            let active = self.active_lock()?;
            let current = active.as_ref().ok_or(WardenError::NotRunning)?;
            if !self.shared.is_running() {
                return Err(WardenError::NotRunning);
            }
            (current.kill_tx.clone(), current.exit_rx.clone())
        };

        let _ = kill_tx.send(());
        exit_rx
            .wait_for(|done| *done)
            .await
            .map_err(|_| WardenError::ChannelClosed)?;
        Ok(())
    }

    async fn input_inner(&self, text: &str, newline: bool) -> Result<()> {
        let redirected = self
            .config
            .read()
            .map_err(|_| WardenError::LockPoisoned)?
            .redirect_stdin;
        if !redirected {
            return Err(WardenError::InputNotRedirected);
        }

        let (stdin, watchdog, activity) = {
            let active = self.active_lock()?;
            let current = active.as_ref().ok_or(WardenError::NotRunning)?;
            if !self.shared.is_running() {
                return Err(WardenError::NotRunning);
            }
            let stdin = current
                .stdin
                .clone()
                .ok_or(WardenError::InputNotRedirected)?;
            (stdin, current.watchdog.clone(), current.activity_timeout)
        };

        {
            let mut stdin = stdin.lock().await;
            stdin.write_all(text.as_bytes()).await?;
            if newline {
                stdin.write_all(b"\n").await?;
            }
            stdin.flush().await?;
        }
        if activity {
            watchdog.restart();
        }
        Ok(())
    }

    fn apply_affinity_inner(&self, mask: u64) -> Result<()> {
        let pid = {
            let st = self.shared.lock()?;
            if !st.is_running {
                return Err(WardenError::NotRunning);
            }
            st.pid.ok_or(WardenError::NotRunning)?
        };
        apply_affinity_mask(pid, mask)?;
        self.shared.lock()?.affinity = mask;
        if let Ok(mut config) = self.config.write() {
            config.processor_affinity = mask;
        }
        Ok(())
    }

    fn refresh_inner(&self) -> Result<()> {
        let pid = {
            let st = self.shared.lock()?;
            if !st.is_running {
                return Err(WardenError::NotRunning);
            }
            st.pid.ok_or(WardenError::NotRunning)?
        };
        let sample = self
            .sampler
            .lock()
            .map_err(|_| WardenError::LockPoisoned)?
            .sample(pid);
        if let Some(sample) = sample {
            self.shared.lock()?.metrics.record_memory(sample);
        }
        Ok(())
    }

    async fn shutdown_inner(&self) -> Result<()> {
        let pending = {
            let active = self.active_lock()?;
            active
                .as_ref()
                .map(|current| (current.kill_tx.clone(), current.exit_rx.clone()))
        };
        if let Some((kill_tx, mut exit_rx)) = pending {
            if self.shared.is_running() {
                let _ = kill_tx.send(());
            }
            // waits for an in-flight kill or exit notification to finish
            // its bookkeeping rather than tearing down twice
            let _ = exit_rx.wait_for(|done| *done).await;
        }
        *self.active_lock()? = None;
        Ok(())
    }
}

impl Default for ProcessEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for ProcessEngine {
    fn drop(&mut self) {
        if let Ok(mut active) = self.active.lock() {
            if let Some(current) = active.take() {
                current.watchdog.stop();
                // the supervisor owns the child; aborting it drops the
                // kill-on-drop handle, which terminates a live process
                current.supervisor.abort();
            }
        }
    }
}

/// Apply an affinity mask to a live process.
#[cfg(target_os = "linux")]
fn apply_affinity_mask(pid: u32, mask: u64) -> Result<()> {
    use nix::sched::{sched_setaffinity, CpuSet};
    use nix::unistd::Pid;

    if mask == 0 {
        return Err(WardenError::Affinity("affinity mask is empty".into()));
    }
    let mut set = CpuSet::new();
    for cpu in 0..64 {
        if mask & (1u64 << cpu) != 0 {
            set.set(cpu)
                .map_err(|e| WardenError::Affinity(e.to_string()))?;
        }
    }
    sched_setaffinity(Pid::from_raw(pid as i32), &set)
        .map_err(|e| WardenError::Affinity(e.to_string()))
}

/// Apply an affinity mask to a live process.
#[cfg(not(target_os = "linux"))]
fn apply_affinity_mask(_pid: u32, _mask: u64) -> Result<()> {
    Err(WardenError::Affinity(
        "processor affinity is not supported on this platform".into(),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_start_without_file_name_fails_clean() {
        let engine = ProcessEngine::new();
        assert!(!engine.start().await);
        assert!(engine.last_error().contains("unable to start process"));
        assert!(!engine.is_started());
        assert!(!engine.is_running());
    }

    #[tokio::test]
    async fn test_kill_without_run_reports_not_running() {
        let engine = ProcessEngine::new();
        assert!(!engine.kill().await);
        assert!(engine.last_error().contains("not running"));
    }

    #[tokio::test]
    async fn test_wait_without_run_reports_not_running() {
        let engine = ProcessEngine::new();
        assert!(!engine.wait_for_exit().await);
        assert!(engine.last_error().contains("not running"));
    }

    #[tokio::test]
    async fn test_input_write_requires_redirection() {
        let engine = ProcessEngine::new();
        assert!(!engine.input_write("hello").await);
        assert!(engine.last_error().contains("not redirected"));
    }

    #[test]
    fn test_set_priority_class_rejects_unknown_name() {
        let engine = ProcessEngine::new();
        assert!(!engine.set_priority_class("urgent"));
        assert!(engine.last_error().contains("unsupported"));
        // state untouched
        assert_eq!(engine.config().priority, PriorityClass::Normal);
    }

    #[test]
    fn test_set_output_encoding_rejects_unknown_name() {
        let engine = ProcessEngine::new();
        assert!(!engine.set_output_encoding("latin1"));
        assert!(engine.last_error().contains("unsupported"));
        assert_eq!(engine.config().output_encoding, OutputEncoding::Utf8);
    }

    #[test]
    fn test_setters_update_config() {
        let engine = ProcessEngine::new();
        assert!(engine.set_file_name("/bin/cat"));
        assert!(engine.set_arguments(["-n"]));
        assert!(engine.set_working_dir("/tmp"));
        assert!(engine.set_timeout_ms(1500));
        assert!(engine.set_activity_timeout(true));
        assert!(engine.set_priority_class("BelowNormal"));
        assert!(engine.set_output_encoding("ASCII"));

        let config = engine.config();
        assert_eq!(config.file_name, "/bin/cat");
        assert_eq!(config.arguments, vec!["-n"]);
        assert_eq!(config.timeout_ms, 1500);
        assert!(config.activity_timeout);
        assert_eq!(config.priority, PriorityClass::BelowNormal);
        assert_eq!(config.output_encoding, OutputEncoding::Ascii);
        // a successful setter leaves the status clear
        assert_eq!(engine.last_error(), crate::status::NO_ERROR);
    }

    #[test]
    fn test_set_password_empty_clears_and_succeeds() {
        let engine = ProcessEngine::new();
        assert!(engine.set_password(""));
        assert!(engine.set_password("hunter2"));
        assert!(engine.set_password(""));
        assert_eq!(engine.last_error(), crate::status::NO_ERROR);
    }

    #[tokio::test]
    async fn test_shutdown_idempotent_without_run() {
        let engine = ProcessEngine::new();
        assert!(engine.shutdown().await);
        assert!(engine.shutdown().await);
    }

    #[test]
    fn test_program_output_placeholder_requires_failure() {
        let engine = ProcessEngine::new();
        // nothing started: empty, not the placeholder
        assert_eq!(engine.program_output(), "");
    }

    #[test]
    fn test_queries_default_when_idle() {
        let engine = ProcessEngine::new();
        assert!(!engine.is_started());
        assert!(!engine.is_running());
        assert!(!engine.did_timeout());
        assert_eq!(engine.exit_code(), None);
        assert_eq!(engine.process_id(), None);
        assert_eq!(engine.run_time_ms(), 0);
        assert!(engine.started_on().is_none());
        assert!(engine.ended_on().is_none());
    }
}
