//! Shared run state and the background tasks of one supervised run.
//!
//! The supervisor task owns the child process for the lifetime of the run.
//! Explicit kill requests and watchdog fires reach it over channels; it
//! blocks on the real exit notification (`child.wait()`) and performs the
//! exit bookkeeping exactly once, guarded by the run-state mutex. Waiters
//! observe completion through a `watch` channel, never by polling.

use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncReadExt, BufReader};
use tokio::process::Child;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, trace, warn};

use super::metrics::{self, CpuTimes, MemorySampler, RunMetrics};
use crate::buffer::StreamBuffer;
use crate::encoding::OutputEncoding;
use crate::error::{Result, WardenError};
use crate::priority::PriorityClass;
use crate::status::StatusState;
use crate::watchdog::Watchdog;

/// Mutable state of the current (or most recent) run.
#[derive(Debug, Default)]
pub(crate) struct RunState {
    pub is_started: bool,
    pub is_running: bool,
    pub did_timeout: bool,
    pub pid: Option<u32>,
    pub priority: PriorityClass,
    pub affinity: u64,
    pub started_on: Option<DateTime<Utc>>,
    pub ended_on: Option<DateTime<Utc>>,
    pub started_at: Option<Instant>,
    pub cpu_baseline: CpuTimes,
    pub metrics: RunMetrics,
    pub wait_error: Option<String>,
}

/// The single mutual-exclusion point for the run flags and metrics.
///
/// Shared between the caller-facing engine and the background supervisor;
/// every mutation of `is_running`/`did_timeout`/metrics goes through here.
#[derive(Debug, Default)]
pub(crate) struct RunShared {
    state: Mutex<RunState>,
}

impl RunShared {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn lock(&self) -> Result<MutexGuard<'_, RunState>> {
        self.state.lock().map_err(|_| WardenError::LockPoisoned)
    }

    /// Non-failing read used by queries; a poisoned lock reads as defaults.
    pub(crate) fn read<T>(&self, f: impl FnOnce(&RunState) -> T) -> T
    where
        T: Default,
    {
        self.state.lock().map(|st| f(&st)).unwrap_or_default()
    }

    pub(crate) fn is_running(&self) -> bool {
        self.read(|st| st.is_running)
    }

    /// Flag a timeout on a still-running process.
    ///
    /// Returns false when the process already left the running state, in
    /// which case the stale fire is a no-op.
    pub(crate) fn mark_timeout(&self) -> bool {
        match self.state.lock() {
            Ok(mut st) if st.is_running && !st.did_timeout => {
                st.did_timeout = true;
                true
            }
            _ => false,
        }
    }

    /// Perform the not-running transition and exit bookkeeping.
    ///
    /// Only the first caller to observe `is_running == true` wins; any later
    /// attempt returns false without touching the metrics again.
    fn finish(&self, outcome: &std::io::Result<std::process::ExitStatus>) -> bool {
        let Ok(mut st) = self.state.lock() else {
            return false;
        };
        if !st.is_running {
            return false;
        }
        st.is_running = false;
        st.ended_on = Some(Utc::now());
        st.metrics.run_time_ms = st
            .started_at
            .map(|t| t.elapsed().as_millis() as u64)
            .unwrap_or(0);

        let cpu = metrics::children_cpu_times().since(st.cpu_baseline);
        st.metrics.user_cpu_ms = cpu.user.as_millis() as u64;
        st.metrics.total_cpu_ms = cpu.total.as_millis() as u64;

        match outcome {
            Ok(status) => {
                st.metrics.exit_code = exit_code_of(status);
            }
            Err(e) => {
                st.wait_error = Some(e.to_string());
            }
        }
        true
    }
}

#[cfg(unix)]
fn exit_code_of(status: &std::process::ExitStatus) -> Option<i32> {
    use std::os::unix::process::ExitStatusExt;
    status.code().or_else(|| status.signal().map(|sig| -sig))
}

#[cfg(not(unix))]
fn exit_code_of(status: &std::process::ExitStatus) -> Option<i32> {
    status.code()
}

/// Everything the supervisor task needs for one run.
pub(crate) struct Supervision {
    pub child: Child,
    pub shared: Arc<RunShared>,
    pub status: Arc<StatusState>,
    pub watchdog: Watchdog,
    pub fire_rx: mpsc::Receiver<Duration>,
    pub kill_rx: mpsc::UnboundedReceiver<()>,
    pub exit_tx: watch::Sender<bool>,
    pub pumps: Vec<JoinHandle<()>>,
}

/// Supervise the child until it terminates, then finalize the run.
pub(crate) async fn supervise(mut sv: Supervision) {
    let pid = sv.child.id();
    let outcome = loop {
        tokio::select! {
            res = sv.child.wait() => break res,
            Some(interval) = sv.fire_rx.recv() => {
                if sv.shared.mark_timeout() {
                    let ms = interval.as_millis() as u64;
                    debug!(?pid, ms, "timeout elapsed, terminating process");
                    sv.status.set_error(WardenError::TimedOut(ms).to_string());
                    // a start_kill error means the child already exited;
                    // the wait branch will pick the exit up
                    if let Err(e) = sv.child.start_kill() {
                        trace!(?pid, "kill after timeout: {}", e);
                    }
                }
            }
            Some(()) = sv.kill_rx.recv() => {
                debug!(?pid, "kill requested");
                if let Err(e) = sv.child.start_kill() {
                    trace!(?pid, "kill request on exited process: {}", e);
                }
            }
        }
    };

    sv.watchdog.stop();

    // let the pumps drain the pipes to EOF before the buffers are read back
    for pump in sv.pumps {
        if let Err(e) = pump.await {
            warn!(?pid, "stream pump task failed: {}", e);
        }
    }

    // last-chance memory sample while the process table may still know the pid
    if let Some(pid) = pid {
        let mut sampler = MemorySampler::new();
        if let Some(sample) = sampler.sample(pid) {
            if let Ok(mut st) = sv.shared.lock() {
                st.metrics.record_memory(sample);
            }
        }
    }

    if let Err(e) = &outcome {
        sv.status
            .record("wait for exit failed", &WardenError::WaitFailed(e.to_string()));
    }
    if sv.shared.finish(&outcome) {
        debug!(?pid, "run finalized");
    }
    let _ = sv.exit_tx.send(true);
}

/// Spawn a line-oriented pump feeding the buffer as the process writes.
///
/// Each received line is decoded and appended with a trailing newline; when
/// a watchdog handle is supplied the deadline slides forward on every line.
pub(crate) fn spawn_line_pump<R>(
    stream: R,
    buffer: Arc<StreamBuffer>,
    encoding: OutputEncoding,
    watchdog: Option<Watchdog>,
    label: &'static str,
) -> JoinHandle<()>
where
    R: AsyncRead + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        let mut reader = BufReader::new(stream);
        let mut raw = Vec::new();
        loop {
            raw.clear();
            match reader.read_until(b'\n', &mut raw).await {
                Ok(0) => {
                    debug!("{} pump: EOF", label);
                    break;
                }
                Ok(n) => {
                    trace!("{} pump: {} bytes", label, n);
                    let mut line = raw.as_slice();
                    if line.ends_with(b"\n") {
                        line = &line[..line.len() - 1];
                    }
                    if line.ends_with(b"\r") {
                        line = &line[..line.len() - 1];
                    }
                    buffer.append_line(&encoding.decode(line));
                    if let Some(dog) = &watchdog {
                        dog.restart();
                    }
                }
                Err(e) => {
                    warn!("{} pump: read error: {}", label, e);
                    break;
                }
            }
        }
    })
}

/// Spawn a one-shot drain that appends the whole stream content at EOF.
///
/// Used for synchronous capture: the pipe is still consumed while the
/// process runs, so a full OS pipe buffer can never deadlock the child, but
/// the buffer sees the content in one append at exit.
pub(crate) fn spawn_drain_pump<R>(
    stream: R,
    buffer: Arc<StreamBuffer>,
    encoding: OutputEncoding,
    label: &'static str,
) -> JoinHandle<()>
where
    R: AsyncRead + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        let mut reader = BufReader::new(stream);
        let mut raw = Vec::new();
        match reader.read_to_end(&mut raw).await {
            Ok(0) => debug!("{} drain: empty stream", label),
            Ok(n) => {
                debug!("{} drain: {} bytes", label, n);
                buffer.append(encoding.decode(&raw));
            }
            Err(e) => warn!("{} drain: read error: {}", label, e),
        }
    })
}
