//! Run-time and resource metrics for a supervised process.
//!
//! CPU time comes from the children rusage delta between launch and exit;
//! memory counters are sampled (at launch, on explicit refresh, and at exit
//! while the process is still visible) rather than continuously tracked,
//! with peaks taken across samples.

use std::time::Duration;

/// Metrics derived for one run.
#[derive(Debug, Clone, Default)]
pub struct RunMetrics {
    /// Exit code of the process. On unix a signal-terminated process is
    /// recorded as the negated signal number.
    pub exit_code: Option<i32>,
    /// Wall-clock runtime in milliseconds (end minus start).
    pub run_time_ms: u64,
    /// Total CPU time (user + system) in milliseconds.
    pub total_cpu_ms: u64,
    /// User-mode CPU time in milliseconds.
    pub user_cpu_ms: u64,
    /// Resident set size at the last sample, in bytes.
    pub rss_bytes: u64,
    /// Largest resident set size observed across samples, in bytes.
    pub peak_rss_bytes: u64,
    /// Virtual memory size at the last sample, in bytes.
    pub virtual_bytes: u64,
    /// Largest virtual memory size observed across samples, in bytes.
    pub peak_virtual_bytes: u64,
}

impl RunMetrics {
    /// Fold a memory sample into the counters, updating peaks.
    pub(crate) fn record_memory(&mut self, sample: MemorySample) {
        self.rss_bytes = sample.rss_bytes;
        self.virtual_bytes = sample.virtual_bytes;
        self.peak_rss_bytes = self.peak_rss_bytes.max(sample.rss_bytes);
        self.peak_virtual_bytes = self.peak_virtual_bytes.max(sample.virtual_bytes);
    }
}

/// One memory sample for a live process.
#[derive(Debug, Clone, Copy)]
pub(crate) struct MemorySample {
    pub rss_bytes: u64,
    pub virtual_bytes: u64,
}

/// Samples memory counters for a pid through the platform process table.
#[derive(Debug)]
pub(crate) struct MemorySampler {
    system: sysinfo::System,
}

impl MemorySampler {
    pub(crate) fn new() -> Self {
        Self {
            system: sysinfo::System::new(),
        }
    }

    /// Sample the process, or `None` once it is no longer visible.
    pub(crate) fn sample(&mut self, pid: u32) -> Option<MemorySample> {
        let pid = sysinfo::Pid::from_u32(pid);
        if !self.system.refresh_process(pid) {
            return None;
        }
        let process = self.system.process(pid)?;
        Some(MemorySample {
            rss_bytes: process.memory(),
            virtual_bytes: process.virtual_memory(),
        })
    }
}

/// Accumulated (user, total) CPU time of reaped children.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub(crate) struct CpuTimes {
    pub user: Duration,
    pub total: Duration,
}

impl CpuTimes {
    /// CPU time accrued since an earlier snapshot.
    pub(crate) fn since(&self, baseline: CpuTimes) -> CpuTimes {
        CpuTimes {
            user: self.user.saturating_sub(baseline.user),
            total: self.total.saturating_sub(baseline.total),
        }
    }
}

/// Snapshot the CPU time consumed by reaped child processes.
#[cfg(unix)]
pub(crate) fn children_cpu_times() -> CpuTimes {
    use nix::sys::resource::{getrusage, UsageWho};

    match getrusage(UsageWho::RUSAGE_CHILDREN) {
        Ok(usage) => {
            let user = timeval_to_duration(usage.user_time());
            let system = timeval_to_duration(usage.system_time());
            CpuTimes {
                user,
                total: user + system,
            }
        }
        Err(_) => CpuTimes::default(),
    }
}

/// Snapshot the CPU time consumed by reaped child processes.
#[cfg(not(unix))]
pub(crate) fn children_cpu_times() -> CpuTimes {
    CpuTimes::default()
}

#[cfg(unix)]
fn timeval_to_duration(tv: nix::sys::time::TimeVal) -> Duration {
    Duration::new(tv.tv_sec().max(0) as u64, (tv.tv_usec().max(0) as u32) * 1000)
}
