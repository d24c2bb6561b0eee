//! Timeout watchdog for supervised processes.
//!
//! A restartable single-shot timer running as its own task. The engine arms
//! it at launch; pumps and input writes restart it when activity-based
//! timeout is enabled; normal exit and explicit kill stop it so a stale fire
//! never reaches a finished run. When it fires it reports the armed interval
//! so the engine can phrase the timeout error, then disarms itself.

use std::time::Duration;

use tokio::sync::mpsc;
use tokio::time::Instant;
use tracing::{debug, trace};

#[derive(Debug)]
enum ClockCmd {
    Arm(Duration),
    Restart,
    Stop,
}

/// Handle to the watchdog timer task.
///
/// Cloneable; all clones drive the same timer. The task exits when every
/// handle is dropped or when the fire receiver goes away.
#[derive(Debug, Clone)]
pub struct Watchdog {
    cmd_tx: mpsc::UnboundedSender<ClockCmd>,
}

impl Watchdog {
    /// Spawn the timer task. Fires are delivered on `fire_tx` carrying the
    /// interval that elapsed.
    pub fn new(fire_tx: mpsc::Sender<Duration>) -> Self {
        let (cmd_tx, cmd_rx) = mpsc::unbounded_channel();
        tokio::spawn(clock_task(cmd_rx, fire_tx));
        Self { cmd_tx }
    }

    /// Arm the timer: one fire after `interval` unless restarted or stopped.
    pub fn arm(&self, interval: Duration) {
        let _ = self.cmd_tx.send(ClockCmd::Arm(interval));
    }

    /// Stop-then-start with the same interval, postponing the fire by a full
    /// interval from now. No-op when the timer is not armed.
    pub fn restart(&self) {
        let _ = self.cmd_tx.send(ClockCmd::Restart);
    }

    /// Disarm the timer, suppressing any pending fire.
    pub fn stop(&self) {
        let _ = self.cmd_tx.send(ClockCmd::Stop);
    }
}

async fn clock_task(mut cmd_rx: mpsc::UnboundedReceiver<ClockCmd>, fire_tx: mpsc::Sender<Duration>) {
    let mut armed: Option<(Instant, Duration)> = None;

    loop {
        match armed {
            Some((deadline, interval)) => {
                tokio::select! {
                    cmd = cmd_rx.recv() => match cmd {
                        Some(ClockCmd::Arm(d)) => armed = Some((Instant::now() + d, d)),
                        Some(ClockCmd::Restart) => {
                            trace!("watchdog restarted, deadline slides {:?} forward", interval);
                            armed = Some((Instant::now() + interval, interval));
                        }
                        Some(ClockCmd::Stop) => armed = None,
                        None => return,
                    },
                    _ = tokio::time::sleep_until(deadline) => {
                        debug!("watchdog fired after {:?}", interval);
                        armed = None;
                        if fire_tx.send(interval).await.is_err() {
                            return;
                        }
                    }
                }
            }
            None => match cmd_rx.recv().await {
                Some(ClockCmd::Arm(d)) => armed = Some((Instant::now() + d, d)),
                Some(ClockCmd::Restart) | Some(ClockCmd::Stop) => {}
                None => return,
            },
        }
    }
}
