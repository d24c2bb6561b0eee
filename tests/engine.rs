//! Engine integration tests.
//!
//! These tests drive the engine end-to-end against real executables through
//! `/bin/sh`, so they are unix-only.

#![cfg(unix)]

use std::time::Duration;

use proc_warden::{ProcessConfig, ProcessEngine, NO_ERROR};

/// Helper to build an engine running a shell snippet with captured output.
fn shell_engine(script: &str) -> ProcessEngine {
    ProcessEngine::with_config(
        ProcessConfig::new("/bin/sh")
            .arg("-c")
            .arg(script)
            .capture_output()
            .timeout_ms(10_000),
    )
}

// ============================================================================
// Launch & Exit
// ============================================================================

#[tokio::test]
async fn test_echo_hello_sync_capture() {
    let engine = shell_engine("echo hello");

    assert!(engine.start().await, "start failed: {}", engine.last_error());
    assert!(engine.is_started());
    assert!(engine.wait_for_exit().await, "wait failed: {}", engine.last_error());

    assert_eq!(engine.exit_code(), Some(0));
    assert!(!engine.did_timeout());
    assert!(!engine.is_running());
    assert_eq!(engine.output_read(), "hello\n");
    assert_eq!(engine.output(), "hello\n");
    assert_eq!(engine.last_error(), NO_ERROR);
}

#[tokio::test]
async fn test_nonzero_exit_code() {
    let engine = shell_engine("exit 3");

    assert!(engine.start().await);
    assert!(engine.wait_for_exit().await);
    assert_eq!(engine.exit_code(), Some(3));
}

#[tokio::test]
async fn test_stderr_captured_separately() {
    let engine = shell_engine("echo out; echo err 1>&2");

    assert!(engine.start().await);
    assert!(engine.wait_for_exit().await);

    assert_eq!(engine.output(), "out\n");
    assert_eq!(engine.error_output(), "err\n");
}

#[tokio::test]
async fn test_launch_failure_leaves_engine_idle() {
    let engine = ProcessEngine::with_config(
        ProcessConfig::new("/nonexistent/definitely-not-a-binary").capture_output(),
    );

    assert!(!engine.start().await);
    assert!(engine.last_error().contains("unable to start process"));
    assert!(!engine.is_started());
    assert!(!engine.is_running());

    // the engine is reusable after a failed start
    assert!(engine.configure(
        ProcessConfig::new("/bin/sh")
            .arg("-c")
            .arg("echo recovered")
            .capture_output()
    ));
    assert!(engine.start().await);
    assert!(engine.wait_for_exit().await);
    assert_eq!(engine.output(), "recovered\n");
}

#[tokio::test]
async fn test_run_one_shot() {
    let engine = ProcessEngine::with_config(
        ProcessConfig::new("/bin/sh").arg("-c").arg("echo oneshot"),
    );

    assert!(engine.run().await, "run failed: {}", engine.last_error());
    assert_eq!(engine.exit_code(), Some(0));
    assert_eq!(engine.output(), "oneshot\n");
    assert!(!engine.is_running());
}

#[tokio::test]
async fn test_metrics_recorded_at_exit() {
    let engine = shell_engine("sleep 0.1");

    assert!(engine.start().await);
    assert!(engine.started_on().is_some());
    assert!(engine.wait_for_exit().await);

    assert!(engine.ended_on().is_some());
    assert!(engine.run_time_ms() >= 100);
    assert!(engine.ended_on().unwrap() >= engine.started_on().unwrap());
}

// ============================================================================
// Start guards
// ============================================================================

#[tokio::test]
async fn test_start_while_running_fails_with_already_running() {
    let engine = shell_engine("exec sleep 5");

    assert!(engine.start().await);
    let pid = engine.process_id();
    assert!(pid.is_some());

    // second start fails and leaves the existing run untouched
    assert!(!engine.start().await);
    assert!(engine.last_error().contains("already running"));
    assert!(engine.is_running());
    assert_eq!(engine.process_id(), pid);

    assert!(engine.kill().await);
}

#[tokio::test]
async fn test_config_setters_rejected_while_running() {
    let engine = shell_engine("exec sleep 5");
    assert!(engine.start().await);

    assert!(!engine.set_activity_timeout(true));
    assert!(engine.last_error().contains("process is running"));
    assert!(!engine.set_priority_class("idle"));
    assert!(!engine.set_output_encoding("ascii"));
    assert!(!engine.set_timeout_ms(1));

    // original configuration untouched
    let config = engine.config();
    assert!(!config.activity_timeout);
    assert_eq!(config.timeout_ms, 10_000);

    assert!(engine.kill().await);
}

// ============================================================================
// Timeout watchdog
// ============================================================================

#[tokio::test]
async fn test_timeout_kills_sleeping_process() {
    let engine = ProcessEngine::with_config(
        ProcessConfig::new("/bin/sh")
            .arg("-c")
            .arg("exec sleep 30")
            .capture_output()
            .timeout_ms(200),
    );

    assert!(engine.start().await);
    assert!(engine.wait_for_exit().await);

    assert!(engine.did_timeout());
    assert!(!engine.is_running());
    assert!(engine.last_error().contains("timed out"));
}

#[tokio::test]
async fn test_fast_process_beats_timeout() {
    let engine = ProcessEngine::with_config(
        ProcessConfig::new("/bin/sh")
            .arg("-c")
            .arg("echo quick")
            .capture_output()
            .timeout_ms(5_000),
    );

    assert!(engine.start().await);
    assert!(engine.wait_for_exit().await);

    assert!(!engine.did_timeout());
    assert_eq!(engine.exit_code(), Some(0));
    assert_eq!(engine.last_error(), NO_ERROR);
}

#[tokio::test]
async fn test_activity_timeout_slides_on_output() {
    // emits a line every 150 ms; a 400 ms activity timeout never elapses
    // while lines keep coming, then fires after the final silence
    let engine = ProcessEngine::with_config(
        ProcessConfig::new("/bin/sh")
            .arg("-c")
            .arg("for i in 1 2 3 4; do echo tick $i; sleep 0.15; done; exec sleep 30")
            .capture_output()
            .timeout_ms(400)
            .activity_timeout(true),
    );

    assert!(engine.start_with_async_output(true).await);
    assert!(engine.wait_for_exit().await);

    assert!(engine.did_timeout());
    // all four ticks got through before the silence killed it
    let output = engine.output();
    assert!(output.contains("tick 1"), "output was: {output:?}");
    assert!(output.contains("tick 4"), "output was: {output:?}");
}

// ============================================================================
// Kill
// ============================================================================

#[tokio::test]
async fn test_kill_running_process() {
    let engine = shell_engine("exec sleep 30");

    assert!(engine.start().await);
    assert!(engine.kill().await, "kill failed: {}", engine.last_error());

    assert!(!engine.is_running());
    assert!(engine.ended_on().is_some());
    assert!(!engine.did_timeout());
}

#[tokio::test]
async fn test_double_kill_second_not_running() {
    let engine = shell_engine("exec sleep 30");

    assert!(engine.start().await);
    assert!(engine.kill().await);

    let ended = engine.ended_on();
    assert!(!engine.kill().await);
    assert!(engine.last_error().contains("not running"));
    // exit bookkeeping was not redone
    assert_eq!(engine.ended_on(), ended);
}

#[tokio::test]
async fn test_kill_before_start_fails() {
    let engine = shell_engine("true");
    assert!(!engine.kill().await);
    assert!(engine.last_error().contains("not running"));
}

// ============================================================================
// Input
// ============================================================================

#[tokio::test]
async fn test_input_round_trip_through_cat() {
    let engine = ProcessEngine::with_config(
        ProcessConfig::new("/bin/cat")
            .redirect_all()
            .timeout_ms(10_000),
    );

    assert!(engine.start_with_async_output(true).await);
    assert!(engine.input_write_line("ping").await);
    assert!(engine.input_write("pong").await);
    assert!(engine.input_write("\n").await);

    // cat echoes each line as it arrives
    tokio::time::sleep(Duration::from_millis(300)).await;
    assert!(engine.is_output_available());
    assert_eq!(engine.output_read(), "ping\npong\n");
    assert!(!engine.is_output_available());

    assert!(engine.kill().await);
}

#[tokio::test]
async fn test_input_write_without_redirection() {
    let engine = shell_engine("exec sleep 2");
    assert!(engine.start().await);

    assert!(!engine.input_write("ignored").await);
    assert!(engine.last_error().contains("not redirected"));

    assert!(engine.kill().await);
}

#[tokio::test]
async fn test_input_write_after_exit_not_running() {
    let engine = ProcessEngine::with_config(
        ProcessConfig::new("/bin/sh")
            .arg("-c")
            .arg("true")
            .redirect_all(),
    );

    assert!(engine.start().await);
    assert!(engine.wait_for_exit().await);

    assert!(!engine.input_write_line("too late").await);
    assert!(engine.last_error().contains("not running"));
}

// ============================================================================
// Incremental reads
// ============================================================================

#[tokio::test]
async fn test_incremental_read_then_snapshot() {
    let engine = ProcessEngine::with_config(
        ProcessConfig::new("/bin/sh")
            .arg("-c")
            .arg("echo first; sleep 0.2; echo second")
            .capture_output()
            .timeout_ms(10_000),
    );

    assert!(engine.start_with_async_output(true).await);

    // pick up the first line while the process still runs
    let mut early = String::new();
    for _ in 0..50 {
        early.push_str(&engine.output_read());
        if early.contains("first") {
            break;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    assert!(early.contains("first"), "read so far: {early:?}");

    assert!(engine.wait_for_exit().await);

    // the drain read returns only what came after the early read,
    // while the snapshot holds everything
    let rest = engine.output_read();
    assert!(rest.contains("second"));
    assert!(!rest.contains("first"));
    assert_eq!(engine.output(), "first\nsecond\n");
}

// ============================================================================
// Teardown & reuse
// ============================================================================

#[tokio::test]
async fn test_shutdown_kills_running_process() {
    let engine = shell_engine("exec sleep 30");

    assert!(engine.start().await);
    assert!(engine.shutdown().await);
    assert!(!engine.is_running());

    // idempotent
    assert!(engine.shutdown().await);
}

#[tokio::test]
async fn test_engine_reusable_across_runs() {
    let engine = shell_engine("echo one");

    assert!(engine.start().await);
    assert!(engine.wait_for_exit().await);
    assert_eq!(engine.output(), "one\n");

    assert!(engine.configure(
        ProcessConfig::new("/bin/sh")
            .arg("-c")
            .arg("echo two")
            .capture_output()
    ));
    assert!(engine.start().await);
    assert!(engine.wait_for_exit().await);

    // buffers and flags reset on the second start
    assert_eq!(engine.output(), "two\n");
    assert_eq!(engine.exit_code(), Some(0));
    assert!(!engine.did_timeout());
}

#[tokio::test]
async fn test_program_output_prefers_stdout() {
    let engine = shell_engine("echo normal; echo noise 1>&2");
    assert!(engine.run().await);
    assert_eq!(engine.program_output(), "normal\n");
}

#[tokio::test]
async fn test_program_output_falls_back_to_stderr() {
    let engine = shell_engine("echo broken 1>&2; exit 1");
    assert!(engine.run().await);
    assert_eq!(engine.program_output(), "broken\n");
}

#[tokio::test]
async fn test_program_output_placeholder_on_silent_failure() {
    let engine = shell_engine("exit 7");
    assert!(engine.run().await);
    assert_eq!(engine.exit_code(), Some(7));
    assert_eq!(engine.program_output(), "unreported error occurred");
}

// ============================================================================
// Working directory & environment
// ============================================================================

#[tokio::test]
async fn test_working_directory_applied() {
    let dir = tempfile::tempdir().unwrap();
    let engine = ProcessEngine::with_config(
        ProcessConfig::new("/bin/sh")
            .arg("-c")
            .arg("pwd")
            .working_dir(dir.path())
            .capture_output(),
    );

    assert!(engine.run().await);
    let reported = engine.output();
    let reported = reported.trim_end();
    // compare canonicalized: the tempdir may sit behind a symlink
    assert_eq!(
        std::fs::canonicalize(reported).unwrap(),
        std::fs::canonicalize(dir.path()).unwrap()
    );
}

#[tokio::test]
async fn test_environment_variable_applied() {
    let engine = ProcessEngine::with_config(
        ProcessConfig::new("/bin/sh")
            .arg("-c")
            .arg("printf %s \"$WARDEN_PROBE\"")
            .env("WARDEN_PROBE", "present")
            .capture_output(),
    );

    assert!(engine.run().await);
    assert_eq!(engine.output(), "present");
}
