//! Command execution against a remote handle.
//!
//! [`run_command`] dispatches one command, collects stdout and stderr
//! independently and produces exactly one outcome:
//!
//! - `Ok(CommandOutput)` once the stream closes after an exit status
//! - [`ShellError::Timeout`] if no terminal event arrives before the deadline
//! - [`ShellError::Transport`] with stage `Stream` or `Dispatch`
//! - [`ShellError::Cancelled`] if the manager is shutting down
//!
//! One deadline covers dispatch and collection. Whatever the outcome, the
//! command channel is closed before returning. A timed-out remote process may
//! keep running; only the local wait is abandoned.

use std::time::{Duration, Instant};

use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::mcp::error::{ShellError, TransportStage};
use crate::mcp::transport::{ExecEvent, ExecStream, RemoteHandle};

/// Normalised result of a command that ran to completion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandOutput {
    pub exit_status: i32,
    /// Trimmed of leading and trailing whitespace
    pub stdout: String,
    /// Trimmed of leading and trailing whitespace
    pub stderr: String,
    pub elapsed: Duration,
}

/// Execute `command` with a `timeout` bound, aborting early on `cancel`.
pub async fn run_command(
    handle: &dyn RemoteHandle,
    command: &str,
    timeout: Duration,
    cancel: &CancellationToken,
) -> Result<CommandOutput, ShellError> {
    let started = Instant::now();
    let deadline = tokio::time::Instant::now() + timeout;
    let timed_out = || ShellError::Timeout {
        operation: "command".to_string(),
        timeout,
    };

    debug!("Dispatching command: {}", command);

    let dispatched = tokio::select! {
        biased;
        _ = cancel.cancelled() => {
            return Err(ShellError::Cancelled { operation: "command".to_string() });
        }
        result = tokio::time::timeout_at(deadline, handle.exec(command)) => result,
    };
    let mut stream = match dispatched {
        Ok(stream) => stream?,
        Err(_) => {
            warn!("Command dispatch timed out after {:?}: {}", timeout, command);
            return Err(timed_out());
        }
    };

    let outcome = tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(ShellError::Cancelled { operation: "command".to_string() }),
        result = tokio::time::timeout_at(deadline, collect(stream.as_mut())) => {
            result.unwrap_or_else(|_| {
                warn!("Command timed out after {:?}: {}", timeout, command);
                Err(timed_out())
            })
        }
    };

    stream.close().await;

    let (exit_status, stdout, stderr) = outcome?;
    let elapsed = started.elapsed();
    debug!(
        "Command finished with exit status {} in {:?}: {}",
        exit_status, elapsed, command
    );

    Ok(CommandOutput {
        exit_status,
        stdout: String::from_utf8_lossy(&stdout).trim().to_string(),
        stderr: String::from_utf8_lossy(&stderr).trim().to_string(),
        elapsed,
    })
}

/// Drain the stream. Success requires an exit status before the stream closes.
async fn collect(stream: &mut dyn ExecStream) -> Result<(i32, Vec<u8>, Vec<u8>), ShellError> {
    // Pre-allocate buffers to reduce reallocations during output collection
    let mut stdout = Vec::with_capacity(4096);
    let mut stderr = Vec::with_capacity(1024);
    let mut exit_status = None;

    while let Some(event) = stream.next_event().await {
        match event? {
            ExecEvent::Stdout(data) => stdout.extend_from_slice(&data),
            ExecEvent::Stderr(data) => stderr.extend_from_slice(&data),
            ExecEvent::Exit(code) => exit_status = Some(code),
        }
    }

    match exit_status {
        Some(code) => Ok((code, stdout, stderr)),
        None => Err(ShellError::transport(
            TransportStage::Stream,
            "channel closed without an exit status",
        )),
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::Ordering;

    use super::*;
    use crate::mcp::error::ErrorKind;
    use crate::mcp::transport::mock::{MOCK_HOME, MockRemote};

    async fn run(remote: &MockRemote, command: &str, timeout: Duration) -> Result<CommandOutput, ShellError> {
        run_command(remote, command, timeout, &CancellationToken::new()).await
    }

    mod outcomes {
        use super::*;

        #[tokio::test]
        async fn test_success_trims_output() {
            let remote = MockRemote::new();
            let out = run(&remote, "echo   hello  ", Duration::from_secs(5)).await.unwrap();
            assert_eq!(out.exit_status, 0);
            assert_eq!(out.stdout, "hello");
            assert_eq!(out.stderr, "");
        }

        #[tokio::test]
        async fn test_stdout_and_stderr_are_separate() {
            let remote = MockRemote::new();
            let out = run(&remote, "echo out && warn err", Duration::from_secs(5))
                .await
                .unwrap();
            assert_eq!(out.stdout, "out");
            assert_eq!(out.stderr, "err");
        }

        #[tokio::test]
        async fn test_non_zero_exit_is_still_output() {
            let remote = MockRemote::new();
            let out = run(&remote, "exit 3", Duration::from_secs(5)).await.unwrap();
            assert_eq!(out.exit_status, 3);
        }

        #[tokio::test]
        async fn test_pwd_reports_home() {
            let remote = MockRemote::new();
            let out = run(&remote, "pwd", Duration::from_secs(5)).await.unwrap();
            assert_eq!(out.stdout, MOCK_HOME);
        }

        #[tokio::test]
        async fn test_stream_error() {
            let remote = MockRemote::new();
            let err = run(&remote, "echo partial && explode", Duration::from_secs(5))
                .await
                .unwrap_err();
            assert!(matches!(
                err,
                ShellError::Transport { stage: TransportStage::Stream, .. }
            ));
        }

        #[tokio::test]
        async fn test_close_without_exit_status_is_stream_error() {
            let remote = MockRemote::new();
            let err = run(&remote, "vanish", Duration::from_secs(5)).await.unwrap_err();
            assert!(matches!(
                err,
                ShellError::Transport { stage: TransportStage::Stream, .. }
            ));
        }

        #[tokio::test]
        async fn test_dispatch_error() {
            let remote = MockRemote::new();
            remote.state.fail_dispatch.store(true, Ordering::SeqCst);
            let err = run(&remote, "pwd", Duration::from_secs(5)).await.unwrap_err();
            assert!(matches!(
                err,
                ShellError::Transport { stage: TransportStage::Dispatch, .. }
            ));
        }
    }

    mod timeout {
        use super::*;

        #[tokio::test]
        async fn test_times_out_near_bound() {
            let remote = MockRemote::new();
            let started = Instant::now();
            let err = run(&remote, "sleep 5", Duration::from_millis(100))
                .await
                .unwrap_err();

            assert_eq!(err.kind(), ErrorKind::Timeout);
            let elapsed = started.elapsed();
            assert!(elapsed >= Duration::from_millis(100));
            assert!(elapsed < Duration::from_secs(2), "took {:?}", elapsed);
        }

        #[tokio::test]
        async fn test_stream_closed_after_timeout() {
            let remote = MockRemote::new();
            let _ = run(&remote, "sleep 5", Duration::from_millis(50)).await;
            assert_eq!(remote.state.streams_closed.load(Ordering::SeqCst), 1);
        }

        #[tokio::test]
        async fn test_fast_command_unaffected_by_timeout() {
            let remote = MockRemote::new();
            let out = run(&remote, "sleep 0.01 && echo done", Duration::from_secs(2))
                .await
                .unwrap();
            assert_eq!(out.stdout, "done");
        }
    }

    #[tokio::test]
    async fn test_cancelled_token_aborts() {
        let remote = MockRemote::new();
        let token = CancellationToken::new();
        token.cancel();
        let err = run_command(&remote, "sleep 5", Duration::from_secs(10), &token)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Cancelled);
    }
}
