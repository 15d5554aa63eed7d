//! Session orchestration: PTY lifecycle, shaper wiring, signal handling,
//! and the shutdown/drain policy around the wrapped child.

use std::io::IsTerminal;
use std::os::unix::process::ExitStatusExt;
use std::process::ExitStatus;
use std::time::Duration;

use nix::sys::signal::{Signal, killpg};
use nix::unistd::Pid;
use tokio::signal::unix::{SignalKind, signal};
use tokio::task::JoinError;
use tracing::{debug, error, warn};

use lagtty_shaper::{Shaper, ShaperError, ShutdownToken};

use crate::cli::Settings;
use crate::error::SessionError;
use crate::pty::{PtySession, ResizeHandle};
use crate::term;

/// Maximum time to let the downstream shaper drain after the child exits.
/// Rate-limited sessions can legitimately hold many seconds of output.
pub const DRAIN_TIMEOUT: Duration = Duration::from_secs(30);

/// How long to wait for a cancelled shaper task to unwind.
const TASK_EXIT_WAIT: Duration = Duration::from_millis(500);

/// Run `settings.command` under a PTY with both shapers installed.
///
/// Returns the child's exit code. The upstream shaper is cancelled the
/// moment the child exits; the downstream shaper gets [`DRAIN_TIMEOUT`] to
/// deliver everything the child said on its way out before it too is
/// cancelled. Shaper failures after child exit are logged but never
/// override the child's status.
pub async fn run(settings: Settings) -> Result<i32, SessionError> {
    let stdin_tty = std::io::stdin().is_terminal();
    let stdout_tty = std::io::stdout().is_terminal();

    let size = if stdin_tty {
        term::window_size()
    } else {
        term::fallback_size()
    };
    let mut session = PtySession::spawn(&settings.command, size)?;

    if !stdout_tty {
        // Piped output should carry plain LF, not the PTY's CR+LF.
        session.disable_onlcr()?;
    }

    // Raw mode only when the session is fully interactive; otherwise leave
    // the invoking terminal alone.
    let _raw_guard = if stdin_tty && stdout_tty {
        Some(term::RawModeGuard::enable()?)
    } else {
        None
    };

    let (master_read, master_write) = session.split_master()?;
    let resize = session.resize_handle()?;
    let child_pid = session.child.id();

    let up_token = ShutdownToken::new();
    let down_token = ShutdownToken::new();

    let mut up_task = tokio::spawn(Shaper::new(settings.up).run(
        up_token.subscribe(),
        tokio::io::stdin(),
        master_write,
    ));
    let mut down_task = tokio::spawn(Shaper::new(settings.down).run(
        down_token.subscribe(),
        master_read,
        tokio::io::stdout(),
    ));
    let signal_task = tokio::spawn(forward_signals(child_pid, resize));

    let status = session.child.wait().await?;
    debug!(?status, "child exited");

    // Keystrokes still in flight have nowhere to go.
    up_token.signal_stop();

    // The downstream shaper sees EOF from the master and drains on its own;
    // bound that with the drain timeout, then force the issue.
    match tokio::time::timeout(DRAIN_TIMEOUT, &mut down_task).await {
        Ok(joined) => log_shaper_exit("downstream", joined),
        Err(_) => {
            warn!("downstream drain exceeded {DRAIN_TIMEOUT:?}, cancelling");
            down_token.signal_stop();
            if let Ok(joined) = tokio::time::timeout(TASK_EXIT_WAIT, &mut down_task).await {
                log_shaper_exit("downstream", joined);
            }
        }
    }

    match tokio::time::timeout(TASK_EXIT_WAIT, &mut up_task).await {
        Ok(joined) => log_shaper_exit("upstream", joined),
        Err(_) => up_task.abort(),
    }
    signal_task.abort();

    Ok(exit_code(status))
}

/// Forward terminal signals for the lifetime of the session: SIGWINCH
/// propagates the new window size to the PTY, SIGINT/SIGTERM go to the
/// child's process group as SIGTERM.
async fn forward_signals(child_pid: Option<u32>, resize: ResizeHandle) {
    let (Ok(mut winch), Ok(mut interrupt), Ok(mut terminate)) = (
        signal(SignalKind::window_change()),
        signal(SignalKind::interrupt()),
        signal(SignalKind::terminate()),
    ) else {
        warn!("failed to install signal handlers");
        return;
    };

    loop {
        tokio::select! {
            _ = winch.recv() => {
                let _ = resize.resize(term::window_size());
            }
            _ = interrupt.recv() => forward_sigterm(child_pid),
            _ = terminate.recv() => forward_sigterm(child_pid),
        }
    }
}

fn forward_sigterm(child_pid: Option<u32>) {
    let Some(pid) = child_pid else { return };
    // The pre-exec setsid made the child the leader of its own group.
    let _ = killpg(Pid::from_raw(pid as i32), Signal::SIGTERM);
}

fn log_shaper_exit(direction: &str, joined: Result<Result<(), ShaperError>, JoinError>) {
    match joined {
        Ok(Ok(())) => debug!(direction, "shaper finished"),
        Ok(Err(e)) if e.is_cancelled() => debug!(direction, "shaper cancelled"),
        // The child has already exited; its status wins over shaper errors.
        Ok(Err(e)) => error!(direction, "shaper failed: {e}"),
        Err(e) => error!(direction, "shaper task failed: {e}"),
    }
}

/// Map the child's wait status to a shell-style exit code.
fn exit_code(status: ExitStatus) -> i32 {
    status
        .code()
        .unwrap_or_else(|| 128 + status.signal().unwrap_or(0))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exit_code_passes_through_normal_exit() {
        let status = ExitStatus::from_raw(7 << 8);
        assert_eq!(exit_code(status), 7);
    }

    #[test]
    fn exit_code_maps_signals_to_128_plus() {
        // Raw wait status 9 means "terminated by SIGKILL".
        let status = ExitStatus::from_raw(9);
        assert_eq!(exit_code(status), 137);
    }
}
