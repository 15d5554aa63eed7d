//! Host terminal state: raw-mode guard and window-size queries.

use std::io;
use std::os::fd::AsFd;

use nix::pty::Winsize;
use nix::sys::termios::{self, SetArg, Termios};
use tracing::warn;

/// Fallback terminal dimensions when stdin is not a TTY.
pub const DEFAULT_COLS: u16 = 80;
pub const DEFAULT_ROWS: u16 = 24;

/// Puts stdin into raw mode on construction and restores the saved state on
/// drop, so the terminal comes back even on early returns.
pub struct RawModeGuard {
    saved: Termios,
}

impl RawModeGuard {
    pub fn enable() -> io::Result<Self> {
        let stdin = io::stdin();
        let saved = termios::tcgetattr(stdin.as_fd()).map_err(io::Error::from)?;

        let mut raw = saved.clone();
        termios::cfmakeraw(&mut raw);
        termios::tcsetattr(stdin.as_fd(), SetArg::TCSANOW, &raw).map_err(io::Error::from)?;

        Ok(Self { saved })
    }
}

impl Drop for RawModeGuard {
    fn drop(&mut self) {
        let stdin = io::stdin();
        if let Err(e) = termios::tcsetattr(stdin.as_fd(), SetArg::TCSANOW, &self.saved) {
            warn!("failed to restore terminal state: {e}");
        }
    }
}

/// The fallback window size used when stdin is not a terminal.
pub fn fallback_size() -> Winsize {
    Winsize {
        ws_row: DEFAULT_ROWS,
        ws_col: DEFAULT_COLS,
        ws_xpixel: 0,
        ws_ypixel: 0,
    }
}

/// Query the real terminal size from stdin, falling back to 80x24 when the
/// query fails.
pub fn window_size() -> Winsize {
    let mut size = fallback_size();
    // Safety: TIOCGWINSZ only writes into the provided winsize struct.
    let rc = unsafe { libc::ioctl(libc::STDIN_FILENO, libc::TIOCGWINSZ, &mut size) };
    if rc != 0 || size.ws_col == 0 {
        return fallback_size();
    }
    size
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fallback_size_is_80x24() {
        let size = fallback_size();
        assert_eq!(size.ws_col, 80);
        assert_eq!(size.ws_row, 24);
    }

    #[test]
    fn window_size_never_returns_zero_columns() {
        // In CI stdin is usually a pipe, so this exercises the fallback.
        let size = window_size();
        assert!(size.ws_col > 0);
        assert!(size.ws_row > 0);
    }
}
