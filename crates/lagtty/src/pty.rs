//! PTY plumbing: open a master/slave pair, spawn the child on the slave,
//! and expose the master as a nonblocking async byte stream.

use std::io;
use std::os::fd::{AsFd, AsRawFd, OwnedFd};
use std::os::unix::process::CommandExt;
use std::pin::Pin;
use std::process::Stdio;
use std::task::{Context, Poll, ready};

use nix::pty::{Winsize, openpty};
use nix::sys::termios::{self, OutputFlags, SetArg, Termios};
use tokio::io::unix::AsyncFd;
use tokio::io::{AsyncRead, AsyncWrite, ReadBuf};
use tokio::process::{Child, Command};
use tracing::debug;

use crate::error::SessionError;

/// A PTY master with a child process attached to the slave side.
pub struct PtySession {
    master: OwnedFd,
    pub child: Child,
}

impl PtySession {
    /// Open a PTY of the given size and spawn `command` on the slave.
    ///
    /// The child gets a fresh session with the slave as its controlling
    /// terminal, which also makes it the leader of its own process group
    /// for signal forwarding.
    pub fn spawn(command: &[String], size: Winsize) -> Result<Self, SessionError> {
        let (program, args) = command
            .split_first()
            .ok_or_else(|| SessionError::Config("no command specified".into()))?;

        let pty = openpty(Some(&size), None::<&Termios>).map_err(io::Error::from)?;
        let master = pty.master;
        let slave = pty.slave;

        let mut cmd = std::process::Command::new(program);
        cmd.args(args)
            .stdin(Stdio::from(slave.try_clone()?))
            .stdout(Stdio::from(slave.try_clone()?))
            .stderr(Stdio::from(slave));
        // Safety: the pre_exec hook runs between fork and exec and only
        // calls async-signal-safe functions.
        unsafe {
            cmd.pre_exec(|| {
                nix::unistd::setsid().map_err(io::Error::from)?;
                // The slave is already on fd 0; claim it as the
                // controlling terminal of the new session.
                if libc::ioctl(0, libc::TIOCSCTTY as _, 0) < 0 {
                    return Err(io::Error::last_os_error());
                }
                Ok(())
            });
        }

        let child = Command::from(cmd).spawn().map_err(|e| SessionError::Spawn {
            command: program.clone(),
            source: e,
        })?;
        debug!(pid = child.id(), %program, "child spawned on pty");

        set_nonblocking(&master)?;

        Ok(Self { master, child })
    }

    /// Split the master into independently-registered read and write
    /// endpoints. Each half dups the fd so tokio tracks two distinct
    /// registrations.
    pub fn split_master(&self) -> io::Result<(PtyReader, PtyWriter)> {
        let reader = PtyEndpoint::new(self.master.try_clone()?)?;
        let writer = PtyEndpoint::new(self.master.try_clone()?)?;
        Ok((PtyReader(reader), PtyWriter(writer)))
    }

    /// A handle that can push window-size updates to the PTY from another
    /// task.
    pub fn resize_handle(&self) -> io::Result<ResizeHandle> {
        Ok(ResizeHandle {
            master: self.master.try_clone()?,
        })
    }

    /// Disable output NL-to-CRNL translation on the PTY so piped output
    /// carries plain LF.
    pub fn disable_onlcr(&self) -> io::Result<()> {
        let mut attrs = termios::tcgetattr(self.master.as_fd()).map_err(io::Error::from)?;
        attrs.output_flags.remove(OutputFlags::ONLCR);
        termios::tcsetattr(self.master.as_fd(), SetArg::TCSANOW, &attrs).map_err(io::Error::from)
    }
}

/// Handle for propagating window-size changes to the PTY.
pub struct ResizeHandle {
    master: OwnedFd,
}

impl ResizeHandle {
    pub fn resize(&self, size: Winsize) -> io::Result<()> {
        // Safety: the fd is owned and the winsize struct outlives the call.
        if unsafe { libc::ioctl(self.master.as_raw_fd(), libc::TIOCSWINSZ, &size) } < 0 {
            return Err(io::Error::last_os_error());
        }
        Ok(())
    }
}

fn set_nonblocking(fd: &OwnedFd) -> io::Result<()> {
    // Safety: fd is owned and valid for both calls.
    unsafe {
        let flags = libc::fcntl(fd.as_raw_fd(), libc::F_GETFL);
        if flags < 0 {
            return Err(io::Error::last_os_error());
        }
        if libc::fcntl(fd.as_raw_fd(), libc::F_SETFL, flags | libc::O_NONBLOCK) < 0 {
            return Err(io::Error::last_os_error());
        }
    }
    Ok(())
}

struct PtyEndpoint {
    io: AsyncFd<OwnedFd>,
}

impl PtyEndpoint {
    fn new(fd: OwnedFd) -> io::Result<Self> {
        Ok(Self {
            io: AsyncFd::new(fd)?,
        })
    }
}

/// Read half of the PTY master.
pub struct PtyReader(PtyEndpoint);

/// Write half of the PTY master.
pub struct PtyWriter(PtyEndpoint);

impl AsyncRead for PtyReader {
    fn poll_read(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        let this = self.get_mut();
        loop {
            let mut guard = ready!(this.0.io.poll_read_ready(cx))?;
            let unfilled = buf.initialize_unfilled();
            match guard.try_io(|inner| {
                // Safety: the buffer is valid for `len` writable bytes.
                let n = unsafe {
                    libc::read(
                        inner.get_ref().as_raw_fd(),
                        unfilled.as_mut_ptr().cast(),
                        unfilled.len(),
                    )
                };
                if n < 0 {
                    Err(io::Error::last_os_error())
                } else {
                    Ok(n as usize)
                }
            }) {
                Ok(Ok(n)) => {
                    buf.advance(n);
                    return Poll::Ready(Ok(()));
                }
                // Linux reports EIO on the master once the slave side is
                // gone; the session treats that as end-of-stream so the
                // downstream shaper drains normally.
                Ok(Err(e)) if e.raw_os_error() == Some(libc::EIO) => {
                    return Poll::Ready(Ok(()));
                }
                Ok(Err(e)) => return Poll::Ready(Err(e)),
                Err(_would_block) => continue,
            }
        }
    }
}

impl AsyncWrite for PtyWriter {
    fn poll_write(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        let this = self.get_mut();
        loop {
            let mut guard = ready!(this.0.io.poll_write_ready(cx))?;
            match guard.try_io(|inner| {
                // Safety: the buffer is valid for `len` readable bytes.
                let n = unsafe {
                    libc::write(inner.get_ref().as_raw_fd(), buf.as_ptr().cast(), buf.len())
                };
                if n < 0 {
                    Err(io::Error::last_os_error())
                } else {
                    Ok(n as usize)
                }
            }) {
                Ok(result) => return Poll::Ready(result),
                Err(_would_block) => continue,
            }
        }
    }

    fn poll_flush(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        // PTY writes are unbuffered at this layer.
        Poll::Ready(Ok(()))
    }

    fn poll_shutdown(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Poll::Ready(Ok(()))
    }
}
