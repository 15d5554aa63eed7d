//! Session orchestration for the `lagtty` binary.
//!
//! This crate wires the shaper library to the outside world: CLI parsing,
//! preset profiles, PTY lifecycle, terminal modes, signal handling, and the
//! shutdown/drain policy around the wrapped child process.

pub mod cli;
pub mod error;
pub mod logging;
pub mod profiles;
pub mod pty;
pub mod session;
pub mod term;
