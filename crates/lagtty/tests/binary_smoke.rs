//! Smoke tests for the `lagtty` binary.

#![cfg(unix)]

use std::process::Command;

fn lagtty() -> Command {
    Command::new(env!("CARGO_BIN_EXE_lagtty"))
}

#[test]
fn piped_output_is_lf_only() {
    let output = lagtty()
        .args(["--", "echo", "hello"])
        .output()
        .expect("failed to run lagtty");

    assert!(
        output.status.success(),
        "exit {:?}, stderr: {}",
        output.status.code(),
        String::from_utf8_lossy(&output.stderr)
    );

    let stdout = &output.stdout;
    assert!(!stdout.is_empty(), "no output received");
    assert!(
        !stdout.windows(2).any(|pair| pair == b"\r\n"),
        "output contains CR+LF, expected only LF: {stdout:?}"
    );
    assert!(stdout.contains(&b'\n'), "output missing LF: {stdout:?}");
    assert!(String::from_utf8_lossy(stdout).contains("hello"));
}

#[test]
fn shaped_output_is_preserved() {
    let output = lagtty()
        .args([
            "--rtt", "40ms", "--jitter", "10ms", "--chunk", "3", "--seed", "42", "--", "echo",
            "shaped bytes arrive intact",
        ])
        .output()
        .expect("failed to run lagtty");

    assert!(output.status.success());
    assert!(
        String::from_utf8_lossy(&output.stdout).contains("shaped bytes arrive intact"),
        "got: {:?}",
        String::from_utf8_lossy(&output.stdout)
    );
}

#[test]
fn exit_code_propagates() {
    let status = lagtty()
        .args(["--", "sh", "-c", "exit 3"])
        .status()
        .expect("failed to run lagtty");
    assert_eq!(status.code(), Some(3));
}

#[test]
fn missing_command_exits_one_with_usage() {
    let output = lagtty().output().expect("failed to run lagtty");
    assert_eq!(output.status.code(), Some(1));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("no command specified"), "stderr: {stderr}");
    assert!(stderr.contains("Usage:"), "stderr: {stderr}");
}

#[test]
fn unknown_profile_exits_one() {
    let output = lagtty()
        .args(["--profile", "telegraph", "--", "true"])
        .output()
        .expect("failed to run lagtty");
    assert_eq!(output.status.code(), Some(1));
    assert!(
        String::from_utf8_lossy(&output.stderr).contains("unknown profile"),
        "stderr: {}",
        String::from_utf8_lossy(&output.stderr)
    );
}

#[test]
fn genman_emits_roff() {
    let output = Command::new(env!("CARGO_BIN_EXE_genman"))
        .output()
        .expect("failed to run genman");
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.starts_with(".TH LAGTTY 1"), "not a man page: {stdout:.40}");
    assert!(stdout.contains(".SH OPTIONS"));
}

#[test]
fn list_profiles_prints_table() {
    let output = lagtty()
        .args(["--list-profiles"])
        .output()
        .expect("failed to run lagtty");
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    for name in ["9600", "dialup", "3g", "satellite", "intercontinental"] {
        assert!(stdout.contains(name), "missing profile {name}: {stdout}");
    }
}
