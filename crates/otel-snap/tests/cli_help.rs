//! Smoke test that the packaged binary starts, parses flags, and exits
//! cleanly on `--help` without touching the network or the filesystem.

use std::process::Command;

#[test]
fn help_flag_exits_successfully() {
    let output = Command::new(env!("CARGO_BIN_EXE_otel-snap"))
        .arg("--help")
        .output()
        .expect("binary should run");
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("otel-snap"));
}
