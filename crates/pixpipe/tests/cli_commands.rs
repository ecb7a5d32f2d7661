#![cfg(feature = "cli")]

use std::process::Command;

#[test]
fn version_reports_crate_version() {
    let output = Command::new(env!("CARGO_BIN_EXE_pixpipe"))
        .arg("version")
        .output()
        .expect("version should run");

    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert_eq!(
        stdout.trim(),
        format!("pixpipe {}", env!("CARGO_PKG_VERSION"))
    );
}

#[test]
fn extended_version_reports_protocol() {
    let output = Command::new(env!("CARGO_BIN_EXE_pixpipe"))
        .args(["version", "--extended"])
        .output()
        .expect("version should run");

    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("protocol: 2"));
}

#[test]
fn bad_frame_size_is_a_usage_error() {
    let output = Command::new(env!("CARGO_BIN_EXE_pixpipe"))
        .args(["serve", "--size", "0x480", "--port", "0"])
        .output()
        .expect("serve should run");

    assert_eq!(output.status.code(), Some(64));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("invalid size"));
}

#[test]
fn bad_duration_is_a_usage_error() {
    let output = Command::new(env!("CARGO_BIN_EXE_pixpipe"))
        .args(["recv", "127.0.0.1", "--tick", "soon"])
        .output()
        .expect("recv should run");

    assert_eq!(output.status.code(), Some(64));
}
