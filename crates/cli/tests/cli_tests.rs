//! CLI integration tests

use std::process::Command;

fn run_tpm(args: &[&str]) -> std::process::Output {
    Command::new("cargo")
        .args(["run", "-q", "-p", "tpm-cli", "--"])
        .args(args)
        .output()
        .expect("Failed to execute command")
}

/// Test that the CLI shows help
#[test]
fn test_cli_help() {
    let output = run_tpm(&["--help"]);
    let stdout = String::from_utf8_lossy(&output.stdout);

    assert!(output.status.success(), "CLI help should succeed");
    assert!(stdout.contains("Throughput Monitor"), "Should show app name");
    assert!(stdout.contains("samples"), "Should show samples command");
    assert!(stdout.contains("points"), "Should show points command");
    assert!(stdout.contains("model"), "Should show model command");
    assert!(stdout.contains("status"), "Should show status command");
    assert!(stdout.contains("--api-url"), "Should show api-url option");
}

/// Test that the CLI shows version
#[test]
fn test_cli_version() {
    let output = run_tpm(&["--version"]);
    let stdout = String::from_utf8_lossy(&output.stdout);

    assert!(output.status.success(), "CLI version should succeed");
    assert!(stdout.contains("tpm"), "Should show binary name");
}

#[test]
fn test_points_help() {
    let output = run_tpm(&["points", "--help"]);
    let stdout = String::from_utf8_lossy(&output.stdout);

    assert!(output.status.success(), "Points help should succeed");
    assert!(stdout.contains("--target"), "Should show target option");
    assert!(stdout.contains("-n"), "Should show limit option");
}

#[test]
fn test_model_requires_target() {
    let output = run_tpm(&["model"]);
    let stderr = String::from_utf8_lossy(&output.stderr);

    assert!(!output.status.success(), "Model without target should fail");
    assert!(stderr.contains("--target"), "Should mention missing target");
}

#[test]
fn test_invalid_format_is_rejected() {
    let output = run_tpm(&["--format", "yaml", "status"]);

    assert!(!output.status.success(), "Unknown format should fail");
}

/// Test that an unreachable API is reported as an error
#[test]
fn test_unreachable_api_fails() {
    let output = run_tpm(&["--api-url", "http://127.0.0.1:1", "status"]);
    let stderr = String::from_utf8_lossy(&output.stderr);

    assert!(!output.status.success(), "Unreachable API should fail");
    assert!(
        stderr.contains("Failed to send request"),
        "Should report the connection failure"
    );
}
