//! Logging output of the binary: JSON lines, file redirection, and token
//! redaction.

use assert_cmd::Command;
use serde_json::Value;
use wiremock::MockServer;

mod common;

use common::logger::TestLogger;
use common::mock_service::mount_credit;
use genflow::core::logging::{self, LogFormat, LogLevel, LogSettings};
use genflow::test_utils::TestDir;

const SECRET: &str = "secret-session-token-value";

#[allow(deprecated)]
fn credit_command(dir: &TestDir, server: &MockServer) -> Command {
    let mut cmd = Command::cargo_bin("genflow").unwrap();
    cmd.env_remove("GENFLOW_TOKENS")
        .env_remove("RUST_LOG")
        .env_remove("GENFLOW_LOG")
        .env_remove("GENFLOW_VERBOSE")
        .env_remove("GENFLOW_LOG_FORMAT")
        .env("GENFLOW_CONFIG", dir.file_path("config.toml"))
        .args(["--token", SECRET, "--base-url", &server.uri(), "credit"]);
    cmd
}

#[test]
fn init_accepts_every_format() {
    // only the first init installs a subscriber; later calls must not panic
    logging::init(&LogSettings::new(LogLevel::Debug, LogFormat::Human));
    logging::init(&LogSettings::new(LogLevel::Debug, LogFormat::Json));
    logging::init(&LogSettings::new(LogLevel::Info, LogFormat::Compact));
}

#[tokio::test(flavor = "multi_thread")]
async fn json_logs_are_lines_of_json_without_tokens() {
    let log = TestLogger::new("json_logs_are_lines_of_json_without_tokens");
    let server = MockServer::start().await;
    mount_credit(&server, 5).await;
    let dir = TestDir::new();
    let mut cmd = credit_command(&dir, &server);
    cmd.args(["--json-output", "--log-level", "debug"]);

    let output = tokio::task::spawn_blocking(move || cmd.output().unwrap())
        .await
        .unwrap();
    assert!(output.status.success());

    let stderr = String::from_utf8_lossy(&output.stderr);
    let lines: Vec<&str> = stderr.lines().filter(|l| !l.trim().is_empty()).collect();
    assert!(!lines.is_empty(), "expected debug logs");
    for line in &lines {
        serde_json::from_str::<Value>(line).unwrap_or_else(|e| panic!("{e}: {line}"));
    }
    assert!(!stderr.contains(SECRET));
    assert!(!String::from_utf8_lossy(&output.stdout).contains(SECRET));
    log.finish_ok();
}

#[tokio::test(flavor = "multi_thread")]
async fn log_file_receives_output() {
    let server = MockServer::start().await;
    mount_credit(&server, 5).await;
    let dir = TestDir::new();
    let log_path = dir.file_path("genflow.log");
    let mut cmd = credit_command(&dir, &server);
    cmd.env("GENFLOW_LOG_FILE", &log_path)
        .args(["--log-level", "debug"]);

    let output = tokio::task::spawn_blocking(move || cmd.output().unwrap())
        .await
        .unwrap();
    assert!(output.status.success());

    let written = dir.read_file("genflow.log").unwrap();
    assert!(written.contains("Calling service"));
    assert!(!written.contains(SECRET));
}

#[tokio::test(flavor = "multi_thread")]
async fn config_file_sets_log_level_and_format() {
    let log = TestLogger::new("config_file_sets_log_level_and_format");
    let server = MockServer::start().await;
    mount_credit(&server, 5).await;
    let dir = TestDir::new();
    dir.create_file(
        "config.toml",
        "[general]\nlog_level = \"debug\"\nlog_format = \"json\"\n",
    );
    let mut cmd = credit_command(&dir, &server);

    let output = tokio::task::spawn_blocking(move || cmd.output().unwrap())
        .await
        .unwrap();
    assert!(output.status.success());

    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("Calling service"), "{stderr}");
    for line in stderr.lines().filter(|l| !l.trim().is_empty()) {
        serde_json::from_str::<Value>(line).unwrap_or_else(|e| panic!("{e}: {line}"));
    }
    log.finish_ok();
}

#[tokio::test(flavor = "multi_thread")]
async fn cli_level_overrides_config_file() {
    let server = MockServer::start().await;
    mount_credit(&server, 5).await;
    let dir = TestDir::new();
    dir.create_file("config.toml", "[general]\nlog_level = \"debug\"\n");
    let mut cmd = credit_command(&dir, &server);
    cmd.args(["--log-level", "error"]);

    let output = tokio::task::spawn_blocking(move || cmd.output().unwrap())
        .await
        .unwrap();
    assert!(output.status.success());
    assert!(!String::from_utf8_lossy(&output.stderr).contains("Calling service"));
}
