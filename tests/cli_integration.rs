//! CLI integration tests
//!
//! These run the built binary against an isolated storage directory and
//! cover parsing, output formats and exit codes. None of them needs a model
//! server or ffmpeg.

use std::path::Path;
use std::process::{Command, Output};
use tempfile::TempDir;

fn cyclops(storage: &Path, args: &[&str]) -> Output {
    cyclops_with_env(storage, &[], args)
}

fn cyclops_with_env(storage: &Path, env: &[(&str, &str)], args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_cyclops"))
        .args(args)
        .env("CYCLOPS_STORAGE_DIR", storage)
        .env("CYCLOPS_PROVIDER", "local")
        .env_remove("CYCLOPS_TTS_ENABLED")
        .env_remove("OPENAI_API_KEY")
        .envs(env.iter().copied())
        .env_remove("CYCLOPS_LOG_JSON")
        .env_remove("RUST_LOG")
        .output()
        .expect("Failed to run cyclops binary")
}

fn stdout(output: &Output) -> String {
    String::from_utf8_lossy(&output.stdout).to_string()
}

fn stderr(output: &Output) -> String {
    String::from_utf8_lossy(&output.stderr).to_string()
}

#[test]
fn test_cli_help() {
    let dir = TempDir::new().unwrap();
    let output = cyclops(dir.path(), &["--help"]);

    assert!(output.status.success());
    let text = stdout(&output);
    for command in ["extract", "lesson", "verify", "feedback", "health", "config"] {
        assert!(text.contains(command), "help is missing {}", command);
    }
}

#[test]
fn test_cli_version() {
    let dir = TempDir::new().unwrap();
    let output = cyclops(dir.path(), &["--version"]);

    assert!(output.status.success());
    assert!(stdout(&output).contains(env!("CARGO_PKG_VERSION")));
}

#[test]
fn test_config_json_reflects_environment() {
    let dir = TempDir::new().unwrap();
    let output = cyclops(dir.path(), &["config", "--format", "json"]);

    assert!(output.status.success(), "stderr: {}", stderr(&output));
    let config: serde_json::Value = serde_json::from_str(&stdout(&output)).unwrap();
    assert_eq!(config["provider"], "local");
    assert_eq!(config["api_key"], "not set");
    assert_eq!(config["storage_dir"], dir.path().display().to_string());
    assert_eq!(config["request_timeout_secs"], "120");
}

#[test]
fn test_lesson_list_on_empty_storage() {
    let dir = TempDir::new().unwrap();

    let output = cyclops(dir.path(), &["lesson", "list"]);
    assert!(output.status.success(), "stderr: {}", stderr(&output));
    assert_eq!(stdout(&output), "No lessons yet\n");

    let output = cyclops(dir.path(), &["lesson", "list", "-f", "json"]);
    assert!(output.status.success());
    let lessons: serde_json::Value = serde_json::from_str(&stdout(&output)).unwrap();
    assert_eq!(lessons, serde_json::json!([]));
}

#[test]
fn test_unknown_lesson_fails() {
    let dir = TempDir::new().unwrap();

    let output = cyclops(dir.path(), &["lesson", "show", "no-such-lesson"]);
    assert_eq!(output.status.code(), Some(1));
    assert!(stderr(&output).contains("Lesson not found: no-such-lesson"));

    let output = cyclops(dir.path(), &["lesson", "delete", "no-such-lesson"]);
    assert_eq!(output.status.code(), Some(1));
}

#[test]
fn test_lesson_commands_ignore_backend_settings() {
    let dir = TempDir::new().unwrap();
    let env = [("CYCLOPS_TTS_ENABLED", "true"), ("CYCLOPS_PROVIDER", "cloud")];

    let output = cyclops_with_env(dir.path(), &env, &["lesson", "list"]);
    assert!(output.status.success(), "stderr: {}", stderr(&output));
    assert_eq!(stdout(&output), "No lessons yet\n");

    let output = cyclops_with_env(dir.path(), &env, &["lesson", "show", "missing"]);
    assert_eq!(output.status.code(), Some(1));
    assert!(stderr(&output).contains("Lesson not found: missing"));

    let output = cyclops_with_env(dir.path(), &env, &["lesson", "delete", "missing"]);
    assert_eq!(output.status.code(), Some(1));
    assert!(stderr(&output).contains("Lesson not found: missing"));
}

#[test]
fn test_verify_unreadable_frame_fails() {
    let dir = TempDir::new().unwrap();
    let output = cyclops(
        dir.path(),
        &["verify", "--lesson", "x", "--step", "1", "/nonexistent/frame.jpg"],
    );

    assert_eq!(output.status.code(), Some(1));
    assert!(stderr(&output).contains("Failed to read frame"));
}

#[test]
fn test_health_cloud_without_key_is_unavailable() {
    let dir = TempDir::new().unwrap();
    let output = cyclops(dir.path(), &["health", "--provider", "cloud", "-f", "json"]);

    assert_eq!(output.status.code(), Some(1));
    let health: serde_json::Value = serde_json::from_str(&stdout(&output)).unwrap();
    assert_eq!(health["cloud"]["available"], false);
}

#[test]
fn test_invalid_provider_is_a_usage_error() {
    let dir = TempDir::new().unwrap();
    let output = cyclops(dir.path(), &["extract", "demo.mp4", "--provider", "gemini"]);

    assert_eq!(output.status.code(), Some(2));
    assert!(stderr(&output).contains("Invalid provider"));
}
