//! Integration tests for the `hubpanel` CLI binary.
//!
//! Argument parsing, help output, and error exit codes run without any
//! server; entity and configuration commands run against `wiremock`
//! stand-ins for the hub and the settings server.
#![allow(clippy::unwrap_used)]

use std::path::{Path, PathBuf};
use std::process::Output;

use assert_cmd::cargo::cargo_bin_cmd;
use predicates::prelude::*;
use serde_json::{Value, json};
use wiremock::matchers::{body_partial_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

// ── Helpers ─────────────────────────────────────────────────────────

/// Build a [`Command`] for the `hubpanel` binary with env isolation.
///
/// Clears `HUBPANEL_*` variables and points config directories at a
/// nonexistent path so tests never touch the user's real configuration.
fn hubpanel_cmd() -> assert_cmd::Command {
    let mut cmd = cargo_bin_cmd!("hubpanel");
    cmd.env("HOME", "/tmp/hubpanel-cli-test-nonexistent")
        .env("XDG_CONFIG_HOME", "/tmp/hubpanel-cli-test-nonexistent")
        .env("NO_COLOR", "1")
        .env_remove("RUST_LOG")
        .env_remove("HUBPANEL_CONFIG")
        .env_remove("HUBPANEL_TOKEN")
        .env_remove("HUBPANEL_HUB__URL")
        .env_remove("HUBPANEL_SETTINGS__URL")
        .env_remove("HUBPANEL_SETTINGS__IDENTITY");
    cmd
}

/// Concatenate stdout + stderr from a command output for flexible matching.
fn combined_output(output: &Output) -> String {
    let stdout = String::from_utf8_lossy(&output.stdout);
    let stderr = String::from_utf8_lossy(&output.stderr);
    format!("{stdout}{stderr}")
}

/// Run the binary off the async runtime so the mock servers keep serving.
async fn run(mut cmd: assert_cmd::Command) -> Output {
    tokio::task::spawn_blocking(move || cmd.output().unwrap())
        .await
        .unwrap()
}

/// Config file with the mirror inside `dir`.
fn write_config(dir: &Path) -> (PathBuf, PathBuf) {
    let mirror = dir.join("mirror.json");
    let config = dir.join("config.toml");
    std::fs::write(
        &config,
        format!("[mirror]\nenabled = true\npath = {:?}\n", mirror.display().to_string()),
    )
    .unwrap();
    (config, mirror)
}

fn hub_state(entity_id: &str, state: &str) -> Value {
    json!({
        "entity_id": entity_id,
        "state": state,
        "attributes": { "friendly_name": "Living" },
        "last_changed": "2024-05-01T10:00:00Z",
        "last_updated": "2024-05-01T10:00:00Z"
    })
}

// ── Basic invocation ────────────────────────────────────────────────

#[test]
fn test_no_args_shows_help() {
    let output = hubpanel_cmd().output().unwrap();
    assert_eq!(output.status.code(), Some(2), "Expected exit code 2");
    let text = combined_output(&output);
    assert!(text.contains("Usage"), "Expected 'Usage' in output:\n{text}");
}

#[test]
fn test_help_flag() {
    hubpanel_cmd().arg("--help").assert().success().stdout(
        predicate::str::contains("state")
            .and(predicate::str::contains("watch"))
            .and(predicate::str::contains("call"))
            .and(predicate::str::contains("config")),
    );
}

#[test]
fn test_version_flag() {
    hubpanel_cmd()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("hubpanel"));
}

#[test]
fn test_completions_bash() {
    hubpanel_cmd()
        .args(["completions", "bash"])
        .assert()
        .success()
        .stdout(predicate::str::is_empty().not());
}

#[test]
fn test_watch_requires_an_entity() {
    hubpanel_cmd().arg("watch").assert().code(2);
}

// ── Config file commands ────────────────────────────────────────────

#[test]
fn test_config_path_defaults_to_config_toml() {
    hubpanel_cmd()
        .args(["config", "path"])
        .assert()
        .success()
        .stdout(predicate::str::contains("config.toml"));
}

#[test]
fn test_config_path_honours_flag() {
    hubpanel_cmd()
        .args(["--config", "/tmp/elsewhere/panel.toml", "config", "path"])
        .assert()
        .success()
        .stdout(predicate::str::contains("/tmp/elsewhere/panel.toml"));
}

// ── Usage errors ────────────────────────────────────────────────────

#[test]
fn test_unknown_section_is_a_usage_error() {
    let output = hubpanel_cmd()
        .args(["--settings", "http://127.0.0.1:9", "config", "show", "garage"])
        .output()
        .unwrap();
    assert_eq!(output.status.code(), Some(2));
    let text = combined_output(&output);
    assert!(text.contains("Unknown configuration section"), "{text}");
    assert!(text.contains("waterHeater"), "{text}");
}

#[test]
fn test_state_without_hub_url() {
    let output = hubpanel_cmd()
        .args(["--token", "t", "state", "light.hall"])
        .output()
        .unwrap();
    assert_eq!(output.status.code(), Some(2));
    assert!(combined_output(&output).contains("hub.url is not configured"));
}

#[test]
fn test_call_rejects_non_object_data() {
    let output = hubpanel_cmd()
        .args([
            "--hub",
            "http://127.0.0.1:9",
            "--token",
            "t",
            "call",
            "light.hall",
            "turn_on",
            "--data",
            "[1, 2]",
        ])
        .output()
        .unwrap();
    assert_eq!(output.status.code(), Some(2));
    assert!(combined_output(&output).contains("expected a JSON object"));
}

#[test]
fn test_set_rejects_invalid_json() {
    hubpanel_cmd()
        .args(["--settings", "http://127.0.0.1:9", "config", "set", "climate", "{oops"])
        .assert()
        .code(2);
}

// ── Entity commands ─────────────────────────────────────────────────

#[tokio::test(flavor = "multi_thread")]
async fn test_state_prints_entity_as_json() {
    let hub = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/states/climate.living"))
        .and(header("authorization", "Bearer secret-token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(hub_state("climate.living", "heat")))
        .expect(1)
        .mount(&hub)
        .await;

    let mut cmd = hubpanel_cmd();
    cmd.args(["--hub", &hub.uri(), "--token", "secret-token", "-o", "json"])
        .args(["state", "climate.living"]);
    let output = run(cmd).await;

    assert!(output.status.success(), "{}", combined_output(&output));
    let snap: Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(snap["entity_id"], "climate.living");
    assert_eq!(snap["state"], "heat");
    assert_eq!(snap["attributes"]["friendly_name"], "Living");
}

#[tokio::test(flavor = "multi_thread")]
async fn test_state_table_shows_detail() {
    let hub = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/states/climate.living"))
        .respond_with(ResponseTemplate::new(200).set_body_json(hub_state("climate.living", "heat")))
        .mount(&hub)
        .await;

    let mut cmd = hubpanel_cmd();
    cmd.args(["--hub", &hub.uri(), "--token", "t", "state", "climate.living"]);
    let output = run(cmd).await;

    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("Entity:      climate.living"), "{stdout}");
    assert!(stdout.contains("State:       heat"), "{stdout}");
}

#[tokio::test(flavor = "multi_thread")]
async fn test_state_not_found_exit_code() {
    let hub = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/states/light.ghost"))
        .respond_with(ResponseTemplate::new(404).set_body_string("Entity not found."))
        .mount(&hub)
        .await;

    let mut cmd = hubpanel_cmd();
    cmd.args(["--hub", &hub.uri(), "--token", "t", "state", "light.ghost"]);
    let output = run(cmd).await;

    assert_eq!(output.status.code(), Some(4));
    assert!(combined_output(&output).contains("light.ghost"));
}

#[tokio::test(flavor = "multi_thread")]
async fn test_rejected_token_exit_code() {
    let hub = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(401))
        .mount(&hub)
        .await;

    let mut cmd = hubpanel_cmd();
    cmd.args(["--hub", &hub.uri(), "--token", "wrong", "state", "light.hall"]);
    let output = run(cmd).await;

    assert_eq!(output.status.code(), Some(3));
    assert!(combined_output(&output).contains("config set-token"));
}

#[tokio::test(flavor = "multi_thread")]
async fn test_call_posts_service_with_data() {
    let hub = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/services/light/turn_on"))
        .and(body_partial_json(json!({ "entity_id": "light.hall", "brightness": 120 })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .expect(1)
        .mount(&hub)
        .await;

    let mut cmd = hubpanel_cmd();
    cmd.args(["--hub", &hub.uri(), "--token", "t"])
        .args(["call", "light.hall", "turn_on", "--data", r#"{"brightness": 120}"#]);
    let output = run(cmd).await;

    assert!(output.status.success(), "{}", combined_output(&output));
    assert!(String::from_utf8_lossy(&output.stderr).contains("Command 'turn_on' sent to light.hall"));
}

#[tokio::test(flavor = "multi_thread")]
async fn test_call_failure_is_reported_once() {
    let hub = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/services/vacuum/start"))
        .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
        .expect(1)
        .mount(&hub)
        .await;

    let mut cmd = hubpanel_cmd();
    cmd.args(["--hub", &hub.uri(), "--token", "t", "call", "vacuum.robo", "start"]);
    let output = run(cmd).await;

    assert_eq!(output.status.code(), Some(1));
    assert!(combined_output(&output).contains("Command 'start' on vacuum.robo failed"));
}

#[tokio::test(flavor = "multi_thread")]
async fn test_watch_prints_updates_until_count() {
    let hub = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/states/sensor.hall"))
        .respond_with(ResponseTemplate::new(200).set_body_json(hub_state("sensor.hall", "21.5")))
        .mount(&hub)
        .await;

    let mut cmd = hubpanel_cmd();
    cmd.args(["--hub", &hub.uri(), "--token", "t", "-o", "plain"])
        .args(["watch", "sensor.hall", "--interval-ms", "100", "--count", "2"]);
    let output = run(cmd).await;

    assert!(output.status.success(), "{}", combined_output(&output));
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert_eq!(stdout.lines().collect::<Vec<_>>(), vec!["sensor.hall 21.5"; 2]);
}

#[tokio::test(flavor = "multi_thread")]
async fn test_watch_batches_several_entities() {
    let hub = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/states"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            hub_state("sensor.hall", "21.5"),
            hub_state("cover.garage", "open"),
            hub_state("light.unwatched", "on"),
        ])))
        .mount(&hub)
        .await;

    let mut cmd = hubpanel_cmd();
    cmd.args(["--hub", &hub.uri(), "--token", "t", "-o", "plain"])
        .args(["watch", "sensor.hall", "cover.garage", "--count", "2"]);
    let output = run(cmd).await;

    assert!(output.status.success(), "{}", combined_output(&output));
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("sensor.hall 21.5"), "{stdout}");
    assert!(stdout.contains("cover.garage open"), "{stdout}");
    assert!(!stdout.contains("light.unwatched"), "{stdout}");
}

// ── Panel configuration commands ────────────────────────────────────

#[tokio::test(flavor = "multi_thread")]
async fn test_config_show_reads_remote_document() {
    let settings = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/config/kitchen"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "climate": { "name": "Living", "entityId": "climate.living" }
        })))
        .expect(1)
        .mount(&settings)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let (config, mirror) = write_config(dir.path());

    let mut cmd = hubpanel_cmd();
    cmd.arg("--config")
        .arg(&config)
        .args(["--settings", &settings.uri(), "-i", "kitchen", "-o", "json-compact"])
        .args(["config", "show", "climate"]);
    let output = run(cmd).await;

    assert!(output.status.success(), "{}", combined_output(&output));
    let climate: Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(climate, json!([{ "name": "Living", "entityId": "climate.living" }]));
    assert!(mirror.exists(), "remote load should refresh the mirror");
}

#[tokio::test(flavor = "multi_thread")]
async fn test_config_show_table_lists_every_section() {
    let settings = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/config/default"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&settings)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let (config, _) = write_config(dir.path());

    let mut cmd = hubpanel_cmd();
    cmd.arg("--config")
        .arg(&config)
        .args(["--settings", &settings.uri(), "config", "show"]);
    let output = run(cmd).await;

    assert!(output.status.success(), "{}", combined_output(&output));
    let stdout = String::from_utf8_lossy(&output.stdout);
    for section in ["ambientLighting", "waterHeater", "mediaPlayer", "navIcons"] {
        assert!(stdout.contains(section), "missing {section}:\n{stdout}");
    }
    assert!(!String::from_utf8_lossy(&output.stderr).contains("warning"));
}

#[tokio::test(flavor = "multi_thread")]
async fn test_config_set_writes_whole_document() {
    let settings = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/config/default"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "navIcons": ["home", "climate"]
        })))
        .mount(&settings)
        .await;
    Mock::given(method("PUT"))
        .and(path("/api/config/default"))
        .and(body_partial_json(json!({
            "navIcons": ["home", "climate"],
            "waterHeater": { "name": "Boiler", "entityId": "climate.boiler" }
        })))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&settings)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let (config, _) = write_config(dir.path());

    let mut cmd = hubpanel_cmd();
    cmd.arg("--config")
        .arg(&config)
        .args(["--settings", &settings.uri(), "config", "set", "waterHeater"])
        .arg(r#"{"name": "Boiler", "entityId": "climate.boiler"}"#);
    let output = run(cmd).await;

    assert!(output.status.success(), "{}", combined_output(&output));
    assert!(String::from_utf8_lossy(&output.stderr).contains("Section 'waterHeater' saved"));
}

#[tokio::test(flavor = "multi_thread")]
async fn test_config_set_offline_keeps_change_in_mirror() {
    let dir = tempfile::tempdir().unwrap();
    let (config, mirror) = write_config(dir.path());

    let mut cmd = hubpanel_cmd();
    cmd.arg("--config")
        .arg(&config)
        .args(["--settings", "http://127.0.0.1:9", "--timeout", "2"])
        .args(["config", "set", "climate", r#"[{"name": "Living", "entityId": "climate.living"}]"#]);
    let output = run(cmd).await;

    assert_eq!(output.status.code(), Some(6), "{}", combined_output(&output));
    assert!(combined_output(&output).contains("saved locally only"));

    let saved: Value = serde_json::from_str(&std::fs::read_to_string(&mirror).unwrap()).unwrap();
    assert_eq!(saved["climate"][0]["entityId"], "climate.living");
}

#[tokio::test(flavor = "multi_thread")]
async fn test_offline_change_is_sent_once_the_server_is_back() {
    let dir = tempfile::tempdir().unwrap();
    let (config, mirror) = write_config(dir.path());

    let mut offline = hubpanel_cmd();
    offline
        .arg("--config")
        .arg(&config)
        .args(["--settings", "http://127.0.0.1:9", "--timeout", "2"])
        .args(["config", "set", "climate", r#"[{"name": "Living", "entityId": "climate.living"}]"#]);
    assert_eq!(run(offline).await.status.code(), Some(6));

    let settings = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/config/default"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "climate": [] })))
        .mount(&settings)
        .await;
    Mock::given(method("PUT"))
        .and(path("/api/config/default"))
        .and(body_partial_json(json!({
            "climate": [{ "name": "Living", "entityId": "climate.living" }]
        })))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&settings)
        .await;

    let mut online = hubpanel_cmd();
    online
        .arg("--config")
        .arg(&config)
        .args(["--settings", &settings.uri(), "-o", "plain", "config", "entities"]);
    let output = run(online).await;

    assert!(output.status.success(), "{}", combined_output(&output));
    assert!(String::from_utf8_lossy(&output.stdout).contains("climate.living"));
    assert!(!mirror.with_extension("json.pending").exists());
}

#[tokio::test(flavor = "multi_thread")]
async fn test_config_show_falls_back_to_mirror() {
    let dir = tempfile::tempdir().unwrap();
    let (config, mirror) = write_config(dir.path());
    std::fs::write(
        &mirror,
        json!({ "motors": [{ "name": "Garage", "entityId": "cover.garage" }] }).to_string(),
    )
    .unwrap();

    let mut cmd = hubpanel_cmd();
    cmd.arg("--config")
        .arg(&config)
        .args(["--settings", "http://127.0.0.1:9", "--timeout", "2", "-o", "plain"])
        .args(["config", "entities"]);
    let output = run(cmd).await;

    assert!(output.status.success(), "{}", combined_output(&output));
    assert!(String::from_utf8_lossy(&output.stdout).contains("cover.garage"));
    assert!(String::from_utf8_lossy(&output.stderr).contains("local mirror"));
}
