#![allow(clippy::unwrap_used)]
// End-to-end tests for the `isapi` binary.

use std::path::Path;

use assert_cmd::Command;
use predicates::prelude::*;
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const DEVICE_INFO: &str =
    r#"<DeviceInfo version="2.0"><deviceName>Front Door</deviceName><model>DS-2CD2143G2-I</model></DeviceInfo>"#;

/// A command isolated from the caller's config, keyring and environment.
fn isapi(config_home: &Path) -> Command {
    let mut cmd = Command::cargo_bin("isapi").unwrap();
    cmd.env("HOME", config_home)
        .env("XDG_CONFIG_HOME", config_home)
        .env_remove("ISAPI_PROFILE")
        .env_remove("ISAPI_HOST")
        .env_remove("ISAPI_LOGIN")
        .env_remove("ISAPI_PASSWORD")
        .env_remove("ISAPI_TIMEOUT")
        .env_remove("RUST_LOG");
    cmd
}

async fn device() -> MockServer {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/ISAPI/System/status"))
        .and(header("authorization", "Basic YWRtaW46MTIzNDU="))
        .respond_with(ResponseTemplate::new(200))
        .mount(&server)
        .await;
    server
}

async fn run_blocking<F, T>(f: F) -> T
where
    F: FnOnce() -> T + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f).await.unwrap()
}

// ── Offline commands ─────────────────────────────────────────────────

#[test]
fn test_help_lists_commands() {
    let home = tempfile::tempdir().unwrap();
    isapi(home.path())
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("get"))
        .stdout(predicate::str::contains("stream"))
        .stdout(predicate::str::contains("download"));
}

#[test]
fn test_completions() {
    let home = tempfile::tempdir().unwrap();
    isapi(home.path())
        .args(["completions", "bash"])
        .assert()
        .success()
        .stdout(predicate::str::contains("isapi"));
}

#[test]
fn test_config_path_follows_xdg() {
    let home = tempfile::tempdir().unwrap();
    isapi(home.path())
        .args(["config", "path"])
        .assert()
        .success()
        .stdout(predicate::str::contains(home.path().to_string_lossy().as_ref()))
        .stdout(predicate::str::contains("config.toml"));
}

#[test]
fn test_config_show_masks_passwords() {
    let home = tempfile::tempdir().unwrap();
    let dir = home.path().join("isapi");
    std::fs::create_dir_all(&dir).unwrap();
    std::fs::write(
        dir.join("config.toml"),
        "[profiles.cam]\nhost = \"http://192.168.1.64\"\npassword = \"hunter2\"\n",
    )
    .unwrap();

    isapi(home.path())
        .args(["config", "show", "--output", "json-compact"])
        .assert()
        .success()
        .stdout(predicate::str::contains(r#""host":"http://192.168.1.64""#))
        .stdout(predicate::str::contains("****"))
        .stdout(predicate::str::contains("hunter2").not());
}

#[test]
fn test_missing_host_is_a_usage_error() {
    let home = tempfile::tempdir().unwrap();
    isapi(home.path())
        .args(["get", "System/deviceInfo", "--password", "12345"])
        .assert()
        .code(2)
        .stderr(predicate::str::contains("No device configured"));
}

#[test]
fn test_unknown_profile() {
    let home = tempfile::tempdir().unwrap();
    isapi(home.path())
        .args(["get", "System/deviceInfo", "--profile", "nvr"])
        .assert()
        .code(2)
        .stderr(predicate::str::contains("Profile 'nvr' not found"));
}

// ── Device commands ──────────────────────────────────────────────────

#[tokio::test]
async fn test_get_prints_mapping() {
    let server = device().await;
    Mock::given(method("GET"))
        .and(path("/ISAPI/System/deviceInfo"))
        .respond_with(ResponseTemplate::new(200).set_body_string(DEVICE_INFO))
        .mount(&server)
        .await;

    let uri = server.uri();
    let home = tempfile::tempdir().unwrap();
    let mut cmd = isapi(home.path());
    cmd.args(["get", "System/deviceInfo", "--host", uri.as_str(), "--password", "12345", "-o", "json-compact"]);

    run_blocking(move || {
        cmd.assert().success().stdout(predicate::str::contains(
            r#"{"DeviceInfo":{"@version":"2.0","deviceName":"Front Door","model":"DS-2CD2143G2-I"}}"#,
        ));
    })
    .await;
}

#[tokio::test]
async fn test_get_xml_is_verbatim() {
    let server = device().await;
    Mock::given(method("GET"))
        .and(path("/ISAPI/System/deviceInfo"))
        .respond_with(ResponseTemplate::new(200).set_body_string(DEVICE_INFO))
        .mount(&server)
        .await;

    let uri = server.uri();
    let home = tempfile::tempdir().unwrap();
    let mut cmd = isapi(home.path());
    cmd.args(["get", "System/deviceInfo", "--host", uri.as_str(), "--password", "12345", "--output", "xml"]);

    run_blocking(move || {
        cmd.assert()
            .success()
            .stdout(predicate::str::diff(format!("{DEVICE_INFO}\n")));
    })
    .await;
}

#[tokio::test]
async fn test_not_found_exit_code() {
    let server = device().await;
    Mock::given(method("GET"))
        .and(path("/ISAPI/Nope"))
        .respond_with(ResponseTemplate::new(404).set_body_string("<ResponseStatus/>"))
        .mount(&server)
        .await;

    let uri = server.uri();
    let home = tempfile::tempdir().unwrap();
    let mut cmd = isapi(home.path());
    cmd.args(["get", "Nope", "--host", uri.as_str(), "--password", "12345"]);

    run_blocking(move || {
        cmd.assert()
            .code(4)
            .stderr(predicate::str::contains("Resource not found"));
    })
    .await;
}

#[tokio::test]
async fn test_request_put_with_body() {
    let server = device().await;
    Mock::given(method("PUT"))
        .and(path("/ISAPI/System/time"))
        .and(wiremock::matchers::body_string("<Time><timeMode>NTP</timeMode></Time>"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string("<ResponseStatus><statusCode>1</statusCode></ResponseStatus>"),
        )
        .expect(1)
        .mount(&server)
        .await;

    let uri = server.uri();
    let home = tempfile::tempdir().unwrap();
    let mut cmd = isapi(home.path());
    cmd.args([
        "request",
        "put",
        "System/time",
        "--data",
        "<Time><timeMode>NTP</timeMode></Time>",
        "--host",
        uri.as_str(),
        "--password",
        "12345",
        "-o",
        "json-compact",
    ]);

    run_blocking(move || {
        cmd.assert()
            .success()
            .stdout(predicate::str::contains(r#"{"ResponseStatus":{"statusCode":"1"}}"#));
    })
    .await;
}

#[tokio::test]
async fn test_stream_stops_after_count() {
    let server = device().await;
    let body: String = (1..=3)
        .map(|i| {
            format!("--boundary\r\nContent-Type: application/xml\r\n\r\n<EventNotificationAlert><id>{i}</id></EventNotificationAlert>\r\n")
        })
        .collect();
    Mock::given(method("GET"))
        .and(path("/ISAPI/Event/notification/alertStream"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(body, "multipart/mixed; boundary=boundary"))
        .mount(&server)
        .await;

    let uri = server.uri();
    let home = tempfile::tempdir().unwrap();
    let mut cmd = isapi(home.path());
    cmd.args([
        "stream",
        "Event/notification/alertStream",
        "--count",
        "2",
        "--host",
        uri.as_str(),
        "--password",
        "12345",
        "-o",
        "json-compact",
    ]);

    run_blocking(move || {
        cmd.assert().success().stdout(predicate::str::diff(
            "{\"EventNotificationAlert\":{\"id\":\"1\"}}\n{\"EventNotificationAlert\":{\"id\":\"2\"}}\n",
        ));
    })
    .await;
}

#[tokio::test]
async fn test_download_writes_exact_bytes() {
    let server = device().await;
    let payload: Vec<u8> = (0..=255u8).cycle().take(4096).collect();
    Mock::given(method("GET"))
        .and(path("/ISAPI/Streaming/channels/101/picture"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(payload.clone(), "image/jpeg"))
        .mount(&server)
        .await;

    let uri = server.uri();
    let home = tempfile::tempdir().unwrap();
    let out = home.path().join("snapshot.jpg");
    let mut cmd = isapi(home.path());
    cmd.args(["download", "Streaming/channels/101/picture", "--out"])
        .arg(&out)
        .args(["--host", uri.as_str(), "--password", "12345"]);

    run_blocking(move || {
        cmd.assert()
            .success()
            .stderr(predicate::str::contains("Wrote 4096 bytes"));
    })
    .await;

    assert_eq!(std::fs::read(&out).unwrap(), payload);
}
