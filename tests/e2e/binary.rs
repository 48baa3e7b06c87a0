//! Tests that run the `fakeadb` binary

use std::process::Stdio;

use fakeadb_protocol::test_utils::AdbTestClient;
use serial_test::serial;
use tempfile::tempdir;
use tokio::io::{AsyncBufReadExt, BufReader, Lines};
use tokio::process::{Child, ChildStdout, Command};
use tokio::time::timeout;

use crate::TIMEOUT;

fn spawn_fakeadb(args: &[&str]) -> (Child, Lines<BufReader<ChildStdout>>) {
    let mut child = Command::new(env!("CARGO_BIN_EXE_fakeadb"))
        .args(args)
        .env("FAKEADB_LOG", "warn")
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .kill_on_drop(true)
        .spawn()
        .expect("Failed to spawn fakeadb");
    let stdout = child.stdout.take().expect("stdout is piped");
    (child, BufReader::new(stdout).lines())
}

async fn next_line(lines: &mut Lines<BufReader<ChildStdout>>) -> String {
    timeout(TIMEOUT, lines.next_line())
        .await
        .expect("timed out waiting for fakeadb output")
        .unwrap()
        .expect("fakeadb closed stdout")
}

fn started_port(line: &str) -> u16 {
    let event: serde_json::Value = serde_json::from_str(line).unwrap();
    assert_eq!(event["event"], "server.started");
    event["port"].as_u64().unwrap() as u16
}

#[tokio::test]
#[serial]
async fn test_binary_reports_port_and_stops_on_host_kill() {
    let (mut child, mut lines) = spawn_fakeadb(&["--port", "0", "--json"]);
    let port = started_port(&next_line(&mut lines).await);

    let version = AdbTestClient::query(port, "host:version").await.unwrap();
    assert_eq!(version, "0029");

    let mut client = AdbTestClient::connect(port).await.unwrap();
    client.send("host:kill").await.unwrap();
    client.expect_okay().await.unwrap();

    assert_eq!(next_line(&mut lines).await, r#"{"event":"server.stopped"}"#);
    let status = timeout(TIMEOUT, child.wait()).await.unwrap().unwrap();
    assert!(status.success());
}

#[tokio::test]
#[serial]
async fn test_binary_loads_config_file() {
    let temp = tempdir().unwrap();
    let config = temp.path().join("fakeadb.toml");
    std::fs::write(
        &config,
        r#"
[[devices]]
serial = "emulator-5554"

[[devices.clients]]
pid = 1234
package_name = "com.example.app"
"#,
    )
    .unwrap();

    let (mut child, mut lines) = spawn_fakeadb(&[
        "--port",
        "0",
        "--json",
        "--config",
        config.to_str().unwrap(),
    ]);
    let port = started_port(&next_line(&mut lines).await);

    let list = AdbTestClient::query(port, "host:devices").await.unwrap();
    assert_eq!(list, "emulator-5554\tdevice\n");

    child.kill().await.unwrap();
}

#[tokio::test]
#[serial]
async fn test_binary_fails_on_missing_config() {
    let temp = tempdir().unwrap();
    let missing = temp.path().join("missing.toml");
    let (mut child, _lines) = spawn_fakeadb(&["--port", "0", "--config", missing.to_str().unwrap()]);

    let status = timeout(TIMEOUT, child.wait()).await.unwrap().unwrap();
    assert!(!status.success());
}
