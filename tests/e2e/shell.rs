//! `shell:` services on a selected device

use std::time::Duration;

use fakeadb_core::{DeviceConfig, DeviceStatus};
use fakeadb_protocol::test_utils::AdbTestClient;

use crate::{start_server, start_with_emulator, transport_to, TIMEOUT};

async fn shell(server: &fakeadb_server::FakeAdbServer, serial: &str, command: &str) -> String {
    let mut client = transport_to(server, serial).await;
    client.send(&format!("shell:{}", command)).await.unwrap();
    client.expect_okay().await.unwrap();
    client.read_to_end().await.unwrap()
}

#[tokio::test]
async fn test_getprop_reports_model() {
    let server = start_server().await;
    server
        .connect_device(DeviceConfig::new("emulator-5554").with_model("Google", "Pixel 7"))
        .unwrap();
    assert_eq!(
        shell(&server, "emulator-5554", "getprop ro.product.model").await,
        "Pixel 7\n"
    );
    server.stop().await;
}

#[tokio::test]
async fn test_setprop_is_visible_to_getprop() {
    let server = start_with_emulator("emulator-5554").await;
    assert_eq!(
        shell(&server, "emulator-5554", "setprop debug.fakeadb.flag on").await,
        ""
    );
    assert_eq!(
        shell(&server, "emulator-5554", "getprop debug.fakeadb.flag").await,
        "on\n"
    );
    server.stop().await;
}

#[tokio::test]
async fn test_unsupported_device_service() {
    let server = start_with_emulator("emulator-5554").await;
    let mut client = transport_to(&server, "emulator-5554").await;
    client.send("sync:").await.unwrap();
    assert_eq!(
        client.expect_fail().await.unwrap(),
        "unsupported device service: sync:"
    );
    server.stop().await;
}

#[tokio::test]
async fn test_offline_device_rejects_shell() {
    let server = start_server().await;
    server
        .connect_device(DeviceConfig::new("emulator-5554").with_status(DeviceStatus::Offline))
        .unwrap();
    let mut client = transport_to(&server, "emulator-5554").await;
    client.send("shell:echo hi").await.unwrap();
    assert_eq!(client.expect_fail().await.unwrap(), "device offline");
    server.stop().await;
}

#[tokio::test]
async fn test_unknown_transport_keeps_connection_open() {
    let server = start_with_emulator("emulator-5554").await;
    let mut client = AdbTestClient::connect(server.port()).await.unwrap();
    client.send("host:transport:nope").await.unwrap();
    assert_eq!(
        client.expect_fail().await.unwrap(),
        "device 'nope' not found"
    );

    client.send("host:transport:emulator-5554").await.unwrap();
    client.expect_okay().await.unwrap();
    client.send("shell:echo still here").await.unwrap();
    client.expect_okay().await.unwrap();
    assert_eq!(client.read_to_end().await.unwrap(), "still here\n");
    server.stop().await;
}

#[tokio::test]
async fn test_logcat_dump_and_stream() {
    let server = start_with_emulator("emulator-5554").await;
    let device = server.device("emulator-5554").unwrap();
    device.add_logcat_message("I/ActivityManager: Start proc 1234");

    assert_eq!(
        shell(&server, "emulator-5554", "logcat -d").await,
        "I/ActivityManager: Start proc 1234\n"
    );

    let mut client = transport_to(&server, "emulator-5554").await;
    client.send("shell:logcat").await.unwrap();
    client.expect_okay().await.unwrap();
    let backlog = client
        .read_exact_bytes("I/ActivityManager: Start proc 1234\n".len())
        .await
        .unwrap();
    assert_eq!(backlog, b"I/ActivityManager: Start proc 1234\n");

    device.add_logcat_message("D/flutter: hello");
    let line = client
        .read_some_with_timeout(TIMEOUT)
        .await
        .unwrap()
        .expect("timed out waiting for logcat line");
    assert_eq!(line, b"D/flutter: hello\n");

    assert_eq!(
        client
            .read_some_with_timeout(Duration::from_millis(200))
            .await
            .unwrap(),
        None
    );
    server.stop().await;
}
