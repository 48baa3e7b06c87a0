//! Server start, shutdown and configuration restore

use fakeadb_core::{ClientConfig, DeviceConfig};
use fakeadb_protocol::test_utils::AdbTestClient;
use fakeadb_server::{load_config, save_config, FakeAdbServer};
use tempfile::tempdir;
use tokio::time::timeout;

use crate::{next_payload, start_server, start_with_emulator, transport_to, TIMEOUT};

#[tokio::test]
async fn test_stop_closes_every_stream_and_empties_hubs() {
    let server = start_with_emulator("emulator-5554").await;
    let device = server.device("emulator-5554").unwrap();

    let mut devices = AdbTestClient::connect(server.port()).await.unwrap();
    devices.send("host:track-devices").await.unwrap();
    devices.expect_okay().await.unwrap();
    next_payload(&mut devices).await;

    let mut jdwp = transport_to(&server, "emulator-5554").await;
    jdwp.send("track-jdwp").await.unwrap();
    jdwp.expect_okay().await.unwrap();
    next_payload(&mut jdwp).await;

    timeout(TIMEOUT, server.stop())
        .await
        .expect("stop should finish while streams are open");

    assert!(devices.is_closed_within(TIMEOUT).await);
    assert!(jdwp.is_closed_within(TIMEOUT).await);
    assert_eq!(server.device_hub().subscriber_count(), 0);
    assert_eq!(device.client_hub().subscriber_count(), 0);
    assert!(server.device_hub().is_stopped());
    assert!(AdbTestClient::connect(server.port()).await.is_err());
}

#[tokio::test]
async fn test_host_kill_terminates_server() {
    let server = start_server().await;
    let mut client = AdbTestClient::connect(server.port()).await.unwrap();
    client.send("host:kill").await.unwrap();
    client.expect_okay().await.unwrap();

    timeout(TIMEOUT, server.wait_for_termination())
        .await
        .expect("host:kill should stop the server");
    assert!(!server.is_running());
}

#[tokio::test]
async fn test_config_file_restores_devices() {
    let temp = tempdir().unwrap();
    let path = temp.path().join("fakeadb.toml");

    let server = start_server().await;
    let device = server
        .connect_device(DeviceConfig::new("emulator-5554").with_model("Google", "Pixel 7"))
        .unwrap();
    device.start_client(ClientConfig::new(1234, "com.example.app"));
    save_config(&path, &server.current_config()).unwrap();
    server.stop().await;

    let restored = FakeAdbServer::builder()
        .install_default_handlers()
        .with_config(load_config(&path).unwrap())
        .start()
        .await
        .unwrap();
    let list = AdbTestClient::query(restored.port(), "host:devices")
        .await
        .unwrap();
    assert_eq!(list, "emulator-5554\tdevice\n");

    let mut tracker = transport_to(&restored, "emulator-5554").await;
    tracker.send("track-jdwp").await.unwrap();
    tracker.expect_okay().await.unwrap();
    assert_eq!(next_payload(&mut tracker).await, "1234\n");
    restored.stop().await;
}
