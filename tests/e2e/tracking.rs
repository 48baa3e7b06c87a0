//! `host:track-devices` and `track-jdwp` streams

use fakeadb_core::{ClientConfig, DeviceConfig, DeviceStatus};
use fakeadb_protocol::test_utils::AdbTestClient;

use crate::{next_payload, start_server, start_with_emulator, transport_to, TIMEOUT};

async fn track_devices(port: u16, service: &str) -> AdbTestClient {
    let mut client = AdbTestClient::connect(port).await.unwrap();
    client.send(service).await.unwrap();
    client.expect_okay().await.unwrap();
    client
}

#[tokio::test]
async fn test_track_devices_sees_connect_status_and_disconnect() {
    let server = start_server().await;
    let mut tracker = track_devices(server.port(), "host:track-devices").await;
    assert_eq!(next_payload(&mut tracker).await, "");

    let device = server
        .connect_device(DeviceConfig::new("serial-X"))
        .unwrap();
    assert_eq!(next_payload(&mut tracker).await, "serial-X\tdevice\n");

    device.set_status(DeviceStatus::Offline);
    assert_eq!(next_payload(&mut tracker).await, "serial-X\toffline\n");

    server.disconnect_device("serial-X");
    assert_eq!(next_payload(&mut tracker).await, "");
    server.stop().await;
}

#[tokio::test]
async fn test_track_devices_long() {
    let server = start_with_emulator("emulator-5554").await;
    let mut tracker = track_devices(server.port(), "host:track-devices-l").await;
    let list = next_payload(&mut tracker).await;
    assert!(list.starts_with("emulator-5554 "));
    assert!(list.contains("transport_id:1"));
    server.stop().await;
}

#[tokio::test]
async fn test_unchanged_status_sends_nothing() {
    let server = start_with_emulator("emulator-5554").await;
    let mut tracker = track_devices(server.port(), "host:track-devices").await;
    next_payload(&mut tracker).await;

    server
        .device("emulator-5554")
        .unwrap()
        .set_status(DeviceStatus::Device);
    assert_eq!(
        tracker
            .read_length_prefixed_with_timeout(std::time::Duration::from_millis(200))
            .await
            .unwrap(),
        None
    );
    server.stop().await;
}

#[tokio::test]
async fn test_closing_tracker_unsubscribes() {
    let server = start_server().await;
    let mut tracker = track_devices(server.port(), "host:track-devices").await;
    next_payload(&mut tracker).await;
    assert_eq!(server.device_hub().subscriber_count(), 1);

    drop(tracker);
    tokio::time::timeout(TIMEOUT, async {
        while server.device_hub().subscriber_count() != 0 {
            tokio::time::sleep(std::time::Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("subscriber should be removed after the peer closes");
    server.stop().await;
}

#[tokio::test]
async fn test_two_jdwp_trackers_both_see_new_client() {
    let server = start_with_emulator("emulator-5554").await;
    let mut first = transport_to(&server, "emulator-5554").await;
    first.send("track-jdwp").await.unwrap();
    first.expect_okay().await.unwrap();
    let mut second = transport_to(&server, "emulator-5554").await;
    second.send("track-jdwp").await.unwrap();
    second.expect_okay().await.unwrap();

    assert_eq!(next_payload(&mut first).await, "");
    assert_eq!(next_payload(&mut second).await, "");

    let device = server.device("emulator-5554").unwrap();
    device.start_client(ClientConfig::new(1234, "com.example.app"));
    assert_eq!(next_payload(&mut first).await, "1234\n");
    assert_eq!(next_payload(&mut second).await, "1234\n");

    device.stop_client(1234);
    assert_eq!(next_payload(&mut first).await, "");
    assert_eq!(next_payload(&mut second).await, "");
    server.stop().await;
}

#[tokio::test]
async fn test_jdwp_tracker_ends_when_device_disconnects() {
    let server = start_with_emulator("emulator-5554").await;
    let mut tracker = transport_to(&server, "emulator-5554").await;
    tracker.send("track-jdwp").await.unwrap();
    tracker.expect_okay().await.unwrap();
    next_payload(&mut tracker).await;

    server.disconnect_device("emulator-5554");
    assert!(tracker.is_closed_within(TIMEOUT).await);
    server.stop().await;
}
