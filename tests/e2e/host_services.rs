//! One-shot host services

use fakeadb_core::{DeviceConfig, DeviceStatus, MdnsService};
use fakeadb_protocol::parse_device_list;
use fakeadb_protocol::test_utils::{AdbTestClient, Status};
use fakeadb_server::FakeAdbServer;

use crate::{start_server, start_with_emulator};

#[tokio::test]
async fn test_version() {
    let server = start_server().await;
    let version = AdbTestClient::query(server.port(), "host:version")
        .await
        .unwrap();
    assert_eq!(version, "0029");
    server.stop().await;
}

#[tokio::test]
async fn test_devices_empty() {
    let server = start_server().await;
    let mut client = AdbTestClient::connect(server.port()).await.unwrap();
    client.send("host:devices").await.unwrap();
    assert_eq!(client.read_to_end().await.unwrap(), "OKAY0000");
    server.stop().await;
}

#[tokio::test]
async fn test_devices_lists_emulator() {
    let server = start_with_emulator("emulator-5554").await;
    let list = AdbTestClient::query(server.port(), "host:devices")
        .await
        .unwrap();
    assert_eq!(list, "emulator-5554\tdevice\n");
    server.stop().await;
}

#[tokio::test]
async fn test_devices_round_trip_through_parser() {
    let server = start_server().await;
    server
        .connect_device(DeviceConfig::new("emulator-5554"))
        .unwrap();
    server
        .connect_device(DeviceConfig::new("R58M123ABC").with_status(DeviceStatus::Unauthorized))
        .unwrap();

    let list = AdbTestClient::query(server.port(), "host:devices")
        .await
        .unwrap();
    assert_eq!(
        parse_device_list(&list).unwrap(),
        vec![
            ("R58M123ABC".to_string(), DeviceStatus::Unauthorized),
            ("emulator-5554".to_string(), DeviceStatus::Device),
        ]
    );
    server.stop().await;
}

#[tokio::test]
async fn test_devices_long_format() {
    let server = start_server().await;
    server
        .connect_device(
            DeviceConfig::new("emulator-5554")
                .with_model("Google", "sdk_gphone64_arm64")
                .with_device("emu64a"),
        )
        .unwrap();

    let list = AdbTestClient::query(server.port(), "host:devices-l")
        .await
        .unwrap();
    assert!(list.starts_with("emulator-5554          device "));
    assert!(list.contains("model:sdk_gphone64_arm64"));
    assert!(list.contains("device:emu64a"));
    assert!(list.ends_with("transport_id:1\n"));
    server.stop().await;
}

#[tokio::test]
async fn test_unknown_host_service() {
    let server = start_server().await;
    let mut client = AdbTestClient::connect(server.port()).await.unwrap();
    client.send("host:frobnicate").await.unwrap();
    assert_eq!(
        client.read_status().await.unwrap(),
        Status::Fail("unknown host service: frobnicate".to_string())
    );
    server.stop().await;
}

#[tokio::test]
async fn test_host_serial_with_network_serial() {
    let server = start_with_emulator("192.168.1.20:5555").await;
    let state = AdbTestClient::query(server.port(), "host-serial:192.168.1.20:5555:get-state")
        .await
        .unwrap();
    assert_eq!(state, "device");

    let serial = AdbTestClient::query(server.port(), "host-serial:192.168.1.20:5555:get-serialno")
        .await
        .unwrap();
    assert_eq!(serial, "192.168.1.20:5555");
    server.stop().await;
}

#[tokio::test]
async fn test_get_state_without_devices() {
    let server = start_server().await;
    let mut client = AdbTestClient::connect(server.port()).await.unwrap();
    client.send("host:get-state").await.unwrap();
    assert_eq!(
        client.expect_fail().await.unwrap(),
        "no devices/emulators found"
    );
    server.stop().await;
}

#[tokio::test]
async fn test_get_state_with_two_devices_is_ambiguous() {
    let server = start_with_emulator("emulator-5554").await;
    server
        .connect_device(DeviceConfig::new("emulator-5556"))
        .unwrap();

    let mut client = AdbTestClient::connect(server.port()).await.unwrap();
    client.send("host:get-state").await.unwrap();
    assert_eq!(
        client.expect_fail().await.unwrap(),
        "more than one device/emulator"
    );

    let state = AdbTestClient::query(server.port(), "host-transport-id:2:get-state")
        .await
        .unwrap();
    assert_eq!(state, "device");
    server.stop().await;
}

#[tokio::test]
async fn test_features() {
    let server = FakeAdbServer::builder()
        .install_default_handlers()
        .features(vec!["shell_v2".into(), "cmd".into()])
        .start()
        .await
        .unwrap();

    let features = AdbTestClient::query(server.port(), "host:features")
        .await
        .unwrap();
    assert_eq!(features, "shell_v2,cmd");

    server.set_features(vec!["push_sync".into()]);
    let features = AdbTestClient::query(server.port(), "host:host-features")
        .await
        .unwrap();
    assert_eq!(features, "push_sync");
    server.stop().await;
}

#[tokio::test]
async fn test_forward_lifecycle() {
    let server = start_with_emulator("emulator-5554").await;
    let port = server.port();

    let mut client = AdbTestClient::connect(port).await.unwrap();
    client
        .send("host-serial:emulator-5554:forward:tcp:6000;jdwp:1234")
        .await
        .unwrap();
    client.expect_okay().await.unwrap();
    client.expect_okay().await.unwrap();

    let list = AdbTestClient::query(port, "host:list-forward").await.unwrap();
    assert_eq!(list, "emulator-5554 tcp:6000 jdwp:1234\n");

    let mut client = AdbTestClient::connect(port).await.unwrap();
    client
        .send("host-serial:emulator-5554:forward:norebind:tcp:6000;tcp:7000")
        .await
        .unwrap();
    assert_eq!(
        client.expect_fail().await.unwrap(),
        "cannot rebind existing socket"
    );

    let mut client = AdbTestClient::connect(port).await.unwrap();
    client
        .send("host-serial:emulator-5554:killforward:tcp:6000")
        .await
        .unwrap();
    client.expect_okay().await.unwrap();

    let list = AdbTestClient::query(port, "host:list-forward").await.unwrap();
    assert_eq!(list, "");
    server.stop().await;
}

#[tokio::test]
async fn test_get_devpath() {
    let server = start_server().await;
    server
        .connect_device(DeviceConfig::new("R58M123ABC").with_devpath("usb:336592896X"))
        .unwrap();
    let devpath = AdbTestClient::query(server.port(), "host-serial:R58M123ABC:get-devpath")
        .await
        .unwrap();
    assert_eq!(devpath, "usb:336592896X");
    server.stop().await;
}

#[tokio::test]
async fn test_mdns_services_follow_driver_changes() {
    let server = start_server().await;
    let port = server.port();
    let service = MdnsService::new("foo-bar", "service", "192.168.1.1:10");

    assert_eq!(
        AdbTestClient::query(port, "host:mdns:services").await.unwrap(),
        ""
    );

    assert!(server.add_mdns_service(service.clone()));
    assert_eq!(
        AdbTestClient::query(port, "host:mdns:services").await.unwrap(),
        "foo-bar\tservice\t192.168.1.1:10\n"
    );

    assert!(server.remove_mdns_service(&service));
    assert_eq!(
        AdbTestClient::query(port, "host:mdns:services").await.unwrap(),
        ""
    );
    server.stop().await;
}
