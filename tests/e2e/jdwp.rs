//! `jdwp:<pid>` debugger sessions

use fakeadb_core::{ClientConfig, DeviceConfig};
use fakeadb_protocol::JDWP_HANDSHAKE;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::time::timeout;

use crate::{start_server, transport_to, TIMEOUT};

async fn start_with_app() -> fakeadb_server::FakeAdbServer {
    let server = start_server().await;
    server
        .connect_device(
            DeviceConfig::new("emulator-5554")
                .with_client(ClientConfig::new(1234, "com.example.app")),
        )
        .unwrap();
    server
}

#[tokio::test]
async fn test_unknown_pid_fails() {
    let server = start_with_app().await;
    let mut client = transport_to(&server, "emulator-5554").await;
    client.send("jdwp:9999").await.unwrap();
    let message = client.expect_fail().await.unwrap();
    assert!(message.contains("9999"), "unexpected message: {}", message);
    server.stop().await;
}

#[tokio::test]
async fn test_jdwp_without_transport() {
    let server = start_with_app().await;
    let mut client = fakeadb_protocol::test_utils::AdbTestClient::connect(server.port())
        .await
        .unwrap();
    client.send("jdwp:1234").await.unwrap();
    assert_eq!(client.expect_fail().await.unwrap(), "no device selected");
    server.stop().await;
}

#[tokio::test]
async fn test_debugger_session_relays_bytes() {
    let server = start_with_app().await;
    let app = server.device("emulator-5554").unwrap().client(1234).unwrap();

    let mut debugger = transport_to(&server, "emulator-5554").await;
    debugger.send("jdwp:1234").await.unwrap();
    debugger.expect_okay().await.unwrap();
    debugger.write_raw(JDWP_HANDSHAKE).await.unwrap();
    assert_eq!(
        debugger.read_exact_bytes(JDWP_HANDSHAKE.len()).await.unwrap(),
        JDWP_HANDSHAKE
    );

    let mut session = timeout(TIMEOUT, app.next_debugger_session())
        .await
        .expect("session should be offered")
        .unwrap();
    assert!(app.is_debugger_attached());

    // IDSizes command packet
    let packet = [0, 0, 0, 11, 0, 0, 0, 1, 0, 1, 7];
    debugger.write_raw(&packet).await.unwrap();
    let mut received = [0u8; 11];
    session.read_exact(&mut received).await.unwrap();
    assert_eq!(received, packet);

    session.write_all(b"reply").await.unwrap();
    assert_eq!(debugger.read_exact_bytes(5).await.unwrap(), b"reply");

    // a second debugger is turned away while the first is attached
    let mut second = transport_to(&server, "emulator-5554").await;
    second.send("jdwp:1234").await.unwrap();
    assert_eq!(
        second.expect_fail().await.unwrap(),
        "Client 1234 is already attached to a debugger"
    );

    drop(session);
    assert!(debugger.is_closed_within(TIMEOUT).await);
    drop(debugger);
    timeout(TIMEOUT, async {
        while app.is_debugger_attached() {
            tokio::time::sleep(std::time::Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("debugger should detach after the session closes");
    server.stop().await;
}

#[tokio::test]
async fn test_reattach_after_debugger_disconnects() {
    let server = start_with_app().await;
    let app = server.device("emulator-5554").unwrap().client(1234).unwrap();

    let mut first = transport_to(&server, "emulator-5554").await;
    first.send("jdwp:1234").await.unwrap();
    first.expect_okay().await.unwrap();
    first.write_raw(JDWP_HANDSHAKE).await.unwrap();
    first.read_exact_bytes(JDWP_HANDSHAKE.len()).await.unwrap();
    drop(first);

    timeout(TIMEOUT, async {
        while app.is_debugger_attached() {
            tokio::time::sleep(std::time::Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("debugger should detach once its socket closes");

    let mut second = transport_to(&server, "emulator-5554").await;
    second.send("jdwp:1234").await.unwrap();
    second.expect_okay().await.unwrap();
    second.write_raw(JDWP_HANDSHAKE).await.unwrap();
    second.read_exact_bytes(JDWP_HANDSHAKE.len()).await.unwrap();

    let mut session = timeout(TIMEOUT, app.next_debugger_session())
        .await
        .unwrap()
        .unwrap();
    second.write_raw(b"again").await.unwrap();
    let mut received = [0u8; 5];
    session.read_exact(&mut received).await.unwrap();
    assert_eq!(&received, b"again");
    server.stop().await;
}
