//! `host:track-devices` and `track-jdwp`
//!
//! Both reply `OKAY`, send the current list, then send a fresh list for
//! every hub event. Lists are rendered from current state when the event is
//! taken, so the last list sent always matches the registry.

use std::sync::Arc;

use futures_util::future::BoxFuture;

use fakeadb_core::prelude::*;
use fakeadb_protocol::{format_device_list, format_pid_list, Target};

use super::{
    stream_client_events, stream_device_events, ClientStateHandler, Continuation,
    DeviceCommandHandler, DeviceStateHandler, HostCommandHandler,
};
use crate::connection::Connection;
use crate::context::ServerContext;
use crate::state::{DeviceRegistry, DeviceState};

/// `host:track-devices` / `host:track-devices-l`
pub struct TrackDevices {
    pub long: bool,
}

struct DeviceListRenderer<'a> {
    registry: &'a DeviceRegistry,
    long: bool,
}

impl DeviceListRenderer<'_> {
    async fn send(&self, conn: &mut Connection) -> Result<Continuation> {
        let list = format_device_list(&self.registry.list_entries(), self.long);
        conn.write_payload(list.as_bytes()).await?;
        Ok(Continuation::Continue)
    }
}

impl DeviceStateHandler for DeviceListRenderer<'_> {
    async fn on_device_list_changed(&mut self, conn: &mut Connection) -> Result<Continuation> {
        self.send(conn).await
    }

    async fn on_device_status_changed(
        &mut self,
        conn: &mut Connection,
        _serial: &str,
    ) -> Result<Continuation> {
        self.send(conn).await
    }
}

impl HostCommandHandler for TrackDevices {
    fn invoke<'a>(
        &'a self,
        ctx: &'a ServerContext,
        conn: &'a mut Connection,
        _target: &'a Target,
        _args: &'a str,
    ) -> BoxFuture<'a, Result<()>> {
        Box::pin(async move {
            let queue = ctx
                .registry()
                .hub()
                .subscribe()
                .ok_or(Error::ServerStopped)?;
            debug!("{}: tracking devices (subscriber {})", conn.peer(), queue.id());

            let mut renderer = DeviceListRenderer {
                registry: ctx.registry(),
                long: self.long,
            };
            conn.okay().await?;
            renderer.send(conn).await?;
            stream_device_events(conn, queue, &mut renderer).await
        })
    }
}

/// `track-jdwp` on the selected device
pub struct TrackJdwp;

struct PidListRenderer {
    device: Arc<DeviceState>,
}

impl PidListRenderer {
    async fn send(&self, conn: &mut Connection) -> Result<Continuation> {
        let pids = format_pid_list(self.device.debuggable_pids());
        conn.write_payload(pids.as_bytes()).await?;
        Ok(Continuation::Continue)
    }
}

impl ClientStateHandler for PidListRenderer {
    async fn on_client_list_changed(&mut self, conn: &mut Connection) -> Result<Continuation> {
        self.send(conn).await
    }

    async fn on_logcat_message(
        &mut self,
        _conn: &mut Connection,
        _message: &str,
    ) -> Result<Continuation> {
        Ok(Continuation::Continue)
    }
}

impl DeviceCommandHandler for TrackJdwp {
    fn matches(&self, service: &str) -> bool {
        service == "track-jdwp"
    }

    fn invoke<'a>(
        &'a self,
        _ctx: &'a ServerContext,
        conn: &'a mut Connection,
        device: &'a Arc<DeviceState>,
        _service: &'a str,
    ) -> BoxFuture<'a, Result<()>> {
        Box::pin(async move {
            let queue = device.client_hub().subscribe().ok_or(Error::ServerStopped)?;
            debug!(
                "{}: tracking jdwp on {} (subscriber {})",
                conn.peer(),
                device.serial(),
                queue.id()
            );

            let mut renderer = PidListRenderer {
                device: Arc::clone(device),
            };
            conn.okay().await?;
            renderer.send(conn).await?;
            stream_client_events(conn, queue, &mut renderer).await
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use fakeadb_core::{ClientConfig, DeviceConfig, DeviceStatus};
    use fakeadb_protocol::protocol;
    use tokio::io::{AsyncReadExt, AsyncWriteExt, DuplexStream};
    use tokio::time::timeout;

    async fn read_payload(client: &mut DuplexStream) -> String {
        let mut prefix = [0u8; 4];
        timeout(Duration::from_secs(5), client.read_exact(&mut prefix))
            .await
            .expect("timed out waiting for payload")
            .unwrap();
        let mut payload = vec![0u8; protocol::decode_length(&prefix).unwrap()];
        client.read_exact(&mut payload).await.unwrap();
        String::from_utf8(payload).unwrap()
    }

    async fn read_okay(client: &mut DuplexStream) {
        let mut status = [0u8; 4];
        client.read_exact(&mut status).await.unwrap();
        assert_eq!(&status, b"OKAY");
    }

    #[tokio::test]
    async fn test_track_devices_sends_updates() {
        let ctx = Arc::new(ServerContext::with_defaults());
        let (mut client, server) = tokio::io::duplex(4096);

        let task_ctx = Arc::clone(&ctx);
        let task = tokio::spawn(async move {
            let mut conn = Connection::new(server, "test");
            TrackDevices { long: false }
                .invoke(&task_ctx, &mut conn, &Target::Any, "")
                .await
        });

        read_okay(&mut client).await;
        assert_eq!(read_payload(&mut client).await, "");

        let device = ctx
            .registry()
            .connect(DeviceConfig::new("serial-X"))
            .unwrap();
        assert_eq!(read_payload(&mut client).await, "serial-X\tdevice\n");

        device.set_status(DeviceStatus::Offline);
        assert_eq!(read_payload(&mut client).await, "serial-X\toffline\n");

        ctx.registry().disconnect("serial-X");
        assert_eq!(read_payload(&mut client).await, "");

        client.shutdown().await.unwrap();
        drop(client);
        task.await.unwrap().unwrap();
        assert_eq!(ctx.registry().hub().subscriber_count(), 0);
    }

    #[tokio::test]
    async fn test_track_devices_ends_on_hub_stop() {
        let ctx = Arc::new(ServerContext::with_defaults());
        let (mut client, server) = tokio::io::duplex(4096);

        let task_ctx = Arc::clone(&ctx);
        let task = tokio::spawn(async move {
            let mut conn = Connection::new(server, "test");
            TrackDevices { long: true }
                .invoke(&task_ctx, &mut conn, &Target::Any, "")
                .await
        });

        read_okay(&mut client).await;
        read_payload(&mut client).await;

        ctx.registry().stop();
        timeout(Duration::from_secs(5), task)
            .await
            .expect("stream should end when the hub stops")
            .unwrap()
            .unwrap();
    }

    #[tokio::test]
    async fn test_track_devices_after_stop_fails() {
        let ctx = ServerContext::with_defaults();
        ctx.registry().stop();
        let (_client, server) = tokio::io::duplex(64);
        let mut conn = Connection::new(server, "test");

        let result = TrackDevices { long: false }
            .invoke(&ctx, &mut conn, &Target::Any, "")
            .await;
        assert!(matches!(result, Err(Error::ServerStopped)));
        assert!(!conn.has_responded());
    }

    #[tokio::test]
    async fn test_track_jdwp_lists_debuggable_clients() {
        let ctx = Arc::new(ServerContext::with_defaults());
        let device = ctx
            .registry()
            .connect(
                DeviceConfig::new("emulator-5554")
                    .with_client(ClientConfig::new(99, "com.example.release").with_debuggable(false)),
            )
            .unwrap();
        let (mut client, server) = tokio::io::duplex(4096);

        let task_device = Arc::clone(&device);
        let task_ctx = Arc::clone(&ctx);
        let task = tokio::spawn(async move {
            let mut conn = Connection::new(server, "test");
            TrackJdwp
                .invoke(&task_ctx, &mut conn, &task_device, "track-jdwp")
                .await
        });

        read_okay(&mut client).await;
        assert_eq!(read_payload(&mut client).await, "");

        device.start_client(ClientConfig::new(1234, "com.example.app"));
        assert_eq!(read_payload(&mut client).await, "1234\n");

        device.start_client(ClientConfig::new(1500, "com.example.other"));
        assert_eq!(read_payload(&mut client).await, "1234\n1500\n");

        device.stop_client(1234);
        assert_eq!(read_payload(&mut client).await, "1500\n");

        // logcat traffic on the same hub produces no jdwp output
        device.add_logcat_message("I/Test: hello");
        ctx.registry().disconnect("emulator-5554");
        timeout(Duration::from_secs(5), task)
            .await
            .expect("stream should end when the device goes away")
            .unwrap()
            .unwrap();
        let mut rest = Vec::new();
        client.read_to_end(&mut rest).await.unwrap();
        assert!(rest.is_empty());
    }
}
