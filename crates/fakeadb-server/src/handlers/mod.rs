//! Command handlers
//!
//! Host handlers are looked up by command name (the part of a host service
//! before its first `:`). Device handlers are asked in priority order whether
//! they accept a device service string. Long-lived streaming commands
//! subscribe to a hub and implement [`DeviceStateHandler`] or
//! [`ClientStateHandler`] to render each event.

use std::collections::HashMap;
use std::sync::Arc;

use futures_util::future::BoxFuture;

use fakeadb_core::prelude::*;
use fakeadb_protocol::Target;

use crate::connection::{Connection, ConnectionState};
use crate::context::ServerContext;
use crate::hub::{ClientStateChange, DeviceStateChange, StateChangeQueue};
use crate::state::DeviceState;

pub mod host;
pub mod jdwp;
pub mod shell;
pub mod track;

/// Whether a streaming handler wants more events
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Continuation {
    Continue,
    Stop,
}

/// Handler for a host service (`host:<name>[:<args>]`, `host-serial:...`)
pub trait HostCommandHandler: Send + Sync {
    /// Run the command. `args` is everything after `<name>:`, possibly empty.
    fn invoke<'a>(
        &'a self,
        ctx: &'a ServerContext,
        conn: &'a mut Connection,
        target: &'a Target,
        args: &'a str,
    ) -> BoxFuture<'a, Result<()>>;
}

/// Handler for a service sent after a transport was selected
pub trait DeviceCommandHandler: Send + Sync {
    fn matches(&self, service: &str) -> bool;

    fn invoke<'a>(
        &'a self,
        ctx: &'a ServerContext,
        conn: &'a mut Connection,
        device: &'a Arc<DeviceState>,
        service: &'a str,
    ) -> BoxFuture<'a, Result<()>>;
}

/// Renders device hub events onto a streaming connection
#[trait_variant::make(DeviceStateHandler: Send)]
pub trait LocalDeviceStateHandler {
    async fn on_device_list_changed(&mut self, conn: &mut Connection) -> Result<Continuation>;

    async fn on_device_status_changed(
        &mut self,
        conn: &mut Connection,
        serial: &str,
    ) -> Result<Continuation>;
}

/// Renders client hub events onto a streaming connection
#[trait_variant::make(ClientStateHandler: Send)]
pub trait LocalClientStateHandler {
    async fn on_client_list_changed(&mut self, conn: &mut Connection) -> Result<Continuation>;

    async fn on_logcat_message(
        &mut self,
        conn: &mut Connection,
        message: &str,
    ) -> Result<Continuation>;
}

/// Drain `queue` into `handler` until it stops, the hub stops, or the peer
/// closes the connection
pub async fn stream_device_events<H: DeviceStateHandler>(
    conn: &mut Connection,
    mut queue: StateChangeQueue<DeviceStateChange>,
    handler: &mut H,
) -> Result<()> {
    conn.set_state(ConnectionState::Streaming);
    loop {
        let event = tokio::select! {
            event = queue.take() => event,
            closed = conn.wait_for_peer_close() => {
                closed?;
                debug!("{}: peer closed device stream", conn.peer());
                return Ok(());
            }
        };
        let Some(event) = event else {
            debug!("{}: device hub stopped", conn.peer());
            return Ok(());
        };
        let next = match event {
            DeviceStateChange::DeviceListChanged => handler.on_device_list_changed(conn).await?,
            DeviceStateChange::DeviceStatusChanged { serial } => {
                handler.on_device_status_changed(conn, &serial).await?
            }
        };
        if next == Continuation::Stop {
            return Ok(());
        }
    }
}

/// Client hub counterpart of [`stream_device_events`]
pub async fn stream_client_events<H: ClientStateHandler>(
    conn: &mut Connection,
    mut queue: StateChangeQueue<ClientStateChange>,
    handler: &mut H,
) -> Result<()> {
    conn.set_state(ConnectionState::Streaming);
    loop {
        let event = tokio::select! {
            event = queue.take() => event,
            closed = conn.wait_for_peer_close() => {
                closed?;
                debug!("{}: peer closed client stream", conn.peer());
                return Ok(());
            }
        };
        let Some(event) = event else {
            debug!("{}: client hub stopped", conn.peer());
            return Ok(());
        };
        let next = match event {
            ClientStateChange::ClientListChanged => handler.on_client_list_changed(conn).await?,
            ClientStateChange::LogcatMessage(message) => {
                handler.on_logcat_message(conn, &message).await?
            }
        };
        if next == Continuation::Stop {
            return Ok(());
        }
    }
}

/// Host handlers installed by `install_default_handlers`, keyed by name
pub fn default_host_handlers() -> HashMap<String, Arc<dyn HostCommandHandler>> {
    let mut map: HashMap<String, Arc<dyn HostCommandHandler>> = HashMap::new();
    map.insert("version".into(), Arc::new(host::Version));
    map.insert("kill".into(), Arc::new(host::Kill));
    map.insert("devices".into(), Arc::new(host::ListDevices { long: false }));
    map.insert("devices-l".into(), Arc::new(host::ListDevices { long: true }));
    map.insert("track-devices".into(), Arc::new(track::TrackDevices { long: false }));
    map.insert("track-devices-l".into(), Arc::new(track::TrackDevices { long: true }));
    map.insert("features".into(), Arc::new(host::Features));
    map.insert("host-features".into(), Arc::new(host::Features));
    map.insert("get-state".into(), Arc::new(host::GetState));
    map.insert("get-serialno".into(), Arc::new(host::GetSerialNo));
    map.insert("get-devpath".into(), Arc::new(host::GetDevPath));
    map.insert("mdns".into(), Arc::new(host::Mdns));
    map.insert("forward".into(), Arc::new(host::Forward));
    map.insert("killforward".into(), Arc::new(host::KillForward));
    map.insert("killforward-all".into(), Arc::new(host::KillForwardAll));
    map.insert("list-forward".into(), Arc::new(host::ListForward));
    map
}

/// Device handlers installed by `install_default_handlers`, lowest priority first
pub fn default_device_handlers() -> Vec<Arc<dyn DeviceCommandHandler>> {
    vec![
        Arc::new(track::TrackJdwp),
        Arc::new(jdwp::Jdwp),
        Arc::new(shell::Logcat),
        Arc::new(shell::GetProp),
        Arc::new(shell::SetProp),
        Arc::new(shell::Echo),
    ]
}
