//! Simulated device: identity, status, properties, clients and forwards

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use fakeadb_core::prelude::*;
use fakeadb_core::{ClientConfig, DeviceConfig, DeviceStatus, HostConnectionType};
use fakeadb_protocol::DeviceListEntry;

use super::client::ClientState;
use crate::hub::{
    ClientStateChange, ClientStateChangeHub, DeviceStateChangeHub, StateChangeHub,
    StateChangeQueue,
};

/// A `forward` entry: host-side spec to device-side spec
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PortForward {
    pub local: String,
    pub remote: String,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Mutable record of one connected device
///
/// Owned by the registry. Status changes are published on the server's
/// device hub; client and logcat changes on this device's own client hub.
pub struct DeviceState {
    serial: String,
    manufacturer: String,
    model: String,
    device: String,
    release: String,
    sdk: String,
    connection_type: HostConnectionType,
    devpath: String,
    transport_id: u64,
    status: Mutex<DeviceStatus>,
    properties: Mutex<BTreeMap<String, String>>,
    clients: Mutex<BTreeMap<u32, Arc<ClientState>>>,
    forwards: Mutex<Vec<PortForward>>,
    logcat: Mutex<Vec<String>>,
    device_hub: DeviceStateChangeHub,
    client_hub: ClientStateChangeHub,
}

impl DeviceState {
    pub(crate) fn new(
        config: DeviceConfig,
        transport_id: u64,
        device_hub: DeviceStateChangeHub,
    ) -> Self {
        let mut properties = BTreeMap::new();
        properties.insert("ro.serialno".to_string(), config.serial.clone());
        properties.insert(
            "ro.product.manufacturer".to_string(),
            config.manufacturer.clone(),
        );
        properties.insert("ro.product.model".to_string(), config.model.clone());
        properties.insert("ro.product.device".to_string(), config.device.clone());
        properties.insert("ro.product.name".to_string(), config.device.clone());
        properties.insert(
            "ro.build.version.release".to_string(),
            config.release.clone(),
        );
        properties.insert("ro.build.version.sdk".to_string(), config.sdk.clone());
        properties.extend(config.properties);

        let clients = config
            .clients
            .into_iter()
            .map(|client| (client.pid, Arc::new(ClientState::new(client))))
            .collect();

        Self {
            serial: config.serial,
            manufacturer: config.manufacturer,
            model: config.model,
            device: config.device,
            release: config.release,
            sdk: config.sdk,
            connection_type: config.connection_type,
            devpath: config.devpath,
            transport_id,
            status: Mutex::new(config.status),
            properties: Mutex::new(properties),
            clients: Mutex::new(clients),
            forwards: Mutex::new(Vec::new()),
            logcat: Mutex::new(Vec::new()),
            device_hub,
            client_hub: StateChangeHub::new("client"),
        }
    }

    pub fn serial(&self) -> &str {
        &self.serial
    }

    pub fn manufacturer(&self) -> &str {
        &self.manufacturer
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub fn release(&self) -> &str {
        &self.release
    }

    pub fn sdk(&self) -> &str {
        &self.sdk
    }

    pub fn connection_type(&self) -> HostConnectionType {
        self.connection_type
    }

    /// Falls back to `unknown` like adb does for transports without a path
    pub fn devpath(&self) -> &str {
        if self.devpath.is_empty() {
            "unknown"
        } else {
            &self.devpath
        }
    }

    pub fn transport_id(&self) -> u64 {
        self.transport_id
    }

    // ─────────────────────────────────────────────────────────────
    // Status
    // ─────────────────────────────────────────────────────────────

    pub fn status(&self) -> DeviceStatus {
        *lock(&self.status)
    }

    /// Change the status and notify `track-devices` subscribers
    pub fn set_status(&self, status: DeviceStatus) {
        let mut current = lock(&self.status);
        if *current == status {
            return;
        }
        info!("{}: {} -> {}", self.serial, *current, status);
        *current = status;
        self.device_hub.device_status_changed(&self.serial);
    }

    /// Row of a `host:devices-l` listing
    pub fn list_entry(&self) -> DeviceListEntry {
        DeviceListEntry {
            serial: self.serial.clone(),
            status: self.status(),
            product: self
                .property("ro.product.name")
                .unwrap_or_else(|| self.device.clone()),
            model: self.model.clone(),
            device: self.device.clone(),
            transport_id: self.transport_id,
        }
    }

    // ─────────────────────────────────────────────────────────────
    // Properties
    // ─────────────────────────────────────────────────────────────

    pub fn property(&self, name: &str) -> Option<String> {
        lock(&self.properties).get(name).cloned()
    }

    pub fn properties(&self) -> BTreeMap<String, String> {
        lock(&self.properties).clone()
    }

    pub fn set_property(&self, name: impl Into<String>, value: impl Into<String>) {
        lock(&self.properties).insert(name.into(), value.into());
    }

    // ─────────────────────────────────────────────────────────────
    // Clients
    // ─────────────────────────────────────────────────────────────

    /// Start a client process and notify `track-jdwp` subscribers
    ///
    /// A client already running under the same pid is replaced.
    pub fn start_client(&self, config: ClientConfig) -> Arc<ClientState> {
        let client = Arc::new(ClientState::new(config));
        lock(&self.clients).insert(client.pid(), Arc::clone(&client));
        debug!("{}: client {} started", self.serial, client.pid());
        self.client_hub.client_list_changed();
        client
    }

    /// Stop a client process; returns it if it was running
    pub fn stop_client(&self, pid: u32) -> Option<Arc<ClientState>> {
        let removed = lock(&self.clients).remove(&pid);
        if removed.is_some() {
            debug!("{}: client {} stopped", self.serial, pid);
            self.client_hub.client_list_changed();
        }
        removed
    }

    pub fn client(&self, pid: u32) -> Option<Arc<ClientState>> {
        lock(&self.clients).get(&pid).cloned()
    }

    /// All clients, ordered by pid
    pub fn clients(&self) -> Vec<Arc<ClientState>> {
        lock(&self.clients).values().cloned().collect()
    }

    /// Pids reported by `track-jdwp`: debuggable clients only
    pub fn debuggable_pids(&self) -> Vec<u32> {
        lock(&self.clients)
            .values()
            .filter(|client| client.is_debuggable())
            .map(|client| client.pid())
            .collect()
    }

    // ─────────────────────────────────────────────────────────────
    // Logcat
    // ─────────────────────────────────────────────────────────────

    /// Append a logcat line and push it to every logcat stream
    pub fn add_logcat_message(&self, message: impl Into<String>) {
        let message = message.into();
        let mut history = lock(&self.logcat);
        self.client_hub.logcat_message(&message);
        history.push(message);
    }

    pub fn logcat_messages(&self) -> Vec<String> {
        lock(&self.logcat).clone()
    }

    /// Snapshot the logcat history and subscribe in one step
    ///
    /// Every message ends up either in the snapshot or in the queue, never
    /// both. Returns `None` once the device has been disconnected.
    pub fn subscribe_logcat(&self) -> Option<(Vec<String>, StateChangeQueue<ClientStateChange>)> {
        let history = lock(&self.logcat);
        let queue = self.client_hub.subscribe()?;
        Some((history.clone(), queue))
    }

    // ─────────────────────────────────────────────────────────────
    // Port forwards
    // ─────────────────────────────────────────────────────────────

    /// Record a forward; with `norebind`, an existing `local` is an error
    pub fn add_forward(&self, local: &str, remote: &str, norebind: bool) -> Result<()> {
        let mut forwards = lock(&self.forwards);
        if let Some(existing) = forwards.iter_mut().find(|f| f.local == local) {
            if norebind {
                return Err(Error::ForwardExists {
                    local: local.to_string(),
                });
            }
            existing.remote = remote.to_string();
            return Ok(());
        }
        forwards.push(PortForward {
            local: local.to_string(),
            remote: remote.to_string(),
        });
        Ok(())
    }

    pub fn remove_forward(&self, local: &str) -> Result<()> {
        let mut forwards = lock(&self.forwards);
        let before = forwards.len();
        forwards.retain(|f| f.local != local);
        if forwards.len() == before {
            return Err(Error::ForwardNotFound {
                local: local.to_string(),
            });
        }
        Ok(())
    }

    pub fn remove_all_forwards(&self) {
        lock(&self.forwards).clear();
    }

    pub fn forwards(&self) -> Vec<PortForward> {
        lock(&self.forwards).clone()
    }

    // ─────────────────────────────────────────────────────────────
    // Lifecycle
    // ─────────────────────────────────────────────────────────────

    /// Hub for `track-jdwp` and logcat subscribers of this device
    pub fn client_hub(&self) -> &ClientStateChangeHub {
        &self.client_hub
    }

    /// End every stream attached to this device
    pub(crate) fn stop(&self) {
        self.client_hub.stop();
    }

    /// Capture the device so it can be reconnected to a new server
    pub fn to_config(&self) -> DeviceConfig {
        DeviceConfig {
            serial: self.serial.clone(),
            manufacturer: self.manufacturer.clone(),
            model: self.model.clone(),
            device: self.device.clone(),
            release: self.release.clone(),
            sdk: self.sdk.clone(),
            connection_type: self.connection_type,
            status: self.status(),
            devpath: self.devpath.clone(),
            properties: self.properties(),
            clients: self.clients().iter().map(|c| c.to_config()).collect(),
        }
    }
}

impl std::fmt::Debug for DeviceState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DeviceState")
            .field("serial", &self.serial)
            .field("transport_id", &self.transport_id)
            .field("status", &self.status())
            .finish()
    }
}
