//! Registry of connected devices, keyed and ordered by serial

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use fakeadb_core::prelude::*;
use fakeadb_core::{DeviceConfig, HostConnectionType};
use fakeadb_protocol::{DeviceListEntry, Target};

use super::device::DeviceState;
use crate::hub::{DeviceStateChangeHub, StateChangeHub};

struct RegistryInner {
    devices: BTreeMap<String, Arc<DeviceState>>,
    next_transport_id: u64,
}

/// All devices known to one server, plus the hub that announces changes
///
/// Lock order is registry, then device, then hub. Hubs never call back into
/// the registry.
pub struct DeviceRegistry {
    inner: Mutex<RegistryInner>,
    hub: DeviceStateChangeHub,
}

impl Default for DeviceRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl DeviceRegistry {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(RegistryInner {
                devices: BTreeMap::new(),
                next_transport_id: 1,
            }),
            hub: StateChangeHub::new("device"),
        }
    }

    fn lock(&self) -> MutexGuard<'_, RegistryInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Hub for `track-devices` subscribers
    pub fn hub(&self) -> &DeviceStateChangeHub {
        &self.hub
    }

    /// Add a device and notify `track-devices` subscribers
    pub fn connect(&self, config: DeviceConfig) -> Result<Arc<DeviceState>> {
        let mut inner = self.lock();
        if inner.devices.contains_key(&config.serial) {
            return Err(Error::duplicate_device(config.serial));
        }
        let transport_id = inner.next_transport_id;
        inner.next_transport_id += 1;

        let device = Arc::new(DeviceState::new(config, transport_id, self.hub.clone()));
        inner
            .devices
            .insert(device.serial().to_string(), Arc::clone(&device));
        info!(
            "device {} connected (transport_id {})",
            device.serial(),
            transport_id
        );
        self.hub.device_list_changed();
        Ok(device)
    }

    /// Remove a device, end its streams, and notify subscribers
    pub fn disconnect(&self, serial: &str) -> Option<Arc<DeviceState>> {
        let mut inner = self.lock();
        let device = inner.devices.remove(serial)?;
        device.stop();
        info!("device {} disconnected", serial);
        self.hub.device_list_changed();
        Some(device)
    }

    pub fn get(&self, serial: &str) -> Option<Arc<DeviceState>> {
        self.lock().devices.get(serial).cloned()
    }

    /// All devices, ordered by serial
    pub fn devices(&self) -> Vec<Arc<DeviceState>> {
        self.lock().devices.values().cloned().collect()
    }

    pub fn list_entries(&self) -> Vec<DeviceListEntry> {
        self.lock()
            .devices
            .values()
            .map(|device| device.list_entry())
            .collect()
    }

    /// Resolve the device a request targets
    pub fn resolve(&self, target: &Target) -> Result<Arc<DeviceState>> {
        let inner = self.lock();
        match target {
            Target::Serial(serial) => inner
                .devices
                .get(serial)
                .cloned()
                .ok_or_else(|| Error::device_not_found(serial.clone())),
            Target::TransportId(id) => inner
                .devices
                .values()
                .find(|device| device.transport_id() == *id)
                .cloned()
                .ok_or_else(|| Error::device_not_found(format!("transport_id:{}", id))),
            Target::Any => single(inner.devices.values()),
            Target::Usb => single(
                inner
                    .devices
                    .values()
                    .filter(|d| d.connection_type() == HostConnectionType::Usb),
            ),
            Target::Local => single(
                inner
                    .devices
                    .values()
                    .filter(|d| d.connection_type() != HostConnectionType::Usb),
            ),
        }
    }

    /// Stop the device hub and every device's client hub
    pub(crate) fn stop(&self) {
        let inner = self.lock();
        for device in inner.devices.values() {
            device.stop();
        }
        self.hub.stop();
    }
}

fn single<'a>(
    mut candidates: impl Iterator<Item = &'a Arc<DeviceState>>,
) -> Result<Arc<DeviceState>> {
    let first = candidates.next().ok_or(Error::NoDevices)?;
    if candidates.next().is_some() {
        return Err(Error::MultipleDevices);
    }
    Ok(Arc::clone(first))
}
