//! Domain types shared by the protocol and server crates

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::Error;

/// Connection status of a simulated device, as reported by `host:devices`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeviceStatus {
    Offline,
    Bootloader,
    #[default]
    Device,
    Host,
    Recovery,
    Rescue,
    Sideload,
    Unauthorized,
    Authorizing,
    Connecting,
}

impl DeviceStatus {
    /// The exact string adb puts on the wire
    pub fn as_str(&self) -> &'static str {
        match self {
            DeviceStatus::Offline => "offline",
            DeviceStatus::Bootloader => "bootloader",
            DeviceStatus::Device => "device",
            DeviceStatus::Host => "host",
            DeviceStatus::Recovery => "recovery",
            DeviceStatus::Rescue => "rescue",
            DeviceStatus::Sideload => "sideload",
            DeviceStatus::Unauthorized => "unauthorized",
            DeviceStatus::Authorizing => "authorizing",
            DeviceStatus::Connecting => "connecting",
        }
    }

    /// Whether device services (shell, jdwp, ...) can run against this device
    pub fn is_online(&self) -> bool {
        matches!(
            self,
            DeviceStatus::Device | DeviceStatus::Recovery | DeviceStatus::Rescue
        )
    }
}

impl fmt::Display for DeviceStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DeviceStatus {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "offline" => Ok(DeviceStatus::Offline),
            "bootloader" => Ok(DeviceStatus::Bootloader),
            "device" => Ok(DeviceStatus::Device),
            "host" => Ok(DeviceStatus::Host),
            "recovery" => Ok(DeviceStatus::Recovery),
            "rescue" => Ok(DeviceStatus::Rescue),
            "sideload" => Ok(DeviceStatus::Sideload),
            "unauthorized" => Ok(DeviceStatus::Unauthorized),
            "authorizing" => Ok(DeviceStatus::Authorizing),
            "connecting" => Ok(DeviceStatus::Connecting),
            other => Err(Error::protocol(format!("unknown device status '{}'", other))),
        }
    }
}

/// How the simulated device is attached to the host
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HostConnectionType {
    #[default]
    Usb,
    /// Local emulator (`emulator-NNNN` serials); selected by `transport-local`
    Emulator,
    /// `adb connect host:port` style device
    Network,
}

/// Static description of a device to connect
///
/// This is what test drivers hand to `FakeAdbServer::connect_device`, and
/// what a TOML config lists under `[[devices]]`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DeviceConfig {
    pub serial: String,
    pub manufacturer: String,
    pub model: String,
    /// Device codename, reported as `device:` by `devices -l`
    pub device: String,
    pub release: String,
    pub sdk: String,
    pub connection_type: HostConnectionType,
    pub status: DeviceStatus,
    /// Reported by `get-devpath`; empty means `unknown`
    pub devpath: String,
    /// Extra system properties; these override the ones derived from identity
    pub properties: BTreeMap<String, String>,
    pub clients: Vec<ClientConfig>,
}

impl Default for DeviceConfig {
    fn default() -> Self {
        Self {
            serial: String::new(),
            manufacturer: "Google".to_string(),
            model: "Pixel".to_string(),
            device: "generic".to_string(),
            release: "14".to_string(),
            sdk: "34".to_string(),
            connection_type: HostConnectionType::Usb,
            status: DeviceStatus::Device,
            devpath: String::new(),
            properties: BTreeMap::new(),
            clients: Vec::new(),
        }
    }
}

impl DeviceConfig {
    /// A device with the given serial and default identity
    pub fn new(serial: impl Into<String>) -> Self {
        let serial = serial.into();
        let connection_type = if serial.starts_with("emulator-") {
            HostConnectionType::Emulator
        } else if serial.contains(':') {
            HostConnectionType::Network
        } else {
            HostConnectionType::Usb
        };
        Self {
            serial,
            connection_type,
            ..Default::default()
        }
    }

    pub fn with_model(mut self, manufacturer: impl Into<String>, model: impl Into<String>) -> Self {
        self.manufacturer = manufacturer.into();
        self.model = model.into();
        self
    }

    pub fn with_device(mut self, device: impl Into<String>) -> Self {
        self.device = device.into();
        self
    }

    pub fn with_version(mut self, release: impl Into<String>, sdk: impl Into<String>) -> Self {
        self.release = release.into();
        self.sdk = sdk.into();
        self
    }

    pub fn with_status(mut self, status: DeviceStatus) -> Self {
        self.status = status;
        self
    }

    pub fn with_connection_type(mut self, connection_type: HostConnectionType) -> Self {
        self.connection_type = connection_type;
        self
    }

    pub fn with_devpath(mut self, devpath: impl Into<String>) -> Self {
        self.devpath = devpath.into();
        self
    }

    pub fn with_property(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.properties.insert(key.into(), value.into());
        self
    }

    pub fn with_client(mut self, client: ClientConfig) -> Self {
        self.clients.push(client);
        self
    }
}

/// Static description of an app process running on a device
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientConfig {
    pub pid: u32,
    #[serde(default)]
    pub uid: u32,
    pub package_name: String,
    /// Defaults to the package name when empty
    #[serde(default)]
    pub process_name: String,
    #[serde(default = "default_debuggable")]
    pub debuggable: bool,
}

fn default_debuggable() -> bool {
    true
}

impl ClientConfig {
    pub fn new(pid: u32, package_name: impl Into<String>) -> Self {
        let package_name = package_name.into();
        Self {
            pid,
            uid: 10_000 + pid % 1_000,
            process_name: package_name.clone(),
            package_name,
            debuggable: true,
        }
    }

    pub fn with_process_name(mut self, process_name: impl Into<String>) -> Self {
        self.process_name = process_name.into();
        self
    }

    pub fn with_debuggable(mut self, debuggable: bool) -> Self {
        self.debuggable = debuggable;
        self
    }
}

/// A service advertised over mDNS, listed by `host:mdns:services`
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MdnsService {
    /// e.g. `adb-R58M123ABC-vWgJpq`
    pub instance_name: String,
    /// e.g. `_adb-tls-connect._tcp`
    pub service_name: String,
    /// `host:port` the service resolves to
    pub address: String,
}

impl MdnsService {
    pub fn new(
        instance_name: impl Into<String>,
        service_name: impl Into<String>,
        address: impl Into<String>,
    ) -> Self {
        Self {
            instance_name: instance_name.into(),
            service_name: service_name.into(),
            address: address.into(),
        }
    }
}
