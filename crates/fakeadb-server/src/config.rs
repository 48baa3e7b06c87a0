//! Server configuration files
//!
//! A `ServerConfig` describes everything needed to bring a server back to a
//! known state: advertised features, mDNS services and the connected devices
//! with their properties and clients.
//!
//! ```toml
//! port = 5037
//! features = ["shell_v2", "cmd"]
//!
//! [[devices]]
//! serial = "emulator-5554"
//! model = "sdk_gphone64_arm64"
//!
//! [devices.properties]
//! "persist.sys.locale" = "en-US"
//!
//! [[devices.clients]]
//! pid = 1234
//! package_name = "com.example.app"
//!
//! [[mdns_services]]
//! instance_name = "adb-R58M123ABC"
//! service_name = "_adb-tls-connect._tcp"
//! address = "192.168.1.20:37313"
//! ```

use std::path::Path;

use serde::{Deserialize, Serialize};

use fakeadb_core::prelude::*;
use fakeadb_core::{DeviceConfig, MdnsService};

use crate::context::default_features;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Port to listen on; unset means the caller decides
    #[serde(skip_serializing_if = "Option::is_none")]
    pub port: Option<u16>,
    pub features: Vec<String>,
    pub devices: Vec<DeviceConfig>,
    pub mdns_services: Vec<MdnsService>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: None,
            features: default_features(),
            devices: Vec::new(),
            mdns_services: Vec::new(),
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Loading & Saving
// ─────────────────────────────────────────────────────────────────────────────

/// Load a configuration file
pub fn load_config(path: &Path) -> Result<ServerConfig> {
    if !path.exists() {
        return Err(Error::ConfigNotFound {
            path: path.to_path_buf(),
        });
    }

    let content = std::fs::read_to_string(path)
        .map_err(|e| Error::config(format!("Failed to read {}: {}", path.display(), e)))?;
    let config: ServerConfig = toml::from_str(&content)
        .map_err(|e| Error::config(format!("Failed to parse {}: {}", path.display(), e)))?;

    debug!(
        "Loaded config from {:?} ({} devices)",
        path,
        config.devices.len()
    );
    Ok(config)
}

/// Save a configuration file
///
/// Uses atomic write (temp file + rename).
pub fn save_config(path: &Path, config: &ServerConfig) -> Result<()> {
    if let Some(dir) = path.parent().filter(|dir| !dir.as_os_str().is_empty()) {
        std::fs::create_dir_all(dir)
            .map_err(|e| Error::config(format!("Failed to create {}: {}", dir.display(), e)))?;
    }

    let content = toml::to_string_pretty(config)
        .map_err(|e| Error::config(format!("Failed to serialize config: {}", e)))?;

    let mut temp_name = path.as_os_str().to_owned();
    temp_name.push(".tmp");
    let temp_path = Path::new(&temp_name);

    std::fs::write(temp_path, content)
        .map_err(|e| Error::config(format!("Failed to write temp file: {}", e)))?;
    std::fs::rename(temp_path, path)
        .map_err(|e| Error::config(format!("Failed to rename temp file: {}", e)))?;

    info!("Saved config to {:?}", path);
    Ok(())
}
