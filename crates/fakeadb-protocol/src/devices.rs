//! `host:devices` list formatting and parsing

use fakeadb_core::prelude::*;
use fakeadb_core::DeviceStatus;

/// One row of a device list
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceListEntry {
    pub serial: String,
    pub status: DeviceStatus,
    pub product: String,
    pub model: String,
    pub device: String,
    pub transport_id: u64,
}

impl DeviceListEntry {
    /// `serial\tstatus`
    pub fn short_line(&self) -> String {
        format!("{}\t{}\n", self.serial, self.status)
    }

    /// `devices -l` line: serial padded to 22 columns, then key:value pairs
    ///
    /// Spaces inside model names are replaced with underscores, as adb does.
    pub fn long_line(&self) -> String {
        format!(
            "{:<22} {} product:{} model:{} device:{} transport_id:{}\n",
            self.serial,
            self.status,
            sanitize(&self.product),
            sanitize(&self.model),
            sanitize(&self.device),
            self.transport_id
        )
    }
}

fn sanitize(value: &str) -> String {
    value
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '.' || c == '-' { c } else { '_' })
        .collect()
}

/// Render the payload of a `host:devices` / `host:devices-l` reply
pub fn format_device_list(entries: &[DeviceListEntry], long: bool) -> String {
    entries
        .iter()
        .map(|entry| {
            if long {
                entry.long_line()
            } else {
                entry.short_line()
            }
        })
        .collect()
}

/// Parse a short-format device list back into `(serial, status)` pairs
pub fn parse_device_list(payload: &str) -> Result<Vec<(String, DeviceStatus)>> {
    payload
        .lines()
        .filter(|line| !line.trim().is_empty())
        .map(|line| -> Result<(String, DeviceStatus)> {
            let (serial, status) = line
                .split_once('\t')
                .ok_or_else(|| Error::protocol(format!("malformed device line '{}'", line)))?;
            Ok((serial.to_string(), status.trim().parse::<DeviceStatus>()?))
        })
        .collect()
}
