//! # fakeadb-protocol - ADB Host Protocol
//!
//! Wire-level pieces of the ADB host protocol as spoken on port 5037:
//! length-prefixed requests, `OKAY`/`FAIL` responses, service-string
//! parsing, and the payload formats of `host:devices` and `track-jdwp`.
//!
//! Depends on [`fakeadb_core`] for error handling and device status.
//!
//! ## Public API
//!
//! ### Framing (`protocol`)
//! - [`read_request()`] - Read one length-prefixed service request
//! - [`write_okay()`], [`write_fail()`], [`write_okay_with_payload()`]
//! - [`encode_length()`] / [`decode_length()`] - Four-hex-digit lengths
//!
//! ### Service Parsing (`request`)
//! - [`Service`] - Host service with its [`Target`], or device service
//! - [`parse_transport()`] - `host:transport*` selections
//!
//! ### Payloads
//! - [`DeviceListEntry`], [`format_device_list()`], [`parse_device_list()`]
//! - [`JDWP_HANDSHAKE`], [`format_pid_list()`], [`parse_pid_list()`]
//!
//! ### Testing (`test-helpers` feature)
//! - `test_utils::AdbTestClient` - Minimal adb client for driving a server

pub mod devices;
pub mod jdwp;
pub mod protocol;
pub mod request;

#[cfg(any(test, feature = "test-helpers"))]
pub mod test_utils;

pub use devices::{format_device_list, parse_device_list, DeviceListEntry};
pub use jdwp::{format_pid_list, parse_pid_list, JDWP_HANDSHAKE};
pub use protocol::{
    decode_length, encode_length, encode_message, read_request, version_payload, write_fail,
    write_length_prefixed, write_okay, write_okay_with_payload, ADB_PROTOCOL_VERSION, FAIL,
    MAX_PAYLOAD_LEN, OKAY,
};
pub use request::{parse_transport, split_serial, Service, Target, TransportRequest};
