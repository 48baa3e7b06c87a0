//! # fakeadb-core - Core Domain Types
//!
//! Foundation crate for the fake ADB server. Provides the error type,
//! logging setup, and the device/client descriptions shared by the
//! protocol and server crates.
//!
//! This crate has **zero internal dependencies**.
//!
//! ## Public API
//!
//! ### Domain Types (`types`)
//! - [`DeviceStatus`] - Device connection status (`device`, `offline`, ...)
//! - [`HostConnectionType`] - USB, emulator or network attachment
//! - [`DeviceConfig`] - Identity, properties and clients of a simulated device
//! - [`ClientConfig`] - An app process running on a simulated device
//! - [`MdnsService`] - A service listed by `host:mdns:services`
//!
//! ### Error Handling (`error`)
//! - [`Error`] - Error enum with `fatal` vs `recoverable` classification
//! - [`Result`] - Type alias for `std::result::Result<T, Error>`
//! - [`ResultExt`] - Extension trait for adding logged context
//!
//! ### Logging (`logging`)
//! - [`logging::init()`] - Rolling file logs filtered by `FAKEADB_LOG`
//! - [`logging::init_stderr()`] - Same filter, written to stderr

pub mod error;
pub mod logging;
pub mod prelude;
pub mod types;

pub use error::{Error, Result, ResultExt};
pub use types::{ClientConfig, DeviceConfig, DeviceStatus, HostConnectionType, MdnsService};
