//! # fakeadb-server - Fake ADB Server
//!
//! A protocol-level stand-in for the adb host server. Tests start a
//! [`FakeAdbServer`], connect simulated devices and clients, and point the
//! code under test at its port. Device and client changes made through the
//! server API are pushed to `track-devices` and `track-jdwp` subscribers.
//!
//! ## Public API
//!
//! ### Server (`server`)
//! - [`FakeAdbServerBuilder`] - Port, features, handlers and initial devices
//! - [`FakeAdbServer`] - Running server; devices, mDNS services and shutdown
//!
//! ### State (`state`)
//! - [`DeviceRegistry`] - Connected devices by serial and transport id
//! - [`DeviceState`] - Properties, clients, logcat and forwards of a device
//! - [`ClientState`] - An app process and its debugger sessions
//!
//! ### Change Notification (`hub`)
//! - [`StateChangeHub`] / [`StateChangeQueue`] - Fan-out of state changes
//! - [`DeviceStateChange`], [`ClientStateChange`] - Event kinds
//!
//! ### Handlers (`handlers`)
//! - [`HostCommandHandler`], [`DeviceCommandHandler`] - Request handlers
//! - [`DeviceStateHandler`], [`ClientStateHandler`] - Streaming renderers
//!
//! ### Configuration (`config`)
//! - [`ServerConfig`], [`load_config()`], [`save_config()`]

pub mod config;
pub mod connection;
pub mod context;
pub mod handlers;
pub mod hub;
pub mod server;
pub mod state;

pub use config::{load_config, save_config, ServerConfig};
pub use connection::{Connection, ConnectionState};
pub use context::{default_features, ServerContext, DEFAULT_FEATURES};
pub use handlers::{
    ClientStateHandler, Continuation, DeviceCommandHandler, DeviceStateHandler,
    HostCommandHandler,
};
pub use hub::{
    ClientStateChange, ClientStateChangeHub, DeviceStateChange, DeviceStateChangeHub,
    StateChangeHub, StateChangeQueue,
};
pub use server::{FakeAdbServer, FakeAdbServerBuilder, DEFAULT_ADB_PORT};
pub use state::{ClientState, DeviceRegistry, DeviceState, PortForward};
