//! Device, client and registry state mutated by the test driver

mod client;
mod device;
mod registry;

pub use client::ClientState;
pub use device::{DeviceState, PortForward};
pub use registry::DeviceRegistry;
