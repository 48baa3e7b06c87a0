//! State shared by every connection of one server

use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};

use fakeadb_core::MdnsService;
use tokio::sync::watch;

use crate::handlers::{DeviceCommandHandler, HostCommandHandler};
use crate::state::DeviceRegistry;

/// Features advertised by `host:features` unless overridden
pub const DEFAULT_FEATURES: &[&str] = &[
    "push_sync",
    "fixed_push_mkdir",
    "shell_v2",
    "apex",
    "stat_v2",
    "cmd",
    "abb",
    "abb_exec",
];

pub fn default_features() -> Vec<String> {
    DEFAULT_FEATURES.iter().map(|f| f.to_string()).collect()
}

/// Registry, handler tables and shutdown signal handed to every handler
pub struct ServerContext {
    registry: DeviceRegistry,
    features: RwLock<Vec<String>>,
    /// Listed by `host:mdns:services` in insertion order
    mdns_services: RwLock<Vec<MdnsService>>,
    host_handlers: HashMap<String, Arc<dyn HostCommandHandler>>,
    /// Highest priority first
    device_handlers: Vec<Arc<dyn DeviceCommandHandler>>,
    shutdown: watch::Sender<bool>,
}

impl ServerContext {
    pub(crate) fn new(
        features: Vec<String>,
        host_handlers: HashMap<String, Arc<dyn HostCommandHandler>>,
        device_handlers: Vec<Arc<dyn DeviceCommandHandler>>,
    ) -> Self {
        let (shutdown, _) = watch::channel(false);
        Self {
            registry: DeviceRegistry::new(),
            features: RwLock::new(features),
            mdns_services: RwLock::new(Vec::new()),
            host_handlers,
            device_handlers,
            shutdown,
        }
    }

    /// Context with the default handlers and features
    #[cfg(test)]
    pub(crate) fn with_defaults() -> Self {
        let mut device_handlers = crate::handlers::default_device_handlers();
        device_handlers.reverse();
        Self::new(
            default_features(),
            crate::handlers::default_host_handlers(),
            device_handlers,
        )
    }

    pub fn registry(&self) -> &DeviceRegistry {
        &self.registry
    }

    pub fn features(&self) -> Vec<String> {
        self.features
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn set_features(&self, features: Vec<String>) {
        *self
            .features
            .write()
            .unwrap_or_else(PoisonError::into_inner) = features;
    }

    /// Returns false if an identical service is already listed
    pub fn add_mdns_service(&self, service: MdnsService) -> bool {
        let mut services = self
            .mdns_services
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        if services.contains(&service) {
            return false;
        }
        services.push(service);
        true
    }

    pub fn remove_mdns_service(&self, service: &MdnsService) -> bool {
        let mut services = self
            .mdns_services
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        let before = services.len();
        services.retain(|s| s != service);
        services.len() != before
    }

    pub fn mdns_services(&self) -> Vec<MdnsService> {
        self.mdns_services
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn host_handler(&self, name: &str) -> Option<Arc<dyn HostCommandHandler>> {
        self.host_handlers.get(name).cloned()
    }

    /// First handler, in priority order, that accepts `service`
    pub fn device_handler(&self, service: &str) -> Option<Arc<dyn DeviceCommandHandler>> {
        self.device_handlers
            .iter()
            .find(|handler| handler.matches(service))
            .cloned()
    }

    /// Ask the acceptor to shut the server down
    pub fn request_shutdown(&self) {
        self.shutdown.send_replace(true);
    }

    pub fn is_shutting_down(&self) -> bool {
        *self.shutdown.borrow()
    }

    pub(crate) fn shutdown_receiver(&self) -> watch::Receiver<bool> {
        self.shutdown.subscribe()
    }
}
