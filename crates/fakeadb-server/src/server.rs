//! The acceptor and the test-driver facing server API

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;

use tokio::net::TcpListener;
use tokio::sync::watch;
use tokio::task::JoinSet;

use fakeadb_core::prelude::*;
use fakeadb_core::{DeviceConfig, MdnsService};

use crate::config::ServerConfig;
use crate::connection::{self, Connection};
use crate::context::{default_features, ServerContext};
use crate::handlers::{self, DeviceCommandHandler, HostCommandHandler};
use crate::hub::DeviceStateChangeHub;
use crate::state::DeviceState;

/// Port the real adb server listens on
pub const DEFAULT_ADB_PORT: u16 = 5037;

/// Configures and starts a [`FakeAdbServer`]
pub struct FakeAdbServerBuilder {
    port: u16,
    features: Vec<String>,
    host_handlers: HashMap<String, Arc<dyn HostCommandHandler>>,
    /// In the order added; later entries take priority
    device_handlers: Vec<Arc<dyn DeviceCommandHandler>>,
    devices: Vec<DeviceConfig>,
    mdns_services: Vec<MdnsService>,
}

impl Default for FakeAdbServerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl FakeAdbServerBuilder {
    /// A builder with no handlers, the default features and an ephemeral port
    pub fn new() -> Self {
        Self {
            port: 0,
            features: default_features(),
            host_handlers: HashMap::new(),
            device_handlers: Vec::new(),
            devices: Vec::new(),
            mdns_services: Vec::new(),
        }
    }

    /// Install every built-in host and device handler
    pub fn install_default_handlers(mut self) -> Self {
        self.host_handlers.extend(handlers::default_host_handlers());
        self.device_handlers
            .extend(handlers::default_device_handlers());
        self
    }

    /// Port to bind on 127.0.0.1; 0 picks a free port
    pub fn port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    pub fn features(mut self, features: Vec<String>) -> Self {
        self.features = features;
        self
    }

    /// Handle `host:<name>[:args]`, replacing any handler of the same name
    pub fn add_host_handler(
        mut self,
        name: impl Into<String>,
        handler: impl HostCommandHandler + 'static,
    ) -> Self {
        self.host_handlers.insert(name.into(), Arc::new(handler));
        self
    }

    /// Add a device handler; it is consulted before every handler added earlier
    pub fn add_device_handler(mut self, handler: impl DeviceCommandHandler + 'static) -> Self {
        self.device_handlers.push(Arc::new(handler));
        self
    }

    /// Restore features, devices and mDNS services captured by [`FakeAdbServer::current_config`]
    /// or loaded from a file
    pub fn with_config(mut self, config: ServerConfig) -> Self {
        if let Some(port) = config.port {
            self.port = port;
        }
        self.features = config.features;
        self.devices = config.devices;
        self.mdns_services = config.mdns_services;
        self
    }

    /// Bind the listening socket and start accepting connections
    pub async fn start(self) -> Result<FakeAdbServer> {
        let listener = TcpListener::bind(("127.0.0.1", self.port))
            .await
            .with_context(|| format!("binding 127.0.0.1:{}", self.port))?;
        let local_addr = listener.local_addr()?;

        let mut device_handlers = self.device_handlers;
        device_handlers.reverse();
        let ctx = Arc::new(ServerContext::new(
            self.features,
            self.host_handlers,
            device_handlers,
        ));
        for device in self.devices {
            ctx.registry().connect(device)?;
        }
        for service in self.mdns_services {
            ctx.add_mdns_service(service);
        }

        let (terminated_tx, terminated_rx) = watch::channel(false);
        tokio::spawn(accept_loop(listener, Arc::clone(&ctx), terminated_tx));
        info!("Fake ADB server listening on {}", local_addr);

        Ok(FakeAdbServer {
            ctx,
            local_addr,
            terminated: terminated_rx,
        })
    }
}

async fn accept_loop(
    listener: TcpListener,
    ctx: Arc<ServerContext>,
    terminated: watch::Sender<bool>,
) {
    let mut shutdown = ctx.shutdown_receiver();
    let mut connections = JoinSet::new();

    loop {
        let has_connections = !connections.is_empty();
        tokio::select! {
            _ = signalled(&mut shutdown) => break,
            accepted = listener.accept() => match accepted {
                Ok((socket, addr)) => {
                    let _ = socket.set_nodelay(true);
                    trace!("accepted connection from {}", addr);
                    let conn = Connection::new(socket, addr.to_string());
                    let ctx = Arc::clone(&ctx);
                    let mut stop = shutdown.clone();
                    connections.spawn(async move {
                        tokio::select! {
                            _ = connection::serve(conn, ctx) => {}
                            _ = signalled(&mut stop) => {}
                        }
                    });
                }
                Err(e) => warn!("accept failed: {}", e),
            },
            Some(joined) = connections.join_next(), if has_connections => {
                log_join_error(joined);
            }
        }
    }

    drop(listener);
    ctx.registry().stop();
    while let Some(joined) = connections.join_next().await {
        log_join_error(joined);
    }
    info!("Fake ADB server stopped");
    terminated.send_replace(true);
}

/// Resolves once the flag is `true` (or its sender is gone)
async fn signalled(flag: &mut watch::Receiver<bool>) {
    while !*flag.borrow_and_update() {
        if flag.changed().await.is_err() {
            return;
        }
    }
}

fn log_join_error(joined: std::result::Result<(), tokio::task::JoinError>) {
    if let Err(e) = joined {
        if e.is_panic() {
            error!("connection task panicked: {}", e);
        }
    }
}

/// A running fake ADB server
///
/// Dropping the server signals shutdown without waiting for it.
pub struct FakeAdbServer {
    ctx: Arc<ServerContext>,
    local_addr: SocketAddr,
    terminated: watch::Receiver<bool>,
}

impl FakeAdbServer {
    pub fn builder() -> FakeAdbServerBuilder {
        FakeAdbServerBuilder::new()
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    pub fn port(&self) -> u16 {
        self.local_addr.port()
    }

    // ─────────────────────────────────────────────────────────────
    // Devices
    // ─────────────────────────────────────────────────────────────

    /// Connect a simulated device; `track-devices` subscribers are notified
    pub fn connect_device(&self, config: DeviceConfig) -> Result<Arc<DeviceState>> {
        if self.ctx.is_shutting_down() {
            return Err(Error::ServerStopped);
        }
        self.ctx.registry().connect(config)
    }

    /// Disconnect a device and end every stream attached to it
    pub fn disconnect_device(&self, serial: &str) -> Option<Arc<DeviceState>> {
        self.ctx.registry().disconnect(serial)
    }

    pub fn device(&self, serial: &str) -> Option<Arc<DeviceState>> {
        self.ctx.registry().get(serial)
    }

    /// Connected devices, ordered by serial
    pub fn devices(&self) -> Vec<Arc<DeviceState>> {
        self.ctx.registry().devices()
    }

    pub fn device_hub(&self) -> &DeviceStateChangeHub {
        self.ctx.registry().hub()
    }

    // ─────────────────────────────────────────────────────────────
    // Features & config
    // ─────────────────────────────────────────────────────────────

    pub fn features(&self) -> Vec<String> {
        self.ctx.features()
    }

    pub fn set_features(&self, features: Vec<String>) {
        self.ctx.set_features(features);
    }

    // ─────────────────────────────────────────────────────────────
    // mDNS
    // ─────────────────────────────────────────────────────────────

    /// List a service under `host:mdns:services`; false if already listed
    pub fn add_mdns_service(&self, service: MdnsService) -> bool {
        self.ctx.add_mdns_service(service)
    }

    pub fn remove_mdns_service(&self, service: &MdnsService) -> bool {
        self.ctx.remove_mdns_service(service)
    }

    /// Copy of the listed services, in the order they were added
    pub fn mdns_services(&self) -> Vec<MdnsService> {
        self.ctx.mdns_services()
    }

    /// Snapshot of features, devices and mDNS services, suitable for [`FakeAdbServerBuilder::with_config`]
    pub fn current_config(&self) -> ServerConfig {
        ServerConfig {
            port: None,
            features: self.features(),
            devices: self.devices().iter().map(|d| d.to_config()).collect(),
            mdns_services: self.mdns_services(),
        }
    }

    // ─────────────────────────────────────────────────────────────
    // Lifecycle
    // ─────────────────────────────────────────────────────────────

    pub fn is_running(&self) -> bool {
        !*self.terminated.borrow()
    }

    /// Stop accepting, end every stream, and wait for all connections to close
    ///
    /// Safe to call more than once.
    pub async fn stop(&self) {
        self.ctx.request_shutdown();
        self.wait_for_termination().await;
    }

    /// Wait until the server has shut down, e.g. after `host:kill`
    pub async fn wait_for_termination(&self) {
        let mut terminated = self.terminated.clone();
        signalled(&mut terminated).await;
    }
}

impl Drop for FakeAdbServer {
    fn drop(&mut self) {
        self.ctx.request_shutdown();
    }
}
