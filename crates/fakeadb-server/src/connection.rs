//! Per-connection state machine
//!
//! ```text
//! AwaitingCommand -> Dispatched -> Terminal
//!        ^               |     \-> Streaming -> Terminal
//!        +--- transport -+
//! ```
//!
//! A `host:transport*` request selects a device and returns to
//! `AwaitingCommand`; every other request ends the connection once its
//! handler returns.

use std::sync::Arc;

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use fakeadb_core::prelude::*;
use fakeadb_protocol::{parse_transport, protocol, Service, TransportRequest};

use crate::context::ServerContext;
use crate::state::DeviceState;

/// Byte stream a connection runs over (a TCP socket, or a duplex in tests)
pub trait AdbStream: AsyncRead + AsyncWrite + Unpin + Send {}

impl<T: AsyncRead + AsyncWrite + Unpin + Send> AdbStream for T {}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    AwaitingCommand,
    Dispatched,
    Streaming,
    Terminal,
}

/// What the dispatcher does once a request has been handled
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Disposition {
    AwaitCommand,
    Close,
}

/// One client connection, as seen by command handlers
pub struct Connection {
    stream: Box<dyn AdbStream>,
    peer: String,
    state: ConnectionState,
    /// Whether any response bytes went out for the current request
    responded: bool,
    selected: Option<Arc<DeviceState>>,
}

impl Connection {
    pub fn new(stream: impl AdbStream + 'static, peer: impl Into<String>) -> Self {
        Self {
            stream: Box::new(stream),
            peer: peer.into(),
            state: ConnectionState::AwaitingCommand,
            responded: false,
            selected: None,
        }
    }

    pub fn peer(&self) -> &str {
        &self.peer
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    pub(crate) fn set_state(&mut self, state: ConnectionState) {
        trace!("{}: {:?} -> {:?}", self.peer, self.state, state);
        self.state = state;
    }

    /// Device chosen by an earlier `host:transport*` request
    pub fn selected_device(&self) -> Option<&Arc<DeviceState>> {
        self.selected.as_ref()
    }

    pub fn has_responded(&self) -> bool {
        self.responded
    }

    pub async fn okay(&mut self) -> Result<()> {
        self.responded = true;
        protocol::write_okay(&mut self.stream).await
    }

    pub async fn okay_with_payload(&mut self, payload: &[u8]) -> Result<()> {
        self.responded = true;
        protocol::write_okay_with_payload(&mut self.stream, payload).await
    }

    pub async fn fail(&mut self, message: &str) -> Result<()> {
        self.responded = true;
        protocol::write_fail(&mut self.stream, message).await
    }

    /// Write a length-prefixed payload after an earlier `OKAY`
    pub async fn write_payload(&mut self, payload: &[u8]) -> Result<()> {
        self.responded = true;
        protocol::write_length_prefixed(&mut self.stream, payload).await
    }

    /// Write bytes with no framing (shell output, JDWP handshake)
    pub async fn write_raw(&mut self, bytes: &[u8]) -> Result<()> {
        self.responded = true;
        self.stream.write_all(bytes).await?;
        self.stream.flush().await?;
        Ok(())
    }

    pub async fn read_exact(&mut self, buf: &mut [u8]) -> Result<()> {
        self.stream.read_exact(buf).await?;
        Ok(())
    }

    /// Discard input until the peer closes its side
    ///
    /// Cancel-safe: dropping the future loses only bytes nobody wanted.
    pub async fn wait_for_peer_close(&mut self) -> Result<()> {
        let mut buf = [0u8; 256];
        loop {
            if self.stream.read(&mut buf).await? == 0 {
                return Ok(());
            }
        }
    }

    /// The raw stream, for handlers that take over the connection
    pub fn stream_mut(&mut self) -> &mut (dyn AdbStream + 'static) {
        self.responded = true;
        self.stream.as_mut()
    }
}

/// Serve requests on `conn` until it reaches a terminal state
pub async fn serve(mut conn: Connection, ctx: Arc<ServerContext>) {
    loop {
        conn.set_state(ConnectionState::AwaitingCommand);
        conn.responded = false;

        let request = match protocol::read_request(&mut conn.stream).await {
            Ok(Some(request)) => request,
            Ok(None) => break,
            Err(e) => {
                warn!("{}: bad request: {}", conn.peer, e);
                let _ = conn.fail(&e.peer_message()).await;
                break;
            }
        };

        debug!("{}: {}", conn.peer, request);
        conn.set_state(ConnectionState::Dispatched);

        match dispatch(&mut conn, &ctx, &request).await {
            Ok(Disposition::AwaitCommand) => continue,
            Ok(Disposition::Close) => break,
            Err(e) => {
                if conn.responded {
                    debug!("{}: '{}' ended: {}", conn.peer, request, e);
                } else {
                    info!("{}: '{}' failed: {}", conn.peer, request, e);
                    let _ = conn.fail(&e.peer_message()).await;
                }
                break;
            }
        }
    }
    conn.set_state(ConnectionState::Terminal);
}

async fn dispatch(conn: &mut Connection, ctx: &ServerContext, request: &str) -> Result<Disposition> {
    let service = Service::parse(request).ok_or_else(|| Error::unknown_service(request))?;

    match service {
        Service::Host { target, command } => {
            if let Some(transport) = parse_transport(&command) {
                return select_transport(conn, ctx, transport).await;
            }

            let (name, args) = command.split_once(':').unwrap_or((command.as_str(), ""));
            let handler = ctx
                .host_handler(name)
                .ok_or_else(|| Error::unknown_service(command.as_str()))?;
            handler.invoke(ctx, conn, &target, args).await?;
            Ok(Disposition::Close)
        }
        Service::Device(service) => {
            let Some(device) = conn.selected.clone() else {
                return reject_transport(conn, Error::NoDeviceSelected).await;
            };
            // the device may have been disconnected since it was selected
            match ctx.registry().get(device.serial()) {
                Some(current) if Arc::ptr_eq(&current, &device) => {}
                _ => return Err(Error::device_not_found(device.serial())),
            }
            if !device.status().is_online() {
                return Err(Error::DeviceOffline {
                    serial: device.serial().to_string(),
                });
            }

            let handler = ctx
                .device_handler(&service)
                .ok_or_else(|| Error::unsupported_device_service(service.as_str()))?;
            handler.invoke(ctx, conn, &device, &service).await?;
            Ok(Disposition::Close)
        }
    }
}

async fn select_transport(
    conn: &mut Connection,
    ctx: &ServerContext,
    transport: TransportRequest,
) -> Result<Disposition> {
    let resolved = match transport {
        TransportRequest::Select(target) => ctx.registry().resolve(&target),
        TransportRequest::Invalid(arg) => Err(Error::device_not_found(arg)),
    };

    match resolved {
        Ok(device) => {
            debug!("{}: transport selected {}", conn.peer, device.serial());
            conn.okay().await?;
            conn.selected = Some(device);
        }
        Err(e) => return reject_transport(conn, e).await,
    }
    Ok(Disposition::AwaitCommand)
}

/// `FAIL` a transport problem the peer can retry on the same connection;
/// anything else goes to the caller and closes it
async fn reject_transport(conn: &mut Connection, e: Error) -> Result<Disposition> {
    if !e.is_recoverable() {
        return Err(e);
    }
    debug!("{}: transport rejected: {}", conn.peer, e);
    conn.fail(&e.peer_message()).await?;
    Ok(Disposition::AwaitCommand)
}
