//! `jdwp:<pid>`: attach a debugger to a client process
//!
//! After `OKAY` the debugger sends the 14-byte `JDWP-Handshake`, which is
//! echoed back. From then on bytes are relayed verbatim between the socket
//! and an in-memory peer the test driver picks up with
//! [`ClientState::next_debugger_session`](crate::state::ClientState::next_debugger_session).

use std::sync::Arc;

use futures_util::future::BoxFuture;
use tokio::io;

use fakeadb_core::prelude::*;
use fakeadb_protocol::JDWP_HANDSHAKE;

use super::DeviceCommandHandler;
use crate::connection::{Connection, ConnectionState};
use crate::context::ServerContext;
use crate::state::DeviceState;

const RELAY_BUFFER: usize = 64 * 1024;

pub struct Jdwp;

impl DeviceCommandHandler for Jdwp {
    fn matches(&self, service: &str) -> bool {
        service.starts_with("jdwp:")
    }

    fn invoke<'a>(
        &'a self,
        _ctx: &'a ServerContext,
        conn: &'a mut Connection,
        device: &'a Arc<DeviceState>,
        service: &'a str,
    ) -> BoxFuture<'a, Result<()>> {
        Box::pin(async move {
            let arg = service.trim_start_matches("jdwp:");
            let pid: u32 = arg
                .parse()
                .map_err(|_| Error::protocol(format!("invalid pid '{}'", arg)))?;
            let client = device
                .client(pid)
                .ok_or(Error::ClientNotFound { pid })?;
            client.attach_debugger()?;

            let result = relay(conn, device, pid, |peer| client.offer_session(peer)).await;
            client.detach_debugger();
            result
        })
    }
}

async fn relay(
    conn: &mut Connection,
    device: &DeviceState,
    pid: u32,
    offer: impl FnOnce(io::DuplexStream),
) -> Result<()> {
    conn.okay().await?;

    let mut handshake = [0u8; 14];
    conn.read_exact(&mut handshake).await?;
    if &handshake != JDWP_HANDSHAKE {
        return Err(Error::protocol(format!(
            "bad JDWP handshake {:?}",
            String::from_utf8_lossy(&handshake)
        )));
    }
    conn.write_raw(JDWP_HANDSHAKE).await?;
    info!("{}: debugger attached to {} pid {}", conn.peer(), device.serial(), pid);

    let (local, peer) = io::duplex(RELAY_BUFFER);
    offer(peer);

    conn.set_state(ConnectionState::Streaming);
    let (mut debugger_rd, mut debugger_wr) = io::split(conn.stream_mut());
    let (mut local_rd, mut local_wr) = io::split(local);
    // whichever side closes first ends the session; dropping `local` hands
    // EOF to the driver, returning closes the debugger socket
    tokio::select! {
        up = io::copy(&mut debugger_rd, &mut local_wr) => {
            debug!("jdwp relay for pid {}: debugger closed after {} bytes", pid, up?);
        }
        down = io::copy(&mut local_rd, &mut debugger_wr) => {
            debug!("jdwp relay for pid {}: session closed after {} bytes", pid, down?);
        }
    }
    Ok(())
}
