//! `shell:` / `exec:` commands with raw (unframed) output

use std::sync::Arc;

use futures_util::future::BoxFuture;

use fakeadb_core::prelude::*;

use super::{stream_client_events, ClientStateHandler, Continuation, DeviceCommandHandler};
use crate::connection::Connection;
use crate::context::ServerContext;
use crate::state::DeviceState;

/// Arguments of `shell:<program> ...` or `exec:<program> ...`
fn command_args<'s>(service: &'s str, program: &str) -> Option<&'s str> {
    let command = service
        .strip_prefix("shell:")
        .or_else(|| service.strip_prefix("exec:"))?;
    let rest = command.trim_start().strip_prefix(program)?;
    if rest.is_empty() || rest.starts_with(char::is_whitespace) {
        Some(rest.trim())
    } else {
        None
    }
}

fn with_newline(line: &str) -> String {
    if line.ends_with('\n') {
        line.to_string()
    } else {
        format!("{}\n", line)
    }
}

/// `logcat`: dump the history, then stream new messages until the peer
/// disconnects. `logcat -d` dumps and exits.
pub struct Logcat;

struct LogcatWriter;

impl ClientStateHandler for LogcatWriter {
    async fn on_client_list_changed(&mut self, _conn: &mut Connection) -> Result<Continuation> {
        Ok(Continuation::Continue)
    }

    async fn on_logcat_message(
        &mut self,
        conn: &mut Connection,
        message: &str,
    ) -> Result<Continuation> {
        conn.write_raw(with_newline(message).as_bytes()).await?;
        Ok(Continuation::Continue)
    }
}

impl DeviceCommandHandler for Logcat {
    fn matches(&self, service: &str) -> bool {
        command_args(service, "logcat").is_some()
    }

    fn invoke<'a>(
        &'a self,
        _ctx: &'a ServerContext,
        conn: &'a mut Connection,
        device: &'a Arc<DeviceState>,
        service: &'a str,
    ) -> BoxFuture<'a, Result<()>> {
        Box::pin(async move {
            let args = command_args(service, "logcat").unwrap_or_default();
            let dump_only = args.split_whitespace().any(|arg| arg == "-d");

            let (history, queue) = device.subscribe_logcat().ok_or(Error::ServerStopped)?;
            conn.okay().await?;
            let backlog: String = history.iter().map(|line| with_newline(line)).collect();
            if !backlog.is_empty() {
                conn.write_raw(backlog.as_bytes()).await?;
            }
            if dump_only {
                return Ok(());
            }
            stream_client_events(conn, queue, &mut LogcatWriter).await
        })
    }
}

/// `getprop` (all properties) and `getprop <name>`
pub struct GetProp;

impl DeviceCommandHandler for GetProp {
    fn matches(&self, service: &str) -> bool {
        command_args(service, "getprop").is_some()
    }

    fn invoke<'a>(
        &'a self,
        _ctx: &'a ServerContext,
        conn: &'a mut Connection,
        device: &'a Arc<DeviceState>,
        service: &'a str,
    ) -> BoxFuture<'a, Result<()>> {
        Box::pin(async move {
            let name = command_args(service, "getprop").unwrap_or_default();
            let output: String = if name.is_empty() {
                device
                    .properties()
                    .iter()
                    .map(|(key, value)| format!("[{}]: [{}]\n", key, value))
                    .collect()
            } else {
                // unknown properties print an empty line, like the real getprop
                format!("{}\n", device.property(name).unwrap_or_default())
            };
            conn.okay().await?;
            conn.write_raw(output.as_bytes()).await
        })
    }
}

/// `setprop <name> <value>`
pub struct SetProp;

impl DeviceCommandHandler for SetProp {
    fn matches(&self, service: &str) -> bool {
        command_args(service, "setprop").is_some()
    }

    fn invoke<'a>(
        &'a self,
        _ctx: &'a ServerContext,
        conn: &'a mut Connection,
        device: &'a Arc<DeviceState>,
        service: &'a str,
    ) -> BoxFuture<'a, Result<()>> {
        Box::pin(async move {
            let args = command_args(service, "setprop").unwrap_or_default();
            let (name, value) = args
                .split_once(char::is_whitespace)
                .map(|(name, value)| (name, value.trim()))
                .filter(|(name, _)| !name.is_empty())
                .ok_or_else(|| Error::protocol("usage: setprop NAME VALUE"))?;
            device.set_property(name, value);
            debug!("{}: setprop {}={}", device.serial(), name, value);
            conn.okay().await
        })
    }
}

/// `echo <text>`
pub struct Echo;

impl DeviceCommandHandler for Echo {
    fn matches(&self, service: &str) -> bool {
        command_args(service, "echo").is_some()
    }

    fn invoke<'a>(
        &'a self,
        _ctx: &'a ServerContext,
        conn: &'a mut Connection,
        _device: &'a Arc<DeviceState>,
        service: &'a str,
    ) -> BoxFuture<'a, Result<()>> {
        Box::pin(async move {
            let text = command_args(service, "echo").unwrap_or_default();
            conn.okay().await?;
            conn.write_raw(format!("{}\n", text).as_bytes()).await
        })
    }
}
