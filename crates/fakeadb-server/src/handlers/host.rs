//! One-shot host services

use futures_util::future::BoxFuture;

use fakeadb_core::prelude::*;
use fakeadb_protocol::{format_device_list, version_payload, Target};

use super::HostCommandHandler;
use crate::connection::Connection;
use crate::context::ServerContext;

/// `host:version`
pub struct Version;

impl HostCommandHandler for Version {
    fn invoke<'a>(
        &'a self,
        _ctx: &'a ServerContext,
        conn: &'a mut Connection,
        _target: &'a Target,
        _args: &'a str,
    ) -> BoxFuture<'a, Result<()>> {
        Box::pin(async move { conn.okay_with_payload(version_payload().as_bytes()).await })
    }
}

/// `host:kill`: acknowledge, then shut the server down
pub struct Kill;

impl HostCommandHandler for Kill {
    fn invoke<'a>(
        &'a self,
        ctx: &'a ServerContext,
        conn: &'a mut Connection,
        _target: &'a Target,
        _args: &'a str,
    ) -> BoxFuture<'a, Result<()>> {
        Box::pin(async move {
            conn.okay().await?;
            info!("{}: host:kill received", conn.peer());
            ctx.request_shutdown();
            Ok(())
        })
    }
}

/// `host:devices` and `host:devices-l`
pub struct ListDevices {
    pub long: bool,
}

impl HostCommandHandler for ListDevices {
    fn invoke<'a>(
        &'a self,
        ctx: &'a ServerContext,
        conn: &'a mut Connection,
        _target: &'a Target,
        _args: &'a str,
    ) -> BoxFuture<'a, Result<()>> {
        Box::pin(async move {
            let list = format_device_list(&ctx.registry().list_entries(), self.long);
            conn.okay_with_payload(list.as_bytes()).await
        })
    }
}

/// `features` and `host-features`: the server's feature list
pub struct Features;

impl HostCommandHandler for Features {
    fn invoke<'a>(
        &'a self,
        ctx: &'a ServerContext,
        conn: &'a mut Connection,
        _target: &'a Target,
        _args: &'a str,
    ) -> BoxFuture<'a, Result<()>> {
        Box::pin(async move {
            let features = ctx.features().join(",");
            conn.okay_with_payload(features.as_bytes()).await
        })
    }
}

/// `<prefix>:get-state`
pub struct GetState;

impl HostCommandHandler for GetState {
    fn invoke<'a>(
        &'a self,
        ctx: &'a ServerContext,
        conn: &'a mut Connection,
        target: &'a Target,
        _args: &'a str,
    ) -> BoxFuture<'a, Result<()>> {
        Box::pin(async move {
            let device = ctx.registry().resolve(target)?;
            conn.okay_with_payload(device.status().as_str().as_bytes()).await
        })
    }
}

/// `<prefix>:get-serialno`
pub struct GetSerialNo;

impl HostCommandHandler for GetSerialNo {
    fn invoke<'a>(
        &'a self,
        ctx: &'a ServerContext,
        conn: &'a mut Connection,
        target: &'a Target,
        _args: &'a str,
    ) -> BoxFuture<'a, Result<()>> {
        Box::pin(async move {
            let device = ctx.registry().resolve(target)?;
            conn.okay_with_payload(device.serial().as_bytes()).await
        })
    }
}

/// `<prefix>:get-devpath`
pub struct GetDevPath;

impl HostCommandHandler for GetDevPath {
    fn invoke<'a>(
        &'a self,
        ctx: &'a ServerContext,
        conn: &'a mut Connection,
        target: &'a Target,
        _args: &'a str,
    ) -> BoxFuture<'a, Result<()>> {
        Box::pin(async move {
            let device = ctx.registry().resolve(target)?;
            conn.okay_with_payload(device.devpath().as_bytes()).await
        })
    }
}

/// `host:mdns:check` and `host:mdns:services`
pub struct Mdns;

const MDNS_DAEMON_VERSION: &str = "mdns daemon version [fakeadb]";

impl HostCommandHandler for Mdns {
    fn invoke<'a>(
        &'a self,
        ctx: &'a ServerContext,
        conn: &'a mut Connection,
        _target: &'a Target,
        args: &'a str,
    ) -> BoxFuture<'a, Result<()>> {
        Box::pin(async move {
            match args {
                "check" => conn.okay_with_payload(MDNS_DAEMON_VERSION.as_bytes()).await,
                "services" => {
                    let listing: String = ctx
                        .mdns_services()
                        .iter()
                        .map(|s| {
                            format!("{}\t{}\t{}\n", s.instance_name, s.service_name, s.address)
                        })
                        .collect();
                    conn.okay_with_payload(listing.as_bytes()).await
                }
                other => Err(Error::unknown_service(format!("mdns:{}", other))),
            }
        })
    }
}

/// `<prefix>:forward:[norebind:]<local>;<remote>`
pub struct Forward;

impl HostCommandHandler for Forward {
    fn invoke<'a>(
        &'a self,
        ctx: &'a ServerContext,
        conn: &'a mut Connection,
        target: &'a Target,
        args: &'a str,
    ) -> BoxFuture<'a, Result<()>> {
        Box::pin(async move {
            let (norebind, spec) = match args.strip_prefix("norebind:") {
                Some(spec) => (true, spec),
                None => (false, args),
            };
            let (local, remote) = spec
                .split_once(';')
                .filter(|(local, remote)| !local.is_empty() && !remote.is_empty())
                .ok_or_else(|| Error::protocol(format!("malformed forward '{}'", spec)))?;

            let device = ctx.registry().resolve(target)?;
            device.add_forward(local, remote, norebind)?;
            debug!("{}: forward {} -> {}", device.serial(), local, remote);

            // one OKAY for the host, one once the listener is set up
            conn.okay().await?;
            conn.okay().await
        })
    }
}

/// `<prefix>:killforward:<local>`
pub struct KillForward;

impl HostCommandHandler for KillForward {
    fn invoke<'a>(
        &'a self,
        ctx: &'a ServerContext,
        conn: &'a mut Connection,
        target: &'a Target,
        args: &'a str,
    ) -> BoxFuture<'a, Result<()>> {
        Box::pin(async move {
            let device = ctx.registry().resolve(target)?;
            device.remove_forward(args)?;
            conn.okay().await
        })
    }
}

/// `<prefix>:killforward-all`
///
/// With a plain `host:` prefix every device's forwards are removed.
pub struct KillForwardAll;

impl HostCommandHandler for KillForwardAll {
    fn invoke<'a>(
        &'a self,
        ctx: &'a ServerContext,
        conn: &'a mut Connection,
        target: &'a Target,
        _args: &'a str,
    ) -> BoxFuture<'a, Result<()>> {
        Box::pin(async move {
            match target {
                Target::Any => {
                    for device in ctx.registry().devices() {
                        device.remove_all_forwards();
                    }
                }
                other => ctx.registry().resolve(other)?.remove_all_forwards(),
            }
            conn.okay().await
        })
    }
}

/// `host:list-forward`: `serial local remote` per forward, all devices
pub struct ListForward;

impl HostCommandHandler for ListForward {
    fn invoke<'a>(
        &'a self,
        ctx: &'a ServerContext,
        conn: &'a mut Connection,
        _target: &'a Target,
        _args: &'a str,
    ) -> BoxFuture<'a, Result<()>> {
        Box::pin(async move {
            let mut listing = String::new();
            for device in ctx.registry().devices() {
                for forward in device.forwards() {
                    listing.push_str(&format!(
                        "{} {} {}\n",
                        device.serial(),
                        forward.local,
                        forward.remote
                    ));
                }
            }
            conn.okay_with_payload(listing.as_bytes()).await
        })
    }
}
