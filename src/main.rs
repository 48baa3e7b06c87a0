//! fakeadb - A fake ADB server for integration tests
//!
//! Listens on the adb host port and answers host services from simulated
//! devices described in a TOML config file.

use std::io::{self, Write};
use std::path::PathBuf;

use clap::Parser;
use serde::Serialize;
use tracing::{error, info};

use fakeadb_core::logging;
use fakeadb_server::{load_config, FakeAdbServer, ServerConfig, DEFAULT_ADB_PORT};

/// fakeadb - A fake ADB server for integration tests
#[derive(Parser, Debug)]
#[command(name = "fakeadb")]
#[command(about = "A protocol-level fake ADB server", long_about = None)]
struct Args {
    /// Port to listen on [default: the config file's port, else 5037]
    #[arg(long)]
    port: Option<u16>,

    /// TOML file with features and devices to start with
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Write rolling log files here instead of logging to stderr
    #[arg(long, value_name = "DIR")]
    log_dir: Option<PathBuf>,

    /// Print status events as JSON lines
    #[arg(long)]
    json: bool,
}

/// Status lines printed on stdout
#[derive(Debug, Serialize)]
#[serde(tag = "event")]
enum StatusEvent {
    #[serde(rename = "server.started")]
    Started { port: u16 },
    #[serde(rename = "server.stopped")]
    Stopped,
}

impl StatusEvent {
    fn emit(&self, json: bool) {
        let line = if json {
            match serde_json::to_string(self) {
                Ok(line) => line,
                Err(e) => {
                    error!("Failed to serialize status event: {}", e);
                    return;
                }
            }
        } else {
            match self {
                Self::Started { port } => format!("fakeadb listening on 127.0.0.1:{}", port),
                Self::Stopped => "fakeadb stopped".to_string(),
            }
        };

        let mut stdout = io::stdout().lock();
        if let Err(e) = writeln!(stdout, "{}", line).and_then(|_| stdout.flush()) {
            error!("Failed to write status event: {}", e);
        }
    }
}

#[tokio::main]
async fn main() -> color_eyre::Result<()> {
    color_eyre::install()?;
    let args = Args::parse();

    match &args.log_dir {
        Some(dir) => logging::init(Some(dir.as_path()))?,
        None => logging::init_stderr(),
    }

    let config = match &args.config {
        Some(path) => load_config(path)?,
        None => ServerConfig::default(),
    };
    let port = args.port.or(config.port).unwrap_or(DEFAULT_ADB_PORT);

    let server = FakeAdbServer::builder()
        .install_default_handlers()
        .with_config(config)
        .port(port)
        .start()
        .await?;
    StatusEvent::Started {
        port: server.port(),
    }
    .emit(args.json);

    tokio::select! {
        result = wait_for_signal() => {
            result?;
            info!("Shutdown signal received");
            server.stop().await;
        }
        _ = server.wait_for_termination() => {
            info!("Server terminated by host:kill");
        }
    }

    StatusEvent::Stopped.emit(args.json);
    Ok(())
}

/// Wait for a termination signal
async fn wait_for_signal() -> io::Result<()> {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};

        let mut sigint = signal(SignalKind::interrupt())?;
        let mut sigterm = signal(SignalKind::terminate())?;
        tokio::select! {
            _ = sigint.recv() => info!("Received SIGINT"),
            _ = sigterm.recv() => info!("Received SIGTERM"),
        }
        Ok(())
    }

    #[cfg(windows)]
    {
        tokio::signal::ctrl_c().await?;
        info!("Received Ctrl+C");
        Ok(())
    }
}
