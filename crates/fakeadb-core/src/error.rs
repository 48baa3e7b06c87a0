//! Error types for the fake ADB server

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias using our Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Server error types organized by layer
#[derive(Debug, Error)]
pub enum Error {
    // ─────────────────────────────────────────────────────────────
    // Common/Infrastructure Errors
    // ─────────────────────────────────────────────────────────────
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    // ─────────────────────────────────────────────────────────────
    // Wire Protocol Errors
    // ─────────────────────────────────────────────────────────────
    #[error("Protocol error: {message}")]
    Protocol { message: String },

    #[error("Unknown service: {service}")]
    UnknownService { service: String },

    #[error("unsupported device service: {service}")]
    UnsupportedDeviceService { service: String },

    // ─────────────────────────────────────────────────────────────
    // Device Registry Errors
    // ─────────────────────────────────────────────────────────────
    #[error("device '{serial}' not found")]
    DeviceNotFound { serial: String },

    #[error("no devices/emulators found")]
    NoDevices,

    #[error("more than one device/emulator")]
    MultipleDevices,

    #[error("device '{serial}' is already connected")]
    DuplicateDevice { serial: String },

    #[error("device offline")]
    DeviceOffline { serial: String },

    #[error("no device selected")]
    NoDeviceSelected,

    #[error("cannot rebind existing socket")]
    ForwardExists { local: String },

    #[error("listener '{local}' not found")]
    ForwardNotFound { local: String },

    #[error("No client exists for pid: {pid}")]
    ClientNotFound { pid: u32 },

    #[error("Client {pid} is already attached to a debugger")]
    DebuggerAttached { pid: u32 },

    // ─────────────────────────────────────────────────────────────
    // Lifecycle Errors
    // ─────────────────────────────────────────────────────────────
    #[error("server is shutting down")]
    ServerStopped,

    // ─────────────────────────────────────────────────────────────
    // Configuration Errors
    // ─────────────────────────────────────────────────────────────
    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error("Configuration file not found: {path}")]
    ConfigNotFound { path: PathBuf },
}

// ─────────────────────────────────────────────────────────────────
// Convenience Constructors
// ─────────────────────────────────────────────────────────────────

impl Error {
    pub fn protocol(message: impl Into<String>) -> Self {
        Self::Protocol {
            message: message.into(),
        }
    }

    pub fn unknown_service(service: impl Into<String>) -> Self {
        Self::UnknownService {
            service: service.into(),
        }
    }

    pub fn device_not_found(serial: impl Into<String>) -> Self {
        Self::DeviceNotFound {
            serial: serial.into(),
        }
    }

    pub fn duplicate_device(serial: impl Into<String>) -> Self {
        Self::DuplicateDevice {
            serial: serial.into(),
        }
    }

    pub fn unsupported_device_service(service: impl Into<String>) -> Self {
        Self::UnsupportedDeviceService {
            service: service.into(),
        }
    }

    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Message written to the peer in a `FAIL` response.
    ///
    /// Registry errors already read like adb's own messages, so they are sent
    /// verbatim. Everything else keeps its display form.
    pub fn peer_message(&self) -> String {
        match self {
            Error::UnknownService { service } => format!("unknown host service: {}", service),
            other => other.to_string(),
        }
    }

    /// Transport selection errors: the peer may pick another device on the
    /// same connection after the `FAIL`
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Error::DeviceNotFound { .. }
                | Error::NoDevices
                | Error::MultipleDevices
                | Error::NoDeviceSelected
        )
    }

    /// Check if this error should stop the whole server
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Error::Config { .. } | Error::ConfigNotFound { .. }
        )
    }
}

// ─────────────────────────────────────────────────────────────────
// Error Context Extensions
// ─────────────────────────────────────────────────────────────────

/// Extension trait for adding context to Results
pub trait ResultExt<T> {
    /// Add context to an error
    fn context(self, context: impl Into<String>) -> Result<T>;

    /// Add context with a closure (lazy evaluation)
    fn with_context<F>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> String;
}

impl<T, E: Into<Error>> ResultExt<T> for std::result::Result<T, E> {
    fn context(self, context: impl Into<String>) -> Result<T> {
        self.map_err(|e| {
            let err = e.into();
            tracing::error!("{}: {:?}", context.into(), err);
            err
        })
    }

    fn with_context<F>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> String,
    {
        self.map_err(|e| {
            let err = e.into();
            tracing::error!("{}: {:?}", f(), err);
            err
        })
    }
}
