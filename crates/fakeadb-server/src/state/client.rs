//! Simulated app process on a device

use std::sync::atomic::{AtomicBool, Ordering};

use tokio::io::DuplexStream;
use tokio::sync::{mpsc, Mutex};

use fakeadb_core::prelude::*;
use fakeadb_core::ClientConfig;

/// A running client (app process) that debuggers can attach to via `jdwp:<pid>`
pub struct ClientState {
    pid: u32,
    uid: u32,
    package_name: String,
    process_name: String,
    debuggable: bool,
    debugger_attached: AtomicBool,
    /// Test-driver ends of JDWP sessions, one per accepted debugger
    session_tx: mpsc::UnboundedSender<DuplexStream>,
    session_rx: Mutex<mpsc::UnboundedReceiver<DuplexStream>>,
}

impl ClientState {
    pub fn new(config: ClientConfig) -> Self {
        let process_name = if config.process_name.is_empty() {
            config.package_name.clone()
        } else {
            config.process_name
        };
        let (session_tx, session_rx) = mpsc::unbounded_channel();
        Self {
            pid: config.pid,
            uid: config.uid,
            package_name: config.package_name,
            process_name,
            debuggable: config.debuggable,
            debugger_attached: AtomicBool::new(false),
            session_tx,
            session_rx: Mutex::new(session_rx),
        }
    }

    pub fn pid(&self) -> u32 {
        self.pid
    }

    pub fn uid(&self) -> u32 {
        self.uid
    }

    pub fn package_name(&self) -> &str {
        &self.package_name
    }

    pub fn process_name(&self) -> &str {
        &self.process_name
    }

    pub fn is_debuggable(&self) -> bool {
        self.debuggable
    }

    pub fn is_debugger_attached(&self) -> bool {
        self.debugger_attached.load(Ordering::SeqCst)
    }

    /// Mark a debugger as attached; only one may be attached at a time
    pub(crate) fn attach_debugger(&self) -> Result<()> {
        self.debugger_attached
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .map(|_| ())
            .map_err(|_| Error::DebuggerAttached { pid: self.pid })
    }

    /// Clear the attached flag and drop any session the driver never claimed
    pub(crate) fn detach_debugger(&self) {
        // a driver blocked in `next_debugger_session` holds the lock, and then
        // the channel is already empty
        if let Ok(mut sessions) = self.session_rx.try_lock() {
            while sessions.try_recv().is_ok() {}
        }
        self.debugger_attached.store(false, Ordering::SeqCst);
        debug!("debugger detached from pid {}", self.pid);
    }

    /// Hand the driver-side end of a fresh JDWP session to the test driver
    pub(crate) fn offer_session(&self, peer: DuplexStream) {
        // The receiver lives as long as `self`, so this only fails during teardown
        let _ = self.session_tx.send(peer);
    }

    /// Wait for the next debugger to complete the JDWP handshake
    ///
    /// The returned stream carries the raw bytes the debugger sends after
    /// the handshake; anything written to it is relayed back to the debugger.
    pub async fn next_debugger_session(&self) -> Option<DuplexStream> {
        self.session_rx.lock().await.recv().await
    }

    pub fn to_config(&self) -> ClientConfig {
        ClientConfig {
            pid: self.pid,
            uid: self.uid,
            package_name: self.package_name.clone(),
            process_name: self.process_name.clone(),
            debuggable: self.debuggable,
        }
    }
}

impl std::fmt::Debug for ClientState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClientState")
            .field("pid", &self.pid)
            .field("package_name", &self.package_name)
            .field("debuggable", &self.debuggable)
            .field("debugger_attached", &self.is_debugger_attached())
            .finish()
    }
}
