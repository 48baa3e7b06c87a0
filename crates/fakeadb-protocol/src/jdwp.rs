//! JDWP handshake and `track-jdwp` payloads

/// Sent by the debugger and echoed back by the device before any JDWP packet
pub const JDWP_HANDSHAKE: &[u8; 14] = b"JDWP-Handshake";

/// Render a `track-jdwp` payload: every pid followed by a newline
pub fn format_pid_list(pids: impl IntoIterator<Item = u32>) -> String {
    pids.into_iter().map(|pid| format!("{}\n", pid)).collect()
}

/// Parse a `track-jdwp` payload, ignoring anything that is not a pid
pub fn parse_pid_list(payload: &str) -> Vec<u32> {
    payload
        .lines()
        .filter_map(|line| line.trim().parse().ok())
        .collect()
}
