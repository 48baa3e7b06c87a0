//! Service-string parsing
//!
//! Splits a raw request such as `host-serial:127.0.0.1:5555:get-state` into
//! the device it targets and the command to run.

/// Which device a host request, or a transport selection, refers to
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Target {
    /// `host:` prefix; exactly one device must be connected when one is needed
    Any,
    /// `host-serial:<serial>:`
    Serial(String),
    /// `host-transport-id:<id>:`
    TransportId(u64),
    /// `host-usb:`
    Usb,
    /// `host-local:`
    Local,
}

/// A request the server routes to either the host or the selected device
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Service {
    /// Host service: the target prefix plus the command after it
    Host { target: Target, command: String },
    /// Anything without a host prefix; only valid once a transport is selected
    Device(String),
}

impl Service {
    /// Parse a service string read off the wire
    ///
    /// Host services whose target prefix is malformed (a `host-transport-id:`
    /// that is not a number, a serial with no command after it) come back as
    /// `None`.
    pub fn parse(service: &str) -> Option<Service> {
        if let Some(command) = service.strip_prefix("host:") {
            return Some(Service::host(Target::Any, command));
        }
        if let Some(rest) = service.strip_prefix("host-serial:") {
            let (serial, command) = split_serial(rest)?;
            return Some(Service::host(Target::Serial(serial.to_string()), command));
        }
        if let Some(rest) = service.strip_prefix("host-transport-id:") {
            let (id, command) = rest.split_once(':')?;
            let id = id.parse().ok()?;
            return Some(Service::host(Target::TransportId(id), command));
        }
        if let Some(command) = service.strip_prefix("host-usb:") {
            return Some(Service::host(Target::Usb, command));
        }
        if let Some(command) = service.strip_prefix("host-local:") {
            return Some(Service::host(Target::Local, command));
        }
        Some(Service::Device(service.to_string()))
    }

    fn host(target: Target, command: &str) -> Service {
        Service::Host {
            target,
            command: command.to_string(),
        }
    }
}

/// Parse the command part of a `host:transport*` request
///
/// Accepts `transport:<serial>`, `transport-<serial>`, `transport-id:<n>`,
/// `transport-any`, `transport-usb` and `transport-local`. Returns `None` if
/// the command is not a transport selection at all.
pub fn parse_transport(command: &str) -> Option<TransportRequest> {
    let rest = command.strip_prefix("transport")?;
    let selection = match rest {
        "-any" => TransportRequest::Select(Target::Any),
        "-usb" => TransportRequest::Select(Target::Usb),
        "-local" => TransportRequest::Select(Target::Local),
        _ => {
            if let Some(id) = rest.strip_prefix("-id:") {
                match id.parse() {
                    Ok(id) => TransportRequest::Select(Target::TransportId(id)),
                    Err(_) => TransportRequest::Invalid(id.to_string()),
                }
            } else if let Some(serial) = rest
                .strip_prefix(':')
                .or_else(|| rest.strip_prefix('-'))
            {
                if serial.is_empty() {
                    TransportRequest::Invalid(String::new())
                } else {
                    TransportRequest::Select(Target::Serial(serial.to_string()))
                }
            } else {
                return None;
            }
        }
    };
    Some(selection)
}

/// Outcome of parsing a transport selection
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportRequest {
    Select(Target),
    /// Recognized as a transport request but its argument is unusable
    Invalid(String),
}

/// Split `<serial>:<command>` where the serial may itself contain colons
///
/// Handles `tcp:`/`udp:`/`vsock:` schemes, bracketed IPv6 hosts and a
/// trailing `:<port>`, so `127.0.0.1:5555:features` splits after the port.
pub fn split_serial(s: &str) -> Option<(&str, &str)> {
    let mut start = 0;
    for scheme in ["tcp:", "udp:", "vsock:"] {
        if s.starts_with(scheme) {
            start = scheme.len();
            break;
        }
    }

    let search_from = if s[start..].starts_with('[') {
        start + s[start..].find(']')?
    } else {
        start
    };

    let colon = search_from + s[search_from..].find(':')?;
    let after = &s[colon + 1..];
    let digits = after.bytes().take_while(|b| b.is_ascii_digit()).count();
    if digits > 0 && after[digits..].starts_with(':') {
        let end = colon + 1 + digits;
        return Some((&s[..end], &s[end + 1..]));
    }

    if colon == 0 {
        return None;
    }
    Some((&s[..colon], after))
}
