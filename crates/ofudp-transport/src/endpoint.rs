use std::net::{SocketAddr, ToSocketAddrs};

use tracing::debug;

use crate::error::{Result, TransportError};

/// IANA-assigned OpenFlow controller port.
pub const OFP_DEFAULT_PORT: u16 = 6653;

const SCHEME_PREFIX: &str = "udp:";

/// Resolve an active endpoint name to the peer's socket address.
///
/// Accepted forms:
/// - `udp:<host>:<port>` or `<host>:<port>`
/// - `udp:<host>` or `<host>` (uses `default_port`)
/// - `[<ipv6>]:<port>` or a bare IPv6 literal
///
/// The first resolved address wins.
pub fn parse_active_endpoint(input: &str, default_port: u16) -> Result<SocketAddr> {
    let suffix = input.strip_prefix(SCHEME_PREFIX).unwrap_or(input).trim();
    if suffix.is_empty() {
        return Err(resolve_error(input, "missing host"));
    }

    let (host, port) = split_host_port(input, suffix, default_port)?;

    let mut addrs = (host, port)
        .to_socket_addrs()
        .map_err(|err| resolve_error(input, &err.to_string()))?;
    let addr = addrs
        .next()
        .ok_or_else(|| resolve_error(input, "no addresses found"))?;

    debug!(endpoint = input, %addr, "resolved endpoint");
    Ok(addr)
}

fn split_host_port<'a>(input: &str, suffix: &'a str, default_port: u16) -> Result<(&'a str, u16)> {
    if let Some(rest) = suffix.strip_prefix('[') {
        let (host, tail) = rest
            .split_once(']')
            .ok_or_else(|| resolve_error(input, "unterminated '[' in IPv6 address"))?;
        let port = match tail.strip_prefix(':') {
            Some(port) => parse_port(input, port)?,
            None if tail.is_empty() => default_port,
            None => return Err(resolve_error(input, "unexpected text after IPv6 address")),
        };
        return Ok((host, port));
    }

    // More than one ':' without brackets can only be a bare IPv6 literal.
    if suffix.matches(':').count() > 1 {
        return Ok((suffix, default_port));
    }

    match suffix.split_once(':') {
        Some((host, port)) if !host.is_empty() => Ok((host, parse_port(input, port)?)),
        Some(_) => Err(resolve_error(input, "missing host")),
        None => Ok((suffix, default_port)),
    }
}

fn parse_port(input: &str, port: &str) -> Result<u16> {
    port.parse::<u16>()
        .map_err(|_| resolve_error(input, &format!("invalid port {port:?}")))
}

fn resolve_error(input: &str, reason: &str) -> TransportError {
    TransportError::Resolve {
        endpoint: input.to_string(),
        reason: reason.to_string(),
    }
}
