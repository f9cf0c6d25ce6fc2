//! Monitor string parsing
//!
//! Monitors arrive as `protocol://ip:port` strings, either from the upstream
//! monitor list or from the static bootstrap configuration.

use crate::error::{AgentError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::net::{Ipv4Addr, SocketAddr, SocketAddrV4};
use std::str::FromStr;

/// An IPv4 address and port pair
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Endpoint {
    pub ip: Ipv4Addr,
    pub port: u16,
}

impl Endpoint {
    pub fn new(ip: Ipv4Addr, port: u16) -> Self {
        Self { ip, port }
    }

    pub fn socket_addr(&self) -> SocketAddr {
        SocketAddr::V4(SocketAddrV4::new(self.ip, self.port))
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.ip, self.port)
    }
}

impl FromStr for Endpoint {
    type Err = AgentError;

    fn from_str(s: &str) -> Result<Self> {
        parse_endpoint(s)
    }
}

/// One parsed monitor: the protocol tag selects the probe provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MonitorSpec {
    pub protocol: String,
    pub endpoint: Endpoint,
    raw: String,
}

impl MonitorSpec {
    /// The monitor string as received, used as its identity in logs.
    pub fn raw(&self) -> &str {
        &self.raw
    }
}

impl fmt::Display for MonitorSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

impl FromStr for MonitorSpec {
    type Err = AgentError;

    fn from_str(s: &str) -> Result<Self> {
        let (protocol, endpoint) = parse_protocol_endpoint(s)?;
        Ok(Self {
            protocol,
            endpoint,
            raw: s.to_string(),
        })
    }
}

/// Parses `protocol://ip:port` into its protocol tag and endpoint.
pub fn parse_protocol_endpoint(s: &str) -> Result<(String, Endpoint)> {
    let parts: Vec<&str> = s.split("://").collect();
    let [protocol, rest] = parts.as_slice() else {
        return Err(AgentError::MalformedMonitor {
            input: s.to_string(),
            reason: "expected format protocol://ip:port".to_string(),
        });
    };

    let endpoint = parse_endpoint(rest)?;
    Ok((protocol.to_string(), endpoint))
}

/// Parses `ip:port` where ip is IPv4 and port fits in 16 bits.
pub fn parse_endpoint(s: &str) -> Result<Endpoint> {
    let malformed = |reason: String| AgentError::MalformedEndpoint {
        input: s.to_string(),
        reason,
    };

    let parts: Vec<&str> = s.split(':').collect();
    let [ip, port] = parts.as_slice() else {
        return Err(malformed("expected ip:port".to_string()));
    };

    let ip = ip
        .parse::<Ipv4Addr>()
        .map_err(|err| malformed(format!("couldn't parse ip `{ip}`: {err}")))?;
    let port = port
        .parse::<u16>()
        .map_err(|err| malformed(format!("couldn't parse port `{port}`: {err}")))?;

    Ok(Endpoint::new(ip, port))
}
