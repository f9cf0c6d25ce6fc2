//! # Healthagent Core
//!
//! Core types and traits shared by the healthagent service and its probe
//! providers.
//!
//! ## What lives here
//! - Monitor string parsing (`protocol://ip:port`) into typed endpoints
//! - Health observations and the index-aligned status table
//! - The probe capability trait and the protocol registry
//! - The error type used across the workspace

pub mod endpoint;
pub mod error;
pub mod probe;
pub mod status;

pub use endpoint::{parse_endpoint, parse_protocol_endpoint, Endpoint, MonitorSpec};
pub use error::{AgentError, Result};
pub use probe::{
    ProbeProvider, ProbeSettings, ProviderRegistry, StatusStream, MIN_PROBE_INTERVAL, PROBE_TIMEOUT,
    STALE_THRESHOLD,
};
pub use status::{HealthStatus, StatusTable, RESERVED_KEYS};

/// Current healthagent version for compatibility checks
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Build information for logs and debugging
pub const BUILD_INFO: &str = concat!(
    "Healthagent ",
    env!("CARGO_PKG_VERSION"),
    " (",
    env!("CARGO_PKG_NAME"),
    ")"
);

/// HTTP headers exchanged with upstream collectors
pub mod headers {
    /// Identifies the agent on every upstream request.
    pub const AGENT_NAME: &str = "X-Agent-Name";
}
