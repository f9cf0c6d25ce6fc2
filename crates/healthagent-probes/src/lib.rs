//! Probe providers shipped with the agent.
//!
//! Protocols are plugged into the agent by registering a
//! [`ProbeProvider`](healthagent_core::ProbeProvider) here; the orchestration
//! core never needs to change.

pub use healthagent_core;

mod tcp;

pub use tcp::TcpProvider;

use healthagent_core::ProviderRegistry;
use std::sync::Arc;

/// Registry pre-populated with every provider in this crate.
pub fn default_registry() -> ProviderRegistry {
    let registry = ProviderRegistry::new();
    registry.register(Arc::new(TcpProvider));
    registry
}
