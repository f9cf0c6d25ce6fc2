//! Probe capability and protocol registry
//!
//! The orchestration core never speaks a probe protocol itself. It looks up a
//! [`ProbeProvider`] by the monitor's protocol tag and consumes the stream of
//! observations the provider produces.

use crate::endpoint::{Endpoint, MonitorSpec};
use crate::error::{AgentError, Result};
use crate::status::HealthStatus;
use dashmap::DashMap;
use futures::stream::BoxStream;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

/// How long a probe may go without a completed check before its state is stale.
pub const STALE_THRESHOLD: Duration = Duration::from_secs(60);

/// Upper bound for a single probe attempt.
pub const PROBE_TIMEOUT: Duration = Duration::from_secs(1);

/// Shortest interval a provider may tick at; zero would spin or panic.
pub const MIN_PROBE_INTERVAL: Duration = Duration::from_millis(10);

/// Lazy, unbounded sequence of observations for one endpoint.
pub type StatusStream = BoxStream<'static, HealthStatus>;

/// Tunables handed to a provider when a monitor starts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProbeSettings {
    pub interval: Duration,
    pub stale_after: Duration,
    pub timeout: Duration,
}

impl ProbeSettings {
    /// Settings with the default stale threshold and probe timeout. The
    /// interval is raised to [`MIN_PROBE_INTERVAL`] if shorter.
    pub fn with_interval(interval: Duration) -> Self {
        Self {
            interval: interval.max(MIN_PROBE_INTERVAL),
            stale_after: STALE_THRESHOLD,
            timeout: PROBE_TIMEOUT,
        }
    }
}

/// A protocol-specific health check implementation.
///
/// `watch` must not do any work until the stream is polled, and dropping the
/// stream must stop the producer.
pub trait ProbeProvider: Send + Sync {
    /// Protocol tag this provider is registered under, e.g. `tcp`.
    fn protocol(&self) -> &str;

    fn watch(&self, endpoint: Endpoint, settings: ProbeSettings) -> StatusStream;
}

/// Maps protocol tags to provider implementations.
#[derive(Clone, Default)]
pub struct ProviderRegistry {
    providers: Arc<DashMap<String, Arc<dyn ProbeProvider>>>,
}

impl std::fmt::Debug for ProviderRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut protocols = self.protocols();
        protocols.sort();
        f.debug_struct("ProviderRegistry")
            .field("protocols", &protocols)
            .finish()
    }
}

impl ProviderRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a provider under its protocol tag, replacing any previous one.
    pub fn register(&self, provider: Arc<dyn ProbeProvider>) {
        let protocol = provider.protocol().to_string();
        info!(protocol = %protocol, "registered probe provider");
        self.providers.insert(protocol, provider);
    }

    pub fn get(&self, protocol: &str) -> Option<Arc<dyn ProbeProvider>> {
        self.providers
            .get(protocol)
            .map(|entry| entry.value().clone())
    }

    /// Resolves the provider for a monitor, failing with `ProviderSetup` if none is registered.
    pub fn resolve(&self, monitor: &MonitorSpec) -> Result<Arc<dyn ProbeProvider>> {
        self.get(&monitor.protocol)
            .ok_or_else(|| AgentError::ProviderSetup {
                protocol: monitor.protocol.clone(),
                monitor: monitor.raw().to_string(),
            })
    }

    pub fn protocols(&self) -> Vec<String> {
        self.providers
            .iter()
            .map(|entry| entry.key().clone())
            .collect()
    }
}
