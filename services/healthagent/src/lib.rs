//! # Healthagent
//!
//! Watches a dynamically assigned set of endpoints and reports their health
//! to the first reachable of several redundant upstream collectors.
//!
//! - [`Agent`] owns the monitor set and the lifecycle of every task
//! - [`Agent::sync`] keeps the monitor set in line with the upstream list
//! - [`Reporter`] posts full status snapshots with failover
//! - the keep-alive enforcer reports when nothing happened for too long

pub mod agent;
pub mod config;
pub mod keepalive;
pub mod reporter;
mod supervisor;
pub mod sync;
pub mod tls;
pub mod upstream;

pub use agent::Agent;
pub use config::{AgentConfig, Cli, Credentials};
pub use reporter::{ReportClock, ReportTrigger, Reporter};
pub use sync::SyncOutcome;
pub use upstream::{content_hash, FetchedMonitors, UpstreamClient};

pub use healthagent_core;
