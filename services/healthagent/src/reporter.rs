//! Status reporting to the first accepting upstream

use crate::upstream::UpstreamClient;
use healthagent_core::{Result, StatusTable};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tracing::debug;

/// Why a report is sent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReportTrigger {
    /// The monitor at this index observed a state change.
    Change(usize),
    /// Nothing changed but the keep-alive window elapsed.
    KeepAlive,
}

impl fmt::Display for ReportTrigger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReportTrigger::Change(index) => write!(f, "change:{index}"),
            ReportTrigger::KeepAlive => f.write_str("keepalive"),
        }
    }
}

/// Time of the last upstream report attempt, shared by the reporter and the
/// keep-alive enforcer.
#[derive(Debug)]
pub struct ReportClock {
    origin: Instant,
    last_attempt_ms: AtomicU64,
}

impl ReportClock {
    /// A clock whose last attempt is "now".
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
            last_attempt_ms: AtomicU64::new(0),
        }
    }

    /// Records a report attempt at the current instant.
    pub fn touch(&self) {
        let now_ms = self.origin.elapsed().as_millis() as u64;
        self.last_attempt_ms.fetch_max(now_ms, Ordering::AcqRel);
    }

    pub fn since_last_attempt(&self) -> Duration {
        let last = Duration::from_millis(self.last_attempt_ms.load(Ordering::Acquire));
        self.origin.elapsed().saturating_sub(last)
    }
}

impl Default for ReportClock {
    fn default() -> Self {
        Self::new()
    }
}

/// Sends full status snapshots upstream with failover.
#[derive(Debug, Clone)]
pub struct Reporter {
    upstream: Arc<UpstreamClient>,
    clock: Arc<ReportClock>,
}

impl Reporter {
    pub fn new(upstream: Arc<UpstreamClient>) -> Self {
        Self {
            upstream,
            clock: Arc::new(ReportClock::new()),
        }
    }

    pub fn clock(&self) -> &ReportClock {
        &self.clock
    }

    /// POSTs the whole table to the upstreams in priority order until one
    /// accepts. Every attempt counts as keep-alive activity, successful or not.
    pub async fn report(&self, table: &StatusTable, trigger: ReportTrigger) -> Result<()> {
        let upstream = self.upstream.as_ref();
        let clock = self.clock.as_ref();

        upstream
            .failover("couldn't inform upstream about new status", move |target| {
                clock.touch();
                let snapshot = table.snapshot();
                async move {
                    let body = serde_json::to_vec(&snapshot)?;
                    upstream.post_status(target, body).await
                }
            })
            .await?;

        debug!(trigger = %trigger, "status reported upstream");
        Ok(())
    }
}
