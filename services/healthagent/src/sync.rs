//! Change-aware synchronization of the monitor list from the upstreams

use crate::agent::Agent;
use crate::supervisor::Monitor;
use healthagent_core::{MonitorSpec, ProviderRegistry, Result, StatusTable};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument};

/// Result of a single `sync` call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncOutcome {
    /// The upstream returned the already applied monitor list.
    Unchanged,
    /// A new monitor set was installed.
    Applied { monitors: usize },
}

/// One monitor set together with its size-matched status table.
#[derive(Debug)]
pub(crate) struct Generation {
    pub(crate) monitors: Vec<Monitor>,
    pub(crate) table: Arc<StatusTable>,
}

impl Generation {
    pub(crate) fn empty() -> Self {
        Self {
            monitors: Vec::new(),
            table: Arc::new(StatusTable::with_len(0)),
        }
    }

    /// Parses every monitor and resolves its provider. Any failure rejects the
    /// whole set.
    pub(crate) fn build(raw_monitors: &[String], registry: &ProviderRegistry) -> Result<Self> {
        let monitors = raw_monitors
            .iter()
            .map(|raw| -> Result<Monitor> {
                let spec: MonitorSpec = raw.parse()?;
                let provider = registry.resolve(&spec)?;
                info!(monitor = %spec, endpoint = %spec.endpoint, "set up health check");
                Ok(Monitor { spec, provider })
            })
            .collect::<Result<Vec<_>>>()?;

        let table = Arc::new(StatusTable::with_len(monitors.len()));
        Ok(Self { monitors, table })
    }

    pub(crate) fn len(&self) -> usize {
        self.monitors.len()
    }
}

impl Agent {
    /// Fetches the monitor list and, when its hash differs from the applied
    /// one, swaps in a freshly built monitor set.
    ///
    /// The new set is fully validated before anything is stopped. On a
    /// non-initial run every running task is stopped and joined before the
    /// new set is started.
    #[instrument(skip(self))]
    pub async fn sync(&self, initial: bool) -> Result<SyncOutcome> {
        let fetched = self.upstream.fetch_monitors().await?;
        debug!(monitors = ?fetched.monitors, hash = fetched.hash, "received monitors");

        let mut state = self.state.lock().await;
        if fetched.hash != 0 && fetched.hash == state.last_hash {
            info!("skipping monitor sync, upstream has same hash");
            return Ok(SyncOutcome::Unchanged);
        }

        info!("start syncing monitors");
        let generation = Generation::build(&fetched.monitors, &self.registry)?;
        let monitors = generation.len();

        if !initial {
            Self::halt(&mut state).await;
        }

        state.generation = generation;

        if !initial {
            self.launch(&mut state);
        }

        state.last_hash = fetched.hash;
        info!(monitors, hash = fetched.hash, "finished syncing monitors");

        Ok(SyncOutcome::Applied { monitors })
    }

    /// Syncs every `sync_interval` until cancelled. The first sync runs
    /// immediately, unless the agent was bootstrapped from static monitors:
    /// those then stay in effect for one full interval.
    ///
    /// A failed sync ends the loop with its error: the running monitor set may
    /// no longer match the intended configuration, so the caller must not
    /// keep operating.
    pub async fn run_sync_loop(self: Arc<Self>, cancel: CancellationToken) -> Result<()> {
        let period = self.config.sync_interval;

        if !self.config.monitors.is_empty() {
            debug!(delay = ?period, "static monitors configured, delaying first sync");
            tokio::select! {
                _ = cancel.cancelled() => {
                    info!("stopped sync monitors loop");
                    return Ok(());
                }
                _ = tokio::time::sleep(period) => {}
            }
        }

        loop {
            if let Err(err) = self.sync(false).await {
                error!(detail = %err, "couldn't sync monitors, state may be inconsistent");
                return Err(err);
            }

            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = tokio::time::sleep(period) => {}
            }
        }

        info!("stopped sync monitors loop");
        Ok(())
    }
}
