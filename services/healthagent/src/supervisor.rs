//! Per-monitor supervision of probe status streams

use crate::reporter::{ReportTrigger, Reporter};
use futures::StreamExt;
use healthagent_core::{MonitorSpec, ProbeProvider, StatusStream, StatusTable};
use std::future::Future;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument};

/// A parsed monitor bound to the provider that probes it.
#[derive(Clone)]
pub(crate) struct Monitor {
    pub spec: MonitorSpec,
    pub provider: Arc<dyn ProbeProvider>,
}

impl std::fmt::Debug for Monitor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Monitor")
            .field("spec", &self.spec.raw())
            .field("provider", &self.provider.protocol())
            .finish()
    }
}

/// Owned cancellation signal plus the task it controls.
///
/// `shutdown` consumes the handle, so a task is signalled exactly once.
#[derive(Debug)]
pub(crate) struct SupervisionHandle {
    name: String,
    token: CancellationToken,
    task: JoinHandle<()>,
}

impl SupervisionHandle {
    pub(crate) fn spawn<F, Fut>(name: impl Into<String>, run: F) -> Self
    where
        F: FnOnce(CancellationToken) -> Fut,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let token = CancellationToken::new();
        let task = tokio::spawn(run(token.clone()));
        Self {
            name: name.into(),
            token,
            task,
        }
    }

    /// Signals cancellation and waits for the task to drain.
    pub(crate) async fn shutdown(self) {
        self.token.cancel();
        if let Err(err) = self.task.await {
            if err.is_panic() {
                error!(task = %self.name, detail = %err, "supervised task panicked");
            }
        }
    }
}

/// Consumes one monitor's observations, keeps its status slot current and
/// reports state changes upstream.
pub(crate) struct MonitorSupervisor {
    pub index: usize,
    pub monitor: MonitorSpec,
    pub table: Arc<StatusTable>,
    pub reporter: Reporter,
}

impl MonitorSupervisor {
    #[instrument(name = "supervisor", skip_all, fields(monitor = %self.monitor, index = self.index))]
    pub(crate) async fn run(self, mut statuses: StatusStream, cancel: CancellationToken) {
        loop {
            let status = tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                next = statuses.next() => match next {
                    Some(status) => status,
                    None => {
                        info!("status stream ended");
                        break;
                    }
                },
            };

            let healthy = status.healthy;
            let did_change = status.did_change;
            self.table.set(self.index, status);

            if !did_change {
                debug!(healthy, "health unchanged");
                continue;
            }

            info!(healthy, "health changed");
            tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                result = self.reporter.report(&self.table, ReportTrigger::Change(self.index)) => {
                    if let Err(err) = result {
                        error!(
                            event = "change",
                            detail = %err,
                            healthy,
                            monitor = %self.monitor,
                            "couldn't inform upstream"
                        );
                    }
                }
            }
        }

        debug!("supervisor stopped");
    }
}
