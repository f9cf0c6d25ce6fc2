//! Forces a report when the upstream has not heard from the agent for too long.

use crate::reporter::{ReportTrigger, Reporter};
use healthagent_core::StatusTable;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{interval, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

/// How often the enforcer checks the idle time.
pub const KEEP_ALIVE_TICK: Duration = Duration::from_secs(1);

/// A keep-alive is due only once the idle time strictly exceeds the window.
pub fn keep_alive_due(idle: Duration, window: Duration) -> bool {
    idle > window
}

pub(crate) async fn enforce_keep_alive(
    reporter: Reporter,
    table: Arc<StatusTable>,
    window: Duration,
    cancel: CancellationToken,
) {
    let mut ticker = interval(KEEP_ALIVE_TICK);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            _ = ticker.tick() => {}
        }

        let idle = reporter.clock().since_last_attempt();
        if !keep_alive_due(idle, window) {
            continue;
        }

        info!(idle = ?idle, "enforcing keep alive");
        tokio::select! {
            _ = cancel.cancelled() => break,
            result = reporter.report(&table, ReportTrigger::KeepAlive) => {
                if let Err(err) = result {
                    error!(event = "keepalive", detail = %err, "couldn't inform upstream");
                }
            }
        }
    }

    info!("stopped keep alive loop");
}
