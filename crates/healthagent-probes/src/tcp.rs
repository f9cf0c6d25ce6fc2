//! TCP connect probe: an endpoint is healthy when a connection can be
//! established within the probe timeout.

use chrono::Utc;
use futures::stream::{self, StreamExt};
use healthagent_core::{
    Endpoint, HealthStatus, ProbeProvider, ProbeSettings, StatusStream, MIN_PROBE_INTERVAL,
};
use tokio::net::TcpStream;
use tokio::time::{interval, timeout, Instant, Interval, MissedTickBehavior};
use tracing::trace;

#[derive(Debug, Clone, Copy, Default)]
pub struct TcpProvider;

impl ProbeProvider for TcpProvider {
    fn protocol(&self) -> &str {
        "tcp"
    }

    fn watch(&self, endpoint: Endpoint, settings: ProbeSettings) -> StatusStream {
        let state = ProbeState {
            endpoint,
            settings,
            ticker: None,
            last_healthy: None,
            last_completed: None,
        };

        stream::unfold(state, |mut state| async move {
            let status = state.next_observation().await;
            Some((status, state))
        })
        .boxed()
    }
}

struct ProbeState {
    endpoint: Endpoint,
    settings: ProbeSettings,
    ticker: Option<Interval>,
    last_healthy: Option<bool>,
    last_completed: Option<Instant>,
}

impl ProbeState {
    async fn next_observation(&mut self) -> HealthStatus {
        let period = self.settings.interval.max(MIN_PROBE_INTERVAL);
        let ticker = self.ticker.get_or_insert_with(|| {
            let mut ticker = interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            ticker
        });
        ticker.tick().await;

        let started = Instant::now();
        let error = match timeout(
            self.settings.timeout,
            TcpStream::connect(self.endpoint.socket_addr()),
        )
        .await
        {
            Ok(Ok(_connection)) => None,
            Ok(Err(err)) => Some(err.to_string()),
            Err(_) => Some(format!("timed out after {:?}", self.settings.timeout)),
        };
        let healthy = error.is_none();

        // A state older than the stale threshold is re-announced as a change.
        let stale = self
            .last_completed
            .is_some_and(|at| at.elapsed() > self.settings.stale_after);
        let did_change = self.last_healthy != Some(healthy) || stale;

        self.last_healthy = Some(healthy);
        self.last_completed = Some(Instant::now());

        trace!(endpoint = %self.endpoint, healthy, did_change, "tcp probe completed");

        let mut status = HealthStatus::new(healthy, did_change)
            .with_detail("protocol", "tcp")
            .with_detail("endpoint", self.endpoint.to_string())
            .with_detail("checkedAt", Utc::now().to_rfc3339())
            .with_detail("latencyMs", started.elapsed().as_millis() as u64);
        if let Some(error) = error {
            status = status.with_detail("error", error);
        }
        status
    }
}
