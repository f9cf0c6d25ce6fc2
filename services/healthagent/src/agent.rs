//! Agent composition root
//!
//! The agent owns the configuration, the current monitor generation (monitor
//! list plus its status table) and the handles of every running task. All of
//! it sits behind one async mutex: starting, stopping and reconfiguring are
//! mutually exclusive, and a generation's tasks are always joined before the
//! next generation's tasks are spawned.

use crate::config::AgentConfig;
use crate::keepalive::enforce_keep_alive;
use crate::reporter::Reporter;
use crate::supervisor::{MonitorSupervisor, SupervisionHandle};
use crate::sync::Generation;
use crate::upstream::UpstreamClient;
use healthagent_core::{HealthStatus, ProbeSettings, ProviderRegistry, Result};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{info, warn};

pub struct Agent {
    pub(crate) config: Arc<AgentConfig>,
    pub(crate) upstream: Arc<UpstreamClient>,
    pub(crate) registry: ProviderRegistry,
    pub(crate) state: Mutex<AgentState>,
    reporter: Reporter,
}

impl std::fmt::Debug for Agent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Agent")
            .field("name", &self.config.name)
            .field("upstreams", &self.upstream.upstreams().len())
            .field("registry", &self.registry)
            .finish()
    }
}

pub(crate) struct AgentState {
    pub(crate) generation: Generation,
    pub(crate) last_hash: u64,
    supervisors: Vec<SupervisionHandle>,
    keep_alive: Option<SupervisionHandle>,
}

impl AgentState {
    fn new() -> Self {
        Self {
            generation: Generation::empty(),
            last_hash: 0,
            supervisors: Vec::new(),
            keep_alive: None,
        }
    }

    fn is_running(&self) -> bool {
        !self.supervisors.is_empty() || self.keep_alive.is_some()
    }
}

impl Agent {
    /// Builds the agent and its initial monitor set.
    ///
    /// With static monitors configured they form the initial set and the
    /// upstream list takes over on the first periodic sync. Otherwise the
    /// initial upstream sync must succeed. Nothing is started yet.
    pub async fn bootstrap(
        config: AgentConfig,
        upstream: UpstreamClient,
        registry: ProviderRegistry,
    ) -> Result<Arc<Self>> {
        config.validate()?;
        let upstream = Arc::new(upstream);
        let agent = Arc::new(Self {
            config: Arc::new(config),
            reporter: Reporter::new(upstream.clone()),
            upstream,
            registry,
            state: Mutex::new(AgentState::new()),
        });

        if agent.config.monitors.is_empty() {
            agent.sync(true).await?;
        } else {
            let generation = Generation::build(&agent.config.monitors, &agent.registry)?;
            info!(monitors = generation.len(), "using static bootstrap monitors");
            agent.state.lock().await.generation = generation;
        }

        Ok(agent)
    }

    pub fn config(&self) -> &AgentConfig {
        &self.config
    }

    pub fn reporter(&self) -> &Reporter {
        &self.reporter
    }

    /// Starts one supervisor per monitor plus the keep-alive enforcer. Non-blocking.
    pub async fn start(&self) {
        let mut state = self.state.lock().await;
        self.launch(&mut state);
    }

    /// Stops every supervisor, then the keep-alive enforcer. A no-op when nothing runs.
    pub async fn stop(&self) {
        let mut state = self.state.lock().await;
        Self::halt(&mut state).await;
    }

    pub async fn is_running(&self) -> bool {
        self.state.lock().await.is_running()
    }

    pub async fn monitor_count(&self) -> usize {
        self.state.lock().await.generation.len()
    }

    /// The current status table, in monitor order.
    pub async fn status_snapshot(&self) -> Vec<HealthStatus> {
        self.state.lock().await.generation.table.snapshot()
    }

    pub(crate) fn launch(&self, state: &mut AgentState) {
        if state.is_running() {
            warn!("health checking already running, ignoring start");
            return;
        }

        let settings = ProbeSettings::with_interval(self.config.interval);
        let table = state.generation.table.clone();

        for (index, monitor) in state.generation.monitors.iter().enumerate() {
            let statuses = monitor.provider.watch(monitor.spec.endpoint, settings);
            let supervisor = MonitorSupervisor {
                index,
                monitor: monitor.spec.clone(),
                table: table.clone(),
                reporter: self.reporter.clone(),
            };
            state.supervisors.push(SupervisionHandle::spawn(
                monitor.spec.raw(),
                move |cancel| supervisor.run(statuses, cancel),
            ));
        }

        let reporter = self.reporter.clone();
        let window = self.config.keep_alive;
        state.keep_alive = Some(SupervisionHandle::spawn("keepalive", move |cancel| {
            enforce_keep_alive(reporter, table, window, cancel)
        }));

        info!(monitors = state.supervisors.len(), "started health checking");
    }

    pub(crate) async fn halt(state: &mut AgentState) {
        let supervisors = std::mem::take(&mut state.supervisors);
        let stopped = supervisors.len();
        futures::future::join_all(supervisors.into_iter().map(SupervisionHandle::shutdown)).await;

        if let Some(keep_alive) = state.keep_alive.take() {
            keep_alive.shutdown().await;
        }

        if stopped > 0 {
            info!(monitors = stopped, "stopped health checking");
        }
    }
}
