//! # Healthagent
//!
//! Endpoint health monitoring agent

use anyhow::{anyhow, Context};
use clap::Parser;
use healthagent::{Agent, AgentConfig, Cli, UpstreamClient};
use healthagent_core::BUILD_INFO;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.json_logging);

    info!("Starting {}", BUILD_INFO);

    let config = AgentConfig::from_cli(cli)?;
    let name = config.name.clone();
    let upstream = UpstreamClient::from_config(&config)?;
    let registry = healthagent_probes::default_registry();

    let agent = Agent::bootstrap(config, upstream, registry)
        .await
        .with_context(|| format!("couldn't create agent `{name}`"))?;

    agent.start().await;
    info!(name = %name, "healthagent started");

    let shutdown = CancellationToken::new();
    let mut sync_loop = tokio::spawn(agent.clone().run_sync_loop(shutdown.clone()));

    tokio::select! {
        signal = tokio::signal::ctrl_c() => {
            signal.context("couldn't listen for the interrupt signal")?;
            info!("received interrupt, shutting down");
        }
        finished = &mut sync_loop => {
            // Fail fast: the running monitor set can no longer be trusted.
            let err = match finished {
                Ok(Ok(())) => anyhow!("sync loop ended unexpectedly"),
                Ok(Err(err)) => anyhow::Error::new(err),
                Err(join) => anyhow::Error::new(join),
            };
            error!(detail = %err, "aborting execution, monitor state may be inconsistent");
            return Err(err.context("couldn't sync monitors"));
        }
    }

    shutdown.cancel();
    match sync_loop.await {
        Ok(Err(err)) => error!(detail = %err, "monitor sync failed during shutdown"),
        Err(join) => error!(detail = %join, "monitor sync task failed during shutdown"),
        Ok(Ok(())) => {}
    }
    agent.stop().await;

    info!("Stopped.");
    Ok(())
}

fn init_tracing(json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let subscriber = tracing_subscriber::fmt().with_env_filter(filter);
    if json {
        subscriber.json().init();
    } else {
        subscriber.init();
    }
}
