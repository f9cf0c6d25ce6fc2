//! Command line surface and validated agent configuration

use clap::Parser;
use healthagent_core::{AgentError, Result};
use reqwest::Url;
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Parser, Debug)]
#[command(name = "healthagent")]
#[command(about = "Healthagent - monitors endpoints and reports health changes upstream")]
#[command(version = healthagent_core::VERSION)]
pub struct Cli {
    /// Upstream notified on health changes, e.g. https://collector.example/. Repeat for
    /// failover; upstreams are tried in the given order until one accepts.
    #[arg(long = "upstream", value_name = "URL")]
    pub upstreams: Vec<String>,

    /// Static monitor used until the first upstream sync, e.g. tcp://10.0.0.1:443
    #[arg(long = "monitor", value_name = "PROTOCOL://IP:PORT")]
    pub monitors: Vec<String>,

    /// Name identifying this agent upstream, defaults to the host name
    #[arg(long)]
    pub name: Option<String>,

    /// Probe interval in seconds
    #[arg(long, default_value_t = 1)]
    pub interval: u64,

    /// Seconds without any upstream request before a keep-alive report is forced
    #[arg(long = "keep-alive", default_value_t = 30, allow_negative_numbers = true)]
    pub keep_alive: i64,

    /// Seconds between monitor list synchronizations
    #[arg(long = "sync-interval", default_value_t = 30)]
    pub sync_interval: u64,

    /// Path to the CA bundle used to validate upstreams
    #[arg(long)]
    pub ca: Option<PathBuf>,

    /// Path to the client certificate
    #[arg(long)]
    pub crt: Option<PathBuf>,

    /// Path to the client key
    #[arg(long)]
    pub key: Option<PathBuf>,

    /// Always log as JSON
    #[arg(long = "json-logging")]
    pub json_logging: bool,
}

/// PEM material for mutual TLS.
#[derive(Clone, Default)]
pub struct Credentials {
    pub ca: Vec<u8>,
    pub cert: Vec<u8>,
    pub key: Vec<u8>,
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("ca_bytes", &self.ca.len())
            .field("cert_bytes", &self.cert.len())
            .field("key", &"<redacted>")
            .finish()
    }
}

/// Validated configuration, immutable for the lifetime of the agent.
#[derive(Debug, Clone)]
pub struct AgentConfig {
    /// Static bootstrap monitors; the upstream list replaces them on the first sync.
    pub monitors: Vec<String>,
    /// Priority order, first success wins.
    pub upstreams: Vec<Url>,
    pub interval: Duration,
    pub keep_alive: Duration,
    pub sync_interval: Duration,
    pub name: String,
    pub credentials: Credentials,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            monitors: Vec::new(),
            upstreams: Vec::new(),
            interval: Duration::from_secs(1),
            keep_alive: Duration::from_secs(30),
            sync_interval: Duration::from_secs(30),
            name: String::new(),
            credentials: Credentials::default(),
        }
    }
}

impl AgentConfig {
    /// Validates the command line and loads the credential files.
    pub fn from_cli(cli: Cli) -> Result<Self> {
        if cli.keep_alive <= 0 {
            return Err(invalid(format!(
                "keep-alive is set to `{}`, expected it to be at least 1",
                cli.keep_alive
            )));
        }

        if cli.upstreams.is_empty() {
            return Err(invalid(
                "no upstream configured, pass it using --upstream https://collector.example/",
            ));
        }

        let name = cli
            .name
            .or_else(|| {
                hostname::get()
                    .ok()
                    .map(|host| host.to_string_lossy().into_owned())
            })
            .unwrap_or_default();
        if name.is_empty() {
            return Err(invalid(
                "no name given, pass it using --name or leave it unset to use the host name",
            ));
        }

        let ca = required_path(cli.ca, "no ca certificate given, pass it using --ca")?;
        let crt = required_path(cli.crt, "no client certificate given, pass it using --crt")?;
        let key = required_path(cli.key, "no client key given, pass it using --key")?;

        let upstreams = cli
            .upstreams
            .iter()
            .map(|raw| {
                Url::parse(raw).map_err(|err| invalid(format!("invalid upstream `{raw}`: {err}")))
            })
            .collect::<Result<Vec<_>>>()?;

        let credentials = Credentials {
            ca: read_credential(&ca, "ca certificate")?,
            cert: read_credential(&crt, "client certificate")?,
            key: read_credential(&key, "client key")?,
        };

        let config = Self {
            monitors: cli.monitors,
            upstreams,
            interval: Duration::from_secs(cli.interval),
            keep_alive: Duration::from_secs(cli.keep_alive.unsigned_abs()),
            sync_interval: Duration::from_secs(cli.sync_interval),
            name,
            credentials,
        };
        config.validate()?;
        Ok(config)
    }

    /// Checks the invariants every running agent relies on. Configurations
    /// built in code rather than from the command line go through this too.
    pub fn validate(&self) -> Result<()> {
        if self.upstreams.is_empty() {
            return Err(invalid("no upstream configured"));
        }
        if self.name.is_empty() {
            return Err(invalid("agent name must not be empty"));
        }
        if self.interval.is_zero() {
            return Err(invalid("interval must be greater than zero"));
        }
        if self.keep_alive.is_zero() {
            return Err(invalid("keep-alive must be greater than zero"));
        }
        if self.sync_interval.is_zero() {
            return Err(invalid("sync interval must be greater than zero"));
        }
        Ok(())
    }
}

fn invalid(reason: impl Into<String>) -> AgentError {
    AgentError::InvalidConfig {
        reason: reason.into(),
    }
}

fn required_path(path: Option<PathBuf>, missing: &str) -> Result<PathBuf> {
    match path {
        Some(path) if !path.as_os_str().is_empty() => Ok(path),
        _ => Err(invalid(missing)),
    }
}

fn read_credential(path: &Path, what: &'static str) -> Result<Vec<u8>> {
    std::fs::read(path).map_err(|source| AgentError::CredentialRead {
        what,
        path: path.to_path_buf(),
        source,
    })
}
