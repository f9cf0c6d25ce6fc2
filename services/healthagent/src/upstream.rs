//! Failover communication with the ordered list of upstream collectors

use crate::config::AgentConfig;
use crate::tls;
use healthagent_core::{headers, AgentError, Result};
use reqwest::header::CONTENT_TYPE;
use reqwest::{Client, Url};
use std::future::Future;
use tracing::{debug, warn};
use xxhash_rust::xxh64::xxh64;

/// Monitor list as fetched from an upstream, with the hash of the raw body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchedMonitors {
    pub monitors: Vec<String>,
    pub hash: u64,
}

/// 64-bit content hash of a monitor list response body.
///
/// Only used to skip redundant resynchronization. It hashes the raw bytes, so
/// a semantically equal but differently formatted body counts as a change.
pub fn content_hash(body: &[u8]) -> u64 {
    xxh64(body, 0)
}

#[derive(Debug, Clone)]
pub struct UpstreamClient {
    http: Client,
    upstreams: Vec<Url>,
    agent_name: String,
}

impl UpstreamClient {
    pub fn new(http: Client, upstreams: Vec<Url>, agent_name: impl Into<String>) -> Result<Self> {
        if upstreams.is_empty() {
            return Err(AgentError::NoUpstreams);
        }
        Ok(Self {
            http,
            upstreams,
            agent_name: agent_name.into(),
        })
    }

    /// Client authenticated with the configured mutual TLS credentials.
    pub fn from_config(config: &AgentConfig) -> Result<Self> {
        let http = tls::mutual_tls_client(&config.credentials)?;
        Self::new(http, config.upstreams.clone(), config.name.clone())
    }

    pub fn upstreams(&self) -> &[Url] {
        &self.upstreams
    }

    pub fn agent_name(&self) -> &str {
        &self.agent_name
    }

    /// Fetches the monitor list from the first upstream that answers with a
    /// decodable 2xx response.
    pub async fn fetch_monitors(&self) -> Result<FetchedMonitors> {
        self.failover("couldn't receive monitors from upstream", move |upstream| {
            self.fetch_from(upstream)
        })
        .await
    }

    /// Runs `attempt` against each upstream in priority order and returns the
    /// first success. Fails with the last error once every upstream failed.
    pub(crate) async fn failover<T, F, Fut>(&self, failure: &str, mut attempt: F) -> Result<T>
    where
        F: FnMut(Url) -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let mut last_error = None;

        for (try_index, upstream) in self.upstreams.iter().enumerate() {
            match attempt(upstream.clone()).await {
                Ok(value) => return Ok(value),
                Err(err) => {
                    warn!(
                        upstream = %upstream,
                        detail = %err,
                        cur = try_index,
                        max = self.upstreams.len(),
                        "{failure}"
                    );
                    last_error = Some(err);
                }
            }
        }

        match last_error {
            Some(last) => Err(AgentError::UpstreamsExhausted {
                attempted: self.upstreams.len(),
                last: Box::new(last),
            }),
            None => Err(AgentError::NoUpstreams),
        }
    }

    async fn fetch_from(&self, upstream: Url) -> Result<FetchedMonitors> {
        let response = self
            .http
            .get(upstream.clone())
            .header(headers::AGENT_NAME, &self.agent_name)
            .send()
            .await
            .map_err(|err| unreachable_error(&upstream, &err))?;

        let status = response.status();
        let body = response
            .bytes()
            .await
            .map_err(|err| unreachable_error(&upstream, &err))?;

        if !status.is_success() {
            return Err(AgentError::UpstreamRejected {
                upstream: upstream.to_string(),
                status: status.as_u16(),
                body: String::from_utf8_lossy(&body).into_owned(),
            });
        }

        let monitors: Vec<String> = serde_json::from_slice(&body)?;
        let hash = content_hash(&body);
        debug!(upstream = %upstream, count = monitors.len(), hash, "fetched monitor list");

        Ok(FetchedMonitors { monitors, hash })
    }

    /// POSTs an already serialized status snapshot to a single upstream.
    pub(crate) async fn post_status(&self, upstream: Url, body: Vec<u8>) -> Result<()> {
        let response = self
            .http
            .post(upstream.clone())
            .header(headers::AGENT_NAME, &self.agent_name)
            .header(CONTENT_TYPE, "application/json")
            .body(body)
            .send()
            .await
            .map_err(|err| unreachable_error(&upstream, &err))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(AgentError::UpstreamRejected {
                upstream: upstream.to_string(),
                status: status.as_u16(),
                body,
            });
        }

        Ok(())
    }
}

fn unreachable_error(upstream: &Url, err: &reqwest::Error) -> AgentError {
    AgentError::UpstreamUnreachable {
        upstream: upstream.to_string(),
        reason: err.to_string(),
    }
}
