//! Mutual TLS HTTP client for upstream communication

use crate::config::Credentials;
use healthagent_core::{AgentError, Result};
use reqwest::{Certificate, Client, Identity};
use std::time::Duration;

/// Client-side timeout for every upstream call.
pub const UPSTREAM_TIMEOUT: Duration = Duration::from_secs(3);

/// Builds a client that validates upstreams against the CA bundle and
/// authenticates with the client certificate/key pair.
pub fn mutual_tls_client(credentials: &Credentials) -> Result<Client> {
    let roots = Certificate::from_pem_bundle(&credentials.ca).map_err(|err| AgentError::Tls {
        reason: format!("couldn't parse ca bundle: {err}"),
    })?;
    if roots.is_empty() {
        return Err(AgentError::Tls {
            reason: "ca bundle contains no certificates".to_string(),
        });
    }

    let mut pem = credentials.cert.clone();
    pem.push(b'\n');
    pem.extend_from_slice(&credentials.key);
    let identity = Identity::from_pem(&pem).map_err(|err| AgentError::Tls {
        reason: format!("couldn't parse cert pair: {err}"),
    })?;

    let builder = roots
        .into_iter()
        .fold(Client::builder().use_rustls_tls(), |builder, root| {
            builder.add_root_certificate(root)
        });

    builder
        .tls_built_in_root_certs(false)
        .identity(identity)
        .timeout(UPSTREAM_TIMEOUT)
        .build()
        .map_err(|err| AgentError::Tls {
            reason: format!("couldn't build http client: {err}"),
        })
}
