//! Error types for the healthagent workspace

use std::path::PathBuf;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, AgentError>;

#[derive(Error, Debug)]
pub enum AgentError {
    #[error("malformed monitor `{input}`: {reason}")]
    MalformedMonitor { input: String, reason: String },

    #[error("malformed endpoint `{input}`: {reason}")]
    MalformedEndpoint { input: String, reason: String },

    #[error("upstream `{upstream}` unreachable: {reason}")]
    UpstreamUnreachable { upstream: String, reason: String },

    #[error("upstream `{upstream}` rejected request with status {status}: {body}")]
    UpstreamRejected {
        upstream: String,
        status: u16,
        body: String,
    },

    #[error("serialization error: {source}")]
    Serialization {
        #[from]
        source: serde_json::Error,
    },

    #[error("no probe provider for protocol `{protocol}` (monitor `{monitor}`)")]
    ProviderSetup { protocol: String, monitor: String },

    #[error("all {attempted} upstreams failed, last error: {last}")]
    UpstreamsExhausted {
        attempted: usize,
        #[source]
        last: Box<AgentError>,
    },

    #[error("no upstream configured")]
    NoUpstreams,

    #[error("invalid configuration: {reason}")]
    InvalidConfig { reason: String },

    #[error("couldn't read {what} from `{path}`: {source}")]
    CredentialRead {
        what: &'static str,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("TLS setup failed: {reason}")]
    Tls { reason: String },
}
