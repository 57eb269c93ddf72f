//! HTTP client for the master coordinator.
//!
//! The registration retry policy hinges on telling an unreachable master
//! apart from a reachable-but-erroring one, so transport failures are
//! classified here rather than at the call sites.

use crate::config::MasterConfig;
use crate::error::AgentError;
use crate::types::ServiceInfo;
use async_trait::async_trait;
use reqwest::StatusCode;
use thiserror::Error;

/// Failure classification for master calls
#[derive(Error, Debug)]
pub enum MasterError {
    /// The master host or process could not be reached at all.
    ///
    /// Connection refused, host unreachable and DNS resolution failures all
    /// land here; these are the transient conditions worth retrying.
    #[error("master unreachable: {0}")]
    Unreachable(String),

    /// The master answered with a non-2xx status
    #[error("master returned HTTP {status}")]
    Status { status: StatusCode },

    /// Any other transport-level failure (timeout after connect,
    /// malformed response, request build error)
    #[error("request to master failed: {0}")]
    Request(String),
}

impl MasterError {
    /// True for failures the retry subsystem should handle
    pub fn is_connectivity(&self) -> bool {
        matches!(self, MasterError::Unreachable(_))
    }

    fn classify(err: reqwest::Error) -> Self {
        if err.is_connect() {
            MasterError::Unreachable(err.to_string())
        } else {
            MasterError::Request(err.to_string())
        }
    }
}

/// Registration endpoint of the master coordinator
#[async_trait]
pub trait MasterClient: Send + Sync {
    /// Announce a service descriptor to the master
    async fn register(&self, service: &ServiceInfo) -> Result<(), MasterError>;
}

/// reqwest-backed master client
pub struct HttpMasterClient {
    client: reqwest::Client,
    base_url: String,
}

impl HttpMasterClient {
    /// Create a client for the configured master
    pub fn new(config: &MasterConfig) -> Result<Self, AgentError> {
        let client = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()
            .map_err(|e| AgentError::Configuration(format!("HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
        })
    }
}

#[async_trait]
impl MasterClient for HttpMasterClient {
    async fn register(&self, service: &ServiceInfo) -> Result<(), MasterError> {
        let url = format!("{}{}", self.base_url, crate::MASTER_REGISTER_PATH);

        let response = self
            .client
            .post(&url)
            .json(service)
            .send()
            .await
            .map_err(MasterError::classify)?;

        if response.status().is_success() {
            Ok(())
        } else {
            Err(MasterError::Status {
                status: response.status(),
            })
        }
    }
}
