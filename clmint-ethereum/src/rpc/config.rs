use std::time::Duration;

use serde::Deserialize;

/// Retry behaviour for the gateway's read calls (allowance, estimation, receipt lookups).
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct RPCRetryConfig {
    /// Retries after the first attempt (default: 3)
    pub max_retries: u32,
    /// Initial backoff delay in milliseconds (default: 100ms)
    pub initial_backoff_ms: u64,
    /// Maximum backoff delay in milliseconds (default: 5000ms)
    pub max_backoff_ms: u64,
}

impl RPCRetryConfig {
    pub fn new(max_retries: u32, initial_backoff_ms: u64, max_backoff_ms: u64) -> Self {
        Self { max_retries, initial_backoff_ms, max_backoff_ms }
    }
}

impl Default for RPCRetryConfig {
    fn default() -> Self {
        Self { max_retries: 3, initial_backoff_ms: 100, max_backoff_ms: 5000 }
    }
}

/// Settings of an [`EthereumGateway`](super::EthereumGateway).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct GatewayConfig {
    pub chain_id: u64,
    pub retry: RPCRetryConfig,
    /// Delay between two receipt lookups while waiting for inclusion or depth.
    pub poll_interval: Duration,
}

impl GatewayConfig {
    pub fn new(chain_id: u64) -> Self {
        Self { chain_id, retry: RPCRetryConfig::default(), poll_interval: Duration::from_secs(1) }
    }

    pub fn with_retry(mut self, retry: RPCRetryConfig) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }
}
