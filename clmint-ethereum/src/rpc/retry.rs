//! Request-level retries for the gateway's read calls.
//!
//! Only transport hiccups are retried here: rate limiting, unavailable endpoints and null
//! responses. Receipt-pending answers are returned as is for the caller to classify.

use std::time::Duration;

use alloy::{
    rpc::json_rpc::ErrorPayload,
    transports::{RpcError, TransportErrorKind},
};
use backoff::{exponential::ExponentialBackoffBuilder, ExponentialBackoff};
use clmint_common::retry::BoundedBackoff;
use serde::Deserialize;
use serde_json::value::RawValue;

use super::{config::RPCRetryConfig, errors::RECEIPT_PENDING_CODES};

/// Retry classification for [`RpcError<TransportErrorKind>`].
///
/// # Attribution
/// The retryability rules follow alloy-transport:
/// https://github.com/alloy-rs/alloy/blob/a3899575fbc0c789275f95661516b99e9a92838d/crates/transport/src/error.rs#L156
/// License: MIT OR Apache-2.0
pub(crate) trait RpcErrorExt {
    /// `true` for transient transport failures that are likely to succeed on retry.
    fn is_retryable(&self) -> bool;

    /// The JSON-RPC code if the node signalled that a receipt cannot be served yet.
    fn receipt_pending_code(&self) -> Option<i64>;

    /// Provider-suggested delay under `data.rate.backoff_seconds`, if any.
    fn backoff_hint(&self) -> Option<Duration>;

    fn classify_error(self) -> backoff::Error<Self>
    where
        Self: Sized;
}

impl<E: std::borrow::Borrow<RawValue>> RpcErrorExt for RpcError<TransportErrorKind, E> {
    fn is_retryable(&self) -> bool {
        match self {
            Self::Transport(err) => err.is_retry_err(),
            Self::SerError(_) => false,
            Self::DeserError { text, .. } => {
                if let Ok(resp) = serde_json::from_str::<ErrorPayload>(text) {
                    return resp.is_retry_err();
                }

                // some providers omit the JSON-RPC envelope in the error case
                #[derive(Deserialize)]
                struct Resp {
                    error: ErrorPayload,
                }

                serde_json::from_str::<Resp>(text)
                    .map(|resp| resp.error.is_retry_err())
                    .unwrap_or(false)
            }
            Self::ErrorResp(err) => err.is_retry_err(),
            Self::NullResp => true,
            _ => false,
        }
    }

    fn receipt_pending_code(&self) -> Option<i64> {
        match self {
            Self::ErrorResp(err) if RECEIPT_PENDING_CODES.contains(&err.code) => Some(err.code),
            _ => None,
        }
    }

    fn backoff_hint(&self) -> Option<Duration> {
        let Self::ErrorResp(resp) = self else {
            return None;
        };
        let data = resp.try_data_as::<serde_json::Value>()?.ok()?;
        let seconds = &data["rate"]["backoff_seconds"];
        seconds
            .as_u64()
            .map(Duration::from_secs)
            .or_else(|| {
                seconds
                    .as_f64()
                    .map(|s| Duration::from_secs(s.ceil() as u64))
            })
    }

    fn classify_error(self) -> backoff::Error<Self> {
        if self.receipt_pending_code().is_some() || !self.is_retryable() {
            return backoff::Error::permanent(self);
        }
        match self.backoff_hint() {
            Some(hint) => backoff::Error::retry_after(self, hint),
            None => backoff::Error::transient(self),
        }
    }
}

/// Exponential backoff capped by attempts rather than elapsed time.
#[derive(Clone, Debug)]
pub struct RetryPolicy(BoundedBackoff<ExponentialBackoff>);

impl Default for RetryPolicy {
    fn default() -> Self {
        RPCRetryConfig::default().into()
    }
}

impl From<RPCRetryConfig> for RetryPolicy {
    fn from(config: RPCRetryConfig) -> Self {
        let backoff = ExponentialBackoffBuilder::new()
            .with_initial_interval(Duration::from_millis(config.initial_backoff_ms))
            .with_max_interval(Duration::from_millis(config.max_backoff_ms))
            .with_max_elapsed_time(None)
            .build();

        Self(BoundedBackoff::new(backoff, config.max_retries.saturating_add(1)))
    }
}

impl RetryPolicy {
    #[cfg(test)]
    pub fn for_testing() -> Self {
        RPCRetryConfig::new(3, 1, 5).into()
    }

    /// Runs `operation`, retrying transient transport failures.
    ///
    /// The attempt cap also holds for retries scheduled by a provider backoff hint. `backoff`
    /// schedules those without consulting the policy.
    pub(crate) async fn retry_request<F, Fut, T>(
        &self,
        mut operation: F,
    ) -> Result<T, RpcError<TransportErrorKind>>
    where
        F: FnMut() -> Fut,
        Fut: std::future::Future<Output = Result<T, RpcError<TransportErrorKind>>>,
    {
        let max_attempts = self.0.max_attempts();
        let mut attempt = 0u32;
        backoff::future::retry(self.0.clone(), || {
            attempt += 1;
            let last_attempt = attempt >= max_attempts;
            let fut = operation();
            async move {
                fut.await
                    .map_err(|err| match err.classify_error() {
                        backoff::Error::Transient { err, .. } if last_attempt => {
                            backoff::Error::permanent(err)
                        }
                        classified => classified,
                    })
            }
        })
        .await
    }
}
