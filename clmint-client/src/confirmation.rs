//! Waiting for a broadcast transaction to reach a definitive outcome.
//!
//! Each attempt asks the gateway for a receipt, bounded by the attempt timeout. Attempts that
//! hit a transient condition are repeated after a fixed delay until the attempt budget runs
//! out; everything else ends polling immediately:
//!
//! ```text
//! Pending -> (Polling -> Pending)* -> Confirmed | Reverted | Fatal | Exhausted
//! ```

use std::{
    sync::{
        atomic::{AtomicU32, Ordering},
        Arc,
    },
    time::Duration,
};

use alloy::primitives::TxHash;
use clmint_common::{
    models::transaction::{ConfirmationOutcome, UnconfirmedReason},
    retry::BoundedBackoff,
    traits::ChainGateway,
};
use tracing::{debug, error, info, warn, Instrument, Span};

use crate::{config::TrackerConfig, errors::ProvisionError};

pub struct ConfirmationTracker {
    gateway: Arc<dyn ChainGateway>,
    config: TrackerConfig,
    span: Span,
}

impl ConfirmationTracker {
    pub fn new(gateway: Arc<dyn ChainGateway>, config: TrackerConfig, span: Span) -> Self {
        Self { gateway, config, span }
    }

    /// Polls until `tx_hash` is `required_confirmations` blocks deep, reverted, or polling has
    /// to stop.
    ///
    /// Never fails: a failure-status receipt is reported as [`ConfirmationOutcome::Reverted`]
    /// and is not polled again. Running out of attempts yields
    /// [`UnconfirmedReason::Exhausted`], which means the outcome is unknown, not that the
    /// transaction failed.
    pub async fn await_confirmation(
        &self,
        tx_hash: TxHash,
        required_confirmations: u64,
    ) -> ConfirmationOutcome {
        self.track(tx_hash, required_confirmations)
            .instrument(self.span.clone())
            .await
    }

    async fn track(&self, tx_hash: TxHash, required_confirmations: u64) -> ConfirmationOutcome {
        let policy = BoundedBackoff::constant(self.config.retry_delay, self.config.max_attempts);
        let attempts = AtomicU32::new(0);

        let result = backoff::future::retry_notify(
            policy,
            || {
                let attempt = attempts.fetch_add(1, Ordering::Relaxed) + 1;
                self.attempt(tx_hash, required_confirmations, attempt)
            },
            |err: ProvisionError, delay: Duration| {
                warn!(%tx_hash, error = %err, ?delay, "Confirmation attempt failed, retrying");
            },
        )
        .await;

        let attempts = attempts.load(Ordering::Relaxed);
        match result {
            Ok(outcome @ ConfirmationOutcome::Confirmed(_)) => {
                info!(%tx_hash, attempts, "Transaction confirmed");
                outcome
            }
            Ok(outcome) => {
                error!(%tx_hash, attempts, "Transaction reverted on-chain");
                outcome
            }
            Err(ProvisionError::FatalRpcFailure(err)) => {
                error!(%tx_hash, attempts, error = %err, "Fatal RPC error while awaiting confirmation");
                ConfirmationOutcome::Unconfirmed(UnconfirmedReason::Fatal)
            }
            Err(err) => {
                error!(
                    %tx_hash,
                    attempts,
                    error = %err,
                    "Confirmation retries exhausted, transaction outcome unknown"
                );
                ConfirmationOutcome::Unconfirmed(UnconfirmedReason::Exhausted)
            }
        }
    }

    async fn attempt(
        &self,
        tx_hash: TxHash,
        required_confirmations: u64,
        attempt: u32,
    ) -> Result<ConfirmationOutcome, backoff::Error<ProvisionError>> {
        debug!(%tx_hash, attempt, max_attempts = self.config.max_attempts, "Polling for receipt");

        match self
            .gateway
            .poll_receipt(tx_hash, required_confirmations, self.config.attempt_timeout)
            .await
        {
            Ok(Some(receipt)) if receipt.status => Ok(ConfirmationOutcome::Confirmed(receipt)),
            Ok(Some(receipt)) => Ok(ConfirmationOutcome::Reverted(receipt)),
            Ok(None) => Err(backoff::Error::transient(ProvisionError::TransientRpcFailure(
                format!("no receipt within {:?}", self.config.attempt_timeout),
            ))),
            Err(err) if err.is_transient() => Err(backoff::Error::transient(
                ProvisionError::TransientRpcFailure(err.to_string()),
            )),
            Err(err) => Err(backoff::Error::permanent(ProvisionError::FatalRpcFailure(err))),
        }
    }
}
