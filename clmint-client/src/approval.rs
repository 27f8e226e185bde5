use std::sync::Arc;

use alloy::primitives::{Address, U256};
use clmint_common::{
    models::{transaction::CallRequest, SignerIdentity},
    traits::ChainGateway,
};
use clmint_ethereum::erc20::encode_approve;
use tracing::{debug, error, info, Instrument, Span};

use crate::{confirmation::ConfirmationTracker, errors::ProvisionError};

/// Confirmations an approval needs before the flow relies on it.
const APPROVAL_CONFIRMATIONS: u64 = 1;

/// Makes sure the signer's allowances cover what the router is about to pull.
pub struct ApprovalManager {
    gateway: Arc<dyn ChainGateway>,
    signer: Arc<SignerIdentity>,
    tracker: Arc<ConfirmationTracker>,
    span: Span,
}

impl ApprovalManager {
    pub fn new(
        gateway: Arc<dyn ChainGateway>,
        signer: Arc<SignerIdentity>,
        tracker: Arc<ConfirmationTracker>,
        span: Span,
    ) -> Self {
        Self { gateway, signer, tracker, span }
    }

    /// Ensures `spender` may transfer at least `required` of `token` from the signer.
    ///
    /// A sufficient allowance is left untouched. Otherwise an unlimited approval is submitted
    /// and awaited. Returns `false` on any failure, in which case the caller must not proceed.
    pub async fn ensure_approval(&self, token: Address, spender: Address, required: U256) -> bool {
        async {
            match self
                .try_ensure_approval(token, spender, required)
                .await
            {
                Ok(()) => true,
                Err(err) => {
                    error!(%token, %spender, error = %err, "Failed to ensure approval");
                    false
                }
            }
        }
        .instrument(self.span.clone())
        .await
    }

    async fn try_ensure_approval(
        &self,
        token: Address,
        spender: Address,
        required: U256,
    ) -> Result<(), ProvisionError> {
        let owner = self.signer.address();
        let allowance = self
            .gateway
            .read_allowance(owner, spender, token)
            .await
            .map_err(|err| ProvisionError::ApprovalFailure {
                token,
                reason: format!("allowance read failed: {err}"),
            })?;

        if allowance >= required {
            debug!(%token, %spender, %allowance, %required, "Allowance sufficient, skipping approval");
            return Ok(());
        }

        info!(%token, %spender, %allowance, %required, "Approving spender");
        let request = CallRequest::new(owner, token, encode_approve(spender, U256::MAX));
        let tx_hash = self
            .gateway
            .broadcast(request)
            .await
            .map_err(ProvisionError::BroadcastFailure)?;

        let outcome = self
            .tracker
            .await_confirmation(tx_hash, APPROVAL_CONFIRMATIONS)
            .await;
        ProvisionError::check_outcome(tx_hash, outcome)?;

        info!(%token, %spender, %tx_hash, "Approval confirmed");
        Ok(())
    }
}
