use alloy::primitives::{Address, TxHash};
use clmint_common::models::{
    error::{GatewayError, RegistryError},
    transaction::{ConfirmationOutcome, TransactionReceipt, UnconfirmedReason},
};
use clmint_ethereum::position_manager::EncodeError;
use thiserror::Error;

/// Everything that can stop a submission.
///
/// These never cross the public boundary of the flow: they are logged and turned into `false`
/// or `None` by the component that hit them.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProvisionError {
    #[error("Invalid input: {0}")]
    InvalidInput(#[from] RegistryError),
    #[error("Approval of {token} failed: {reason}")]
    ApprovalFailure { token: Address, reason: String },
    #[error("Gas estimation failed: {0}")]
    EstimationFailure(GatewayError),
    #[error("Failed to encode mint call: {0}")]
    Encoding(#[from] EncodeError),
    #[error("Broadcast failed: {0}")]
    BroadcastFailure(GatewayError),
    #[error("Transient RPC failure: {0}")]
    TransientRpcFailure(String),
    #[error("Fatal RPC failure: {0}")]
    FatalRpcFailure(GatewayError),
    #[error("Transaction {0} reverted on-chain")]
    RevertedOnChain(TxHash),
    #[error("Outcome of transaction {tx_hash} unknown: {reason}")]
    ConfirmationUnknown { tx_hash: TxHash, reason: UnconfirmedReason },
}

impl ProvisionError {
    /// Turns a confirmation outcome into the receipt of a successful transaction or the
    /// matching error.
    pub fn check_outcome(
        tx_hash: TxHash,
        outcome: ConfirmationOutcome,
    ) -> Result<TransactionReceipt, ProvisionError> {
        match outcome {
            ConfirmationOutcome::Confirmed(receipt) => Ok(receipt),
            ConfirmationOutcome::Reverted(_) => Err(ProvisionError::RevertedOnChain(tx_hash)),
            ConfirmationOutcome::Unconfirmed(reason) => {
                Err(ProvisionError::ConfirmationUnknown { tx_hash, reason })
            }
        }
    }
}
