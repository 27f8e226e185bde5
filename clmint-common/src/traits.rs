use std::time::Duration;

use alloy_primitives::{Address, TxHash, U256};
use async_trait::async_trait;

use crate::models::{
    error::GatewayError,
    transaction::{CallRequest, TransactionReceipt},
};

/// The RPC primitives the liquidity submitter needs from a chain.
///
/// Implementations hold the signing keys for the identities they broadcast for, so a single
/// gateway can be shared by reference between concurrent submissions from different signers.
#[cfg_attr(feature = "test-utils", mockall::automock)]
#[async_trait]
pub trait ChainGateway: Send + Sync {
    /// Current allowance granted by `owner` to `spender` on the ERC20 `token`.
    async fn read_allowance(
        &self,
        owner: Address,
        spender: Address,
        token: Address,
    ) -> Result<U256, GatewayError>;

    /// Gas the node expects `request` to consume.
    async fn estimate_gas(&self, request: &CallRequest) -> Result<u64, GatewayError>;

    /// Signs `request` with the key registered for `request.from` and broadcasts it.
    ///
    /// Returns as soon as the node accepted the transaction, not when it is included.
    async fn broadcast(&self, request: CallRequest) -> Result<TxHash, GatewayError>;

    /// Waits up to `timeout` for the receipt of `tx_hash` to reach `confirmations` blocks of
    /// depth.
    ///
    /// returns: `Ok(None)` if the timeout elapsed first. Receipts are returned regardless of
    /// their execution status.
    async fn poll_receipt(
        &self,
        tx_hash: TxHash,
        confirmations: u64,
        timeout: Duration,
    ) -> Result<Option<TransactionReceipt>, GatewayError>;
}
