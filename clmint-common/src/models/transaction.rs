use std::fmt::Display;

use alloy_primitives::{Address, Bytes, TxHash, U256};
use serde::{Deserialize, Serialize};

/// A state-changing call to be signed by `from` and broadcast.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CallRequest {
    pub from: Address,
    pub to: Address,
    pub data: Bytes,
    pub value: U256,
    /// Left to the gateway when `None`.
    pub gas_limit: Option<u64>,
}

impl CallRequest {
    pub fn new(from: Address, to: Address, data: impl Into<Bytes>) -> Self {
        Self { from, to, data: data.into(), value: U256::ZERO, gas_limit: None }
    }

    pub fn with_value(mut self, value: U256) -> Self {
        self.value = value;
        self
    }

    pub fn with_gas_limit(mut self, gas_limit: u64) -> Self {
        self.gas_limit = Some(gas_limit);
        self
    }
}

/// The subset of an execution receipt the submitter cares about.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionReceipt {
    pub transaction_hash: TxHash,
    pub block_number: Option<u64>,
    pub gas_used: u64,
    /// `true` when the transaction executed successfully (status code 1).
    pub status: bool,
}

/// Why a transaction could not be confirmed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnconfirmedReason {
    /// A non-retryable RPC error ended polling early.
    Fatal,
    /// Every attempt hit a transient condition. The transaction may still land later.
    Exhausted,
}

impl Display for UnconfirmedReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            UnconfirmedReason::Fatal => write!(f, "fatal RPC error"),
            UnconfirmedReason::Exhausted => write!(f, "retries exhausted"),
        }
    }
}

/// Terminal result of waiting for a broadcast transaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfirmationOutcome {
    Confirmed(TransactionReceipt),
    /// Included on-chain with a failure status.
    Reverted(TransactionReceipt),
    Unconfirmed(UnconfirmedReason),
}

impl ConfirmationOutcome {
    /// The receipt of a successfully executed transaction, `None` for every other outcome.
    pub fn into_receipt(self) -> Option<TransactionReceipt> {
        match self {
            ConfirmationOutcome::Confirmed(receipt) => Some(receipt),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn receipt(status: bool) -> TransactionReceipt {
        TransactionReceipt {
            transaction_hash: TxHash::repeat_byte(0xab),
            block_number: Some(10),
            gas_used: 21_000,
            status,
        }
    }

    #[test]
    fn test_only_confirmed_yields_receipt() {
        assert_eq!(ConfirmationOutcome::Confirmed(receipt(true)).into_receipt(), Some(receipt(true)));
        assert_eq!(ConfirmationOutcome::Reverted(receipt(false)).into_receipt(), None);
        assert_eq!(
            ConfirmationOutcome::Unconfirmed(UnconfirmedReason::Exhausted).into_receipt(),
            None
        );
    }

    #[test]
    fn test_call_request_builder() {
        let request = CallRequest::new(Address::ZERO, Address::repeat_byte(1), vec![1u8, 2, 3])
            .with_value(U256::from(5))
            .with_gas_limit(600_000);

        assert_eq!(request.data, Bytes::from(vec![1u8, 2, 3]));
        assert_eq!(request.value, U256::from(5));
        assert_eq!(request.gas_limit, Some(600_000));
    }

    #[test]
    fn test_unconfirmed_reason_display() {
        assert_eq!(UnconfirmedReason::Fatal.to_string(), "fatal RPC error");
        assert_eq!(UnconfirmedReason::Exhausted.to_string(), "retries exhausted");
    }
}
