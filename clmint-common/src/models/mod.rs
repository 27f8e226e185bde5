pub mod error;
pub mod position;
pub mod token;
pub mod transaction;

use std::fmt::Display;

use alloy_primitives::Address;
use serde::{Deserialize, Serialize};

/// The account on whose behalf transactions are submitted.
///
/// Only the address and a log label live here. The capability to sign for the address is held
/// by whichever [`ChainGateway`](crate::traits::ChainGateway) the identity was registered with.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SignerIdentity {
    address: Address,
    label: String,
}

impl SignerIdentity {
    /// Creates an identity labelled with the truncated address, e.g. `0x1234ab...cdef`.
    pub fn new(address: Address) -> Self {
        let address_str = address.to_string();
        let label = if address_str.len() >= 10 {
            format!("{}...{}", &address_str[0..8], &address_str[address_str.len() - 4..])
        } else {
            address_str
        };
        Self { address, label }
    }

    pub fn address(&self) -> Address {
        self.address
    }

    pub fn label(&self) -> &str {
        &self.label
    }
}

impl Display for SignerIdentity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.label)
    }
}
