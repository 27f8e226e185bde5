use alloy_primitives::Address;
use thiserror::Error;

use crate::models::token::TokenSymbol;

/// Errors surfaced by a [`ChainGateway`](crate::traits::ChainGateway).
///
/// Implementations are responsible for translating raw provider failures into these variants.
/// Consumers only ever branch on the variant, see [`GatewayError::is_transient`].
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GatewayError {
    /// The node cannot serve a receipt lookup yet, e.g. the block holding the transaction is
    /// still unknown to it.
    #[error("Receipt lookup not yet possible (code {code}): {message}")]
    ReceiptPending { code: i64, message: String },
    /// The endpoint is temporarily unreachable or rate limiting.
    #[error("RPC endpoint unavailable: {0}")]
    Unavailable(String),
    /// The node answered with an error it will keep answering with.
    #[error("RPC request rejected (code {code}): {message}")]
    Rejected { code: i64, message: String },
    #[error("No signing key registered for {0}")]
    UnknownSigner(Address),
    #[error("Failed to decode RPC response: {0}")]
    Decode(String),
    #[error("Transport error: {0}")]
    Transport(String),
}

impl GatewayError {
    /// Whether retrying the same request later may succeed.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::ReceiptPending { .. } | Self::Unavailable(_))
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RegistryError {
    #[error("Unknown token symbol: {0}")]
    UnknownSymbol(String),
    #[error("Token {0} is missing from the registry")]
    MissingToken(TokenSymbol),
    #[error("Address {0} is registered for more than one token")]
    DuplicateAddress(Address),
    #[error("Cannot pair token {0} with itself")]
    IdenticalTokens(Address),
    #[error("Invalid amount '{amount}': {reason}")]
    InvalidAmount { amount: String, reason: String },
}
