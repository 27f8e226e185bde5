use std::fmt::Display;

use alloy::transports::{RpcError as AlloyRpcError, TransportErrorKind};
use clmint_common::models::error::GatewayError;
use thiserror::Error;

use super::retry::RpcErrorExt;

/// Alloy RPC error type alias for convenience.
pub(crate) type AlloyError = AlloyRpcError<TransportErrorKind>;

/// JSON-RPC error codes a node answers with while a receipt cannot be served yet.
///
/// `-32601`: the method is not (yet) available on the endpoint.
/// `-32001`: the requested resource, usually the block holding the receipt, is not known yet.
pub const RECEIPT_PENDING_CODES: [i64; 2] = [-32601, -32001];

/// Errors raised while setting up the gateway. Request failures are reported as
/// [`GatewayError`].
#[derive(Error, Debug)]
pub enum RPCError {
    #[error("RPC setup error: {0}")]
    SetupError(String),
    #[error("Invalid signing key: {0}")]
    InvalidKey(String),
}

/// Types an alloy error once, by JSON-RPC code, into the transient/fatal taxonomy the
/// submission flow works with.
pub(crate) fn classify(context: impl Display, error: AlloyError) -> GatewayError {
    if let AlloyRpcError::ErrorResp(payload) = &error {
        if RECEIPT_PENDING_CODES.contains(&payload.code) {
            return GatewayError::ReceiptPending {
                code: payload.code,
                message: format!("{context}: {}", payload.message),
            };
        }
    }

    if error.is_retryable() {
        return GatewayError::Unavailable(format!("{context}: {error}"));
    }

    match error {
        AlloyRpcError::ErrorResp(payload) => GatewayError::Rejected {
            code: payload.code,
            message: format!("{context}: {}", payload.message),
        },
        AlloyRpcError::DeserError { err, .. } => {
            GatewayError::Decode(format!("{context}: {err}"))
        }
        other => GatewayError::Transport(format!("{context}: {other}")),
    }
}

/// Extension trait for adding context to Results containing Alloy errors.
///
/// Similar to `anyhow::Context`, converts the error into a classified [`GatewayError`].
///
/// # Example
/// ```ignore
/// result.gateway_context(format!("Failed to read allowance of {owner}"))?;
///
/// // Lazily, to avoid format! on the success path:
/// result.with_gateway_context(|| format!("Failed to read allowance of {owner}"))?;
/// ```
pub(crate) trait GatewayResultExt<T> {
    fn gateway_context<C: Display>(self, context: C) -> Result<T, GatewayError>;

    fn with_gateway_context<C: Display, F: FnOnce() -> C>(self, f: F) -> Result<T, GatewayError>;
}

impl<T> GatewayResultExt<T> for Result<T, AlloyError> {
    fn gateway_context<C: Display>(self, context: C) -> Result<T, GatewayError> {
        self.map_err(|e| classify(context, e))
    }

    fn with_gateway_context<C: Display, F: FnOnce() -> C>(self, f: F) -> Result<T, GatewayError> {
        self.map_err(|e| classify(f(), e))
    }
}
