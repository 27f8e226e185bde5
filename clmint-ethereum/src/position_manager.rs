//! Bindings for the concentrated-liquidity position router.
//!
//! The router follows the Uniswap V3 `NonfungiblePositionManager` interface: `mint` opens a
//! position, `refundETH` returns native value the mint did not consume, and `multicall` runs
//! both inside one transaction.

use alloy::{
    core::sol,
    primitives::{Bytes, U256},
    sol_types::SolCall,
};
use clmint_common::models::position::PositionParams;
use thiserror::Error;

sol! {
    struct MintParams {
        address token0;
        address token1;
        uint24 fee;
        int24 tickLower;
        int24 tickUpper;
        uint256 amount0Desired;
        uint256 amount1Desired;
        uint256 amount0Min;
        uint256 amount1Min;
        address recipient;
        uint256 deadline;
    }

    function mint(MintParams params) external payable returns (uint256 tokenId, uint128 liquidity, uint256 amount0, uint256 amount1);
    function refundETH() external payable;
    function multicall(bytes[] data) external payable returns (bytes[] results);
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EncodeError {
    #[error("Value of {field} does not fit its ABI type: {reason}")]
    OutOfRange { field: &'static str, reason: String },
}

fn out_of_range<E: std::fmt::Display>(field: &'static str) -> impl FnOnce(E) -> EncodeError {
    move |err| EncodeError::OutOfRange { field, reason: err.to_string() }
}

impl TryFrom<&PositionParams> for MintParams {
    type Error = EncodeError;

    fn try_from(params: &PositionParams) -> Result<Self, Self::Error> {
        Ok(MintParams {
            token0: params.pair.token0,
            token1: params.pair.token1,
            fee: params.fee.try_into().map_err(out_of_range("fee"))?,
            tickLower: params.tick_lower.try_into().map_err(out_of_range("tick_lower"))?,
            tickUpper: params.tick_upper.try_into().map_err(out_of_range("tick_upper"))?,
            amount0Desired: params.amount0_desired,
            amount1Desired: params.amount1_desired,
            amount0Min: params.amount0_min,
            amount1Min: params.amount1_min,
            recipient: params.recipient,
            deadline: U256::from(params.deadline),
        })
    }
}

/// Encodes `multicall([mint(params), refundETH()])`.
///
/// The refund runs in the same transaction as the mint, so native value the pool did not take
/// goes back to the sender atomically.
pub fn encode_mint_with_refund(params: &PositionParams) -> Result<Bytes, EncodeError> {
    let mint = mintCall { params: MintParams::try_from(params)? }.abi_encode();
    let refund = refundETHCall {}.abi_encode();

    Ok(multicallCall { data: vec![mint.into(), refund.into()] }
        .abi_encode()
        .into())
}
