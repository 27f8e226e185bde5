use std::time::Duration;

use alloy_primitives::{Address, U256};
use serde::{Deserialize, Serialize};

use super::error::RegistryError;

/// Fee tier of the pool positions are minted into, in hundredths of a basis point.
pub const FEE_TIER: u32 = 3000;

/// Lowest usable tick for the 3000 fee tier (tick spacing 60).
pub const MIN_TICK: i32 = -887220;

/// Highest usable tick for the 3000 fee tier (tick spacing 60).
pub const MAX_TICK: i32 = 887220;

/// How long after assembly a mint call stays executable.
pub const DEADLINE_WINDOW: Duration = Duration::from_secs(1800);

/// A token pair in the order the AMM requires: `token0 < token1` by address value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CanonicalPair {
    pub token0: Address,
    pub token1: Address,
}

impl CanonicalPair {
    pub fn new(a: Address, b: Address) -> Result<Self, RegistryError> {
        if a == b {
            return Err(RegistryError::IdenticalTokens(a));
        }
        let (token0, token1) = if a < b { (a, b) } else { (b, a) };
        Ok(Self { token0, token1 })
    }

    /// Places the amounts given for `a` and the other token into `(amount0, amount1)` slots.
    pub fn assign<T>(&self, a: Address, amount_a: T, amount_b: T) -> (T, T) {
        if a == self.token0 {
            (amount_a, amount_b)
        } else {
            (amount_b, amount_a)
        }
    }
}

/// Everything the router needs to mint a full-range position.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PositionParams {
    pub pair: CanonicalPair,
    pub fee: u32,
    pub tick_lower: i32,
    pub tick_upper: i32,
    pub amount0_desired: U256,
    pub amount1_desired: U256,
    /// Always zero: the caller accepts execution risk.
    pub amount0_min: U256,
    pub amount1_min: U256,
    pub recipient: Address,
    /// Unix timestamp in seconds.
    pub deadline: u64,
}

impl PositionParams {
    /// Full-range parameters at [`FEE_TIER`] with no minimum-output protection.
    ///
    /// `deadline` is a unix timestamp in seconds, usually assembly time plus [`DEADLINE_WINDOW`].
    pub fn full_range(
        pair: CanonicalPair,
        amount0_desired: U256,
        amount1_desired: U256,
        recipient: Address,
        deadline: u64,
    ) -> Self {
        Self {
            pair,
            fee: FEE_TIER,
            tick_lower: MIN_TICK,
            tick_upper: MAX_TICK,
            amount0_desired,
            amount1_desired,
            amount0_min: U256::ZERO,
            amount1_min: U256::ZERO,
            recipient,
            deadline,
        }
    }

    /// Native value to attach: the desired amount of the wrapped-native leg, zero otherwise.
    pub fn native_value(&self, wrapped_native: Address) -> U256 {
        if self.pair.token0 == wrapped_native {
            self.amount0_desired
        } else if self.pair.token1 == wrapped_native {
            self.amount1_desired
        } else {
            U256::ZERO
        }
    }
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;
    use crate::models::token::tests::{USDC, USDT, WPHRS};

    #[rstest]
    #[case::wphrs_usdt(WPHRS, USDT)]
    #[case::wphrs_usdc(WPHRS, USDC)]
    #[case::usdc_usdt(USDC, USDT)]
    fn test_canonical_order_is_symmetric(#[case] a: Address, #[case] b: Address) {
        let forward = CanonicalPair::new(a, b).unwrap();
        let backward = CanonicalPair::new(b, a).unwrap();

        assert_eq!(forward, backward);
        assert!(forward.token0 < forward.token1);
    }

    #[test]
    fn test_canonical_order_by_address_value() {
        let pair = CanonicalPair::new(USDT, WPHRS).unwrap();

        // 0x76aa... < 0xd407...
        assert_eq!(pair.token0, WPHRS);
        assert_eq!(pair.token1, USDT);
    }

    #[test]
    fn test_identical_tokens_rejected() {
        assert_eq!(CanonicalPair::new(USDC, USDC), Err(RegistryError::IdenticalTokens(USDC)));
    }

    #[test]
    fn test_assign_follows_canonical_slots() {
        let pair = CanonicalPair::new(USDT, WPHRS).unwrap();

        assert_eq!(pair.assign(USDT, "usdt", "wphrs"), ("wphrs", "usdt"));
        assert_eq!(pair.assign(WPHRS, "wphrs", "usdt"), ("wphrs", "usdt"));
    }

    #[test]
    fn test_full_range_params() {
        let pair = CanonicalPair::new(WPHRS, USDT).unwrap();

        let params =
            PositionParams::full_range(pair, U256::from(1), U256::from(2), Address::ZERO, 2_800);

        assert_eq!(params.fee, 3000);
        assert_eq!(params.tick_lower, -887220);
        assert_eq!(params.tick_upper, 887220);
        assert_eq!(params.amount0_min, U256::ZERO);
        assert_eq!(params.amount1_min, U256::ZERO);
        assert_eq!(params.deadline, 2_800);
    }

    #[test]
    fn test_full_range_ticks_align_with_tick_spacing() {
        assert_eq!(MIN_TICK % 60, 0);
        assert_eq!(MAX_TICK % 60, 0);
    }

    #[rstest]
    #[case::native_given_first(WPHRS, USDT, U256::from(1))]
    #[case::native_given_second(USDT, WPHRS, U256::from(2))]
    #[case::no_native_leg(USDC, USDT, U256::ZERO)]
    fn test_native_value(#[case] a: Address, #[case] b: Address, #[case] expected: U256) {
        let pair = CanonicalPair::new(a, b).unwrap();
        let (amount0, amount1) = pair.assign(a, U256::from(1), U256::from(2));
        let params = PositionParams::full_range(pair, amount0, amount1, Address::ZERO, 0);

        assert_eq!(params.native_value(WPHRS), expected);
    }
}
