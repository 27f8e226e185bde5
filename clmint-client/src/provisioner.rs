//! Full-range liquidity provisioning.
//!
//! [`LiquidityProvisioner::add_liquidity`] drives one submission end to end: resolve the pair,
//! order it canonically, make sure the router may pull both legs, assemble the batched
//! `mint` + `refundETH` call, broadcast it and wait for its outcome.

use std::sync::Arc;

use alloy::primitives::TxHash;
use chrono::Utc;
use clmint_common::{
    models::{
        position::{CanonicalPair, PositionParams},
        token::TokenRegistry,
        transaction::CallRequest,
        SignerIdentity,
    },
    traits::ChainGateway,
};
use clmint_ethereum::position_manager::encode_mint_with_refund;
use tracing::{error, info, info_span, warn, Instrument, Span};

use crate::{
    approval::ApprovalManager,
    config::ProvisionerConfig,
    confirmation::ConfirmationTracker,
    errors::ProvisionError,
};

/// Confirmations the mint transaction needs to count as done.
const MINT_CONFIRMATIONS: u64 = 1;

pub struct LiquidityProvisioner {
    gateway: Arc<dyn ChainGateway>,
    registry: Arc<TokenRegistry>,
    signer: Arc<SignerIdentity>,
    approvals: ApprovalManager,
    tracker: Arc<ConfirmationTracker>,
    config: ProvisionerConfig,
    span: Span,
}

impl LiquidityProvisioner {
    /// Every log line of this provisioner and of the components it drives is emitted within
    /// `span`, which should identify the acting signer.
    pub fn new(
        gateway: Arc<dyn ChainGateway>,
        registry: Arc<TokenRegistry>,
        signer: Arc<SignerIdentity>,
        config: ProvisionerConfig,
        span: Span,
    ) -> Self {
        let tracker = Arc::new(ConfirmationTracker::new(
            gateway.clone(),
            config.tracker,
            info_span!(parent: &span, "confirmation"),
        ));
        let approvals = ApprovalManager::new(
            gateway.clone(),
            signer.clone(),
            tracker.clone(),
            info_span!(parent: &span, "approval"),
        );
        Self { gateway, registry, signer, approvals, tracker, config, span }
    }

    pub fn signer(&self) -> &SignerIdentity {
        &self.signer
    }

    /// Deposits `amount_a` of `token_a` and `amount_b` of `token_b` into a full-range position
    /// owned by the signer.
    ///
    /// Symbols are matched case-insensitively and amounts are decimal strings, e.g. `"1.5"`.
    ///
    /// returns: the hash of the confirmed mint transaction, `None` if the submission failed at
    /// any step or its outcome could not be determined. The reason is logged.
    pub async fn add_liquidity(
        &self,
        token_a: &str,
        token_b: &str,
        amount_a: &str,
        amount_b: &str,
    ) -> Option<TxHash> {
        async {
            match self
                .try_add_liquidity(token_a, token_b, amount_a, amount_b)
                .await
            {
                Ok(tx_hash) => {
                    info!(%tx_hash, "Liquidity added");
                    Some(tx_hash)
                }
                Err(err) => {
                    error!(token_a, token_b, error = %err, "Failed to add liquidity");
                    None
                }
            }
        }
        .instrument(self.span.clone())
        .await
    }

    async fn try_add_liquidity(
        &self,
        token_a: &str,
        token_b: &str,
        amount_a: &str,
        amount_b: &str,
    ) -> Result<TxHash, ProvisionError> {
        let descriptor_a = self.registry.resolve(token_a)?;
        let descriptor_b = self.registry.resolve(token_b)?;
        let pair = CanonicalPair::new(descriptor_a.address, descriptor_b.address)?;

        let amount_a = descriptor_a.parse_amount(amount_a)?;
        let amount_b = descriptor_b.parse_amount(amount_b)?;
        let (amount0, amount1) = pair.assign(descriptor_a.address, amount_a, amount_b);

        info!(
            token0 = %pair.token0,
            token1 = %pair.token1,
            %amount0,
            %amount1,
            "Providing full-range liquidity"
        );

        let router = self.registry.router();
        for (token, amount) in [(pair.token0, amount0), (pair.token1, amount1)] {
            if !self
                .approvals
                .ensure_approval(token, router, amount)
                .await
            {
                return Err(ProvisionError::ApprovalFailure {
                    token,
                    reason: "allowance could not be ensured".to_string(),
                });
            }
        }

        let now = u64::try_from(Utc::now().timestamp()).unwrap_or_default();
        let deadline = now + self.config.deadline_window.as_secs();
        let params =
            PositionParams::full_range(pair, amount0, amount1, self.signer.address(), deadline);
        let value = params.native_value(self.registry.wrapped_native());
        let request = CallRequest::new(self.signer.address(), router, encode_mint_with_refund(&params)?)
            .with_value(value);

        let gas_limit = self.gas_limit(&request).await;
        let tx_hash = self
            .gateway
            .broadcast(request.with_gas_limit(gas_limit))
            .await
            .map_err(ProvisionError::BroadcastFailure)?;
        info!(%tx_hash, gas_limit, %value, "Mint transaction sent");

        let outcome = self
            .tracker
            .await_confirmation(tx_hash, MINT_CONFIRMATIONS)
            .await;
        ProvisionError::check_outcome(tx_hash, outcome)?;
        Ok(tx_hash)
    }

    /// Estimated gas with the configured margin, or the fallback limit with the same margin if
    /// the node cannot estimate.
    async fn gas_limit(&self, request: &CallRequest) -> u64 {
        let base = match self.gateway.estimate_gas(request).await {
            Ok(estimate) => estimate,
            Err(err) => {
                let err = ProvisionError::EstimationFailure(err);
                warn!(
                    error = %err,
                    fallback = self.config.gas.fallback_gas_limit,
                    "Using fallback gas limit"
                );
                self.config.gas.fallback_gas_limit
            }
        };
        self.config.gas.with_margin(base)
    }
}

#[cfg(test)]
mod tests {
    use std::{sync::Mutex, time::Duration};

    use alloy::{
        primitives::{address, Address, U256},
        sol_types::SolCall,
    };
    use clmint_common::{
        models::{error::GatewayError, transaction::TransactionReceipt},
        traits::MockChainGateway,
    };
    use clmint_ethereum::{
        erc20::encode_approve,
        position_manager::{mintCall, multicallCall, MintParams},
    };
    use mockall::{
        predicate::{always, eq},
        Sequence,
    };
    use rstest::rstest;

    use super::*;
    use crate::config::ChainConfig;

    const SIGNER: Address = address!("00000000000000000000000000000000000000aa");
    const ROUTER: Address = address!("f8a1d4ff0f9b9af7ce58e1fc1833688f3bfd6115");
    const WPHRS: Address = address!("76aaada469d23216be5f7c596fa25f282ff9b364");
    const USDC: Address = address!("72df0bcd7276f2dfbac900d1ce63c272c4bccced");
    const USDT: Address = address!("d4071393f8716661958f766df660033b3d35fd29");

    fn mint_hash() -> TxHash {
        TxHash::repeat_byte(0xee)
    }

    fn approval_hash() -> TxHash {
        TxHash::repeat_byte(0xaa)
    }

    fn ether(units: u64, tenths: u64) -> U256 {
        U256::from(units) * U256::from(10).pow(U256::from(18)) +
            U256::from(tenths) * U256::from(10).pow(U256::from(17))
    }

    fn provisioner(gateway: MockChainGateway) -> LiquidityProvisioner {
        let registry = ChainConfig::pharos_testnet()
            .registry()
            .unwrap();
        LiquidityProvisioner::new(
            Arc::new(gateway),
            Arc::new(registry),
            Arc::new(SignerIdentity::new(SIGNER)),
            ProvisionerConfig::default(),
            Span::none(),
        )
    }

    fn receipt(status: bool) -> Option<TransactionReceipt> {
        Some(TransactionReceipt {
            transaction_hash: mint_hash(),
            block_number: Some(100),
            gas_used: 320_000,
            status,
        })
    }

    /// A gateway with unlimited router allowances on `tokens` that records the broadcast
    /// request.
    fn approved_gateway(
        tokens: [Address; 2],
        estimate: Result<u64, GatewayError>,
        sent: Arc<Mutex<Option<CallRequest>>>,
        mint_receipt: Option<TransactionReceipt>,
    ) -> MockChainGateway {
        let mut gateway = MockChainGateway::new();
        for token in tokens {
            gateway
                .expect_read_allowance()
                .with(eq(SIGNER), eq(ROUTER), eq(token))
                .times(1)
                .returning(|_, _, _| Ok(U256::MAX));
        }
        gateway
            .expect_estimate_gas()
            .times(1)
            .returning(move |_| estimate.clone());
        gateway
            .expect_broadcast()
            .times(1)
            .returning(move |request| {
                *sent.lock().unwrap() = Some(request);
                Ok(mint_hash())
            });
        gateway
            .expect_poll_receipt()
            .returning(move |_, _, _| Ok(mint_receipt.clone()));
        gateway
    }

    fn decode_mint(request: &CallRequest) -> MintParams {
        let multicall = multicallCall::abi_decode(&request.data).unwrap();
        mintCall::abi_decode(&multicall.data[0])
            .unwrap()
            .params
    }

    #[rstest]
    #[case::unknown_symbol("DOGE", "USDT", "1.5", "3.0")]
    #[case::identical_tokens("PHRS", "wphrs", "1.5", "3.0")]
    #[case::negative_amount("PHRS", "USDT", "-1", "3.0")]
    #[case::malformed_amount("PHRS", "USDT", "1.5", "three")]
    #[case::empty_amount("PHRS", "USDT", "", "3.0")]
    #[case::lone_point_amount("PHRS", "USDT", "1.5", ".")]
    #[case::too_precise_amount("PHRS", "USDT", "0.0000000000000000001", "3.0")]
    #[tokio::test(start_paused = true)]
    async fn test_invalid_input_never_contacts_gateway(
        #[case] token_a: &str,
        #[case] token_b: &str,
        #[case] amount_a: &str,
        #[case] amount_b: &str,
    ) {
        let mut gateway = MockChainGateway::new();
        gateway.expect_read_allowance().never();
        gateway.expect_estimate_gas().never();
        gateway.expect_broadcast().never();
        gateway.expect_poll_receipt().never();

        let result = provisioner(gateway)
            .add_liquidity(token_a, token_b, amount_a, amount_b)
            .await;

        assert_eq!(result, None);
    }

    #[rstest]
    #[case::native_first("PHRS", "USDT", "1.5", "3.0")]
    #[case::native_second("USDT", "PHRS", "3.0", "1.5")]
    #[tokio::test(start_paused = true)]
    async fn test_amounts_follow_canonical_order(
        #[case] token_a: &str,
        #[case] token_b: &str,
        #[case] amount_a: &str,
        #[case] amount_b: &str,
    ) {
        let sent = Arc::new(Mutex::new(None));
        let gateway = approved_gateway([WPHRS, USDT], Ok(250_000), sent.clone(), receipt(true));

        let result = provisioner(gateway)
            .add_liquidity(token_a, token_b, amount_a, amount_b)
            .await;

        assert_eq!(result, Some(mint_hash()));
        let request = sent.lock().unwrap().clone().unwrap();
        let mint = decode_mint(&request);
        assert_eq!(mint.token0, WPHRS);
        assert_eq!(mint.token1, USDT);
        assert_eq!(mint.amount0Desired, ether(1, 5));
        assert_eq!(mint.amount1Desired, ether(3, 0));
        assert_eq!(mint.recipient, SIGNER);
        assert_eq!(request.from, SIGNER);
        assert_eq!(request.to, ROUTER);
        assert_eq!(request.value, ether(1, 5));
        assert_eq!(request.gas_limit, Some(300_000));
    }

    #[tokio::test(start_paused = true)]
    async fn test_estimation_failure_falls_back() {
        let sent = Arc::new(Mutex::new(None));
        let gateway = approved_gateway(
            [WPHRS, USDT],
            Err(GatewayError::Rejected { code: 3, message: "execution reverted".to_string() }),
            sent.clone(),
            receipt(true),
        );

        let result = provisioner(gateway)
            .add_liquidity("PHRS", "USDT", "1.5", "3.0")
            .await;

        assert_eq!(result, Some(mint_hash()));
        let request = sent.lock().unwrap().clone().unwrap();
        assert_eq!(request.gas_limit, Some(600_000));
    }

    #[tokio::test(start_paused = true)]
    async fn test_no_native_value_without_wrapped_native_leg() {
        let sent = Arc::new(Mutex::new(None));
        let gateway = approved_gateway([USDC, USDT], Ok(400_000), sent.clone(), receipt(true));

        let result = provisioner(gateway)
            .add_liquidity("usdt", "usdc", "10", "20")
            .await;

        assert_eq!(result, Some(mint_hash()));
        let request = sent.lock().unwrap().clone().unwrap();
        let mint = decode_mint(&request);
        assert_eq!(mint.token0, USDC);
        assert_eq!(mint.amount0Desired, ether(20, 0));
        assert_eq!(mint.amount1Desired, ether(10, 0));
        assert_eq!(request.value, U256::ZERO);
    }

    #[tokio::test(start_paused = true)]
    async fn test_deadline_and_full_range() {
        let sent = Arc::new(Mutex::new(None));
        let gateway = approved_gateway([WPHRS, USDC], Ok(400_000), sent.clone(), receipt(true));
        let before = U256::from(Utc::now().timestamp());

        provisioner(gateway)
            .add_liquidity("PHRS", "USDC", "1", "1")
            .await;

        let mint = decode_mint(&sent.lock().unwrap().clone().unwrap());
        assert!(mint.deadline >= before + U256::from(1800));
        assert!(mint.deadline <= before + U256::from(1800 + 60));
        assert_eq!(mint.fee.to::<u32>(), 3000);
        assert_eq!(i32::try_from(mint.tickLower).unwrap(), -887220);
        assert_eq!(i32::try_from(mint.tickUpper).unwrap(), 887220);
        assert_eq!(mint.amount0Min, U256::ZERO);
        assert_eq!(mint.amount1Min, U256::ZERO);
    }

    #[tokio::test(start_paused = true)]
    async fn test_reverted_mint_yields_none() {
        let sent = Arc::new(Mutex::new(None));
        let gateway = approved_gateway([WPHRS, USDT], Ok(250_000), sent, receipt(false));

        let result = provisioner(gateway)
            .add_liquidity("PHRS", "USDT", "1.5", "3.0")
            .await;

        assert_eq!(result, None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_unknown_outcome_yields_none() {
        let sent = Arc::new(Mutex::new(None));
        let gateway = approved_gateway([WPHRS, USDT], Ok(250_000), sent, None);

        let start = tokio::time::Instant::now();
        let result = provisioner(gateway)
            .add_liquidity("PHRS", "USDT", "1.5", "3.0")
            .await;

        assert_eq!(result, None);
        assert_eq!(start.elapsed(), Duration::from_secs(20));
    }

    #[tokio::test(start_paused = true)]
    async fn test_short_allowance_is_approved_before_mint() {
        let mut gateway = MockChainGateway::new();
        let mut seq = Sequence::new();
        gateway
            .expect_read_allowance()
            .with(eq(SIGNER), eq(ROUTER), eq(WPHRS))
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_, _, _| Ok(ether(1, 5)));
        gateway
            .expect_read_allowance()
            .with(eq(SIGNER), eq(ROUTER), eq(USDT))
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_, _, _| Ok(ether(2, 9)));
        gateway
            .expect_broadcast()
            .withf(|request| {
                request.from == SIGNER &&
                    request.to == USDT &&
                    request.value == U256::ZERO &&
                    request.data[..] == encode_approve(ROUTER, U256::MAX)[..]
            })
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| Ok(approval_hash()));
        gateway
            .expect_poll_receipt()
            .with(eq(approval_hash()), eq(1u64), always())
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_, _, _| Ok(receipt(true)));
        gateway
            .expect_estimate_gas()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| Ok(250_000));
        gateway
            .expect_broadcast()
            .withf(|request| request.to == ROUTER)
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| Ok(mint_hash()));
        gateway
            .expect_poll_receipt()
            .with(eq(mint_hash()), eq(1u64), always())
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_, _, _| Ok(receipt(true)));

        let result = provisioner(gateway)
            .add_liquidity("USDT", "PHRS", "3.0", "1.5")
            .await;

        assert_eq!(result, Some(mint_hash()));
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_approval_aborts_before_mint() {
        let mut gateway = MockChainGateway::new();
        gateway
            .expect_read_allowance()
            .times(1)
            .returning(|_, _, _| Err(GatewayError::Unavailable("503".to_string())));
        gateway.expect_estimate_gas().never();
        gateway.expect_broadcast().never();

        let result = provisioner(gateway)
            .add_liquidity("PHRS", "USDT", "1.5", "3.0")
            .await;

        assert_eq!(result, None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_broadcast_failure_yields_none() {
        let mut gateway = MockChainGateway::new();
        gateway
            .expect_read_allowance()
            .returning(|_, _, _| Ok(U256::MAX));
        gateway
            .expect_estimate_gas()
            .returning(|_| Ok(250_000));
        gateway
            .expect_broadcast()
            .times(1)
            .returning(|_| Err(GatewayError::Rejected { code: -32000, message: "nonce too low".to_string() }));
        gateway.expect_poll_receipt().never();

        let result = provisioner(gateway)
            .add_liquidity("PHRS", "USDT", "1.5", "3.0")
            .await;

        assert_eq!(result, None);
    }
}
