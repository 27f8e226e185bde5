use std::time::Duration;

use alloy::{
    network::EthereumWallet,
    primitives::{Address, Bytes, TxHash, TxKind, U256, U64},
    providers::{DynProvider, Provider, ProviderBuilder},
    rpc::{
        client::{ClientBuilder, ReqwestClient},
        types::{BlockNumberOrTag, TransactionInput, TransactionRequest},
    },
    signers::local::PrivateKeySigner,
    transports::http::reqwest,
};
use async_trait::async_trait;
use clmint_common::{
    models::{
        error::GatewayError,
        transaction::{CallRequest, TransactionReceipt},
        SignerIdentity,
    },
    traits::ChainGateway,
};
use serde::Deserialize;
use tracing::{debug, info, instrument, trace};

use crate::erc20::{decode_allowance, encode_allowance};

pub mod config;
pub mod errors;
mod retry;

use crate::rpc::{
    config::GatewayConfig,
    errors::{GatewayResultExt, RPCError},
    retry::RetryPolicy,
};

/// [`ChainGateway`] backed by a JSON-RPC endpoint.
///
/// Reads and receipt lookups go through the raw `ReqwestClient` with request-level retries.
/// Broadcasts go through a provider sharing the same transport, whose fillers sign with the
/// keys given at construction and fill nonce, gas price and chain id.
/// It is cheap to clone, both clients are reference counted internally.
#[derive(Clone)]
pub struct EthereumGateway {
    inner: ReqwestClient,
    provider: DynProvider,
    identities: Vec<SignerIdentity>,
    retry_policy: RetryPolicy,
    poll_interval: Duration,
    url: String,
}

impl std::fmt::Debug for EthereumGateway {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EthereumGateway")
            .field("url", &self.url)
            .field("identities", &self.identities)
            .field("poll_interval", &self.poll_interval)
            .finish_non_exhaustive()
    }
}

impl EthereumGateway {
    /// Creates a gateway for `rpc_url` able to broadcast on behalf of `signers`.
    pub fn new(
        rpc_url: &str,
        signers: Vec<PrivateKeySigner>,
        config: GatewayConfig,
    ) -> Result<Self, RPCError> {
        let url = rpc_url
            .parse()
            .map_err(|e| RPCError::SetupError(format!("Invalid RPC URL: {e}")))?;

        let http_client = reqwest::ClientBuilder::new()
            .timeout(Duration::from_secs(30))
            .connect_timeout(Duration::from_secs(10))
            .tcp_nodelay(true)
            .build()
            .map_err(|e| RPCError::SetupError(format!("Failed to create HTTP client: {e}")))?;

        let inner = ClientBuilder::default().http_with_client(http_client, url);

        let identities: Vec<SignerIdentity> = signers
            .iter()
            .map(|signer| SignerIdentity::new(signer.address()))
            .collect();

        let mut signers = signers.into_iter();
        let provider = match signers.next() {
            Some(first) => {
                let mut wallet = EthereumWallet::new(first);
                for signer in signers {
                    wallet.register_signer(signer);
                }
                ProviderBuilder::new()
                    .with_chain_id(config.chain_id)
                    .wallet(wallet)
                    .connect_client(inner.clone())
                    .erased()
            }
            None => ProviderBuilder::new()
                .with_chain_id(config.chain_id)
                .connect_client(inner.clone())
                .erased(),
        };

        Ok(Self {
            inner,
            provider,
            identities,
            retry_policy: config.retry.into(),
            poll_interval: config.poll_interval,
            url: rpc_url.to_string(),
        })
    }

    /// One identity per signing key, in the order the keys were given.
    pub fn identities(&self) -> &[SignerIdentity] {
        &self.identities
    }

    fn can_sign_for(&self, address: Address) -> bool {
        self.identities
            .iter()
            .any(|identity| identity.address() == address)
    }

    #[instrument(level = "debug", skip(self))]
    async fn get_block_number(&self) -> Result<u64, GatewayError> {
        let block_number: U64 = self
            .retry_policy
            .retry_request(|| async {
                self.inner
                    .request_noparams("eth_blockNumber")
                    .await
            })
            .await
            .gateway_context("Failed to get block number")?;

        Ok(block_number.to::<u64>())
    }

    #[instrument(level = "debug", skip(self))]
    async fn get_receipt(&self, tx_hash: TxHash) -> Result<Option<TransactionReceipt>, GatewayError> {
        // Only the receipt fields the submitter consumes.
        #[derive(Debug, Deserialize)]
        #[serde(rename_all = "camelCase")]
        struct RawReceipt {
            transaction_hash: TxHash,
            block_number: Option<U64>,
            gas_used: U64,
            status: Option<U64>,
        }

        impl From<RawReceipt> for TransactionReceipt {
            fn from(raw: RawReceipt) -> Self {
                TransactionReceipt {
                    transaction_hash: raw.transaction_hash,
                    block_number: raw.block_number.map(|n| n.to::<u64>()),
                    gas_used: raw.gas_used.to::<u64>(),
                    status: raw
                        .status
                        .is_some_and(|status| status == U64::from(1)),
                }
            }
        }

        let receipt: Option<RawReceipt> = self
            .retry_policy
            .retry_request(|| async {
                self.inner
                    .request("eth_getTransactionReceipt", (tx_hash,))
                    .await
            })
            .await
            .with_gateway_context(|| format!("Failed to get receipt of {tx_hash}"))?;

        Ok(receipt.map(Into::into))
    }

    /// Polls until the receipt of `tx_hash` sits `confirmations` blocks deep. Never returns on
    /// its own if the transaction is never included.
    async fn wait_for_receipt(
        &self,
        tx_hash: TxHash,
        confirmations: u64,
    ) -> Result<TransactionReceipt, GatewayError> {
        loop {
            if let Some(receipt) = self.get_receipt(tx_hash).await? {
                let Some(included_at) = receipt.block_number else {
                    trace!(%tx_hash, "Receipt without block number, still pending");
                    tokio::time::sleep(self.poll_interval).await;
                    continue;
                };

                if confirmations <= 1 {
                    return Ok(receipt);
                }

                let head = self.get_block_number().await?;
                let depth = head.saturating_sub(included_at) + 1;
                if depth >= confirmations {
                    return Ok(receipt);
                }
                trace!(%tx_hash, depth, confirmations, "Waiting for confirmations");
            }
            tokio::time::sleep(self.poll_interval).await;
        }
    }
}

fn to_transaction_request(request: &CallRequest) -> TransactionRequest {
    TransactionRequest {
        from: Some(request.from),
        to: Some(TxKind::Call(request.to)),
        value: Some(request.value),
        gas: request.gas_limit,
        input: TransactionInput::new(request.data.clone()),
        ..Default::default()
    }
}

#[async_trait]
impl ChainGateway for EthereumGateway {
    #[instrument(level = "debug", skip(self))]
    async fn read_allowance(
        &self,
        owner: Address,
        spender: Address,
        token: Address,
    ) -> Result<U256, GatewayError> {
        let call = TransactionRequest {
            to: Some(TxKind::Call(token)),
            input: TransactionInput::new(encode_allowance(owner, spender).into()),
            ..Default::default()
        };

        let output: Bytes = self
            .retry_policy
            .retry_request(|| async {
                self.inner
                    .request("eth_call", (call.clone(), BlockNumberOrTag::Latest))
                    .await
            })
            .await
            .with_gateway_context(|| format!("Failed to read allowance of {owner} on {token}"))?;

        decode_allowance(&output)
            .map_err(|e| GatewayError::Decode(format!("allowance of {owner} on {token}: {e}")))
    }

    #[instrument(level = "debug", skip_all, fields(from = %request.from, to = %request.to))]
    async fn estimate_gas(&self, request: &CallRequest) -> Result<u64, GatewayError> {
        let tx = to_transaction_request(request);

        let gas: U64 = self
            .retry_policy
            .retry_request(|| async {
                self.inner
                    .request("eth_estimateGas", (tx.clone(),))
                    .await
            })
            .await
            .with_gateway_context(|| format!("Failed to estimate gas of call to {}", request.to))?;

        Ok(gas.to::<u64>())
    }

    #[instrument(level = "debug", skip_all, fields(from = %request.from, to = %request.to))]
    async fn broadcast(&self, request: CallRequest) -> Result<TxHash, GatewayError> {
        if !self.can_sign_for(request.from) {
            return Err(GatewayError::UnknownSigner(request.from));
        }

        let pending = self
            .provider
            .send_transaction(to_transaction_request(&request))
            .await
            .with_gateway_context(|| {
                format!("Failed to broadcast transaction from {}", request.from)
            })?;

        let tx_hash = *pending.tx_hash();
        info!(%tx_hash, "Transaction accepted by node");
        Ok(tx_hash)
    }

    #[instrument(level = "debug", skip(self))]
    async fn poll_receipt(
        &self,
        tx_hash: TxHash,
        confirmations: u64,
        timeout: Duration,
    ) -> Result<Option<TransactionReceipt>, GatewayError> {
        match tokio::time::timeout(timeout, self.wait_for_receipt(tx_hash, confirmations)).await {
            Ok(receipt) => receipt.map(Some),
            Err(_) => {
                debug!(%tx_hash, ?timeout, "No receipt within timeout");
                Ok(None)
            }
        }
    }
}
