use std::{path::PathBuf, sync::Arc, time::Duration};

use alloy::signers::local::PrivateKeySigner;
use anyhow::{anyhow, bail, Context};
use clap::Parser;
use clmint_common::traits::ChainGateway;
use clmint_ethereum::{
    rpc::{config::GatewayConfig, errors::RPCError},
    EthereumGateway,
};
use futures::future::join_all;
use tracing::{info, info_span, warn};
use tracing_appender::{non_blocking::WorkerGuard, rolling};

use crate::{
    config::{ChainConfig, ProvisionerConfig, TrackerConfig},
    provisioner::LiquidityProvisioner,
};

/// clmint - provide full-range liquidity to a concentrated-liquidity AMM
///
/// Submits one position per signing key, concurrently, and waits for each to confirm.
#[derive(Parser, Debug, Clone, PartialEq)]
#[clap(version = env!("CARGO_PKG_VERSION"))]
struct CliArgs {
    /// JSON-RPC endpoint. Overrides the one of the chain config.
    #[clap(long, env = "RPC_URL")]
    rpc_url: Option<String>,

    /// Comma separated private keys, one submission is made per key.
    #[clap(long, env = "PRIVATE_KEYS", hide_env_values = true, value_delimiter = ',')]
    private_keys: Vec<String>,

    /// Chain config YAML. Defaults to the built-in Pharos testnet config.
    #[clap(long)]
    config: Option<PathBuf>,

    #[clap(long, default_value = "PHRS")]
    token_a: String,

    #[clap(long, default_value = "USDT")]
    token_b: String,

    /// Decimal amount of token A, e.g. 1.5
    #[clap(long)]
    amount_a: String,

    /// Decimal amount of token B, e.g. 3.0
    #[clap(long)]
    amount_b: String,

    /// Receipt lookups per transaction before its outcome is reported as unknown.
    #[clap(long, default_value = "5")]
    max_attempts: u32,

    /// Delay between two receipt lookups, in milliseconds.
    #[clap(long, default_value = "5000")]
    retry_delay_ms: u64,

    /// Logging folder path. Logs go to stdout if unset.
    #[clap(long)]
    log_folder: Option<String>,

    /// Enable verbose logging.
    #[clap(long)]
    verbose: bool,
}

impl CliArgs {
    fn validate(&self) -> Result<(), String> {
        if self.private_keys.is_empty() {
            return Err("At least one private key is required.".to_string());
        }
        if self.max_attempts == 0 {
            return Err("max_attempts must be at least 1.".to_string());
        }
        if self.token_a.eq_ignore_ascii_case(&self.token_b) {
            return Err("token_a and token_b must differ.".to_string());
        }
        Ok(())
    }

    fn provisioner_config(&self) -> ProvisionerConfig {
        ProvisionerConfig {
            tracker: TrackerConfig {
                max_attempts: self.max_attempts,
                retry_delay: Duration::from_millis(self.retry_delay_ms),
                ..TrackerConfig::default()
            },
            ..ProvisionerConfig::default()
        }
    }
}

fn setup_logging(args: &CliArgs) -> anyhow::Result<Option<WorkerGuard>> {
    let log_level = if args.verbose { "debug" } else { "info" };
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(log_level));

    match &args.log_folder {
        Some(folder) => {
            let (non_blocking, guard) =
                tracing_appender::non_blocking(rolling::never(folder, "clmint.log"));
            let subscriber = tracing_subscriber::fmt()
                .with_env_filter(env_filter)
                .with_writer(non_blocking)
                .finish();
            tracing::subscriber::set_global_default(subscriber)
                .map_err(|e| anyhow!("Failed to set up logging subscriber: {e}"))?;
            Ok(Some(guard))
        }
        None => {
            let subscriber = tracing_subscriber::fmt()
                .with_env_filter(env_filter)
                .finish();
            tracing::subscriber::set_global_default(subscriber)
                .map_err(|e| anyhow!("Failed to set up logging subscriber: {e}"))?;
            Ok(None)
        }
    }
}

/// Parses the signing keys. At most one key per address is accepted.
fn parse_keys(keys: &[String]) -> Result<Vec<PrivateKeySigner>, RPCError> {
    let mut signers: Vec<PrivateKeySigner> = Vec::with_capacity(keys.len());
    for (idx, key) in keys.iter().enumerate() {
        let signer = key
            .trim()
            .parse::<PrivateKeySigner>()
            .map_err(|e| RPCError::InvalidKey(format!("key #{idx}: {e}")))?;
        if signers
            .iter()
            .any(|known| known.address() == signer.address())
        {
            return Err(RPCError::InvalidKey(format!(
                "key #{idx}: duplicate key for {}",
                signer.address()
            )));
        }
        signers.push(signer);
    }
    Ok(signers)
}

pub async fn run_cli() -> anyhow::Result<()> {
    let args = CliArgs::parse();
    args.validate()
        .map_err(|e| anyhow!(e))?;
    let _guard = setup_logging(&args)?;

    let chain = match &args.config {
        Some(path) => ChainConfig::from_yaml(path)
            .with_context(|| format!("Failed to load chain config {}", path.display()))?,
        None => ChainConfig::pharos_testnet(),
    };
    let rpc_url = args
        .rpc_url
        .clone()
        .unwrap_or_else(|| chain.rpc_url.clone());
    let registry = Arc::new(chain.registry()?);

    let gateway = EthereumGateway::new(
        &rpc_url,
        parse_keys(&args.private_keys)?,
        GatewayConfig::new(chain.chain_id),
    )?;
    let identities = gateway.identities().to_vec();
    let gateway: Arc<dyn ChainGateway> = Arc::new(gateway);

    info!(chain = %chain.name, %rpc_url, signers = identities.len(), "Starting submissions");

    let config = args.provisioner_config();
    let provisioners: Vec<LiquidityProvisioner> = identities
        .into_iter()
        .map(|identity| {
            let span = info_span!("wallet", signer = %identity);
            LiquidityProvisioner::new(
                gateway.clone(),
                registry.clone(),
                Arc::new(identity),
                config,
                span,
            )
        })
        .collect();

    let results = join_all(provisioners.iter().map(|provisioner| {
        provisioner.add_liquidity(&args.token_a, &args.token_b, &args.amount_a, &args.amount_b)
    }))
    .await;

    let failed: Vec<_> = provisioners
        .iter()
        .zip(&results)
        .filter(|(_, result)| result.is_none())
        .map(|(provisioner, _)| provisioner.signer().to_string())
        .collect();

    if !failed.is_empty() {
        warn!(?failed, "Some submissions did not confirm");
        bail!("{} of {} submissions did not confirm", failed.len(), results.len());
    }

    info!(submissions = results.len(), "All submissions confirmed");
    Ok(())
}

#[cfg(test)]
mod cli_tests {
    use clap::Parser;
    use rstest::rstest;

    use super::*;

    fn parse(extra: &[&str]) -> CliArgs {
        let mut args = vec!["clmint", "--amount-a", "1.5", "--amount-b", "3.0"];
        args.extend_from_slice(extra);
        CliArgs::parse_from(args)
    }

    #[test]
    fn test_cli_args() {
        let args = parse(&[
            "--rpc-url",
            "http://localhost:8545",
            "--private-keys",
            "0x01,0x02",
            "--token-a",
            "usdc",
            "--max-attempts",
            "3",
            "--retry-delay-ms",
            "100",
            "--log-folder",
            "test_logs",
        ]);

        assert_eq!(args.rpc_url.as_deref(), Some("http://localhost:8545"));
        assert_eq!(args.private_keys, vec!["0x01".to_string(), "0x02".to_string()]);
        assert_eq!(args.token_a, "usdc");
        assert_eq!(args.token_b, "USDT");
        assert_eq!(args.amount_a, "1.5");
        assert_eq!(args.log_folder.as_deref(), Some("test_logs"));
        assert!(!args.verbose);

        let config = args.provisioner_config();
        assert_eq!(config.tracker.max_attempts, 3);
        assert_eq!(config.tracker.retry_delay, Duration::from_millis(100));
        assert_eq!(config.tracker.attempt_timeout, Duration::from_secs(60));
        assert_eq!(config.gas.fallback_gas_limit, 500_000);
    }

    #[test]
    fn test_validate_requires_keys() {
        let args = CliArgs { private_keys: vec![], ..parse(&["--private-keys", "0x01"]) };

        assert_eq!(args.validate(), Err("At least one private key is required.".to_string()));
    }

    #[rstest]
    #[case::zero_attempts(&["--private-keys", "0x01", "--max-attempts", "0"], "max_attempts must be at least 1.")]
    #[case::same_tokens(&["--private-keys", "0x01", "--token-a", "usdt"], "token_a and token_b must differ.")]
    fn test_validate_rejects(#[case] extra: &[&str], #[case] expected: &str) {
        assert_eq!(parse(extra).validate(), Err(expected.to_string()));
    }

    #[test]
    fn test_parse_keys() {
        let keys = vec![
            " 0xac0974bec39a17e36ba4a6b4d238ff944bacb478cbed5efcae784d7bf4f2ff80".to_string(),
            "not-a-key".to_string(),
        ];

        assert_eq!(parse_keys(&keys[..1]).unwrap().len(), 1);
        assert!(matches!(parse_keys(&keys), Err(RPCError::InvalidKey(msg)) if msg.starts_with("key #1")));
    }

    #[test]
    fn test_parse_keys_rejects_duplicate_signer() {
        let keys = vec![
            "0xac0974bec39a17e36ba4a6b4d238ff944bacb478cbed5efcae784d7bf4f2ff80".to_string(),
            "0x59c6995e998f97a5a0044966f0945389dc9e86dae88c7a8412f4603b6b78690d".to_string(),
            " AC0974BEC39A17E36BA4A6B4D238FF944BACB478CBED5EFCAE784D7BF4F2FF80".to_string(),
        ];

        assert_eq!(parse_keys(&keys[..2]).unwrap().len(), 2);
        assert!(matches!(
            parse_keys(&keys),
            Err(RPCError::InvalidKey(msg)) if msg.starts_with("key #2: duplicate key")
        ));
    }
}
