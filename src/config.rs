//! Configuration for the relay client.
//!
//! A single JSON file names the L1 and L2 chains, the deployment record of each
//! network, the signer key shared by all of them, and what the run should do:
//! configure the L1 allowlist, register a name, withdraw stranded balances.
//!
//! Secrets and URLs can be given inline or as environment variable references
//! through [`LiteralOrEnv`]:
//!
//! ```json
//! {
//!   "signer": "$DEPLOYER_PRIVATE_KEY",
//!   "l1": "eip155:11155111",
//!   "l2": "eip155:84532",
//!   "deployments": {
//!     "eip155:11155111": { "rpc": [{ "http": "$ETH_SEPOLIA_RPC_URL" }], "endpoint": "0x..." },
//!     "eip155:84532": { "rpc": [{ "http": "${BASE_SEPOLIA_RPC_URL}" }], "endpoint": "0x..." }
//!   }
//! }
//! ```

use alloy_primitives::utils::{format_ether, parse_ether};
use alloy_primitives::{B256, Bytes, U256};
use clap::Parser;
use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};
use std::fs;
use std::ops::Deref;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use url::Url;

use crate::chain::ChainId;
use crate::chain::eip155::ChecksummedAddress;
use crate::deployment::DeploymentRegistry;
use crate::payment::Allowance;

/// CLI arguments for the relay client.
#[derive(Parser, Debug)]
#[command(name = "ens-ccip-relay")]
#[command(about = "Register ENS names from an L2 through a CCIP relay")]
struct CliArgs {
    /// Path to the JSON configuration file
    #[arg(long, short, env = "CONFIG", default_value = "config.json")]
    config: PathBuf,
}

/// RPC provider configuration for a single provider.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RpcConfig {
    /// HTTP URL for the RPC endpoint.
    pub http: LiteralOrEnv<Url>,
    /// Rate limit for requests per second (optional).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rate_limit: Option<u32>,
}

/// A transparent wrapper that resolves environment variables during deserialization.
///
/// Supports both literal values and environment variable references:
/// - Literal: `"https://sepolia.base.org"`
/// - Simple env var: `"$BASE_SEPOLIA_RPC_URL"`
/// - Braced env var: `"${BASE_SEPOLIA_RPC_URL}"`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LiteralOrEnv<T>(T);

impl<T> LiteralOrEnv<T> {
    pub fn from_literal(value: T) -> Self {
        Self(value)
    }

    pub fn inner(&self) -> &T {
        &self.0
    }

    pub fn into_inner(self) -> T {
        self.0
    }

    /// Returns the variable name if `s` matches `$VAR` or `${VAR}`.
    fn parse_env_var_syntax(s: &str) -> Option<&str> {
        if let Some(braced) = s.strip_prefix("${").and_then(|rest| rest.strip_suffix('}')) {
            Some(braced)
        } else if let Some(var_name) = s.strip_prefix('$') {
            let valid = !var_name.is_empty()
                && var_name.chars().all(|c| c.is_alphanumeric() || c == '_');
            valid.then_some(var_name)
        } else {
            None
        }
    }
}

impl<T> Deref for LiteralOrEnv<T> {
    type Target = T;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl<'de, T> Deserialize<'de> for LiteralOrEnv<T>
where
    T: FromStr,
    T::Err: Display,
{
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;

        let value = match Self::parse_env_var_syntax(&s) {
            Some(var_name) => std::env::var(var_name).map_err(|_| {
                serde::de::Error::custom(format!(
                    "Environment variable '{var_name}' not found (referenced as '{s}')"
                ))
            })?,
            None => s,
        };

        let parsed = value
            .parse::<T>()
            .map_err(|e| serde::de::Error::custom(format!("Failed to parse value: {e}")))?;

        Ok(LiteralOrEnv(parsed))
    }
}

impl<T> Serialize for LiteralOrEnv<T>
where
    T: Serialize,
{
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        self.0.serialize(serializer)
    }
}

/// A validated EVM private key (32 bytes).
///
/// The same key signs on every configured network.
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct EvmPrivateKey(B256);

impl EvmPrivateKey {
    pub fn as_bytes(&self) -> &[u8; 32] {
        self.0.as_ref()
    }
}

impl std::fmt::Debug for EvmPrivateKey {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str("EvmPrivateKey(..)")
    }
}

impl FromStr for EvmPrivateKey {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        B256::from_str(s)
            .map(Self)
            .map_err(|e| format!("Invalid evm private key: {e}"))
    }
}

/// An amount of native currency written in ether, e.g. `"0.04"`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct EtherAmount(U256);

impl EtherAmount {
    pub fn from_wei(wei: U256) -> Self {
        Self(wei)
    }

    pub fn wei(&self) -> U256 {
        self.0
    }
}

impl FromStr for EtherAmount {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        parse_ether(s.trim())
            .map(Self)
            .map_err(|e| format!("Invalid ether amount {s}: {e}"))
    }
}

impl Display for EtherAmount {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ETH", format_ether(self.0))
    }
}

impl<'de> Deserialize<'de> for EtherAmount {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// The name to register and the exact parameters committed to.
///
/// Addresses stay textual here and are validated when the request is built, so a
/// malformed owner surfaces as an invalid-address error rather than a parse error.
#[derive(Debug, Clone, Deserialize)]
pub struct RegistrationConfig {
    pub name: String,
    /// Defaults to the signer address.
    #[serde(default)]
    pub owner: Option<String>,
    pub duration: u64,
    pub secret: LiteralOrEnv<B256>,
    #[serde(default)]
    pub resolver: Option<String>,
    #[serde(default)]
    pub resolver_data: Vec<Bytes>,
    #[serde(default)]
    pub reverse_record: bool,
    #[serde(default)]
    pub fuses: u16,
    /// Native value attached to `register`, forwarded to the registrar as rent.
    pub payment: EtherAmount,
}

/// Sweep the native balance of both endpoints.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct WithdrawConfig {
    /// Defaults to the signer address.
    #[serde(default)]
    pub beneficiary: Option<ChecksummedAddress>,
}

/// Pacing of the registration flow.
#[derive(Debug, Clone, Deserialize)]
pub struct FlowConfig {
    #[serde(default = "config_defaults::poll_interval_secs")]
    pub poll_interval_secs: u64,
    /// How long to wait for a relayed commit to appear on L1.
    #[serde(default = "config_defaults::delivery_timeout_secs")]
    pub delivery_timeout_secs: u64,
    #[serde(default)]
    pub allowance: Allowance,
}

impl Default for FlowConfig {
    fn default() -> Self {
        Self {
            poll_interval_secs: config_defaults::poll_interval_secs(),
            delivery_timeout_secs: config_defaults::delivery_timeout_secs(),
            allowance: Allowance::default(),
        }
    }
}

pub mod config_defaults {
    pub const DEFAULT_POLL_INTERVAL_SECS: u64 = 15;
    pub const DEFAULT_DELIVERY_TIMEOUT_SECS: u64 = 60 * 60;

    pub fn poll_interval_secs() -> u64 {
        DEFAULT_POLL_INTERVAL_SECS
    }

    pub fn delivery_timeout_secs() -> u64 {
        DEFAULT_DELIVERY_TIMEOUT_SECS
    }
}

/// Relay client configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    signer: LiteralOrEnv<EvmPrivateKey>,
    l1: ChainId,
    l2: ChainId,
    deployments: DeploymentRegistry,
    /// Authorize the L2 endpoint on the L1 endpoint before anything else.
    #[serde(default)]
    configure_allowlist: bool,
    #[serde(default)]
    registration: Option<RegistrationConfig>,
    #[serde(default)]
    withdraw: Option<WithdrawConfig>,
    #[serde(default)]
    flow: FlowConfig,
}

/// Configuration error types.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file at {0}: {1}")]
    FileRead(PathBuf, std::io::Error),
    #[error("Failed to parse config file: {0}")]
    JsonParse(#[from] serde_json::Error),
    #[error("No deployment configured for {0}")]
    MissingDeployment(ChainId),
    #[error("L1 and L2 must be different chains, both are {0}")]
    SameChain(ChainId),
}

impl Config {
    pub fn signer(&self) -> &EvmPrivateKey {
        self.signer.inner()
    }

    pub fn l1(&self) -> &ChainId {
        &self.l1
    }

    pub fn l2(&self) -> &ChainId {
        &self.l2
    }

    pub fn deployments(&self) -> &DeploymentRegistry {
        &self.deployments
    }

    pub fn configure_allowlist(&self) -> bool {
        self.configure_allowlist
    }

    pub fn registration(&self) -> Option<&RegistrationConfig> {
        self.registration.as_ref()
    }

    pub fn withdraw(&self) -> Option<&WithdrawConfig> {
        self.withdraw.as_ref()
    }

    pub fn flow(&self) -> &FlowConfig {
        &self.flow
    }

    /// Load configuration from CLI arguments and JSON file.
    ///
    /// The config file path is `--config <path>`, then `$CONFIG`, then `./config.json`.
    pub fn load() -> Result<Self, ConfigError> {
        let cli_args = CliArgs::parse();
        let config_path = Path::new(&cli_args.config)
            .canonicalize()
            .map_err(|e| ConfigError::FileRead(cli_args.config, e))?;
        Self::load_from_path(config_path)
    }

    fn load_from_path(path: PathBuf) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(&path).map_err(|e| ConfigError::FileRead(path, e))?;
        Self::from_json(&content)
    }

    /// Parses and checks a configuration document.
    pub fn from_json(content: &str) -> Result<Self, ConfigError> {
        let config: Config = serde_json::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.l1 == self.l2 {
            return Err(ConfigError::SameChain(self.l1.clone()));
        }
        for chain in [&self.l1, &self.l2] {
            if self.deployments.by_chain_id(chain).is_none() {
                return Err(ConfigError::MissingDeployment(chain.clone()));
            }
        }
        Ok(())
    }
}
