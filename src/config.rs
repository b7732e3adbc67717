//! Configuration for the flash loan executor
//!
//! Loaded from a TOML file, optionally overridden by environment variables
//! (a `.env` file is honoured):
//!
//! - `VALIDATOR`: RPC endpoint URL
//! - `FLASH_LOAN_PROGRAM`: lending program address
//! - `RESERVE`: default reserve address
//!
//! Pubkeys are written as base58 strings.

use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use solana_sdk::pubkey::Pubkey;

use crate::errors::{FlashLoanError, FlashLoanResult};
use crate::submission::SubmissionPolicy;

pub const ENV_VALIDATOR: &str = "VALIDATOR";
pub const ENV_FLASH_LOAN_PROGRAM: &str = "FLASH_LOAN_PROGRAM";
pub const ENV_RESERVE: &str = "RESERVE";

/// Main application configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct FlashLoanConfig {
    #[serde(default)]
    pub rpc: RpcConfig,

    #[serde(default)]
    pub program: ProgramConfig,

    #[serde(default)]
    pub wallet: WalletConfig,

    #[serde(default)]
    pub submission: SubmissionConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RpcConfig {
    /// Validator RPC endpoint
    #[serde(default = "default_rpc_url")]
    pub url: String,

    /// Request timeout in seconds
    #[serde(default = "default_rpc_timeout")]
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct ProgramConfig {
    /// Lending program the flash loan instructions target
    #[serde(default, with = "pubkey_string")]
    pub program_id: Pubkey,

    /// Reserve used when the CLI is not given one
    #[serde(default, with = "option_pubkey_string", skip_serializing_if = "Option::is_none")]
    pub reserve: Option<Pubkey>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WalletConfig {
    /// Path to the fee payer keypair file
    #[serde(default = "default_keypair_path")]
    pub keypair_path: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubmissionConfig {
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    #[serde(default = "default_backoff_step_units")]
    pub backoff_step_units: u32,

    #[serde(default = "default_poll_interval_units")]
    pub poll_interval_units: u32,

    /// Length of one time unit in milliseconds
    #[serde(default = "default_time_unit_ms")]
    pub time_unit_ms: u64,

    /// Stop waiting for finality after this many seconds
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub confirm_timeout_secs: Option<u64>,

    #[serde(default = "default_true")]
    pub reconcile_before_retry: bool,
}

// Default value functions
fn default_rpc_url() -> String { "http://127.0.0.1:8899".to_string() }
fn default_rpc_timeout() -> u64 { 30 }
fn default_keypair_path() -> String { "~/.config/solana/id.json".to_string() }
fn default_max_attempts() -> u32 { 3 }
fn default_backoff_step_units() -> u32 { 5 }
fn default_poll_interval_units() -> u32 { 1 }
fn default_time_unit_ms() -> u64 { 1_000 }
fn default_true() -> bool { true }

impl Default for RpcConfig {
    fn default() -> Self {
        Self {
            url: default_rpc_url(),
            timeout_secs: default_rpc_timeout(),
        }
    }
}

impl Default for WalletConfig {
    fn default() -> Self {
        Self {
            keypair_path: default_keypair_path(),
        }
    }
}

impl Default for SubmissionConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            backoff_step_units: default_backoff_step_units(),
            poll_interval_units: default_poll_interval_units(),
            time_unit_ms: default_time_unit_ms(),
            confirm_timeout_secs: None,
            reconcile_before_retry: default_true(),
        }
    }
}

impl SubmissionConfig {
    pub fn to_policy(&self) -> SubmissionPolicy {
        SubmissionPolicy {
            max_attempts: self.max_attempts,
            backoff_step_units: self.backoff_step_units,
            poll_interval_units: self.poll_interval_units,
            time_unit: Duration::from_millis(self.time_unit_ms),
            confirm_timeout: self.confirm_timeout_secs.map(Duration::from_secs),
            reconcile_before_retry: self.reconcile_before_retry,
        }
    }
}

impl FlashLoanConfig {
    /// Load configuration from a TOML file
    pub fn from_file(path: impl AsRef<Path>) -> FlashLoanResult<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            FlashLoanError::Configuration(format!("failed to read {}: {e}", path.display()))
        })?;
        toml::from_str(&content).map_err(|e| {
            FlashLoanError::Configuration(format!("failed to parse {}: {e}", path.display()))
        })
    }

    /// Defaults overridden by the process environment
    pub fn from_env() -> FlashLoanResult<Self> {
        dotenvy::dotenv().ok();
        let mut config = Self::default();
        config.apply_overrides(|key| std::env::var(key).ok())?;
        Ok(config)
    }

    /// Load configuration with environment variable overrides
    pub fn from_file_with_env(path: impl AsRef<Path>) -> FlashLoanResult<Self> {
        dotenvy::dotenv().ok();
        let mut config = Self::from_file(path)?;
        config.apply_overrides(|key| std::env::var(key).ok())?;
        Ok(config)
    }

    /// Apply `VALIDATOR`, `FLASH_LOAN_PROGRAM` and `RESERVE` from `lookup`
    pub fn apply_overrides<F>(&mut self, lookup: F) -> FlashLoanResult<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(url) = lookup(ENV_VALIDATOR) {
            self.rpc.url = url;
        }
        if let Some(program) = lookup(ENV_FLASH_LOAN_PROGRAM) {
            self.program.program_id = parse_pubkey(ENV_FLASH_LOAN_PROGRAM, &program)?;
        }
        if let Some(reserve) = lookup(ENV_RESERVE) {
            self.program.reserve = Some(parse_pubkey(ENV_RESERVE, &reserve)?);
        }
        Ok(())
    }

    pub fn validate(&self) -> FlashLoanResult<()> {
        if self.rpc.url.trim().is_empty() {
            return Err(FlashLoanError::Configuration("rpc.url is empty".to_string()));
        }
        if self.rpc.timeout_secs == 0 {
            return Err(FlashLoanError::Configuration(
                "rpc.timeout_secs must be at least 1".to_string(),
            ));
        }
        if self.program.program_id == Pubkey::default() {
            return Err(FlashLoanError::Configuration(format!(
                "program.program_id is not set (or set {ENV_FLASH_LOAN_PROGRAM})"
            )));
        }
        self.submission.to_policy().validate()
    }

    pub fn rpc_timeout(&self) -> Duration {
        Duration::from_secs(self.rpc.timeout_secs)
    }
}

fn parse_pubkey(field: &str, value: &str) -> FlashLoanResult<Pubkey> {
    Pubkey::from_str(value.trim()).map_err(|e| {
        FlashLoanError::Configuration(format!("{field}: invalid pubkey {value:?}: {e}"))
    })
}

mod pubkey_string {
    use std::str::FromStr;

    use serde::{Deserialize, Deserializer, Serializer};
    use solana_sdk::pubkey::Pubkey;

    pub fn serialize<S: Serializer>(key: &Pubkey, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(key)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Pubkey, D::Error> {
        let s = String::deserialize(deserializer)?;
        Pubkey::from_str(&s).map_err(serde::de::Error::custom)
    }
}

mod option_pubkey_string {
    use std::str::FromStr;

    use serde::{Deserialize, Deserializer, Serializer};
    use solana_sdk::pubkey::Pubkey;

    pub fn serialize<S: Serializer>(
        key: &Option<Pubkey>,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        match key {
            Some(key) => serializer.collect_str(key),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Option<Pubkey>, D::Error> {
        Option::<String>::deserialize(deserializer)?
            .map(|s| Pubkey::from_str(&s).map_err(serde::de::Error::custom))
            .transpose()
    }
}
