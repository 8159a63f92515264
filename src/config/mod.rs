//! Configuration management for the creditor bank.
//!
//! Loads settings from environment variables and config files.

use anyhow::{Context, Result};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Main application configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Bank contract parameters
    #[serde(default)]
    pub bank: BankConfig,
    /// Chain RPC endpoint
    #[serde(default)]
    pub chain: ChainConfig,
    /// Local table storage
    #[serde(default)]
    pub storage: StorageConfig,
    /// Heartbeat scheduling
    #[serde(default)]
    pub rotation: RotationConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BankConfig {
    /// Account the bank contract is deployed on
    #[serde(default = "default_code_account")]
    pub code_account: String,
    /// Account billed for table writes
    #[serde(default = "default_code_account")]
    pub ram_payer: String,
    /// Permission used to authorize rotation notifications
    #[serde(default = "default_notify_permission")]
    pub notify_permission: String,
    /// System token symbol, e.g. "4,EOS"
    #[serde(default = "default_system_symbol")]
    pub system_symbol: String,
    /// Balance the active free creditor must exceed, in whole tokens
    #[serde(default = "default_min_free_creditor_balance")]
    pub min_free_creditor_balance: Decimal,
    /// Creditor income share when no dividend record exists (0-100)
    #[serde(default = "default_dividend_percentage")]
    pub default_dividend_percentage: u8,
    /// Maximum number of creditors one order may be split across
    #[serde(default = "default_max_order_splits")]
    pub max_order_splits: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChainConfig {
    /// Node HTTP API base URL
    #[serde(default = "default_rpc_url")]
    pub rpc_url: String,
    /// Contract holding the system token balances
    #[serde(default = "default_token_contract")]
    pub token_contract: String,
    /// Request timeout in seconds
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// SQLite database path
    #[serde(default = "default_db_path")]
    pub db_path: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RotationConfig {
    /// Seconds between heartbeat rotations in `run`
    #[serde(default = "default_interval_secs")]
    pub interval_secs: u64,
}

// Default value functions
fn default_code_account() -> String {
    "bankofstaked".to_string()
}

fn default_notify_permission() -> String {
    "bankperm".to_string()
}

fn default_system_symbol() -> String {
    "4,EOS".to_string()
}

fn default_min_free_creditor_balance() -> Decimal {
    Decimal::new(10, 0) // 10 EOS
}

fn default_dividend_percentage() -> u8 {
    50
}

fn default_max_order_splits() -> usize {
    3
}

fn default_rpc_url() -> String {
    "http://127.0.0.1:8888".to_string()
}

fn default_token_contract() -> String {
    "eosio.token".to_string()
}

fn default_timeout() -> u64 {
    10
}

fn default_db_path() -> String {
    "creditor_bank.db".to_string()
}

fn default_interval_secs() -> u64 {
    60
}

impl Config {
    /// Load configuration from environment variables and config files.
    pub fn load() -> Result<Self> {
        dotenvy::dotenv().ok();

        let config = config::Config::builder()
            .add_source(config::File::with_name("config").required(false))
            .add_source(config::Environment::default().separator("__").prefix("BANK"))
            .build()
            .context("Failed to build configuration")?;

        config
            .try_deserialize()
            .context("Failed to deserialize configuration")
    }

    /// Validate configuration values.
    pub fn validate(&self) -> Result<()> {
        anyhow::ensure!(
            self.bank.min_free_creditor_balance >= Decimal::ZERO,
            "min_free_creditor_balance must not be negative"
        );

        anyhow::ensure!(
            self.bank.default_dividend_percentage <= 100,
            "default_dividend_percentage must be between 0 and 100"
        );

        anyhow::ensure!(
            self.bank.max_order_splits >= 1,
            "max_order_splits must be at least 1"
        );

        anyhow::ensure!(
            !self.bank.notify_permission.is_empty(),
            "notify_permission must not be empty"
        );

        anyhow::ensure!(
            self.chain.timeout_secs > 0 && self.rotation.interval_secs > 0,
            "timeout_secs and interval_secs must be positive"
        );

        crate::bank::BankParams::from_config(&self.bank)
            .context("Invalid bank parameters")?;

        Ok(())
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bank: BankConfig::default(),
            chain: ChainConfig::default(),
            storage: StorageConfig::default(),
            rotation: RotationConfig::default(),
        }
    }
}

impl Default for BankConfig {
    fn default() -> Self {
        Self {
            code_account: default_code_account(),
            ram_payer: default_code_account(),
            notify_permission: default_notify_permission(),
            system_symbol: default_system_symbol(),
            min_free_creditor_balance: default_min_free_creditor_balance(),
            default_dividend_percentage: default_dividend_percentage(),
            max_order_splits: default_max_order_splits(),
        }
    }
}

impl Default for ChainConfig {
    fn default() -> Self {
        Self {
            rpc_url: default_rpc_url(),
            token_contract: default_token_contract(),
            timeout_secs: default_timeout(),
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            db_path: default_db_path(),
        }
    }
}

impl Default for RotationConfig {
    fn default() -> Self {
        Self {
            interval_secs: default_interval_secs(),
        }
    }
}
