use alloy::primitives::Address;
use log::{info, warn};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use thiserror::Error;
use url::Url;

pub const DEFAULT_CONFIG_PATH: &str = "config/config.toml";
pub const DEFAULT_DISTRIBUTOR: &str = "0x29754F3d807EC91066cF2693c92922E036E27E08";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse config file: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Invalid {field}: {value}")]
    Invalid { field: &'static str, value: String },

    #[error("No RPC url configured")]
    MissingRpc,
}

#[derive(Debug, Serialize, Deserialize, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub network: NetworkConfig,
    #[serde(default)]
    pub contracts: ContractsConfig,
    #[serde(default)]
    pub wallet: WalletConfig,
    #[serde(default)]
    pub funding: FundingConfig,
    #[serde(default)]
    pub telegram: TelegramConfig,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct NetworkConfig {
    pub rpc_urls: Vec<String>,
    pub chain_id: u64,
    pub receipt_poll_interval_ms: u64,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct ContractsConfig {
    pub distributor: String,
    /// Read from the distributor when unset
    #[serde(default)]
    pub super_token: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, Clone, Default)]
pub struct WalletConfig {
    #[serde(default)]
    pub private_key: Option<String>,
    /// Read-only account used when no key is configured
    #[serde(default)]
    pub address: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct FundingConfig {
    pub approval_buffer_percent: u32,
}

#[derive(Debug, Serialize, Deserialize, Clone, Default)]
pub struct TelegramConfig {
    pub token: Option<String>,
    pub chat_id: Option<String>,
    pub thread_id: Option<u64>,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            rpc_urls: vec!["http://127.0.0.1:8545".to_string()],
            chain_id: 1,
            receipt_poll_interval_ms: 2000,
        }
    }
}

impl Default for ContractsConfig {
    fn default() -> Self {
        Self {
            distributor: DEFAULT_DISTRIBUTOR.to_string(),
            super_token: None,
        }
    }
}

impl Default for FundingConfig {
    fn default() -> Self {
        Self {
            approval_buffer_percent: 10,
        }
    }
}

impl Config {
    /// Loads `path` (or the default location), falling back to the environment.
    ///
    /// Secrets set in the environment always win over the file.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let path = path.unwrap_or_else(|| Path::new(DEFAULT_CONFIG_PATH));
        info!("Loading config from {}", path.display());
        let config = match Self::load_from_file(path) {
            Ok(mut config) => {
                info!("Config loaded from file");
                config.apply_secret_env();
                config
            }
            Err(e) => {
                warn!("Failed to load config from file: {}", e);
                info!("Falling back to environment variables or defaults");
                Self::from_env()?
            }
        };
        config.validate()?;
        Ok(config)
    }

    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let contents = fs::read_to_string(path)?;
        let config: Config = toml::from_str(&contents)?;
        Ok(config)
    }

    pub fn from_env() -> Result<Self, ConfigError> {
        let mut config = Config::default();

        if let Ok(urls) = std::env::var("RPC_URLS") {
            config.network.rpc_urls = urls
                .split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect();
        }

        if let Ok(chain_id) = std::env::var("CHAIN_ID") {
            config.network.chain_id = parse_env("CHAIN_ID", &chain_id)?;
        }

        if let Ok(interval) = std::env::var("RECEIPT_POLL_INTERVAL_MS") {
            config.network.receipt_poll_interval_ms =
                parse_env("RECEIPT_POLL_INTERVAL_MS", &interval)?;
        }

        if let Ok(distributor) = std::env::var("DISTRIBUTOR_ADDRESS") {
            config.contracts.distributor = distributor;
        }

        if let Ok(token) = std::env::var("SUPER_TOKEN_ADDRESS") {
            config.contracts.super_token = Some(token);
        }

        if let Ok(address) = std::env::var("WALLET_ADDRESS") {
            config.wallet.address = Some(address);
        }

        if let Ok(buffer) = std::env::var("APPROVAL_BUFFER_PERCENT") {
            config.funding.approval_buffer_percent = parse_env("APPROVAL_BUFFER_PERCENT", &buffer)?;
        }

        if let Ok(chat_id) = std::env::var("TELEGRAM_CHAT_ID") {
            config.telegram.chat_id = Some(chat_id);
        }

        if let Ok(thread_id) = std::env::var("TELEGRAM_THREAD_ID") {
            config.telegram.thread_id = Some(parse_env("TELEGRAM_THREAD_ID", &thread_id)?);
        }

        config.apply_secret_env();
        Ok(config)
    }

    fn apply_secret_env(&mut self) {
        if let Ok(key) = std::env::var("PRIVATE_KEY") {
            self.wallet.private_key = Some(key);
        }
        if let Ok(token) = std::env::var("TELEGRAM_BOT_TOKEN") {
            self.telegram.token = Some(token);
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.network.rpc_urls.is_empty() {
            return Err(ConfigError::MissingRpc);
        }
        for rpc in &self.network.rpc_urls {
            Url::parse(rpc).map_err(|_| ConfigError::Invalid {
                field: "rpc url",
                value: rpc.clone(),
            })?;
        }
        self.distributor()?;
        self.super_token()?;
        self.wallet_address()?;
        Ok(())
    }

    pub fn distributor(&self) -> Result<Address, ConfigError> {
        parse_address("distributor address", &self.contracts.distributor)
    }

    pub fn super_token(&self) -> Result<Option<Address>, ConfigError> {
        self.contracts
            .super_token
            .as_deref()
            .map(|token| parse_address("super token address", token))
            .transpose()
    }

    pub fn wallet_address(&self) -> Result<Option<Address>, ConfigError> {
        self.wallet
            .address
            .as_deref()
            .map(|address| parse_address("wallet address", address))
            .transpose()
    }
}

fn parse_address(field: &'static str, value: &str) -> Result<Address, ConfigError> {
    value.trim().parse().map_err(|_| ConfigError::Invalid {
        field,
        value: value.to_string(),
    })
}

fn parse_env<T: std::str::FromStr>(name: &'static str, value: &str) -> Result<T, ConfigError> {
    value.trim().parse().map_err(|_| ConfigError::Invalid {
        field: name,
        value: value.to_string(),
    })
}
