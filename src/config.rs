use crate::constants::{
    DEFAULT_BLOCK_EXPLORER_URL, DEFAULT_CHAIN_ID, DEFAULT_CHAIN_NAME, DEFAULT_CHAIN_RPC_URL,
    DEFAULT_CHARACTER_IMAGE_BASE_URL, DEFAULT_MOBSTER_IMAGE_BASE_URL,
    DEFAULT_NATIVE_CURRENCY_DECIMALS, DEFAULT_NATIVE_CURRENCY_NAME,
    DEFAULT_NATIVE_CURRENCY_SYMBOL, DEFAULT_READ_TIMEOUT_SECS, DEFAULT_WRITE_TIMEOUT_SECS,
};
use crate::models::{ChainDescriptor, NativeCurrency};
use ethers::types::Address;
use serde::Deserialize;
use std::{env, str::FromStr, time::Duration};
use url::Url;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub environment: String,

    // Blockchain
    pub bsc_rpc_url: String,
    pub wallet_rpc_url: String,
    pub required_chain_id: u64,

    // Identity
    pub player_address: String,

    // Contract Addresses
    pub game_contract_address: String,
    pub character_contract_address: String,
    pub weapon_contract_address: String,
    pub reward_pool_contract_address: String,

    // Chain descriptor (wallet_addEthereumChain)
    pub chain_name: String,
    pub chain_rpc_urls: Vec<String>,
    pub native_currency_name: String,
    pub native_currency_symbol: String,
    pub native_currency_decimals: u8,
    pub block_explorer_url: String,

    // RPC hardening
    pub read_timeout_secs: u64,
    pub write_timeout_secs: u64,

    // Art
    pub character_image_base_url: String,
    pub mobster_image_base_url: String,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        dotenv::dotenv().ok();
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Builds a config from any key lookup; `from_env` passes the process
    /// environment.
    pub fn from_lookup<F>(lookup: F) -> anyhow::Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let required = |key: &str| -> anyhow::Result<String> {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
                .ok_or_else(|| anyhow::anyhow!("Missing {key} in env."))
        };
        let or_default = |key: &str, default: &str| -> String {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
                .unwrap_or_else(|| default.to_string())
        };

        let bsc_rpc_url = required("BSC_RPC_URL")?;
        let wallet_rpc_url = or_default("WALLET_RPC_URL", &bsc_rpc_url);

        Ok(Config {
            environment: or_default("ENVIRONMENT", "development"),

            bsc_rpc_url,
            wallet_rpc_url,
            required_chain_id: parse_chain_id(&or_default(
                "REQUIRED_CHAIN_ID",
                &DEFAULT_CHAIN_ID.to_string(),
            ))?,

            player_address: required("PLAYER_ADDRESS")?,

            game_contract_address: required("GAME_CONTRACT_ADDRESS")?,
            character_contract_address: required("CHARACTER_CONTRACT_ADDRESS")?,
            weapon_contract_address: required("WEAPON_CONTRACT_ADDRESS")?,
            reward_pool_contract_address: required("REWARD_POOL_CONTRACT_ADDRESS")?,

            chain_name: or_default("CHAIN_NAME", DEFAULT_CHAIN_NAME),
            chain_rpc_urls: parse_url_list(&or_default("CHAIN_RPC_URLS", DEFAULT_CHAIN_RPC_URL)),
            native_currency_name: or_default("NATIVE_CURRENCY_NAME", DEFAULT_NATIVE_CURRENCY_NAME),
            native_currency_symbol: or_default(
                "NATIVE_CURRENCY_SYMBOL",
                DEFAULT_NATIVE_CURRENCY_SYMBOL,
            ),
            native_currency_decimals: or_default(
                "NATIVE_CURRENCY_DECIMALS",
                &DEFAULT_NATIVE_CURRENCY_DECIMALS.to_string(),
            )
            .parse()?,
            block_explorer_url: or_default("BLOCK_EXPLORER_URL", DEFAULT_BLOCK_EXPLORER_URL),

            read_timeout_secs: or_default("READ_TIMEOUT_SECS", &DEFAULT_READ_TIMEOUT_SECS.to_string())
                .parse()?,
            write_timeout_secs: or_default(
                "WRITE_TIMEOUT_SECS",
                &DEFAULT_WRITE_TIMEOUT_SECS.to_string(),
            )
            .parse()?,

            character_image_base_url: or_default(
                "CHARACTER_IMAGE_BASE_URL",
                DEFAULT_CHARACTER_IMAGE_BASE_URL,
            ),
            mobster_image_base_url: or_default(
                "MOBSTER_IMAGE_BASE_URL",
                DEFAULT_MOBSTER_IMAGE_BASE_URL,
            ),
        })
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        Url::parse(&self.bsc_rpc_url)
            .map_err(|e| anyhow::anyhow!("BSC_RPC_URL is invalid: {e}"))?;
        Url::parse(&self.wallet_rpc_url)
            .map_err(|e| anyhow::anyhow!("WALLET_RPC_URL is invalid: {e}"))?;
        if self.chain_rpc_urls.is_empty() {
            anyhow::bail!("CHAIN_RPC_URLS is empty");
        }
        for url in &self.chain_rpc_urls {
            Url::parse(url).map_err(|e| anyhow::anyhow!("CHAIN_RPC_URLS entry {url}: {e}"))?;
        }
        Url::parse(&self.block_explorer_url)
            .map_err(|e| anyhow::anyhow!("BLOCK_EXPLORER_URL is invalid: {e}"))?;

        Address::from_str(&self.player_address)
            .map_err(|_| anyhow::anyhow!("PLAYER_ADDRESS is not an EVM address"))?;
        for (label, address) in self.contract_addresses() {
            Address::from_str(address)
                .map_err(|_| anyhow::anyhow!("{label} contract address is not an EVM address"))?;
            if address.starts_with("0x0000") {
                tracing::warn!("Using placeholder {} contract address", label);
            }
        }

        if self.required_chain_id == 0 {
            anyhow::bail!("REQUIRED_CHAIN_ID must be > 0");
        }
        if self.read_timeout_secs == 0 || self.write_timeout_secs == 0 {
            anyhow::bail!("RPC timeouts must be > 0");
        }

        Ok(())
    }

    pub fn is_testnet(&self) -> bool {
        if self.environment == "development" || self.environment == "testnet" {
            return true;
        }
        self.required_chain_id != DEFAULT_CHAIN_ID
    }

    pub fn read_timeout(&self) -> Duration {
        Duration::from_secs(self.read_timeout_secs)
    }

    pub fn write_timeout(&self) -> Duration {
        Duration::from_secs(self.write_timeout_secs)
    }

    /// Descriptor handed to the wallet when it does not know the chain yet.
    pub fn chain_descriptor(&self) -> ChainDescriptor {
        ChainDescriptor {
            chain_id: format!("{:#x}", self.required_chain_id),
            chain_name: self.chain_name.clone(),
            rpc_urls: self.chain_rpc_urls.clone(),
            native_currency: NativeCurrency {
                name: self.native_currency_name.clone(),
                symbol: self.native_currency_symbol.clone(),
                decimals: self.native_currency_decimals,
            },
            block_explorer_urls: vec![self.block_explorer_url.clone()],
        }
    }

    fn contract_addresses(&self) -> [(&'static str, &str); 4] {
        [
            ("game", self.game_contract_address.as_str()),
            ("character", self.character_contract_address.as_str()),
            ("weapon", self.weapon_contract_address.as_str()),
            ("reward pool", self.reward_pool_contract_address.as_str()),
        ]
    }
}

/// Accepts `56` as well as `0x38`.
pub fn parse_chain_id(raw: &str) -> anyhow::Result<u64> {
    let trimmed = raw.trim();
    if let Some(hex) = trimmed
        .strip_prefix("0x")
        .or_else(|| trimmed.strip_prefix("0X"))
    {
        return u64::from_str_radix(hex, 16)
            .map_err(|e| anyhow::anyhow!("Invalid hex chain id {trimmed}: {e}"));
    }
    trimmed
        .parse::<u64>()
        .map_err(|e| anyhow::anyhow!("Invalid chain id {trimmed}: {e}"))
}

// Internal helper that supports `parse_url_list` operations.
fn parse_url_list(raw: &str) -> Vec<String> {
    raw.split([',', ';', '\n', ' '])
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(str::to_string)
        .collect()
}
