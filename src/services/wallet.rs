use crate::{
    config::Config,
    constants::WALLET_ERROR_USER_REJECTED,
    contracts::{token_to_bool, token_to_u256, ContractAddresses, ContractCall},
    error::{AppError, Result},
    models::{ChainDescriptor, FightOutcome},
};
use ethers::providers::{Http, Middleware, Provider, ProviderError, RpcError};
use ethers::types::{
    transaction::eip2718::TypedTransaction, Address, TransactionRequest, U256, U64,
};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

/// Failure reported by the wallet for a network request. `code` carries the
/// EIP-1193 / JSON-RPC error code when the wallet supplied one.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{message}{}", code_suffix(.code))]
pub struct WalletRpcError {
    pub code: Option<i64>,
    pub message: String,
}

impl WalletRpcError {
    pub fn new(code: i64, message: impl Into<String>) -> Self {
        Self {
            code: Some(code),
            message: message.into(),
        }
    }

    pub fn without_code(message: impl Into<String>) -> Self {
        Self {
            code: None,
            message: message.into(),
        }
    }

    fn from_provider(err: &ProviderError) -> Self {
        match err.as_error_response() {
            Some(rpc) => Self::new(rpc.code, rpc.message.clone()),
            None => Self::without_code(err.to_string()),
        }
    }
}

// Internal helper that formats the optional code of a `WalletRpcError`.
fn code_suffix(code: &Option<i64>) -> String {
    code.map(|code| format!(" (code {})", code))
        .unwrap_or_default()
}

/// Network controls of the connected wallet.
#[async_trait::async_trait]
pub trait WalletNetwork: Send + Sync {
    async fn chain_id(&self) -> Result<u64>;
    async fn switch_chain(&self, chain_id: u64) -> std::result::Result<(), WalletRpcError>;
    async fn add_chain(&self, descriptor: &ChainDescriptor)
        -> std::result::Result<(), WalletRpcError>;
}

/// Write side of the contract interface: `fightSlot1` signed by the wallet.
#[async_trait::async_trait]
pub trait FightSubmitter: Send + Sync {
    async fn submit_fight(&self, player: Address) -> Result<FightOutcome>;
}

/// Wallet reached over an EIP-1193 style JSON-RPC endpoint. Signing stays in
/// the wallet; this side only issues requests.
pub struct Eip1193Wallet {
    provider: Arc<Provider<Http>>,
    addresses: ContractAddresses,
    request_timeout: Duration,
    confirmation_timeout: Duration,
}

impl Eip1193Wallet {
    pub fn from_config(config: &Config) -> Result<Self> {
        let provider = Provider::<Http>::try_from(config.wallet_rpc_url.as_str())
            .map_err(|e| AppError::Config(format!("Invalid wallet RPC URL: {}", e)))?;
        Ok(Self {
            provider: Arc::new(provider),
            addresses: ContractAddresses::from_config(config)?,
            request_timeout: config.read_timeout(),
            confirmation_timeout: config.write_timeout(),
        })
    }

    // Internal helper that sends a wallet request whose result is ignored.
    async fn request_unit(
        &self,
        method: &str,
        params: serde_json::Value,
    ) -> std::result::Result<(), WalletRpcError> {
        let request = self.provider.request::<_, serde_json::Value>(method, params);
        match tokio::time::timeout(self.request_timeout, request).await {
            Ok(Ok(_)) => Ok(()),
            Ok(Err(err)) => Err(WalletRpcError::from_provider(&err)),
            Err(_) => Err(WalletRpcError::without_code(format!(
                "{} timed out after {}s",
                method,
                self.request_timeout.as_secs()
            ))),
        }
    }
}

#[async_trait::async_trait]
impl WalletNetwork for Eip1193Wallet {
    async fn chain_id(&self) -> Result<u64> {
        let chain_id = tokio::time::timeout(self.request_timeout, self.provider.get_chainid())
            .await
            .map_err(|_| AppError::Timeout("eth_chainId".to_string()))?
            .map_err(|e| AppError::BlockchainRPC(e.to_string()))?;
        if chain_id > U256::from(u64::MAX) {
            return Err(AppError::BlockchainRPC(format!(
                "Wallet reported out-of-range chain id {chain_id}"
            )));
        }
        Ok(chain_id.as_u64())
    }

    async fn switch_chain(&self, chain_id: u64) -> std::result::Result<(), WalletRpcError> {
        let params = serde_json::json!([{ "chainId": format!("{:#x}", chain_id) }]);
        self.request_unit("wallet_switchEthereumChain", params).await
    }

    async fn add_chain(
        &self,
        descriptor: &ChainDescriptor,
    ) -> std::result::Result<(), WalletRpcError> {
        let params = serde_json::json!([descriptor]);
        self.request_unit("wallet_addEthereumChain", params).await
    }
}

#[async_trait::async_trait]
impl FightSubmitter for Eip1193Wallet {
    async fn submit_fight(&self, player: Address) -> Result<FightOutcome> {
        let call = ContractCall::fight_slot1();
        let function = call.validate()?;
        let data = function
            .encode_input(&call.args)
            .map_err(|e| AppError::BadRequest(format!("Cannot encode fightSlot1: {}", e)))?;
        let tx: TypedTransaction = TransactionRequest::new()
            .from(player)
            .to(self.addresses.game)
            .data(data)
            .into();

        // Simulate first: surfaces reverts before the wallet prompts and
        // yields the (status, drop) pair the contract returns.
        let simulated = tokio::time::timeout(self.request_timeout, self.provider.call(&tx, None))
            .await
            .map_err(|_| AppError::FightFailed("fightSlot1 simulation timed out".to_string()))?
            .map_err(|e| AppError::FightFailed(format!("fightSlot1 would revert: {}", e)))?;
        let tokens = function
            .decode_output(&simulated)
            .map_err(|e| AppError::FightFailed(format!("Cannot decode fightSlot1: {}", e)))?;
        let (status, drop) = match tokens.as_slice() {
            [status, drop] => (token_to_bool(status)?, token_to_u256(drop)?),
            _ => {
                return Err(AppError::FightFailed(
                    "fightSlot1 returned an unexpected shape".to_string(),
                ))
            }
        };

        // Gas filling and wallet approval happen inside the send.
        let pending = tokio::time::timeout(
            self.confirmation_timeout,
            self.provider.send_transaction(tx, None),
        )
        .await
        .map_err(|_| {
            AppError::FightFailed(format!(
                "fightSlot1 was not sent within {:?}",
                self.confirmation_timeout
            ))
        })?
        .map_err(|e| AppError::FightFailed(describe_send_error(&e)))?;
        let tx_hash = *pending;
        tracing::info!("fightSlot1 submitted: {:?}", tx_hash);

        let receipt = tokio::time::timeout(self.confirmation_timeout, pending)
            .await
            .map_err(|_| {
                AppError::FightFailed(format!(
                    "No confirmation for {:?} within {}s",
                    tx_hash,
                    self.confirmation_timeout.as_secs()
                ))
            })?
            .map_err(|e| AppError::FightFailed(e.to_string()))?
            .ok_or_else(|| {
                AppError::FightFailed(format!("Transaction {:?} was dropped", tx_hash))
            })?;

        if receipt.status != Some(U64::from(1)) {
            return Err(AppError::FightFailed(format!(
                "Transaction {:?} reverted",
                tx_hash
            )));
        }

        Ok(FightOutcome {
            status,
            drop,
            tx_hash: Some(tx_hash),
        })
    }
}

// Internal helper that turns a send failure into a user-facing message.
fn describe_send_error(err: &ProviderError) -> String {
    let wallet_err = WalletRpcError::from_provider(err);
    if wallet_err.code == Some(WALLET_ERROR_USER_REJECTED) {
        return "Transaction rejected in wallet".to_string();
    }
    wallet_err.to_string()
}
