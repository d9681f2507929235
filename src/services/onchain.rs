use crate::{
    config::Config,
    contracts::{ContractAddresses, ContractCall},
    error::{AppError, Result},
};
use ethers::abi::Token;
use ethers::providers::{Http, Middleware, Provider};
use ethers::types::{transaction::eip2718::TypedTransaction, TransactionRequest};
use std::sync::Arc;
use std::time::Duration;

/// Read side of the contract interface.
#[async_trait::async_trait]
pub trait ContractReader: Send + Sync {
    async fn call(&self, call: &ContractCall) -> Result<Vec<Token>>;
}

/// `eth_call` against the configured BSC endpoint, shaped by the registry.
pub struct OnchainReader {
    provider: Arc<Provider<Http>>,
    addresses: ContractAddresses,
    timeout: Duration,
}

impl OnchainReader {
    pub fn from_config(config: &Config) -> Result<Self> {
        let provider = Provider::<Http>::try_from(config.bsc_rpc_url.as_str())
            .map_err(|e| AppError::Config(format!("Invalid RPC URL: {}", e)))?;
        Ok(Self {
            provider: Arc::new(provider),
            addresses: ContractAddresses::from_config(config)?,
            timeout: config.read_timeout(),
        })
    }
}

#[async_trait::async_trait]
impl ContractReader for OnchainReader {
    async fn call(&self, call: &ContractCall) -> Result<Vec<Token>> {
        let function = call.validate()?;
        let data = function
            .encode_input(&call.args)
            .map_err(|e| AppError::BadRequest(format!("Cannot encode {}: {}", call.method, e)))?;
        let tx: TypedTransaction = TransactionRequest::new()
            .to(self.addresses.address_of(call.contract))
            .data(data)
            .into();

        let raw = tokio::time::timeout(self.timeout, self.provider.call(&tx, None))
            .await
            .map_err(|_| AppError::Timeout(call.method.to_string()))?
            .map_err(|e| AppError::BlockchainRPC(e.to_string()))?;

        function
            .decode_output(&raw)
            .map_err(|e| AppError::BlockchainRPC(format!("Cannot decode {}: {}", call.method, e)))
    }
}
