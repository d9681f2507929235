use crate::{
    constants::WALLET_ERROR_UNRECOGNIZED_CHAIN,
    error::{AppError, Result},
    models::ChainDescriptor,
};
use std::sync::Arc;

use super::wallet::{WalletNetwork, WalletRpcError};

/// Result of one `wallet_switchEthereumChain` attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SwitchAttempt {
    Switched,
    /// The wallet does not know the chain (EIP-3085 code 4902).
    NeedsRegistration,
    Fatal(String),
}

impl SwitchAttempt {
    fn from_result(result: std::result::Result<(), WalletRpcError>) -> Self {
        match result {
            Ok(()) => SwitchAttempt::Switched,
            Err(err) if err.code == Some(WALLET_ERROR_UNRECOGNIZED_CHAIN) => {
                SwitchAttempt::NeedsRegistration
            }
            Err(err) => SwitchAttempt::Fatal(err.to_string()),
        }
    }
}

/// Makes sure the wallet targets the required chain before a write.
///
/// Protocol: switch; when the wallet does not know the chain, register the
/// descriptor and retry the switch exactly once. Anything else aborts.
pub struct ChainReconciler {
    wallet: Arc<dyn WalletNetwork>,
    descriptor: ChainDescriptor,
}

impl ChainReconciler {
    pub fn new(wallet: Arc<dyn WalletNetwork>, descriptor: ChainDescriptor) -> Self {
        Self { wallet, descriptor }
    }

    pub async fn ensure_network(&self, required_chain_id: u64) -> Result<()> {
        match self.wallet.chain_id().await {
            Ok(current) if current == required_chain_id => {
                tracing::debug!("Wallet already on chain {}", required_chain_id);
                return Ok(());
            }
            Ok(current) => {
                tracing::info!(
                    "Wallet on chain {}, switching to {}",
                    current,
                    required_chain_id
                );
            }
            Err(err) => {
                // Unknown current chain; the switch request settles it.
                tracing::debug!("Could not read wallet chain id: {}", err);
            }
        }

        match self.attempt_switch(required_chain_id).await {
            SwitchAttempt::Switched => Ok(()),
            SwitchAttempt::Fatal(reason) => Err(AppError::NetworkReconciliation(reason)),
            SwitchAttempt::NeedsRegistration => {
                tracing::info!(
                    "Wallet does not know chain {}, registering {}",
                    required_chain_id,
                    self.descriptor.chain_name
                );
                self.wallet
                    .add_chain(&self.descriptor)
                    .await
                    .map_err(|err| {
                        AppError::NetworkReconciliation(format!(
                            "Registering {} failed: {}",
                            self.descriptor.chain_name, err
                        ))
                    })?;

                match self.attempt_switch(required_chain_id).await {
                    SwitchAttempt::Switched => Ok(()),
                    SwitchAttempt::NeedsRegistration => Err(AppError::NetworkReconciliation(
                        format!("Chain {required_chain_id} still unknown after registration"),
                    )),
                    SwitchAttempt::Fatal(reason) => Err(AppError::NetworkReconciliation(
                        format!("Switch after registration failed: {reason}"),
                    )),
                }
            }
        }
    }

    async fn attempt_switch(&self, chain_id: u64) -> SwitchAttempt {
        let attempt = SwitchAttempt::from_result(self.wallet.switch_chain(chain_id).await);
        tracing::debug!("Switch to chain {}: {:?}", chain_id, attempt);
        attempt
    }
}
