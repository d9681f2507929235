// All service modules
pub mod chain_reconciler;
pub mod combat_stats;
pub mod fight;
pub mod onchain;
pub mod state_sync;
pub mod wallet;

// Re-export for convenience
pub use chain_reconciler::ChainReconciler;
pub use fight::{FightOrchestrator, FightReport};
pub use onchain::{ContractReader, OnchainReader};
pub use state_sync::{CycleHandle, StateSynchronizer};
pub use wallet::{Eip1193Wallet, FightSubmitter, WalletNetwork};
