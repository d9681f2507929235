use crate::{
    error::{AppError, Result},
    models::{FightOutcome, FightState, RefreshTrigger},
};
use ethers::types::Address;
use std::sync::{Arc, Mutex};

use super::chain_reconciler::ChainReconciler;
use super::state_sync::{CycleHandle, StateSynchronizer};
use super::wallet::FightSubmitter;

/// What a finished fight reports back to the caller.
#[derive(Debug)]
pub struct FightReport {
    pub outcome: FightOutcome,
    /// Refresh started by the successful fight.
    pub refresh: CycleHandle,
}

/// Drives one fight at a time:
/// Idle -> ReconcilingNetwork -> Submitting -> Succeeded | Failed -> Idle.
pub struct FightOrchestrator {
    reconciler: ChainReconciler,
    submitter: Arc<dyn FightSubmitter>,
    synchronizer: StateSynchronizer,
    required_chain_id: u64,
    state: Mutex<FightState>,
}

impl FightOrchestrator {
    pub fn new(
        reconciler: ChainReconciler,
        submitter: Arc<dyn FightSubmitter>,
        synchronizer: StateSynchronizer,
        required_chain_id: u64,
    ) -> Self {
        Self {
            reconciler,
            submitter,
            synchronizer,
            required_chain_id,
            state: Mutex::new(FightState::Idle),
        }
    }

    pub fn state(&self) -> FightState {
        self.state
            .lock()
            .map(|state| *state)
            .unwrap_or(FightState::Idle)
    }

    pub async fn fight(&self, player: Address) -> Result<FightReport> {
        let _claim = self.begin()?;

        let result = self.run(player).await;
        match &result {
            Ok(report) => {
                tracing::info!(
                    "Fight won={} drop={} (refresh cycle {})",
                    report.outcome.status,
                    report.outcome.drop,
                    report.refresh.cycle
                );
                self.transition(FightState::Succeeded);
            }
            Err(err) => {
                tracing::warn!("Fight failed: {}", err);
                self.transition(FightState::Failed);
            }
        }
        result
    }

    async fn run(&self, player: Address) -> Result<FightReport> {
        self.reconciler.ensure_network(self.required_chain_id).await?;

        self.transition(FightState::Submitting);
        let outcome = self.submitter.submit_fight(player).await?;

        let refresh = self
            .synchronizer
            .synchronize(player, RefreshTrigger::FightCompleted);
        Ok(FightReport { outcome, refresh })
    }

    // Internal helper that claims the orchestrator for a new fight. The
    // claim returns the state to Idle when dropped, also on cancellation.
    fn begin(&self) -> Result<FightClaim<'_>> {
        let mut state = self
            .state
            .lock()
            .map_err(|_| AppError::Internal("Fight state lock poisoned".to_string()))?;
        if state.is_busy() {
            return Err(AppError::FightInProgress);
        }
        *state = FightState::ReconcilingNetwork;
        tracing::info!("Fight state -> {:?}", *state);
        Ok(FightClaim { state: &self.state })
    }

    fn transition(&self, next: FightState) {
        if let Ok(mut state) = self.state.lock() {
            tracing::info!("Fight state {:?} -> {:?}", *state, next);
            *state = next;
        }
    }
}

struct FightClaim<'a> {
    state: &'a Mutex<FightState>,
}

impl Drop for FightClaim<'_> {
    fn drop(&mut self) {
        if let Ok(mut state) = self.state.lock() {
            if *state != FightState::Idle {
                tracing::info!("Fight state {:?} -> {:?}", *state, FightState::Idle);
            }
            *state = FightState::Idle;
        }
    }
}
