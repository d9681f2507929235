use crate::{
    config::Config,
    contracts::parse_address,
    error::{AppError, Result},
    models::{CombatReadiness, DisplayMode, RefreshTrigger},
    services::{
        combat_stats, ChainReconciler, ContractReader, CycleHandle, Eip1193Wallet, FightOrchestrator,
        FightReport, FightSubmitter, OnchainReader, StateSynchronizer, WalletNetwork,
    },
};
use ethers::types::Address;
use std::sync::{Arc, Mutex};

/// One player's session: the synchronizer, the fight orchestrator and the
/// presentation state tied to them.
pub struct GameSession {
    player: Address,
    character_image_base_url: String,
    mobster_image_base_url: String,
    synchronizer: StateSynchronizer,
    orchestrator: FightOrchestrator,
    display_mode: Mutex<DisplayMode>,
}

impl GameSession {
    pub fn from_config(config: &Config) -> Result<Self> {
        let reader: Arc<dyn ContractReader> = Arc::new(OnchainReader::from_config(config)?);
        let wallet = Arc::new(Eip1193Wallet::from_config(config)?);
        Self::new(config, reader, wallet.clone(), wallet)
    }

    pub fn new(
        config: &Config,
        reader: Arc<dyn ContractReader>,
        network: Arc<dyn WalletNetwork>,
        submitter: Arc<dyn FightSubmitter>,
    ) -> Result<Self> {
        let synchronizer = StateSynchronizer::new(reader, config.read_timeout());
        let reconciler = ChainReconciler::new(network, config.chain_descriptor());
        let orchestrator = FightOrchestrator::new(
            reconciler,
            submitter,
            synchronizer.clone(),
            config.required_chain_id,
        );

        Ok(Self {
            player: parse_address(&config.player_address)?,
            character_image_base_url: config.character_image_base_url.clone(),
            mobster_image_base_url: config.mobster_image_base_url.clone(),
            synchronizer,
            orchestrator,
            display_mode: Mutex::new(DisplayMode::Placeholder),
        })
    }

    pub fn player(&self) -> Address {
        self.player
    }

    pub fn synchronizer(&self) -> &StateSynchronizer {
        &self.synchronizer
    }

    pub fn display_mode(&self) -> DisplayMode {
        self.display_mode
            .lock()
            .map(|mode| *mode)
            .unwrap_or(DisplayMode::Placeholder)
    }

    /// User reload: switches to NFT art and starts a refresh cycle.
    pub fn refresh(&self) -> CycleHandle {
        self.set_display_mode(DisplayMode::Nft);
        self.synchronizer
            .synchronize(self.player, RefreshTrigger::UserReload)
    }

    /// Flips between placeholder and NFT art; every flip re-reads the state.
    pub fn toggle_display(&self) -> CycleHandle {
        let next = match self.display_mode() {
            DisplayMode::Placeholder => DisplayMode::Nft,
            DisplayMode::Nft => DisplayMode::Placeholder,
        };
        self.set_display_mode(next);
        self.synchronizer
            .synchronize(self.player, RefreshTrigger::DisplayToggle)
    }

    pub async fn fight(&self) -> Result<FightReport> {
        self.orchestrator.fight(self.player).await
    }

    /// Current view, partial while reads are pending.
    pub fn readiness(&self) -> CombatReadiness {
        let snapshot = self.synchronizer.snapshot();
        let derived = combat_stats::derive(&snapshot);
        let mode = self.display_mode();

        CombatReadiness {
            player: self.player,
            cycle: snapshot.cycle,
            display_mode: mode,
            character_id: snapshot.character_ref.map(|r| r.token_id),
            weapon_id: snapshot.weapon_ref.map(|r| r.token_id),
            hp: snapshot.character.hp,
            xp: snapshot.character.xp,
            level: snapshot.character.level,
            angel_modifier: snapshot.character.angel_modifier,
            skill: snapshot.character.skill,
            char_type: snapshot.character.char_type,
            status: snapshot.character.status,
            base_attack: snapshot.weapon.base_attack,
            hp_required: derived.hp_required,
            success_rate_percent: derived.success_rate_percent,
            reward_display: derived
                .reward_display
                .as_deref()
                .map(combat_stats::reward_label),
            limit_reset_at: snapshot.rewards.and_then(|r| r.limit_reset_at()),
            fight_state: self.orchestrator.state(),
            character_image_url: combat_stats::character_image_url(
                &self.character_image_base_url,
                &snapshot.character,
                mode,
            ),
            mobster_image_url: combat_stats::mobster_image_url(
                &self.mobster_image_base_url,
                snapshot.character.level,
                mode,
            ),
            loading: !self.synchronizer.pending_fields().is_empty(),
            unavailable: self.synchronizer.unavailable_fields(),
        }
    }

    /// Readiness once every field of the latest cycle has an outcome.
    pub fn settled_readiness(&self) -> Result<CombatReadiness> {
        let pending = self.synchronizer.pending_fields();
        if !pending.is_empty() {
            let names: Vec<&str> = pending.iter().map(|f| f.method()).collect();
            return Err(AppError::StillLoading(names.join(", ")));
        }
        Ok(self.readiness())
    }

    fn set_display_mode(&self, mode: DisplayMode) {
        if let Ok(mut current) = self.display_mode.lock() {
            *current = mode;
        }
    }
}
