use chrono::{DateTime, Utc};
use ethers::types::{H256, U256};
use serde::{Deserialize, Serialize};

// ==================== EQUIPMENT ====================

/// Character NFT equipped in combat slot 1. Token id zero means nothing is
/// equipped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CharacterRef {
    pub token_id: U256,
}

/// Weapon NFT equipped in slot 1, same sentinel as `CharacterRef`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct WeaponRef {
    pub token_id: U256,
}

impl CharacterRef {
    pub fn new(token_id: U256) -> Self {
        Self { token_id }
    }

    pub fn is_unset(&self) -> bool {
        self.token_id.is_zero()
    }

    /// Token id usable as a call argument, `None` for the sentinel.
    pub fn ready_id(&self) -> Option<U256> {
        (!self.is_unset()).then_some(self.token_id)
    }
}

impl WeaponRef {
    pub fn new(token_id: U256) -> Self {
        Self { token_id }
    }

    pub fn is_unset(&self) -> bool {
        self.token_id.is_zero()
    }

    pub fn ready_id(&self) -> Option<U256> {
        (!self.is_unset()).then_some(self.token_id)
    }
}

// ==================== ATTRIBUTES ====================

/// Character attributes as far as they have arrived. Each field resolves on
/// its own.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CharacterAttributes {
    pub hp: Option<U256>,
    pub xp: Option<U256>,
    pub level: Option<U256>,
    pub angel_modifier: Option<U256>,
    pub skill: Option<U256>,
    pub char_type: Option<U256>,
    pub status: Option<U256>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct WeaponAttributes {
    pub base_attack: Option<U256>,
}

// ==================== REWARDS ====================

/// `rewards(address)` on the reward pool, 18-decimal fixed point.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RewardAccount {
    pub total_received: U256,
    pub total_accumulated: U256,
    pub current_limit: U256,
    pub limit_reset: U256,
}

impl RewardAccount {
    /// True when any counter went down compared to `previous`. Accumulation
    /// only grows between claims.
    pub fn regressed_from(&self, previous: &RewardAccount) -> bool {
        self.total_received < previous.total_received
            || self.total_accumulated < previous.total_accumulated
    }

    /// `limit_reset` read as a unix timestamp.
    pub fn limit_reset_at(&self) -> Option<DateTime<Utc>> {
        if self.limit_reset > U256::from(i64::MAX as u64) {
            return None;
        }
        DateTime::from_timestamp(self.limit_reset.as_u64() as i64, 0)
    }
}

// ==================== FIGHT ====================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct FightOutcome {
    pub status: bool,
    pub drop: U256,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tx_hash: Option<H256>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FightState {
    Idle,
    ReconcilingNetwork,
    Submitting,
    Succeeded,
    Failed,
}

impl FightState {
    pub fn is_busy(&self) -> bool {
        matches!(self, FightState::ReconcilingNetwork | FightState::Submitting)
    }
}

// ==================== SESSION ====================

/// Placeholder art until the first reload, NFT art afterwards.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DisplayMode {
    Placeholder,
    Nft,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RefreshTrigger {
    UserReload,
    DisplayToggle,
    FightCompleted,
}
