use super::player::{
    CharacterAttributes, CharacterRef, DisplayMode, FightState, RewardAccount, WeaponAttributes,
    WeaponRef,
};
use chrono::{DateTime, Utc};
use ethers::types::{Address, U256};
use serde::{Serialize, Serializer};

// ==================== FIELDS ====================

/// Every value the synchronizer tracks, one cell each.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Field {
    CharacterRef,
    WeaponRef,
    BaseAttack,
    Hp,
    Xp,
    Level,
    AngelModifier,
    Skill,
    CharType,
    Status,
    SuccessRate,
    HpRequireBase,
    Rewards,
}

impl Field {
    pub const ALL: [Field; 13] = [
        Field::CharacterRef,
        Field::WeaponRef,
        Field::BaseAttack,
        Field::Hp,
        Field::Xp,
        Field::Level,
        Field::AngelModifier,
        Field::Skill,
        Field::CharType,
        Field::Status,
        Field::SuccessRate,
        Field::HpRequireBase,
        Field::Rewards,
    ];

    /// The seven per-character reads keyed on the character token id.
    pub const CHARACTER_ATTRIBUTES: [Field; 7] = [
        Field::Hp,
        Field::Xp,
        Field::Level,
        Field::AngelModifier,
        Field::Skill,
        Field::CharType,
        Field::Status,
    ];

    /// Contract method that feeds this field.
    pub fn method(&self) -> &'static str {
        match self {
            Field::CharacterRef => "getCharSlot1",
            Field::WeaponRef => "getWeaponSlot1",
            Field::BaseAttack => "getBaseAttack",
            Field::Hp => "getCharHP",
            Field::Xp => "getCharXP",
            Field::Level => "getCharLevel",
            Field::AngelModifier => "getAngelModifier",
            Field::Skill => "getCharSkill",
            Field::CharType => "getCharType",
            Field::Status => "getCharStatus",
            Field::SuccessRate => "getSuccessRate",
            Field::HpRequireBase => "hpRequireBase",
            Field::Rewards => "rewards",
        }
    }
}

/// Notification sent to observers whenever a field cell changes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct FieldUpdate {
    pub field: Field,
    pub cycle: u64,
    pub resolved: bool,
}

// ==================== RAW SNAPSHOT ====================

/// Current, possibly partial, view of the on-chain state.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncSnapshot {
    pub cycle: u64,
    pub character_ref: Option<CharacterRef>,
    pub weapon_ref: Option<WeaponRef>,
    pub character: CharacterAttributes,
    pub weapon: WeaponAttributes,
    pub raw_success_rate: Option<U256>,
    pub hp_require_base: Option<U256>,
    pub rewards: Option<RewardAccount>,
}

// ==================== PRESENTATION ====================

/// Output contract toward the presentation layer. Every value is nullable
/// while its read is pending.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CombatReadiness {
    pub player: Address,
    pub cycle: u64,
    pub display_mode: DisplayMode,
    #[serde(serialize_with = "serialize_opt_u256")]
    pub character_id: Option<U256>,
    #[serde(serialize_with = "serialize_opt_u256")]
    pub weapon_id: Option<U256>,
    #[serde(serialize_with = "serialize_opt_u256")]
    pub hp: Option<U256>,
    #[serde(serialize_with = "serialize_opt_u256")]
    pub xp: Option<U256>,
    #[serde(serialize_with = "serialize_opt_u256")]
    pub level: Option<U256>,
    #[serde(serialize_with = "serialize_opt_u256")]
    pub angel_modifier: Option<U256>,
    #[serde(serialize_with = "serialize_opt_u256")]
    pub skill: Option<U256>,
    #[serde(serialize_with = "serialize_opt_u256")]
    pub char_type: Option<U256>,
    #[serde(serialize_with = "serialize_opt_u256")]
    pub status: Option<U256>,
    #[serde(serialize_with = "serialize_opt_u256")]
    pub base_attack: Option<U256>,
    #[serde(serialize_with = "serialize_opt_u256")]
    pub hp_required: Option<U256>,
    pub success_rate_percent: Option<f64>,
    pub reward_display: Option<String>,
    pub limit_reset_at: Option<DateTime<Utc>>,
    pub fight_state: FightState,
    pub character_image_url: String,
    pub mobster_image_url: Option<String>,
    /// Some field of the latest cycle has no outcome yet.
    pub loading: bool,
    /// Fields whose latest read failed; shown as "no data", not as loading.
    pub unavailable: Vec<Field>,
}

// Internal helper that serializes `U256` as a decimal string.
fn serialize_opt_u256<S>(value: &Option<U256>, serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    match value {
        Some(v) => serializer.serialize_some(&v.to_string()),
        None => serializer.serialize_none(),
    }
}
