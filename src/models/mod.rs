// src/models/mod.rs
pub mod chain;
pub mod player;
pub mod snapshot;

pub use chain::{ChainDescriptor, NativeCurrency};
pub use player::{
    CharacterAttributes, CharacterRef, DisplayMode, FightOutcome, FightState, RefreshTrigger,
    RewardAccount, WeaponAttributes, WeaponRef,
};
pub use snapshot::{CombatReadiness, Field, FieldUpdate, SyncSnapshot};
