use crate::{
    constants::{
        HP_REQUIRED_PER_LEVEL, REWARD_CURRENCY_LABEL, REWARD_DISPLAY_DECIMALS,
        REWARD_TOKEN_DECIMALS, SUCCESS_RATE_MAX_PERCENT, SUCCESS_RATE_SCALE,
    },
    models::{CharacterAttributes, DisplayMode, SyncSnapshot},
};
use ethers::types::U256;
use rust_decimal::{Decimal, RoundingStrategy};
use serde::Serialize;

/// Values derived from the raw snapshot. `None` means not yet available.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CombatDerived {
    pub hp_required: Option<U256>,
    pub success_rate_percent: Option<f64>,
    pub reward_display: Option<String>,
}

/// `(level - 1) * 10 + base`. Levels start at 1; level 0 has no requirement.
pub fn hp_required(level: U256, hp_require_base: U256) -> Option<U256> {
    if level.is_zero() {
        return None;
    }
    (level - U256::one())
        .checked_mul(U256::from(HP_REQUIRED_PER_LEVEL))?
        .checked_add(hp_require_base)
}

/// Contract rate is scaled by 100. Anything above 100 % comes from a stale
/// or mis-keyed read and is reported as unavailable.
pub fn success_rate_percent(raw_success_rate: U256) -> Option<f64> {
    let max_raw = U256::from((SUCCESS_RATE_MAX_PERCENT * SUCCESS_RATE_SCALE) as u64);
    if raw_success_rate > max_raw {
        return None;
    }
    Some(raw_success_rate.as_u64() as f64 / SUCCESS_RATE_SCALE)
}

/// `total_accumulated / 10^18` rounded half away from zero.
pub fn reward_amount(total_accumulated: U256) -> Option<Decimal> {
    let unit = U256::exp10(REWARD_TOKEN_DECIMALS as usize);
    let whole = total_accumulated / unit;
    let fraction = total_accumulated % unit;
    if whole > U256::from(u64::MAX) {
        return None;
    }
    let amount = Decimal::from(whole.as_u64())
        + Decimal::from_i128_with_scale(fraction.as_u128() as i128, REWARD_TOKEN_DECIMALS);
    Some(amount.round_dp_with_strategy(
        REWARD_DISPLAY_DECIMALS,
        RoundingStrategy::MidpointAwayFromZero,
    ))
}

/// Two-decimal rendering, e.g. `2.50`.
pub fn reward_display(total_accumulated: U256) -> Option<String> {
    reward_amount(total_accumulated)
        .map(|amount| format!("{:.*}", REWARD_DISPLAY_DECIMALS as usize, amount))
}

pub fn reward_label(display: &str) -> String {
    format!("{} {}", display, REWARD_CURRENCY_LABEL)
}

pub fn derive(snapshot: &SyncSnapshot) -> CombatDerived {
    let hp_required = match (snapshot.character.level, snapshot.hp_require_base) {
        (Some(level), Some(base)) => hp_required(level, base),
        _ => None,
    };

    let success_rate_percent = snapshot.raw_success_rate.and_then(|raw| {
        let percent = success_rate_percent(raw);
        if percent.is_none() {
            tracing::warn!(
                "Ignoring out-of-range success rate {} (cycle {})",
                raw,
                snapshot.cycle
            );
        }
        percent
    });

    let reward_display = snapshot
        .rewards
        .and_then(|account| reward_display(account.total_accumulated));

    CombatDerived {
        hp_required,
        success_rate_percent,
        reward_display,
    }
}

// ==================== ART ====================

/// `{base}/{angel}/{status}/{type}/{skill}.png`, or the placeholder frame
/// until every component is known.
pub fn character_image_url(
    base_url: &str,
    character: &CharacterAttributes,
    mode: DisplayMode,
) -> String {
    let base = base_url.trim_end_matches('/');
    let parts = (
        character.angel_modifier,
        character.status,
        character.char_type,
        character.skill,
    );
    match (mode, parts) {
        (DisplayMode::Nft, (Some(angel), Some(status), Some(char_type), Some(skill))) => {
            format!("{base}/{angel}/{status}/{char_type}/{skill}.png")
        }
        _ => format!("{base}/null/null/null/null.png"),
    }
}

/// `{base}/{level}.png` once the level is known.
pub fn mobster_image_url(base_url: &str, level: Option<U256>, mode: DisplayMode) -> Option<String> {
    match (mode, level) {
        (DisplayMode::Nft, Some(level)) => {
            Some(format!("{}/{}.png", base_url.trim_end_matches('/'), level))
        }
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::RewardAccount;

    const EPSILON: f64 = 1e-9;

    #[test]
    fn hp_required_follows_level_formula() {
        assert_eq!(hp_required(U256::from(1), U256::from(50)), Some(U256::from(50)));
        assert_eq!(hp_required(U256::from(5), U256::from(50)), Some(U256::from(90)));
        for level in 1..=40_u64 {
            for base in [0_u64, 10, 50, 250] {
                assert_eq!(
                    hp_required(U256::from(level), U256::from(base)),
                    Some(U256::from((level - 1) * 10 + base))
                );
            }
        }
    }

    #[test]
    fn hp_required_overflow_is_unknown() {
        assert_eq!(hp_required(U256::MAX, U256::zero()), None);
    }

    #[test]
    fn hp_required_rejects_level_zero() {
        assert_eq!(hp_required(U256::zero(), U256::from(50)), None);
    }

    #[test]
    fn success_rate_divides_by_hundred() {
        let rate = success_rate_percent(U256::from(7550)).expect("in range");
        assert!((rate - 75.5).abs() < EPSILON);
        for raw in (0..=10_000_u64).step_by(125) {
            let rate = success_rate_percent(U256::from(raw)).expect("in range");
            assert!((rate - raw as f64 / 100.0).abs() < EPSILON);
        }
    }

    #[test]
    fn success_rate_out_of_range_is_unavailable() {
        assert_eq!(success_rate_percent(U256::from(10_001)), None);
        assert_eq!(success_rate_percent(U256::MAX), None);
    }

    #[test]
    fn reward_display_rounds_to_two_decimals() {
        assert_eq!(
            reward_display(U256::from(2_500_000_000_000_000_000_u128)).as_deref(),
            Some("2.50")
        );
        assert_eq!(reward_display(U256::zero()).as_deref(), Some("0.00"));
        assert_eq!(
            reward_display(U256::from(1_005_000_000_000_000_000_u128)).as_deref(),
            Some("1.01")
        );
        assert_eq!(
            reward_display(U256::from(123_454_999_999_999_999_999_u128)).as_deref(),
            Some("123.45")
        );
        assert_eq!(reward_label("2.50"), "2.50 BUSD");
    }

    #[test]
    fn derive_leaves_pending_inputs_unknown() {
        let derived = derive(&SyncSnapshot::default());
        assert_eq!(derived, CombatDerived::default());

        let partial = SyncSnapshot {
            hp_require_base: Some(U256::from(50)),
            ..Default::default()
        };
        assert_eq!(derive(&partial).hp_required, None);
    }

    #[test]
    fn derive_combines_available_fields() {
        let snapshot = SyncSnapshot {
            character: CharacterAttributes {
                level: Some(U256::from(5)),
                ..Default::default()
            },
            hp_require_base: Some(U256::from(50)),
            raw_success_rate: Some(U256::from(7550)),
            rewards: Some(RewardAccount {
                total_accumulated: U256::from(2_500_000_000_000_000_000_u128),
                ..Default::default()
            }),
            ..Default::default()
        };
        let derived = derive(&snapshot);
        assert_eq!(derived.hp_required, Some(U256::from(90)));
        assert_eq!(derived.success_rate_percent, Some(75.5));
        assert_eq!(derived.reward_display.as_deref(), Some("2.50"));
    }

    #[test]
    fn character_art_needs_nft_mode_and_all_parts() {
        let base = "https://app.apocgame.io/NFT/character";
        let mut character = CharacterAttributes {
            angel_modifier: Some(U256::from(1)),
            status: Some(U256::from(0)),
            char_type: Some(U256::from(3)),
            skill: Some(U256::from(2)),
            ..Default::default()
        };
        assert_eq!(
            character_image_url(base, &character, DisplayMode::Nft),
            "https://app.apocgame.io/NFT/character/1/0/3/2.png"
        );
        assert_eq!(
            character_image_url(base, &character, DisplayMode::Placeholder),
            "https://app.apocgame.io/NFT/character/null/null/null/null.png"
        );
        character.skill = None;
        assert!(character_image_url(base, &character, DisplayMode::Nft).ends_with("null/null.png"));
    }

    #[test]
    fn mobster_art_follows_level() {
        let base = "https://app.apocgame.io/NFT/mobster/";
        assert_eq!(
            mobster_image_url(base, Some(U256::from(4)), DisplayMode::Nft).as_deref(),
            Some("https://app.apocgame.io/NFT/mobster/4.png")
        );
        assert_eq!(mobster_image_url(base, None, DisplayMode::Nft), None);
        assert_eq!(
            mobster_image_url(base, Some(U256::from(4)), DisplayMode::Placeholder),
            None
        );
    }
}
