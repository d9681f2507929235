//! Catalog of the game's contract methods.
//!
//! Signatures are kept as human-readable Solidity fragments and parsed into
//! `ethers::abi` items once. Every read and write is checked against this
//! catalog before it reaches the network.

use crate::{
    config::Config,
    error::{AppError, Result},
};
use ethers::abi::{parse_abi, Abi, Function, Token};
use ethers::types::{Address, U256};
use serde::Serialize;
use std::collections::HashMap;
use std::str::FromStr;
use std::sync::OnceLock;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ContractKind {
    Game,
    Character,
    Weapon,
    RewardPool,
}

impl ContractKind {
    pub const ALL: [ContractKind; 4] = [
        ContractKind::Game,
        ContractKind::Character,
        ContractKind::Weapon,
        ContractKind::RewardPool,
    ];
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Mutability {
    View,
    NonPayable,
}

#[derive(Debug, Clone, Copy, Serialize)]
pub struct MethodSpec {
    pub contract: ContractKind,
    pub name: &'static str,
    pub signature: &'static str,
    pub mutability: Mutability,
}

pub const METHODS: &[MethodSpec] = &[
    // Game
    MethodSpec {
        contract: ContractKind::Game,
        name: "getCharSlot1",
        signature: "function getCharSlot1(address _address) view returns (uint256 tokenID)",
        mutability: Mutability::View,
    },
    MethodSpec {
        contract: ContractKind::Game,
        name: "getWeaponSlot1",
        signature: "function getWeaponSlot1(address _address) view returns (uint256 _tokenID)",
        mutability: Mutability::View,
    },
    MethodSpec {
        contract: ContractKind::Game,
        name: "getSuccessRate",
        signature: "function getSuccessRate(uint256 _tokenID, uint256 _weaponAttack) view returns (uint256 Rate)",
        mutability: Mutability::View,
    },
    MethodSpec {
        contract: ContractKind::Game,
        name: "hpRequireBase",
        signature: "function hpRequireBase() view returns (uint256 HP)",
        mutability: Mutability::View,
    },
    MethodSpec {
        contract: ContractKind::Game,
        name: "fightSlot1",
        signature: "function fightSlot1() returns (bool status, uint256 drop)",
        mutability: Mutability::NonPayable,
    },
    // Character
    MethodSpec {
        contract: ContractKind::Character,
        name: "getCharHP",
        signature: "function getCharHP(uint256 _tokenID) view returns (uint256 HP)",
        mutability: Mutability::View,
    },
    MethodSpec {
        contract: ContractKind::Character,
        name: "getCharXP",
        signature: "function getCharXP(uint256 _tokenID) view returns (uint256 XP)",
        mutability: Mutability::View,
    },
    MethodSpec {
        contract: ContractKind::Character,
        name: "getCharLevel",
        signature: "function getCharLevel(uint256 _tokenID) view returns (uint256 Level)",
        mutability: Mutability::View,
    },
    MethodSpec {
        contract: ContractKind::Character,
        name: "getAngelModifier",
        signature: "function getAngelModifier(uint256 _tokenID) view returns (uint256 Angel)",
        mutability: Mutability::View,
    },
    MethodSpec {
        contract: ContractKind::Character,
        name: "getCharSkill",
        signature: "function getCharSkill(uint256 _tokenID) view returns (uint256 Skill)",
        mutability: Mutability::View,
    },
    MethodSpec {
        contract: ContractKind::Character,
        name: "getCharType",
        signature: "function getCharType(uint256 _tokenID) view returns (uint256 Type)",
        mutability: Mutability::View,
    },
    MethodSpec {
        contract: ContractKind::Character,
        name: "getCharStatus",
        signature: "function getCharStatus(uint256 _tokenID) view returns (uint256 Status)",
        mutability: Mutability::View,
    },
    // Weapon
    MethodSpec {
        contract: ContractKind::Weapon,
        name: "getBaseAttack",
        signature: "function getBaseAttack(uint256 _tokenID) view returns (uint256 attack)",
        mutability: Mutability::View,
    },
    // Reward pool
    MethodSpec {
        contract: ContractKind::RewardPool,
        name: "rewards",
        signature: "function rewards(address _address) view returns (uint256 totalReceived, uint256 totalAccumulated, uint256 currentLimit, uint256 limitReset)",
        mutability: Mutability::View,
    },
];

pub fn method(name: &str) -> Option<&'static MethodSpec> {
    METHODS.iter().find(|spec| spec.name == name)
}

pub fn methods_for(contract: ContractKind) -> impl Iterator<Item = &'static MethodSpec> {
    METHODS.iter().filter(move |spec| spec.contract == contract)
}

static PARSED_ABIS: OnceLock<std::result::Result<HashMap<ContractKind, Abi>, String>> =
    OnceLock::new();

// Internal helper that parses every catalog entry into one ABI per contract.
fn parsed_abis() -> Result<&'static HashMap<ContractKind, Abi>> {
    PARSED_ABIS
        .get_or_init(|| {
            let mut abis = HashMap::new();
            for kind in ContractKind::ALL {
                let signatures: Vec<&str> = methods_for(kind).map(|spec| spec.signature).collect();
                let abi = parse_abi(&signatures)
                    .map_err(|e| format!("Invalid {kind:?} ABI fragment: {e}"))?;
                abis.insert(kind, abi);
            }
            Ok(abis)
        })
        .as_ref()
        .map_err(|e| AppError::Internal(e.clone()))
}

pub fn abi_for(contract: ContractKind) -> Result<&'static Abi> {
    parsed_abis()?
        .get(&contract)
        .ok_or_else(|| AppError::Internal(format!("No ABI for {contract:?}")))
}

/// Checks that `method` exists on `contract` and that `args` fit its inputs.
/// Returns the ABI function used to encode the call.
pub fn validate_call(
    contract: ContractKind,
    method_name: &str,
    args: &[Token],
) -> Result<&'static Function> {
    let spec = method(method_name)
        .ok_or_else(|| AppError::BadRequest(format!("Unknown contract method {method_name}")))?;
    if spec.contract != contract {
        return Err(AppError::BadRequest(format!(
            "{method_name} belongs to the {:?} contract, not {contract:?}",
            spec.contract
        )));
    }

    let function = abi_for(contract)?
        .function(method_name)
        .map_err(|e| AppError::Internal(format!("ABI lookup for {method_name}: {e}")))?;

    if function.inputs.len() != args.len() {
        return Err(AppError::BadRequest(format!(
            "{method_name} expects {} argument(s), got {}",
            function.inputs.len(),
            args.len()
        )));
    }
    for (param, arg) in function.inputs.iter().zip(args) {
        if !arg.type_check(&param.kind) {
            return Err(AppError::BadRequest(format!(
                "{method_name} argument {} must be {}",
                param.name, param.kind
            )));
        }
    }

    Ok(function)
}

// ==================== CALLS ====================

/// A validated-on-dispatch request against one of the game contracts.
#[derive(Debug, Clone, PartialEq)]
pub struct ContractCall {
    pub contract: ContractKind,
    pub method: &'static str,
    pub args: Vec<Token>,
}

impl ContractCall {
    pub fn new(contract: ContractKind, method: &'static str, args: Vec<Token>) -> Self {
        Self {
            contract,
            method,
            args,
        }
    }

    pub fn char_slot(player: Address) -> Self {
        Self::new(ContractKind::Game, "getCharSlot1", vec![Token::Address(player)])
    }

    pub fn weapon_slot(player: Address) -> Self {
        Self::new(ContractKind::Game, "getWeaponSlot1", vec![Token::Address(player)])
    }

    pub fn base_attack(weapon_id: U256) -> Self {
        Self::new(ContractKind::Weapon, "getBaseAttack", vec![Token::Uint(weapon_id)])
    }

    pub fn character_attribute(method: &'static str, character_id: U256) -> Self {
        Self::new(ContractKind::Character, method, vec![Token::Uint(character_id)])
    }

    pub fn success_rate(character_id: U256, base_attack: U256) -> Self {
        Self::new(
            ContractKind::Game,
            "getSuccessRate",
            vec![Token::Uint(character_id), Token::Uint(base_attack)],
        )
    }

    pub fn hp_require_base() -> Self {
        Self::new(ContractKind::Game, "hpRequireBase", Vec::new())
    }

    pub fn rewards(player: Address) -> Self {
        Self::new(ContractKind::RewardPool, "rewards", vec![Token::Address(player)])
    }

    pub fn fight_slot1() -> Self {
        Self::new(ContractKind::Game, "fightSlot1", Vec::new())
    }

    pub fn validate(&self) -> Result<&'static Function> {
        validate_call(self.contract, self.method, &self.args)
    }

    /// Integer arguments of this call.
    #[cfg(test)]
    pub(crate) fn uint_args(&self) -> Vec<U256> {
        self.args
            .iter()
            .filter_map(|token| match token {
                Token::Uint(value) => Some(*value),
                _ => None,
            })
            .collect()
    }
}

// ==================== ADDRESSES ====================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ContractAddresses {
    pub game: Address,
    pub character: Address,
    pub weapon: Address,
    pub reward_pool: Address,
}

impl ContractAddresses {
    pub fn from_config(config: &Config) -> Result<Self> {
        Ok(Self {
            game: parse_address(&config.game_contract_address)?,
            character: parse_address(&config.character_contract_address)?,
            weapon: parse_address(&config.weapon_contract_address)?,
            reward_pool: parse_address(&config.reward_pool_contract_address)?,
        })
    }

    pub fn address_of(&self, contract: ContractKind) -> Address {
        match contract {
            ContractKind::Game => self.game,
            ContractKind::Character => self.character,
            ContractKind::Weapon => self.weapon,
            ContractKind::RewardPool => self.reward_pool,
        }
    }
}

pub fn parse_address(value: &str) -> Result<Address> {
    Address::from_str(value.trim())
        .map_err(|_| AppError::Config(format!("Invalid EVM address: {value}")))
}

// ==================== DECODING ====================

pub fn token_to_u256(token: &Token) -> Result<U256> {
    match token {
        Token::Uint(value) => Ok(*value),
        other => Err(AppError::BlockchainRPC(format!(
            "Expected uint256 return value, got {other:?}"
        ))),
    }
}

pub fn token_to_bool(token: &Token) -> Result<bool> {
    match token {
        Token::Bool(value) => Ok(*value),
        other => Err(AppError::BlockchainRPC(format!(
            "Expected bool return value, got {other:?}"
        ))),
    }
}

/// First return value as `uint256`.
pub fn single_u256(tokens: &[Token]) -> Result<U256> {
    let first = tokens
        .first()
        .ok_or_else(|| AppError::BlockchainRPC("Empty return data".to_string()))?;
    token_to_u256(first)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_signature_parses() {
        for kind in ContractKind::ALL {
            let abi = abi_for(kind).expect("abi parses");
            for spec in methods_for(kind) {
                assert!(abi.function(spec.name).is_ok(), "{} missing", spec.name);
            }
        }
    }

    #[test]
    fn catalog_covers_four_contracts() {
        assert_eq!(methods_for(ContractKind::Game).count(), 5);
        assert_eq!(methods_for(ContractKind::Character).count(), 7);
        assert_eq!(methods_for(ContractKind::Weapon).count(), 1);
        assert_eq!(methods_for(ContractKind::RewardPool).count(), 1);
    }

    #[test]
    fn fight_is_the_only_write() {
        let writes: Vec<_> = METHODS
            .iter()
            .filter(|spec| spec.mutability == Mutability::NonPayable)
            .map(|spec| spec.name)
            .collect();
        assert_eq!(writes, vec!["fightSlot1"]);

        let function = ContractCall::fight_slot1().validate().expect("valid");
        assert_eq!(function.outputs.len(), 2);
    }

    #[test]
    fn rewards_returns_four_values() {
        let function = ContractCall::rewards(Address::zero()).validate().expect("valid");
        assert_eq!(function.outputs.len(), 4);
        assert_eq!(function.outputs[1].name, "totalAccumulated");
    }

    #[test]
    fn validate_rejects_wrong_contract() {
        let err = validate_call(ContractKind::Weapon, "getCharHP", &[Token::Uint(1.into())])
            .expect_err("wrong contract");
        assert!(matches!(err, AppError::BadRequest(_)));
    }

    #[test]
    fn validate_rejects_unknown_method() {
        let err = validate_call(ContractKind::Game, "fightSlot2", &[]).expect_err("unknown");
        assert!(err.to_string().contains("fightSlot2"));
    }

    #[test]
    fn validate_rejects_bad_arity_and_types() {
        let arity = validate_call(ContractKind::Game, "getSuccessRate", &[Token::Uint(1.into())]);
        assert!(matches!(arity, Err(AppError::BadRequest(_))));

        let kind = validate_call(
            ContractKind::Game,
            "getCharSlot1",
            &[Token::Uint(1.into())],
        );
        assert!(matches!(kind, Err(AppError::BadRequest(_))));
    }

    #[test]
    fn uint_args_lists_token_ids() {
        let call = ContractCall::success_rate(U256::from(9), U256::from(30));
        assert_eq!(call.uint_args(), vec![U256::from(9), U256::from(30)]);
        assert!(ContractCall::char_slot(Address::zero()).uint_args().is_empty());
    }

    #[test]
    fn single_u256_rejects_empty_or_wrong_type() {
        assert!(single_u256(&[]).is_err());
        assert!(single_u256(&[Token::Bool(true)]).is_err());
        assert_eq!(single_u256(&[Token::Uint(5.into())]).unwrap(), U256::from(5));
    }
}
