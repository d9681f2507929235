//! Dependency-aware read plan for a player's combat state.
//!
//! Each field lives in its own `watch` cell. A refresh cycle spawns one task
//! per field; dependent tasks wait on their upstream cells and only dispatch
//! once the reference they are keyed on has resolved to a real token id.
//! Observers get a `FieldUpdate` on the broadcast channel for every change.

use crate::{
    constants::FIELD_UPDATE_CHANNEL_CAPACITY,
    contracts::{single_u256, token_to_u256, ContractCall},
    error::{AppError, Result},
    models::{
        CharacterAttributes, CharacterRef, Field, FieldUpdate, RefreshTrigger, RewardAccount,
        SyncSnapshot, WeaponAttributes, WeaponRef,
    },
};
use ethers::abi::Token;
use ethers::types::{Address, U256};
use futures_util::future::join_all;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, watch};
use tokio::task::JoinHandle;

use super::onchain::ContractReader;

/// State of one field cell.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldState<T> {
    /// Never fetched.
    Pending,
    Resolved { cycle: u64, value: T },
    /// Not dispatched this cycle because a dependency is unset or missing.
    Blocked { cycle: u64 },
    /// The read failed or timed out; shown as "no data".
    Unavailable { cycle: u64, reason: String },
}

impl<T: Clone> FieldState<T> {
    pub fn cycle(&self) -> Option<u64> {
        match self {
            FieldState::Pending => None,
            FieldState::Resolved { cycle, .. }
            | FieldState::Blocked { cycle }
            | FieldState::Unavailable { cycle, .. } => Some(*cycle),
        }
    }

    pub fn value(&self) -> Option<T> {
        match self {
            FieldState::Resolved { value, .. } => Some(value.clone()),
            _ => None,
        }
    }

    pub fn is_resolved(&self) -> bool {
        matches!(self, FieldState::Resolved { .. })
    }

    /// The cell has an outcome for `cycle` or a later one.
    pub fn settled_for(&self, cycle: u64) -> bool {
        self.cycle().is_some_and(|c| c >= cycle)
    }
}

struct Cells {
    character_ref: watch::Sender<FieldState<U256>>,
    weapon_ref: watch::Sender<FieldState<U256>>,
    base_attack: watch::Sender<FieldState<U256>>,
    hp: watch::Sender<FieldState<U256>>,
    xp: watch::Sender<FieldState<U256>>,
    level: watch::Sender<FieldState<U256>>,
    angel_modifier: watch::Sender<FieldState<U256>>,
    skill: watch::Sender<FieldState<U256>>,
    char_type: watch::Sender<FieldState<U256>>,
    status: watch::Sender<FieldState<U256>>,
    success_rate: watch::Sender<FieldState<U256>>,
    hp_require_base: watch::Sender<FieldState<U256>>,
    rewards: watch::Sender<FieldState<RewardAccount>>,
}

impl Cells {
    fn new() -> Self {
        let cell = || watch::channel(FieldState::Pending).0;
        Self {
            character_ref: cell(),
            weapon_ref: cell(),
            base_attack: cell(),
            hp: cell(),
            xp: cell(),
            level: cell(),
            angel_modifier: cell(),
            skill: cell(),
            char_type: cell(),
            status: cell(),
            success_rate: cell(),
            hp_require_base: cell(),
            rewards: watch::channel(FieldState::Pending).0,
        }
    }

    /// Cell of a single-`uint256` field; `None` for `Rewards`.
    fn scalar(&self, field: Field) -> Option<&watch::Sender<FieldState<U256>>> {
        let cell = match field {
            Field::CharacterRef => &self.character_ref,
            Field::WeaponRef => &self.weapon_ref,
            Field::BaseAttack => &self.base_attack,
            Field::Hp => &self.hp,
            Field::Xp => &self.xp,
            Field::Level => &self.level,
            Field::AngelModifier => &self.angel_modifier,
            Field::Skill => &self.skill,
            Field::CharType => &self.char_type,
            Field::Status => &self.status,
            Field::SuccessRate => &self.success_rate,
            Field::HpRequireBase => &self.hp_require_base,
            Field::Rewards => return None,
        };
        Some(cell)
    }

    fn value(&self, field: Field) -> Option<U256> {
        self.scalar(field).and_then(|cell| cell.borrow().value())
    }

    fn settled_for(&self, field: Field, cycle: u64) -> bool {
        match self.scalar(field) {
            Some(cell) => cell.borrow().settled_for(cycle),
            None => self.rewards.borrow().settled_for(cycle),
        }
    }

    fn is_unavailable(&self, field: Field) -> bool {
        match self.scalar(field) {
            Some(cell) => matches!(*cell.borrow(), FieldState::Unavailable { .. }),
            None => matches!(*self.rewards.borrow(), FieldState::Unavailable { .. }),
        }
    }
}

struct SyncInner {
    reader: Arc<dyn ContractReader>,
    read_timeout: Duration,
    cells: Cells,
    updates: broadcast::Sender<FieldUpdate>,
    cycle: AtomicU64,
}

/// Handle on one refresh cycle. Dropping it does not cancel anything.
#[derive(Debug)]
pub struct CycleHandle {
    pub cycle: u64,
    handle: JoinHandle<()>,
}

impl CycleHandle {
    /// Waits until every field task of this cycle has finished.
    pub async fn finished(self) -> Result<()> {
        self.handle
            .await
            .map_err(|e| AppError::Internal(format!("Refresh cycle {} aborted: {}", self.cycle, e)))
    }
}

#[derive(Clone)]
pub struct StateSynchronizer {
    inner: Arc<SyncInner>,
}

impl StateSynchronizer {
    pub fn new(reader: Arc<dyn ContractReader>, read_timeout: Duration) -> Self {
        let (updates, _) = broadcast::channel(FIELD_UPDATE_CHANNEL_CAPACITY);
        Self {
            inner: Arc::new(SyncInner {
                reader,
                read_timeout,
                cells: Cells::new(),
                updates,
                cycle: AtomicU64::new(0),
            }),
        }
    }

    /// Starts a refresh cycle and returns immediately. Fields of earlier
    /// cycles that are still in flight keep running; a late result is
    /// dropped if its field already holds a newer cycle's outcome.
    pub fn synchronize(&self, player: Address, trigger: RefreshTrigger) -> CycleHandle {
        let cycle = self.inner.cycle.fetch_add(1, Ordering::SeqCst) + 1;
        tracing::info!(
            "Refresh cycle {} for {:?} ({:?})",
            cycle,
            player,
            trigger
        );

        let mut tasks: Vec<JoinHandle<()>> = Vec::new();

        // Step 1: equipment slots.
        tasks.push(self.spawn_scalar(cycle, Field::CharacterRef, ContractCall::char_slot(player)));
        tasks.push(self.spawn_scalar(cycle, Field::WeaponRef, ContractCall::weapon_slot(player)));

        // Step 2: weapon attack, keyed on the weapon slot.
        let inner = self.inner.clone();
        tasks.push(tokio::spawn(async move {
            inner.run_base_attack(cycle).await;
        }));

        // Step 3: character attributes, keyed on the character slot.
        for field in Field::CHARACTER_ATTRIBUTES {
            let inner = self.inner.clone();
            tasks.push(tokio::spawn(async move {
                inner.run_character_attribute(cycle, field).await;
            }));
        }

        // Step 4: success rate, keyed on character slot and weapon attack.
        let inner = self.inner.clone();
        tasks.push(tokio::spawn(async move {
            inner.run_success_rate(cycle).await;
        }));

        // Step 5: contract-wide constant, fetched once.
        let inner = self.inner.clone();
        tasks.push(tokio::spawn(async move {
            inner.run_hp_require_base(cycle).await;
        }));

        // Step 6: reward account.
        let inner = self.inner.clone();
        tasks.push(tokio::spawn(async move {
            inner.run_rewards(cycle, player).await;
        }));

        let handle = tokio::spawn(async move {
            for result in join_all(tasks).await {
                if let Err(err) = result {
                    tracing::error!("Field task of cycle {} panicked: {}", cycle, err);
                }
            }
            tracing::debug!("Refresh cycle {} settled", cycle);
        });

        CycleHandle { cycle, handle }
    }

    /// Per-field notifications, one per cell change.
    pub fn subscribe(&self) -> broadcast::Receiver<FieldUpdate> {
        self.inner.updates.subscribe()
    }

    pub fn current_cycle(&self) -> u64 {
        self.inner.cycle.load(Ordering::SeqCst)
    }

    /// Fields with no outcome for the latest cycle yet.
    pub fn pending_fields(&self) -> Vec<Field> {
        let cycle = self.current_cycle();
        Field::ALL
            .into_iter()
            .filter(|field| !self.inner.cells.settled_for(*field, cycle))
            .collect()
    }

    /// Fields whose latest read failed or timed out.
    pub fn unavailable_fields(&self) -> Vec<Field> {
        Field::ALL
            .into_iter()
            .filter(|field| self.inner.cells.is_unavailable(*field))
            .collect()
    }

    pub fn snapshot(&self) -> SyncSnapshot {
        let cells = &self.inner.cells;
        SyncSnapshot {
            cycle: self.current_cycle(),
            character_ref: cells.value(Field::CharacterRef).map(CharacterRef::new),
            weapon_ref: cells.value(Field::WeaponRef).map(WeaponRef::new),
            character: CharacterAttributes {
                hp: cells.value(Field::Hp),
                xp: cells.value(Field::Xp),
                level: cells.value(Field::Level),
                angel_modifier: cells.value(Field::AngelModifier),
                skill: cells.value(Field::Skill),
                char_type: cells.value(Field::CharType),
                status: cells.value(Field::Status),
            },
            weapon: WeaponAttributes {
                base_attack: cells.value(Field::BaseAttack),
            },
            raw_success_rate: cells.value(Field::SuccessRate),
            hp_require_base: cells.value(Field::HpRequireBase),
            rewards: cells.rewards.borrow().value(),
        }
    }

    // Internal helper that spawns an independent single-value read.
    fn spawn_scalar(&self, cycle: u64, field: Field, call: ContractCall) -> JoinHandle<()> {
        let inner = self.inner.clone();
        tokio::spawn(async move {
            inner.run_scalar(cycle, field, call).await;
        })
    }
}

impl SyncInner {
    async fn read(&self, call: &ContractCall) -> Result<Vec<Token>> {
        tokio::time::timeout(self.read_timeout, self.reader.call(call))
            .await
            .map_err(|_| AppError::Timeout(call.method.to_string()))?
    }

    async fn run_scalar(&self, cycle: u64, field: Field, call: ContractCall) {
        let state = match self.read(&call).await.and_then(|tokens| single_u256(&tokens)) {
            Ok(value) => FieldState::Resolved { cycle, value },
            Err(err) => {
                tracing::warn!("{} read failed (cycle {}): {}", call.method, cycle, err);
                FieldState::Unavailable {
                    cycle,
                    reason: err.to_string(),
                }
            }
        };
        self.publish(field, state);
    }

    async fn run_base_attack(&self, cycle: u64) {
        match self.await_weapon(cycle).await {
            Some(weapon_id) => {
                self.run_scalar(cycle, Field::BaseAttack, ContractCall::base_attack(weapon_id))
                    .await
            }
            None => self.publish(Field::BaseAttack, FieldState::Blocked { cycle }),
        }
    }

    async fn run_character_attribute(&self, cycle: u64, field: Field) {
        match self.await_character(cycle).await {
            Some(character_id) => {
                let call = ContractCall::character_attribute(field.method(), character_id);
                self.run_scalar(cycle, field, call).await
            }
            None => self.publish(field, FieldState::Blocked { cycle }),
        }
    }

    async fn run_success_rate(&self, cycle: u64) {
        let (character_id, base_attack) = futures_util::future::join(
            self.await_character(cycle),
            self.await_value(Field::BaseAttack, cycle),
        )
        .await;
        match (character_id, base_attack) {
            (Some(character_id), Some(base_attack)) => {
                let call = ContractCall::success_rate(character_id, base_attack);
                self.run_scalar(cycle, Field::SuccessRate, call).await
            }
            _ => self.publish(Field::SuccessRate, FieldState::Blocked { cycle }),
        }
    }

    async fn run_hp_require_base(&self, cycle: u64) {
        match self.cells.value(Field::HpRequireBase) {
            Some(value) => {
                tracing::debug!("hpRequireBase cached ({})", value);
                self.publish(Field::HpRequireBase, FieldState::Resolved { cycle, value });
            }
            None => {
                self.run_scalar(cycle, Field::HpRequireBase, ContractCall::hp_require_base())
                    .await
            }
        }
    }

    async fn run_rewards(&self, cycle: u64, player: Address) {
        let call = ContractCall::rewards(player);
        let state = match self.read(&call).await.and_then(|tokens| decode_rewards(&tokens)) {
            Ok(value) => FieldState::Resolved { cycle, value },
            Err(err) => {
                tracing::warn!("rewards read failed (cycle {}): {}", cycle, err);
                FieldState::Unavailable {
                    cycle,
                    reason: err.to_string(),
                }
            }
        };

        let accepted = self.cells.rewards.send_if_modified(|current| {
            if current.cycle().is_some_and(|c| c > cycle) {
                return false;
            }
            if let (Some(previous), Some(next)) = (current.value(), state.value()) {
                if next.regressed_from(&previous) {
                    tracing::warn!(
                        "Reward counters for {:?} went down (accumulated {} -> {}); claim or data error",
                        player,
                        previous.total_accumulated,
                        next.total_accumulated
                    );
                }
            }
            *current = state;
            true
        });
        self.notify(Field::Rewards, cycle, accepted);
    }

    /// Equipped character for `cycle`, `None` when the slot is empty or its
    /// read failed.
    async fn await_character(&self, cycle: u64) -> Option<U256> {
        let token_id = self.await_value(Field::CharacterRef, cycle).await?;
        CharacterRef::new(token_id).ready_id()
    }

    async fn await_weapon(&self, cycle: u64) -> Option<U256> {
        let token_id = self.await_value(Field::WeaponRef, cycle).await?;
        WeaponRef::new(token_id).ready_id()
    }

    async fn await_value(&self, field: Field, cycle: u64) -> Option<U256> {
        let mut rx = self.cells.scalar(field)?.subscribe();
        let state = match rx.wait_for(|state| state.settled_for(cycle)).await {
            Ok(state) => state.clone(),
            Err(_) => return None,
        };
        state.value()
    }

    fn publish(&self, field: Field, next: FieldState<U256>) {
        let Some(cell) = self.cells.scalar(field) else {
            return;
        };
        let cycle = next.cycle().unwrap_or_default();
        let resolved = next.is_resolved();
        let accepted = cell.send_if_modified(|current| {
            if current.cycle().is_some_and(|c| c > cycle) {
                return false;
            }
            *current = next;
            true
        });
        if accepted {
            tracing::debug!("{:?} updated (cycle {}, resolved={})", field, cycle, resolved);
        } else {
            tracing::debug!("Dropped stale {:?} from cycle {}", field, cycle);
        }
        self.notify(field, cycle, accepted);
    }

    fn notify(&self, field: Field, cycle: u64, accepted: bool) {
        if !accepted {
            return;
        }
        let resolved = match self.cells.scalar(field) {
            Some(cell) => cell.borrow().is_resolved(),
            None => self.cells.rewards.borrow().is_resolved(),
        };
        // No subscribers is fine.
        let _ = self.updates.send(FieldUpdate {
            field,
            cycle,
            resolved,
        });
    }
}

// Internal helper that parses or transforms values for `decode_rewards`.
fn decode_rewards(tokens: &[Token]) -> Result<RewardAccount> {
    match tokens {
        [received, accumulated, limit, reset] => Ok(RewardAccount {
            total_received: token_to_u256(received)?,
            total_accumulated: token_to_u256(accumulated)?,
            current_limit: token_to_u256(limit)?,
            limit_reset: token_to_u256(reset)?,
        }),
        _ => Err(AppError::BlockchainRPC(format!(
            "rewards returned {} values, expected 4",
            tokens.len()
        ))),
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::sync::Mutex;
    use tokio::sync::Notify;

    /// Contract double answering from a method -> value table and recording
    /// every call it receives.
    pub(crate) struct FakeReader {
        pub values: Mutex<HashMap<&'static str, Vec<Token>>>,
        pub calls: Mutex<Vec<ContractCall>>,
        pub gates: Mutex<HashMap<&'static str, Arc<Notify>>>,
        pub failing: Mutex<Vec<&'static str>>,
    }

    impl FakeReader {
        pub(crate) fn new() -> Self {
            Self {
                values: Mutex::new(HashMap::new()),
                calls: Mutex::new(Vec::new()),
                gates: Mutex::new(HashMap::new()),
                failing: Mutex::new(Vec::new()),
            }
        }

        /// Player with character #9 (level 5) and weapon #4 (attack 30).
        pub(crate) fn equipped() -> Self {
            let reader = Self::new();
            reader.set("getCharSlot1", 9);
            reader.set("getWeaponSlot1", 4);
            reader.set("getBaseAttack", 30);
            reader.set("getCharHP", 120);
            reader.set("getCharXP", 40);
            reader.set("getCharLevel", 5);
            reader.set("getAngelModifier", 1);
            reader.set("getCharSkill", 2);
            reader.set("getCharType", 3);
            reader.set("getCharStatus", 0);
            reader.set("getSuccessRate", 7550);
            reader.set("hpRequireBase", 50);
            reader.set_rewards(0, 2_500_000_000_000_000_000, 10, 1_700_000_000);
            reader
        }

        pub(crate) fn set(&self, method: &'static str, value: u128) {
            self.values
                .lock()
                .unwrap()
                .insert(method, vec![Token::Uint(U256::from(value))]);
        }

        pub(crate) fn set_rewards(&self, received: u128, accumulated: u128, limit: u128, reset: u128) {
            self.values.lock().unwrap().insert(
                "rewards",
                [received, accumulated, limit, reset]
                    .into_iter()
                    .map(|v| Token::Uint(U256::from(v)))
                    .collect(),
            );
        }

        pub(crate) fn fail(&self, method: &'static str) {
            self.failing.lock().unwrap().push(method);
        }

        /// Holds `method` calls until the returned gate is notified.
        pub(crate) fn gate(&self, method: &'static str) -> Arc<Notify> {
            let notify = Arc::new(Notify::new());
            self.gates.lock().unwrap().insert(method, notify.clone());
            notify
        }

        pub(crate) fn calls(&self) -> Vec<ContractCall> {
            self.calls.lock().unwrap().clone()
        }

        pub(crate) fn count(&self, method: &str) -> usize {
            self.calls().iter().filter(|c| c.method == method).count()
        }
    }

    #[async_trait::async_trait]
    impl ContractReader for FakeReader {
        async fn call(&self, call: &ContractCall) -> Result<Vec<Token>> {
            call.validate()?;
            self.calls.lock().unwrap().push(call.clone());
            let gate = self.gates.lock().unwrap().get(call.method).cloned();
            if let Some(gate) = gate {
                gate.notified().await;
            }
            if self.failing.lock().unwrap().contains(&call.method) {
                return Err(AppError::BlockchainRPC("execution reverted".to_string()));
            }
            self.values
                .lock()
                .unwrap()
                .get(call.method)
                .cloned()
                .ok_or_else(|| AppError::BlockchainRPC(format!("no value for {}", call.method)))
        }
    }

    fn player() -> Address {
        "0x1111111111111111111111111111111111111111".parse().unwrap()
    }

    fn synchronizer(reader: Arc<FakeReader>) -> StateSynchronizer {
        StateSynchronizer::new(reader, Duration::from_secs(5))
    }

    #[tokio::test]
    async fn full_cycle_resolves_every_field() {
        let reader = Arc::new(FakeReader::equipped());
        let sync = synchronizer(reader.clone());

        sync.synchronize(player(), RefreshTrigger::UserReload)
            .finished()
            .await
            .expect("cycle");

        let snapshot = sync.snapshot();
        assert!(sync.unavailable_fields().is_empty());
        assert_eq!(snapshot.character_ref, Some(CharacterRef::new(U256::from(9))));
        assert_eq!(snapshot.weapon.base_attack, Some(U256::from(30)));
        assert_eq!(snapshot.character.level, Some(U256::from(5)));
        assert_eq!(snapshot.raw_success_rate, Some(U256::from(7550)));
        assert_eq!(
            snapshot.rewards.map(|r| r.total_accumulated),
            Some(U256::from(2_500_000_000_000_000_000_u128))
        );
        assert!(sync.pending_fields().is_empty());
    }

    #[tokio::test]
    async fn dependent_reads_use_resolved_arguments() {
        let reader = Arc::new(FakeReader::equipped());
        let sync = synchronizer(reader.clone());
        sync.synchronize(player(), RefreshTrigger::UserReload)
            .finished()
            .await
            .expect("cycle");

        let calls = reader.calls();
        let attack = calls.iter().find(|c| c.method == "getBaseAttack").expect("attack");
        assert_eq!(attack.uint_args(), vec![U256::from(4)]);
        let rate = calls.iter().find(|c| c.method == "getSuccessRate").expect("rate");
        assert_eq!(rate.uint_args(), vec![U256::from(9), U256::from(30)]);
        for field in Field::CHARACTER_ATTRIBUTES {
            let call = calls.iter().find(|c| c.method == field.method()).expect("attr");
            assert_eq!(call.uint_args(), vec![U256::from(9)]);
        }
    }

    #[tokio::test]
    async fn unset_weapon_never_dispatches_keyed_reads() {
        let reader = Arc::new(FakeReader::equipped());
        reader.set("getWeaponSlot1", 0);
        let sync = synchronizer(reader.clone());

        sync.synchronize(player(), RefreshTrigger::UserReload)
            .finished()
            .await
            .expect("cycle");

        assert_eq!(reader.count("getBaseAttack"), 0);
        assert_eq!(reader.count("getSuccessRate"), 0);
        assert_eq!(reader.count("getCharLevel"), 1);
        let snapshot = sync.snapshot();
        assert_eq!(snapshot.weapon.base_attack, None);
        assert_eq!(snapshot.raw_success_rate, None);
        assert!(sync.pending_fields().is_empty());
        assert!(sync.unavailable_fields().is_empty());
    }

    #[tokio::test]
    async fn unset_character_leaves_attributes_pending() {
        let reader = Arc::new(FakeReader::equipped());
        reader.set("getCharSlot1", 0);
        let sync = synchronizer(reader.clone());

        sync.synchronize(player(), RefreshTrigger::UserReload)
            .finished()
            .await
            .expect("cycle");

        for field in Field::CHARACTER_ATTRIBUTES {
            assert_eq!(reader.count(field.method()), 0, "{} dispatched", field.method());
        }
        assert_eq!(reader.count("getSuccessRate"), 0);
        assert_eq!(reader.count("getBaseAttack"), 1);
        assert_eq!(sync.snapshot().character, CharacterAttributes::default());
    }

    #[tokio::test]
    async fn no_call_is_keyed_on_a_zero_reference() {
        for (char_slot, weapon_slot) in [(0, 0), (0, 4), (9, 0), (9, 4)] {
            let reader = Arc::new(FakeReader::equipped());
            reader.set("getCharSlot1", char_slot);
            reader.set("getWeaponSlot1", weapon_slot);
            let sync = synchronizer(reader.clone());
            sync.synchronize(player(), RefreshTrigger::UserReload)
                .finished()
                .await
                .expect("cycle");

            for call in reader.calls() {
                if call.method == "getSuccessRate" {
                    assert!(!call.uint_args()[0].is_zero());
                } else {
                    assert!(call.uint_args().iter().all(|id| !id.is_zero()), "{:?}", call);
                }
            }
        }
    }

    #[tokio::test]
    async fn failed_slot_read_blocks_dependents() {
        let reader = Arc::new(FakeReader::equipped());
        reader.fail("getWeaponSlot1");
        let sync = synchronizer(reader.clone());

        sync.synchronize(player(), RefreshTrigger::UserReload)
            .finished()
            .await
            .expect("cycle");

        assert_eq!(reader.count("getBaseAttack"), 0);
        assert_eq!(reader.count("getSuccessRate"), 0);
        assert_eq!(sync.snapshot().weapon_ref, None);
        assert!(sync.pending_fields().is_empty());
        assert_eq!(sync.unavailable_fields(), vec![Field::WeaponRef]);
    }

    #[tokio::test]
    async fn hung_read_times_out_as_unavailable() {
        let reader = Arc::new(FakeReader::equipped());
        // Never notified.
        let _gate = reader.gate("getCharHP");
        let sync = StateSynchronizer::new(reader.clone(), Duration::from_millis(50));

        sync.synchronize(player(), RefreshTrigger::UserReload)
            .finished()
            .await
            .expect("cycle");

        assert!(sync.pending_fields().is_empty());
        assert_eq!(sync.unavailable_fields(), vec![Field::Hp]);
        assert_eq!(sync.snapshot().character.hp, None);
        assert_eq!(sync.snapshot().character.level, Some(U256::from(5)));
    }

    #[tokio::test]
    async fn synchronize_returns_before_reads_complete() {
        let reader = Arc::new(FakeReader::equipped());
        let gate = reader.gate("getCharSlot1");
        let sync = synchronizer(reader.clone());
        let mut updates = sync.subscribe();

        let handle = sync.synchronize(player(), RefreshTrigger::UserReload);
        assert_eq!(handle.cycle, 1);

        // Independent fields arrive while the character slot is held back.
        let mut seen = Vec::new();
        while seen.len() < 4 {
            let update = updates.recv().await.expect("update");
            seen.push(update.field);
        }
        assert!(!seen.contains(&Field::CharacterRef));
        assert!(sync.pending_fields().contains(&Field::Hp));
        assert_eq!(reader.count("getCharHP"), 0);

        gate.notify_one();
        handle.finished().await.expect("cycle");
        assert_eq!(sync.snapshot().character.hp, Some(U256::from(120)));
    }

    #[tokio::test]
    async fn hp_require_base_is_fetched_once() {
        let reader = Arc::new(FakeReader::equipped());
        let sync = synchronizer(reader.clone());

        for _ in 0..3 {
            sync.synchronize(player(), RefreshTrigger::UserReload)
                .finished()
                .await
                .expect("cycle");
        }

        assert_eq!(reader.count("hpRequireBase"), 1);
        assert_eq!(reader.count("getCharSlot1"), 3);
        assert_eq!(sync.snapshot().hp_require_base, Some(U256::from(50)));
        assert!(sync.pending_fields().is_empty());
    }

    #[tokio::test]
    async fn newer_cycle_wins_over_late_stale_result() {
        let reader = Arc::new(FakeReader::equipped());
        let gate = reader.gate("getCharHP");
        let sync = synchronizer(reader.clone());

        let first = sync.synchronize(player(), RefreshTrigger::UserReload);
        // Let the first cycle reach the gated HP read.
        while reader.count("getCharHP") < 1 {
            tokio::task::yield_now().await;
        }

        reader.gates.lock().unwrap().remove("getCharHP");
        reader.set("getCharHP", 80);
        sync.synchronize(player(), RefreshTrigger::FightCompleted)
            .finished()
            .await
            .expect("second cycle");
        assert_eq!(sync.snapshot().character.hp, Some(U256::from(80)));

        // The first cycle's HP read now completes late with the same
        // table value but an older cycle tag; it must not regress the cell.
        gate.notify_one();
        first.finished().await.expect("first cycle");
        assert_eq!(sync.current_cycle(), 2);
        assert!(sync.pending_fields().is_empty());
        assert_eq!(sync.snapshot().character.hp, Some(U256::from(80)));
    }

    #[tokio::test]
    async fn rewards_regression_is_accepted() {
        let reader = Arc::new(FakeReader::equipped());
        let sync = synchronizer(reader.clone());
        sync.synchronize(player(), RefreshTrigger::UserReload)
            .finished()
            .await
            .expect("cycle");

        reader.set_rewards(2_500_000_000_000_000_000, 0, 10, 1_700_000_000);
        sync.synchronize(player(), RefreshTrigger::UserReload)
            .finished()
            .await
            .expect("cycle");

        let rewards = sync.snapshot().rewards.expect("rewards");
        assert!(rewards.total_accumulated.is_zero());
    }

    #[test]
    fn decode_rewards_requires_four_values() {
        assert!(decode_rewards(&[Token::Uint(U256::one())]).is_err());
        let account = decode_rewards(&[
            Token::Uint(U256::from(1)),
            Token::Uint(U256::from(2)),
            Token::Uint(U256::from(3)),
            Token::Uint(U256::from(4)),
        ])
        .expect("decoded");
        assert_eq!(account.total_accumulated, U256::from(2));
        assert_eq!(account.limit_reset, U256::from(4));
    }

    #[test]
    fn field_state_tracks_cycles() {
        let pending: FieldState<U256> = FieldState::Pending;
        assert!(!pending.settled_for(1));
        let blocked: FieldState<U256> = FieldState::Blocked { cycle: 2 };
        assert!(blocked.settled_for(1));
        assert!(blocked.settled_for(2));
        assert!(!blocked.settled_for(3));
        assert_eq!(blocked.value(), None);
    }
}
