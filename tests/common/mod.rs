#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use achievement_ledger::cache::{MemoryCache, StatisticCache};
use achievement_ledger::confined::Confined;
use achievement_ledger::model::{AwardRecord, StatisticWrite};
use achievement_ledger::rank::RankSnapshot;
use achievement_ledger::store::{AchievementStore, MemoryStore};
use achievement_ledger::thresholds::ThresholdAwarder;
use achievement_ledger::{
    AchievementRegistry, AchievementsApi, CategoryKey, ContextGate, MainLoop, PlayerId, StoreError,
};
use chrono::{DateTime, Utc};

pub const DEFINITIONS: &str = r#"{
    "achievements": [
        { "name": "first_login", "displayName": "Welcome!", "message": "Connected once",
          "category": "Connections", "threshold": 1 },
        { "name": "regular", "displayName": "Regular", "message": "Connected five times",
          "category": "Connections", "threshold": 5 },
        { "name": "zombie_hunter", "displayName": "Zombie Hunter", "message": "Killed 3 zombies",
          "category": "Kills", "subcategory": "zombie", "threshold": 3 },
        { "name": "founder", "displayName": "Founder", "message": "Was there at launch" }
    ]
}"#;

pub fn registry() -> Arc<AchievementRegistry> {
    Arc::new(AchievementRegistry::from_json_str(DEFINITIONS).unwrap())
}

pub fn start_loop() -> Arc<MainLoop> {
    Arc::new(MainLoop::start(Duration::from_millis(20)).unwrap())
}

/// Runs `task` on the primary thread and waits for its result.
pub fn on_primary<T, F>(main_loop: &MainLoop, task: F) -> T
where
    T: Send + 'static,
    F: FnOnce() -> T + Send + 'static,
{
    main_loop.call(task).wait(None).unwrap()
}

/// Builds an API whose cache is created on the main loop thread.
pub fn build_api<F>(
    main_loop: &Arc<MainLoop>,
    make_cache: F,
    store: Arc<dyn AchievementStore>,
) -> Arc<AchievementsApi>
where
    F: FnOnce() -> Box<dyn StatisticCache> + Send + 'static,
{
    let cache = on_primary(main_loop, move || Confined::new(make_cache()));
    let registry = registry();
    let evaluator = Arc::new(ThresholdAwarder::new(Arc::clone(&registry), Arc::clone(&store)));
    let gate = ContextGate::new(main_loop.clone());
    Arc::new(AchievementsApi::new(gate, cache, store, registry, evaluator))
}

/// API backed by a real cache and memory store.
pub fn memory_api(main_loop: &Arc<MainLoop>) -> (Arc<AchievementsApi>, Arc<MemoryStore>) {
    let store = Arc::new(MemoryStore::new());
    let cache_store: Arc<dyn AchievementStore> = store.clone();
    let api = build_api(
        main_loop,
        move || Box::new(MemoryCache::new(cache_store)) as Box<dyn StatisticCache>,
        store.clone(),
    );
    (api, store)
}

/// Makes sure everything queued on the main loop so far has run.
pub fn settle(main_loop: &MainLoop) {
    on_primary(main_loop, || ());
}

// ==================== STUBS ====================

/// Cache that must never be reached.
pub struct PanickingCache;

impl StatisticCache for PanickingCache {
    fn statistic(&mut self, _: PlayerId, _: &CategoryKey) -> Result<u64, StoreError> {
        panic!("cache touched: statistic")
    }

    fn increment(&mut self, _: PlayerId, _: &CategoryKey, _: u64) -> Result<u64, StoreError> {
        panic!("cache touched: increment")
    }

    fn has_achievement(&mut self, _: PlayerId, _: &str) -> Result<bool, StoreError> {
        panic!("cache touched: has_achievement")
    }

    fn total_achievements(&mut self, _: PlayerId) -> Result<u64, StoreError> {
        panic!("cache touched: total_achievements")
    }

    fn record_award(&mut self, _: PlayerId, _: &str) -> Result<bool, StoreError> {
        panic!("cache touched: record_award")
    }

    fn drain_dirty(&mut self) -> Vec<StatisticWrite> {
        panic!("cache touched: drain_dirty")
    }

    fn requeue(&mut self, _: Vec<StatisticWrite>) {
        panic!("cache touched: requeue")
    }

    fn evict(&mut self, _: PlayerId) -> Vec<StatisticWrite> {
        panic!("cache touched: evict")
    }

    fn overwrite(&mut self, _: &[StatisticWrite]) {
        panic!("cache touched: overwrite")
    }

    fn forget_awards(&mut self, _: PlayerId) {
        panic!("cache touched: forget_awards")
    }
}

/// Durable tier that must never be reached.
pub struct PanickingStore;

impl AchievementStore for PanickingStore {
    fn has_achievement(&self, _: PlayerId, _: &str) -> Result<bool, StoreError> {
        panic!("store touched: has_achievement")
    }

    fn achievements_for(&self, _: PlayerId) -> Result<Vec<AwardRecord>, StoreError> {
        panic!("store touched: achievements_for")
    }

    fn achievement_count(&self, _: PlayerId) -> Result<u64, StoreError> {
        panic!("store touched: achievement_count")
    }

    fn achievement_counts(&self) -> Result<HashMap<PlayerId, u64>, StoreError> {
        panic!("store touched: achievement_counts")
    }

    fn top_list(&self, _: i64) -> Result<RankSnapshot, StoreError> {
        panic!("store touched: top_list")
    }

    fn statistic(&self, _: PlayerId, _: &CategoryKey) -> Result<u64, StoreError> {
        panic!("store touched: statistic")
    }

    fn register_award(&self, _: PlayerId, _: &str, _: DateTime<Utc>) -> Result<bool, StoreError> {
        panic!("store touched: register_award")
    }

    fn write_statistics(&self, _: &[StatisticWrite]) -> Result<(), StoreError> {
        panic!("store touched: write_statistics")
    }
}

/// Memory store that counts point reads.
#[derive(Default)]
pub struct CountingStore {
    pub inner: MemoryStore,
    reads: AtomicUsize,
}

impl CountingStore {
    pub fn reads(&self) -> usize {
        self.reads.load(Ordering::SeqCst)
    }

    fn count(&self) {
        self.reads.fetch_add(1, Ordering::SeqCst);
    }
}

impl AchievementStore for CountingStore {
    fn has_achievement(&self, player: PlayerId, name: &str) -> Result<bool, StoreError> {
        self.count();
        self.inner.has_achievement(player, name)
    }

    fn achievements_for(&self, player: PlayerId) -> Result<Vec<AwardRecord>, StoreError> {
        self.inner.achievements_for(player)
    }

    fn achievement_count(&self, player: PlayerId) -> Result<u64, StoreError> {
        self.count();
        self.inner.achievement_count(player)
    }

    fn achievement_counts(&self) -> Result<HashMap<PlayerId, u64>, StoreError> {
        self.inner.achievement_counts()
    }

    fn top_list(&self, since_millis: i64) -> Result<RankSnapshot, StoreError> {
        self.inner.top_list(since_millis)
    }

    fn statistic(&self, player: PlayerId, key: &CategoryKey) -> Result<u64, StoreError> {
        self.count();
        self.inner.statistic(player, key)
    }

    fn register_award(
        &self,
        player: PlayerId,
        name: &str,
        awarded_at: DateTime<Utc>,
    ) -> Result<bool, StoreError> {
        self.inner.register_award(player, name, awarded_at)
    }

    fn write_statistics(&self, writes: &[StatisticWrite]) -> Result<(), StoreError> {
        self.inner.write_statistics(writes)
    }
}

/// Store whose writes always fail.
#[derive(Default)]
pub struct FailingWrites {
    pub inner: MemoryStore,
}

impl AchievementStore for FailingWrites {
    fn has_achievement(&self, player: PlayerId, name: &str) -> Result<bool, StoreError> {
        self.inner.has_achievement(player, name)
    }

    fn achievements_for(&self, player: PlayerId) -> Result<Vec<AwardRecord>, StoreError> {
        self.inner.achievements_for(player)
    }

    fn achievement_count(&self, player: PlayerId) -> Result<u64, StoreError> {
        self.inner.achievement_count(player)
    }

    fn achievement_counts(&self) -> Result<HashMap<PlayerId, u64>, StoreError> {
        self.inner.achievement_counts()
    }

    fn top_list(&self, since_millis: i64) -> Result<RankSnapshot, StoreError> {
        self.inner.top_list(since_millis)
    }

    fn statistic(&self, player: PlayerId, key: &CategoryKey) -> Result<u64, StoreError> {
        self.inner.statistic(player, key)
    }

    fn register_award(
        &self,
        player: PlayerId,
        name: &str,
        awarded_at: DateTime<Utc>,
    ) -> Result<bool, StoreError> {
        self.inner.register_award(player, name, awarded_at)
    }

    fn write_statistics(&self, _: &[StatisticWrite]) -> Result<(), StoreError> {
        Err(StoreError::Unavailable("disk full".to_string()))
    }
}

/// Memory store whose award writes fail while `down` is set.
#[derive(Default)]
pub struct FlakyAwards {
    pub inner: MemoryStore,
    down: AtomicBool,
}

impl FlakyAwards {
    pub fn set_down(&self, down: bool) {
        self.down.store(down, Ordering::SeqCst);
    }
}

impl AchievementStore for FlakyAwards {
    fn has_achievement(&self, player: PlayerId, name: &str) -> Result<bool, StoreError> {
        self.inner.has_achievement(player, name)
    }

    fn achievements_for(&self, player: PlayerId) -> Result<Vec<AwardRecord>, StoreError> {
        self.inner.achievements_for(player)
    }

    fn achievement_count(&self, player: PlayerId) -> Result<u64, StoreError> {
        self.inner.achievement_count(player)
    }

    fn achievement_counts(&self) -> Result<HashMap<PlayerId, u64>, StoreError> {
        self.inner.achievement_counts()
    }

    fn top_list(&self, since_millis: i64) -> Result<RankSnapshot, StoreError> {
        self.inner.top_list(since_millis)
    }

    fn statistic(&self, player: PlayerId, key: &CategoryKey) -> Result<u64, StoreError> {
        self.inner.statistic(player, key)
    }

    fn register_award(
        &self,
        player: PlayerId,
        name: &str,
        awarded_at: DateTime<Utc>,
    ) -> Result<bool, StoreError> {
        if self.down.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("db down".to_string()));
        }
        self.inner.register_award(player, name, awarded_at)
    }

    fn write_statistics(&self, writes: &[StatisticWrite]) -> Result<(), StoreError> {
        self.inner.write_statistics(writes)
    }
}
