//! Public achievement API.
//!
//! Reads are served from the cache only when the caller is on the primary thread
//! and the player is online; everything else goes to the durable tier, which may
//! lag the cache by one flush cycle. Increments always go through the cache and
//! are therefore only valid on the primary thread; counters of players who are not
//! online are written through at once instead of waiting for the flush.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use crate::cache::StatisticCache;
use crate::confined::Confined;
use crate::context::ContextGate;
use crate::error::{ApiError, RestoreError, StoreError};
use crate::model::{
    Achievement, AwardedAchievement, CategoryKey, MultipleCategory, NormalCategory, PlayerId, Rank,
    StatisticWrite, Version,
};
use crate::rank;
use crate::registry::AchievementRegistry;
use crate::restore;
use crate::store::AchievementStore;
use crate::thresholds::ThresholdEvaluator;
use crate::validate::{not_empty, require_player};

pub struct AchievementsApi {
    gate: ContextGate,
    cache: Confined<Box<dyn StatisticCache>>,
    store: Arc<dyn AchievementStore>,
    registry: Arc<AchievementRegistry>,
    evaluator: Arc<dyn ThresholdEvaluator>,
}

impl AchievementsApi {
    /// `cache` must have been created on the primary thread that `gate` refers to.
    pub fn new(
        gate: ContextGate,
        cache: Confined<Box<dyn StatisticCache>>,
        store: Arc<dyn AchievementStore>,
        registry: Arc<AchievementRegistry>,
        evaluator: Arc<dyn ThresholdEvaluator>,
    ) -> Self {
        Self {
            gate,
            cache,
            store,
            registry,
            evaluator,
        }
    }

    pub fn version(&self) -> Version {
        Version::parse(env!("CARGO_PKG_VERSION"))
    }

    // ==================== ACHIEVEMENTS ====================

    pub fn has_achievement(&self, player: PlayerId, name: &str) -> Result<bool, ApiError> {
        let player = require_player(player)?;
        let name = not_empty(name, "Achievement Name")?;
        if self.use_cache(player) {
            self.with_cache(|cache| cache.has_achievement(player, name))
        } else {
            Ok(self.store.has_achievement(player, name)?)
        }
    }

    /// Copy of every registered definition.
    pub fn all_achievements(&self) -> Vec<Achievement> {
        self.registry
            .all()
            .iter()
            .map(|achievement| Achievement::clone(achievement))
            .collect()
    }

    /// Awards recorded in the durable tier. Awards whose definition is no longer
    /// registered are left out.
    pub fn awarded_achievements(&self, player: PlayerId) -> Result<Vec<AwardedAchievement>, ApiError> {
        let player = require_player(player)?;
        let records = self.store.achievements_for(player)?;
        Ok(records
            .into_iter()
            .filter_map(|record| {
                self.registry.get(&record.name).map(|achievement| AwardedAchievement {
                    achievement: Arc::clone(achievement),
                    player,
                    awarded_at: record.awarded_at,
                })
            })
            .collect())
    }

    pub fn total_achievements(&self, player: PlayerId) -> Result<u64, ApiError> {
        let player = require_player(player)?;
        if self.use_cache(player) {
            self.with_cache(|cache| cache.total_achievements(player))
        } else {
            Ok(self.store.achievement_count(player)?)
        }
    }

    /// `None` when no achievement has that name.
    pub fn display_name(&self, name: &str) -> Result<Option<String>, ApiError> {
        let name = not_empty(name, "Achievement Name")?;
        Ok(self
            .registry
            .get(name)
            .map(|achievement| achievement.display_name.clone()))
    }

    /// Award counts of every player, straight from the durable tier.
    pub fn all_totals(&self) -> Result<HashMap<PlayerId, u64>, ApiError> {
        Ok(self.store.achievement_counts()?)
    }

    // ==================== RANKING ====================

    /// Rank by awards received since `window_start` (milliseconds since the epoch).
    pub fn rank(&self, player: PlayerId, window_start: i64) -> Result<Rank, ApiError> {
        let player = require_player(player)?;
        let snapshot = self.store.top_list(window_start)?;
        Ok(rank::rank(player, &snapshot))
    }

    pub fn top_players(&self, count: usize, window_start: i64) -> Result<Vec<PlayerId>, ApiError> {
        let snapshot = self.store.top_list(window_start)?;
        Ok(rank::top_participants(&snapshot, count))
    }

    // ==================== STATISTICS ====================

    pub fn normal_statistic(&self, player: PlayerId, category: NormalCategory) -> Result<u64, ApiError> {
        let player = require_player(player)?;
        self.read_statistic(player, &CategoryKey::Normal(category))
    }

    pub fn multiple_statistic(
        &self,
        player: PlayerId,
        category: MultipleCategory,
        subcategory: &str,
    ) -> Result<u64, ApiError> {
        let player = require_player(player)?;
        let subcategory = not_empty(subcategory, "Sub-category")?;
        self.read_statistic(player, &CategoryKey::multiple(category, subcategory))
    }

    /// Primary thread only. Returns the new total after threshold checks have run.
    pub fn increment_normal(
        &self,
        category: NormalCategory,
        player: PlayerId,
        delta: u64,
    ) -> Result<u64, ApiError> {
        let player = require_player(player)?;
        self.increment(player, CategoryKey::Normal(category), delta)
    }

    /// Primary thread only. Returns the new total after threshold checks have run.
    pub fn increment_multiple(
        &self,
        category: MultipleCategory,
        subcategory: &str,
        player: PlayerId,
        delta: u64,
    ) -> Result<u64, ApiError> {
        let subcategory = not_empty(subcategory, "Sub-category")?;
        let player = require_player(player)?;
        self.increment(player, CategoryKey::multiple(category, subcategory), delta)
    }

    // ==================== PRESENCE & CACHE LIFECYCLE ====================

    /// Whether the player is online. Off the primary thread this blocks until the
    /// primary thread answers.
    pub fn is_player_online(&self, player: PlayerId) -> Result<bool, ApiError> {
        let player = require_player(player)?;
        Ok(self.gate.is_present(player))
    }

    /// Writes every changed counter to the durable tier. Primary thread only.
    /// Players that went offline in the meantime are dropped from the cache once
    /// their counters are written.
    pub fn flush_cache(&self) -> Result<usize, ApiError> {
        let writes = self.with_cache(|cache| Ok(cache.drain_dirty()))?;
        let written = writes.len();
        let players: HashSet<PlayerId> = writes.iter().map(|write| write.player).collect();
        self.write_back(writes)?;
        if written > 0 {
            log::debug!("[FLUSH] wrote {} statistics", written);
        }

        for player in players.into_iter().filter(|p| !self.gate.is_present(*p)) {
            let leftovers = self.with_cache(|cache| Ok(cache.evict(player)))?;
            self.write_back(leftovers)?;
        }
        Ok(written)
    }

    /// Writes back and drops the player's cached state. Primary thread only; call it
    /// when the player disconnects.
    pub fn handle_quit(&self, player: PlayerId) -> Result<(), ApiError> {
        let player = require_player(player)?;
        let writes = self.with_cache(|cache| Ok(cache.evict(player)))?;
        self.write_back(writes)
    }

    // ==================== RESTORE ====================

    /// Overwrites counters from a JSON export in both tiers. Primary thread only.
    pub fn restore_statistics(&self, json_data: &str) -> Result<usize, RestoreError> {
        let writes = restore::parse_statistics(json_data)?;
        self.with_cache(|cache| {
            self.store.write_statistics(&writes)?;
            cache.overwrite(&writes);
            Ok(())
        })?;
        log::info!("[RESTORE] restored {} statistic records", writes.len());
        Ok(writes.len())
    }

    /// Registers awards from a JSON export and reloads the affected award sets.
    /// Primary thread only.
    pub fn restore_awards(&self, json_data: &str) -> Result<usize, RestoreError> {
        let awards = restore::parse_awards(json_data)?;
        if !self.gate.is_primary_context() {
            return Err(ApiError::NotPrimaryContext.into());
        }
        let restored = restore::write_awards(self.store.as_ref(), &awards);
        // Forget even after a partial failure, the durable tier is authoritative
        self.with_cache(|cache| {
            for (player, _, _) in &awards {
                cache.forget_awards(*player);
            }
            Ok(())
        })?;
        restored
    }

    // ==================== ROUTING ====================

    fn use_cache(&self, player: PlayerId) -> bool {
        self.gate.is_primary_context() && self.gate.is_present(player)
    }

    fn with_cache<R>(
        &self,
        f: impl FnOnce(&mut dyn StatisticCache) -> Result<R, StoreError>,
    ) -> Result<R, ApiError> {
        let outcome = self
            .cache
            .with(|cache| f(cache.as_mut()))
            .map_err(|_| ApiError::NotPrimaryContext)?;
        Ok(outcome?)
    }

    fn read_statistic(&self, player: PlayerId, key: &CategoryKey) -> Result<u64, ApiError> {
        if self.use_cache(player) {
            self.with_cache(|cache| cache.statistic(player, key))
        } else {
            Ok(self.store.statistic(player, key)?)
        }
    }

    fn increment(&self, player: PlayerId, key: CategoryKey, delta: u64) -> Result<u64, ApiError> {
        let total = self.with_cache(|cache| {
            let total = cache.increment(player, &key, delta)?;
            // Unawarded thresholds are evaluated again on the next increment
            if let Err(e) = self.evaluator.check_thresholds(player, &key, total, cache) {
                log::error!("[AWARD] threshold check failed for player {} on {}: {}", player, key, e);
            }
            Ok(total)
        })?;

        // Only online players keep cache entries
        if !self.gate.is_present(player) {
            let writes = self.with_cache(|cache| Ok(cache.evict(player)))?;
            if self.write_back(writes).is_err() {
                log::debug!("[FLUSH] write for offline player {} left for the next flush", player);
            }
        }
        Ok(total)
    }

    fn write_back(&self, writes: Vec<StatisticWrite>) -> Result<(), ApiError> {
        if writes.is_empty() {
            return Ok(());
        }
        if let Err(e) = self.store.write_statistics(&writes) {
            log::warn!("[FLUSH] failed to write {} statistics, will retry: {}", writes.len(), e);
            self.with_cache(|cache| {
                cache.requeue(writes);
                Ok(())
            })?;
            return Err(e.into());
        }
        Ok(())
    }
}
