//! Unlocking achievements when a counter crosses a threshold.

use std::sync::Arc;

use chrono::Utc;

use crate::cache::StatisticCache;
use crate::error::StoreError;
use crate::model::{CategoryKey, PlayerId};
use crate::registry::AchievementRegistry;
use crate::store::AchievementStore;

/// Called on the primary thread after every increment with the new total.
pub trait ThresholdEvaluator: Send + Sync {
    /// Awards whatever `amount` unlocks and returns the names newly awarded.
    fn check_thresholds(
        &self,
        player: PlayerId,
        key: &CategoryKey,
        amount: u64,
        cache: &mut dyn StatisticCache,
    ) -> Result<Vec<String>, StoreError>;
}

/// Awards every registered achievement whose threshold the total has reached.
/// Awards are written to the durable tier first, then recorded in the cache.
pub struct ThresholdAwarder {
    registry: Arc<AchievementRegistry>,
    store: Arc<dyn AchievementStore>,
}

impl ThresholdAwarder {
    pub fn new(registry: Arc<AchievementRegistry>, store: Arc<dyn AchievementStore>) -> Self {
        Self { registry, store }
    }
}

impl ThresholdEvaluator for ThresholdAwarder {
    fn check_thresholds(
        &self,
        player: PlayerId,
        key: &CategoryKey,
        amount: u64,
        cache: &mut dyn StatisticCache,
    ) -> Result<Vec<String>, StoreError> {
        let mut awarded = Vec::new();
        for achievement in self.registry.triggered_by(key) {
            let reached = achievement
                .trigger
                .as_ref()
                .map_or(false, |trigger| amount >= trigger.threshold);
            if !reached {
                // Sorted by threshold, nothing further can match
                break;
            }
            if cache.has_achievement(player, &achievement.name)? {
                continue;
            }
            // Durable first: a failed write leaves the cache untouched so the
            // next evaluation retries the award.
            let is_new = self.store.register_award(player, &achievement.name, Utc::now())?;
            cache.record_award(player, &achievement.name)?;
            if !is_new {
                continue;
            }
            log::info!(
                "[AWARD] player:{} achievement:{} ({} reached {})",
                player,
                achievement.name,
                key,
                amount
            );
            awarded.push(achievement.name.clone());
        }
        Ok(awarded)
    }
}
