//! In-process durable tier. Used by tests and single-node deployments that
//! do not need awards to outlive the process.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use parking_lot::RwLock;

use super::AchievementStore;
use crate::error::StoreError;
use crate::model::{AwardRecord, CategoryKey, PlayerId, StatisticWrite};
use crate::rank::RankSnapshot;

#[derive(Debug, Default)]
pub struct MemoryStore {
    awards: RwLock<HashMap<PlayerId, Vec<AwardRecord>>>,
    statistics: RwLock<HashMap<(PlayerId, CategoryKey), u64>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl AchievementStore for MemoryStore {
    fn has_achievement(&self, player: PlayerId, name: &str) -> Result<bool, StoreError> {
        Ok(self
            .awards
            .read()
            .get(&player)
            .map_or(false, |awards| awards.iter().any(|a| a.name == name)))
    }

    fn achievements_for(&self, player: PlayerId) -> Result<Vec<AwardRecord>, StoreError> {
        Ok(self.awards.read().get(&player).cloned().unwrap_or_default())
    }

    fn achievement_count(&self, player: PlayerId) -> Result<u64, StoreError> {
        Ok(self
            .awards
            .read()
            .get(&player)
            .map_or(0, |awards| awards.len() as u64))
    }

    fn achievement_counts(&self) -> Result<HashMap<PlayerId, u64>, StoreError> {
        Ok(self
            .awards
            .read()
            .iter()
            .filter(|(_, awards)| !awards.is_empty())
            .map(|(player, awards)| (*player, awards.len() as u64))
            .collect())
    }

    fn top_list(&self, since_millis: i64) -> Result<RankSnapshot, StoreError> {
        let awards = self.awards.read();
        let mut entries: Vec<(PlayerId, u64)> = awards
            .iter()
            .map(|(player, awards)| {
                let count = awards
                    .iter()
                    .filter(|a| a.awarded_at.timestamp_millis() >= since_millis)
                    .count() as u64;
                (*player, count)
            })
            .filter(|(_, count)| *count > 0)
            .collect();

        // Highest count first, player id for stable ordering
        entries.sort_by(|a, b| b.1.cmp(&a.1).then(a.0.cmp(&b.0)));
        Ok(RankSnapshot::from_sorted(entries))
    }

    fn statistic(&self, player: PlayerId, key: &CategoryKey) -> Result<u64, StoreError> {
        Ok(self
            .statistics
            .read()
            .get(&(player, key.clone()))
            .copied()
            .unwrap_or(0))
    }

    fn register_award(
        &self,
        player: PlayerId,
        name: &str,
        awarded_at: DateTime<Utc>,
    ) -> Result<bool, StoreError> {
        let mut awards = self.awards.write();
        let player_awards = awards.entry(player).or_default();
        if player_awards.iter().any(|a| a.name == name) {
            return Ok(false);
        }
        player_awards.push(AwardRecord {
            name: name.to_string(),
            awarded_at,
        });
        Ok(true)
    }

    fn write_statistics(&self, writes: &[StatisticWrite]) -> Result<(), StoreError> {
        let mut statistics = self.statistics.write();
        for write in writes {
            statistics.insert((write.player, write.key.clone()), write.amount);
        }
        Ok(())
    }
}
