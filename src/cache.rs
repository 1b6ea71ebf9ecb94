//! Fast tier: per-player counters and award sets for online players.
//!
//! The cache has no internal locking. It lives on the main loop thread (see
//! [`crate::confined::Confined`]) and every method assumes it is called there.
//! Misses load once from the durable tier; increments are written back in
//! batches by the flush cycle.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use crate::error::StoreError;
use crate::model::{CategoryKey, PlayerId, StatisticWrite};
use crate::store::AchievementStore;

/// Primary-thread-only operations on the fast tier.
pub trait StatisticCache {
    fn statistic(&mut self, player: PlayerId, key: &CategoryKey) -> Result<u64, StoreError>;

    /// Adds `delta` and returns the new total.
    fn increment(&mut self, player: PlayerId, key: &CategoryKey, delta: u64) -> Result<u64, StoreError>;

    fn has_achievement(&mut self, player: PlayerId, name: &str) -> Result<bool, StoreError>;

    fn total_achievements(&mut self, player: PlayerId) -> Result<u64, StoreError>;

    /// Marks the achievement as received. Returns false if it already was.
    fn record_award(&mut self, player: PlayerId, name: &str) -> Result<bool, StoreError>;

    /// Removes and returns every counter changed since the last drain.
    fn drain_dirty(&mut self) -> Vec<StatisticWrite>;

    /// Marks counters dirty again after a failed write, unless they changed meanwhile.
    fn requeue(&mut self, writes: Vec<StatisticWrite>);

    /// Drops everything held for the player and returns its unwritten counters.
    fn evict(&mut self, player: PlayerId) -> Vec<StatisticWrite>;

    /// Replaces cached counters with amounts already written to the durable tier.
    /// Counters that are not cached are left to load on demand.
    fn overwrite(&mut self, writes: &[StatisticWrite]);

    /// Drops the cached award set so it is reloaded from the durable tier.
    fn forget_awards(&mut self, player: PlayerId);
}

#[derive(Debug, Clone, Copy)]
struct CachedCount {
    amount: u64,
    dirty: bool,
}

pub struct MemoryCache {
    store: Arc<dyn AchievementStore>,
    statistics: HashMap<PlayerId, HashMap<CategoryKey, CachedCount>>,
    awards: HashMap<PlayerId, HashSet<String>>,
}

impl MemoryCache {
    pub fn new(store: Arc<dyn AchievementStore>) -> Self {
        Self {
            store,
            statistics: HashMap::new(),
            awards: HashMap::new(),
        }
    }

    fn counter(&mut self, player: PlayerId, key: &CategoryKey) -> Result<&mut CachedCount, StoreError> {
        let counters = self.statistics.entry(player).or_default();
        if !counters.contains_key(key) {
            let amount = self.store.statistic(player, key)?;
            counters.insert(key.clone(), CachedCount { amount, dirty: false });
        }
        counters
            .get_mut(key)
            .ok_or_else(|| StoreError::Unavailable(format!("counter {} vanished", key)))
    }

    fn awards(&mut self, player: PlayerId) -> Result<&mut HashSet<String>, StoreError> {
        if !self.awards.contains_key(&player) {
            let names = self
                .store
                .achievements_for(player)?
                .into_iter()
                .map(|record| record.name)
                .collect();
            self.awards.insert(player, names);
        }
        self.awards
            .get_mut(&player)
            .ok_or_else(|| StoreError::Unavailable(format!("awards of {} vanished", player)))
    }
}

impl StatisticCache for MemoryCache {
    fn statistic(&mut self, player: PlayerId, key: &CategoryKey) -> Result<u64, StoreError> {
        Ok(self.counter(player, key)?.amount)
    }

    fn increment(&mut self, player: PlayerId, key: &CategoryKey, delta: u64) -> Result<u64, StoreError> {
        let counter = self.counter(player, key)?;
        counter.amount = counter.amount.saturating_add(delta);
        counter.dirty = true;
        Ok(counter.amount)
    }

    fn has_achievement(&mut self, player: PlayerId, name: &str) -> Result<bool, StoreError> {
        Ok(self.awards(player)?.contains(name))
    }

    fn total_achievements(&mut self, player: PlayerId) -> Result<u64, StoreError> {
        Ok(self.awards(player)?.len() as u64)
    }

    fn record_award(&mut self, player: PlayerId, name: &str) -> Result<bool, StoreError> {
        Ok(self.awards(player)?.insert(name.to_string()))
    }

    fn drain_dirty(&mut self) -> Vec<StatisticWrite> {
        let mut writes = Vec::new();
        for (player, counters) in self.statistics.iter_mut() {
            for (key, counter) in counters.iter_mut().filter(|(_, c)| c.dirty) {
                counter.dirty = false;
                writes.push(StatisticWrite {
                    player: *player,
                    key: key.clone(),
                    amount: counter.amount,
                });
            }
        }
        writes
    }

    fn requeue(&mut self, writes: Vec<StatisticWrite>) {
        for write in writes {
            match self
                .statistics
                .get_mut(&write.player)
                .and_then(|counters| counters.get_mut(&write.key))
            {
                Some(counter) => counter.dirty = true,
                // Evicted in the meantime: keep the value so the next drain retries it
                None => {
                    self.statistics.entry(write.player).or_default().insert(
                        write.key,
                        CachedCount {
                            amount: write.amount,
                            dirty: true,
                        },
                    );
                }
            }
        }
    }

    fn evict(&mut self, player: PlayerId) -> Vec<StatisticWrite> {
        self.awards.remove(&player);
        self.statistics
            .remove(&player)
            .map(|counters| {
                counters
                    .into_iter()
                    .filter(|(_, counter)| counter.dirty)
                    .map(|(key, counter)| StatisticWrite {
                        player,
                        key,
                        amount: counter.amount,
                    })
                    .collect()
            })
            .unwrap_or_default()
    }

    fn overwrite(&mut self, writes: &[StatisticWrite]) {
        for write in writes {
            if let Some(counter) = self
                .statistics
                .get_mut(&write.player)
                .and_then(|counters| counters.get_mut(&write.key))
            {
                counter.amount = write.amount;
                counter.dirty = false;
            }
        }
    }

    fn forget_awards(&mut self, player: PlayerId) {
        self.awards.remove(&player);
    }
}
