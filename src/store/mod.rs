//! Durable tier: authoritative storage for counters and awards, safe from any thread.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};

use crate::config::{DatabaseConfig, DatabaseKind};
use crate::error::StoreError;
use crate::model::{AwardRecord, CategoryKey, PlayerId, StatisticWrite};
use crate::rank::RankSnapshot;

pub mod memory;
pub mod sqlite;

pub use memory::MemoryStore;
pub use sqlite::SqliteStore;

/// Storage contract shared by all durable backends. Every method must be callable
/// concurrently from any thread.
pub trait AchievementStore: Send + Sync {
    fn has_achievement(&self, player: PlayerId, name: &str) -> Result<bool, StoreError>;

    fn achievements_for(&self, player: PlayerId) -> Result<Vec<AwardRecord>, StoreError>;

    fn achievement_count(&self, player: PlayerId) -> Result<u64, StoreError>;

    fn achievement_counts(&self) -> Result<HashMap<PlayerId, u64>, StoreError>;

    /// Award counts per player since `since_millis` (inclusive), highest first.
    fn top_list(&self, since_millis: i64) -> Result<RankSnapshot, StoreError>;

    /// 0 when the counter has never been written.
    fn statistic(&self, player: PlayerId, key: &CategoryKey) -> Result<u64, StoreError>;

    /// Records an award. Returns false if the player already had it.
    fn register_award(
        &self,
        player: PlayerId,
        name: &str,
        awarded_at: DateTime<Utc>,
    ) -> Result<bool, StoreError>;

    /// Overwrites counters with absolute amounts.
    fn write_statistics(&self, writes: &[StatisticWrite]) -> Result<(), StoreError>;
}

/// Opens the backend selected by the configuration.
pub fn open(config: &DatabaseConfig) -> Result<Arc<dyn AchievementStore>, StoreError> {
    match config.kind {
        DatabaseKind::Memory => Ok(Arc::new(MemoryStore::new())),
        DatabaseKind::Sqlite => {
            let path = config.path.as_ref().ok_or_else(|| {
                StoreError::Unavailable("sqlite database requires a path".to_string())
            })?;
            Ok(Arc::new(SqliteStore::open(path)?))
        }
    }
}
