//! `SQLite` durable tier.
//!
//! # Schema
//!
//! `achievements(player, achievement, awarded_at)` with one row per award and
//! `(player, achievement)` as primary key, so a second award is ignored.
//! `statistics(player, category, subcategory, amount)` holds absolute counter
//! values; simple categories use an empty subcategory.

use std::collections::HashMap;
use std::path::Path;

use chrono::{DateTime, TimeZone, Utc};
use parking_lot::Mutex;
use rusqlite::{params, Connection, OptionalExtension};

use super::AchievementStore;
use crate::error::StoreError;
use crate::model::{AwardRecord, CategoryKey, PlayerId, StatisticWrite};
use crate::rank::RankSnapshot;

#[derive(Debug)]
pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        Self::with_connection(Connection::open(path)?)
    }

    pub fn open_in_memory() -> Result<Self, StoreError> {
        Self::with_connection(Connection::open_in_memory()?)
    }

    fn with_connection(conn: Connection) -> Result<Self, StoreError> {
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS achievements (
                player TEXT NOT NULL,
                achievement TEXT NOT NULL,
                awarded_at INTEGER NOT NULL,
                PRIMARY KEY (player, achievement)
            );
            CREATE INDEX IF NOT EXISTS achievements_awarded_at ON achievements (awarded_at);
            CREATE TABLE IF NOT EXISTS statistics (
                player TEXT NOT NULL,
                category TEXT NOT NULL,
                subcategory TEXT NOT NULL DEFAULT '',
                amount INTEGER NOT NULL,
                PRIMARY KEY (player, category, subcategory)
            );",
        )?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }
}

fn parse_player(text: &str) -> Result<PlayerId, StoreError> {
    PlayerId::parse(text).map_err(|e| StoreError::Corrupt(format!("bad player id {}: {}", text, e)))
}

fn parse_timestamp(millis: i64) -> Result<DateTime<Utc>, StoreError> {
    Utc.timestamp_millis_opt(millis)
        .single()
        .ok_or_else(|| StoreError::Corrupt(format!("bad timestamp {}", millis)))
}

fn to_count(value: i64) -> Result<u64, StoreError> {
    u64::try_from(value).map_err(|_| StoreError::Corrupt(format!("negative count {}", value)))
}

fn to_column(amount: u64) -> Result<i64, StoreError> {
    i64::try_from(amount)
        .map_err(|_| StoreError::Unavailable(format!("amount {} does not fit in a sqlite integer", amount)))
}

impl AchievementStore for SqliteStore {
    fn has_achievement(&self, player: PlayerId, name: &str) -> Result<bool, StoreError> {
        let conn = self.conn.lock();
        let found = conn
            .query_row(
                "SELECT 1 FROM achievements WHERE player = ?1 AND achievement = ?2",
                params![player.to_string(), name],
                |row| row.get::<_, i64>(0),
            )
            .optional()?;
        Ok(found.is_some())
    }

    fn achievements_for(&self, player: PlayerId) -> Result<Vec<AwardRecord>, StoreError> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare(
            "SELECT achievement, awarded_at FROM achievements WHERE player = ?1 ORDER BY awarded_at, achievement",
        )?;
        let rows = stmt.query_map(params![player.to_string()], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?))
        })?;

        let mut records = Vec::new();
        for row in rows {
            let (name, millis) = row?;
            records.push(AwardRecord {
                name,
                awarded_at: parse_timestamp(millis)?,
            });
        }
        Ok(records)
    }

    fn achievement_count(&self, player: PlayerId) -> Result<u64, StoreError> {
        let conn = self.conn.lock();
        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM achievements WHERE player = ?1",
            params![player.to_string()],
            |row| row.get(0),
        )?;
        to_count(count)
    }

    fn achievement_counts(&self) -> Result<HashMap<PlayerId, u64>, StoreError> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare("SELECT player, COUNT(*) FROM achievements GROUP BY player")?;
        let rows = stmt.query_map([], |row| Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?)))?;

        let mut counts = HashMap::new();
        for row in rows {
            let (player, count) = row?;
            counts.insert(parse_player(&player)?, to_count(count)?);
        }
        Ok(counts)
    }

    fn top_list(&self, since_millis: i64) -> Result<RankSnapshot, StoreError> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare(
            "SELECT player, COUNT(*) AS awards FROM achievements
             WHERE awarded_at >= ?1
             GROUP BY player
             ORDER BY awards DESC, player ASC",
        )?;
        let rows = stmt.query_map(params![since_millis], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?))
        })?;

        let mut entries = Vec::new();
        for row in rows {
            let (player, count) = row?;
            entries.push((parse_player(&player)?, to_count(count)?));
        }
        Ok(RankSnapshot::from_sorted(entries))
    }

    fn statistic(&self, player: PlayerId, key: &CategoryKey) -> Result<u64, StoreError> {
        let conn = self.conn.lock();
        let amount = conn
            .query_row(
                "SELECT amount FROM statistics WHERE player = ?1 AND category = ?2 AND subcategory = ?3",
                params![player.to_string(), key.category_name(), key.subcategory()],
                |row| row.get::<_, i64>(0),
            )
            .optional()?;
        amount.map_or(Ok(0), to_count)
    }

    fn register_award(
        &self,
        player: PlayerId,
        name: &str,
        awarded_at: DateTime<Utc>,
    ) -> Result<bool, StoreError> {
        let conn = self.conn.lock();
        let inserted = conn.execute(
            "INSERT OR IGNORE INTO achievements (player, achievement, awarded_at) VALUES (?1, ?2, ?3)",
            params![player.to_string(), name, awarded_at.timestamp_millis()],
        )?;
        Ok(inserted == 1)
    }

    fn write_statistics(&self, writes: &[StatisticWrite]) -> Result<(), StoreError> {
        if writes.is_empty() {
            return Ok(());
        }
        let mut conn = self.conn.lock();
        let tx = conn.transaction()?;
        {
            let mut stmt = tx.prepare(
                "INSERT INTO statistics (player, category, subcategory, amount) VALUES (?1, ?2, ?3, ?4)
                 ON CONFLICT(player, category, subcategory) DO UPDATE SET amount = excluded.amount",
            )?;
            for write in writes {
                let amount = to_column(write.amount)?;
                stmt.execute(params![
                    write.player.to_string(),
                    write.key.category_name(),
                    write.key.subcategory(),
                    amount
                ])?;
            }
        }
        tx.commit()?;
        Ok(())
    }
}
