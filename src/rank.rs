//! Player standings computed from durable award-count snapshots.

use chrono::{DateTime, Datelike, Duration, TimeZone, Utc};

use crate::model::{PlayerId, Rank};

/// Award counts per player, highest first. The order comes from the durable tier
/// and is trusted as-is.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RankSnapshot {
    entries: Vec<(PlayerId, u64)>,
}

impl RankSnapshot {
    /// Wraps entries that are already sorted by descending count.
    pub fn from_sorted(entries: Vec<(PlayerId, u64)>) -> Self {
        Self { entries }
    }

    pub fn entries(&self) -> &[(PlayerId, u64)] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn count_for(&self, player: PlayerId) -> Option<u64> {
        self.entries
            .iter()
            .find(|(id, _)| *id == player)
            .map(|(_, count)| *count)
    }
}

/// Standard competition ranking: tied players share the higher position.
/// Only correct if the snapshot is sorted by descending count.
pub fn rank(player: PlayerId, snapshot: &RankSnapshot) -> Rank {
    let field_size = snapshot.len();
    let position = snapshot
        .count_for(player)
        .and_then(|count| snapshot.entries.iter().position(|(_, c)| *c == count))
        .map_or(Rank::UNRANKED, |index| index + 1);
    Rank {
        position,
        field_size,
    }
}

/// First `limit` players in snapshot order.
pub fn top_participants(snapshot: &RankSnapshot, limit: usize) -> Vec<PlayerId> {
    snapshot
        .entries
        .iter()
        .take(limit)
        .map(|(player, _)| *player)
        .collect()
}

// ==================== RANKING PERIODS ====================

/// Window over which awards are counted. All boundaries are UTC midnight.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RankingPeriod {
    Day,
    /// Starts on Monday
    Week,
    Month,
    All,
}

impl RankingPeriod {
    /// Window start in milliseconds since the epoch, as expected by `top_list`.
    pub fn start_millis(&self, now: DateTime<Utc>) -> i64 {
        let today = now.date_naive();
        let start = match self {
            RankingPeriod::All => return 0,
            RankingPeriod::Day => today,
            RankingPeriod::Week => {
                today - Duration::days(i64::from(today.weekday().num_days_from_monday()))
            }
            RankingPeriod::Month => today.with_day(1).unwrap_or(today),
        };
        start
            .and_hms_opt(0, 0, 0)
            .map(|midnight| Utc.from_utc_datetime(&midnight).timestamp_millis())
            .unwrap_or(0)
    }
}
