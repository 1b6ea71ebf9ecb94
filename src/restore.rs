// Bulk restore for disaster recovery
// Accepts JSON arrays exported by the admin tooling (camelCase keys)

use chrono::{DateTime, TimeZone, Utc};
use serde_json::Value;

use crate::error::RestoreError;
use crate::model::{CategoryKey, PlayerId, StatisticWrite};
use crate::store::AchievementStore;

fn record_error(index: usize, reason: impl Into<String>) -> RestoreError {
    RestoreError::Record {
        index,
        reason: reason.into(),
    }
}

fn parse_player(val: &Value, index: usize) -> Result<PlayerId, RestoreError> {
    let text = val
        .get("playerId")
        .and_then(|v| v.as_str())
        .ok_or_else(|| record_error(index, "missing playerId"))?;
    PlayerId::parse(text)
        .ok()
        .and_then(PlayerId::non_nil)
        .ok_or_else(|| record_error(index, format!("invalid playerId {}", text)))
}

/// Parse award time from milliseconds since the epoch
fn parse_awarded_at(val: &Value, index: usize) -> Result<DateTime<Utc>, RestoreError> {
    let millis = val
        .get("awardedAt")
        .and_then(|v| v.as_i64())
        .ok_or_else(|| record_error(index, "missing awardedAt"))?;
    Utc.timestamp_millis_opt(millis)
        .single()
        .ok_or_else(|| record_error(index, format!("awardedAt out of range: {}", millis)))
}

fn as_array(data: &Value, what: &str) -> Result<Vec<Value>, RestoreError> {
    data.as_array()
        .cloned()
        .ok_or_else(|| record_error(0, format!("expected JSON array of {}", what)))
}

/// Restored award: player, achievement name, award time
pub type RestoredAward = (PlayerId, String, DateTime<Utc>);

/// Parse an award export, validating every record
pub fn parse_awards(json_data: &str) -> Result<Vec<RestoredAward>, RestoreError> {
    let data: Value = serde_json::from_str(json_data)?;
    let awards = as_array(&data, "awards")?;

    let mut parsed = Vec::with_capacity(awards.len());
    for (i, a) in awards.iter().enumerate() {
        let player = parse_player(a, i)?;
        let name = a
            .get("achievement")
            .and_then(|v| v.as_str())
            .filter(|s| !s.is_empty())
            .ok_or_else(|| record_error(i, "missing achievement"))?;
        parsed.push((player, name.to_string(), parse_awarded_at(a, i)?));
    }
    Ok(parsed)
}

/// Writes parsed awards; returns how many the players did not have yet
pub fn write_awards(store: &dyn AchievementStore, awards: &[RestoredAward]) -> Result<usize, RestoreError> {
    let mut count = 0;
    for (player, name, awarded_at) in awards {
        if store.register_award(*player, name, *awarded_at)? {
            count += 1;
        }
    }
    log::info!("[RESTORE] restored {} award records ({} in input)", count, awards.len());
    Ok(count)
}

/// Bulk restore awards from JSON array straight into a store
/// Awards the player already has are skipped; returns how many were new
pub fn bulk_restore_awards(store: &dyn AchievementStore, json_data: &str) -> Result<usize, RestoreError> {
    // Validate everything before writing anything
    let awards = parse_awards(json_data)?;
    write_awards(store, &awards)
}

/// Parse a statistics export, validating every record
pub fn parse_statistics(json_data: &str) -> Result<Vec<StatisticWrite>, RestoreError> {
    let data: Value = serde_json::from_str(json_data)?;
    let statistics = as_array(&data, "statistics")?;

    let mut writes = Vec::with_capacity(statistics.len());
    for (i, s) in statistics.iter().enumerate() {
        let player = parse_player(s, i)?;
        let category = s
            .get("category")
            .and_then(|v| v.as_str())
            .ok_or_else(|| record_error(i, "missing category"))?;
        let subcategory = s.get("subcategory").and_then(|v| v.as_str()).unwrap_or("");
        let key = CategoryKey::from_parts(category, subcategory).map_err(|reason| record_error(i, reason))?;
        let amount = s
            .get("amount")
            .and_then(|v| v.as_u64())
            .ok_or_else(|| record_error(i, "missing amount"))?;
        writes.push(StatisticWrite { player, key, amount });
    }
    Ok(writes)
}

/// Bulk restore statistics from JSON array straight into a store
/// Amounts overwrite whatever the store holds. Use
/// [`crate::api::AchievementsApi::restore_statistics`] while the cache is live.
pub fn bulk_restore_statistics(store: &dyn AchievementStore, json_data: &str) -> Result<usize, RestoreError> {
    let writes = parse_statistics(json_data)?;
    store.write_statistics(&writes)?;

    log::info!("[RESTORE] restored {} statistic records", writes.len());
    Ok(writes.len())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{MultipleCategory, NormalCategory};
    use crate::store::MemoryStore;

    const PLAYER: &str = "7b0c2f8e-4a43-4d4b-9d59-3f3d7c1f2a11";

    #[test]
    fn test_restore_awards() {
        let store = MemoryStore::new();
        let json = format!(
            r#"[
                {{ "playerId": "{p}", "achievement": "first_login", "awardedAt": 1700000000000 }},
                {{ "playerId": "{p}", "achievement": "regular", "awardedAt": 1700000500000 }},
                {{ "playerId": "{p}", "achievement": "first_login", "awardedAt": 1700000900000 }}
            ]"#,
            p = PLAYER
        );
        // Duplicate award is skipped
        assert_eq!(bulk_restore_awards(&store, &json).unwrap(), 2);

        let player = PlayerId::parse(PLAYER).unwrap();
        let records = store.achievements_for(player).unwrap();
        assert_eq!(records.len(), 2);
        let first = records.iter().find(|r| r.name == "first_login").unwrap();
        assert_eq!(first.awarded_at.timestamp_millis(), 1_700_000_000_000);
    }

    #[test]
    fn test_restore_awards_rejects_bad_record_before_writing() {
        let store = MemoryStore::new();
        let json = format!(
            r#"[
                {{ "playerId": "{p}", "achievement": "first_login", "awardedAt": 1700000000000 }},
                {{ "playerId": "{p}", "awardedAt": 1700000000000 }}
            ]"#,
            p = PLAYER
        );
        match bulk_restore_awards(&store, &json) {
            Err(RestoreError::Record { index, .. }) => assert_eq!(index, 1),
            other => panic!("expected record error, got {:?}", other),
        }
        let player = PlayerId::parse(PLAYER).unwrap();
        assert_eq!(store.achievement_count(player).unwrap(), 0);
    }

    #[test]
    fn test_restore_statistics() {
        let store = MemoryStore::new();
        let json = format!(
            r#"[
                {{ "playerId": "{p}", "category": "Deaths", "amount": 12 }},
                {{ "playerId": "{p}", "category": "Kills", "subcategory": "zombie", "amount": 40 }}
            ]"#,
            p = PLAYER
        );
        assert_eq!(bulk_restore_statistics(&store, &json).unwrap(), 2);

        let player = PlayerId::parse(PLAYER).unwrap();
        let deaths = CategoryKey::Normal(NormalCategory::Deaths);
        let zombies = CategoryKey::multiple(MultipleCategory::Kills, "zombie");
        assert_eq!(store.statistic(player, &deaths).unwrap(), 12);
        assert_eq!(store.statistic(player, &zombies).unwrap(), 40);
    }

    #[test]
    fn test_restore_rejects_malformed_input() {
        let store = MemoryStore::new();
        assert!(matches!(bulk_restore_statistics(&store, "{"), Err(RestoreError::Json(_))));
        assert!(matches!(
            bulk_restore_statistics(&store, r#"{ "not": "an array" }"#),
            Err(RestoreError::Record { .. })
        ));

        let nil_player = r#"[ { "playerId": "00000000-0000-0000-0000-000000000000",
                               "category": "Deaths", "amount": 1 } ]"#;
        assert!(matches!(
            bulk_restore_statistics(&store, nil_player),
            Err(RestoreError::Record { index: 0, .. })
        ));

        let unknown = format!(r#"[ {{ "playerId": "{}", "category": "Juggling", "amount": 1 }} ]"#, PLAYER);
        assert!(bulk_restore_statistics(&store, &unknown).is_err());
    }
}
