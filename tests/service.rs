mod common;

use std::path::PathBuf;
use std::sync::Arc;

use achievement_ledger::config::{DatabaseConfig, DatabaseKind};
use achievement_ledger::store::{AchievementStore, SqliteStore};
use achievement_ledger::{
    AchievementRegistry, AchievementService, CategoryKey, Config, MultipleCategory, NormalCategory,
    PlayerId,
};
use tempfile::TempDir;

use common::{on_primary, settle, DEFINITIONS};

fn start(config: Config) -> AchievementService {
    let registry = AchievementRegistry::from_json_str(DEFINITIONS).unwrap();
    AchievementService::start(config, registry).unwrap()
}

fn sqlite_config(path: PathBuf) -> Config {
    Config {
        database: DatabaseConfig {
            kind: DatabaseKind::Sqlite,
            path: Some(path),
        },
        flush_interval_ms: 60_000,
        ..Config::default()
    }
}

#[test]
fn test_player_session() {
    let service = start(Config::default());
    let player = PlayerId::new_random();
    service.player_joined(player);

    let api = Arc::clone(service.api());
    let connections = on_primary(service.main_loop(), move || {
        api.increment_normal(NormalCategory::Connections, player, 1).unwrap()
    });
    assert_eq!(connections, 1);

    // Queried from a worker thread: presence hop, then the durable tier
    let api = service.api();
    assert!(api.is_player_online(player).unwrap());
    assert!(api.has_achievement(player, "first_login").unwrap());
    assert_eq!(api.total_achievements(player).unwrap(), 1);

    service.player_quit(player);
    settle(service.main_loop());
    assert!(!api.is_player_online(player).unwrap());
    assert_eq!(api.normal_statistic(player, NormalCategory::Connections).unwrap(), 1);
    service.shutdown();
}

#[test]
fn test_shutdown_flushes_cache_to_disk() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("ledger.db");
    let player = PlayerId::new_random();

    {
        let service = start(sqlite_config(path.clone()));
        service.player_joined(player);
        let api = Arc::clone(service.api());
        on_primary(service.main_loop(), move || {
            api.increment_multiple(MultipleCategory::Kills, "zombie", player, 4).unwrap();
        });
        // Flush interval is long, nothing written yet
        let zombies = CategoryKey::multiple(MultipleCategory::Kills, "zombie");
        assert_eq!(service.store().statistic(player, &zombies).unwrap(), 0);
        service.shutdown();
        // Idempotent
        service.shutdown();
    }

    let store = SqliteStore::open(&path).unwrap();
    let zombies = CategoryKey::multiple(MultipleCategory::Kills, "zombie");
    assert_eq!(store.statistic(player, &zombies).unwrap(), 4);
    assert!(store.has_achievement(player, "zombie_hunter").unwrap());
}

#[test]
fn test_periodic_flush() {
    let config = Config {
        flush_interval_ms: 10,
        ..Config::default()
    };
    let service = start(config);
    let player = PlayerId::new_random();
    let api = Arc::clone(service.api());
    on_primary(service.main_loop(), move || {
        api.increment_normal(NormalCategory::Trades, player, 3).unwrap();
    });

    let trades = CategoryKey::Normal(NormalCategory::Trades);
    let mut written = 0;
    for _ in 0..100 {
        written = service.store().statistic(player, &trades).unwrap();
        if written == 3 {
            break;
        }
        std::thread::sleep(std::time::Duration::from_millis(10));
    }
    assert_eq!(written, 3);
}

#[test]
fn test_restore_through_service() {
    let service = start(Config::default());
    let player = PlayerId::new_random();
    let awards = format!(
        r#"[ {{ "playerId": "{}", "achievement": "founder", "awardedAt": 1700000000000 }} ]"#,
        player
    );
    let statistics = format!(
        r#"[ {{ "playerId": "{}", "category": "Fish", "amount": 8 }} ]"#,
        player
    );
    assert_eq!(service.restore_awards(&awards).unwrap(), 1);
    assert_eq!(service.restore_statistics(&statistics).unwrap(), 1);

    let api = service.api();
    let awarded = api.awarded_achievements(player).unwrap();
    assert_eq!(awarded.len(), 1);
    assert_eq!(awarded[0].achievement.display_name, "Founder");
    assert_eq!(api.normal_statistic(player, NormalCategory::Fish).unwrap(), 8);
}

#[test]
fn test_restore_replaces_cached_state_of_online_player() {
    let service = start(Config::default());
    let player = PlayerId::new_random();
    service.player_joined(player);

    let api = Arc::clone(service.api());
    on_primary(service.main_loop(), move || {
        api.increment_multiple(MultipleCategory::Kills, "zombie", player, 4).unwrap();
        assert!(!api.has_achievement(player, "founder").unwrap());
    });

    let statistics = format!(
        r#"[ {{ "playerId": "{}", "category": "Kills", "subcategory": "zombie", "amount": 40 }} ]"#,
        player
    );
    let awards = format!(
        r#"[ {{ "playerId": "{}", "achievement": "founder", "awardedAt": 1700000000000 }} ]"#,
        player
    );
    assert_eq!(service.restore_statistics(&statistics).unwrap(), 1);
    assert_eq!(service.restore_awards(&awards).unwrap(), 1);

    let api = Arc::clone(service.api());
    let (zombies, founder, flushed) = on_primary(service.main_loop(), move || {
        (
            api.multiple_statistic(player, MultipleCategory::Kills, "zombie").unwrap(),
            api.has_achievement(player, "founder").unwrap(),
            api.flush_cache().unwrap(),
        )
    });
    assert_eq!(zombies, 40);
    assert!(founder);
    // The stale dirty counter was not written over the restored amount
    assert_eq!(flushed, 0);
    let key = CategoryKey::multiple(MultipleCategory::Kills, "zombie");
    assert_eq!(service.store().statistic(player, &key).unwrap(), 40);
    service.shutdown();
}

#[test]
fn test_config_file_drives_startup() {
    let dir = TempDir::new().unwrap();
    let config_path = dir.path().join("config.json");
    let db_path = dir.path().join("store.db");
    std::fs::write(
        &config_path,
        format!(
            r#"{{ "database": {{ "kind": "sqlite", "path": {:?} }}, "presenceFallback": "offline" }}"#,
            db_path.to_string_lossy()
        ),
    )
    .unwrap();

    let config = Config::load(&config_path).unwrap();
    let service = start(config);
    assert_eq!(service.api().all_achievements().len(), 4);
    service.shutdown();
    assert!(db_path.exists());
}
