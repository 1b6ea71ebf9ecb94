//! Wires the tiers, the main loop and the API together.

use std::sync::{Arc, Weak};

use crate::api::AchievementsApi;
use crate::cache::{MemoryCache, StatisticCache};
use crate::config::Config;
use crate::confined::Confined;
use crate::context::{ContextGate, PrimaryScheduler};
use crate::error::{RestoreError, ServiceError};
use crate::main_loop::MainLoop;
use crate::model::PlayerId;
use crate::registry::AchievementRegistry;
use crate::store::{self, AchievementStore};
use crate::thresholds::ThresholdAwarder;

/// A running achievement service. The cache is flushed on every main loop tick
/// and once more at shutdown.
pub struct AchievementService {
    main_loop: Arc<MainLoop>,
    api: Arc<AchievementsApi>,
    store: Arc<dyn AchievementStore>,
}

impl AchievementService {
    pub fn start(config: Config, registry: AchievementRegistry) -> Result<Self, ServiceError> {
        let store = store::open(&config.database)?;
        let main_loop = Arc::new(MainLoop::start(config.flush_interval())?);

        // The cache must be created on the thread that will own it
        let cache_store = Arc::clone(&store);
        let cache = main_loop
            .call(move || {
                let cache: Box<dyn StatisticCache> = Box::new(MemoryCache::new(cache_store));
                Confined::new(cache)
            })
            .wait(None)
            .map_err(|_| ServiceError::Startup)?;

        let scheduler: Arc<dyn PrimaryScheduler> = main_loop.clone();
        let gate = ContextGate::new(scheduler)
            .with_timeout(config.presence_timeout())
            .with_fallback(config.presence_fallback);

        let registry = Arc::new(registry);
        let evaluator = Arc::new(ThresholdAwarder::new(Arc::clone(&registry), Arc::clone(&store)));
        let api = Arc::new(AchievementsApi::new(
            gate,
            cache,
            Arc::clone(&store),
            Arc::clone(&registry),
            evaluator,
        ));

        let flusher = Arc::downgrade(&api);
        main_loop.on_tick(move || {
            if let Some(api) = flusher.upgrade() {
                if let Err(e) = api.flush_cache() {
                    log::warn!("[FLUSH] periodic flush failed: {}", e);
                }
            }
        });

        log::info!(
            "[SERVICE] started with {} achievements (flush every {:?})",
            registry.len(),
            config.flush_interval()
        );
        Ok(Self {
            main_loop,
            api,
            store,
        })
    }

    pub fn api(&self) -> &Arc<AchievementsApi> {
        &self.api
    }

    pub fn main_loop(&self) -> &Arc<MainLoop> {
        &self.main_loop
    }

    pub fn store(&self) -> &Arc<dyn AchievementStore> {
        &self.store
    }

    /// Marks the player online so reads are served from the cache.
    pub fn player_joined(&self, player: PlayerId) {
        self.main_loop.connect(player);
    }

    /// Marks the player offline and writes back its cached counters.
    pub fn player_quit(&self, player: PlayerId) {
        self.main_loop.disconnect(player);
        let api: Weak<AchievementsApi> = Arc::downgrade(&self.api);
        self.main_loop.execute(move || {
            if let Some(api) = api.upgrade() {
                if let Err(e) = api.handle_quit(player) {
                    log::warn!("[SERVICE] failed to write back player {}: {}", player, e);
                }
            }
        });
    }

    /// Runs on the main loop so cached award sets are reloaded afterwards.
    pub fn restore_awards(&self, json_data: &str) -> Result<usize, RestoreError> {
        if self.main_loop.is_primary_thread() {
            return self.api.restore_awards(json_data);
        }
        let api = Arc::clone(&self.api);
        let json_data = json_data.to_string();
        self.main_loop
            .call(move || api.restore_awards(&json_data))
            .wait(None)
            .map_err(RestoreError::Aborted)?
    }

    /// Runs on the main loop so cached counters take the restored amounts.
    pub fn restore_statistics(&self, json_data: &str) -> Result<usize, RestoreError> {
        if self.main_loop.is_primary_thread() {
            return self.api.restore_statistics(json_data);
        }
        let api = Arc::clone(&self.api);
        let json_data = json_data.to_string();
        self.main_loop
            .call(move || api.restore_statistics(&json_data))
            .wait(None)
            .map_err(RestoreError::Aborted)?
    }

    /// Flushes the cache a final time and stops the main loop. Idempotent.
    pub fn shutdown(&self) {
        self.main_loop.shutdown();
    }
}

impl Drop for AchievementService {
    fn drop(&mut self) {
        if !self.main_loop.is_primary_thread() {
            self.shutdown();
        }
    }
}
