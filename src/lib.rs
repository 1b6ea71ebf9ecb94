//! Achievement and statistics ledger.
//!
//! Counters and awards live in two tiers: a lock-free cache owned by the host's
//! primary thread ([`main_loop::MainLoop`]) and a thread-safe durable store.
//! [`api::AchievementsApi`] picks the tier per call, answers ranking queries from
//! the durable tier, and awards achievements as counters cross their thresholds.

// ==================== TIERS ====================

pub mod cache;
pub mod store;

// ==================== CONTEXT ====================

pub mod confined;
pub mod context;
pub mod interrupt;
pub mod main_loop;

// ==================== DOMAIN ====================

pub mod api;
pub mod model;
pub mod rank;
pub mod registry;
pub mod thresholds;
pub mod validate;

// ==================== SERVICE ====================

pub mod config;
pub mod error;
// Bulk restore for disaster recovery
pub mod restore;
pub mod service;

pub use api::AchievementsApi;
pub use config::Config;
pub use context::{ContextGate, PresenceFallback, PrimaryScheduler};
pub use error::{ApiError, ConfigError, RestoreError, ServiceError, StoreError};
pub use main_loop::MainLoop;
pub use model::{
    Achievement, AwardedAchievement, CategoryKey, MultipleCategory, NormalCategory, PlayerId, Rank,
    Version,
};
pub use rank::RankingPeriod;
pub use registry::AchievementRegistry;
pub use service::AchievementService;
