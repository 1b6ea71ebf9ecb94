//! Domain types shared by both storage tiers and the public API.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use uuid::Uuid;

// ==================== PLAYERS ====================

/// Stable player identifier. The nil UUID stands for "no player".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PlayerId(Uuid);

impl PlayerId {
    pub const fn from_uuid(id: Uuid) -> Self {
        Self(id)
    }

    pub fn new_random() -> Self {
        Self(Uuid::new_v4())
    }

    pub const fn nil() -> Self {
        Self(Uuid::nil())
    }

    pub fn parse(text: &str) -> Result<Self, uuid::Error> {
        Uuid::parse_str(text).map(Self)
    }

    pub const fn as_uuid(&self) -> &Uuid {
        &self.0
    }

    /// `None` for the nil identifier
    pub fn non_nil(self) -> Option<Self> {
        if self.0.is_nil() {
            None
        } else {
            Some(self)
        }
    }
}

impl fmt::Display for PlayerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl From<Uuid> for PlayerId {
    fn from(id: Uuid) -> Self {
        Self(id)
    }
}

// ==================== CATEGORIES ====================

/// Categories tracked by a single counter per player.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum NormalCategory {
    Connections,
    Deaths,
    Arrows,
    Fish,
    EatenItems,
    Enchantments,
    PlayedTime,
    MaxLevel,
    Trades,
    DistanceFoot,
}

impl NormalCategory {
    pub const ALL: [NormalCategory; 10] = [
        NormalCategory::Connections,
        NormalCategory::Deaths,
        NormalCategory::Arrows,
        NormalCategory::Fish,
        NormalCategory::EatenItems,
        NormalCategory::Enchantments,
        NormalCategory::PlayedTime,
        NormalCategory::MaxLevel,
        NormalCategory::Trades,
        NormalCategory::DistanceFoot,
    ];

    /// Name used in configuration files and durable rows.
    pub fn name(&self) -> &'static str {
        match self {
            NormalCategory::Connections => "Connections",
            NormalCategory::Deaths => "Deaths",
            NormalCategory::Arrows => "Arrows",
            NormalCategory::Fish => "Fish",
            NormalCategory::EatenItems => "EatenItems",
            NormalCategory::Enchantments => "Enchantments",
            NormalCategory::PlayedTime => "PlayedTime",
            NormalCategory::MaxLevel => "MaxLevel",
            NormalCategory::Trades => "Trades",
            NormalCategory::DistanceFoot => "DistanceFoot",
        }
    }
}

impl FromStr for NormalCategory {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .iter()
            .find(|c| c.name().eq_ignore_ascii_case(s))
            .copied()
            .ok_or_else(|| format!("unknown normal category: {}", s))
    }
}

/// Categories tracked per (category, subcategory) pair, e.g. kills per mob type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum MultipleCategory {
    Kills,
    Breaks,
    Places,
    Crafts,
    Breeding,
    PlayerCommands,
}

impl MultipleCategory {
    pub const ALL: [MultipleCategory; 6] = [
        MultipleCategory::Kills,
        MultipleCategory::Breaks,
        MultipleCategory::Places,
        MultipleCategory::Crafts,
        MultipleCategory::Breeding,
        MultipleCategory::PlayerCommands,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            MultipleCategory::Kills => "Kills",
            MultipleCategory::Breaks => "Breaks",
            MultipleCategory::Places => "Places",
            MultipleCategory::Crafts => "Crafts",
            MultipleCategory::Breeding => "Breeding",
            MultipleCategory::PlayerCommands => "PlayerCommands",
        }
    }
}

impl FromStr for MultipleCategory {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .iter()
            .find(|c| c.name().eq_ignore_ascii_case(s))
            .copied()
            .ok_or_else(|| format!("unknown multiple category: {}", s))
    }
}

/// Key of a single counter: a simple category, or a compound one with its subcategory.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum CategoryKey {
    Normal(NormalCategory),
    Multiple {
        category: MultipleCategory,
        subcategory: String,
    },
}

impl CategoryKey {
    pub fn multiple(category: MultipleCategory, subcategory: impl Into<String>) -> Self {
        CategoryKey::Multiple {
            category,
            subcategory: subcategory.into(),
        }
    }

    pub fn category_name(&self) -> &'static str {
        match self {
            CategoryKey::Normal(category) => category.name(),
            CategoryKey::Multiple { category, .. } => category.name(),
        }
    }

    /// Empty for simple categories.
    pub fn subcategory(&self) -> &str {
        match self {
            CategoryKey::Normal(_) => "",
            CategoryKey::Multiple { subcategory, .. } => subcategory,
        }
    }

    /// Rebuilds a key from its stored (category, subcategory) columns.
    pub fn from_parts(category: &str, subcategory: &str) -> Result<Self, String> {
        if subcategory.is_empty() {
            category.parse::<NormalCategory>().map(CategoryKey::Normal)
        } else {
            let category = category.parse::<MultipleCategory>()?;
            Ok(CategoryKey::multiple(category, subcategory))
        }
    }
}

impl fmt::Display for CategoryKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CategoryKey::Normal(category) => f.write_str(category.name()),
            CategoryKey::Multiple {
                category,
                subcategory,
            } => write!(f, "{}.{}", category.name(), subcategory),
        }
    }
}

/// Absolute counter value written to the durable tier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatisticWrite {
    pub player: PlayerId,
    pub key: CategoryKey,
    pub amount: u64,
}

// ==================== ACHIEVEMENTS ====================

/// Counter threshold that unlocks an achievement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Trigger {
    pub key: CategoryKey,
    pub threshold: u64,
}

/// Achievement definition, immutable once loaded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Achievement {
    pub name: String,
    pub display_name: String,
    pub message: String,
    pub trigger: Option<Trigger>,
}

/// Award row as stored by the durable tier; the name may no longer be registered.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AwardRecord {
    pub name: String,
    pub awarded_at: DateTime<Utc>,
}

/// Award joined with its current definition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AwardedAchievement {
    pub achievement: Arc<Achievement>,
    pub player: PlayerId,
    pub awarded_at: DateTime<Utc>,
}

// ==================== RANKING ====================

/// Position of a player among all players with at least one award in a window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rank {
    /// 1-based; [`Rank::UNRANKED`] when the player has no entry.
    pub position: usize,
    pub field_size: usize,
}

impl Rank {
    pub const UNRANKED: usize = usize::MAX;

    pub fn is_ranked(&self) -> bool {
        self.position != Self::UNRANKED
    }
}

// ==================== VERSION ====================

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct Version {
    pub major: u32,
    pub minor: u32,
    pub patch: u32,
}

impl Version {
    /// Parses a dotted version. Empty components are skipped; missing or
    /// non-numeric components become 0.
    pub fn parse(text: &str) -> Self {
        let mut parts = text.split('.').filter(|part| !part.is_empty());
        let mut next = || {
            parts
                .next()
                .and_then(|part| part.parse::<u32>().ok())
                .unwrap_or(0)
        };
        let major = next();
        let minor = next();
        let patch = next();
        Version {
            major,
            minor,
            patch,
        }
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.patch)
    }
}
