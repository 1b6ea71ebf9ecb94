//! Achievement definitions, keyed by name. Read-only once loaded.

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use serde::Deserialize;

use crate::error::ConfigError;
use crate::model::{Achievement, CategoryKey, MultipleCategory, NormalCategory, Trigger};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AchievementFile {
    #[serde(default)]
    achievements: Vec<AchievementEntry>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AchievementEntry {
    name: String,
    #[serde(default)]
    display_name: Option<String>,
    #[serde(default)]
    message: String,
    #[serde(default)]
    category: Option<String>,
    #[serde(default)]
    subcategory: Option<String>,
    #[serde(default)]
    threshold: Option<u64>,
}

#[derive(Debug, Default)]
pub struct AchievementRegistry {
    ordered: Vec<Arc<Achievement>>,
    by_name: HashMap<String, Arc<Achievement>>,
    by_key: HashMap<CategoryKey, Vec<Arc<Achievement>>>,
}

impl AchievementRegistry {
    /// Builds the registry, rejecting duplicate or empty names.
    pub fn new(achievements: Vec<Achievement>) -> Result<Self, ConfigError> {
        let mut registry = Self::default();
        for achievement in achievements {
            if achievement.name.is_empty() {
                return Err(ConfigError::Invalid("achievement name cannot be empty".to_string()));
            }
            if registry.by_name.contains_key(&achievement.name) {
                return Err(ConfigError::Invalid(format!(
                    "duplicate achievement name: {}",
                    achievement.name
                )));
            }
            let achievement = Arc::new(achievement);
            if let Some(trigger) = &achievement.trigger {
                let triggered = registry.by_key.entry(trigger.key.clone()).or_default();
                triggered.push(Arc::clone(&achievement));
                triggered.sort_by_key(|a| a.trigger.as_ref().map_or(0, |t| t.threshold));
            }
            registry
                .by_name
                .insert(achievement.name.clone(), Arc::clone(&achievement));
            registry.ordered.push(achievement);
        }
        Ok(registry)
    }

    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        let file: AchievementFile = serde_json::from_str(json)?;
        let achievements = file
            .achievements
            .into_iter()
            .map(parse_entry)
            .collect::<Result<Vec<_>, _>>()?;
        Self::new(achievements)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json_str(&json)
    }

    pub fn get(&self, name: &str) -> Option<&Arc<Achievement>> {
        self.by_name.get(name)
    }

    /// Definitions in load order.
    pub fn all(&self) -> &[Arc<Achievement>] {
        &self.ordered
    }

    /// Definitions unlocked by this counter, lowest threshold first.
    pub fn triggered_by(&self, key: &CategoryKey) -> &[Arc<Achievement>] {
        self.by_key.get(key).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn len(&self) -> usize {
        self.ordered.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ordered.is_empty()
    }
}

fn parse_entry(entry: AchievementEntry) -> Result<Achievement, ConfigError> {
    let trigger = match entry.category.as_deref() {
        None => None,
        Some(category) => {
            let key = parse_key(&entry.name, category, entry.subcategory.as_deref())?;
            let threshold = entry.threshold.ok_or_else(|| {
                ConfigError::Invalid(format!("{}: missing threshold", entry.name))
            })?;
            Some(Trigger { key, threshold })
        }
    };
    Ok(Achievement {
        display_name: entry.display_name.unwrap_or_else(|| entry.name.clone()),
        name: entry.name,
        message: entry.message,
        trigger,
    })
}

fn parse_key(name: &str, category: &str, subcategory: Option<&str>) -> Result<CategoryKey, ConfigError> {
    if let Ok(normal) = category.parse::<NormalCategory>() {
        return match subcategory {
            None => Ok(CategoryKey::Normal(normal)),
            Some(_) => Err(ConfigError::Invalid(format!(
                "{}: category {} does not take a subcategory",
                name, category
            ))),
        };
    }
    let multiple = category
        .parse::<MultipleCategory>()
        .map_err(|_| ConfigError::Invalid(format!("{}: unknown category {}", name, category)))?;
    match subcategory {
        Some(sub) if !sub.is_empty() => Ok(CategoryKey::multiple(multiple, sub)),
        _ => Err(ConfigError::Invalid(format!(
            "{}: category {} requires a subcategory",
            name, category
        ))),
    }
}
