//! User preferences (column visibility and similar UI state).
//!
//! Stores are passed in explicitly; nothing reads preferences from a global
//! location behind the caller's back.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

pub trait PreferencesStore {
    fn load(&self, key: &str) -> Result<Option<Value>>;
    fn save(&mut self, key: &str, value: Value) -> Result<()>;
}

/// In-memory store.
#[derive(Debug, Default, Clone)]
pub struct MemoryPreferences {
    values: BTreeMap<String, Value>,
}

impl MemoryPreferences {
    pub fn new() -> Self {
        Self::default()
    }
}

impl PreferencesStore for MemoryPreferences {
    fn load(&self, key: &str) -> Result<Option<Value>> {
        Ok(self.values.get(key).cloned())
    }

    fn save(&mut self, key: &str, value: Value) -> Result<()> {
        self.values.insert(key.to_string(), value);
        Ok(())
    }
}

/// All keys in one JSON object on disk, rewritten on every save.
#[derive(Debug, Clone)]
pub struct JsonFilePreferences {
    path: PathBuf,
}

impl JsonFilePreferences {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// `<config dir>/pcrm-import/preferences.json`
    pub fn default_path() -> Result<PathBuf> {
        let base = dirs::config_dir()
            .or_else(|| dirs::home_dir().map(|h| h.join(".config")))
            .context("Could not determine config directory")?;
        Ok(base.join("pcrm-import").join("preferences.json"))
    }

    pub fn open_default() -> Result<Self> {
        Ok(Self::new(Self::default_path()?))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read_all(&self) -> Result<Map<String, Value>> {
        if !self.path.exists() {
            return Ok(Map::new());
        }
        let content = fs::read_to_string(&self.path)
            .with_context(|| format!("Failed to read preferences: {}", self.path.display()))?;
        if content.trim().is_empty() {
            return Ok(Map::new());
        }
        serde_json::from_str(&content).with_context(|| format!("Invalid preferences file: {}", self.path.display()))
    }
}

impl PreferencesStore for JsonFilePreferences {
    fn load(&self, key: &str) -> Result<Option<Value>> {
        Ok(self.read_all()?.remove(key))
    }

    fn save(&mut self, key: &str, value: Value) -> Result<()> {
        let mut all = self.read_all()?;
        all.insert(key.to_string(), value);

        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).context("Failed to create preferences directory")?;
        }
        let json = serde_json::to_string_pretty(&all)?;
        fs::write(&self.path, json)
            .with_context(|| format!("Failed to write preferences: {}", self.path.display()))?;
        debug!(key, path = %self.path.display(), "saved preference");
        Ok(())
    }
}

/// Visibility per column of one table view. Unlisted columns are visible.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ColumnVisibility {
    columns: BTreeMap<String, bool>,
}

impl ColumnVisibility {
    pub fn storage_key(table: &str) -> String {
        format!("columns.{}", table)
    }

    pub fn is_visible(&self, column: &str) -> bool {
        self.columns.get(column).copied().unwrap_or(true)
    }

    pub fn set(&mut self, column: impl Into<String>, visible: bool) {
        self.columns.insert(column.into(), visible);
    }

    pub fn hidden(&self) -> impl Iterator<Item = &str> {
        self.columns.iter().filter(|(_, v)| !**v).map(|(k, _)| k.as_str())
    }

    pub fn load(store: &dyn PreferencesStore, table: &str) -> Result<Self> {
        match store.load(&Self::storage_key(table))? {
            Some(value) => serde_json::from_value(value)
                .with_context(|| format!("Invalid column preferences for {}", table)),
            None => Ok(Self::default()),
        }
    }

    pub fn save(&self, store: &mut dyn PreferencesStore, table: &str) -> Result<()> {
        store.save(&Self::storage_key(table), serde_json::to_value(self)?)
    }
}
