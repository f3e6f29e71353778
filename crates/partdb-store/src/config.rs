//! Persisted key-value config and the schema version marker.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// Config key holding the store's schema version.
pub const DB_VERSION_KEY: &str = "db_ver";

/// Schema version this build reads and writes.
pub const CURRENT_SCHEMA_VERSION: SchemaVersion = SchemaVersion::new(0, 7, 0);

/// First schema version stored as type-discriminated documents rather
/// than one table per part type.
pub const DOCUMENT_MODEL_SINCE: SchemaVersion = SchemaVersion::new(0, 7, 0);

/// An ordered `major.minor[.patch]` schema tag.
///
/// Pre-release suffixes (`0.7.0-dev`) are accepted and dropped when parsing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct SchemaVersion {
    pub major: u32,
    pub minor: u32,
    pub patch: u32,
}

impl SchemaVersion {
    pub const fn new(major: u32, minor: u32, patch: u32) -> Self {
        Self {
            major,
            minor,
            patch,
        }
    }

    /// Whether stores at this version keep parts as documents.
    pub fn uses_documents(self) -> bool {
        self >= DOCUMENT_MODEL_SINCE
    }
}

impl fmt::Display for SchemaVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.patch == 0 {
            write!(f, "{}.{}", self.major, self.minor)
        } else {
            write!(f, "{}.{}.{}", self.major, self.minor, self.patch)
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid schema version `{0}`")]
pub struct VersionParseError(pub String);

impl FromStr for SchemaVersion {
    type Err = VersionParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        let release = trimmed.split_once('-').map_or(trimmed, |(head, _)| head);
        let parts: Vec<&str> = release.split('.').collect();
        if !(2..=3).contains(&parts.len()) {
            return Err(VersionParseError(s.to_string()));
        }
        let mut numbers = [0u32; 3];
        for (slot, part) in numbers.iter_mut().zip(&parts) {
            *slot = part.parse().map_err(|_| VersionParseError(s.to_string()))?;
        }
        Ok(Self::new(numbers[0], numbers[1], numbers[2]))
    }
}

impl TryFrom<String> for SchemaVersion {
    type Error = VersionParseError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<SchemaVersion> for String {
    fn from(value: SchemaVersion) -> Self {
        value.to_string()
    }
}

/// One `{"key": ..., "val": ...}` config row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfigEntry {
    pub key: String,
    pub val: String,
}

impl ConfigEntry {
    pub fn new(key: impl Into<String>, val: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            val: val.into(),
        }
    }
}

/// The store's key-value config.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConfigTable {
    entries: BTreeMap<String, String>,
}

impl ConfigTable {
    /// Later rows win when a key repeats.
    pub fn from_entries(entries: Vec<ConfigEntry>) -> Self {
        Self {
            entries: entries.into_iter().map(|e| (e.key, e.val)).collect(),
        }
    }

    pub fn to_entries(&self) -> Vec<ConfigEntry> {
        self.entries
            .iter()
            .map(|(key, val)| ConfigEntry::new(key, val))
            .collect()
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries.get(key).map(String::as_str)
    }

    pub fn set(&mut self, key: impl Into<String>, val: impl Into<String>) {
        self.entries.insert(key.into(), val.into());
    }

    pub fn remove(&mut self, key: &str) -> Option<String> {
        self.entries.remove(key)
    }

    /// The persisted schema version, if one was ever written.
    pub fn db_version(&self) -> Result<Option<SchemaVersion>, VersionParseError> {
        self.get(DB_VERSION_KEY).map(str::parse).transpose()
    }

    pub fn set_db_version(&mut self, version: SchemaVersion) {
        self.set(DB_VERSION_KEY, version.to_string());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn versions_parse_and_order() {
        let v = |s: &str| s.parse::<SchemaVersion>().expect("version should parse");
        assert_eq!(v("0.7.0-dev"), SchemaVersion::new(0, 7, 0));
        assert_eq!(v("0.5"), SchemaVersion::new(0, 5, 0));
        assert!(v("0.10") > v("0.9"));
        assert!(v("0.6.1") > v("0.6"));
        assert!("seven".parse::<SchemaVersion>().is_err());
        assert!("1".parse::<SchemaVersion>().is_err());
    }

    #[test]
    fn display_omits_zero_patch() {
        assert_eq!(CURRENT_SCHEMA_VERSION.to_string(), "0.7");
        assert_eq!(SchemaVersion::new(1, 2, 3).to_string(), "1.2.3");
    }

    #[test]
    fn document_model_starts_at_zero_seven() {
        assert!(!SchemaVersion::new(0, 6, 0).uses_documents());
        assert!(CURRENT_SCHEMA_VERSION.uses_documents());
    }

    #[test]
    fn config_table_tracks_db_version() {
        let mut config = ConfigTable::default();
        assert_eq!(config.db_version(), Ok(None));
        config.set_db_version(SchemaVersion::new(0, 6, 0));
        assert_eq!(config.get(DB_VERSION_KEY), Some("0.6"));

        let reloaded = ConfigTable::from_entries(config.to_entries());
        assert_eq!(reloaded.db_version(), Ok(Some(SchemaVersion::new(0, 6, 0))));

        config.set(DB_VERSION_KEY, "garbage");
        assert!(config.db_version().is_err());
    }
}
