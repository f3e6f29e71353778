//! Whole-store images.
//!
//! An image is everything a store holds: its config and its data in
//! whichever storage model the schema version uses. Migrations map one
//! image to the next; drivers read and write images for backup-safe
//! rewrites.

use crate::assembly::{Pcb, User};
use crate::config::ConfigTable;
use crate::error::StoreError;
use crate::record::PartRecord;
use serde::Serialize;
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;

/// One row of a legacy per-type table.
pub type LegacyRow = serde_json::Map<String, serde_json::Value>;

/// The document collections of a schema ≥ 0.7 store.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DocumentSet {
    pub parts: Vec<PartRecord>,
    pub pcbs: Vec<Pcb>,
    pub users: Vec<User>,
}

impl DocumentSet {
    pub fn from_parts(parts: Vec<PartRecord>) -> Self {
        Self {
            parts,
            ..Self::default()
        }
    }

    pub fn len(&self) -> usize {
        self.parts.len() + self.pcbs.len() + self.users.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// How store data is laid out.
#[derive(Debug, Clone, PartialEq)]
pub enum StoreModel {
    /// Schema ≤ 0.6: one table per part type plus `pcbs`, keyed by table
    /// name.
    Tables(BTreeMap<String, Vec<LegacyRow>>),
    /// Schema ≥ 0.7: type-discriminated part documents, PCBs and users.
    Documents(DocumentSet),
}

impl StoreModel {
    pub fn row_count(&self) -> usize {
        match self {
            Self::Tables(tables) => tables.values().map(Vec::len).sum(),
            Self::Documents(documents) => documents.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.row_count() == 0
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Self::Tables(_) => "tables",
            Self::Documents(_) => "documents",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct StoreImage {
    pub config: ConfigTable,
    pub model: StoreModel,
}

fn hash_lines<T: Serialize>(
    hasher: &mut Sha256,
    label: &str,
    items: &[T],
) -> Result<(), StoreError> {
    hasher.update(label.as_bytes());
    hasher.update([0]);
    for item in items {
        let line = serde_json::to_string(item).map_err(StoreError::Encode)?;
        hasher.update(line.as_bytes());
        hasher.update([0]);
    }
    Ok(())
}

impl StoreImage {
    /// SHA-256 over the config rows and every row or document, in order.
    ///
    /// Fails only if a document cannot be encoded as JSON.
    pub fn digest(&self) -> Result<String, StoreError> {
        let mut hasher = Sha256::new();
        for entry in self.config.to_entries() {
            hasher.update(entry.key.as_bytes());
            hasher.update([0]);
            hasher.update(entry.val.as_bytes());
            hasher.update([0]);
        }
        hasher.update(self.model.kind().as_bytes());
        hasher.update([0]);
        match &self.model {
            StoreModel::Tables(tables) => {
                for (table, rows) in tables {
                    hash_lines(&mut hasher, table, rows)?;
                }
            }
            StoreModel::Documents(documents) => {
                hash_lines(&mut hasher, "parts", &documents.parts)?;
                hash_lines(&mut hasher, "pcbs", &documents.pcbs)?;
                hash_lines(&mut hasher, "users", &documents.users)?;
            }
        }
        Ok(format!("{:x}", hasher.finalize()))
    }
}
