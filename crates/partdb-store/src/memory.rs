//! In-memory part state.
//!
//! Records live in one homogeneous collection per part type. A global
//! `ipn → type` index makes cross-type lookups and the IPN uniqueness
//! check a single map lookup.

use crate::error::StoreError;
use crate::record::PartRecord;
use std::collections::BTreeMap;

/// Canonical in-memory state for part records.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PartStore {
    collections: BTreeMap<String, BTreeMap<String, PartRecord>>,
    index: BTreeMap<String, String>,
}

impl PartStore {
    /// Build a store from fully-materialized records.
    ///
    /// A repeated IPN is a corrupt store, not an overlay.
    pub fn from_records(records: Vec<PartRecord>) -> Result<Self, StoreError> {
        let mut store = Self::default();
        for record in records {
            store.insert(record)?;
        }
        Ok(store)
    }

    pub fn len(&self) -> usize {
        self.index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    pub fn contains(&self, ipn: &str) -> bool {
        self.index.contains_key(ipn)
    }

    /// Part type of `ipn`, if present.
    pub fn type_of(&self, ipn: &str) -> Option<&str> {
        self.index.get(ipn).map(String::as_str)
    }

    pub fn get(&self, ipn: &str) -> Option<&PartRecord> {
        let type_name = self.index.get(ipn)?;
        self.collections.get(type_name)?.get(ipn)
    }

    pub fn get_mut(&mut self, ipn: &str) -> Option<&mut PartRecord> {
        let type_name = self.index.get(ipn)?;
        self.collections.get_mut(type_name)?.get_mut(ipn)
    }

    /// Insert a new record. Fails if the IPN is taken under any type.
    pub fn insert(&mut self, record: PartRecord) -> Result<(), StoreError> {
        if self.index.contains_key(&record.ipn) {
            return Err(StoreError::DuplicateIpn(record.ipn));
        }
        self.index
            .insert(record.ipn.clone(), record.type_name.clone());
        self.collections
            .entry(record.type_name.clone())
            .or_default()
            .insert(record.ipn.clone(), record);
        Ok(())
    }

    pub fn remove(&mut self, ipn: &str) -> Option<PartRecord> {
        let type_name = self.index.remove(ipn)?;
        let collection = self.collections.get_mut(&type_name)?;
        let removed = collection.remove(ipn);
        if collection.is_empty() {
            self.collections.remove(&type_name);
        }
        removed
    }

    /// All records in IPN order.
    pub fn records(&self) -> impl Iterator<Item = &PartRecord> {
        self.index.keys().filter_map(|ipn| self.get(ipn))
    }

    /// Records of one type in IPN order.
    pub fn records_of<'a>(
        &'a self,
        type_name: &str,
    ) -> impl Iterator<Item = &'a PartRecord> + use<'a> {
        self.collections
            .get(type_name)
            .into_iter()
            .flat_map(|collection| collection.values())
    }

    pub fn count_of(&self, type_name: &str) -> usize {
        self.collections.get(type_name).map_or(0, BTreeMap::len)
    }

    /// IPNs in order, optionally restricted to one type.
    pub fn ipns(&self, type_name: Option<&str>) -> Vec<String> {
        match type_name {
            Some(type_name) => self
                .records_of(type_name)
                .map(|record| record.ipn.clone())
                .collect(),
            None => self.index.keys().cloned().collect(),
        }
    }

    /// Drop every record, returning how many there were.
    pub fn clear(&mut self) -> usize {
        let count = self.len();
        self.collections.clear();
        self.index.clear();
        count
    }

    pub fn into_records(self) -> Vec<PartRecord> {
        let mut records: Vec<PartRecord> = self
            .collections
            .into_values()
            .flat_map(BTreeMap::into_values)
            .collect();
        records.sort_by(|a, b| a.ipn.cmp(&b.ipn));
        records
    }
}
