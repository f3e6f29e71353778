//! Validated CRUD and stock adjustment over any registered part type.
//!
//! Every mutation is one [`StorageDriver::transact`] call: one lock scope,
//! one load-mutate-persist cycle. Records are validated against their type's
//! spec before they reach the store, so nothing undeclared is ever persisted.

use crate::config::CURRENT_SCHEMA_VERSION;
use crate::driver::StorageDriver;
use crate::error::{RepoError, StoreError};
use crate::record::PartRecord;
use partdb_kernel::{
    FilterClause, PartTypeSpec, SpecRegistry, TypedValue, ValidationError, apply, validate,
    validate_all,
};
use std::collections::BTreeMap;
use tracing::{debug, info};

/// Fields that identify a record and never change after `add`.
const IMMUTABLE_FIELDS: &[&str] = &["ipn", "type"];

#[derive(Debug)]
pub struct PartRepository<'r, D> {
    registry: &'r SpecRegistry,
    driver: D,
}

impl<'r, D: StorageDriver> PartRepository<'r, D> {
    /// Open a repository on `driver`.
    ///
    /// Refuses with `MigrationRequired` unless the store is at the current
    /// schema version. A store that has never been versioned and holds no
    /// data is stamped with the current version.
    pub fn open(registry: &'r SpecRegistry, driver: D) -> Result<Self, RepoError> {
        let config = driver.read_config()?;
        let version = config
            .db_version()
            .map_err(|e| StoreError::Config(e.to_string()))?;
        match version {
            Some(version) if version == CURRENT_SCHEMA_VERSION => {}
            Some(version) => {
                return Err(RepoError::MigrationRequired {
                    found: version.to_string(),
                    expected: CURRENT_SCHEMA_VERSION,
                });
            }
            None => {
                let _lock = driver.lock()?;
                let mut image = driver.read_image()?;
                if !image.model.is_empty() {
                    return Err(RepoError::MigrationRequired {
                        found: "unversioned".to_string(),
                        expected: CURRENT_SCHEMA_VERSION,
                    });
                }
                image.config.set_db_version(CURRENT_SCHEMA_VERSION);
                driver.write_config(&image.config)?;
                info!(version = %CURRENT_SCHEMA_VERSION, "initialised empty store");
            }
        }
        Ok(Self { registry, driver })
    }

    pub fn registry(&self) -> &'r SpecRegistry {
        self.registry
    }

    pub fn driver(&self) -> &D {
        &self.driver
    }

    /// Add a new part of `type_name`.
    ///
    /// Values are checked against the type's `PartTypeSpec` and widened to their kind's
    /// primitive. The IPN must be new across all types.
    pub fn add(&self, type_name: &str, record: PartRecord) -> Result<(), RepoError> {
        let spec = self.registry.get(type_name)?;
        if record.type_name != type_name {
            return Err(ValidationError::TypeNameMismatch {
                expected: type_name.to_string(),
                found: record.type_name,
            }
            .into());
        }
        let record = validated(spec, record)?;
        let ipn = record.ipn.clone();
        self.driver.transact(|store| -> Result<((), bool), RepoError> {
            if store.contains(&record.ipn) {
                return Err(RepoError::DuplicateIpn(record.ipn));
            }
            store.insert(record)?;
            Ok(((), true))
        })?;
        debug!(%ipn, type_name, "part added");
        Ok(())
    }

    pub fn get(&self, ipn: &str) -> Result<PartRecord, RepoError> {
        self.driver
            .read_parts()?
            .get(ipn)
            .cloned()
            .ok_or_else(|| RepoError::UnknownIpn(ipn.to_string()))
    }

    /// Merge `changes` into the record. `None` clears an optional field.
    ///
    /// All changes are validated before any is applied.
    pub fn update(
        &self,
        ipn: &str,
        changes: BTreeMap<String, Option<TypedValue>>,
    ) -> Result<PartRecord, RepoError> {
        let updated = self.driver.transact(|store| -> Result<_, RepoError> {
            let record = store
                .get_mut(ipn)
                .ok_or_else(|| RepoError::UnknownIpn(ipn.to_string()))?;
            let spec = self.registry.get(&record.type_name)?;

            let mut resolved = Vec::with_capacity(changes.len());
            for (name, value) in changes {
                if IMMUTABLE_FIELDS.contains(&name.as_str()) {
                    return Err(ValidationError::ImmutableField { field: name }.into());
                }
                let value = match value {
                    Some(value) => Some(checked_value(spec, &name, value)?),
                    None => {
                        let field = spec.field(&name).ok_or_else(|| unknown_field(spec, &name))?;
                        if field.required {
                            return Err(ValidationError::RequiredFieldMissing { field: name }.into());
                        }
                        None
                    }
                };
                resolved.push((name, value));
            }

            for (name, value) in resolved {
                match value {
                    Some(value) => record.set(name, value),
                    None => {
                        record.unset(&name);
                    }
                }
            }
            Ok((record.clone(), true))
        })?;
        debug!(ipn, "part updated");
        Ok(updated)
    }

    /// Remove a part, returning what was stored.
    pub fn delete(&self, ipn: &str) -> Result<PartRecord, RepoError> {
        let removed = self.driver.transact(|store| {
            store
                .remove(ipn)
                .map(|record| (record, true))
                .ok_or_else(|| RepoError::UnknownIpn(ipn.to_string()))
        })?;
        debug!(ipn, "part deleted");
        Ok(removed)
    }

    /// Add `delta` to the stock of `ipn` and return the new stock.
    ///
    /// A result below zero fails with `NegativeStock`, whose
    /// `amount_to_zero` is the current stock: the largest removal that
    /// would succeed.
    pub fn adjust_stock(&self, ipn: &str, delta: i64) -> Result<i64, RepoError> {
        let stock = self.driver.transact(|store| -> Result<_, RepoError> {
            let record = store
                .get_mut(ipn)
                .ok_or_else(|| RepoError::UnknownIpn(ipn.to_string()))?;
            let current = record.stock();
            let new = current
                .checked_add(delta)
                .ok_or_else(|| RepoError::StockOverflow {
                    ipn: ipn.to_string(),
                })?;
            if new < 0 {
                return Err(RepoError::NegativeStock {
                    ipn: ipn.to_string(),
                    amount_to_zero: current,
                });
            }
            record.set("stock", new);
            Ok((new, true))
        })?;
        debug!(ipn, delta, stock, "stock adjusted");
        Ok(stock)
    }

    /// Parts of `type_name` (or every type) matching all `filter` clauses.
    ///
    /// No match is an empty list, not an error.
    pub fn list(
        &self,
        type_name: Option<&str>,
        filter: Option<&[FilterClause]>,
    ) -> Result<Vec<PartRecord>, RepoError> {
        let clauses = filter.unwrap_or_default();
        match type_name {
            Some(type_name) => validate_all(clauses, self.registry.get(type_name)?)?,
            None => {
                for clause in clauses {
                    let spec = self
                        .registry
                        .list_types()
                        .find(|spec| spec.field(&clause.field).is_some())
                        .ok_or_else(|| ValidationError::UnknownField {
                            type_name: "*".to_string(),
                            field: clause.field.clone(),
                        })?;
                    validate(clause, spec)?;
                }
            }
        }

        let store = self.driver.read_parts()?;
        let records: Vec<PartRecord> = match type_name {
            Some(type_name) => store.records_of(type_name).cloned().collect(),
            None => store.records().cloned().collect(),
        };
        Ok(apply(records, clauses))
    }

    pub fn all_ipns(&self, type_name: Option<&str>) -> Result<Vec<String>, RepoError> {
        if let Some(type_name) = type_name {
            self.registry.get(type_name)?;
        }
        Ok(self.driver.read_parts()?.ipns(type_name))
    }

    pub fn exists(&self, ipn: &str) -> Result<bool, RepoError> {
        Ok(self.driver.read_parts()?.contains(ipn))
    }

    pub fn count(&self, type_name: Option<&str>) -> Result<usize, RepoError> {
        let store = self.driver.read_parts()?;
        Ok(match type_name {
            Some(type_name) => store.count_of(type_name),
            None => store.len(),
        })
    }

    /// Remove every part. Config is kept.
    pub fn wipe(&self) -> Result<usize, RepoError> {
        let removed = self
            .driver
            .transact(|store| -> Result<(usize, bool), RepoError> {
                let removed = store.clear();
                Ok((removed, removed > 0))
            })?;
        info!(removed, "store wiped");
        Ok(removed)
    }

    /// One-line summary of a part, rendered from its type's summary
    /// segments. `None` for types without one.
    pub fn describe(&self, record: &PartRecord) -> Option<String> {
        self.registry.get(&record.type_name).ok()?.summarize(record)
    }
}

fn unknown_field(spec: &PartTypeSpec, name: &str) -> ValidationError {
    ValidationError::UnknownField {
        type_name: spec.type_name.clone(),
        field: name.to_string(),
    }
}

/// Check one value against its field and bring it to the field's primitive.
fn checked_value(
    spec: &PartTypeSpec,
    name: &str,
    value: TypedValue,
) -> Result<TypedValue, ValidationError> {
    let field = spec.field(name).ok_or_else(|| unknown_field(spec, name))?;
    if field.required && value.as_text().is_some_and(|text| text.trim().is_empty()) {
        return Err(ValidationError::RequiredFieldMissing {
            field: name.to_string(),
        });
    }
    let raw = value.to_string();
    let value = field
        .kind
        .coerce(value)
        .ok_or_else(|| ValidationError::TypeMismatch {
            field: name.to_string(),
            raw,
            expected: field.kind.primitive_name(),
        })?;
    if name == "stock"
        && let Some(stock) = value.as_i64()
        && stock < 0
    {
        return Err(ValidationError::NegativeValue {
            field: name.to_string(),
            value: stock,
        });
    }
    Ok(value)
}

/// A record ready to persist: every value declared and coerced, every
/// required field set.
fn validated(spec: &PartTypeSpec, record: PartRecord) -> Result<PartRecord, ValidationError> {
    if record.ipn.trim().is_empty() {
        return Err(ValidationError::RequiredFieldMissing {
            field: "ipn".to_string(),
        });
    }
    let mut fields = BTreeMap::new();
    for (name, value) in record.fields {
        if IMMUTABLE_FIELDS.contains(&name.as_str()) {
            return Err(ValidationError::ImmutableField { field: name });
        }
        let value = checked_value(spec, &name, value)?;
        fields.insert(name, value);
    }
    if let Some(missing) = spec
        .required_fields()
        .find(|field| field.name != "ipn" && !fields.contains_key(&field.name))
    {
        return Err(ValidationError::RequiredFieldMissing {
            field: missing.name.clone(),
        });
    }
    Ok(PartRecord {
        ipn: record.ipn,
        type_name: record.type_name,
        fields,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{ConfigTable, SchemaVersion};
    use crate::driver::MemoryDriver;
    use crate::image::{StoreImage, StoreModel};
    use partdb_kernel::{CompareOp, builtin_registry};
    use proptest::prelude::*;

    fn repo(driver: &MemoryDriver) -> PartRepository<'static, &MemoryDriver> {
        PartRepository::open(builtin_registry(), driver).expect("empty store should open")
    }

    fn resistor(ipn: &str, resistance: f64) -> PartRecord {
        PartRecord::new(ipn, "resistor")
            .with("stock", 5_i64)
            .with("package", "0805")
            .with("resistance", resistance)
    }

    #[test]
    fn open_stamps_fresh_store_and_gates_old_versions() {
        let driver = MemoryDriver::default();
        repo(&driver);
        assert_eq!(
            driver.read_config().expect("config").db_version(),
            Ok(Some(CURRENT_SCHEMA_VERSION))
        );

        let mut config = ConfigTable::default();
        config.set_db_version(SchemaVersion::new(0, 6, 0));
        let stale = MemoryDriver::new(StoreImage {
            config,
            model: StoreModel::Tables(BTreeMap::new()),
        });
        let err = PartRepository::open(builtin_registry(), &stale)
            .err()
            .expect("old schema must be refused");
        assert!(matches!(err, RepoError::MigrationRequired { found, .. } if found == "0.6"));
    }

    #[test]
    fn add_requires_required_fields_only() {
        let driver = MemoryDriver::default();
        let repo = repo(&driver);

        let missing = PartRecord::new("R1", "resistor")
            .with("stock", 1_i64)
            .with("package", "0805");
        assert!(matches!(
            repo.add("resistor", missing),
            Err(RepoError::Validation(ValidationError::RequiredFieldMissing { field }))
                if field == "resistance"
        ));

        repo.add("resistor", resistor("R1", 1000.0)).expect("complete record");
        let stored = repo.get("R1").expect("stored");
        assert_eq!(stored.get("tolerance"), None);
        assert_eq!(stored.get("resistance"), Some(&TypedValue::Float(1000.0)));
    }

    #[test]
    fn add_widens_ints_and_rejects_undeclared_fields() {
        let driver = MemoryDriver::default();
        let repo = repo(&driver);

        let record = resistor("R1", 0.0).with("resistance", 4700_i64);
        repo.add("resistor", record).expect("int widens to float");
        assert_eq!(
            repo.get("R1").expect("R1").get("resistance"),
            Some(&TypedValue::Float(4700.0))
        );

        let bogus = resistor("R2", 1.0).with("capacitance", 1.0);
        assert!(matches!(
            repo.add("resistor", bogus),
            Err(RepoError::Validation(ValidationError::UnknownField { .. }))
        ));

        let negative = resistor("R3", 1.0).with("stock", -1_i64);
        assert!(matches!(
            repo.add("resistor", negative),
            Err(RepoError::Validation(ValidationError::NegativeValue { .. }))
        ));
    }

    #[test]
    fn duplicate_ipn_rejected_across_types() {
        let driver = MemoryDriver::default();
        let repo = repo(&driver);
        repo.add("resistor", resistor("X1", 1000.0)).expect("first add");

        let capacitor = PartRecord::new("X1", "capacitor")
            .with("stock", 1_i64)
            .with("package", "0603")
            .with("capacitance", 1e-7);
        let err = repo.add("capacitor", capacitor).expect_err("duplicate ipn");
        assert!(err.is_conflict());
        assert!(matches!(err, RepoError::DuplicateIpn(ipn) if ipn == "X1"));
    }

    #[test]
    fn add_rejects_record_typed_differently() {
        let driver = MemoryDriver::default();
        let repo = repo(&driver);
        assert!(matches!(
            repo.add("capacitor", resistor("R1", 1.0)),
            Err(RepoError::Validation(ValidationError::TypeNameMismatch { .. }))
        ));
    }

    #[test]
    fn negative_stock_reports_current_amount() {
        let driver = MemoryDriver::default();
        let repo = repo(&driver);
        repo.add("resistor", resistor("R1", 1000.0)).expect("add");

        let err = repo.adjust_stock("R1", -8).expect_err("5 - 8 < 0");
        assert!(matches!(
            err,
            RepoError::NegativeStock { amount_to_zero: 5, .. }
        ));
        assert_eq!(repo.adjust_stock("R1", -5).expect("to zero"), 0);
        assert_eq!(repo.adjust_stock("R1", 3).expect("restock"), 3);
        assert!(repo.adjust_stock("R9", 1).expect_err("missing").is_not_found());
    }

    #[test]
    fn update_validates_everything_before_merging() {
        let driver = MemoryDriver::default();
        let repo = repo(&driver);
        repo.add("resistor", resistor("R1", 1000.0)).expect("add");

        let changes = BTreeMap::from([
            ("tolerance".to_string(), Some(TypedValue::Float(1.0))),
            ("colour".to_string(), Some(TypedValue::from("red"))),
        ]);
        assert!(repo.update("R1", changes).expect_err("colour").is_validation());
        assert_eq!(repo.get("R1").expect("R1").get("tolerance"), None);

        let changes = BTreeMap::from([
            ("tolerance".to_string(), Some(TypedValue::Float(1.0))),
            ("comments".to_string(), None),
        ]);
        let updated = repo.update("R1", changes).expect("valid update");
        assert_eq!(updated.get("tolerance"), Some(&TypedValue::Float(1.0)));

        for field in ["ipn", "type"] {
            let changes = BTreeMap::from([(field.to_string(), Some(TypedValue::from("R2")))]);
            assert!(matches!(
                repo.update("R1", changes),
                Err(RepoError::Validation(ValidationError::ImmutableField { .. }))
            ));
        }

        let clear_required = BTreeMap::from([("package".to_string(), None)]);
        assert!(matches!(
            repo.update("R1", clear_required),
            Err(RepoError::Validation(ValidationError::RequiredFieldMissing { .. }))
        ));
    }

    #[test]
    fn list_filters_within_a_type() {
        let driver = MemoryDriver::default();
        let repo = repo(&driver);
        repo.add("resistor", resistor("R1", 1000.0)).expect("R1");
        repo.add("resistor", resistor("R2", 2200.0)).expect("R2");
        repo.add(
            "ic",
            PartRecord::new("U1", "ic")
                .with("stock", 1_i64)
                .with("package", "SOIC-8")
                .with("ic_type", "op-amp"),
        )
        .expect("U1");

        let clauses = [FilterClause::new("resistance", CompareOp::Gt, 1500.0)];
        let found = repo.list(Some("resistor"), Some(&clauses[..])).expect("list");
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].ipn, "R2");

        let everything = repo.list(None, None).expect("all");
        assert_eq!(everything.len(), 3);

        let none = repo
            .list(Some("resistor"), Some(&[FilterClause::new("resistance", CompareOp::Gt, 1e9)][..]))
            .expect("no match is not an error");
        assert!(none.is_empty());

        let across = repo
            .list(None, Some(&[FilterClause::new("resistance", CompareOp::Lt, 1e9)][..]))
            .expect("cross-type filter");
        assert_eq!(across.len(), 2);

        assert!(repo
            .list(Some("resistor"), Some(&[FilterClause::new("ic_type", CompareOp::Eq, "x")][..]))
            .expect_err("ic_type is not a resistor field")
            .is_validation());
    }

    #[test]
    fn conveniences_track_contents() {
        let driver = MemoryDriver::default();
        let repo = repo(&driver);
        repo.add("resistor", resistor("R2", 1.0)).expect("R2");
        repo.add("resistor", resistor("R1", 1.0)).expect("R1");

        assert_eq!(repo.all_ipns(Some("resistor")).expect("ipns"), vec!["R1", "R2"]);
        assert!(repo.exists("R1").expect("exists"));
        assert_eq!(repo.count(Some("capacitor")).expect("count"), 0);
        assert_eq!(repo.count(None).expect("count"), 2);

        repo.delete("R1").expect("delete");
        assert!(repo.delete("R1").expect_err("gone").is_not_found());
        assert_eq!(repo.wipe().expect("wipe"), 1);
        assert_eq!(repo.count(None).expect("count"), 0);
        assert_eq!(
            driver.read_config().expect("config").db_version(),
            Ok(Some(CURRENT_SCHEMA_VERSION))
        );
    }

    #[test]
    fn describe_follows_each_types_summary() {
        let driver = MemoryDriver::default();
        let repo = repo(&driver);
        let record = resistor("R1", 4700.0)
            .with("tolerance", 5.0)
            .with("power", 0.25);
        assert_eq!(
            repo.describe(&record).as_deref(),
            Some("A 4.7kΩ resistor with a 5% tolerance with 0.25W capability")
        );
        assert_eq!(
            repo.describe(&resistor("R2", 1000.0)).as_deref(),
            Some("A 1kΩ resistor")
        );

        let inductor = PartRecord::new("L1", "inductor")
            .with("inductance", 2.2e-5)
            .with("max_current", 1.5);
        assert_eq!(
            repo.describe(&inductor).as_deref(),
            Some("A 22uH inductor rated for 1.5A")
        );
        assert_eq!(repo.describe(&PartRecord::new("U1", "ic")), None);
        assert_eq!(repo.describe(&PartRecord::new("X1", "relay")), None);
    }

    proptest! {
        #[test]
        fn stock_never_goes_negative(
            initial in 0i64..100,
            deltas in proptest::collection::vec(-50i64..50, 1..40),
        ) {
            let driver = MemoryDriver::default();
            let repo = repo(&driver);
            repo.add("resistor", resistor("R1", 1.0).with("stock", initial))
                .expect("add");

            let mut expected = initial;
            for delta in deltas {
                match repo.adjust_stock("R1", delta) {
                    Ok(stock) => {
                        expected += delta;
                        prop_assert_eq!(stock, expected);
                    }
                    Err(RepoError::NegativeStock { amount_to_zero, .. }) => {
                        prop_assert_eq!(amount_to_zero, expected);
                        prop_assert!(expected + delta < 0);
                    }
                    Err(other) => prop_assert!(false, "unexpected error: {other}"),
                }
                prop_assert!(repo.get("R1").expect("R1").stock() >= 0);
            }
        }
    }
}
