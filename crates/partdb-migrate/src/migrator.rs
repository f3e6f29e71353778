//! Stepwise, backup-guarded schema migration.
//!
//! The migrator holds the store lock for the whole run, backs the store up
//! once, then applies each step and persists its output with `db_ver`
//! advanced to the step's target. Any failure restores the backup, so the
//! store ends either fully migrated or exactly as it started.

use crate::error::MigrationError;
use crate::steps::{MigrationStep, builtin_chain, missing_required};
use partdb_kernel::builtin_registry;
use partdb_store::{Backup, SchemaVersion, StorageDriver, StoreImage, StoreModel};
use serde::Serialize;
use tracing::{info, warn};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AppliedStep {
    pub from: SchemaVersion,
    pub to: SchemaVersion,
    pub description: String,
}

/// A migrated part that still lacks required fields.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IncompletePart {
    pub ipn: String,
    pub missing: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MigrationReport {
    pub from: SchemaVersion,
    pub to: SchemaVersion,
    pub applied: Vec<AppliedStep>,
    pub backup: Option<Backup>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub incomplete: Vec<IncompletePart>,
}

impl MigrationReport {
    fn noop(version: SchemaVersion) -> Self {
        Self {
            from: version,
            to: version,
            applied: Vec::new(),
            backup: None,
            incomplete: Vec::new(),
        }
    }

    pub fn is_noop(&self) -> bool {
        self.applied.is_empty()
    }
}

fn incomplete_parts(image: &StoreImage) -> Vec<IncompletePart> {
    let StoreModel::Documents(documents) = &image.model else {
        return Vec::new();
    };
    documents
        .parts
        .iter()
        .filter_map(|part| {
            let missing = missing_required(part, builtin_registry());
            (!missing.is_empty()).then(|| IncompletePart {
                ipn: part.ipn.clone(),
                missing,
            })
        })
        .collect()
}

pub struct SchemaMigrator<D> {
    driver: D,
    steps: Vec<MigrationStep>,
}

impl<D: StorageDriver> SchemaMigrator<D> {
    pub fn new(driver: D) -> Self {
        Self::with_steps(driver, builtin_chain())
    }

    pub fn with_steps(driver: D, steps: Vec<MigrationStep>) -> Self {
        Self { driver, steps }
    }

    pub fn driver(&self) -> &D {
        &self.driver
    }

    pub fn steps(&self) -> &[MigrationStep] {
        &self.steps
    }

    /// The schema version recorded in `db_ver`.
    ///
    /// `None` for an empty store that was never stamped. A store with data
    /// but no version is an error.
    pub fn current_version(&self) -> Result<Option<SchemaVersion>, MigrationError> {
        let image = self.driver.read_image()?;
        Self::version_of(&image)
    }

    fn version_of(image: &StoreImage) -> Result<Option<SchemaVersion>, MigrationError> {
        match image.config.db_version()? {
            Some(version) => Ok(Some(version)),
            None if image.model.is_empty() => Ok(None),
            None => Err(MigrationError::VersionMissing),
        }
    }

    /// Whether `migrate(expected)` would run any step. An unstamped empty
    /// store only needs its version written.
    pub fn needs_migration(&self, expected: SchemaVersion) -> Result<bool, MigrationError> {
        Ok(self
            .current_version()?
            .is_some_and(|version| version != expected))
    }

    /// The contiguous run of steps leading from `from` to `to`.
    pub fn plan(
        &self,
        from: SchemaVersion,
        to: SchemaVersion,
    ) -> Result<Vec<&MigrationStep>, MigrationError> {
        if from > to {
            return Err(MigrationError::Downgrade { from, to });
        }
        let mut plan = Vec::new();
        let mut at = from;
        while at != to {
            let step = self
                .steps
                .iter()
                .find(|step| step.from == at && step.to <= to)
                .ok_or(MigrationError::NoPath { from, to })?;
            plan.push(step);
            at = step.to;
        }
        Ok(plan)
    }

    pub fn migrate(&self, expected: SchemaVersion) -> Result<MigrationReport, MigrationError> {
        let _lock = self.driver.lock()?;
        let image = self.driver.read_image()?;
        let Some(from) = Self::version_of(&image)? else {
            let mut stamped = image;
            stamped.config.set_db_version(expected);
            self.driver.write_config(&stamped.config)?;
            info!(version = %expected, "stamped empty store");
            return Ok(MigrationReport::noop(expected));
        };
        if from == expected {
            return Ok(MigrationReport::noop(expected));
        }

        let plan = self.plan(from, expected)?;
        let backup = self.driver.backup().map_err(MigrationError::BackupFailed)?;
        info!(%from, to = %expected, backup = %backup.id, steps = plan.len(), "migrating store");

        let mut current = image;
        let mut applied = Vec::with_capacity(plan.len());
        for step in plan {
            match self.run_step(step, current) {
                Ok(next) => current = next,
                Err(reason) => return Err(self.roll_back(&backup, step, reason)),
            }
            info!(from = %step.from, to = %step.to, "applied migration step");
            applied.push(AppliedStep {
                from: step.from,
                to: step.to,
                description: step.description.to_string(),
            });
        }

        let incomplete = incomplete_parts(&current);
        if !incomplete.is_empty() {
            warn!(count = incomplete.len(), "migrated parts lack required fields");
        }
        Ok(MigrationReport {
            from,
            to: expected,
            applied,
            backup: Some(backup),
            incomplete,
        })
    }

    fn run_step(&self, step: &MigrationStep, image: StoreImage) -> Result<StoreImage, String> {
        let mut next = (step.apply)(image).map_err(|e| e.to_string())?;
        next.config.set_db_version(step.to);
        self.driver.write_image(&next).map_err(|e| e.to_string())?;
        Ok(next)
    }

    fn roll_back(&self, backup: &Backup, step: &MigrationStep, reason: String) -> MigrationError {
        warn!(from = %step.from, to = %step.to, %reason, backup = %backup.id, "migration step failed, restoring backup");
        match self.driver.restore(backup) {
            Ok(()) => MigrationError::StepFailed {
                from: step.from,
                to: step.to,
                reason,
            },
            Err(rollback) => MigrationError::RollbackFailed {
                from: step.from,
                to: step.to,
                reason,
                rollback: rollback.to_string(),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::steps::StepError;
    use partdb_store::{CURRENT_SCHEMA_VERSION, ConfigTable, MemoryDriver, PartRecord, Pcb, StoreError};
    use serde_json::{Value, json};
    use std::collections::BTreeMap;
    use std::sync::{Arc, Mutex};

    const fn v(minor: u32) -> SchemaVersion {
        SchemaVersion::new(0, minor, 0)
    }

    fn tables_at(version: SchemaVersion, rows: Vec<(&str, Value)>) -> StoreImage {
        let mut config = ConfigTable::default();
        config.set_db_version(version);
        let mut tables: BTreeMap<String, Vec<_>> = BTreeMap::new();
        for (table, row) in rows {
            let Value::Object(row) = row else {
                panic!("rows are objects");
            };
            tables.entry(table.to_string()).or_default().push(row);
        }
        StoreImage {
            config,
            model: StoreModel::Tables(tables),
        }
    }

    fn recording_step(
        from: SchemaVersion,
        to: SchemaVersion,
        log: &Arc<Mutex<Vec<String>>>,
        fail: bool,
    ) -> MigrationStep {
        let log = Arc::clone(log);
        MigrationStep::new(from, to, "recorded", move |image| {
            log.lock().expect("log mutex").push(format!("{from}->{to}"));
            if fail {
                Err(StepError::Rejected("boom".to_string()))
            } else {
                Ok(image)
            }
        })
    }

    #[test]
    fn steps_run_in_order_and_stamp_each_version() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let driver = MemoryDriver::new(tables_at(v(3), vec![("ic", json!({"mfr_part_numb": "U1"}))]));
        let migrator = SchemaMigrator::with_steps(
            &driver,
            vec![
                recording_step(v(4), v(5), &log, false),
                recording_step(v(3), v(4), &log, false),
            ],
        );

        let report = migrator.migrate(v(5)).expect("migration should succeed");
        assert_eq!(report.from, v(3));
        assert_eq!(report.to, v(5));
        assert_eq!(report.applied.len(), 2);
        assert!(report.backup.is_some());
        assert_eq!(*log.lock().expect("log mutex"), vec!["0.3->0.4", "0.4->0.5"]);
        assert_eq!(driver.snapshot().config.db_version(), Ok(Some(v(5))));
        assert_eq!(driver.backup_count(), 1);
    }

    #[test]
    fn current_version_reports_only_the_recorded_marker() {
        let empty = MemoryDriver::default();
        assert!(matches!(SchemaMigrator::new(&empty).current_version(), Ok(None)));

        let stamped = MemoryDriver::new(tables_at(v(4), Vec::new()));
        assert!(matches!(
            SchemaMigrator::new(&stamped).current_version(),
            Ok(Some(version)) if version == v(4)
        ));

        let mut unversioned = tables_at(v(6), vec![("ic", json!({"mfr_part_numb": "U1"}))]);
        unversioned.config = ConfigTable::default();
        let unversioned = MemoryDriver::new(unversioned);
        assert!(matches!(
            SchemaMigrator::new(&unversioned).current_version(),
            Err(MigrationError::VersionMissing)
        ));
    }

    #[test]
    fn current_store_is_a_noop_without_backup() {
        let driver = MemoryDriver::default();
        let migrator = SchemaMigrator::new(&driver);
        assert!(!migrator.needs_migration(CURRENT_SCHEMA_VERSION).expect("empty store"));

        let report = migrator.migrate(CURRENT_SCHEMA_VERSION).expect("noop");
        assert!(report.is_noop());
        assert_eq!(report.backup, None);
        assert_eq!(driver.backup_count(), 0);
        assert_eq!(
            driver.snapshot().config.db_version(),
            Ok(Some(CURRENT_SCHEMA_VERSION))
        );
        assert!(matches!(
            migrator.current_version(),
            Ok(Some(version)) if version == CURRENT_SCHEMA_VERSION
        ));
    }

    #[test]
    fn failed_step_restores_the_starting_image() {
        // The second row has no part number, which 0.4 -> 0.5 rejects.
        let start = tables_at(
            v(2),
            vec![
                ("ic", json!({"id": 1, "mfr_part_numb": "U1", "stock": 3, "user_comments": "x"})),
                ("ic", json!({"id": 2, "stock": 1})),
            ],
        );
        let driver = MemoryDriver::new(start.clone());
        let err = SchemaMigrator::new(&driver)
            .migrate(CURRENT_SCHEMA_VERSION)
            .expect_err("bad row should abort");

        match err {
            MigrationError::StepFailed { from, to, reason } => {
                assert_eq!((from, to), (v(4), v(5)));
                assert!(reason.contains("mfr_part_numb"), "{reason}");
            }
            other => panic!("unexpected error: {other}"),
        }
        assert_eq!(driver.snapshot(), start);
    }

    #[test]
    fn downgrades_and_gaps_are_refused() {
        let driver = MemoryDriver::new(tables_at(v(6), Vec::new()));
        let migrator = SchemaMigrator::new(&driver);
        assert!(matches!(
            migrator.migrate(v(4)),
            Err(MigrationError::Downgrade { .. })
        ));
        assert!(matches!(
            migrator.plan(v(1), v(7)),
            Err(MigrationError::NoPath { .. })
        ));
        assert_eq!(migrator.plan(v(2), v(7)).expect("full chain").len(), 5);
    }

    #[test]
    fn data_without_a_version_is_refused() {
        let mut image = tables_at(v(6), vec![("ic", json!({"mfr_part_numb": "U1"}))]);
        image.config = ConfigTable::default();
        let driver = MemoryDriver::new(image);
        assert!(matches!(
            SchemaMigrator::new(&driver).migrate(CURRENT_SCHEMA_VERSION),
            Err(MigrationError::VersionMissing)
        ));
    }

    #[test]
    fn busy_lock_aborts_before_touching_the_store() {
        let driver = MemoryDriver::new(tables_at(v(6), Vec::new()));
        let _held = driver.lock().expect("first lock");
        assert!(matches!(
            SchemaMigrator::new(&driver).migrate(CURRENT_SCHEMA_VERSION),
            Err(MigrationError::Store(StoreError::LockBusy { .. }))
        ));
        assert_eq!(driver.backup_count(), 0);
    }

    #[test]
    fn full_chain_from_zero_two() {
        let driver = MemoryDriver::new(tables_at(
            v(2),
            vec![
                (
                    "resistance",
                    json!({"id": 1, "mfr_part_numb": "RC0603-10K", "stock": 50, "resistance": 10000.0,
                           "tolerance": 1.0, "user_comments": "reel", "part_comments": "gone"}),
                ),
                (
                    "capacitor",
                    json!({"id": 1, "mfr_part_numb": "GRM188", "stock": 20, "capacitance": 1e-7, "power": 0.1}),
                ),
            ],
        ));
        let report = SchemaMigrator::new(&driver)
            .migrate(CURRENT_SCHEMA_VERSION)
            .expect("chain should apply");
        assert_eq!(report.applied.len(), 5);

        let image = driver.snapshot();
        assert_eq!(image.config.db_version(), Ok(Some(CURRENT_SCHEMA_VERSION)));
        let StoreModel::Documents(documents) = image.model else {
            panic!("0.7 stores hold documents");
        };
        assert_eq!(
            report.incomplete,
            vec![
                IncompletePart {
                    ipn: "GRM188".to_string(),
                    missing: vec!["package".to_string()],
                },
                IncompletePart {
                    ipn: "RC0603-10K".to_string(),
                    missing: vec!["package".to_string()],
                },
            ]
        );
        assert_eq!(
            documents.parts,
            vec![
                PartRecord::new("GRM188", "capacitor")
                    .with("mfr_part_numb", "GRM188")
                    .with("stock", 20_i64)
                    .with("capacitance", 1e-7),
                PartRecord::new("RC0603-10K", "resistor")
                    .with("mfr_part_numb", "RC0603-10K")
                    .with("stock", 50_i64)
                    .with("comments", "reel")
                    .with("resistance", 10000.0)
                    .with("tolerance", 1.0),
            ]
        );
    }

    #[test]
    fn legacy_pcbs_migrate_alongside_parts() {
        let driver = MemoryDriver::new(tables_at(
            v(2),
            vec![
                ("resistance", json!({"mfr_part_numb": "R1"})),
                ("pcbs", json!({"project_name": "amp", "rev": "A", "stock": 2})),
            ],
        ));
        let migrator = SchemaMigrator::new(&driver);
        assert!(migrator.needs_migration(CURRENT_SCHEMA_VERSION).expect("versioned store"));

        let report = migrator
            .migrate(CURRENT_SCHEMA_VERSION)
            .expect("a pcbs table must not block the chain");
        assert_eq!(report.to, CURRENT_SCHEMA_VERSION);
        assert!(matches!(
            migrator.current_version(),
            Ok(Some(version)) if version == CURRENT_SCHEMA_VERSION
        ));

        let StoreModel::Documents(documents) = driver.snapshot().model else {
            panic!("0.7 stores hold documents");
        };
        assert_eq!(documents.pcbs, vec![Pcb::new("amp", "A", 2)]);
        let ipns: Vec<&str> = documents.parts.iter().map(|part| part.ipn.as_str()).collect();
        assert_eq!(ipns, vec!["R1"]);
    }
}
