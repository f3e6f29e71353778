//! Schema migrations for partdb stores.
//!
//! Stores written by older releases keep one table per part type and a
//! `pcbs` table. The [`SchemaMigrator`] walks a chain of [`MigrationStep`]s
//! from the recorded `db_ver` to the current schema, under the store lock
//! and behind a backup that is restored if any step fails.

pub mod error;
pub mod legacy;
pub mod migrator;
pub mod steps;

pub use error::MigrationError;
pub use legacy::{
    GENERIC_COLUMNS, LEGACY_TABLES, LegacyColumn, LegacyTable, PCB_COLUMNS, PCB_TABLE, legacy_table,
};
pub use migrator::{AppliedStep, IncompletePart, MigrationReport, SchemaMigrator};
pub use steps::{MigrationStep, StepError, builtin_chain, missing_required};
