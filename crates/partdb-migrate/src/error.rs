use partdb_store::{SchemaVersion, StoreError, VersionParseError};

#[derive(Debug, thiserror::Error)]
pub enum MigrationError {
    #[error("migration {from} -> {to} failed: {reason}; store restored to {from}")]
    StepFailed {
        from: SchemaVersion,
        to: SchemaVersion,
        reason: String,
    },

    #[error("migration {from} -> {to} failed: {reason}; restoring the backup also failed: {rollback}")]
    RollbackFailed {
        from: SchemaVersion,
        to: SchemaVersion,
        reason: String,
        rollback: String,
    },

    #[error("could not back up the store before migrating: {0}")]
    BackupFailed(#[source] StoreError),

    #[error("store has data but no `db_ver`; cannot tell which schema it uses")]
    VersionMissing,

    #[error(transparent)]
    InvalidVersion(#[from] VersionParseError),

    #[error("no migration path from {from} to {to}")]
    NoPath {
        from: SchemaVersion,
        to: SchemaVersion,
    },

    #[error("store schema {from} is newer than {to}; downgrades are not supported")]
    Downgrade {
        from: SchemaVersion,
        to: SchemaVersion,
    },

    #[error(transparent)]
    Store(#[from] StoreError),
}
