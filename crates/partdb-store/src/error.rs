//! Storage and repository errors.

use crate::config::SchemaVersion;
use crate::jsonl::JsonlError;
use partdb_kernel::ValidationError;

/// Errors raised by storage drivers.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error(transparent)]
    Jsonl(#[from] JsonlError),

    #[error("{path}: {message}")]
    Io { path: String, message: String },

    #[error("store lock busy: {lock_path}")]
    LockBusy { lock_path: String },

    #[error("failed to acquire store lock {lock_path}: {message}")]
    LockIo { lock_path: String, message: String },

    #[error("duplicate ipn in stored parts: {0}")]
    DuplicateIpn(String),

    #[error("store holds per-type tables (schema {0}); parts need schema 0.7 or later")]
    LegacyModel(String),

    #[error("invalid store config: {0}")]
    Config(String),

    #[error("backup error: {0}")]
    Backup(String),

    #[error("failed to encode store image: {0}")]
    Encode(#[source] serde_json::Error),
}

impl StoreError {
    pub(crate) fn io(path: &std::path::Path, error: impl std::fmt::Display) -> Self {
        Self::Io {
            path: path.display().to_string(),
            message: error.to_string(),
        }
    }
}

/// Errors raised by [`PartRepository`](crate::PartRepository) operations.
#[derive(Debug, thiserror::Error)]
pub enum RepoError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("a part with IPN `{0}` already exists")]
    DuplicateIpn(String),

    #[error("not enough stock of `{ipn}`; at most {amount_to_zero} can be removed")]
    NegativeStock { ipn: String, amount_to_zero: i64 },

    #[error("stock of `{ipn}` would overflow")]
    StockOverflow { ipn: String },

    #[error("no part with IPN `{0}`")]
    UnknownIpn(String),

    #[error("PCB `{board_name}` rev {rev} already exists")]
    DuplicatePcb { board_name: String, rev: String },

    #[error("no PCB `{board_name}` rev {rev}")]
    UnknownPcb { board_name: String, rev: String },

    #[error("PCB `{board_name}` rev {rev}: {reason}")]
    InvalidPcb {
        board_name: String,
        rev: String,
        reason: String,
    },

    #[error("user `{0}` already exists")]
    DuplicateUser(String),

    #[error("no user named `{0}`")]
    UnknownUser(String),

    #[error("store schema is {found}, this build expects {expected}; run `partdb migrate`")]
    MigrationRequired {
        found: String,
        expected: SchemaVersion,
    },

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl RepoError {
    /// A field or clause was rejected; the caller can fix it and retry.
    pub fn is_validation(&self) -> bool {
        matches!(self, Self::Validation(_) | Self::InvalidPcb { .. })
    }

    /// The request clashes with stored state; the caller decides what next.
    pub fn is_conflict(&self) -> bool {
        matches!(
            self,
            Self::DuplicateIpn(_)
                | Self::DuplicatePcb { .. }
                | Self::DuplicateUser(_)
                | Self::NegativeStock { .. }
                | Self::StockOverflow { .. }
        )
    }

    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            Self::UnknownIpn(_) | Self::UnknownPcb { .. } | Self::UnknownUser(_)
        )
    }
}
