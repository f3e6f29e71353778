//! # partdb-store
//!
//! Storage layer for part records.
//!
//! This crate provides:
//! - `PartRecord` (one stocked part, typed by its kind's spec)
//! - JSONL read/write (portable persistence)
//! - `PartStore` (per-type collections plus a global IPN index)
//! - `ConfigTable` and `SchemaVersion` (the persisted `db_ver` marker)
//! - `StorageDriver` with in-memory and on-disk JSONL implementations
//! - `PartRepository` (validated CRUD and stock adjustment)
//! - `Pcb` and `User` documents with board availability checks
//!
//! Schema evolution lives in `partdb-migrate`; this crate only reads and
//! writes whichever storage model the persisted version names.
//!
//! ## Data model
//!
//! ```text
//! store dir (config.jsonl, parts/pcbs/users.jsonl | tables/*.jsonl)
//!     ↕  StorageDriver (lock-scoped, atomic writes)
//! PartStore (type → ipn → record, ipn → type)
//!     ↕  PartRepository (validation against the SpecRegistry)
//! ```

pub mod assembly;
pub mod atomic_store;
pub mod config;
pub mod disk;
pub mod driver;
pub mod error;
pub mod image;
pub mod jsonl;
pub mod memory;
pub mod record;
pub mod repository;

pub use assembly::{BoardAvailability, PartAvailability, PartSelector, Pcb, PcbPart, User};
pub use atomic_store::{StoreLockGuard, lock_path};
pub use config::{
    CURRENT_SCHEMA_VERSION, ConfigEntry, ConfigTable, DB_VERSION_KEY, DOCUMENT_MODEL_SINCE,
    SchemaVersion, VersionParseError,
};
pub use disk::JsonlDriver;
pub use driver::{Backup, MemoryDriver, StorageDriver, StoreLock};
pub use error::{RepoError, StoreError};
pub use image::{DocumentSet, LegacyRow, StoreImage, StoreModel};
pub use jsonl::{JsonlError, read_jsonl, read_jsonl_from_path, write_jsonl, write_jsonl_to_path};
pub use memory::PartStore;
pub use record::PartRecord;
pub use repository::PartRepository;
