//! On-disk JSONL store.
//!
//! ```text
//! <root>/
//!   config.jsonl          {"key":"db_ver","val":"0.7"} rows
//!   parts.jsonl           part documents (schema >= 0.7)
//!   pcbs.jsonl            PCB documents (schema >= 0.7)
//!   users.jsonl           user documents (schema >= 0.7)
//!   tables/<table>.jsonl  legacy per-type rows (schema <= 0.6)
//!   backups/<stamp>/      file copies + manifest.json (sha256 per file)
//!   store.lock            exclusive lock while mutating
//! ```

use crate::assembly::{Pcb, User};
use crate::atomic_store::StoreLockGuard;
use crate::config::{ConfigEntry, ConfigTable, DB_VERSION_KEY};
use crate::driver::{Backup, StorageDriver, StoreLock};
use crate::error::StoreError;
use crate::image::{DocumentSet, LegacyRow, StoreImage, StoreModel};
use crate::jsonl::{read_jsonl_from_path, write_bytes_atomic, write_jsonl_to_path};
use crate::memory::PartStore;
use crate::record::PartRecord;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

pub const CONFIG_FILE: &str = "config.jsonl";
pub const PARTS_FILE: &str = "parts.jsonl";
pub const PCBS_FILE: &str = "pcbs.jsonl";
pub const USERS_FILE: &str = "users.jsonl";
/// Document files, in the order they are written.
pub const DOCUMENT_FILES: &[&str] = &[PARTS_FILE, PCBS_FILE, USERS_FILE];
pub const TABLES_DIR: &str = "tables";
pub const BACKUPS_DIR: &str = "backups";
pub const MANIFEST_FILE: &str = "manifest.json";

/// A store directory of JSONL files.
#[derive(Debug, Clone)]
pub struct JsonlDriver {
    root: PathBuf,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct BackupManifest {
    created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    db_version: Option<String>,
    files: BTreeMap<String, String>,
}

impl BackupManifest {
    fn digest(&self) -> String {
        let mut hasher = Sha256::new();
        for (path, digest) in &self.files {
            hasher.update(path.as_bytes());
            hasher.update([0]);
            hasher.update(digest.as_bytes());
            hasher.update([0]);
        }
        format!("{:x}", hasher.finalize())
    }
}

fn sha256_hex(bytes: &[u8]) -> String {
    format!("{:x}", Sha256::digest(bytes))
}

impl JsonlDriver {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Create the store directory if it does not exist yet.
    pub fn ensure_root(&self) -> Result<(), StoreError> {
        fs::create_dir_all(&self.root).map_err(|e| StoreError::io(&self.root, e))
    }

    fn config_path(&self) -> PathBuf {
        self.root.join(CONFIG_FILE)
    }

    fn parts_path(&self) -> PathBuf {
        self.root.join(PARTS_FILE)
    }

    fn pcbs_path(&self) -> PathBuf {
        self.root.join(PCBS_FILE)
    }

    fn users_path(&self) -> PathBuf {
        self.root.join(USERS_FILE)
    }

    fn tables_dir(&self) -> PathBuf {
        self.root.join(TABLES_DIR)
    }

    fn backups_dir(&self) -> PathBuf {
        self.root.join(BACKUPS_DIR)
    }

    fn read_tables(&self) -> Result<BTreeMap<String, Vec<LegacyRow>>, StoreError> {
        let dir = self.tables_dir();
        let mut tables = BTreeMap::new();
        if !dir.exists() {
            return Ok(tables);
        }
        for path in jsonl_files(&dir)? {
            let Some(table) = path.file_stem().and_then(|s| s.to_str()) else {
                continue;
            };
            let rows: Vec<LegacyRow> = read_jsonl_from_path(&path)?;
            tables.insert(table.to_string(), rows);
        }
        Ok(tables)
    }

    fn write_tables(&self, tables: &BTreeMap<String, Vec<LegacyRow>>) -> Result<(), StoreError> {
        let dir = self.tables_dir();
        fs::create_dir_all(&dir).map_err(|e| StoreError::io(&dir, e))?;
        for (table, rows) in tables {
            write_jsonl_to_path(dir.join(format!("{table}.jsonl")), rows)?;
        }
        for path in jsonl_files(&dir)? {
            let stale = path
                .file_stem()
                .and_then(|s| s.to_str())
                .is_none_or(|table| !tables.contains_key(table));
            if stale {
                fs::remove_file(&path).map_err(|e| StoreError::io(&path, e))?;
            }
        }
        Ok(())
    }

    /// Store files that currently exist, relative to the root. The config
    /// file comes last.
    fn data_files(&self) -> Result<Vec<String>, StoreError> {
        let mut files: Vec<String> = DOCUMENT_FILES
            .iter()
            .filter(|name| self.root.join(name).exists())
            .map(|name| name.to_string())
            .collect();
        let tables = self.tables_dir();
        if tables.exists() {
            for path in jsonl_files(&tables)? {
                if let Some(name) = path.file_name().and_then(|s| s.to_str()) {
                    files.push(format!("{TABLES_DIR}/{name}"));
                }
            }
        }
        if self.config_path().exists() {
            files.push(CONFIG_FILE.to_string());
        }
        Ok(files)
    }

    fn clear_data(&self) -> Result<(), StoreError> {
        self.remove_files(&[CONFIG_FILE])?;
        self.remove_documents()?;
        self.remove_tables()
    }

    fn remove_files(&self, names: &[&str]) -> Result<(), StoreError> {
        for name in names {
            let path = self.root.join(name);
            if path.exists() {
                fs::remove_file(&path).map_err(|e| StoreError::io(&path, e))?;
            }
        }
        Ok(())
    }

    fn remove_documents(&self) -> Result<(), StoreError> {
        self.remove_files(DOCUMENT_FILES)
    }

    fn remove_tables(&self) -> Result<(), StoreError> {
        let tables = self.tables_dir();
        if tables.exists() {
            fs::remove_dir_all(&tables).map_err(|e| StoreError::io(&tables, e))?;
        }
        Ok(())
    }

    /// Documents are read only once no legacy tables hold the data.
    fn require_documents(&self, path: &Path) -> Result<bool, StoreError> {
        if path.exists() {
            return Ok(true);
        }
        if self.tables_dir().exists() {
            let config = self.read_config()?;
            let found = config.get(DB_VERSION_KEY).unwrap_or("unversioned");
            return Err(StoreError::LegacyModel(found.to_string()));
        }
        Ok(false)
    }

    fn unique_backup_dir(&self) -> (String, PathBuf) {
        let stamp = Utc::now().format("%Y%m%dT%H%M%S%.6fZ").to_string();
        let mut id = stamp.clone();
        let mut suffix = 1;
        while self.backups_dir().join(&id).exists() {
            suffix += 1;
            id = format!("{stamp}-{suffix}");
        }
        let dir = self.backups_dir().join(&id);
        (id, dir)
    }
}

fn jsonl_files(dir: &Path) -> Result<Vec<PathBuf>, StoreError> {
    let entries = fs::read_dir(dir).map_err(|e| StoreError::io(dir, e))?;
    let mut files = Vec::new();
    for entry in entries {
        let path = entry.map_err(|e| StoreError::io(dir, e))?.path();
        if path.extension().is_some_and(|ext| ext == "jsonl") {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}

impl StorageDriver for JsonlDriver {
    fn read_config(&self) -> Result<ConfigTable, StoreError> {
        let path = self.config_path();
        if !path.exists() {
            return Ok(ConfigTable::default());
        }
        let entries: Vec<ConfigEntry> = read_jsonl_from_path(&path)?;
        Ok(ConfigTable::from_entries(entries))
    }

    fn write_config(&self, config: &ConfigTable) -> Result<(), StoreError> {
        write_jsonl_to_path(self.config_path(), &config.to_entries())?;
        Ok(())
    }

    fn read_image(&self) -> Result<StoreImage, StoreError> {
        let config = self.read_config()?;
        let version = config
            .db_version()
            .map_err(|e| StoreError::Config(e.to_string()))?;
        let documents = match version {
            Some(version) => version.uses_documents(),
            None => !self.tables_dir().exists(),
        };
        let model = if documents {
            StoreModel::Documents(DocumentSet {
                parts: self.read_parts()?.into_records(),
                pcbs: self.read_pcbs()?,
                users: self.read_users()?,
            })
        } else {
            StoreModel::Tables(self.read_tables()?)
        };
        Ok(StoreImage { config, model })
    }

    fn write_image(&self, image: &StoreImage) -> Result<(), StoreError> {
        match &image.model {
            StoreModel::Documents(documents) => {
                write_jsonl_to_path(self.parts_path(), &documents.parts)?;
                write_jsonl_to_path(self.pcbs_path(), &documents.pcbs)?;
                write_jsonl_to_path(self.users_path(), &documents.users)?;
                self.write_config(&image.config)?;
                self.remove_tables()?;
            }
            StoreModel::Tables(tables) => {
                self.write_tables(tables)?;
                self.write_config(&image.config)?;
                self.remove_documents()?;
            }
        }
        debug!(model = image.model.kind(), rows = image.model.row_count(), "store image written");
        Ok(())
    }

    fn read_parts(&self) -> Result<PartStore, StoreError> {
        let path = self.parts_path();
        if !self.require_documents(&path)? {
            return Ok(PartStore::default());
        }
        let records: Vec<PartRecord> = read_jsonl_from_path(&path)?;
        PartStore::from_records(records)
    }

    fn write_parts(&self, store: &PartStore) -> Result<(), StoreError> {
        let records: Vec<&PartRecord> = store.records().collect();
        write_jsonl_to_path(self.parts_path(), &records)?;
        debug!(parts = records.len(), path = %self.parts_path().display(), "parts written");
        Ok(())
    }

    fn read_pcbs(&self) -> Result<Vec<Pcb>, StoreError> {
        let path = self.pcbs_path();
        if !self.require_documents(&path)? {
            return Ok(Vec::new());
        }
        Ok(read_jsonl_from_path(&path)?)
    }

    fn write_pcbs(&self, pcbs: &[Pcb]) -> Result<(), StoreError> {
        write_jsonl_to_path(self.pcbs_path(), pcbs)?;
        debug!(pcbs = pcbs.len(), "pcbs written");
        Ok(())
    }

    fn read_users(&self) -> Result<Vec<User>, StoreError> {
        let path = self.users_path();
        if !self.require_documents(&path)? {
            return Ok(Vec::new());
        }
        Ok(read_jsonl_from_path(&path)?)
    }

    fn write_users(&self, users: &[User]) -> Result<(), StoreError> {
        write_jsonl_to_path(self.users_path(), users)?;
        debug!(users = users.len(), "users written");
        Ok(())
    }

    fn backup(&self) -> Result<Backup, StoreError> {
        let (id, dir) = self.unique_backup_dir();
        let mut files = BTreeMap::new();
        for relative in self.data_files()? {
            let source = self.root.join(&relative);
            let bytes = fs::read(&source).map_err(|e| StoreError::io(&source, e))?;
            write_bytes_atomic(dir.join(&relative), &bytes)?;
            files.insert(relative, sha256_hex(&bytes));
        }
        let manifest = BackupManifest {
            created_at: Utc::now(),
            db_version: self.read_config()?.get(DB_VERSION_KEY).map(str::to_string),
            files,
        };
        let bytes = serde_json::to_vec_pretty(&manifest)
            .map_err(|e| StoreError::Backup(e.to_string()))?;
        write_bytes_atomic(dir.join(MANIFEST_FILE), &bytes)?;

        let digest = manifest.digest();
        info!(backup = %id, files = manifest.files.len(), "store backup written");
        Ok(Backup {
            id,
            location: Some(dir),
            digest,
        })
    }

    fn restore(&self, backup: &Backup) -> Result<(), StoreError> {
        let dir = backup
            .location
            .clone()
            .unwrap_or_else(|| self.backups_dir().join(&backup.id));
        let manifest_path = dir.join(MANIFEST_FILE);
        let bytes = fs::read(&manifest_path).map_err(|e| StoreError::io(&manifest_path, e))?;
        let manifest: BackupManifest = serde_json::from_slice(&bytes)
            .map_err(|e| StoreError::Backup(format!("{}: {e}", manifest_path.display())))?;
        if manifest.digest() != backup.digest {
            return Err(StoreError::Backup(format!(
                "backup {} manifest does not match its digest",
                backup.id
            )));
        }

        let mut contents = Vec::with_capacity(manifest.files.len());
        for (relative, digest) in &manifest.files {
            let source = dir.join(relative);
            let bytes = fs::read(&source).map_err(|e| StoreError::io(&source, e))?;
            if &sha256_hex(&bytes) != digest {
                return Err(StoreError::Backup(format!(
                    "backup {}: {relative} is corrupt",
                    backup.id
                )));
            }
            contents.push((relative.clone(), bytes));
        }
        contents.sort_by_key(|(relative, _)| relative == CONFIG_FILE);

        self.clear_data()?;
        for (relative, bytes) in contents {
            write_bytes_atomic(self.root.join(relative), &bytes)?;
        }
        info!(backup = %backup.id, "store restored from backup");
        Ok(())
    }

    fn lock(&self) -> Result<StoreLock, StoreError> {
        let guard = StoreLockGuard::acquire(&self.root)?;
        Ok(StoreLock::new(move || drop(guard)))
    }
}
