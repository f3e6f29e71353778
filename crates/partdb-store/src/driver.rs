//! The storage driver seam.
//!
//! A driver persists one store: its config table and its data. The
//! repository and the migrator only ever talk to a `StorageDriver`, so the
//! same code runs against the on-disk JSONL layout and the in-memory
//! driver used by tests.

use crate::assembly::{Pcb, User};
use crate::config::{ConfigTable, DB_VERSION_KEY, DOCUMENT_MODEL_SINCE};
use crate::error::StoreError;
use crate::image::{DocumentSet, StoreImage, StoreModel};
use crate::memory::PartStore;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// Handle to a full copy of a store, returned by [`StorageDriver::backup`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Backup {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<PathBuf>,
    pub digest: String,
}

/// Exclusive access to a store, released on drop.
pub struct StoreLock {
    release: Option<Box<dyn FnOnce() + Send>>,
}

impl StoreLock {
    pub fn new(release: impl FnOnce() + Send + 'static) -> Self {
        Self {
            release: Some(Box::new(release)),
        }
    }
}

impl std::fmt::Debug for StoreLock {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StoreLock")
            .field("held", &self.release.is_some())
            .finish()
    }
}

impl Drop for StoreLock {
    fn drop(&mut self) {
        if let Some(release) = self.release.take() {
            release();
        }
    }
}

pub trait StorageDriver {
    fn read_config(&self) -> Result<ConfigTable, StoreError>;

    fn write_config(&self, config: &ConfigTable) -> Result<(), StoreError>;

    /// Config plus data in the model its `db_ver` names.
    fn read_image(&self) -> Result<StoreImage, StoreError>;

    /// Replace the whole store. New data and then the config are written
    /// before the previous model's files go, so a failure at any point
    /// leaves a `db_ver` that matches readable data.
    fn write_image(&self, image: &StoreImage) -> Result<(), StoreError>;

    /// Part documents. Fails with `LegacyModel` on a per-table store.
    fn read_parts(&self) -> Result<PartStore, StoreError>;

    fn write_parts(&self, store: &PartStore) -> Result<(), StoreError>;

    /// PCB documents. Fails with `LegacyModel` on a per-table store.
    fn read_pcbs(&self) -> Result<Vec<Pcb>, StoreError>;

    fn write_pcbs(&self, pcbs: &[Pcb]) -> Result<(), StoreError>;

    /// User documents. Fails with `LegacyModel` on a per-table store.
    fn read_users(&self) -> Result<Vec<User>, StoreError>;

    fn write_users(&self, users: &[User]) -> Result<(), StoreError>;

    fn backup(&self) -> Result<Backup, StoreError>;

    fn restore(&self, backup: &Backup) -> Result<(), StoreError>;

    /// Take the store's exclusive lock without waiting.
    fn lock(&self) -> Result<StoreLock, StoreError>;

    /// Execute one lock-scoped mutation of the part documents.
    ///
    /// The mutator returns `(value, changed)`; `changed=true` persists the
    /// store before the lock is released. An error leaves the store as it
    /// was.
    fn transact<T, E, F>(&self, mutator: F) -> Result<T, E>
    where
        Self: Sized,
        E: From<StoreError>,
        F: FnOnce(&mut PartStore) -> Result<(T, bool), E>,
    {
        let _lock = self.lock()?;
        let mut store = self.read_parts()?;
        let (value, changed) = mutator(&mut store)?;
        if changed {
            self.write_parts(&store)?;
        }
        Ok(value)
    }
}

impl<D: StorageDriver + ?Sized> StorageDriver for &D {
    fn read_config(&self) -> Result<ConfigTable, StoreError> {
        (**self).read_config()
    }

    fn write_config(&self, config: &ConfigTable) -> Result<(), StoreError> {
        (**self).write_config(config)
    }

    fn read_image(&self) -> Result<StoreImage, StoreError> {
        (**self).read_image()
    }

    fn write_image(&self, image: &StoreImage) -> Result<(), StoreError> {
        (**self).write_image(image)
    }

    fn read_parts(&self) -> Result<PartStore, StoreError> {
        (**self).read_parts()
    }

    fn write_parts(&self, store: &PartStore) -> Result<(), StoreError> {
        (**self).write_parts(store)
    }

    fn read_pcbs(&self) -> Result<Vec<Pcb>, StoreError> {
        (**self).read_pcbs()
    }

    fn write_pcbs(&self, pcbs: &[Pcb]) -> Result<(), StoreError> {
        (**self).write_pcbs(pcbs)
    }

    fn read_users(&self) -> Result<Vec<User>, StoreError> {
        (**self).read_users()
    }

    fn write_users(&self, users: &[User]) -> Result<(), StoreError> {
        (**self).write_users(users)
    }

    fn backup(&self) -> Result<Backup, StoreError> {
        (**self).backup()
    }

    fn restore(&self, backup: &Backup) -> Result<(), StoreError> {
        (**self).restore(backup)
    }

    fn lock(&self) -> Result<StoreLock, StoreError> {
        (**self).lock()
    }
}

/// A store held entirely in memory.
#[derive(Debug)]
pub struct MemoryDriver {
    image: Mutex<StoreImage>,
    backups: Mutex<BTreeMap<String, StoreImage>>,
    locked: Arc<AtomicBool>,
}

impl Default for MemoryDriver {
    fn default() -> Self {
        Self::new(StoreImage {
            config: ConfigTable::default(),
            model: StoreModel::Documents(DocumentSet::default()),
        })
    }
}

impl MemoryDriver {
    pub fn new(image: StoreImage) -> Self {
        Self {
            image: Mutex::new(image),
            backups: Mutex::new(BTreeMap::new()),
            locked: Arc::new(AtomicBool::new(false)),
        }
    }

    /// A copy of the current image.
    pub fn snapshot(&self) -> StoreImage {
        self.image().clone()
    }

    pub fn backup_count(&self) -> usize {
        lock_ignoring_poison(&self.backups).len()
    }

    fn image(&self) -> MutexGuard<'_, StoreImage> {
        lock_ignoring_poison(&self.image)
    }

    /// Read from the document collections, or fail on a per-table store.
    fn with_documents<T>(&self, read: impl FnOnce(&DocumentSet) -> T) -> Result<T, StoreError> {
        let image = self.image();
        match &image.model {
            StoreModel::Documents(documents) => Ok(read(documents)),
            StoreModel::Tables(_) => Err(StoreError::LegacyModel(
                image
                    .config
                    .get(DB_VERSION_KEY)
                    .map_or_else(|| format!("< {DOCUMENT_MODEL_SINCE}"), str::to_string),
            )),
        }
    }

    /// Edit the document collections, replacing a per-table model.
    fn edit_documents(&self, edit: impl FnOnce(&mut DocumentSet)) {
        let mut image = self.image();
        if matches!(image.model, StoreModel::Tables(_)) {
            image.model = StoreModel::Documents(DocumentSet::default());
        }
        if let StoreModel::Documents(documents) = &mut image.model {
            edit(documents);
        }
    }
}

fn lock_ignoring_poison<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl StorageDriver for MemoryDriver {
    fn read_config(&self) -> Result<ConfigTable, StoreError> {
        Ok(self.image().config.clone())
    }

    fn write_config(&self, config: &ConfigTable) -> Result<(), StoreError> {
        self.image().config = config.clone();
        Ok(())
    }

    fn read_image(&self) -> Result<StoreImage, StoreError> {
        Ok(self.snapshot())
    }

    fn write_image(&self, image: &StoreImage) -> Result<(), StoreError> {
        *self.image() = image.clone();
        Ok(())
    }

    fn read_parts(&self) -> Result<PartStore, StoreError> {
        let parts = self.with_documents(|documents| documents.parts.clone())?;
        PartStore::from_records(parts)
    }

    fn write_parts(&self, store: &PartStore) -> Result<(), StoreError> {
        let parts = store.clone().into_records();
        self.edit_documents(|documents| documents.parts = parts);
        Ok(())
    }

    fn read_pcbs(&self) -> Result<Vec<Pcb>, StoreError> {
        self.with_documents(|documents| documents.pcbs.clone())
    }

    fn write_pcbs(&self, pcbs: &[Pcb]) -> Result<(), StoreError> {
        self.edit_documents(|documents| documents.pcbs = pcbs.to_vec());
        Ok(())
    }

    fn read_users(&self) -> Result<Vec<User>, StoreError> {
        self.with_documents(|documents| documents.users.clone())
    }

    fn write_users(&self, users: &[User]) -> Result<(), StoreError> {
        self.edit_documents(|documents| documents.users = users.to_vec());
        Ok(())
    }

    fn backup(&self) -> Result<Backup, StoreError> {
        let image = self.snapshot();
        let digest = image.digest()?;
        let mut backups = lock_ignoring_poison(&self.backups);
        let id = format!("mem-{}", backups.len() + 1);
        backups.insert(id.clone(), image);
        Ok(Backup {
            id,
            location: None,
            digest,
        })
    }

    fn restore(&self, backup: &Backup) -> Result<(), StoreError> {
        let saved = lock_ignoring_poison(&self.backups)
            .get(&backup.id)
            .cloned()
            .ok_or_else(|| StoreError::Backup(format!("unknown backup {}", backup.id)))?;
        if saved.digest()? != backup.digest {
            return Err(StoreError::Backup(format!(
                "backup {} does not match its digest",
                backup.id
            )));
        }
        *self.image() = saved;
        Ok(())
    }

    fn lock(&self) -> Result<StoreLock, StoreError> {
        if self
            .locked
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return Err(StoreError::LockBusy {
                lock_path: "<memory>".to_string(),
            });
        }
        let locked = Arc::clone(&self.locked);
        Ok(StoreLock::new(move || locked.store(false, Ordering::Release)))
    }
}
