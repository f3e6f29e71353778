//! Integration tests: the repository over an on-disk JSONL store.

use partdb_kernel::{CompareOp, FilterClause, TypedValue, builtin_registry};
use partdb_store::{
    CURRENT_SCHEMA_VERSION, JsonlDriver, PartRecord, PartRepository, RepoError, StorageDriver,
    StoreError, StoreLockGuard,
};
use std::fs;
use std::path::PathBuf;
use std::time::{SystemTime, UNIX_EPOCH};

struct TempDirGuard {
    path: PathBuf,
}

impl TempDirGuard {
    fn new(prefix: &str) -> Self {
        let unique = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .expect("clock should be after unix epoch")
            .as_nanos();
        let path = std::env::temp_dir().join(format!(
            "partdb-store-{prefix}-{}-{unique}",
            std::process::id()
        ));
        fs::create_dir_all(&path).expect("temp dir should be created");
        Self { path }
    }
}

impl Drop for TempDirGuard {
    fn drop(&mut self) {
        let _ = fs::remove_dir_all(&self.path);
    }
}

fn capacitor(ipn: &str, farads: f64) -> PartRecord {
    PartRecord::new(ipn, "capacitor")
        .with("stock", 100_i64)
        .with("package", "0603")
        .with("capacitance", farads)
}

#[test]
fn parts_survive_reopen() {
    let tmp = TempDirGuard::new("reopen");
    {
        let repo = PartRepository::open(builtin_registry(), JsonlDriver::new(&tmp.path))
            .expect("fresh store should open");
        repo.add("capacitor", capacitor("C-100n", 100e-9))
            .expect("add should succeed");
        repo.adjust_stock("C-100n", -40).expect("take 40");
    }

    let driver = JsonlDriver::new(&tmp.path);
    assert_eq!(
        driver.read_config().expect("config").db_version(),
        Ok(Some(CURRENT_SCHEMA_VERSION))
    );
    let repo = PartRepository::open(builtin_registry(), driver).expect("reopen");
    let part = repo.get("C-100n").expect("part should persist");
    assert_eq!(part.stock(), 60);
    assert_eq!(part.get("capacitance"), Some(&TypedValue::Float(100e-9)));

    let lines = fs::read_to_string(tmp.path.join("parts.jsonl")).expect("parts file");
    assert!(lines.contains("\"type\":\"capacitor\""));
}

#[test]
fn mutations_fail_fast_while_store_is_locked() {
    let tmp = TempDirGuard::new("locked");
    let repo = PartRepository::open(builtin_registry(), JsonlDriver::new(&tmp.path))
        .expect("fresh store should open");
    repo.add("capacitor", capacitor("C1", 1e-6)).expect("add");

    let held = StoreLockGuard::acquire(&tmp.path).expect("external lock");
    let err = repo.adjust_stock("C1", 1).expect_err("lock is held");
    assert!(matches!(err, RepoError::Store(StoreError::LockBusy { .. })));

    // Reads do not need the lock.
    assert_eq!(repo.get("C1").expect("read while locked").stock(), 100);

    drop(held);
    assert_eq!(repo.adjust_stock("C1", 1).expect("lock released"), 101);
}

#[test]
fn filtered_listing_reads_from_disk() {
    let tmp = TempDirGuard::new("list");
    let repo = PartRepository::open(builtin_registry(), JsonlDriver::new(&tmp.path))
        .expect("fresh store should open");
    repo.add("capacitor", capacitor("C1", 1e-6)).expect("C1");
    repo.add("capacitor", capacitor("C2", 10e-6)).expect("C2");
    repo.add("capacitor", capacitor("C3", 100e-9)).expect("C3");

    let clauses = [FilterClause::new("capacitance", CompareOp::Ge, 1e-6)];
    let ipns: Vec<String> = repo
        .list(Some("capacitor"), Some(&clauses[..]))
        .expect("list")
        .into_iter()
        .map(|part| part.ipn)
        .collect();
    assert_eq!(ipns, vec!["C1", "C2"]);
}

#[test]
fn corrupt_parts_file_is_reported() {
    let tmp = TempDirGuard::new("corrupt");
    let repo = PartRepository::open(builtin_registry(), JsonlDriver::new(&tmp.path))
        .expect("fresh store should open");
    fs::write(tmp.path.join("parts.jsonl"), b"{\"ipn\":\"X\"\0}\n").expect("corrupt fixture");
    let err = repo.get("X").expect_err("corrupt file");
    assert!(err.to_string().contains("NUL"));
}
