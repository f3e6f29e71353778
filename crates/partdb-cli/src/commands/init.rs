use crate::support::{exit_with, print_json};
use partdb_kernel::builtin_registry;
use partdb_store::{CURRENT_SCHEMA_VERSION, JsonlDriver, PartRepository, StorageDriver};
use serde_json::json;
use std::path::Path;

pub fn run(root: &Path, json_output: bool) {
    let created = !root.exists();
    let driver = JsonlDriver::new(root);
    driver.ensure_root().unwrap_or_else(|e| exit_with(e));
    let stamped = match driver.read_config() {
        Ok(config) => !matches!(config.db_version(), Ok(Some(_))),
        Err(e) => exit_with(e),
    };

    // Opening stamps an empty, unversioned store and gates everything else.
    PartRepository::open(builtin_registry(), &driver).unwrap_or_else(|e| exit_with(e));

    if json_output {
        print_json(&json!({
            "action": "init",
            "storePath": root.display().to_string(),
            "createdStore": created,
            "stampedVersion": stamped,
            "dbVersion": CURRENT_SCHEMA_VERSION,
        }));
    } else {
        println!(
            "partdb init\n  Store: {}\n  Created: {}\n  Schema: {}",
            root.display(),
            if created { "yes" } else { "no" },
            CURRENT_SCHEMA_VERSION
        );
    }
}
