use crate::support::{exit_with, existing_driver_or_exit, print_json, to_json_or_exit};
use partdb_migrate::SchemaMigrator;
use partdb_store::{CURRENT_SCHEMA_VERSION, SchemaVersion};
use serde_json::json;
use std::path::Path;

pub fn run(root: &Path, to: Option<String>, json_output: bool) {
    let target = match to.as_deref() {
        Some(raw) => raw
            .parse::<SchemaVersion>()
            .unwrap_or_else(|e| exit_with(e)),
        None => CURRENT_SCHEMA_VERSION,
    };
    let migrator = SchemaMigrator::new(existing_driver_or_exit(root));
    let report = migrator.migrate(target).unwrap_or_else(|e| exit_with(e));

    if json_output {
        print_json(&json!({
            "action": "migrate",
            "storePath": root.display().to_string(),
            "report": to_json_or_exit(&report),
        }));
        return;
    }
    if report.is_noop() {
        println!("partdb migrate\n  Store already at {}", report.to);
        return;
    }
    println!("partdb migrate\n  {} -> {}", report.from, report.to);
    for step in &report.applied {
        println!("  - {} -> {}: {}", step.from, step.to, step.description);
    }
    for part in &report.incomplete {
        println!("  Incomplete: {} lacks {}", part.ipn, part.missing.join(", "));
    }
    if let Some(backup) = &report.backup {
        match &backup.location {
            Some(location) => println!("  Backup: {} ({})", backup.id, location.display()),
            None => println!("  Backup: {}", backup.id),
        }
    }
}

pub fn run_version(root: &Path, json_output: bool) {
    let migrator = SchemaMigrator::new(existing_driver_or_exit(root));
    let current = migrator.current_version().unwrap_or_else(|e| exit_with(e));
    let pending = migrator
        .needs_migration(CURRENT_SCHEMA_VERSION)
        .unwrap_or_else(|e| exit_with(e));

    if json_output {
        print_json(&json!({
            "action": "version",
            "dbVersion": current,
            "expected": CURRENT_SCHEMA_VERSION,
            "migrationPending": pending,
        }));
    } else {
        let store = current.map_or_else(|| "unstamped".to_string(), |version| version.to_string());
        println!(
            "partdb version\n  Store: {store}\n  Expected: {CURRENT_SCHEMA_VERSION}\n  Migration pending: {}",
            if pending { "yes" } else { "no" }
        );
    }
}
