use crate::commands::list::render_row;
use crate::support::{
    exit_with, open_repo_or_exit, parse_assignment, print_json, repo_or_exit, split_assignment,
    to_json_or_exit,
};
use partdb_kernel::TypedValue;
use partdb_store::PartRecord;
use serde_json::json;
use std::collections::BTreeMap;
use std::path::Path;
use tracing::debug;

pub fn run_add(root: &Path, type_name: String, set: Vec<String>, json_output: bool) {
    let repo = open_repo_or_exit(root);
    let registry = repo.registry();
    registry.get(&type_name).unwrap_or_else(|e| exit_with(e));

    let mut record = PartRecord::new("", type_name.as_str());
    for raw in &set {
        let (name, value) = split_assignment(raw).unwrap_or_else(|e| exit_with(e));
        if name == "ipn" {
            record.ipn = value.trim().to_string();
            continue;
        }
        if let Some(value) =
            parse_assignment(registry, &type_name, name, value).unwrap_or_else(|e| exit_with(e))
        {
            record.set(name, value);
        }
    }
    debug!(ipn = %record.ipn, %type_name, "adding part");
    repo_or_exit(repo.add(&type_name, record.clone()));
    let stored = repo_or_exit(repo.get(&record.ipn));

    if json_output {
        print_json(&json!({
            "action": "add",
            "storePath": root.display().to_string(),
            "part": to_json_or_exit(&stored),
        }));
    } else {
        println!(
            "partdb add\n  Added: {}",
            render_row(registry, &stored)
        );
        if let Some(summary) = repo.describe(&stored) {
            println!("  {summary}");
        }
    }
}

pub fn run_get(root: &Path, ipn: String, json_output: bool) {
    let repo = open_repo_or_exit(root);
    let record = repo_or_exit(repo.get(&ipn));
    if json_output {
        print_json(&json!({
            "action": "get",
            "part": to_json_or_exit(&record),
            "summary": repo.describe(&record),
        }));
        return;
    }
    println!("partdb get\n  {}", render_row(repo.registry(), &record));
    if let Some(summary) = repo.describe(&record) {
        println!("  {summary}");
    }
}

pub fn run_delete(root: &Path, ipn: String, json_output: bool) {
    let repo = open_repo_or_exit(root);
    let removed = repo_or_exit(repo.delete(&ipn));
    if json_output {
        print_json(&json!({
            "action": "delete",
            "part": to_json_or_exit(&removed),
        }));
    } else {
        println!("partdb delete\n  Deleted: {} [{}]", removed.ipn, removed.type_name);
    }
}

pub fn run_update(root: &Path, ipn: String, set: Vec<String>, json_output: bool) {
    let repo = open_repo_or_exit(root);
    let current = repo_or_exit(repo.get(&ipn));

    let mut changes: BTreeMap<String, Option<TypedValue>> = BTreeMap::new();
    for raw in &set {
        let (name, value) = split_assignment(raw).unwrap_or_else(|e| exit_with(e));
        let parsed = if matches!(name, "ipn" | "type") {
            // Passed through so the repository reports the immutable key.
            Some(TypedValue::Text(value.to_string()))
        } else {
            parse_assignment(repo.registry(), &current.type_name, name, value)
                .unwrap_or_else(|e| exit_with(e))
        };
        changes.insert(name.to_string(), parsed);
    }
    if changes.is_empty() {
        exit_with("nothing to update; pass --set FIELD=VALUE");
    }

    let updated = repo_or_exit(repo.update(&ipn, changes));
    if json_output {
        print_json(&json!({
            "action": "update",
            "part": to_json_or_exit(&updated),
        }));
    } else {
        println!(
            "partdb update\n  Updated: {}",
            render_row(repo.registry(), &updated)
        );
    }
}
