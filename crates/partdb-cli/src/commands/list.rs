use crate::support::{exit_with, open_repo_or_exit, print_json, repo_or_exit, to_json_or_exit};
use partdb_kernel::{FilterClause, SpecRegistry, format as format_value, parse_clause, parse_clause_any};
use partdb_store::PartRecord;
use serde_json::json;
use std::path::Path;

/// `IPN [type] Field: value, ...` with values rendered in display order.
pub fn render_row(registry: &SpecRegistry, record: &PartRecord) -> String {
    let Ok(spec) = registry.get(&record.type_name) else {
        return format!("{} [{}]", record.ipn, record.type_name);
    };
    let cells: Vec<String> = spec
        .displayed_fields()
        .filter_map(|field| {
            let value = record.get(&field.name)?;
            Some(format!("{}: {}", field.display_name, format_value(value, field)))
        })
        .collect();
    format!("{} [{}] {}", record.ipn, record.type_name, cells.join(", "))
}

fn parse_clauses_or_exit(
    registry: &SpecRegistry,
    type_name: Option<&str>,
    raw: &[String],
) -> Vec<FilterClause> {
    raw.iter()
        .map(|clause| {
            let parsed = match type_name {
                Some(type_name) => registry
                    .get(type_name)
                    .and_then(|spec| parse_clause(clause, spec)),
                None => parse_clause_any(clause, registry),
            };
            parsed.unwrap_or_else(|e| exit_with(e))
        })
        .collect()
}

pub fn run(root: &Path, type_name: Option<String>, raw_clauses: Vec<String>, json_output: bool) {
    let repo = open_repo_or_exit(root);
    let clauses = parse_clauses_or_exit(repo.registry(), type_name.as_deref(), &raw_clauses);
    let rows = repo_or_exit(repo.list(type_name.as_deref(), Some(clauses.as_slice())));

    if json_output {
        let items: Vec<_> = rows.iter().map(to_json_or_exit).collect();
        print_json(&json!({
            "action": "list",
            "storePath": root.display().to_string(),
            "filter": clauses.iter().map(ToString::to_string).collect::<Vec<_>>(),
            "count": items.len(),
            "items": items,
        }));
    } else {
        println!("partdb list\n  Count: {}", rows.len());
        for record in &rows {
            println!("  - {}", render_row(repo.registry(), record));
        }
    }
}

pub fn run_ipns(root: &Path, type_name: Option<String>, json_output: bool) {
    let repo = open_repo_or_exit(root);
    let ipns = repo_or_exit(repo.all_ipns(type_name.as_deref()));
    if json_output {
        print_json(&json!({
            "action": "ipns",
            "count": ipns.len(),
            "items": ipns,
        }));
    } else {
        for ipn in ipns {
            println!("{ipn}");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use partdb_kernel::builtin_registry;

    #[test]
    fn rows_render_in_display_order_with_units() {
        let registry = builtin_registry();
        let resistor = PartRecord::new("R-4k7", "resistor")
            .with("package", "0603")
            .with("resistance", 4700.0)
            .with("tolerance", 5.0)
            .with("power", 0.25)
            .with("stock", 120_i64)
            .with("manufacturer", "Yageo");
        let capacitor = PartRecord::new("C-2u2", "capacitor")
            .with("stock", 0_i64)
            .with("capacitance", 2.2e-6)
            .with("max_voltage", 25.0)
            .with("package", "0805");
        let rendered = [resistor, capacitor]
            .iter()
            .map(|record| render_row(registry, record))
            .collect::<Vec<_>>()
            .join("\n");
        insta::assert_snapshot!(rendered, @r"
        R-4k7 [resistor] Stock: 120, Manufacturer: Yageo, Resistance: 4.7kΩ, Tolerance: 5%, Power Rating: 0.25W, Package: 0603
        C-2u2 [capacitor] Stock: 0, Capacitance: 2.2uF, Voltage Rating: 25V, Package: 0805
        ");
    }

    #[test]
    fn unknown_types_render_bare() {
        let record = PartRecord::new("X1", "relay").with("stock", 1_i64);
        assert_eq!(render_row(builtin_registry(), &record), "X1 [relay]");
    }
}
