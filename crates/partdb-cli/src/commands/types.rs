use crate::support::{exit_with, print_json, to_json_or_exit};
use partdb_kernel::{PartTypeSpec, builtin_registry};
use serde_json::json;

pub fn run(type_name: Option<String>, json_output: bool) {
    let registry = builtin_registry();
    match type_name {
        Some(type_name) => {
            let spec = registry.get(&type_name).unwrap_or_else(|e| exit_with(e));
            show(spec, json_output);
        }
        None => {
            if json_output {
                let items: Vec<_> = registry
                    .list_types()
                    .map(|spec| {
                        json!({
                            "typeName": spec.type_name,
                            "displayName": spec.display_name,
                            "fieldCount": spec.fields.len(),
                        })
                    })
                    .collect();
                print_json(&json!({
                    "action": "types",
                    "count": items.len(),
                    "items": items,
                }));
            } else {
                println!("partdb types\n  Count: {}", registry.len());
                for spec in registry.list_types() {
                    println!(
                        "  - {} ({}, {} fields)",
                        spec.type_name,
                        spec.display_name,
                        spec.fields.len()
                    );
                }
            }
        }
    }
}

fn show(spec: &PartTypeSpec, json_output: bool) {
    if json_output {
        print_json(&json!({
            "action": "types.show",
            "type": to_json_or_exit(spec),
        }));
        return;
    }
    println!("partdb types {}\n  Display: {}", spec.type_name, spec.display_name);
    for field in spec.fields() {
        let units = field
            .unit_suffix()
            .map(|u| format!(", {u}"))
            .unwrap_or_default();
        let required = if field.required { " required" } else { "" };
        println!(
            "  - {}: {} [{}{units}]{required}",
            field.name,
            field.display_name,
            field.kind.as_str()
        );
    }
}
