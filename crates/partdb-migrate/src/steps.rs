//! The historical step chain.
//!
//! Each step is a pure function from the image at one schema version to
//! the image at the next. Steps never touch `db_ver`; the migrator stamps
//! it once a step's output is persisted.
//!
//! Part tables and the `pcbs` table evolve separately: PCB rows have no
//! manufacturer part number and become `Pcb` documents at 0.7.

use crate::legacy::{LegacyTable, PCB_TABLE, legacy_table};
use partdb_kernel::{CompareOp, SpecRegistry, TypedValue, ValueKind, builtin_registry, parse_clause};
use partdb_store::{
    DocumentSet, LegacyRow, PartRecord, PartSelector, Pcb, PcbPart, SchemaVersion, StoreImage,
    StoreModel, User,
};
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet};
use tracing::warn;

/// Why a step rejected its input.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum StepError {
    #[error("expected per-type tables, found {found}")]
    WrongModel { found: &'static str },

    #[error("table `{table}` row {row}: missing `{key}`")]
    MissingKey {
        table: String,
        row: usize,
        key: &'static str,
    },

    #[error("table `{table}`: `mfr_part_numb` {key} appears more than once")]
    DuplicateKey { table: String, key: String },

    #[error("part {ipn}: stock must be a non-negative integer, got {value}")]
    InvalidStock { ipn: String, value: String },

    #[error("part {ipn}: `{column}` must be {expected}, got {value}")]
    InvalidValue {
        ipn: String,
        column: &'static str,
        expected: &'static str,
        value: String,
    },

    #[error("ipn {0} is used by more than one part")]
    DuplicateIpn(String),

    #[error("unknown legacy table `{0}`")]
    UnknownTable(String),

    #[error("pcb {board}: {reason}")]
    InvalidPcb { board: String, reason: String },

    #[error("{0}")]
    Rejected(String),
}

pub type StepFn = Box<dyn Fn(StoreImage) -> Result<StoreImage, StepError> + Send + Sync>;

/// One `from → to` transformation.
pub struct MigrationStep {
    pub from: SchemaVersion,
    pub to: SchemaVersion,
    pub description: &'static str,
    pub apply: StepFn,
}

impl MigrationStep {
    pub fn new(
        from: SchemaVersion,
        to: SchemaVersion,
        description: &'static str,
        apply: impl Fn(StoreImage) -> Result<StoreImage, StepError> + Send + Sync + 'static,
    ) -> Self {
        Self {
            from,
            to,
            description,
            apply: Box::new(apply),
        }
    }
}

impl std::fmt::Debug for MigrationStep {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MigrationStep")
            .field("from", &self.from)
            .field("to", &self.to)
            .field("description", &self.description)
            .finish_non_exhaustive()
    }
}

const fn v(minor: u32) -> SchemaVersion {
    SchemaVersion::new(0, minor, 0)
}

/// `0.2 → 0.3 → 0.4 → 0.5 → 0.6 → 0.7`.
pub fn builtin_chain() -> Vec<MigrationStep> {
    vec![
        MigrationStep::new(
            v(2),
            v(3),
            "add storage, merge user comments into comments, drop capacitor power",
            add_storage_merge_comments,
        ),
        MigrationStep::new(
            v(3),
            v(4),
            "add datasheet, rename pcb project_name to board_name, add pcb parts",
            add_datasheet,
        ),
        MigrationStep::new(
            v(4),
            v(5),
            "key tables by manufacturer part number, add user",
            key_by_part_number,
        ),
        MigrationStep::new(v(5), v(6), "add ipn from manufacturer part number", add_ipn),
        MigrationStep::new(
            v(6),
            v(7),
            "project per-type tables into typed part documents, pcbs and users",
            tables_to_documents,
        ),
    ]
}

fn tables_mut(image: &mut StoreImage) -> Result<&mut BTreeMap<String, Vec<LegacyRow>>, StepError> {
    match &mut image.model {
        StoreModel::Tables(tables) => Ok(tables),
        other => Err(StepError::WrongModel { found: other.kind() }),
    }
}

fn for_each_row(
    mut image: StoreImage,
    mut edit: impl FnMut(&str, &mut LegacyRow),
) -> Result<StoreImage, StepError> {
    for (table, rows) in tables_mut(&mut image)? {
        for row in rows {
            edit(table, row);
        }
    }
    Ok(image)
}

fn add_column(row: &mut LegacyRow, name: &str) {
    row.entry(name.to_string()).or_insert(Value::Null);
}

pub fn add_storage_merge_comments(image: StoreImage) -> Result<StoreImage, StepError> {
    for_each_row(image, |table, row| {
        add_column(row, "storage");
        row.remove("part_comments");
        let comments = row.remove("user_comments").unwrap_or(Value::Null);
        row.insert("comments".to_string(), comments);
        if table == "capacitor" {
            row.remove("power");
        }
    })
}

pub fn add_datasheet(image: StoreImage) -> Result<StoreImage, StepError> {
    for_each_row(image, |table, row| {
        if table != PCB_TABLE {
            add_column(row, "datasheet");
            return;
        }
        if let Some(name) = row.remove("project_name") {
            row.insert("board_name".to_string(), name);
        }
        row.entry("parts".to_string())
            .or_insert_with(|| Value::Array(Vec::new()));
    })
}

pub fn key_by_part_number(mut image: StoreImage) -> Result<StoreImage, StepError> {
    for (table, rows) in tables_mut(&mut image)? {
        if table == PCB_TABLE {
            for row in rows {
                row.remove("id");
            }
            continue;
        }
        let mut seen = BTreeSet::new();
        for (index, row) in rows.iter_mut().enumerate() {
            row.remove("id");
            add_column(row, "user");
            let key = match row.get("mfr_part_numb") {
                Some(Value::String(key)) if !key.trim().is_empty() => key.clone(),
                _ => {
                    return Err(StepError::MissingKey {
                        table: table.clone(),
                        row: index + 1,
                        key: "mfr_part_numb",
                    });
                }
            };
            if !seen.insert(key.clone()) {
                return Err(StepError::DuplicateKey {
                    table: table.clone(),
                    key,
                });
            }
        }
    }
    Ok(image)
}

pub fn add_ipn(image: StoreImage) -> Result<StoreImage, StepError> {
    for_each_row(image, |table, row| {
        if table == PCB_TABLE {
            return;
        }
        let missing = match row.get("ipn") {
            Some(Value::String(ipn)) => ipn.trim().is_empty(),
            _ => true,
        };
        if missing {
            let ipn = row.get("mfr_part_numb").cloned().unwrap_or(Value::Null);
            row.insert("ipn".to_string(), ipn);
        }
    })
}

fn row_ipn(row: &LegacyRow) -> Option<String> {
    ["ipn", "mfr_part_numb"].iter().find_map(|key| match row.get(*key) {
        Some(Value::String(value)) if !value.trim().is_empty() => Some(value.clone()),
        _ => None,
    })
}

/// Project one 0.6 row through its table's column list.
fn project_row(table: &LegacyTable, row: &LegacyRow, index: usize) -> Result<PartRecord, StepError> {
    let ipn = row_ipn(row).ok_or_else(|| StepError::MissingKey {
        table: table.table.to_string(),
        row: index + 1,
        key: "mfr_part_numb",
    })?;
    let mut record = PartRecord::new(&ipn, table.type_name);

    for column in table.all_columns() {
        if column.name == "ipn" {
            continue;
        }
        let value = row.get(column.name).unwrap_or(&Value::Null);
        let typed = match (column.kind, value) {
            (_, Value::Null) if column.name == "stock" => {
                warn!(%ipn, table = table.table, "legacy row has no stock, counting it as 0");
                TypedValue::Int(0)
            }
            (_, Value::Null) => continue,
            (ValueKind::Int, Value::Number(n)) => match n.as_i64() {
                Some(stock) if stock >= 0 => TypedValue::Int(stock),
                _ => {
                    return Err(StepError::InvalidStock {
                        ipn,
                        value: value.to_string(),
                    });
                }
            },
            (ValueKind::Int, _) => {
                return Err(StepError::InvalidStock {
                    ipn,
                    value: value.to_string(),
                });
            }
            (ValueKind::Text, Value::String(text)) => TypedValue::Text(text.clone()),
            (ValueKind::Text, Value::Number(n)) => TypedValue::Text(n.to_string()),
            (_, Value::Number(n)) => match n.as_f64() {
                Some(number) => TypedValue::Float(number),
                None => {
                    return Err(StepError::InvalidValue {
                        ipn,
                        column: column.name,
                        expected: column.kind.primitive_name(),
                        value: value.to_string(),
                    });
                }
            },
            _ => {
                return Err(StepError::InvalidValue {
                    ipn,
                    column: column.name,
                    expected: column.kind.primitive_name(),
                    value: value.to_string(),
                });
            }
        };
        record.set(column.name, typed);
    }
    Ok(record)
}

/// Required fields of the record's type that the record leaves unset or
/// blank. `ipn` is the record key and never reported.
pub fn missing_required(record: &PartRecord, registry: &SpecRegistry) -> Vec<String> {
    let Ok(spec) = registry.get(&record.type_name) else {
        return Vec::new();
    };
    spec.required_fields()
        .filter(|field| field.name != "ipn")
        .filter(|field| {
            record
                .get(&field.name)
                .is_none_or(|value| value.as_text().is_some_and(|text| text.trim().is_empty()))
        })
        .map(|field| field.name.clone())
        .collect()
}

fn text_cell(row: &LegacyRow, key: &str) -> Option<String> {
    match row.get(key) {
        Some(Value::String(text)) if !text.trim().is_empty() => Some(text.clone()),
        Some(Value::Number(number)) => Some(number.to_string()),
        _ => None,
    }
}

/// The IPN a 0.6 row of `table` got for `mfr_part_numb`, or the part
/// number itself when no row has it.
fn resolve_ipn(tables: &BTreeMap<String, Vec<LegacyRow>>, table: &str, mfr_part_numb: &str) -> String {
    tables
        .get(table)
        .into_iter()
        .flatten()
        .find(|row| matches!(row.get("mfr_part_numb"), Some(Value::String(key)) if key == mfr_part_numb))
        .and_then(row_ipn)
        .unwrap_or_else(|| mfr_part_numb.to_string())
}

/// `{"resistance": {"val": 1000, "op": ">="}, "package": "0603"}` as
/// clause strings. A clause the current spec cannot parse is kept as is.
fn legacy_clauses(
    part: &LegacyRow,
    type_name: &str,
    registry: &SpecRegistry,
) -> Result<Vec<String>, String> {
    let mut clauses = Vec::with_capacity(part.len());
    for (field, criterion) in part {
        let (op, value) = match criterion {
            Value::Object(criterion) => {
                let op = match criterion.get("op") {
                    None | Some(Value::Null) => CompareOp::Eq,
                    Some(Value::String(op)) => op
                        .parse::<CompareOp>()
                        .map_err(|e| format!("`{field}`: {e}"))?,
                    Some(other) => return Err(format!("`{field}`: operator {other} is not text")),
                };
                (op, criterion.get("val").unwrap_or(&Value::Null))
            }
            value => (CompareOp::Eq, value),
        };
        let value = match value {
            Value::String(text) => text.clone(),
            Value::Number(number) => number.to_string(),
            other => return Err(format!("`{field}` has no usable value: {other}")),
        };
        let raw = format!("{field} {op} {value}");
        match registry.get(type_name).and_then(|spec| parse_clause(&raw, spec)) {
            Ok(clause) => clauses.push(clause.to_string()),
            Err(error) => {
                warn!(clause = %raw, %error, "keeping pcb clause that does not parse");
                clauses.push(raw);
            }
        }
    }
    Ok(clauses)
}

fn project_pcb_line(
    entry: &Value,
    tables: &BTreeMap<String, Vec<LegacyRow>>,
    registry: &SpecRegistry,
) -> Result<PcbPart, String> {
    let Value::Object(entry) = entry else {
        return Err(format!("expected an object, got {entry}"));
    };
    let Some(Value::String(comp_type)) = entry.get("comp_type") else {
        return Err("missing `comp_type`".to_string());
    };
    let table = legacy_table(comp_type).ok_or_else(|| format!("unknown component table `{comp_type}`"))?;
    let quantity = entry
        .get("quantity")
        .and_then(Value::as_u64)
        .and_then(|quantity| u32::try_from(quantity).ok())
        .filter(|quantity| *quantity > 0)
        .ok_or_else(|| {
            format!(
                "quantity must be a positive integer, got {}",
                entry.get("quantity").unwrap_or(&Value::Null)
            )
        })?;
    let Some(Value::Object(part)) = entry.get("part") else {
        return Err("missing `part`".to_string());
    };
    let selector = match part.get("mfr_part_numb") {
        Some(Value::String(mfr_part_numb)) => PartSelector::Specific {
            ipn: resolve_ipn(tables, table.table, mfr_part_numb),
        },
        _ => PartSelector::Generic {
            type_name: table.type_name.to_string(),
            clauses: legacy_clauses(part, table.type_name, registry)?,
        },
    };
    Ok(PcbPart {
        quantity,
        reference: text_cell(entry, "reference"),
        part: selector,
    })
}

/// Project one 0.6 `pcbs` row.
fn project_pcb(
    row: &LegacyRow,
    index: usize,
    tables: &BTreeMap<String, Vec<LegacyRow>>,
    registry: &SpecRegistry,
) -> Result<Pcb, StepError> {
    let missing = |key: &'static str| StepError::MissingKey {
        table: PCB_TABLE.to_string(),
        row: index + 1,
        key,
    };
    let board_name = text_cell(row, "board_name").ok_or_else(|| missing("board_name"))?;
    let rev = text_cell(row, "rev").ok_or_else(|| missing("rev"))?;
    let label = format!("{board_name} rev {rev}");
    let invalid = |reason: String| StepError::InvalidPcb {
        board: label.clone(),
        reason,
    };

    let stock = row
        .get("stock")
        .and_then(Value::as_i64)
        .filter(|stock| *stock >= 0)
        .ok_or_else(|| {
            invalid(format!(
                "stock must be a non-negative integer, got {}",
                row.get("stock").unwrap_or(&Value::Null)
            ))
        })?;
    let lines: Vec<Value> = match row.get("parts") {
        None | Some(Value::Null) => Vec::new(),
        Some(Value::Array(lines)) => lines.clone(),
        Some(Value::String(json)) => serde_json::from_str(json)
            .map_err(|e| invalid(format!("`parts` is not a JSON list: {e}")))?,
        Some(other) => return Err(invalid(format!("`parts` must be a list, got {other}"))),
    };
    let mut parts = Vec::with_capacity(lines.len());
    for (line, entry) in lines.iter().enumerate() {
        let part = project_pcb_line(entry, tables, registry)
            .map_err(|reason| invalid(format!("line {}: {reason}", line + 1)))?;
        parts.push(part);
    }

    Ok(Pcb {
        sub_rev: text_cell(row, "sub_rev"),
        stock,
        storage: text_cell(row, "storage"),
        comments: text_cell(row, "comments"),
        parts,
        board_name,
        rev,
    })
}

fn project_pcbs(
    tables: &BTreeMap<String, Vec<LegacyRow>>,
    registry: &SpecRegistry,
) -> Result<Vec<Pcb>, StepError> {
    let rows = tables.get(PCB_TABLE).map_or(&[][..], Vec::as_slice);
    let mut seen = BTreeSet::new();
    let mut pcbs = Vec::with_capacity(rows.len());
    for (index, row) in rows.iter().enumerate() {
        let pcb = project_pcb(row, index, tables, registry)?;
        if !seen.insert((pcb.board_name.clone(), pcb.rev.clone())) {
            return Err(StepError::InvalidPcb {
                reason: format!("revision {} appears more than once", pcb.rev),
                board: pcb.board_name,
            });
        }
        pcbs.push(pcb);
    }
    pcbs.sort_by(|a, b| (&a.board_name, &a.rev).cmp(&(&b.board_name, &b.rev)));
    Ok(pcbs)
}

/// One user per distinct name found in the parts' `user` field.
fn seed_users(parts: &[PartRecord]) -> Vec<User> {
    parts
        .iter()
        .filter_map(|part| part.get("user").and_then(TypedValue::as_text))
        .map(str::trim)
        .filter(|name| !name.is_empty())
        .collect::<BTreeSet<_>>()
        .into_iter()
        .map(User::new)
        .collect()
}

pub fn tables_to_documents(image: StoreImage) -> Result<StoreImage, StepError> {
    let tables = match image.model {
        StoreModel::Tables(tables) => tables,
        other => return Err(StepError::WrongModel { found: other.kind() }),
    };
    let registry = builtin_registry();

    let mut seen = BTreeSet::new();
    let mut parts = Vec::new();
    for (name, rows) in &tables {
        if name == PCB_TABLE {
            continue;
        }
        let table = legacy_table(name).ok_or_else(|| StepError::UnknownTable(name.clone()))?;
        for (index, row) in rows.iter().enumerate() {
            let record = project_row(table, row, index)?;
            if !seen.insert(record.ipn.clone()) {
                return Err(StepError::DuplicateIpn(record.ipn));
            }
            for field in missing_required(&record, registry) {
                warn!(
                    ipn = %record.ipn,
                    type_name = %record.type_name,
                    %field,
                    "migrated part lacks a required field"
                );
            }
            parts.push(record);
        }
    }
    parts.sort_by(|a, b| a.ipn.cmp(&b.ipn));
    let pcbs = project_pcbs(&tables, registry)?;
    let users = seed_users(&parts);

    Ok(StoreImage {
        config: image.config,
        model: StoreModel::Documents(DocumentSet { parts, pcbs, users }),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use partdb_store::ConfigTable;
    use serde_json::json;

    fn row(value: Value) -> LegacyRow {
        match value {
            Value::Object(map) => map,
            other => panic!("fixture rows are objects, got {other}"),
        }
    }

    fn tables(entries: Vec<(&str, Vec<Value>)>) -> StoreImage {
        StoreImage {
            config: ConfigTable::default(),
            model: StoreModel::Tables(
                entries
                    .into_iter()
                    .map(|(name, rows)| (name.to_string(), rows.into_iter().map(row).collect()))
                    .collect(),
            ),
        }
    }

    fn only_row(image: &StoreImage, table: &str) -> Value {
        match &image.model {
            StoreModel::Tables(tables) => Value::Object(tables[table][0].clone()),
            StoreModel::Documents(_) => panic!("expected tables"),
        }
    }

    #[test]
    fn chain_is_contiguous() {
        let chain = builtin_chain();
        assert_eq!(chain.first().map(|s| s.from), Some(v(2)));
        assert_eq!(chain.last().map(|s| s.to), Some(partdb_store::CURRENT_SCHEMA_VERSION));
        for pair in chain.windows(2) {
            assert_eq!(pair[0].to, pair[1].from);
        }
    }

    #[test]
    fn zero_two_merges_comments_and_drops_capacitor_power() {
        let image = tables(vec![
            (
                "capacitor",
                vec![json!({"mfr_part_numb": "C1", "power": 0.1, "part_comments": "x", "user_comments": "keep"})],
            ),
            ("resistance", vec![json!({"mfr_part_numb": "R1", "power": 0.25})]),
        ]);
        let out = add_storage_merge_comments(image).expect("step should apply");
        assert_eq!(
            only_row(&out, "capacitor"),
            json!({"mfr_part_numb": "C1", "storage": null, "comments": "keep"})
        );
        assert_eq!(
            only_row(&out, "resistance"),
            json!({"mfr_part_numb": "R1", "power": 0.25, "storage": null, "comments": null})
        );
    }

    #[test]
    fn zero_four_requires_unique_part_numbers() {
        let missing = tables(vec![("ic", vec![json!({"id": 1, "stock": 1})])]);
        assert_eq!(
            key_by_part_number(missing).expect_err("no key"),
            StepError::MissingKey {
                table: "ic".to_string(),
                row: 1,
                key: "mfr_part_numb",
            }
        );

        let duplicated = tables(vec![(
            "ic",
            vec![json!({"mfr_part_numb": "U1"}), json!({"mfr_part_numb": "U1"})],
        )]);
        assert!(matches!(
            key_by_part_number(duplicated),
            Err(StepError::DuplicateKey { key, .. }) if key == "U1"
        ));

        let good = tables(vec![("ic", vec![json!({"id": 7, "mfr_part_numb": "U1"})])]);
        let out = key_by_part_number(good).expect("unique keys");
        assert_eq!(only_row(&out, "ic"), json!({"mfr_part_numb": "U1", "user": null}));
    }

    #[test]
    fn zero_five_defaults_ipn_to_part_number() {
        let image = tables(vec![(
            "ic",
            vec![json!({"mfr_part_numb": "U1"}), json!({"mfr_part_numb": "U2", "ipn": "IC-2"})],
        )]);
        let out = add_ipn(image).expect("step should apply");
        let StoreModel::Tables(tables) = &out.model else {
            panic!("expected tables");
        };
        assert_eq!(tables["ic"][0]["ipn"], json!("U1"));
        assert_eq!(tables["ic"][1]["ipn"], json!("IC-2"));
    }

    #[test]
    fn zero_six_projects_rows_into_documents() {
        let image = tables(vec![
            (
                "resistance",
                vec![json!({
                    "mfr_part_numb": "RC0805", "ipn": "R-1k", "stock": 10, "package": "0805",
                    "resistance": 1000, "tolerance": null, "legacy_only": "dropped"
                })],
            ),
            ("misc_c", vec![json!({"mfr_part_numb": "M1", "stock": 0})]),
        ]);
        let out = tables_to_documents(image).expect("projection");
        let StoreModel::Documents(documents) = out.model else {
            panic!("expected documents");
        };
        assert!(documents.pcbs.is_empty());
        assert!(documents.users.is_empty());
        assert_eq!(
            documents.parts,
            vec![
                PartRecord::new("M1", "misc")
                    .with("mfr_part_numb", "M1")
                    .with("stock", 0_i64),
                PartRecord::new("R-1k", "resistor")
                    .with("mfr_part_numb", "RC0805")
                    .with("stock", 10_i64)
                    .with("package", "0805")
                    .with("resistance", 1000.0),
            ]
        );
    }

    #[test]
    fn zero_six_rejects_bad_stock_unknown_tables_and_duplicate_ipns() {
        let negative = tables(vec![("ic", vec![json!({"mfr_part_numb": "U1", "stock": -2})])]);
        assert!(matches!(
            tables_to_documents(negative),
            Err(StepError::InvalidStock { .. })
        ));

        let fractional = tables(vec![("ic", vec![json!({"mfr_part_numb": "U1", "stock": 1.5})])]);
        assert!(matches!(
            tables_to_documents(fractional),
            Err(StepError::InvalidStock { .. })
        ));

        let unknown = tables(vec![("pcb", vec![json!({"mfr_part_numb": "B1", "stock": 1})])]);
        assert_eq!(
            tables_to_documents(unknown).expect_err("pcb is not a part table"),
            StepError::UnknownTable("pcb".to_string())
        );

        let clash = tables(vec![
            ("ic", vec![json!({"mfr_part_numb": "X", "stock": 1})]),
            ("led", vec![json!({"mfr_part_numb": "X", "stock": 1})]),
        ]);
        assert_eq!(
            tables_to_documents(clash).expect_err("ipn clash across tables"),
            StepError::DuplicateIpn("X".to_string())
        );
    }

    #[test]
    fn steps_refuse_documents() {
        let image = StoreImage {
            config: ConfigTable::default(),
            model: StoreModel::Documents(DocumentSet::default()),
        };
        assert_eq!(
            add_datasheet(image).expect_err("documents have no tables"),
            StepError::WrongModel { found: "documents" }
        );
    }

    #[test]
    fn pcb_rows_skip_part_keying_and_gain_board_names() {
        let image = tables(vec![
            ("pcbs", vec![json!({"id": 1, "project_name": "amp", "rev": "A", "stock": 2})]),
            ("resistance", vec![json!({"id": 1, "mfr_part_numb": "R1"})]),
        ]);
        let image = add_storage_merge_comments(image).expect("0.2 step");
        let image = add_datasheet(image).expect("0.3 step");
        let image = key_by_part_number(image).expect("pcbs carry no part number");
        let image = add_ipn(image).expect("0.5 step");
        assert_eq!(
            only_row(&image, "pcbs"),
            json!({
                "board_name": "amp", "rev": "A", "stock": 2,
                "storage": null, "comments": null, "parts": []
            })
        );
        assert_eq!(only_row(&image, "resistance")["ipn"], json!("R1"));
    }

    #[test]
    fn zero_six_counts_absent_stock_as_zero() {
        let image = tables(vec![("resistance", vec![json!({"mfr_part_numb": "R1", "ipn": "R1"})])]);
        let out = tables_to_documents(image).expect("absent stock is not an error");
        let StoreModel::Documents(documents) = out.model else {
            panic!("expected documents");
        };
        assert_eq!(documents.parts[0].get("stock"), Some(&TypedValue::Int(0)));
    }

    #[test]
    fn zero_six_projects_pcbs_with_specific_and_generic_lines() {
        let image = tables(vec![
            (
                "resistance",
                vec![json!({"mfr_part_numb": "RC0603", "ipn": "R-10k", "stock": 5, "resistance": 10000})],
            ),
            (
                "pcbs",
                vec![
                    json!({
                        "board_name": "amp", "rev": "B", "sub_rev": null, "stock": 3,
                        "storage": "shelf 2", "comments": "second spin",
                        "parts": [
                            {"comp_type": "resistance", "quantity": 2, "reference": "R1 R2",
                             "part": {"mfr_part_numb": "RC0603"}},
                            {"comp_type": "capacitor", "quantity": 4,
                             "part": {"capacitance": {"val": 1e-7, "op": ">="}, "package": "0603"}}
                        ]
                    }),
                    json!({"board_name": "amp", "rev": "A", "stock": 0, "parts": "[]"}),
                ],
            ),
        ]);
        let out = tables_to_documents(image).expect("projection");
        let StoreModel::Documents(documents) = out.model else {
            panic!("expected documents");
        };
        let revs: Vec<&str> = documents.pcbs.iter().map(|pcb| pcb.rev.as_str()).collect();
        assert_eq!(revs, vec!["A", "B"]);

        let board = &documents.pcbs[1];
        assert_eq!(board.stock, 3);
        assert_eq!(board.storage.as_deref(), Some("shelf 2"));
        assert_eq!(board.comments.as_deref(), Some("second spin"));
        assert_eq!(board.parts[0].quantity, 2);
        assert_eq!(board.parts[0].reference.as_deref(), Some("R1 R2"));
        assert_eq!(
            board.parts[0].part,
            PartSelector::Specific {
                ipn: "R-10k".to_string()
            }
        );
        let PartSelector::Generic { type_name, clauses } = &board.parts[1].part else {
            panic!("capacitor line has no part number");
        };
        assert_eq!(type_name, "capacitor");
        assert_eq!(clauses.len(), 2);
        assert!(clauses.iter().any(|clause| clause.starts_with("capacitance >= ")));
        assert!(clauses.contains(&"package == 0603".to_string()));
    }

    #[test]
    fn zero_six_rejects_malformed_pcbs() {
        let nameless = tables(vec![("pcbs", vec![json!({"rev": "A", "stock": 1})])]);
        assert_eq!(
            tables_to_documents(nameless).expect_err("board name is the key"),
            StepError::MissingKey {
                table: "pcbs".to_string(),
                row: 1,
                key: "board_name",
            }
        );

        let negative = tables(vec![("pcbs", vec![json!({"board_name": "amp", "rev": "A", "stock": -1})])]);
        assert!(matches!(
            tables_to_documents(negative),
            Err(StepError::InvalidPcb { board, .. }) if board == "amp rev A"
        ));

        let twice = tables(vec![(
            "pcbs",
            vec![
                json!({"board_name": "amp", "rev": "A", "stock": 1}),
                json!({"board_name": "amp", "rev": "A", "stock": 2}),
            ],
        )]);
        assert!(matches!(
            tables_to_documents(twice),
            Err(StepError::InvalidPcb { reason, .. }) if reason.contains("more than once")
        ));

        let zero = tables(vec![(
            "pcbs",
            vec![json!({
                "board_name": "amp", "rev": "A", "stock": 1,
                "parts": [{"comp_type": "ic", "quantity": 0, "part": {"mfr_part_numb": "U1"}}]
            })],
        )]);
        assert!(matches!(
            tables_to_documents(zero),
            Err(StepError::InvalidPcb { reason, .. }) if reason.starts_with("line 1: quantity")
        ));
    }

    #[test]
    fn zero_six_seeds_users_from_part_owners() {
        let image = tables(vec![
            (
                "ic",
                vec![
                    json!({"mfr_part_numb": "U1", "stock": 1, "user": "mira"}),
                    json!({"mfr_part_numb": "U2", "stock": 1, "user": " mira "}),
                    json!({"mfr_part_numb": "U3", "stock": 1, "user": ""}),
                ],
            ),
            ("led", vec![json!({"mfr_part_numb": "D1", "stock": 1, "user": "ade"})]),
        ]);
        let out = tables_to_documents(image).expect("projection");
        let StoreModel::Documents(documents) = out.model else {
            panic!("expected documents");
        };
        assert_eq!(documents.users, vec![User::new("ade"), User::new("mira")]);
    }

    #[test]
    fn missing_required_names_unset_and_blank_fields() {
        let registry = builtin_registry();
        let bare = PartRecord::new("C1", "capacitor")
            .with("stock", 1_i64)
            .with("package", "  ");
        assert_eq!(missing_required(&bare, registry), vec!["package", "capacitance"]);

        let complete = bare.clone().with("package", "0603").with("capacitance", 1e-7);
        assert!(missing_required(&complete, registry).is_empty());

        let unknown = PartRecord::new("X1", "relay");
        assert!(missing_required(&unknown, registry).is_empty());
    }
}
