//! Schema 0.6: the last per-table layout.
//!
//! One table per part type, keyed by `mfr_part_numb`, with an `ipn` column
//! added in 0.6, plus the `pcbs` table of board assemblies. These are the
//! column lists the 0.6 → 0.7 projection reads; anything else found in a
//! row is dropped.

use partdb_kernel::ValueKind;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LegacyColumn {
    pub name: &'static str,
    pub kind: ValueKind,
}

const fn column(name: &'static str, kind: ValueKind) -> LegacyColumn {
    LegacyColumn { name, kind }
}

const fn float(name: &'static str) -> LegacyColumn {
    column(name, ValueKind::Float)
}

const fn text(name: &'static str) -> LegacyColumn {
    column(name, ValueKind::Text)
}

/// A 0.6 table and the part type its rows become.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LegacyTable {
    pub table: &'static str,
    pub type_name: &'static str,
    pub columns: &'static [LegacyColumn],
}

impl LegacyTable {
    /// Shared columns followed by this table's own.
    pub fn all_columns(&self) -> impl Iterator<Item = &'static LegacyColumn> + use<> {
        GENERIC_COLUMNS.iter().chain(self.columns)
    }
}

/// Columns every 0.6 table carries.
pub const GENERIC_COLUMNS: &[LegacyColumn] = &[
    text("mfr_part_numb"),
    text("ipn"),
    column("stock", ValueKind::Int),
    text("manufacturer"),
    text("storage"),
    text("package"),
    text("comments"),
    text("datasheet"),
    text("user"),
];

pub const LEGACY_TABLES: &[LegacyTable] = &[
    LegacyTable {
        table: "resistance",
        type_name: "resistor",
        columns: &[float("resistance"), float("tolerance"), float("power")],
    },
    LegacyTable {
        table: "capacitor",
        type_name: "capacitor",
        columns: &[
            float("capacitance"),
            float("tolerance"),
            float("max_voltage"),
            text("temp_coeff"),
            text("cap_type"),
        ],
    },
    LegacyTable {
        table: "inductor",
        type_name: "inductor",
        columns: &[float("inductance"), float("tolerance"), float("max_current")],
    },
    LegacyTable {
        table: "diode",
        type_name: "diode",
        columns: &[
            text("diode_type"),
            float("max_current"),
            float("average_current"),
            float("max_rv"),
        ],
    },
    LegacyTable {
        table: "ic",
        type_name: "ic",
        columns: &[text("ic_type")],
    },
    LegacyTable {
        table: "crystal",
        type_name: "crystal",
        columns: &[
            float("frequency"),
            float("load_c"),
            float("esr"),
            float("stability_ppm"),
        ],
    },
    LegacyTable {
        table: "mosfet",
        type_name: "mosfet",
        columns: &[
            text("mosfet_type"),
            float("vdss"),
            float("vgss"),
            float("vgs_th"),
            float("i_d"),
            float("i_d_pulse"),
        ],
    },
    LegacyTable {
        table: "bjt",
        type_name: "bjt",
        columns: &[
            text("bjt_type"),
            float("vcbo"),
            float("vceo"),
            float("vebo"),
            float("i_c"),
            float("i_c_peak"),
        ],
    },
    LegacyTable {
        table: "led",
        type_name: "led",
        columns: &[text("led_type"), float("vf"), float("max_i")],
    },
    LegacyTable {
        table: "fuse",
        type_name: "fuse",
        columns: &[
            text("fuse_type"),
            float("max_v"),
            float("max_i"),
            float("trip_i"),
            float("hold_i"),
        ],
    },
    LegacyTable {
        table: "connector",
        type_name: "connector",
        columns: &[text("conn_type")],
    },
    LegacyTable {
        table: "button",
        type_name: "button",
        columns: &[
            text("bt_type"),
            text("circuit_t"),
            float("max_v"),
            float("max_i"),
        ],
    },
    LegacyTable {
        table: "misc_c",
        type_name: "misc",
        columns: &[],
    },
];

/// The board assembly table. Its rows are keyed by `(board_name, rev)`
/// (`project_name` before 0.4) and are never part rows.
pub const PCB_TABLE: &str = "pcbs";

/// `pcbs` columns at 0.6. `parts` holds the bill of materials as JSON.
pub const PCB_COLUMNS: &[LegacyColumn] = &[
    column("stock", ValueKind::Int),
    text("board_name"),
    text("rev"),
    text("sub_rev"),
    text("comments"),
    text("storage"),
    text("parts"),
];

pub fn legacy_table(table: &str) -> Option<&'static LegacyTable> {
    LEGACY_TABLES.iter().find(|t| t.table == table)
}

#[cfg(test)]
mod tests {
    use super::*;
    use partdb_kernel::builtin_registry;

    #[test]
    fn every_legacy_column_exists_in_its_part_type() {
        let registry = builtin_registry();
        for table in LEGACY_TABLES {
            let spec = registry
                .get(table.type_name)
                .expect("legacy tables map to built-in types");
            for column in table.all_columns() {
                let field = spec
                    .field(column.name)
                    .unwrap_or_else(|| panic!("{}.{} has no field", table.table, column.name));
                assert_eq!(
                    field.kind.primitive_name(),
                    column.kind.primitive_name(),
                    "{}.{}",
                    table.table,
                    column.name
                );
            }
        }
    }

    #[test]
    fn every_built_in_type_has_a_legacy_table() {
        for spec in builtin_registry().list_types() {
            assert!(
                LEGACY_TABLES.iter().any(|t| t.type_name == spec.type_name),
                "{}",
                spec.type_name
            );
        }
        assert_eq!(legacy_table("misc_c").map(|t| t.type_name), Some("misc"));
        assert!(legacy_table("pcb").is_none());
    }
}
