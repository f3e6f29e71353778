//! Built-in part types.
//!
//! Each type is the baseline plus its own extension fields. Registration
//! order is the order types are offered to users.

use crate::registry::SpecRegistry;
use crate::spec::{FieldSpec, PartTypeSpec};
use crate::value::ValueKind::{EngineeringFloat, Float, Fraction, Percentage, Text};
use std::sync::LazyLock;

static BUILTIN: LazyLock<SpecRegistry> = LazyLock::new(|| {
    let mut registry = SpecRegistry::new();
    let refused = registry.register_all(builtin_specs());
    debug_assert!(refused.is_empty(), "duplicate built-in part types: {refused:?}");
    registry
});

/// The process-wide built-in registry.
pub fn builtin_registry() -> &'static SpecRegistry {
    &BUILTIN
}

fn eng(name: &str, display: &str, units: &str) -> FieldSpec {
    FieldSpec::new(name, display, EngineeringFloat).units(units)
}

fn text(name: &str, display: &str) -> FieldSpec {
    FieldSpec::new(name, display, Text)
}

fn tolerance() -> FieldSpec {
    FieldSpec::new("tolerance", "Tolerance", Percentage)
}

/// Fresh copies of every built-in spec, in registration order.
pub fn builtin_specs() -> Vec<PartTypeSpec> {
    vec![
        PartTypeSpec::builder("resistor", "Resistors")
            .field(eng("resistance", "Resistance", "Ω").required())
            .field(tolerance())
            .field(FieldSpec::new("power", "Power Rating", Fraction).units("W"))
            .summary("resistance", "A {} resistor")
            .summary("tolerance", " with a {} tolerance")
            .summary("power", " with {} capability")
            .build(),
        PartTypeSpec::builder("capacitor", "Capacitors")
            .field(eng("capacitance", "Capacitance", "F").required())
            .field(tolerance())
            .field(eng("max_voltage", "Voltage Rating", "V"))
            .field(text("temp_coeff", "Temperature Coefficient"))
            .field(text("cap_type", "Capacitor Type"))
            .summary("capacitance", "A {} capacitor")
            .summary("tolerance", " with a {} tolerance")
            .summary("max_voltage", " rated for {}")
            .build(),
        PartTypeSpec::builder("inductor", "Inductors")
            .field(eng("inductance", "Inductance", "H").required())
            .field(tolerance())
            .field(eng("max_current", "Max Current", "A"))
            .summary("inductance", "A {} inductor")
            .summary("tolerance", " with a {} tolerance")
            .summary("max_current", " rated for {}")
            .build(),
        PartTypeSpec::builder("diode", "Diodes")
            .field(text("diode_type", "Diode Type").required())
            .field(eng("max_current", "Peak Current", "A"))
            .field(eng("average_current", "Average Current", "A"))
            .field(eng("max_rv", "Max Reverse Voltage", "V"))
            .build(),
        PartTypeSpec::builder("ic", "ICs")
            .field(text("ic_type", "IC Type").required())
            .build(),
        PartTypeSpec::builder("crystal", "Crystals")
            .field(eng("frequency", "Frequency", "Hz").required())
            .field(eng("load_c", "Load Capacitance", "F"))
            .field(eng("esr", "ESR", "Ω"))
            .field(FieldSpec::new("stability_ppm", "Stability (ppm)", Float))
            .summary("frequency", "A {} crystal")
            .build(),
        PartTypeSpec::builder("mosfet", "MOSFETs")
            .field(text("mosfet_type", "Type").required())
            .field(eng("vdss", "Max Drain-Source Voltage", "V"))
            .field(eng("vgss", "Max Gate-Source Voltage", "V"))
            .field(eng("vgs_th", "Gate-Source Threshold Voltage", "V"))
            .field(eng("i_d", "Max Drain Current", "A"))
            .field(eng("i_d_pulse", "Max Drain Peak Current", "A"))
            .build(),
        PartTypeSpec::builder("bjt", "BJTs")
            .field(text("bjt_type", "Type").required())
            .field(eng("vcbo", "Max Collector-Base Voltage", "V"))
            .field(eng("vceo", "Max Collector-Emitter Voltage", "V"))
            .field(eng("vebo", "Max Emitter-Base Voltage", "V"))
            .field(eng("i_c", "Max Cont. Collector Current", "A"))
            .field(eng("i_c_peak", "Max Peak Collector Current", "A"))
            .build(),
        PartTypeSpec::builder("connector", "Connectors")
            .field(text("conn_type", "Type").required())
            .build(),
        PartTypeSpec::builder("led", "LEDs")
            .field(text("led_type", "LED Type").required())
            .field(eng("vf", "Forward Voltage", "V"))
            .field(eng("max_i", "Max Current", "A"))
            .build(),
        PartTypeSpec::builder("fuse", "Fuses")
            .field(text("fuse_type", "Fuse Type").required())
            .field(eng("max_v", "Max Voltage", "V"))
            .field(eng("max_i", "Max Current", "A"))
            .field(eng("trip_i", "Trip Current", "A"))
            .field(eng("hold_i", "Hold Current", "A"))
            .build(),
        PartTypeSpec::builder("button", "Buttons")
            .field(text("bt_type", "Button Type").required())
            .field(text("circuit_t", "Button Circuit"))
            .field(eng("max_v", "Voltage Rating", "V"))
            .field(eng("max_i", "Current Rating", "A"))
            .build(),
        PartTypeSpec::builder("misc", "Misc").build(),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::spec::BASELINE_FIELDS;
    use crate::value::ValueKind;

    #[test]
    fn builtin_catalog_is_structurally_sound() {
        let registry = builtin_registry();
        assert_eq!(registry.len(), 13);
        assert!(registry.check().is_empty(), "{:?}", registry.check());
    }

    #[test]
    fn builtin_specs_register_without_refusals() {
        let mut registry = SpecRegistry::new();
        assert!(registry.register_all(builtin_specs()).is_empty());

        let mut again = registry.clone();
        let refused = again.register_all(builtin_specs().into_iter().take(2));
        assert_eq!(refused, vec!["resistor", "capacitor"]);
        assert_eq!(again.len(), registry.len());
    }

    #[test]
    fn summaries_are_data_not_type_checks() {
        let registry = builtin_registry();
        let summarised: Vec<&str> = registry
            .list_types()
            .filter(|spec| !spec.summary.is_empty())
            .map(|spec| spec.type_name.as_str())
            .collect();
        assert_eq!(summarised, vec!["resistor", "capacitor", "inductor", "crystal"]);

        let capacitor = registry.get("capacitor").expect("capacitor");
        let values = std::collections::BTreeMap::from([
            ("capacitance", crate::value::TypedValue::Float(1e-7)),
            ("max_voltage", crate::value::TypedValue::Float(50.0)),
        ]);
        assert_eq!(
            capacitor.summarize(&Values(values)).as_deref(),
            Some("A 100nF capacitor rated for 50V")
        );
    }

    struct Values(std::collections::BTreeMap<&'static str, crate::value::TypedValue>);

    impl crate::filter::FieldSource for Values {
        fn field_value(&self, name: &str) -> Option<crate::value::TypedValue> {
            self.0.get(name).cloned()
        }
    }

    #[test]
    fn every_type_starts_with_the_baseline() {
        for spec in builtin_registry().list_types() {
            let names: Vec<&str> = spec
                .fields
                .keys()
                .take(BASELINE_FIELDS.len())
                .map(String::as_str)
                .collect();
            let baseline: Vec<&str> = BASELINE_FIELDS.iter().map(|f| f.0).collect();
            assert_eq!(names, baseline, "type {}", spec.type_name);
        }
    }

    #[test]
    fn resistor_matches_published_literal() {
        let resistor = builtin_registry().get("resistor").expect("resistor");
        let resistance = resistor.field("resistance").expect("resistance");
        assert_eq!(resistance.kind, ValueKind::EngineeringFloat);
        assert!(resistance.required);
        assert_eq!(resistance.units.as_deref(), Some("Ω"));
        assert_eq!(
            resistor.field("tolerance").expect("tolerance").kind,
            ValueKind::Percentage
        );
        assert_eq!(
            resistor.field("power").expect("power").kind,
            ValueKind::Fraction
        );
    }

    #[test]
    fn catalog_listing_snapshot() {
        let listing: String = builtin_registry()
            .list_types()
            .map(|t| format!("{} {}\n", t.type_name, t.extension_fields().count()))
            .collect();
        insta::assert_snapshot!(listing, @r"
        resistor 3
        capacitor 5
        inductor 3
        diode 4
        ic 1
        crystal 4
        mosfet 6
        bjt 6
        connector 1
        led 3
        fuse 5
        button 4
        misc 0
        ");
    }
}
