//! Field and part-type specifications.
//!
//! A `PartTypeSpec` is the whole description of a part type: every record
//! of that type is validated, parsed, and displayed through it. Every spec
//! starts from the same baseline fields (stock, ipn, package, ...) and
//! appends its own extension fields after them.

use crate::filter::FieldSource;
use crate::parse::format;
use crate::value::ValueKind;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// One field of a part type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldSpec {
    pub name: String,
    pub display_name: String,
    pub kind: ValueKind,
    #[serde(default)]
    pub required: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub units: Option<String>,
}

impl FieldSpec {
    /// An optional field without units.
    pub fn new(name: impl Into<String>, display_name: impl Into<String>, kind: ValueKind) -> Self {
        Self {
            name: name.into(),
            display_name: display_name.into(),
            kind,
            required: false,
            units: None,
        }
    }

    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    pub fn units(mut self, units: impl Into<String>) -> Self {
        self.units = Some(units.into());
        self
    }

    /// Declared units, treating an empty string as none.
    pub fn unit_suffix(&self) -> Option<&str> {
        self.units.as_deref().filter(|u| !u.is_empty())
    }
}

/// `(name, display name, kind, required)` of the baseline fields, in order.
pub const BASELINE_FIELDS: &[(&str, &str, ValueKind, bool)] = &[
    ("stock", "Stock", ValueKind::Int, true),
    ("ipn", "IPN", ValueKind::Text, true),
    ("mfr_part_numb", "Mfr Part #", ValueKind::Text, false),
    ("manufacturer", "Manufacturer", ValueKind::Text, false),
    ("package", "Package", ValueKind::Text, true),
    ("storage", "Storage Location", ValueKind::Text, false),
    ("comments", "Comments", ValueKind::Text, false),
    ("datasheet", "Datasheet", ValueKind::Text, false),
    ("user", "User", ValueKind::Text, false),
];

/// Baseline fields displayed before the extension fields.
const DISPLAY_LEAD: &[&str] = &["stock", "mfr_part_numb", "manufacturer"];

/// Baseline fields displayed after the extension fields.
const DISPLAY_TAIL: &[&str] = &["package", "storage", "comments", "datasheet", "user"];

/// One piece of a type's one-line summary.
///
/// `template` has its `{}` replaced by the formatted value of `field`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SummarySegment {
    pub field: String,
    pub template: String,
}

/// A declarative part type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PartTypeSpec {
    pub type_name: String,
    pub display_name: String,
    pub fields: IndexMap<String, FieldSpec>,
    pub display_order: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub summary: Vec<SummarySegment>,
}

impl PartTypeSpec {
    /// Start a spec pre-populated with the baseline fields.
    pub fn builder(
        type_name: impl Into<String>,
        display_name: impl Into<String>,
    ) -> PartTypeSpecBuilder {
        let mut fields = IndexMap::new();
        for (name, display, kind, required) in BASELINE_FIELDS {
            let mut field = FieldSpec::new(*name, *display, *kind);
            field.required = *required;
            fields.insert(name.to_string(), field);
        }
        PartTypeSpecBuilder {
            type_name: type_name.into(),
            display_name: display_name.into(),
            fields,
            extensions: Vec::new(),
            summary: Vec::new(),
        }
    }

    pub fn field(&self, name: &str) -> Option<&FieldSpec> {
        self.fields.get(name)
    }

    pub fn fields(&self) -> impl Iterator<Item = &FieldSpec> {
        self.fields.values()
    }

    pub fn required_fields(&self) -> impl Iterator<Item = &FieldSpec> {
        self.fields.values().filter(|f| f.required)
    }

    /// Fields in display order.
    ///
    /// Names in `display_order` that are not declared are skipped.
    pub fn displayed_fields(&self) -> impl Iterator<Item = &FieldSpec> {
        self.display_order
            .iter()
            .filter_map(|name| self.fields.get(name))
    }

    /// Fields appended after the baseline.
    pub fn extension_fields(&self) -> impl Iterator<Item = &FieldSpec> {
        self.fields.values().skip(BASELINE_FIELDS.len())
    }

    /// Render the one-line summary of a record of this type.
    ///
    /// `None` when the type has no summary or the record lacks the lead
    /// segment's field. Later segments are left out when their field is
    /// unset.
    pub fn summarize<S: FieldSource + ?Sized>(&self, record: &S) -> Option<String> {
        let (lead, rest) = self.summary.split_first()?;
        let rendered = |segment: &SummarySegment| {
            let field = self.field(&segment.field)?;
            let value = record.field_value(&segment.field)?;
            Some(segment.template.replacen("{}", &format(&value, field), 1))
        };
        let mut summary = rendered(lead)?;
        for segment in rest {
            if let Some(piece) = rendered(segment) {
                summary.push_str(&piece);
            }
        }
        Some(summary)
    }
}

/// Builder returned by [`PartTypeSpec::builder`].
#[derive(Debug, Clone)]
pub struct PartTypeSpecBuilder {
    type_name: String,
    display_name: String,
    fields: IndexMap<String, FieldSpec>,
    extensions: Vec<String>,
    summary: Vec<SummarySegment>,
}

impl PartTypeSpecBuilder {
    /// Append an extension field. A field reusing a baseline name replaces it
    /// in place.
    pub fn field(mut self, field: FieldSpec) -> Self {
        let name = field.name.clone();
        if self.fields.insert(name.clone(), field).is_none() {
            self.extensions.push(name);
        }
        self
    }

    /// Append a summary segment. The first one leads the summary.
    pub fn summary(mut self, field: impl Into<String>, template: impl Into<String>) -> Self {
        self.summary.push(SummarySegment {
            field: field.into(),
            template: template.into(),
        });
        self
    }

    pub fn build(self) -> PartTypeSpec {
        let display_order = DISPLAY_LEAD
            .iter()
            .map(|s| s.to_string())
            .chain(self.extensions)
            .chain(DISPLAY_TAIL.iter().map(|s| s.to_string()))
            .collect();
        PartTypeSpec {
            type_name: self.type_name,
            display_name: self.display_name,
            fields: self.fields,
            display_order,
            summary: self.summary,
        }
    }
}
