//! The spec registry: one immutable catalog of part types per process.
//!
//! Built once at startup and shared by reference. `register` exists for
//! setup and tests; nothing mutates a registry once it is handed out.

use crate::error::ValidationError;
use crate::spec::{FieldSpec, PartTypeSpec};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// Catalog of part types, in registration order.
#[derive(Debug, Clone, Default)]
pub struct SpecRegistry {
    types: IndexMap<String, PartTypeSpec>,
}

/// A structural problem found by [`SpecRegistry::check`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegistryDefect {
    pub type_name: String,
    pub field: String,
    pub message: String,
}

impl SpecRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, spec: PartTypeSpec) -> Result<(), ValidationError> {
        if self.types.contains_key(&spec.type_name) {
            return Err(ValidationError::DuplicateType(spec.type_name));
        }
        self.types.insert(spec.type_name.clone(), spec);
        Ok(())
    }

    /// Register every spec in order, returning the type names refused as
    /// duplicates.
    pub fn register_all(&mut self, specs: impl IntoIterator<Item = PartTypeSpec>) -> Vec<String> {
        specs
            .into_iter()
            .filter_map(|spec| match self.register(spec) {
                Ok(()) => None,
                Err(ValidationError::DuplicateType(name)) => Some(name),
                Err(other) => Some(other.to_string()),
            })
            .collect()
    }

    pub fn get(&self, type_name: &str) -> Result<&PartTypeSpec, ValidationError> {
        self.types
            .get(type_name)
            .ok_or_else(|| ValidationError::UnknownType(type_name.to_string()))
    }

    pub fn field(&self, type_name: &str, field_name: &str) -> Result<&FieldSpec, ValidationError> {
        self.get(type_name)?
            .field(field_name)
            .ok_or_else(|| ValidationError::UnknownField {
                type_name: type_name.to_string(),
                field: field_name.to_string(),
            })
    }

    /// All registered types, in registration order.
    pub fn list_types(&self) -> impl Iterator<Item = &PartTypeSpec> {
        self.types.values()
    }

    pub fn contains(&self, type_name: &str) -> bool {
        self.types.contains_key(type_name)
    }

    pub fn len(&self) -> usize {
        self.types.len()
    }

    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }

    /// Whether any registered type declares `field_name`.
    pub fn any_declares(&self, field_name: &str) -> bool {
        self.types.values().any(|t| t.field(field_name).is_some())
    }

    /// Cross-check display orders against declared fields.
    ///
    /// Every displayed name must be declared, and every declared field
    /// other than `ipn` (the row key) must be displayed.
    pub fn check(&self) -> Vec<RegistryDefect> {
        let mut defects = Vec::new();
        for spec in self.types.values() {
            for name in &spec.display_order {
                if spec.field(name).is_none() {
                    defects.push(RegistryDefect {
                        type_name: spec.type_name.clone(),
                        field: name.clone(),
                        message: "displayed but not declared".to_string(),
                    });
                }
            }
            for field in spec.fields() {
                if field.name != "ipn" && !spec.display_order.contains(&field.name) {
                    defects.push(RegistryDefect {
                        type_name: spec.type_name.clone(),
                        field: field.name.clone(),
                        message: "declared but never displayed".to_string(),
                    });
                }
            }
            for segment in &spec.summary {
                if spec.field(&segment.field).is_none() {
                    defects.push(RegistryDefect {
                        type_name: spec.type_name.clone(),
                        field: segment.field.clone(),
                        message: "summarised but not declared".to_string(),
                    });
                }
            }
        }
        defects
    }
}
