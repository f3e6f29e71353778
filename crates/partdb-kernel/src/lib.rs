//! # partdb kernel
//!
//! The declarative part model: a part is whatever its type spec says it is.
//!
//! This crate is **storage-agnostic**: it does not know where records live
//! or how they are persisted. It only prescribes which fields a part type
//! carries, how raw text becomes a typed value for a field, and how filter
//! clauses compare typed values.
//!
//! ## Architecture
//!
//! ```text
//! SpecRegistry          ← immutable catalog of PartTypeSpecs (built once)
//!     │
//! PartTypeSpec          ← baseline fields + type-specific extension fields
//!     │
//! FieldSpec             ← name, display name, ValueKind, required, units
//!     │
//! parse / format        ← raw text ⇄ TypedValue (engineering, %, fractions)
//!     │
//! FilterClause          ← field <op> value, AND-combined over FieldSources
//! ```

pub mod catalog;
pub mod error;
pub mod filter;
pub mod parse;
pub mod registry;
pub mod spec;
pub mod value;

pub use catalog::builtin_registry;
pub use error::ValidationError;
pub use filter::{FieldSource, FilterClause, apply, matches, parse_clause, parse_clause_any, validate, validate_all};
pub use parse::{ParseOutcome, format, format_engineering, parse, parse_engineering};
pub use registry::{RegistryDefect, SpecRegistry};
pub use spec::{BASELINE_FIELDS, FieldSpec, PartTypeSpec, PartTypeSpecBuilder, SummarySegment};
pub use value::{CompareOp, TypedValue, ValueKind};
