//! Shape synthesis: classify entity fields per API purpose and build memoized record shapes.

mod classify;
mod shape;
mod synth;

pub use classify::{classify, ClassifyOptions, FieldSource, FieldSpec, ValueType};
pub use shape::{FieldType, GeneratedShape, ShapeField, ShapeKind};
pub use synth::{SchemaSynthesizer, ShapeKey, ShapeSet};
