//! Generated record shapes: ordered, tagged field lists describing one API purpose of an entity.

use crate::config::ScalarType;
use serde_json::{json, Value};
use std::fmt;
use std::sync::Arc;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ShapeKind {
    Create,
    Update,
    Read,
    Delete,
    List,
}

impl ShapeKind {
    pub const ALL: [ShapeKind; 5] = [
        ShapeKind::Create,
        ShapeKind::Update,
        ShapeKind::Read,
        ShapeKind::Delete,
        ShapeKind::List,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ShapeKind::Create => "Create",
            ShapeKind::Update => "Update",
            ShapeKind::Read => "Read",
            ShapeKind::Delete => "Delete",
            ShapeKind::List => "List",
        }
    }
}

impl fmt::Display for ShapeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum FieldType {
    Scalar(ScalarType),
    List(Box<FieldType>),
    Shape(Arc<GeneratedShape>),
}

impl FieldType {
    /// Display name: scalar name, `list<...>`, or the nested shape's name.
    pub fn type_name(&self) -> String {
        match self {
            FieldType::Scalar(s) => s.as_str().to_string(),
            FieldType::List(inner) => format!("list<{}>", inner.type_name()),
            FieldType::Shape(shape) => shape.name.clone(),
        }
    }

    fn nesting_depth(&self) -> u32 {
        match self {
            FieldType::Scalar(_) => 0,
            FieldType::List(inner) => inner.nesting_depth(),
            FieldType::Shape(shape) => 1 + shape.nesting_depth(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ShapeField {
    pub name: String,
    pub ty: FieldType,
    pub optional: bool,
}

impl ShapeField {
    pub fn required(name: impl Into<String>, ty: FieldType) -> Self {
        ShapeField {
            name: name.into(),
            ty,
            optional: false,
        }
    }
}

/// Identity is `(entity, kind, depth)`; two shapes with the same identity are structurally equal.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct GeneratedShape {
    pub name: String,
    pub entity: String,
    pub kind: ShapeKind,
    pub depth: u32,
    pub fields: Vec<ShapeField>,
    /// Localized base names carried over from the entity, for per-language projection.
    pub localized: Vec<String>,
}

impl GeneratedShape {
    pub fn shape_name(entity: &str, kind: ShapeKind, depth: u32) -> String {
        format!("{}{}{}", entity, kind, depth)
    }

    pub fn field(&self, name: &str) -> Option<&ShapeField> {
        self.fields.iter().find(|f| f.name == name)
    }

    pub fn field_names(&self) -> Vec<&str> {
        self.fields.iter().map(|f| f.name.as_str()).collect()
    }

    /// How many nested shapes deep the deepest field goes (0 for scalar-only shapes).
    pub fn nesting_depth(&self) -> u32 {
        self.fields.iter().map(|f| f.ty.nesting_depth()).max().unwrap_or(0)
    }

    /// Compact JSON description, used by the `/routes` listing.
    pub fn describe(&self) -> Value {
        let fields: Vec<Value> = self
            .fields
            .iter()
            .map(|f| json!({ "name": f.name, "type": f.ty.type_name(), "optional": f.optional }))
            .collect();
        json!({
            "name": self.name,
            "entity": self.entity,
            "kind": self.kind.as_str(),
            "depth": self.depth,
            "fields": fields,
        })
    }
}
