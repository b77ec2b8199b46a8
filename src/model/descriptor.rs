//! Read-only entity view produced by introspection and shared by synthesis, repositories and services.

use crate::config::{Cardinality, ColumnDefaultConfig, ScalarType};

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ColumnDescriptor {
    pub name: String,
    pub scalar: ScalarType,
    pub nullable: bool,
    pub primary_key: bool,
    /// Client- or server-side default exists.
    pub has_default: bool,
    pub default: Option<ColumnDefaultConfig>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RelationshipDescriptor {
    pub name: String,
    pub target: String,
    pub cardinality: Cardinality,
    /// many_to_one: our column holding the target id. one_to_many: the target's column pointing at us.
    pub foreign_key: String,
    pub owning_key_nullable: bool,
}

impl RelationshipDescriptor {
    pub fn is_many_to_one(&self) -> bool {
        self.cardinality == Cardinality::ManyToOne
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EntityDescriptor {
    pub name: String,
    pub table: String,
    pub columns: Vec<ColumnDescriptor>,
    pub relationships: Vec<RelationshipDescriptor>,
    /// Base names of localized columns; their `<name>_<lang>` variants are in `columns`.
    pub localized: Vec<String>,
    pub(crate) pk_index: usize,
}

impl EntityDescriptor {
    pub fn primary_key(&self) -> &ColumnDescriptor {
        &self.columns[self.pk_index]
    }

    pub fn column(&self, name: &str) -> Option<&ColumnDescriptor> {
        self.columns.iter().find(|c| c.name == name)
    }

    pub fn relationship(&self, name: &str) -> Option<&RelationshipDescriptor> {
        self.relationships.iter().find(|r| r.name == name)
    }

    /// The many-to-one relationship whose foreign key is `column`, if any.
    pub fn relationship_owning(&self, column: &str) -> Option<&RelationshipDescriptor> {
        self.relationships
            .iter()
            .find(|r| r.is_many_to_one() && r.foreign_key == column)
    }
}
