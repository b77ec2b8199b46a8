//! Entity introspection: config definitions → descriptors, and the graph holding them.

use crate::config::{Cardinality, EntityConfig};
use crate::error::ConfigError;
use crate::i18n::Localizer;
use crate::model::{ColumnDescriptor, EntityDescriptor, RelationshipDescriptor};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

pub struct Introspector<'a> {
    localizer: &'a Localizer,
}

impl<'a> Introspector<'a> {
    pub fn new(localizer: &'a Localizer) -> Self {
        Introspector { localizer }
    }

    /// Describe one entity. Deterministic for a given definition and language set.
    pub fn describe(&self, entity: &EntityConfig) -> Result<EntityDescriptor, ConfigError> {
        let pk_names: Vec<String> = entity
            .columns
            .iter()
            .filter(|c| c.primary_key)
            .map(|c| c.name.clone())
            .collect();
        match pk_names.len() {
            0 => return Err(ConfigError::MissingPrimaryKey(entity.name.clone())),
            1 => {}
            _ => {
                return Err(ConfigError::CompositePrimaryKey {
                    entity: entity.name.clone(),
                    columns: pk_names,
                })
            }
        }

        let mut columns = Vec::with_capacity(entity.columns.len());
        let mut localized = Vec::new();
        for c in &entity.columns {
            columns.push(ColumnDescriptor {
                name: c.name.clone(),
                scalar: c.type_,
                nullable: c.nullable,
                primary_key: c.primary_key,
                has_default: c.default.is_some(),
                default: c.default.clone(),
            });
            if c.localized && !c.primary_key {
                localized.push(c.name.clone());
                for lang in self.localizer.translations() {
                    columns.push(ColumnDescriptor {
                        name: self.localizer.resolve_field(&c.name, lang),
                        scalar: c.type_,
                        nullable: true,
                        primary_key: false,
                        has_default: false,
                        default: None,
                    });
                }
            }
        }

        let mut seen = HashSet::new();
        for c in &columns {
            if !seen.insert(c.name.as_str()) {
                return Err(ConfigError::Validation(format!(
                    "entity {} has duplicate column '{}'",
                    entity.name, c.name
                )));
            }
        }

        let mut relationships = Vec::with_capacity(entity.relationships.len());
        for r in &entity.relationships {
            if seen.contains(r.name.as_str()) && r.cardinality == Cardinality::OneToMany {
                return Err(ConfigError::Validation(format!(
                    "entity {} relationship '{}' collides with a column",
                    entity.name, r.name
                )));
            }
            let rel = match r.cardinality {
                Cardinality::ManyToOne => {
                    let fk = r.foreign_key.clone().unwrap_or_else(|| format!("{}_id", r.name));
                    let col = columns.iter().find(|c| c.name == fk).ok_or_else(|| {
                        ConfigError::MissingReference {
                            kind: "foreign key column",
                            id: format!("{}.{}", entity.name, fk),
                        }
                    })?;
                    RelationshipDescriptor {
                        name: r.name.clone(),
                        target: r.target.clone(),
                        cardinality: r.cardinality,
                        owning_key_nullable: col.nullable,
                        foreign_key: fk,
                    }
                }
                Cardinality::OneToMany => RelationshipDescriptor {
                    name: r.name.clone(),
                    target: r.target.clone(),
                    cardinality: r.cardinality,
                    foreign_key: r
                        .foreign_key
                        .clone()
                        .unwrap_or_else(|| format!("{}_id", entity.name.to_lowercase())),
                    owning_key_nullable: true,
                },
            };
            relationships.push(rel);
        }

        let pk_index = columns.iter().position(|c| c.primary_key).unwrap_or_default();
        Ok(EntityDescriptor {
            name: entity.name.clone(),
            table: entity.table.clone().unwrap_or_else(|| entity.name.to_lowercase()),
            columns,
            relationships,
            localized,
            pk_index,
        })
    }
}

/// All introspected entities, in registration order. Relationship targets are resolved lazily
/// at synthesis time, so mutually-referencing entities may be registered in any order as long as
/// all of them are registered before synthesis starts.
#[derive(Clone, Debug, Default)]
pub struct EntityGraph {
    entities: Vec<Arc<EntityDescriptor>>,
    by_name: HashMap<String, usize>,
}

impl EntityGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Describe every entity and add it to a fresh graph.
    pub fn build<'c>(
        entities: impl IntoIterator<Item = &'c EntityConfig>,
        localizer: &Localizer,
    ) -> Result<Self, ConfigError> {
        let introspector = Introspector::new(localizer);
        let mut graph = Self::new();
        for e in entities {
            graph.insert(introspector.describe(e)?)?;
        }
        Ok(graph)
    }

    pub fn insert(&mut self, descriptor: EntityDescriptor) -> Result<Arc<EntityDescriptor>, ConfigError> {
        if self.by_name.contains_key(&descriptor.name) {
            return Err(ConfigError::DuplicateEntity(descriptor.name));
        }
        let descriptor = Arc::new(descriptor);
        self.by_name.insert(descriptor.name.clone(), self.entities.len());
        self.entities.push(descriptor.clone());
        Ok(descriptor)
    }

    pub fn get(&self, name: &str) -> Option<&Arc<EntityDescriptor>> {
        self.by_name.get(name).map(|&i| &self.entities[i])
    }

    /// Look up `target` on behalf of `referrer`; unknown targets are `UnresolvedEntity`.
    pub fn resolve(&self, referrer: &str, target: &str) -> Result<&Arc<EntityDescriptor>, ConfigError> {
        self.get(target).ok_or_else(|| ConfigError::UnresolvedEntity {
            entity: referrer.to_string(),
            target: target.to_string(),
        })
    }

    pub fn iter(&self) -> impl Iterator<Item = &Arc<EntityDescriptor>> {
        self.entities.iter()
    }

    pub fn len(&self) -> usize {
        self.entities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ScalarType;
    use crate::fixtures;
    use serde_json::json;

    fn localizer() -> Localizer {
        Localizer::new("en", ["en", "ru"].map(String::from))
    }

    fn entity(v: serde_json::Value) -> EntityConfig {
        serde_json::from_value(v).unwrap()
    }

    #[test]
    fn describes_columns_in_order_with_localized_variants() {
        let l = localizer();
        let d = Introspector::new(&l)
            .describe(&entity(json!({
                "name": "Category",
                "columns": [
                    { "name": "id", "type": "integer", "nullable": false, "primary_key": true },
                    { "name": "name", "type": "string", "nullable": false, "localized": true },
                    { "name": "description", "type": "text" }
                ]
            })))
            .unwrap();
        let names: Vec<_> = d.columns.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["id", "name", "name_ru", "description"]);
        assert_eq!(d.primary_key().name, "id");
        assert_eq!(d.table, "category");
        assert_eq!(d.localized, vec!["name".to_string()]);
        assert!(!d.column("name").unwrap().nullable);
        assert!(d.column("name_ru").unwrap().nullable);
        assert_eq!(d.column("description").unwrap().scalar, ScalarType::Text);
    }

    #[test]
    fn composite_and_missing_primary_keys_fail() {
        let l = localizer();
        let i = Introspector::new(&l);
        let composite = entity(json!({
            "name": "Pairing",
            "columns": [
                { "name": "drink_id", "type": "integer", "primary_key": true },
                { "name": "dish_id", "type": "integer", "primary_key": true }
            ]
        }));
        assert!(matches!(i.describe(&composite), Err(ConfigError::CompositePrimaryKey { .. })));
        let none = entity(json!({ "name": "Note", "columns": [{ "name": "body", "type": "text" }] }));
        assert_eq!(i.describe(&none), Err(ConfigError::MissingPrimaryKey("Note".into())));
    }

    #[test]
    fn many_to_one_requires_foreign_key_column() {
        let l = localizer();
        let e = entity(json!({
            "name": "Drink",
            "columns": [{ "name": "id", "type": "integer", "primary_key": true }],
            "relationships": [{ "name": "category", "target": "Category", "cardinality": "many_to_one" }]
        }));
        assert!(matches!(
            Introspector::new(&l).describe(&e),
            Err(ConfigError::MissingReference { kind: "foreign key column", .. })
        ));
    }

    #[test]
    fn relationship_nullability_follows_owning_column() {
        let l = localizer();
        let graph = EntityGraph::build(&fixtures::wine_catalog().entities, &l).unwrap();
        let drink = graph.get("Drink").unwrap();
        assert!(!drink.relationship("category").unwrap().owning_key_nullable);
        assert!(drink.relationship("region").unwrap().owning_key_nullable);
        assert_eq!(drink.relationship_owning("varietal_id").unwrap().name, "varietal");
        let category = graph.get("Category").unwrap();
        assert_eq!(category.relationship("children").unwrap().foreign_key, "parent_id");
    }

    #[test]
    fn describe_is_deterministic() {
        let l = localizer();
        let config = fixtures::wine_catalog();
        let i = Introspector::new(&l);
        for e in &config.entities {
            assert_eq!(i.describe(e).unwrap(), i.describe(e).unwrap());
        }
    }

    #[test]
    fn graph_rejects_duplicates_and_reports_unresolved() {
        let l = localizer();
        let config = fixtures::wine_catalog();
        let mut graph = EntityGraph::build(&config.entities, &l).unwrap();
        let again = Introspector::new(&l).describe(&config.entities[0]).unwrap();
        assert!(matches!(graph.insert(again), Err(ConfigError::DuplicateEntity(_))));
        assert!(matches!(
            graph.resolve("Drink", "Producer"),
            Err(ConfigError::UnresolvedEntity { .. })
        ));
        assert_eq!(graph.len(), config.entities.len());
    }
}
