//! Field classification: descriptor + shape kind + remaining depth → normalized field list.

use crate::config::{Cardinality, ScalarType, SynthesisSettings};
use crate::error::ConfigError;
use crate::model::{ColumnDescriptor, EntityDescriptor, EntityGraph, RelationshipDescriptor};
use crate::schema::ShapeKind;
use std::collections::HashSet;

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ValueType {
    Scalar(ScalarType),
    /// Bare id of a many-to-one target (depth exhausted).
    ForeignKey { target: String, scalar: ScalarType },
    /// Target's Read shape, one level shallower.
    Nested { target: String },
    /// List of the target's Read shape, one level shallower.
    NestedList { target: String },
    /// Ids of one-to-many children.
    IdList { target: String, scalar: ScalarType },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FieldSource<'e> {
    Column(&'e ColumnDescriptor),
    Relationship(&'e RelationshipDescriptor),
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FieldSpec<'e> {
    pub name: String,
    pub value_type: ValueType,
    pub optional: bool,
    pub is_relationship: bool,
    pub source: FieldSource<'e>,
}

#[derive(Clone, Debug, Default)]
pub struct ClassifyOptions {
    /// Field names never excluded by kind policy.
    pub always_include: HashSet<String>,
    /// Emit one-to-many relationships as id lists when only one level of depth remains.
    pub include_one_to_many_at_depth_1: bool,
}

impl ClassifyOptions {
    pub fn from_settings(settings: &SynthesisSettings) -> Self {
        ClassifyOptions {
            always_include: settings.always_include.iter().cloned().collect(),
            include_one_to_many_at_depth_1: settings.include_one_to_many_at_depth_1,
        }
    }
}

/// Classify `entity` for `kind` with `depth` relationship levels left to expand.
///
/// `List` and `Delete` classify like `Read`; the synthesizer wraps or replaces them.
/// Relationship targets must already be in `graph`.
pub fn classify<'e>(
    graph: &EntityGraph,
    entity: &'e EntityDescriptor,
    kind: ShapeKind,
    depth: u32,
    options: &ClassifyOptions,
) -> Result<Vec<FieldSpec<'e>>, ConfigError> {
    let force_optional = kind == ShapeKind::Update;
    let mut out = Vec::with_capacity(entity.columns.len() + entity.relationships.len());

    for col in &entity.columns {
        let always = options.always_include.contains(&col.name);
        let owner = entity.relationship_owning(&col.name);

        if let Some(rel) = owner {
            let target = graph.resolve(&entity.name, &rel.target)?;
            if depth > 0 {
                out.push(FieldSpec {
                    name: rel.name.clone(),
                    value_type: ValueType::Nested {
                        target: rel.target.clone(),
                    },
                    optional: force_optional
                        || rel.owning_key_nullable
                        || (kind == ShapeKind::Create && col.has_default),
                    is_relationship: true,
                    source: FieldSource::Relationship(rel),
                });
                if !always {
                    continue;
                }
            }
            if let Some(optional) = column_policy(col, kind, always) {
                out.push(FieldSpec {
                    name: col.name.clone(),
                    value_type: ValueType::ForeignKey {
                        target: rel.target.clone(),
                        scalar: target.primary_key().scalar,
                    },
                    optional,
                    is_relationship: false,
                    source: FieldSource::Column(col),
                });
            }
            continue;
        }

        if let Some(optional) = column_policy(col, kind, always) {
            out.push(FieldSpec {
                name: col.name.clone(),
                value_type: ValueType::Scalar(col.scalar),
                optional,
                is_relationship: false,
                source: FieldSource::Column(col),
            });
        }
    }

    for rel in entity.relationships.iter().filter(|r| r.cardinality == Cardinality::OneToMany) {
        let target = graph.resolve(&entity.name, &rel.target)?;
        let always = options.always_include.contains(&rel.name);
        let value_type = match depth {
            0 if !always => continue,
            1 if !(always || options.include_one_to_many_at_depth_1) => continue,
            0 | 1 => ValueType::IdList {
                target: rel.target.clone(),
                scalar: target.primary_key().scalar,
            },
            _ => ValueType::NestedList {
                target: rel.target.clone(),
            },
        };
        out.push(FieldSpec {
            name: rel.name.clone(),
            value_type,
            optional: kind != ShapeKind::Read && kind != ShapeKind::List,
            is_relationship: true,
            source: FieldSource::Relationship(rel),
        });
    }

    Ok(out)
}

/// `None` when the column is excluded for `kind`, otherwise whether it is optional.
fn column_policy(col: &ColumnDescriptor, kind: ShapeKind, always: bool) -> Option<bool> {
    let excluded = match kind {
        ShapeKind::Create | ShapeKind::Update => col.primary_key || col.has_default,
        ShapeKind::Read | ShapeKind::List | ShapeKind::Delete => false,
    };
    if excluded && !always {
        return None;
    }
    Some(match kind {
        ShapeKind::Update => true,
        ShapeKind::Create => col.nullable || col.has_default,
        _ => col.nullable && !col.primary_key,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ColumnDefaultConfig;
    use crate::fixtures;
    use crate::i18n::Localizer;

    fn graph() -> EntityGraph {
        let config = fixtures::wine_catalog();
        EntityGraph::build(&config.entities, &Localizer::from_settings(&config.settings.languages)).unwrap()
    }

    fn names(fields: &[FieldSpec<'_>]) -> Vec<String> {
        fields.iter().map(|f| f.name.clone()).collect()
    }

    #[test]
    fn create_excludes_primary_key_and_defaults() {
        let g = graph();
        let drink = g.get("Drink").unwrap();
        let fields = classify(&g, drink, ShapeKind::Create, 0, &ClassifyOptions::default()).unwrap();
        let names = names(&fields);
        assert!(!names.contains(&"id".to_string()));
        assert!(!names.contains(&"is_active".to_string()));
        assert!(!names.contains(&"created_at".to_string()));
        let fk = fields.iter().find(|f| f.name == "category_id").unwrap();
        assert!(!fk.optional);
        assert_eq!(
            fk.value_type,
            ValueType::ForeignKey { target: "Category".into(), scalar: ScalarType::Integer }
        );
    }

    #[test]
    fn always_include_overrides_exclusion() {
        let g = graph();
        let drink = g.get("Drink").unwrap();
        let options = ClassifyOptions {
            always_include: ["created_at".to_string(), "id".to_string()].into_iter().collect(),
            ..Default::default()
        };
        let fields = classify(&g, drink, ShapeKind::Create, 0, &options).unwrap();
        let created = fields.iter().find(|f| f.name == "created_at").unwrap();
        assert!(created.optional);
        assert!(fields.iter().any(|f| f.name == "id"));
    }

    #[test]
    fn read_keeps_primary_key_required_and_nullables_optional() {
        let g = graph();
        let drink = g.get("Drink").unwrap();
        let fields = classify(&g, drink, ShapeKind::Read, 0, &ClassifyOptions::default()).unwrap();
        let id = fields.iter().find(|f| f.name == "id").unwrap();
        assert!(!id.optional);
        assert!(fields.iter().find(|f| f.name == "vintage").unwrap().optional);
        assert!(!fields.iter().find(|f| f.name == "created_at").unwrap().optional);
    }

    #[test]
    fn update_forces_everything_optional() {
        let g = graph();
        for entity in g.iter() {
            let fields = classify(&g, entity, ShapeKind::Update, 2, &ClassifyOptions::default()).unwrap();
            assert!(fields.iter().all(|f| f.optional), "{}", entity.name);
        }
    }

    #[test]
    fn many_to_one_nests_at_the_foreign_key_position() {
        let g = graph();
        let drink = g.get("Drink").unwrap();
        let fields = classify(&g, drink, ShapeKind::Create, 1, &ClassifyOptions::default()).unwrap();
        let names = names(&fields);
        let cat = names.iter().position(|n| n == "category").unwrap();
        let region = names.iter().position(|n| n == "region").unwrap();
        assert!(cat < region);
        assert!(!names.contains(&"category_id".to_string()));
        assert!(!fields[cat].optional);
        assert!(fields[region].optional);
        assert!(fields[cat].is_relationship);
    }

    #[test]
    fn defaulted_foreign_key_makes_the_nested_create_field_optional() {
        let mut config = fixtures::wine_catalog();
        let drink = config.entities.iter_mut().find(|e| e.name == "Drink").unwrap();
        let category_id = drink.columns.iter_mut().find(|c| c.name == "category_id").unwrap();
        category_id.default = Some(ColumnDefaultConfig::Literal("1".into()));
        let g = EntityGraph::build(&config.entities, &Localizer::from_settings(&config.settings.languages)).unwrap();
        let drink = g.get("Drink").unwrap();

        let create = classify(&g, drink, ShapeKind::Create, 1, &ClassifyOptions::default()).unwrap();
        assert!(create.iter().find(|f| f.name == "category").unwrap().optional);
        let read = classify(&g, drink, ShapeKind::Read, 1, &ClassifyOptions::default()).unwrap();
        assert!(!read.iter().find(|f| f.name == "category").unwrap().optional);
        let flat = classify(&g, drink, ShapeKind::Create, 0, &ClassifyOptions::default()).unwrap();
        assert!(!names(&flat).contains(&"category_id".to_string()));
    }

    #[test]
    fn one_to_many_depends_on_remaining_depth() {
        let g = graph();
        let category = g.get("Category").unwrap();
        let defaults = ClassifyOptions::default();

        let shallow = classify(&g, category, ShapeKind::Read, 1, &defaults).unwrap();
        assert!(!names(&shallow).contains(&"children".to_string()));

        let with_ids = ClassifyOptions {
            include_one_to_many_at_depth_1: true,
            ..Default::default()
        };
        let ids = classify(&g, category, ShapeKind::Read, 1, &with_ids).unwrap();
        let children = ids.iter().find(|f| f.name == "children").unwrap();
        assert!(matches!(children.value_type, ValueType::IdList { .. }));

        let deep = classify(&g, category, ShapeKind::Read, 2, &defaults).unwrap();
        let drinks = deep.iter().find(|f| f.name == "drinks").unwrap();
        assert_eq!(drinks.value_type, ValueType::NestedList { target: "Drink".into() });
        assert!(!drinks.optional);
    }

    #[test]
    fn unresolved_target_is_reported() {
        let l = Localizer::new("en", ["en".to_string()]);
        let config = fixtures::wine_catalog();
        let drink_only: Vec<_> = config.entities.iter().filter(|e| e.name == "Drink").collect();
        let g = EntityGraph::build(drink_only, &l).unwrap();
        let drink = g.get("Drink").unwrap();
        let err = classify(&g, drink, ShapeKind::Read, 0, &ClassifyOptions::default()).unwrap_err();
        assert!(matches!(err, ConfigError::UnresolvedEntity { ref target, .. } if target == "Category"));
    }
}
