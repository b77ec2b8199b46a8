//! Shape synthesis with a process-wide memo keyed by `(entity, kind, depth)`.

use crate::config::ScalarType;
use crate::error::ConfigError;
use crate::model::EntityGraph;
use crate::schema::{
    classify, ClassifyOptions, FieldType, GeneratedShape, ShapeField, ShapeKind, ValueType,
};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct ShapeKey {
    pub entity: String,
    pub kind: ShapeKind,
    pub depth: u32,
}

type ShapeCache = HashMap<ShapeKey, Arc<GeneratedShape>>;

/// Builds shapes from the entity graph. One lock guards the whole memo, so a shape identity is
/// synthesized at most once even under concurrent first requests.
pub struct SchemaSynthesizer {
    graph: Arc<EntityGraph>,
    options: ClassifyOptions,
    cache: Mutex<ShapeCache>,
}

impl SchemaSynthesizer {
    pub fn new(graph: Arc<EntityGraph>, options: ClassifyOptions) -> Self {
        SchemaSynthesizer {
            graph,
            options,
            cache: Mutex::new(HashMap::new()),
        }
    }

    pub fn graph(&self) -> &Arc<EntityGraph> {
        &self.graph
    }

    pub fn synthesize(&self, entity: &str, kind: ShapeKind, max_depth: i64) -> Result<Arc<GeneratedShape>, ConfigError> {
        let depth = checked_depth(max_depth)?;
        let mut cache = self.cache.lock().unwrap_or_else(PoisonError::into_inner);
        self.synthesize_in(&mut cache, entity, kind, depth)
    }

    /// Eagerly synthesize every kind for every entity. Returns the number of cached shapes.
    pub fn synthesize_all(&self, max_depth: i64) -> Result<usize, ConfigError> {
        let depth = checked_depth(max_depth)?;
        let mut cache = self.cache.lock().unwrap_or_else(PoisonError::into_inner);
        for entity in self.graph.iter() {
            for kind in ShapeKind::ALL {
                self.synthesize_in(&mut cache, &entity.name, kind, depth)?;
            }
        }
        tracing::info!(shapes = cache.len(), depth, "synthesized shapes");
        Ok(cache.len())
    }

    pub fn cached_len(&self) -> usize {
        self.cache.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    fn synthesize_in(
        &self,
        cache: &mut ShapeCache,
        entity: &str,
        kind: ShapeKind,
        depth: u32,
    ) -> Result<Arc<GeneratedShape>, ConfigError> {
        let key = ShapeKey {
            entity: entity.to_string(),
            kind,
            depth,
        };
        if let Some(hit) = cache.get(&key) {
            return Ok(hit.clone());
        }

        let descriptor = self.graph.get(entity).ok_or_else(|| ConfigError::MissingReference {
            kind: "entity",
            id: entity.to_string(),
        })?;

        let fields = match kind {
            ShapeKind::Delete => vec![
                ShapeField::required("id", FieldType::Scalar(descriptor.primary_key().scalar)),
                ShapeField::required("success", FieldType::Scalar(ScalarType::Boolean)),
                ShapeField::required("message", FieldType::Scalar(ScalarType::String)),
            ],
            ShapeKind::List => {
                let read = self.synthesize_in(cache, entity, ShapeKind::Read, depth)?;
                vec![
                    ShapeField::required("items", FieldType::List(Box::new(FieldType::Shape(read)))),
                    ShapeField::required("page", FieldType::Scalar(ScalarType::Integer)),
                    ShapeField::required("page_size", FieldType::Scalar(ScalarType::Integer)),
                    ShapeField::required("total", FieldType::Scalar(ScalarType::Integer)),
                    ShapeField::required("has_next", FieldType::Scalar(ScalarType::Boolean)),
                    ShapeField::required("has_prev", FieldType::Scalar(ScalarType::Boolean)),
                ]
            }
            ShapeKind::Create | ShapeKind::Update | ShapeKind::Read => {
                let specs = classify(&self.graph, descriptor, kind, depth, &self.options)?;
                let mut fields = Vec::with_capacity(specs.len());
                for spec in specs {
                    let ty = match spec.value_type {
                        ValueType::Scalar(s) => FieldType::Scalar(s),
                        ValueType::ForeignKey { scalar, .. } => FieldType::Scalar(scalar),
                        ValueType::IdList { scalar, .. } => FieldType::List(Box::new(FieldType::Scalar(scalar))),
                        ValueType::Nested { target } => {
                            FieldType::Shape(self.synthesize_in(cache, &target, ShapeKind::Read, depth - 1)?)
                        }
                        ValueType::NestedList { target } => FieldType::List(Box::new(FieldType::Shape(
                            self.synthesize_in(cache, &target, ShapeKind::Read, depth - 1)?,
                        ))),
                    };
                    fields.push(ShapeField {
                        name: spec.name,
                        ty,
                        optional: spec.optional,
                    });
                }
                fields
            }
        };

        let shape = Arc::new(GeneratedShape {
            name: GeneratedShape::shape_name(entity, kind, depth),
            entity: entity.to_string(),
            kind,
            depth,
            fields,
            localized: descriptor.localized.clone(),
        });
        tracing::debug!(shape = %shape.name, fields = shape.fields.len(), "synthesized shape");
        cache.insert(key, shape.clone());
        Ok(shape)
    }
}

fn checked_depth(max_depth: i64) -> Result<u32, ConfigError> {
    u32::try_from(max_depth).map_err(|_| ConfigError::NegativeDepth(max_depth))
}

/// The five shapes served for one resource.
#[derive(Clone, Debug, PartialEq)]
pub struct ShapeSet {
    pub entity: String,
    pub depth: u32,
    pub create: Arc<GeneratedShape>,
    pub update: Arc<GeneratedShape>,
    pub read: Arc<GeneratedShape>,
    pub list: Arc<GeneratedShape>,
    pub delete: Arc<GeneratedShape>,
}

impl ShapeSet {
    pub fn synthesize(synth: &SchemaSynthesizer, entity: &str, max_depth: i64) -> Result<Self, ConfigError> {
        Ok(ShapeSet {
            entity: entity.to_string(),
            depth: checked_depth(max_depth)?,
            create: synth.synthesize(entity, ShapeKind::Create, max_depth)?,
            update: synth.synthesize(entity, ShapeKind::Update, max_depth)?,
            read: synth.synthesize(entity, ShapeKind::Read, max_depth)?,
            list: synth.synthesize(entity, ShapeKind::List, max_depth)?,
            delete: synth.synthesize(entity, ShapeKind::Delete, max_depth)?,
        })
    }

    pub fn get(&self, kind: ShapeKind) -> &Arc<GeneratedShape> {
        match kind {
            ShapeKind::Create => &self.create,
            ShapeKind::Update => &self.update,
            ShapeKind::Read => &self.read,
            ShapeKind::List => &self.list,
            ShapeKind::Delete => &self.delete,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EntityConfig;
    use crate::fixtures;
    use crate::i18n::Localizer;
    use serde_json::json;

    fn synth_for(entities: &[EntityConfig], options: ClassifyOptions) -> SchemaSynthesizer {
        let l = Localizer::new("en", ["en".to_string()]);
        SchemaSynthesizer::new(Arc::new(EntityGraph::build(entities, &l).unwrap()), options)
    }

    fn wine() -> SchemaSynthesizer {
        let config = fixtures::wine_catalog();
        let l = Localizer::from_settings(&config.settings.languages);
        SchemaSynthesizer::new(
            Arc::new(EntityGraph::build(&config.entities, &l).unwrap()),
            ClassifyOptions::default(),
        )
    }

    fn entities(v: serde_json::Value) -> Vec<EntityConfig> {
        serde_json::from_value(v).unwrap()
    }

    fn simple_catalog() -> Vec<EntityConfig> {
        entities(json!([
            {
                "name": "Category",
                "columns": [
                    { "name": "id", "type": "integer", "nullable": false, "primary_key": true },
                    { "name": "name", "type": "string", "nullable": false },
                    { "name": "description", "type": "string" }
                ]
            },
            {
                "name": "Drink",
                "columns": [
                    { "name": "id", "type": "integer", "nullable": false, "primary_key": true },
                    { "name": "name", "type": "string", "nullable": false },
                    { "name": "category_id", "type": "integer", "nullable": false }
                ],
                "relationships": [
                    { "name": "category", "target": "Category", "cardinality": "many_to_one" }
                ]
            },
            {
                "name": "Varietal",
                "columns": [
                    { "name": "id", "type": "integer", "nullable": false, "primary_key": true },
                    { "name": "name", "type": "string", "nullable": false }
                ]
            }
        ]))
    }

    fn summary(shape: &GeneratedShape) -> Vec<(String, String, bool)> {
        shape
            .fields
            .iter()
            .map(|f| (f.name.clone(), f.ty.type_name(), f.optional))
            .collect()
    }

    fn s(name: &str, ty: &str, optional: bool) -> (String, String, bool) {
        (name.to_string(), ty.to_string(), optional)
    }

    #[test]
    fn category_read_depth_one() {
        let synth = synth_for(&simple_catalog(), ClassifyOptions::default());
        let shape = synth.synthesize("Category", ShapeKind::Read, 1).unwrap();
        assert_eq!(
            summary(&shape),
            vec![s("id", "integer", false), s("name", "string", false), s("description", "string", true)]
        );
        assert_eq!(shape.name, "CategoryRead1");
    }

    #[test]
    fn drink_create_depth_zero_uses_foreign_key() {
        let synth = synth_for(&simple_catalog(), ClassifyOptions::default());
        let shape = synth.synthesize("Drink", ShapeKind::Create, 0).unwrap();
        assert_eq!(summary(&shape), vec![s("name", "string", false), s("category_id", "integer", false)]);
        assert!(shape.field("category").is_none());
    }

    #[test]
    fn drink_create_depth_one_nests_category() {
        let synth = synth_for(&simple_catalog(), ClassifyOptions::default());
        let shape = synth.synthesize("Drink", ShapeKind::Create, 1).unwrap();
        assert_eq!(summary(&shape), vec![s("name", "string", false), s("category", "CategoryRead0", false)]);
        match &shape.field("category").unwrap().ty {
            FieldType::Shape(nested) => assert_eq!(nested.field_names(), vec!["id", "name", "description"]),
            other => panic!("expected nested shape, got {:?}", other),
        }
    }

    #[test]
    fn update_name_is_optional() {
        let synth = synth_for(&simple_catalog(), ClassifyOptions::default());
        let shape = synth.synthesize("Varietal", ShapeKind::Update, 2).unwrap();
        assert_eq!(summary(&shape), vec![s("name", "string", true)]);
    }

    #[test]
    fn delete_and_list_are_fixed_shapes() {
        let synth = synth_for(&simple_catalog(), ClassifyOptions::default());
        let delete = synth.synthesize("Drink", ShapeKind::Delete, 3).unwrap();
        assert_eq!(delete.field_names(), vec!["id", "success", "message"]);
        let list = synth.synthesize("Drink", ShapeKind::List, 1).unwrap();
        assert_eq!(list.field_names(), vec!["items", "page", "page_size", "total", "has_next", "has_prev"]);
        assert_eq!(list.field("items").unwrap().ty.type_name(), "list<DrinkRead1>");
    }

    #[test]
    fn synthesis_is_idempotent_and_memoized() {
        let synth = wine();
        for entity in ["Country", "Region", "Category", "Varietal", "Drink"] {
            for kind in ShapeKind::ALL {
                for depth in 0..4 {
                    let a = synth.synthesize(entity, kind, depth).unwrap();
                    let b = synth.synthesize(entity, kind, depth).unwrap();
                    assert!(Arc::ptr_eq(&a, &b));
                }
            }
        }
        let fresh = wine();
        let a = synth.synthesize("Drink", ShapeKind::Read, 3).unwrap();
        let b = fresh.synthesize("Drink", ShapeKind::Read, 3).unwrap();
        assert_eq!(*a, *b);
    }

    #[test]
    fn cyclic_graphs_are_depth_bounded() {
        let synth = wine();
        for depth in 0..6u32 {
            for entity in ["Category", "Country", "Drink"] {
                let read = synth.synthesize(entity, ShapeKind::Read, depth.into()).unwrap();
                assert!(read.nesting_depth() <= depth, "{} at {}", entity, depth);
            }
        }
        let deep = synth.synthesize("Category", ShapeKind::Read, 2).unwrap();
        assert_eq!(deep.nesting_depth(), 2);
        assert_eq!(deep.field("children").unwrap().ty.type_name(), "list<CategoryRead1>");
    }

    #[test]
    fn create_never_contains_defaulted_columns() {
        let synth = wine();
        let graph = synth.graph().clone();
        for entity in graph.iter() {
            for depth in 0..3 {
                let shape = synth.synthesize(&entity.name, ShapeKind::Create, depth).unwrap();
                for col in entity.columns.iter().filter(|c| c.has_default) {
                    assert!(shape.field(&col.name).is_none(), "{}.{}", entity.name, col.name);
                }
            }
        }
    }

    #[test]
    fn negative_depth_and_unknown_entity() {
        let synth = wine();
        assert_eq!(
            synth.synthesize("Drink", ShapeKind::Read, -1).unwrap_err(),
            ConfigError::NegativeDepth(-1)
        );
        assert!(matches!(
            synth.synthesize("Beer", ShapeKind::Read, 1),
            Err(ConfigError::MissingReference { .. })
        ));
    }

    #[test]
    fn synthesize_all_caches_every_kind() {
        let synth = wine();
        let n = synth.synthesize_all(1).unwrap();
        assert!(n >= 5 * 5);
        assert_eq!(synth.cached_len(), n);
        let set = ShapeSet::synthesize(&synth, "Drink", 1).unwrap();
        assert_eq!(synth.cached_len(), n);
        assert_eq!(set.get(ShapeKind::List).name, "DrinkList1");
    }

    #[test]
    fn concurrent_first_requests_share_one_shape() {
        let synth = Arc::new(wine());
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let synth = synth.clone();
                std::thread::spawn(move || synth.synthesize("Drink", ShapeKind::Read, 2).unwrap())
            })
            .collect();
        let shapes: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        assert!(shapes.windows(2).all(|w| Arc::ptr_eq(&w[0], &w[1])));
    }
}
