//! Per-resource CRUD over generated shapes: validation on the way in, nested expansion,
//! localized projection and sensitive-column stripping on the way out.

use crate::config::{PaginationSettings, ResourceConfig, ScalarType, ValidationRule, ALL_OPERATIONS};
use crate::documents::{DocumentMetadata, DocumentStore};
use crate::error::{AppError, ConfigError, FieldError};
use crate::i18n::Localizer;
use crate::model::{ColumnDescriptor, EntityDescriptor, EntityGraph, RelationshipDescriptor};
use crate::repository::{ListQuery, Repository};
use crate::schema::{FieldType, GeneratedShape, ShapeSet};
use crate::service::{RequestValidator, ShapeValidator};
use serde_json::{json, Map, Value};
use std::collections::{HashMap, HashSet};
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

/// Upper bound on children loaded for one one-to-many field.
const MAX_CHILDREN: u32 = 1000;

type Expansion<'a> = Pin<Box<dyn Future<Output = Result<Map<String, Value>, AppError>> + Send + 'a>>;

/// Collaborators shared by every resource service.
pub struct CatalogContext {
    pub graph: Arc<EntityGraph>,
    pub localizer: Arc<Localizer>,
    /// One repository per entity name.
    pub repositories: HashMap<String, Arc<dyn Repository>>,
    pub documents: Arc<dyn DocumentStore>,
    pub pagination: PaginationSettings,
    /// Columns never returned, by entity name. Applied at every nesting level.
    pub sensitive: HashMap<String, HashSet<String>>,
}

impl CatalogContext {
    pub fn repository(&self, entity: &str) -> Result<&Arc<dyn Repository>, AppError> {
        self.repositories.get(entity).ok_or_else(|| {
            AppError::Config(ConfigError::MissingReference {
                kind: "repository",
                id: entity.to_string(),
            })
        })
    }

    /// Project a stored row onto `shape`, loading related rows for nested fields.
    fn expand<'a>(&'a self, row: Map<String, Value>, shape: &'a GeneratedShape) -> Expansion<'a> {
        Box::pin(async move {
            let entity = self.graph.resolve(&shape.entity, &shape.entity)?;
            let mut out = Map::with_capacity(shape.fields.len());
            for field in &shape.fields {
                let value = match &field.ty {
                    FieldType::Scalar(_) => row.get(&field.name).cloned().unwrap_or(Value::Null),
                    FieldType::Shape(nested) => {
                        let rel = relationship(entity, &field.name)?;
                        match row.get(&rel.foreign_key) {
                            None | Some(Value::Null) => Value::Null,
                            Some(fk) => match self.repository(&rel.target)?.get(fk).await? {
                                Some(Value::Object(target)) => Value::Object(self.expand(target, nested).await?),
                                _ => {
                                    tracing::warn!(entity = %entity.name, relationship = %rel.name, key = %fk, "dangling reference");
                                    Value::Null
                                }
                            },
                        }
                    }
                    FieldType::List(inner) => {
                        let rel = relationship(entity, &field.name)?;
                        let pk = row.get(&entity.primary_key().name).cloned().unwrap_or(Value::Null);
                        let children = self.children(entity, rel, pk).await?;
                        match inner.as_ref() {
                            FieldType::Shape(nested) => {
                                let mut items = Vec::with_capacity(children.len());
                                for child in children {
                                    items.push(Value::Object(self.expand(child, nested).await?));
                                }
                                Value::Array(items)
                            }
                            _ => {
                                let target = self.graph.resolve(&entity.name, &rel.target)?;
                                let pk = &target.primary_key().name;
                                Value::Array(children.iter().filter_map(|c| c.get(pk).cloned()).collect())
                            }
                        }
                    }
                };
                out.insert(field.name.clone(), value);
            }
            self.strip_sensitive(&entity.name, &mut out);
            Ok(out)
        })
    }

    /// Remove the entity's sensitive columns along with their per-language variants.
    fn strip_sensitive(&self, entity: &str, record: &mut Map<String, Value>) {
        let Some(columns) = self.sensitive.get(entity) else { return };
        for col in columns {
            record.remove(col);
            for lang in self.localizer.translations() {
                record.remove(&self.localizer.resolve_field(col, lang));
            }
        }
    }

    async fn children(
        &self,
        entity: &EntityDescriptor,
        rel: &RelationshipDescriptor,
        pk: Value,
    ) -> Result<Vec<Map<String, Value>>, AppError> {
        if pk.is_null() {
            return Ok(Vec::new());
        }
        let query = ListQuery::window(MAX_CHILDREN, 0).filter(rel.foreign_key.clone(), pk);
        let page = self.repository(&rel.target)?.get_all(&query).await?;
        if page.total > page.rows.len() as u64 {
            tracing::warn!(
                entity = %entity.name,
                relationship = %rel.name,
                total = page.total,
                loaded = page.rows.len(),
                "one-to-many expansion truncated"
            );
        }
        Ok(page.rows.into_iter().filter_map(into_object).collect())
    }

    /// Apply the per-language view to `record` and every nested record.
    fn localize(&self, record: &mut Map<String, Value>, shape: &GeneratedShape, language: &str) {
        for field in &shape.fields {
            let nested = match &field.ty {
                FieldType::Shape(s) => s,
                FieldType::List(inner) => match inner.as_ref() {
                    FieldType::Shape(s) => s,
                    _ => continue,
                },
                FieldType::Scalar(_) => continue,
            };
            match record.get_mut(&field.name) {
                Some(Value::Object(obj)) => self.localize(obj, nested, language),
                Some(Value::Array(items)) => {
                    for item in items.iter_mut() {
                        if let Value::Object(obj) = item {
                            self.localize(obj, nested, language);
                        }
                    }
                }
                _ => {}
            }
        }
        self.localizer.localize_record(record, &shape.localized, language);
        self.strip_sensitive(&shape.entity, record);
    }
}

fn relationship<'e>(entity: &'e EntityDescriptor, name: &str) -> Result<&'e RelationshipDescriptor, AppError> {
    entity.relationship(name).ok_or_else(|| {
        AppError::Config(ConfigError::MissingReference {
            kind: "relationship",
            id: format!("{}.{}", entity.name, name),
        })
    })
}

fn into_object(v: Value) -> Option<Map<String, Value>> {
    match v {
        Value::Object(m) => Some(m),
        _ => None,
    }
}

fn stored_row(v: Value) -> Result<Map<String, Value>, AppError> {
    into_object(v).ok_or_else(|| AppError::Storage("repository returned a non-object row".into()))
}

/// Typed value for a path or query parameter of `column`.
pub fn coerce_param(column: &ColumnDescriptor, raw: &str) -> Result<Value, AppError> {
    let bad = || AppError::BadRequest(format!("'{}' is not a valid {} for {}", raw, column.scalar.as_str(), column.name));
    if raw == "null" && column.nullable {
        return Ok(Value::Null);
    }
    match column.scalar {
        ScalarType::Integer | ScalarType::BigInteger => raw.parse::<i64>().map(Value::from).map_err(|_| bad()),
        ScalarType::Float | ScalarType::Decimal => raw
            .parse::<f64>()
            .ok()
            .and_then(serde_json::Number::from_f64)
            .map(Value::Number)
            .ok_or_else(bad),
        ScalarType::Boolean => raw.parse::<bool>().map(Value::Bool).map_err(|_| bad()),
        ScalarType::Uuid => uuid::Uuid::parse_str(raw)
            .map(|u| Value::String(u.to_string()))
            .map_err(|_| bad()),
        _ => Ok(Value::String(raw.to_string())),
    }
}

/// Operations for one resource key.
pub struct CatalogService {
    key: String,
    operations: HashSet<String>,
    rules: HashMap<String, ValidationRule>,
    sensitive: HashSet<String>,
    entity: Arc<EntityDescriptor>,
    shapes: Arc<ShapeSet>,
    ctx: Arc<CatalogContext>,
}

impl CatalogService {
    pub fn new(resource: &ResourceConfig, shapes: Arc<ShapeSet>, ctx: Arc<CatalogContext>) -> Result<Self, ConfigError> {
        let entity = ctx
            .graph
            .get(&resource.entity)
            .cloned()
            .ok_or_else(|| ConfigError::MissingReference {
                kind: "entity",
                id: resource.entity.clone(),
            })?;
        if !ctx.repositories.contains_key(&entity.name) {
            return Err(ConfigError::MissingReference {
                kind: "repository",
                id: entity.name.clone(),
            });
        }
        let mut operations = HashSet::new();
        for op in &resource.operations {
            let op = op.to_lowercase();
            if !ALL_OPERATIONS.contains(&op.as_str()) {
                return Err(ConfigError::Validation(format!(
                    "resource '{}' lists unknown operation '{}'",
                    resource.key, op
                )));
            }
            operations.insert(op);
        }
        RequestValidator::check_rules(&resource.validation)
            .map_err(|e| ConfigError::Validation(format!("resource '{}': {}", resource.key, e)))?;
        Ok(CatalogService {
            key: resource.key.clone(),
            operations,
            rules: resource.validation.clone(),
            sensitive: resource.sensitive_columns.iter().cloned().collect(),
            entity,
            shapes,
            ctx,
        })
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn entity(&self) -> &Arc<EntityDescriptor> {
        &self.entity
    }

    pub fn shapes(&self) -> &Arc<ShapeSet> {
        &self.shapes
    }

    pub fn allows(&self, operation: &str) -> bool {
        self.operations.contains(operation)
    }

    fn ensure(&self, operation: &str) -> Result<(), AppError> {
        if self.allows(operation) {
            Ok(())
        } else {
            Err(AppError::BadRequest(format!(
                "operation '{}' is not enabled for resource '{}'",
                operation, self.key
            )))
        }
    }

    fn repository(&self) -> Result<&Arc<dyn Repository>, AppError> {
        self.ctx.repository(&self.entity.name)
    }

    pub fn parse_id(&self, raw: &str) -> Result<Value, AppError> {
        coerce_param(self.entity.primary_key(), raw).and_then(|v| {
            if v.is_null() {
                Err(AppError::BadRequest(format!("invalid id '{}'", raw)))
            } else {
                Ok(v)
            }
        })
    }

    fn not_found(&self, id: &str) -> AppError {
        AppError::NotFound(format!("{} '{}'", self.entity.name, id))
    }

    /// Read-shaped response for a stored row; localized when `language` is given.
    async fn present(&self, row: Value, language: Option<&str>) -> Result<Value, AppError> {
        let read = &self.shapes.read;
        let mut record = self.ctx.expand(stored_row(row)?, read).await?;
        if let Some(lang) = language {
            self.ctx.localize(&mut record, read, lang);
        }
        Ok(Value::Object(record))
    }

    /// One page of records, wrapped in the List shape. `filters` are exact matches on columns.
    pub async fn list(
        &self,
        language: &str,
        page: Option<u32>,
        page_size: Option<u32>,
        filters: &[(String, String)],
    ) -> Result<Value, AppError> {
        self.ensure("list")?;
        let language = self.ctx.localizer.require(language)?;
        let page = page.unwrap_or(1);
        if page == 0 {
            return Err(AppError::BadRequest("page must be >= 1".into()));
        }
        let pagination = &self.ctx.pagination;
        let page_size = match page_size.unwrap_or(pagination.default_page_size) {
            0 => return Err(AppError::BadRequest("page_size must be >= 1".into())),
            n => n.min(pagination.max_page_size),
        };
        let offset = (page - 1).saturating_mul(page_size);

        let mut query = ListQuery::window(page_size, offset);
        for (name, raw) in filters {
            let column = self
                .entity
                .column(name)
                .filter(|c| !self.sensitive.contains(&c.name))
                .ok_or_else(|| AppError::BadRequest(format!("unknown filter '{}'", name)))?;
            query = query.filter(name.clone(), coerce_param(column, raw)?);
        }

        let result = self.repository()?.get_all(&query).await?;
        let mut items = Vec::with_capacity(result.rows.len());
        let shown = result.rows.len() as u64;
        for row in result.rows {
            items.push(self.present(row, Some(language)).await?);
        }
        tracing::debug!(resource = %self.key, language, page, page_size, total = result.total, "list");
        Ok(json!({
            "items": items,
            "page": page,
            "page_size": page_size,
            "total": result.total,
            "has_next": u64::from(offset) + shown < result.total,
            "has_prev": page > 1,
        }))
    }

    pub async fn read(&self, language: &str, id: &str) -> Result<Value, AppError> {
        self.ensure("read")?;
        let language = self.ctx.localizer.require(language)?;
        let pk = self.parse_id(id)?;
        let row = self.repository()?.get(&pk).await?.ok_or_else(|| self.not_found(id))?;
        self.present(row, Some(language)).await
    }

    pub async fn create(&self, raw: Value) -> Result<Value, AppError> {
        self.ensure("create")?;
        let record = ShapeValidator::validate(&self.shapes.create, &raw)?;
        RequestValidator::validate(&record, &self.rules)?;
        let columns = self.to_columns(&self.shapes.create, record, false).await?;
        let row = self.repository()?.create(columns).await?;
        let id = row.get(&self.entity.primary_key().name).cloned().unwrap_or(Value::Null);
        tracing::info!(resource = %self.key, id = %id, "created");
        self.present(row, None).await
    }

    pub async fn update(&self, id: &str, raw: Value) -> Result<Value, AppError> {
        self.ensure("update")?;
        let pk = self.parse_id(id)?;
        let record = ShapeValidator::validate(&self.shapes.update, &raw)?;
        RequestValidator::validate_partial(&record, &self.rules)?;
        let changes = self.to_columns(&self.shapes.update, record, true).await?;
        let row = self
            .repository()?
            .update(&pk, changes)
            .await?
            .ok_or_else(|| self.not_found(id))?;
        tracing::info!(resource = %self.key, id, "updated");
        self.present(row, None).await
    }

    /// Delete-shaped result. Documents referenced by the row are removed as well.
    pub async fn delete(&self, id: &str) -> Result<Value, AppError> {
        self.ensure("delete")?;
        let pk = self.parse_id(id)?;
        let repo = self.repository()?;
        let row = repo.get(&pk).await?.ok_or_else(|| self.not_found(id))?;
        if !repo.delete(&pk).await? {
            return Err(self.not_found(id));
        }
        for col in self.entity.columns.iter().filter(|c| c.scalar == ScalarType::Document) {
            if let Some(doc) = row.get(&col.name).and_then(Value::as_str) {
                self.drop_document(doc).await;
            }
        }
        tracing::info!(resource = %self.key, id, "deleted");
        Ok(json!({
            "id": pk,
            "success": true,
            "message": format!("{} {} deleted", self.entity.name, id),
        }))
    }

    fn document_column(&self, field: &str) -> Result<&ColumnDescriptor, AppError> {
        self.entity
            .column(field)
            .filter(|c| c.scalar == ScalarType::Document)
            .ok_or_else(|| AppError::BadRequest(format!("'{}' is not a document field of {}", field, self.entity.name)))
    }

    /// Store `bytes` and point `field` of record `id` at it. A previously attached document is removed.
    pub async fn attach_document(
        &self,
        id: &str,
        field: &str,
        bytes: Vec<u8>,
        content_type: Option<String>,
    ) -> Result<Value, AppError> {
        self.ensure("update")?;
        let column = self.document_column(field)?;
        if bytes.is_empty() {
            return Err(AppError::BadRequest("document body is empty".into()));
        }
        let pk = self.parse_id(id)?;
        let repo = self.repository()?;
        let row = repo.get(&pk).await?.ok_or_else(|| self.not_found(id))?;
        let previous = row.get(&column.name).and_then(Value::as_str).map(str::to_string);

        let metadata = DocumentMetadata {
            content_type,
            attributes: HashMap::new(),
        }
        .attribute("entity", self.entity.name.clone())
        .attribute("field", column.name.clone())
        .attribute("record", id);
        let doc = self.ctx.documents.save(bytes, metadata).await?;

        let mut changes = Map::new();
        changes.insert(column.name.clone(), Value::String(doc.clone()));
        let Some(updated) = repo.update(&pk, changes).await? else {
            self.drop_document(&doc).await;
            return Err(self.not_found(id));
        };
        if let Some(old) = previous {
            self.drop_document(&old).await;
        }
        tracing::info!(resource = %self.key, id, field, document = %doc, "document attached");
        self.present(updated, None).await
    }

    pub async fn load_document(&self, id: &str, field: &str) -> Result<Vec<u8>, AppError> {
        self.ensure("read")?;
        let column = self.document_column(field)?;
        let pk = self.parse_id(id)?;
        let row = self.repository()?.get(&pk).await?.ok_or_else(|| self.not_found(id))?;
        let doc = row
            .get(&column.name)
            .and_then(Value::as_str)
            .ok_or_else(|| AppError::NotFound(format!("no {} document for {} '{}'", field, self.entity.name, id)))?;
        self.ctx
            .documents
            .load(doc)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("document '{}'", doc)))
    }

    async fn drop_document(&self, doc: &str) {
        if let Err(e) = self.ctx.documents.delete(doc).await {
            tracing::warn!(document = %doc, error = %e, "failed to remove document");
        }
    }

    /// Validated record to repository columns. Nested many-to-one objects become their foreign
    /// key; relationship lists are not written. Referenced rows must exist.
    async fn to_columns(
        &self,
        shape: &GeneratedShape,
        record: Map<String, Value>,
        partial: bool,
    ) -> Result<Map<String, Value>, AppError> {
        let mut columns = Map::with_capacity(record.len());
        let mut errors = Vec::new();
        for (name, value) in record {
            let Some(field) = shape.field(&name) else { continue };
            match &field.ty {
                FieldType::List(_) => {
                    tracing::debug!(resource = %self.key, field = %name, "relationship list ignored on write");
                }
                FieldType::Shape(_) => {
                    let rel = relationship(&self.entity, &name)?;
                    let target = self.ctx.graph.resolve(&self.entity.name, &rel.target)?;
                    let fk = match &value {
                        Value::Null => Value::Null,
                        v => v.get(&target.primary_key().name).cloned().unwrap_or(Value::Null),
                    };
                    let path = format!("{}.{}", name, target.primary_key().name);
                    self.check_reference(rel, &fk, path, &mut errors).await?;
                    columns.insert(rel.foreign_key.clone(), fk);
                }
                FieldType::Scalar(_) => {
                    let Some(column) = self.entity.column(&name) else { continue };
                    if value.is_null() && !column.nullable {
                        if partial {
                            errors.push(FieldError::new(&name, "must not be null"));
                        }
                        continue;
                    }
                    if let Some(rel) = self.entity.relationship_owning(&name) {
                        self.check_reference(rel, &value, name.clone(), &mut errors).await?;
                    }
                    columns.insert(name, value);
                }
            }
        }
        if !errors.is_empty() {
            return Err(AppError::invalid_fields(errors));
        }
        Ok(columns)
    }

    async fn check_reference(
        &self,
        rel: &RelationshipDescriptor,
        fk: &Value,
        path: String,
        errors: &mut Vec<FieldError>,
    ) -> Result<(), AppError> {
        if fk.is_null() {
            if !rel.owning_key_nullable {
                errors.push(FieldError::new(path, "must not be null"));
            }
            return Ok(());
        }
        if self.ctx.repository(&rel.target)?.get(fk).await?.is_none() {
            errors.push(FieldError::new(path, format!("references a missing {}", rel.target)));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bootstrap::{bootstrap, Catalog};
    use crate::fixtures;
    use crate::repository::MemoryRepositoryFactory;

    fn catalog() -> Catalog {
        bootstrap(fixtures::wine_catalog(), &MemoryRepositoryFactory).unwrap()
    }

    fn catalog_at_depth(depth: i64) -> Catalog {
        let mut config = fixtures::wine_catalog();
        config.settings.synthesis.max_depth = depth;
        bootstrap(config, &MemoryRepositoryFactory).unwrap()
    }

    fn service(catalog: &Catalog, key: &str) -> Arc<CatalogService> {
        catalog.registry.service(key).unwrap()
    }

    async fn seed(catalog: &Catalog) {
        let categories = service(catalog, "categories");
        categories
            .create(json!({ "name": "Wine", "name_ru": "Вино" }))
            .await
            .unwrap();
        let drinks = service(catalog, "drinks");
        let mut drink = json!({ "name": "Barolo", "name_fr": "Barolo DOCG", "price": 42.5, "cost_price": 20 });
        if drinks.shapes().create.field("category").is_some() {
            drink["category"] = json!({ "id": 1, "name": "Wine" });
        } else {
            drink["category_id"] = json!(1);
        }
        drinks.create(drink).await.unwrap();
    }

    #[tokio::test]
    async fn create_fills_defaults_and_hides_sensitive_columns() {
        let catalog = catalog();
        seed(&catalog).await;
        let drink = service(&catalog, "drinks").read("en", "1").await.unwrap();
        assert_eq!(drink["id"], 1);
        assert_eq!(drink["is_active"], true);
        assert!(drink["created_at"].is_string());
        assert!(drink.get("cost_price").is_none());
        assert_eq!(drink["category"]["id"], 1);
        assert_eq!(drink["category"]["name"], "Wine");
        assert!(drink["region"].is_null());
    }

    #[tokio::test]
    async fn nested_records_hide_their_own_sensitive_columns() {
        let catalog = catalog_at_depth(2);
        seed(&catalog).await;
        let categories = service(&catalog, "categories");

        let category = categories.read("en", "1").await.unwrap();
        let drinks = category["drinks"].as_array().unwrap();
        assert_eq!(drinks.len(), 1);
        assert_eq!(drinks[0]["name"], "Barolo");
        assert!(drinks[0].get("cost_price").is_none());

        let page = categories.list("ru", None, None, &[]).await.unwrap();
        assert_eq!(page["items"][0]["drinks"][0]["name"], "Barolo");
        assert!(page["items"][0]["drinks"][0].get("cost_price").is_none());
        assert!(service(&catalog, "drinks").read("en", "1").await.unwrap().get("cost_price").is_none());
    }

    #[tokio::test]
    async fn read_output_conforms_to_the_read_shape() {
        for depth in 0..=2 {
            let catalog = catalog_at_depth(depth);
            seed(&catalog).await;
            for key in ["drinks", "categories"] {
                let svc = service(&catalog, key);
                for lang in ["en", "ru"] {
                    let record = svc.read(lang, "1").await.unwrap();
                    let validated = ShapeValidator::validate(&svc.shapes().read, &record)
                        .unwrap_or_else(|e| panic!("{key} at depth {depth}: {e:?}"));
                    assert_eq!(Value::Object(validated), record);
                }
            }
        }
    }

    #[tokio::test]
    async fn read_projects_the_requested_language_with_fallback() {
        let catalog = catalog();
        seed(&catalog).await;
        let drinks = service(&catalog, "drinks");
        let ru = drinks.read("ru", "1").await.unwrap();
        assert_eq!(ru["name"], "Barolo");
        assert!(ru.get("name_ru").is_none());
        assert_eq!(ru["category"]["name"], "Вино");
        let fr = drinks.read("fr", "1").await.unwrap();
        assert_eq!(fr["name"], "Barolo DOCG");
        assert!(matches!(drinks.read("de", "1").await, Err(AppError::NotFound(_))));
        assert!(matches!(drinks.read("en", "9").await, Err(AppError::NotFound(_))));
        assert!(matches!(drinks.read("en", "x").await, Err(AppError::BadRequest(_))));
    }

    #[tokio::test]
    async fn list_pages_and_filters() {
        let catalog = catalog();
        seed(&catalog).await;
        let drinks = service(&catalog, "drinks");
        for name in ["Rioja", "Chianti"] {
            drinks
                .create(json!({ "name": name, "price": 10, "category": { "id": 1, "name": "Wine" } }))
                .await
                .unwrap();
        }
        let page = drinks.list("en", Some(1), Some(2), &[]).await.unwrap();
        assert_eq!(page["total"], 3);
        assert_eq!(page["items"].as_array().unwrap().len(), 2);
        assert_eq!(page["has_next"], true);
        assert_eq!(page["has_prev"], false);
        let last = drinks.list("en", Some(2), Some(2), &[]).await.unwrap();
        assert_eq!(last["items"][0]["name"], "Chianti");
        assert_eq!(last["has_next"], false);

        let filtered = drinks
            .list("en", None, None, &[("name".to_string(), "Rioja".to_string())])
            .await
            .unwrap();
        assert_eq!(filtered["total"], 1);
        assert!(drinks
            .list("en", None, None, &[("cost_price".to_string(), "1".to_string())])
            .await
            .is_err());
        assert!(drinks.list("en", Some(0), None, &[]).await.is_err());
    }

    #[tokio::test]
    async fn create_rejects_missing_references_and_rule_violations() {
        let catalog = catalog();
        let drinks = service(&catalog, "drinks");
        let err = drinks
            .create(json!({ "name": "Ghost", "price": 5, "category": { "id": 7, "name": "None" } }))
            .await
            .unwrap_err();
        match err {
            AppError::Validation { fields, .. } => assert_eq!(fields[0].field, "category.id"),
            other => panic!("unexpected {other:?}"),
        }
        let err = drinks
            .create(json!({ "name": "", "price": -3, "category": { "id": 1, "name": "Wine" } }))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Validation { ref fields, .. } if fields.len() == 2));
    }

    #[tokio::test]
    async fn update_and_delete() {
        let catalog = catalog();
        seed(&catalog).await;
        let drinks = service(&catalog, "drinks");
        let updated = drinks.update("1", json!({ "price": 39.9, "vintage": 2016 })).await.unwrap();
        assert_eq!(updated["vintage"], 2016);
        assert!(matches!(
            drinks.update("1", json!({ "price": null })).await,
            Err(AppError::Validation { .. })
        ));
        assert!(matches!(drinks.update("5", json!({})).await, Err(AppError::NotFound(_))));

        let deleted = drinks.delete("1").await.unwrap();
        assert_eq!(deleted, json!({ "id": 1, "success": true, "message": "Drink 1 deleted" }));
        assert!(matches!(drinks.delete("1").await, Err(AppError::NotFound(_))));
    }

    #[tokio::test]
    async fn disabled_operations_are_bad_requests() {
        let catalog = catalog();
        let varietals = service(&catalog, "varietals");
        assert!(matches!(varietals.create(json!({ "name": "Nebbiolo" })).await, Err(AppError::BadRequest(_))));
        assert!(varietals.list("en", None, None, &[]).await.is_ok());
    }

    #[tokio::test]
    async fn documents_attach_replace_and_load() {
        let catalog = catalog();
        seed(&catalog).await;
        let drinks = service(&catalog, "drinks");
        let first = drinks
            .attach_document("1", "image", vec![1, 2, 3], Some("image/png".into()))
            .await
            .unwrap();
        let first_id = first["image"].as_str().unwrap().to_string();
        assert_eq!(drinks.load_document("1", "image").await.unwrap(), vec![1, 2, 3]);

        drinks.attach_document("1", "image", vec![9], None).await.unwrap();
        assert_eq!(drinks.load_document("1", "image").await.unwrap(), vec![9]);
        assert_eq!(catalog.context.documents.load(&first_id).await.unwrap(), None);

        assert!(matches!(
            drinks.attach_document("1", "name", vec![1], None).await,
            Err(AppError::BadRequest(_))
        ));
        assert!(matches!(drinks.load_document("2", "image").await, Err(AppError::NotFound(_))));
    }
}
