//! In-process repository: rows kept in insertion order behind a mutex.

use super::{ListQuery, Page, Repository, RepositoryFactory};
use crate::config::{ColumnDefaultConfig, ScalarType};
use crate::error::AppError;
use crate::model::{ColumnDescriptor, EntityDescriptor};
use async_trait::async_trait;
use serde_json::{Map, Value};
use std::sync::{Arc, Mutex, PoisonError};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum IdStrategy {
    Sequence,
    Uuid,
    Provided,
}

#[derive(Clone, Debug)]
enum Fill {
    Value(Value),
    Now(ScalarType),
}

#[derive(Default)]
struct Rows {
    rows: Vec<Map<String, Value>>,
    next_id: i64,
}

pub struct MemoryRepository {
    pk: String,
    ids: IdStrategy,
    defaults: Vec<(String, Fill)>,
    state: Mutex<Rows>,
}

impl MemoryRepository {
    /// Repository with a sequential integer primary key and no column defaults.
    pub fn new(pk: impl Into<String>) -> Self {
        MemoryRepository {
            pk: pk.into(),
            ids: IdStrategy::Sequence,
            defaults: Vec::new(),
            state: Mutex::new(Rows::default()),
        }
    }

    pub fn for_entity(entity: &EntityDescriptor) -> Self {
        let pk = entity.primary_key();
        let ids = match pk.scalar {
            ScalarType::Integer | ScalarType::BigInteger => IdStrategy::Sequence,
            ScalarType::Uuid => IdStrategy::Uuid,
            _ => IdStrategy::Provided,
        };
        let defaults = entity
            .columns
            .iter()
            .filter(|c| !c.primary_key)
            .filter_map(|c| default_fill(c).map(|f| (c.name.clone(), f)))
            .collect();
        MemoryRepository {
            pk: pk.name.clone(),
            ids,
            defaults,
            state: Mutex::new(Rows::default()),
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Rows> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn position(rows: &Rows, pk: &str, id: &Value) -> Option<usize> {
        rows.rows
            .iter()
            .position(|r| r.get(pk).map(|v| values_match(v, id)).unwrap_or(false))
    }
}

fn default_fill(col: &ColumnDescriptor) -> Option<Fill> {
    match col.default.as_ref()? {
        ColumnDefaultConfig::Literal(s) => Some(Fill::Value(parse_literal(col.scalar, s))),
        ColumnDefaultConfig::Expression { expression } => {
            let e = expression.to_lowercase();
            if e.contains("now") || e.contains("current_timestamp") || e.contains("current_date") {
                Some(Fill::Now(col.scalar))
            } else {
                None
            }
        }
    }
}

fn parse_literal(scalar: ScalarType, s: &str) -> Value {
    match scalar {
        ScalarType::Boolean => s.parse::<bool>().map(Value::Bool).unwrap_or(Value::Null),
        ScalarType::Integer | ScalarType::BigInteger => s.parse::<i64>().map(Value::from).unwrap_or(Value::Null),
        ScalarType::Float => s
            .parse::<f64>()
            .ok()
            .and_then(serde_json::Number::from_f64)
            .map(Value::Number)
            .unwrap_or(Value::Null),
        ScalarType::Json => serde_json::from_str(s).unwrap_or(Value::Null),
        _ => Value::String(s.to_string()),
    }
}

fn values_match(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Number(n), Value::Number(m)) => n.as_f64() == m.as_f64(),
        (Value::String(s), Value::String(t)) => {
            s == t || (s.eq_ignore_ascii_case(t) && uuid::Uuid::parse_str(s).is_ok())
        }
        _ => a == b,
    }
}

#[async_trait]
impl Repository for MemoryRepository {
    async fn create(&self, mut record: Map<String, Value>) -> Result<Value, AppError> {
        let mut rows = self.lock();
        match self.ids {
            IdStrategy::Sequence => {
                rows.next_id += 1;
                record.insert(self.pk.clone(), Value::from(rows.next_id));
            }
            IdStrategy::Uuid => {
                record.insert(self.pk.clone(), Value::String(uuid::Uuid::new_v4().to_string()));
            }
            IdStrategy::Provided => {
                let id = record
                    .get(&self.pk)
                    .filter(|v| !v.is_null())
                    .ok_or_else(|| AppError::invalid_field(self.pk.clone(), "is required"))?;
                if Self::position(&rows, &self.pk, id).is_some() {
                    return Err(AppError::Conflict(format!("{} already exists", id)));
                }
            }
        }
        for (col, fill) in &self.defaults {
            if record.get(col).map(Value::is_null).unwrap_or(true) {
                let value = match fill {
                    Fill::Value(v) => v.clone(),
                    Fill::Now(ScalarType::Date) => Value::String(chrono::Utc::now().date_naive().to_string()),
                    Fill::Now(_) => Value::String(chrono::Utc::now().to_rfc3339()),
                };
                record.insert(col.clone(), value);
            }
        }
        rows.rows.push(record.clone());
        Ok(Value::Object(record))
    }

    async fn get(&self, id: &Value) -> Result<Option<Value>, AppError> {
        let rows = self.lock();
        Ok(Self::position(&rows, &self.pk, id).map(|i| Value::Object(rows.rows[i].clone())))
    }

    async fn get_all(&self, query: &ListQuery) -> Result<Page, AppError> {
        let rows = self.lock();
        let matching: Vec<&Map<String, Value>> = rows
            .rows
            .iter()
            .filter(|r| {
                query
                    .filters
                    .iter()
                    .all(|(col, v)| r.get(col).map(|x| values_match(x, v)).unwrap_or(v.is_null()))
            })
            .collect();
        let total = matching.len() as u64;
        let rows = matching
            .into_iter()
            .skip(query.offset as usize)
            .take(query.limit as usize)
            .map(|r| Value::Object(r.clone()))
            .collect();
        Ok(Page { rows, total })
    }

    async fn update(&self, id: &Value, mut changes: Map<String, Value>) -> Result<Option<Value>, AppError> {
        changes.remove(&self.pk);
        let mut rows = self.lock();
        let Some(i) = Self::position(&rows, &self.pk, id) else {
            return Ok(None);
        };
        let row = &mut rows.rows[i];
        for (k, v) in changes {
            row.insert(k, v);
        }
        Ok(Some(Value::Object(row.clone())))
    }

    async fn delete(&self, id: &Value) -> Result<bool, AppError> {
        let mut rows = self.lock();
        match Self::position(&rows, &self.pk, id) {
            Some(i) => {
                rows.rows.remove(i);
                Ok(true)
            }
            None => Ok(false),
        }
    }
}

#[derive(Clone, Copy, Debug, Default)]
pub struct MemoryRepositoryFactory;

impl RepositoryFactory for MemoryRepositoryFactory {
    fn create(&self, entity: &Arc<EntityDescriptor>) -> Arc<dyn Repository> {
        Arc::new(MemoryRepository::for_entity(entity))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures;
    use crate::i18n::Localizer;
    use crate::model::EntityGraph;
    use serde_json::json;

    fn obj(v: Value) -> Map<String, Value> {
        match v {
            Value::Object(m) => m,
            _ => unreachable!(),
        }
    }

    fn drinks() -> MemoryRepository {
        let config = fixtures::wine_catalog();
        let graph = EntityGraph::build(&config.entities, &Localizer::from_settings(&config.settings.languages)).unwrap();
        MemoryRepository::for_entity(graph.get("Drink").unwrap())
    }

    #[tokio::test]
    async fn create_assigns_ids_and_defaults() {
        let repo = drinks();
        let a = repo.create(obj(json!({ "name": "Barolo", "price": 40, "category_id": 1 }))).await.unwrap();
        let b = repo.create(obj(json!({ "name": "Soave", "price": 12, "category_id": 1, "is_active": false }))).await.unwrap();
        assert_eq!(a["id"], json!(1));
        assert_eq!(b["id"], json!(2));
        assert_eq!(a["is_active"], json!(true));
        assert_eq!(b["is_active"], json!(false));
        assert!(a["created_at"].as_str().is_some());
    }

    #[tokio::test]
    async fn get_update_delete() {
        let repo = MemoryRepository::new("id");
        repo.create(obj(json!({ "name": "Merlot" }))).await.unwrap();
        let got = repo.get(&json!(1)).await.unwrap().unwrap();
        assert_eq!(got["name"], "Merlot");

        let updated = repo.update(&json!(1), obj(json!({ "id": 9, "name": "Malbec" }))).await.unwrap().unwrap();
        assert_eq!(updated, json!({ "id": 1, "name": "Malbec" }));
        assert!(repo.update(&json!(5), Map::new()).await.unwrap().is_none());

        assert!(repo.delete(&json!(1)).await.unwrap());
        assert!(!repo.delete(&json!(1)).await.unwrap());
        assert!(repo.get(&json!(1)).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn get_all_filters_and_windows() {
        let repo = MemoryRepository::new("id");
        for (name, cat) in [("a", 1), ("b", 2), ("c", 1), ("d", 1)] {
            repo.create(obj(json!({ "name": name, "category_id": cat }))).await.unwrap();
        }
        let page = repo.get_all(&ListQuery::window(2, 1).filter("category_id", json!(1))).await.unwrap();
        assert_eq!(page.total, 3);
        let names: Vec<_> = page.rows.iter().map(|r| r["name"].clone()).collect();
        assert_eq!(names, vec![json!("c"), json!("d")]);
    }
}
