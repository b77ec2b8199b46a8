//! PostgreSQL repository: parameterized SQL built from the entity descriptor.
//! Identifiers come from config only and are always quoted; values are always bound.

use super::{ListQuery, Page, Repository, RepositoryFactory};
use crate::config::ScalarType;
use crate::error::AppError;
use crate::model::{ColumnDescriptor, EntityDescriptor};
use async_trait::async_trait;
use serde_json::{Map, Value};
use sqlx::postgres::{PgArguments, PgRow};
use sqlx::query::Query;
use sqlx::{PgPool, Postgres, Row};
use std::sync::Arc;

/// Quote identifier for PostgreSQL.
fn quoted(s: &str) -> String {
    format!("\"{}\"", s.replace('"', "\"\""))
}

/// `schema.table` or `table`, each part quoted.
fn qualified_table(table: &str) -> String {
    table.split('.').map(quoted).collect::<Vec<_>>().join(".")
}

/// Cast applied to bound parameters so JSON strings land in typed columns.
fn param_cast(scalar: ScalarType) -> Option<&'static str> {
    match scalar {
        ScalarType::Date => Some("date"),
        ScalarType::DateTime => Some("timestamptz"),
        ScalarType::Uuid => Some("uuid"),
        ScalarType::Decimal => Some("numeric"),
        _ => None,
    }
}

#[derive(Debug, Default)]
pub(crate) struct QueryBuf {
    pub sql: String,
    pub params: Vec<Value>,
}

impl QueryBuf {
    fn placeholder(&mut self, v: Value, scalar: ScalarType) -> String {
        self.params.push(v);
        let n = self.params.len();
        match param_cast(scalar) {
            Some(t) => format!("${}::{}", n, t),
            None => format!("${}", n),
        }
    }
}

/// SELECT list: decimals come back as text so no precision is lost.
fn select_column_list(entity: &EntityDescriptor) -> String {
    entity
        .columns
        .iter()
        .map(|c| {
            let q = quoted(&c.name);
            if c.scalar == ScalarType::Decimal {
                format!("{}::text AS {}", q, q)
            } else {
                q
            }
        })
        .collect::<Vec<_>>()
        .join(", ")
}

fn where_clause(entity: &EntityDescriptor, filters: &[(String, Value)], q: &mut QueryBuf) -> String {
    let mut parts = Vec::new();
    for (col, val) in filters {
        let Some(c) = entity.column(col) else { continue };
        if val.is_null() {
            parts.push(format!("{} IS NULL", quoted(col)));
        } else {
            let ph = q.placeholder(val.clone(), c.scalar);
            parts.push(format!("{} = {}", quoted(col), ph));
        }
    }
    if parts.is_empty() {
        String::new()
    } else {
        format!(" WHERE {}", parts.join(" AND "))
    }
}

pub(crate) fn select_by_id(entity: &EntityDescriptor, id: &Value) -> QueryBuf {
    let mut q = QueryBuf::default();
    let pk = entity.primary_key();
    let ph = q.placeholder(id.clone(), pk.scalar);
    q.sql = format!(
        "SELECT {} FROM {} WHERE {} = {}",
        select_column_list(entity),
        qualified_table(&entity.table),
        quoted(&pk.name),
        ph
    );
    q
}

pub(crate) fn select_page(entity: &EntityDescriptor, query: &ListQuery) -> QueryBuf {
    let mut q = QueryBuf::default();
    let filter = where_clause(entity, &query.filters, &mut q);
    q.sql = format!(
        "SELECT {} FROM {}{} ORDER BY {} LIMIT {} OFFSET {}",
        select_column_list(entity),
        qualified_table(&entity.table),
        filter,
        quoted(&entity.primary_key().name),
        query.limit,
        query.offset
    );
    q
}

pub(crate) fn count(entity: &EntityDescriptor, filters: &[(String, Value)]) -> QueryBuf {
    let mut q = QueryBuf::default();
    let filter = where_clause(entity, filters, &mut q);
    q.sql = format!("SELECT COUNT(*) FROM {}{}", qualified_table(&entity.table), filter);
    q
}

/// INSERT known columns present in `record`; absent columns fall back to the database default.
pub(crate) fn insert(entity: &EntityDescriptor, record: &Map<String, Value>) -> QueryBuf {
    let mut q = QueryBuf::default();
    let mut cols = Vec::new();
    let mut placeholders = Vec::new();
    for c in &entity.columns {
        let Some(val) = record.get(&c.name) else { continue };
        if val.is_null() && c.has_default {
            continue;
        }
        placeholders.push(q.placeholder(val.clone(), c.scalar));
        cols.push(quoted(&c.name));
    }
    let table = qualified_table(&entity.table);
    let returning = select_column_list(entity);
    q.sql = if cols.is_empty() {
        format!("INSERT INTO {} DEFAULT VALUES RETURNING {}", table, returning)
    } else {
        format!(
            "INSERT INTO {} ({}) VALUES ({}) RETURNING {}",
            table,
            cols.join(", "),
            placeholders.join(", "),
            returning
        )
    };
    q
}

/// UPDATE by id: SET only known, non-key columns present in `changes`.
pub(crate) fn update(entity: &EntityDescriptor, id: &Value, changes: &Map<String, Value>) -> QueryBuf {
    let pk = entity.primary_key();
    let mut q = QueryBuf::default();
    let mut sets = Vec::new();
    for c in entity.columns.iter().filter(|c| !c.primary_key) {
        if let Some(v) = changes.get(&c.name) {
            let ph = q.placeholder(v.clone(), c.scalar);
            sets.push(format!("{} = {}", quoted(&c.name), ph));
        }
    }
    if sets.is_empty() {
        return select_by_id(entity, id);
    }
    let id_ph = q.placeholder(id.clone(), pk.scalar);
    q.sql = format!(
        "UPDATE {} SET {} WHERE {} = {} RETURNING {}",
        qualified_table(&entity.table),
        sets.join(", "),
        quoted(&pk.name),
        id_ph,
        select_column_list(entity)
    );
    q
}

pub(crate) fn delete(entity: &EntityDescriptor, id: &Value) -> QueryBuf {
    let pk = entity.primary_key();
    let mut q = QueryBuf::default();
    let ph = q.placeholder(id.clone(), pk.scalar);
    q.sql = format!(
        "DELETE FROM {} WHERE {} = {} RETURNING {}",
        qualified_table(&entity.table),
        quoted(&pk.name),
        ph,
        quoted(&pk.name)
    );
    q
}

fn bind_all<'q>(sql: &'q str, params: &'q [Value]) -> Query<'q, Postgres, PgArguments> {
    let mut query = sqlx::query(sql);
    for p in params {
        query = match p {
            Value::Null => query.bind(None::<String>),
            Value::Bool(b) => query.bind(*b),
            Value::Number(n) => match n.as_i64() {
                Some(i) => query.bind(i),
                None => query.bind(n.as_f64()),
            },
            Value::String(s) => query.bind(s.as_str()),
            Value::Array(_) | Value::Object(_) => query.bind(sqlx::types::Json(p)),
        };
    }
    query
}

fn cell_to_value(row: &PgRow, col: &ColumnDescriptor) -> Result<Value, sqlx::Error> {
    let name = col.name.as_str();
    Ok(match col.scalar {
        ScalarType::Integer => row.try_get::<Option<i32>, _>(name)?.map(Value::from),
        ScalarType::BigInteger => row.try_get::<Option<i64>, _>(name)?.map(Value::from),
        ScalarType::Float => row
            .try_get::<Option<f64>, _>(name)?
            .and_then(serde_json::Number::from_f64)
            .map(Value::Number),
        ScalarType::Boolean => row.try_get::<Option<bool>, _>(name)?.map(Value::Bool),
        ScalarType::String | ScalarType::Text | ScalarType::Document | ScalarType::Decimal => {
            row.try_get::<Option<String>, _>(name)?.map(Value::String)
        }
        ScalarType::Date => row
            .try_get::<Option<chrono::NaiveDate>, _>(name)?
            .map(|d| Value::String(d.format("%Y-%m-%d").to_string())),
        ScalarType::DateTime => row
            .try_get::<Option<chrono::DateTime<chrono::Utc>>, _>(name)?
            .map(|d| Value::String(d.to_rfc3339())),
        ScalarType::Uuid => row
            .try_get::<Option<uuid::Uuid>, _>(name)?
            .map(|u| Value::String(u.to_string())),
        ScalarType::Json => row.try_get::<Option<Value>, _>(name)?,
    }
    .unwrap_or(Value::Null))
}

fn row_to_json(entity: &EntityDescriptor, row: &PgRow) -> Result<Value, sqlx::Error> {
    let mut map = Map::new();
    for col in &entity.columns {
        map.insert(col.name.clone(), cell_to_value(row, col)?);
    }
    Ok(Value::Object(map))
}

pub struct PgRepository {
    pool: PgPool,
    entity: Arc<EntityDescriptor>,
}

impl PgRepository {
    pub fn new(pool: PgPool, entity: Arc<EntityDescriptor>) -> Self {
        PgRepository { pool, entity }
    }

    async fn fetch_optional(&self, q: &QueryBuf) -> Result<Option<Value>, AppError> {
        tracing::debug!(sql = %q.sql, params = ?q.params, "query");
        let row = bind_all(&q.sql, &q.params).fetch_optional(&self.pool).await?;
        Ok(row.map(|r| row_to_json(&self.entity, &r)).transpose()?)
    }
}

#[async_trait]
impl Repository for PgRepository {
    async fn create(&self, record: Map<String, Value>) -> Result<Value, AppError> {
        let q = insert(&self.entity, &record);
        self.fetch_optional(&q)
            .await?
            .ok_or_else(|| AppError::Db(sqlx::Error::RowNotFound))
    }

    async fn get(&self, id: &Value) -> Result<Option<Value>, AppError> {
        self.fetch_optional(&select_by_id(&self.entity, id)).await
    }

    async fn get_all(&self, query: &ListQuery) -> Result<Page, AppError> {
        let q = select_page(&self.entity, query);
        tracing::debug!(sql = %q.sql, params = ?q.params, "query");
        let rows = bind_all(&q.sql, &q.params).fetch_all(&self.pool).await?;
        let rows = rows
            .iter()
            .map(|r| row_to_json(&self.entity, r))
            .collect::<Result<Vec<_>, _>>()?;

        let c = count(&self.entity, &query.filters);
        tracing::debug!(sql = %c.sql, params = ?c.params, "query");
        let total: i64 = bind_all(&c.sql, &c.params).fetch_one(&self.pool).await?.try_get(0)?;
        Ok(Page {
            rows,
            total: total.max(0) as u64,
        })
    }

    async fn update(&self, id: &Value, changes: Map<String, Value>) -> Result<Option<Value>, AppError> {
        self.fetch_optional(&update(&self.entity, id, &changes)).await
    }

    async fn delete(&self, id: &Value) -> Result<bool, AppError> {
        let q = delete(&self.entity, id);
        tracing::debug!(sql = %q.sql, params = ?q.params, "query");
        let row = bind_all(&q.sql, &q.params).fetch_optional(&self.pool).await?;
        Ok(row.is_some())
    }
}

#[derive(Clone)]
pub struct PgRepositoryFactory {
    pool: PgPool,
}

impl PgRepositoryFactory {
    pub fn new(pool: PgPool) -> Self {
        PgRepositoryFactory { pool }
    }
}

impl RepositoryFactory for PgRepositoryFactory {
    fn create(&self, entity: &Arc<EntityDescriptor>) -> Arc<dyn Repository> {
        Arc::new(PgRepository::new(self.pool.clone(), entity.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures;
    use crate::i18n::Localizer;
    use crate::model::EntityGraph;
    use serde_json::json;

    fn drink() -> Arc<EntityDescriptor> {
        let config = fixtures::wine_catalog();
        let graph = EntityGraph::build(&config.entities, &Localizer::new("en", ["en".to_string()])).unwrap();
        graph.get("Drink").unwrap().clone()
    }

    fn obj(v: Value) -> Map<String, Value> {
        match v {
            Value::Object(m) => m,
            _ => unreachable!(),
        }
    }

    #[test]
    fn select_page_filters_known_columns_only() {
        let q = select_page(
            &drink(),
            &ListQuery::window(20, 40)
                .filter("category_id", json!(3))
                .filter("region_id", Value::Null)
                .filter("nope", json!(1)),
        );
        assert!(q.sql.starts_with("SELECT \"id\", \"name\""));
        assert!(q.sql.contains("\"price\"::text AS \"price\""));
        assert!(q.sql.ends_with(
            "FROM \"drinks\" WHERE \"category_id\" = $1 AND \"region_id\" IS NULL ORDER BY \"id\" LIMIT 20 OFFSET 40"
        ));
        assert_eq!(q.params, vec![json!(3)]);
    }

    #[test]
    fn insert_casts_typed_columns_and_skips_unknown() {
        let q = insert(&drink(), &obj(json!({ "name": "Barolo", "price": "40.50", "extra": 1, "created_at": null })));
        assert_eq!(
            q.sql,
            "INSERT INTO \"drinks\" (\"name\", \"price\") VALUES ($1, $2::numeric) RETURNING ".to_string()
                + &select_column_list(&drink())
        );
        assert_eq!(q.params, vec![json!("Barolo"), json!("40.50")]);
    }

    #[test]
    fn update_never_sets_primary_key() {
        let q = update(&drink(), &json!(7), &obj(json!({ "id": 9, "vintage": 2019 })));
        assert!(q.sql.starts_with("UPDATE \"drinks\" SET \"vintage\" = $1 WHERE \"id\" = $2 RETURNING"));
        assert_eq!(q.params, vec![json!(2019), json!(7)]);

        let noop = update(&drink(), &json!(7), &Map::new());
        assert!(noop.sql.starts_with("SELECT"));
    }

    #[test]
    fn schema_qualified_tables_are_quoted_per_part() {
        assert_eq!(qualified_table("catalog.drinks"), "\"catalog\".\"drinks\"");
        assert_eq!(quoted("we\"ird"), "\"we\"\"ird\"");
        let d = delete(&drink(), &json!(1));
        assert_eq!(d.sql, "DELETE FROM \"drinks\" WHERE \"id\" = $1 RETURNING \"id\"");
    }
}
