//! Storage collaborators: the per-entity repository contract and its implementations.

mod memory;
mod postgres;

pub use memory::{MemoryRepository, MemoryRepositoryFactory};
pub use postgres::{PgRepository, PgRepositoryFactory};

use crate::error::AppError;
use crate::model::EntityDescriptor;
use async_trait::async_trait;
use serde_json::{Map, Value};
use std::sync::Arc;

/// Exact-match filters plus a window.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ListQuery {
    pub filters: Vec<(String, Value)>,
    pub limit: u32,
    pub offset: u32,
}

impl ListQuery {
    pub fn window(limit: u32, offset: u32) -> Self {
        ListQuery {
            filters: Vec::new(),
            limit,
            offset,
        }
    }

    pub fn filter(mut self, column: impl Into<String>, value: Value) -> Self {
        self.filters.push((column.into(), value));
        self
    }
}

/// One window of rows and the total number of rows matching the filters.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Page {
    pub rows: Vec<Value>,
    pub total: u64,
}

#[async_trait]
pub trait Repository: Send + Sync {
    /// Insert one record; returns the stored row including generated id and defaults.
    async fn create(&self, record: Map<String, Value>) -> Result<Value, AppError>;

    async fn get(&self, id: &Value) -> Result<Option<Value>, AppError>;

    async fn get_all(&self, query: &ListQuery) -> Result<Page, AppError>;

    /// Apply `changes` to the row with `id`; `None` when no such row.
    async fn update(&self, id: &Value, changes: Map<String, Value>) -> Result<Option<Value>, AppError>;

    /// `true` when a row was removed.
    async fn delete(&self, id: &Value) -> Result<bool, AppError>;
}

/// Creates the repository backing one entity.
pub trait RepositoryFactory {
    fn create(&self, entity: &Arc<EntityDescriptor>) -> Arc<dyn Repository>;
}
