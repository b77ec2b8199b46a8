//! Lookup tables from resource key to schema, repository and service.
//!
//! Populated once during bootstrap and read by request handlers. Keys are lower-cased.
//! Registering a key twice is rejected with `DuplicateRegistration`.

use crate::error::ConfigError;
use crate::repository::Repository;
use crate::schema::ShapeSet;
use crate::service::CatalogService;
use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RegistryKind {
    Schema,
    Repository,
    Service,
}

impl RegistryKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            RegistryKind::Schema => "schema",
            RegistryKind::Repository => "repository",
            RegistryKind::Service => "service",
        }
    }
}

struct Table<V> {
    kind: RegistryKind,
    entries: RwLock<HashMap<String, V>>,
}

impl<V: Clone> Table<V> {
    fn new(kind: RegistryKind) -> Self {
        Table {
            kind,
            entries: RwLock::new(HashMap::new()),
        }
    }

    fn register(&self, key: &str, value: V) -> Result<(), ConfigError> {
        let key = normalize(key);
        let mut entries = self.entries.write().unwrap_or_else(PoisonError::into_inner);
        if entries.contains_key(&key) {
            return Err(ConfigError::DuplicateRegistration {
                kind: self.kind.as_str(),
                key,
            });
        }
        tracing::debug!(kind = self.kind.as_str(), key = %key, "registered");
        entries.insert(key, value);
        Ok(())
    }

    fn get(&self, key: &str) -> Option<V> {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&normalize(key))
            .cloned()
    }

    fn keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self
            .entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .keys()
            .cloned()
            .collect();
        keys.sort();
        keys
    }

    fn clear(&self) {
        self.entries.write().unwrap_or_else(PoisonError::into_inner).clear();
    }
}

fn normalize(key: &str) -> String {
    key.trim().to_lowercase()
}

pub struct Registry {
    schemas: Table<Arc<ShapeSet>>,
    repositories: Table<Arc<dyn Repository>>,
    services: Table<Arc<CatalogService>>,
}

impl Default for Registry {
    fn default() -> Self {
        Self::new()
    }
}

impl Registry {
    pub fn new() -> Self {
        Registry {
            schemas: Table::new(RegistryKind::Schema),
            repositories: Table::new(RegistryKind::Repository),
            services: Table::new(RegistryKind::Service),
        }
    }

    pub fn register_schema(&self, key: &str, shapes: Arc<ShapeSet>) -> Result<(), ConfigError> {
        self.schemas.register(key, shapes)
    }

    pub fn register_repository(&self, key: &str, repository: Arc<dyn Repository>) -> Result<(), ConfigError> {
        self.repositories.register(key, repository)
    }

    pub fn register_service(&self, key: &str, service: Arc<CatalogService>) -> Result<(), ConfigError> {
        self.services.register(key, service)
    }

    pub fn schema(&self, key: &str) -> Option<Arc<ShapeSet>> {
        self.schemas.get(key)
    }

    pub fn repository(&self, key: &str) -> Option<Arc<dyn Repository>> {
        self.repositories.get(key)
    }

    pub fn service(&self, key: &str) -> Option<Arc<CatalogService>> {
        self.services.get(key)
    }

    /// Sorted keys registered under `kind`.
    pub fn keys(&self, kind: RegistryKind) -> Vec<String> {
        match kind {
            RegistryKind::Schema => self.schemas.keys(),
            RegistryKind::Repository => self.repositories.keys(),
            RegistryKind::Service => self.services.keys(),
        }
    }

    /// Drop every entry (test teardown).
    pub fn reset(&self) {
        self.schemas.clear();
        self.repositories.clear();
        self.services.clear();
    }
}
