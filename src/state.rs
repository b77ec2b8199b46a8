//! Shared application state for all routes. Built once from a bootstrapped catalog; read-only afterwards.

use crate::bootstrap::Catalog;
use crate::config::DEFAULT_BODY_LIMIT;
use crate::error::AppError;
use crate::i18n::Localizer;
use crate::openapi::build_openapi;
use crate::registry::Registry;
use crate::routing::RouteTable;
use crate::service::CatalogService;
use std::sync::Arc;
use utoipa::openapi::OpenApi;

#[derive(Clone)]
pub struct AppState {
    pub registry: Arc<Registry>,
    pub routes: Arc<RouteTable>,
    pub localizer: Arc<Localizer>,
    pub openapi: Arc<OpenApi>,
    /// Maximum accepted document upload size in bytes.
    pub body_limit: usize,
}

impl AppState {
    pub fn new(catalog: &Catalog) -> Self {
        AppState {
            registry: catalog.registry.clone(),
            routes: catalog.routes.clone(),
            localizer: catalog.localizer.clone(),
            openapi: Arc::new(build_openapi(&catalog.routes)),
            body_limit: DEFAULT_BODY_LIMIT,
        }
    }

    pub fn with_body_limit(mut self, limit: usize) -> Self {
        self.body_limit = limit;
        self
    }

    pub fn service(&self, resource: &str) -> Result<Arc<CatalogService>, AppError> {
        self.registry
            .service(resource)
            .ok_or_else(|| AppError::NotFound(format!("resource '{}'", resource)))
    }
}
