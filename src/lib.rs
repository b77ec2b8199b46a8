//! Catalog SDK: entity-driven shape synthesis, localized routing and CRUD for a multi-language
//! drink catalog.

pub mod bootstrap;
pub mod config;
pub mod documents;
pub mod error;
pub mod handlers;
pub mod i18n;
pub mod model;
pub mod openapi;
pub mod registry;
pub mod repository;
pub mod response;
pub mod routes;
pub mod routing;
pub mod schema;
pub mod service;
pub mod state;

#[doc(hidden)]
pub mod fixtures;

pub use bootstrap::{bootstrap, bootstrap_with_documents, Catalog};
pub use config::{load_from_dir, validate, CatalogConfig, ServerSettings};
pub use documents::{DocumentStore, MemoryDocumentStore, S3DocumentStore};
pub use error::{AppError, ConfigError};
pub use i18n::Localizer;
pub use registry::Registry;
pub use repository::{MemoryRepositoryFactory, PgRepositoryFactory, Repository, RepositoryFactory};
pub use routes::{app, common_routes, entity_routes};
pub use routing::{RouteAction, RouteTable};
pub use schema::{GeneratedShape, SchemaSynthesizer, ShapeKind};
pub use service::CatalogService;
pub use state::AppState;
