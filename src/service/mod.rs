//! Resource services: shape validation and CRUD orchestration over repositories.

mod catalog;
mod validation;
pub use catalog::{coerce_param, CatalogContext, CatalogService};
pub use validation::{RequestValidator, ShapeValidator};
