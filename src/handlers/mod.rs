//! HTTP handlers for resource CRUD and documents.

pub mod document;
pub mod entity;
pub use entity::*;
