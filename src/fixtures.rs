//! Bundled wine catalog definition, shared by unit and integration tests.

use crate::config::{parse_documents, CatalogConfig};

const ENTITIES: &str = include_str!("../sample/entities.json");
const RESOURCES: &str = include_str!("../sample/resources.json");
const SETTINGS: &str = include_str!("../sample/settings.json");

/// The sample catalog: Country, Region, Category (self-referencing), Varietal, Drink.
pub fn wine_catalog() -> CatalogConfig {
    parse_documents(ENTITIES, RESOURCES, SETTINGS).expect("bundled sample config parses")
}
