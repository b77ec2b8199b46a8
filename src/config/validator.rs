//! Config validation: referential integrity and settings consistency.

use crate::config::CatalogConfig;
use crate::error::ConfigError;
use std::collections::HashSet;

pub fn validate(config: &CatalogConfig) -> Result<(), ConfigError> {
    let mut entity_names = HashSet::new();
    for e in &config.entities {
        if !entity_names.insert(e.name.as_str()) {
            return Err(ConfigError::DuplicateEntity(e.name.clone()));
        }
    }

    let mut keys = HashSet::new();
    for res in &config.resources {
        if !entity_names.contains(res.entity.as_str()) {
            return Err(ConfigError::MissingReference {
                kind: "entity",
                id: res.entity.clone(),
            });
        }
        if res.key.is_empty() || res.key.contains('/') {
            return Err(ConfigError::Validation(format!(
                "resource key '{}' must be a single non-empty path segment",
                res.key
            )));
        }
        if !keys.insert(res.key.to_lowercase()) {
            return Err(ConfigError::DuplicateResourceKey(res.key.clone()));
        }
    }

    let langs = &config.settings.languages;
    if !langs.supported.is_empty() && !langs.supported.contains(&langs.base) {
        return Err(ConfigError::Validation(format!(
            "base language '{}' is not in the supported list",
            langs.base
        )));
    }
    if langs.supported.iter().any(|l| l.is_empty() || l.contains('/')) {
        return Err(ConfigError::Validation("language codes must be non-empty path segments".into()));
    }

    let depth = config.settings.synthesis.max_depth;
    if depth < 0 {
        return Err(ConfigError::NegativeDepth(depth));
    }

    let pagination = &config.settings.pagination;
    if pagination.default_page_size == 0 || pagination.default_page_size > pagination.max_page_size {
        return Err(ConfigError::Validation(
            "default_page_size must be between 1 and max_page_size".into(),
        ));
    }

    Ok(())
}
