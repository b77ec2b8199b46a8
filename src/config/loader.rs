//! Load config documents from a directory or from in-memory JSON strings.

use crate::config::types::*;
use crate::error::ConfigError;
use std::path::Path;

const ENTITIES_FILE: &str = "entities.json";
const RESOURCES_FILE: &str = "resources.json";
const SETTINGS_FILE: &str = "settings.json";

/// Load `entities.json`, `resources.json` and (optional) `settings.json` from `dir`.
pub async fn load_from_dir(dir: impl AsRef<Path>) -> Result<CatalogConfig, ConfigError> {
    let dir = dir.as_ref();
    let entities = read_document(&dir.join(ENTITIES_FILE)).await?;
    let resources = read_document(&dir.join(RESOURCES_FILE)).await?;
    let settings = match tokio::fs::read_to_string(dir.join(SETTINGS_FILE)).await {
        Ok(s) => s,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => "{}".into(),
        Err(e) => return Err(ConfigError::Load(format!("{}: {}", SETTINGS_FILE, e))),
    };
    tracing::debug!(dir = %dir.display(), "loading catalog config");
    parse_documents(&entities, &resources, &settings)
}

async fn read_document(path: &Path) -> Result<String, ConfigError> {
    tokio::fs::read_to_string(path)
        .await
        .map_err(|e| ConfigError::Load(format!("{}: {}", path.display(), e)))
}

/// Parse the three config documents. Settings with no supported languages fall back to the base language only.
pub fn parse_documents(entities: &str, resources: &str, settings: &str) -> Result<CatalogConfig, ConfigError> {
    let entities: Vec<EntityConfig> =
        serde_json::from_str(entities).map_err(|e| ConfigError::Load(format!("{}: {}", ENTITIES_FILE, e)))?;
    let resources: Vec<ResourceConfig> =
        serde_json::from_str(resources).map_err(|e| ConfigError::Load(format!("{}: {}", RESOURCES_FILE, e)))?;
    let mut settings: SettingsConfig =
        serde_json::from_str(settings).map_err(|e| ConfigError::Load(format!("{}: {}", SETTINGS_FILE, e)))?;
    if settings.languages.supported.is_empty() {
        settings.languages.supported = vec![settings.languages.base.clone()];
    }
    Ok(CatalogConfig {
        entities,
        resources,
        settings,
    })
}
