//! Raw config types matching the JSON documents (entities.json, resources.json, settings.json).

use serde::{Deserialize, Deserializer, Serialize};
use std::collections::HashMap;

/// Column scalar types understood by the introspector.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScalarType {
    Integer,
    BigInteger,
    Float,
    Decimal,
    Boolean,
    String,
    Text,
    Date,
    DateTime,
    Uuid,
    Json,
    /// Reference (id) to a binary asset held by the document store.
    Document,
}

impl ScalarType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ScalarType::Integer => "integer",
            ScalarType::BigInteger => "big_integer",
            ScalarType::Float => "float",
            ScalarType::Decimal => "decimal",
            ScalarType::Boolean => "boolean",
            ScalarType::String => "string",
            ScalarType::Text => "text",
            ScalarType::Date => "date",
            ScalarType::DateTime => "date_time",
            ScalarType::Uuid => "uuid",
            ScalarType::Json => "json",
            ScalarType::Document => "document",
        }
    }

    pub fn is_integer(&self) -> bool {
        matches!(self, ScalarType::Integer | ScalarType::BigInteger)
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub enum ColumnDefaultConfig {
    Literal(String),
    Expression { expression: String },
}

impl<'de> Deserialize<'de> for ColumnDefaultConfig {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let v = serde_json::Value::deserialize(deserializer)?;
        match v {
            serde_json::Value::String(s) => Ok(ColumnDefaultConfig::Literal(s)),
            serde_json::Value::Bool(b) => Ok(ColumnDefaultConfig::Literal(b.to_string())),
            serde_json::Value::Number(n) => Ok(ColumnDefaultConfig::Literal(n.to_string())),
            serde_json::Value::Object(mut obj) => {
                if let Some(serde_json::Value::String(s)) = obj.remove("expression") {
                    return Ok(ColumnDefaultConfig::Expression { expression: s });
                }
                if let Some(serde_json::Value::String(s)) =
                    obj.remove("value").or_else(|| obj.remove("literal"))
                {
                    return Ok(ColumnDefaultConfig::Literal(s));
                }
                Err(serde::de::Error::custom(format!(
                    "column default must be a scalar, {{ \"expression\": \"...\" }}, or {{ \"value\": \"...\" }}; got object with keys: {:?}",
                    obj.keys().collect::<Vec<_>>()
                )))
            }
            other => Err(serde::de::Error::custom(format!(
                "column default must be a scalar or {{ \"expression\": \"...\" }}; got {}",
                type_name_of_json(&other)
            ))),
        }
    }
}

pub(crate) fn type_name_of_json(v: &serde_json::Value) -> &'static str {
    match v {
        serde_json::Value::Null => "null",
        serde_json::Value::Bool(_) => "boolean",
        serde_json::Value::Number(_) => "number",
        serde_json::Value::String(_) => "string",
        serde_json::Value::Array(_) => "array",
        serde_json::Value::Object(_) => "object",
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ColumnConfig {
    pub name: String,
    #[serde(rename = "type")]
    pub type_: ScalarType,
    #[serde(default = "default_true")]
    pub nullable: bool,
    #[serde(default)]
    pub primary_key: bool,
    #[serde(default)]
    pub default: Option<ColumnDefaultConfig>,
    /// Expanded into one `<name>_<lang>` column per non-base language.
    #[serde(default)]
    pub localized: bool,
}

fn default_true() -> bool {
    true
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Cardinality {
    OneToMany,
    ManyToOne,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RelationshipConfig {
    pub name: String,
    pub target: String,
    pub cardinality: Cardinality,
    /// many_to_one: our column holding the target id (default `<name>_id`).
    /// one_to_many: the target's column pointing back at us (default `<entity>_id`).
    #[serde(default)]
    pub foreign_key: Option<String>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct EntityConfig {
    pub name: String,
    /// Storage table name; defaults to the lower-cased entity name.
    #[serde(default)]
    pub table: Option<String>,
    pub columns: Vec<ColumnConfig>,
    #[serde(default)]
    pub relationships: Vec<RelationshipConfig>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ValidationRule {
    #[serde(default)]
    pub required: Option<bool>,
    #[serde(default)]
    pub format: Option<String>,
    #[serde(default)]
    pub max_length: Option<u32>,
    #[serde(default)]
    pub min_length: Option<u32>,
    #[serde(default)]
    pub pattern: Option<String>,
    #[serde(default)]
    pub allowed: Option<Vec<serde_json::Value>>,
    #[serde(default)]
    pub minimum: Option<f64>,
    #[serde(default)]
    pub maximum: Option<f64>,
}

pub const ALL_OPERATIONS: &[&str] = &["list", "read", "create", "update", "delete"];

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ResourceConfig {
    /// Path segment, e.g. "drinks".
    pub key: String,
    pub entity: String,
    #[serde(default = "default_operations")]
    pub operations: Vec<String>,
    #[serde(default)]
    pub validation: HashMap<String, ValidationRule>,
    /// Column names that must never be exposed in API responses.
    #[serde(default)]
    pub sensitive_columns: Vec<String>,
}

fn default_operations() -> Vec<String> {
    ALL_OPERATIONS.iter().map(|s| s.to_string()).collect()
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct LanguageSettings {
    #[serde(default = "default_base_language")]
    pub base: String,
    #[serde(default)]
    pub supported: Vec<String>,
}

fn default_base_language() -> String {
    "en".into()
}

impl Default for LanguageSettings {
    fn default() -> Self {
        LanguageSettings {
            base: default_base_language(),
            supported: vec![default_base_language()],
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SynthesisSettings {
    #[serde(default = "default_max_depth")]
    pub max_depth: i64,
    #[serde(default)]
    pub include_one_to_many_at_depth_1: bool,
    #[serde(default)]
    pub always_include: Vec<String>,
}

fn default_max_depth() -> i64 {
    1
}

impl Default for SynthesisSettings {
    fn default() -> Self {
        SynthesisSettings {
            max_depth: default_max_depth(),
            include_one_to_many_at_depth_1: false,
            always_include: Vec::new(),
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PaginationSettings {
    #[serde(default = "default_page_size")]
    pub default_page_size: u32,
    #[serde(default = "default_max_page_size")]
    pub max_page_size: u32,
}

fn default_page_size() -> u32 {
    20
}

fn default_max_page_size() -> u32 {
    100
}

impl Default for PaginationSettings {
    fn default() -> Self {
        PaginationSettings {
            default_page_size: default_page_size(),
            max_page_size: default_max_page_size(),
        }
    }
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct SettingsConfig {
    #[serde(default)]
    pub languages: LanguageSettings,
    #[serde(default)]
    pub synthesis: SynthesisSettings,
    #[serde(default)]
    pub pagination: PaginationSettings,
}

/// All config documents in one struct for in-memory loading.
#[derive(Clone, Debug, Default)]
pub struct CatalogConfig {
    pub entities: Vec<EntityConfig>,
    pub resources: Vec<ResourceConfig>,
    pub settings: SettingsConfig,
}
