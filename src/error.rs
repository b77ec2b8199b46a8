//! Typed errors and HTTP mapping.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

/// Bootstrap-time errors. Any of these aborts startup.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("entity {entity} declares a composite primary key ({columns:?})")]
    CompositePrimaryKey { entity: String, columns: Vec<String> },
    #[error("entity {0} has no primary key column")]
    MissingPrimaryKey(String),
    #[error("missing reference: {kind} '{id}'")]
    MissingReference { kind: &'static str, id: String },
    #[error("entity {entity} references {target}, which has not been introspected")]
    UnresolvedEntity { entity: String, target: String },
    #[error("synthesis depth must be >= 0, got {0}")]
    NegativeDepth(i64),
    #[error("duplicate {kind} registration for key '{key}'")]
    DuplicateRegistration { kind: &'static str, key: String },
    #[error("duplicate resource key: {0}")]
    DuplicateResourceKey(String),
    #[error("duplicate entity: {0}")]
    DuplicateEntity(String),
    #[error("config load: {0}")]
    Load(String),
    #[error("validation: {0}")]
    Validation(String),
}

/// One field-level problem found while enforcing a shape or a column rule.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct FieldError {
    pub field: String,
    pub message: String,
}

impl FieldError {
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        FieldError {
            field: field.into(),
            message: message.into(),
        }
    }
}

#[derive(Error, Debug)]
pub enum AppError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("not found: {0}")]
    NotFound(String),
    #[error("validation: {message}")]
    Validation {
        message: String,
        fields: Vec<FieldError>,
    },
    #[error("database: {0}")]
    Db(#[from] sqlx::Error),
    #[error("conflict: {0}")]
    Conflict(String),
    #[error("bad request: {0}")]
    BadRequest(String),
    #[error("document storage: {0}")]
    Storage(String),
}

impl AppError {
    /// Validation error with a single field entry.
    pub fn invalid_field(field: impl Into<String>, message: impl Into<String>) -> Self {
        let err = FieldError::new(field, message);
        AppError::Validation {
            message: format!("{} {}", err.field, err.message),
            fields: vec![err],
        }
    }

    /// Validation error summarising several field entries. `fields` must not be empty.
    pub fn invalid_fields(fields: Vec<FieldError>) -> Self {
        let message = match fields.as_slice() {
            [one] => format!("{} {}", one.field, one.message),
            many => format!("{} fields failed validation", many.len()),
        };
        AppError::Validation { message, fields }
    }
}

#[derive(Serialize)]
pub struct ErrorBody {
    pub error: ErrorDetail,
}

#[derive(Serialize)]
pub struct ErrorDetail {
    pub code: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code) = match &self {
            AppError::Config(_) => (StatusCode::INTERNAL_SERVER_ERROR, "config_error"),
            AppError::NotFound(_) => (StatusCode::NOT_FOUND, "not_found"),
            AppError::Validation { .. } => (StatusCode::UNPROCESSABLE_ENTITY, "validation_error"),
            AppError::Db(e) => {
                if let sqlx::Error::RowNotFound = e {
                    (StatusCode::NOT_FOUND, "not_found")
                } else {
                    (StatusCode::INTERNAL_SERVER_ERROR, "database_error")
                }
            }
            AppError::Conflict(_) => (StatusCode::CONFLICT, "conflict"),
            AppError::BadRequest(_) => (StatusCode::BAD_REQUEST, "bad_request"),
            AppError::Storage(_) => (StatusCode::BAD_GATEWAY, "storage_error"),
        };
        let details = match &self {
            AppError::Validation { fields, .. } => serde_json::to_value(fields).ok(),
            _ => None,
        };
        let body = ErrorBody {
            error: ErrorDetail {
                code: code.to_string(),
                message: self.to_string(),
                details,
            },
        };
        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn single_field_message_names_the_field() {
        let err = AppError::invalid_fields(vec![FieldError::new("name", "is required")]);
        assert_eq!(err.to_string(), "validation: name is required");
    }

    #[test]
    fn validation_maps_to_unprocessable_entity() {
        let resp = AppError::invalid_field("price", "must be a number").into_response();
        assert_eq!(resp.status(), StatusCode::UNPROCESSABLE_ENTITY);
        let resp = AppError::NotFound("wines".into()).into_response();
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    }
}
