//! Resource handlers: localized list and read, language-free create, update and delete.
//! Each request is checked against the route table before reaching the resource service.

use crate::error::AppError;
use crate::response::{success_localized, success_one, success_one_ok};
use crate::routing::RouteAction;
use crate::state::AppState;
use axum::{
    extract::{Path, Query, State},
    Json,
};
use serde_json::Value;
use std::collections::HashMap;

fn parse_number(name: &str, raw: &str) -> Result<u32, AppError> {
    raw.parse()
        .map_err(|_| AppError::BadRequest(format!("{} must be a positive integer", name)))
}

fn body_object(body: Value) -> Result<Value, AppError> {
    match body {
        Value::Object(_) => Ok(body),
        _ => Err(AppError::BadRequest("body must be a JSON object".into())),
    }
}

/// GET /:resource/:language. `page` and `page_size` page the result; other query keys filter by column.
pub async fn list(
    State(state): State<AppState>,
    Path((resource, language)): Path<(String, String)>,
    Query(params): Query<HashMap<String, String>>,
) -> Result<impl axum::response::IntoResponse, AppError> {
    let route = state.routes.require(RouteAction::List, &resource, Some(&language))?;
    let service = state.service(&route.resource_key)?;

    let mut page = None;
    let mut page_size = None;
    let mut filters: Vec<(String, String)> = Vec::new();
    for (k, v) in params {
        match k.as_str() {
            "page" => page = Some(parse_number("page", &v)?),
            "page_size" => page_size = Some(parse_number("page_size", &v)?),
            _ => filters.push((k, v)),
        }
    }
    filters.sort();

    let language = route.language.as_deref().unwrap_or(&language);
    let data = service.list(language, page, page_size, &filters).await?;
    Ok(success_localized(data, language, &route.shape.name))
}

/// GET /:resource/:language/:id
pub async fn read(
    State(state): State<AppState>,
    Path((resource, language, id)): Path<(String, String, String)>,
) -> Result<impl axum::response::IntoResponse, AppError> {
    let route = state.routes.require(RouteAction::Read, &resource, Some(&language))?;
    let service = state.service(&route.resource_key)?;
    let language = route.language.as_deref().unwrap_or(&language);
    let data = service.read(language, &id).await?;
    Ok(success_localized(data, language, &route.shape.name))
}

pub async fn create(
    State(state): State<AppState>,
    Path(resource): Path<String>,
    Json(body): Json<Value>,
) -> Result<impl axum::response::IntoResponse, AppError> {
    let route = state.routes.require(RouteAction::Create, &resource, None)?;
    let service = state.service(&route.resource_key)?;
    let row = service.create(body_object(body)?).await?;
    Ok(success_one(row))
}

pub async fn update(
    State(state): State<AppState>,
    Path((resource, id)): Path<(String, String)>,
    Json(body): Json<Value>,
) -> Result<impl axum::response::IntoResponse, AppError> {
    let route = state.routes.require(RouteAction::Update, &resource, None)?;
    let service = state.service(&route.resource_key)?;
    let row = service.update(&id, body_object(body)?).await?;
    Ok(success_one_ok(row))
}

pub async fn delete(
    State(state): State<AppState>,
    Path((resource, id)): Path<(String, String)>,
) -> Result<impl axum::response::IntoResponse, AppError> {
    let route = state.routes.require(RouteAction::Delete, &resource, None)?;
    let service = state.service(&route.resource_key)?;
    let result = service.delete(&id).await?;
    Ok(success_one_ok(result))
}
