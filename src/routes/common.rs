//! Common routes: health, version, OpenAPI document and the synthesized route listing.

use crate::state::AppState;
use axum::{extract::State, routing::get, Json, Router};
use serde::Serialize;
use serde_json::{json, Value};

#[derive(Serialize)]
struct HealthBody {
    status: &'static str,
}

async fn health() -> Json<HealthBody> {
    Json(HealthBody { status: "ok" })
}

async fn version() -> Json<Value> {
    Json(json!({
        "name": env!("CARGO_PKG_NAME"),
        "version": env!("CARGO_PKG_VERSION")
    }))
}

async fn openapi(State(state): State<AppState>) -> Json<Value> {
    Json(serde_json::to_value(state.openapi.as_ref()).unwrap_or(Value::Null))
}

/// Every synthesized route with its method and bound shape.
async fn route_listing(State(state): State<AppState>) -> Json<Value> {
    let routes: Vec<Value> = state
        .routes
        .entries()
        .iter()
        .map(|e| {
            json!({
                "method": e.action.method(),
                "path": e.path,
                "template": e.template.as_str(),
                "resource": e.resource_key,
                "language": e.language,
                "shape": e.shape.describe(),
            })
        })
        .collect();
    Json(json!({
        "languages": state.localizer.languages(),
        "routes": routes,
    }))
}

/// GET /health, GET /version, GET /info, GET /openapi.json, GET /routes.
pub fn common_routes(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/version", get(version))
        .route("/info", get(version))
        .route("/openapi.json", get(openapi))
        .route("/routes", get(route_listing))
        .with_state(state)
}
