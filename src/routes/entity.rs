//! Resource routes. Paths are parameterized; handlers resolve resource and language through the
//! route table, so unknown keys and languages are 404s rather than unmatched routes.
//! The second segment is a language for reads and an id for mutations and documents; axum needs
//! one parameter name per position, so it is `:key` throughout.

use crate::handlers::document::{download, upload, upload_multipart};
use crate::handlers::entity::{create, delete as delete_handler, list, read, update};
use crate::state::AppState;
use axum::{extract::DefaultBodyLimit, routing::get, routing::post, Router};
use tower_http::limit::RequestBodyLimitLayer;

pub fn entity_routes(state: AppState) -> Router {
    let documents = Router::new()
        .route(
            "/:resource/:key/documents/:field",
            get(download).put(upload).post(upload_multipart),
        )
        .layer(DefaultBodyLimit::disable())
        .layer(RequestBodyLimitLayer::new(state.body_limit));

    Router::new()
        .route("/:resource", post(create))
        .route("/:resource/:key", get(list).patch(update).delete(delete_handler))
        .route("/:resource/:key/:id", get(read))
        .merge(documents)
        .with_state(state)
}
