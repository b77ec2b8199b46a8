//! axum routers.

mod common;
mod entity;

pub use common::common_routes;
pub use entity::entity_routes;

use crate::state::AppState;
use axum::Router;

/// Common routes plus every resource route.
pub fn app(state: AppState) -> Router {
    common_routes(state.clone()).merge(entity_routes(state))
}
