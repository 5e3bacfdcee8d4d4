//! API mode routes.

use crate::handlers::api;
use crate::state::AppState;
use axum::{routing::any, Router};

pub fn api_routes(state: AppState) -> Router {
    Router::new()
        .route("/", any(api::handle))
        .route("/*rest", any(api::handle))
        .with_state(state)
}
