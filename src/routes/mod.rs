//! Router assembly.

pub mod admin;
pub mod api;
pub mod common;

pub use admin::admin_routes;
pub use api::api_routes;
pub use common::common_routes;

use crate::state::AppState;
use axum::Router;
use tower::ServiceBuilder;
use tower_http::{limit::RequestBodyLimitLayer, trace::TraceLayer};

/// Common routes at the root, API mode under `api_base_path`, UI mode under
/// `base_path`, with request tracing and the configured body limit.
pub fn admin_app(state: AppState) -> Router {
    let settings = state.settings().clone();
    Router::new()
        .merge(common_routes(state.clone()))
        .nest(&settings.api_base_path, api_routes(state.clone()))
        .nest(&settings.base_path, admin_routes(state))
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(RequestBodyLimitLayer::new(settings.body_limit)),
        )
}
