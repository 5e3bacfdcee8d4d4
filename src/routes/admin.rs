//! UI mode routes. Every path below the mount point goes through one handler;
//! the dispatcher decides what the segments mean.

use crate::handlers::ui;
use crate::state::AppState;
use axum::{routing::any, Router};

pub fn admin_routes(state: AppState) -> Router {
    Router::new()
        .route("/", any(ui::handle))
        .route("/*rest", any(ui::handle))
        .with_state(state)
}
