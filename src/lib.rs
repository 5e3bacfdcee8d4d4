//! Architect Admin: schema-driven administration engine. Given a data-model
//! schema and per-resource options it serves a CRUD dashboard (view trees)
//! and a JSON API without per-resource handler code.

pub mod auth;
pub mod config;
pub mod dispatch;
pub mod error;
pub mod extractors;
pub mod handlers;
pub mod logging;
pub mod render;
pub mod response;
pub mod routes;
pub mod service;
pub mod settings;
pub mod sql;
pub mod state;
pub mod store;

pub use auth::{Caller, HeaderIdentity, IdentityProvider, Operation};
pub use config::{
    load_options_file, load_schema_file, AdminOptions, Catalog, Registry, ResourceConfig, ResourceOptions,
    SchemaDocument,
};
pub use dispatch::{dispatch, resolve_route, DispatchContext, Outcome, Route, RouteAction, Surface};
pub use error::{AppError, ConfigError, SchemaError, StoreError, ValidationFailure};
pub use logging::init_tracing;
pub use render::{i18n::MessageCatalog, render, render_action, render_error, Action, RenderContext, RenderData};
pub use routes::{admin_app, admin_routes, api_routes, common_routes};
pub use service::{MutationExecutor, QueryPlanner, QuerySpec, RecordPayload, RequestValidator};
pub use settings::AdminSettings;
pub use state::AppState;
pub use store::{MemoryStore, PgStore, Store};
