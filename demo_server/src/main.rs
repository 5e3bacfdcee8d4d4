//! Demo host for the admin engine.
//!
//! Run from repo root: `cargo run -p demo-server`
//! Uses PostgreSQL when `DATABASE_URL` is set, an in-memory store otherwise.

use architect_admin::{
    admin_app, init_tracing, load_options_file, load_schema_file, AdminOptions, AdminSettings, AppState, MemoryStore,
    MessageCatalog, PgStore, Registry, Store,
};
use std::sync::Arc;
use tokio::net::TcpListener;

fn env_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.into())
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();
    init_tracing();

    let settings = AdminSettings::from_env();
    let catalog = load_schema_file(env_or("ADMIN_SCHEMA_PATH", "demo_server/config/schema.json")).await?;
    let options_doc = load_options_file(env_or("ADMIN_OPTIONS_PATH", "demo_server/config/options.json")).await?;
    let messages =
        MessageCatalog::load_file(env_or("ADMIN_MESSAGES_PATH", "demo_server/config/messages.json"), &settings.default_locale)
            .await?;

    // Code-only options on top of the declarative document.
    let options = AdminOptions::from(options_doc)
        .configure("Post", |o| {
            o.validator("publish_needs_body", |record| {
                let published = record.get("published").and_then(|v| v.as_bool()).unwrap_or(false);
                let empty_body = record.get("body").and_then(|v| v.as_str()).map_or(true, str::is_empty);
                if published && empty_body {
                    vec![("body".into(), "required to publish".into())]
                } else {
                    Vec::new()
                }
            })
        })
        .can_act(|caller, _resource, op| {
            use architect_admin::Operation;
            matches!(op, Operation::List | Operation::Show) || caller.has_role("editor") || caller.has_role("admin")
        });
    let registry = Registry::init(catalog, options, settings.clone())?;

    let store: Arc<dyn Store> = match std::env::var("DATABASE_URL") {
        Ok(url) => {
            tracing::info!("using PostgreSQL store");
            Arc::new(PgStore::connect(&url).await?)
        }
        Err(_) => {
            tracing::info!("DATABASE_URL not set, using in-memory store");
            Arc::new(MemoryStore::new())
        }
    };

    let state = AppState::new(registry, store).with_messages(messages);
    let app = admin_app(state);

    let listener = TcpListener::bind(env_or("ADMIN_BIND", "127.0.0.1:3000")).await?;
    tracing::info!(
        ui = %settings.base_path,
        api = %settings.api_base_path,
        "admin listening on http://{}",
        listener.local_addr()?
    );
    axum::serve(listener, app).await?;
    Ok(())
}
