//! Shared application state for all routes. Built once at startup; nothing in
//! it is mutated while serving.

use crate::auth::{HeaderIdentity, IdentityProvider};
use crate::config::Registry;
use crate::render::i18n::MessageCatalog;
use crate::settings::AdminSettings;
use crate::store::Store;
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
    pub registry: Arc<Registry>,
    pub store: Arc<dyn Store>,
    pub identity: Arc<dyn IdentityProvider>,
    pub messages: Arc<MessageCatalog>,
}

impl AppState {
    /// State with header-based identity and no localized messages.
    pub fn new(registry: Registry, store: Arc<dyn Store>) -> Self {
        let messages = MessageCatalog::new(registry.settings().default_locale.clone());
        AppState {
            registry: Arc::new(registry),
            store,
            identity: Arc::new(HeaderIdentity),
            messages: Arc::new(messages),
        }
    }

    pub fn with_identity(mut self, identity: impl IdentityProvider + 'static) -> Self {
        self.identity = Arc::new(identity);
        self
    }

    pub fn with_messages(mut self, messages: MessageCatalog) -> Self {
        self.messages = Arc::new(messages);
        self
    }

    pub fn settings(&self) -> &AdminSettings {
        self.registry.settings()
    }
}
