//! Extract the calling user from the request via the configured identity provider.

use crate::auth::Caller;
use crate::state::AppState;
use async_trait::async_trait;
use axum::{extract::FromRequestParts, http::request::Parts};

/// The caller as seen by the host's `IdentityProvider`. Anonymous when it knows nobody.
#[derive(Clone, Debug)]
pub struct CurrentCaller(pub Caller);

#[async_trait]
impl FromRequestParts<AppState> for CurrentCaller {
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        Ok(CurrentCaller(state.identity.identify(parts)))
    }
}
