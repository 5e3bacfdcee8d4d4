//! Extract the request locale: `?locale=`, then `Accept-Language`, then the default.

use crate::state::AppState;
use async_trait::async_trait;
use axum::{
    extract::FromRequestParts,
    http::{header::ACCEPT_LANGUAGE, request::Parts},
};

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RequestLocale(pub String);

#[async_trait]
impl FromRequestParts<AppState> for RequestLocale {
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let requested = parts
            .uri
            .query()
            .and_then(|q| serde_urlencoded::from_str::<Vec<(String, String)>>(q).ok())
            .and_then(|pairs| pairs.into_iter().find(|(k, _)| k == "locale").map(|(_, v)| v));
        let accept = parts.headers.get(ACCEPT_LANGUAGE).and_then(|v| v.to_str().ok());
        Ok(RequestLocale(state.messages.negotiate(requested.as_deref(), accept)))
    }
}
