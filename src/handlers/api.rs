//! API mode: list/show/create/update/delete with JSON envelopes.

use super::{content_type, query_pairs, segments};
use crate::auth::Operation;
use crate::dispatch::{dispatch, resolve_route, DispatchContext, Input, Outcome, Surface};
use crate::error::AppError;
use crate::extractors::CurrentCaller;
use crate::response::{success_created, success_many, success_one};
use crate::state::AppState;
use axum::{
    body::Bytes,
    extract::{RawQuery, State},
    http::{HeaderMap, Method, StatusCode, Uri},
    response::{IntoResponse, Response},
};
use serde::Serialize;
use serde_json::json;

#[derive(Serialize)]
struct ResourceSummary {
    name: String,
    primary_key: String,
    /// Operations the caller may perform.
    operations: Vec<Operation>,
}

pub async fn handle(
    State(state): State<AppState>,
    CurrentCaller(caller): CurrentCaller,
    method: Method,
    uri: Uri,
    RawQuery(query): RawQuery,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Response, AppError> {
    let segments = segments(uri.path());
    let segments: Vec<&str> = segments.iter().map(String::as_str).collect();
    let route = resolve_route(&state.registry, Surface::Api, &method, &segments)?;
    let params = query_pairs(query.as_deref())?;
    let input = Input::from_body(content_type(&headers), &body);
    let cx = DispatchContext {
        registry: &state.registry,
        store: state.store.as_ref(),
        caller: &caller,
        surface: Surface::Api,
    };

    let response = match dispatch(&cx, &route, &params, input).await? {
        Outcome::Index(configs) => {
            let summaries: Vec<ResourceSummary> = configs
                .iter()
                .map(|c| ResourceSummary {
                    name: c.name.clone(),
                    primary_key: c.primary_key().to_string(),
                    operations: Operation::ALL
                        .into_iter()
                        .filter(|op| state.registry.can_act(&caller, c, *op))
                        .collect(),
                })
                .collect();
            success_one(summaries).into_response()
        }
        Outcome::List { records, page, .. } => success_many(records, page).into_response(),
        Outcome::Record { record, .. } | Outcome::Updated { record, .. } => success_one(record).into_response(),
        Outcome::Created { record, .. } => success_created(record).into_response(),
        Outcome::Deleted { .. } => StatusCode::NO_CONTENT.into_response(),
        Outcome::DeletedMany { count, .. } => success_one(json!({ "deleted": count })).into_response(),
        Outcome::Form { config } => {
            return Err(AppError::UnsupportedAction(format!("{}: forms are a UI mode action", config.name)))
        }
    };
    Ok(response)
}
