//! UI mode: view trees for GET, redirects after successful writes, and the
//! form again with its errors when validation fails.

use super::{content_type, query_pairs, segments};
use crate::auth::Caller;
use crate::config::{display_scalar, ResourceConfig};
use crate::dispatch::{dispatch, read_payload, resolve_route, DispatchContext, Input, Outcome, Route, RouteAction, Surface};
use crate::error::{AppError, ValidationFailure};
use crate::extractors::{CurrentCaller, RequestLocale};
use crate::render::{path_for, render, render_error, Action, RenderContext, RenderData};
use crate::service::validation::parse_id;
use crate::service::RecordPayload;
use crate::state::AppState;
use axum::{
    body::Bytes,
    extract::{RawQuery, State},
    http::{HeaderMap, Method, StatusCode, Uri},
    response::{IntoResponse, Redirect, Response},
    Json,
};

pub async fn handle(
    State(state): State<AppState>,
    CurrentCaller(caller): CurrentCaller,
    RequestLocale(locale): RequestLocale,
    method: Method,
    uri: Uri,
    RawQuery(query): RawQuery,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let ctx = RenderContext {
        registry: &state.registry,
        messages: state.messages.messages(&locale),
        caller: &caller,
        base_path: &state.settings().base_path,
    };
    let input = Input::from_body(content_type(&headers), &body);
    match serve(&state, &ctx, &caller, &method, uri.path(), query.as_deref(), input).await {
        Ok(response) => response,
        Err(err) => {
            err.log();
            (err.status(), Json(render_error(&ctx, &err))).into_response()
        }
    }
}

fn record_path(base: &str, config: &ResourceConfig, record: &RecordPayload) -> String {
    let id = record.get(config.primary_key()).map(display_scalar).unwrap_or_default();
    path_for(base, &[&config.name, &id])
}

async fn serve(
    state: &AppState,
    ctx: &RenderContext<'_>,
    caller: &Caller,
    method: &Method,
    path: &str,
    query: Option<&str>,
    input: Input,
) -> Result<Response, AppError> {
    let segments = segments(path);
    let segments: Vec<&str> = segments.iter().map(String::as_str).collect();
    let route = resolve_route(&state.registry, Surface::Ui, method, &segments)?;
    let params = query_pairs(query)?;
    let cx = DispatchContext {
        registry: &state.registry,
        store: state.store.as_ref(),
        caller,
        surface: Surface::Ui,
    };
    let resubmitted = input.clone();
    let outcome = match dispatch(&cx, &route, &params, input).await {
        Err(AppError::Validation(failure)) => return invalid_form(state, ctx, &route, resubmitted, failure),
        other => other?,
    };

    let base = ctx.base_path;
    let page = match outcome {
        Outcome::Index(_) => render(ctx, Action::Index, RenderData::Index)?,
        Outcome::List {
            config,
            records,
            page,
            query,
        } => render(
            ctx,
            Action::List,
            RenderData::List {
                config,
                records,
                page,
                query,
            },
        )?,
        Outcome::Record { config, record } => {
            let action = match route.action {
                RouteAction::EditForm => Action::Edit,
                RouteAction::DeleteConfirm => Action::DeleteConfirm,
                _ => Action::Show,
            };
            render(ctx, action, RenderData::Record { config, record })?
        }
        Outcome::Form { config } => render(
            ctx,
            Action::Create,
            RenderData::Form {
                config,
                id: None,
                values: RecordPayload::new(),
                errors: None,
            },
        )?,
        Outcome::Created { config, record } | Outcome::Updated { config, record } => {
            return Ok(Redirect::to(&record_path(base, &config, &record)).into_response())
        }
        Outcome::Deleted { config, .. } => {
            return Ok(Redirect::to(&path_for(base, &[&config.name])).into_response())
        }
        Outcome::DeletedMany { config, .. } => {
            return Err(AppError::UnsupportedAction(format!("{}: bulk delete is an API mode action", config.name)))
        }
    };
    Ok((StatusCode::OK, Json(page)).into_response())
}

/// Same form again, carrying the submitted values and every error, with 422.
fn invalid_form(
    state: &AppState,
    ctx: &RenderContext<'_>,
    route: &Route,
    submitted: Input,
    failure: ValidationFailure,
) -> Result<Response, AppError> {
    let resource = route.resource.as_deref().unwrap_or_default();
    let config = state.registry.resolve(resource)?;
    let values = read_payload(&config, Surface::Ui, submitted)?;
    let (action, id) = match (route.action, route.id.as_deref()) {
        (RouteAction::Update, Some(raw)) => (Action::Edit, parse_id(&config, raw)),
        _ => (Action::Create, None),
    };
    tracing::debug!(resource = %config.name, fields = ?failure.errors.keys().collect::<Vec<_>>(), "form rejected");
    let page = render(
        ctx,
        action,
        RenderData::Form {
            config,
            id,
            values,
            errors: Some(failure),
        },
    )?;
    Ok((StatusCode::UNPROCESSABLE_ENTITY, Json(page)).into_response())
}
