//! Typed errors and HTTP mapping.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use std::collections::BTreeMap;
use thiserror::Error;

/// Schema document problems. Startup-fatal.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SchemaError {
    #[error("schema load: {0}")]
    Load(String),
    #[error("duplicate resource: {0}")]
    DuplicateResource(String),
    #[error("duplicate field: {resource}.{field}")]
    DuplicateField { resource: String, field: String },
    #[error("unrecognized field kind '{kind}' for {resource}.{field}")]
    UnknownFieldKind {
        resource: String,
        field: String,
        kind: String,
    },
    #[error("enum field {resource}.{field} declares no values")]
    EmptyEnum { resource: String, field: String },
    #[error("primary key '{field}' is not a field of {resource}")]
    InvalidPrimaryKey { resource: String, field: String },
    #[error("relation {resource}.{relation} references undeclared resource '{target}'")]
    UnknownResource {
        resource: String,
        relation: String,
        target: String,
    },
    #[error("relation {resource}.{relation}: {reason}")]
    InvalidForeignKey {
        resource: String,
        relation: String,
        reason: String,
    },
    #[error("relation {resource}.{relation} is {cardinality} but {target}.{counterpart} is not its counterpart ({expected} expected)")]
    AsymmetricRelation {
        resource: String,
        relation: String,
        cardinality: &'static str,
        target: String,
        counterpart: String,
        expected: &'static str,
    },
}

/// Option overrides that do not fit the schema. Startup-fatal.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConfigError {
    #[error("config load: {0}")]
    Load(String),
    #[error("options reference unknown resource '{0}'")]
    UnknownResource(String),
    #[error("{resource}: option '{option}' references unknown field '{field}'")]
    UnknownField {
        resource: String,
        option: &'static str,
        field: String,
    },
    #[error("{resource}: default sort field '{field}' is not sortable")]
    UnsortableDefault { resource: String, field: String },
    #[error("{resource}: unknown widget '{widget}' for field '{field}'")]
    UnknownWidget {
        resource: String,
        field: String,
        widget: String,
    },
    #[error("{resource}: invalid pattern for field '{field}': {reason}")]
    InvalidPattern {
        resource: String,
        field: String,
        reason: String,
    },
    #[error("{resource}: required field '{field}' is hidden from the edit view while create is enabled")]
    RequiredFieldHidden { resource: String, field: String },
    #[error("{resource}: named filter '{filter}': {reason}")]
    InvalidFilter {
        resource: String,
        filter: String,
        reason: String,
    },
}

/// Field-level validation result. Always carried whole to the caller.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ValidationFailure {
    pub resource: String,
    pub errors: BTreeMap<String, Vec<String>>,
}

impl ValidationFailure {
    pub fn new(resource: impl Into<String>) -> Self {
        Self {
            resource: resource.into(),
            errors: BTreeMap::new(),
        }
    }

    pub fn push(&mut self, field: impl Into<String>, message: impl Into<String>) {
        self.errors.entry(field.into()).or_default().push(message.into());
    }

    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    /// `Ok(())` when nothing was recorded, otherwise the failure itself.
    pub fn into_result(self) -> Result<(), AppError> {
        if self.is_empty() {
            Ok(())
        } else {
            Err(AppError::Validation(self))
        }
    }
}

impl std::fmt::Display for ValidationFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let fields: Vec<&str> = self.errors.keys().map(String::as_str).collect();
        write!(f, "{} failed validation on: {}", self.resource, fields.join(", "))
    }
}

/// Storage collaborator signals.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("record not found")]
    NotFound,
    #[error("constraint violation: {0}")]
    Constraint(String),
    #[error("storage: {0}")]
    Backend(String),
}

impl From<sqlx::Error> for StoreError {
    fn from(e: sqlx::Error) -> Self {
        match &e {
            sqlx::Error::RowNotFound => StoreError::NotFound,
            sqlx::Error::Database(db) => match db.code().as_deref() {
                // unique_violation, foreign_key_violation, not_null_violation, check_violation
                Some("23505") | Some("23503") | Some("23502") | Some("23514") => {
                    StoreError::Constraint(db.message().to_string())
                }
                _ => StoreError::Backend(e.to_string()),
            },
            _ => StoreError::Backend(e.to_string()),
        }
    }
}

#[derive(Error, Debug)]
pub enum AppError {
    #[error(transparent)]
    Schema(#[from] SchemaError),
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("invalid query: {0}")]
    InvalidQuery(String),
    #[error("{0}")]
    Validation(ValidationFailure),
    #[error("record not found: {resource}/{id}")]
    NotFound { resource: String, id: String },
    #[error("resource not found: {0}")]
    ResourceNotFound(String),
    #[error("unsupported action: {0}")]
    UnsupportedAction(String),
    /// Reported like the matching not-found error; never reveals existence.
    #[error("permission denied: {resource} {operation}")]
    Forbidden {
        resource: String,
        operation: &'static str,
        id: Option<String>,
    },
    #[error("conflict: {0}")]
    Conflict(String),
    #[error("bad request: {0}")]
    BadRequest(String),
    #[error("storage: {0}")]
    Store(String),
}

impl AppError {
    pub fn not_found(resource: &str, id: impl ToString) -> Self {
        AppError::NotFound {
            resource: resource.to_string(),
            id: id.to_string(),
        }
    }

    /// Lifts a store error raised while working on `resource`/`id`.
    pub fn from_store(e: StoreError, resource: &str, id: Option<&str>) -> Self {
        match e {
            StoreError::NotFound => match id {
                Some(id) => AppError::not_found(resource, id),
                None => AppError::ResourceNotFound(resource.to_string()),
            },
            StoreError::Constraint(msg) => AppError::Conflict(msg),
            StoreError::Backend(msg) => AppError::Store(msg),
        }
    }

    /// Status, code and message as seen by clients. Permission denial is
    /// indistinguishable from the not-found error of the same target.
    pub fn public_parts(&self) -> (StatusCode, &'static str, String) {
        match self {
            AppError::Schema(_) => (StatusCode::INTERNAL_SERVER_ERROR, "schema_error", self.to_string()),
            AppError::Config(_) => (StatusCode::INTERNAL_SERVER_ERROR, "config_error", self.to_string()),
            AppError::InvalidQuery(_) => (StatusCode::BAD_REQUEST, "invalid_query", self.to_string()),
            AppError::Validation(_) => (StatusCode::UNPROCESSABLE_ENTITY, "validation_error", self.to_string()),
            AppError::NotFound { .. } => (StatusCode::NOT_FOUND, "not_found", self.to_string()),
            AppError::ResourceNotFound(_) => (StatusCode::NOT_FOUND, "not_found", self.to_string()),
            AppError::UnsupportedAction(_) => (StatusCode::METHOD_NOT_ALLOWED, "unsupported_action", self.to_string()),
            AppError::Forbidden { resource, id, .. } => {
                let concealed = match id {
                    Some(id) => AppError::not_found(resource, id),
                    None => AppError::ResourceNotFound(resource.clone()),
                };
                (StatusCode::NOT_FOUND, "not_found", concealed.to_string())
            }
            AppError::Conflict(_) => (StatusCode::CONFLICT, "conflict", self.to_string()),
            AppError::BadRequest(_) => (StatusCode::BAD_REQUEST, "bad_request", self.to_string()),
            AppError::Store(_) => (StatusCode::INTERNAL_SERVER_ERROR, "storage_error", self.to_string()),
        }
    }

    pub fn status(&self) -> StatusCode {
        self.public_parts().0
    }
}

#[derive(Serialize)]
pub struct ErrorBody {
    pub error: ErrorDetail,
}

#[derive(Serialize)]
pub struct ErrorDetail {
    pub code: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl From<&AppError> for ErrorBody {
    fn from(e: &AppError) -> Self {
        let (_, code, message) = e.public_parts();
        let details = match e {
            AppError::Validation(failure) => serde_json::to_value(failure).ok(),
            _ => None,
        };
        ErrorBody {
            error: ErrorDetail {
                code: code.to_string(),
                message,
                details,
            },
        }
    }
}

impl AppError {
    /// Log once at the boundary, before the error is turned into a response.
    pub fn log(&self) {
        match self {
            AppError::Forbidden { resource, operation, id } => {
                tracing::warn!(resource = %resource, operation = %operation, id = ?id, "permission denied (reported as not found)");
            }
            _ if self.status().is_server_error() => tracing::error!(error = %self, "request failed"),
            _ => tracing::debug!(error = %self, "request rejected"),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        self.log();
        (self.status(), Json(ErrorBody::from(&self))).into_response()
    }
}
