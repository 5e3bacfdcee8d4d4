//! Standard response envelope helpers for API mode.

use crate::service::{PageInfo, RecordPayload};
use axum::{http::StatusCode, Json};
use serde::Serialize;

#[derive(Serialize)]
pub struct SuccessOne<T> {
    pub data: T,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub meta: Option<serde_json::Value>,
}

#[derive(Serialize)]
pub struct SuccessMany<T> {
    pub data: Vec<T>,
    pub meta: PageInfo,
}

pub fn success_one<T: Serialize>(data: T) -> (StatusCode, Json<SuccessOne<T>>) {
    (StatusCode::OK, Json(SuccessOne { data, meta: None }))
}

pub fn success_created(data: RecordPayload) -> (StatusCode, Json<SuccessOne<RecordPayload>>) {
    (StatusCode::CREATED, Json(SuccessOne { data, meta: None }))
}

pub fn success_many(data: Vec<RecordPayload>, page: PageInfo) -> (StatusCode, Json<SuccessMany<RecordPayload>>) {
    (StatusCode::OK, Json(SuccessMany { data, meta: page }))
}
