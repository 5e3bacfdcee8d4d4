//! PostgreSQL adapter: SQL from `crate::sql`, rows decoded to JSON records.

use super::{Predicate, Store, StoreQuery};
use crate::config::{FieldKind, ResourceSchema};
use crate::error::StoreError;
use crate::service::RecordPayload;
use crate::sql::{self, PgBindValue, QueryBuf};
use async_trait::async_trait;
use serde_json::Value;
use sqlx::postgres::PgRow;
use sqlx::PgPool;

#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        PgStore { pool }
    }

    pub async fn connect(database_url: &str) -> Result<Self, StoreError> {
        let pool = sqlx::postgres::PgPoolOptions::new()
            .max_connections(10)
            .connect(database_url)
            .await?;
        Ok(PgStore { pool })
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    async fn query_many(&self, q: &QueryBuf) -> Result<Vec<PgRow>, StoreError> {
        tracing::debug!(sql = %q.sql, params = ?q.params, "query");
        let mut query = sqlx::query(&q.sql);
        for p in &q.params {
            query = query.bind(PgBindValue::from(p));
        }
        Ok(query.fetch_all(&self.pool).await?)
    }

    async fn query_optional(&self, q: &QueryBuf) -> Result<Option<PgRow>, StoreError> {
        tracing::debug!(sql = %q.sql, params = ?q.params, "query");
        let mut query = sqlx::query(&q.sql);
        for p in &q.params {
            query = query.bind(PgBindValue::from(p));
        }
        Ok(query.fetch_optional(&self.pool).await?)
    }
}

#[async_trait]
impl Store for PgStore {
    async fn find(&self, schema: &ResourceSchema, query: &StoreQuery) -> Result<Vec<RecordPayload>, StoreError> {
        let q = sql::select_list(schema, query);
        let rows = self.query_many(&q).await?;
        Ok(rows.iter().map(|r| row_to_record(schema, r)).collect())
    }

    async fn count(&self, schema: &ResourceSchema, predicates: &[Predicate]) -> Result<u64, StoreError> {
        use sqlx::Row;
        let q = sql::count(schema, predicates);
        let rows = self.query_many(&q).await?;
        let total: i64 = match rows.first() {
            Some(row) => row.try_get("total")?,
            None => 0,
        };
        Ok(total.max(0) as u64)
    }

    async fn find_by_id(&self, schema: &ResourceSchema, id: &Value) -> Result<Option<RecordPayload>, StoreError> {
        let q = sql::select_by_id(schema, id);
        Ok(self.query_optional(&q).await?.map(|r| row_to_record(schema, &r)))
    }

    async fn create(&self, schema: &ResourceSchema, record: RecordPayload) -> Result<RecordPayload, StoreError> {
        let q = sql::insert(schema, &record);
        let row = self.query_optional(&q).await?.ok_or(StoreError::NotFound)?;
        Ok(row_to_record(schema, &row))
    }

    async fn update(&self, schema: &ResourceSchema, id: &Value, changes: RecordPayload) -> Result<RecordPayload, StoreError> {
        let q = sql::update(schema, id, &changes);
        let row = self.query_optional(&q).await?.ok_or(StoreError::NotFound)?;
        Ok(row_to_record(schema, &row))
    }

    async fn delete(&self, schema: &ResourceSchema, id: &Value) -> Result<(), StoreError> {
        let q = sql::delete(schema, id);
        self.query_optional(&q).await?.map(|_| ()).ok_or(StoreError::NotFound)
    }

    async fn ping(&self) -> Result<(), StoreError> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}

/// Decode a row; numbers selected as text are parsed back.
fn row_to_record(schema: &ResourceSchema, row: &PgRow) -> RecordPayload {
    let mut map = RecordPayload::new();
    for f in &schema.fields {
        let v = match cell_to_value(row, &f.name) {
            Value::String(s) if f.kind == FieldKind::Number => parse_number(&s).unwrap_or(Value::String(s)),
            v => v,
        };
        map.insert(f.name.clone(), v);
    }
    map
}

fn parse_number(s: &str) -> Option<Value> {
    if let Ok(i) = s.parse::<i64>() {
        return Some(Value::from(i));
    }
    s.parse::<f64>()
        .ok()
        .and_then(serde_json::Number::from_f64)
        .map(Value::Number)
}

fn cell_to_value(row: &PgRow, name: &str) -> Value {
    use sqlx::Row;
    if let Ok(Some(n)) = row.try_get::<Option<i16>, _>(name) {
        return Value::Number(n.into());
    }
    if let Ok(Some(n)) = row.try_get::<Option<i32>, _>(name) {
        return Value::Number(n.into());
    }
    if let Ok(Some(n)) = row.try_get::<Option<i64>, _>(name) {
        return Value::Number(n.into());
    }
    if let Ok(Some(n)) = row.try_get::<Option<f32>, _>(name) {
        if let Some(n) = serde_json::Number::from_f64(n as f64) {
            return Value::Number(n);
        }
    }
    if let Ok(Some(n)) = row.try_get::<Option<f64>, _>(name) {
        if let Some(n) = serde_json::Number::from_f64(n) {
            return Value::Number(n);
        }
    }
    if let Ok(Some(b)) = row.try_get::<Option<bool>, _>(name) {
        return Value::Bool(b);
    }
    if let Ok(Some(u)) = row.try_get::<Option<uuid::Uuid>, _>(name) {
        return Value::String(u.to_string());
    }
    if let Ok(Some(d)) = row.try_get::<Option<chrono::DateTime<chrono::Utc>>, _>(name) {
        return Value::String(d.to_rfc3339());
    }
    if let Ok(Some(d)) = row.try_get::<Option<chrono::NaiveDateTime>, _>(name) {
        return Value::String(d.format("%Y-%m-%dT%H:%M:%S%.f").to_string());
    }
    if let Ok(Some(d)) = row.try_get::<Option<chrono::NaiveDate>, _>(name) {
        return Value::String(d.format("%Y-%m-%d").to_string());
    }
    if let Ok(Some(s)) = row.try_get::<Option<String>, _>(name) {
        return Value::String(s);
    }
    if let Ok(Some(j)) = row.try_get::<Option<serde_json::Value>, _>(name) {
        return j;
    }
    Value::Null
}
