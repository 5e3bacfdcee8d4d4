//! Storage collaborator. The engine only talks to a `Store`; two adapters ship
//! with the crate: `MemoryStore` (in-process) and `PgStore` (PostgreSQL).

mod memory;
mod postgres;

pub use memory::MemoryStore;
pub use postgres::PgStore;

use crate::config::{ResourceSchema, SortDirection};
use crate::error::StoreError;
use crate::service::RecordPayload;
use async_trait::async_trait;
use serde_json::Value;

/// Row condition. All predicates of a query must hold.
#[derive(Clone, Debug, PartialEq)]
pub enum Predicate {
    Eq { field: String, value: Value },
    In { field: String, values: Vec<Value> },
    /// Case-insensitive substring match on any of `fields`.
    Search { fields: Vec<String>, term: String },
}

impl Predicate {
    pub fn eq(field: impl Into<String>, value: Value) -> Self {
        Predicate::Eq {
            field: field.into(),
            value,
        }
    }

    pub fn is_in(field: impl Into<String>, values: Vec<Value>) -> Self {
        Predicate::In {
            field: field.into(),
            values,
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct StoreQuery {
    pub predicates: Vec<Predicate>,
    /// Applied in order; callers append the primary key last.
    pub sort: Vec<(String, SortDirection)>,
    pub offset: u64,
    pub limit: Option<u64>,
}

impl StoreQuery {
    /// Every row matching `predicates`, ordered by primary key.
    pub fn matching(schema: &ResourceSchema, predicates: Vec<Predicate>) -> Self {
        StoreQuery {
            predicates,
            sort: vec![(schema.primary_key.clone(), SortDirection::Asc)],
            offset: 0,
            limit: None,
        }
    }
}

#[async_trait]
pub trait Store: Send + Sync {
    async fn find(&self, schema: &ResourceSchema, query: &StoreQuery) -> Result<Vec<RecordPayload>, StoreError>;

    async fn count(&self, schema: &ResourceSchema, predicates: &[Predicate]) -> Result<u64, StoreError>;

    async fn find_by_id(&self, schema: &ResourceSchema, id: &Value) -> Result<Option<RecordPayload>, StoreError>;

    /// Insert and return the stored row, defaults applied.
    async fn create(&self, schema: &ResourceSchema, record: RecordPayload) -> Result<RecordPayload, StoreError>;

    /// Apply `changes` to an existing row. `StoreError::NotFound` when `id` is absent.
    async fn update(&self, schema: &ResourceSchema, id: &Value, changes: RecordPayload) -> Result<RecordPayload, StoreError>;

    /// `StoreError::NotFound` when `id` is absent.
    async fn delete(&self, schema: &ResourceSchema, id: &Value) -> Result<(), StoreError>;

    /// Readiness probe.
    async fn ping(&self) -> Result<(), StoreError>;
}
