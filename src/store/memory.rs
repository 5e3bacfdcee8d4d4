//! In-process store. Applies schema defaults and `auto_update` timestamps the
//! way a database would; used by tests and by the demo server without a database.

use super::{Predicate, Store, StoreQuery};
use crate::config::{DefaultValue, ResourceSchema, SortDirection};
use crate::error::StoreError;
use crate::service::RecordPayload;
use async_trait::async_trait;
use serde_json::Value;
use std::cmp::Ordering;
use std::collections::HashMap;
use tokio::sync::RwLock;

#[derive(Default)]
struct Table {
    rows: Vec<RecordPayload>,
    last_id: i64,
}

#[derive(Default)]
pub struct MemoryStore {
    tables: RwLock<HashMap<String, Table>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn now() -> Value {
    Value::String(chrono::Utc::now().to_rfc3339())
}

/// Equality that ignores integer/float representation.
fn same_value(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => x.as_f64() == y.as_f64(),
        _ => a == b,
    }
}

fn rank(v: &Value) -> u8 {
    match v {
        Value::Null => 0,
        Value::Bool(_) => 1,
        Value::Number(_) => 2,
        Value::String(_) => 3,
        Value::Array(_) | Value::Object(_) => 4,
    }
}

/// Total order: null < bool < number < string < composite.
fn compare_values(a: &Value, b: &Value) -> Ordering {
    match (a, b) {
        (Value::Bool(x), Value::Bool(y)) => x.cmp(y),
        (Value::Number(x), Value::Number(y)) => x
            .as_f64()
            .unwrap_or(0.0)
            .partial_cmp(&y.as_f64().unwrap_or(0.0))
            .unwrap_or(Ordering::Equal),
        (Value::String(x), Value::String(y)) => x.cmp(y),
        (Value::Array(_) | Value::Object(_), Value::Array(_) | Value::Object(_)) => a.to_string().cmp(&b.to_string()),
        _ => rank(a).cmp(&rank(b)),
    }
}

fn matches(row: &RecordPayload, predicate: &Predicate) -> bool {
    let get = |field: &str| row.get(field).unwrap_or(&Value::Null);
    match predicate {
        Predicate::Eq { field, value } => same_value(get(field), value),
        Predicate::In { field, values } => values.iter().any(|v| same_value(get(field), v)),
        Predicate::Search { fields, term } => {
            let term = term.to_lowercase();
            fields
                .iter()
                .any(|f| get(f).as_str().is_some_and(|s| s.to_lowercase().contains(&term)))
        }
    }
}

fn position(table: &Table, schema: &ResourceSchema, id: &Value) -> Option<usize> {
    table
        .rows
        .iter()
        .position(|row| row.get(&schema.primary_key).is_some_and(|v| same_value(v, id)))
}

#[async_trait]
impl Store for MemoryStore {
    async fn find(&self, schema: &ResourceSchema, query: &StoreQuery) -> Result<Vec<RecordPayload>, StoreError> {
        let tables = self.tables.read().await;
        let Some(table) = tables.get(&schema.name) else {
            return Ok(Vec::new());
        };
        let mut rows: Vec<&RecordPayload> = table
            .rows
            .iter()
            .filter(|row| query.predicates.iter().all(|p| matches(row, p)))
            .collect();
        rows.sort_by(|a, b| {
            query.sort.iter().fold(Ordering::Equal, |acc, (field, direction)| {
                acc.then_with(|| {
                    let ord = compare_values(
                        a.get(field).unwrap_or(&Value::Null),
                        b.get(field).unwrap_or(&Value::Null),
                    );
                    match direction {
                        SortDirection::Asc => ord,
                        SortDirection::Desc => ord.reverse(),
                    }
                })
            })
        });
        let limit = query.limit.map_or(usize::MAX, |n| n as usize);
        Ok(rows
            .into_iter()
            .skip(query.offset as usize)
            .take(limit)
            .cloned()
            .collect())
    }

    async fn count(&self, schema: &ResourceSchema, predicates: &[Predicate]) -> Result<u64, StoreError> {
        let tables = self.tables.read().await;
        Ok(tables.get(&schema.name).map_or(0, |t| {
            t.rows
                .iter()
                .filter(|row| predicates.iter().all(|p| matches(row, p)))
                .count() as u64
        }))
    }

    async fn find_by_id(&self, schema: &ResourceSchema, id: &Value) -> Result<Option<RecordPayload>, StoreError> {
        let tables = self.tables.read().await;
        Ok(tables
            .get(&schema.name)
            .and_then(|t| position(t, schema, id).map(|i| t.rows[i].clone())))
    }

    async fn create(&self, schema: &ResourceSchema, mut record: RecordPayload) -> Result<RecordPayload, StoreError> {
        let mut tables = self.tables.write().await;
        let table = tables.entry(schema.name.clone()).or_default();

        for field in &schema.fields {
            let missing = record.get(&field.name).map_or(true, Value::is_null);
            if !missing {
                if field.default == Some(DefaultValue::AutoIncrement) {
                    if let Some(n) = record.get(&field.name).and_then(Value::as_i64) {
                        table.last_id = table.last_id.max(n);
                    }
                }
                continue;
            }
            let value = match &field.default {
                Some(DefaultValue::Literal(v)) => v.clone(),
                Some(DefaultValue::Now) => now(),
                Some(DefaultValue::AutoIncrement) => {
                    table.last_id += 1;
                    Value::from(table.last_id)
                }
                Some(DefaultValue::Uuid) => Value::String(uuid::Uuid::new_v4().to_string()),
                None if field.auto_update => now(),
                None if field.nullable => Value::Null,
                None => {
                    return Err(StoreError::Constraint(format!(
                        "null value in column \"{}\" of {} violates not-null constraint",
                        field.name, schema.name
                    )))
                }
            };
            record.insert(field.name.clone(), value);
        }

        let id = record.get(&schema.primary_key).cloned().unwrap_or(Value::Null);
        if position(table, schema, &id).is_some() {
            return Err(StoreError::Constraint(format!(
                "duplicate key value {} for {}.{}",
                id, schema.name, schema.primary_key
            )));
        }
        table.rows.push(record.clone());
        Ok(record)
    }

    async fn update(&self, schema: &ResourceSchema, id: &Value, changes: RecordPayload) -> Result<RecordPayload, StoreError> {
        let mut tables = self.tables.write().await;
        let table = tables.get_mut(&schema.name).ok_or(StoreError::NotFound)?;
        let index = position(table, schema, id).ok_or(StoreError::NotFound)?;
        if let Some(new_id) = changes.get(&schema.primary_key) {
            if !same_value(new_id, id) && position(table, schema, new_id).is_some() {
                return Err(StoreError::Constraint(format!(
                    "duplicate key value {} for {}.{}",
                    new_id, schema.name, schema.primary_key
                )));
            }
        }
        let row = &mut table.rows[index];
        row.extend(changes);
        for field in schema.fields.iter().filter(|f| f.auto_update) {
            row.insert(field.name.clone(), now());
        }
        Ok(row.clone())
    }

    async fn delete(&self, schema: &ResourceSchema, id: &Value) -> Result<(), StoreError> {
        let mut tables = self.tables.write().await;
        let table = tables.get_mut(&schema.name).ok_or(StoreError::NotFound)?;
        let index = position(table, schema, id).ok_or(StoreError::NotFound)?;
        table.rows.remove(index);
        Ok(())
    }

    async fn ping(&self) -> Result<(), StoreError> {
        Ok(())
    }
}
