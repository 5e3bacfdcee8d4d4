//! Builds parameterized SELECT, COUNT, INSERT, UPDATE, DELETE from a resource schema.

use crate::config::{DefaultValue, FieldDescriptor, FieldKind, ResourceSchema, SortDirection};
use crate::service::RecordPayload;
use crate::store::{Predicate, StoreQuery};
use serde_json::Value;

/// Quote identifier for PostgreSQL (safe: only from the catalog).
fn quoted(s: &str) -> String {
    format!("\"{}\"", s.replace('"', "\"\""))
}

/// Full qualified table name.
fn qualified_table(schema: &ResourceSchema) -> String {
    format!("{}.{}", quoted(&schema.db_schema), quoted(&schema.table))
}

#[derive(Debug, Default)]
pub struct QueryBuf {
    pub sql: String,
    pub params: Vec<Value>,
}

impl QueryBuf {
    fn new() -> Self {
        Self::default()
    }

    fn push_param(&mut self, v: Value) -> u32 {
        let n = self.params.len() as u32 + 1;
        self.params.push(v);
        n
    }

    /// Placeholder for a value of `field`, cast to the column type.
    fn placeholder(&mut self, field: Option<&FieldDescriptor>, v: Value) -> String {
        let n = self.push_param(v);
        match field.map(column_type) {
            Some(t) => format!("${}::{}", n, t),
            None => format!("${}", n),
        }
    }
}

/// Storage type: the declared `db_type`, else one derived from the field kind.
fn column_type(field: &FieldDescriptor) -> String {
    if let Some(t) = &field.db_type {
        return t.clone();
    }
    match field.kind {
        FieldKind::String | FieldKind::Enum => "text",
        FieldKind::Number => "numeric",
        FieldKind::Boolean => "boolean",
        FieldKind::Date => "timestamptz",
        FieldKind::Json => "jsonb",
    }
    .to_string()
}

/// SELECT list: numbers, enums and custom types as text so every row decodes the same way.
fn select_column_list(schema: &ResourceSchema) -> String {
    schema
        .fields
        .iter()
        .map(|f| {
            let q = quoted(&f.name);
            let custom = f.db_type.as_deref().is_some_and(|t| t.contains('.'));
            if custom || matches!(f.kind, FieldKind::Number | FieldKind::Enum) {
                format!("{}::text AS {}", q, q)
            } else {
                q
            }
        })
        .collect::<Vec<_>>()
        .join(", ")
}

/// Escape LIKE wildcards in a user search term.
fn like_pattern(term: &str) -> String {
    let escaped = term.replace('\\', "\\\\").replace('%', "\\%").replace('_', "\\_");
    format!("%{}%", escaped)
}

fn where_clause(schema: &ResourceSchema, predicates: &[Predicate], q: &mut QueryBuf) -> String {
    let mut parts = Vec::new();
    for p in predicates {
        match p {
            Predicate::Eq { field, value } if value.is_null() => {
                parts.push(format!("{} IS NULL", quoted(field)));
            }
            Predicate::Eq { field, value } => {
                let ph = q.placeholder(schema.field(field), value.clone());
                parts.push(format!("{} = {}", quoted(field), ph));
            }
            Predicate::In { values, .. } if values.is_empty() => parts.push("FALSE".into()),
            Predicate::In { field, values } => {
                let descriptor = schema.field(field);
                let placeholders: Vec<String> = values.iter().map(|v| q.placeholder(descriptor, v.clone())).collect();
                parts.push(format!("{} IN ({})", quoted(field), placeholders.join(", ")));
            }
            Predicate::Search { fields, .. } if fields.is_empty() => parts.push("FALSE".into()),
            Predicate::Search { fields, term } => {
                let n = q.push_param(Value::String(like_pattern(term)));
                let ors: Vec<String> = fields
                    .iter()
                    .map(|f| format!("{}::text ILIKE ${}", quoted(f), n))
                    .collect();
                parts.push(format!("({})", ors.join(" OR ")));
            }
        }
    }
    if parts.is_empty() {
        String::new()
    } else {
        format!(" WHERE {}", parts.join(" AND "))
    }
}

/// SELECT page: predicates, ORDER BY the given keys, LIMIT/OFFSET.
pub fn select_list(schema: &ResourceSchema, query: &StoreQuery) -> QueryBuf {
    let mut q = QueryBuf::new();
    let where_clause = where_clause(schema, &query.predicates, &mut q);
    let order: Vec<String> = query
        .sort
        .iter()
        .map(|(field, dir)| format!("{} {}", quoted(field), dir.as_str().to_uppercase()))
        .collect();
    let order_clause = if order.is_empty() {
        format!(" ORDER BY {}", quoted(&schema.primary_key))
    } else {
        format!(" ORDER BY {}", order.join(", "))
    };
    let limit_clause = query.limit.map(|n| format!(" LIMIT {}", n)).unwrap_or_default();
    let offset_clause = if query.offset > 0 {
        format!(" OFFSET {}", query.offset)
    } else {
        String::new()
    };
    q.sql = format!(
        "SELECT {} FROM {}{}{}{}{}",
        select_column_list(schema),
        qualified_table(schema),
        where_clause,
        order_clause,
        limit_clause,
        offset_clause
    );
    q
}

pub fn count(schema: &ResourceSchema, predicates: &[Predicate]) -> QueryBuf {
    let mut q = QueryBuf::new();
    let where_clause = where_clause(schema, predicates, &mut q);
    q.sql = format!("SELECT COUNT(*) AS total FROM {}{}", qualified_table(schema), where_clause);
    q
}

/// SELECT by primary key.
pub fn select_by_id(schema: &ResourceSchema, id: &Value) -> QueryBuf {
    let mut q = QueryBuf::new();
    let ph = q.placeholder(schema.field(&schema.primary_key), id.clone());
    q.sql = format!(
        "SELECT {} FROM {} WHERE {} = {}",
        select_column_list(schema),
        qualified_table(schema),
        quoted(&schema.primary_key),
        ph
    );
    q
}

/// INSERT ... RETURNING. Missing fields fall back to their schema default:
/// `now` and `uuid` are filled here, autoincrement and absent defaults are left to the database.
pub fn insert(schema: &ResourceSchema, record: &RecordPayload) -> QueryBuf {
    let mut q = QueryBuf::new();
    let mut cols = Vec::new();
    let mut values = Vec::new();
    for f in &schema.fields {
        let value = match (record.get(&f.name), &f.default) {
            (Some(v), _) if !v.is_null() => Some(q.placeholder(Some(f), v.clone())),
            (_, Some(DefaultValue::Now)) => Some("NOW()".to_string()),
            (_, Some(DefaultValue::Uuid)) => {
                Some(q.placeholder(Some(f), Value::String(uuid::Uuid::new_v4().to_string())))
            }
            (_, Some(DefaultValue::Literal(v))) => Some(q.placeholder(Some(f), v.clone())),
            (_, None) if f.auto_update => Some("NOW()".to_string()),
            (Some(v), _) => Some(q.placeholder(Some(f), v.clone())),
            (None, _) => None,
        };
        if let Some(v) = value {
            cols.push(quoted(&f.name));
            values.push(v);
        }
    }
    let table = qualified_table(schema);
    let returning = select_column_list(schema);
    q.sql = if cols.is_empty() {
        format!("INSERT INTO {} DEFAULT VALUES RETURNING {}", table, returning)
    } else {
        format!(
            "INSERT INTO {} ({}) VALUES ({}) RETURNING {}",
            table,
            cols.join(", "),
            values.join(", "),
            returning
        )
    };
    q
}

/// UPDATE by id: SET the given fields plus every `auto_update` field not given.
pub fn update(schema: &ResourceSchema, id: &Value, changes: &RecordPayload) -> QueryBuf {
    let mut q = QueryBuf::new();
    let mut sets = Vec::new();
    for f in &schema.fields {
        if let Some(v) = changes.get(&f.name) {
            let rhs = q.placeholder(Some(f), v.clone());
            sets.push(format!("{} = {}", quoted(&f.name), rhs));
        } else if f.auto_update {
            sets.push(format!("{} = NOW()", quoted(&f.name)));
        }
    }
    if sets.is_empty() {
        return select_by_id(schema, id);
    }
    let id_ph = q.placeholder(schema.field(&schema.primary_key), id.clone());
    q.sql = format!(
        "UPDATE {} SET {} WHERE {} = {} RETURNING {}",
        qualified_table(schema),
        sets.join(", "),
        quoted(&schema.primary_key),
        id_ph,
        select_column_list(schema)
    );
    q
}

/// DELETE by id, returning the key so a miss is observable.
pub fn delete(schema: &ResourceSchema, id: &Value) -> QueryBuf {
    let mut q = QueryBuf::new();
    let ph = q.placeholder(schema.field(&schema.primary_key), id.clone());
    let pk = quoted(&schema.primary_key);
    q.sql = format!(
        "DELETE FROM {} WHERE {} = {} RETURNING {}::text AS {}",
        qualified_table(schema),
        pk,
        ph,
        pk,
        pk
    );
    q
}
