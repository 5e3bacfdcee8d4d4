//! Raw schema document types as read from JSON, plus declarative field rules.

use serde::{Deserialize, Deserializer, Serialize};

/// Structural description of the data model, consumed once at startup.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct SchemaDocument {
    pub resources: Vec<ResourceDoc>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ResourceDoc {
    pub name: String,
    /// Storage table name; defaults to the resource name.
    #[serde(default)]
    pub table: Option<String>,
    /// Storage namespace (PostgreSQL schema); defaults to `public`.
    #[serde(default)]
    pub db_schema: Option<String>,
    #[serde(default = "default_primary_key")]
    pub primary_key: String,
    pub fields: Vec<FieldDoc>,
    #[serde(default)]
    pub relations: Vec<RelationDoc>,
}

fn default_primary_key() -> String {
    "id".into()
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct FieldDoc {
    pub name: String,
    /// Primitive kind name; checked by the introspector.
    pub kind: String,
    #[serde(default)]
    pub nullable: bool,
    #[serde(default)]
    pub default: Option<DefaultDoc>,
    #[serde(default)]
    pub generated: bool,
    /// Allowed values for enum fields.
    #[serde(default)]
    pub values: Vec<String>,
    /// Timestamp refreshed by the store on every update.
    #[serde(default)]
    pub auto_update: bool,
    /// Storage-native type used for SQL casts (e.g. `timestamptz`, `blog.post_status`).
    #[serde(default)]
    pub db_type: Option<String>,
}

/// Field default: a literal value or one of the server-side functions
/// `now`, `autoincrement`, `uuid` (with or without trailing `()`).
#[derive(Clone, Debug, PartialEq, Serialize)]
pub enum DefaultDoc {
    Literal(serde_json::Value),
    Function(String),
}

const DEFAULT_FUNCTIONS: &[&str] = &["now", "autoincrement", "uuid"];

impl<'de> Deserialize<'de> for DefaultDoc {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let v = serde_json::Value::deserialize(deserializer)?;
        match v {
            serde_json::Value::String(s) if DEFAULT_FUNCTIONS.contains(&s.trim_end_matches("()")) => {
                Ok(DefaultDoc::Function(s.trim_end_matches("()").to_string()))
            }
            serde_json::Value::Object(mut obj) => {
                if let Some(serde_json::Value::String(f)) = obj.remove("function") {
                    return Ok(DefaultDoc::Function(f.trim_end_matches("()").to_string()));
                }
                if let Some(lit) = obj.remove("value") {
                    return Ok(DefaultDoc::Literal(lit));
                }
                Err(serde::de::Error::custom(format!(
                    "field default must be a scalar, {{ \"function\": \"...\" }}, or {{ \"value\": ... }}; got object with keys: {:?}",
                    obj.keys().collect::<Vec<_>>()
                )))
            }
            other => Ok(DefaultDoc::Literal(other)),
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ForeignKeyDoc {
    Single(String),
    Composite(Vec<String>),
}

impl ForeignKeyDoc {
    pub fn fields(&self) -> Vec<String> {
        match self {
            ForeignKeyDoc::Single(s) => vec![s.clone()],
            ForeignKeyDoc::Composite(v) => v.clone(),
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RelationDoc {
    pub name: String,
    pub target: String,
    pub cardinality: String,
    pub foreign_key: ForeignKeyDoc,
    /// Join resource for many_to_many relations.
    #[serde(default)]
    pub through: Option<String>,
}

/// Declarative per-field checks applied after the type check.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ValidationRule {
    #[serde(default)]
    pub required: Option<bool>,
    #[serde(default)]
    pub format: Option<String>,
    #[serde(default)]
    pub max_length: Option<u32>,
    #[serde(default)]
    pub min_length: Option<u32>,
    #[serde(default)]
    pub pattern: Option<String>,
    #[serde(default)]
    pub allowed: Option<Vec<serde_json::Value>>,
    #[serde(default)]
    pub minimum: Option<f64>,
    #[serde(default)]
    pub maximum: Option<f64>,
}
