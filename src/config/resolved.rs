//! Introspected catalog: schema document validated and flattened for runtime use.

use serde::Serialize;
use std::collections::HashMap;
use std::str::FromStr;
use std::sync::Arc;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldKind {
    String,
    Number,
    Boolean,
    Date,
    Enum,
    Json,
}

impl FieldKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            FieldKind::String => "string",
            FieldKind::Number => "number",
            FieldKind::Boolean => "boolean",
            FieldKind::Date => "date",
            FieldKind::Enum => "enum",
            FieldKind::Json => "json",
        }
    }
}

impl FromStr for FieldKind {
    type Err = ();

    /// Accepts the portable names plus the usual model-language spellings
    /// (`Int`, `Float`, `DateTime`, ...).
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s.to_lowercase().as_str() {
            "string" | "text" => FieldKind::String,
            "number" | "int" | "integer" | "bigint" | "float" | "decimal" => FieldKind::Number,
            "boolean" | "bool" => FieldKind::Boolean,
            "date" | "datetime" => FieldKind::Date,
            "enum" => FieldKind::Enum,
            "json" => FieldKind::Json,
            _ => return Err(()),
        })
    }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DefaultValue {
    Literal(serde_json::Value),
    Now,
    AutoIncrement,
    Uuid,
}

#[derive(Clone, Debug, Serialize)]
pub struct FieldDescriptor {
    pub name: String,
    pub kind: FieldKind,
    pub nullable: bool,
    pub default: Option<DefaultValue>,
    /// Server-assigned; never accepted from user input.
    pub generated: bool,
    pub enum_values: Vec<String>,
    pub auto_update: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub db_type: Option<String>,
}

impl FieldDescriptor {
    /// Must be supplied on create: not nullable, not generated, no default.
    pub fn is_required(&self) -> bool {
        !self.nullable && !self.generated && self.default.is_none()
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Cardinality {
    OneToOne,
    OneToMany,
    ManyToMany,
}

impl Cardinality {
    pub fn as_str(&self) -> &'static str {
        match self {
            Cardinality::OneToOne => "one_to_one",
            Cardinality::OneToMany => "one_to_many",
            Cardinality::ManyToMany => "many_to_many",
        }
    }

    pub fn is_to_many(&self) -> bool {
        !matches!(self, Cardinality::OneToOne)
    }
}

impl FromStr for Cardinality {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.replace('-', "_").to_lowercase().as_str() {
            "one_to_one" => Ok(Cardinality::OneToOne),
            "one_to_many" => Ok(Cardinality::OneToMany),
            "many_to_many" => Ok(Cardinality::ManyToMany),
            _ => Err(()),
        }
    }
}

/// Where the keys of a relation live.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RelationLink {
    /// Our field `local` holds the target's primary key.
    Owning { local: String },
    /// The target's field `remote` holds our primary key.
    Inverse { remote: String },
    /// Rows of `through` pair `local` (our key) with `remote` (target key).
    Through {
        through: String,
        local: String,
        remote: String,
    },
}

#[derive(Clone, Debug, Serialize)]
pub struct RelationDescriptor {
    pub name: String,
    pub target: String,
    pub cardinality: Cardinality,
    pub foreign_key: Vec<String>,
    pub link: RelationLink,
}

#[derive(Clone, Debug, Serialize)]
pub struct ResourceSchema {
    pub name: String,
    pub table: String,
    pub db_schema: String,
    pub primary_key: String,
    pub primary_kind: FieldKind,
    pub fields: Vec<FieldDescriptor>,
    pub relations: Vec<RelationDescriptor>,
}

impl ResourceSchema {
    pub fn field(&self, name: &str) -> Option<&FieldDescriptor> {
        self.fields.iter().find(|f| f.name == name)
    }

    pub fn relation(&self, name: &str) -> Option<&RelationDescriptor> {
        self.relations.iter().find(|r| r.name == name)
    }

    pub fn field_names(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().map(|f| f.name.as_str())
    }
}

/// Ordered, immutable resource catalog.
#[derive(Clone, Debug, Default)]
pub struct Catalog {
    resources: Vec<Arc<ResourceSchema>>,
    by_name: HashMap<String, usize>,
}

impl Catalog {
    pub fn new(resources: Vec<ResourceSchema>) -> Self {
        let by_name = resources
            .iter()
            .enumerate()
            .map(|(i, r)| (r.name.clone(), i))
            .collect();
        Catalog {
            resources: resources.into_iter().map(Arc::new).collect(),
            by_name,
        }
    }

    pub fn get(&self, name: &str) -> Option<&Arc<ResourceSchema>> {
        self.by_name.get(name).map(|&i| &self.resources[i])
    }

    pub fn contains(&self, name: &str) -> bool {
        self.by_name.contains_key(name)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Arc<ResourceSchema>> {
        self.resources.iter()
    }

    pub fn len(&self) -> usize {
        self.resources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.resources.is_empty()
    }
}
