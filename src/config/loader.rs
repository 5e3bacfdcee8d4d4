//! Load the schema document and options from JSON, and build the catalog.

use crate::config::options::OptionsDocument;
use crate::config::resolved::{
    Cardinality, Catalog, DefaultValue, FieldDescriptor, FieldKind, RelationDescriptor, RelationLink, ResourceSchema,
};
use crate::config::types::*;
use crate::config::{check_symmetry, validate};
use crate::error::{ConfigError, SchemaError};
use std::collections::{HashMap, HashSet};
use std::path::Path;
use std::str::FromStr;

/// Build the ordered catalog from a schema document. Runs once at startup.
pub fn introspect(doc: &SchemaDocument) -> Result<Catalog, SchemaError> {
    validate(doc)?;

    let fields_by_resource: HashMap<&str, HashSet<&str>> = doc
        .resources
        .iter()
        .map(|r| (r.name.as_str(), r.fields.iter().map(|f| f.name.as_str()).collect()))
        .collect();

    let mut resources = Vec::with_capacity(doc.resources.len());
    for r in &doc.resources {
        let fields: Vec<FieldDescriptor> = r.fields.iter().map(field_descriptor).collect::<Result<_, _>>()?;
        let primary_kind = fields
            .iter()
            .find(|f| f.name == r.primary_key)
            .map(|f| f.kind)
            .ok_or_else(|| SchemaError::InvalidPrimaryKey {
                resource: r.name.clone(),
                field: r.primary_key.clone(),
            })?;
        let relations = r
            .relations
            .iter()
            .map(|rel| relation_descriptor(&r.name, rel, &fields_by_resource))
            .collect::<Result<Vec<_>, _>>()?;
        resources.push(ResourceSchema {
            name: r.name.clone(),
            table: r.table.clone().unwrap_or_else(|| r.name.clone()),
            db_schema: r.db_schema.clone().unwrap_or_else(|| "public".into()),
            primary_key: r.primary_key.clone(),
            primary_kind,
            fields,
            relations,
        });
    }

    check_symmetry(&resources)?;
    tracing::info!(resources = resources.len(), "schema introspected");
    Ok(Catalog::new(resources))
}

fn field_descriptor(f: &FieldDoc) -> Result<FieldDescriptor, SchemaError> {
    // Kind names were checked by validate().
    let kind = FieldKind::from_str(&f.kind).map_err(|_| SchemaError::Load(format!("field kind '{}'", f.kind)))?;
    let default = match &f.default {
        None => None,
        Some(DefaultDoc::Literal(v)) => Some(DefaultValue::Literal(v.clone())),
        Some(DefaultDoc::Function(name)) => Some(match name.as_str() {
            "now" => DefaultValue::Now,
            "autoincrement" => DefaultValue::AutoIncrement,
            "uuid" => DefaultValue::Uuid,
            other => return Err(SchemaError::Load(format!("{}: unknown default function '{}'", f.name, other))),
        }),
    };
    Ok(FieldDescriptor {
        name: f.name.clone(),
        kind,
        nullable: f.nullable,
        default,
        generated: f.generated,
        enum_values: f.values.clone(),
        auto_update: f.auto_update,
        db_type: f.db_type.clone(),
    })
}

fn relation_descriptor(
    resource: &str,
    rel: &RelationDoc,
    fields_by_resource: &HashMap<&str, HashSet<&str>>,
) -> Result<RelationDescriptor, SchemaError> {
    let invalid = |reason: String| SchemaError::InvalidForeignKey {
        resource: resource.to_string(),
        relation: rel.name.clone(),
        reason,
    };
    let cardinality =
        Cardinality::from_str(&rel.cardinality).map_err(|_| invalid(format!("unknown cardinality '{}'", rel.cardinality)))?;
    let keys = rel.foreign_key.fields();
    let has_field = |res: &str, field: &str| fields_by_resource.get(res).is_some_and(|s| s.contains(field));

    if rel.through.is_some() && cardinality != Cardinality::ManyToMany {
        return Err(invalid("only many_to_many relations use a join resource".into()));
    }
    let link = match cardinality {
        Cardinality::OneToOne | Cardinality::OneToMany => {
            let [key] = keys.as_slice() else {
                return Err(invalid(format!("expected one foreign key field, got {}", keys.len())));
            };
            if cardinality == Cardinality::OneToOne && has_field(resource, key.as_str()) {
                RelationLink::Owning { local: key.clone() }
            } else if has_field(rel.target.as_str(), key.as_str()) {
                RelationLink::Inverse { remote: key.clone() }
            } else {
                return Err(invalid(format!("foreign key '{}' is not a field of {}", key, rel.target)));
            }
        }
        Cardinality::ManyToMany => {
            let through = rel
                .through
                .as_deref()
                .ok_or_else(|| invalid("many_to_many relations need a join resource".into()))?;
            let [local, remote] = keys.as_slice() else {
                return Err(invalid(format!("expected two foreign key fields, got {}", keys.len())));
            };
            for key in [local, remote] {
                if !has_field(through, key.as_str()) {
                    return Err(invalid(format!("foreign key '{}' is not a field of {}", key, through)));
                }
            }
            RelationLink::Through {
                through: through.to_string(),
                local: local.clone(),
                remote: remote.clone(),
            }
        }
    };

    Ok(RelationDescriptor {
        name: rel.name.clone(),
        target: rel.target.clone(),
        cardinality,
        foreign_key: keys,
        link,
    })
}

pub fn parse_schema(json: &str) -> Result<SchemaDocument, SchemaError> {
    serde_json::from_str(json).map_err(|e| SchemaError::Load(e.to_string()))
}

/// Read and introspect a schema document from disk.
pub async fn load_schema_file(path: impl AsRef<Path>) -> Result<Catalog, SchemaError> {
    let path = path.as_ref();
    tracing::debug!(path = %path.display(), "loading schema document");
    let text = tokio::fs::read_to_string(path)
        .await
        .map_err(|e| SchemaError::Load(format!("{}: {}", path.display(), e)))?;
    introspect(&parse_schema(&text)?)
}

/// Read the declarative options document. A missing file yields empty options.
pub async fn load_options_file(path: impl AsRef<Path>) -> Result<OptionsDocument, ConfigError> {
    let path = path.as_ref();
    let text = match tokio::fs::read_to_string(path).await {
        Ok(text) => text,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            tracing::info!(path = %path.display(), "no options file, using schema defaults");
            return Ok(OptionsDocument::default());
        }
        Err(e) => return Err(ConfigError::Load(format!("{}: {}", path.display(), e))),
    };
    serde_json::from_str(&text).map_err(|e| ConfigError::Load(e.to_string()))
}
