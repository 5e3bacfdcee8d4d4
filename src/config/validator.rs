//! Schema validation: referential integrity and relation symmetry.

use crate::config::resolved::{Cardinality, FieldKind, ResourceSchema};
use crate::config::types::SchemaDocument;
use crate::error::SchemaError;
use std::collections::{HashMap, HashSet};
use std::str::FromStr;

/// Checks the raw document before it is flattened: unique names, known kinds,
/// enum values, primary keys, relation targets and cardinality names.
pub fn validate(doc: &SchemaDocument) -> Result<(), SchemaError> {
    let mut names = HashSet::new();
    for r in &doc.resources {
        if !names.insert(r.name.as_str()) {
            return Err(SchemaError::DuplicateResource(r.name.clone()));
        }
    }

    for r in &doc.resources {
        let mut fields = HashSet::new();
        for f in &r.fields {
            if !fields.insert(f.name.as_str()) {
                return Err(SchemaError::DuplicateField {
                    resource: r.name.clone(),
                    field: f.name.clone(),
                });
            }
            let kind = FieldKind::from_str(&f.kind).map_err(|_| SchemaError::UnknownFieldKind {
                resource: r.name.clone(),
                field: f.name.clone(),
                kind: f.kind.clone(),
            })?;
            if kind == FieldKind::Enum && f.values.is_empty() {
                return Err(SchemaError::EmptyEnum {
                    resource: r.name.clone(),
                    field: f.name.clone(),
                });
            }
        }
        if !fields.contains(r.primary_key.as_str()) {
            return Err(SchemaError::InvalidPrimaryKey {
                resource: r.name.clone(),
                field: r.primary_key.clone(),
            });
        }

        for rel in &r.relations {
            if fields.contains(rel.name.as_str()) {
                return Err(SchemaError::DuplicateField {
                    resource: r.name.clone(),
                    field: rel.name.clone(),
                });
            }
            for target in std::iter::once(&rel.target).chain(rel.through.iter()) {
                if !names.contains(target.as_str()) {
                    return Err(SchemaError::UnknownResource {
                        resource: r.name.clone(),
                        relation: rel.name.clone(),
                        target: target.clone(),
                    });
                }
            }
            if Cardinality::from_str(&rel.cardinality).is_err() {
                return Err(SchemaError::InvalidForeignKey {
                    resource: r.name.clone(),
                    relation: rel.name.clone(),
                    reason: format!("unknown cardinality '{}'", rel.cardinality),
                });
            }
        }
    }
    Ok(())
}

/// A one_to_many relation's counterpart (same foreign key, opposite direction)
/// must be one_to_one; a many_to_many counterpart (same join resource) must be
/// many_to_many. Absent counterparts are fine.
pub fn check_symmetry(resources: &[ResourceSchema]) -> Result<(), SchemaError> {
    let by_name: HashMap<&str, &ResourceSchema> = resources.iter().map(|r| (r.name.as_str(), r)).collect();
    for a in resources {
        for rel in &a.relations {
            let Some(b) = by_name.get(rel.target.as_str()) else { continue };
            for back in b.relations.iter().filter(|s| s.target == a.name) {
                if a.name == b.name && back.name == rel.name {
                    continue;
                }
                if key_set(&back.foreign_key) != key_set(&rel.foreign_key) {
                    continue;
                }
                let expected = match rel.cardinality {
                    Cardinality::OneToMany => Cardinality::OneToOne,
                    Cardinality::ManyToMany => Cardinality::ManyToMany,
                    Cardinality::OneToOne => continue,
                };
                if back.cardinality != expected {
                    return Err(SchemaError::AsymmetricRelation {
                        resource: a.name.clone(),
                        relation: rel.name.clone(),
                        cardinality: rel.cardinality.as_str(),
                        target: b.name.clone(),
                        counterpart: back.name.clone(),
                        expected: expected.as_str(),
                    });
                }
            }
        }
    }
    Ok(())
}

fn key_set(keys: &[String]) -> Vec<&str> {
    let mut v: Vec<&str> = keys.iter().map(String::as_str).collect();
    v.sort_unstable();
    v
}
