//! Per-resource option overrides: a JSON document for the declarative part,
//! builders for the parts that are code (validators, predicates, labels).

use crate::auth::{Caller, Operation, PermissionFn};
use crate::config::ValidationRule;
use crate::service::RecordPayload;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortDirection {
    #[default]
    Asc,
    Desc,
}

impl SortDirection {
    pub fn as_str(&self) -> &'static str {
        match self {
            SortDirection::Asc => "asc",
            SortDirection::Desc => "desc",
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Sort {
    pub field: String,
    #[serde(default)]
    pub direction: SortDirection,
}

/// Predefined list filter selectable with `?filter=<name>`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct NamedFilter {
    pub name: String,
    #[serde(default)]
    pub label: Option<String>,
    /// Equality conditions, all of which must hold.
    #[serde(rename = "where")]
    pub conditions: HashMap<String, serde_json::Value>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SidebarGroup {
    pub title: String,
    pub resources: Vec<String>,
}

/// Declarative overrides for one resource.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct ResourceOptionsDoc {
    #[serde(default)]
    pub list_fields: Option<Vec<String>>,
    #[serde(default)]
    pub edit_fields: Option<Vec<String>>,
    #[serde(default)]
    pub sortable: Option<Vec<String>>,
    #[serde(default)]
    pub searchable: Option<Vec<String>>,
    #[serde(default)]
    pub default_sort: Option<Sort>,
    #[serde(default)]
    pub page_size: Option<u32>,
    /// Enabled operations; all when absent.
    #[serde(default)]
    pub operations: Option<Vec<Operation>>,
    #[serde(default)]
    pub validation: HashMap<String, ValidationRule>,
    /// Field name -> widget name (see `render::widgets`).
    #[serde(default)]
    pub widgets: HashMap<String, String>,
    /// Field name -> display label, used when no localized label exists.
    #[serde(default)]
    pub aliases: HashMap<String, String>,
    #[serde(default)]
    pub title_field: Option<String>,
    #[serde(default)]
    pub filters: Vec<NamedFilter>,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct OptionsDocument {
    #[serde(default)]
    pub resources: HashMap<String, ResourceOptionsDoc>,
    #[serde(default)]
    pub sidebar: Vec<SidebarGroup>,
}

/// Resource-level check over a whole record; returns (field, message) pairs.
pub type ValidatorFn = Arc<dyn Fn(&RecordPayload) -> Vec<(String, String)> + Send + Sync>;
/// Record label used in tables, relation cells and summaries.
pub type DisplayFn = Arc<dyn Fn(&RecordPayload) -> String + Send + Sync>;

#[derive(Clone)]
pub struct NamedValidator {
    pub name: String,
    pub check: ValidatorFn,
}

impl std::fmt::Debug for NamedValidator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NamedValidator").field("name", &self.name).finish()
    }
}

#[derive(Clone, Default)]
pub struct ResourceOptions {
    pub doc: ResourceOptionsDoc,
    pub validators: Vec<NamedValidator>,
    pub permission: Option<PermissionFn>,
    pub display: Option<DisplayFn>,
}

impl From<ResourceOptionsDoc> for ResourceOptions {
    fn from(doc: ResourceOptionsDoc) -> Self {
        ResourceOptions {
            doc,
            ..Default::default()
        }
    }
}

fn names(fields: &[&str]) -> Vec<String> {
    fields.iter().map(|s| s.to_string()).collect()
}

impl ResourceOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn list_fields(mut self, fields: &[&str]) -> Self {
        self.doc.list_fields = Some(names(fields));
        self
    }

    pub fn edit_fields(mut self, fields: &[&str]) -> Self {
        self.doc.edit_fields = Some(names(fields));
        self
    }

    pub fn sortable(mut self, fields: &[&str]) -> Self {
        self.doc.sortable = Some(names(fields));
        self
    }

    pub fn searchable(mut self, fields: &[&str]) -> Self {
        self.doc.searchable = Some(names(fields));
        self
    }

    pub fn default_sort(mut self, field: &str, direction: SortDirection) -> Self {
        self.doc.default_sort = Some(Sort {
            field: field.to_string(),
            direction,
        });
        self
    }

    pub fn page_size(mut self, size: u32) -> Self {
        self.doc.page_size = Some(size);
        self
    }

    pub fn operations(mut self, ops: &[Operation]) -> Self {
        self.doc.operations = Some(ops.to_vec());
        self
    }

    pub fn rule(mut self, field: &str, rule: ValidationRule) -> Self {
        self.doc.validation.insert(field.to_string(), rule);
        self
    }

    pub fn widget(mut self, field: &str, widget: &str) -> Self {
        self.doc.widgets.insert(field.to_string(), widget.to_string());
        self
    }

    pub fn alias(mut self, field: &str, label: &str) -> Self {
        self.doc.aliases.insert(field.to_string(), label.to_string());
        self
    }

    pub fn title_field(mut self, field: &str) -> Self {
        self.doc.title_field = Some(field.to_string());
        self
    }

    pub fn filter(mut self, filter: NamedFilter) -> Self {
        self.doc.filters.push(filter);
        self
    }

    pub fn validator<F>(mut self, name: &str, check: F) -> Self
    where
        F: Fn(&RecordPayload) -> Vec<(String, String)> + Send + Sync + 'static,
    {
        self.validators.push(NamedValidator {
            name: name.to_string(),
            check: Arc::new(check),
        });
        self
    }

    pub fn permission<F>(mut self, check: F) -> Self
    where
        F: Fn(&Caller, &str, Operation) -> bool + Send + Sync + 'static,
    {
        self.permission = Some(Arc::new(check));
        self
    }

    pub fn display<F>(mut self, label: F) -> Self
    where
        F: Fn(&RecordPayload) -> String + Send + Sync + 'static,
    {
        self.display = Some(Arc::new(label));
        self
    }
}

/// Everything the host supplies beyond the schema.
#[derive(Clone, Default)]
pub struct AdminOptions {
    pub resources: HashMap<String, ResourceOptions>,
    pub sidebar: Vec<SidebarGroup>,
    /// Global capability check, applied on top of per-resource predicates.
    pub can_act: Option<PermissionFn>,
}

impl From<OptionsDocument> for AdminOptions {
    fn from(doc: OptionsDocument) -> Self {
        AdminOptions {
            resources: doc
                .resources
                .into_iter()
                .map(|(name, opts)| (name, ResourceOptions::from(opts)))
                .collect(),
            sidebar: doc.sidebar,
            can_act: None,
        }
    }
}

impl AdminOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn resource(mut self, name: &str, options: ResourceOptions) -> Self {
        self.resources.insert(name.to_string(), options);
        self
    }

    /// Amend options for `name` (e.g. attach validators to options loaded from JSON).
    pub fn configure<F>(mut self, name: &str, f: F) -> Self
    where
        F: FnOnce(ResourceOptions) -> ResourceOptions,
    {
        let current = self.resources.remove(name).unwrap_or_default();
        self.resources.insert(name.to_string(), f(current));
        self
    }

    pub fn sidebar_group(mut self, title: &str, resources: &[&str]) -> Self {
        self.sidebar.push(SidebarGroup {
            title: title.to_string(),
            resources: names(resources),
        });
        self
    }

    pub fn can_act<F>(mut self, check: F) -> Self
    where
        F: Fn(&Caller, &str, Operation) -> bool + Send + Sync + 'static,
    {
        self.can_act = Some(Arc::new(check));
        self
    }
}
