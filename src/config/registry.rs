//! Resolved per-resource configuration and the startup-built registry that holds it.

use crate::auth::{Caller, Operation, PermissionFn};
use crate::config::options::{AdminOptions, DisplayFn, NamedFilter, NamedValidator, ResourceOptions, SidebarGroup, Sort};
use crate::config::{Catalog, FieldKind, ResourceSchema, SchemaDocument, ValidationRule};
use crate::error::{AppError, ConfigError};
use crate::render::widgets::is_known_widget;
use crate::service::RecordPayload;
use crate::settings::AdminSettings;
use regex::Regex;
use serde_json::Value;
use std::collections::{BTreeSet, HashMap, HashSet};
use std::sync::Arc;

/// Declarative rule with its pattern compiled once.
#[derive(Clone, Debug)]
pub struct CompiledRule {
    pub rule: ValidationRule,
    pub pattern: Option<Regex>,
}

#[derive(Clone)]
pub struct ResourceConfig {
    pub name: String,
    pub schema: Arc<ResourceSchema>,
    /// Fields or relations shown as list columns.
    pub list_fields: Vec<String>,
    /// Fields shown on show/edit/create forms.
    pub edit_fields: Vec<String>,
    pub sortable: BTreeSet<String>,
    pub searchable: BTreeSet<String>,
    pub default_sort: Option<Sort>,
    pub page_size: u32,
    pub operations: BTreeSet<Operation>,
    pub rules: HashMap<String, CompiledRule>,
    pub validators: Vec<NamedValidator>,
    pub permission: Option<PermissionFn>,
    pub display: Option<DisplayFn>,
    pub title_field: Option<String>,
    pub widgets: HashMap<String, String>,
    pub aliases: HashMap<String, String>,
    pub filters: Vec<NamedFilter>,
}

impl std::fmt::Debug for ResourceConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResourceConfig")
            .field("name", &self.name)
            .field("list_fields", &self.list_fields)
            .field("edit_fields", &self.edit_fields)
            .field("sortable", &self.sortable)
            .field("searchable", &self.searchable)
            .field("operations", &self.operations)
            .field("validators", &self.validators)
            .finish_non_exhaustive()
    }
}

const TITLE_CANDIDATES: &[&str] = &["name", "title", "label", "email"];

impl ResourceConfig {
    pub fn primary_key(&self) -> &str {
        &self.schema.primary_key
    }

    pub fn allows(&self, op: Operation) -> bool {
        self.operations.contains(&op)
    }

    /// Required on create: schema-required unless a rule says otherwise, or rule-required.
    pub fn is_required(&self, field: &str) -> bool {
        let rule_required = self.rules.get(field).and_then(|r| r.rule.required);
        match (self.schema.field(field), rule_required) {
            (_, Some(explicit)) => explicit,
            (Some(f), None) => f.is_required(),
            (None, None) => false,
        }
    }

    /// Accepted in write payloads: shown on the edit form and not server-assigned.
    pub fn is_writable(&self, field: &str) -> bool {
        self.edit_fields.iter().any(|f| f == field) && self.schema.field(field).is_some_and(|f| !f.generated)
    }

    pub fn validator_names(&self) -> Vec<&str> {
        self.validators.iter().map(|v| v.name.as_str()).collect()
    }

    /// Human label for one record.
    pub fn record_label(&self, record: &RecordPayload) -> String {
        if let Some(display) = &self.display {
            return display(record);
        }
        let title = self
            .title_field
            .as_deref()
            .into_iter()
            .chain(TITLE_CANDIDATES.iter().copied().filter(|c| {
                self.schema.field(c).is_some_and(|f| f.kind == FieldKind::String)
            }))
            .find_map(|f| match record.get(f) {
                Some(Value::String(s)) if !s.is_empty() => Some(s.clone()),
                Some(Value::Number(n)) => Some(n.to_string()),
                _ => None,
            });
        title.unwrap_or_else(|| {
            let id = record.get(self.primary_key()).map(display_scalar).unwrap_or_default();
            format!("{} #{}", self.name, id)
        })
    }

    pub fn filter(&self, name: &str) -> Option<&NamedFilter> {
        self.filters.iter().find(|f| f.name == name)
    }
}

/// Plain text for a scalar JSON value (strings unquoted).
pub fn display_scalar(v: &Value) -> String {
    match v {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Merge schema defaults with the overrides for one resource.
pub fn resolve_resource(
    schema: Arc<ResourceSchema>,
    options: Option<&ResourceOptions>,
    settings: &AdminSettings,
) -> Result<ResourceConfig, ConfigError> {
    let empty = ResourceOptions::default();
    let opts = options.unwrap_or(&empty);
    let doc = &opts.doc;
    let resource = schema.name.as_str();

    let field_names: HashSet<&str> = schema.field_names().collect();
    let mut member_names = field_names.clone();
    member_names.extend(schema.relations.iter().map(|r| r.name.as_str()));
    let user_fields: Vec<String> = schema
        .fields
        .iter()
        .filter(|f| !f.generated)
        .map(|f| f.name.clone())
        .collect();
    let scalar_fields = || {
        schema
            .fields
            .iter()
            .filter(|f| f.kind != FieldKind::Json)
            .map(|f| f.name.clone())
            .collect::<BTreeSet<_>>()
    };

    let fields = &field_names;
    let members = &member_names;
    check_fields(resource, "list_fields", members, doc.list_fields.iter().flatten())?;
    check_fields(resource, "edit_fields", fields, doc.edit_fields.iter().flatten())?;
    check_fields(resource, "sortable", fields, doc.sortable.iter().flatten())?;
    check_fields(resource, "searchable", fields, doc.searchable.iter().flatten())?;
    check_fields(resource, "validation", fields, doc.validation.keys())?;
    check_fields(resource, "widgets", fields, doc.widgets.keys())?;
    check_fields(resource, "aliases", members, doc.aliases.keys())?;
    check_fields(resource, "title_field", fields, doc.title_field.iter())?;

    let list_fields = doc.list_fields.clone().unwrap_or_else(|| user_fields.clone());
    let edit_fields = doc.edit_fields.clone().unwrap_or(user_fields);
    let sortable = doc
        .sortable
        .as_ref()
        .map(|v| v.iter().cloned().collect())
        .unwrap_or_else(scalar_fields);
    let searchable = doc
        .searchable
        .as_ref()
        .map(|v| v.iter().cloned().collect())
        .unwrap_or_else(scalar_fields);

    if let Some(sort) = &doc.default_sort {
        if !sortable.contains(&sort.field) {
            return Err(ConfigError::UnsortableDefault {
                resource: resource.to_string(),
                field: sort.field.clone(),
            });
        }
    }

    for (field, widget) in &doc.widgets {
        if !is_known_widget(widget) {
            return Err(ConfigError::UnknownWidget {
                resource: resource.to_string(),
                field: field.clone(),
                widget: widget.clone(),
            });
        }
    }

    let mut rules = HashMap::new();
    for (field, rule) in &doc.validation {
        let pattern = match &rule.pattern {
            Some(p) => Some(Regex::new(p).map_err(|e| ConfigError::InvalidPattern {
                resource: resource.to_string(),
                field: field.clone(),
                reason: e.to_string(),
            })?),
            None => None,
        };
        rules.insert(
            field.clone(),
            CompiledRule {
                rule: rule.clone(),
                pattern,
            },
        );
    }

    let mut filter_names = HashSet::new();
    for filter in &doc.filters {
        if !filter_names.insert(filter.name.as_str()) {
            return Err(ConfigError::InvalidFilter {
                resource: resource.to_string(),
                filter: filter.name.clone(),
                reason: "duplicate name".into(),
            });
        }
        if let Some(field) = filter.conditions.keys().find(|f| !field_names.contains(f.as_str())) {
            return Err(ConfigError::InvalidFilter {
                resource: resource.to_string(),
                filter: filter.name.clone(),
                reason: format!("unknown field '{}'", field),
            });
        }
    }

    let operations: BTreeSet<Operation> = doc
        .operations
        .as_ref()
        .map(|ops| ops.iter().copied().collect())
        .unwrap_or_else(|| Operation::ALL.into_iter().collect());

    let config = ResourceConfig {
        name: schema.name.clone(),
        schema: schema.clone(),
        list_fields,
        edit_fields,
        sortable,
        searchable,
        default_sort: doc.default_sort.clone(),
        page_size: doc
            .page_size
            .unwrap_or(settings.page_size)
            .clamp(1, settings.max_page_size),
        operations,
        rules,
        validators: opts.validators.clone(),
        permission: opts.permission.clone(),
        display: opts.display.clone(),
        title_field: doc.title_field.clone(),
        widgets: doc.widgets.clone(),
        aliases: doc.aliases.clone(),
        filters: doc.filters.clone(),
    };

    if config.allows(Operation::Create) {
        if let Some(hidden) = schema
            .fields
            .iter()
            .find(|f| config.is_required(&f.name) && !f.generated && !config.edit_fields.contains(&f.name))
        {
            return Err(ConfigError::RequiredFieldHidden {
                resource: resource.to_string(),
                field: hidden.name.clone(),
            });
        }
    }

    Ok(config)
}

fn check_fields<'a>(
    resource: &str,
    option: &'static str,
    known: &HashSet<&str>,
    fields: impl IntoIterator<Item = &'a String>,
) -> Result<(), ConfigError> {
    match fields.into_iter().find(|f| !known.contains(f.as_str())) {
        Some(field) => Err(ConfigError::UnknownField {
            resource: resource.to_string(),
            option,
            field: field.clone(),
        }),
        None => Ok(()),
    }
}

/// Catalog plus every resolved config. Built once by `init`, read-only afterwards.
pub struct Registry {
    catalog: Catalog,
    configs: HashMap<String, Arc<ResourceConfig>>,
    sidebar: Vec<SidebarGroup>,
    can_act: Option<PermissionFn>,
    settings: AdminSettings,
}

impl Registry {
    /// Resolve every resource eagerly so misconfiguration stops startup.
    pub fn init(catalog: Catalog, options: AdminOptions, settings: AdminSettings) -> Result<Self, ConfigError> {
        if let Some(unknown) = options.resources.keys().find(|name| !catalog.contains(name)) {
            return Err(ConfigError::UnknownResource(unknown.clone()));
        }
        for group in &options.sidebar {
            if let Some(unknown) = group.resources.iter().find(|name| !catalog.contains(name)) {
                return Err(ConfigError::UnknownResource(unknown.clone()));
            }
        }

        let mut configs = HashMap::with_capacity(catalog.len());
        for schema in catalog.iter() {
            let config = resolve_resource(schema.clone(), options.resources.get(&schema.name), &settings)?;
            tracing::debug!(resource = %schema.name, config = ?config, "resource resolved");
            configs.insert(schema.name.clone(), Arc::new(config));
        }
        tracing::info!(resources = configs.len(), "admin registry initialised");

        Ok(Registry {
            catalog,
            configs,
            sidebar: options.sidebar,
            can_act: options.can_act,
            settings,
        })
    }

    /// Introspect `doc` and resolve `options` in one step.
    pub fn from_document(doc: &SchemaDocument, options: AdminOptions, settings: AdminSettings) -> Result<Self, AppError> {
        let catalog = crate::config::introspect(doc)?;
        Ok(Registry::init(catalog, options, settings)?)
    }

    pub fn resolve(&self, resource: &str) -> Result<Arc<ResourceConfig>, AppError> {
        self.configs
            .get(resource)
            .cloned()
            .ok_or_else(|| AppError::ResourceNotFound(resource.to_string()))
    }

    pub fn contains(&self, resource: &str) -> bool {
        self.configs.contains_key(resource)
    }

    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    /// Configs in catalog order.
    pub fn configs(&self) -> impl Iterator<Item = &Arc<ResourceConfig>> {
        self.catalog.iter().filter_map(|s| self.configs.get(&s.name))
    }

    pub fn sidebar(&self) -> &[SidebarGroup] {
        &self.sidebar
    }

    pub fn settings(&self) -> &AdminSettings {
        &self.settings
    }

    /// Operation enabled for the resource, and both predicates agree.
    pub fn can_act(&self, caller: &Caller, config: &ResourceConfig, op: Operation) -> bool {
        config.allows(op)
            && self.can_act.as_ref().map_or(true, |check| check(caller, &config.name, op))
            && config.permission.as_ref().map_or(true, |check| check(caller, &config.name, op))
    }
}
