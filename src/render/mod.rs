//! Dashboard rendering: a pure function from (context, action, data) to a view tree.

pub mod i18n;
pub mod view;
pub mod widgets;

use crate::auth::{Caller, Operation};
use crate::config::{display_scalar, FieldDescriptor, Registry, RelationLink, ResourceConfig, SortDirection};
use crate::error::{AppError, ValidationFailure};
use crate::service::{PageInfo, RecordPayload, ResolvedQuery};
use i18n::Messages;
use serde_json::Value;
use std::str::FromStr;
use std::sync::Arc;
use view::*;
use widgets::{widget_for, Widget};

/// What a UI page shows.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Action {
    Index,
    List,
    Show,
    Edit,
    Create,
    DeleteConfirm,
}

impl Action {
    pub fn as_str(&self) -> &'static str {
        match self {
            Action::Index => "index",
            Action::List => "list",
            Action::Show => "show",
            Action::Edit => "edit",
            Action::Create => "create",
            Action::DeleteConfirm => "delete-confirm",
        }
    }

    /// Capability the action needs.
    pub fn operation(&self) -> Operation {
        match self {
            Action::Index | Action::List => Operation::List,
            Action::Show => Operation::Show,
            Action::Edit => Operation::Update,
            Action::Create => Operation::Create,
            Action::DeleteConfirm => Operation::Delete,
        }
    }
}

impl std::fmt::Display for Action {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Action {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, AppError> {
        Ok(match s {
            "index" => Action::Index,
            "list" => Action::List,
            "show" => Action::Show,
            "edit" => Action::Edit,
            "create" | "new" => Action::Create,
            "delete-confirm" | "delete_confirm" | "delete" => Action::DeleteConfirm,
            other => return Err(AppError::UnsupportedAction(format!("unknown action '{}'", other))),
        })
    }
}

pub fn render_action(name: &str) -> Result<Action, AppError> {
    name.parse()
}

/// Input of one render call.
#[derive(Clone, Debug)]
pub enum RenderData {
    Index,
    List {
        config: Arc<ResourceConfig>,
        records: Vec<RecordPayload>,
        page: PageInfo,
        query: ResolvedQuery,
    },
    /// A stored record (show, edit, delete-confirm).
    Record {
        config: Arc<ResourceConfig>,
        record: RecordPayload,
    },
    /// Submitted or blank form values; `id` is set when editing.
    Form {
        config: Arc<ResourceConfig>,
        id: Option<Value>,
        values: RecordPayload,
        errors: Option<ValidationFailure>,
    },
}

pub struct RenderContext<'a> {
    pub registry: &'a Registry,
    pub messages: Messages<'a>,
    pub caller: &'a Caller,
    pub base_path: &'a str,
}

/// `base` joined with `parts`, each part percent-encoded as one path segment.
pub fn path_for(base: &str, parts: &[&str]) -> String {
    let mut out = base.trim_end_matches('/').to_string();
    for p in parts {
        out.push('/');
        out.push_str(&urlencoding::encode(p));
    }
    if out.is_empty() {
        out.push('/');
    }
    out
}

impl<'a> RenderContext<'a> {
    fn href(&self, parts: &[&str]) -> String {
        path_for(self.base_path, parts)
    }

    fn record_href(&self, config: &ResourceConfig, record: &RecordPayload, suffix: Option<&str>) -> String {
        let id = record.get(config.primary_key()).map(display_scalar).unwrap_or_default();
        match suffix {
            Some(s) => self.href(&[&config.name, &id, s]),
            None => self.href(&[&config.name, &id]),
        }
    }

    fn can(&self, config: &ResourceConfig, op: Operation) -> bool {
        self.registry.can_act(self.caller, config, op)
    }

    fn navigation(&self, active: Option<&str>) -> Navigation {
        let visible = |name: &str| {
            self.registry
                .resolve(name)
                .ok()
                .filter(|c| self.can(c, Operation::List))
        };
        let link = |c: &ResourceConfig| Link::new(self.messages.resource_label(c), self.href(&[&c.name]));

        let mut groups = Vec::new();
        let mut grouped = std::collections::HashSet::new();
        for group in self.registry.sidebar() {
            grouped.extend(group.resources.iter().map(String::as_str));
            let items: Vec<Link> = group.resources.iter().filter_map(|r| visible(r)).map(|c| link(&c)).collect();
            if !items.is_empty() {
                groups.push(NavGroup {
                    title: Some(self.messages.text(&format!("sidebar.{}", group.title), &group.title)),
                    items,
                });
            }
        }
        let rest: Vec<Link> = self
            .registry
            .configs()
            .filter(|c| !grouped.contains(c.name.as_str()) && self.can(c, Operation::List))
            .map(|c| link(c))
            .collect();
        if !rest.is_empty() {
            groups.push(NavGroup { title: None, items: rest });
        }
        Navigation {
            home: Link::new(self.messages.text("nav.home", "Dashboard"), self.href(&[])),
            groups,
            active: active.map(str::to_string),
        }
    }

    fn page(&self, title: String, active: Option<&str>, body: View) -> Page {
        Page {
            title,
            locale: self.messages.locale().to_string(),
            navigation: self.navigation(active),
            body,
        }
    }
}

/// Render `data` as `action`. Data that does not fit the action is an `UnsupportedAction`.
pub fn render(ctx: &RenderContext<'_>, action: Action, data: RenderData) -> Result<Page, AppError> {
    match (action, data) {
        (Action::Index, RenderData::Index) => Ok(index(ctx)),
        (Action::List, RenderData::List { config, records, page, query }) => Ok(list(ctx, &config, records, &page, &query)),
        (Action::Show, RenderData::Record { config, record }) => Ok(form(ctx, &config, FormMode::Show, Some(&record), &record, None)),
        (Action::Edit, RenderData::Record { config, record }) => Ok(form(ctx, &config, FormMode::Edit, Some(&record), &record, None)),
        (Action::Edit, RenderData::Form { config, id: Some(id), values, errors }) => {
            let mut keyed = values.clone();
            keyed.insert(config.primary_key().to_string(), id);
            Ok(form(ctx, &config, FormMode::Edit, Some(&keyed), &values, errors.as_ref()))
        }
        (Action::Create, RenderData::Form { config, id: None, values, errors }) => {
            Ok(form(ctx, &config, FormMode::Create, None, &values, errors.as_ref()))
        }
        (Action::DeleteConfirm, RenderData::Record { config, record }) => Ok(delete_confirm(ctx, &config, &record)),
        (action, _) => Err(AppError::UnsupportedAction(format!("'{}' cannot render this data", action))),
    }
}

/// Error page with the same public status, code and message as the API body.
pub fn render_error(ctx: &RenderContext<'_>, error: &AppError) -> Page {
    let (status, code, message) = error.public_parts();
    ctx.page(
        ctx.messages.text("error.title", "Error"),
        None,
        View::Error(ErrorView {
            status: status.as_u16(),
            code: code.to_string(),
            message,
        }),
    )
}

fn index(ctx: &RenderContext<'_>) -> Page {
    let resources = ctx
        .registry
        .configs()
        .filter(|c| ctx.can(c, Operation::List))
        .map(|c| ResourceCard {
            resource: c.name.clone(),
            label: ctx.messages.resource_label(c),
            href: ctx.href(&[&c.name]),
            create_href: ctx.can(c, Operation::Create).then(|| ctx.href(&[&c.name, "new"])),
        })
        .collect();
    ctx.page(
        ctx.messages.text("nav.home", "Dashboard"),
        None,
        View::Index(IndexView { resources }),
    )
}

/// Query string carrying the list state; `None` values are left out.
fn list_href(ctx: &RenderContext<'_>, config: &ResourceConfig, params: &[(&str, Option<String>)]) -> String {
    let pairs: Vec<(&str, &str)> = params
        .iter()
        .filter_map(|(k, v)| v.as_deref().map(|v| (*k, v)))
        .collect();
    let base = ctx.href(&[&config.name]);
    match serde_urlencoded::to_string(&pairs) {
        Ok(qs) if !qs.is_empty() => format!("{}?{}", base, qs),
        _ => base,
    }
}

/// Text shown for a value or a populated relation.
fn display_value(ctx: &RenderContext<'_>, target: Option<&ResourceConfig>, v: &Value) -> String {
    match (target, v) {
        (Some(t), Value::Object(r)) => t.record_label(r),
        (Some(t), Value::Array(items)) => items
            .iter()
            .filter_map(Value::as_object)
            .map(|r| t.record_label(r))
            .collect::<Vec<_>>()
            .join(", "),
        (_, Value::Bool(b)) => ctx.messages.text(if *b { "value.true" } else { "value.false" }, if *b { "yes" } else { "no" }),
        (_, Value::Array(_) | Value::Object(_)) => v.to_string(),
        _ => display_scalar(v),
    }
}

fn list(
    ctx: &RenderContext<'_>,
    config: &ResourceConfig,
    records: Vec<RecordPayload>,
    page: &PageInfo,
    query: &ResolvedQuery,
) -> Page {
    let sort_dir = |d: SortDirection| Some(d.as_str().to_string());
    let state = |sort: &str, dir: SortDirection, page_no: Option<u64>| -> Vec<(&'static str, Option<String>)> {
        vec![
            ("sort", Some(sort.to_string())),
            ("order", sort_dir(dir)),
            ("search", query.search.clone()),
            ("filter", query.named_filter.clone()),
            ("page", page_no.map(|p| p.to_string())),
            ("limit", (query.limit != config.page_size as u64).then(|| query.limit.to_string())),
        ]
    };

    let columns = config
        .list_fields
        .iter()
        .map(|field| {
            let sortable = config.sortable.contains(field) && config.schema.field(field).is_some();
            let sorted = (query.sort.field == *field).then_some(query.sort.direction);
            let next = match sorted {
                Some(SortDirection::Asc) => SortDirection::Desc,
                _ => SortDirection::Asc,
            };
            Column {
                field: field.clone(),
                label: ctx.messages.field_label(config, field),
                sort_href: sortable.then(|| list_href(ctx, config, &state(field, next, None))),
                sorted,
            }
        })
        .collect();

    let rows = records
        .iter()
        .map(|record| {
            let cells = config
                .list_fields
                .iter()
                .map(|field| cell(ctx, config, record, field))
                .collect();
            let mut actions = Vec::new();
            if ctx.can(config, Operation::Show) {
                actions.push(Link::new(ctx.messages.text("actions.show", "Show"), ctx.record_href(config, record, None)));
            }
            if ctx.can(config, Operation::Update) {
                actions.push(Link::new(ctx.messages.text("actions.edit", "Edit"), ctx.record_href(config, record, Some("edit"))));
            }
            if ctx.can(config, Operation::Delete) {
                actions.push(Link::new(
                    ctx.messages.text("actions.delete", "Delete"),
                    ctx.record_href(config, record, Some("delete")),
                ));
            }
            Row {
                id: record.get(config.primary_key()).cloned().unwrap_or(Value::Null),
                label: config.record_label(record),
                href: ctx.record_href(config, record, None),
                cells,
                actions,
            }
        })
        .collect();

    let (sort, dir) = (query.sort.field.as_str(), query.sort.direction);
    let pagination = Pagination {
        page: page.page,
        pages: page.pages,
        total: page.total,
        limit: page.limit,
        prev: (page.page > 1).then(|| list_href(ctx, config, &state(sort, dir, Some(page.page - 1)))),
        next: (page.page < page.pages).then(|| list_href(ctx, config, &state(sort, dir, Some(page.page + 1)))),
    };

    let searchable_text = config
        .schema
        .fields
        .iter()
        .any(|f| f.kind == crate::config::FieldKind::String && config.searchable.contains(&f.name));
    let search = searchable_text.then(|| SearchBox {
        action: ctx.href(&[&config.name]),
        param: "search".into(),
        value: query.search.clone().unwrap_or_default(),
        placeholder: ctx.messages.text("actions.search", "Search"),
    });

    let filters = config
        .filters
        .iter()
        .map(|f| FilterLink {
            name: f.name.clone(),
            label: ctx
                .messages
                .get(&format!("model.{}.filters.{}", config.name, f.name))
                .map(str::to_string)
                .or_else(|| f.label.clone())
                .unwrap_or_else(|| f.name.clone()),
            href: list_href(
                ctx,
                config,
                &[("filter", Some(f.name.clone())), ("search", query.search.clone())],
            ),
            active: query.named_filter.as_deref() == Some(f.name.as_str()),
        })
        .collect();

    let title = ctx.messages.resource_label(config);
    ctx.page(
        title.clone(),
        Some(&config.name),
        View::List(ListView {
            resource: config.name.clone(),
            title,
            columns,
            rows,
            empty_text: ctx.messages.text("list.empty", "No records"),
            pagination,
            search,
            filters,
            create_href: ctx.can(config, Operation::Create).then(|| ctx.href(&[&config.name, "new"])),
        }),
    )
}

fn cell(ctx: &RenderContext<'_>, config: &ResourceConfig, record: &RecordPayload, field: &str) -> Cell {
    let value = record.get(field).cloned().unwrap_or(Value::Null);
    let Some(rel) = config.schema.relation(field) else {
        return Cell {
            field: field.to_string(),
            display: display_value(ctx, None, &value),
            value,
            href: None,
        };
    };
    let target = ctx.registry.resolve(&rel.target).ok();
    let href = match (&target, &value) {
        (Some(t), Value::Object(r)) if ctx.can(t, Operation::Show) => Some(ctx.record_href(t, r, None)),
        _ => None,
    };
    Cell {
        field: field.to_string(),
        display: display_value(ctx, target.as_deref(), &value),
        value,
        href,
    }
}

fn widget(ctx: &RenderContext<'_>, config: &ResourceConfig, field: &FieldDescriptor) -> Widget {
    if let Some(name) = config.widgets.get(&field.name) {
        return widget_for(field, Some(name.as_str()));
    }
    let reference = config.schema.relations.iter().find_map(|r| match &r.link {
        RelationLink::Owning { local } if *local == field.name => Some(r.target.clone()),
        _ => None,
    });
    match reference {
        Some(target) => Widget::Reference {
            href: ctx.href(&[&target]),
            target,
        },
        None => widget_for(field, None),
    }
}

fn form(
    ctx: &RenderContext<'_>,
    config: &ResourceConfig,
    mode: FormMode,
    stored: Option<&RecordPayload>,
    values: &RecordPayload,
    errors: Option<&ValidationFailure>,
) -> Page {
    let label = ctx.messages.resource_label(config);
    let mut shown = Vec::new();
    let fields: Vec<FormField> = config
        .edit_fields
        .iter()
        .filter_map(|name| config.schema.field(name))
        .filter(|f| mode != FormMode::Create || !f.generated)
        .map(|f| {
            shown.push(f.name.as_str());
            let value = match values.get(&f.name) {
                Some(v) => v.clone(),
                None if mode == FormMode::Create => match &f.default {
                    Some(crate::config::DefaultValue::Literal(v)) => v.clone(),
                    _ => Value::Null,
                },
                None => Value::Null,
            };
            FormField {
                name: f.name.clone(),
                label: ctx.messages.field_label(config, &f.name),
                widget: widget(ctx, config, f),
                value,
                required: mode != FormMode::Show && config.is_required(&f.name),
                read_only: mode == FormMode::Show || !config.is_writable(&f.name),
                errors: errors
                    .and_then(|e| e.errors.get(&f.name))
                    .cloned()
                    .unwrap_or_default(),
            }
        })
        .collect();

    let general: Vec<String> = errors
        .map(|e| {
            e.errors
                .iter()
                .filter(|(field, _)| !shown.contains(&field.as_str()))
                .flat_map(|(field, messages)| messages.iter().map(move |m| format!("{}: {}", field, m)))
                .collect()
        })
        .unwrap_or_default();

    let relations = match (mode, stored) {
        (FormMode::Create, _) | (_, None) => Vec::new(),
        (_, Some(record)) => config
            .schema
            .relations
            .iter()
            .filter_map(|rel| {
                let target = ctx.registry.resolve(&rel.target).ok()?;
                if !ctx.can(&target, Operation::List) {
                    return None;
                }
                let items = match record.get(&rel.name)? {
                    Value::Object(r) => vec![r],
                    Value::Array(items) => items.iter().filter_map(Value::as_object).collect(),
                    _ => Vec::new(),
                };
                Some(RelationBlock {
                    name: rel.name.clone(),
                    label: ctx.messages.field_label(config, &rel.name),
                    target: rel.target.clone(),
                    items: items
                        .into_iter()
                        .map(|r| Link::new(target.record_label(r), ctx.record_href(&target, r, None)))
                        .collect(),
                })
            })
            .collect(),
    };

    let mut links = Vec::new();
    let (title, action) = match (mode, stored) {
        (FormMode::Create, _) | (_, None) => {
            links.push(Link::new(ctx.messages.text("actions.back", "Back"), ctx.href(&[&config.name])));
            (
                format!("{} {}", ctx.messages.text("actions.create", "Create"), label),
                Some(ctx.href(&[&config.name, "new"])),
            )
        }
        (FormMode::Show, Some(record)) => {
            if ctx.can(config, Operation::Update) {
                links.push(Link::new(ctx.messages.text("actions.edit", "Edit"), ctx.record_href(config, record, Some("edit"))));
            }
            if ctx.can(config, Operation::Delete) {
                links.push(Link::new(
                    ctx.messages.text("actions.delete", "Delete"),
                    ctx.record_href(config, record, Some("delete")),
                ));
            }
            links.push(Link::new(ctx.messages.text("actions.back", "Back"), ctx.href(&[&config.name])));
            (config.record_label(record), None)
        }
        (FormMode::Edit, Some(record)) => {
            links.push(Link::new(ctx.messages.text("actions.cancel", "Cancel"), ctx.record_href(config, record, None)));
            (
                format!("{} {}", ctx.messages.text("actions.edit", "Edit"), config.record_label(record)),
                Some(ctx.record_href(config, record, Some("edit"))),
            )
        }
    };

    ctx.page(
        title.clone(),
        Some(&config.name),
        View::Form(FormView {
            resource: config.name.clone(),
            title,
            mode,
            action,
            fields,
            relations,
            errors: general,
            links,
        }),
    )
}

fn delete_confirm(ctx: &RenderContext<'_>, config: &ResourceConfig, record: &RecordPayload) -> Page {
    let record_label = config.record_label(record);
    let summary = config
        .list_fields
        .iter()
        .filter(|f| config.schema.field(f).is_some())
        .map(|f| SummaryLine {
            label: ctx.messages.field_label(config, f),
            value: display_value(ctx, None, record.get(f).unwrap_or(&Value::Null)),
        })
        .collect();
    let title = format!("{} {}", ctx.messages.text("actions.delete", "Delete"), record_label);
    ctx.page(
        title.clone(),
        Some(&config.name),
        View::DeleteConfirm(DeleteConfirmView {
            resource: config.name.clone(),
            title,
            record_label,
            summary,
            prompt: ctx.messages.text("delete.prompt", "Delete this record? This cannot be undone."),
            action: ctx.record_href(config, record, Some("delete")),
            cancel_href: ctx.record_href(config, record, None),
        }),
    )
}
