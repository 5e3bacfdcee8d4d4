//! Serializable view tree. Hosts render it with whatever templating they use;
//! UI mode sends it as JSON.

use crate::config::SortDirection;
use crate::render::widgets::Widget;
use serde::Serialize;
use serde_json::Value;

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Link {
    pub label: String,
    pub href: String,
}

impl Link {
    pub fn new(label: impl Into<String>, href: impl Into<String>) -> Self {
        Link {
            label: label.into(),
            href: href.into(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct NavGroup {
    /// `None` for resources outside any configured group.
    pub title: Option<String>,
    pub items: Vec<Link>,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Navigation {
    pub home: Link,
    pub groups: Vec<NavGroup>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub active: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Page {
    pub title: String,
    pub locale: String,
    pub navigation: Navigation,
    pub body: View,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(tag = "view", rename_all = "snake_case")]
pub enum View {
    Index(IndexView),
    List(ListView),
    Form(FormView),
    DeleteConfirm(DeleteConfirmView),
    Error(ErrorView),
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ResourceCard {
    pub resource: String,
    pub label: String,
    pub href: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub create_href: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct IndexView {
    pub resources: Vec<ResourceCard>,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Column {
    pub field: String,
    pub label: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sort_href: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sorted: Option<SortDirection>,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Cell {
    pub field: String,
    pub value: Value,
    pub display: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub href: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Row {
    pub id: Value,
    pub label: String,
    pub href: String,
    pub cells: Vec<Cell>,
    pub actions: Vec<Link>,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Pagination {
    pub page: u64,
    pub pages: u64,
    pub total: u64,
    pub limit: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub prev: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub next: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct SearchBox {
    pub action: String,
    pub param: String,
    pub value: String,
    pub placeholder: String,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct FilterLink {
    pub name: String,
    pub label: String,
    pub href: String,
    pub active: bool,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ListView {
    pub resource: String,
    pub title: String,
    pub columns: Vec<Column>,
    pub rows: Vec<Row>,
    pub empty_text: String,
    pub pagination: Pagination,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub search: Option<SearchBox>,
    pub filters: Vec<FilterLink>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub create_href: Option<String>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FormMode {
    Show,
    Edit,
    Create,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct FormField {
    pub name: String,
    pub label: String,
    pub widget: Widget,
    pub value: Value,
    pub required: bool,
    pub read_only: bool,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub errors: Vec<String>,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct RelationBlock {
    pub name: String,
    pub label: String,
    pub target: String,
    pub items: Vec<Link>,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct FormView {
    pub resource: String,
    pub title: String,
    pub mode: FormMode,
    /// POST target; `None` for read-only views.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub action: Option<String>,
    pub fields: Vec<FormField>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub relations: Vec<RelationBlock>,
    /// Messages not tied to a visible field.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub errors: Vec<String>,
    pub links: Vec<Link>,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct SummaryLine {
    pub label: String,
    pub value: String,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct DeleteConfirmView {
    pub resource: String,
    pub title: String,
    pub record_label: String,
    pub summary: Vec<SummaryLine>,
    pub prompt: String,
    pub action: String,
    pub cancel_href: String,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ErrorView {
    pub status: u16,
    pub code: String,
    pub message: String,
}
