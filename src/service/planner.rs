//! Query planning: a `QuerySpec` from the request is checked against the
//! resource config, turned into a store query, executed, and its relations
//! populated with one batched lookup per relation.

use crate::config::{
    display_scalar, FieldKind, RelationDescriptor, RelationLink, ResourceConfig, Sort, SortDirection,
};
use crate::config::Registry;
use crate::error::AppError;
use crate::service::validation::coerce_filter;
use crate::service::RecordPayload;
use crate::settings::AdminSettings;
use crate::store::{Predicate, Store, StoreQuery};
use serde::Serialize;
use serde_json::Value;
use std::collections::HashMap;

/// Query parameters with a fixed meaning; any other key filters on a field.
pub const RESERVED_PARAMS: &[&str] = &[
    "page", "page_size", "limit", "offset", "sort", "order", "search", "include", "locale", "filter",
];

#[derive(Clone, Debug, PartialEq)]
pub enum Filter {
    Eq { field: String, value: Value },
    In { field: String, values: Vec<Value> },
}

impl Filter {
    pub fn field(&self) -> &str {
        match self {
            Filter::Eq { field, .. } | Filter::In { field, .. } => field,
        }
    }
}

/// What a list request asks for.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct QuerySpec {
    pub resource: String,
    pub filters: Vec<Filter>,
    pub search: Option<String>,
    pub sort: Option<Sort>,
    /// `order` given without `sort`: the direction of the default sort.
    pub order: Option<SortDirection>,
    /// 1-based; ignored when `offset` is given.
    pub page: Option<u64>,
    pub offset: Option<u64>,
    pub limit: Option<u64>,
    pub include: Vec<String>,
    pub named_filter: Option<String>,
}

fn number_param(key: &str, raw: &str) -> Result<u64, AppError> {
    raw.trim()
        .parse::<u64>()
        .map_err(|_| AppError::InvalidQuery(format!("'{}' must be a non-negative integer, got '{}'", key, raw)))
}

impl QuerySpec {
    pub fn new(resource: impl Into<String>) -> Self {
        QuerySpec {
            resource: resource.into(),
            ..Default::default()
        }
    }

    /// Parse raw query pairs. A field named more than once becomes an `In` filter.
    pub fn from_params(config: &ResourceConfig, params: &[(String, String)]) -> Result<Self, AppError> {
        let mut spec = QuerySpec::new(&config.name);
        let mut direction = None;
        let mut grouped: Vec<(String, Vec<Value>)> = Vec::new();
        for (key, raw) in params {
            match key.as_str() {
                "page" => spec.page = Some(number_param(key, raw)?),
                "page_size" | "limit" => spec.limit = Some(number_param(key, raw)?),
                "offset" => spec.offset = Some(number_param(key, raw)?),
                "sort" if raw.is_empty() => {}
                "sort" => {
                    let (field, dir) = match raw.strip_prefix('-') {
                        Some(field) => (field, SortDirection::Desc),
                        None => (raw.as_str(), SortDirection::Asc),
                    };
                    spec.sort = Some(Sort {
                        field: field.to_string(),
                        direction: dir,
                    });
                }
                "order" => {
                    direction = Some(match raw.to_lowercase().as_str() {
                        "asc" => SortDirection::Asc,
                        "desc" => SortDirection::Desc,
                        _ => return Err(AppError::InvalidQuery(format!("order must be 'asc' or 'desc', got '{}'", raw))),
                    })
                }
                "search" => spec.search = Some(raw.clone()).filter(|s| !s.trim().is_empty()),
                "include" => spec.include.extend(
                    raw.split(',')
                        .map(str::trim)
                        .filter(|s| !s.is_empty())
                        .map(str::to_string),
                ),
                "filter" => spec.named_filter = Some(raw.clone()).filter(|s| !s.is_empty()),
                "locale" => {}
                field => {
                    let descriptor = config
                        .schema
                        .field(field)
                        .ok_or_else(|| AppError::InvalidQuery(format!("unknown field '{}' on {}", field, config.name)))?;
                    let value = coerce_filter(descriptor, raw)
                        .map_err(|m| AppError::InvalidQuery(format!("filter '{}': {}", field, m)))?;
                    match grouped.iter_mut().find(|(f, _)| f == field) {
                        Some((_, values)) => values.push(value),
                        None => grouped.push((field.to_string(), vec![value])),
                    }
                }
            }
        }
        match (spec.sort.as_mut(), direction) {
            (Some(sort), Some(dir)) => sort.direction = dir,
            (None, dir) => spec.order = dir,
            _ => {}
        }
        spec.filters = grouped
            .into_iter()
            .map(|(field, mut values)| match values.len() {
                1 => Filter::Eq {
                    field,
                    value: values.remove(0),
                },
                _ => Filter::In { field, values },
            })
            .collect();
        Ok(spec)
    }
}

/// A checked query, ready to run.
#[derive(Clone, Debug)]
pub struct ResolvedQuery {
    pub store_query: StoreQuery,
    pub includes: Vec<RelationDescriptor>,
    /// Effective sort before the primary key tiebreak.
    pub sort: Sort,
    pub limit: u64,
    pub offset: u64,
    pub search: Option<String>,
    pub named_filter: Option<String>,
}

impl ResolvedQuery {
    /// 1-based page the offset falls on.
    pub fn page(&self) -> u64 {
        self.offset / self.limit.max(1) + 1
    }
}

/// Single-pass page of records plus the total number of matches.
#[derive(Debug)]
pub struct Records {
    rows: std::vec::IntoIter<RecordPayload>,
    total: u64,
}

impl Records {
    pub fn new(rows: Vec<RecordPayload>, total: u64) -> Self {
        Records {
            rows: rows.into_iter(),
            total,
        }
    }

    pub fn total(&self) -> u64 {
        self.total
    }
}

impl Iterator for Records {
    type Item = RecordPayload;

    fn next(&mut self) -> Option<RecordPayload> {
        self.rows.next()
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.rows.size_hint()
    }
}

impl ExactSizeIterator for Records {}

/// Pagination block shared by API envelopes and list views.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct PageInfo {
    pub total: u64,
    pub limit: u64,
    pub offset: u64,
    pub page: u64,
    pub pages: u64,
}

impl PageInfo {
    pub fn new(query: &ResolvedQuery, total: u64) -> Self {
        let limit = query.limit.max(1);
        PageInfo {
            total,
            limit,
            offset: query.offset,
            page: query.page(),
            pages: total.div_ceil(limit),
        }
    }
}

pub struct QueryPlanner;

impl QueryPlanner {
    /// Check every reference in `spec` against `config` and build the store query.
    pub fn plan(config: &ResourceConfig, spec: &QuerySpec, settings: &AdminSettings) -> Result<ResolvedQuery, AppError> {
        let schema = &config.schema;
        let mut predicates = Vec::new();

        if let Some(name) = &spec.named_filter {
            let filter = config
                .filter(name)
                .ok_or_else(|| AppError::InvalidQuery(format!("unknown filter '{}' on {}", name, config.name)))?;
            let mut conditions: Vec<_> = filter.conditions.iter().collect();
            conditions.sort_by(|a, b| a.0.cmp(b.0));
            predicates.extend(conditions.into_iter().map(|(f, v)| Predicate::eq(f, v.clone())));
        }

        for filter in &spec.filters {
            let field = filter.field();
            if schema.field(field).is_none() {
                return Err(AppError::InvalidQuery(format!("unknown field '{}' on {}", field, config.name)));
            }
            if !config.searchable.contains(field) {
                return Err(AppError::InvalidQuery(format!("field '{}' is not filterable", field)));
            }
            predicates.push(match filter {
                Filter::Eq { field, value } => Predicate::eq(field, value.clone()),
                Filter::In { field, values } => Predicate::is_in(field, values.clone()),
            });
        }

        let search = spec.search.as_ref().map(|s| s.trim().to_string()).filter(|s| !s.is_empty());
        if let Some(term) = &search {
            let fields: Vec<String> = schema
                .fields
                .iter()
                .filter(|f| f.kind == FieldKind::String && config.searchable.contains(&f.name))
                .map(|f| f.name.clone())
                .collect();
            predicates.push(Predicate::Search {
                fields,
                term: term.clone(),
            });
        }

        let sort = match &spec.sort {
            Some(sort) => {
                if schema.field(&sort.field).is_none() {
                    return Err(AppError::InvalidQuery(format!("unknown field '{}' on {}", sort.field, config.name)));
                }
                if !config.sortable.contains(&sort.field) {
                    return Err(AppError::InvalidQuery(format!("field '{}' is not sortable", sort.field)));
                }
                sort.clone()
            }
            None => {
                let mut sort = config.default_sort.clone().unwrap_or_else(|| Sort {
                    field: schema.primary_key.clone(),
                    direction: SortDirection::Asc,
                });
                if let Some(dir) = spec.order {
                    sort.direction = dir;
                }
                sort
            }
        };
        let mut order = vec![(sort.field.clone(), sort.direction)];
        if sort.field != schema.primary_key {
            order.push((schema.primary_key.clone(), SortDirection::Asc));
        }

        let includes = spec
            .include
            .iter()
            .map(|name| {
                schema
                    .relation(name)
                    .cloned()
                    .ok_or_else(|| AppError::InvalidQuery(format!("unknown relation '{}' on {}", name, config.name)))
            })
            .collect::<Result<Vec<_>, _>>()?;

        let limit = match spec.limit {
            Some(0) => return Err(AppError::InvalidQuery("limit must be at least 1".into())),
            Some(n) => n.min(settings.max_page_size as u64),
            None => config.page_size as u64,
        };
        let offset = match (spec.offset, spec.page) {
            (Some(offset), _) => offset,
            (None, Some(0)) => return Err(AppError::InvalidQuery("page starts at 1".into())),
            (None, Some(page)) => (page - 1).saturating_mul(limit),
            (None, None) => 0,
        };

        let resolved = ResolvedQuery {
            store_query: StoreQuery {
                predicates,
                sort: order,
                offset,
                limit: Some(limit),
            },
            includes,
            sort,
            limit,
            offset,
            search,
            named_filter: spec.named_filter.clone(),
        };
        tracing::debug!(resource = %config.name, query = ?resolved.store_query, "query planned");
        Ok(resolved)
    }

    /// Run a planned query: total count, one page, relations populated.
    pub async fn execute(
        store: &dyn Store,
        registry: &Registry,
        config: &ResourceConfig,
        query: &ResolvedQuery,
    ) -> Result<Records, AppError> {
        let schema = &config.schema;
        let total = store
            .count(schema, &query.store_query.predicates)
            .await
            .map_err(|e| AppError::from_store(e, &config.name, None))?;
        let mut rows = store
            .find(schema, &query.store_query)
            .await
            .map_err(|e| AppError::from_store(e, &config.name, None))?;
        populate(store, registry, config, &mut rows, &query.includes).await?;
        Ok(Records::new(rows, total))
    }

    /// One record with the given relations populated. `NotFound` when absent.
    pub async fn fetch_one(
        store: &dyn Store,
        registry: &Registry,
        config: &ResourceConfig,
        id: &Value,
        includes: &[RelationDescriptor],
    ) -> Result<RecordPayload, AppError> {
        let record = store
            .find_by_id(&config.schema, id)
            .await
            .map_err(|e| AppError::from_store(e, &config.name, Some(&display_scalar(id))))?
            .ok_or_else(|| AppError::not_found(&config.name, display_scalar(id)))?;
        let mut rows = vec![record];
        populate(store, registry, config, &mut rows, includes).await?;
        Ok(rows.remove(0))
    }
}

/// Map key for a scalar; integers and equal floats share one key.
fn key_of(v: &Value) -> String {
    match v {
        Value::Number(n) => match n.as_f64() {
            Some(f) if f.fract() == 0.0 && f.abs() < 9.0e15 => format!("{}", f as i64),
            _ => n.to_string(),
        },
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn distinct_keys<'a>(rows: impl Iterator<Item = &'a RecordPayload>, field: &str) -> Vec<Value> {
    let mut seen = std::collections::HashSet::new();
    rows.filter_map(|r| r.get(field))
        .filter(|v| !v.is_null() && seen.insert(key_of(v)))
        .cloned()
        .collect()
}

async fn fetch_in(
    store: &dyn Store,
    registry: &Registry,
    resource: &str,
    field: &str,
    keys: Vec<Value>,
) -> Result<Vec<RecordPayload>, AppError> {
    let config = registry.resolve(resource)?;
    if keys.is_empty() {
        return Ok(Vec::new());
    }
    let query = StoreQuery::matching(&config.schema, vec![Predicate::is_in(field, keys)]);
    store
        .find(&config.schema, &query)
        .await
        .map_err(|e| AppError::from_store(e, resource, None))
}

/// Attach each relation under its name: object or null for to-one, array for to-many.
pub async fn populate(
    store: &dyn Store,
    registry: &Registry,
    config: &ResourceConfig,
    rows: &mut [RecordPayload],
    relations: &[RelationDescriptor],
) -> Result<(), AppError> {
    if rows.is_empty() {
        return Ok(());
    }
    let pk = config.primary_key();
    for rel in relations {
        let target = registry.resolve(&rel.target)?;
        let target_pk = target.primary_key();
        match &rel.link {
            RelationLink::Owning { local } => {
                let keys = distinct_keys(rows.iter(), local);
                let found = fetch_in(store, registry, &rel.target, target_pk, keys).await?;
                let by_key: HashMap<String, RecordPayload> = found
                    .into_iter()
                    .map(|r| (r.get(target_pk).map(key_of).unwrap_or_default(), r))
                    .collect();
                for row in rows.iter_mut() {
                    let related = row
                        .get(local)
                        .and_then(|k| by_key.get(&key_of(k)))
                        .map(|r| Value::Object(r.clone()))
                        .unwrap_or(Value::Null);
                    row.insert(rel.name.clone(), related);
                }
            }
            RelationLink::Inverse { remote } => {
                let keys = distinct_keys(rows.iter(), pk);
                let found = fetch_in(store, registry, &rel.target, remote, keys).await?;
                let mut grouped: HashMap<String, Vec<Value>> = HashMap::new();
                for r in found {
                    let key = r.get(remote).map(key_of).unwrap_or_default();
                    grouped.entry(key).or_default().push(Value::Object(r));
                }
                for row in rows.iter_mut() {
                    let mut related = row
                        .get(pk)
                        .and_then(|k| grouped.get(&key_of(k)))
                        .cloned()
                        .unwrap_or_default();
                    let value = if rel.cardinality.is_to_many() {
                        Value::Array(related)
                    } else if related.is_empty() {
                        Value::Null
                    } else {
                        related.swap_remove(0)
                    };
                    row.insert(rel.name.clone(), value);
                }
            }
            RelationLink::Through { through, local, remote } => {
                let keys = distinct_keys(rows.iter(), pk);
                let links = fetch_in(store, registry, through, local, keys).await?;
                let target_keys = distinct_keys(links.iter(), remote);
                let found = fetch_in(store, registry, &rel.target, target_pk, target_keys).await?;
                let by_key: HashMap<String, RecordPayload> = found
                    .into_iter()
                    .map(|r| (r.get(target_pk).map(key_of).unwrap_or_default(), r))
                    .collect();
                let mut grouped: HashMap<String, Vec<Value>> = HashMap::new();
                for link in &links {
                    let (Some(owner), Some(other)) = (link.get(local), link.get(remote)) else {
                        continue;
                    };
                    if let Some(r) = by_key.get(&key_of(other)) {
                        grouped.entry(key_of(owner)).or_default().push(Value::Object(r.clone()));
                    }
                }
                for row in rows.iter_mut() {
                    let related = row.get(pk).and_then(|k| grouped.get(&key_of(k))).cloned().unwrap_or_default();
                    row.insert(rel.name.clone(), Value::Array(related));
                }
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{AdminOptions, ResourceOptions, SchemaDocument};
    use crate::store::MemoryStore;
    use serde_json::json;
    use std::sync::Arc;

    fn registry() -> Registry {
        let doc: SchemaDocument = serde_json::from_value(json!({ "resources": [
            { "name": "User", "fields": [
                { "name": "id", "kind": "number", "generated": true, "default": "autoincrement" },
                { "name": "name", "kind": "string" }
              ],
              "relations": [ { "name": "posts", "target": "Post", "cardinality": "one_to_many", "foreign_key": "authorId" } ] },
            { "name": "Post", "fields": [
                { "name": "id", "kind": "number", "generated": true, "default": "autoincrement" },
                { "name": "title", "kind": "string" },
                { "name": "views", "kind": "number", "default": 0 },
                { "name": "authorId", "kind": "number", "nullable": true },
                { "name": "meta", "kind": "json", "nullable": true }
              ],
              "relations": [
                { "name": "author", "target": "User", "cardinality": "one_to_one", "foreign_key": "authorId" },
                { "name": "tags", "target": "Tag", "cardinality": "many_to_many", "foreign_key": ["postId", "tagId"], "through": "PostTag" }
              ] },
            { "name": "Tag", "fields": [
                { "name": "id", "kind": "number", "generated": true, "default": "autoincrement" },
                { "name": "label", "kind": "string" }
              ],
              "relations": [ { "name": "posts", "target": "Post", "cardinality": "many_to_many", "foreign_key": ["tagId", "postId"], "through": "PostTag" } ] },
            { "name": "PostTag", "fields": [
                { "name": "id", "kind": "number", "generated": true, "default": "autoincrement" },
                { "name": "postId", "kind": "number" },
                { "name": "tagId", "kind": "number" }
              ] }
        ]}))
        .unwrap();
        Registry::from_document(
            &doc,
            AdminOptions::new().resource("Post", ResourceOptions::new().searchable(&["title", "authorId"]).sortable(&["id", "title", "views"])),
            AdminSettings::default(),
        )
        .unwrap()
    }

    fn params(pairs: &[(&str, &str)]) -> Vec<(String, String)> {
        pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect()
    }

    async fn seed(store: &MemoryStore, registry: &Registry, resource: &str, rows: Value) {
        let schema = registry.catalog().get(resource).unwrap().clone();
        for row in rows.as_array().unwrap() {
            store.create(&schema, row.as_object().unwrap().clone()).await.unwrap();
        }
    }

    async fn blog() -> (Arc<MemoryStore>, Registry) {
        let registry = registry();
        let store = Arc::new(MemoryStore::new());
        seed(&store, &registry, "User", json!([{ "name": "Ada" }, { "name": "Linus" }])).await;
        seed(
            &store,
            &registry,
            "Post",
            json!([
                { "title": "Rust ownership", "views": 5, "authorId": 1 },
                { "title": "Go channels", "views": 5, "authorId": 2 },
                { "title": "Rust async", "views": 9, "authorId": 1 },
                { "title": "Orphan", "views": 1 }
            ]),
        )
        .await;
        seed(&store, &registry, "Tag", json!([{ "label": "systems" }, { "label": "web" }])).await;
        seed(
            &store,
            &registry,
            "PostTag",
            json!([{ "postId": 1, "tagId": 1 }, { "postId": 1, "tagId": 2 }, { "postId": 3, "tagId": 2 }]),
        )
        .await;
        (store, registry)
    }

    #[test]
    fn params_parse_into_spec() {
        let registry = registry();
        let post = registry.resolve("Post").unwrap();
        let spec = QuerySpec::from_params(
            &post,
            &params(&[
                ("sort", "-views"),
                ("page", "2"),
                ("limit", "5"),
                ("authorId", "1"),
                ("title", "a"),
                ("title", "b"),
                ("include", "author, tags"),
                ("locale", "fr"),
            ]),
        )
        .unwrap();
        assert_eq!(spec.sort.as_ref().unwrap().direction, SortDirection::Desc);
        assert_eq!((spec.page, spec.limit), (Some(2), Some(5)));
        assert_eq!(spec.include, ["author", "tags"]);
        assert_eq!(
            spec.filters,
            vec![
                Filter::Eq { field: "authorId".into(), value: json!(1) },
                Filter::In { field: "title".into(), values: vec![json!("a"), json!("b")] },
            ]
        );
    }

    #[test]
    fn bad_params_are_invalid_queries() {
        let registry = registry();
        let post = registry.resolve("Post").unwrap();
        for pairs in [
            vec![("page", "two")],
            vec![("limit", "-1")],
            vec![("order", "sideways")],
            vec![("subtitle", "x")],
            vec![("authorId", "abc")],
            vec![("views", "lots")],
        ] {
            let err = QuerySpec::from_params(&post, &params(&pairs)).unwrap_err();
            assert!(matches!(err, AppError::InvalidQuery(_)), "{:?}", pairs);
        }
    }

    #[test]
    fn plan_rejects_unknown_and_unsortable_fields() {
        let registry = registry();
        let post = registry.resolve("Post").unwrap();
        let settings = AdminSettings::default();
        let mut spec = QuerySpec::new("Post");
        spec.sort = Some(Sort { field: "unknownField".into(), direction: SortDirection::Asc });
        assert!(matches!(QueryPlanner::plan(&post, &spec, &settings), Err(AppError::InvalidQuery(_))));

        spec.sort = Some(Sort { field: "authorId".into(), direction: SortDirection::Asc });
        assert!(matches!(QueryPlanner::plan(&post, &spec, &settings), Err(AppError::InvalidQuery(_))));

        let mut spec = QuerySpec::new("Post");
        spec.filters = vec![Filter::Eq { field: "views".into(), value: json!(5) }];
        assert!(matches!(QueryPlanner::plan(&post, &spec, &settings), Err(AppError::InvalidQuery(_))));

        let mut spec = QuerySpec::new("Post");
        spec.include = vec!["comments".into()];
        assert!(matches!(QueryPlanner::plan(&post, &spec, &settings), Err(AppError::InvalidQuery(_))));

        let mut spec = QuerySpec::new("Post");
        spec.named_filter = Some("popular".into());
        assert!(matches!(QueryPlanner::plan(&post, &spec, &settings), Err(AppError::InvalidQuery(_))));
    }

    #[test]
    fn plan_clamps_limit_and_appends_tiebreak() {
        let registry = registry();
        let post = registry.resolve("Post").unwrap();
        let mut spec = QuerySpec::new("Post");
        spec.limit = Some(1000);
        spec.page = Some(3);
        spec.sort = Some(Sort { field: "views".into(), direction: SortDirection::Desc });
        let planned = QueryPlanner::plan(&post, &spec, &AdminSettings::default()).unwrap();
        assert_eq!(planned.limit, 100);
        assert_eq!(planned.offset, 200);
        assert_eq!(planned.page(), 3);
        assert_eq!(
            planned.store_query.sort,
            vec![("views".to_string(), SortDirection::Desc), ("id".to_string(), SortDirection::Asc)]
        );

        let default = QueryPlanner::plan(&post, &QuerySpec::new("Post"), &AdminSettings::default()).unwrap();
        assert_eq!(default.limit, 10);
        assert_eq!(default.store_query.sort, vec![("id".to_string(), SortDirection::Asc)]);
    }

    #[test]
    fn order_alone_applies_to_the_default_sort() {
        let registry = registry();
        let post = registry.resolve("Post").unwrap();
        let spec = QuerySpec::from_params(&post, &params(&[("order", "desc")])).unwrap();
        assert_eq!(spec.order, Some(SortDirection::Desc));
        let planned = QueryPlanner::plan(&post, &spec, registry.settings()).unwrap();
        assert_eq!(planned.store_query.sort, vec![("id".to_string(), SortDirection::Desc)]);
        assert_eq!(planned.sort.direction, SortDirection::Desc);
    }

    #[tokio::test]
    async fn execute_pages_deterministically() {
        let (store, registry) = blog().await;
        let post = registry.resolve("Post").unwrap();
        let spec = QuerySpec::from_params(&post, &params(&[("sort", "-views"), ("limit", "2")])).unwrap();
        let planned = QueryPlanner::plan(&post, &spec, registry.settings()).unwrap();

        let first: Vec<Value> = QueryPlanner::execute(store.as_ref(), &registry, &post, &planned)
            .await
            .unwrap()
            .map(|r| r["id"].clone())
            .collect();
        let again: Vec<Value> = QueryPlanner::execute(store.as_ref(), &registry, &post, &planned)
            .await
            .unwrap()
            .map(|r| r["id"].clone())
            .collect();
        assert_eq!(first, [json!(3), json!(1)]);
        assert_eq!(first, again);

        let records = QueryPlanner::execute(store.as_ref(), &registry, &post, &planned).await.unwrap();
        assert_eq!(records.total(), 4);
        assert_eq!(records.len(), 2);
    }

    #[tokio::test]
    async fn search_is_case_insensitive() {
        let (store, registry) = blog().await;
        let post = registry.resolve("Post").unwrap();
        let spec = QuerySpec::from_params(&post, &params(&[("search", "RUST")])).unwrap();
        let planned = QueryPlanner::plan(&post, &spec, registry.settings()).unwrap();
        let records = QueryPlanner::execute(store.as_ref(), &registry, &post, &planned).await.unwrap();
        assert_eq!(records.total(), 2);
    }

    #[tokio::test]
    async fn relations_are_populated_in_batches() {
        let (store, registry) = blog().await;
        let post = registry.resolve("Post").unwrap();
        let spec = QuerySpec::from_params(&post, &params(&[("include", "author,tags")])).unwrap();
        let planned = QueryPlanner::plan(&post, &spec, registry.settings()).unwrap();
        let rows: Vec<RecordPayload> = QueryPlanner::execute(store.as_ref(), &registry, &post, &planned)
            .await
            .unwrap()
            .collect();
        assert_eq!(rows[0]["author"]["name"], json!("Ada"));
        assert_eq!(rows[3]["author"], Value::Null);
        assert_eq!(rows[0]["tags"].as_array().unwrap().len(), 2);
        assert_eq!(rows[1]["tags"], json!([]));

        let user = registry.resolve("User").unwrap();
        let ada = QueryPlanner::fetch_one(store.as_ref(), &registry, &user, &json!(1), &user.schema.relations)
            .await
            .unwrap();
        let titles: Vec<&Value> = ada["posts"].as_array().unwrap().iter().map(|p| &p["title"]).collect();
        assert_eq!(titles, [&json!("Rust ownership"), &json!("Rust async")]);

        let missing = QueryPlanner::fetch_one(store.as_ref(), &registry, &user, &json!(99), &[]).await;
        assert!(matches!(missing, Err(AppError::NotFound { .. })));
    }
}
