//! Route resolution, authorization and execution shared by UI and API mode.
//! Only the final representation of an `Outcome` differs between the two.

use crate::auth::{Caller, Operation};
use crate::config::{Registry, RelationDescriptor, ResourceConfig};
use crate::error::AppError;
use crate::service::validation::{coerce_form, parse_id, untick_checkboxes};
use crate::service::{MutationExecutor, PageInfo, QueryPlanner, QuerySpec, RecordPayload, ResolvedQuery};
use crate::store::Store;
use axum::http::Method;
use serde_json::Value;
use std::sync::Arc;

/// Which HTTP surface a request arrived on.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Surface {
    Ui,
    Api,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RouteAction {
    Index,
    List,
    Show,
    CreateForm,
    EditForm,
    DeleteConfirm,
    Create,
    Update,
    Delete,
    DeleteMany,
}

impl RouteAction {
    /// Capability the action needs; `None` for the index.
    pub fn operation(&self) -> Option<Operation> {
        match self {
            RouteAction::Index => None,
            RouteAction::List => Some(Operation::List),
            RouteAction::Show => Some(Operation::Show),
            RouteAction::CreateForm | RouteAction::Create => Some(Operation::Create),
            RouteAction::EditForm | RouteAction::Update => Some(Operation::Update),
            RouteAction::DeleteConfirm | RouteAction::Delete | RouteAction::DeleteMany => Some(Operation::Delete),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Route {
    pub resource: Option<String>,
    pub action: RouteAction,
    /// Raw id segment as it appeared in the path.
    pub id: Option<String>,
}

impl Route {
    fn index() -> Self {
        Route {
            resource: None,
            action: RouteAction::Index,
            id: None,
        }
    }
}

/// Map `(verb, segments)` to a route. Unknown resources are reported before
/// anything else about the request is looked at.
pub fn resolve_route(registry: &Registry, surface: Surface, method: &Method, segments: &[&str]) -> Result<Route, AppError> {
    let unsupported = || AppError::UnsupportedAction(format!("{} /{}", method, segments.join("/")));
    let Some((resource, rest)) = segments.split_first() else {
        return match method.as_str() {
            "GET" => Ok(Route::index()),
            _ => Err(unsupported()),
        };
    };
    if !registry.contains(resource) {
        return Err(AppError::ResourceNotFound(resource.to_string()));
    }
    let ui = surface == Surface::Ui;
    let (action, id) = match (rest, method.as_str()) {
        ([], "GET") => (RouteAction::List, None),
        ([], "POST") => (RouteAction::Create, None),
        ([], "DELETE") if !ui => (RouteAction::DeleteMany, None),
        (["new"], "GET") if ui => (RouteAction::CreateForm, None),
        (["new"], "POST") => (RouteAction::Create, None),
        (["new"], _) => return Err(unsupported()),
        ([id], "GET") => (RouteAction::Show, Some(*id)),
        ([id], "POST" | "PATCH" | "PUT") => (RouteAction::Update, Some(*id)),
        ([id], "DELETE") => (RouteAction::Delete, Some(*id)),
        ([id, "edit"], "GET") if ui => (RouteAction::EditForm, Some(*id)),
        ([id, "edit"], "POST") => (RouteAction::Update, Some(*id)),
        ([id, "delete"], "GET") if ui => (RouteAction::DeleteConfirm, Some(*id)),
        ([id, "delete"], "POST") => (RouteAction::Delete, Some(*id)),
        _ => return Err(unsupported()),
    };
    Ok(Route {
        resource: Some(resource.to_string()),
        action,
        id: id.map(str::to_string),
    })
}

/// Operations switched off in options are unsupported; everything else the
/// caller may not do is `Forbidden`, which the boundary reports as not found.
pub fn authorize(
    registry: &Registry,
    caller: &Caller,
    config: &ResourceConfig,
    operation: Operation,
    id: Option<&str>,
) -> Result<(), AppError> {
    if !config.allows(operation) {
        return Err(AppError::UnsupportedAction(format!(
            "{} is not enabled for {}",
            operation.as_str(),
            config.name
        )));
    }
    if !registry.can_act(caller, config, operation) {
        return Err(AppError::Forbidden {
            resource: config.name.clone(),
            operation: operation.as_str(),
            id: id.map(str::to_string),
        });
    }
    Ok(())
}

/// Request body as received. Malformed bodies are only reported once the
/// route is authorized.
#[derive(Clone, Debug, Default, PartialEq)]
pub enum Input {
    #[default]
    Empty,
    Json(Value),
    Form(Vec<(String, String)>),
    Malformed(String),
}

impl Input {
    pub fn from_body(content_type: Option<&str>, body: &[u8]) -> Self {
        if body.iter().all(u8::is_ascii_whitespace) {
            return Input::Empty;
        }
        let form = content_type.is_some_and(|ct| ct.starts_with("application/x-www-form-urlencoded"));
        if form {
            serde_urlencoded::from_bytes(body)
                .map(Input::Form)
                .unwrap_or_else(|e| Input::Malformed(format!("form body: {}", e)))
        } else {
            serde_json::from_slice(body)
                .map(Input::Json)
                .unwrap_or_else(|e| Input::Malformed(format!("JSON body: {}", e)))
        }
    }
}

/// Field values of a create/update body. Form bodies on the UI surface come
/// from the rendered form, so unticked checkboxes there mean `false`; an API
/// form body is taken as given.
pub fn read_payload(config: &ResourceConfig, surface: Surface, input: Input) -> Result<RecordPayload, AppError> {
    match input {
        Input::Empty => Ok(RecordPayload::new()),
        Input::Json(Value::Object(map)) => Ok(map),
        Input::Json(_) => Err(AppError::BadRequest("body must be a JSON object".into())),
        Input::Form(pairs) => {
            let mut payload = coerce_form(config, pairs);
            if surface == Surface::Ui {
                untick_checkboxes(config, &mut payload);
            }
            Ok(payload)
        }
        Input::Malformed(reason) => Err(AppError::BadRequest(reason)),
    }
}

/// Ids of a bulk delete body: `{"ids": [...]}`. Ids that cannot exist are dropped.
fn read_ids(config: &ResourceConfig, input: Input) -> Result<Vec<Value>, AppError> {
    let ids = match input {
        Input::Json(Value::Object(mut map)) => match map.remove("ids") {
            Some(Value::Array(ids)) => ids,
            _ => return Err(AppError::BadRequest("expected {\"ids\": [...]}".into())),
        },
        Input::Form(pairs) => pairs
            .into_iter()
            .filter(|(k, _)| k == "ids" || k == "ids[]")
            .map(|(_, v)| Value::String(v))
            .collect(),
        Input::Malformed(reason) => return Err(AppError::BadRequest(reason)),
        _ => return Err(AppError::BadRequest("expected {\"ids\": [...]}".into())),
    };
    Ok(ids
        .into_iter()
        .filter_map(|id| match id {
            Value::String(raw) => parse_id(config, &raw),
            Value::Null => None,
            other => Some(other),
        })
        .collect())
}

#[derive(Debug)]
pub enum Outcome {
    /// Resources the caller may list, in catalog order.
    Index(Vec<Arc<ResourceConfig>>),
    List {
        config: Arc<ResourceConfig>,
        records: Vec<RecordPayload>,
        page: PageInfo,
        query: ResolvedQuery,
    },
    /// A stored record (show, edit form, delete confirmation).
    Record {
        config: Arc<ResourceConfig>,
        record: RecordPayload,
    },
    /// Blank create form.
    Form { config: Arc<ResourceConfig> },
    Created {
        config: Arc<ResourceConfig>,
        record: RecordPayload,
    },
    Updated {
        config: Arc<ResourceConfig>,
        record: RecordPayload,
    },
    Deleted {
        config: Arc<ResourceConfig>,
        id: Value,
    },
    DeletedMany {
        config: Arc<ResourceConfig>,
        count: u64,
    },
}

/// Everything a dispatch needs besides the request itself.
pub struct DispatchContext<'a> {
    pub registry: &'a Registry,
    pub store: &'a dyn Store,
    pub caller: &'a Caller,
    pub surface: Surface,
}

impl<'a> DispatchContext<'a> {
    fn can_list(&self, resource: &str) -> Result<bool, AppError> {
        let target = self.registry.resolve(resource)?;
        Ok(self.registry.can_act(self.caller, &target, Operation::List))
    }

    /// Explicitly requested relations must point at listable resources.
    fn check_includes(&self, config: &ResourceConfig, names: &[String]) -> Result<(), AppError> {
        for rel in names.iter().filter_map(|n| config.schema.relation(n)) {
            if !self.can_list(&rel.target)? {
                return Err(AppError::Forbidden {
                    resource: rel.target.clone(),
                    operation: Operation::List.as_str(),
                    id: None,
                });
            }
        }
        Ok(())
    }

    /// Relations shown on a UI record page: all whose target the caller may list.
    fn visible_relations(&self, config: &ResourceConfig) -> Result<Vec<RelationDescriptor>, AppError> {
        let mut out = Vec::new();
        for rel in &config.schema.relations {
            if self.can_list(&rel.target)? {
                out.push(rel.clone());
            }
        }
        Ok(out)
    }

    /// Relations requested with `include=` on an API record request.
    fn requested_relations(
        &self,
        config: &ResourceConfig,
        params: &[(String, String)],
    ) -> Result<Vec<RelationDescriptor>, AppError> {
        let names: Vec<String> = params
            .iter()
            .filter(|(k, _)| k == "include")
            .flat_map(|(_, v)| v.split(',').map(str::trim).filter(|s| !s.is_empty()).map(str::to_string))
            .collect();
        self.check_includes(config, &names)?;
        names
            .iter()
            .map(|n| {
                config
                    .schema
                    .relation(n)
                    .cloned()
                    .ok_or_else(|| AppError::InvalidQuery(format!("unknown relation '{}' on {}", n, config.name)))
            })
            .collect()
    }

    async fn list(&self, config: Arc<ResourceConfig>, params: &[(String, String)]) -> Result<Outcome, AppError> {
        let mut spec = QuerySpec::from_params(&config, params)?;
        self.check_includes(&config, &spec.include)?;
        if self.surface == Surface::Ui {
            for name in &config.list_fields {
                let Some(rel) = config.schema.relation(name) else { continue };
                if !spec.include.contains(name) && self.can_list(&rel.target)? {
                    spec.include.push(name.clone());
                }
            }
        }
        let query = QueryPlanner::plan(&config, &spec, self.registry.settings())?;
        let records = QueryPlanner::execute(self.store, self.registry, &config, &query).await?;
        let page = PageInfo::new(&query, records.total());
        Ok(Outcome::List {
            records: records.collect(),
            config,
            page,
            query,
        })
    }
}

/// Authorize and execute `route`. Nothing touches the store before the
/// resource is known and the caller is allowed the route's operation.
pub async fn dispatch(
    cx: &DispatchContext<'_>,
    route: &Route,
    params: &[(String, String)],
    input: Input,
) -> Result<Outcome, AppError> {
    let (Some(resource), Some(operation)) = (route.resource.as_deref(), route.action.operation()) else {
        let visible = cx
            .registry
            .configs()
            .filter(|c| cx.registry.can_act(cx.caller, c, Operation::List))
            .cloned()
            .collect();
        return Ok(Outcome::Index(visible));
    };
    let config = cx.registry.resolve(resource)?;
    authorize(cx.registry, cx.caller, &config, operation, route.id.as_deref())?;
    let id = match route.id.as_deref() {
        Some(raw) => Some(parse_id(&config, raw).ok_or_else(|| AppError::not_found(&config.name, raw))?),
        None => None,
    };

    match (route.action, id) {
        (RouteAction::List, _) => cx.list(config, params).await,
        (RouteAction::Show | RouteAction::EditForm, Some(id)) => {
            let includes = match cx.surface {
                Surface::Ui => cx.visible_relations(&config)?,
                Surface::Api => cx.requested_relations(&config, params)?,
            };
            let record = QueryPlanner::fetch_one(cx.store, cx.registry, &config, &id, &includes).await?;
            Ok(Outcome::Record { config, record })
        }
        (RouteAction::DeleteConfirm, Some(id)) => {
            let record = QueryPlanner::fetch_one(cx.store, cx.registry, &config, &id, &[]).await?;
            Ok(Outcome::Record { config, record })
        }
        (RouteAction::CreateForm, _) => Ok(Outcome::Form { config }),
        (RouteAction::Create, _) => {
            let payload = read_payload(&config, cx.surface, input)?;
            let record = MutationExecutor::create(cx.store, &config, payload).await?;
            Ok(Outcome::Created { config, record })
        }
        (RouteAction::Update, Some(id)) => {
            let changes = read_payload(&config, cx.surface, input)?;
            let record = MutationExecutor::update(cx.store, &config, &id, changes).await?;
            Ok(Outcome::Updated { config, record })
        }
        (RouteAction::Delete, Some(id)) => {
            MutationExecutor::delete(cx.store, &config, &id).await?;
            Ok(Outcome::Deleted { config, id })
        }
        (RouteAction::DeleteMany, _) => {
            let ids = read_ids(&config, input)?;
            let count = MutationExecutor::delete_many(cx.store, &config, &ids).await?;
            Ok(Outcome::DeletedMany { config, count })
        }
        (action, _) => Err(AppError::UnsupportedAction(format!("{:?} needs a record id", action))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{AdminOptions, ResourceOptions, SchemaDocument};
    use crate::settings::AdminSettings;
    use crate::store::MemoryStore;
    use rstest::rstest;
    use serde_json::json;

    fn registry() -> Registry {
        let doc: SchemaDocument = serde_json::from_value(json!({ "resources": [
            { "name": "User", "fields": [
                { "name": "id", "kind": "number", "generated": true, "default": "autoincrement" },
                { "name": "name", "kind": "string" }
              ] },
            { "name": "Post", "fields": [
                { "name": "id", "kind": "number", "generated": true, "default": "autoincrement" },
                { "name": "title", "kind": "string" },
                { "name": "authorId", "kind": "number", "nullable": true }
              ],
              "relations": [ { "name": "author", "target": "User", "cardinality": "one_to_one", "foreign_key": "authorId" } ] }
        ]}))
        .unwrap();
        Registry::from_document(
            &doc,
            AdminOptions::new()
                .resource("Post", ResourceOptions::new().list_fields(&["title", "author"]))
                .resource(
                    "User",
                    ResourceOptions::new().permission(|caller, _, _| caller.has_role("admin")),
                ),
            AdminSettings::default(),
        )
        .unwrap()
    }

    fn route(resource: &str, action: RouteAction, id: Option<&str>) -> Route {
        Route {
            resource: Some(resource.into()),
            action,
            id: id.map(str::to_string),
        }
    }

    #[rstest]
    #[case(Surface::Ui, "GET", &[], Route::index())]
    #[case(Surface::Ui, "GET", &["Post"], route("Post", RouteAction::List, None))]
    #[case(Surface::Api, "POST", &["Post"], route("Post", RouteAction::Create, None))]
    #[case(Surface::Api, "DELETE", &["Post"], route("Post", RouteAction::DeleteMany, None))]
    #[case(Surface::Ui, "GET", &["Post", "new"], route("Post", RouteAction::CreateForm, None))]
    #[case(Surface::Ui, "POST", &["Post", "new"], route("Post", RouteAction::Create, None))]
    #[case(Surface::Api, "GET", &["Post", "7"], route("Post", RouteAction::Show, Some("7")))]
    #[case(Surface::Api, "PATCH", &["Post", "7"], route("Post", RouteAction::Update, Some("7")))]
    #[case(Surface::Api, "PUT", &["Post", "7"], route("Post", RouteAction::Update, Some("7")))]
    #[case(Surface::Ui, "POST", &["Post", "7"], route("Post", RouteAction::Update, Some("7")))]
    #[case(Surface::Api, "DELETE", &["Post", "7"], route("Post", RouteAction::Delete, Some("7")))]
    #[case(Surface::Ui, "GET", &["Post", "7", "edit"], route("Post", RouteAction::EditForm, Some("7")))]
    #[case(Surface::Ui, "POST", &["Post", "7", "edit"], route("Post", RouteAction::Update, Some("7")))]
    #[case(Surface::Ui, "GET", &["Post", "7", "delete"], route("Post", RouteAction::DeleteConfirm, Some("7")))]
    #[case(Surface::Ui, "POST", &["Post", "7", "delete"], route("Post", RouteAction::Delete, Some("7")))]
    fn route_table(#[case] surface: Surface, #[case] method: &str, #[case] segments: &[&str], #[case] expected: Route) {
        let method = Method::from_bytes(method.as_bytes()).unwrap();
        assert_eq!(resolve_route(&registry(), surface, &method, segments).unwrap(), expected);
    }

    #[rstest]
    #[case(Surface::Ui, "DELETE", &["Post"])]
    #[case(Surface::Api, "GET", &["Post", "new"])]
    #[case(Surface::Api, "GET", &["Post", "7", "edit"])]
    #[case(Surface::Ui, "GET", &["Post", "7", "export"])]
    #[case(Surface::Ui, "POST", &[])]
    fn unmatched_shapes_are_unsupported(#[case] surface: Surface, #[case] method: &str, #[case] segments: &[&str]) {
        let method = Method::from_bytes(method.as_bytes()).unwrap();
        let err = resolve_route(&registry(), surface, &method, segments).unwrap_err();
        assert!(matches!(err, AppError::UnsupportedAction(_)), "{:?}", err);
    }

    #[test]
    fn unknown_resource_is_reported_first() {
        let err = resolve_route(&registry(), Surface::Ui, &Method::GET, &["Ghost", "1", "export"]).unwrap_err();
        assert!(matches!(err, AppError::ResourceNotFound(ref r) if r == "Ghost"));
    }

    #[tokio::test]
    async fn denied_show_looks_like_missing_record() {
        let registry = registry();
        let store = MemoryStore::new();
        let caller = Caller::anonymous();
        let cx = DispatchContext {
            registry: &registry,
            store: &store,
            caller: &caller,
            surface: Surface::Api,
        };
        let err = dispatch(&cx, &route("User", RouteAction::Show, Some("1")), &[], Input::Empty)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Forbidden { .. }));
        assert_eq!(err.public_parts(), AppError::not_found("User", "1").public_parts());
    }

    #[tokio::test]
    async fn list_includes_follow_permissions() {
        let registry = registry();
        let store = MemoryStore::new();
        let user = registry.resolve("User").unwrap();
        let post = registry.resolve("Post").unwrap();
        store
            .create(&user.schema, json!({ "name": "Ada" }).as_object().unwrap().clone())
            .await
            .unwrap();
        store
            .create(&post.schema, json!({ "title": "Hi", "authorId": 1 }).as_object().unwrap().clone())
            .await
            .unwrap();

        let anon = Caller::anonymous();
        let mut cx = DispatchContext {
            registry: &registry,
            store: &store,
            caller: &anon,
            surface: Surface::Api,
        };
        let params = vec![("include".to_string(), "author".to_string())];
        let err = dispatch(&cx, &route("Post", RouteAction::List, None), &params, Input::Empty)
            .await
            .unwrap_err();
        assert_eq!(err.public_parts(), AppError::ResourceNotFound("User".into()).public_parts());

        // UI lists silently leave out relations the caller cannot see.
        cx.surface = Surface::Ui;
        let Outcome::List { records, .. } = dispatch(&cx, &route("Post", RouteAction::List, None), &[], Input::Empty)
            .await
            .unwrap()
        else {
            panic!("expected list outcome")
        };
        assert!(records[0].get("author").is_none());

        let admin = Caller::with_roles("root", &["admin"]);
        cx.caller = &admin;
        let Outcome::List { records, page, .. } =
            dispatch(&cx, &route("Post", RouteAction::List, None), &[], Input::Empty)
                .await
                .unwrap()
        else {
            panic!("expected list outcome")
        };
        assert_eq!(page.total, 1);
        assert_eq!(records[0]["author"]["name"], json!("Ada"));
    }

    #[tokio::test]
    async fn form_bodies_and_bulk_delete() {
        let registry = registry();
        let store = MemoryStore::new();
        let caller = Caller::anonymous();
        let cx = DispatchContext {
            registry: &registry,
            store: &store,
            caller: &caller,
            surface: Surface::Ui,
        };
        let body = Input::from_body(Some("application/x-www-form-urlencoded"), b"title=Hello&authorId=");
        let Outcome::Created { record, .. } = dispatch(&cx, &route("Post", RouteAction::Create, None), &[], body)
            .await
            .unwrap()
        else {
            panic!("expected created outcome")
        };
        assert_eq!(record["title"], json!("Hello"));
        assert_eq!(record["authorId"], Value::Null);

        let not_a_number = dispatch(&cx, &route("Post", RouteAction::Show, Some("abc")), &[], Input::Empty)
            .await
            .unwrap_err();
        assert!(matches!(not_a_number, AppError::NotFound { .. }));

        let api = DispatchContext { surface: Surface::Api, ..cx };
        let ids = Input::Json(json!({ "ids": [1, "2", 99] }));
        let Outcome::DeletedMany { count, .. } = dispatch(&api, &route("Post", RouteAction::DeleteMany, None), &[], ids)
            .await
            .unwrap()
        else {
            panic!("expected bulk delete outcome")
        };
        assert_eq!(count, 1);
    }
}
