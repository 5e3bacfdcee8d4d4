#![allow(dead_code)]

use architect_admin::{
    admin_app, AdminOptions, AdminSettings, AppState, MemoryStore, MessageCatalog, Operation, Registry,
    ResourceOptions, SchemaDocument, Store,
};
use axum::{
    body::{to_bytes, Body},
    http::{header, Request, StatusCode},
    Router,
};
use serde_json::{json, Value};
use std::sync::Arc;
use tower::ServiceExt;

pub fn blog_schema() -> SchemaDocument {
    serde_json::from_value(json!({ "resources": [
        { "name": "User", "fields": [
            { "name": "id", "kind": "number", "generated": true, "default": "autoincrement" },
            { "name": "name", "kind": "string" },
            { "name": "email", "kind": "string" }
          ],
          "relations": [ { "name": "posts", "target": "Post", "cardinality": "one_to_many", "foreign_key": "authorId" } ] },
        { "name": "Post", "fields": [
            { "name": "id", "kind": "number", "generated": true, "default": "autoincrement" },
            { "name": "title", "kind": "string" },
            { "name": "body", "kind": "string", "nullable": true },
            { "name": "published", "kind": "boolean", "default": false },
            { "name": "views", "kind": "number", "default": 0 },
            { "name": "authorId", "kind": "number", "nullable": true }
          ],
          "relations": [ { "name": "author", "target": "User", "cardinality": "one_to_one", "foreign_key": "authorId" } ] },
        { "name": "Audit", "fields": [
            { "name": "id", "kind": "number", "generated": true, "default": "autoincrement" },
            { "name": "event", "kind": "string" }
          ] }
    ]}))
    .unwrap()
}

/// Post is open to everyone; User writes need `admin`; Audit is visible to
/// `auditor` only and cannot be edited at all.
pub fn blog_options() -> AdminOptions {
    AdminOptions::new()
        .resource(
            "Post",
            ResourceOptions::new()
                .list_fields(&["title", "author", "views"])
                .sortable(&["title", "views"])
                .searchable(&["title", "body", "published"])
                .alias("views", "Hits"),
        )
        .resource(
            "User",
            ResourceOptions::new().permission(|caller, _, op| {
                matches!(op, Operation::List | Operation::Show) || caller.has_role("admin")
            }),
        )
        .resource(
            "Audit",
            ResourceOptions::new()
                .operations(&[Operation::List, Operation::Show])
                .permission(|caller, _, _| caller.has_role("auditor")),
        )
        .sidebar_group("Content", &["Post"])
}

pub struct TestApp {
    pub router: Router,
    pub store: Arc<MemoryStore>,
    pub registry: Arc<Registry>,
}

pub fn app() -> TestApp {
    let registry = Registry::from_document(&blog_schema(), blog_options(), AdminSettings::default()).unwrap();
    let store = Arc::new(MemoryStore::new());
    let messages = MessageCatalog::new("en")
        .with_messages("en", [("model.Post.name", "Posts")])
        .with_messages("fr", [("model.Post.name", "Articles"), ("nav.home", "Accueil")]);
    let state = AppState::new(registry, store.clone()).with_messages(messages);
    TestApp {
        registry: state.registry.clone(),
        router: admin_app(state),
        store,
    }
}

impl TestApp {
    /// Insert rows straight through the store.
    pub async fn seed(&self, resource: &str, rows: Vec<Value>) {
        let config = self.registry.resolve(resource).unwrap();
        for row in rows {
            self.store
                .create(&config.schema, row.as_object().unwrap().clone())
                .await
                .unwrap();
        }
    }

    pub async fn send(&self, request: Request<Body>) -> Reply {
        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let location = response
            .headers()
            .get(header::LOCATION)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let json = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        Reply { status, location, json }
    }

    pub async fn get(&self, uri: &str) -> Reply {
        self.send(request("GET", uri, &[], Body::empty())).await
    }

    pub async fn get_as(&self, uri: &str, roles: &str) -> Reply {
        self.send(request("GET", uri, &[("X-Admin-User", "tester"), ("X-Admin-Roles", roles)], Body::empty()))
            .await
    }

    pub async fn json(&self, method: &str, uri: &str, body: Value) -> Reply {
        self.send(request(
            method,
            uri,
            &[("content-type", "application/json")],
            Body::from(body.to_string()),
        ))
        .await
    }

    pub async fn form(&self, uri: &str, body: &str) -> Reply {
        self.send(request(
            "POST",
            uri,
            &[("content-type", "application/x-www-form-urlencoded")],
            Body::from(body.to_string()),
        ))
        .await
    }
}

pub fn request(method: &str, uri: &str, headers: &[(&str, &str)], body: Body) -> Request<Body> {
    let mut builder = Request::builder().method(method).uri(uri);
    for (k, v) in headers {
        builder = builder.header(*k, *v);
    }
    builder.body(body).unwrap()
}

#[derive(Debug)]
pub struct Reply {
    pub status: StatusCode,
    pub location: Option<String>,
    pub json: Value,
}
