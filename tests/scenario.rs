//! The Post walkthrough: `Post { id, title: string (required), body: string }`.

use architect_admin::{
    AdminOptions, AdminSettings, AppError, MemoryStore, MutationExecutor, QueryPlanner, QuerySpec, RecordPayload,
    Registry, SchemaDocument, Store,
};
use serde_json::{json, Value};
use std::sync::Arc;

fn registry() -> Registry {
    let doc: SchemaDocument = serde_json::from_value(json!({ "resources": [
        { "name": "Post", "fields": [
            { "name": "id", "kind": "number", "generated": true, "default": "autoincrement" },
            { "name": "title", "kind": "string" },
            { "name": "body", "kind": "string", "nullable": true }
        ] }
    ]}))
    .unwrap();
    Registry::from_document(&doc, AdminOptions::new(), AdminSettings::default()).unwrap()
}

fn payload(v: Value) -> RecordPayload {
    v.as_object().unwrap().clone()
}

#[tokio::test]
async fn post_walkthrough() {
    let registry = registry();
    let store = MemoryStore::new();
    let post = registry.resolve("Post").unwrap();

    match MutationExecutor::create(&store, &post, payload(json!({ "body": "x" }))).await {
        Err(AppError::Validation(failure)) => {
            assert_eq!(failure.errors.len(), 1);
            assert_eq!(failure.errors["title"], ["required"]);
        }
        other => panic!("expected validation failure, got {:?}", other),
    }

    let created = MutationExecutor::create(&store, &post, payload(json!({ "title": "Hello", "body": "World" })))
        .await
        .unwrap();
    let id = created["id"].clone();
    assert!(id.is_number());
    let stored = store.find_by_id(&post.schema, &id).await.unwrap().unwrap();
    assert_eq!(stored["title"], "Hello");
    assert_eq!(stored["body"], "World");

    let updated = MutationExecutor::update(&store, &post, &id, payload(json!({ "body": "Again" })))
        .await
        .unwrap();
    assert_eq!(updated["title"], "Hello");
    assert_eq!(updated["body"], "Again");

    let missing = MutationExecutor::delete(&store, &post, &json!(9999)).await;
    assert!(matches!(missing, Err(AppError::NotFound { .. })));

    let params = vec![("sort".to_string(), "unknownField".to_string())];
    let spec = QuerySpec::from_params(&post, &params).unwrap();
    let planned = QueryPlanner::plan(&post, &spec, registry.settings());
    assert!(matches!(planned, Err(AppError::InvalidQuery(_))));
}

#[tokio::test]
async fn resolution_is_memoized() {
    let registry = registry();
    let first = registry.resolve("Post").unwrap();
    let second = registry.resolve("Post").unwrap();
    assert!(Arc::ptr_eq(&first, &second));
    assert_eq!(first.list_fields, second.list_fields);
    assert_eq!(first.validator_names(), second.validator_names());
    assert!(matches!(registry.resolve("Comment"), Err(AppError::ResourceNotFound(_))));
}

#[tokio::test]
async fn identical_specs_page_identically() {
    let registry = registry();
    let store = MemoryStore::new();
    let post = registry.resolve("Post").unwrap();
    for title in ["b", "a", "b", "c", "a"] {
        MutationExecutor::create(&store, &post, payload(json!({ "title": title })))
            .await
            .unwrap();
    }
    let params = vec![
        ("sort".to_string(), "title".to_string()),
        ("limit".to_string(), "2".to_string()),
        ("page".to_string(), "2".to_string()),
    ];
    let mut pages = Vec::new();
    for _ in 0..2 {
        let spec = QuerySpec::from_params(&post, &params).unwrap();
        let query = QueryPlanner::plan(&post, &spec, registry.settings()).unwrap();
        let records = QueryPlanner::execute(&store, &registry, &post, &query).await.unwrap();
        assert_eq!(records.total(), 5);
        pages.push(records.map(|r| r["id"].clone()).collect::<Vec<_>>());
    }
    // a(2), a(5), b(1), b(3), c(4): the second page is b(1), b(3).
    assert_eq!(pages[0], vec![json!(1), json!(3)]);
    assert_eq!(pages[0], pages[1]);
}
