mod common;

use axum::http::StatusCode;
use common::app;
use serde_json::{json, Value};

fn ids(reply: &Value) -> Vec<i64> {
    reply["data"]
        .as_array()
        .unwrap()
        .iter()
        .map(|r| r["id"].as_i64().unwrap())
        .collect()
}

async fn seeded() -> common::TestApp {
    let app = app();
    app.seed("User", vec![json!({ "name": "Ada", "email": "ada@example.com" })]).await;
    app.seed(
        "Post",
        vec![
            json!({ "title": "Alpha", "views": 5, "authorId": 1 }),
            json!({ "title": "Beta rust", "views": 9, "published": true }),
            json!({ "title": "Gamma Rust", "views": 5, "body": "more rust" }),
        ],
    )
    .await;
    app
}

#[tokio::test]
async fn list_envelope_carries_page_info() {
    let app = seeded().await;
    let reply = app.get("/api/admin/Post?sort=-views&limit=2").await;
    assert_eq!(reply.status, StatusCode::OK);
    assert_eq!(ids(&reply.json), [2, 1]);
    assert_eq!(reply.json["meta"]["total"], 3);
    assert_eq!(reply.json["meta"]["pages"], 2);

    let next = app.get("/api/admin/Post?sort=-views&limit=2&page=2").await;
    assert_eq!(ids(&next.json), [3]);
    assert_eq!(next.json["meta"]["page"], 2);

    // Same spec, same page.
    let again = app.get("/api/admin/Post?sort=-views&limit=2").await;
    assert_eq!(ids(&again.json), [2, 1]);
}

#[tokio::test]
async fn search_and_filters() {
    let app = seeded().await;
    let reply = app.get("/api/admin/Post?search=RUST").await;
    assert_eq!(ids(&reply.json), [2, 3]);

    let reply = app.get("/api/admin/Post?published=true").await;
    assert_eq!(ids(&reply.json), [2]);

    let reply = app.get("/api/admin/Post?published=true&published=false").await;
    assert_eq!(reply.json["meta"]["total"], 3);
}

#[tokio::test]
async fn invalid_queries_are_rejected() {
    let app = seeded().await;
    for uri in [
        "/api/admin/Post?sort=unknownField",
        "/api/admin/Post?unknownField=1",
        "/api/admin/Post?views=5",
        "/api/admin/Post?limit=0",
        "/api/admin/Post?page=0",
        "/api/admin/Post?order=sideways&sort=title",
        "/api/admin/Post?include=comments",
        "/api/admin/Post?published=maybe",
    ] {
        let reply = app.get(uri).await;
        assert_eq!(reply.status, StatusCode::BAD_REQUEST, "{}", uri);
        assert_eq!(reply.json["error"]["code"], "invalid_query", "{}", uri);
    }
}

#[tokio::test]
async fn show_with_included_relation() {
    let app = seeded().await;
    let reply = app.get("/api/admin/Post/1?include=author").await;
    assert_eq!(reply.status, StatusCode::OK);
    assert_eq!(reply.json["data"]["author"]["name"], "Ada");

    let reply = app.get("/api/admin/User/1?include=posts").await;
    assert_eq!(reply.json["data"]["posts"].as_array().unwrap().len(), 1);

    let plain = app.get("/api/admin/Post/2").await;
    assert!(plain.json["data"].get("author").is_none());
}

#[tokio::test]
async fn create_update_delete() {
    let app = app();
    let created = app
        .json("POST", "/api/admin/Post", json!({ "title": "Hello", "body": "World" }))
        .await;
    assert_eq!(created.status, StatusCode::CREATED);
    let id = created.json["data"]["id"].as_i64().unwrap();
    assert_eq!(created.json["data"]["published"], false);

    let patched = app
        .json("PATCH", &format!("/api/admin/Post/{}", id), json!({ "published": true }))
        .await;
    assert_eq!(patched.status, StatusCode::OK);
    assert_eq!(patched.json["data"]["title"], "Hello");
    assert_eq!(patched.json["data"]["published"], true);

    let put = app
        .json("PUT", &format!("/api/admin/Post/{}", id), json!({ "title": "Hi" }))
        .await;
    assert_eq!(put.json["data"]["title"], "Hi");
    assert_eq!(put.json["data"]["body"], "World");

    let deleted = app.send(common::request("DELETE", &format!("/api/admin/Post/{}", id), &[], Default::default())).await;
    assert_eq!(deleted.status, StatusCode::NO_CONTENT);

    let gone = app.get(&format!("/api/admin/Post/{}", id)).await;
    assert_eq!(gone.status, StatusCode::NOT_FOUND);
    assert_eq!(gone.json["error"]["code"], "not_found");
}

#[tokio::test]
async fn form_encoded_patch_changes_only_the_given_fields() {
    let app = app();
    app.json("POST", "/api/admin/Post", json!({ "title": "A", "published": true })).await;
    let reply = app
        .send(common::request(
            "PATCH",
            "/api/admin/Post/1",
            &[("content-type", "application/x-www-form-urlencoded")],
            axum::body::Body::from("title=B"),
        ))
        .await;
    assert_eq!(reply.status, StatusCode::OK);
    assert_eq!(reply.json["data"]["title"], "B");
    assert_eq!(reply.json["data"]["published"], true);
}

#[tokio::test]
async fn validation_failures_are_422_with_every_field() {
    let app = app();
    let reply = app
        .json("POST", "/api/admin/Post", json!({ "body": "no title" }))
        .await;
    assert_eq!(reply.status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(reply.json["error"]["code"], "validation_error");
    assert_eq!(reply.json["error"]["details"]["errors"], json!({ "title": ["required"] }));

    let reply = app
        .json(
            "POST",
            "/api/admin/Post",
            json!({ "title": 7, "views": "many", "id": 3, "colour": "red" }),
        )
        .await;
    let errors = &reply.json["error"]["details"]["errors"];
    assert_eq!(errors["title"], json!(["must be a string"]));
    assert_eq!(errors["views"], json!(["must be a number"]));
    assert_eq!(errors["id"], json!(["not editable"]));
    assert_eq!(errors["colour"], json!(["unknown field"]));

    let reply = app.json("POST", "/api/admin/Post", json!(["not", "an", "object"])).await;
    assert_eq!(reply.status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn bulk_delete_counts_existing_ids() {
    let app = seeded().await;
    let reply = app.json("DELETE", "/api/admin/Post", json!({ "ids": [1, 3, 42] })).await;
    assert_eq!(reply.status, StatusCode::OK);
    assert_eq!(reply.json["data"]["deleted"], 2);
    assert_eq!(ids(&app.get("/api/admin/Post").await.json), [2]);
}

#[tokio::test]
async fn permission_denial_is_indistinguishable_from_missing() {
    let app = app();
    let denied = app.get("/api/admin/Audit/1").await;
    let missing = app.get_as("/api/admin/Audit/1", "auditor").await;
    assert_eq!(denied.status, StatusCode::NOT_FOUND);
    assert_eq!(denied.status, missing.status);
    assert_eq!(denied.json, missing.json);

    let denied_list = app.get("/api/admin/Audit").await;
    assert_eq!(denied_list.status, StatusCode::NOT_FOUND);
    assert_eq!(denied_list.json["error"]["message"], "resource not found: Audit");

    let unknown = app.get("/api/admin/Nope").await;
    assert_eq!(unknown.json["error"]["message"], "resource not found: Nope");

    let user_write = app.json("POST", "/api/admin/User", json!({ "name": "Eve", "email": "e@x.io" })).await;
    assert_eq!(user_write.status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn disabled_operations_are_unsupported() {
    let app = app();
    let reply = app
        .send(common::request(
            "POST",
            "/api/admin/Audit",
            &[("content-type", "application/json"), ("X-Admin-Roles", "auditor")],
            axum::body::Body::from(r#"{"event":"x"}"#),
        ))
        .await;
    assert_eq!(reply.status, StatusCode::METHOD_NOT_ALLOWED);
    assert_eq!(reply.json["error"]["code"], "unsupported_action");
}

#[tokio::test]
async fn index_lists_visible_resources() {
    let app = app();
    let reply = app.get("/api/admin").await;
    let names: Vec<&str> = reply.json["data"]
        .as_array()
        .unwrap()
        .iter()
        .map(|r| r["name"].as_str().unwrap())
        .collect();
    assert_eq!(names, ["User", "Post"]);
    assert_eq!(reply.json["data"][0]["operations"], json!(["list", "show"]));
}

#[tokio::test]
async fn health_ready_version() {
    let app = app();
    assert_eq!(app.get("/health").await.json, json!({ "status": "ok" }));
    let ready = app.get("/ready").await;
    assert_eq!(ready.status, StatusCode::OK);
    assert_eq!(ready.json["resources"], 3);
    assert_eq!(app.get("/version").await.json["name"], "architect-admin");
}
