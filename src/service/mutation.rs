//! Validated writes: create, update, delete and bulk delete.

use crate::config::{display_scalar, ResourceConfig};
use crate::error::AppError;
use crate::service::validation::{Mode, RequestValidator};
use crate::service::RecordPayload;
use crate::store::Store;
use serde_json::Value;

pub struct MutationExecutor;

impl MutationExecutor {
    /// Validate, insert, and return the stored record as re-read by id.
    pub async fn create(store: &dyn Store, config: &ResourceConfig, payload: RecordPayload) -> Result<RecordPayload, AppError> {
        RequestValidator::required(config, &payload).into_result()?;
        RequestValidator::fields(config, &payload, Mode::Create).into_result()?;
        RequestValidator::custom(config, &payload).into_result()?;

        let schema = &config.schema;
        let created = store
            .create(schema, payload)
            .await
            .map_err(|e| AppError::from_store(e, &config.name, None))?;
        let id = created.get(config.primary_key()).cloned().unwrap_or(Value::Null);
        let stored = reread(store, config, &id).await?;
        tracing::info!(resource = %config.name, id = %display_scalar(&id), "record created");
        Ok(stored)
    }

    /// Partial update. Validators see the stored record merged with `changes`.
    pub async fn update(
        store: &dyn Store,
        config: &ResourceConfig,
        id: &Value,
        changes: RecordPayload,
    ) -> Result<RecordPayload, AppError> {
        let schema = &config.schema;
        let id_text = display_scalar(id);
        let existing = store
            .find_by_id(schema, id)
            .await
            .map_err(|e| AppError::from_store(e, &config.name, Some(&id_text)))?
            .ok_or_else(|| AppError::not_found(&config.name, &id_text))?;

        RequestValidator::fields(config, &changes, Mode::Update).into_result()?;
        let mut merged = existing;
        merged.extend(changes.iter().map(|(k, v)| (k.clone(), v.clone())));
        RequestValidator::custom(config, &merged).into_result()?;

        store
            .update(schema, id, changes)
            .await
            .map_err(|e| AppError::from_store(e, &config.name, Some(&id_text)))?;
        let stored = reread(store, config, id).await?;
        tracing::info!(resource = %config.name, id = %id_text, "record updated");
        Ok(stored)
    }

    pub async fn delete(store: &dyn Store, config: &ResourceConfig, id: &Value) -> Result<(), AppError> {
        let id_text = display_scalar(id);
        store
            .delete(&config.schema, id)
            .await
            .map_err(|e| AppError::from_store(e, &config.name, Some(&id_text)))?;
        tracing::info!(resource = %config.name, id = %id_text, "record deleted");
        Ok(())
    }

    /// Delete every existing id; ids that are already gone are skipped.
    pub async fn delete_many(store: &dyn Store, config: &ResourceConfig, ids: &[Value]) -> Result<u64, AppError> {
        let mut deleted = 0;
        for id in ids {
            match Self::delete(store, config, id).await {
                Ok(()) => deleted += 1,
                Err(AppError::NotFound { .. }) => {}
                Err(e) => return Err(e),
            }
        }
        tracing::info!(resource = %config.name, requested = ids.len(), deleted, "bulk delete");
        Ok(deleted)
    }
}

async fn reread(store: &dyn Store, config: &ResourceConfig, id: &Value) -> Result<RecordPayload, AppError> {
    let id_text = display_scalar(id);
    store
        .find_by_id(&config.schema, id)
        .await
        .map_err(|e| AppError::from_store(e, &config.name, Some(&id_text)))?
        .ok_or_else(|| AppError::not_found(&config.name, &id_text))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{AdminOptions, Registry, ResourceOptions, SchemaDocument, ValidationRule};
    use crate::settings::AdminSettings;
    use crate::store::MemoryStore;
    use serde_json::json;
    use std::sync::Arc;

    fn post_config(options: ResourceOptions) -> Arc<ResourceConfig> {
        let doc: SchemaDocument = serde_json::from_value(json!({ "resources": [
            { "name": "Post", "fields": [
                { "name": "id", "kind": "number", "generated": true, "default": "autoincrement" },
                { "name": "title", "kind": "string" },
                { "name": "body", "kind": "string", "nullable": true },
                { "name": "published", "kind": "boolean", "default": false },
                { "name": "updatedAt", "kind": "date", "generated": true, "auto_update": true }
            ] }
        ]}))
        .unwrap();
        let registry = Registry::from_document(
            &doc,
            AdminOptions::new().resource("Post", options),
            AdminSettings::default(),
        )
        .unwrap();
        registry.resolve("Post").unwrap()
    }

    fn payload(v: Value) -> RecordPayload {
        v.as_object().unwrap().clone()
    }

    fn failure(result: Result<RecordPayload, AppError>) -> std::collections::BTreeMap<String, Vec<String>> {
        match result {
            Err(AppError::Validation(f)) => f.errors,
            other => panic!("expected validation failure, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn missing_title_short_circuits() {
        let store = MemoryStore::new();
        let config = post_config(ResourceOptions::new());
        let errors = failure(MutationExecutor::create(&store, &config, payload(json!({ "published": "yes" }))).await);
        assert_eq!(errors.len(), 1);
        assert_eq!(errors["title"], ["required"]);
    }

    #[tokio::test]
    async fn create_round_trips_user_fields() {
        let store = MemoryStore::new();
        let config = post_config(ResourceOptions::new());
        let input = payload(json!({ "title": "Hello", "body": "World", "published": true }));
        let created = MutationExecutor::create(&store, &config, input.clone()).await.unwrap();
        assert_eq!(created["id"], json!(1));
        let stored = store.find_by_id(&config.schema, &json!(1)).await.unwrap().unwrap();
        for (k, v) in &input {
            assert_eq!(&stored[k], v);
        }
    }

    #[tokio::test]
    async fn custom_validators_run_only_after_clean_fields() {
        let store = MemoryStore::new();
        let rule = ValidationRule {
            max_length: Some(5),
            ..Default::default()
        };
        let config = post_config(
            ResourceOptions::new()
                .rule("title", rule)
                .validator("no_shouting", |r| match r.get("title").and_then(Value::as_str) {
                    Some(t) if t == t.to_uppercase() => vec![("title".into(), "no shouting".into())],
                    _ => Vec::new(),
                }),
        );
        let errors = failure(MutationExecutor::create(&store, &config, payload(json!({ "title": "TOO LONG" }))).await);
        assert_eq!(errors["title"], ["must be at most 5 characters"]);

        let errors = failure(MutationExecutor::create(&store, &config, payload(json!({ "title": "LOUD" }))).await);
        assert_eq!(errors["title"], ["no shouting"]);
    }

    #[tokio::test]
    async fn update_is_partial_and_sees_merged_record() {
        let store = MemoryStore::new();
        let config = post_config(ResourceOptions::new().validator("publish_needs_body", |r| {
            if r.get("published") == Some(&json!(true)) && r.get("body").map_or(true, Value::is_null) {
                vec![("body".into(), "required to publish".into())]
            } else {
                Vec::new()
            }
        }));
        MutationExecutor::create(&store, &config, payload(json!({ "title": "Draft" })))
            .await
            .unwrap();

        let errors = failure(MutationExecutor::update(&store, &config, &json!(1), payload(json!({ "published": true }))).await);
        assert_eq!(errors["body"], ["required to publish"]);

        let updated = MutationExecutor::update(&store, &config, &json!(1), payload(json!({ "body": "text" })))
            .await
            .unwrap();
        assert_eq!(updated["title"], json!("Draft"));
        assert_eq!(updated["body"], json!("text"));
        assert_eq!(updated["published"], json!(false));

        let missing = MutationExecutor::update(&store, &config, &json!(9999), payload(json!({ "body": "x" }))).await;
        assert!(matches!(missing, Err(AppError::NotFound { .. })));
    }

    #[tokio::test]
    async fn delete_and_delete_many() {
        let store = MemoryStore::new();
        let config = post_config(ResourceOptions::new());
        for title in ["a", "b", "c"] {
            MutationExecutor::create(&store, &config, payload(json!({ "title": title })))
                .await
                .unwrap();
        }
        let missing = MutationExecutor::delete(&store, &config, &json!(9999)).await;
        assert!(matches!(missing, Err(AppError::NotFound { ref id, .. }) if id == "9999"));

        MutationExecutor::delete(&store, &config, &json!(1)).await.unwrap();
        let deleted = MutationExecutor::delete_many(&store, &config, &[json!(1), json!(2), json!(3)])
            .await
            .unwrap();
        assert_eq!(deleted, 2);
        assert_eq!(store.count(&config.schema, &[]).await.unwrap(), 0);
    }
}
