//! Relational+vector backend over a PostgREST endpoint.
//!
//! Memories are rows of `(id, embedding, metadata)` in the vectors table;
//! the memory text and its identifiers live inside `metadata`. Similarity
//! search goes through the `match_vectors` function. Every change also
//! appends a row to the history table.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use reqwest::Method;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{debug, warn};
use uuid::Uuid;

use super::{ensure_success, option_str, MemoryLibrary, Options, VectorStore};
use crate::embedding::Embedder;
use crate::errors::Error;

/// Identifier keys copied from the options into a stored record.
const IDENTIFIER_KEYS: &[&str] = &["userId", "sessionId", "agentId", "appId", "projectId", "orgId"];

/// Keys the store writes into a row's metadata next to the identifiers.
const RESERVED_KEYS: &[&str] = &["data", "createdAt"];

const SEARCH_MATCH_COUNT: usize = 100;

/// Connection settings for the relational store.
#[derive(Debug, Clone)]
pub struct RelationalSettings {
    pub url: String,
    pub key: String,
    pub table: String,
    pub history_table: String,
}

#[derive(Debug, Deserialize)]
struct VectorRow {
    id: String,
    #[serde(default)]
    similarity: Option<f64>,
    #[serde(default)]
    metadata: Value,
}

/// PostgREST-backed memory store.
pub struct RelationalStore {
    settings: RelationalSettings,
    embedder: Arc<dyn Embedder>,
    http_client: reqwest::Client,
}

impl RelationalStore {
    /// Build the store and check that the vectors table is reachable.
    ///
    /// # Errors
    ///
    /// Returns error if the endpoint is unreachable or rejects the key.
    pub async fn connect(
        settings: RelationalSettings,
        embedder: Arc<dyn Embedder>,
    ) -> Result<Self, Error> {
        let store = Self {
            settings: RelationalSettings {
                url: settings.url.trim_end_matches('/').to_string(),
                ..settings
            },
            embedder,
            http_client: reqwest::Client::new(),
        };
        let response = store
            .request(Method::GET, &store.settings.table)
            .query(&[("select", "id"), ("limit", "1")])
            .send()
            .await?;
        ensure_success("Vector table check", response).await?;
        debug!(table = %store.settings.table, "relational store reachable");
        Ok(store)
    }

    fn request(&self, method: Method, resource: &str) -> reqwest::RequestBuilder {
        self.http_client
            .request(method, format!("{}/rest/v1/{}", self.settings.url, resource))
            .header("apikey", &self.settings.key)
            .bearer_auth(&self.settings.key)
    }

    async fn record_history(
        &self,
        memory_id: &str,
        previous_value: Option<&str>,
        new_value: Option<&str>,
        action: &str,
    ) -> Result<(), Error> {
        let is_deleted = i32::from(action == "DELETE");
        let row = json!({
            "id": Uuid::new_v4().to_string(),
            "memory_id": memory_id,
            "previous_value": previous_value,
            "new_value": new_value,
            "action": action,
            "created_at": Utc::now().to_rfc3339(),
            "is_deleted": is_deleted,
        });
        let response = self
            .request(Method::POST, &self.settings.history_table)
            .header("Prefer", "return=minimal")
            .json(&row)
            .send()
            .await?;
        ensure_success("History insert", response).await?;
        Ok(())
    }

    /// Delete rows matching a PostgREST `id` filter and return them.
    async fn delete_where(&self, id_filter: String) -> Result<Vec<VectorRow>, Error> {
        let response = self
            .request(Method::DELETE, &self.settings.table)
            .query(&[("id", id_filter)])
            .header("Prefer", "return=representation")
            .send()
            .await?;
        let response = ensure_success("Vector delete", response).await?;
        Ok(response.json().await?)
    }
}

/// Shape a stored row as a memory item.
fn row_to_item(row: VectorRow) -> Value {
    let mut item = Options::new();
    item.insert("id".to_string(), Value::String(row.id));
    item.insert(
        "memory".to_string(),
        row.metadata.get("data").cloned().unwrap_or(Value::Null),
    );
    if let Some(score) = row.similarity {
        item.insert("score".to_string(), json!(score));
    }
    for key in IDENTIFIER_KEYS.iter().chain(&["createdAt"]) {
        if let Some(value) = row.metadata.get(*key) {
            item.insert(key.to_string(), value.clone());
        }
    }
    if let Value::Object(stored) = &row.metadata {
        let caller: Options = stored
            .iter()
            .filter(|(key, _)| {
                !IDENTIFIER_KEYS.contains(&key.as_str()) && !RESERVED_KEYS.contains(&key.as_str())
            })
            .map(|(key, value)| (key.clone(), value.clone()))
            .collect();
        if !caller.is_empty() {
            item.insert("metadata".to_string(), Value::Object(caller));
        }
    }
    Value::Object(item)
}

/// Filter object for `match_vectors` and listings: identifiers plus caller filters.
fn scope_filter(options: &Options) -> Options {
    let mut filter = Options::new();
    for key in IDENTIFIER_KEYS {
        if let Some(value) = options.get(*key) {
            filter.insert(key.to_string(), value.clone());
        }
    }
    if let Some(Value::Object(extra)) = options.get("filters") {
        for (key, value) in extra {
            filter.insert(key.clone(), value.clone());
        }
    }
    filter
}

fn filter_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

#[async_trait]
impl MemoryLibrary for RelationalStore {
    async fn add(&self, content: &str, options: &Options) -> Result<Value, Error> {
        let embedding = self.embedder.embed(content).await?;
        let id = Uuid::new_v4().to_string();

        // Caller metadata sits at the top level of the row's metadata, where
        // `match_vectors` filters and `metadata->>key` listings look.
        let mut payload = match options.get("metadata") {
            Some(Value::Object(metadata)) => metadata.clone(),
            _ => Options::new(),
        };
        payload.insert("data".to_string(), Value::String(content.to_string()));
        for key in IDENTIFIER_KEYS {
            if let Some(value) = options.get(*key) {
                payload.insert(key.to_string(), value.clone());
            }
        }
        payload.insert("createdAt".to_string(), Value::String(Utc::now().to_rfc3339()));

        let row = json!({"id": id, "embedding": embedding, "metadata": payload});
        let response = self
            .request(Method::POST, &self.settings.table)
            .header("Prefer", "return=minimal")
            .json(&row)
            .send()
            .await?;
        ensure_success("Vector insert", response).await?;

        self.record_history(&id, None, Some(content), "ADD").await?;

        Ok(json!({"results": [{"id": id, "memory": content, "event": "ADD"}]}))
    }

    async fn search(&self, query: &str, options: &Options) -> Result<Value, Error> {
        let embedding = self.embedder.embed(query).await?;
        let body = json!({
            "query_embedding": embedding,
            "match_count": SEARCH_MATCH_COUNT,
            "filter": scope_filter(options),
        });
        let response = self
            .request(Method::POST, "rpc/match_vectors")
            .json(&body)
            .send()
            .await?;
        let response = ensure_success("Vector search", response).await?;
        let rows: Vec<VectorRow> = response.json().await?;

        let results: Vec<Value> = rows.into_iter().map(row_to_item).collect();
        Ok(json!({ "results": results }))
    }

    async fn delete_memory(&self, memory_id: &str) -> Result<(), Error> {
        let removed = self.delete_where(format!("eq.{memory_id}")).await?;
        let Some(row) = removed.into_iter().next() else {
            return Err(Error::Backend(format!("Memory with ID {memory_id} not found")));
        };
        let previous = row.metadata.get("data").and_then(Value::as_str);
        // The row is gone; a missing audit entry must not turn this into a failure.
        if let Err(e) = self.record_history(memory_id, previous, None, "DELETE").await {
            warn!(memory_id = %memory_id, error = %e, "memory deleted but history insert failed");
        }
        Ok(())
    }

    async fn get_all(&self, options: &Options) -> Result<Value, Error> {
        let mut query: Vec<(String, String)> = vec![("select".to_string(), "id,metadata".to_string())];
        for (key, value) in scope_filter(options) {
            query.push((format!("metadata->>{key}"), format!("eq.{}", filter_value(&value))));
        }
        let response = self
            .request(Method::GET, &self.settings.table)
            .query(&query)
            .send()
            .await?;
        let response = ensure_success("Vector listing", response).await?;
        let rows: Vec<VectorRow> = response.json().await?;

        let results: Vec<Value> = rows.into_iter().map(row_to_item).collect();
        debug!(
            user_id = option_str(options, "userId").unwrap_or_default(),
            count = results.len(),
            "listed relational memories"
        );
        Ok(json!({ "results": results }))
    }
}

#[async_trait]
impl VectorStore for RelationalStore {
    async fn delete(&self, ids: &[String]) -> Result<usize, Error> {
        if ids.is_empty() {
            return Ok(0);
        }
        let removed = self.delete_where(format!("in.({})", ids.join(","))).await?;
        Ok(removed.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::prelude::*;

    struct FixedEmbedder;

    #[async_trait]
    impl Embedder for FixedEmbedder {
        async fn embed(&self, _text: &str) -> Result<Vec<f32>, Error> {
            Ok(vec![0.5, 0.5])
        }

        fn dims(&self) -> usize {
            2
        }
    }

    fn settings(url: String) -> RelationalSettings {
        RelationalSettings {
            url,
            key: "sb-key".to_string(),
            table: "memories".to_string(),
            history_table: "memory_history".to_string(),
        }
    }

    async fn connected(server: &MockServer) -> RelationalStore {
        server.mock(|when, then| {
            when.method(GET)
                .path("/rest/v1/memories")
                .query_param("limit", "1");
            then.status(200).json_body(json!([]));
        });
        RelationalStore::connect(settings(server.base_url()), Arc::new(FixedEmbedder))
            .await
            .unwrap()
    }

    fn options(value: Value) -> Options {
        match value {
            Value::Object(map) => map,
            _ => panic!("expected object"),
        }
    }

    #[tokio::test]
    async fn test_connect_fails_on_rejected_key() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(GET).path("/rest/v1/memories");
            then.status(401).body("no");
        });

        let result =
            RelationalStore::connect(settings(server.base_url()), Arc::new(FixedEmbedder)).await;
        assert!(matches!(result, Err(Error::Status { status: 401, .. })));
    }

    #[tokio::test]
    async fn test_add_inserts_vector_and_history() {
        let server = MockServer::start();
        let store = connected(&server).await;
        let insert = server.mock(|when, then| {
            when.method(POST)
                .path("/rest/v1/memories")
                .header("apikey", "sb-key")
                .json_body_includes(
                    json!({"embedding": [0.5, 0.5], "metadata": {"data": "hello", "userId": "u1"}})
                        .to_string(),
                );
            then.status(201);
        });
        let history = server.mock(|when, then| {
            when.method(POST)
                .path("/rest/v1/memory_history")
                .json_body_includes(json!({"action": "ADD", "new_value": "hello"}).to_string());
            then.status(201);
        });

        let result = store
            .add("hello", &options(json!({"userId": "u1"})))
            .await
            .unwrap();

        insert.assert();
        history.assert();
        assert_eq!(result["results"][0]["event"], "ADD");
        assert_eq!(result["results"][0]["memory"], "hello");
    }

    #[tokio::test]
    async fn test_search_calls_match_vectors_with_scope() {
        let server = MockServer::start();
        let store = connected(&server).await;
        let rpc = server.mock(|when, then| {
            when.method(POST)
                .path("/rest/v1/rpc/match_vectors")
                .json_body_includes(
                    json!({"match_count": 100, "filter": {"userId": "u1", "topic": "food"}})
                        .to_string(),
                );
            then.status(200).json_body(json!([
                {"id": "m1", "similarity": 0.9, "metadata": {"data": "likes pizza", "userId": "u1"}}
            ]));
        });

        let result = store
            .search(
                "food",
                &options(json!({"userId": "u1", "filters": {"topic": "food"}})),
            )
            .await
            .unwrap();

        rpc.assert();
        assert_eq!(result["results"][0]["id"], "m1");
        assert_eq!(result["results"][0]["memory"], "likes pizza");
        assert_eq!(result["results"][0]["score"], 0.9);
    }

    #[tokio::test]
    async fn test_delete_missing_memory_is_error() {
        let server = MockServer::start();
        let store = connected(&server).await;
        server.mock(|when, then| {
            when.method(DELETE)
                .path("/rest/v1/memories")
                .query_param("id", "eq.m404");
            then.status(200).json_body(json!([]));
        });

        let err = store.delete_memory("m404").await.unwrap_err();
        assert_eq!(err.to_string(), "Memory with ID m404 not found");
    }

    #[tokio::test]
    async fn test_metadata_stored_where_filters_match() {
        let server = MockServer::start();
        let store = connected(&server).await;
        let insert = server.mock(|when, then| {
            when.method(POST).path("/rest/v1/memories").json_body_includes(
                json!({"metadata": {"data": "likes pizza", "userId": "u1", "topic": "food"}})
                    .to_string(),
            );
            then.status(201);
        });
        server.mock(|when, then| {
            when.method(POST).path("/rest/v1/memory_history");
            then.status(201);
        });
        let rpc = server.mock(|when, then| {
            when.method(POST)
                .path("/rest/v1/rpc/match_vectors")
                .json_body_includes(json!({"filter": {"userId": "u1", "topic": "food"}}).to_string());
            then.status(200).json_body(json!([{
                "id": "m1",
                "similarity": 0.8,
                "metadata": {"data": "likes pizza", "userId": "u1", "topic": "food", "createdAt": "t"}
            }]));
        });

        store
            .add(
                "likes pizza",
                &options(json!({"userId": "u1", "metadata": {"topic": "food"}})),
            )
            .await
            .unwrap();
        let result = store
            .search(
                "pizza",
                &options(json!({"userId": "u1", "filters": {"topic": "food"}})),
            )
            .await
            .unwrap();

        insert.assert();
        rpc.assert();
        let item = &result["results"][0];
        assert_eq!(item["metadata"], json!({"topic": "food"}));
        assert_eq!(item["userId"], "u1");
        assert_eq!(item["createdAt"], "t");
    }

    #[tokio::test]
    async fn test_listing_filters_on_stored_metadata_keys() {
        let server = MockServer::start();
        let store = connected(&server).await;
        let listing = server.mock(|when, then| {
            when.method(GET)
                .path("/rest/v1/memories")
                .query_param("metadata->>userId", "eq.u1")
                .query_param("metadata->>topic", "eq.food");
            then.status(200).json_body(json!([
                {"id": "m1", "metadata": {"data": "likes pizza", "userId": "u1", "topic": "food"}}
            ]));
        });

        let result = store
            .get_all(&options(json!({"userId": "u1", "filters": {"topic": "food"}})))
            .await
            .unwrap();

        listing.assert();
        assert_eq!(result["results"][0]["metadata"]["topic"], "food");
    }

    #[tokio::test]
    async fn test_delete_succeeds_when_history_insert_fails() {
        let server = MockServer::start();
        let store = connected(&server).await;
        let delete = server.mock(|when, then| {
            when.method(DELETE)
                .path("/rest/v1/memories")
                .query_param("id", "eq.m1");
            then.status(200)
                .json_body(json!([{"id": "m1", "metadata": {"data": "likes pizza"}}]));
        });
        let history = server.mock(|when, then| {
            when.method(POST).path("/rest/v1/memory_history");
            then.status(500).body("history table missing");
        });

        store.delete_memory("m1").await.unwrap();

        delete.assert();
        history.assert();
    }

    #[tokio::test]
    async fn test_vector_store_delete_by_ids() {
        let server = MockServer::start();
        let store = connected(&server).await;
        let delete = server.mock(|when, then| {
            when.method(DELETE)
                .path("/rest/v1/memories")
                .query_param("id", "in.(m1,m2)");
            then.status(200)
                .json_body(json!([{"id": "m1", "metadata": {"data": "x"}}]));
        });

        let removed = VectorStore::delete(&store, &["m1".to_string(), "m2".to_string()])
            .await
            .unwrap();

        delete.assert();
        assert_eq!(removed, 1);
    }
}
