//! In-process backend over a private SQLite `:memory:` database.
//!
//! Contents vanish with the process. The store lock is only held for
//! synchronous SQLite work, never across an embedding call.

use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use serde_json::{json, Value};
use tracing::debug;

use super::{option_str, MemoryLibrary, Options, VectorStore};
use crate::embedding::Embedder;
use crate::errors::Error;
use crate::sqlite::{Database, Memory, NewMemory, Scope};

const SEARCH_LIMIT: usize = 100;
const LIST_LIMIT: usize = 10_000;

/// Local memory store with semantic search.
pub struct LocalMemory {
    db: Mutex<Database>,
    embedder: Arc<dyn Embedder>,
}

impl LocalMemory {
    /// Create an empty store sized for the embedder's vectors.
    ///
    /// # Errors
    ///
    /// Returns error if the in-memory database cannot be created.
    pub fn new(embedder: Arc<dyn Embedder>) -> Result<Self, Error> {
        let db = Database::open_in_memory(embedder.dims())?;
        Ok(Self {
            db: Mutex::new(db),
            embedder,
        })
    }

    fn db(&self) -> Result<MutexGuard<'_, Database>, Error> {
        self.db
            .lock()
            .map_err(|_| Error::Backend("Local store lock poisoned".to_string()))
    }
}

fn scope(options: &Options) -> Result<Scope<'_>, Error> {
    let user_id = option_str(options, "userId")
        .ok_or_else(|| Error::Backend("userId is required by the local store".to_string()))?;
    Ok(Scope {
        user_id,
        session_id: option_str(options, "sessionId"),
    })
}

/// Whether a memory's metadata carries every filter key with an equal value.
fn matches_filters(memory: &Memory, filters: Option<&Value>) -> bool {
    let Some(Value::Object(filters)) = filters else {
        return true;
    };
    if filters.is_empty() {
        return true;
    }
    let metadata: Value = memory
        .metadata
        .as_deref()
        .and_then(|raw| serde_json::from_str(raw).ok())
        .unwrap_or(Value::Null);
    filters
        .iter()
        .all(|(key, expected)| metadata.get(key) == Some(expected))
}

fn memory_to_item(memory: Memory) -> Value {
    let metadata = memory
        .metadata
        .as_deref()
        .and_then(|raw| serde_json::from_str::<Value>(raw).ok());
    let mut item = json!({
        "id": memory.id,
        "memory": memory.content,
        "userId": memory.user_id,
        "createdAt": memory.created_at,
        "updatedAt": memory.updated_at,
    });
    if let Value::Object(map) = &mut item {
        if let Some(session_id) = memory.session_id {
            map.insert("sessionId".to_string(), Value::String(session_id));
        }
        if let Some(metadata) = metadata {
            map.insert("metadata".to_string(), metadata);
        }
        if let Some(score) = memory.similarity {
            map.insert("score".to_string(), json!(score));
        }
    }
    item
}

#[async_trait]
impl MemoryLibrary for LocalMemory {
    async fn add(&self, content: &str, options: &Options) -> Result<Value, Error> {
        let scope = scope(options)?;
        let embedding = self.embedder.embed(content).await?;
        let metadata = options
            .get("metadata")
            .map(serde_json::to_string)
            .transpose()?;

        let id = {
            let db = self.db()?;
            let id = db.insert(
                &NewMemory {
                    user_id: scope.user_id,
                    session_id: scope.session_id,
                    content,
                    metadata: metadata.as_deref(),
                },
                &embedding,
            )?;
            db.record_history(&id, None, Some(content), "ADD")?;
            id
        };

        debug!(id = %id, user_id = scope.user_id, "stored local memory");
        Ok(json!({"results": [{"id": id, "memory": content, "event": "ADD"}]}))
    }

    async fn search(&self, query: &str, options: &Options) -> Result<Value, Error> {
        let scope = scope(options)?;
        let embedding = self.embedder.embed(query).await?;

        let memories = self.db()?.search(&scope, &embedding, SEARCH_LIMIT)?;
        let results: Vec<Value> = memories
            .into_iter()
            .filter(|m| matches_filters(m, options.get("filters")))
            .map(memory_to_item)
            .collect();

        Ok(json!({ "results": results }))
    }

    async fn delete_memory(&self, memory_id: &str) -> Result<(), Error> {
        let db = self.db()?;
        let Some(existing) = db.get(memory_id)? else {
            return Err(Error::Backend(format!("Memory with ID {memory_id} not found")));
        };
        db.delete(memory_id)?;
        db.record_history(memory_id, Some(&existing.content), None, "DELETE")?;
        Ok(())
    }

    async fn get_all(&self, options: &Options) -> Result<Value, Error> {
        let scope = scope(options)?;
        let memories = self.db()?.list(&scope, LIST_LIMIT)?;
        let results: Vec<Value> = memories
            .into_iter()
            .filter(|m| matches_filters(m, options.get("filters")))
            .map(memory_to_item)
            .collect();
        Ok(json!({ "results": results }))
    }
}

#[async_trait]
impl VectorStore for LocalMemory {
    async fn delete(&self, ids: &[String]) -> Result<usize, Error> {
        Ok(self.db()?.delete_ids(ids)?)
    }
}
