//! Startup backend selection from the credential snapshot.

use std::sync::Arc;

use tracing::info;

use super::cloud::{CloudClient, CloudTransport};
use super::local::LocalMemory;
use super::relational::{RelationalSettings, RelationalStore};
use super::{Backend, BackendMode};
use crate::config::{Config, CredentialSnapshot};
use crate::embedding::{Embedder, OpenAiEmbedder};
use crate::errors::Error;

/// The credential bundle of the selected mode.
#[derive(Clone, PartialEq, Eq)]
pub enum Credentials {
    Cloud {
        api_key: String,
    },
    RelationalVector {
        url: String,
        key: String,
        /// Needed to embed memories; checked at construction.
        embedding_key: Option<String>,
    },
    LocalInMemory {
        embedding_key: String,
    },
}

impl Credentials {
    pub fn mode(&self) -> BackendMode {
        match self {
            Credentials::Cloud { .. } => BackendMode::Cloud,
            Credentials::RelationalVector { .. } => BackendMode::RelationalVector,
            Credentials::LocalInMemory { .. } => BackendMode::LocalInMemory,
        }
    }
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Credentials::RelationalVector { url, .. } => f
                .debug_struct("RelationalVector")
                .field("url", url)
                .finish_non_exhaustive(),
            other => write!(f, "{}", other.mode()),
        }
    }
}

/// Pick the highest-priority credential bundle: hosted key, then
/// store URL and key, then embedding key alone.
///
/// # Errors
///
/// Returns `Error::Config` when no bundle is present.
pub fn select(snapshot: &CredentialSnapshot) -> Result<Credentials, Error> {
    if let Some(api_key) = &snapshot.mem0_api_key {
        return Ok(Credentials::Cloud {
            api_key: api_key.clone(),
        });
    }
    if let (Some(url), Some(key)) = (&snapshot.supabase_url, &snapshot.supabase_key) {
        return Ok(Credentials::RelationalVector {
            url: url.clone(),
            key: key.clone(),
            embedding_key: snapshot.openai_api_key.clone(),
        });
    }
    if let Some(embedding_key) = &snapshot.openai_api_key {
        return Ok(Credentials::LocalInMemory {
            embedding_key: embedding_key.clone(),
        });
    }
    Err(Error::Config(
        "One of the following must be provided: MEM0_API_KEY (hosted storage), \
         SUPABASE_URL + SUPABASE_KEY (relational storage), \
         OPENAI_API_KEY (local in-memory storage)"
            .to_string(),
    ))
}

fn embedder(config: &Config, api_key: &str) -> Arc<dyn Embedder> {
    Arc::new(OpenAiEmbedder::new(
        &config.openai_base_url,
        &config.embedding_model,
        config.embedding_dims,
        api_key,
    ))
}

/// Construct the backend for the selected credentials.
///
/// A failure here is fatal for the process; it never falls through to a
/// lower-priority mode.
pub async fn connect(credentials: &Credentials, config: &Config) -> Result<Backend, Error> {
    let backend = match credentials {
        Credentials::Cloud { api_key } => {
            let client = CloudClient::connect(&config.cloud_base_url, api_key).await?;
            Backend::Cloud {
                library: Arc::new(client),
                transport: Arc::new(CloudTransport::new(&config.cloud_base_url, api_key)),
            }
        }
        Credentials::RelationalVector {
            url,
            key,
            embedding_key,
        } => {
            let embedding_key = embedding_key.as_deref().ok_or_else(|| {
                Error::Config(
                    "OPENAI_API_KEY is required to embed memories for Supabase storage".to_string(),
                )
            })?;
            let settings = RelationalSettings {
                url: url.clone(),
                key: key.clone(),
                table: config.supabase_table.clone(),
                history_table: config.supabase_history_table.clone(),
            };
            let store = Arc::new(
                RelationalStore::connect(settings, embedder(config, embedding_key)).await?,
            );
            Backend::RelationalVector {
                library: store.clone(),
                vector_store: store,
            }
        }
        Credentials::LocalInMemory { embedding_key } => {
            let store = Arc::new(LocalMemory::new(embedder(config, embedding_key))?);
            Backend::LocalInMemory {
                library: store.clone(),
                vector_store: store,
            }
        }
    };
    info!(mode = %backend.mode(), "memory backend initialized");
    Ok(backend)
}
