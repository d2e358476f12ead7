//! Memory backends and the capability contract the dispatcher relies on.
//!
//! Exactly one [`Backend`] is active per process. Each variant bundles the
//! handles it owns (client library, direct transport, vector store) and
//! declares through a static [`Capabilities`] table which invocation paths
//! exist for each operation, so the invoker never probes handles at runtime.

pub mod cloud;
pub mod local;
pub mod relational;
pub mod selector;

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{Map, Value};

use crate::errors::Error;

pub use selector::{connect, select, Credentials};

/// JSON object passed to a backend handle.
pub type Options = Map<String, Value>;

/// Storage family of the active backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BackendMode {
    Cloud,
    RelationalVector,
    LocalInMemory,
}

impl BackendMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            BackendMode::Cloud => "cloud",
            BackendMode::RelationalVector => "relational-vector",
            BackendMode::LocalInMemory => "local-in-memory",
        }
    }

    /// Static capability table for this mode.
    pub fn capabilities(&self) -> &'static Capabilities {
        match self {
            BackendMode::Cloud => &CLOUD_CAPABILITIES,
            BackendMode::RelationalVector | BackendMode::LocalInMemory => &LIBRARY_CAPABILITIES,
        }
    }
}

impl fmt::Display for BackendMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Canonical memory operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    Add,
    Search,
    Delete,
    CreateExport,
    GetExport,
}

impl Operation {
    pub fn as_str(&self) -> &'static str {
        match self {
            Operation::Add => "add",
            Operation::Search => "search",
            Operation::Delete => "delete",
            Operation::CreateExport => "create_export",
            Operation::GetExport => "get_export",
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Route by which an operation reaches the backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum InvocationPath {
    /// Raw HTTP request to the hosted endpoint.
    Direct,
    /// Call through the backend's client object.
    Library,
    /// Delete by id on the backing vector store.
    VectorStore,
    /// Export computed on demand from a full listing.
    Synthesized,
}

impl fmt::Display for InvocationPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            InvocationPath::Direct => "direct",
            InvocationPath::Library => "library",
            InvocationPath::VectorStore => "vector-store",
            InvocationPath::Synthesized => "synthesized",
        };
        f.write_str(name)
    }
}

/// Ordered invocation paths per operation.
///
/// For add and search the order lists every available path; the invoker
/// picks the primary per call. For delete and export the order is the
/// cascade.
#[derive(Debug)]
pub struct Capabilities {
    pub add: &'static [InvocationPath],
    pub search: &'static [InvocationPath],
    pub delete: &'static [InvocationPath],
    pub create_export: &'static [InvocationPath],
    pub get_export: &'static [InvocationPath],
}

impl Capabilities {
    pub fn paths(&self, operation: Operation) -> &'static [InvocationPath] {
        match operation {
            Operation::Add => self.add,
            Operation::Search => self.search,
            Operation::Delete => self.delete,
            Operation::CreateExport => self.create_export,
            Operation::GetExport => self.get_export,
        }
    }

    pub fn supports(&self, operation: Operation, path: InvocationPath) -> bool {
        self.paths(operation).contains(&path)
    }
}

use InvocationPath::{Direct, Library, Synthesized, VectorStore as VectorStorePath};

pub static CLOUD_CAPABILITIES: Capabilities = Capabilities {
    add: &[Direct, Library],
    search: &[Direct, Library],
    delete: &[Library, Direct],
    create_export: &[Library, Direct],
    get_export: &[Library, Direct],
};

pub static LIBRARY_CAPABILITIES: Capabilities = Capabilities {
    add: &[Library],
    search: &[Library],
    delete: &[Library, VectorStorePath],
    create_export: &[Library, Synthesized],
    get_export: &[Library, Synthesized],
};

/// Client-library handle of a backend.
///
/// Optional capabilities default to [`Error::Unsupported`], which the
/// invoker treats like any other failed step of a cascade.
#[async_trait]
pub trait MemoryLibrary: Send + Sync {
    /// Store `content` and return the backend's add result.
    async fn add(&self, content: &str, options: &Options) -> Result<Value, Error>;

    /// Search memories relevant to `query`.
    async fn search(&self, query: &str, options: &Options) -> Result<Value, Error>;

    /// Delete a single memory by id.
    async fn delete_memory(&self, memory_id: &str) -> Result<(), Error> {
        let _ = memory_id;
        Err(unsupported("delete_memory"))
    }

    async fn create_export(&self, options: &Options) -> Result<Value, Error> {
        let _ = options;
        Err(unsupported("create_export"))
    }

    async fn get_export(&self, options: &Options) -> Result<Value, Error> {
        let _ = options;
        Err(unsupported("get_export"))
    }

    /// List every memory matching the identifiers in `options`.
    async fn get_all(&self, options: &Options) -> Result<Value, Error> {
        let _ = options;
        Err(unsupported("get_all"))
    }
}

/// A raw request for the direct transport.
#[derive(Debug, Clone, PartialEq)]
pub struct DirectRequest {
    pub method: reqwest::Method,
    /// Path below the API base URL, with a leading slash.
    pub path: String,
    pub body: Option<Value>,
    /// Label used in failure messages, e.g. "Direct search API call".
    pub context: &'static str,
}

/// Generic HTTP transport to a backend's REST endpoints.
#[async_trait]
pub trait DirectTransport: Send + Sync {
    async fn send(&self, request: &DirectRequest) -> Result<Value, Error>;
}

/// Vector store underneath a library-backed backend.
#[async_trait]
pub trait VectorStore: Send + Sync {
    /// Remove vectors by id; returns how many existed.
    async fn delete(&self, ids: &[String]) -> Result<usize, Error>;
}

/// The active backend with the handles its mode provides.
#[derive(Clone)]
pub enum Backend {
    Cloud {
        library: Arc<dyn MemoryLibrary>,
        transport: Arc<dyn DirectTransport>,
    },
    RelationalVector {
        library: Arc<dyn MemoryLibrary>,
        vector_store: Arc<dyn VectorStore>,
    },
    LocalInMemory {
        library: Arc<dyn MemoryLibrary>,
        vector_store: Arc<dyn VectorStore>,
    },
}

impl Backend {
    pub fn mode(&self) -> BackendMode {
        match self {
            Backend::Cloud { .. } => BackendMode::Cloud,
            Backend::RelationalVector { .. } => BackendMode::RelationalVector,
            Backend::LocalInMemory { .. } => BackendMode::LocalInMemory,
        }
    }

    pub fn capabilities(&self) -> &'static Capabilities {
        self.mode().capabilities()
    }

    pub fn library(&self) -> &Arc<dyn MemoryLibrary> {
        match self {
            Backend::Cloud { library, .. }
            | Backend::RelationalVector { library, .. }
            | Backend::LocalInMemory { library, .. } => library,
        }
    }

    pub fn transport(&self) -> Option<&Arc<dyn DirectTransport>> {
        match self {
            Backend::Cloud { transport, .. } => Some(transport),
            Backend::RelationalVector { .. } | Backend::LocalInMemory { .. } => None,
        }
    }

    pub fn vector_store(&self) -> Option<&Arc<dyn VectorStore>> {
        match self {
            Backend::Cloud { .. } => None,
            Backend::RelationalVector { vector_store, .. }
            | Backend::LocalInMemory { vector_store, .. } => Some(vector_store),
        }
    }
}

impl fmt::Debug for Backend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Backend").field("mode", &self.mode()).finish()
    }
}

fn unsupported(operation: &str) -> Error {
    Error::Unsupported {
        operation: operation.to_string(),
        cause: "not provided by this client".to_string(),
    }
}

/// Turn a non-2xx response into [`Error::Status`].
pub(crate) async fn ensure_success(
    context: &str,
    response: reqwest::Response,
) -> Result<reqwest::Response, Error> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(Error::Status {
        context: context.to_string(),
        status: status.as_u16(),
        reason: status.canonical_reason().unwrap_or_default().to_string(),
        body,
    })
}

/// Read a response body as JSON, falling back to a JSON string for
/// non-JSON bodies and `null` for empty ones.
pub(crate) async fn read_lenient(response: reqwest::Response) -> Result<Value, Error> {
    let text = response.text().await?;
    if text.trim().is_empty() {
        return Ok(Value::Null);
    }
    Ok(serde_json::from_str(&text).unwrap_or(Value::String(text)))
}

/// String option by key, ignoring non-string values.
pub(crate) fn option_str<'a>(options: &'a Options, key: &str) -> Option<&'a str> {
    options.get(key).and_then(Value::as_str)
}
