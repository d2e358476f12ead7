//! Path selection and fallback for a translated call.
//!
//! Add and search run one primary path and, if it fails, the other path
//! once. Delete and export walk their cascade in the order the backend's
//! capability table declares. Every step is recorded as an
//! [`InvocationAttempt`].

use chrono::Utc;
use serde_json::{json, Value};
use tracing::{debug, warn};

use crate::backend::{Backend, InvocationPath, Operation};
use crate::errors::Error;
use crate::translate::{direct_request, TranslatedRequest};

/// Outcome of one attempt.
#[derive(Debug, Clone, PartialEq)]
pub enum AttemptOutcome {
    Succeeded,
    Failed(String),
}

/// One path tried for one operation.
#[derive(Debug, Clone, PartialEq)]
pub struct InvocationAttempt {
    pub path: InvocationPath,
    pub operation: Operation,
    pub outcome: AttemptOutcome,
}

/// Result of a call with the attempts that produced it.
#[derive(Debug)]
pub struct Invocation {
    pub result: Result<Value, Error>,
    pub attempts: Vec<InvocationAttempt>,
}

impl Invocation {
    /// Path whose outcome is the returned result.
    pub fn authoritative_path(&self) -> Option<InvocationPath> {
        self.attempts.last().map(|a| a.path)
    }
}

/// Primary path for add and search.
///
/// The direct transport goes first when the call carries an app or
/// session scope and the backend declares one; otherwise the library.
pub fn primary_path(backend: &Backend, request: &TranslatedRequest) -> InvocationPath {
    let direct_available = backend
        .capabilities()
        .supports(request.operation, InvocationPath::Direct)
        && backend.transport().is_some();
    if request.prefers_direct && direct_available {
        InvocationPath::Direct
    } else {
        InvocationPath::Library
    }
}

/// Run a translated call against the backend.
pub async fn invoke(backend: &Backend, request: &TranslatedRequest) -> Invocation {
    match request.operation {
        Operation::Add | Operation::Search => invoke_dual(backend, request).await,
        Operation::Delete => invoke_cascade(backend, request, "deletion").await,
        Operation::CreateExport | Operation::GetExport => {
            invoke_cascade(backend, request, "export").await
        }
    }
}

async fn invoke_dual(backend: &Backend, request: &TranslatedRequest) -> Invocation {
    let operation = request.operation;
    let primary = primary_path(backend, request);
    let fallback = backend
        .capabilities()
        .paths(operation)
        .iter()
        .copied()
        .find(|p| *p != primary);

    let mut attempts = Vec::with_capacity(2);
    let first = run_path(backend, primary, request).await;
    record(&mut attempts, primary, operation, &first);

    let error = match first {
        Ok(value) => {
            return Invocation {
                result: Ok(value),
                attempts,
            }
        }
        Err(e) => e,
    };

    if operation == Operation::Add && error.may_have_committed() {
        warn!(path = %primary, error = %error, "add may have been applied; not retrying on another path");
        return Invocation {
            result: Err(error),
            attempts,
        };
    }

    let Some(fallback) = fallback else {
        return Invocation {
            result: Err(error),
            attempts,
        };
    };

    warn!(
        operation = %operation,
        from = %primary,
        to = %fallback,
        error = %error,
        "primary path failed, falling back"
    );
    let second = run_path(backend, fallback, request).await;
    record(&mut attempts, fallback, operation, &second);
    Invocation {
        result: second,
        attempts,
    }
}

async fn invoke_cascade(
    backend: &Backend,
    request: &TranslatedRequest,
    capability: &str,
) -> Invocation {
    let operation = request.operation;
    let mut attempts = Vec::new();
    let mut last_error: Option<Error> = None;

    for &path in backend.capabilities().paths(operation) {
        let outcome = run_path(backend, path, request).await;
        record(&mut attempts, path, operation, &outcome);
        match outcome {
            Ok(value) => {
                return Invocation {
                    result: Ok(value),
                    attempts,
                }
            }
            Err(e) => {
                debug!(operation = %operation, path = %path, error = %e, "cascade step failed");
                last_error = Some(e);
            }
        }
    }

    let cause = last_error
        .map(|e| e.to_string())
        .unwrap_or_else(|| "no invocation path declared".to_string());
    Invocation {
        result: Err(Error::Unsupported {
            operation: capability.to_string(),
            cause,
        }),
        attempts,
    }
}

fn record(
    attempts: &mut Vec<InvocationAttempt>,
    path: InvocationPath,
    operation: Operation,
    outcome: &Result<Value, Error>,
) {
    attempts.push(InvocationAttempt {
        path,
        operation,
        outcome: match outcome {
            Ok(_) => AttemptOutcome::Succeeded,
            Err(e) => AttemptOutcome::Failed(e.to_string()),
        },
    });
}

fn subject(request: &TranslatedRequest) -> Result<&str, Error> {
    request.subject.as_deref().ok_or_else(|| {
        Error::InvalidParams(format!("{} requires a subject", request.operation))
    })
}

async fn run_path(
    backend: &Backend,
    path: InvocationPath,
    request: &TranslatedRequest,
) -> Result<Value, Error> {
    debug!(operation = %request.operation, path = %path, mode = %backend.mode(), "invoking");
    match path {
        InvocationPath::Library => run_library(backend, request).await,
        InvocationPath::Direct => {
            let transport = backend.transport().ok_or_else(|| missing_handle("direct transport"))?;
            transport.send(&direct_request(request)).await
        }
        InvocationPath::VectorStore => {
            let store = backend
                .vector_store()
                .ok_or_else(|| missing_handle("vector store"))?;
            let id = subject(request)?;
            let removed = store.delete(&[id.to_string()]).await?;
            if removed == 0 {
                return Err(Error::Backend(format!("Memory with ID {id} not found")));
            }
            Ok(json!({ "deleted": removed }))
        }
        InvocationPath::Synthesized => {
            let listing = backend.library().get_all(&request.options).await?;
            Ok(synthesize_export(listing))
        }
    }
}

async fn run_library(backend: &Backend, request: &TranslatedRequest) -> Result<Value, Error> {
    let library = backend.library();
    match request.operation {
        Operation::Add => library.add(subject(request)?, &request.options).await,
        Operation::Search => library.search(subject(request)?, &request.options).await,
        Operation::Delete => {
            library.delete_memory(subject(request)?).await?;
            Ok(Value::Null)
        }
        Operation::CreateExport => library.create_export(&request.options).await,
        Operation::GetExport => library.get_export(&request.options).await,
    }
}

fn missing_handle(what: &str) -> Error {
    Error::Unsupported {
        operation: what.to_string(),
        cause: "not available for the active backend".to_string(),
    }
}

/// Build an export from a full listing. Never stored; each call recomputes.
fn synthesize_export(listing: Value) -> Value {
    let memories = match listing {
        Value::Object(mut map) => map.remove("results").unwrap_or(Value::Array(Vec::new())),
        Value::Array(items) => Value::Array(items),
        other => Value::Array(vec![other]),
    };
    let count = memories.as_array().map_or(0, Vec::len);
    json!({
        "status": "synthesized",
        "persisted": false,
        "generatedAt": Utc::now().to_rfc3339(),
        "count": count,
        "memories": memories,
    })
}
