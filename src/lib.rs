//! memrelay - an MCP server that routes memory tools to one of several backends.
//!
//! At startup exactly one backend is chosen from the credentials present:
//! the hosted memory API, a relational+vector store, or an in-process
//! SQLite store. Every tool call then flows through the same pipeline:
//!
//! 1. [`ReadinessGate`] rejects calls until the backend exists
//! 2. [`params::resolve`] merges arguments with `DEFAULT_*` identifiers
//! 3. [`translate::translate`] renames fields for the active backend
//! 4. [`invoker::invoke`] picks the direct or library path, with fallback
//! 5. [`output`] shapes the result or error
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use memrelay::{backend, commands::Dispatcher, Config, ReadinessGate};
//! use serde_json::json;
//!
//! # async fn demo() -> Result<(), memrelay::Error> {
//! let config = Config::load(None)?;
//! let credentials = backend::select(&config.credentials)?;
//!
//! let gate = Arc::new(ReadinessGate::new());
//! gate.mark_ready(backend::connect(&credentials, &config).await?);
//!
//! let dispatcher = Dispatcher::new(gate, config.defaults.clone());
//! match dispatcher
//!     .call_tool("add_memory", &json!({"content": "likes tea", "userId": "u1"}))
//!     .await
//! {
//!     Ok(output) => println!("{}", output.text),
//!     Err(e) => eprintln!("{}", e.message),
//! }
//! # Ok(())
//! # }
//! ```

pub mod backend;
pub mod commands;
pub mod config;
pub mod embedding;
pub mod errors;
pub mod invoker;
pub mod mcp;
pub mod output;
pub mod params;
pub mod readiness;
pub mod sqlite;
pub mod translate;

// Re-export public API
pub use backend::{Backend, BackendMode, InvocationPath, Operation};
pub use config::Config;
pub use errors::Error;
pub use readiness::ReadinessGate;
