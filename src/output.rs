//! Uniform success and error shapes for tool results.

use serde::Serialize;
use serde_json::{json, Value};
use tracing::warn;

use crate::backend::Operation;
use crate::errors::Error;
use crate::translate::TranslatedRequest;

/// A single text block of a tool result.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct TextContent {
    #[serde(rename = "type")]
    pub kind: &'static str,
    pub text: String,
}

/// Wire shape of a successful tool call.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct CallToolResult {
    pub content: Vec<TextContent>,
    #[serde(rename = "structuredContent", skip_serializing_if = "Option::is_none")]
    pub structured_content: Option<Value>,
}

/// Response for a successful deletion.
#[derive(Serialize)]
pub struct DeleteResponse {
    pub id: String,
    pub deleted: bool,
}

/// Normalized success: text plus optional structured payload.
#[derive(Debug, Clone, PartialEq)]
pub struct ToolOutput {
    pub text: String,
    pub structured: Option<Value>,
}

impl ToolOutput {
    pub fn to_call_result(&self) -> CallToolResult {
        CallToolResult {
            content: vec![TextContent {
                kind: "text",
                text: self.text.clone(),
            }],
            structured_content: self.structured.clone(),
        }
    }
}

/// Error categories surfaced to the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    InvalidParams,
    MethodNotFound,
    Internal,
    /// Retryable: the backend is still initializing.
    NotReady,
}

impl ErrorKind {
    /// JSON-RPC error code.
    pub fn code(&self) -> i64 {
        match self {
            ErrorKind::InvalidParams => -32602,
            ErrorKind::MethodNotFound => -32601,
            ErrorKind::Internal => -32603,
            ErrorKind::NotReady => -32002,
        }
    }
}

/// Normalized error: kind plus message.
#[derive(Debug, Clone, PartialEq)]
pub struct ToolError {
    pub kind: ErrorKind,
    pub message: String,
}

/// Wrap a backend result for `request`.
pub fn success(request: &TranslatedRequest, value: Value) -> ToolOutput {
    let mut text = match request.operation {
        Operation::Add => format!("Memory added successfully. Result: {value}"),
        Operation::Search | Operation::GetExport => pretty(&value),
        Operation::Delete => format!(
            "Memory {} deleted successfully",
            request.subject.as_deref().unwrap_or_default()
        ),
        Operation::CreateExport => format!("Memory export created successfully. Result: {value}"),
    };

    let structured = match request.operation {
        Operation::Delete => serde_json::to_value(DeleteResponse {
            id: request.subject.clone().unwrap_or_default(),
            deleted: true,
        })
        .ok(),
        _ => Some(as_object(value)),
    };

    if !request.ignored.is_empty() {
        let fields = request.ignored.join(", ");
        warn!(
            mode = %request.mode,
            operation = %request.operation,
            fields = %fields,
            "backend ignored explicit arguments"
        );
        text.push_str(&format!("\nNote: the active backend ignored: {fields}"));
    }

    ToolOutput { text, structured }
}

/// Convert an error raised while serving a call of `operation`.
///
/// Errors that happen before an operation is known pass `None`.
pub fn failure(operation: Option<Operation>, error: &Error) -> ToolError {
    match error {
        Error::InvalidParams(msg) => ToolError {
            kind: ErrorKind::InvalidParams,
            message: msg.clone(),
        },
        Error::MethodNotFound(_) => ToolError {
            kind: ErrorKind::MethodNotFound,
            message: error.to_string(),
        },
        Error::NotReady => ToolError {
            kind: ErrorKind::NotReady,
            message: error.to_string(),
        },
        other => ToolError {
            kind: ErrorKind::Internal,
            message: match operation {
                Some(op) => format!("{}: {other}", error_prefix(op)),
                None => other.to_string(),
            },
        },
    }
}

fn error_prefix(operation: Operation) -> &'static str {
    match operation {
        Operation::Add => "Error adding memory",
        Operation::Search => "Error searching memories",
        Operation::Delete => "Error deleting memory",
        Operation::CreateExport => "Error creating memory export",
        Operation::GetExport => "Error retrieving memory export",
    }
}

fn pretty(value: &Value) -> String {
    serde_json::to_string_pretty(value).unwrap_or_else(|_| value.to_string())
}

/// Structured content must be an object; wrap anything else.
fn as_object(value: Value) -> Value {
    match value {
        Value::Object(_) => value,
        other => json!({ "result": other }),
    }
}
