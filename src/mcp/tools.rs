//! Static tool definitions advertised by `tools/list`.

use serde_json::{json, Map, Value};

use crate::backend::Operation;
use crate::config::EnvironmentDefaults;

pub const ADD_MEMORY: &str = "add_memory";
pub const SEARCH_MEMORY: &str = "search_memory";
pub const DELETE_MEMORY: &str = "delete_memory";
pub const CREATE_MEMORY_EXPORT: &str = "create_memory_export";
pub const GET_MEMORY_EXPORT: &str = "get_memory_export";

/// Operation served by a tool name.
pub fn operation_for_tool(name: &str) -> Option<Operation> {
    match name {
        ADD_MEMORY => Some(Operation::Add),
        SEARCH_MEMORY => Some(Operation::Search),
        DELETE_MEMORY => Some(Operation::Delete),
        CREATE_MEMORY_EXPORT => Some(Operation::CreateExport),
        GET_MEMORY_EXPORT => Some(Operation::GetExport),
        _ => None,
    }
}

fn identifier_properties(include_session: bool) -> Map<String, Value> {
    let mut props = Map::new();
    props.insert(
        "userId".to_string(),
        json!({
            "type": "string",
            "description": "User ID to associate with the memory. If not provided, uses DEFAULT_USER_ID environment variable."
        }),
    );
    if include_session {
        props.insert(
            "sessionId".to_string(),
            json!({
                "type": "string",
                "description": "Optional session ID to scope the memory."
            }),
        );
    }
    props.insert(
        "agentId".to_string(),
        json!({
            "type": "string",
            "description": "Optional agent ID - identifies the LLM/agent making the tool call. If not provided, uses DEFAULT_AGENT_ID environment variable."
        }),
    );
    props.insert(
        "appId".to_string(),
        json!({
            "type": "string",
            "description": "Optional app ID - application identifier. If not provided, uses DEFAULT_APP_ID environment variable."
        }),
    );
    props.insert(
        "projectId".to_string(),
        json!({
            "type": "string",
            "description": "Optional project ID. If not provided, uses DEFAULT_PROJECT_ID environment variable."
        }),
    );
    props.insert(
        "orgId".to_string(),
        json!({
            "type": "string",
            "description": "Optional organization ID. If not provided, uses DEFAULT_ORG_ID environment variable."
        }),
    );
    props
}

fn tool(
    name: &str,
    description: &str,
    mut properties: Map<String, Value>,
    extra: Value,
    subject: Option<&str>,
    user_required: bool,
) -> Value {
    if let Value::Object(extra) = extra {
        properties.extend(extra);
    }
    let mut required: Vec<&str> = subject.into_iter().collect();
    if user_required {
        required.push("userId");
    }
    json!({
        "name": name,
        "description": description,
        "inputSchema": {
            "type": "object",
            "properties": properties,
            "required": required,
        }
    })
}

/// Tool definitions; `userId` is required only when no default user is configured.
pub fn tool_definitions(defaults: &EnvironmentDefaults) -> Vec<Value> {
    let user_required = defaults.user_id.is_none();

    vec![
        tool(
            ADD_MEMORY,
            "Stores a piece of text as a memory.",
            identifier_properties(true),
            json!({
                "content": {"type": "string", "description": "The text content to store as memory."},
                "metadata": {"type": "object", "description": "Optional key-value metadata."},
                "includes": {"type": "string", "description": "Optional specific preferences to include in the memory (hosted API only)."},
                "excludes": {"type": "string", "description": "Optional specific preferences to exclude from the memory (hosted API only)."},
                "infer": {"type": "boolean", "description": "Optional whether to infer memories or store messages directly (hosted API only)."},
                "outputFormat": {"type": "string", "description": "Optional output format version, v1.0 or v1.1 (hosted API only)."},
                "customCategories": {"type": "object", "description": "Optional categories with names and descriptions (hosted API only)."},
                "customInstructions": {"type": "string", "description": "Optional project-specific guidelines for organizing memories (hosted API only)."},
                "immutable": {"type": "boolean", "description": "Optional whether the memory is immutable (hosted API only)."},
                "expirationDate": {"type": "string", "description": "Optional expiry date, YYYY-MM-DD (hosted API only)."}
            }),
            Some("content"),
            user_required,
        ),
        tool(
            SEARCH_MEMORY,
            "Searches stored memories based on a query.",
            identifier_properties(true),
            json!({
                "query": {"type": "string", "description": "The search query."},
                "filters": {"type": "object", "description": "Optional key-value filters for metadata."},
                "threshold": {"type": "number", "description": "Optional similarity threshold (hosted API only)."},
                "topK": {"type": "number", "description": "Optional number of top results to return (hosted API only)."},
                "fields": {"type": "array", "items": {"type": "string"}, "description": "Optional fields to include in the response (hosted API only)."},
                "rerank": {"type": "boolean", "description": "Optional whether to rerank the memories (hosted API only)."},
                "keywordSearch": {"type": "boolean", "description": "Optional whether to search by keywords (hosted API only)."},
                "filterMemories": {"type": "boolean", "description": "Optional whether to filter the memories (hosted API only)."}
            }),
            Some("query"),
            user_required,
        ),
        tool(
            DELETE_MEMORY,
            "Deletes a specific memory by ID.",
            identifier_properties(false),
            json!({
                "memoryId": {"type": "string", "description": "The unique ID of the memory to delete."}
            }),
            Some("memoryId"),
            user_required,
        ),
        tool(
            CREATE_MEMORY_EXPORT,
            "Creates a structured export of memories.",
            identifier_properties(true),
            json!({
                "schema": {"type": "object", "description": "Optional JSON schema describing the export structure (hosted API only)."},
                "filters": {"type": "object", "description": "Optional filters selecting the memories to export."}
            }),
            None,
            user_required,
        ),
        tool(
            GET_MEMORY_EXPORT,
            "Retrieves a memory export.",
            identifier_properties(true),
            json!({
                "exportId": {"type": "string", "description": "Optional ID of a previously created export (hosted API only)."},
                "filters": {"type": "object", "description": "Optional filters selecting the export."}
            }),
            None,
            user_required,
        ),
    ]
}
