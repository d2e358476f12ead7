//! Per-backend mapping from canonical parameters to request options.
//!
//! The hosted API takes underscored keys; the library-backed stores take
//! camelCase keys and accept far fewer fields. A field missing from the
//! active mode's table is dropped; explicitly supplied ones are reported
//! back so the caller can be told.

use reqwest::Method;
use serde_json::{json, Value};

use crate::backend::cloud::{endpoints, user_messages};
use crate::backend::{BackendMode, DirectRequest, Operation, Options};
use crate::params::{accepted_fields, CanonicalParams, Field, Provenance};

/// API version sent with hosted add requests.
pub const CLOUD_ADD_VERSION: &str = "v2";

type Mapping = &'static [(Field, &'static str)];

const CLOUD_FIELDS: Mapping = &[
    (Field::UserId, "user_id"),
    (Field::SessionId, "run_id"),
    (Field::AgentId, "agent_id"),
    (Field::AppId, "app_id"),
    (Field::ProjectId, "project_id"),
    (Field::OrgId, "org_id"),
    (Field::Metadata, "metadata"),
    (Field::Filters, "filters"),
    (Field::Includes, "includes"),
    (Field::Excludes, "excludes"),
    (Field::Infer, "infer"),
    (Field::OutputFormat, "output_format"),
    (Field::CustomCategories, "custom_categories"),
    (Field::CustomInstructions, "custom_instructions"),
    (Field::Immutable, "immutable"),
    (Field::ExpirationDate, "expiration_date"),
    (Field::Threshold, "threshold"),
    (Field::TopK, "top_k"),
    (Field::Fields, "fields"),
    (Field::Rerank, "rerank"),
    (Field::KeywordSearch, "keyword_search"),
    (Field::FilterMemories, "filter_memories"),
    (Field::Schema, "schema"),
    (Field::ExportId, "memory_export_id"),
];

const RELATIONAL_FIELDS: Mapping = &[
    (Field::UserId, "userId"),
    (Field::SessionId, "sessionId"),
    (Field::AgentId, "agentId"),
    (Field::AppId, "appId"),
    (Field::ProjectId, "projectId"),
    (Field::OrgId, "orgId"),
    (Field::Metadata, "metadata"),
    (Field::Filters, "filters"),
];

const LOCAL_FIELDS: Mapping = &[
    (Field::UserId, "userId"),
    (Field::SessionId, "sessionId"),
    (Field::Metadata, "metadata"),
    (Field::Filters, "filters"),
];

/// Mapping table of a backend mode.
pub fn field_mapping(mode: BackendMode) -> Mapping {
    match mode {
        BackendMode::Cloud => CLOUD_FIELDS,
        BackendMode::RelationalVector => RELATIONAL_FIELDS,
        BackendMode::LocalInMemory => LOCAL_FIELDS,
    }
}

/// External key of `field` for `mode`, if the backend accepts it.
pub fn external_name(mode: BackendMode, field: Field) -> Option<&'static str> {
    field_mapping(mode)
        .iter()
        .find(|(f, _)| *f == field)
        .map(|(_, name)| *name)
}

/// A canonical call rendered for one backend.
#[derive(Debug, Clone, PartialEq)]
pub struct TranslatedRequest {
    pub mode: BackendMode,
    pub operation: Operation,
    /// Content, query or memory id, depending on the operation.
    pub subject: Option<String>,
    pub options: Options,
    /// Direct transport is preferred for this call.
    pub prefers_direct: bool,
    /// Explicit arguments the backend does not accept.
    pub ignored: Vec<&'static str>,
}

/// Translate canonical parameters into backend options.
pub fn translate(mode: BackendMode, operation: Operation, params: &CanonicalParams) -> TranslatedRequest {
    let mut options = Options::new();
    let mut ignored = Vec::new();

    for &field in accepted_fields(operation) {
        if field.is_subject() {
            continue;
        }
        let Some((value, provenance)) = params.get(field) else {
            continue;
        };
        match external_name(mode, field) {
            Some(name) => {
                options.insert(name.to_string(), value);
            }
            None if provenance == Provenance::Explicit => ignored.push(field.name()),
            None => {}
        }
    }

    if mode == BackendMode::Cloud && operation == Operation::Add {
        options.insert("version".to_string(), json!(CLOUD_ADD_VERSION));
    }

    TranslatedRequest {
        mode,
        operation,
        subject: params.subject(operation).map(str::to_string),
        options,
        prefers_direct: params.has_app_or_session(),
        ignored,
    }
}

fn body_with(key: &str, value: Value, options: &Options) -> Value {
    let mut body = Options::new();
    body.insert(key.to_string(), value);
    for (k, v) in options {
        body.insert(k.clone(), v.clone());
    }
    Value::Object(body)
}

/// Raw hosted-API request for a translated call.
pub fn direct_request(request: &TranslatedRequest) -> DirectRequest {
    let subject = request.subject.clone().unwrap_or_default();
    match request.operation {
        Operation::Add => DirectRequest {
            method: Method::POST,
            path: endpoints::MEMORIES.to_string(),
            body: Some(body_with("messages", user_messages(&subject), &request.options)),
            context: "Direct API call",
        },
        Operation::Search => DirectRequest {
            method: Method::POST,
            path: endpoints::SEARCH.to_string(),
            body: Some(body_with("query", Value::String(subject), &request.options)),
            context: "Direct search API call",
        },
        Operation::Delete => DirectRequest {
            method: Method::DELETE,
            path: endpoints::memory(&subject),
            body: None,
            context: "Direct delete API call",
        },
        Operation::CreateExport => DirectRequest {
            method: Method::POST,
            path: endpoints::EXPORTS.to_string(),
            body: Some(Value::Object(request.options.clone())),
            context: "Direct export API call",
        },
        Operation::GetExport => DirectRequest {
            method: Method::POST,
            path: endpoints::EXPORTS_GET.to_string(),
            body: Some(Value::Object(request.options.clone())),
            context: "Direct export API call",
        },
    }
}
