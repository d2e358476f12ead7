//! Resolution of tool arguments into typed canonical parameters.
//!
//! Each identifier field takes the explicit argument when one was given,
//! otherwise the environment default, otherwise stays absent. Resolution
//! is a pure function of the arguments and the defaults snapshot.

use serde_json::{Map, Value};

use crate::backend::Operation;
use crate::config::EnvironmentDefaults;
use crate::errors::Error;

/// Where a resolved value came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Provenance {
    Explicit,
    Defaulted,
}

/// A value together with its provenance.
#[derive(Debug, Clone, PartialEq)]
pub struct Resolved<T> {
    pub value: T,
    pub provenance: Provenance,
}

impl<T> Resolved<T> {
    pub fn explicit(value: T) -> Self {
        Self {
            value,
            provenance: Provenance::Explicit,
        }
    }

    pub fn defaulted(value: T) -> Self {
        Self {
            value,
            provenance: Provenance::Defaulted,
        }
    }

    pub fn is_explicit(&self) -> bool {
        self.provenance == Provenance::Explicit
    }
}

/// Semantic fields a tool call may carry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Field {
    Content,
    Query,
    MemoryId,
    UserId,
    SessionId,
    AgentId,
    AppId,
    ProjectId,
    OrgId,
    Metadata,
    Filters,
    Includes,
    Excludes,
    Infer,
    OutputFormat,
    CustomCategories,
    CustomInstructions,
    Immutable,
    ExpirationDate,
    Threshold,
    TopK,
    Fields,
    Rerank,
    KeywordSearch,
    FilterMemories,
    Schema,
    ExportId,
}

impl Field {
    /// Argument name as it appears in tool calls.
    pub fn name(&self) -> &'static str {
        match self {
            Field::Content => "content",
            Field::Query => "query",
            Field::MemoryId => "memoryId",
            Field::UserId => "userId",
            Field::SessionId => "sessionId",
            Field::AgentId => "agentId",
            Field::AppId => "appId",
            Field::ProjectId => "projectId",
            Field::OrgId => "orgId",
            Field::Metadata => "metadata",
            Field::Filters => "filters",
            Field::Includes => "includes",
            Field::Excludes => "excludes",
            Field::Infer => "infer",
            Field::OutputFormat => "outputFormat",
            Field::CustomCategories => "customCategories",
            Field::CustomInstructions => "customInstructions",
            Field::Immutable => "immutable",
            Field::ExpirationDate => "expirationDate",
            Field::Threshold => "threshold",
            Field::TopK => "topK",
            Field::Fields => "fields",
            Field::Rerank => "rerank",
            Field::KeywordSearch => "keywordSearch",
            Field::FilterMemories => "filterMemories",
            Field::Schema => "schema",
            Field::ExportId => "exportId",
        }
    }

    /// The field an operation acts on, passed to the backend positionally.
    pub fn is_subject(&self) -> bool {
        matches!(self, Field::Content | Field::Query | Field::MemoryId)
    }
}

const IDENTIFIERS: [Field; 6] = [
    Field::UserId,
    Field::SessionId,
    Field::AgentId,
    Field::AppId,
    Field::ProjectId,
    Field::OrgId,
];

/// Fields each operation reads from its arguments; anything else is ignored.
pub fn accepted_fields(operation: Operation) -> &'static [Field] {
    use Field::*;
    match operation {
        Operation::Add => &[
            Content,
            UserId,
            SessionId,
            AgentId,
            AppId,
            ProjectId,
            OrgId,
            Metadata,
            Includes,
            Excludes,
            Infer,
            OutputFormat,
            CustomCategories,
            CustomInstructions,
            Immutable,
            ExpirationDate,
        ],
        Operation::Search => &[
            Query,
            UserId,
            SessionId,
            AgentId,
            AppId,
            ProjectId,
            OrgId,
            Filters,
            Threshold,
            TopK,
            Fields,
            Rerank,
            KeywordSearch,
            FilterMemories,
        ],
        Operation::Delete => &[MemoryId, UserId, AgentId, AppId, ProjectId, OrgId],
        Operation::CreateExport => &[
            UserId, AgentId, AppId, ProjectId, OrgId, SessionId, Schema, Filters,
        ],
        Operation::GetExport => &[
            UserId, AgentId, AppId, ProjectId, OrgId, SessionId, ExportId, Filters,
        ],
    }
}

/// Canonical, typed parameters of one tool call.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CanonicalParams {
    pub content: Option<Resolved<String>>,
    pub query: Option<Resolved<String>>,
    pub memory_id: Option<Resolved<String>>,

    pub user_id: Option<Resolved<String>>,
    pub session_id: Option<Resolved<String>>,
    pub agent_id: Option<Resolved<String>>,
    pub app_id: Option<Resolved<String>>,
    pub project_id: Option<Resolved<String>>,
    pub org_id: Option<Resolved<String>>,

    pub metadata: Option<Resolved<Map<String, Value>>>,
    pub filters: Option<Resolved<Map<String, Value>>>,

    pub includes: Option<Resolved<String>>,
    pub excludes: Option<Resolved<String>>,
    pub infer: Option<Resolved<bool>>,
    pub output_format: Option<Resolved<String>>,
    pub custom_categories: Option<Resolved<Value>>,
    pub custom_instructions: Option<Resolved<String>>,
    pub immutable: Option<Resolved<bool>>,
    pub expiration_date: Option<Resolved<String>>,

    pub threshold: Option<Resolved<f64>>,
    pub top_k: Option<Resolved<u64>>,
    pub fields: Option<Resolved<Vec<String>>>,
    pub rerank: Option<Resolved<bool>>,
    pub keyword_search: Option<Resolved<bool>>,
    pub filter_memories: Option<Resolved<bool>>,

    pub schema: Option<Resolved<Map<String, Value>>>,
    pub export_id: Option<Resolved<String>>,
}

fn as_json<T: Clone + Into<Value>>(resolved: &Option<Resolved<T>>) -> Option<(Value, Provenance)> {
    resolved
        .as_ref()
        .map(|r| (r.value.clone().into(), r.provenance))
}

impl CanonicalParams {
    /// JSON value and provenance of a field, if present.
    pub fn get(&self, field: Field) -> Option<(Value, Provenance)> {
        match field {
            Field::Content => as_json(&self.content),
            Field::Query => as_json(&self.query),
            Field::MemoryId => as_json(&self.memory_id),
            Field::UserId => as_json(&self.user_id),
            Field::SessionId => as_json(&self.session_id),
            Field::AgentId => as_json(&self.agent_id),
            Field::AppId => as_json(&self.app_id),
            Field::ProjectId => as_json(&self.project_id),
            Field::OrgId => as_json(&self.org_id),
            Field::Metadata => as_json(&self.metadata),
            Field::Filters => as_json(&self.filters),
            Field::Includes => as_json(&self.includes),
            Field::Excludes => as_json(&self.excludes),
            Field::Infer => as_json(&self.infer),
            Field::OutputFormat => as_json(&self.output_format),
            Field::CustomCategories => as_json(&self.custom_categories),
            Field::CustomInstructions => as_json(&self.custom_instructions),
            Field::Immutable => as_json(&self.immutable),
            Field::ExpirationDate => as_json(&self.expiration_date),
            Field::Threshold => as_json(&self.threshold),
            Field::TopK => as_json(&self.top_k),
            Field::Fields => as_json(&self.fields),
            Field::Rerank => as_json(&self.rerank),
            Field::KeywordSearch => as_json(&self.keyword_search),
            Field::FilterMemories => as_json(&self.filter_memories),
            Field::Schema => as_json(&self.schema),
            Field::ExportId => as_json(&self.export_id),
        }
    }

    /// The subject string of the operation (content, query or memory id).
    pub fn subject(&self, operation: Operation) -> Option<&str> {
        let subject = match operation {
            Operation::Add => &self.content,
            Operation::Search => &self.query,
            Operation::Delete => &self.memory_id,
            Operation::CreateExport | Operation::GetExport => return None,
        };
        subject.as_ref().map(|r| r.value.as_str())
    }

    /// Whether the call carries an app or session scope, explicit or defaulted.
    pub fn has_app_or_session(&self) -> bool {
        self.app_id.is_some() || self.session_id.is_some()
    }
}

struct Arguments<'a> {
    args: &'a Map<String, Value>,
    accepted: &'static [Field],
}

impl<'a> Arguments<'a> {
    /// Raw argument, treating null and fields the operation ignores as absent.
    fn raw(&self, field: Field) -> Option<&'a Value> {
        if !self.accepted.contains(&field) {
            return None;
        }
        self.args.get(field.name()).filter(|v| !v.is_null())
    }

    fn string(&self, field: Field) -> Result<Option<Resolved<String>>, Error> {
        match self.raw(field) {
            None => Ok(None),
            Some(Value::String(s)) if s.trim().is_empty() => Ok(None),
            Some(Value::String(s)) => Ok(Some(Resolved::explicit(s.clone()))),
            Some(_) => Err(invalid_type(field, "a string")),
        }
    }

    fn boolean(&self, field: Field) -> Result<Option<Resolved<bool>>, Error> {
        match self.raw(field) {
            None => Ok(None),
            Some(Value::Bool(b)) => Ok(Some(Resolved::explicit(*b))),
            Some(_) => Err(invalid_type(field, "a boolean")),
        }
    }

    fn number(&self, field: Field) -> Result<Option<Resolved<f64>>, Error> {
        match self.raw(field) {
            None => Ok(None),
            Some(v) => v
                .as_f64()
                .map(|n| Some(Resolved::explicit(n)))
                .ok_or_else(|| invalid_type(field, "a number")),
        }
    }

    fn count(&self, field: Field) -> Result<Option<Resolved<u64>>, Error> {
        let Some(n) = self.number(field)? else {
            return Ok(None);
        };
        if n.value < 0.0 || n.value.fract() != 0.0 || n.value > u64::MAX as f64 {
            return Err(invalid_type(field, "a non-negative integer"));
        }
        Ok(Some(Resolved::explicit(n.value as u64)))
    }

    fn object(&self, field: Field) -> Result<Option<Resolved<Map<String, Value>>>, Error> {
        match self.raw(field) {
            None => Ok(None),
            Some(Value::Object(map)) => Ok(Some(Resolved::explicit(map.clone()))),
            Some(_) => Err(invalid_type(field, "an object")),
        }
    }

    fn structured(&self, field: Field) -> Result<Option<Resolved<Value>>, Error> {
        match self.raw(field) {
            None => Ok(None),
            Some(v @ (Value::Object(_) | Value::Array(_))) => Ok(Some(Resolved::explicit(v.clone()))),
            Some(_) => Err(invalid_type(field, "an object or array")),
        }
    }

    fn string_list(&self, field: Field) -> Result<Option<Resolved<Vec<String>>>, Error> {
        match self.raw(field) {
            None => Ok(None),
            Some(Value::Array(items)) => items
                .iter()
                .map(|item| item.as_str().map(str::to_string))
                .collect::<Option<Vec<_>>>()
                .map(|list| Some(Resolved::explicit(list)))
                .ok_or_else(|| invalid_type(field, "an array of strings")),
            Some(_) => Err(invalid_type(field, "an array of strings")),
        }
    }

    /// Explicit identifier, else the configured default.
    fn identifier(
        &self,
        field: Field,
        default: &Option<String>,
    ) -> Result<Option<Resolved<String>>, Error> {
        if let Some(explicit) = self.string(field)? {
            return Ok(Some(explicit));
        }
        if !self.accepted.contains(&field) {
            return Ok(None);
        }
        Ok(default.clone().map(Resolved::defaulted))
    }
}

fn invalid_type(field: Field, expected: &str) -> Error {
    Error::InvalidParams(format!(
        "Invalid argument: {} must be {}",
        field.name(),
        expected
    ))
}

fn missing(field: Field) -> Error {
    Error::InvalidParams(format!("Missing required argument: {}", field.name()))
}

/// Resolve tool arguments for `operation` against the defaults snapshot.
///
/// # Errors
///
/// Returns `Error::InvalidParams` when the arguments are not an object, a
/// field has the wrong type, or a required field is absent from both sources.
pub fn resolve(
    args: &Value,
    operation: Operation,
    defaults: &EnvironmentDefaults,
) -> Result<CanonicalParams, Error> {
    let empty = Map::new();
    let args = match args {
        Value::Object(map) => map,
        Value::Null => &empty,
        _ => {
            return Err(Error::InvalidParams(
                "Tool arguments must be a JSON object".to_string(),
            ))
        }
    };
    let a = Arguments {
        args,
        accepted: accepted_fields(operation),
    };

    let mut params = CanonicalParams {
        content: a.string(Field::Content)?,
        query: a.string(Field::Query)?,
        memory_id: a.string(Field::MemoryId)?,
        ..CanonicalParams::default()
    };

    let no_default = None;
    for field in IDENTIFIERS {
        let (slot, default) = match field {
            Field::UserId => (&mut params.user_id, &defaults.user_id),
            Field::SessionId => (&mut params.session_id, &no_default),
            Field::AgentId => (&mut params.agent_id, &defaults.agent_id),
            Field::AppId => (&mut params.app_id, &defaults.app_id),
            Field::ProjectId => (&mut params.project_id, &defaults.project_id),
            Field::OrgId => (&mut params.org_id, &defaults.org_id),
            _ => continue,
        };
        *slot = a.identifier(field, default)?;
    }

    params.metadata = a.object(Field::Metadata)?;
    params.filters = a.object(Field::Filters)?;

    params.includes = a.string(Field::Includes)?;
    params.excludes = a.string(Field::Excludes)?;
    params.infer = a.boolean(Field::Infer)?;
    params.output_format = a.string(Field::OutputFormat)?;
    params.custom_categories = a.structured(Field::CustomCategories)?;
    params.custom_instructions = a.string(Field::CustomInstructions)?;
    params.immutable = a.boolean(Field::Immutable)?;
    params.expiration_date = a.string(Field::ExpirationDate)?;

    params.threshold = a.number(Field::Threshold)?;
    params.top_k = a.count(Field::TopK)?;
    params.fields = a.string_list(Field::Fields)?;
    params.rerank = a.boolean(Field::Rerank)?;
    params.keyword_search = a.boolean(Field::KeywordSearch)?;
    params.filter_memories = a.boolean(Field::FilterMemories)?;

    params.schema = a.object(Field::Schema)?;
    params.export_id = a.string(Field::ExportId)?;

    let required_subject = match operation {
        Operation::Add => Some(Field::Content),
        Operation::Search => Some(Field::Query),
        Operation::Delete => Some(Field::MemoryId),
        Operation::CreateExport | Operation::GetExport => None,
    };
    if let Some(field) = required_subject {
        if params.subject(operation).is_none() {
            return Err(missing(field));
        }
    }

    if let Some(id) = &params.memory_id {
        if matches!(id.value.as_str(), "." | "..") {
            return Err(Error::InvalidParams(format!(
                "Invalid argument: memoryId \"{}\" is not a memory id",
                id.value
            )));
        }
    }

    if params.user_id.is_none() {
        return Err(Error::InvalidParams(
            "Missing required argument: userId (and no DEFAULT_USER_ID environment variable set)"
                .to_string(),
        ));
    }

    Ok(params)
}
