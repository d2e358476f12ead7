//! Environment variable parsing utilities for configuration.

use crate::errors::Error;

use super::EnvLookup;

pub const MEM0_API_KEY: &str = "MEM0_API_KEY";
pub const SUPABASE_URL: &str = "SUPABASE_URL";
pub const SUPABASE_KEY: &str = "SUPABASE_KEY";
pub const OPENAI_API_KEY: &str = "OPENAI_API_KEY";

pub const DEFAULT_USER_ID: &str = "DEFAULT_USER_ID";
pub const DEFAULT_AGENT_ID: &str = "DEFAULT_AGENT_ID";
pub const DEFAULT_APP_ID: &str = "DEFAULT_APP_ID";
pub const DEFAULT_PROJECT_ID: &str = "DEFAULT_PROJECT_ID";
pub const DEFAULT_ORG_ID: &str = "DEFAULT_ORG_ID";

/// Parse environment variable value or return error if empty/whitespace.
pub(super) fn parse_env_string(name: &str, value: &str) -> Result<String, Error> {
    if value.trim().is_empty() {
        return Err(Error::Config(format!("{name} cannot be empty")));
    }
    Ok(value.trim().to_string())
}

/// Parse environment variable as a positive integer.
pub(super) fn parse_env_usize(name: &str, value: &str) -> Result<usize, Error> {
    if value.trim().is_empty() {
        return Err(Error::Config(format!("{name} cannot be empty")));
    }
    value
        .trim()
        .parse()
        .map_err(|e| Error::Config(format!("Invalid {name} value: {e}")))
}

/// Read a variable whose empty value means "not set".
fn optional_var(env: EnvLookup<'_>, name: &str) -> Option<String> {
    env(name)
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Credential bundles visible at startup.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct CredentialSnapshot {
    /// Hosted API key.
    pub mem0_api_key: Option<String>,
    /// Relational store URL.
    pub supabase_url: Option<String>,
    /// Relational store service key.
    pub supabase_key: Option<String>,
    /// Embedding provider key.
    pub openai_api_key: Option<String>,
}

impl CredentialSnapshot {
    pub fn from_env(env: EnvLookup<'_>) -> Self {
        Self {
            mem0_api_key: optional_var(env, MEM0_API_KEY),
            supabase_url: optional_var(env, SUPABASE_URL),
            supabase_key: optional_var(env, SUPABASE_KEY),
            openai_api_key: optional_var(env, OPENAI_API_KEY),
        }
    }
}

impl std::fmt::Debug for CredentialSnapshot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CredentialSnapshot")
            .field("mem0_api_key", &self.mem0_api_key.as_ref().map(|_| "<set>"))
            .field("supabase_url", &self.supabase_url)
            .field("supabase_key", &self.supabase_key.as_ref().map(|_| "<set>"))
            .field(
                "openai_api_key",
                &self.openai_api_key.as_ref().map(|_| "<set>"),
            )
            .finish()
    }
}

/// Identifier defaults applied when a tool call omits the field.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EnvironmentDefaults {
    pub user_id: Option<String>,
    pub agent_id: Option<String>,
    pub app_id: Option<String>,
    pub project_id: Option<String>,
    pub org_id: Option<String>,
}

impl EnvironmentDefaults {
    pub fn from_env(env: EnvLookup<'_>) -> Self {
        Self {
            user_id: optional_var(env, DEFAULT_USER_ID),
            agent_id: optional_var(env, DEFAULT_AGENT_ID),
            app_id: optional_var(env, DEFAULT_APP_ID),
            project_id: optional_var(env, DEFAULT_PROJECT_ID),
            org_id: optional_var(env, DEFAULT_ORG_ID),
        }
    }
}
