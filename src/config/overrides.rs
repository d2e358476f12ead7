//! Environment variable overrides for configuration.

use crate::errors::Error;

use super::env_parser::{parse_env_string, parse_env_usize};
use super::{Config, EnvLookup};

const CLOUD_BASE_URL: &str = "MEMRELAY_CLOUD_BASE_URL";
const OPENAI_BASE_URL: &str = "MEMRELAY_OPENAI_BASE_URL";
const EMBEDDING_MODEL: &str = "MEMRELAY_EMBEDDING_MODEL";
const EMBEDDING_DIMS: &str = "MEMRELAY_EMBEDDING_DIMS";
const SUPABASE_TABLE: &str = "MEMRELAY_SUPABASE_TABLE";
const SUPABASE_HISTORY_TABLE: &str = "MEMRELAY_SUPABASE_HISTORY_TABLE";

fn override_string(env: EnvLookup<'_>, name: &str, target: &mut String) -> Result<(), Error> {
    if let Some(val) = env(name) {
        *target = parse_env_string(name, &val)?;
    }
    Ok(())
}

/// Apply environment variable overrides to configuration.
///
/// A variable that is set must carry a usable value; empty strings are
/// rejected rather than ignored.
pub fn apply_env_overrides(env: EnvLookup<'_>, config: &mut Config) -> Result<(), Error> {
    override_string(env, CLOUD_BASE_URL, &mut config.cloud_base_url)?;
    override_string(env, OPENAI_BASE_URL, &mut config.openai_base_url)?;
    override_string(env, EMBEDDING_MODEL, &mut config.embedding_model)?;
    if let Some(val) = env(EMBEDDING_DIMS) {
        config.embedding_dims = parse_env_usize(EMBEDDING_DIMS, &val)?;
    }
    override_string(env, SUPABASE_TABLE, &mut config.supabase_table)?;
    override_string(env, SUPABASE_HISTORY_TABLE, &mut config.supabase_history_table)?;
    Ok(())
}
