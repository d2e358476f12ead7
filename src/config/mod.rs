//! Configuration system for memrelay.
//!
//! Tunables follow the priority defaults < config file < env vars.
//! Credentials and identifier defaults come from the environment only and
//! are captured once into immutable snapshots.

mod env_parser;
mod loader;
mod overrides;
mod paths;
mod validation;

use crate::embedding::{DEFAULT_EMBEDDING_DIMS, DEFAULT_EMBEDDING_MODEL};
use crate::errors::Error;
use std::path::{Path, PathBuf};

pub use env_parser::{CredentialSnapshot, EnvironmentDefaults};
pub use loader::ConfigFile;

/// Environment variable naming an explicit config file.
pub const CONFIG_PATH_VAR: &str = "MEMRELAY_CONFIG";

/// Read-only view of an environment, injected so that loading stays testable.
pub type EnvLookup<'a> = &'a dyn Fn(&str) -> Option<String>;

/// Lookup backed by the real process environment.
pub fn process_env(name: &str) -> Option<String> {
    std::env::var(name).ok()
}

/// Configuration values with priority: defaults < config file < env vars.
#[derive(Debug, Clone)]
pub struct Config {
    /// Credential bundles present at startup.
    pub credentials: CredentialSnapshot,

    /// Per-identifier defaults from `DEFAULT_*` variables.
    pub defaults: EnvironmentDefaults,

    /// Base URL of the hosted memory API.
    pub cloud_base_url: String,

    /// Base URL of the OpenAI-compatible embedding API.
    pub openai_base_url: String,

    /// Embedding model used by the library-backed stores.
    pub embedding_model: String,

    /// Dimensionality of the embedding model.
    pub embedding_dims: usize,

    /// Vectors table of the relational store.
    pub supabase_table: String,

    /// History table of the relational store.
    pub supabase_history_table: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            credentials: CredentialSnapshot::default(),
            defaults: EnvironmentDefaults::default(),
            cloud_base_url: "https://api.mem0.ai".to_string(),
            openai_base_url: "https://api.openai.com/v1".to_string(),
            embedding_model: DEFAULT_EMBEDDING_MODEL.to_string(),
            embedding_dims: DEFAULT_EMBEDDING_DIMS,
            supabase_table: "memories".to_string(),
            supabase_history_table: "memory_history".to_string(),
        }
    }
}

impl Config {
    /// Load configuration from the process environment and the default file location.
    pub fn load(explicit_file: Option<&Path>) -> Result<Self, Error> {
        Self::load_from(&process_env, explicit_file)
    }

    /// Load configuration with defaults, file values, and environment overrides.
    pub fn load_from(env: EnvLookup<'_>, explicit_file: Option<&Path>) -> Result<Self, Error> {
        let file_path = match explicit_file {
            Some(path) => Some(paths::expand_tilde_path(path)),
            None => match env(CONFIG_PATH_VAR) {
                Some(val) if !val.trim().is_empty() => {
                    Some(paths::expand_tilde_path(&PathBuf::from(val.trim())))
                }
                _ => None,
            },
        };
        let file_config = loader::load_from_file(file_path.as_deref())?;

        let mut config = Config::default();

        if let Some(file) = file_config {
            config.merge_from_file(file);
        }

        overrides::apply_env_overrides(env, &mut config)?;

        config.credentials = CredentialSnapshot::from_env(env);
        config.defaults = EnvironmentDefaults::from_env(env);

        config.validate()?;

        Ok(config)
    }

    /// Merge configuration from a file into this config.
    fn merge_from_file(&mut self, file: ConfigFile) {
        if let Some(url) = file.cloud_base_url {
            self.cloud_base_url = url;
        }
        if let Some(url) = file.openai_base_url {
            self.openai_base_url = url;
        }
        if let Some(model) = file.embedding_model {
            self.embedding_model = model;
        }
        if let Some(dims) = file.embedding_dims {
            self.embedding_dims = dims;
        }
        if let Some(table) = file.supabase_table {
            self.supabase_table = table;
        }
        if let Some(table) = file.supabase_history_table {
            self.supabase_history_table = table;
        }
    }

    /// Validate configuration values.
    fn validate(&self) -> Result<(), Error> {
        let validator = validation::ConfigValidator {
            cloud_base_url: &self.cloud_base_url,
            openai_base_url: &self.openai_base_url,
            embedding_model: &self.embedding_model,
            embedding_dims: self.embedding_dims,
            supabase_table: &self.supabase_table,
            supabase_history_table: &self.supabase_history_table,
        };

        validator.validate()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use tempfile::TempDir;

    fn env_of(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_default_config() {
        let config = Config::default();

        assert_eq!(config.cloud_base_url, "https://api.mem0.ai");
        assert_eq!(config.embedding_model, "text-embedding-3-small");
        assert_eq!(config.embedding_dims, 1536);
        assert_eq!(config.supabase_table, "memories");
        assert!(config.credentials.mem0_api_key.is_none());
        assert!(config.defaults.user_id.is_none());
    }

    #[test]
    fn test_config_load_without_file() {
        let env = env_of(&[("MEM0_API_KEY", "m0-key"), ("DEFAULT_USER_ID", "alice")]);
        let dir = TempDir::new().unwrap();
        let missing = dir.path().join("absent.toml");

        let config = Config::load_from(&|k| env.get(k).cloned(), Some(&missing)).unwrap();

        assert_eq!(config.cloud_base_url, "https://api.mem0.ai");
        assert_eq!(config.credentials.mem0_api_key.as_deref(), Some("m0-key"));
        assert_eq!(config.defaults.user_id.as_deref(), Some("alice"));
    }

    #[test]
    fn test_config_file_overrides_defaults() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(
            &path,
            "embedding_model = \"text-embedding-3-large\"\nembedding_dims = 3072\n",
        )
        .unwrap();
        let env = env_of(&[]);

        let config = Config::load_from(&|k| env.get(k).cloned(), Some(&path)).unwrap();

        assert_eq!(config.embedding_model, "text-embedding-3-large");
        assert_eq!(config.embedding_dims, 3072);
        assert_eq!(config.supabase_table, "memories");
    }

    #[test]
    fn test_env_overrides_config_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "cloud_base_url = \"https://file.example\"\n").unwrap();
        let env = env_of(&[("MEMRELAY_CLOUD_BASE_URL", "https://env.example")]);

        let config = Config::load_from(&|k| env.get(k).cloned(), Some(&path)).unwrap();

        assert_eq!(config.cloud_base_url, "https://env.example");
    }

    #[test]
    fn test_config_path_from_env() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("custom.toml");
        std::fs::write(&path, "supabase_table = \"agent_memories\"\n").unwrap();
        let env = env_of(&[(CONFIG_PATH_VAR, path.to_str().unwrap())]);

        let config = Config::load_from(&|k| env.get(k).cloned(), None).unwrap();

        assert_eq!(config.supabase_table, "agent_memories");
    }

    #[test]
    fn test_invalid_override_rejected() {
        let dir = TempDir::new().unwrap();
        let missing = dir.path().join("absent.toml");
        let env = env_of(&[("MEMRELAY_EMBEDDING_DIMS", "0")]);

        let result = Config::load_from(&|k| env.get(k).cloned(), Some(&missing));

        assert!(matches!(result, Err(Error::Config(_))));
    }
}
