//! Configuration validation logic.

use crate::errors::Error;

/// Largest vector width accepted by the relational store's vector column.
const MAX_EMBEDDING_DIMS: usize = 16_000;

/// Validates configuration values.
pub struct ConfigValidator<'a> {
    /// Hosted API base URL.
    pub cloud_base_url: &'a str,
    /// Embedding API base URL.
    pub openai_base_url: &'a str,
    /// Embedding model identifier.
    pub embedding_model: &'a str,
    /// Embedding width.
    pub embedding_dims: usize,
    /// Relational vectors table.
    pub supabase_table: &'a str,
    /// Relational history table.
    pub supabase_history_table: &'a str,
}

impl ConfigValidator<'_> {
    /// Validate all configuration values for correctness and constraints.
    ///
    /// Checks that:
    /// - Base URLs use http or https
    /// - Embedding model is not empty
    /// - Embedding dims are within 1..=16000
    /// - Table names are plain SQL identifiers
    ///
    /// # Errors
    ///
    /// Returns `Error::Config` if any validation check fails.
    pub fn validate(&self) -> Result<(), Error> {
        Self::validate_url("cloud base URL", self.cloud_base_url)?;
        Self::validate_url("OpenAI base URL", self.openai_base_url)?;
        self.validate_embedding_model()?;
        self.validate_embedding_dims()?;
        Self::validate_table("Supabase table", self.supabase_table)?;
        Self::validate_table("Supabase history table", self.supabase_history_table)?;

        Ok(())
    }

    fn validate_url(label: &str, url: &str) -> Result<(), Error> {
        if !(url.starts_with("http://") || url.starts_with("https://")) {
            return Err(Error::Config(format!(
                "Invalid {label}: {url} (must start with http:// or https://)"
            )));
        }
        Ok(())
    }

    fn validate_embedding_model(&self) -> Result<(), Error> {
        if self.embedding_model.trim().is_empty() {
            return Err(Error::Config("Embedding model cannot be empty".to_string()));
        }
        Ok(())
    }

    fn validate_embedding_dims(&self) -> Result<(), Error> {
        if self.embedding_dims == 0 || self.embedding_dims > MAX_EMBEDDING_DIMS {
            return Err(Error::Config(format!(
                "Invalid embedding dims: {} (must be between 1 and {MAX_EMBEDDING_DIMS})",
                self.embedding_dims
            )));
        }
        Ok(())
    }

    fn validate_table(label: &str, name: &str) -> Result<(), Error> {
        let valid = !name.is_empty()
            && !name.starts_with(|c: char| c.is_ascii_digit())
            && name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_');
        if !valid {
            return Err(Error::Config(format!(
                "Invalid {label} name: {name:?} (letters, digits and underscores only)"
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid() -> ConfigValidator<'static> {
        ConfigValidator {
            cloud_base_url: "https://api.mem0.ai",
            openai_base_url: "https://api.openai.com/v1",
            embedding_model: "text-embedding-3-small",
            embedding_dims: 1536,
            supabase_table: "memories",
            supabase_history_table: "memory_history",
        }
    }

    #[test]
    fn test_valid_config() {
        assert!(valid().validate().is_ok());
    }

    #[test]
    fn test_invalid_url_scheme() {
        let validator = ConfigValidator {
            cloud_base_url: "ftp://api.mem0.ai",
            ..valid()
        };
        assert!(matches!(validator.validate(), Err(Error::Config(_))));
    }

    #[test]
    fn test_empty_model_rejected() {
        let validator = ConfigValidator {
            embedding_model: " ",
            ..valid()
        };
        assert!(matches!(validator.validate(), Err(Error::Config(_))));
    }

    #[test]
    fn test_dims_bounds() {
        let mut validator = valid();
        validator.embedding_dims = 0;
        assert!(validator.validate().is_err());

        validator.embedding_dims = 16_001;
        assert!(validator.validate().is_err());

        validator.embedding_dims = 1;
        assert!(validator.validate().is_ok());

        validator.embedding_dims = 16_000;
        assert!(validator.validate().is_ok());
    }

    #[test]
    fn test_table_name_injection_rejected() {
        let validator = ConfigValidator {
            supabase_table: "memories;drop",
            ..valid()
        };
        assert!(matches!(validator.validate(), Err(Error::Config(_))));

        let validator = ConfigValidator {
            supabase_history_table: "1history",
            ..valid()
        };
        assert!(matches!(validator.validate(), Err(Error::Config(_))));
    }
}
