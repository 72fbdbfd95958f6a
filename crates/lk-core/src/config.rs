use serde::de::DeserializeOwned;

/// Error raised when the environment cannot be mapped onto a config struct.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("invalid configuration: {0}")]
    Env(#[from] envy::Error),
    #[error("invalid configuration: {field}: {reason}")]
    Invalid { field: &'static str, reason: String },
}

impl ConfigError {
    pub fn invalid(field: &'static str, reason: impl Into<String>) -> Self {
        Self::Invalid {
            field,
            reason: reason.into(),
        }
    }
}

/// Loads service configuration from environment variables.
///
/// Implementors derive `serde::Deserialize`; field `database_url` maps to
/// `DATABASE_URL`, and so on. Optional fields use `#[serde(default = ...)]`.
pub trait Config: Sized + DeserializeOwned {
    fn from_env() -> Result<Self, ConfigError> {
        let config: Self = envy::from_env()?;
        config.validate()?;
        Ok(config)
    }

    /// Same mapping as [`Config::from_env`] over an explicit variable list.
    fn from_vars<I>(vars: I) -> Result<Self, ConfigError>
    where
        I: IntoIterator<Item = (String, String)>,
    {
        let config: Self = envy::from_iter(vars)?;
        config.validate()?;
        Ok(config)
    }

    /// Range checks that serde cannot express. Runs after every load.
    fn validate(&self) -> Result<(), ConfigError> {
        Ok(())
    }
}
