//! Session configuration read from the environment.

use std::env;
use std::error::Error;
use std::fmt::{self, Display};
use std::path::PathBuf;

use nebula_core::Deployment;
use nebula_model::Mode;

/// Settings of a [`Session`](crate::Session).
#[derive(Clone, PartialEq, Eq)]
pub struct Config {
    /// Which engines are candidates.
    pub deployment: Deployment,
    /// Credential of the cloud engine. The cloud engine is skipped without
    /// it.
    pub cloud_api_key: Option<String>,
    /// Cloud model id, the engine default if unset.
    pub cloud_model: Option<String>,
    /// Base URL of the server proxy.
    pub proxy_url: Option<String>,
    /// Base URL of a local OpenAI-compatible server. The on-device engine
    /// is skipped without it.
    pub local_url: Option<String>,
    /// Local model artifact name.
    pub local_model: Option<String>,
    /// Overrides the hardware acceleration probe.
    pub force_acceleration: Option<bool>,
    /// Directory of the transcript snapshot, the platform data directory
    /// if unset.
    pub data_dir: Option<PathBuf>,
    /// Initial mode.
    pub mode: Mode,
    /// Whether to annotate the system turn with the engine name.
    pub annotate_engine: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            deployment: Deployment::default(),
            cloud_api_key: None,
            cloud_model: None,
            proxy_url: None,
            local_url: None,
            local_model: None,
            force_acceleration: None,
            data_dir: None,
            mode: Mode::default(),
            annotate_engine: false,
        }
    }
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("deployment", &self.deployment)
            .field(
                "cloud_api_key",
                &self.cloud_api_key.as_ref().map(|_| "<redacted>"),
            )
            .field("cloud_model", &self.cloud_model)
            .field("proxy_url", &self.proxy_url)
            .field("local_url", &self.local_url)
            .field("local_model", &self.local_model)
            .field("force_acceleration", &self.force_acceleration)
            .field("data_dir", &self.data_dir)
            .field("mode", &self.mode)
            .field("annotate_engine", &self.annotate_engine)
            .finish()
    }
}

/// Error returned when a variable holds an invalid value.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ConfigError {
    name: &'static str,
    value: String,
}

impl ConfigError {
    /// Returns the name of the offending variable.
    #[inline]
    pub fn name(&self) -> &str {
        self.name
    }
}

impl Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid value for {}: {:?}", self.name, self.value)
    }
}

impl Error for ConfigError {}

impl Config {
    /// Reads the configuration from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_vars(|name| env::var(name).ok())
    }

    /// Reads the configuration through `var`, which returns the value of
    /// the named variable.
    pub fn from_vars<F>(var: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        // Blank values are treated as unset.
        let var = |name: &str| var(name).filter(|value| !value.trim().is_empty());

        let mut config = Config {
            cloud_api_key: var("GEMINI_API_KEY"),
            cloud_model: var("NEBULA_CLOUD_MODEL"),
            proxy_url: var("NEBULA_PROXY_URL"),
            local_url: var("NEBULA_LOCAL_URL"),
            local_model: var("NEBULA_LOCAL_MODEL"),
            data_dir: var("NEBULA_DATA_DIR").map(PathBuf::from),
            ..Default::default()
        };
        if let Some(value) = var("NEBULA_DEPLOYMENT") {
            config.deployment = value
                .parse()
                .map_err(|_| invalid("NEBULA_DEPLOYMENT", value))?;
        }
        if let Some(value) = var("NEBULA_MODE") {
            config.mode =
                value.parse().map_err(|_| invalid("NEBULA_MODE", value))?;
        }
        if let Some(value) = var("NEBULA_FORCE_ACCELERATION") {
            config.force_acceleration =
                Some(parse_flag("NEBULA_FORCE_ACCELERATION", value)?);
        }
        if let Some(value) = var("NEBULA_ANNOTATE_ENGINE") {
            config.annotate_engine =
                parse_flag("NEBULA_ANNOTATE_ENGINE", value)?;
        }
        Ok(config)
    }
}

fn parse_flag(name: &'static str, value: String) -> Result<bool, ConfigError> {
    match value.trim().to_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(invalid(name, value)),
    }
}

#[inline]
fn invalid(name: &'static str, value: String) -> ConfigError {
    ConfigError { name, value }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn config_from(pairs: &[(&str, &str)]) -> Result<Config, ConfigError> {
        let vars: HashMap<_, _> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_vars(|name| vars.get(name).cloned())
    }

    #[test]
    fn test_defaults() {
        let config = config_from(&[]).unwrap();
        assert_eq!(config, Config::default());
        assert_eq!(config.deployment, Deployment::Standard);
        assert_eq!(config.mode, Mode::Professional);
    }

    #[test]
    fn test_from_vars() {
        let config = config_from(&[
            ("GEMINI_API_KEY", "secret"),
            ("NEBULA_DEPLOYMENT", "admin"),
            ("NEBULA_MODE", "Minimal"),
            ("NEBULA_LOCAL_URL", "http://127.0.0.1:8080/v1"),
            ("NEBULA_FORCE_ACCELERATION", "1"),
            ("NEBULA_ANNOTATE_ENGINE", "true"),
            ("NEBULA_DATA_DIR", "/tmp/nebula"),
            ("NEBULA_CLOUD_MODEL", " "),
        ])
        .unwrap();
        assert_eq!(config.deployment, Deployment::Admin);
        assert_eq!(config.mode, Mode::Minimal);
        assert_eq!(config.cloud_api_key.as_deref(), Some("secret"));
        assert_eq!(config.cloud_model, None);
        assert_eq!(config.force_acceleration, Some(true));
        assert!(config.annotate_engine);
        assert_eq!(config.data_dir, Some(PathBuf::from("/tmp/nebula")));
        assert!(!format!("{config:?}").contains("secret"));
    }

    #[test]
    fn test_invalid_values() {
        let err = config_from(&[("NEBULA_MODE", "stealthy")]).unwrap_err();
        assert_eq!(err.name(), "NEBULA_MODE");

        let err =
            config_from(&[("NEBULA_ANNOTATE_ENGINE", "maybe")]).unwrap_err();
        assert_eq!(err.name(), "NEBULA_ANNOTATE_ENGINE");

        assert!(config_from(&[("NEBULA_DEPLOYMENT", "edge")]).is_err());
    }
}
