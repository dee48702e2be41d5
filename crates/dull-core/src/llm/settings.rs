use std::{collections::HashMap, fmt, str::FromStr, time::Duration};

use crate::config::{ConfigError, ConfigOverrides, ProjectConfig};

pub const DEFAULT_MODEL: &str = "gpt-4o";
pub const DEFAULT_ENDPOINT: &str = "https://api.openai.com";
pub const DEFAULT_TIMEOUT_SECS: u64 = 60;

/// Sampling temperature sent with every completion request.
pub const TEMPERATURE: f32 = 0.1;

/// Backend used to answer lint requests.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ProviderKind {
    #[default]
    OpenAi,
    /// Answers every request with an empty report without touching the network.
    Noop,
}

impl FromStr for ProviderKind {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "openai" => Ok(Self::OpenAi),
            "noop" => Ok(Self::Noop),
            other => Err(ConfigError::UnknownProvider(other.to_string())),
        }
    }
}

/// Resolved connection settings for the LLM backend.
#[derive(Clone, PartialEq, Eq)]
pub struct LlmSettings {
    pub provider: ProviderKind,
    pub api_key: String,
    pub endpoint: String,
    pub model: String,
    pub timeout: Duration,
}

impl fmt::Debug for LlmSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LlmSettings")
            .field("provider", &self.provider)
            .field("api_key", &"<redacted>")
            .field("endpoint", &self.endpoint)
            .field("model", &self.model)
            .field("timeout", &self.timeout)
            .finish()
    }
}

impl LlmSettings {
    pub const API_KEY_ENV: &'static str = "OPENAI_API_KEY";
    pub const PROVIDER_ENV: &'static str = "DULL_PROVIDER";
    pub const MODEL_ENV: &'static str = "DULL_MODEL";
    pub const ENDPOINT_ENV: &'static str = "DULL_ENDPOINT";
    pub const TIMEOUT_ENV: &'static str = "DULL_TIMEOUT_SECS";

    /// Resolve settings from command-line overrides, environment variables and
    /// the project config file.
    ///
    /// * `OPENAI_API_KEY` — credential; wins over `openai_api_key` in the project file.
    /// * `DULL_PROVIDER`  — `openai` (default) or `noop`.
    /// * `DULL_MODEL`, `DULL_ENDPOINT`, `DULL_TIMEOUT_SECS` — sit between the
    ///   command line and the project file. A timeout that is not a whole
    ///   number of seconds is an error.
    pub fn resolve(
        overrides: &ConfigOverrides,
        project: &ProjectConfig,
        vars: &HashMap<String, String>,
    ) -> Result<Self, ConfigError> {
        let api_key = non_blank(vars.get(Self::API_KEY_ENV).map(String::as_str))
            .or_else(|| non_blank(project.openai_api_key.as_deref()))
            .ok_or(ConfigError::MissingApiKey)?;

        let provider = match non_blank(vars.get(Self::PROVIDER_ENV).map(String::as_str)) {
            Some(raw) => raw.parse()?,
            None => ProviderKind::default(),
        };

        let model = non_blank(overrides.model.as_deref())
            .or_else(|| non_blank(vars.get(Self::MODEL_ENV).map(String::as_str)))
            .or_else(|| non_blank(project.model.as_deref()))
            .unwrap_or_else(|| DEFAULT_MODEL.to_string());

        let endpoint = non_blank(vars.get(Self::ENDPOINT_ENV).map(String::as_str))
            .or_else(|| non_blank(project.endpoint.as_deref()))
            .unwrap_or_else(|| DEFAULT_ENDPOINT.to_string());

        let env_timeout = match non_blank(vars.get(Self::TIMEOUT_ENV).map(String::as_str)) {
            Some(raw) => Some(
                raw.parse::<u64>()
                    .map_err(|_| ConfigError::InvalidTimeout(raw.clone()))?,
            ),
            None => None,
        };
        let timeout_secs = overrides
            .timeout_secs
            .or(env_timeout)
            .or(project.timeout_secs)
            .filter(|secs| *secs > 0)
            .unwrap_or(DEFAULT_TIMEOUT_SECS);

        Ok(Self {
            provider,
            api_key,
            endpoint,
            model,
            timeout: Duration::from_secs(timeout_secs),
        })
    }
}

pub(crate) fn non_blank(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vars(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn defaults_when_only_key_is_set() {
        let settings = LlmSettings::resolve(
            &ConfigOverrides::default(),
            &ProjectConfig::default(),
            &vars(&[(LlmSettings::API_KEY_ENV, "secret")]),
        )
        .expect("should resolve settings");
        assert_eq!(settings.provider, ProviderKind::OpenAi);
        assert_eq!(settings.api_key, "secret");
        assert_eq!(settings.model, DEFAULT_MODEL);
        assert_eq!(settings.endpoint, DEFAULT_ENDPOINT);
        assert_eq!(settings.timeout, Duration::from_secs(DEFAULT_TIMEOUT_SECS));
    }

    #[test]
    fn environment_key_wins_over_project_key() {
        let project = ProjectConfig {
            openai_api_key: Some("sk-file".into()),
            ..ProjectConfig::default()
        };
        let settings = LlmSettings::resolve(
            &ConfigOverrides::default(),
            &project,
            &vars(&[(LlmSettings::API_KEY_ENV, "sk-env")]),
        )
        .unwrap();
        assert_eq!(settings.api_key, "sk-env");
    }

    #[test]
    fn project_key_used_when_environment_blank() {
        let project = ProjectConfig {
            openai_api_key: Some("sk-file".into()),
            ..ProjectConfig::default()
        };
        let settings = LlmSettings::resolve(
            &ConfigOverrides::default(),
            &project,
            &vars(&[(LlmSettings::API_KEY_ENV, "   ")]),
        )
        .unwrap();
        assert_eq!(settings.api_key, "sk-file");
    }

    #[test]
    fn errors_when_api_key_missing() {
        let err = LlmSettings::resolve(
            &ConfigOverrides::default(),
            &ProjectConfig::default(),
            &HashMap::new(),
        )
        .expect_err("missing API key should error");
        assert!(matches!(err, ConfigError::MissingApiKey));
        assert!(err.to_string().contains(LlmSettings::API_KEY_ENV));
    }

    #[test]
    fn command_line_beats_environment_beats_project() {
        let project = ProjectConfig {
            model: Some("file-model".into()),
            timeout_secs: Some(10),
            endpoint: Some("http://file".into()),
            ..ProjectConfig::default()
        };
        let env = vars(&[
            (LlmSettings::API_KEY_ENV, "secret"),
            (LlmSettings::MODEL_ENV, "env-model"),
            (LlmSettings::TIMEOUT_ENV, "20"),
        ]);

        let from_env =
            LlmSettings::resolve(&ConfigOverrides::default(), &project, &env).unwrap();
        assert_eq!(from_env.model, "env-model");
        assert_eq!(from_env.timeout, Duration::from_secs(20));
        assert_eq!(from_env.endpoint, "http://file");

        let overrides = ConfigOverrides {
            model: Some("cli-model".into()),
            timeout_secs: Some(30),
            ..ConfigOverrides::default()
        };
        let from_cli = LlmSettings::resolve(&overrides, &project, &env).unwrap();
        assert_eq!(from_cli.model, "cli-model");
        assert_eq!(from_cli.timeout, Duration::from_secs(30));
    }

    #[test]
    fn parses_provider() {
        let settings = LlmSettings::resolve(
            &ConfigOverrides::default(),
            &ProjectConfig::default(),
            &vars(&[
                (LlmSettings::API_KEY_ENV, "secret"),
                (LlmSettings::PROVIDER_ENV, "NoOp"),
            ]),
        )
        .unwrap();
        assert_eq!(settings.provider, ProviderKind::Noop);

        let err = LlmSettings::resolve(
            &ConfigOverrides::default(),
            &ProjectConfig::default(),
            &vars(&[
                (LlmSettings::API_KEY_ENV, "secret"),
                (LlmSettings::PROVIDER_ENV, "gemini"),
            ]),
        )
        .unwrap_err();
        assert!(matches!(err, ConfigError::UnknownProvider(p) if p == "gemini"));
    }

    #[test]
    fn malformed_timeout_env_is_rejected() {
        let err = LlmSettings::resolve(
            &ConfigOverrides::default(),
            &ProjectConfig::default(),
            &vars(&[
                (LlmSettings::API_KEY_ENV, "secret"),
                (LlmSettings::TIMEOUT_ENV, "soon"),
            ]),
        )
        .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidTimeout(ref raw) if raw == "soon"));

        let blank = LlmSettings::resolve(
            &ConfigOverrides::default(),
            &ProjectConfig {
                timeout_secs: Some(5),
                ..ProjectConfig::default()
            },
            &vars(&[
                (LlmSettings::API_KEY_ENV, "secret"),
                (LlmSettings::TIMEOUT_ENV, "  "),
            ]),
        )
        .unwrap();
        assert_eq!(blank.timeout, Duration::from_secs(5));
    }

    #[test]
    fn debug_output_redacts_key() {
        let settings = LlmSettings::resolve(
            &ConfigOverrides::default(),
            &ProjectConfig::default(),
            &vars(&[(LlmSettings::API_KEY_ENV, "sk-very-secret")]),
        )
        .unwrap();
        assert!(!format!("{settings:?}").contains("sk-very-secret"));
    }
}
