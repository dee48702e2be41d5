//! Project configuration and per-run [`Config`] assembly.
//!
//! Sources, highest precedence first:
//! - command-line flags ([`ConfigOverrides`])
//! - environment variables (`OPENAI_API_KEY`, `DULL_*`)
//! - the project file: `[tool.dull]` in `pyproject.toml`, else `dull.toml`
//! - built-in defaults (`.` for files, the registry's default list for rules)
//!
//! The API key is the exception: the environment wins over the project file
//! and there is no default.

use std::{
    collections::HashMap,
    path::{Path, PathBuf},
};

use serde::Deserialize;
use thiserror::Error;
use tracing::{debug, info};

use crate::{
    files::{CollectError, FileCollector, SourceFile, DEFAULT_EXTENSION, SCAN_ALL},
    llm::{non_blank, LlmSettings},
    rules::{registry::RuleRegistry, RuleSet},
};

pub const PYPROJECT_FILE: &str = "pyproject.toml";
pub const STANDALONE_FILE: &str = "dull.toml";
pub const DEFAULT_RULES_DIR: &str = "rules";

/// Errors that abort configuration before any request is made.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error(
        "no OpenAI API key configured; set {} or `openai_api_key` in the project config",
        LlmSettings::API_KEY_ENV
    )]
    MissingApiKey,
    #[error("unknown provider `{0}` (expected `openai` or `noop`)")]
    UnknownProvider(String),
    #[error("invalid timeout `{0}`: expected a whole number of seconds")]
    InvalidTimeout(String),
    #[error("config file {} does not exist", .0.display())]
    NotFound(PathBuf),
    #[error("failed to load project config from {}", path.display())]
    Load {
        path: PathBuf,
        #[source]
        source: ::config::ConfigError,
    },
    #[error(transparent)]
    Collect(#[from] CollectError),
}

/// Values read from the project config file.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct ProjectConfig {
    #[serde(default)]
    pub rules: Vec<String>,
    #[serde(default)]
    pub extend_rules: Vec<String>,
    #[serde(default)]
    pub ignore_rules: Vec<String>,
    #[serde(default)]
    pub files: Vec<String>,
    #[serde(default)]
    pub exclude: Vec<String>,
    pub openai_api_key: Option<String>,
    pub model: Option<String>,
    pub endpoint: Option<String>,
    pub timeout_secs: Option<u64>,
    pub extension: Option<String>,
    pub rules_dir: Option<String>,
}

#[derive(Deserialize)]
struct Pyproject {
    tool: Option<ToolTable>,
}

#[derive(Deserialize)]
struct ToolTable {
    dull: Option<ProjectConfig>,
}

impl ProjectConfig {
    /// Look for `pyproject.toml` (with a `[tool.dull]` table) and then
    /// `dull.toml` under `root`. Returns defaults when neither applies.
    pub fn discover(root: &Path) -> Result<Self, ConfigError> {
        let pyproject = root.join(PYPROJECT_FILE);
        if pyproject.is_file() {
            if let Some(config) = Self::read_table(&pyproject)? {
                debug!(path = %pyproject.display(), "using [tool.dull] from pyproject");
                return Ok(config);
            }
        }
        let standalone = root.join(STANDALONE_FILE);
        if standalone.is_file() {
            debug!(path = %standalone.display(), "using standalone project config");
            return Self::from_file(&standalone);
        }
        debug!(root = %root.display(), "no project config found; using defaults");
        Ok(Self::default())
    }

    /// Load an explicitly named file. `pyproject.toml` is read from its
    /// `[tool.dull]` table, any other file from its root table.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        if !path.is_file() {
            return Err(ConfigError::NotFound(path.to_path_buf()));
        }
        Ok(Self::read_table(path)?.unwrap_or_default())
    }

    /// Directory holding rule documents, relative paths resolved against `root`.
    ///
    /// Without a `rules_dir` key, `<root>/rules` is used if it exists. `None`
    /// means the compiled-in rule pack applies.
    pub fn rules_dir(&self, root: &Path) -> Option<PathBuf> {
        if let Some(dir) = non_blank(self.rules_dir.as_deref()) {
            return Some(root.join(dir));
        }
        let local = root.join(DEFAULT_RULES_DIR);
        local.is_dir().then_some(local)
    }

    fn read_table(path: &Path) -> Result<Option<Self>, ConfigError> {
        let load_err = |source| ConfigError::Load {
            path: path.to_path_buf(),
            source,
        };
        let raw = ::config::Config::builder()
            .add_source(::config::File::from(path).format(::config::FileFormat::Toml))
            .build()
            .map_err(load_err)?;

        let is_pyproject = path.file_name().and_then(|n| n.to_str()) == Some(PYPROJECT_FILE);
        if is_pyproject {
            let pyproject: Pyproject = raw.try_deserialize().map_err(load_err)?;
            Ok(pyproject.tool.and_then(|tool| tool.dull))
        } else {
            raw.try_deserialize().map(Some).map_err(load_err)
        }
    }
}

/// Command-line values that take precedence over every other source.
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub rules: Vec<String>,
    pub extend_rules: Vec<String>,
    pub ignore_rules: Vec<String>,
    pub files: Vec<String>,
    pub exclude: Vec<String>,
    pub model: Option<String>,
    pub timeout_secs: Option<u64>,
    pub extension: Option<String>,
}

/// Everything one lint run needs, assembled once and passed down.
#[derive(Debug, Clone)]
pub struct Config {
    pub rules: RuleSet,
    pub files: Vec<SourceFile>,
    pub llm: LlmSettings,
}

impl Config {
    /// Assemble using the process environment.
    pub fn assemble(
        overrides: &ConfigOverrides,
        project: &ProjectConfig,
        registry: &RuleRegistry,
        root: &Path,
    ) -> Result<Self, ConfigError> {
        let vars: HashMap<String, String> = std::env::vars().collect();
        Self::assemble_with_env(overrides, project, registry, root, &vars)
    }

    /// Assemble with an explicit environment map.
    ///
    /// The credential is resolved first so a missing key fails before any file
    /// is read.
    pub fn assemble_with_env(
        overrides: &ConfigOverrides,
        project: &ProjectConfig,
        registry: &RuleRegistry,
        root: &Path,
        vars: &HashMap<String, String>,
    ) -> Result<Self, ConfigError> {
        let llm = LlmSettings::resolve(overrides, project, vars)?;

        let rules = registry.select(
            &first_non_empty(&overrides.rules, &project.rules),
            &first_non_empty(&overrides.extend_rules, &project.extend_rules),
            &first_non_empty(&overrides.ignore_rules, &project.ignore_rules),
        );

        let mut patterns = first_non_empty(&overrides.files, &project.files);
        if patterns.is_empty() {
            patterns.push(SCAN_ALL.to_string());
        }
        let extension = non_blank(overrides.extension.as_deref())
            .or_else(|| non_blank(project.extension.as_deref()))
            .unwrap_or_else(|| DEFAULT_EXTENSION.to_string());
        let files = FileCollector::new(root)
            .with_extension(extension)
            .with_exclude(&first_non_empty(&overrides.exclude, &project.exclude))?
            .collect(&patterns)?;

        info!(
            rules = rules.len(),
            files = files.len(),
            model = %llm.model,
            "configuration assembled"
        );
        Ok(Self { rules, files, llm })
    }

    pub fn api_key(&self) -> &str {
        &self.llm.api_key
    }
}

/// The non-blank entries of `preferred`, or of `fallback` when there are none.
fn first_non_empty(preferred: &[String], fallback: &[String]) -> Vec<String> {
    let present = |values: &[String]| -> Vec<String> {
        values
            .iter()
            .filter_map(|value| non_blank(Some(value.as_str())))
            .collect()
    };
    let chosen = present(preferred);
    if chosen.is_empty() {
        present(fallback)
    } else {
        chosen
    }
}
