use std::{
    fs, io,
    path::{Path, PathBuf},
};

use serde::Serialize;
use thiserror::Error;

use crate::{config::Config, files::SourceFile, rules::RuleSet};

pub const SYSTEM_PROMPT_FILE: &str = "system_prompt.txt";
pub const USER_PROMPT_FILE: &str = "user_prompt.txt";
pub const RESPONSE_SCHEMA_FILE: &str = "response_schema.json";

const BUNDLED_SYSTEM_PROMPT: &str = include_str!("../prompts/system_prompt.txt");
const BUNDLED_USER_PROMPT: &str = include_str!("../prompts/user_prompt.txt");
const BUNDLED_RESPONSE_SCHEMA: &str = include_str!("../prompts/response_schema.json");

#[derive(Debug, Error)]
pub enum PromptError {
    #[error("failed to read prompt asset {}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("response schema is not valid JSON")]
    Schema(#[from] serde_json::Error),
}

/// The two prompt templates and the response schema they advertise.
///
/// The system template receives `{formatted_schema}`; the user template
/// receives `{rules}`, `{context}` and `{code}`.
#[derive(Debug, Clone)]
pub struct PromptTemplates {
    system: String,
    user: String,
    schema: serde_json::Value,
}

impl PromptTemplates {
    pub fn new(
        system: impl Into<String>,
        user: impl Into<String>,
        schema: serde_json::Value,
    ) -> Self {
        Self {
            system: system.into(),
            user: user.into(),
            schema,
        }
    }

    /// Templates compiled into the binary.
    pub fn bundled() -> Result<Self, PromptError> {
        Ok(Self::new(
            BUNDLED_SYSTEM_PROMPT,
            BUNDLED_USER_PROMPT,
            serde_json::from_str(BUNDLED_RESPONSE_SCHEMA)?,
        ))
    }

    /// Read `system_prompt.txt`, `user_prompt.txt` and `response_schema.json`
    /// from `dir`.
    pub fn from_dir(dir: impl AsRef<Path>) -> Result<Self, PromptError> {
        let dir = dir.as_ref();
        let system = read_asset(&dir.join(SYSTEM_PROMPT_FILE))?;
        let user = read_asset(&dir.join(USER_PROMPT_FILE))?;
        let schema = serde_json::from_str(&read_asset(&dir.join(RESPONSE_SCHEMA_FILE))?)?;
        Ok(Self::new(system, user, schema))
    }

    pub fn schema(&self) -> &serde_json::Value {
        &self.schema
    }
}

fn read_asset(path: &Path) -> Result<String, PromptError> {
    fs::read_to_string(path).map_err(|source| PromptError::Read {
        path: path.to_path_buf(),
        source,
    })
}

/// Rendered conversation turns for one lint request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PromptPair {
    pub system_prompt: String,
    pub user_prompt: String,
}

/// Renders prompts from a fixed set of templates.
#[derive(Debug, Clone)]
pub struct PromptBuilder {
    templates: PromptTemplates,
    system_prompt: String,
}

impl PromptBuilder {
    pub fn new(templates: PromptTemplates) -> Result<Self, PromptError> {
        let formatted_schema = serde_json::to_string_pretty(&templates.schema)?;
        let system_prompt = render(
            &templates.system,
            &[("formatted_schema", formatted_schema.as_str())],
        );
        Ok(Self {
            templates,
            system_prompt,
        })
    }

    pub fn system_prompt(&self) -> &str {
        &self.system_prompt
    }

    pub fn user_prompt(&self, rules: &RuleSet, context: &str, files: &[SourceFile]) -> String {
        let rules = rules.to_string();
        let code = render_files(files);
        render(
            &self.templates.user,
            &[
                ("rules", rules.as_str()),
                ("context", context),
                ("code", code.as_str()),
            ],
        )
    }

    pub fn build(&self, config: &Config, context: &str) -> PromptPair {
        PromptPair {
            system_prompt: self.system_prompt.clone(),
            user_prompt: self.user_prompt(&config.rules, context, &config.files),
        }
    }
}

fn render_files(files: &[SourceFile]) -> String {
    files
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("\n")
}

/// Replace `{name}` placeholders in one left-to-right pass.
///
/// Substituted text is never rescanned and unknown placeholders stay verbatim.
pub fn render(template: &str, values: &[(&str, &str)]) -> String {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;
    while let Some(start) = rest.find('{') {
        out.push_str(&rest[..start]);
        let after = &rest[start + 1..];
        let value = after.find('}').and_then(|end| {
            let name = &after[..end];
            values
                .iter()
                .find(|(key, _)| *key == name)
                .map(|(_, value)| (*value, end))
        });
        match value {
            Some((value, end)) => {
                out.push_str(value);
                rest = &after[end + 1..];
            }
            None => {
                out.push('{');
                rest = after;
            }
        }
    }
    out.push_str(rest);
    out
}
