pub mod config;
pub mod files;
pub mod lint;
pub mod llm;
pub mod prompt;
pub mod report;
pub mod rules;

pub use config::{Config, ConfigError, ConfigOverrides, ProjectConfig};
pub use files::{CollectError, FileCollector, SourceFile};
pub use lint::{lint_code, LintResult};
pub use llm::{client_for, LlmClient, LlmSettings, NoopLlmClient, OpenAiClient, ProviderKind};
pub use prompt::{PromptBuilder, PromptError, PromptPair, PromptTemplates};
pub use report::{render_result, OutputFormat};
pub use rules::{registry::RuleRegistry, Rule, RuleSet, RuleValidationError};
