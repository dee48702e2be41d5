use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use dull_core::{
    client_for, lint_code, render_result, Config, ConfigOverrides, OutputFormat, ProjectConfig,
    PromptBuilder, PromptTemplates, RuleRegistry,
};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(
    name = "dull",
    author,
    version,
    about = "LLM-backed architectural linter",
    long_about = "Checks source files against organisation-defined architectural rules by asking an LLM for a structured violation report.\n\nConfiguration precedence: CLI > environment > pyproject.toml [tool.dull] / dull.toml > defaults."
)]
struct Cli {
    /// Directory containing rule documents (<CODE>.json) and default_rules.txt;
    /// defaults to ./rules when present, otherwise the built-in rule pack
    #[arg(long = "rules-dir", value_name = "DIR", global = true)]
    rules_dir: Option<PathBuf>,

    /// Project config file to use instead of pyproject.toml / dull.toml discovery
    #[arg(long, value_name = "FILE", global = true)]
    config: Option<PathBuf>,

    /// Directory with system_prompt.txt, user_prompt.txt and response_schema.json
    #[arg(long = "prompts-dir", value_name = "DIR", global = true)]
    prompts_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Check files for violations of the selected rules
    Check(CheckArgs),
    /// List all loaded rules
    ListRules {
        /// Emit rules as JSON instead of human-readable text
        #[arg(long)]
        json: bool,
    },
}

#[derive(Args, Debug)]
struct CheckArgs {
    /// Rule code to check (repeatable); defaults to the project or built-in list
    #[arg(short = 'r', long = "rules", value_name = "CODE")]
    rules: Vec<String>,

    /// Rule code added on top of the selected rules (repeatable)
    #[arg(long = "extend-rules", value_name = "CODE")]
    extend_rules: Vec<String>,

    /// Rule code removed from the selection (repeatable)
    #[arg(long = "ignore-rules", value_name = "CODE")]
    ignore_rules: Vec<String>,

    /// File, directory or glob to check (repeatable); `.` scans everything
    #[arg(short = 'f', long = "file", value_name = "PATTERN")]
    files: Vec<String>,

    /// Path or glob, relative to the working directory, to leave out (repeatable)
    #[arg(short = 'x', long = "exclude", value_name = "PATTERN")]
    exclude: Vec<String>,

    /// Free-text background passed to the model alongside the rules
    #[arg(long, default_value = "")]
    context: String,

    /// Model name
    #[arg(long)]
    model: Option<String>,

    /// Request timeout in seconds
    #[arg(long = "timeout-secs", value_name = "SECS")]
    timeout_secs: Option<u64>,

    /// File extension scanned when `.` or a directory is given
    #[arg(long, value_name = "EXT")]
    extension: Option<String>,

    /// Output format: json, yaml or human
    #[arg(long, default_value = "json")]
    format: OutputFormat,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();
    let root = std::env::current_dir().context("failed to resolve working directory")?;

    let project = match cli.config.as_deref() {
        Some(path) => ProjectConfig::from_file(path)?,
        None => ProjectConfig::discover(&root)?,
    };
    let rules_dir = cli.rules_dir.clone().or_else(|| project.rules_dir(&root));
    let (registry, source) = load_registry(rules_dir.as_deref())?;

    match cli.command {
        Commands::Check(args) => {
            check(args, cli.prompts_dir.as_deref(), &project, &registry, &root).await?
        }
        Commands::ListRules { json } => list_rules(&registry, &source, json)?,
    }
    Ok(())
}

fn load_registry(dir: Option<&Path>) -> Result<(RuleRegistry, String)> {
    match dir {
        Some(dir) => {
            let registry = RuleRegistry::load(dir)
                .with_context(|| format!("failed to load rules from {}", dir.display()))?;
            Ok((registry, dir.display().to_string()))
        }
        None => {
            let registry = RuleRegistry::bundled().context("failed to load built-in rules")?;
            Ok((registry, "the built-in rule pack".to_string()))
        }
    }
}

async fn check(
    args: CheckArgs,
    prompts_dir: Option<&Path>,
    project: &ProjectConfig,
    registry: &RuleRegistry,
    root: &Path,
) -> Result<()> {
    let templates = match prompts_dir {
        Some(dir) => PromptTemplates::from_dir(dir)?,
        None => PromptTemplates::bundled()?,
    };
    let prompts = PromptBuilder::new(templates)?;

    let overrides = ConfigOverrides {
        rules: args.rules,
        extend_rules: args.extend_rules,
        ignore_rules: args.ignore_rules,
        files: args.files,
        exclude: args.exclude,
        model: args.model,
        timeout_secs: args.timeout_secs,
        extension: args.extension,
    };
    let config = Config::assemble(&overrides, project, registry, root)?;
    if config.rules.is_empty() {
        warn!("no known rules selected; the model will receive an empty rule list");
    }

    let prompt_pair = prompts.build(&config, &args.context);
    let client = client_for(&config.llm)?;
    info!(
        provider = ?config.llm.provider,
        rules = ?config.rules.codes(),
        files = config.files.len(),
        "linting"
    );
    let result = lint_code(client.as_ref(), &prompt_pair).await?;

    println!("{}", render_result(&result, args.format)?);
    Ok(())
}

fn list_rules(registry: &RuleRegistry, source: &str, json: bool) -> Result<()> {
    if json {
        let rules: Vec<_> = registry.rules().collect();
        println!("{}", serde_json::to_string_pretty(&rules)?);
        return Ok(());
    }

    println!(
        "{} rule(s) loaded from {} (* = default)",
        registry.len(),
        source
    );
    for rule in registry.rules() {
        let marker = if registry.is_default(&rule.code) {
            '*'
        } else {
            ' '
        };
        println!(
            "{marker} {code:<10} {desc}",
            marker = marker,
            code = rule.code,
            desc = rule.brief_description
        );
    }
    Ok(())
}

fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,reqwest=warn,hyper=warn"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .try_init();
}
