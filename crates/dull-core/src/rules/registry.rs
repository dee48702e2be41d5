use std::{
    collections::BTreeMap,
    fs,
    path::{Path, PathBuf},
};

use anyhow::{bail, Context, Result};
use serde::Deserialize;
use tracing::{debug, warn};

use super::{Rule, RuleSet};

/// Name of the default rule list inside a rules directory.
pub const DEFAULT_LIST_FILE: &str = "default_rules.txt";

const BUNDLED_RULES: &[(&str, &str)] = &[
    ("ARC001", include_str!("../../../../rules/ARC001.json")),
    ("ARC002", include_str!("../../../../rules/ARC002.json")),
    ("ARC003", include_str!("../../../../rules/ARC003.json")),
    ("ARC004", include_str!("../../../../rules/ARC004.json")),
    ("ARC005", include_str!("../../../../rules/ARC005.json")),
    ("ARC006", include_str!("../../../../rules/ARC006.json")),
];
const BUNDLED_DEFAULTS: &str = include_str!("../../../../rules/default_rules.txt");

/// Catalogue of known rules, loaded from one JSON document per rule.
#[derive(Debug, Clone, Default)]
pub struct RuleRegistry {
    rules: BTreeMap<String, Rule>,
    defaults: Vec<String>,
}

impl RuleRegistry {
    /// Load every `<CODE>.json` document under `dir`, plus the optional
    /// `default_rules.txt` list of codes.
    pub fn load(dir: impl AsRef<Path>) -> Result<Self> {
        let dir = dir.as_ref();
        if !dir.is_dir() {
            bail!("rules directory {} does not exist", dir.display());
        }

        let mut documents: Vec<PathBuf> = fs::read_dir(dir)
            .with_context(|| format!("failed to list rules directory {}", dir.display()))?
            .map(|entry| entry.map(|e| e.path()))
            .collect::<Result<_, _>>()
            .with_context(|| format!("failed to list rules directory {}", dir.display()))?;
        documents.retain(|path| {
            path.is_file() && path.extension().and_then(|ext| ext.to_str()) == Some("json")
        });
        documents.sort();

        let mut rules = BTreeMap::new();
        for path in documents {
            let rule = load_rule(&path)?;
            rules.insert(rule.code.clone(), rule);
        }

        let list_path = dir.join(DEFAULT_LIST_FILE);
        let defaults = if list_path.is_file() {
            let raw = fs::read_to_string(&list_path).with_context(|| {
                format!("failed to read default rule list at {}", list_path.display())
            })?;
            parse_default_list(&raw)
        } else {
            warn!(path = %list_path.display(), "no default rule list found");
            Vec::new()
        };

        debug!(
            rules = rules.len(),
            defaults = defaults.len(),
            dir = %dir.display(),
            "loaded rule registry"
        );
        Ok(Self { rules, defaults })
    }

    /// The rule pack compiled into the binary.
    pub fn bundled() -> Result<Self> {
        let mut rules = BTreeMap::new();
        for (code, raw) in BUNDLED_RULES {
            let rule = parse_rule(code, raw)
                .with_context(|| format!("invalid bundled rule document {code}"))?;
            rules.insert(rule.code.clone(), rule);
        }
        let defaults = parse_default_list(BUNDLED_DEFAULTS);
        debug!(rules = rules.len(), defaults = defaults.len(), "loaded bundled rule registry");
        Ok(Self { rules, defaults })
    }

    /// Build a registry from in-memory rules.
    pub fn from_parts(rules: impl IntoIterator<Item = Rule>, defaults: Vec<String>) -> Self {
        Self {
            rules: rules
                .into_iter()
                .map(|rule| (rule.code.clone(), rule))
                .collect(),
            defaults,
        }
    }

    /// Resolve `codes` into rules, in the order requested.
    ///
    /// An empty selection falls back to the default list. Unknown codes are
    /// skipped rather than reported as errors.
    pub fn get_rules<S: AsRef<str>>(&self, codes: &[S]) -> RuleSet {
        let selected: Vec<&str> = if codes.is_empty() {
            self.defaults.iter().map(String::as_str).collect()
        } else {
            codes.iter().map(AsRef::as_ref).collect()
        };

        let mut rules = Vec::with_capacity(selected.len());
        for code in selected {
            match self.rules.get(code) {
                Some(rule) => rules.push(rule.clone()),
                None => warn!(code, "unknown rule code; skipping"),
            }
        }
        RuleSet::new(rules)
    }

    /// Resolve a selection the way `check` does: `select` (or the defaults when
    /// it is empty), then `extend` appended, then anything in `ignore` removed.
    /// Codes appended by `extend` that are already selected are not repeated.
    pub fn select<S: AsRef<str>>(&self, select: &[S], extend: &[S], ignore: &[S]) -> RuleSet {
        let mut codes: Vec<&str> = if select.is_empty() {
            self.defaults.iter().map(String::as_str).collect()
        } else {
            select.iter().map(AsRef::as_ref).collect()
        };
        for code in extend.iter().map(AsRef::as_ref) {
            if !codes.contains(&code) {
                codes.push(code);
            }
        }
        codes.retain(|code| !ignore.iter().any(|ignored| ignored.as_ref() == *code));
        if codes.is_empty() {
            return RuleSet::default();
        }
        self.get_rules(&codes)
    }

    pub fn get(&self, code: &str) -> Option<&Rule> {
        self.rules.get(code)
    }

    /// Every known rule, sorted by code.
    pub fn rules(&self) -> impl Iterator<Item = &Rule> {
        self.rules.values()
    }

    /// Every known code, sorted.
    pub fn codes(&self) -> Vec<&str> {
        self.rules.keys().map(String::as_str).collect()
    }

    pub fn default_codes(&self) -> &[String] {
        &self.defaults
    }

    pub fn is_default(&self, code: &str) -> bool {
        self.defaults.iter().any(|c| c == code)
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}

#[derive(Deserialize)]
struct RuleDocument {
    brief_description: String,
    long_description: String,
    example: String,
}

fn load_rule(path: &Path) -> Result<Rule> {
    let code = path
        .file_stem()
        .and_then(|stem| stem.to_str())
        .with_context(|| format!("rule file name {} is not valid UTF-8", path.display()))?;
    let raw = fs::read_to_string(path)
        .with_context(|| format!("failed to read rule document at {}", path.display()))?;
    parse_rule(code, &raw).with_context(|| format!("invalid rule document at {}", path.display()))
}

fn parse_rule(code: &str, raw: &str) -> Result<Rule> {
    let doc: RuleDocument = serde_json::from_str(raw)?;
    Ok(Rule::new(
        code,
        doc.brief_description,
        doc.long_description,
        doc.example,
    )?)
}

/// One code per line; blank lines and `#` comments are ignored.
fn parse_default_list(raw: &str) -> Vec<String> {
    raw.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .map(str::to_string)
        .collect()
}
