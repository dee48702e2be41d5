use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub mod registry;

/// An organisation-defined architectural guideline.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rule {
    /// Unique code, taken from the rule document's file name (e.g. `ARC001`).
    pub code: String,
    /// One-line summary.
    pub brief_description: String,
    /// Full explanation handed to the model.
    pub long_description: String,
    /// Illustration of a violation.
    pub example: String,
}

impl Rule {
    /// Construct a new rule, validating invariants before returning.
    pub fn new(
        code: impl Into<String>,
        brief_description: impl Into<String>,
        long_description: impl Into<String>,
        example: impl Into<String>,
    ) -> Result<Self, RuleValidationError> {
        let rule = Self {
            code: code.into(),
            brief_description: brief_description.into(),
            long_description: long_description.into(),
            example: example.into(),
        };
        rule.validate()?;
        Ok(rule)
    }

    pub fn validate(&self) -> Result<(), RuleValidationError> {
        if self.code.trim().is_empty() {
            return Err(RuleValidationError::EmptyCode);
        }
        if self.brief_description.trim().is_empty() {
            return Err(RuleValidationError::EmptyDescription {
                code: self.code.clone(),
            });
        }
        Ok(())
    }
}

impl fmt::Display for Rule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "## {} - {}\n*{}*\n**Example**: {}",
            self.code, self.brief_description, self.long_description, self.example
        )
    }
}

/// Errors emitted while validating rule definitions.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RuleValidationError {
    #[error("rule code must not be blank")]
    EmptyCode,
    #[error("rule `{code}` brief description must not be empty")]
    EmptyDescription { code: String },
}

/// Ordered collection of rules selected for a run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct RuleSet {
    rules: Vec<Rule>,
}

impl RuleSet {
    pub fn new(rules: Vec<Rule>) -> Self {
        Self { rules }
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Rule> {
        self.rules.iter()
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    pub fn codes(&self) -> Vec<&str> {
        self.rules.iter().map(|rule| rule.code.as_str()).collect()
    }
}

impl<'a> IntoIterator for &'a RuleSet {
    type Item = &'a Rule;
    type IntoIter = std::slice::Iter<'a, Rule>;

    fn into_iter(self) -> Self::IntoIter {
        self.rules.iter()
    }
}

impl fmt::Display for RuleSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (idx, rule) in self.rules.iter().enumerate() {
            if idx > 0 {
                f.write_str("\n---\n")?;
            }
            write!(f, "{rule}")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rule(code: &str) -> Rule {
        Rule::new(code, format!("{code} brief"), "long", "example").unwrap()
    }

    #[test]
    fn rule_new_rejects_blank_code() {
        let err = Rule::new("  ", "brief", "long", "example").unwrap_err();
        assert_eq!(err, RuleValidationError::EmptyCode);
    }

    #[test]
    fn rule_new_rejects_blank_brief() {
        let err = Rule::new("ARC001", "", "long", "example").unwrap_err();
        assert!(matches!(
            err,
            RuleValidationError::EmptyDescription { code } if code == "ARC001"
        ));
    }

    #[test]
    fn rule_renders_as_markdown_block() {
        let rule = Rule::new(
            "ARC005",
            "Keep configuration out of source code",
            "Values come from config.",
            "API_URL = \"https://prod\"",
        )
        .unwrap();
        assert_eq!(
            rule.to_string(),
            "## ARC005 - Keep configuration out of source code\n*Values come from config.*\n**Example**: API_URL = \"https://prod\""
        );
    }

    #[test]
    fn rule_set_separates_rules() {
        let set = RuleSet::new(vec![rule("A"), rule("B")]);
        let rendered = set.to_string();
        assert!(rendered.starts_with("## A - A brief"));
        assert!(rendered.contains("\n---\n## B - B brief"));
        assert_eq!(set.codes(), vec!["A", "B"]);
    }

    #[test]
    fn empty_rule_set_renders_nothing() {
        assert_eq!(RuleSet::default().to_string(), "");
    }
}
