//! Feature file parser
//!
//! Supports the subset of Gherkin the token-service features use:
//!
//! ```gherkin
//! @tokens
//! Feature: Token service
//!   Free text description.
//!
//!   Background:
//!     Given A Hedera account with more than 10 hbar
//!
//!   @transfer
//!   Scenario: Transfer tokens
//!     Given A token named Test Token (HTT) with 1000 tokens
//!     When The first account creates a transaction to transfer 10 HTT tokens to the second account
//!     And The first account submits the transaction
//!     Then The second account holds 10 HTT tokens
//! ```
//!
//! Background steps are prepended to every scenario, feature tags are
//! inherited by every scenario. Scenario outlines, data tables and doc
//! strings are rejected.

use anyhow::Context;
use serde::Serialize;
use std::fmt;
use std::path::Path;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FeatureError {
    #[error("line {line}: {message}")]
    Syntax { line: usize, message: String },
    #[error("line {line}: Scenario Outline is not supported, write one Scenario per example")]
    UnsupportedOutline { line: usize },
    #[error("line {line}: step outside of a Scenario or Background")]
    OrphanStep { line: usize },
    #[error("line {line}: scenario '{name}' has no steps")]
    EmptyScenario { line: usize, name: String },
    #[error("no 'Feature:' declaration found")]
    MissingFeature,
}

/// Step keyword as written
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Keyword {
    Given,
    When,
    Then,
    And,
    But,
    #[serde(rename = "*")]
    Star,
}

impl Keyword {
    fn parse_prefix(line: &str) -> Option<(Keyword, &str)> {
        const KEYWORDS: [(&str, Keyword); 6] = [
            ("Given ", Keyword::Given),
            ("When ", Keyword::When),
            ("Then ", Keyword::Then),
            ("And ", Keyword::And),
            ("But ", Keyword::But),
            ("* ", Keyword::Star),
        ];
        KEYWORDS
            .iter()
            .find_map(|(prefix, kw)| line.strip_prefix(prefix).map(|rest| (*kw, rest.trim())))
    }
}

impl fmt::Display for Keyword {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Keyword::Given => "Given",
            Keyword::When => "When",
            Keyword::Then => "Then",
            Keyword::And => "And",
            Keyword::But => "But",
            Keyword::Star => "*",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FeatureStep {
    pub keyword: Keyword,
    pub text: String,
    pub line: usize,
}

impl fmt::Display for FeatureStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.keyword, self.text)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Scenario {
    pub name: String,
    /// Own tags plus the feature's, without the `@`
    pub tags: Vec<String>,
    /// Background steps first
    pub steps: Vec<FeatureStep>,
    pub line: usize,
}

impl Scenario {
    /// True when `filter` is empty or shares a tag with the scenario
    pub fn matches_tags(&self, filter: &[String]) -> bool {
        filter.is_empty()
            || filter
                .iter()
                .map(|t| t.trim_start_matches('@'))
                .any(|t| self.tags.iter().any(|own| own == t))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Feature {
    pub name: String,
    pub description: Option<String>,
    pub tags: Vec<String>,
    pub background: Vec<FeatureStep>,
    pub scenarios: Vec<Scenario>,
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Section {
    Preamble,
    Feature,
    Background,
    Scenario,
}

/// Read and parse a `.feature` file
pub fn read_feature(path: &Path) -> anyhow::Result<Feature> {
    let source = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read feature file {}", path.display()))?;
    parse_feature(&source).with_context(|| format!("Invalid feature file {}", path.display()))
}

pub fn parse_feature(source: &str) -> Result<Feature, FeatureError> {
    let mut feature: Option<Feature> = None;
    let mut section = Section::Preamble;
    let mut pending_tags: Vec<String> = Vec::new();
    let mut description: Vec<&str> = Vec::new();

    for (idx, raw) in source.lines().enumerate() {
        let line_no = idx + 1;
        let line = raw.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        let syntax = |message: &str| FeatureError::Syntax {
            line: line_no,
            message: message.to_owned(),
        };

        if line.starts_with('@') {
            for tag in line.split_whitespace() {
                let name = tag
                    .strip_prefix('@')
                    .filter(|t| !t.is_empty())
                    .ok_or_else(|| syntax(&format!("invalid tag '{}'", tag)))?;
                pending_tags.push(name.to_owned());
            }
            continue;
        }

        if let Some(name) = line.strip_prefix("Feature:") {
            if feature.is_some() {
                return Err(syntax("only one Feature per file"));
            }
            feature = Some(Feature {
                name: name.trim().to_owned(),
                description: None,
                tags: std::mem::take(&mut pending_tags),
                background: Vec::new(),
                scenarios: Vec::new(),
            });
            section = Section::Feature;
            continue;
        }

        if line.starts_with("Scenario Outline:")
            || line.starts_with("Scenario Template:")
            || line.starts_with("Examples:")
        {
            return Err(FeatureError::UnsupportedOutline { line: line_no });
        }
        if line.starts_with('|') || line.starts_with("\"\"\"") {
            return Err(syntax("data tables and doc strings are not supported"));
        }

        let Some(current) = feature.as_mut() else {
            return Err(FeatureError::MissingFeature);
        };

        if line.starts_with("Background:") {
            if section != Section::Feature || !current.background.is_empty() {
                return Err(syntax("Background must come once, before any Scenario"));
            }
            section = Section::Background;
            continue;
        }

        if let Some(name) = line
            .strip_prefix("Scenario:")
            .or_else(|| line.strip_prefix("Example:"))
        {
            finish_scenario(current)?;
            let mut tags = current.tags.clone();
            tags.append(&mut pending_tags);
            current.scenarios.push(Scenario {
                name: name.trim().to_owned(),
                tags,
                steps: Vec::new(),
                line: line_no,
            });
            section = Section::Scenario;
            continue;
        }

        if let Some((keyword, text)) = Keyword::parse_prefix(line) {
            let step = FeatureStep {
                keyword,
                text: text.to_owned(),
                line: line_no,
            };
            match section {
                Section::Background => current.background.push(step),
                Section::Scenario => match current.scenarios.last_mut() {
                    Some(scenario) => scenario.steps.push(step),
                    None => return Err(FeatureError::OrphanStep { line: line_no }),
                },
                Section::Preamble | Section::Feature => {
                    return Err(FeatureError::OrphanStep { line: line_no })
                }
            }
            continue;
        }

        // Free text: feature description, or a note under a scenario title
        match section {
            Section::Feature => description.push(line),
            Section::Scenario => {
                let started = current
                    .scenarios
                    .last()
                    .map(|s| !s.steps.is_empty())
                    .unwrap_or(false);
                if started {
                    return Err(syntax(&format!("expected a step, found '{}'", line)));
                }
            }
            Section::Background if current.background.is_empty() => {}
            Section::Background | Section::Preamble => {
                return Err(syntax(&format!("expected a step, found '{}'", line)));
            }
        }
    }

    let mut feature = feature.ok_or(FeatureError::MissingFeature)?;
    finish_scenario(&feature)?;

    if !description.is_empty() {
        feature.description = Some(description.join("\n"));
    }
    if !feature.background.is_empty() {
        for scenario in &mut feature.scenarios {
            let mut steps = feature.background.clone();
            steps.append(&mut scenario.steps);
            scenario.steps = steps;
        }
    }
    Ok(feature)
}

fn finish_scenario(feature: &Feature) -> Result<(), FeatureError> {
    match feature.scenarios.last() {
        Some(s) if s.steps.is_empty() => Err(FeatureError::EmptyScenario {
            line: s.line,
            name: s.name.clone(),
        }),
        _ => Ok(()),
    }
}
