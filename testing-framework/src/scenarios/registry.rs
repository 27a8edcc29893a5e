//! Step registry: maps step text to handlers
//!
//! Definitions are matched by keyword kind and an anchored regular
//! expression. Capture groups become [`StepArgs`].

use futures::future::BoxFuture;
use regex::Regex;
use serde::Serialize;
use std::fmt;
use std::str::FromStr;

use super::feature::Keyword;
use super::world::ScenarioWorld;
use crate::accounts::Ordinal;
use crate::error::StepError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum StepKind {
    Given,
    When,
    Then,
}

impl StepKind {
    /// Kind of a step written with `keyword`; `And`, `But` and `*` continue `previous`
    pub fn resolve(keyword: Keyword, previous: StepKind) -> StepKind {
        match keyword {
            Keyword::Given => StepKind::Given,
            Keyword::When => StepKind::When,
            Keyword::Then => StepKind::Then,
            Keyword::And | Keyword::But | Keyword::Star => previous,
        }
    }
}

impl fmt::Display for StepKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

pub type StepFuture<'a> = BoxFuture<'a, Result<(), StepError>>;

/// Step implementation
pub type StepHandler = for<'a> fn(&'a mut ScenarioWorld, StepArgs) -> StepFuture<'a>;

#[derive(Clone)]
pub enum StepAction {
    Run(StepHandler),
    /// Declared but not implemented yet
    Pending(String),
}

#[derive(Clone)]
pub struct StepDefinition {
    pub kind: StepKind,
    pub pattern: Regex,
    pub action: StepAction,
}

impl StepDefinition {
    pub fn new(kind: StepKind, pattern: &str, handler: StepHandler) -> Result<Self, regex::Error> {
        Ok(Self {
            kind,
            pattern: anchored(pattern)?,
            action: StepAction::Run(handler),
        })
    }

    pub fn pending(
        kind: StepKind,
        pattern: &str,
        reason: impl Into<String>,
    ) -> Result<Self, regex::Error> {
        Ok(Self {
            kind,
            pattern: anchored(pattern)?,
            action: StepAction::Pending(reason.into()),
        })
    }
}

impl fmt::Debug for StepDefinition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StepDefinition")
            .field("kind", &self.kind)
            .field("pattern", &self.pattern.as_str())
            .finish()
    }
}

fn anchored(pattern: &str) -> Result<Regex, regex::Error> {
    let start = if pattern.starts_with('^') { "" } else { "^" };
    let end = if pattern.ends_with('$') { "" } else { "$" };
    Regex::new(&format!("{}{}{}", start, pattern, end))
}

/// Captured arguments of a matched step
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StepArgs {
    captures: Vec<Option<String>>,
}

impl StepArgs {
    pub fn new(captures: Vec<Option<String>>) -> Self {
        Self { captures }
    }

    pub fn len(&self) -> usize {
        self.captures.len()
    }

    pub fn is_empty(&self) -> bool {
        self.captures.is_empty()
    }

    /// Optional group, `None` when it did not participate in the match
    pub fn opt(&self, index: usize) -> Option<&str> {
        self.captures.get(index).and_then(|c| c.as_deref())
    }

    pub fn str(&self, index: usize) -> Result<&str, StepError> {
        self.opt(index)
            .ok_or_else(|| StepError::argument(format!("missing argument #{}", index)))
    }

    /// Parse group `index` with `FromStr`
    pub fn parse<T>(&self, index: usize) -> Result<T, StepError>
    where
        T: FromStr,
        T::Err: fmt::Display,
    {
        let raw = self.str(index)?;
        raw.parse()
            .map_err(|e| StepError::argument(format!("cannot parse '{}': {}", raw, e)))
    }

    pub fn u64(&self, index: usize) -> Result<u64, StepError> {
        self.parse(index)
    }

    pub fn ordinal(&self, index: usize) -> Result<Ordinal, StepError> {
        Ok(self.str(index)?.parse::<Ordinal>()?)
    }
}

/// Outcome of a registry lookup
pub enum StepMatch<'r> {
    Found(&'r StepDefinition, StepArgs),
    Undefined,
    /// Patterns of every matching definition
    Ambiguous(Vec<String>),
}

#[derive(Debug, Clone, Default)]
pub struct StepRegistry {
    definitions: Vec<StepDefinition>,
}

impl StepRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, definition: StepDefinition) -> &mut Self {
        self.definitions.push(definition);
        self
    }

    pub fn given(&mut self, pattern: &str, handler: StepHandler) -> Result<&mut Self, regex::Error> {
        Ok(self.register(StepDefinition::new(StepKind::Given, pattern, handler)?))
    }

    pub fn when(&mut self, pattern: &str, handler: StepHandler) -> Result<&mut Self, regex::Error> {
        Ok(self.register(StepDefinition::new(StepKind::When, pattern, handler)?))
    }

    pub fn then(&mut self, pattern: &str, handler: StepHandler) -> Result<&mut Self, regex::Error> {
        Ok(self.register(StepDefinition::new(StepKind::Then, pattern, handler)?))
    }

    pub fn len(&self) -> usize {
        self.definitions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.definitions.is_empty()
    }

    pub fn definitions(&self) -> &[StepDefinition] {
        &self.definitions
    }

    pub fn find(&self, kind: StepKind, text: &str) -> StepMatch<'_> {
        let mut matches = self
            .definitions
            .iter()
            .filter(|d| d.kind == kind)
            .filter_map(|d| d.pattern.captures(text).map(|c| (d, c)));

        let Some((definition, captures)) = matches.next() else {
            return StepMatch::Undefined;
        };

        let others: Vec<String> = matches.map(|(d, _)| d.pattern.as_str().to_owned()).collect();
        if !others.is_empty() {
            let mut patterns = vec![definition.pattern.as_str().to_owned()];
            patterns.extend(others);
            return StepMatch::Ambiguous(patterns);
        }

        let args = captures
            .iter()
            .skip(1)
            .map(|m| m.map(|m| m.as_str().to_owned()))
            .collect();
        StepMatch::Found(definition, StepArgs::new(args))
    }
}
