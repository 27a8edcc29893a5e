//! Assertion helpers for scenario steps
//!
//! Every helper returns an [`AssertionFailure`] carrying the scenario and
//! step it ran in, so a failed comparison reads on its own in the report.
//! Ledger errors are never caught here: steps propagate them separately.

use std::fmt::{Debug, Display};
use thiserror::Error;

/// A failed comparison with its step context
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{subject}: expected {expected}, got {actual} (scenario '{scenario}', step '{step}')")]
pub struct AssertionFailure {
    pub scenario: String,
    pub step: String,
    pub subject: String,
    pub expected: String,
    pub actual: String,
}

/// Where an assertion runs and what it checks
#[derive(Debug, Clone, Copy)]
pub struct AssertContext<'a> {
    pub scenario: &'a str,
    pub step: &'a str,
    pub subject: &'a str,
}

impl<'a> AssertContext<'a> {
    pub fn new(scenario: &'a str, step: &'a str, subject: &'a str) -> Self {
        Self {
            scenario,
            step,
            subject,
        }
    }

    fn failure(&self, expected: String, actual: String) -> AssertionFailure {
        AssertionFailure {
            scenario: self.scenario.to_owned(),
            step: self.step.to_owned(),
            subject: self.subject.to_owned(),
            expected,
            actual,
        }
    }
}

pub fn assert_equal<T>(actual: T, expected: T, ctx: AssertContext<'_>) -> Result<(), AssertionFailure>
where
    T: PartialEq + Debug,
{
    if actual == expected {
        return Ok(());
    }
    Err(ctx.failure(format!("{:?}", expected), format!("{:?}", actual)))
}

pub fn assert_true(condition: bool, ctx: AssertContext<'_>) -> Result<(), AssertionFailure> {
    if condition {
        return Ok(());
    }
    Err(ctx.failure("true".to_owned(), "false".to_owned()))
}

/// `actual > threshold`
pub fn assert_greater<T>(actual: T, threshold: T, ctx: AssertContext<'_>) -> Result<(), AssertionFailure>
where
    T: PartialOrd + Display,
{
    if actual > threshold {
        return Ok(());
    }
    Err(ctx.failure(format!("more than {}", threshold), actual.to_string()))
}

/// `actual >= threshold`
pub fn assert_at_least<T>(actual: T, threshold: T, ctx: AssertContext<'_>) -> Result<(), AssertionFailure>
where
    T: PartialOrd + Display,
{
    if actual >= threshold {
        return Ok(());
    }
    Err(ctx.failure(format!("at least {}", threshold), actual.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::Hbar;

    fn ctx() -> AssertContext<'static> {
        AssertContext::new("Transfer", "Then The second account holds 10 HTT tokens", "balance")
    }

    #[test]
    fn test_equal_reports_expected_and_actual() {
        assert!(assert_equal(10u64, 10, ctx()).is_ok());

        let failure = assert_equal(9u64, 10, ctx()).unwrap_err();
        assert_eq!(failure.expected, "10");
        assert_eq!(failure.actual, "9");
        assert_eq!(failure.scenario, "Transfer");
        assert!(failure.to_string().contains("balance: expected 10, got 9"));
    }

    #[test]
    fn test_equal_on_strings_is_quoted() {
        let ctx = AssertContext::new("Create", "Then The token has the symbol \"HTT\"", "symbol");
        let failure = assert_equal("HTX", "HTT", ctx).unwrap_err();
        assert_eq!(failure.expected, "\"HTT\"");
        assert_eq!(failure.subject, "symbol");
    }

    #[test]
    fn test_greater_is_strict() {
        let ten = Hbar::from_hbars(10);
        assert!(assert_greater(Hbar::from_hbars(11), ten, ctx()).is_ok());

        let failure = assert_greater(ten, ten, ctx()).unwrap_err();
        assert_eq!(failure.expected, "more than 10.00000000 ℏ");
        assert!(assert_at_least(ten, ten, ctx()).is_ok());
    }

    #[test]
    fn test_true() {
        assert!(assert_true(true, ctx()).is_ok());
        assert_eq!(assert_true(false, ctx()).unwrap_err().actual, "false");
    }
}
