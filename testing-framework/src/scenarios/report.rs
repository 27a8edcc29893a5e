//! Run reports
//!
//! Printed in a boxed summary for humans and serialized as JSON for CI.

use chrono::{DateTime, Utc};
use serde::Serialize;
use strum::Display;

use super::feature::Keyword;
use crate::error::StepError;
use crate::ledger::Status;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum StepStatus {
    Passed,
    Failed,
    Pending,
    Undefined,
    Ambiguous,
    TimedOut,
    Skipped,
}

/// Why a scenario failed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum FailureKind {
    Assertion,
    Ledger,
    Pending,
    Undefined,
    Ambiguous,
    Timeout,
    Argument,
    State,
}

impl FailureKind {
    pub fn step_status(self) -> StepStatus {
        match self {
            FailureKind::Pending => StepStatus::Pending,
            FailureKind::Undefined => StepStatus::Undefined,
            FailureKind::Ambiguous => StepStatus::Ambiguous,
            FailureKind::Timeout => StepStatus::TimedOut,
            FailureKind::Assertion
            | FailureKind::Ledger
            | FailureKind::Argument
            | FailureKind::State => StepStatus::Failed,
        }
    }
}

impl From<&StepError> for FailureKind {
    fn from(error: &StepError) -> Self {
        match error {
            StepError::Ledger(_) => FailureKind::Ledger,
            StepError::Assertion(_) => FailureKind::Assertion,
            StepError::Pending(_) => FailureKind::Pending,
            StepError::Timeout(_) => FailureKind::Timeout,
            StepError::Argument(_) => FailureKind::Argument,
            StepError::State(_) | StepError::Account(_) => FailureKind::State,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ScenarioFailure {
    pub scenario: String,
    pub step: String,
    pub kind: FailureKind,
    pub message: String,
    /// Network status when the failure came from the ledger
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<Status>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StepReport {
    pub keyword: Keyword,
    pub text: String,
    pub line: usize,
    pub status: StepStatus,
    pub duration_ms: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ScenarioReport {
    pub feature: String,
    pub name: String,
    pub tags: Vec<String>,
    pub steps: Vec<StepReport>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failure: Option<ScenarioFailure>,
    pub duration_ms: u64,
}

impl ScenarioReport {
    /// No partial credit: every step must pass
    pub fn passed(&self) -> bool {
        self.failure.is_none() && self.steps.iter().all(|s| s.status == StepStatus::Passed)
    }

    /// Status of the first step that did not pass
    pub fn status(&self) -> StepStatus {
        self.steps
            .iter()
            .map(|s| s.status)
            .find(|s| *s != StepStatus::Passed)
            .unwrap_or(StepStatus::Passed)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RunSummary {
    pub scenarios: usize,
    pub passed: usize,
    pub failed: usize,
    pub pending: usize,
    pub undefined: usize,
    pub steps: usize,
    pub skipped_steps: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub started_at: DateTime<Utc>,
    pub duration_ms: u64,
    pub scenarios: Vec<ScenarioReport>,
}

impl RunReport {
    pub fn summary(&self) -> RunSummary {
        let mut summary = RunSummary {
            scenarios: self.scenarios.len(),
            ..RunSummary::default()
        };
        for scenario in &self.scenarios {
            match scenario.status() {
                StepStatus::Passed => summary.passed += 1,
                StepStatus::Pending => summary.pending += 1,
                StepStatus::Undefined | StepStatus::Ambiguous => summary.undefined += 1,
                _ => summary.failed += 1,
            }
            summary.steps += scenario.steps.len();
            summary.skipped_steps += scenario
                .steps
                .iter()
                .filter(|s| s.status == StepStatus::Skipped)
                .count();
        }
        summary
    }

    pub fn all_passed(&self) -> bool {
        self.scenarios.iter().all(ScenarioReport::passed)
    }

    pub fn failures(&self) -> impl Iterator<Item = &ScenarioFailure> {
        self.scenarios.iter().filter_map(|s| s.failure.as_ref())
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }

    /// Print report to stdout
    pub fn print(&self) {
        let summary = self.summary();

        println!("\n╔════════════════════════════════════════════════════════════╗");
        println!("║  Token Service Run Report                                  ║");
        println!("╠════════════════════════════════════════════════════════════╣");
        println!("║  Started: {:<48} ║", self.started_at.format("%Y-%m-%d %H:%M:%S UTC").to_string());
        println!("║  Scenarios: {:<46} ║", summary.scenarios);
        println!("║  Passed: {:<49} ║", summary.passed);
        println!("║  Failed: {:<49} ║", summary.failed);
        println!("║  Pending: {:<48} ║", summary.pending);
        println!("║  Undefined: {:<46} ║", summary.undefined);
        println!(
            "║  Status: {:<49} ║",
            if self.all_passed() {
                "SUCCESS ✓"
            } else {
                "FAILED ✗"
            }
        );
        println!("╚════════════════════════════════════════════════════════════╝\n");

        for scenario in &self.scenarios {
            let mark = if scenario.passed() { "✓" } else { "✗" };
            println!(
                "{} {} :: {} ({} ms)",
                mark, scenario.feature, scenario.name, scenario.duration_ms
            );
            for step in &scenario.steps {
                println!("    [{:<9}] {} {}", step.status.to_string(), step.keyword, step.text);
            }
            if let Some(failure) = &scenario.failure {
                println!("    {} failure: {}", failure.kind, failure.message);
            }
        }
    }
}
