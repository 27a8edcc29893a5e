//! ScenarioRunner - executes parsed features against a ledger client
//!
//! Every scenario gets a fresh [`ScenarioWorld`]. Steps run strictly in
//! order, each under the configured timeout. The first step that does not
//! pass fails the scenario and the remaining steps are skipped. Scenarios
//! run sequentially unless `max_concurrent` allows more.

use chrono::Utc;
use futures::stream::{self, StreamExt};
use log::{debug, error, info, warn};
use std::sync::Arc;
use std::time::Duration;

use super::feature::{Feature, Scenario};
use super::registry::{StepAction, StepKind, StepMatch, StepRegistry};
use super::report::{
    FailureKind, RunReport, ScenarioFailure, ScenarioReport, StepReport, StepStatus,
};
use super::world::{ScenarioWorld, WorldHandles};
use crate::accounts::AccountContext;
use crate::config::{HarnessConfig, TokenDefaults};
use crate::error::StepError;
use crate::ledger::{
    InMemoryLedger, LedgerClient, LedgerError, RetryingClient, TransactionId,
    TransactionIdGenerator,
};
use crate::orchestrator::Clock;

#[derive(Debug, Clone)]
pub struct RunnerSettings {
    pub step_timeout: Duration,
    pub max_concurrent: usize,
    /// Run only scenarios carrying one of these tags; empty runs all
    pub tags: Vec<String>,
    pub token_defaults: TokenDefaults,
}

impl Default for RunnerSettings {
    fn default() -> Self {
        Self {
            step_timeout: Duration::from_secs(30),
            max_concurrent: 1,
            tags: Vec::new(),
            token_defaults: TokenDefaults::default(),
        }
    }
}

impl RunnerSettings {
    pub fn from_config(config: &HarnessConfig) -> Self {
        Self {
            step_timeout: config.step_timeout(),
            max_concurrent: config.max_concurrent_scenarios,
            tags: Vec::new(),
            token_defaults: config.token_defaults,
        }
    }

    pub fn with_tags(mut self, tags: Vec<String>) -> Self {
        self.tags = tags;
        self
    }

    pub fn with_step_timeout(mut self, timeout: Duration) -> Self {
        self.step_timeout = timeout;
        self
    }

    pub fn with_max_concurrent(mut self, max: usize) -> Self {
        self.max_concurrent = max;
        self
    }
}

/// Outcome of one step before it is turned into a report entry
struct StepFailure {
    kind: FailureKind,
    message: String,
    error: Option<StepError>,
}

impl StepFailure {
    fn from_error(error: StepError) -> Self {
        Self {
            kind: FailureKind::from(&error),
            message: error.to_string(),
            error: Some(error),
        }
    }
}

pub struct ScenarioRunner {
    registry: Arc<StepRegistry>,
    handles: WorldHandles,
    settings: RunnerSettings,
}

impl ScenarioRunner {
    pub fn new(
        registry: Arc<StepRegistry>,
        ledger: Arc<dyn LedgerClient>,
        accounts: Arc<AccountContext>,
        clock: Arc<dyn Clock>,
        settings: RunnerSettings,
    ) -> Self {
        let handles = WorldHandles {
            ledger,
            accounts,
            clock,
            transaction_ids: Arc::new(TransactionIdGenerator::new()),
            token_defaults: settings.token_defaults,
        };
        Self {
            registry,
            handles,
            settings,
        }
    }

    /// Runner over the in-process ledger seeded from `config`
    ///
    /// Reads go through a [`RetryingClient`] with the configured policy. The
    /// ledger handle is returned for fault injection and inspection.
    pub fn local(
        registry: Arc<StepRegistry>,
        config: &HarnessConfig,
        settings: RunnerSettings,
        clock: Arc<dyn Clock>,
    ) -> anyhow::Result<(Self, Arc<InMemoryLedger>)> {
        let accounts = Arc::new(config.to_account_context()?);
        let ledger = Arc::new(config.local_ledger(clock.clone())?);
        let client = RetryingClient::new(ledger.clone(), config.retry.clone(), clock.clone());

        let runner = Self::new(registry, Arc::new(client), accounts, clock, settings);
        Ok((runner, ledger))
    }

    pub fn settings(&self) -> &RunnerSettings {
        &self.settings
    }

    /// Run every selected scenario of every feature, in declaration order
    pub async fn run(&self, features: &[Feature]) -> RunReport {
        let started_at = Utc::now();
        let start = self.handles.clock.now();

        let selected: Vec<(&Feature, &Scenario)> = features
            .iter()
            .flat_map(|f| f.scenarios.iter().map(move |s| (f, s)))
            .filter(|(_, s)| s.matches_tags(&self.settings.tags))
            .collect();

        info!(
            "Running {} scenario(s), up to {} at a time",
            selected.len(),
            self.settings.max_concurrent.max(1)
        );

        let scenarios = stream::iter(selected)
            .map(|(feature, scenario)| self.run_scenario(&feature.name, scenario))
            .buffered(self.settings.max_concurrent.max(1))
            .collect::<Vec<_>>()
            .await;

        RunReport {
            started_at,
            duration_ms: elapsed_ms(self.handles.clock.now() - start),
            scenarios,
        }
    }

    pub async fn run_feature(&self, feature: &Feature) -> RunReport {
        self.run(std::slice::from_ref(feature)).await
    }

    pub async fn run_scenario(&self, feature: &str, scenario: &Scenario) -> ScenarioReport {
        info!("Scenario: {}", scenario.name);
        let start = self.handles.clock.now();
        let mut world = ScenarioWorld::new(self.handles.clone(), scenario.name.as_str());

        let mut steps = Vec::with_capacity(scenario.steps.len());
        let mut failure: Option<ScenarioFailure> = None;
        let mut kind = StepKind::Given;

        for step in &scenario.steps {
            kind = StepKind::resolve(step.keyword, kind);
            let text = step.to_string();

            if failure.is_some() {
                steps.push(StepReport {
                    keyword: step.keyword,
                    text: step.text.clone(),
                    line: step.line,
                    status: StepStatus::Skipped,
                    duration_ms: 0,
                });
                continue;
            }

            world.begin_step(text.as_str());
            let step_start = self.handles.clock.now();
            let outcome = self.run_step(&mut world, kind, &step.text).await;
            let duration_ms = elapsed_ms(self.handles.clock.now() - step_start);

            let status = match outcome {
                Ok(()) => {
                    debug!("  ✓ {}", text);
                    StepStatus::Passed
                }
                Err(mut step_failure) => {
                    if step_failure.kind == FailureKind::Timeout {
                        if let Some(transaction_id) = world.take_in_flight() {
                            let reconciled = self.reconcile_in_flight(transaction_id).await;
                            step_failure.message =
                                format!("{}; {}", step_failure.message, reconciled);
                        }
                    }

                    let status = step_failure.kind.step_status();
                    if status == StepStatus::Pending {
                        warn!("  ? {} ({})", text, step_failure.message);
                    } else {
                        error!("  ✗ {}: {}", text, step_failure.message);
                    }

                    failure = Some(ScenarioFailure {
                        scenario: scenario.name.clone(),
                        step: text.clone(),
                        kind: step_failure.kind,
                        message: step_failure.message,
                        status: step_failure.error.as_ref().and_then(StepError::status),
                    });
                    status
                }
            };

            steps.push(StepReport {
                keyword: step.keyword,
                text: step.text.clone(),
                line: step.line,
                status,
                duration_ms,
            });
        }

        ScenarioReport {
            feature: feature.to_owned(),
            name: scenario.name.clone(),
            tags: scenario.tags.clone(),
            steps,
            failure,
            duration_ms: elapsed_ms(self.handles.clock.now() - start),
        }
    }

    async fn run_step(
        &self,
        world: &mut ScenarioWorld,
        kind: StepKind,
        text: &str,
    ) -> Result<(), StepFailure> {
        let (definition, args) = match self.registry.find(kind, text) {
            StepMatch::Found(definition, args) => (definition, args),
            StepMatch::Undefined => {
                return Err(StepFailure {
                    kind: FailureKind::Undefined,
                    message: format!("no {} step matches '{}'", kind, text),
                    error: None,
                })
            }
            StepMatch::Ambiguous(patterns) => {
                return Err(StepFailure {
                    kind: FailureKind::Ambiguous,
                    message: format!("'{}' matches {}", text, patterns.join(", ")),
                    error: None,
                })
            }
        };

        let handler = match &definition.action {
            StepAction::Run(handler) => *handler,
            StepAction::Pending(reason) => {
                return Err(StepFailure::from_error(StepError::Pending(reason.clone())))
            }
        };

        let timeout = self.settings.step_timeout;
        match tokio::time::timeout(timeout, handler(world, args)).await {
            Ok(result) => result.map_err(StepFailure::from_error),
            Err(_) => Err(StepFailure::from_error(StepError::Timeout(timeout))),
        }
    }

    /// Query the receipt of a mutation abandoned by a timed-out step
    async fn reconcile_in_flight(&self, transaction_id: TransactionId) -> String {
        let lookup = tokio::time::timeout(
            self.settings.step_timeout,
            self.handles.ledger.get_receipt(&transaction_id),
        )
        .await;

        match lookup {
            Ok(Ok(receipt)) => format!(
                "in-flight transaction {} reconciled as {}",
                transaction_id, receipt.status
            ),
            Ok(Err(LedgerError::PrecheckFailed(status))) => format!(
                "in-flight transaction {} not found ({})",
                transaction_id, status
            ),
            Ok(Err(e)) => format!(
                "in-flight transaction {} could not be reconciled: {}",
                transaction_id, e
            ),
            Err(_) => format!(
                "in-flight transaction {} receipt query timed out",
                transaction_id
            ),
        }
    }
}

fn elapsed_ms(elapsed: Duration) -> u64 {
    elapsed.as_millis().min(u64::MAX as u128) as u64
}
