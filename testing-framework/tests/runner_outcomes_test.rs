#![allow(clippy::unwrap_used)]
#![allow(clippy::expect_used)]
//! Step outcomes other than a clean pass: undefined, ambiguous, pending,
//! failed, rejected and timed-out steps

use std::sync::Arc;
use std::time::Duration;

use hts_testing_framework::assertions::assert_equal;
use hts_testing_framework::config::HarnessConfig;
use hts_testing_framework::{AccountId, LedgerClient};
use hts_testing_framework::ledger::{LedgerError, RetryPolicy, Status, TokenSpec};
use hts_testing_framework::orchestrator::{Clock, PausedClock, SystemClock};
use hts_testing_framework::scenarios::registry::{StepDefinition, StepFuture};
use hts_testing_framework::scenarios::world::Mutation;
use hts_testing_framework::scenarios::{
    parse_feature, token_service_steps, FailureKind, RunReport, RunnerSettings, ScenarioRunner,
    ScenarioWorld, StepArgs, StepKind, StepRegistry, StepStatus,
};

fn key(byte: u8) -> String {
    hex::encode([byte; 32])
}

fn config() -> HarnessConfig {
    let mut config = HarnessConfig::from_json(
        &serde_json::json!({
            "operator": { "id": "0.0.2", "private_key": key(2), "initial_hbar": 1000 },
            "accounts": [
                { "id": "0.0.1001", "private_key": key(11) },
                { "id": "0.0.1002", "private_key": key(12) }
            ]
        })
        .to_string(),
    )
    .unwrap();
    config.retry = RetryPolicy::none();
    config
}

async fn run(
    registry: StepRegistry,
    source: &str,
    settings: RunnerSettings,
    clock: Arc<dyn Clock>,
) -> RunReport {
    let _ = env_logger::builder().is_test(true).try_init();
    let feature = parse_feature(source).unwrap();
    let (runner, _ledger) =
        ScenarioRunner::local(Arc::new(registry), &config(), settings, clock).unwrap();
    runner.run_feature(&feature).await
}

fn pass(_world: &mut ScenarioWorld, _args: StepArgs) -> StepFuture<'_> {
    Box::pin(async { Ok(()) })
}

fn wrong_answer(world: &mut ScenarioWorld, args: StepArgs) -> StepFuture<'_> {
    Box::pin(async move {
        let answer = args.u64(0)?;
        assert_equal(answer, 42, world.ctx("answer"))?;
        Ok(())
    })
}

/// One read, then a token creation whose response arrives after the step timeout
fn slow_create(world: &mut ScenarioWorld, _args: StepArgs) -> StepFuture<'_> {
    Box::pin(async move {
        let operator = world.operator();
        world.ledger().query_balance(&operator.id).await?;

        let spec = TokenSpec::builder("Slow Token", "SLW", operator.id)
            .initial_supply(10)
            .supply_key(operator.key.fingerprint())
            .build()
            .map_err(LedgerError::InvalidSpec)?;
        world
            .execute(&operator, &[], Mutation::CreateToken(spec))
            .await?;
        Ok(())
    })
}

fn basic_registry() -> StepRegistry {
    let mut registry = StepRegistry::new();
    registry
        .given(r"a ready harness", pass)
        .unwrap()
        .when(r"the (\w+) step runs", pass)
        .unwrap()
        .when(r"the first step runs", pass)
        .unwrap()
        .then(r"the answer is (\d+)", wrong_answer)
        .unwrap()
        .then(r"all is well", pass)
        .unwrap();
    registry.register(
        StepDefinition::pending(StepKind::When, r"the ledger is upgraded", "needs upgrade support")
            .unwrap(),
    );
    registry
}

fn statuses(report: &RunReport, scenario: usize) -> Vec<StepStatus> {
    report.scenarios[scenario]
        .steps
        .iter()
        .map(|s| s.status)
        .collect()
}

#[tokio::test]
async fn test_undefined_step_fails_scenario_and_skips_rest() {
    let report = run(
        basic_registry(),
        "Feature: F\n  Scenario: S\n    Given a ready harness\n    When nobody wrote this step\n    Then all is well\n",
        RunnerSettings::default(),
        Arc::new(SystemClock),
    )
    .await;

    use StepStatus::*;
    assert_eq!(statuses(&report, 0), vec![Passed, Undefined, Skipped]);
    let failure = report.scenarios[0].failure.as_ref().unwrap();
    assert_eq!(failure.kind, FailureKind::Undefined);
    assert_eq!(failure.step, "When nobody wrote this step");
    assert_eq!(report.summary().undefined, 1);
    assert!(!report.all_passed());
}

#[tokio::test]
async fn test_ambiguous_step_lists_candidates() {
    let report = run(
        basic_registry(),
        "Feature: F\n  Scenario: S\n    Given a ready harness\n    When the first step runs\n",
        RunnerSettings::default(),
        Arc::new(SystemClock),
    )
    .await;

    assert_eq!(report.scenarios[0].status(), StepStatus::Ambiguous);
    let failure = report.scenarios[0].failure.as_ref().unwrap();
    assert_eq!(failure.kind, FailureKind::Ambiguous);
    assert!(failure.message.contains(r"the (\w+) step runs"));
    assert!(failure.message.contains("the first step runs"));
}

#[tokio::test]
async fn test_pending_step_is_not_a_pass() {
    let report = run(
        basic_registry(),
        "Feature: F\n  Scenario: S\n    Given a ready harness\n    When the ledger is upgraded\n    Then all is well\n",
        RunnerSettings::default(),
        Arc::new(SystemClock),
    )
    .await;

    use StepStatus::*;
    assert_eq!(statuses(&report, 0), vec![Passed, Pending, Skipped]);
    assert_eq!(report.summary().pending, 1);
    assert!(report.scenarios[0]
        .failure
        .as_ref()
        .unwrap()
        .message
        .contains("needs upgrade support"));
    assert!(!report.all_passed());
}

#[tokio::test]
async fn test_assertion_failure_names_scenario_and_step() {
    let report = run(
        basic_registry(),
        "Feature: F\n  Scenario: Answers\n    Given a ready harness\n    Then the answer is 41\n    And all is well\n",
        RunnerSettings::default(),
        Arc::new(SystemClock),
    )
    .await;

    use StepStatus::*;
    assert_eq!(statuses(&report, 0), vec![Passed, Failed, Skipped]);
    let failure = report.scenarios[0].failure.as_ref().unwrap();
    assert_eq!(failure.kind, FailureKind::Assertion);
    assert_eq!(failure.scenario, "Answers");
    assert!(failure.message.contains("Answers"));
    assert!(failure.message.contains("42"));
    assert!(failure.message.contains("41"));
}

#[tokio::test]
async fn test_failure_does_not_leak_into_next_scenario() {
    let report = run(
        basic_registry(),
        "Feature: F\n  Scenario: Bad\n    Then the answer is 1\n  Scenario: Good\n    Given a ready harness\n    Then all is well\n",
        RunnerSettings::default(),
        Arc::new(SystemClock),
    )
    .await;

    assert!(!report.scenarios[0].passed());
    assert!(report.scenarios[1].passed());
    let summary = report.summary();
    assert_eq!((summary.passed, summary.failed), (1, 1));
}

#[tokio::test]
async fn test_step_kind_is_checked() {
    // "all is well" is only a Then step
    let report = run(
        basic_registry(),
        "Feature: F\n  Scenario: S\n    Given a ready harness\n    And all is well\n",
        RunnerSettings::default(),
        Arc::new(SystemClock),
    )
    .await;

    assert_eq!(report.scenarios[0].status(), StepStatus::Undefined);
}

#[tokio::test]
async fn test_rejected_submission_carries_network_status() {
    let source = "\
Feature: Transfers
  Scenario: Strict submit of an overdraft
    Given A first hedera account with more than 10 hbar
    And A second Hedera account
    And A token named Test Token (HTT) with 1000 tokens
    And The first account holds 5 HTT tokens
    And The second account holds 0 HTT tokens
    When The first account creates a transaction to transfer 10 HTT tokens to the second account
    And The first account submits the transaction
    Then The second account holds 10 HTT tokens
";
    let report = run(
        token_service_steps().unwrap(),
        source,
        RunnerSettings::default(),
        Arc::new(SystemClock),
    )
    .await;

    let failure = report.scenarios[0].failure.as_ref().unwrap();
    assert_eq!(failure.kind, FailureKind::Ledger);
    assert_eq!(failure.status, Some(Status::InsufficientTokenBalance));
    assert_eq!(report.scenarios[0].steps[7].status, StepStatus::Skipped);
}

#[tokio::test]
async fn test_symbol_mismatch_is_an_argument_error() {
    let source = "\
Feature: Transfers
  Scenario: Wrong symbol
    Given A token named Test Token (HTT) with 1000 tokens
    And The first account holds 5 XYZ tokens
";
    let report = run(
        token_service_steps().unwrap(),
        source,
        RunnerSettings::default(),
        Arc::new(SystemClock),
    )
    .await;

    let failure = report.scenarios[0].failure.as_ref().unwrap();
    assert_eq!(failure.kind, FailureKind::Argument);
    assert!(failure.message.contains("XYZ"));
}

#[tokio::test]
async fn test_oversized_transfer_amount_is_an_argument_error() {
    let _ = env_logger::builder().is_test(true).try_init();
    for amount in [u64::MAX, 1 << 63] {
        let source = format!(
            "\
Feature: Transfers
  Scenario: Amount past the signed range
    Given A first hedera account with more than 10 hbar
    And A second Hedera account
    And A token named Test Token (HTT) with 1000 tokens
    And The first account holds 100 HTT tokens
    And The second account holds 50 HTT tokens
    When The first account creates a transaction to transfer {amount} HTT tokens to the second account
    And The second account has signed the transaction
    And The first account submits the transaction
"
        );
        let feature = parse_feature(&source).unwrap();
        let (runner, ledger) = ScenarioRunner::local(
            Arc::new(token_service_steps().unwrap()),
            &config(),
            RunnerSettings::default(),
            Arc::new(SystemClock),
        )
        .unwrap();

        let report = runner.run_feature(&feature).await;

        let failure = report.scenarios[0].failure.as_ref().unwrap();
        assert_eq!(failure.kind, FailureKind::Argument);
        assert!(failure.message.contains(&amount.to_string()));
        assert_eq!(
            statuses(&report, 0)[5..],
            [StepStatus::Failed, StepStatus::Skipped, StepStatus::Skipped]
        );

        // Nothing reached the ledger, so the holdings stay as set up
        for (num, held) in [(1001, 100), (1002, 50)] {
            let balance = ledger.query_balance(&AccountId::from_num(num)).await.unwrap();
            assert_eq!(balance.tokens.values().copied().collect::<Vec<_>>(), vec![held]);
        }
    }
}

#[tokio::test]
async fn test_steps_before_token_creation_report_state_errors() {
    let source = "\
Feature: Tokens
  Scenario: No token yet
    Then The total supply of the token is 1000
";
    let report = run(
        token_service_steps().unwrap(),
        source,
        RunnerSettings::default(),
        Arc::new(SystemClock),
    )
    .await;

    assert_eq!(
        report.scenarios[0].failure.as_ref().unwrap().kind,
        FailureKind::State
    );
}

#[tokio::test]
async fn test_timed_out_step_reconciles_in_flight_transaction() {
    let clock = Arc::new(PausedClock::new());
    let mut registry = StepRegistry::new();
    registry
        .given(r"the operator creates a token over a slow network", slow_create)
        .unwrap()
        .then(r"all is well", pass)
        .unwrap();

    let feature = parse_feature(
        "Feature: F\n  Scenario: Slow\n    Given the operator creates a token over a slow network\n    Then all is well\n",
    )
    .unwrap();
    let settings = RunnerSettings::default().with_step_timeout(Duration::from_secs(30));
    let (runner, ledger) =
        ScenarioRunner::local(Arc::new(registry), &config(), settings, clock.clone()).unwrap();
    ledger.set_latency(Some(Duration::from_secs(20)));

    let report = runner.run_feature(&feature).await;

    use StepStatus::*;
    assert_eq!(statuses(&report, 0), vec![TimedOut, Skipped]);
    let failure = report.scenarios[0].failure.as_ref().unwrap();
    assert_eq!(failure.kind, FailureKind::Timeout);
    assert!(
        failure.message.contains("reconciled as SUCCESS"),
        "unexpected message: {}",
        failure.message
    );
}

#[tokio::test]
async fn test_step_timeout_without_mutation_has_nothing_to_reconcile() {
    let clock = Arc::new(PausedClock::new());
    let feature = parse_feature(
        "Feature: F\n  Scenario: Slow read\n    Given A Hedera account with more than 10 hbar\n",
    )
    .unwrap();
    let settings = RunnerSettings::default().with_step_timeout(Duration::from_secs(5));
    let (runner, ledger) = ScenarioRunner::local(
        Arc::new(token_service_steps().unwrap()),
        &config(),
        settings,
        clock,
    )
    .unwrap();
    ledger.set_latency(Some(Duration::from_secs(60)));

    let report = runner.run_feature(&feature).await;

    let failure = report.scenarios[0].failure.as_ref().unwrap();
    assert_eq!(failure.kind, FailureKind::Timeout);
    assert!(!failure.message.contains("in-flight"));
}
