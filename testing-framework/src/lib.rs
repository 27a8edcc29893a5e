//! # HTS Testing Framework
//!
//! Behavior-driven test harness for a ledger's token service: balance
//! queries, token creation, minting, association and transfers.
//!
//! ## Architecture Overview
//!
//! - **accounts**: operator and participant accounts, key material
//! - **ledger**: the `LedgerClient` seam, retrying reads, receipt
//!   reconciliation and an in-process ledger double
//! - **scenarios**: feature parsing, step registry, runner and reports
//! - **assertions**: comparisons that carry their scenario and step
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use hts_testing_framework::prelude::*;
//!
//! #[tokio::test]
//! async fn test_token_feature() {
//!     let clock: Arc<dyn Clock> = Arc::new(PausedClock::new());
//!     let config = HarnessConfig::load(Path::new("hts-tck.json")).unwrap();
//!     let registry = Arc::new(token_service_steps().unwrap());
//!     let settings = RunnerSettings::from_config(&config);
//!     let (runner, _ledger) = ScenarioRunner::local(registry, &config, settings, clock).unwrap();
//!
//!     let feature = parse_feature(include_str!("../features/token_service.feature")).unwrap();
//!     let report = runner.run_feature(&feature).await;
//!     assert!(report.all_passed());
//! }
//! ```

#![warn(clippy::all)]

pub mod accounts;
pub mod assertions;
pub mod config;
pub mod error;
pub mod ledger;
pub mod logging;

/// Core orchestration - provides Clock for deterministic time
pub mod orchestrator;

pub mod scenarios;

// Convenient re-exports for common usage
pub mod prelude;

pub use accounts::{AccountContext, AccountId, Ordinal, TestAccount};
pub use config::HarnessConfig;
pub use error::StepError;
pub use ledger::{InMemoryLedger, LedgerClient, LedgerError};
pub use orchestrator::{Clock, PausedClock, SystemClock};

/// Framework version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
