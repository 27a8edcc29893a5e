//! Feature-driven scenarios for the token service
//!
//! A run goes through four stages:
//! - [`feature`] parses `.feature` files into scenarios
//! - [`registry`] resolves each step's text to a handler
//! - [`runner`] executes the steps of every scenario against a fresh
//!   [`world::ScenarioWorld`]
//! - [`report`] collects step outcomes into a [`report::RunReport`]
//!
//! The token-service step table lives in [`steps`].

pub mod feature;
pub mod registry;
pub mod report;
pub mod runner;
pub mod state;
pub mod steps;
pub mod world;

pub use feature::{parse_feature, read_feature, Feature, FeatureError, Scenario};
pub use registry::{StepArgs, StepDefinition, StepKind, StepRegistry};
pub use report::{FailureKind, RunReport, ScenarioFailure, ScenarioReport, StepStatus};
pub use runner::{RunnerSettings, ScenarioRunner};
pub use steps::token_service_steps;
pub use world::ScenarioWorld;
