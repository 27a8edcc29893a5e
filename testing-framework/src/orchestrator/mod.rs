// File: testing-framework/src/orchestrator/mod.rs
//
// Orchestrator Module
//
// Time control shared by the ledger adapters and the scenario runner.

/// Clock abstractions for deterministic time control in tests
pub mod clock;

pub use clock::{Clock, PausedClock, SystemClock};
