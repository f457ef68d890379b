//! Scenario Runner - browser-driven scenario tests for storefronts
//!
//! Scenarios are ordered trees of steps with setup and teardown. Steps
//! drive one browser session per run, share values through a run-scoped
//! context store and report every outcome, tagged with the run id and a
//! base context, to a reporter.

pub mod cli;
pub mod commands;
pub mod common;
pub mod context;
pub mod ordering;
pub mod report;
pub mod scenario;
pub mod session;

// Re-export commonly used types for tests
pub use common::{Error, Result};
pub use context::ContextStore;
pub use report::{RunReport, RunStatus};
pub use scenario::{Engine, Scenario, ScenarioDoc};
