//! Run reporting
//!
//! The engine tags every step with (run id, step id, base context) before
//! running it, keeps one [`StepRecord`] per step and an ordered trace of
//! what happened. [`Reporter`] implementations receive the same events as
//! they occur.

use std::path::Path;

use colored::Colorize;
use serde::Serialize;

use crate::common::Result;

/// Correlation tag handed to the reporting sink before a step runs
#[derive(Debug, Clone, Serialize)]
pub struct StepTag {
    pub run_id: String,
    pub step_id: String,
    pub base_context: String,
}

/// Which part of a scenario a step belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    Setup,
    Body,
    Teardown,
}

/// Why a step failed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// A setup step failed; the scenario's own teardown is not run
    Precondition,
    /// Actual application state differed from the expectation
    Assertion,
    /// The action itself could not be performed (element missing, ...)
    Action,
    /// The browser session could not be opened or closed
    Resource,
}

/// Outcome of a single step
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum StepStatus {
    Passed,
    Failed {
        kind: FailureKind,
        message: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        expected: Option<String>,
        #[serde(skip_serializing_if = "Option::is_none")]
        actual: Option<String>,
    },
    Skipped {
        reason: String,
    },
}

/// Result of one step in the run
#[derive(Debug, Clone, Serialize)]
pub struct StepRecord {
    pub id: String,
    pub label: String,
    /// Scenario path, outermost first
    pub scenario: Vec<String>,
    pub phase: Phase,
    #[serde(flatten)]
    pub status: StepStatus,
    pub duration_ms: u64,
}

impl StepRecord {
    pub fn passed(&self) -> bool {
        matches!(self.status, StepStatus::Passed)
    }

    pub fn failed(&self) -> bool {
        matches!(self.status, StepStatus::Failed { .. })
    }

    pub fn skipped(&self) -> bool {
        matches!(self.status, StepStatus::Skipped { .. })
    }
}

/// One entry of the ordered execution trace
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum TraceEvent {
    ScenarioEntered { scenario: String },
    SetupCompleted { scenario: String },
    StepStarted { step: String },
    StepPassed { step: String },
    StepFailed { step: String },
    StepSkipped { step: String },
    TeardownStarted { scenario: String },
    ScenarioFinished { scenario: String, passed: bool },
    SessionClosed,
}

/// Overall outcome of a run
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum RunStatus {
    Passed,
    Failed,
    /// A resource failure made the run unusable; results are not interpreted
    Errored { message: String },
}

impl std::fmt::Display for RunStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Passed => write!(f, "passed"),
            Self::Failed => write!(f, "failed"),
            Self::Errored { message } => write!(f, "errored: {}", message),
        }
    }
}

/// Complete result of running one scenario tree
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub run_id: String,
    pub scenario: String,
    pub base_context: String,
    #[serde(flatten)]
    pub status: RunStatus,
    pub steps: Vec<StepRecord>,
    pub trace: Vec<TraceEvent>,
}

impl RunReport {
    pub fn passed(&self) -> bool {
        self.status == RunStatus::Passed
    }

    pub fn step(&self, id: &str) -> Option<&StepRecord> {
        self.steps.iter().find(|s| s.id == id)
    }

    /// Counts of (passed, failed, skipped) steps
    pub fn counts(&self) -> (usize, usize, usize) {
        self.steps.iter().fold((0, 0, 0), |(p, f, s), step| match step.status {
            StepStatus::Passed => (p + 1, f, s),
            StepStatus::Failed { .. } => (p, f + 1, s),
            StepStatus::Skipped { .. } => (p, f, s + 1),
        })
    }

    /// Write the report as pretty-printed JSON
    pub fn write_json(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_vec_pretty(self)?;
        std::fs::write(path, json)?;
        Ok(())
    }
}

/// Sink receiving run events as they happen
pub trait Reporter: Send {
    fn scenario_started(&mut self, _name: &str, _depth: usize) {}
    fn step_started(&mut self, _tag: &StepTag) {}
    fn step_finished(&mut self, _record: &StepRecord, _depth: usize) {}
    fn scenario_finished(&mut self, _name: &str, _passed: bool, _depth: usize) {}
    fn run_finished(&mut self, _report: &RunReport) {}
}

/// Reporter that ignores every event
#[derive(Debug, Default)]
pub struct SilentReporter;

impl Reporter for SilentReporter {}

/// Human-readable progress on stdout
#[derive(Debug, Default)]
pub struct ConsoleReporter {
    verbose: bool,
}

impl ConsoleReporter {
    pub fn new(verbose: bool) -> Self {
        Self { verbose }
    }
}

fn indent(depth: usize) -> String {
    "  ".repeat(depth + 1)
}

impl Reporter for ConsoleReporter {
    fn scenario_started(&mut self, name: &str, depth: usize) {
        if depth == 0 {
            println!("\n{} {}", "Running Scenario:".blue().bold(), name.white().bold());
        } else {
            println!("{}{}", indent(depth - 1), name.cyan());
        }
    }

    fn step_started(&mut self, tag: &StepTag) {
        if self.verbose {
            println!(
                "    {} {}",
                "→".dimmed(),
                format!("{}/{}", tag.base_context, tag.step_id).dimmed()
            );
        }
    }

    fn step_finished(&mut self, record: &StepRecord, depth: usize) {
        let pad = indent(depth);
        let phase = match record.phase {
            Phase::Setup => "[setup] ",
            Phase::Body => "",
            Phase::Teardown => "[teardown] ",
        };
        match &record.status {
            StepStatus::Passed => println!(
                "{}{} {}{} {}",
                pad,
                "✓".green(),
                phase.dimmed(),
                record.label,
                format!("({} ms)", record.duration_ms).dimmed()
            ),
            StepStatus::Failed { message, .. } => {
                println!("{}{} {}{}", pad, "✗".red(), phase.dimmed(), record.label);
                println!("{}  {}", pad, message.red());
            }
            StepStatus::Skipped { reason } => println!(
                "{}{} {}{} {}",
                pad,
                "-".yellow(),
                phase.dimmed(),
                record.label.dimmed(),
                format!("(skipped: {})", reason).dimmed()
            ),
        }
    }

    fn run_finished(&mut self, report: &RunReport) {
        let (passed, failed, skipped) = report.counts();
        let summary = format!("{} passed, {} failed, {} skipped", passed, failed, skipped);
        match &report.status {
            RunStatus::Passed => println!(
                "\n{} {} ({})\n",
                "✓".green().bold(),
                "Scenario Passed".green().bold(),
                summary
            ),
            RunStatus::Failed => println!(
                "\n{} {} ({})\n",
                "✗".red().bold(),
                "Scenario Failed".red().bold(),
                summary
            ),
            RunStatus::Errored { message } => println!(
                "\n{} {}: {} ({})\n",
                "✗".red().bold(),
                "Scenario Errored".red().bold(),
                message,
                summary
            ),
        }
    }
}
