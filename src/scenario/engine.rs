//! Scenario execution
//!
//! The engine walks a [`Scenario`] tree depth-first, one step at a time.
//! The first failing step stops its remaining siblings; every scenario
//! whose setup completed still runs its teardown on the way back up. The
//! browser session is closed once the root scenario has finished.

use std::time::Instant;

use futures_util::future::BoxFuture;
use serde_json::Value;
use tracing::Instrument;
use uuid::Uuid;

use crate::common::{Error, Result};
use crate::context::ContextStore;
use crate::report::{
    FailureKind, Phase, Reporter, RunReport, RunStatus, SilentReporter, StepRecord, StepStatus,
    StepTag, TraceEvent,
};
use crate::session::{SessionFactory, SessionManager};

use super::step::Step;
use super::{Node, Scenario};

/// Runs a scenario tree against one browser session
pub struct Engine {
    sessions: SessionManager,
    reporter: Box<dyn Reporter>,
    run_id: String,
    base_context: Option<String>,
    vars: Vec<(String, Value)>,
}

impl Engine {
    pub fn new(factory: impl SessionFactory + 'static) -> Self {
        Self {
            sessions: SessionManager::new(factory),
            reporter: Box::new(SilentReporter),
            run_id: Uuid::new_v4().to_string(),
            base_context: None,
            vars: Vec::new(),
        }
    }

    pub fn with_reporter(mut self, reporter: impl Reporter + 'static) -> Self {
        self.reporter = Box::new(reporter);
        self
    }

    /// Tag sent with every step id; defaults to the root scenario name
    pub fn with_base_context(mut self, base_context: impl Into<String>) -> Self {
        self.base_context = Some(base_context.into());
        self
    }

    /// Override the generated run id
    pub fn with_run_id(mut self, run_id: impl Into<String>) -> Self {
        self.run_id = run_id.into();
        self
    }

    /// Seed the context store before the first step
    pub fn with_var(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.vars.push((key.into(), value.into()));
        self
    }

    pub fn run_id(&self) -> &str {
        &self.run_id
    }

    /// Run `scenario` to completion
    ///
    /// Fails only when the scenario is invalid. Step failures, including
    /// resource failures, end up in the returned report.
    pub async fn run(self, scenario: &Scenario) -> Result<RunReport> {
        scenario.validate()?;

        let Engine {
            sessions,
            reporter,
            run_id,
            base_context,
            vars,
        } = self;

        let mut ctx = ContextStore::new();
        for (key, value) in vars {
            ctx.set(key, value);
        }

        let mut run = Run {
            base_context: base_context.unwrap_or_else(|| scenario.name.clone()),
            run_id,
            ctx,
            sessions,
            reporter,
            path: Vec::new(),
            records: Vec::new(),
            trace: Vec::new(),
            resource_error: None,
        };

        tracing::info!(
            run_id = %run.run_id,
            base_context = %run.base_context,
            steps = scenario.len(),
            "starting run of '{}'",
            scenario.name
        );
        let passed = run.scenario(scenario, 0).await;
        run.close_session().await;
        Ok(run.finish(scenario, passed))
    }
}

/// State of one run in progress
struct Run {
    run_id: String,
    base_context: String,
    ctx: ContextStore,
    sessions: SessionManager,
    reporter: Box<dyn Reporter>,
    /// Names of the scenarios entered, outermost first
    path: Vec<String>,
    records: Vec<StepRecord>,
    trace: Vec<TraceEvent>,
    /// First resource failure seen
    resource_error: Option<String>,
}

impl Run {
    /// Run one scenario and return whether it passed
    fn scenario<'a>(&'a mut self, scenario: &'a Scenario, depth: usize) -> BoxFuture<'a, bool> {
        Box::pin(async move {
            let name = scenario.name.as_str();
            self.path.push(scenario.name.clone());
            self.trace.push(TraceEvent::ScenarioEntered {
                scenario: scenario.name.clone(),
            });
            self.reporter.scenario_started(name, depth);
            tracing::info!(depth, "entering scenario '{}'", name);

            for (i, step) in scenario.setup.iter().enumerate() {
                if !self.step(step.as_ref(), Phase::Setup, depth).await {
                    let reason = format!("setup of '{}' failed", name);
                    self.skip_steps(&scenario.setup[i + 1..], Phase::Setup, &reason, depth);
                    self.skip_children(&scenario.children, &reason, depth);
                    self.skip_steps(&scenario.teardown, Phase::Teardown, &reason, depth);
                    return self.leave(scenario, false, depth);
                }
            }
            self.trace.push(TraceEvent::SetupCompleted {
                scenario: scenario.name.clone(),
            });

            let mut passed = true;
            for (i, child) in scenario.children.iter().enumerate() {
                let ok = match child {
                    Node::Step(step) => self.step(step.as_ref(), Phase::Body, depth).await,
                    Node::Scenario(nested) => self.scenario(nested, depth + 1).await,
                };
                if !ok {
                    passed = false;
                    self.skip_children(&scenario.children[i + 1..], "an earlier step failed", depth);
                    break;
                }
            }

            if !scenario.teardown.is_empty() {
                self.trace.push(TraceEvent::TeardownStarted {
                    scenario: scenario.name.clone(),
                });
                for (i, step) in scenario.teardown.iter().enumerate() {
                    if !self.step(step.as_ref(), Phase::Teardown, depth).await {
                        passed = false;
                        self.skip_steps(
                            &scenario.teardown[i + 1..],
                            Phase::Teardown,
                            "an earlier teardown step failed",
                            depth,
                        );
                        break;
                    }
                }
            }

            self.leave(scenario, passed, depth)
        })
    }

    fn leave(&mut self, scenario: &Scenario, passed: bool, depth: usize) -> bool {
        self.trace.push(TraceEvent::ScenarioFinished {
            scenario: scenario.name.clone(),
            passed,
        });
        self.reporter.scenario_finished(&scenario.name, passed, depth);
        tracing::info!(passed, "leaving scenario '{}'", scenario.name);
        self.path.pop();
        passed
    }

    /// Run one step and return whether the scenario may continue
    async fn step(&mut self, step: &dyn Step, phase: Phase, depth: usize) -> bool {
        if let Some(reason) = step.skip_reason() {
            tracing::info!(step_id = step.id(), reason, "step skipped");
            self.skip(step, phase, reason, depth);
            return true;
        }

        let tag = StepTag {
            run_id: self.run_id.clone(),
            step_id: step.id().to_string(),
            base_context: self.base_context.clone(),
        };
        self.reporter.step_started(&tag);
        self.trace.push(TraceEvent::StepStarted {
            step: tag.step_id.clone(),
        });

        let span = tracing::info_span!(
            "step",
            run_id = %tag.run_id,
            step_id = %tag.step_id,
            base_context = %tag.base_context
        );
        span.in_scope(|| tracing::info!(label = step.label(), ?phase, "step started"));

        let started = Instant::now();
        let result = step
            .execute(&mut self.ctx, &mut self.sessions)
            .instrument(span.clone())
            .await;
        let duration_ms = started.elapsed().as_millis() as u64;

        let status = match result {
            Ok(()) => {
                span.in_scope(|| tracing::info!(duration_ms, "step passed"));
                self.trace.push(TraceEvent::StepPassed {
                    step: tag.step_id.clone(),
                });
                StepStatus::Passed
            }
            Err(e) => {
                let kind = classify(&e, phase);
                span.in_scope(|| tracing::warn!(?kind, error = %e, "step failed"));
                if kind == FailureKind::Resource && self.resource_error.is_none() {
                    self.resource_error = Some(e.to_string());
                }
                self.trace.push(TraceEvent::StepFailed {
                    step: tag.step_id.clone(),
                });
                failure(kind, e)
            }
        };

        let passed = matches!(status, StepStatus::Passed);
        self.record(step, phase, status, duration_ms, depth);
        passed
    }

    fn skip(&mut self, step: &dyn Step, phase: Phase, reason: &str, depth: usize) {
        self.trace.push(TraceEvent::StepSkipped {
            step: step.id().to_string(),
        });
        let status = StepStatus::Skipped {
            reason: reason.to_string(),
        };
        self.record(step, phase, status, 0, depth);
    }

    fn skip_steps(&mut self, steps: &[Box<dyn Step>], phase: Phase, reason: &str, depth: usize) {
        for step in steps {
            self.skip(step.as_ref(), phase, reason, depth);
        }
    }

    fn skip_children(&mut self, children: &[Node], reason: &str, depth: usize) {
        for child in children {
            match child {
                Node::Step(step) => self.skip(step.as_ref(), Phase::Body, reason, depth),
                Node::Scenario(nested) => {
                    self.path.push(nested.name.clone());
                    self.skip_steps(&nested.setup, Phase::Setup, reason, depth + 1);
                    self.skip_children(&nested.children, reason, depth + 1);
                    self.skip_steps(&nested.teardown, Phase::Teardown, reason, depth + 1);
                    self.path.pop();
                }
            }
        }
    }

    fn record(&mut self, step: &dyn Step, phase: Phase, status: StepStatus, duration_ms: u64, depth: usize) {
        let record = StepRecord {
            id: step.id().to_string(),
            label: step.label().to_string(),
            scenario: self.path.clone(),
            phase,
            status,
            duration_ms,
        };
        self.reporter.step_finished(&record, depth);
        self.records.push(record);
    }

    async fn close_session(&mut self) {
        match self.sessions.close().await {
            Ok(true) => self.trace.push(TraceEvent::SessionClosed),
            Ok(false) => tracing::debug!("run finished without opening a browser session"),
            Err(e) => {
                tracing::error!(error = %e, "browser session could not be closed");
                if self.resource_error.is_none() {
                    self.resource_error = Some(e.to_string());
                }
            }
        }
    }

    fn finish(mut self, scenario: &Scenario, passed: bool) -> RunReport {
        let status = match self.resource_error.take() {
            Some(message) => RunStatus::Errored { message },
            None if passed => RunStatus::Passed,
            None => RunStatus::Failed,
        };
        tracing::info!(run_id = %self.run_id, %status, "run finished");

        let report = RunReport {
            run_id: self.run_id,
            scenario: scenario.name.clone(),
            base_context: self.base_context,
            status,
            steps: self.records,
            trace: self.trace,
        };
        self.reporter.run_finished(&report);
        report
    }
}

/// Decide how a step failure is reported
fn classify(error: &Error, phase: Phase) -> FailureKind {
    if error.is_resource() {
        FailureKind::Resource
    } else if phase == Phase::Setup {
        FailureKind::Precondition
    } else if error.is_assertion() {
        FailureKind::Assertion
    } else {
        FailureKind::Action
    }
}

fn failure(kind: FailureKind, error: Error) -> StepStatus {
    let message = error.to_string();
    let (expected, actual) = match error {
        Error::Assertion {
            expected, actual, ..
        } => (Some(expected), Some(actual)),
        _ => (None, None),
    };
    StepStatus::Failed {
        kind,
        message,
        expected,
        actual,
    }
}
