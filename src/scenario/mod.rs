//! Scenarios: ordered trees of steps with setup and teardown
//!
//! A [`Scenario`] is built either in code or from a YAML document
//! ([`ScenarioDoc`]) and executed by the [`Engine`].

pub mod config;
pub mod engine;
pub mod sort_check;
pub mod step;

use std::collections::HashSet;

use crate::common::{Error, Result};

pub use config::{BuildOptions, ScenarioDoc};
pub use engine::Engine;
pub use sort_check::{SortCase, SortCheckStep};
pub use step::{Action, ActionOptions, ActionStep, Step};

/// A child of a scenario, run in declaration order
pub enum Node {
    Step(Box<dyn Step>),
    Scenario(Scenario),
}

/// Named group of steps and nested scenarios
///
/// Setup steps run first. If they all pass, the children run one after
/// another until the first failure, and the teardown steps run afterwards
/// regardless of how the children went.
pub struct Scenario {
    pub name: String,
    pub setup: Vec<Box<dyn Step>>,
    pub children: Vec<Node>,
    pub teardown: Vec<Box<dyn Step>>,
}

impl Scenario {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            setup: Vec::new(),
            children: Vec::new(),
            teardown: Vec::new(),
        }
    }

    pub fn setup(mut self, step: impl Step + 'static) -> Self {
        self.setup.push(Box::new(step));
        self
    }

    pub fn step(mut self, step: impl Step + 'static) -> Self {
        self.children.push(Node::Step(Box::new(step)));
        self
    }

    pub fn scenario(mut self, scenario: Scenario) -> Self {
        self.children.push(Node::Scenario(scenario));
        self
    }

    pub fn teardown(mut self, step: impl Step + 'static) -> Self {
        self.teardown.push(Box::new(step));
        self
    }

    /// Append an already built node
    pub fn push(&mut self, node: Node) {
        self.children.push(node);
    }

    /// Every step id in execution order, nested scenarios included
    pub fn step_ids(&self) -> Vec<&str> {
        let mut ids = Vec::new();
        self.collect_ids(&mut ids);
        ids
    }

    fn collect_ids<'a>(&'a self, ids: &mut Vec<&'a str>) {
        ids.extend(self.setup.iter().map(|s| s.id()));
        for child in &self.children {
            match child {
                Node::Step(step) => ids.push(step.id()),
                Node::Scenario(scenario) => scenario.collect_ids(ids),
            }
        }
        ids.extend(self.teardown.iter().map(|s| s.id()));
    }

    /// Number of steps in the whole tree
    pub fn len(&self) -> usize {
        self.step_ids().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Check that step ids are unique across the tree
    pub fn validate(&self) -> Result<()> {
        let mut seen = HashSet::new();
        for id in self.step_ids() {
            if id.is_empty() {
                return Err(Error::Config(format!(
                    "Step without id in scenario '{}'",
                    self.name
                )));
            }
            if !seen.insert(id) {
                return Err(Error::Config(format!("Duplicate step id '{}'", id)));
            }
        }
        Ok(())
    }
}

impl std::fmt::Debug for Scenario {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Scenario")
            .field("name", &self.name)
            .field("steps", &self.step_ids())
            .finish()
    }
}
