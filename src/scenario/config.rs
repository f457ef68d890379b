//! Scenario file format
//!
//! Defines the data structures for deserializing YAML scenarios and
//! compiling them into a [`Scenario`] tree.

use std::collections::HashMap;
use std::path::Path;

use serde::Deserialize;
use serde_json::Value;

use crate::common::{Error, Result};

use super::sort_check::{SortCase, SortCheckStep};
use super::step::{Action, ActionOptions, ActionStep, DEFAULT_TAB_TIMEOUT_MS};
use super::{Node, Scenario};

/// A complete scenario loaded from a YAML file
#[derive(Deserialize, Debug)]
pub struct ScenarioDoc {
    /// Name of the root scenario
    pub name: String,
    /// Optional description of what the scenario verifies
    pub description: Option<String>,
    /// Tag sent with every step id to the reporter; defaults to a slug of the name
    pub base_context: Option<String>,
    /// Initial context values
    #[serde(default)]
    pub vars: HashMap<String, Value>,
    #[serde(default)]
    pub setup: Vec<StepSpec>,
    #[serde(default)]
    pub steps: Vec<NodeSpec>,
    #[serde(default)]
    pub teardown: Vec<StepSpec>,
}

/// A nested scenario
#[derive(Deserialize, Debug)]
pub struct ScenarioSpec {
    pub name: String,
    #[serde(default)]
    pub setup: Vec<StepSpec>,
    #[serde(default)]
    pub steps: Vec<NodeSpec>,
    #[serde(default)]
    pub teardown: Vec<StepSpec>,
}

/// One entry of a `steps` list
#[derive(Deserialize, Debug)]
#[serde(untagged)]
pub enum NodeSpec {
    Scenario { scenario: ScenarioSpec },
    SortCheck { sort_check: SortCheckSpec },
    Step(StepSpec),
}

/// A step made of declarative actions
#[derive(Deserialize, Debug)]
#[serde(deny_unknown_fields)]
pub struct StepSpec {
    pub id: String,
    pub label: Option<String>,
    pub actions: Vec<Action>,
}

/// A table-driven sort check: one step per case
#[derive(Deserialize, Debug)]
#[serde(deny_unknown_fields)]
pub struct SortCheckSpec {
    /// Actions that make the UI sort; `${sort_by}` names the case's option
    pub trigger: Vec<Action>,
    /// Pause after the trigger before re-capturing
    #[serde(default)]
    pub settle_ms: u64,
    pub cases: Vec<SortCase>,
}

/// Settings applied while compiling a document
#[derive(Debug, Clone, Copy)]
pub struct BuildOptions {
    /// Default wait for `open_tab` actions without their own timeout
    pub tab_timeout_ms: u64,
}

impl Default for BuildOptions {
    fn default() -> Self {
        Self {
            tab_timeout_ms: DEFAULT_TAB_TIMEOUT_MS,
        }
    }
}

impl BuildOptions {
    fn actions(&self) -> ActionOptions {
        ActionOptions {
            tab_timeout_ms: self.tab_timeout_ms,
        }
    }
}

impl ScenarioDoc {
    /// Load a scenario document from a YAML file
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| Error::FileRead {
            path: path.display().to_string(),
            error: e.to_string(),
        })?;
        Self::from_yaml(&content)
    }

    pub fn from_yaml(content: &str) -> Result<Self> {
        Ok(serde_yaml::from_str(content)?)
    }

    /// Reporting tag for this document
    pub fn base_context(&self) -> String {
        self.base_context
            .clone()
            .unwrap_or_else(|| slug(&self.name))
    }

    /// Compile the document into a validated scenario tree
    pub fn build(&self, options: &BuildOptions) -> Result<Scenario> {
        let scenario = build_scenario(&self.name, &self.setup, &self.steps, &self.teardown, options)?;
        scenario.validate()?;
        Ok(scenario)
    }
}

fn build_scenario(
    name: &str,
    setup: &[StepSpec],
    steps: &[NodeSpec],
    teardown: &[StepSpec],
    options: &BuildOptions,
) -> Result<Scenario> {
    let mut scenario = Scenario::new(name);
    for spec in setup {
        scenario.setup.push(Box::new(build_step(spec, options)));
    }

    for node in steps {
        match node {
            NodeSpec::Step(spec) => scenario.push(Node::Step(Box::new(build_step(spec, options)))),
            NodeSpec::Scenario { scenario: nested } => {
                let child = build_scenario(
                    &nested.name,
                    &nested.setup,
                    &nested.steps,
                    &nested.teardown,
                    options,
                )?;
                scenario.push(Node::Scenario(child));
            }
            NodeSpec::SortCheck { sort_check } => {
                if sort_check.cases.is_empty() {
                    return Err(Error::Config(format!(
                        "sort_check in scenario '{}' has no cases",
                        name
                    )));
                }
                if sort_check.trigger.is_empty() {
                    return Err(Error::Config(format!(
                        "sort_check in scenario '{}' has no trigger actions",
                        name
                    )));
                }
                for step in SortCheckStep::expand(
                    &sort_check.cases,
                    &sort_check.trigger,
                    sort_check.settle_ms,
                ) {
                    scenario.push(Node::Step(Box::new(step.with_options(options.actions()))));
                }
            }
        }
    }

    for spec in teardown {
        scenario.teardown.push(Box::new(build_step(spec, options)));
    }
    Ok(scenario)
}

fn build_step(spec: &StepSpec, options: &BuildOptions) -> ActionStep {
    ActionStep::new(&spec.id, spec.label.as_deref(), spec.actions.clone())
        .with_options(options.actions())
}

/// Lowercase name with runs of other characters collapsed to `-`
fn slug(name: &str) -> String {
    name.split(|c: char| !c.is_ascii_alphanumeric())
        .filter(|part| !part.is_empty())
        .map(str::to_ascii_lowercase)
        .collect::<Vec<_>>()
        .join("-")
}
