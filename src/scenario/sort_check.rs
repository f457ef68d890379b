//! Table-driven sort verification
//!
//! One [`SortCheckStep`] is generated per [`SortCase`]. Each step captures
//! the texts of the listed items, triggers the UI sort, captures again and
//! compares the result with [`canonical_order`] applied to the first
//! capture.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;

use crate::common::{Error, Result};
use crate::context::ContextStore;
use crate::ordering::{canonical_order, Direction, OrderKey};
use crate::session::SessionManager;

use super::step::{Action, ActionOptions, Step};

/// One fixture record of a sort check
#[derive(Deserialize, Debug, Clone)]
#[serde(deny_unknown_fields)]
pub struct SortCase {
    /// Step identifier
    pub id: String,
    /// Sort option as shown to the user, e.g. "Name, A to Z"
    pub label: String,
    /// Selector of the attribute to capture on every listed item
    pub attribute: String,
    /// Value handed to the trigger actions as `${sort_by}`
    pub sort_by: String,
    pub direction: Direction,
    /// How captured texts are compared
    #[serde(default)]
    pub order: OrderKey,
    /// Known gap: report the case as skipped with this reason
    pub skip: Option<String>,
}

impl SortCase {
    fn locals(&self) -> HashMap<String, String> {
        HashMap::from([
            ("id".to_string(), self.id.clone()),
            ("label".to_string(), self.label.clone()),
            ("attribute".to_string(), self.attribute.clone()),
            ("sort_by".to_string(), self.sort_by.clone()),
            ("direction".to_string(), self.direction.to_string()),
        ])
    }
}

/// Step template instantiated once per [`SortCase`]
#[derive(Debug, Clone)]
pub struct SortCheckStep {
    case: SortCase,
    label: String,
    trigger: Vec<Action>,
    settle_ms: u64,
    options: ActionOptions,
}

impl SortCheckStep {
    pub fn new(case: SortCase, trigger: Vec<Action>) -> Self {
        Self {
            label: format!("should sort by '{}'", case.label),
            case,
            trigger,
            settle_ms: 0,
            options: ActionOptions::default(),
        }
    }

    /// Pause after the trigger before re-capturing
    pub fn with_settle(mut self, settle_ms: u64) -> Self {
        self.settle_ms = settle_ms;
        self
    }

    pub fn with_options(mut self, options: ActionOptions) -> Self {
        self.options = options;
        self
    }

    pub fn case(&self) -> &SortCase {
        &self.case
    }

    /// Expand a fixture table into one step per record
    pub fn expand(cases: &[SortCase], trigger: &[Action], settle_ms: u64) -> Vec<Self> {
        cases
            .iter()
            .map(|case| Self::new(case.clone(), trigger.to_vec()).with_settle(settle_ms))
            .collect()
    }
}

#[async_trait]
impl Step for SortCheckStep {
    fn id(&self) -> &str {
        &self.case.id
    }

    fn label(&self) -> &str {
        &self.label
    }

    fn skip_reason(&self) -> Option<&str> {
        self.case.skip.as_deref()
    }

    async fn execute(&self, ctx: &mut ContextStore, sessions: &mut SessionManager) -> Result<()> {
        let locals = self.case.locals();
        let attribute = ctx.render(&self.case.attribute, &locals)?;

        let before = sessions.open().await?.texts(&attribute).await?;
        if before.is_empty() {
            return Err(Error::ElementNotFound(attribute));
        }

        for action in &self.trigger {
            action.perform(ctx, sessions, &locals, self.options).await?;
        }
        if self.settle_ms > 0 {
            tokio::time::sleep(Duration::from_millis(self.settle_ms)).await;
        }

        let after = sessions.open().await?.texts(&attribute).await?;
        let expected = canonical_order(&before, self.case.order, self.case.direction)?;
        tracing::debug!(
            sort_by = %self.case.sort_by,
            items = before.len(),
            "comparing sorted list with canonical order"
        );

        if after != expected {
            return Err(Error::assertion(
                format!("List not sorted by '{}'", self.case.label),
                expected,
                after,
            ));
        }
        Ok(())
    }
}
