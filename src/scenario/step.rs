//! Steps and the declarative actions they are made of

use std::collections::HashMap;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use serde::Deserialize;

use crate::common::{Error, Result};
use crate::context::{parse_scalar, ContextStore};
use crate::session::SessionManager;

/// How long `open_tab` waits for a new tab when nothing else is configured
pub const DEFAULT_TAB_TIMEOUT_MS: u64 = 10_000;

const TAB_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// A single reportable unit of work
///
/// Steps run exactly once per run, strictly one after another. They read
/// and write the run's [`ContextStore`] and reach the browser through the
/// [`SessionManager`], which opens the session on first use.
#[async_trait]
pub trait Step: Send + Sync {
    /// Identifier, unique within a run
    fn id(&self) -> &str;

    /// Human-readable description
    fn label(&self) -> &str {
        self.id()
    }

    /// When set, the step is reported as skipped and never executed
    fn skip_reason(&self) -> Option<&str> {
        None
    }

    async fn execute(&self, ctx: &mut ContextStore, sessions: &mut SessionManager) -> Result<()>;
}

/// Options shared by every action of a compiled scenario
#[derive(Debug, Clone, Copy)]
pub struct ActionOptions {
    pub tab_timeout_ms: u64,
}

impl Default for ActionOptions {
    fn default() -> Self {
        Self {
            tab_timeout_ms: DEFAULT_TAB_TIMEOUT_MS,
        }
    }
}

fn default_true() -> bool {
    true
}

/// One browser interaction or assertion
///
/// String fields accept `${key}` placeholders resolved against the
/// context store at the time the action runs.
#[derive(Deserialize, Debug, Clone)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum Action {
    /// Load a URL in the current tab
    Navigate { url: String },
    /// Click the first element matching a selector
    Click { selector: String },
    /// Replace the value of an input
    Fill { selector: String, value: String },
    /// Pick an `<option>` of a `<select>` by its value
    Select { selector: String, value: String },
    /// Click something that opens a new tab, then switch to that tab
    OpenTab {
        selector: String,
        timeout_ms: Option<u64>,
    },
    /// Switch to tab `index` (in opening order)
    SwitchTab { index: usize },
    /// Close the current tab and switch to another one
    CloseTab {
        #[serde(default)]
        switch_to: usize,
    },
    /// Pause for a fixed time
    Wait { ms: u64 },
    /// Store a value in the context
    Store { key: String, value: String },
    /// Store the number of elements matching a selector
    Count { selector: String, store: String },
    /// Store the texts of every element matching a selector
    Capture { selector: String, store: String },
    /// Check the document title
    ExpectTitle {
        contains: Option<String>,
        equals: Option<String>,
    },
    /// Check the text of the first element matching a selector
    ExpectText {
        selector: String,
        contains: Option<String>,
        equals: Option<String>,
    },
    /// Check whether any element matches a selector
    ExpectVisible {
        selector: String,
        #[serde(default = "default_true")]
        visible: bool,
    },
    /// Check `min <= value <= max` numerically
    ExpectRange {
        value: String,
        min: Option<String>,
        max: Option<String>,
    },
    /// Check that two rendered strings are equal
    ExpectEqual { actual: String, expected: String },
}

impl Action {
    /// Short name used in logs
    pub fn name(&self) -> &'static str {
        match self {
            Self::Navigate { .. } => "navigate",
            Self::Click { .. } => "click",
            Self::Fill { .. } => "fill",
            Self::Select { .. } => "select",
            Self::OpenTab { .. } => "open_tab",
            Self::SwitchTab { .. } => "switch_tab",
            Self::CloseTab { .. } => "close_tab",
            Self::Wait { .. } => "wait",
            Self::Store { .. } => "store",
            Self::Count { .. } => "count",
            Self::Capture { .. } => "capture",
            Self::ExpectTitle { .. } => "expect_title",
            Self::ExpectText { .. } => "expect_text",
            Self::ExpectVisible { .. } => "expect_visible",
            Self::ExpectRange { .. } => "expect_range",
            Self::ExpectEqual { .. } => "expect_equal",
        }
    }

    /// Perform the action
    ///
    /// `locals` shadow context keys during placeholder expansion.
    pub async fn perform(
        &self,
        ctx: &mut ContextStore,
        sessions: &mut SessionManager,
        locals: &HashMap<String, String>,
        options: ActionOptions,
    ) -> Result<()> {
        tracing::debug!(action = self.name(), "performing action");

        match self {
            Self::Navigate { url } => {
                let url = ctx.render(url, locals)?;
                sessions.open().await?.navigate(&url).await
            }

            Self::Click { selector } => {
                let selector = ctx.render(selector, locals)?;
                sessions.open().await?.click(&selector).await
            }

            Self::Fill { selector, value } => {
                let selector = ctx.render(selector, locals)?;
                let value = ctx.render(value, locals)?;
                sessions.open().await?.fill(&selector, &value).await
            }

            Self::Select { selector, value } => {
                let selector = ctx.render(selector, locals)?;
                let value = ctx.render(value, locals)?;
                let option = format!("{} option[value=\"{}\"]", selector, value);
                sessions.open().await?.click(&option).await
            }

            Self::OpenTab {
                selector,
                timeout_ms,
            } => {
                let selector = ctx.render(selector, locals)?;
                let timeout_ms = timeout_ms.unwrap_or(options.tab_timeout_ms);
                let session = sessions.open().await?;

                let before = session.tab_count().await?;
                session.click(&selector).await?;

                let deadline = Instant::now() + Duration::from_millis(timeout_ms);
                let count = loop {
                    let count = session.tab_count().await?;
                    if count > before {
                        break count;
                    }
                    if Instant::now() >= deadline {
                        return Err(Error::Timeout(timeout_ms));
                    }
                    tokio::time::sleep(TAB_POLL_INTERVAL).await;
                };
                session.switch_tab(count - 1).await
            }

            Self::SwitchTab { index } => sessions.open().await?.switch_tab(*index).await,

            Self::CloseTab { switch_to } => {
                let session = sessions.open().await?;
                session.close_tab().await?;
                session.switch_tab(*switch_to).await
            }

            Self::Wait { ms } => {
                tokio::time::sleep(Duration::from_millis(*ms)).await;
                Ok(())
            }

            Self::Store { key, value } => {
                let value = ctx.render(value, locals)?;
                ctx.set(key.clone(), parse_scalar(&value));
                Ok(())
            }

            Self::Count { selector, store } => {
                let selector = ctx.render(selector, locals)?;
                let count = sessions.open().await?.count(&selector).await?;
                tracing::debug!(%selector, count, key = %store, "stored element count");
                ctx.set(store.clone(), count);
                Ok(())
            }

            Self::Capture { selector, store } => {
                let selector = ctx.render(selector, locals)?;
                let texts = sessions.open().await?.texts(&selector).await?;
                ctx.set(store.clone(), texts);
                Ok(())
            }

            Self::ExpectTitle { contains, equals } => {
                let title = sessions.open().await?.title().await?;
                check_text("Page title", &title, contains, equals, ctx, locals)
            }

            Self::ExpectText {
                selector,
                contains,
                equals,
            } => {
                let selector = ctx.render(selector, locals)?;
                let texts = sessions.open().await?.texts(&selector).await?;
                let text = texts
                    .first()
                    .ok_or_else(|| Error::ElementNotFound(selector.clone()))?;
                let what = format!("Text of '{}'", selector);
                check_text(&what, text, contains, equals, ctx, locals)
            }

            Self::ExpectVisible { selector, visible } => {
                let selector = ctx.render(selector, locals)?;
                let count = sessions.open().await?.count(&selector).await?;
                if (count > 0) != *visible {
                    return Err(Error::assertion(
                        format!("Visibility of '{}'", selector),
                        if *visible { "visible" } else { "absent" },
                        format!("{} matching elements", count),
                    ));
                }
                Ok(())
            }

            Self::ExpectRange { value, min, max } => {
                let actual = number(&ctx.render(value, locals)?)?;
                let min = min
                    .as_deref()
                    .map(|m| ctx.render(m, locals).and_then(|m| number(&m)))
                    .transpose()?;
                let max = max
                    .as_deref()
                    .map(|m| ctx.render(m, locals).and_then(|m| number(&m)))
                    .transpose()?;

                let below = min.is_some_and(|min| actual < min);
                let above = max.is_some_and(|max| actual > max);
                if below || above {
                    return Err(Error::assertion(
                        format!("Value of '{}' out of range", value),
                        format!(
                            "within [{}, {}]",
                            min.map_or("-inf".to_string(), |m| m.to_string()),
                            max.map_or("+inf".to_string(), |m| m.to_string())
                        ),
                        actual,
                    ));
                }
                Ok(())
            }

            Self::ExpectEqual { actual, expected } => {
                let actual_value = ctx.render(actual, locals)?;
                let expected_value = ctx.render(expected, locals)?;
                if actual_value != expected_value {
                    return Err(Error::assertion(
                        format!("Value of '{}'", actual),
                        expected_value,
                        actual_value,
                    ));
                }
                Ok(())
            }
        }
    }
}

fn number(text: &str) -> Result<f64> {
    text.trim()
        .parse()
        .map_err(|_| Error::InvalidValue(format!("'{}' is not a number", text)))
}

fn check_text(
    what: &str,
    actual: &str,
    contains: &Option<String>,
    equals: &Option<String>,
    ctx: &ContextStore,
    locals: &HashMap<String, String>,
) -> Result<()> {
    if let Some(expected) = contains {
        let expected = ctx.render(expected, locals)?;
        if !actual.contains(&expected) {
            return Err(Error::assertion(
                format!("{} does not contain the expected text", what),
                expected,
                actual,
            ));
        }
    }
    if let Some(expected) = equals {
        let expected = ctx.render(expected, locals)?;
        if actual.trim() != expected.trim() {
            return Err(Error::assertion(what.to_string(), expected, actual));
        }
    }
    Ok(())
}

/// A step made of declarative actions, run in order
#[derive(Debug, Clone)]
pub struct ActionStep {
    pub id: String,
    pub label: String,
    pub actions: Vec<Action>,
    pub options: ActionOptions,
}

impl ActionStep {
    pub fn new(id: &str, label: Option<&str>, actions: Vec<Action>) -> Self {
        Self {
            id: id.to_string(),
            label: label.unwrap_or(id).to_string(),
            actions,
            options: ActionOptions::default(),
        }
    }

    pub fn with_options(mut self, options: ActionOptions) -> Self {
        self.options = options;
        self
    }
}

#[async_trait]
impl Step for ActionStep {
    fn id(&self) -> &str {
        &self.id
    }

    fn label(&self) -> &str {
        &self.label
    }

    async fn execute(&self, ctx: &mut ContextStore, sessions: &mut SessionManager) -> Result<()> {
        let locals = HashMap::new();
        for action in &self.actions {
            action.perform(ctx, sessions, &locals, self.options).await?;
        }
        Ok(())
    }
}
