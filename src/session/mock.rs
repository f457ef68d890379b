//! In-memory scripted shop
//!
//! A [`MockShop`] is a tiny model of a web application: pages keyed by URL,
//! each holding element texts keyed by selector and a list of effects that
//! clicking a selector triggers. Sessions opened from it share its state,
//! so tests can inspect what a run did after it finished.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;

use crate::common::{Error, Result};

use super::{Session, SessionFactory};

const BLANK: &str = "about:blank";

/// What happens when a scripted selector is clicked
#[derive(Debug, Clone)]
pub enum MockEffect {
    /// Load another page in the current tab
    Navigate(String),
    /// Open a page in a new tab without switching to it
    OpenTab(String),
    /// Replace the texts of `selector` on the current page
    SetTexts { selector: String, texts: Vec<String> },
    /// Copy the texts of `from` to `to` on the current page
    CopyTexts { from: String, to: String },
}

/// One scripted page
#[derive(Debug, Clone, Default)]
pub struct MockPage {
    title: String,
    elements: HashMap<String, Vec<String>>,
    on_click: HashMap<String, Vec<MockEffect>>,
}

impl MockPage {
    pub fn new(title: &str) -> Self {
        Self {
            title: title.to_string(),
            ..Self::default()
        }
    }

    /// Elements matching `selector` and their texts
    pub fn element<I, S>(mut self, selector: &str, texts: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.elements
            .insert(selector.to_string(), texts.into_iter().map(Into::into).collect());
        self
    }

    /// Effects triggered by clicking `selector`; the selector becomes clickable
    pub fn on_click(mut self, selector: &str, effects: Vec<MockEffect>) -> Self {
        self.elements
            .entry(selector.to_string())
            .or_insert_with(|| vec![String::new()]);
        self.on_click.insert(selector.to_string(), effects);
        self
    }
}

#[derive(Debug, Default)]
struct ShopState {
    pages: HashMap<String, MockPage>,
    tabs: Vec<String>,
    active: usize,
    session_live: bool,
    opened: usize,
    closed: usize,
    fail_close: bool,
    actions: Vec<String>,
}

impl ShopState {
    fn current_url(&self) -> Result<&str> {
        if !self.session_live {
            return Err(Error::SessionNotOpen);
        }
        self.tabs
            .get(self.active)
            .map(String::as_str)
            .ok_or(Error::TabNotFound {
                index: self.active,
                count: self.tabs.len(),
            })
    }

    fn current_page(&self) -> Result<Option<&MockPage>> {
        let url = self.current_url()?;
        Ok(self.pages.get(url))
    }

    fn current_page_mut(&mut self) -> Result<&mut MockPage> {
        let url = self.current_url()?.to_string();
        self.pages
            .get_mut(&url)
            .ok_or_else(|| Error::webdriver("no such page", &url))
    }

    fn apply(&mut self, effect: MockEffect) -> Result<()> {
        match effect {
            MockEffect::Navigate(url) => {
                let active = self.active;
                self.tabs[active] = url;
            }
            MockEffect::OpenTab(url) => self.tabs.push(url),
            MockEffect::SetTexts { selector, texts } => {
                self.current_page_mut()?.elements.insert(selector, texts);
            }
            MockEffect::CopyTexts { from, to } => {
                let page = self.current_page_mut()?;
                let texts = page
                    .elements
                    .get(&from)
                    .cloned()
                    .ok_or(Error::ElementNotFound(from))?;
                page.elements.insert(to, texts);
            }
        }
        Ok(())
    }
}

/// Shared handle to a scripted shop
#[derive(Debug, Clone, Default)]
pub struct MockShop {
    state: Arc<Mutex<ShopState>>,
}

impl MockShop {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a page under `url`
    pub fn with_page(self, url: &str, page: MockPage) -> Self {
        self.state().pages.insert(url.to_string(), page);
        self
    }

    /// Make closing a session fail
    pub fn failing_close(self) -> Self {
        self.state().fail_close = true;
        self
    }

    fn state(&self) -> MutexGuard<'_, ShopState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Texts currently held by `selector` on the page at `url`
    pub fn texts_at(&self, url: &str, selector: &str) -> Option<Vec<String>> {
        self.state()
            .pages
            .get(url)
            .and_then(|p| p.elements.get(selector).cloned())
    }

    /// Every action performed through sessions, in order
    pub fn actions(&self) -> Vec<String> {
        self.state().actions.clone()
    }

    pub fn sessions_opened(&self) -> usize {
        self.state().opened
    }

    pub fn sessions_closed(&self) -> usize {
        self.state().closed
    }

    /// URLs of the open tabs
    pub fn tabs(&self) -> Vec<String> {
        self.state().tabs.clone()
    }
}

/// Opens [`MockSession`]s on a shared [`MockShop`]
#[derive(Debug, Clone)]
pub struct MockSessionFactory {
    shop: MockShop,
    refuse: bool,
}

impl MockSessionFactory {
    pub fn new(shop: MockShop) -> Self {
        Self { shop, refuse: false }
    }

    /// A factory whose `open` always fails
    pub fn refusing(shop: MockShop) -> Self {
        Self { shop, refuse: true }
    }
}

#[async_trait]
impl SessionFactory for MockSessionFactory {
    async fn open(&self) -> Result<Box<dyn Session>> {
        if self.refuse {
            return Err(Error::SessionOpen("connection refused".to_string()));
        }
        {
            let mut state = self.shop.state();
            state.session_live = true;
            state.tabs = vec![BLANK.to_string()];
            state.active = 0;
            state.opened += 1;
        }
        Ok(Box::new(MockSession {
            shop: self.shop.clone(),
        }))
    }
}

/// A session against a [`MockShop`]
#[derive(Debug)]
pub struct MockSession {
    shop: MockShop,
}

#[async_trait]
impl Session for MockSession {
    async fn navigate(&mut self, url: &str) -> Result<()> {
        let mut state = self.shop.state();
        state.current_url()?;
        state.actions.push(format!("navigate {}", url));
        let active = state.active;
        state.tabs[active] = url.to_string();
        Ok(())
    }

    async fn title(&mut self) -> Result<String> {
        let state = self.shop.state();
        Ok(state
            .current_page()?
            .map(|p| p.title.clone())
            .unwrap_or_default())
    }

    async fn texts(&mut self, selector: &str) -> Result<Vec<String>> {
        let state = self.shop.state();
        Ok(state
            .current_page()?
            .and_then(|p| p.elements.get(selector).cloned())
            .unwrap_or_default())
    }

    async fn click(&mut self, selector: &str) -> Result<()> {
        let mut state = self.shop.state();
        let effects = {
            let page = state
                .current_page()?
                .filter(|p| p.elements.contains_key(selector))
                .ok_or_else(|| Error::ElementNotFound(selector.to_string()))?;
            page.on_click.get(selector).cloned().unwrap_or_default()
        };
        state.actions.push(format!("click {}", selector));
        for effect in effects {
            state.apply(effect)?;
        }
        Ok(())
    }

    async fn fill(&mut self, selector: &str, value: &str) -> Result<()> {
        let mut state = self.shop.state();
        let page = state.current_page_mut()?;
        let texts = page
            .elements
            .get_mut(selector)
            .ok_or_else(|| Error::ElementNotFound(selector.to_string()))?;
        *texts = vec![value.to_string()];
        state.actions.push(format!("fill {}={}", selector, value));
        Ok(())
    }

    async fn tab_count(&mut self) -> Result<usize> {
        let state = self.shop.state();
        state.current_url()?;
        Ok(state.tabs.len())
    }

    async fn switch_tab(&mut self, index: usize) -> Result<()> {
        let mut state = self.shop.state();
        if !state.session_live {
            return Err(Error::SessionNotOpen);
        }
        if index >= state.tabs.len() {
            return Err(Error::TabNotFound {
                index,
                count: state.tabs.len(),
            });
        }
        state.active = index;
        state.actions.push(format!("switch_tab {}", index));
        Ok(())
    }

    async fn close_tab(&mut self) -> Result<()> {
        let mut state = self.shop.state();
        state.current_url()?;
        let active = state.active;
        state.tabs.remove(active);
        state.active = 0;
        state.actions.push("close_tab".to_string());
        Ok(())
    }

    async fn close(&mut self) -> Result<()> {
        let mut state = self.shop.state();
        if state.fail_close {
            return Err(Error::webdriver("unknown error", "browser did not exit"));
        }
        state.session_live = false;
        state.tabs.clear();
        state.closed += 1;
        state.actions.push("close".to_string());
        Ok(())
    }
}
