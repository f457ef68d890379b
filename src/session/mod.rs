//! Browser sessions
//!
//! A [`Session`] is one live connection to the application under test.
//! The [`SessionManager`] owns it for the duration of a run: it opens the
//! session the first time a step asks for it and closes it when the run
//! ends, whether the run passed or not.

pub mod mock;
pub mod webdriver;

use async_trait::async_trait;

use crate::common::{Error, Result};

pub use mock::{MockEffect, MockPage, MockSessionFactory, MockShop};
pub use webdriver::{WebDriverFactory, WebDriverSession};

/// Primitive browser operations used by steps
///
/// Selectors are CSS selectors. Lookups fail instead of hanging; how long
/// a backend waits for an element to appear is its own concern.
#[async_trait]
pub trait Session: Send {
    /// Load `url` in the current tab
    async fn navigate(&mut self, url: &str) -> Result<()>;

    /// Title of the current document
    async fn title(&mut self) -> Result<String>;

    /// Visible text of every element matching `selector`, in document order
    async fn texts(&mut self, selector: &str) -> Result<Vec<String>>;

    /// Number of elements matching `selector`
    async fn count(&mut self, selector: &str) -> Result<usize> {
        Ok(self.texts(selector).await?.len())
    }

    /// Click the first element matching `selector`
    async fn click(&mut self, selector: &str) -> Result<()>;

    /// Replace the value of the first input matching `selector`
    async fn fill(&mut self, selector: &str, value: &str) -> Result<()>;

    /// Number of open tabs in this browsing context
    async fn tab_count(&mut self) -> Result<usize>;

    /// Make tab `index` (in opening order) the current one
    async fn switch_tab(&mut self, index: usize) -> Result<()>;

    /// Close the current tab; call [`Session::switch_tab`] afterwards
    async fn close_tab(&mut self) -> Result<()>;

    /// End the session and release the browser
    async fn close(&mut self) -> Result<()>;
}

/// Creates sessions for a [`SessionManager`]
#[async_trait]
pub trait SessionFactory: Send + Sync {
    async fn open(&self) -> Result<Box<dyn Session>>;
}

/// Owns the single session of a run
pub struct SessionManager {
    factory: Box<dyn SessionFactory>,
    session: Option<Box<dyn Session>>,
    opened: usize,
}

impl SessionManager {
    pub fn new(factory: impl SessionFactory + 'static) -> Self {
        Self::from_boxed(Box::new(factory))
    }

    pub fn from_boxed(factory: Box<dyn SessionFactory>) -> Self {
        Self {
            factory,
            session: None,
            opened: 0,
        }
    }

    /// The open session, opening one first if needed
    pub async fn open(&mut self) -> Result<&mut (dyn Session + 'static)> {
        if self.session.is_none() {
            tracing::debug!("opening browser session");
            let session = self.factory.open().await.map_err(|e| match e {
                Error::SessionOpen(_) => e,
                other => Error::SessionOpen(other.to_string()),
            })?;
            self.opened += 1;
            tracing::info!("browser session opened");
            self.session = Some(session);
        }
        match self.session.as_deref_mut() {
            Some(session) => Ok(session),
            None => Err(Error::SessionNotOpen),
        }
    }

    /// The open session, without opening one
    pub fn current(&mut self) -> Result<&mut (dyn Session + 'static)> {
        match self.session.as_deref_mut() {
            Some(session) => Ok(session),
            None => Err(Error::SessionNotOpen),
        }
    }

    pub fn is_open(&self) -> bool {
        self.session.is_some()
    }

    /// How many sessions this manager has opened
    pub fn opened(&self) -> usize {
        self.opened
    }

    /// Close the session if one is open
    ///
    /// Returns `true` when a session was closed.
    pub async fn close(&mut self) -> Result<bool> {
        match self.session.take() {
            Some(mut session) => {
                session
                    .close()
                    .await
                    .map_err(|e| Error::SessionClose(e.to_string()))?;
                tracing::info!("browser session closed");
                Ok(true)
            }
            None => Ok(false),
        }
    }
}

impl Drop for SessionManager {
    fn drop(&mut self) {
        if self.session.is_some() {
            tracing::warn!("session manager dropped with an open browser session");
        }
    }
}
