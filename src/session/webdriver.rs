//! W3C WebDriver backend
//!
//! Talks JSON over HTTP to chromedriver, geckodriver or a Selenium grid.
//! Element lookups rely on the session's implicit wait, and every request
//! carries the configured timeout, so no call can hang indefinitely.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Method;
use serde_json::{json, Value};

use crate::common::config::{Browser, Timeouts, WebDriverConfig};
use crate::common::{Error, Result};

use super::{Session, SessionFactory};

/// Key of a web element reference in WebDriver responses
const ELEMENT_KEY: &str = "element-6066-11e4-a52e-4f735466cecf";

/// Opens browser sessions on a WebDriver endpoint
pub struct WebDriverFactory {
    client: reqwest::Client,
    endpoint: String,
    capabilities: Value,
    element_ms: u64,
}

impl WebDriverFactory {
    pub fn new(config: &WebDriverConfig, timeouts: &Timeouts) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeouts.request_secs))
            .build()?;

        Ok(Self {
            client,
            endpoint: config.url.trim_end_matches('/').to_string(),
            capabilities: capabilities(config),
            element_ms: timeouts.element_ms,
        })
    }
}

/// Build the `capabilities` object of a New Session request
pub fn capabilities(config: &WebDriverConfig) -> Value {
    let mut args = config.args.clone();
    let (options_key, headless_arg) = match config.browser {
        Browser::Chrome => ("goog:chromeOptions", "--headless=new"),
        Browser::Edge => ("ms:edgeOptions", "--headless=new"),
        Browser::Firefox => ("moz:firefoxOptions", "-headless"),
    };
    if config.headless && !args.iter().any(|a| a.contains("headless")) {
        args.push(headless_arg.to_string());
    }

    json!({
        "alwaysMatch": {
            "browserName": config.browser.capability_name(),
            options_key: { "args": args },
        }
    })
}

#[async_trait]
impl SessionFactory for WebDriverFactory {
    async fn open(&self) -> Result<Box<dyn Session>> {
        let url = format!("{}/session", self.endpoint);
        tracing::debug!(endpoint = %self.endpoint, "requesting new WebDriver session");

        let response = self
            .client
            .post(&url)
            .json(&json!({ "capabilities": self.capabilities }))
            .send()
            .await
            .map_err(|e| Error::SessionOpen(format!("{}: {}", self.endpoint, e)))?;
        let value = unwrap_value(response).await?;

        let session_id = value["sessionId"]
            .as_str()
            .ok_or_else(|| Error::SessionOpen("response has no sessionId".to_string()))?;

        let session = WebDriverSession {
            client: self.client.clone(),
            base: format!("{}/session/{}", self.endpoint, session_id),
            closed: false,
        };
        let timeouts = json!({ "implicit": self.element_ms });
        if let Err(e) = session.command(Method::POST, "timeouts", Some(timeouts)).await {
            let _ = session.command(Method::DELETE, "", None).await;
            return Err(Error::SessionOpen(e.to_string()));
        }

        tracing::info!(session_id, "WebDriver session started");
        Ok(Box::new(session))
    }
}

/// One browser session on a WebDriver endpoint
pub struct WebDriverSession {
    client: reqwest::Client,
    /// `{endpoint}/session/{id}`
    base: String,
    closed: bool,
}

impl WebDriverSession {
    /// Send a command relative to the session URL and return its `value`
    async fn command(&self, method: Method, path: &str, body: Option<Value>) -> Result<Value> {
        if self.closed {
            return Err(Error::SessionNotOpen);
        }
        let url = if path.is_empty() {
            self.base.clone()
        } else {
            format!("{}/{}", self.base, path)
        };
        tracing::trace!(%method, %url, "webdriver command");

        let mut request = self.client.request(method, &url);
        if let Some(body) = body {
            request = request.json(&body);
        }
        let response = request.send().await?;
        unwrap_value(response).await
    }

    async fn find_all(&self, selector: &str) -> Result<Vec<String>> {
        let value = self
            .command(
                Method::POST,
                "elements",
                Some(json!({ "using": "css selector", "value": selector })),
            )
            .await?;
        value
            .as_array()
            .map(|items| items.iter().filter_map(element_id).collect())
            .ok_or_else(|| Error::webdriver("invalid response", "elements is not an array"))
    }

    async fn find_one(&self, selector: &str) -> Result<String> {
        let result = self
            .command(
                Method::POST,
                "element",
                Some(json!({ "using": "css selector", "value": selector })),
            )
            .await;
        match result {
            Ok(value) => element_id(&value)
                .ok_or_else(|| Error::webdriver("invalid response", "missing element reference")),
            Err(Error::WebDriver { error, .. }) if error == "no such element" => {
                Err(Error::ElementNotFound(selector.to_string()))
            }
            Err(e) => Err(e),
        }
    }

    async fn window_handles(&self) -> Result<Vec<String>> {
        let value = self.command(Method::GET, "window/handles", None).await?;
        Ok(value
            .as_array()
            .map(|items| {
                items
                    .iter()
                    .filter_map(|h| h.as_str().map(str::to_string))
                    .collect()
            })
            .unwrap_or_default())
    }
}

fn element_id(value: &Value) -> Option<String> {
    value[ELEMENT_KEY].as_str().map(str::to_string)
}

/// Extract `value` from a WebDriver response, mapping error payloads
async fn unwrap_value(response: reqwest::Response) -> Result<Value> {
    let status = response.status();
    let mut body: Value = response.json().await?;
    let value = body.get_mut("value").map(Value::take).unwrap_or(Value::Null);

    if status.is_success() {
        Ok(value)
    } else {
        let error = value["error"].as_str().unwrap_or("unknown error");
        let message = value["message"].as_str().unwrap_or_else(|| status.as_str());
        Err(Error::webdriver(error, message))
    }
}

#[async_trait]
impl Session for WebDriverSession {
    async fn navigate(&mut self, url: &str) -> Result<()> {
        self.command(Method::POST, "url", Some(json!({ "url": url })))
            .await?;
        Ok(())
    }

    async fn title(&mut self) -> Result<String> {
        let value = self.command(Method::GET, "title", None).await?;
        Ok(value.as_str().unwrap_or_default().to_string())
    }

    async fn texts(&mut self, selector: &str) -> Result<Vec<String>> {
        let mut texts = Vec::new();
        for id in self.find_all(selector).await? {
            let value = self
                .command(Method::GET, &format!("element/{}/text", id), None)
                .await?;
            texts.push(value.as_str().unwrap_or_default().trim().to_string());
        }
        Ok(texts)
    }

    async fn count(&mut self, selector: &str) -> Result<usize> {
        Ok(self.find_all(selector).await?.len())
    }

    async fn click(&mut self, selector: &str) -> Result<()> {
        let id = self.find_one(selector).await?;
        self.command(Method::POST, &format!("element/{}/click", id), Some(json!({})))
            .await?;
        Ok(())
    }

    async fn fill(&mut self, selector: &str, value: &str) -> Result<()> {
        let id = self.find_one(selector).await?;
        self.command(Method::POST, &format!("element/{}/clear", id), Some(json!({})))
            .await?;
        self.command(
            Method::POST,
            &format!("element/{}/value", id),
            Some(json!({ "text": value })),
        )
        .await?;
        Ok(())
    }

    async fn tab_count(&mut self) -> Result<usize> {
        Ok(self.window_handles().await?.len())
    }

    async fn switch_tab(&mut self, index: usize) -> Result<()> {
        let handles = self.window_handles().await?;
        let handle = handles.get(index).ok_or(Error::TabNotFound {
            index,
            count: handles.len(),
        })?;
        self.command(Method::POST, "window", Some(json!({ "handle": handle })))
            .await?;
        Ok(())
    }

    async fn close_tab(&mut self) -> Result<()> {
        self.command(Method::DELETE, "window", None).await?;
        Ok(())
    }

    async fn close(&mut self) -> Result<()> {
        self.command(Method::DELETE, "", None).await?;
        self.closed = true;
        Ok(())
    }
}
