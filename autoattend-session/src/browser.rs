//! Browser automation seam
//!
//! `SessionDriver` only talks to the `Browser` trait; `WebDriverBrowser`
//! implements it on a chromedriver session through fantoccini.

use async_trait::async_trait;
use autoattend_core::{AttendError, AttendResult, BrowserConfig, ErrorContext};
use fantoccini::error::CmdError;
use fantoccini::{elements::Element, Client, ClientBuilder, Locator};
use serde_json::{json, Map, Value};
use std::time::Duration;
use tracing::{debug, info};

const COMPONENT: &str = "browser";

/// Minimal page-automation surface needed by the portal flow
#[async_trait]
pub trait Browser: Send + Sync {
    type Element: Send + Sync;

    async fn goto(&self, url: &str) -> AttendResult<()>;

    async fn page_source(&self) -> AttendResult<String>;

    /// Wait up to `timeout` for the first element matching `xpath`
    async fn wait_for(&self, xpath: &str, timeout: Duration) -> AttendResult<Self::Element>;

    /// Wait up to `timeout` for at least one match, then return all of them
    async fn wait_for_all(&self, xpath: &str, timeout: Duration)
        -> AttendResult<Vec<Self::Element>>;

    async fn clear(&self, element: &Self::Element) -> AttendResult<()>;

    async fn type_text(&self, element: &Self::Element, text: &str) -> AttendResult<()>;

    async fn click(&self, element: &Self::Element) -> AttendResult<()>;

    /// Click the parent node via script; styled checkboxes hide the real input
    async fn click_parent(&self, element: &Self::Element) -> AttendResult<()>;

    async fn refresh(&self) -> AttendResult<()>;

    /// End the browser session
    async fn quit(self) -> AttendResult<()>;
}

/// fantoccini-backed browser
pub struct WebDriverBrowser {
    client: Client,
}

impl WebDriverBrowser {
    /// Start a new Chrome session on the configured WebDriver endpoint
    pub async fn connect(config: &BrowserConfig) -> AttendResult<Self> {
        let mut args: Vec<String> = Vec::new();
        if config.headless {
            args.push("--headless".to_string());
        }
        args.extend(config.extra_args.iter().cloned());

        let mut capabilities = Map::new();
        capabilities.insert("goog:chromeOptions".to_string(), json!({ "args": args }));

        let client = ClientBuilder::native()
            .capabilities(capabilities)
            .connect(&config.webdriver_url)
            .await
            .map_err(|e| AttendError::Browser {
                message: format!("Failed to start browser session: {}", e),
                source: Some(Box::new(e)),
                context: ErrorContext::new(COMPONENT)
                    .with_operation("connect")
                    .with_metadata("webdriver_url", &config.webdriver_url)
                    .with_suggestion("Make sure chromedriver is running at browser.webdriver_url"),
            })?;

        info!(webdriver_url = %config.webdriver_url, headless = config.headless, "Browser session started");
        Ok(Self { client })
    }
}

fn command_error(error: CmdError, operation: &str, timeout: Option<Duration>) -> AttendError {
    match (error, timeout) {
        (CmdError::WaitTimeout, Some(bound)) => AttendError::timeout(operation, bound, COMPONENT),
        (error, _) => AttendError::Browser {
            message: format!("{} failed: {}", operation, error),
            source: Some(Box::new(error)),
            context: ErrorContext::new(COMPONENT).with_operation(operation),
        },
    }
}

#[async_trait]
impl Browser for WebDriverBrowser {
    type Element = Element;

    async fn goto(&self, url: &str) -> AttendResult<()> {
        debug!(url, "Navigating");
        self.client
            .goto(url)
            .await
            .map_err(|e| command_error(e, "goto", None))
    }

    async fn page_source(&self) -> AttendResult<String> {
        self.client
            .source()
            .await
            .map_err(|e| command_error(e, "page_source", None))
    }

    async fn wait_for(&self, xpath: &str, timeout: Duration) -> AttendResult<Element> {
        self.client
            .wait()
            .at_most(timeout)
            .for_element(Locator::XPath(xpath))
            .await
            .map_err(|e| command_error(e, xpath, Some(timeout)))
    }

    async fn wait_for_all(&self, xpath: &str, timeout: Duration) -> AttendResult<Vec<Element>> {
        self.wait_for(xpath, timeout).await?;
        self.client
            .find_all(Locator::XPath(xpath))
            .await
            .map_err(|e| command_error(e, xpath, None))
    }

    async fn clear(&self, element: &Element) -> AttendResult<()> {
        element
            .clear()
            .await
            .map_err(|e| command_error(e, "clear", None))
    }

    async fn type_text(&self, element: &Element, text: &str) -> AttendResult<()> {
        element
            .send_keys(text)
            .await
            .map_err(|e| command_error(e, "send_keys", None))
    }

    async fn click(&self, element: &Element) -> AttendResult<()> {
        element
            .click()
            .await
            .map_err(|e| command_error(e, "click", None))
    }

    async fn click_parent(&self, element: &Element) -> AttendResult<()> {
        let argument: Value = serde_json::to_value(element)?;
        self.client
            .execute("arguments[0].parentElement.click();", vec![argument])
            .await
            .map(|_| ())
            .map_err(|e| command_error(e, "click_parent", None))
    }

    async fn refresh(&self) -> AttendResult<()> {
        self.client
            .refresh()
            .await
            .map_err(|e| command_error(e, "refresh", None))
    }

    async fn quit(self) -> AttendResult<()> {
        self.client
            .close()
            .await
            .map_err(|e| command_error(e, "quit", None))?;
        info!("Browser session closed");
        Ok(())
    }
}
