//! Test doubles for the session worker: a scripted browser and a
//! notifier that records every message

#![allow(dead_code)]

use async_trait::async_trait;
use autoattend_core::{
    browser_error, AppConfig, AttendError, AttendResult, ChatId, Messages, Notifier, RetryPolicy,
    Secret, SessionSpec,
};
use autoattend_session::{Browser, DriverSettings};
use std::collections::{HashSet, VecDeque};
use std::sync::{Arc, LazyLock, Mutex};
use std::time::Duration;

// Tracing is initialized once per test binary; set TEST_LOG to see output
static TRACING: LazyLock<()> = LazyLock::new(|| {
    if std::env::var("TEST_LOG").is_ok() {
        let subscriber = tracing_subscriber::fmt()
            .with_max_level(tracing::Level::DEBUG)
            .with_test_writer()
            .finish();
        tracing::subscriber::set_global_default(subscriber).ok();
    }
});

pub fn init_tracing() {
    LazyLock::force(&TRACING);
}

pub const TARGET: i64 = 4242;

/// One page the fake portal can show
#[derive(Debug, Clone)]
pub struct FakePage {
    pub source: String,
    pub controls: usize,
}

impl FakePage {
    pub fn with_controls(controls: usize) -> Self {
        Self {
            source: "<html>lessons</html>".to_string(),
            controls,
        }
    }

    pub fn nothing_available() -> Self {
        Self {
            source: "<html>Нет доступных дисциплин</html>".to_string(),
            controls: 0,
        }
    }
}

#[derive(Debug, Default)]
pub struct FakeState {
    /// Current page is the front; each refresh advances while more remain
    pub pages: VecDeque<FakePage>,
    /// Selectors that never appear
    pub missing: HashSet<String>,
    /// Number of upcoming control clicks that fail
    pub failing_clicks: usize,
    pub visited: Vec<String>,
    pub cleared: Vec<String>,
    pub typed: Vec<(String, String)>,
    pub clicked: Vec<String>,
    pub parent_clicked: Vec<String>,
    pub refreshes: usize,
    pub quit: bool,
}

/// Scripted browser; clones share state so tests can inspect it afterwards
#[derive(Debug, Clone, Default)]
pub struct FakeBrowser {
    pub state: Arc<Mutex<FakeState>>,
}

impl FakeBrowser {
    pub fn with_pages(pages: impl IntoIterator<Item = FakePage>) -> Self {
        let browser = Self::default();
        browser.state.lock().unwrap().pages = pages.into_iter().collect();
        browser
    }

    pub fn missing(self, xpath: &str) -> Self {
        self.state.lock().unwrap().missing.insert(xpath.to_string());
        self
    }

    pub fn failing_clicks(self, count: usize) -> Self {
        self.state.lock().unwrap().failing_clicks = count;
        self
    }

    pub fn snapshot<T>(&self, read: impl FnOnce(&FakeState) -> T) -> T {
        read(&self.state.lock().unwrap())
    }

    fn current_page(state: &FakeState) -> FakePage {
        state
            .pages
            .front()
            .cloned()
            .unwrap_or_else(|| FakePage::with_controls(0))
    }
}

#[async_trait]
impl Browser for FakeBrowser {
    type Element = String;

    async fn goto(&self, url: &str) -> AttendResult<()> {
        self.state.lock().unwrap().visited.push(url.to_string());
        Ok(())
    }

    async fn page_source(&self) -> AttendResult<String> {
        Ok(Self::current_page(&self.state.lock().unwrap()).source)
    }

    async fn wait_for(&self, xpath: &str, timeout: Duration) -> AttendResult<String> {
        if self.state.lock().unwrap().missing.contains(xpath) {
            tokio::time::sleep(timeout).await;
            return Err(AttendError::timeout(xpath, timeout, "fake_browser"));
        }
        Ok(xpath.to_string())
    }

    async fn wait_for_all(&self, xpath: &str, timeout: Duration) -> AttendResult<Vec<String>> {
        let controls = Self::current_page(&self.state.lock().unwrap()).controls;
        if controls == 0 {
            tokio::time::sleep(timeout).await;
            return Err(AttendError::timeout(xpath, timeout, "fake_browser"));
        }
        Ok((0..controls).map(|i| format!("{}#{}", xpath, i)).collect())
    }

    async fn clear(&self, element: &String) -> AttendResult<()> {
        self.state.lock().unwrap().cleared.push(element.clone());
        Ok(())
    }

    async fn type_text(&self, element: &String, text: &str) -> AttendResult<()> {
        self.state
            .lock()
            .unwrap()
            .typed
            .push((element.clone(), text.to_string()));
        Ok(())
    }

    async fn click(&self, element: &String) -> AttendResult<()> {
        let mut state = self.state.lock().unwrap();
        if element.contains('#') && state.failing_clicks > 0 {
            state.failing_clicks -= 1;
            return Err(browser_error!("stale element reference", "fake_browser"));
        }
        state.clicked.push(element.clone());
        Ok(())
    }

    async fn click_parent(&self, element: &String) -> AttendResult<()> {
        self.state.lock().unwrap().parent_clicked.push(element.clone());
        Ok(())
    }

    async fn refresh(&self) -> AttendResult<()> {
        let mut state = self.state.lock().unwrap();
        state.refreshes += 1;
        if state.pages.len() > 1 {
            state.pages.pop_front();
        }
        Ok(())
    }

    async fn quit(self) -> AttendResult<()> {
        self.state.lock().unwrap().quit = true;
        Ok(())
    }
}

/// Notifier that keeps every message in order
#[derive(Debug, Clone, Default)]
pub struct RecordingNotifier {
    pub sent: Arc<Mutex<Vec<(ChatId, String)>>>,
}

impl RecordingNotifier {
    pub fn texts(&self) -> Vec<String> {
        self.sent
            .lock()
            .unwrap()
            .iter()
            .map(|(_, text)| text.clone())
            .collect()
    }

    pub fn count(&self, text: &str) -> usize {
        self.texts().iter().filter(|t| t.as_str() == text).count()
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn notify(&self, target: &ChatId, text: &str) {
        self.sent
            .lock()
            .unwrap()
            .push((target.clone(), text.to_string()));
    }
}

pub fn messages() -> Messages {
    Messages::default()
}

pub fn settings() -> DriverSettings {
    let mut settings = DriverSettings::from_config(&AppConfig::default());
    settings.retry = RetryPolicy::fixed(1, 1000);
    settings
}

pub fn session(duration_minutes: u32) -> SessionSpec {
    SessionSpec {
        identity: TARGET,
        username: "student".to_string(),
        secret: Secret::new("p@ss"),
        duration_minutes,
        notify_target: ChatId::Id(TARGET),
    }
}
