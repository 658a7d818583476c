//! Configuration management
//!
//! Layering: built-in defaults, then an optional TOML file, then
//! `AUTOATTEND__SECTION__KEY` environment variables.

use crate::async_utils::RetryPolicy;
use crate::error::{AttendError, AttendResult, ErrorContext};
use crate::logging::LoggingConfig;
use crate::messages::Locale;
use crate::types::{Identity, DEFAULT_DURATION_MINUTES};

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const ENV_PREFIX: &str = "AUTOATTEND";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub telegram: TelegramConfig,
    pub access: AccessConfig,
    pub storage: StorageConfig,
    pub portal: PortalConfig,
    pub browser: BrowserConfig,
    pub session: SessionConfig,
    pub locale: Locale,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TelegramConfig {
    /// Bot API token; falls back to the `API_TOKEN` variable
    pub api_token: String,
    pub api_base_url: String,
    /// Long-poll timeout passed to `getUpdates`
    pub poll_timeout_secs: u64,
    /// HTTP timeout, must exceed the long-poll timeout
    pub request_timeout_secs: u64,
}

impl Default for TelegramConfig {
    fn default() -> Self {
        Self {
            api_token: String::new(),
            api_base_url: "https://api.telegram.org".to_string(),
            poll_timeout_secs: 30,
            request_timeout_secs: 45,
        }
    }
}

impl TelegramConfig {
    /// `{base}/bot{token}/{method}`
    pub fn method_url(&self, token: &str, method: &str) -> String {
        format!(
            "{}/bot{}/{}",
            self.api_base_url.trim_end_matches('/'),
            token,
            method
        )
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AccessConfig {
    /// The single identity allowed to administer users; falls back to `ADMIN_USER_ID`
    pub operator_id: Option<Identity>,
    /// Save credentials on /start directly instead of queueing an access request
    pub open_registration: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    pub database_url: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            database_url: "sqlite:user_data.db".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PortalConfig {
    pub url: String,
    /// Page text meaning there is nothing to check in for
    pub sentinel_phrase: String,
    pub selectors: SelectorConfig,
}

impl Default for PortalConfig {
    fn default() -> Self {
        Self {
            url: "https://wsp.kbtu.kz/RegistrationOnline".to_string(),
            sentinel_phrase: "Нет доступных дисциплин".to_string(),
            selectors: SelectorConfig::default(),
        }
    }
}

/// XPath selectors for the portal page
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SelectorConfig {
    pub username_field: String,
    pub secret_field: String,
    pub consent_checkbox: String,
    pub submit_button: String,
    pub checkin_control: String,
}

impl Default for SelectorConfig {
    fn default() -> Self {
        Self {
            username_field: r#"//input[@type="text"]"#.to_string(),
            secret_field: r#"//input[@type="password"]"#.to_string(),
            consent_checkbox: r#"//input[@type="checkbox"]"#.to_string(),
            submit_button: r#"//div[@role="button" and contains(@class, "v-button-primary")]"#
                .to_string(),
            checkin_control:
                "//div[span/span[@class='v-button-caption' and text()='Отметиться']]".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BrowserConfig {
    /// W3C WebDriver endpoint (chromedriver)
    pub webdriver_url: String,
    pub headless: bool,
    /// Extra Chrome command-line switches
    pub extra_args: Vec<String>,
}

impl Default for BrowserConfig {
    fn default() -> Self {
        Self {
            webdriver_url: "http://localhost:9515".to_string(),
            headless: true,
            extra_args: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Bound for every element lookup
    pub wait_timeout_secs: u64,
    /// Pause between poll cycles
    pub poll_interval_secs: u64,
    /// Pause after each check-in click
    pub click_pause_ms: u64,
    /// Duration stored for new credentials
    pub default_duration_minutes: u32,
    /// Retries of the click step after an unexpected error
    pub checkin_retry: RetryPolicy,
    /// Worker executable; defaults to `autoattend-session` next to the bot binary
    pub worker_binary: Option<PathBuf>,
    /// How long a cancelled worker may take to tear down before it is killed
    pub shutdown_grace_secs: u64,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            wait_timeout_secs: 10,
            poll_interval_secs: 60,
            click_pause_ms: 1000,
            default_duration_minutes: DEFAULT_DURATION_MINUTES,
            checkin_retry: RetryPolicy::fixed(1, 1000),
            worker_binary: None,
            shutdown_grace_secs: 10,
        }
    }
}

impl SessionConfig {
    pub fn wait_timeout(&self) -> Duration {
        Duration::from_secs(self.wait_timeout_secs)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }

    pub fn click_pause(&self) -> Duration {
        Duration::from_millis(self.click_pause_ms)
    }

    pub fn shutdown_grace(&self) -> Duration {
        Duration::from_secs(self.shutdown_grace_secs)
    }
}

fn config_failure(message: String, source: config::ConfigError, operation: &str) -> AttendError {
    AttendError::Config {
        message,
        source: Some(Box::new(source)),
        context: ErrorContext::new("config")
            .with_operation(operation)
            .with_suggestion("Check TOML syntax and AUTOATTEND__* variable values"),
    }
}

impl AppConfig {
    /// Load defaults, an optional TOML file, then environment overrides
    pub fn load(path: Option<&Path>) -> AttendResult<Self> {
        let mut builder = config::Config::builder();

        if let Some(path) = path {
            builder = builder.add_source(config::File::from(path).required(true));
        }

        builder = builder.add_source(
            config::Environment::with_prefix(ENV_PREFIX)
                .prefix_separator("__")
                .separator("__")
                .try_parsing(true),
        );

        let settings = builder
            .build()
            .map_err(|e| config_failure(format!("Failed to load config: {}", e), e, "build"))?;

        let mut config: AppConfig = settings.try_deserialize().map_err(|e| {
            config_failure(format!("Failed to parse config: {}", e), e, "deserialize")
        })?;

        config.apply_legacy_env();
        Ok(config)
    }

    /// Honor the `API_TOKEN` / `ADMIN_USER_ID` variables of older deployments
    fn apply_legacy_env(&mut self) {
        if self.telegram.api_token.is_empty() {
            if let Ok(token) = std::env::var("API_TOKEN") {
                self.telegram.api_token = token;
            }
        }

        if self.access.operator_id.is_none() {
            self.access.operator_id = std::env::var("ADMIN_USER_ID")
                .ok()
                .and_then(|raw| raw.trim().parse().ok());
        }
    }

    /// Serialize to TOML, for `init-config`
    pub fn to_toml(&self) -> AttendResult<String> {
        toml::to_string_pretty(self).map_err(|e| AttendError::Config {
            message: format!("Failed to serialize config: {}", e),
            source: Some(Box::new(e)),
            context: ErrorContext::new("config").with_operation("serialize_toml"),
        })
    }

    /// Checks shared by the bot and the session worker
    pub fn validate(&self) -> AttendResult<()> {
        if self.session.wait_timeout_secs == 0 {
            return Err(crate::config_error!(
                "session.wait_timeout_secs must be greater than 0"
            ));
        }

        if self.session.poll_interval_secs == 0 {
            return Err(crate::config_error!(
                "session.poll_interval_secs must be greater than 0"
            ));
        }

        if self.session.default_duration_minutes == 0 {
            return Err(crate::config_error!(
                "session.default_duration_minutes must be greater than 0"
            ));
        }

        if self.portal.url.is_empty() {
            return Err(crate::config_error!("portal.url must be set"));
        }

        Ok(())
    }

    /// Checks that only matter for the chat front end
    pub fn validate_for_bot(&self) -> AttendResult<()> {
        self.validate()?;

        if self.telegram.api_token.is_empty() {
            return Err(crate::config_error!(
                "telegram.api_token (or API_TOKEN) must be set"
            ));
        }

        if self.telegram.request_timeout_secs <= self.telegram.poll_timeout_secs {
            return Err(crate::config_error!(
                "telegram.request_timeout_secs must exceed telegram.poll_timeout_secs"
            ));
        }

        if !self.access.open_registration && self.access.operator_id.is_none() {
            return Err(crate::config_error!(
                "access.operator_id (or ADMIN_USER_ID) is required unless access.open_registration is enabled"
            ));
        }

        Ok(())
    }
}
