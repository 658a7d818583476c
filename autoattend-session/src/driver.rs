//! Portal interaction for one session: login and the check-in click step

use autoattend_core::{
    AppConfig, AttendResult, ChatId, Messages, Notifier, PortalConfig, RetryPolicy, Secret,
};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, info, instrument, warn};

use crate::browser::Browser;

/// Timing and selectors the driver works with
#[derive(Debug, Clone)]
pub struct DriverSettings {
    pub portal: PortalConfig,
    /// Bound for each element lookup
    pub wait_timeout: Duration,
    /// Pause after each successful click
    pub click_pause: Duration,
    /// Retries of the click step after an unexpected error
    pub retry: RetryPolicy,
    pub messages: Messages,
}

impl DriverSettings {
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            portal: config.portal.clone(),
            wait_timeout: config.session.wait_timeout(),
            click_pause: config.session.click_pause(),
            retry: config.session.checkin_retry.clone(),
            messages: Messages::new(config.locale),
        }
    }
}

/// What one check-in attempt did
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CheckinOutcome {
    /// Controls clicked in this attempt
    pub clicked: usize,
    /// Notifications sent in this attempt, of any kind
    pub notified: usize,
}

/// Drives a single browser through the portal on behalf of one user
pub struct SessionDriver<B: Browser> {
    browser: B,
    settings: DriverSettings,
    notifier: Arc<dyn Notifier>,
    target: ChatId,
}

impl<B: Browser> SessionDriver<B> {
    pub fn new(
        browser: B,
        settings: DriverSettings,
        notifier: Arc<dyn Notifier>,
        target: ChatId,
    ) -> Self {
        Self {
            browser,
            settings,
            notifier,
            target,
        }
    }

    /// Load the portal page
    pub async fn open(&self) -> AttendResult<()> {
        self.browser.goto(&self.settings.portal.url).await
    }

    /// Fill and submit the login form
    #[instrument(skip(self, secret))]
    pub async fn authenticate(&self, username: &str, secret: &Secret) -> AttendResult<()> {
        let selectors = &self.settings.portal.selectors;
        let bound = self.settings.wait_timeout;

        let username_field = self.browser.wait_for(&selectors.username_field, bound).await?;
        self.browser.clear(&username_field).await?;
        self.browser.type_text(&username_field, username).await?;

        let secret_field = self.browser.wait_for(&selectors.secret_field, bound).await?;
        self.browser.type_text(&secret_field, secret.expose()).await?;

        let consent = self.browser.wait_for(&selectors.consent_checkbox, bound).await?;
        self.browser.click_parent(&consent).await?;

        let submit = self.browser.wait_for(&selectors.submit_button, bound).await?;
        self.browser.click(&submit).await?;

        info!("Login form submitted");
        Ok(())
    }

    /// Click every visible check-in control, notifying about each click
    ///
    /// A page showing the sentinel phrase is left alone. A lookup timeout
    /// ends the attempt with one notification. Any other error is reported
    /// and the click step is retried within the retry policy; the attempt
    /// never fails the session.
    pub async fn attempt_checkin(&self) -> CheckinOutcome {
        let messages = &self.settings.messages;
        let mut outcome = CheckinOutcome::default();
        let mut retry = 0;

        loop {
            match self.click_available(&mut outcome).await {
                Ok(()) => return outcome,
                Err(e) if e.is_timeout() => {
                    debug!(error = %e, "No check-in control appeared");
                    self.notify(messages.checkin_timed_out(), &mut outcome).await;
                    return outcome;
                }
                Err(e) => {
                    warn!(error = %e, retry, "Check-in step failed");
                    self.notify(&messages.checkin_error(&e.to_string()), &mut outcome)
                        .await;

                    retry += 1;
                    if !self.settings.retry.allows(retry) {
                        return outcome;
                    }
                    sleep(self.settings.retry.delay_for(retry)).await;
                }
            }
        }
    }

    async fn click_available(&self, outcome: &mut CheckinOutcome) -> AttendResult<()> {
        let portal = &self.settings.portal;
        let source = self.browser.page_source().await?;

        if !portal.sentinel_phrase.is_empty() && source.contains(&portal.sentinel_phrase) {
            debug!("Nothing to check in for");
            return Ok(());
        }

        let controls = self
            .browser
            .wait_for_all(&portal.selectors.checkin_control, self.settings.wait_timeout)
            .await?;

        for control in &controls {
            self.browser.click(control).await?;
            sleep(self.settings.click_pause).await;
            outcome.clicked += 1;
            info!(clicked = outcome.clicked, "Checked in");
            self.notify(self.settings.messages.checkin_succeeded(), outcome)
                .await;
        }

        Ok(())
    }

    pub async fn refresh(&self) -> AttendResult<()> {
        self.browser.refresh().await
    }

    /// Release the browser
    pub async fn terminate(self) -> AttendResult<()> {
        self.browser.quit().await
    }

    async fn notify(&self, text: &str, outcome: &mut CheckinOutcome) {
        self.notifier.notify(&self.target, text).await;
        outcome.notified += 1;
    }
}
