//! The authenticate-then-poll loop of one session

use autoattend_core::{AppConfig, AttendResult, Notifier, SessionSpec};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{sleep, Instant};
use tracing::{info, warn};

use crate::browser::Browser;
use crate::driver::{DriverSettings, SessionDriver};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopState {
    Starting,
    Authenticating,
    Polling,
    Finished,
}

/// Summary of a finished run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoopReport {
    /// Furthest state reached before `Finished`
    pub reached: LoopState,
    pub cycles: u32,
    pub clicked: usize,
    /// Set when the run ended on an error
    pub failure: Option<String>,
    /// Set when the shutdown signal ended the run early
    pub cancelled: bool,
}

impl Default for LoopReport {
    fn default() -> Self {
        Self {
            reached: LoopState::Starting,
            cycles: 0,
            clicked: 0,
            failure: None,
            cancelled: false,
        }
    }
}

pub struct AttendanceLoop {
    settings: DriverSettings,
    poll_interval: Duration,
    notifier: Arc<dyn Notifier>,
}

impl AttendanceLoop {
    pub fn new(
        settings: DriverSettings,
        poll_interval: Duration,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        Self {
            settings,
            poll_interval,
            notifier,
        }
    }

    pub fn from_config(config: &AppConfig, notifier: Arc<dyn Notifier>) -> Self {
        Self::new(
            DriverSettings::from_config(config),
            config.session.poll_interval(),
            notifier,
        )
    }

    /// Run one session to completion
    ///
    /// `connect` opens the browser. The run ends when the duration elapses,
    /// on an error, or when `shutdown` resolves. Whichever way it ends the
    /// browser is released and exactly one finished notification is sent.
    pub async fn run<B, C, S>(&self, session: &SessionSpec, connect: C, shutdown: S) -> LoopReport
    where
        B: Browser,
        C: Future<Output = AttendResult<B>>,
        S: Future<Output = ()>,
    {
        let messages = self.settings.messages;
        let target = &session.notify_target;
        let mut report = LoopReport::default();
        tokio::pin!(shutdown);

        info!(
            state = ?LoopState::Starting,
            duration_minutes = session.duration_minutes,
            "Session starting"
        );

        let browser = tokio::select! {
            connected = connect => connected,
            _ = &mut shutdown => {
                report.cancelled = true;
                return self.finish::<B>(None, report, session).await;
            }
        };

        let browser = match browser {
            Ok(browser) => browser,
            Err(e) => {
                e.log();
                report.failure = Some(e.to_string());
                self.notifier
                    .notify(target, &messages.session_failed(&e.to_string()))
                    .await;
                return self.finish::<B>(None, report, session).await;
            }
        };

        let driver = SessionDriver::new(
            browser,
            self.settings.clone(),
            self.notifier.clone(),
            target.clone(),
        );

        let outcome = tokio::select! {
            result = self.drive(&driver, session, &mut report) => Some(result),
            _ = &mut shutdown => None,
        };

        match outcome {
            Some(Ok(())) => {}
            Some(Err(e)) => {
                e.log();
                report.failure = Some(e.to_string());
                self.notifier
                    .notify(target, &messages.session_failed(&e.to_string()))
                    .await;
            }
            None => {
                info!("Shutdown requested, stopping session");
                report.cancelled = true;
            }
        }

        self.finish(Some(driver), report, session).await
    }

    async fn drive<B: Browser>(
        &self,
        driver: &SessionDriver<B>,
        session: &SessionSpec,
        report: &mut LoopReport,
    ) -> AttendResult<()> {
        driver.open().await?;

        report.reached = LoopState::Authenticating;
        info!(state = ?report.reached, "Logging in");
        driver.authenticate(&session.username, &session.secret).await?;

        report.reached = LoopState::Polling;
        let deadline =
            Instant::now() + Duration::from_secs(u64::from(session.duration_minutes) * 60);
        info!(state = ?report.reached, "Polling for check-in controls");

        while Instant::now() < deadline {
            let outcome = driver.attempt_checkin().await;
            report.cycles += 1;
            report.clicked += outcome.clicked;

            sleep(self.poll_interval).await;
            driver.refresh().await?;
        }

        Ok(())
    }

    async fn finish<B: Browser>(
        &self,
        driver: Option<SessionDriver<B>>,
        report: LoopReport,
        session: &SessionSpec,
    ) -> LoopReport {
        if let Some(driver) = driver {
            if let Err(e) = driver.terminate().await {
                warn!(error = %e, "Failed to close browser");
            }
        }

        self.notifier
            .notify(&session.notify_target, self.settings.messages.session_finished())
            .await;

        info!(
            state = ?LoopState::Finished,
            cycles = report.cycles,
            clicked = report.clicked,
            cancelled = report.cancelled,
            failed = report.failure.is_some(),
            "Session finished"
        );
        report
    }
}
