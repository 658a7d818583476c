//! Running sessions, one worker process per identity

use async_trait::async_trait;
use autoattend_core::{
    with_timeout, AppConfig, AttendError, AttendResult, ErrorContext, Identity, SessionSpec,
};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;
use tokio::process::{Child, ChildStdin, Command};
use tracing::{debug, info, warn};

pub const WORKER_BINARY: &str = "autoattend-session";

/// A started session that can be polled and stopped
#[async_trait]
pub trait SessionHandle: Send {
    /// False once the session has exited on its own
    fn is_running(&mut self) -> bool;

    /// Ask the session to stop, escalate after `grace`, and wait for exit
    async fn stop(self: Box<Self>, grace: Duration) -> AttendResult<()>;
}

/// Starts sessions
pub trait SessionLauncher: Send + Sync {
    fn launch(&self, session: &SessionSpec) -> AttendResult<Box<dyn SessionHandle>>;
}

/// Launches `autoattend-session` worker processes
#[derive(Clone)]
pub struct ProcessLauncher {
    program: PathBuf,
    api_token: String,
    config_path: Option<PathBuf>,
}

impl ProcessLauncher {
    pub fn new(program: impl Into<PathBuf>, api_token: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            api_token: api_token.into(),
            config_path: None,
        }
    }

    /// Pass `--config` to every worker so it sees the same settings
    pub fn with_config_path(mut self, path: Option<PathBuf>) -> Self {
        self.config_path = path;
        self
    }

    pub fn from_config(config: &AppConfig, config_path: Option<PathBuf>) -> Self {
        let program = config
            .session
            .worker_binary
            .clone()
            .unwrap_or_else(default_worker_binary);
        Self::new(program, config.telegram.api_token.clone()).with_config_path(config_path)
    }

    pub fn program(&self) -> &Path {
        &self.program
    }
}

/// The worker next to the running executable, else whatever is on PATH
fn default_worker_binary() -> PathBuf {
    std::env::current_exe()
        .ok()
        .and_then(|exe| exe.parent().map(|dir| dir.join(WORKER_BINARY)))
        .filter(|candidate| candidate.exists())
        .unwrap_or_else(|| PathBuf::from(WORKER_BINARY))
}

impl SessionLauncher for ProcessLauncher {
    fn launch(&self, session: &SessionSpec) -> AttendResult<Box<dyn SessionHandle>> {
        let mut command = Command::new(&self.program);
        command
            .arg(&session.username)
            .arg(session.secret.expose())
            .arg(session.duration_minutes.to_string())
            .arg(session.notify_target.to_string())
            .arg(&self.api_token)
            .arg("--watch-stdin");

        if let Some(path) = &self.config_path {
            command.arg("--config").arg(path);
        }

        let mut child = command
            .stdin(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| AttendError::Internal {
                message: format!("Failed to start {}: {}", self.program.display(), e),
                source: Some(Box::new(e)),
                context: ErrorContext::new("launcher")
                    .with_operation("launch")
                    .with_suggestion("Set session.worker_binary to the autoattend-session path"),
            })?;

        let stdin = child.stdin.take();
        info!(
            identity = session.identity,
            pid = child.id(),
            duration_minutes = session.duration_minutes,
            "Session worker started"
        );

        Ok(Box::new(ProcessHandle {
            identity: session.identity,
            child,
            stdin,
        }))
    }
}

/// A running worker process; dropping it kills the process
pub struct ProcessHandle {
    identity: Identity,
    child: Child,
    stdin: Option<ChildStdin>,
}

#[async_trait]
impl SessionHandle for ProcessHandle {
    fn is_running(&mut self) -> bool {
        match self.child.try_wait() {
            Ok(None) => true,
            Ok(Some(status)) => {
                debug!(identity = self.identity, %status, "Session worker exited");
                false
            }
            Err(e) => {
                warn!(identity = self.identity, error = %e, "Failed to poll session worker");
                false
            }
        }
    }

    async fn stop(mut self: Box<Self>, grace: Duration) -> AttendResult<()> {
        // Closing the pipe is the worker's signal to tear down
        drop(self.stdin.take());

        match with_timeout(self.child.wait(), grace, "stop_session").await {
            Ok(status) => {
                let status = status?;
                info!(identity = self.identity, %status, "Session worker stopped");
            }
            Err(_) => {
                warn!(
                    identity = self.identity,
                    grace_secs = grace.as_secs(),
                    "Session worker ignored stop request, killing"
                );
                self.child.kill().await?;
            }
        }
        Ok(())
    }
}

/// Session handles keyed by identity, at most one each
#[derive(Default)]
pub struct SessionRegistry {
    sessions: HashMap<Identity, Box<dyn SessionHandle>>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Drop the handle for `identity` if its session already exited
    fn reap(&mut self, identity: Identity) {
        if let Some(handle) = self.sessions.get_mut(&identity) {
            if !handle.is_running() {
                self.sessions.remove(&identity);
            }
        }
    }

    pub fn is_active(&mut self, identity: Identity) -> bool {
        self.reap(identity);
        self.sessions.contains_key(&identity)
    }

    /// Record a new session; refuses to replace a live one
    pub fn insert(&mut self, identity: Identity, handle: Box<dyn SessionHandle>) -> bool {
        if self.is_active(identity) {
            return false;
        }
        self.sessions.insert(identity, handle);
        true
    }

    /// Remove and return the live session for `identity`
    pub fn take(&mut self, identity: Identity) -> Option<Box<dyn SessionHandle>> {
        self.reap(identity);
        self.sessions.remove(&identity)
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    /// Stop every session, for bot shutdown
    pub async fn stop_all(&mut self, grace: Duration) {
        for (identity, handle) in self.sessions.drain() {
            if let Err(e) = handle.stop(grace).await {
                warn!(identity, error = %e, "Failed to stop session during shutdown");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use autoattend_core::{ChatId, Secret};

    // `sh -c <script>` takes the remaining worker arguments as $0.., so the
    // username/secret slots carry a small shell script
    fn shell_session(script: &str) -> SessionSpec {
        SessionSpec {
            identity: 1,
            username: "-c".to_string(),
            secret: Secret::new(script),
            duration_minutes: 1,
            notify_target: ChatId::Id(1),
        }
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn closing_stdin_stops_a_cooperative_worker() {
        let launcher = ProcessLauncher::new("sh", "token");
        let mut handle = launcher
            .launch(&shell_session("cat > /dev/null"))
            .unwrap();

        assert!(handle.is_running());
        handle.stop(Duration::from_secs(10)).await.unwrap();
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn stubborn_worker_is_killed_after_grace() {
        let launcher = ProcessLauncher::new("sh", "token");
        let handle = launcher.launch(&shell_session("exec sleep 30")).unwrap();

        let started = std::time::Instant::now();
        handle.stop(Duration::from_millis(200)).await.unwrap();
        assert!(started.elapsed() < Duration::from_secs(10));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn exited_worker_is_reaped() {
        let launcher = ProcessLauncher::new("sh", "token");
        let mut registry = SessionRegistry::new();
        let handle = launcher.launch(&shell_session("exit 0")).unwrap();
        assert!(registry.insert(1, handle));

        // Give the shell time to exit
        for _ in 0..100 {
            if !registry.is_active(1) {
                break;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        assert!(!registry.is_active(1));
        assert!(registry.take(1).is_none());
        assert!(registry.is_empty());
    }

    #[tokio::test]
    async fn missing_binary_is_reported() {
        let launcher = ProcessLauncher::new("/nonexistent/autoattend-session", "token");
        let error = match launcher.launch(&shell_session("true")) {
            Ok(_) => panic!("launch should fail"),
            Err(e) => e,
        };
        assert!(error.to_string().contains("/nonexistent/autoattend-session"));
    }
}
