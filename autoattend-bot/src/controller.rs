//! Chat front end: turns one incoming text or button press into replies
//!
//! The controller owns the dialogue map and the session registry and is
//! driven by a single dispatcher task, so every method takes `&mut self`.

use autoattend_core::{
    AccessConfig, AppConfig, AttendResult, ChatId, Identity, MenuLabel, Messages, Notifier,
    SessionSpec, UserCredential,
};
use autoattend_store::{CredentialStore, Database, RequestDecision, RequestStore};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, instrument};

use crate::dialogue::{Action, Dialogue, Step};
use crate::keyboard::{CallbackAction, Keyboard};
use crate::registry::{SessionLauncher, SessionRegistry};

const USERS_PER_PAGE: usize = 10;

/// One outgoing message to the chat that sent the input
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reply {
    pub text: String,
    pub keyboard: Option<Keyboard>,
}

impl Reply {
    pub fn plain(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            keyboard: None,
        }
    }

    pub fn with_keyboard(text: impl Into<String>, keyboard: Keyboard) -> Self {
        Self {
            text: text.into(),
            keyboard: Some(keyboard),
        }
    }
}

/// Response to an inline button press
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallbackAnswer {
    /// Short toast shown on the pressed button
    pub toast: String,
    /// Message posted to the presser's chat
    pub reply: Option<Reply>,
}

pub struct Controller<L: SessionLauncher> {
    credentials: CredentialStore,
    requests: RequestStore,
    launcher: L,
    registry: SessionRegistry,
    dialogues: HashMap<Identity, Dialogue>,
    notifier: Arc<dyn Notifier>,
    messages: Messages,
    access: AccessConfig,
    default_duration: u32,
    shutdown_grace: Duration,
}

impl<L: SessionLauncher> Controller<L> {
    pub fn new(
        config: &AppConfig,
        database: &Database,
        launcher: L,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        Self {
            credentials: database.credentials(),
            requests: database.requests(),
            launcher,
            registry: SessionRegistry::new(),
            dialogues: HashMap::new(),
            notifier,
            messages: Messages::new(config.locale),
            access: config.access.clone(),
            default_duration: config.session.default_duration_minutes,
            shutdown_grace: config.session.shutdown_grace(),
        }
    }

    pub fn messages(&self) -> &Messages {
        &self.messages
    }

    pub fn is_operator(&self, identity: Identity) -> bool {
        self.access.operator_id == Some(identity)
    }

    /// Current conversation state of `identity`
    pub fn dialogue(&self, identity: Identity) -> Dialogue {
        self.dialogues.get(&identity).cloned().unwrap_or_default()
    }

    pub fn has_session(&mut self, identity: Identity) -> bool {
        self.registry.is_active(identity)
    }

    pub fn active_sessions(&self) -> usize {
        self.registry.len()
    }

    fn main_keyboard(&self, identity: Identity) -> Keyboard {
        Keyboard::Main {
            admin: self.is_operator(identity),
        }
    }

    fn main_reply(&self, identity: Identity, text: impl Into<String>) -> Vec<Reply> {
        vec![Reply::with_keyboard(text, self.main_keyboard(identity))]
    }

    /// Handle a text message; storage failures become a generic apology
    #[instrument(skip(self, text))]
    pub async fn handle_text(&mut self, identity: Identity, text: &str) -> Vec<Reply> {
        match self.route_text(identity, text).await {
            Ok(replies) => replies,
            Err(e) => {
                e.log();
                vec![Reply::plain(self.messages.internal_error())]
            }
        }
    }

    async fn route_text(&mut self, identity: Identity, text: &str) -> AttendResult<Vec<Reply>> {
        let input = text.trim();
        if input == "/start" {
            self.dialogues.remove(&identity);
            return self.start(identity).await;
        }

        let state = self.dialogue(identity);
        let label = if input == "/run" {
            Some(MenuLabel::Start)
        } else {
            self.messages.parse_label(input)
        };

        match label {
            Some(MenuLabel::Cancel) if !state.is_idle() => {
                debug!(identity, ?state, "Flow aborted");
                self.dialogues.remove(&identity);
                Ok(self.main_reply(identity, self.messages.action_cancelled()))
            }
            Some(_) if !state.is_idle() => Ok(vec![Reply::with_keyboard(
                self.messages.finish_current_action(),
                Keyboard::Cancel,
            )]),
            Some(label) => self.menu(identity, label).await,
            None if state.is_idle() => Ok(self.main_reply(identity, self.messages.use_buttons())),
            None => self.advance(identity, &state, text).await,
        }
    }

    async fn start(&mut self, identity: Identity) -> AttendResult<Vec<Reply>> {
        if self.is_operator(identity) {
            return Ok(self.main_reply(identity, self.messages.welcome_operator()));
        }

        if self.credentials.get(identity).await?.is_some() {
            return Ok(self.main_reply(identity, self.messages.welcome_back()));
        }

        let flow = if self.access.open_registration {
            Dialogue::OnboardingUsername
        } else {
            Dialogue::RequestUsername
        };
        Ok(self.enter(identity, flow))
    }

    /// Switch `identity` into a waiting state and show its prompt
    fn enter(&mut self, identity: Identity, state: Dialogue) -> Vec<Reply> {
        let prompt = state
            .prompt(&self.messages)
            .unwrap_or(self.messages.use_buttons());
        self.dialogues.insert(identity, state);
        vec![Reply::with_keyboard(prompt, Keyboard::Cancel)]
    }

    async fn menu(&mut self, identity: Identity, label: MenuLabel) -> AttendResult<Vec<Reply>> {
        if label.is_admin() && !self.is_operator(identity) {
            info!(identity, ?label, "Admin action denied");
            return Ok(vec![Reply::plain(self.messages.not_authorized())]);
        }

        match label {
            MenuLabel::Start => self.launch(identity).await,
            MenuLabel::Cancel => self.stop(identity).await,
            MenuLabel::ChangeDuration => {
                if self.credentials.get(identity).await?.is_none() {
                    return Ok(vec![Reply::plain(self.messages.save_credentials_first())]);
                }
                Ok(self.enter(identity, Dialogue::Duration))
            }
            MenuLabel::ListUsers => self.list_users(identity).await,
            MenuLabel::ListRequests => self.list_requests().await,
            MenuLabel::AddUser => Ok(self.enter(identity, Dialogue::AddIdentity)),
            MenuLabel::UpdateUser => Ok(self.enter(identity, Dialogue::UpdateIdentity)),
            MenuLabel::DeleteUser => Ok(self.enter(identity, Dialogue::DeleteIdentity)),
        }
    }

    async fn advance(
        &mut self,
        identity: Identity,
        state: &Dialogue,
        input: &str,
    ) -> AttendResult<Vec<Reply>> {
        match state.advance(input) {
            Step::Next(next) => Ok(self.enter(identity, next)),
            Step::Reject(rejection) => Ok(vec![Reply::with_keyboard(
                rejection.message(&self.messages),
                Keyboard::Cancel,
            )]),
            Step::Complete(action) => {
                self.dialogues.remove(&identity);
                self.perform(identity, action).await
            }
        }
    }

    async fn perform(&mut self, identity: Identity, action: Action) -> AttendResult<Vec<Reply>> {
        if action.is_admin() && !self.is_operator(identity) {
            return Ok(vec![Reply::plain(self.messages.not_authorized())]);
        }

        let messages = self.messages;
        match action {
            Action::SaveCredentials { username, secret } => {
                let credential = UserCredential::new(identity, username, secret)
                    .with_duration(self.default_duration);
                self.credentials.save(&credential).await?;
                info!(identity, "Credentials saved");
                Ok(self.main_reply(identity, messages.credentials_saved()))
            }
            Action::SubmitRequest { username, secret } => {
                let request_id = self.requests.submit(identity, &username, &secret).await?;
                match self.access.operator_id {
                    Some(operator) => {
                        self.notifier
                            .notify(
                                &ChatId::Id(operator),
                                &messages.new_request_for_operator(identity, &username),
                            )
                            .await
                    }
                    None => debug!(request_id, "No operator configured to notify"),
                }
                Ok(vec![Reply::plain(messages.request_sent())])
            }
            Action::SetDuration(minutes) => {
                if self.credentials.update_duration(identity, minutes).await? {
                    Ok(self.main_reply(identity, messages.duration_updated(minutes)))
                } else {
                    Ok(self.main_reply(identity, messages.save_credentials_first()))
                }
            }
            Action::AddUser {
                identity: target,
                username,
                secret,
            } => {
                let credential = UserCredential::new(target, username.clone(), secret)
                    .with_duration(self.default_duration);
                self.credentials.save(&credential).await?;
                info!(target, "User added by operator");
                Ok(self.main_reply(identity, messages.user_added(&username)))
            }
            Action::UpdateUser {
                identity: target,
                username,
                secret,
            } => {
                let text = if self.credentials.update_login(target, &username, &secret).await? {
                    messages.user_updated(target)
                } else {
                    messages.user_not_found(target)
                };
                Ok(self.main_reply(identity, text))
            }
            Action::DeleteUser(target) => {
                let text = if self.credentials.delete(target).await? {
                    messages.user_deleted(target)
                } else {
                    messages.user_not_found(target)
                };
                Ok(self.main_reply(identity, text))
            }
        }
    }

    async fn launch(&mut self, identity: Identity) -> AttendResult<Vec<Reply>> {
        let Some(credential) = self.credentials.get(identity).await? else {
            return Ok(vec![Reply::plain(self.messages.save_credentials_first())]);
        };

        if self.registry.is_active(identity) {
            return Ok(vec![Reply::with_keyboard(
                self.messages.already_running(),
                Keyboard::Cancel,
            )]);
        }

        let session = SessionSpec::from_credential(&credential);
        match self.launcher.launch(&session) {
            Ok(handle) => {
                self.registry.insert(identity, handle);
                Ok(vec![Reply::with_keyboard(
                    self.messages.launching(session.duration_minutes),
                    Keyboard::Cancel,
                )])
            }
            Err(e) => {
                e.log();
                Ok(self.main_reply(identity, self.messages.launch_failed(&e.to_string())))
            }
        }
    }

    async fn stop(&mut self, identity: Identity) -> AttendResult<Vec<Reply>> {
        let Some(handle) = self.registry.take(identity) else {
            return Ok(self.main_reply(identity, self.messages.nothing_to_stop()));
        };

        match handle.stop(self.shutdown_grace).await {
            Ok(()) => Ok(self.main_reply(identity, self.messages.session_stopped())),
            Err(e) => {
                e.log();
                Ok(self.main_reply(identity, self.messages.stop_failed(&e.to_string())))
            }
        }
    }

    async fn list_users(&self, identity: Identity) -> AttendResult<Vec<Reply>> {
        let users = self.credentials.list().await?;
        if users.is_empty() {
            return Ok(self.main_reply(identity, self.messages.no_users()));
        }

        Ok(users
            .chunks(USERS_PER_PAGE)
            .map(|page| {
                let lines: Vec<String> = page
                    .iter()
                    .map(|user| self.messages.user_line(user))
                    .collect();
                Reply::plain(lines.join("\n"))
            })
            .collect())
    }

    async fn list_requests(&self) -> AttendResult<Vec<Reply>> {
        let pending = self.requests.list_pending().await?;
        if pending.is_empty() {
            return Ok(vec![Reply::plain(self.messages.no_requests())]);
        }

        Ok(pending
            .iter()
            .map(|request| {
                Reply::with_keyboard(
                    self.messages.request_line(request),
                    Keyboard::RequestDecision(request.request_id),
                )
            })
            .collect())
    }

    /// Handle an inline button press
    #[instrument(skip(self))]
    pub async fn handle_callback(&mut self, identity: Identity, data: &str) -> CallbackAnswer {
        match self.route_callback(identity, data).await {
            Ok(answer) => answer,
            Err(e) => {
                e.log();
                CallbackAnswer {
                    toast: self.messages.internal_error().to_string(),
                    reply: None,
                }
            }
        }
    }

    async fn route_callback(&mut self, identity: Identity, data: &str) -> AttendResult<CallbackAnswer> {
        let messages = self.messages;
        if !self.is_operator(identity) {
            return Ok(CallbackAnswer {
                toast: messages.not_authorized().to_string(),
                reply: None,
            });
        }

        let Some(action) = CallbackAction::parse(data) else {
            return Ok(CallbackAnswer {
                toast: messages.use_buttons().to_string(),
                reply: None,
            });
        };

        let text = match action {
            CallbackAction::Approve(request_id) => {
                match self.requests.approve(request_id, self.default_duration).await? {
                    RequestDecision::Applied(request) => {
                        self.notifier
                            .notify(&ChatId::Id(request.identity), messages.access_granted())
                            .await;
                        messages.request_approved(request_id)
                    }
                    RequestDecision::Unchanged(request) => {
                        messages.request_already_decided(request_id, request.status)
                    }
                    RequestDecision::NotFound => messages.request_not_found(request_id),
                }
            }
            CallbackAction::Reject(request_id) => match self.requests.reject(request_id).await? {
                RequestDecision::Applied(request) => {
                    self.notifier
                        .notify(&ChatId::Id(request.identity), messages.access_denied())
                        .await;
                    messages.request_rejected(request_id)
                }
                RequestDecision::Unchanged(request) => {
                    messages.request_already_decided(request_id, request.status)
                }
                RequestDecision::NotFound => messages.request_not_found(request_id),
            },
        };

        Ok(CallbackAnswer {
            toast: text.clone(),
            reply: Some(Reply::plain(text)),
        })
    }

    /// Stop every running session
    pub async fn shutdown(&mut self) {
        info!(sessions = self.registry.len(), "Stopping all sessions");
        self.registry.stop_all(self.shutdown_grace).await;
    }
}
