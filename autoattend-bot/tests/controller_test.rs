//! Conversation-level tests of the controller with a fake session launcher

use async_trait::async_trait;
use autoattend_bot::{
    Controller, Dialogue, Keyboard, Reply, SessionHandle, SessionLauncher,
};
use autoattend_core::{
    AppConfig, AttendError, AttendResult, ChatId, ErrorContext, Locale, MenuLabel, Messages,
    Notifier, Secret, SessionSpec, UserCredential,
};
use autoattend_store::Database;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tempfile::TempDir;

const OPERATOR: i64 = 1;
const USER: i64 = 5;

#[derive(Clone, Default)]
struct FakeLauncher {
    launched: Arc<Mutex<Vec<SessionSpec>>>,
    alive: Arc<AtomicBool>,
    stopped: Arc<AtomicUsize>,
    fail: bool,
}

struct FakeHandle {
    alive: Arc<AtomicBool>,
    stopped: Arc<AtomicUsize>,
}

#[async_trait]
impl SessionHandle for FakeHandle {
    fn is_running(&mut self) -> bool {
        self.alive.load(Ordering::SeqCst)
    }

    async fn stop(self: Box<Self>, _grace: Duration) -> AttendResult<()> {
        self.alive.store(false, Ordering::SeqCst);
        self.stopped.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

impl SessionLauncher for FakeLauncher {
    fn launch(&self, session: &SessionSpec) -> AttendResult<Box<dyn SessionHandle>> {
        if self.fail {
            return Err(AttendError::Internal {
                message: "worker binary missing".to_string(),
                source: None,
                context: ErrorContext::new("fake_launcher"),
            });
        }
        self.launched.lock().unwrap().push(session.clone());
        self.alive.store(true, Ordering::SeqCst);
        Ok(Box::new(FakeHandle {
            alive: self.alive.clone(),
            stopped: self.stopped.clone(),
        }))
    }
}

impl FakeLauncher {
    fn launches(&self) -> usize {
        self.launched.lock().unwrap().len()
    }

    fn stops(&self) -> usize {
        self.stopped.load(Ordering::SeqCst)
    }
}

#[derive(Clone, Default)]
struct RecordingNotifier {
    sent: Arc<Mutex<Vec<(ChatId, String)>>>,
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

impl RecordingNotifier {
    fn sent(&self) -> Vec<(ChatId, String)> {
        self.sent.lock().unwrap().clone()
    }
}

struct Harness {
    _dir: TempDir,
    database: Database,
    controller: Controller<FakeLauncher>,
    launcher: FakeLauncher,
    notifier: RecordingNotifier,
    messages: Messages,
}

async fn harness_with(configure: impl FnOnce(&mut AppConfig), launcher: FakeLauncher) -> Harness {
    let dir = tempfile::tempdir().unwrap();
    let mut config = AppConfig::default();
    config.locale = Locale::En;
    config.access.operator_id = Some(OPERATOR);
    config.storage.database_url = format!("sqlite:{}", dir.path().join("bot.db").display());
    configure(&mut config);

    let database = Database::connect(&config.storage.database_url).await.unwrap();
    let notifier = RecordingNotifier::default();
    let controller = Controller::new(
        &config,
        &database,
        launcher.clone(),
        Arc::new(notifier.clone()),
    );

    Harness {
        _dir: dir,
        database,
        controller,
        launcher,
        notifier,
        messages: Messages::new(Locale::En),
    }
}

async fn harness() -> Harness {
    harness_with(|_| {}, FakeLauncher::default()).await
}

impl Harness {
    async fn say(&mut self, identity: i64, text: &str) -> Vec<Reply> {
        self.controller.handle_text(identity, text).await
    }

    async fn press(&mut self, identity: i64, label: MenuLabel) -> Vec<Reply> {
        let text = self.messages.label(label);
        self.say(identity, text).await
    }

    async fn save_user(&self, identity: i64, username: &str) {
        self.database
            .credentials()
            .save(&UserCredential::new(identity, username, Secret::new("pw")))
            .await
            .unwrap();
    }
}

fn texts(replies: &[Reply]) -> Vec<String> {
    replies.iter().map(|r| r.text.clone()).collect()
}

#[tokio::test]
async fn test_start_without_credentials_launches_nothing() {
    let mut h = harness().await;

    let replies = h.say(USER, "/run").await;
    assert_eq!(texts(&replies), vec![h.messages.save_credentials_first()]);

    let replies = h.press(USER, MenuLabel::Start).await;
    assert_eq!(texts(&replies), vec![h.messages.save_credentials_first()]);

    assert_eq!(h.launcher.launches(), 0);
    assert_eq!(h.controller.active_sessions(), 0);
}

#[tokio::test]
async fn test_one_session_per_identity_and_cancel() {
    let mut h = harness().await;
    h.save_user(USER, "alice").await;

    let replies = h.press(USER, MenuLabel::Start).await;
    assert_eq!(
        replies,
        vec![Reply::with_keyboard(h.messages.launching(60), Keyboard::Cancel)]
    );
    let launched = h.launcher.launched.lock().unwrap()[0].clone();
    assert_eq!(launched.username, "alice");
    assert_eq!(launched.duration_minutes, 60);
    assert_eq!(launched.notify_target, ChatId::Id(USER));

    let replies = h.say(USER, "/run").await;
    assert_eq!(texts(&replies), vec![h.messages.already_running()]);
    assert_eq!(h.launcher.launches(), 1);

    let replies = h.press(USER, MenuLabel::Cancel).await;
    assert_eq!(
        replies,
        vec![Reply::with_keyboard(
            h.messages.session_stopped(),
            Keyboard::Main { admin: false }
        )]
    );
    assert_eq!(h.launcher.stops(), 1);

    let replies = h.press(USER, MenuLabel::Cancel).await;
    assert_eq!(texts(&replies), vec![h.messages.nothing_to_stop()]);
    assert_eq!(h.launcher.stops(), 1);
    assert_eq!(h.controller.active_sessions(), 0);
}

#[tokio::test]
async fn test_finished_session_can_be_started_again() {
    let mut h = harness().await;
    h.save_user(USER, "alice").await;

    h.press(USER, MenuLabel::Start).await;
    assert!(h.controller.has_session(USER));

    // The worker ran out its duration on its own
    h.launcher.alive.store(false, Ordering::SeqCst);
    assert!(!h.controller.has_session(USER));

    let replies = h.press(USER, MenuLabel::Cancel).await;
    assert_eq!(texts(&replies), vec![h.messages.nothing_to_stop()]);

    let replies = h.press(USER, MenuLabel::Start).await;
    assert_eq!(texts(&replies), vec![h.messages.launching(60)]);
    assert_eq!(h.launcher.launches(), 2);
}

#[tokio::test]
async fn test_launch_failure_is_reported() {
    let launcher = FakeLauncher {
        fail: true,
        ..Default::default()
    };
    let mut h = harness_with(|_| {}, launcher).await;
    h.save_user(USER, "alice").await;

    let replies = h.press(USER, MenuLabel::Start).await;
    assert_eq!(replies.len(), 1);
    assert!(replies[0].text.contains("worker binary missing"));
    assert_eq!(replies[0].keyboard, Some(Keyboard::Main { admin: false }));
    assert_eq!(h.controller.active_sessions(), 0);
}

#[tokio::test]
async fn test_duration_change_validates_input() {
    let mut h = harness().await;
    h.save_user(USER, "alice").await;

    let replies = h.press(USER, MenuLabel::ChangeDuration).await;
    assert_eq!(texts(&replies), vec![h.messages.ask_duration()]);
    assert_eq!(h.controller.dialogue(USER), Dialogue::Duration);

    for bad in ["abc", "0", "12.5"] {
        let replies = h.say(USER, bad).await;
        assert_eq!(texts(&replies), vec![h.messages.enter_number()]);
        assert_eq!(h.controller.dialogue(USER), Dialogue::Duration);
    }
    let stored = h.database.credentials().get(USER).await.unwrap().unwrap();
    assert_eq!(stored.preferred_duration_minutes, 60);

    let replies = h.say(USER, "45").await;
    assert_eq!(texts(&replies), vec![h.messages.duration_updated(45)]);
    assert!(h.controller.dialogue(USER).is_idle());

    let stored = h.database.credentials().get(USER).await.unwrap().unwrap();
    assert_eq!(stored.preferred_duration_minutes, 45);

    h.press(USER, MenuLabel::Start).await;
    assert_eq!(h.launcher.launched.lock().unwrap()[0].duration_minutes, 45);
}

#[tokio::test]
async fn test_change_duration_requires_credentials() {
    let mut h = harness().await;

    let replies = h.press(USER, MenuLabel::ChangeDuration).await;
    assert_eq!(texts(&replies), vec![h.messages.save_credentials_first()]);
    assert!(h.controller.dialogue(USER).is_idle());
}

#[tokio::test]
async fn test_access_request_approval_flow() {
    let mut h = harness().await;

    let replies = h.say(USER, "/start").await;
    assert_eq!(texts(&replies), vec![h.messages.welcome_request_access()]);
    h.say(USER, "alice").await;
    let replies = h.say(USER, "pw1").await;
    assert_eq!(texts(&replies), vec![h.messages.request_sent()]);
    assert!(h.controller.dialogue(USER).is_idle());

    assert_eq!(
        h.notifier.sent(),
        vec![(
            ChatId::Id(OPERATOR),
            h.messages.new_request_for_operator(USER, "alice")
        )]
    );

    let replies = h.press(OPERATOR, MenuLabel::ListRequests).await;
    assert_eq!(replies.len(), 1);
    let Some(Keyboard::RequestDecision(request_id)) = replies[0].keyboard else {
        panic!("expected request buttons, got {:?}", replies[0].keyboard);
    };

    let answer = h
        .controller
        .handle_callback(OPERATOR, &format!("approve_{}", request_id))
        .await;
    assert_eq!(answer.toast, h.messages.request_approved(request_id));

    let credential = h.database.credentials().get(USER).await.unwrap().unwrap();
    assert_eq!(credential.username, "alice");
    assert_eq!(credential.secret.expose(), "pw1");
    assert_eq!(credential.preferred_duration_minutes, 60);
    assert_eq!(
        h.notifier.sent().last(),
        Some(&(ChatId::Id(USER), h.messages.access_granted().to_string()))
    );

    // A second approval changes nothing and notifies nobody
    let again = h
        .controller
        .handle_callback(OPERATOR, &format!("approve_{}", request_id))
        .await;
    assert!(again.toast.contains("already handled"));
    assert_eq!(h.notifier.sent().len(), 2);

    let replies = h.say(USER, "/start").await;
    assert_eq!(texts(&replies), vec![h.messages.welcome_back()]);

    let replies = h.press(OPERATOR, MenuLabel::ListRequests).await;
    assert_eq!(texts(&replies), vec![h.messages.no_requests()]);
}

#[tokio::test]
async fn test_rejected_request_creates_no_credential() {
    let mut h = harness().await;

    h.say(USER, "/start").await;
    h.say(USER, "bob").await;
    h.say(USER, "pw").await;

    let request_id = h.database.requests().list_pending().await.unwrap()[0].request_id;
    let answer = h
        .controller
        .handle_callback(OPERATOR, &format!("reject_{}", request_id))
        .await;
    assert_eq!(answer.toast, h.messages.request_rejected(request_id));
    assert!(h.database.credentials().get(USER).await.unwrap().is_none());
    assert_eq!(
        h.notifier.sent().last(),
        Some(&(ChatId::Id(USER), h.messages.access_denied().to_string()))
    );

    let approve = h
        .controller
        .handle_callback(OPERATOR, &format!("approve_{}", request_id))
        .await;
    assert!(approve.toast.contains("already handled"));
    assert!(h.database.credentials().get(USER).await.unwrap().is_none());
}

#[tokio::test]
async fn test_non_operator_gets_fixed_denial() {
    let mut h = harness().await;
    h.save_user(USER, "alice").await;

    for label in [
        MenuLabel::ListUsers,
        MenuLabel::AddUser,
        MenuLabel::UpdateUser,
        MenuLabel::DeleteUser,
        MenuLabel::ListRequests,
    ] {
        let replies = h.press(USER, label).await;
        assert_eq!(texts(&replies), vec![h.messages.not_authorized()]);
        assert!(h.controller.dialogue(USER).is_idle());
    }

    let request_id = h
        .database
        .requests()
        .submit(9, "mallory", &Secret::new("x"))
        .await
        .unwrap();
    let answer = h
        .controller
        .handle_callback(USER, &format!("approve_{}", request_id))
        .await;
    assert_eq!(answer.toast, h.messages.not_authorized());
    assert!(answer.reply.is_none());
    assert!(h.database.credentials().get(9).await.unwrap().is_none());
}

#[tokio::test]
async fn test_admin_add_update_delete() {
    let mut h = harness().await;

    let replies = h.say(OPERATOR, "/start").await;
    assert_eq!(
        replies,
        vec![Reply::with_keyboard(
            h.messages.welcome_operator(),
            Keyboard::Main { admin: true }
        )]
    );

    let replies = h.press(OPERATOR, MenuLabel::AddUser).await;
    assert_eq!(texts(&replies), vec![h.messages.ask_user_id_to_add()]);
    let replies = h.say(OPERATOR, "not a number").await;
    assert_eq!(texts(&replies), vec![h.messages.enter_valid_id()]);
    h.say(OPERATOR, "77").await;
    h.say(OPERATOR, "bob").await;
    let replies = h.say(OPERATOR, "bob-pw").await;
    assert_eq!(texts(&replies), vec![h.messages.user_added("bob")]);

    // Stored under the target identity, not the operator's
    let added = h.database.credentials().get(77).await.unwrap().unwrap();
    assert_eq!(added.username, "bob");
    assert!(h.database.credentials().get(OPERATOR).await.unwrap().is_none());

    h.press(OPERATOR, MenuLabel::UpdateUser).await;
    h.say(OPERATOR, "77").await;
    h.say(OPERATOR, "robert").await;
    let replies = h.say(OPERATOR, "new-pw").await;
    assert_eq!(texts(&replies), vec![h.messages.user_updated(77)]);
    let updated = h.database.credentials().get(77).await.unwrap().unwrap();
    assert_eq!(updated.username, "robert");
    assert_eq!(updated.secret.expose(), "new-pw");

    h.press(OPERATOR, MenuLabel::DeleteUser).await;
    let replies = h.say(OPERATOR, "88").await;
    assert_eq!(texts(&replies), vec![h.messages.user_not_found(88)]);

    h.press(OPERATOR, MenuLabel::DeleteUser).await;
    let replies = h.say(OPERATOR, "77").await;
    assert_eq!(texts(&replies), vec![h.messages.user_deleted(77)]);
    assert!(h.database.credentials().get(77).await.unwrap().is_none());
}

#[tokio::test]
async fn test_user_list_is_paginated() {
    let mut h = harness().await;

    let replies = h.press(OPERATOR, MenuLabel::ListUsers).await;
    assert_eq!(texts(&replies), vec![h.messages.no_users()]);

    for identity in 100..112 {
        h.save_user(identity, &format!("user{}", identity)).await;
    }

    let replies = h.press(OPERATOR, MenuLabel::ListUsers).await;
    assert_eq!(replies.len(), 2);
    assert_eq!(replies[0].text.lines().count(), 10);
    assert_eq!(replies[1].text.lines().count(), 2);
    assert!(replies[1].text.contains("user111"));
}

#[tokio::test]
async fn test_menu_labels_mid_flow_and_cancel() {
    let mut h = harness().await;
    h.save_user(OPERATOR, "op").await;

    h.press(OPERATOR, MenuLabel::AddUser).await;
    let replies = h.press(OPERATOR, MenuLabel::Start).await;
    assert_eq!(texts(&replies), vec![h.messages.finish_current_action()]);
    assert_eq!(h.controller.dialogue(OPERATOR), Dialogue::AddIdentity);
    assert_eq!(h.launcher.launches(), 0);

    let replies = h.press(OPERATOR, MenuLabel::Cancel).await;
    assert_eq!(texts(&replies), vec![h.messages.action_cancelled()]);
    assert!(h.controller.dialogue(OPERATOR).is_idle());
    assert_eq!(h.launcher.stops(), 0);

    let replies = h.say(OPERATOR, "hello").await;
    assert_eq!(texts(&replies), vec![h.messages.use_buttons()]);
}

#[tokio::test]
async fn test_open_registration_saves_credentials_directly() {
    let mut h = harness_with(
        |config| {
            config.access.operator_id = None;
            config.access.open_registration = true;
            config.session.default_duration_minutes = 90;
        },
        FakeLauncher::default(),
    )
    .await;

    let replies = h.say(USER, "/start").await;
    assert_eq!(texts(&replies), vec![h.messages.ask_username()]);
    let replies = h.say(USER, "dave").await;
    assert_eq!(texts(&replies), vec![h.messages.ask_secret()]);
    let replies = h.say(USER, "pw").await;
    assert_eq!(texts(&replies), vec![h.messages.credentials_saved()]);

    let credential = h.database.credentials().get(USER).await.unwrap().unwrap();
    assert_eq!(credential.username, "dave");
    assert_eq!(credential.preferred_duration_minutes, 90);
    assert!(h.database.requests().list_pending().await.unwrap().is_empty());
    assert!(h.notifier.sent().is_empty());

    let replies = h.press(USER, MenuLabel::Start).await;
    assert_eq!(texts(&replies), vec![h.messages.launching(90)]);
}

#[tokio::test]
async fn test_shutdown_stops_running_sessions() {
    let mut h = harness().await;
    h.save_user(USER, "alice").await;
    h.press(USER, MenuLabel::Start).await;

    h.controller.shutdown().await;
    assert_eq!(h.launcher.stops(), 1);
    assert_eq!(h.controller.active_sessions(), 0);
}
