//! Autoattend Bot - Telegram front end
//!
//! Manages stored portal logins and access requests through a chat
//! conversation, and starts or stops one session worker per user.

pub mod controller;
pub mod dialogue;
pub mod dispatcher;
pub mod keyboard;
pub mod registry;
pub mod telegram;

pub use controller::{CallbackAnswer, Controller, Reply};
pub use dialogue::{Action, Dialogue, Rejection, Step};
pub use dispatcher::Dispatcher;
pub use keyboard::{CallbackAction, Keyboard};
pub use registry::{ProcessLauncher, SessionHandle, SessionLauncher, SessionRegistry};
pub use telegram::TelegramClient;
