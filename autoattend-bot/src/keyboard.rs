//! Reply keyboards and inline buttons

use autoattend_core::{MenuLabel, Messages};

use crate::telegram::{
    InlineKeyboardButton, InlineKeyboardMarkup, KeyboardButton, ReplyKeyboardMarkup, ReplyMarkup,
};

/// Keyboard attached to a reply, independent of the chat transport
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Keyboard {
    /// Main menu; the operator also sees the admin buttons
    Main { admin: bool },
    /// Only the cancel button, shown while a session runs or a flow waits
    Cancel,
    /// Approve / reject buttons for one access request
    RequestDecision(i64),
}

pub const APPROVE_PREFIX: &str = "approve_";
pub const REJECT_PREFIX: &str = "reject_";

/// Decision encoded in an inline button's callback data
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallbackAction {
    Approve(i64),
    Reject(i64),
}

impl CallbackAction {
    pub fn parse(data: &str) -> Option<Self> {
        if let Some(id) = data.strip_prefix(APPROVE_PREFIX) {
            return id.parse().ok().map(CallbackAction::Approve);
        }
        if let Some(id) = data.strip_prefix(REJECT_PREFIX) {
            return id.parse().ok().map(CallbackAction::Reject);
        }
        None
    }
}

fn reply_keyboard(labels: &[MenuLabel], messages: &Messages) -> ReplyMarkup {
    ReplyMarkup::Keyboard(ReplyKeyboardMarkup {
        keyboard: labels
            .iter()
            .map(|label| {
                vec![KeyboardButton {
                    text: messages.label(*label).to_string(),
                }]
            })
            .collect(),
        resize_keyboard: true,
    })
}

impl Keyboard {
    pub fn render(&self, messages: &Messages) -> ReplyMarkup {
        match self {
            Keyboard::Main { admin } => {
                let labels: Vec<MenuLabel> = MenuLabel::ALL
                    .into_iter()
                    .filter(|label| *label != MenuLabel::Cancel)
                    .filter(|label| *admin || !label.is_admin())
                    .collect();
                reply_keyboard(&labels, messages)
            }
            Keyboard::Cancel => reply_keyboard(&[MenuLabel::Cancel], messages),
            Keyboard::RequestDecision(request_id) => {
                ReplyMarkup::Inline(InlineKeyboardMarkup {
                    inline_keyboard: vec![vec![
                        InlineKeyboardButton {
                            text: messages.approve_button().to_string(),
                            callback_data: format!("{}{}", APPROVE_PREFIX, request_id),
                        },
                        InlineKeyboardButton {
                            text: messages.reject_button().to_string(),
                            callback_data: format!("{}{}", REJECT_PREFIX, request_id),
                        },
                    ]],
                })
            }
        }
    }
}
