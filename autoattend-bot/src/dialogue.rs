//! Per-identity conversation state
//!
//! Each multi-step flow is a chain of `Dialogue` states holding only what
//! has been collected so far. `advance` is pure; the controller performs
//! the resulting `Action`.

use autoattend_core::{Identity, Messages, Secret};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum Dialogue {
    #[default]
    Idle,

    // Open registration: save credentials directly
    OnboardingUsername,
    OnboardingSecret { username: String },

    // Unknown identity asking the operator for access
    RequestUsername,
    RequestSecret { username: String },

    Duration,

    AddIdentity,
    AddUsername { identity: Identity },
    AddSecret { identity: Identity, username: String },

    UpdateIdentity,
    UpdateUsername { identity: Identity },
    UpdateSecret { identity: Identity, username: String },

    DeleteIdentity,
}

/// Work a completed flow asks the controller to do
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    SaveCredentials { username: String, secret: Secret },
    SubmitRequest { username: String, secret: Secret },
    SetDuration(u32),
    AddUser { identity: Identity, username: String, secret: Secret },
    UpdateUser { identity: Identity, username: String, secret: Secret },
    DeleteUser(Identity),
}

impl Action {
    pub fn is_admin(&self) -> bool {
        matches!(
            self,
            Action::AddUser { .. } | Action::UpdateUser { .. } | Action::DeleteUser(_)
        )
    }
}

/// Why an input was not accepted
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rejection {
    Empty,
    NotAPositiveNumber,
    NotAnIdentity,
}

impl Rejection {
    pub fn message(self, messages: &Messages) -> &'static str {
        match self {
            Rejection::Empty => messages.empty_input(),
            Rejection::NotAPositiveNumber => messages.enter_number(),
            Rejection::NotAnIdentity => messages.enter_valid_id(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Step {
    /// Move to the next state and show its prompt
    Next(Dialogue),
    /// Keep the current state and reprompt
    Reject(Rejection),
    /// Flow finished; return to `Idle`
    Complete(Action),
}

fn text_field(input: &str) -> Result<String, Rejection> {
    let value = input.trim();
    if value.is_empty() {
        Err(Rejection::Empty)
    } else {
        Ok(value.to_string())
    }
}

fn secret_field(input: &str) -> Result<Secret, Rejection> {
    if input.trim().is_empty() {
        Err(Rejection::Empty)
    } else {
        Ok(Secret::new(input))
    }
}

fn identity_field(input: &str) -> Result<Identity, Rejection> {
    input
        .trim()
        .parse::<Identity>()
        .map_err(|_| Rejection::NotAnIdentity)
}

fn duration_field(input: &str) -> Result<u32, Rejection> {
    match input.trim().parse::<u32>() {
        Ok(minutes) if minutes > 0 => Ok(minutes),
        _ => Err(Rejection::NotAPositiveNumber),
    }
}

impl Dialogue {
    pub fn is_idle(&self) -> bool {
        matches!(self, Dialogue::Idle)
    }

    /// Text asking for the input this state waits on
    pub fn prompt(&self, messages: &Messages) -> Option<&'static str> {
        let prompt = match self {
            Dialogue::Idle => return None,
            Dialogue::OnboardingUsername => messages.ask_username(),
            Dialogue::RequestUsername => messages.welcome_request_access(),
            Dialogue::OnboardingSecret { .. } | Dialogue::RequestSecret { .. } => {
                messages.ask_secret()
            }
            Dialogue::Duration => messages.ask_duration(),
            Dialogue::AddIdentity => messages.ask_user_id_to_add(),
            Dialogue::UpdateIdentity => messages.ask_user_id_to_update(),
            Dialogue::DeleteIdentity => messages.ask_user_id_to_delete(),
            Dialogue::AddUsername { .. } | Dialogue::UpdateUsername { .. } => {
                messages.ask_new_username()
            }
            Dialogue::AddSecret { .. } | Dialogue::UpdateSecret { .. } => {
                messages.ask_new_secret()
            }
        };
        Some(prompt)
    }

    /// Feed one free-text message into the current flow
    pub fn advance(&self, input: &str) -> Step {
        let step = match self {
            Dialogue::Idle => return Step::Next(Dialogue::Idle),

            Dialogue::OnboardingUsername => {
                text_field(input).map(|username| Step::Next(Dialogue::OnboardingSecret { username }))
            }
            Dialogue::OnboardingSecret { username } => secret_field(input).map(|secret| {
                Step::Complete(Action::SaveCredentials {
                    username: username.clone(),
                    secret,
                })
            }),

            Dialogue::RequestUsername => {
                text_field(input).map(|username| Step::Next(Dialogue::RequestSecret { username }))
            }
            Dialogue::RequestSecret { username } => secret_field(input).map(|secret| {
                Step::Complete(Action::SubmitRequest {
                    username: username.clone(),
                    secret,
                })
            }),

            Dialogue::Duration => {
                duration_field(input).map(|minutes| Step::Complete(Action::SetDuration(minutes)))
            }

            Dialogue::AddIdentity => identity_field(input)
                .map(|identity| Step::Next(Dialogue::AddUsername { identity })),
            Dialogue::AddUsername { identity } => text_field(input).map(|username| {
                Step::Next(Dialogue::AddSecret {
                    identity: *identity,
                    username,
                })
            }),
            Dialogue::AddSecret { identity, username } => secret_field(input).map(|secret| {
                Step::Complete(Action::AddUser {
                    identity: *identity,
                    username: username.clone(),
                    secret,
                })
            }),

            Dialogue::UpdateIdentity => identity_field(input)
                .map(|identity| Step::Next(Dialogue::UpdateUsername { identity })),
            Dialogue::UpdateUsername { identity } => text_field(input).map(|username| {
                Step::Next(Dialogue::UpdateSecret {
                    identity: *identity,
                    username,
                })
            }),
            Dialogue::UpdateSecret { identity, username } => secret_field(input).map(|secret| {
                Step::Complete(Action::UpdateUser {
                    identity: *identity,
                    username: username.clone(),
                    secret,
                })
            }),

            Dialogue::DeleteIdentity => {
                identity_field(input).map(|identity| Step::Complete(Action::DeleteUser(identity)))
            }
        };

        step.unwrap_or_else(Step::Reject)
    }
}
