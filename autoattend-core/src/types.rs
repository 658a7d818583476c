//! Core data type definitions

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::{AttendError, ErrorContext};

/// Numeric chat/user identifier, the primary key across both stores
pub type Identity = i64;

/// Default session length for new credentials, in minutes
pub const DEFAULT_DURATION_MINUTES: u32 = 60;

/// Portal login secret. `Debug` and `Display` never print the value.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Secret(String);

impl Secret {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// Access the raw value; only for sending it to the portal or the store
    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Secret(***)")
    }
}

impl fmt::Display for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("***")
    }
}

impl From<&str> for Secret {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

/// Notification target: a numeric chat id or a public `@channel` name
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ChatId {
    Id(i64),
    Username(String),
}

impl FromStr for ChatId {
    type Err = AttendError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if let Ok(id) = s.parse::<i64>() {
            return Ok(ChatId::Id(id));
        }
        if s.starts_with('@') && s.len() > 1 {
            return Ok(ChatId::Username(s.to_string()));
        }
        Err(AttendError::Validation {
            message: format!("'{}' is neither a chat id nor an @username", s),
            field: Some("notify_target".to_string()),
            context: ErrorContext::new("types"),
        })
    }
}

impl ChatId {
    /// The numeric identity behind this target, if it has one
    pub fn as_identity(&self) -> Option<Identity> {
        match self {
            ChatId::Id(id) => Some(*id),
            ChatId::Username(_) => None,
        }
    }
}

impl fmt::Display for ChatId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChatId::Id(id) => write!(f, "{}", id),
            ChatId::Username(name) => f.write_str(name),
        }
    }
}

impl From<Identity> for ChatId {
    fn from(identity: Identity) -> Self {
        ChatId::Id(identity)
    }
}

/// Stored portal login for one identity
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserCredential {
    pub identity: Identity,
    pub username: String,
    pub secret: Secret,
    pub preferred_duration_minutes: u32,
}

impl UserCredential {
    pub fn new(identity: Identity, username: impl Into<String>, secret: Secret) -> Self {
        Self {
            identity,
            username: username.into(),
            secret,
            preferred_duration_minutes: DEFAULT_DURATION_MINUTES,
        }
    }

    pub fn with_duration(mut self, minutes: u32) -> Self {
        self.preferred_duration_minutes = minutes;
        self
    }
}

/// Lifecycle of an access request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RequestStatus {
    Pending,
    Approved,
    Rejected,
}

impl RequestStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RequestStatus::Pending => "pending",
            RequestStatus::Approved => "approved",
            RequestStatus::Rejected => "rejected",
        }
    }
}

impl fmt::Display for RequestStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RequestStatus {
    type Err = AttendError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(RequestStatus::Pending),
            "approved" => Ok(RequestStatus::Approved),
            "rejected" => Ok(RequestStatus::Rejected),
            other => Err(AttendError::Validation {
                message: format!("Unknown request status '{}'", other),
                field: Some("status".to_string()),
                context: ErrorContext::new("types"),
            }),
        }
    }
}

/// Credentials submitted by an unknown identity, waiting for the operator
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessRequest {
    pub request_id: i64,
    pub identity: Identity,
    pub username: String,
    pub secret: Secret,
    pub status: RequestStatus,
}

/// Everything a worker needs for one authenticate-then-poll run
#[derive(Debug, Clone)]
pub struct SessionSpec {
    pub identity: Identity,
    pub username: String,
    pub secret: Secret,
    pub duration_minutes: u32,
    pub notify_target: ChatId,
}

impl SessionSpec {
    pub fn from_credential(credential: &UserCredential) -> Self {
        Self {
            identity: credential.identity,
            username: credential.username.clone(),
            secret: credential.secret.clone(),
            duration_minutes: credential.preferred_duration_minutes,
            notify_target: ChatId::Id(credential.identity),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn secret_is_redacted() {
        let secret = Secret::new("hunter2");
        assert_eq!(format!("{:?}", secret), "Secret(***)");
        assert_eq!(secret.to_string(), "***");
        assert_eq!(secret.expose(), "hunter2");
    }

    #[test]
    fn chat_id_parsing() {
        assert_eq!("42".parse::<ChatId>().unwrap(), ChatId::Id(42));
        assert_eq!("-1001".parse::<ChatId>().unwrap(), ChatId::Id(-1001));
        assert_eq!(
            "@attendance".parse::<ChatId>().unwrap(),
            ChatId::Username("@attendance".to_string())
        );
        assert!("attendance".parse::<ChatId>().is_err());
    }

    #[test]
    fn chat_id_serializes_untagged() {
        let body = serde_json::json!({ "chat_id": ChatId::Id(7) });
        assert_eq!(body["chat_id"], 7);
        let body = serde_json::json!({ "chat_id": ChatId::Username("@c".into()) });
        assert_eq!(body["chat_id"], "@c");
    }

    #[test]
    fn session_spec_targets_owner() {
        let credential = UserCredential::new(5, "alice", Secret::new("pw1")).with_duration(1);
        let session = SessionSpec::from_credential(&credential);
        assert_eq!(session.notify_target, ChatId::Id(5));
        assert_eq!(session.duration_minutes, 1);
    }
}
