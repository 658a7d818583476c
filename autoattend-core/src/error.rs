//! Unified error handling system
//!
//! Structured error types shared by the store, the session worker and the bot,
//! with enough context to decide whether a failure is reported to the user,
//! retried, or only logged.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;
use thiserror::Error;
use tracing::{error, warn};

pub type AttendResult<T> = Result<T, AttendError>;

/// Error context providing additional information for debugging
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorContext {
    /// Unique error ID for correlating log lines
    pub error_id: String,
    /// Timestamp when error occurred
    pub timestamp: DateTime<Utc>,
    /// Component where error originated
    pub component: String,
    /// Operation being performed when error occurred
    pub operation: Option<String>,
    /// Additional metadata
    pub metadata: HashMap<String, String>,
    /// Recovery suggestions
    pub recovery_suggestions: Vec<String>,
}

impl ErrorContext {
    pub fn new(component: &str) -> Self {
        Self {
            error_id: uuid::Uuid::new_v4().to_string(),
            timestamp: Utc::now(),
            component: component.to_string(),
            operation: None,
            metadata: HashMap::new(),
            recovery_suggestions: Vec::new(),
        }
    }

    pub fn with_operation(mut self, operation: &str) -> Self {
        self.operation = Some(operation.to_string());
        self
    }

    pub fn with_metadata(mut self, key: &str, value: &str) -> Self {
        self.metadata.insert(key.to_string(), value.to_string());
        self
    }

    pub fn with_suggestion(mut self, suggestion: &str) -> Self {
        self.recovery_suggestions.push(suggestion.to_string());
        self
    }
}

/// Main error type for the attendance system
#[derive(Error, Debug)]
pub enum AttendError {
    /// An element or page condition was not observed within its bound
    #[error("Timed out waiting for {operation} after {duration_ms} ms")]
    Timeout {
        operation: String,
        duration_ms: u64,
        context: ErrorContext,
    },

    /// Outbound HTTP call failed
    #[error("Transport error: {message}")]
    Transport {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
        context: ErrorContext,
    },

    /// Free-text input could not be interpreted
    #[error("Validation error: {message}")]
    Validation {
        message: String,
        field: Option<String>,
        context: ErrorContext,
    },

    /// Caller is not allowed to perform the action
    #[error("Not authorized: {action}")]
    Authorization {
        action: String,
        context: ErrorContext,
    },

    /// WebDriver session or page interaction failed
    #[error("Browser error: {message}")]
    Browser {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
        context: ErrorContext,
    },

    #[error("Storage error: {message}")]
    Storage {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
        context: ErrorContext,
    },

    #[error("Configuration error: {message}")]
    Config {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
        context: ErrorContext,
    },

    #[error("Resource not found: {resource}")]
    NotFound {
        resource: String,
        context: ErrorContext,
    },

    #[error("Internal error: {message}")]
    Internal {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
        context: ErrorContext,
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl AttendError {
    /// Timeout raised by a bounded wait
    pub fn timeout(operation: &str, bound: Duration, component: &str) -> Self {
        AttendError::Timeout {
            operation: operation.to_string(),
            duration_ms: bound.as_millis() as u64,
            context: ErrorContext::new(component).with_operation(operation),
        }
    }

    /// Browser failure with an underlying cause
    pub fn browser<E>(message: impl Into<String>, source: E, component: &str) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        AttendError::Browser {
            message: message.into(),
            source: Some(Box::new(source)),
            context: ErrorContext::new(component),
        }
    }

    /// Storage failure with an underlying cause
    pub fn storage<E>(message: impl Into<String>, source: E, operation: &str) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        AttendError::Storage {
            message: message.into(),
            source: Some(Box::new(source)),
            context: ErrorContext::new("store").with_operation(operation),
        }
    }

    /// Get the error context
    pub fn context(&self) -> Option<&ErrorContext> {
        match self {
            AttendError::Timeout { context, .. } => Some(context),
            AttendError::Transport { context, .. } => Some(context),
            AttendError::Validation { context, .. } => Some(context),
            AttendError::Authorization { context, .. } => Some(context),
            AttendError::Browser { context, .. } => Some(context),
            AttendError::Storage { context, .. } => Some(context),
            AttendError::Config { context, .. } => Some(context),
            AttendError::NotFound { context, .. } => Some(context),
            AttendError::Internal { context, .. } => Some(context),
            _ => None,
        }
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, AttendError::Timeout { .. })
    }

    /// Whether another attempt at the same operation may succeed
    pub fn is_recoverable(&self) -> bool {
        match self {
            AttendError::Timeout { .. } => true,
            AttendError::Transport { .. } => true,
            AttendError::Browser { .. } => true,
            AttendError::Validation { .. } => false,
            AttendError::Authorization { .. } => false,
            AttendError::Config { .. } => false,
            AttendError::NotFound { .. } => false,
            _ => false,
        }
    }

    /// Log the error with appropriate level
    pub fn log(&self) {
        let error_id = self.context().map(|c| c.error_id.as_str());
        match self {
            AttendError::Timeout { .. }
            | AttendError::Transport { .. }
            | AttendError::Validation { .. }
            | AttendError::Authorization { .. } => {
                warn!(error_id = ?error_id, error = %self, "Recoverable error");
            }
            AttendError::Config { .. } => {
                error!(error_id = ?error_id, error = %self, "Configuration error");
            }
            _ => {
                error!(error_id = ?error_id, error = %self, "Error occurred");
            }
        }
    }
}

/// Convenience macros for creating errors with context
#[macro_export]
macro_rules! config_error {
    ($msg:expr) => {
        $crate::AttendError::Config {
            message: $msg.to_string(),
            source: None,
            context: $crate::ErrorContext::new("config")
                .with_suggestion("Check your configuration file and AUTOATTEND__* variables")
                .with_suggestion("Run 'autoattend-bot init-config' to write the defaults"),
        }
    };
}

#[macro_export]
macro_rules! validation_error {
    ($msg:expr, $field:expr, $component:expr) => {
        $crate::AttendError::Validation {
            message: $msg.to_string(),
            field: Some($field.to_string()),
            context: $crate::ErrorContext::new($component),
        }
    };
}

#[macro_export]
macro_rules! browser_error {
    ($msg:expr, $component:expr) => {
        $crate::AttendError::Browser {
            message: $msg.to_string(),
            source: None,
            context: $crate::ErrorContext::new($component),
        }
    };
}
