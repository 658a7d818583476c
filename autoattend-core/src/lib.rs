//! Autoattend Core - shared types, errors, configuration and logging
//!
//! Used by the credential store, the per-user session worker and the chat bot.

pub mod async_utils;
pub mod config;
pub mod error;
pub mod logging;
pub mod messages;
pub mod traits;
pub mod types;

pub use async_utils::*;
pub use config::*;
pub use error::*;
pub use logging::*;
pub use messages::*;
pub use traits::*;
pub use types::*;

// Re-export commonly used external types
pub use async_trait::async_trait;
pub use tracing;
