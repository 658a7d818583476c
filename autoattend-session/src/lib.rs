//! Autoattend Session - one user's attendance run
//!
//! Logs into the portal with a browser, clicks check-in controls for the
//! requested duration and reports progress to a chat target. The bot runs
//! each session in its own `autoattend-session` worker process.

pub mod attendance;
pub mod browser;
pub mod driver;
pub mod notifier;

pub use attendance::*;
pub use browser::*;
pub use driver::*;
pub use notifier::*;
