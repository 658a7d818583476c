//! Autoattend Store - persistent credential and access-request tables
//!
//! Two independently keyed SQLite tables behind small CRUD facades:
//! `users` (one stored portal login per identity) and `requests`
//! (credentials submitted by unknown identities, waiting for the operator).

pub mod credentials;
pub mod database;
pub mod requests;

pub use credentials::CredentialStore;
pub use database::Database;
pub use requests::{RequestDecision, RequestStore};
