//! Persistent conversations with hosted assistants from the command line.
//!
//! The binaries are thin: `openai-cli` drives [`chat`] and `openai-asst`
//! drives [`provision`]. Both read [`config::AppConfig`] once at startup and
//! keep session state in the `openai.env` store owned by `session_store`.

pub mod chat;
pub mod config;
pub mod format;
pub mod logging;
pub mod provision;

pub use config::{AppConfig, ConfigError};
