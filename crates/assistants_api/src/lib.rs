//! Transport-only client primitives for the hosted Assistants API.
//!
//! This crate owns request building, response decoding and error parsing for
//! the threads, messages, runs, assistants and files endpoints. It performs
//! exactly one HTTP attempt per call; callers decide what is safe to repeat
//! using [`AssistantsApiError::is_retryable`].

pub mod client;
pub mod config;
pub mod error;
pub mod headers;
pub mod retry;
pub mod types;
pub mod url;

pub use client::AssistantsApiClient;
pub use config::AssistantsApiConfig;
pub use error::AssistantsApiError;
pub use reqwest::StatusCode;
pub use types::{
    AssistantObject, AssistantTool, CreateAssistantRequest, FileObject, ListPage, ListParams,
    MessageContent, MessageObject, RunObject, RunState, ThreadObject,
};
pub use url::{endpoint_url, segments_url};
