//! Minimal provider-agnostic contract for thread-based assistant conversations.
//!
//! This crate defines only the shared thread/message/run types and the gateway
//! trait the conversation layer drives. It excludes transport details, wire
//! payloads, and polling or retry policy.

use std::fmt;
use std::sync::{atomic::AtomicBool, Arc};

use serde::{Deserialize, Serialize};

/// Shared cancellation flag observed while waiting on a run.
pub type CancelSignal = Arc<AtomicBool>;

/// Author of a thread message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    User,
    Assistant,
}

impl Role {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Assistant => "assistant",
        }
    }
}

/// Provider-reported lifecycle state of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    Queued,
    InProgress,
    Completed,
    Failed,
    Cancelled,
    Expired,
    RequiresAction,
    #[serde(other)]
    Unknown,
}

impl RunStatus {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Queued => "queued",
            Self::InProgress => "in_progress",
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::Cancelled => "cancelled",
            Self::Expired => "expired",
            Self::RequiresAction => "requires_action",
            Self::Unknown => "unknown",
        }
    }

    /// Returns true when polling should continue.
    #[must_use]
    pub fn is_pending(self) -> bool {
        matches!(self, Self::Queued | Self::InProgress)
    }

    /// Returns true when no further transition happens without a new run.
    #[must_use]
    pub fn is_terminal(self) -> bool {
        !self.is_pending()
    }
}

impl fmt::Display for RunStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One turn in a thread.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    pub id: String,
    pub thread_id: String,
    pub role: Role,
    /// Provider creation time in epoch seconds.
    pub created_at: i64,
    pub text: String,
}

/// One assistant computation attempt against a thread.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Run {
    pub id: String,
    pub thread_id: String,
    pub assistant_id: String,
    pub status: RunStatus,
    pub last_error: Option<String>,
}

/// Listing direction by creation time.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ListOrder {
    Asc,
    #[default]
    Desc,
}

impl ListOrder {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Asc => "asc",
            Self::Desc => "desc",
        }
    }
}

/// Message listing parameters.
///
/// `after` is a message id cursor; only messages positioned after it in the
/// requested order are returned.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MessageQuery {
    pub order: ListOrder,
    pub after: Option<String>,
}

impl MessageQuery {
    #[must_use]
    pub fn ascending() -> Self {
        Self {
            order: ListOrder::Asc,
            after: None,
        }
    }

    #[must_use]
    pub fn after(mut self, message_id: impl Into<String>) -> Self {
        self.after = Some(message_id.into());
        self
    }
}

/// Failure category for a gateway call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GatewayErrorKind {
    /// Connection, DNS, TLS or timeout failures before a response arrived.
    Transport,
    /// The provider answered with a non-success HTTP status.
    Status { code: u16 },
    /// The provider answered but the payload could not be decoded.
    Decode,
    Other,
}

/// Error returned by a gateway call, propagated unchanged to callers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GatewayError {
    kind: GatewayErrorKind,
    message: String,
    retryable: bool,
}

impl GatewayError {
    #[must_use]
    pub fn new(kind: GatewayErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            retryable: false,
        }
    }

    #[must_use]
    pub fn transport(message: impl Into<String>) -> Self {
        Self::new(GatewayErrorKind::Transport, message).with_retryable(true)
    }

    #[must_use]
    pub fn status(code: u16, message: impl Into<String>) -> Self {
        Self::new(GatewayErrorKind::Status { code }, message)
    }

    /// Marks whether repeating the same idempotent read may succeed.
    #[must_use]
    pub fn with_retryable(mut self, retryable: bool) -> Self {
        self.retryable = retryable;
        self
    }

    #[must_use]
    pub fn kind(&self) -> &GatewayErrorKind {
        &self.kind
    }

    #[must_use]
    pub fn message(&self) -> &str {
        &self.message
    }

    #[must_use]
    pub fn is_retryable(&self) -> bool {
        self.retryable
    }
}

impl fmt::Display for GatewayError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind {
            GatewayErrorKind::Status { code } => write!(f, "HTTP {code}: {}", self.message),
            _ => f.write_str(&self.message),
        }
    }
}

impl std::error::Error for GatewayError {}

/// Remote thread/run operations required by the conversation layer.
///
/// Every call is a blocking remote request. Implementations must not retry
/// on their own; retry policy belongs to callers.
pub trait ThreadsGateway {
    /// Creates an empty thread and returns its id.
    fn create_thread(&self) -> Result<String, GatewayError>;

    /// Appends a message to a thread.
    fn create_message(
        &self,
        thread_id: &str,
        role: Role,
        content: &str,
    ) -> Result<Message, GatewayError>;

    /// Starts a run of `assistant_id` over the thread.
    fn create_run(&self, thread_id: &str, assistant_id: &str) -> Result<Run, GatewayError>;

    /// Re-fetches a run. Idempotent.
    fn get_run(&self, thread_id: &str, run_id: &str) -> Result<Run, GatewayError>;

    /// Asks the provider to cancel a run that has not reached a terminal status.
    fn cancel_run(&self, thread_id: &str, run_id: &str) -> Result<Run, GatewayError>;

    /// Lists thread messages in the requested order, starting after the cursor.
    fn list_messages(
        &self,
        thread_id: &str,
        query: &MessageQuery,
    ) -> Result<Vec<Message>, GatewayError>;
}

impl<T: ThreadsGateway + ?Sized> ThreadsGateway for &T {
    fn create_thread(&self) -> Result<String, GatewayError> {
        (**self).create_thread()
    }

    fn create_message(
        &self,
        thread_id: &str,
        role: Role,
        content: &str,
    ) -> Result<Message, GatewayError> {
        (**self).create_message(thread_id, role, content)
    }

    fn create_run(&self, thread_id: &str, assistant_id: &str) -> Result<Run, GatewayError> {
        (**self).create_run(thread_id, assistant_id)
    }

    fn get_run(&self, thread_id: &str, run_id: &str) -> Result<Run, GatewayError> {
        (**self).get_run(thread_id, run_id)
    }

    fn cancel_run(&self, thread_id: &str, run_id: &str) -> Result<Run, GatewayError> {
        (**self).cancel_run(thread_id, run_id)
    }

    fn list_messages(
        &self,
        thread_id: &str,
        query: &MessageQuery,
    ) -> Result<Vec<Message>, GatewayError> {
        (**self).list_messages(thread_id, query)
    }
}

impl<T: ThreadsGateway + ?Sized> ThreadsGateway for Box<T> {
    fn create_thread(&self) -> Result<String, GatewayError> {
        (**self).create_thread()
    }

    fn create_message(
        &self,
        thread_id: &str,
        role: Role,
        content: &str,
    ) -> Result<Message, GatewayError> {
        (**self).create_message(thread_id, role, content)
    }

    fn create_run(&self, thread_id: &str, assistant_id: &str) -> Result<Run, GatewayError> {
        (**self).create_run(thread_id, assistant_id)
    }

    fn get_run(&self, thread_id: &str, run_id: &str) -> Result<Run, GatewayError> {
        (**self).get_run(thread_id, run_id)
    }

    fn cancel_run(&self, thread_id: &str, run_id: &str) -> Result<Run, GatewayError> {
        (**self).cancel_run(thread_id, run_id)
    }

    fn list_messages(
        &self,
        thread_id: &str,
        query: &MessageQuery,
    ) -> Result<Vec<Message>, GatewayError> {
        (**self).list_messages(thread_id, query)
    }
}
