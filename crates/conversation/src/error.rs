use std::time::Duration;

use assistant_gateway::{GatewayError, RunStatus};
use session_store::SessionStoreError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConversationError {
    #[error("no active conversation thread; start one with a new session")]
    NoActiveThread,

    #[error("no assistant id given; pass one explicitly or set ASSISTANT_ID")]
    MissingAssistant,

    #[error(transparent)]
    Store(#[from] SessionStoreError),

    #[error(transparent)]
    Gateway(#[from] GatewayError),

    #[error("run {run_id} ended with status '{status}'{}", detail_suffix(.last_error))]
    RunNotCompleted {
        run_id: String,
        status: RunStatus,
        last_error: Option<String>,
    },

    #[error("run {run_id} requires tool outputs, which this client does not provide; the run was cancelled")]
    RunRequiresAction { run_id: String },

    #[error("run {run_id} completed without an assistant reply")]
    EmptyResponse { run_id: String },

    #[error("run {run_id} still '{last_status}' after waiting {}s", .waited.as_secs())]
    PollTimeout {
        run_id: String,
        last_status: RunStatus,
        waited: Duration,
    },

    #[error("waiting for run {run_id} was cancelled")]
    Cancelled { run_id: String },
}

fn detail_suffix(last_error: &Option<String>) -> String {
    match last_error {
        Some(detail) => format!(": {detail}"),
        None => String::new(),
    }
}
