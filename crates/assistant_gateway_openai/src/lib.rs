//! Assistants API-backed implementation of the shared `assistant_gateway` contract.
//!
//! This adapter drives the async `assistants_api` transport from blocking
//! callers and translates wire objects into provider-neutral threads, messages
//! and runs.

use std::future::Future;

use assistant_gateway::{
    GatewayError, GatewayErrorKind, Message, MessageQuery, Role, Run, RunStatus, ThreadsGateway,
};
use assistants_api::{
    AssistantsApiClient, AssistantsApiConfig, AssistantsApiError, MessageObject, RunObject,
    RunState,
};
use tokio::runtime::Runtime;

/// `ThreadsGateway` adapter backed by `assistants_api` transport primitives.
pub struct OpenAiGateway {
    client: AssistantsApiClient,
    runtime: Runtime,
}

impl OpenAiGateway {
    /// Creates a gateway using real HTTP transport.
    pub fn new(config: AssistantsApiConfig) -> Result<Self, GatewayError> {
        let client = AssistantsApiClient::new(config).map_err(map_api_error)?;
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .map_err(|error| {
                GatewayError::new(
                    GatewayErrorKind::Other,
                    format!("failed to initialize tokio runtime: {error}"),
                )
            })?;
        Ok(Self { client, runtime })
    }

    /// Underlying transport client, for provisioning calls outside the gateway contract.
    pub fn client(&self) -> &AssistantsApiClient {
        &self.client
    }

    /// Blocks on one transport future.
    pub fn block_on<F: Future>(&self, future: F) -> F::Output {
        self.runtime.block_on(future)
    }

    fn call<T, F>(&self, future: F) -> Result<T, GatewayError>
    where
        F: Future<Output = Result<T, AssistantsApiError>>,
    {
        self.runtime.block_on(future).map_err(map_api_error)
    }
}

impl ThreadsGateway for OpenAiGateway {
    fn create_thread(&self) -> Result<String, GatewayError> {
        let thread = self.call(self.client.create_thread())?;
        tracing::debug!(thread_id = %thread.id, "thread created");
        Ok(thread.id)
    }

    fn create_message(
        &self,
        thread_id: &str,
        role: Role,
        content: &str,
    ) -> Result<Message, GatewayError> {
        let message = self.call(
            self.client
                .create_message(thread_id, role.as_str(), content),
        )?;
        map_message(message)
    }

    fn create_run(&self, thread_id: &str, assistant_id: &str) -> Result<Run, GatewayError> {
        let run = self.call(self.client.create_run(thread_id, assistant_id))?;
        Ok(map_run(run))
    }

    fn get_run(&self, thread_id: &str, run_id: &str) -> Result<Run, GatewayError> {
        let run = self.call(self.client.retrieve_run(thread_id, run_id))?;
        Ok(map_run(run))
    }

    fn cancel_run(&self, thread_id: &str, run_id: &str) -> Result<Run, GatewayError> {
        let run = self.call(self.client.cancel_run(thread_id, run_id))?;
        Ok(map_run(run))
    }

    fn list_messages(
        &self,
        thread_id: &str,
        query: &MessageQuery,
    ) -> Result<Vec<Message>, GatewayError> {
        let messages = self.call(self.client.list_all_messages(
            thread_id,
            query.order.as_str(),
            query.after.as_deref(),
        ))?;
        messages.into_iter().map(map_message).collect()
    }
}

fn map_message(message: MessageObject) -> Result<Message, GatewayError> {
    let role = match message.role.as_str() {
        "user" => Role::User,
        "assistant" => Role::Assistant,
        other => {
            return Err(GatewayError::new(
                GatewayErrorKind::Decode,
                format!("message {} has unsupported role '{other}'", message.id),
            ))
        }
    };
    let text = message.first_text().unwrap_or_default().to_string();

    Ok(Message {
        id: message.id,
        thread_id: message.thread_id,
        role,
        created_at: message.created_at,
        text,
    })
}

fn map_run(run: RunObject) -> Run {
    let last_error = run.error_summary().or_else(|| match run.status {
        RunState::Incomplete => Some("run ended with status 'incomplete'".to_string()),
        _ => None,
    });

    Run {
        status: map_run_state(run.status),
        id: run.id,
        thread_id: run.thread_id,
        assistant_id: run.assistant_id,
        last_error,
    }
}

fn map_run_state(state: RunState) -> RunStatus {
    match state {
        RunState::Queued => RunStatus::Queued,
        // Still moving toward `cancelled`; keep polling.
        RunState::InProgress | RunState::Cancelling => RunStatus::InProgress,
        RunState::RequiresAction => RunStatus::RequiresAction,
        RunState::Cancelled => RunStatus::Cancelled,
        RunState::Failed => RunStatus::Failed,
        RunState::Completed => RunStatus::Completed,
        RunState::Expired => RunStatus::Expired,
        RunState::Incomplete | RunState::Unknown => RunStatus::Unknown,
    }
}

fn map_api_error(error: AssistantsApiError) -> GatewayError {
    let retryable = error.is_retryable();
    match &error {
        AssistantsApiError::Status(status, message) => {
            GatewayError::status(status.as_u16(), message.clone()).with_retryable(retryable)
        }
        AssistantsApiError::Request(inner) if inner.is_decode() => {
            GatewayError::new(GatewayErrorKind::Decode, error.to_string())
        }
        AssistantsApiError::Request(_) => {
            GatewayError::transport(error.to_string()).with_retryable(retryable)
        }
        AssistantsApiError::Serde(_) => {
            GatewayError::new(GatewayErrorKind::Decode, error.to_string())
        }
        _ => GatewayError::new(GatewayErrorKind::Other, error.to_string()),
    }
}
