use assistant_gateway::{
    CancelSignal, Message, MessageQuery, Role, Run, RunStatus, ThreadsGateway,
};
use session_store::SessionStore;

use crate::error::ConversationError;
use crate::poller::{PollClock, PollPolicy, RunPoller, SystemClock};

/// Fallback ids from configuration, consulted after the session store.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionDefaults {
    pub assistant_id: Option<String>,
    pub thread_id: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionOrigin {
    New,
    Continued,
}

/// One question and the assistant's answer to it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Exchange {
    pub thread_id: String,
    pub run_id: String,
    pub question: String,
    pub answer: String,
}

/// Thread and assistant the next message goes to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActiveSession {
    pub origin: SessionOrigin,
    pub thread_id: String,
    pub assistant_id: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionTurn {
    pub origin: SessionOrigin,
    pub exchange: Exchange,
}

/// Every message of a thread, oldest first.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transcript {
    pub thread_id: String,
    pub messages: Vec<Message>,
}

impl Transcript {
    /// Message texts in conversation order.
    pub fn texts(&self) -> impl Iterator<Item = &str> {
        self.messages.iter().map(|message| message.text.as_str())
    }
}

/// Drives threads, runs and the session store for one conversation at a time.
pub struct SessionManager<G, C = SystemClock> {
    gateway: G,
    store: SessionStore,
    policy: PollPolicy,
    defaults: SessionDefaults,
    clock: C,
    cancel: Option<CancelSignal>,
}

impl<G: ThreadsGateway> SessionManager<G, SystemClock> {
    pub fn new(
        gateway: G,
        store: SessionStore,
        policy: PollPolicy,
        defaults: SessionDefaults,
    ) -> Self {
        Self {
            gateway,
            store,
            policy,
            defaults,
            clock: SystemClock,
            cancel: None,
        }
    }
}

impl<G: ThreadsGateway, C: PollClock> SessionManager<G, C> {
    #[must_use]
    pub fn with_clock<T: PollClock>(self, clock: T) -> SessionManager<G, T> {
        SessionManager {
            gateway: self.gateway,
            store: self.store,
            policy: self.policy,
            defaults: self.defaults,
            clock,
            cancel: self.cancel,
        }
    }

    #[must_use]
    pub fn with_cancel_signal(mut self, cancel: CancelSignal) -> Self {
        self.cancel = Some(cancel);
        self
    }

    pub fn gateway(&self) -> &G {
        &self.gateway
    }

    pub fn store(&self) -> &SessionStore {
        &self.store
    }

    /// Thread to continue: `explicit`, then the store, then the configured default.
    ///
    /// Never touches the provider.
    pub fn resolve_thread(&self, explicit: Option<&str>) -> Result<String, ConversationError> {
        if let Some(thread_id) = non_blank(explicit) {
            return Ok(thread_id);
        }
        if let Some(thread_id) = self.store.session()?.thread_id {
            return Ok(thread_id);
        }
        non_blank(self.defaults.thread_id.as_deref()).ok_or(ConversationError::NoActiveThread)
    }

    /// Assistant for a run: `explicit`, then the store, then the configured default.
    pub fn resolve_assistant(&self, explicit: Option<&str>) -> Result<String, ConversationError> {
        if let Some(assistant_id) = non_blank(explicit) {
            return Ok(assistant_id);
        }
        if let Some(assistant_id) = self.store.session()?.assistant_id {
            return Ok(assistant_id);
        }
        non_blank(self.defaults.assistant_id.as_deref())
            .ok_or(ConversationError::MissingAssistant)
    }

    /// Backs up the store, opens a fresh thread, records it, then asks `text`.
    pub fn start_new_session(
        &self,
        assistant_id: Option<&str>,
        text: &str,
    ) -> Result<SessionTurn, ConversationError> {
        let session = self.open_new_session(assistant_id)?;
        self.ask(session, text)
    }

    /// Asks `text` on the active thread.
    pub fn continue_session(
        &self,
        assistant_id: Option<&str>,
        text: &str,
    ) -> Result<SessionTurn, ConversationError> {
        let session = self.active_session(assistant_id)?;
        self.ask(session, text)
    }

    /// Backs up the store, opens a fresh thread and records it as active.
    pub fn open_new_session(
        &self,
        assistant_id: Option<&str>,
    ) -> Result<ActiveSession, ConversationError> {
        let assistant_id = self.resolve_assistant(assistant_id)?;

        if let Some(backup) = self.store.backup()? {
            tracing::info!(backup = %backup.display(), "previous session backed up");
        }

        let thread_id = self.gateway.create_thread()?;
        self.store
            .record_session(&thread_id, Some(&assistant_id))?;
        tracing::info!(%thread_id, %assistant_id, "new session recorded");

        Ok(ActiveSession {
            origin: SessionOrigin::New,
            thread_id,
            assistant_id,
        })
    }

    /// The stored session, without touching the provider.
    pub fn active_session(
        &self,
        assistant_id: Option<&str>,
    ) -> Result<ActiveSession, ConversationError> {
        Ok(ActiveSession {
            origin: SessionOrigin::Continued,
            thread_id: self.resolve_thread(None)?,
            assistant_id: self.resolve_assistant(assistant_id)?,
        })
    }

    /// Asks `text` on an opened session.
    pub fn ask(
        &self,
        session: ActiveSession,
        text: &str,
    ) -> Result<SessionTurn, ConversationError> {
        let exchange = self.submit(&session.thread_id, &session.assistant_id, text)?;
        Ok(SessionTurn {
            origin: session.origin,
            exchange,
        })
    }

    /// Posts one user message, runs the assistant once and returns its reply.
    pub fn submit(
        &self,
        thread_id: &str,
        assistant_id: &str,
        text: &str,
    ) -> Result<Exchange, ConversationError> {
        let question = self.gateway.create_message(thread_id, Role::User, text)?;
        let run = self.gateway.create_run(thread_id, assistant_id)?;
        tracing::debug!(run_id = %run.id, status = %run.status, "run created");

        let run = RunPoller::new(&self.gateway, &self.clock, &self.policy)
            .with_cancel_signal(self.cancel.as_ref())
            .wait_for_run(run)?;
        self.ensure_completed(&run)?;

        let mut replies = self
            .gateway
            .list_messages(thread_id, &MessageQuery::ascending().after(&question.id))?;
        replies.sort_by_key(|message| message.created_at);
        let answer = replies
            .into_iter()
            .find(|message| message.role == Role::Assistant)
            .ok_or_else(|| ConversationError::EmptyResponse {
                run_id: run.id.clone(),
            })?;

        Ok(Exchange {
            thread_id: thread_id.to_string(),
            run_id: run.id,
            question: question.text,
            answer: answer.text,
        })
    }

    /// Full conversation of `thread_id`, or of the active thread.
    pub fn list_conversation(
        &self,
        thread_id: Option<&str>,
    ) -> Result<Transcript, ConversationError> {
        let thread_id = self.resolve_thread(thread_id)?;
        let mut messages = self
            .gateway
            .list_messages(&thread_id, &MessageQuery::ascending())?;
        messages.sort_by_key(|message| message.created_at);
        Ok(Transcript {
            thread_id,
            messages,
        })
    }

    fn ensure_completed(&self, run: &Run) -> Result<(), ConversationError> {
        match run.status {
            RunStatus::Completed => Ok(()),
            RunStatus::RequiresAction => {
                // An active run locks the thread against new messages.
                if let Err(error) = self.gateway.cancel_run(&run.thread_id, &run.id) {
                    tracing::warn!(run_id = %run.id, %error, "failed to cancel run awaiting action");
                }
                Err(ConversationError::RunRequiresAction {
                    run_id: run.id.clone(),
                })
            }
            status => Err(ConversationError::RunNotCompleted {
                run_id: run.id.clone(),
                status,
                last_error: run.last_error.clone(),
            }),
        }
    }
}

fn non_blank(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(str::to_string)
}
