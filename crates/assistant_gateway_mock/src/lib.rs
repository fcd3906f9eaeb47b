//! Deterministic scripted implementation of the shared `assistant_gateway` contract.
//!
//! This crate contains no transport logic. Run status sequences, assistant
//! replies and injected failures are scripted up front, and every call is
//! recorded so tests can assert on exactly which remote operations happened.

use std::collections::{HashMap, VecDeque};
use std::sync::{Mutex, MutexGuard};

use assistant_gateway::{
    GatewayError, ListOrder, Message, MessageQuery, Role, Run, RunStatus, ThreadsGateway,
};

/// First `created_at` value handed out by the mock clock.
pub const MOCK_EPOCH: i64 = 1_704_931_200;

/// Gateway operation names used for error injection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GatewayOp {
    CreateThread,
    CreateMessage,
    CreateRun,
    GetRun,
    CancelRun,
    ListMessages,
}

/// One recorded gateway invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GatewayCall {
    CreateThread,
    CreateMessage {
        thread_id: String,
        role: Role,
        content: String,
    },
    CreateRun {
        thread_id: String,
        assistant_id: String,
    },
    GetRun {
        thread_id: String,
        run_id: String,
    },
    CancelRun {
        thread_id: String,
        run_id: String,
    },
    ListMessages {
        thread_id: String,
        query: MessageQuery,
    },
}

impl GatewayCall {
    #[must_use]
    pub fn op(&self) -> GatewayOp {
        match self {
            Self::CreateThread => GatewayOp::CreateThread,
            Self::CreateMessage { .. } => GatewayOp::CreateMessage,
            Self::CreateRun { .. } => GatewayOp::CreateRun,
            Self::GetRun { .. } => GatewayOp::GetRun,
            Self::CancelRun { .. } => GatewayOp::CancelRun,
            Self::ListMessages { .. } => GatewayOp::ListMessages,
        }
    }
}

#[derive(Debug)]
struct RunState {
    run: Run,
    /// Statuses still to be reported by successive `get_run` calls.
    pending: VecDeque<RunStatus>,
    replied: bool,
}

#[derive(Debug, Default)]
struct MockState {
    threads: HashMap<String, Vec<Message>>,
    runs: HashMap<String, RunState>,
    run_scripts: VecDeque<Vec<RunStatus>>,
    replies: VecDeque<String>,
    failures: HashMap<GatewayOp, VecDeque<GatewayError>>,
    calls: Vec<GatewayCall>,
    next_thread: u64,
    next_message: u64,
    next_run: u64,
    clock: i64,
}

/// Scripted in-memory gateway used by conversation tests and local dry runs.
#[derive(Debug, Default)]
pub struct ScriptedGateway {
    state: Mutex<MockState>,
}

impl ScriptedGateway {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Queues the status sequence for the next created run.
    ///
    /// The first status is reported by `create_run`, each following status by
    /// one `get_run`. The last status repeats once the sequence is drained.
    #[must_use]
    pub fn with_run_script(self, statuses: impl IntoIterator<Item = RunStatus>) -> Self {
        self.push_run_script(statuses);
        self
    }

    /// Queues the assistant reply appended when the next run completes.
    #[must_use]
    pub fn with_reply(self, text: impl Into<String>) -> Self {
        lock_unpoisoned(&self.state).replies.push_back(text.into());
        self
    }

    /// Makes the next call of `op` fail with `error`.
    #[must_use]
    pub fn with_failure(self, op: GatewayOp, error: GatewayError) -> Self {
        lock_unpoisoned(&self.state)
            .failures
            .entry(op)
            .or_default()
            .push_back(error);
        self
    }

    pub fn push_run_script(&self, statuses: impl IntoIterator<Item = RunStatus>) {
        let script: Vec<RunStatus> = statuses.into_iter().collect();
        lock_unpoisoned(&self.state).run_scripts.push_back(script);
    }

    /// Registers a thread that already exists on the provider side.
    pub fn seed_thread(&self, thread_id: impl Into<String>) {
        lock_unpoisoned(&self.state)
            .threads
            .entry(thread_id.into())
            .or_default();
    }

    /// Inserts a message with an explicit creation time without recording a call.
    pub fn seed_message(
        &self,
        thread_id: &str,
        role: Role,
        text: impl Into<String>,
        created_at: i64,
    ) -> Message {
        let mut state = lock_unpoisoned(&self.state);
        state.next_message += 1;
        let message = Message {
            id: format!("msg_{}", state.next_message),
            thread_id: thread_id.to_string(),
            role,
            created_at,
            text: text.into(),
        };
        state
            .threads
            .entry(thread_id.to_string())
            .or_default()
            .push(message.clone());
        message
    }

    #[must_use]
    pub fn calls(&self) -> Vec<GatewayCall> {
        lock_unpoisoned(&self.state).calls.clone()
    }

    #[must_use]
    pub fn call_count(&self, op: GatewayOp) -> usize {
        lock_unpoisoned(&self.state)
            .calls
            .iter()
            .filter(|call| call.op() == op)
            .count()
    }

    /// Messages of a thread in insertion order.
    #[must_use]
    pub fn thread_messages(&self, thread_id: &str) -> Vec<Message> {
        lock_unpoisoned(&self.state)
            .threads
            .get(thread_id)
            .cloned()
            .unwrap_or_default()
    }

    fn begin(&self, call: GatewayCall) -> Result<MutexGuard<'_, MockState>, GatewayError> {
        let mut state = lock_unpoisoned(&self.state);
        let op = call.op();
        state.calls.push(call);
        if let Some(error) = state.failures.get_mut(&op).and_then(VecDeque::pop_front) {
            return Err(error);
        }
        Ok(state)
    }
}

impl MockState {
    fn tick(&mut self) -> i64 {
        self.clock += 1;
        MOCK_EPOCH + self.clock
    }

    fn thread_mut(&mut self, thread_id: &str) -> Result<&mut Vec<Message>, GatewayError> {
        self.threads
            .get_mut(thread_id)
            .ok_or_else(|| GatewayError::status(404, format!("No thread found with id '{thread_id}'.")))
    }

    fn settle_reply(&mut self, run_id: &str) {
        let Some(run_state) = self.runs.get(run_id) else {
            return;
        };
        if run_state.replied || run_state.run.status != RunStatus::Completed {
            return;
        }
        let thread_id = run_state.run.thread_id.clone();
        let Some(reply) = self.replies.pop_front() else {
            return;
        };

        let created_at = self.tick();
        self.next_message += 1;
        let message = Message {
            id: format!("msg_{}", self.next_message),
            thread_id: thread_id.clone(),
            role: Role::Assistant,
            created_at,
            text: reply,
        };
        self.threads.entry(thread_id).or_default().push(message);
        if let Some(run_state) = self.runs.get_mut(run_id) {
            run_state.replied = true;
        }
    }
}

impl ThreadsGateway for ScriptedGateway {
    fn create_thread(&self) -> Result<String, GatewayError> {
        let mut state = self.begin(GatewayCall::CreateThread)?;
        state.next_thread += 1;
        let thread_id = format!("thread_{}", state.next_thread);
        state.threads.insert(thread_id.clone(), Vec::new());
        Ok(thread_id)
    }

    fn create_message(
        &self,
        thread_id: &str,
        role: Role,
        content: &str,
    ) -> Result<Message, GatewayError> {
        let mut state = self.begin(GatewayCall::CreateMessage {
            thread_id: thread_id.to_string(),
            role,
            content: content.to_string(),
        })?;
        let created_at = state.tick();
        state.next_message += 1;
        let message = Message {
            id: format!("msg_{}", state.next_message),
            thread_id: thread_id.to_string(),
            role,
            created_at,
            text: content.to_string(),
        };
        state.thread_mut(thread_id)?.push(message.clone());
        Ok(message)
    }

    fn create_run(&self, thread_id: &str, assistant_id: &str) -> Result<Run, GatewayError> {
        let mut state = self.begin(GatewayCall::CreateRun {
            thread_id: thread_id.to_string(),
            assistant_id: assistant_id.to_string(),
        })?;
        state.thread_mut(thread_id)?;

        let mut pending: VecDeque<RunStatus> = state
            .run_scripts
            .pop_front()
            .unwrap_or_else(|| vec![RunStatus::Completed])
            .into();
        let status = pending.pop_front().unwrap_or(RunStatus::Completed);

        state.next_run += 1;
        let run = Run {
            id: format!("run_{}", state.next_run),
            thread_id: thread_id.to_string(),
            assistant_id: assistant_id.to_string(),
            status,
            last_error: failure_detail(status),
        };
        state.runs.insert(
            run.id.clone(),
            RunState {
                run: run.clone(),
                pending,
                replied: false,
            },
        );
        state.settle_reply(&run.id);
        Ok(run)
    }

    fn get_run(&self, thread_id: &str, run_id: &str) -> Result<Run, GatewayError> {
        let mut state = self.begin(GatewayCall::GetRun {
            thread_id: thread_id.to_string(),
            run_id: run_id.to_string(),
        })?;
        let run_state = state
            .runs
            .get_mut(run_id)
            .filter(|run_state| run_state.run.thread_id == thread_id)
            .ok_or_else(|| GatewayError::status(404, format!("No run found with id '{run_id}'.")))?;

        if let Some(next) = run_state.pending.pop_front() {
            run_state.run.status = next;
            run_state.run.last_error = failure_detail(next);
        }
        let run = run_state.run.clone();
        state.settle_reply(run_id);
        Ok(run)
    }

    fn cancel_run(&self, thread_id: &str, run_id: &str) -> Result<Run, GatewayError> {
        let mut state = self.begin(GatewayCall::CancelRun {
            thread_id: thread_id.to_string(),
            run_id: run_id.to_string(),
        })?;
        let run_state = state
            .runs
            .get_mut(run_id)
            .filter(|run_state| run_state.run.thread_id == thread_id)
            .ok_or_else(|| GatewayError::status(404, format!("No run found with id '{run_id}'.")))?;

        if run_state.run.status.is_terminal() && run_state.run.status != RunStatus::RequiresAction {
            return Err(GatewayError::status(
                400,
                format!(
                    "Cannot cancel run with status '{}'.",
                    run_state.run.status.as_str()
                ),
            ));
        }
        run_state.pending.clear();
        run_state.run.status = RunStatus::Cancelled;
        Ok(run_state.run.clone())
    }

    fn list_messages(
        &self,
        thread_id: &str,
        query: &MessageQuery,
    ) -> Result<Vec<Message>, GatewayError> {
        let mut state = self.begin(GatewayCall::ListMessages {
            thread_id: thread_id.to_string(),
            query: query.clone(),
        })?;
        let mut messages = state.thread_mut(thread_id)?.clone();

        messages.sort_by_key(|message| message.created_at);
        if query.order == ListOrder::Desc {
            messages.reverse();
        }

        if let Some(cursor) = query.after.as_deref() {
            let Some(position) = messages.iter().position(|message| message.id == cursor) else {
                return Err(GatewayError::status(
                    400,
                    format!("Invalid 'after' cursor '{cursor}'."),
                ));
            };
            messages.drain(..=position);
        }

        Ok(messages)
    }
}

fn failure_detail(status: RunStatus) -> Option<String> {
    match status {
        RunStatus::Failed => Some("server_error: scripted failure".to_string()),
        RunStatus::Expired => Some("run expired".to_string()),
        _ => None,
    }
}

fn lock_unpoisoned<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    match mutex.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}
