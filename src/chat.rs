//! `openai-cli` commands: chat on the active thread and list its messages.

use std::io::Write;
use std::path::Path;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;

use anyhow::Context;
use assistant_gateway::{CancelSignal, ThreadsGateway};
use assistant_gateway_openai::OpenAiGateway;
use conversation::{PollClock, SessionManager, SessionOrigin, SessionTurn, Transcript};
use session_store::SessionStore;

use crate::config::AppConfig;

/// Builds the manager that drives the hosted API for one invocation.
pub fn session_manager(
    config: &AppConfig,
    store_path: &Path,
) -> anyhow::Result<SessionManager<OpenAiGateway>> {
    let gateway = OpenAiGateway::new(config.api_config()?)?;
    Ok(SessionManager::new(
        gateway,
        SessionStore::open(store_path),
        config.poll_policy(),
        config.session_defaults(),
    ))
}

/// Turns the first Ctrl-C into a cancel request observed while waiting on a
/// run. A second Ctrl-C exits the process with status 1.
pub fn install_interrupt_flag() -> anyhow::Result<CancelSignal> {
    let flag: CancelSignal = Arc::new(AtomicBool::new(false));
    // The shutdown hook must run before the flag is set on the same signal.
    signal_hook::flag::register_conditional_shutdown(
        signal_hook::consts::SIGINT,
        1,
        Arc::clone(&flag),
    )
    .context("installing Ctrl-C handler")?;
    signal_hook::flag::register(signal_hook::consts::SIGINT, Arc::clone(&flag))
        .context("installing Ctrl-C handler")?;
    Ok(flag)
}

/// Prints the whole thread, 1-indexed and oldest first.
pub fn list<G, C, W>(
    manager: &SessionManager<G, C>,
    thread_id: Option<&str>,
    out: &mut W,
) -> anyhow::Result<Transcript>
where
    G: ThreadsGateway,
    C: PollClock,
    W: Write,
{
    let transcript = manager.list_conversation(thread_id)?;
    writeln!(out, "Full conversation in {}", transcript.thread_id)?;
    for (index, text) in transcript.texts().enumerate() {
        writeln!(out, "{}: {text}", index + 1)?;
    }
    Ok(transcript)
}

/// Asks `message` on a new or the active thread and prints the exchange.
pub fn chat<G, C, W>(
    manager: &SessionManager<G, C>,
    message: &str,
    new_thread: bool,
    assistant_id: Option<&str>,
    out: &mut W,
) -> anyhow::Result<SessionTurn>
where
    G: ThreadsGateway,
    C: PollClock,
    W: Write,
{
    let session = if new_thread {
        manager.open_new_session(assistant_id)?
    } else {
        manager.active_session(assistant_id)?
    };

    let lead = match session.origin {
        SessionOrigin::New => "New",
        SessionOrigin::Continued => "Continuing",
    };
    writeln!(out, "{lead} chat conversation with {}", session.thread_id)?;
    out.flush()?;

    let turn = manager.ask(session, message)?;
    writeln!(out, "question: {}", turn.exchange.question)?;
    writeln!(out, "answer: {}", turn.exchange.answer)?;
    Ok(turn)
}
