//! Conversation session manager: thread identity, message submission, run
//! polling and reply extraction over a [`assistant_gateway::ThreadsGateway`].

mod error;
mod manager;
mod poller;

pub use error::ConversationError;
pub use manager::{
    ActiveSession, Exchange, SessionDefaults, SessionManager, SessionOrigin, SessionTurn,
    Transcript,
};
pub use poller::{PollClock, PollPolicy, RunPoller, SystemClock};
