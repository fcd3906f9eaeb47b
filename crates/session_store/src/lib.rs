mod envfile;
mod error;
mod paths;
mod store;

pub use envfile::{EnvFile, EnvLine};
pub use error::SessionStoreError;
pub use paths::{backup_path, backup_timestamp, DEFAULT_STORE_FILE};
pub use store::{SessionRecord, SessionStore, ASSISTANT_KEY, THREAD_KEY};
