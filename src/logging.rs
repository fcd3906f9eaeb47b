//! Diagnostic output for the binaries.
//!
//! Logs go to stderr so stdout stays the command's result. `RUST_LOG` wins
//! when set; otherwise only warnings show, or everything from this workspace
//! at `debug` when the debug flag is on.

use tracing_subscriber::EnvFilter;

const WORKSPACE_TARGETS: [&str; 5] = [
    "openai_cli",
    "conversation",
    "session_store",
    "assistants_api",
    "assistant_gateway_openai",
];

pub fn default_directives(debug: bool) -> String {
    if !debug {
        return "warn".to_string();
    }
    let mut directives = vec!["warn".to_string()];
    directives.extend(WORKSPACE_TARGETS.iter().map(|target| format!("{target}=debug")));
    directives.join(",")
}

/// Installs the global subscriber. Safe to call more than once.
pub fn init(debug: bool) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directives(debug)));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(debug)
        .try_init();
}
