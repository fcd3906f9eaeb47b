//! Startup configuration from the process environment, the session store and a `.env` file.

use std::env;
use std::path::Path;
use std::time::Duration;

use assistants_api::url::DEFAULT_BASE_URL;
use assistants_api::AssistantsApiConfig;
use conversation::{PollPolicy, SessionDefaults};
use session_store::{EnvFile, SessionStore, SessionStoreError};
use thiserror::Error;

pub const DOTENV_FILE: &str = ".env";

pub const API_KEY_VAR: &str = "OPENAI_API_KEY";
pub const BASE_URL_VAR: &str = "OPENAI_BASE_URL";
pub const ORGANIZATION_VAR: &str = "OPENAI_ORG_ID";
pub const PROJECT_VAR: &str = "OPENAI_PROJECT_ID";
pub const TIMEOUT_VAR: &str = "OPENAI_TIMEOUT_SEC";
pub const RUN_SLEEP_VAR: &str = "GPT_RUN_SLEEP";
pub const RUN_TIMEOUT_VAR: &str = "GPT_RUN_TIMEOUT";
pub const ASSISTANT_VAR: &str = "ASSISTANT_ID";
pub const THREAD_VAR: &str = "GPT_THREAD";
pub const DEBUG_VAR: &str = "DEBUG";
pub const INSTRUCTION_VAR: &str = "ASST_INSTRUCTION";
pub const CODE_INTERPRETER_VAR: &str = "ASST_CODE_INTERPRETER";
pub const RETRIEVAL_VAR: &str = "ASST_RETRIEVAL";

const DEFAULT_TIMEOUT_SECS: u64 = 60;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{key} must be a whole number of seconds greater than zero, got '{value}'")]
    InvalidSeconds { key: &'static str, value: String },

    #[error("{API_KEY_VAR} is not set; add it to the environment or {DOTENV_FILE}")]
    MissingApiKey,

    #[error("failed to read configuration file: {0}")]
    Dotenv(#[from] SessionStoreError),
}

/// Everything the binaries need, resolved once at startup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppConfig {
    pub api_key: Option<String>,
    pub base_url: String,
    pub organization: Option<String>,
    pub project: Option<String>,
    pub request_timeout: Duration,
    pub run_sleep: Duration,
    pub run_timeout: Duration,
    pub assistant_id: Option<String>,
    pub thread_id: Option<String>,
    pub debug: bool,
    pub assistant_instruction: Option<String>,
    pub code_interpreter: bool,
    pub retrieval: bool,
}

impl AppConfig {
    /// Reads the process environment first, then the session store, then
    /// `dotenv_path`. Missing files contribute nothing.
    pub fn load(store_path: &Path, dotenv_path: &Path) -> Result<Self, ConfigError> {
        let store = SessionStore::open(store_path).load()?;
        let dotenv = SessionStore::open(dotenv_path).load()?;
        Self::from_lookup(|key| {
            env::var(key)
                .ok()
                .or_else(|| lookup_file(&store, key))
                .or_else(|| lookup_file(&dotenv, key))
        })
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let value = |key: &str| {
            lookup(key)
                .map(|value| value.trim().to_string())
                .filter(|value| !value.is_empty())
        };
        let poll_defaults = PollPolicy::default();

        Ok(Self {
            api_key: value(API_KEY_VAR),
            base_url: value(BASE_URL_VAR).unwrap_or_else(|| DEFAULT_BASE_URL.to_string()),
            organization: value(ORGANIZATION_VAR),
            project: value(PROJECT_VAR),
            request_timeout: seconds(
                TIMEOUT_VAR,
                value(TIMEOUT_VAR),
                Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            )?,
            run_sleep: seconds(RUN_SLEEP_VAR, value(RUN_SLEEP_VAR), poll_defaults.interval)?,
            run_timeout: seconds(RUN_TIMEOUT_VAR, value(RUN_TIMEOUT_VAR), poll_defaults.max_wait)?,
            assistant_id: value(ASSISTANT_VAR),
            thread_id: value(THREAD_VAR),
            debug: value(DEBUG_VAR).is_some_and(|flag| is_truthy(&flag)),
            assistant_instruction: value(INSTRUCTION_VAR),
            code_interpreter: value(CODE_INTERPRETER_VAR).map_or(true, |flag| is_truthy(&flag)),
            retrieval: value(RETRIEVAL_VAR).is_some_and(|flag| is_truthy(&flag)),
        })
    }

    pub fn api_config(&self) -> Result<AssistantsApiConfig, ConfigError> {
        let api_key = self.api_key.as_deref().ok_or(ConfigError::MissingApiKey)?;
        let mut config = AssistantsApiConfig::new(api_key)
            .with_base_url(self.base_url.clone())
            .with_timeout(self.request_timeout);
        if let Some(organization) = &self.organization {
            config = config.with_organization(organization.clone());
        }
        if let Some(project) = &self.project {
            config = config.with_project(project.clone());
        }
        Ok(config)
    }

    pub fn poll_policy(&self) -> PollPolicy {
        PollPolicy {
            interval: self.run_sleep,
            max_wait: self.run_timeout,
            ..PollPolicy::default()
        }
    }

    pub fn session_defaults(&self) -> SessionDefaults {
        SessionDefaults {
            assistant_id: self.assistant_id.clone(),
            thread_id: self.thread_id.clone(),
        }
    }
}

/// `true`, `1`, `t`, `y`, `yes`, `yeah` and `yup`, in any case.
pub fn is_truthy(value: &str) -> bool {
    matches!(
        value.trim().to_ascii_lowercase().as_str(),
        "true" | "1" | "t" | "y" | "yes" | "yeah" | "yup"
    )
}

fn lookup_file(file: &EnvFile, key: &str) -> Option<String> {
    file.get(key).map(str::to_string)
}

fn seconds(
    key: &'static str,
    raw: Option<String>,
    default: Duration,
) -> Result<Duration, ConfigError> {
    let Some(raw) = raw else {
        return Ok(default);
    };
    match raw.parse::<u64>() {
        Ok(secs) if secs > 0 => Ok(Duration::from_secs(secs)),
        _ => Err(ConfigError::InvalidSeconds { key, value: raw }),
    }
}
