use std::collections::BTreeMap;

use crate::config::AssistantsApiConfig;
use crate::error::AssistantsApiError;

pub const HEADER_AUTHORIZATION: &str = "authorization";
pub const HEADER_OPENAI_BETA: &str = "openai-beta";
pub const HEADER_ORGANIZATION: &str = "openai-organization";
pub const HEADER_PROJECT: &str = "openai-project";
pub const HEADER_ACCEPT: &str = "accept";
pub const HEADER_USER_AGENT: &str = "user-agent";

/// Build a deterministic header map for Assistants API requests.
///
/// `content-type` is left to the request body encoder so JSON and multipart
/// requests can share the same map.
pub fn build_headers(
    config: &AssistantsApiConfig,
    user_agent: Option<&str>,
) -> Result<BTreeMap<String, String>, AssistantsApiError> {
    let api_key = config.api_key.trim();
    if api_key.is_empty() {
        return Err(AssistantsApiError::MissingApiKey);
    }

    let mut headers = BTreeMap::new();
    headers.insert(HEADER_AUTHORIZATION.to_owned(), format!("Bearer {api_key}"));
    if let Some(beta) = sanitize_nonempty(&config.beta) {
        headers.insert(HEADER_OPENAI_BETA.to_owned(), beta);
    }
    if let Some(organization) = config.organization.as_deref().and_then(sanitize_nonempty) {
        headers.insert(HEADER_ORGANIZATION.to_owned(), organization);
    }
    if let Some(project) = config.project.as_deref().and_then(sanitize_nonempty) {
        headers.insert(HEADER_PROJECT.to_owned(), project);
    }
    headers.insert(HEADER_ACCEPT.to_owned(), "application/json".to_owned());

    let ua = match (user_agent, config.user_agent.as_deref()) {
        (Some(explicit), _) if !explicit.trim().is_empty() => explicit.trim().to_owned(),
        (None, Some(explicit)) if !explicit.trim().is_empty() => explicit.trim().to_owned(),
        _ => default_user_agent(),
    };
    headers.insert(HEADER_USER_AGENT.to_owned(), ua);

    for (key, value) in &config.extra_headers {
        headers.insert(key.trim().to_ascii_lowercase(), value.trim().to_owned());
    }

    Ok(headers)
}

fn sanitize_nonempty(value: &str) -> Option<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_owned())
    }
}

fn default_user_agent() -> String {
    format!(
        "openai-cli/{} ({}; {})",
        env!("CARGO_PKG_VERSION"),
        std::env::consts::OS,
        std::env::consts::ARCH
    )
}
