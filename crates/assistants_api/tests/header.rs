use assistants_api::headers::{
    build_headers, HEADER_ACCEPT, HEADER_AUTHORIZATION, HEADER_OPENAI_BETA, HEADER_ORGANIZATION,
    HEADER_PROJECT, HEADER_USER_AGENT,
};
use assistants_api::{AssistantsApiConfig, AssistantsApiError};

#[test]
fn header_map_contains_assistants_headers() {
    let config = AssistantsApiConfig::new("  sk-test  ")
        .with_organization("org-1")
        .with_project("proj-1")
        .insert_header("X-Extra", " value ");

    let headers = build_headers(&config, None).expect("header construction");
    assert_eq!(
        headers.get(HEADER_AUTHORIZATION).expect("authorization header"),
        "Bearer sk-test"
    );
    assert_eq!(
        headers.get(HEADER_OPENAI_BETA).expect("openai beta"),
        "assistants=v2"
    );
    assert_eq!(
        headers.get(HEADER_ORGANIZATION).expect("organization"),
        "org-1"
    );
    assert_eq!(headers.get(HEADER_PROJECT).expect("project"), "proj-1");
    assert_eq!(
        headers.get(HEADER_ACCEPT).expect("accept"),
        "application/json"
    );
    assert_eq!(headers.get("x-extra").expect("custom"), "value");
    assert!(headers
        .get(HEADER_USER_AGENT)
        .expect("user-agent")
        .starts_with("openai-cli/"));
}

#[test]
fn header_map_prefers_explicit_user_agent() {
    let config = AssistantsApiConfig::new("sk-test").with_user_agent("configured");
    let headers = build_headers(&config, Some("test-agent")).expect("header construction");
    assert_eq!(headers.get(HEADER_USER_AGENT).expect("user-agent"), "test-agent");

    let headers = build_headers(&config, None).expect("header construction");
    assert_eq!(headers.get(HEADER_USER_AGENT).expect("user-agent"), "configured");
}

#[test]
fn header_map_omits_blank_optional_headers() {
    let config = AssistantsApiConfig::new("sk-test")
        .with_organization(" ")
        .with_beta("");
    let headers = build_headers(&config, None).expect("header construction");
    assert!(!headers.contains_key(HEADER_ORGANIZATION));
    assert!(!headers.contains_key(HEADER_OPENAI_BETA));
}

#[test]
fn header_map_requires_api_key() {
    let error = build_headers(&AssistantsApiConfig::new("   "), None)
        .expect_err("blank key must fail");
    assert!(matches!(error, AssistantsApiError::MissingApiKey));
}
