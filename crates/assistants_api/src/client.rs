use std::path::Path;

use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use reqwest::multipart::{Form, Part};
use reqwest::{Client, Method, RequestBuilder, Url};
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::config::AssistantsApiConfig;
use crate::error::{parse_error_message, AssistantsApiError};
use crate::headers::build_headers;
use crate::types::{
    AssistantObject, CreateAssistantRequest, CreateMessageRequest, CreateRunRequest, FileObject,
    ListPage, ListParams, MessageObject, RunObject, ThreadObject,
};
use crate::url::segments_url;

/// Page size used when walking every message of a thread.
pub const MESSAGE_PAGE_LIMIT: u32 = 100;

#[derive(Debug)]
pub struct AssistantsApiClient {
    http: Client,
    config: AssistantsApiConfig,
}

impl AssistantsApiClient {
    pub fn new(config: AssistantsApiConfig) -> Result<Self, AssistantsApiError> {
        let mut builder = Client::builder();
        if let Some(timeout) = config.timeout {
            builder = builder.timeout(timeout);
        }
        let http = builder.build().map_err(AssistantsApiError::from)?;
        Ok(Self { http, config })
    }

    pub fn config(&self) -> &AssistantsApiConfig {
        &self.config
    }

    /// Endpoint URL for `segments`, each one percent-encoded.
    pub fn endpoint(&self, segments: &[&str]) -> Result<Url, AssistantsApiError> {
        segments_url(&self.config.base_url, segments)
    }

    pub fn build_headers(&self) -> Result<HeaderMap, AssistantsApiError> {
        let headers = build_headers(&self.config, self.config.user_agent.as_deref())?;
        let mut out = HeaderMap::new();
        for (key, value) in headers {
            out.insert(
                HeaderName::from_bytes(key.as_bytes()).map_err(|_| {
                    AssistantsApiError::InvalidHeader(format!("invalid header key: {key}"))
                })?,
                HeaderValue::from_str(&value).map_err(|_| {
                    AssistantsApiError::InvalidHeader(format!("invalid header value for {key}"))
                })?,
            );
        }
        Ok(out)
    }

    pub fn build_request(
        &self,
        method: Method,
        segments: &[&str],
    ) -> Result<RequestBuilder, AssistantsApiError> {
        let headers = self.build_headers()?;
        let url = self.endpoint(segments)?;
        Ok(self.http.request(method, url).headers(headers))
    }

    pub async fn create_thread(&self) -> Result<ThreadObject, AssistantsApiError> {
        let request = self
            .build_request(Method::POST, &["threads"])?
            .json(&serde_json::json!({}));
        self.send_json(request).await
    }

    pub async fn create_message(
        &self,
        thread_id: &str,
        role: &str,
        content: &str,
    ) -> Result<MessageObject, AssistantsApiError> {
        let request = self
            .build_request(Method::POST, &["threads", thread_id, "messages"])?
            .json(&CreateMessageRequest { role, content });
        self.send_json(request).await
    }

    pub async fn list_messages(
        &self,
        thread_id: &str,
        params: &ListParams,
    ) -> Result<ListPage<MessageObject>, AssistantsApiError> {
        let request = self
            .build_request(Method::GET, &["threads", thread_id, "messages"])?
            .query(&params.to_query());
        self.send_json(request).await
    }

    /// Walks every page after `after` in `order`, following `last_id` cursors.
    pub async fn list_all_messages(
        &self,
        thread_id: &str,
        order: &str,
        after: Option<&str>,
    ) -> Result<Vec<MessageObject>, AssistantsApiError> {
        let mut params = ListParams {
            order: Some(order.to_string()),
            after: after.map(str::to_string),
            limit: Some(MESSAGE_PAGE_LIMIT),
        };
        let mut messages = Vec::new();

        loop {
            let page = self.list_messages(thread_id, &params).await?;
            let next_cursor = page
                .last_id
                .clone()
                .or_else(|| page.data.last().map(|message| message.id.clone()));
            let page_was_empty = page.data.is_empty();
            messages.extend(page.data);

            match next_cursor {
                Some(cursor) if page.has_more && !page_was_empty => params.after = Some(cursor),
                _ => break,
            }
        }

        Ok(messages)
    }

    pub async fn create_run(
        &self,
        thread_id: &str,
        assistant_id: &str,
    ) -> Result<RunObject, AssistantsApiError> {
        let request = self
            .build_request(Method::POST, &["threads", thread_id, "runs"])?
            .json(&CreateRunRequest { assistant_id });
        self.send_json(request).await
    }

    pub async fn retrieve_run(
        &self,
        thread_id: &str,
        run_id: &str,
    ) -> Result<RunObject, AssistantsApiError> {
        let request = self.build_request(Method::GET, &["threads", thread_id, "runs", run_id])?;
        self.send_json(request).await
    }

    pub async fn cancel_run(
        &self,
        thread_id: &str,
        run_id: &str,
    ) -> Result<RunObject, AssistantsApiError> {
        let request = self.build_request(
            Method::POST,
            &["threads", thread_id, "runs", run_id, "cancel"],
        )?;
        self.send_json(request).await
    }

    pub async fn create_assistant(
        &self,
        request: &CreateAssistantRequest,
    ) -> Result<AssistantObject, AssistantsApiError> {
        let request = self.build_request(Method::POST, &["assistants"])?.json(request);
        self.send_json(request).await
    }

    pub async fn retrieve_assistant(
        &self,
        assistant_id: &str,
    ) -> Result<AssistantObject, AssistantsApiError> {
        let request = self.build_request(Method::GET, &["assistants", assistant_id])?;
        self.send_json(request).await
    }

    pub async fn list_assistants(
        &self,
        params: &ListParams,
    ) -> Result<ListPage<AssistantObject>, AssistantsApiError> {
        let request = self
            .build_request(Method::GET, &["assistants"])?
            .query(&params.to_query());
        self.send_json(request).await
    }

    /// Uploads a local file as multipart form data.
    pub async fn upload_file(
        &self,
        path: &Path,
        purpose: &str,
    ) -> Result<FileObject, AssistantsApiError> {
        let bytes = tokio::fs::read(path)
            .await
            .map_err(|source| AssistantsApiError::File {
                path: path.to_path_buf(),
                source,
            })?;
        let file_name = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| "upload".to_string());
        let form = Form::new()
            .text("purpose", purpose.to_string())
            .part("file", Part::bytes(bytes).file_name(file_name));

        let request = self.build_request(Method::POST, &["files"])?.multipart(form);
        self.send_json(request).await
    }

    async fn send_json<T: DeserializeOwned>(
        &self,
        request: RequestBuilder,
    ) -> Result<T, AssistantsApiError> {
        let response = request.send().await.map_err(AssistantsApiError::from)?;
        let status = response.status();
        let url = response.url().path().to_string();
        let body = response.text().await.map_err(AssistantsApiError::from)?;

        if !status.is_success() {
            let message = parse_error_message(status, &body);
            tracing::debug!(%status, path = %url, %message, "request failed");
            return Err(AssistantsApiError::Status(status, message));
        }

        let value: Value = serde_json::from_str(&body)?;
        if tracing::enabled!(tracing::Level::DEBUG) {
            let pretty = serde_json::to_string_pretty(&value).unwrap_or_else(|_| body.clone());
            tracing::debug!(path = %url, "response payload:\n{pretty}");
        }
        Ok(serde_json::from_value(value)?)
    }
}

#[cfg(test)]
mod tests {
    use reqwest::Method;

    use super::AssistantsApiClient;
    use crate::config::AssistantsApiConfig;
    use crate::error::AssistantsApiError;
    use crate::types::ListParams;

    #[test]
    fn build_request_targets_joined_endpoint() {
        let client = AssistantsApiClient::new(
            AssistantsApiConfig::new("sk-test").with_base_url("https://example.test/v1/"),
        )
        .expect("client");

        let request = client
            .build_request(Method::GET, &["threads", "thread_1", "messages"])
            .expect("request builder")
            .query(
                &ListParams {
                    order: Some("asc".to_string()),
                    after: Some("msg_1".to_string()),
                    limit: None,
                }
                .to_query(),
            )
            .build()
            .expect("request");

        assert_eq!(
            request.url().as_str(),
            "https://example.test/v1/threads/thread_1/messages?order=asc&after=msg_1"
        );
        assert_eq!(
            request
                .headers()
                .get("authorization")
                .and_then(|value| value.to_str().ok()),
            Some("Bearer sk-test")
        );
        assert_eq!(
            request
                .headers()
                .get("openai-beta")
                .and_then(|value| value.to_str().ok()),
            Some("assistants=v2")
        );
    }

    #[test]
    fn ids_from_input_cannot_escape_their_path_segment() {
        let client = AssistantsApiClient::new(
            AssistantsApiConfig::new("sk-test").with_base_url("https://example.test/v1"),
        )
        .expect("client");

        let request = client
            .build_request(Method::GET, &["threads", "../assistants", "messages"])
            .expect("request builder")
            .build()
            .expect("request");

        assert_eq!(request.url().path(), "/v1/threads/..%2Fassistants/messages");
    }

    #[test]
    fn build_request_without_api_key_fails_before_sending() {
        let client = AssistantsApiClient::new(AssistantsApiConfig::default()).expect("client");

        let error = client
            .build_request(Method::POST, &["threads"])
            .expect_err("missing key should fail");
        assert!(matches!(error, AssistantsApiError::MissingApiKey));
    }
}
