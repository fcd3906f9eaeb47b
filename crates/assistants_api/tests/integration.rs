use std::sync::{
    atomic::{AtomicUsize, Ordering},
    Arc, Mutex,
};

use assistants_api::{
    AssistantTool, AssistantsApiClient, AssistantsApiConfig, AssistantsApiError,
    CreateAssistantRequest, ListParams, RunState,
};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::task::JoinHandle;

#[derive(Clone)]
struct ScriptedResponse {
    status: u16,
    body: String,
}

#[derive(Debug, Clone)]
struct RecordedRequest {
    method: String,
    target: String,
    headers: String,
    body: String,
}

struct ScriptedServer {
    base_url: String,
    request_count: Arc<AtomicUsize>,
    requests: Arc<Mutex<Vec<RecordedRequest>>>,
    handle: JoinHandle<()>,
}

impl ScriptedServer {
    async fn new(scripts: Vec<ScriptedResponse>) -> Self {
        let scripts = Arc::new(scripts);
        let request_count = Arc::new(AtomicUsize::new(0));
        let requests = Arc::new(Mutex::new(Vec::new()));
        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .expect("local TCP listener should bind");
        let addr = listener
            .local_addr()
            .expect("resolved local listener address");
        let base_url = format!("http://{addr}/v1");

        let handle = tokio::spawn({
            let scripts = Arc::clone(&scripts);
            let request_count = Arc::clone(&request_count);
            let requests = Arc::clone(&requests);

            async move {
                loop {
                    let (socket, _) = match listener.accept().await {
                        Ok(pair) => pair,
                        Err(_) => break,
                    };
                    let scripts = Arc::clone(&scripts);
                    let request_count = Arc::clone(&request_count);
                    let requests = Arc::clone(&requests);
                    tokio::spawn(async move {
                        serve_one(socket, scripts, request_count, requests).await;
                    });
                }
            }
        });

        Self {
            base_url,
            request_count,
            requests,
            handle,
        }
    }

    fn request_count(&self) -> usize {
        self.request_count.load(Ordering::Acquire)
    }

    fn requests(&self) -> Vec<RecordedRequest> {
        self.requests.lock().expect("request log lock").clone()
    }

    fn client(&self) -> AssistantsApiClient {
        let config = AssistantsApiConfig::new("sk-test").with_base_url(&self.base_url);
        AssistantsApiClient::new(config).expect("client")
    }

    fn shutdown(&self) {
        self.handle.abort();
    }
}

fn json(status: u16, body: serde_json::Value) -> ScriptedResponse {
    ScriptedResponse {
        status,
        body: body.to_string(),
    }
}

fn message_json(id: &str, role: &str, created_at: i64, text: &str) -> serde_json::Value {
    serde_json::json!({
        "id": id,
        "object": "thread.message",
        "thread_id": "thread_1",
        "role": role,
        "created_at": created_at,
        "content": [{"type": "text", "text": {"value": text, "annotations": []}}]
    })
}

#[tokio::test]
async fn create_thread_posts_to_threads_endpoint() {
    let server = ScriptedServer::new(vec![json(
        200,
        serde_json::json!({"id": "thread_abc", "object": "thread", "created_at": 1704931200}),
    )])
    .await;

    let thread = server
        .client()
        .create_thread()
        .await
        .expect("thread should be created");

    assert_eq!(thread.id, "thread_abc");
    let requests = server.requests();
    assert_eq!(requests[0].method, "POST");
    assert_eq!(requests[0].target, "/v1/threads");
    assert!(requests[0]
        .headers
        .to_ascii_lowercase()
        .contains("authorization: bearer sk-test"));

    server.shutdown();
}

#[tokio::test]
async fn create_message_and_run_send_expected_payloads() {
    let server = ScriptedServer::new(vec![
        json(200, message_json("msg_1", "user", 1704931201, "hi")),
        json(
            200,
            serde_json::json!({
                "id": "run_1",
                "object": "thread.run",
                "thread_id": "thread_1",
                "assistant_id": "asst_1",
                "status": "queued"
            }),
        ),
    ])
    .await;
    let client = server.client();

    let message = client
        .create_message("thread_1", "user", "hi")
        .await
        .expect("message should be created");
    let run = client
        .create_run("thread_1", "asst_1")
        .await
        .expect("run should be created");

    assert_eq!(message.first_text(), Some("hi"));
    assert_eq!(run.status, RunState::Queued);

    let requests = server.requests();
    assert_eq!(requests[0].target, "/v1/threads/thread_1/messages");
    let body: serde_json::Value =
        serde_json::from_str(&requests[0].body).expect("message body is JSON");
    assert_eq!(body, serde_json::json!({"role": "user", "content": "hi"}));
    assert_eq!(requests[1].target, "/v1/threads/thread_1/runs");
    let body: serde_json::Value =
        serde_json::from_str(&requests[1].body).expect("run body is JSON");
    assert_eq!(body, serde_json::json!({"assistant_id": "asst_1"}));

    server.shutdown();
}

#[tokio::test]
async fn list_all_messages_follows_pagination_cursor() {
    let server = ScriptedServer::new(vec![
        json(
            200,
            serde_json::json!({
                "object": "list",
                "data": [message_json("msg_1", "user", 1, "one"), message_json("msg_2", "assistant", 2, "two")],
                "first_id": "msg_1",
                "last_id": "msg_2",
                "has_more": true
            }),
        ),
        json(
            200,
            serde_json::json!({
                "object": "list",
                "data": [message_json("msg_3", "user", 3, "three")],
                "first_id": "msg_3",
                "last_id": "msg_3",
                "has_more": false
            }),
        ),
    ])
    .await;

    let messages = server
        .client()
        .list_all_messages("thread_1", "asc", None)
        .await
        .expect("listing should succeed");

    let texts: Vec<_> = messages.iter().filter_map(|m| m.first_text()).collect();
    assert_eq!(texts, vec!["one", "two", "three"]);

    let requests = server.requests();
    assert_eq!(requests.len(), 2);
    assert_eq!(
        requests[0].target,
        "/v1/threads/thread_1/messages?order=asc&limit=100"
    );
    assert_eq!(
        requests[1].target,
        "/v1/threads/thread_1/messages?order=asc&after=msg_2&limit=100"
    );

    server.shutdown();
}

#[tokio::test]
async fn error_status_is_surfaced_without_retry() {
    let server = ScriptedServer::new(vec![
        json(
            503,
            serde_json::json!({"error": {"message": "The server is overloaded", "type": "server_error"}}),
        ),
        json(200, serde_json::json!({"id": "thread_late"})),
    ])
    .await;

    let error = server
        .client()
        .create_thread()
        .await
        .expect_err("503 should fail");

    assert!(matches!(
        &error,
        AssistantsApiError::Status(status, message)
            if status.as_u16() == 503 && message == "The server is overloaded"
    ));
    assert!(error.is_retryable());
    assert_eq!(server.request_count(), 1);

    server.shutdown();
}

#[tokio::test]
async fn not_found_run_is_not_retryable() {
    let server = ScriptedServer::new(vec![json(
        404,
        serde_json::json!({"error": {"message": "No run found with id 'run_x'.", "type": "invalid_request_error"}}),
    )])
    .await;

    let error = server
        .client()
        .retrieve_run("thread_1", "run_x")
        .await
        .expect_err("404 should fail");

    assert!(!error.is_retryable());
    assert_eq!(server.requests()[0].target, "/v1/threads/thread_1/runs/run_x");

    server.shutdown();
}

#[tokio::test]
async fn create_and_list_assistants_round_trip_through_server() {
    let assistant = serde_json::json!({
        "id": "asst_1",
        "object": "assistant",
        "created_at": 1704931200,
        "name": "helper",
        "model": "gpt-3.5-turbo",
        "instructions": "be brief",
        "tools": [{"type": "code_interpreter"}],
        "tool_resources": {}
    });
    let server = ScriptedServer::new(vec![
        json(200, assistant.clone()),
        json(
            200,
            serde_json::json!({"object": "list", "data": [assistant], "has_more": false}),
        ),
    ])
    .await;
    let client = server.client();

    let created = client
        .create_assistant(
            &CreateAssistantRequest::new("helper", "gpt-3.5-turbo", "be brief")
                .with_tools(vec![AssistantTool::CodeInterpreter]),
        )
        .await
        .expect("assistant should be created");
    let listed = client
        .list_assistants(&ListParams {
            order: Some("desc".to_string()),
            after: None,
            limit: Some(20),
        })
        .await
        .expect("assistants should list");

    assert_eq!(created.id, "asst_1");
    assert_eq!(listed.data.len(), 1);
    let requests = server.requests();
    assert_eq!(requests[1].target, "/v1/assistants?order=desc&limit=20");

    server.shutdown();
}

#[tokio::test]
async fn upload_file_sends_multipart_purpose_and_name() {
    let server = ScriptedServer::new(vec![json(
        200,
        serde_json::json!({
            "id": "file_1",
            "object": "file",
            "bytes": 5,
            "created_at": 1704931200,
            "filename": "notes.txt",
            "purpose": "assistants"
        }),
    )])
    .await;
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("notes.txt");
    std::fs::write(&path, "hello").expect("write fixture");

    let file = server
        .client()
        .upload_file(&path, "assistants")
        .await
        .expect("upload should succeed");

    assert_eq!(file.id, "file_1");
    assert_eq!(file.bytes, 5);
    let request = &server.requests()[0];
    assert_eq!(request.target, "/v1/files");
    assert!(request.headers.to_ascii_lowercase().contains("multipart/form-data"));
    assert!(request.body.contains("name=\"purpose\""));
    assert!(request.body.contains("filename=\"notes.txt\""));

    server.shutdown();
}

#[tokio::test]
async fn upload_missing_file_fails_without_request() {
    let server = ScriptedServer::new(Vec::new()).await;
    let dir = tempfile::tempdir().expect("tempdir");

    let error = server
        .client()
        .upload_file(&dir.path().join("absent.txt"), "assistants")
        .await
        .expect_err("missing file should fail");

    assert!(matches!(error, AssistantsApiError::File { .. }));
    assert_eq!(server.request_count(), 0);

    server.shutdown();
}

fn status_reason(status: u16) -> &'static str {
    match status {
        200 => "OK",
        400 => "Bad Request",
        404 => "Not Found",
        429 => "Too Many Requests",
        503 => "Service Unavailable",
        _ => "Error",
    }
}

async fn serve_one(
    mut socket: TcpStream,
    scripts: Arc<Vec<ScriptedResponse>>,
    request_count: Arc<AtomicUsize>,
    requests: Arc<Mutex<Vec<RecordedRequest>>>,
) {
    let Ok(recorded) = read_request(&mut socket).await else {
        return;
    };
    requests.lock().expect("request log lock").push(recorded);

    let index = request_count.fetch_add(1, Ordering::AcqRel);
    let response = scripts.get(index).cloned().unwrap_or_else(|| {
        json(
            500,
            serde_json::json!({"error": {"message": "unexpected request"}}),
        )
    });

    let head = format!(
        "HTTP/1.1 {} {}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n",
        response.status,
        status_reason(response.status),
        response.body.len(),
    );
    if socket.write_all(head.as_bytes()).await.is_err() {
        return;
    }
    let _ = socket.write_all(response.body.as_bytes()).await;
    let _ = socket.shutdown().await;
}

async fn read_request(socket: &mut TcpStream) -> std::io::Result<RecordedRequest> {
    let mut request = Vec::new();
    let mut buffer = [0_u8; 4096];

    let header_end = loop {
        let n = socket.read(&mut buffer).await?;
        if n == 0 {
            return Err(std::io::ErrorKind::UnexpectedEof.into());
        }
        request.extend_from_slice(&buffer[..n]);
        if let Some(position) = request.windows(4).position(|window| window == b"\r\n\r\n") {
            break position + 4;
        }
    };

    let head = String::from_utf8_lossy(&request[..header_end]).into_owned();
    let content_length = head
        .lines()
        .filter_map(|line| line.split_once(':'))
        .find(|(name, _)| name.trim().eq_ignore_ascii_case("content-length"))
        .and_then(|(_, value)| value.trim().parse::<usize>().ok())
        .unwrap_or(0);

    while request.len() < header_end + content_length {
        let n = socket.read(&mut buffer).await?;
        if n == 0 {
            break;
        }
        request.extend_from_slice(&buffer[..n]);
    }

    let mut request_line = head.lines().next().unwrap_or_default().split_whitespace();
    let method = request_line.next().unwrap_or_default().to_string();
    let target = request_line.next().unwrap_or_default().to_string();
    let body = String::from_utf8_lossy(&request[header_end..]).into_owned();

    Ok(RecordedRequest {
        method,
        target,
        headers: head,
        body,
    })
}
