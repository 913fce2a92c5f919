#![allow(clippy::unwrap_used, clippy::expect_used)]

use async_trait::async_trait;
use parley_agent::{
    ChatRequest, ClientConfig, Completion, LlmBackend, LlmClient, MessageDispatcher,
    PromptRenderer, StreamEvent, StreamHandle, TurnOutcome,
};
use parley_core::{ModelChoice, ParleyError, ParleyResult, ResponseStyle, Role};
use parley_session::ChatSession;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use wiremock::matchers::{body_partial_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

// --- Helpers ---

/// Backend that replays a fixed list of events and records each request.
struct ScriptedBackend {
    events: Vec<StreamEvent>,
    failure: Option<String>,
    requests: Mutex<Vec<ChatRequest>>,
}

impl ScriptedBackend {
    fn replying(text: &[&str]) -> Arc<Self> {
        let mut events: Vec<StreamEvent> = text
            .iter()
            .map(|t| StreamEvent::TextDelta {
                text: t.to_string(),
            })
            .collect();
        events.push(StreamEvent::Done);
        Arc::new(Self {
            events,
            failure: None,
            requests: Mutex::new(Vec::new()),
        })
    }

    fn failing_after(text: &[&str], message: &str) -> Arc<Self> {
        let mut events: Vec<StreamEvent> = text
            .iter()
            .map(|t| StreamEvent::TextDelta {
                text: t.to_string(),
            })
            .collect();
        events.push(StreamEvent::Error {
            message: message.to_string(),
        });
        Arc::new(Self {
            events,
            failure: Some(message.to_string()),
            requests: Mutex::new(Vec::new()),
        })
    }

    fn last_request(&self) -> ChatRequest {
        self.requests.lock().unwrap().last().cloned().unwrap()
    }
}

#[async_trait]
impl LlmBackend for ScriptedBackend {
    async fn chat_stream(&self, request: &ChatRequest) -> ParleyResult<StreamHandle> {
        self.requests.lock().unwrap().push(request.clone());
        let (tx, rx) = mpsc::channel(16);
        let events = self.events.clone();
        let failure = self.failure.clone();
        let handle = tokio::spawn(async move {
            let mut text = String::new();
            for event in events {
                if let StreamEvent::TextDelta { text: t } = &event {
                    text.push_str(t);
                }
                let _ = tx.send(event).await;
            }
            match failure {
                Some(message) => Err(ParleyError::Stream(message)),
                None => Ok(Completion {
                    text,
                    stop_reason: Some("end_turn".into()),
                }),
            }
        });
        Ok((rx, handle))
    }
}

fn dispatcher(backend: Arc<ScriptedBackend>) -> MessageDispatcher {
    MessageDispatcher::new(
        LlmClient::from_backend(backend),
        PromptRenderer::embedded().unwrap(),
    )
}

fn sse(events: &[&str]) -> String {
    events
        .iter()
        .map(|data| format!("event: x\ndata: {}\n\n", data))
        .collect()
}

// --- Dispatcher ---

#[tokio::test]
async fn test_first_turn_records_both_transcripts() {
    let backend = ScriptedBackend::replying(&["Hi ", "there!"]);
    let d = dispatcher(backend.clone());
    let mut session = ChatSession::new();

    let mut fragments = Vec::new();
    let outcome = d
        .send_message(&mut session, "Hello", |ev| fragments.push(ev.clone()))
        .await;

    assert_eq!(
        outcome,
        TurnOutcome::Completed {
            content: "Hi there!".into()
        }
    );
    assert_eq!(fragments.len(), 2);
    assert_eq!(session.visible().len(), 2);
    assert_eq!(session.full().len(), 2);
    assert_eq!(session.visible()[1].role, Role::Assistant);
    assert_eq!(session.visible()[1].content, "Hi there!");
    assert!(session.is_consistent());

    let request = backend.last_request();
    assert_eq!(request.model_id, "claude-3-5-sonnet-latest");
    assert_eq!(request.messages.len(), 1);
    assert!(request.system.ends_with("Always respond concisely."));
}

#[tokio::test]
async fn test_uploaded_context_is_sent_once_and_hidden() {
    let backend = ScriptedBackend::replying(&["ok"]);
    let d = dispatcher(backend.clone());
    let mut session = ChatSession::new();
    session.buffer_file_text("Hello world");

    d.send_message(&mut session, "Summarize", |_| {}).await;
    let first = backend.last_request();
    assert_eq!(first.messages.len(), 2);
    assert!(first.messages[0].hidden);
    assert_eq!(first.messages[0].content, "[Uploaded file context]\nHello world");
    assert_eq!(first.messages[1].content, "Summarize");

    d.send_message(&mut session, "More", |_| {}).await;
    let second = backend.last_request();
    let hidden = second.messages.iter().filter(|e| e.hidden).count();
    assert_eq!(hidden, 1);
    assert_eq!(session.visible().len(), 4);
    assert_eq!(session.full().len(), 5);
    assert!(session.is_file_injected());
    assert!(session.is_consistent());
}

#[tokio::test]
async fn test_failure_keeps_user_entry_only() {
    let backend = ScriptedBackend::failing_after(&["par"], "overloaded_error: Overloaded");
    let d = dispatcher(backend);
    let mut session = ChatSession::new();

    let mut fragments = 0;
    let outcome = d
        .send_message(&mut session, "Hello", |_| fragments += 1)
        .await;

    match outcome {
        TurnOutcome::Failed { notice } => {
            assert!(notice.starts_with("Error: "));
            assert!(notice.contains("Overloaded"));
        }
        other => panic!("expected failure, got {other:?}"),
    }
    assert_eq!(fragments, 1);
    assert_eq!(session.visible().len(), 1);
    assert_eq!(session.visible()[0].role, Role::User);
    assert!(session.is_consistent());
}

#[tokio::test]
async fn test_settings_flow_into_request() {
    let backend = ScriptedBackend::replying(&["ok"]);
    let d = dispatcher(backend.clone());
    let mut session = ChatSession::new();
    session.settings.model = ModelChoice::Claude37Sonnet;
    session.settings.extended_thinking = true;
    session.settings.thinking_budget = 6000;
    session.settings.max_tokens = 7000;
    session.settings.style = ResponseStyle::Custom("Use bullet points.".into());

    d.send_message(&mut session, "Plan a trip", |_| {}).await;
    let request = backend.last_request();
    assert_eq!(request.model_id, "claude-3-7-sonnet-latest");
    assert_eq!(request.thinking_budget, Some(6000));
    assert_eq!(request.temperature, 1.0);
    assert_eq!(request.max_tokens, 7000);
    assert!(request.system.ends_with("\n\nUse bullet points."));
}

#[tokio::test]
async fn test_reset_between_turns_starts_clean() {
    let backend = ScriptedBackend::replying(&["ok"]);
    let d = dispatcher(backend.clone());
    let mut session = ChatSession::new();
    session.buffer_file_text("notes");
    d.send_message(&mut session, "one", |_| {}).await;

    session.reset();
    d.send_message(&mut session, "two", |_| {}).await;
    let request = backend.last_request();
    assert_eq!(request.messages.len(), 1);
    assert_eq!(request.messages[0].content, "two");
}

// --- Claude backend over SSE ---

/// Serves one request with a chunked SSE body, writing each piece as its own
/// HTTP chunk with a pause in between.
async fn serve_chunked(pieces: Vec<Vec<u8>>) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        let (mut socket, _) = listener.accept().await.unwrap();

        let mut request = Vec::new();
        let mut buf = [0u8; 4096];
        let body_len = loop {
            let n = socket.read(&mut buf).await.unwrap();
            request.extend_from_slice(&buf[..n]);
            let text = String::from_utf8_lossy(&request).to_string();
            if let Some(head_end) = text.find("\r\n\r\n") {
                let len = text[..head_end]
                    .lines()
                    .find_map(|l| {
                        let (name, value) = l.split_once(':')?;
                        name.eq_ignore_ascii_case("content-length")
                            .then(|| value.trim().parse::<usize>().unwrap())
                    })
                    .unwrap_or(0);
                break head_end + 4 + len;
            }
        };
        while request.len() < body_len {
            let n = socket.read(&mut buf).await.unwrap();
            request.extend_from_slice(&buf[..n]);
        }

        socket
            .write_all(
                b"HTTP/1.1 200 OK\r\ncontent-type: text/event-stream\r\ntransfer-encoding: chunked\r\nconnection: close\r\n\r\n",
            )
            .await
            .unwrap();
        for piece in pieces {
            let mut chunk = format!("{:x}\r\n", piece.len()).into_bytes();
            chunk.extend_from_slice(&piece);
            chunk.extend_from_slice(b"\r\n");
            socket.write_all(&chunk).await.unwrap();
            socket.flush().await.unwrap();
            tokio::time::sleep(Duration::from_millis(30)).await;
        }
        socket.write_all(b"0\r\n\r\n").await.unwrap();
        socket.flush().await.unwrap();
    });

    format!("http://{addr}")
}

#[tokio::test]
async fn test_claude_backend_keeps_characters_split_across_chunks() {
    let body = sse(&[
        r#"{"type":"content_block_delta","index":0,"delta":{"type":"text_delta","text":"café"}}"#,
        r#"{"type":"message_stop"}"#,
    ])
    .into_bytes();
    // Cut between the two bytes of 'é'.
    let split = body.windows(2).position(|w| w == [0xC3, 0xA9]).unwrap() + 1;
    let base_url = serve_chunked(vec![body[..split].to_vec(), body[split..].to_vec()]).await;

    let client = LlmClient::new(ClientConfig {
        api_key: "test-key".into(),
        api_base_url: Some(base_url),
    });
    let mut session = ChatSession::new();
    session.append_user("Coffee?");
    let d = MessageDispatcher::new(client.clone(), PromptRenderer::embedded().unwrap());
    let request = d
        .build_request(&session, chrono::NaiveDate::from_ymd_opt(2025, 1, 2).unwrap())
        .unwrap();

    let (mut rx, handle) = client.chat_stream(&request).await.unwrap();
    let mut deltas = String::new();
    while let Some(ev) = rx.recv().await {
        if let StreamEvent::TextDelta { text } = ev {
            deltas.push_str(&text);
        }
    }
    let completion = handle.await.unwrap().unwrap();

    assert_eq!(deltas, "café");
    assert_eq!(completion.text, "café");
}

#[tokio::test]
async fn test_claude_backend_streams_text() {
    let server = MockServer::start().await;
    let body = sse(&[
        r#"{"type":"message_start","message":{"id":"msg_1"}}"#,
        r#"{"type":"content_block_start","index":0,"content_block":{"type":"text","text":""}}"#,
        r#"{"type":"content_block_delta","index":0,"delta":{"type":"text_delta","text":"Hello"}}"#,
        r#"{"type":"content_block_delta","index":0,"delta":{"type":"text_delta","text":", world"}}"#,
        r#"{"type":"content_block_stop","index":0}"#,
        r#"{"type":"message_delta","delta":{"stop_reason":"end_turn"}}"#,
        r#"{"type":"message_stop"}"#,
    ]);

    Mock::given(method("POST"))
        .and(path("/v1/messages"))
        .and(header("x-api-key", "test-key"))
        .and(header("anthropic-version", "2023-06-01"))
        .and(body_partial_json(serde_json::json!({
            "model": "claude-3-5-haiku-latest",
            "stream": true,
        })))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("content-type", "text/event-stream")
                .set_body_string(body),
        )
        .mount(&server)
        .await;

    let client = LlmClient::new(ClientConfig {
        api_key: "test-key".into(),
        api_base_url: Some(server.uri()),
    });
    let mut session = ChatSession::new();
    session.settings.model = ModelChoice::Claude35Haiku;
    session.append_user("Hi");
    let d = MessageDispatcher::new(client.clone(), PromptRenderer::embedded().unwrap());
    let request = d
        .build_request(&session, chrono::NaiveDate::from_ymd_opt(2025, 1, 2).unwrap())
        .unwrap();

    let (mut rx, handle) = client.chat_stream(&request).await.unwrap();
    let mut events = Vec::new();
    while let Some(ev) = rx.recv().await {
        events.push(ev);
    }
    let completion = handle.await.unwrap().unwrap();

    assert_eq!(completion.text, "Hello, world");
    assert_eq!(completion.stop_reason.as_deref(), Some("end_turn"));
    assert_eq!(events.last(), Some(&StreamEvent::Done));
    assert_eq!(
        events
            .iter()
            .filter(|e| matches!(e, StreamEvent::TextDelta { .. }))
            .count(),
        2
    );
}

#[tokio::test]
async fn test_claude_backend_http_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/messages"))
        .respond_with(
            ResponseTemplate::new(401)
                .set_body_string(r#"{"type":"error","error":{"type":"authentication_error"}}"#),
        )
        .mount(&server)
        .await;

    let client = LlmClient::new(ClientConfig {
        api_key: "bad".into(),
        api_base_url: Some(server.uri()),
    });
    let d = MessageDispatcher::new(client, PromptRenderer::embedded().unwrap());
    let mut session = ChatSession::new();

    let outcome = d.send_message(&mut session, "Hi", |_| {}).await;
    match outcome {
        TurnOutcome::Failed { notice } => {
            assert!(notice.starts_with("Error: "));
            assert!(notice.contains("401"));
            assert!(notice.contains("authentication_error"));
        }
        other => panic!("expected failure, got {other:?}"),
    }
    assert_eq!(session.visible().len(), 1);
}

#[tokio::test]
async fn test_claude_backend_error_event_mid_stream() {
    let server = MockServer::start().await;
    let body = sse(&[
        r#"{"type":"content_block_delta","index":0,"delta":{"type":"text_delta","text":"Par"}}"#,
        r#"{"type":"error","error":{"type":"overloaded_error","message":"Overloaded"}}"#,
    ]);
    Mock::given(method("POST"))
        .and(path("/v1/messages"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("content-type", "text/event-stream")
                .set_body_string(body),
        )
        .mount(&server)
        .await;

    let client = LlmClient::new(ClientConfig {
        api_key: "k".into(),
        api_base_url: Some(server.uri()),
    });
    let d = MessageDispatcher::new(client, PromptRenderer::embedded().unwrap());
    let mut session = ChatSession::new();

    let mut seen = String::new();
    let outcome = d
        .send_message(&mut session, "Hi", |ev| {
            if let StreamEvent::TextDelta { text } = ev {
                seen.push_str(text);
            }
        })
        .await;

    assert_eq!(seen, "Par");
    assert_eq!(
        outcome,
        TurnOutcome::Failed {
            notice: "Error: Stream error: overloaded_error: Overloaded".into()
        }
    );
    assert_eq!(session.full().len(), 1);
}
