//! Transport tests against a mock Ollama server.

use std::time::Duration;

use common::{trickle_server, Ending};
use futures::StreamExt as _;
use pretty_assertions::assert_eq;
use winlama_core::{Client, ErrorKind, ModelHost, ModelName, StreamEvent};
use wiremock::matchers::{body_json, body_partial_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

mod common;

fn client_for(server: &MockServer) -> Client {
    Client::new(ModelHost::new(server.uri()))
}

fn llama3() -> ModelName {
    "llama3".parse().unwrap()
}

fn ndjson(lines: &[&str]) -> ResponseTemplate {
    let mut body = lines.join("\n");
    body.push('\n');
    ResponseTemplate::new(200).set_body_raw(body.into_bytes(), "application/x-ndjson")
}

/// An address on which nothing is listening.
fn unreachable_host() -> ModelHost {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let port = listener.local_addr().unwrap().port();
    drop(listener);
    ModelHost::new(format!("http://127.0.0.1:{port}"))
}

#[tokio::test]
async fn list_models_keeps_server_order() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/tags"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "models": [
                { "name": "mistral:latest", "size": 4109865159u64 },
                { "name": "llama3:latest", "size": 4661224676u64 },
                { "name": "mistral:latest", "size": 4109865159u64 },
            ]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let names = client_for(&server).list_models().await.unwrap();

    let names: Vec<&str> = names.iter().map(ModelName::as_str).collect();
    assert_eq!(names, vec!["mistral:latest", "llama3:latest", "mistral:latest"]);
}

#[tokio::test]
async fn list_models_without_models_key_is_empty() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/tags"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({})))
        .mount(&server)
        .await;

    let names = client_for(&server).list_models().await.unwrap();
    assert!(names.is_empty());
}

#[tokio::test]
async fn list_models_requires_scheme_before_any_request() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let client = Client::new(ModelHost::new(server.address().to_string()));
    let error = client.list_models().await.unwrap_err();

    assert_eq!(error.kind(), ErrorKind::Configuration);
}

#[tokio::test]
async fn list_models_connection_refused() {
    let error = Client::new(unreachable_host())
        .list_models()
        .await
        .unwrap_err();
    assert_eq!(error.kind(), ErrorKind::Connection);
}

#[tokio::test]
async fn list_models_http_error() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/tags"))
        .respond_with(ResponseTemplate::new(500).set_body_string("internal error"))
        .mount(&server)
        .await;

    let error = client_for(&server).list_models().await.unwrap_err();

    assert_eq!(error.kind(), ErrorKind::Protocol);
    assert!(error.to_string().contains("500"), "{error}");
}

#[tokio::test]
async fn list_models_malformed_body() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/tags"))
        .respond_with(ResponseTemplate::new(200).set_body_string("{\"models\": [oops"))
        .mount(&server)
        .await;

    let error = client_for(&server).list_models().await.unwrap_err();
    assert_eq!(error.kind(), ErrorKind::Decode);
}

#[tokio::test]
async fn list_models_timeout() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/tags"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(serde_json::json!({ "models": [] }))
                .set_delay(Duration::from_secs(2)),
        )
        .mount(&server)
        .await;

    let error = client_for(&server)
        .with_list_timeout(Duration::from_millis(100))
        .list_models()
        .await
        .unwrap_err();

    assert_eq!(error.kind(), ErrorKind::Timeout);
}

#[tokio::test]
async fn generate_stream_yields_tokens_then_done() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/generate"))
        .and(body_json(serde_json::json!({
            "model": "llama3",
            "prompt": "hi",
            "stream": true,
        })))
        .respond_with(ndjson(&[
            r#"{"model":"llama3","response":"Hi","done":false}"#,
            r#"{"model":"llama3","response":" there","done":false}"#,
            r#"{"model":"llama3","response":"","done":true,"context":[1,2,3],"eval_count":2}"#,
        ]))
        .expect(1)
        .mount(&server)
        .await;

    let events: Vec<StreamEvent> = client_for(&server)
        .generate_stream(llama3(), "hi", None)
        .collect()
        .await;

    assert_eq!(
        events,
        vec![
            StreamEvent::Token { text: "Hi".into() },
            StreamEvent::Token {
                text: " there".into()
            },
            StreamEvent::Done {
                context: Some(vec![1, 2, 3].into())
            },
        ]
    );
}

#[tokio::test]
async fn generate_stream_sends_context_back() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/generate"))
        .and(body_partial_json(serde_json::json!({ "context": [1, 2, 3] })))
        .respond_with(ndjson(&[r#"{"done":true,"context":[1,2,3,4]}"#]))
        .expect(1)
        .mount(&server)
        .await;

    let events: Vec<StreamEvent> = client_for(&server)
        .generate_stream(llama3(), "again", Some(vec![1, 2, 3].into()))
        .collect()
        .await;

    assert_eq!(
        events,
        vec![StreamEvent::Done {
            context: Some(vec![1, 2, 3, 4].into())
        }]
    );
}

#[tokio::test]
async fn generate_stream_skips_malformed_line() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/generate"))
        .respond_with(ndjson(&[
            r#"{"response":"one","done":false}"#,
            r#"{"response": tw"#,
            r#"{"response":"two","done":false}"#,
            r#"{"done":true}"#,
        ]))
        .mount(&server)
        .await;

    let events: Vec<StreamEvent> = client_for(&server)
        .generate_stream(llama3(), "count", None)
        .collect()
        .await;

    assert_eq!(
        events,
        vec![
            StreamEvent::Token { text: "one".into() },
            StreamEvent::Token { text: "two".into() },
            StreamEvent::Done { context: None },
        ]
    );
}

#[tokio::test]
async fn generate_stream_connection_failure_is_one_error() {
    let events: Vec<StreamEvent> = Client::new(unreachable_host())
        .generate_stream(llama3(), "hi", None)
        .collect()
        .await;

    assert_eq!(events.len(), 1);
    assert!(matches!(&events[0], StreamEvent::Error { message } if message.contains("connect")));
}

#[tokio::test]
async fn generate_stream_missing_scheme_is_one_error() {
    let events: Vec<StreamEvent> = Client::new(ModelHost::new("localhost:11434"))
        .generate_stream(llama3(), "hi", None)
        .collect()
        .await;

    assert_eq!(events.len(), 1);
    assert!(matches!(&events[0], StreamEvent::Error { message } if message.contains("scheme")));
}

#[tokio::test]
async fn generate_stream_http_error_carries_detail() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/generate"))
        .respond_with(
            ResponseTemplate::new(404)
                .set_body_json(serde_json::json!({ "error": "model 'llama3' not found" })),
        )
        .mount(&server)
        .await;

    let events: Vec<StreamEvent> = client_for(&server)
        .generate_stream(llama3(), "hi", None)
        .collect()
        .await;

    assert_eq!(
        events,
        vec![StreamEvent::Error {
            message: "HTTP error 404 Not Found from Ollama server: Details: model 'llama3' not found"
                .into()
        }]
    );
}

#[tokio::test]
async fn generate_stream_timeout_is_one_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/generate"))
        .respond_with(ndjson(&[r#"{"done":true}"#]).set_delay(Duration::from_secs(2)))
        .mount(&server)
        .await;

    let events: Vec<StreamEvent> = client_for(&server)
        .with_generate_timeout(Duration::from_millis(100))
        .generate_stream(llama3(), "hi", None)
        .collect()
        .await;

    assert_eq!(events.len(), 1);
    assert!(matches!(&events[0], StreamEvent::Error { message } if message.contains("timed out")));
}

#[tokio::test]
async fn generate_stream_closed_early_ends_with_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/generate"))
        .respond_with(ndjson(&[r#"{"response":"half","done":false}"#]))
        .mount(&server)
        .await;

    let events: Vec<StreamEvent> = client_for(&server)
        .generate_stream(llama3(), "hi", None)
        .collect()
        .await;

    assert_eq!(events.len(), 2);
    assert_eq!(events[0], StreamEvent::Token { text: "half".into() });
    assert!(matches!(events[1], StreamEvent::Error { .. }));
}

#[tokio::test]
async fn generate_returns_whole_response() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/generate"))
        .and(body_json(serde_json::json!({
            "model": "llama3",
            "prompt": "hi",
            "stream": false,
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "model": "llama3",
            "response": "Hi there",
            "done": true,
            "context": [5, 6],
        })))
        .expect(1)
        .mount(&server)
        .await;

    let generation = client_for(&server)
        .generate(llama3(), "hi", None)
        .await
        .unwrap();

    assert_eq!(generation.response, "Hi there");
    assert_eq!(generation.context, Some(vec![5, 6].into()));
}

#[tokio::test]
async fn generate_stream_outlasting_the_timeout_completes_while_active() {
    let lines = [
        r#"{"response":"t0","done":false}"#,
        r#"{"response":"t1","done":false}"#,
        r#"{"response":"t2","done":false}"#,
        r#"{"response":"t3","done":false}"#,
        r#"{"response":"t4","done":false}"#,
        r#"{"response":"t5","done":false}"#,
        r#"{"done":true,"context":[9]}"#,
    ];
    let base = trickle_server(&lines, Duration::from_millis(200), Ending::Close).await;

    let events: Vec<StreamEvent> = Client::new(ModelHost::new(base))
        .with_generate_timeout(Duration::from_millis(500))
        .generate_stream(llama3(), "hi", None)
        .collect()
        .await;

    let mut expected: Vec<StreamEvent> = (0..6)
        .map(|i| StreamEvent::Token {
            text: format!("t{i}"),
        })
        .collect();
    expected.push(StreamEvent::Done {
        context: Some(vec![9].into()),
    });
    assert_eq!(events, expected);
}

#[tokio::test]
async fn generate_stream_stalling_mid_answer_times_out_once() {
    let lines = [
        r#"{"response":"Hi","done":false}"#,
        r#"{"response":" there","done":false}"#,
    ];
    let base = trickle_server(&lines, Duration::from_millis(50), Ending::Stall).await;

    let events: Vec<StreamEvent> = Client::new(ModelHost::new(base))
        .with_generate_timeout(Duration::from_millis(300))
        .generate_stream(llama3(), "hi", None)
        .collect()
        .await;

    assert_eq!(events.len(), 3, "{events:?}");
    assert_eq!(
        &events[..2],
        &[
            StreamEvent::Token { text: "Hi".into() },
            StreamEvent::Token {
                text: " there".into()
            },
        ]
    );
    assert!(
        matches!(&events[2], StreamEvent::Error { message } if message.contains("timed out after 300ms")),
        "{events:?}"
    );
}
