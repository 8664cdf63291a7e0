//! Streaming tests against a mock completion server.

use std::time::Duration;

use ollama::{Ollama, FALLBACK_TEXT};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio_stream::StreamExt;
use wiremock::matchers::{body_partial_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn ndjson(body: &str) -> ResponseTemplate {
    ResponseTemplate::new(200)
        .insert_header("content-type", "application/x-ndjson")
        .set_body_string(body)
}

#[tokio::test]
async fn stream_yields_cumulative_text_until_done() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/api/generate"))
        .and(body_partial_json(serde_json::json!({
            "model": "gemma2:2b",
            "prompt": "Say hello",
            "stream": true
        })))
        .respond_with(ndjson(
            "{\"response\":\"Hello\"}\n{\"response\":\" world\"}\n{\"done\":true}\n",
        ))
        .expect(1)
        .mount(&server)
        .await;

    let client = Ollama::new(server.uri());
    let snapshots: Vec<String> = client.stream_completion("Say hello").collect().await;

    assert_eq!(snapshots, vec!["Hello", "Hello world"]);
}

#[tokio::test]
async fn stream_skips_malformed_lines() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/api/generate"))
        .respond_with(ndjson(
            "{\"response\":\"The \"}\n{broken\n{\"response\":\"body\"}\n{\"response\":\"\",\"done\":true}\n",
        ))
        .mount(&server)
        .await;

    let client = Ollama::new(server.uri());
    let snapshots: Vec<String> = client.stream_completion("x").collect().await;

    assert_eq!(snapshots, vec!["The ", "The body"]);
}

#[tokio::test]
async fn stream_ignores_frames_after_done() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/api/generate"))
        .respond_with(ndjson(
            "{\"response\":\"only\"}\n{\"done\":true}\n{\"response\":\" more\"}\n",
        ))
        .mount(&server)
        .await;

    let client = Ollama::new(server.uri());
    let snapshots: Vec<String> = client.stream_completion("x").collect().await;

    assert_eq!(snapshots, vec!["only"]);
}

#[tokio::test]
async fn error_status_yields_single_fallback() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/api/generate"))
        .respond_with(ResponseTemplate::new(500).set_body_string("model not loaded"))
        .mount(&server)
        .await;

    let client = Ollama::new(server.uri());
    let snapshots: Vec<String> = client.stream_completion("x").collect().await;

    assert_eq!(snapshots, vec![FALLBACK_TEXT]);
}

#[tokio::test]
async fn unreachable_server_yields_single_fallback() {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let port = listener.local_addr().unwrap().port();
    drop(listener);

    let client = Ollama::new(format!("http://127.0.0.1:{port}"));
    let snapshots: Vec<String> = client.stream_completion("x").collect().await;

    assert_eq!(snapshots, vec![FALLBACK_TEXT]);
}

#[tokio::test]
async fn in_band_error_yields_single_fallback() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/api/generate"))
        .respond_with(ndjson("{\"error\":\"model runner has unexpectedly stopped\"}\n"))
        .mount(&server)
        .await;

    let client = Ollama::new(server.uri());
    let snapshots: Vec<String> = client.stream_completion("x").collect().await;

    assert_eq!(snapshots, vec![FALLBACK_TEXT]);
}

#[tokio::test]
async fn error_after_text_keeps_partial_reply() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/api/generate"))
        .respond_with(ndjson(
            "{\"response\":\"I was\"}\n{\"error\":\"out of memory\"}\n{\"response\":\" there\"}\n",
        ))
        .mount(&server)
        .await;

    let client = Ollama::new(server.uri());
    let snapshots: Vec<String> = client.stream_completion("x").collect().await;

    assert_eq!(snapshots, vec!["I was"]);
}

#[tokio::test]
async fn done_without_text_yields_single_fallback() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/api/generate"))
        .respond_with(ndjson("{\"done\":true}\n"))
        .mount(&server)
        .await;

    let client = Ollama::new(server.uri());
    let snapshots: Vec<String> = client.stream_completion("x").collect().await;

    assert_eq!(snapshots, vec![FALLBACK_TEXT]);
}

#[tokio::test]
async fn empty_body_yields_single_fallback() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/api/generate"))
        .respond_with(ndjson(""))
        .mount(&server)
        .await;

    let client = Ollama::new(server.uri());
    let snapshots: Vec<String> = client.stream_completion("x").collect().await;

    assert_eq!(snapshots, vec![FALLBACK_TEXT]);
}

/// Read one HTTP request: headers plus a `content-length` body.
async fn read_request(socket: &mut TcpStream) {
    let mut request = Vec::new();
    let mut buf = [0u8; 4096];
    loop {
        let n = socket.read(&mut buf).await.unwrap();
        assert!(n > 0, "client closed before sending a request");
        request.extend_from_slice(&buf[..n]);

        let text = String::from_utf8_lossy(&request);
        if let Some(end) = text.find("\r\n\r\n") {
            let length = text[..end]
                .lines()
                .find_map(|line| {
                    let (name, value) = line.split_once(':')?;
                    name.eq_ignore_ascii_case("content-length")
                        .then(|| value.trim().parse::<usize>().ok())
                        .flatten()
                })
                .unwrap_or(0);
            if request.len() >= end + 4 + length {
                return;
            }
        }
    }
}

#[tokio::test]
async fn cancel_mid_stream_releases_connection() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    let server = tokio::spawn(async move {
        let (mut socket, _) = listener.accept().await.unwrap();
        read_request(&mut socket).await;

        let line = "{\"response\":\"Hi\"}\n";
        let head = "HTTP/1.1 200 OK\r\ncontent-type: application/x-ndjson\r\ntransfer-encoding: chunked\r\n\r\n";
        let chunk = format!("{:x}\r\n{line}\r\n", line.len());
        socket.write_all(head.as_bytes()).await.unwrap();
        socket.write_all(chunk.as_bytes()).await.unwrap();
        socket.flush().await.unwrap();

        // The body is never terminated; only the client can end this.
        let mut buf = [0u8; 1024];
        let read = tokio::time::timeout(Duration::from_secs(5), socket.read(&mut buf)).await;
        matches!(read, Ok(Ok(0)) | Ok(Err(_)))
    });

    let client = Ollama::new(format!("http://{addr}"));
    let mut stream = client.stream_completion("hi");
    assert_eq!(stream.next_snapshot().await.as_deref(), Some("Hi"));
    stream.cancel();

    assert!(server.await.unwrap(), "connection still open after cancel");
}

#[tokio::test]
async fn stream_is_lazy_until_polled() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/api/generate"))
        .respond_with(ndjson("{\"response\":\"x\",\"done\":true}\n"))
        .expect(0)
        .mount(&server)
        .await;

    let client = Ollama::new(server.uri());
    let stream = client.stream_completion("never sent");
    stream.cancel();
}

#[tokio::test]
async fn generate_returns_full_text() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/api/generate"))
        .and(body_partial_json(serde_json::json!({ "stream": false })))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "model": "gemma2:2b",
            "response": "Welcome to Hell.",
            "done": true
        })))
        .mount(&server)
        .await;

    let client = Ollama::new(server.uri());
    let text = client.generate("greet").await.unwrap();

    assert_eq!(text, "Welcome to Hell.");
}

#[tokio::test]
async fn generate_surfaces_api_errors() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/api/generate"))
        .respond_with(ResponseTemplate::new(404).set_body_string("model 'nope' not found"))
        .mount(&server)
        .await;

    let client = Ollama::new(server.uri()).with_model("nope");
    let err = client.generate("greet").await.unwrap_err();

    match err {
        ollama::Error::Api { status, message } => {
            assert_eq!(status, 404);
            assert!(message.contains("not found"));
        }
        other => panic!("expected API error, got {other:?}"),
    }
}
