//! Invoke integration tests
//!
//! A throwaway HTTP server on a local port stands in for the running
//! function and hands back the raw request it received.

use funcbox::mock::MockDescriber;
use funcbox::{Client, Function, FunctionError, InvokeMessage, Job, NoOpHandler};
use std::path::Path;
use std::sync::Arc;
use tempfile::TempDir;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tokio_util::sync::CancellationToken;

const REPLY: &str = r#"{"status":"ok"}"#;

/// Serve one request; resolves to the request text as received
async fn serve_once() -> (u16, oneshot::Receiver<String>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    let (tx, rx) = oneshot::channel();

    tokio::spawn(async move {
        let (mut stream, _) = listener.accept().await.unwrap();
        let mut raw = Vec::new();
        let mut buf = [0u8; 4096];
        loop {
            let n = stream.read(&mut buf).await.unwrap();
            if n == 0 {
                break;
            }
            raw.extend_from_slice(&buf[..n]);
            if request_complete(&raw) {
                break;
            }
        }

        let response = format!(
            "HTTP/1.1 200 OK\r\nContent-Type: application/json\r\nX-Reply: yes\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
            REPLY.len(),
            REPLY
        );
        stream.write_all(response.as_bytes()).await.unwrap();
        stream.shutdown().await.ok();
        let _ = tx.send(String::from_utf8_lossy(&raw).to_string());
    });

    (port, rx)
}

fn request_complete(raw: &[u8]) -> bool {
    let text = String::from_utf8_lossy(raw);
    let Some((head, body)) = text.split_once("\r\n\r\n") else {
        return false;
    };
    let length = head
        .lines()
        .find_map(|line| {
            let (name, value) = line.split_once(':')?;
            name.eq_ignore_ascii_case("content-length")
                .then(|| value.trim().parse::<usize>().ok())
                .flatten()
        })
        .unwrap_or(0);
    body.len() >= length
}

fn client() -> Client {
    Client::builder()
        .with_registry("example.com/alice")
        .with_progress(Arc::new(NoOpHandler))
        .with_describer(Arc::new(MockDescriber::new()))
        .build()
}

fn create(root: &Path, template: &str) -> Function {
    client()
        .create(Function {
            root: root.to_path_buf(),
            runtime: "go".into(),
            template: template.into(),
            ..Default::default()
        })
        .unwrap()
}

#[tokio::test]
async fn test_invoke_cloudevent_sends_ce_headers() {
    let dir = TempDir::new().unwrap();
    let f = create(&dir.path().join("events"), "cloudevents");
    let (port, received) = serve_once().await;

    let message = InvokeMessage {
        id: "evt-1".into(),
        source: "/tests".into(),
        kind: "test.event".into(),
        data: r#"{"n":1}"#.into(),
        ..Default::default()
    };
    let url = format!("http://127.0.0.1:{}/", port);
    let response = client()
        .invoke(&CancellationToken::new(), &f.root, &url, &message)
        .await
        .unwrap();

    assert_eq!(response.body, REPLY);
    assert_eq!(response.headers.get("x-reply"), Some(&vec!["yes".to_string()]));

    let request = received.await.unwrap();
    let lower = request.to_lowercase();
    assert!(request.starts_with("POST / HTTP/1.1"));
    assert!(lower.contains("ce-id: evt-1"));
    assert!(lower.contains("ce-source: /tests"));
    assert!(lower.contains("ce-type: test.event"));
    assert!(lower.contains("ce-specversion: 1.0"));
    assert!(lower.contains("content-type: application/json"));
    assert!(request.ends_with(r#"{"n":1}"#));
}

#[tokio::test]
async fn test_invoke_http_sends_plain_post() {
    let dir = TempDir::new().unwrap();
    let f = create(&dir.path().join("hello"), "http");
    let (port, received) = serve_once().await;

    let url = format!("http://127.0.0.1:{}/", port);
    client()
        .invoke(&CancellationToken::new(), &f.root, &url, &InvokeMessage::default())
        .await
        .unwrap();

    let request = received.await.unwrap();
    assert!(!request.to_lowercase().contains("ce-id:"));
    assert!(request.ends_with(r#"{"message":"Hello World"}"#));
}

#[tokio::test]
async fn test_invoke_prefers_local_instance() {
    let dir = TempDir::new().unwrap();
    let f = create(&dir.path().join("hello"), "http");
    let (port, received) = serve_once().await;

    let job = Job::new(Function::load(&f.root).unwrap(), "127.0.0.1", port, || Ok(())).unwrap();
    let response = client()
        .invoke(&CancellationToken::new(), &f.root, "", &InvokeMessage::default())
        .await;
    job.stop().unwrap();

    assert_eq!(response.unwrap().body, REPLY);
    assert!(received.await.unwrap().starts_with("POST /"));
}

#[tokio::test]
async fn test_invoke_local_when_not_running() {
    let dir = TempDir::new().unwrap();
    let f = create(&dir.path().join("hello"), "http");

    let result = client()
        .invoke(&CancellationToken::new(), &f.root, "local", &InvokeMessage::default())
        .await;
    assert!(matches!(result, Err(FunctionError::NotRunning)));
}

#[tokio::test]
async fn test_invoke_falls_back_to_remote_route() {
    let dir = TempDir::new().unwrap();
    let f = create(&dir.path().join("hello"), "http");

    // The default describer reports no route for the deployed instance.
    let result = client()
        .invoke(&CancellationToken::new(), &f.root, "", &InvokeMessage::default())
        .await;
    assert!(matches!(result, Err(FunctionError::NotRunning)));
}

#[tokio::test]
async fn test_invoke_unsupported_format() {
    let dir = TempDir::new().unwrap();
    let f = create(&dir.path().join("hello"), "http");

    let message = InvokeMessage {
        format: Some("grpc".into()),
        ..Default::default()
    };
    let result = client()
        .invoke(&CancellationToken::new(), &f.root, "http://127.0.0.1:9/", &message)
        .await;
    match result {
        Err(FunctionError::Invoke { message, .. }) => assert!(message.contains("grpc")),
        other => panic!("Expected Invoke error, got {:?}", other),
    }
}

#[tokio::test]
async fn test_invoke_gives_up_after_client_timeout() {
    let dir = TempDir::new().unwrap();
    let f = create(&dir.path().join("hello"), "http");

    // Accepts the connection but never answers.
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    let server = tokio::spawn(async move {
        let (stream, _) = listener.accept().await.unwrap();
        tokio::time::sleep(std::time::Duration::from_secs(30)).await;
        drop(stream);
    });

    let client = Client::builder()
        .with_registry("example.com/alice")
        .with_progress(Arc::new(NoOpHandler))
        .with_invoke_timeout(std::time::Duration::from_millis(200))
        .build();
    let url = format!("http://127.0.0.1:{}/", port);
    let started = std::time::Instant::now();
    let result = client
        .invoke(&CancellationToken::new(), &f.root, &url, &InvokeMessage::default())
        .await;
    server.abort();

    assert!(matches!(result, Err(FunctionError::Invoke { .. })));
    assert!(started.elapsed() < std::time::Duration::from_secs(10));
}
