//! End-to-end exchange against a canned local HTTP server

use std::time::Duration;

use medifind_core::{exchange, ChatSession, GeminiClient, Notice, Outcome, Reply};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;

/// Serve exactly one HTTP response, then return the raw request that was received
async fn serve_once(status: &'static str, body: String) -> (String, tokio::task::JoinHandle<String>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let base = format!("http://{}/v1beta", listener.local_addr().unwrap());

    let handle = tokio::spawn(async move {
        let (mut socket, _) = listener.accept().await.unwrap();
        let mut received = Vec::new();
        let mut buf = [0u8; 8192];

        // Read headers, then as much body as Content-Length announces
        loop {
            let n = socket.read(&mut buf).await.unwrap();
            if n == 0 {
                break;
            }
            received.extend_from_slice(&buf[..n]);
            let text = String::from_utf8_lossy(&received).to_string();
            if let Some(header_end) = text.find("\r\n\r\n") {
                let content_length = text[..header_end]
                    .lines()
                    .find_map(|l| {
                        let lower = l.to_ascii_lowercase();
                        lower
                            .strip_prefix("content-length:")
                            .map(|v| v.trim().parse::<usize>().unwrap_or(0))
                    })
                    .unwrap_or(0);
                if received.len() >= header_end + 4 + content_length {
                    break;
                }
            }
        }

        let response = format!(
            "HTTP/1.1 {}\r\ncontent-type: application/json\r\ncontent-length: {}\r\nconnection: close\r\n\r\n{}",
            status,
            body.len(),
            body
        );
        socket.write_all(response.as_bytes()).await.unwrap();
        socket.shutdown().await.ok();
        String::from_utf8_lossy(&received).to_string()
    });

    (base, handle)
}

fn client(base: &str) -> GeminiClient {
    GeminiClient::with_options("test-key", base, "gemini-test", Duration::from_secs(5))
}

fn envelope(text: &str) -> String {
    serde_json::json!({
        "candidates": [{ "content": { "role": "model", "parts": [{ "text": text }] } }]
    })
    .to_string()
}

#[tokio::test]
async fn test_structured_success_round_trip() {
    let records = r#"{"medicines":[{"medicineName":"Cetirizine","type":"Generic","commonUse":"Allergy relief","price":"INR 25","instructions":"Once daily","effectiveness":88,"sideEffects":"Drowsiness"}]}"#;
    let (base, server) = serve_once("200 OK", envelope(records)).await;

    let mut session = ChatSession::new();
    let dispatch = session.begin_send("sneezing").unwrap();
    assert!(session.is_waiting());

    let outcome = exchange(&client(&base), &dispatch.request).await;
    let replies = session.resolve(dispatch.id, outcome).unwrap();

    assert!(!session.is_waiting());
    assert_eq!(session.conversation().len(), 2);
    match &replies[0] {
        Reply::Medicines(list) => {
            assert_eq!(list[0].name, "Cetirizine");
            assert_eq!(list[0].effectiveness, 88);
        }
        other => panic!("unexpected {:?}", other),
    }
    assert_eq!(replies[1], Reply::Notice(Notice::Disclaimer));

    let request = server.await.unwrap();
    assert!(request.starts_with("POST /v1beta/models/gemini-test:generateContent HTTP/1.1"));
    assert!(request.to_ascii_lowercase().contains("x-goog-api-key: test-key"));
    assert!(request.contains("responseSchema"));
    assert!(request.contains("sneezing"));
}

#[tokio::test]
async fn test_empty_success() {
    let (base, _server) = serve_once("200 OK", envelope(r#"{"medicines":[]}"#)).await;
    let mut session = ChatSession::new();
    let dispatch = session.begin_send("unknown thing").unwrap();

    let outcome = exchange(&client(&base), &dispatch.request).await;
    assert_eq!(outcome, Outcome::Empty);
    let replies = session.resolve(dispatch.id, outcome).unwrap();
    assert_eq!(replies, vec![Reply::Notice(Notice::NoResults)]);
    assert_eq!(session.conversation().len(), 1);
}

#[tokio::test]
async fn test_malformed_success() {
    let (base, _server) = serve_once("200 OK", r#"{"candidates":[{"content":{"parts":[]}}]}"#.to_string()).await;
    let mut session = ChatSession::new();
    let dispatch = session.begin_send("headache").unwrap();

    let outcome = exchange(&client(&base), &dispatch.request).await;
    assert!(matches!(outcome, Outcome::Malformed(_)));
    let replies = session.resolve(dispatch.id, outcome).unwrap();
    assert_eq!(replies, vec![Reply::Notice(Notice::Unstructured)]);
    assert_eq!(session.conversation().len(), 1);
    assert!(!session.is_waiting());
}

#[tokio::test]
async fn test_http_error_status() {
    let (base, _server) = serve_once("500 Internal Server Error", r#"{"error":"boom"}"#.to_string()).await;
    let mut session = ChatSession::new();
    let dispatch = session.begin_send("headache").unwrap();

    let outcome = exchange(&client(&base), &dispatch.request).await;
    assert!(matches!(outcome, Outcome::TransportFailure(ref r) if r.contains("500")));
    let replies = session.resolve(dispatch.id, outcome).unwrap();
    assert_eq!(replies, vec![Reply::Notice(Notice::RequestFailed)]);
    assert!(!session.is_waiting());
}

#[tokio::test]
async fn test_connection_refused() {
    // Bind then drop to get a port nothing listens on
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let base = format!("http://{}/v1beta", listener.local_addr().unwrap());
    drop(listener);

    let mut session = ChatSession::new();
    let dispatch = session.begin_send("headache").unwrap();
    let outcome = exchange(&client(&base), &dispatch.request).await;
    match outcome {
        Outcome::TransportFailure(reason) => {
            assert!(!reason.contains("test-key"), "{}", reason);
            assert!(!reason.contains("generateContent"), "{}", reason);
        }
        other => panic!("unexpected {:?}", other),
    }
}

#[tokio::test]
async fn test_configured_timeout_applies() {
    // Accept the connection but never answer
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let base = format!("http://{}/v1beta", listener.local_addr().unwrap());
    let _server = tokio::spawn(async move {
        let (socket, _) = listener.accept().await.unwrap();
        tokio::time::sleep(Duration::from_secs(30)).await;
        drop(socket);
    });

    let client = GeminiClient::with_options("test-key", &base, "gemini-test", Duration::from_millis(300));
    let mut session = ChatSession::new();
    let dispatch = session.begin_send("headache").unwrap();

    let started = std::time::Instant::now();
    let outcome = exchange(&client, &dispatch.request).await;
    assert!(started.elapsed() < Duration::from_secs(10));
    match outcome {
        Outcome::TransportFailure(reason) => assert!(!reason.contains("test-key"), "{}", reason),
        other => panic!("unexpected {:?}", other),
    }
}
