//! Transport client tests against stub TCP backends.
//!
//! No live model is required: each test either binds a throwaway listener
//! that speaks just enough HTTP, or points the client at an address that is
//! guaranteed to fail in the way being tested.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use loreforge::{
    GenerationClient, GenerationConfig, GenerationError, RetryPolicy, SamplingOptions,
};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;

fn http_response(status: &str, body: &str) -> String {
    format!(
        "HTTP/1.1 {status}\r\ncontent-type: application/json\r\nconnection: close\r\ncontent-length: {}\r\n\r\n{body}",
        body.len()
    )
}

fn headers_end(buf: &[u8]) -> Option<usize> {
    buf.windows(4).position(|w| w == b"\r\n\r\n").map(|p| p + 4)
}

fn content_length(head: &[u8]) -> usize {
    String::from_utf8_lossy(head)
        .lines()
        .find_map(|line| {
            let (name, value) = line.split_once(':')?;
            if name.trim().eq_ignore_ascii_case("content-length") {
                value.trim().parse().ok()
            } else {
                None
            }
        })
        .unwrap_or(0)
}

/// Serves `response` to every connection, counting accepted connections.
async fn spawn_stub(response: String) -> (String, Arc<AtomicUsize>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let hits = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&hits);

    tokio::spawn(async move {
        loop {
            let (mut socket, _) = match listener.accept().await {
                Ok(conn) => conn,
                Err(_) => break,
            };
            counter.fetch_add(1, Ordering::SeqCst);
            let response = response.clone();
            tokio::spawn(async move {
                let mut buf = Vec::new();
                let mut chunk = [0u8; 4096];
                loop {
                    match socket.read(&mut chunk).await {
                        Ok(0) => break,
                        Ok(n) => {
                            buf.extend_from_slice(&chunk[..n]);
                            if let Some(end) = headers_end(&buf) {
                                if buf.len() >= end + content_length(&buf[..end]) {
                                    break;
                                }
                            }
                        }
                        Err(_) => break,
                    }
                }
                let _ = socket.write_all(response.as_bytes()).await;
                let _ = socket.shutdown().await;
            });
        }
    });

    (format!("http://{addr}"), hits)
}

/// Accepts connections but never answers, forcing the per-attempt timeout.
async fn spawn_silent_stub() -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        loop {
            let (mut socket, _) = match listener.accept().await {
                Ok(conn) => conn,
                Err(_) => break,
            };
            tokio::spawn(async move {
                let mut chunk = [0u8; 4096];
                while let Ok(n) = socket.read(&mut chunk).await {
                    if n == 0 {
                        break;
                    }
                }
            });
        }
    });
    format!("http://{addr}")
}

fn client_for(url: &str) -> GenerationClient {
    GenerationClient::new(
        GenerationConfig::default()
            .with_base_url(url)
            .with_model("gemma3"),
    )
}

#[tokio::test]
async fn connection_refused_exhausts_all_attempts_with_backoff() {
    // Bind and drop a listener so the port is almost certainly closed.
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let client = client_for(&format!("http://{addr}"));
    let retry = RetryPolicy::default()
        .with_max_attempts(3)
        .with_initial_delay(Duration::from_millis(40));

    let started = Instant::now();
    let err = client
        .generate_with("prompt", SamplingOptions::json_default(), retry)
        .await
        .unwrap_err();
    let elapsed = started.elapsed();

    match err {
        GenerationError::RetriesExhausted {
            attempts,
            url,
            model,
            last_error,
        } => {
            assert_eq!(attempts, 3);
            assert!(url.contains("127.0.0.1"));
            assert_eq!(model, "gemma3");
            assert!(
                last_error.contains("connection refused"),
                "last error was: {last_error}"
            );
        }
        other => panic!("unexpected error: {other:?}"),
    }

    // Two backoff sleeps: 40ms, then 40 * 1.5 = 60ms.
    assert!(elapsed >= Duration::from_millis(100), "elapsed: {elapsed:?}");
}

#[tokio::test]
async fn model_not_found_is_retried_per_attempt() {
    let (url, hits) = spawn_stub(http_response("404 Not Found", "")).await;
    let client = client_for(&url);
    let retry = RetryPolicy::default()
        .with_max_attempts(3)
        .with_initial_delay(Duration::from_millis(10));

    let err = client
        .generate_with("prompt", SamplingOptions::json_default(), retry)
        .await
        .unwrap_err();

    match err {
        GenerationError::RetriesExhausted {
            attempts,
            last_error,
            ..
        } => {
            assert_eq!(attempts, 3);
            assert!(last_error.contains("not found"), "last error: {last_error}");
        }
        other => panic!("unexpected error: {other:?}"),
    }
    assert_eq!(hits.load(Ordering::SeqCst), 3);
}

#[tokio::test]
async fn empty_completion_counts_as_a_failed_attempt() {
    let (url, hits) = spawn_stub(http_response("200 OK", r#"{"response":"   "}"#)).await;
    let client = client_for(&url);
    let retry = RetryPolicy::default()
        .with_max_attempts(2)
        .with_initial_delay(Duration::from_millis(10));

    let err = client
        .generate_with("prompt", SamplingOptions::json_default(), retry)
        .await
        .unwrap_err();

    match err {
        GenerationError::RetriesExhausted { last_error, .. } => {
            assert!(last_error.contains("empty response"), "last error: {last_error}");
        }
        other => panic!("unexpected error: {other:?}"),
    }
    assert_eq!(hits.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn malformed_body_counts_as_a_failed_attempt() {
    let (url, hits) = spawn_stub(http_response("200 OK", r#"{"done":true}"#)).await;
    let client = client_for(&url);
    let retry = RetryPolicy::default()
        .with_max_attempts(2)
        .with_initial_delay(Duration::from_millis(10));

    let err = client
        .generate_with("prompt", SamplingOptions::json_default(), retry)
        .await
        .unwrap_err();

    match err {
        GenerationError::RetriesExhausted { last_error, .. } => {
            assert!(last_error.contains("response"), "last error: {last_error}");
        }
        other => panic!("unexpected error: {other:?}"),
    }
    assert_eq!(hits.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn successful_generation_returns_trimmed_text() {
    let (url, hits) = spawn_stub(http_response(
        "200 OK",
        r#"{"response":"  The Rusty Anchor awaits.\n"}"#,
    ))
    .await;
    let client = client_for(&url);

    let text = client.generate_json("Create a tavern.").await.unwrap();
    assert_eq!(text, "The Rusty Anchor awaits.");
    assert_eq!(hits.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn unanswered_request_times_out_and_retries() {
    let url = spawn_silent_stub().await;
    let client = GenerationClient::new(
        GenerationConfig::default()
            .with_base_url(url)
            .with_timeout(Duration::from_millis(250)),
    );
    let retry = RetryPolicy::default()
        .with_max_attempts(2)
        .with_initial_delay(Duration::from_millis(20));

    let started = Instant::now();
    let err = client
        .generate_with("prompt", SamplingOptions::json_default(), retry)
        .await
        .unwrap_err();

    match err {
        GenerationError::RetriesExhausted {
            attempts,
            last_error,
            ..
        } => {
            assert_eq!(attempts, 2);
            assert!(last_error.contains("timed out"), "last error: {last_error}");
        }
        other => panic!("unexpected error: {other:?}"),
    }
    assert!(started.elapsed() >= Duration::from_millis(500));
}

#[tokio::test]
async fn dns_failure_aborts_without_retrying() {
    // RFC 2606 reserves .invalid, so resolution can never succeed.
    let client = GenerationClient::new(
        GenerationConfig::default()
            .with_base_url("http://loreforge-backend.invalid:11434")
            .with_timeout(Duration::from_secs(5)),
    );
    let retry = RetryPolicy::default()
        .with_max_attempts(4)
        .with_initial_delay(Duration::from_secs(2));

    let started = Instant::now();
    let err = client
        .generate_with("prompt", SamplingOptions::json_default(), retry)
        .await
        .unwrap_err();

    assert!(
        matches!(err, GenerationError::DnsFailure { .. }),
        "unexpected error: {err:?}"
    );
    // A single aborted attempt: none of the 2s backoff sleeps ran.
    assert!(started.elapsed() < Duration::from_secs(2));
}
