//! Common test utilities for xavyo-connector-incidentio integration tests.

#![allow(dead_code)]

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::{json, Value};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use wiremock::{MockServer, Request, Respond, ResponseTemplate};
use xavyo_connector_incidentio::{
    Clock, IncidentIoClient, IncidentIoConfig, IncidentIoConfigBuilder, RateLimitConfig,
};

pub const TEST_API_KEY: &str = "test-api-key";

/// Test data factory for schedules.
pub fn schedule_json(id: &str, name: &str) -> Value {
    json!({ "id": id, "name": name, "timezone": "Europe/London" })
}

/// Test data factory for users.
pub fn user_json(id: &str, name: &str) -> Value {
    json!({
        "id": id,
        "name": name,
        "email": format!("{}@example.com", name.to_lowercase()),
        "role": "responder"
    })
}

/// Test data factory for schedule entries covering the current hour.
pub fn entry_json(entry_id: &str, schedule_id: &str, user_id: &str, email: &str) -> Value {
    json!({
        "entry_id": entry_id,
        "schedule_id": schedule_id,
        "start_at": "2026-01-01T00:00:00Z",
        "end_at": "2030-01-01T00:00:00Z",
        "user": { "id": user_id, "name": user_id, "email": email }
    })
}

/// Wraps items in a list envelope under `key`.
pub fn list_envelope(key: &str, items: Vec<Value>, after: Option<&str>) -> Value {
    let count = items.len();
    let mut envelope = json!({
        "pagination_meta": {
            "after": after.unwrap_or(""),
            "page_size": 250,
            "total_record_count": count
        }
    });
    envelope[key] = Value::Array(items);
    envelope
}

/// Creates an upstream error envelope.
pub fn error_envelope(error_type: &str, status: u16, message: &str) -> Value {
    json!({
        "type": error_type,
        "status": status,
        "message": message,
        "request_id": "req-test-1"
    })
}

/// A rate-limited response.
pub fn too_many_requests(retry_after: Option<&str>) -> ResponseTemplate {
    let template = ResponseTemplate::new(429).set_body_json(error_envelope(
        "rate_limited",
        429,
        "Too many requests",
    ));
    match retry_after {
        Some(value) => template.insert_header("Retry-After", value),
        None => template,
    }
}

/// Client builder pointed at `base_url` with a high rate so tests are not throttled.
pub fn config_builder(base_url: &str) -> IncidentIoConfigBuilder {
    IncidentIoConfig::builder()
        .api_key(TEST_API_KEY)
        .base_url(base_url)
        .rate_limit(RateLimitConfig::new(1000))
}

pub fn test_client(server: &MockServer) -> IncidentIoClient {
    IncidentIoClient::new(config_builder(&server.uri()).build().unwrap()).unwrap()
}

/// Client whose retry waits are recorded instead of slept.
pub fn recording_client(server: &MockServer) -> (IncidentIoClient, Arc<RecordingClock>) {
    let clock = Arc::new(RecordingClock::default());
    let client = test_client(server).with_clock(clock.clone());
    (client, clock)
}

/// Clock that records requested sleeps and returns immediately.
#[derive(Debug, Default)]
pub struct RecordingClock {
    sleeps: Mutex<Vec<Duration>>,
}

impl RecordingClock {
    pub fn sleeps(&self) -> Vec<Duration> {
        self.sleeps.lock().unwrap().clone()
    }
}

#[async_trait]
impl Clock for RecordingClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }

    async fn sleep(&self, duration: Duration) {
        self.sleeps.lock().unwrap().push(duration);
    }
}

/// Responds with each template in turn, repeating the last one.
pub struct SequenceResponder {
    calls: AtomicUsize,
    responses: Vec<ResponseTemplate>,
}

impl SequenceResponder {
    pub fn new(responses: Vec<ResponseTemplate>) -> Self {
        assert!(!responses.is_empty());
        Self {
            calls: AtomicUsize::new(0),
            responses,
        }
    }
}

impl Respond for SequenceResponder {
    fn respond(&self, _request: &Request) -> ResponseTemplate {
        let call = self.calls.fetch_add(1, Ordering::SeqCst);
        let index = call.min(self.responses.len() - 1);
        self.responses[index].clone()
    }
}

/// Serves schedules in pages of `page_size`, keyed by the `after` cursor.
pub struct PagedSchedules {
    pub schedules: Vec<Value>,
    pub page_size: usize,
}

impl Respond for PagedSchedules {
    fn respond(&self, request: &Request) -> ResponseTemplate {
        let offset: usize = request
            .url
            .query_pairs()
            .find(|(k, _)| k == "after")
            .and_then(|(_, v)| v.strip_prefix("offset-").and_then(|n| n.parse().ok()))
            .unwrap_or(0);
        let end = (offset + self.page_size).min(self.schedules.len());
        let page = self.schedules[offset..end].to_vec();
        let after = (end < self.schedules.len()).then(|| format!("offset-{end}"));
        ResponseTemplate::new(200).set_body_json(list_envelope("schedules", page, after.as_deref()))
    }
}

/// Raw TCP server that answers every connection with a chunked body that
/// never ends and carries no `Content-Length`. Returns its base URL.
pub async fn spawn_endless_body_server() -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        while let Ok((mut socket, _)) = listener.accept().await {
            tokio::spawn(async move {
                let mut request = [0u8; 4096];
                let _ = socket.read(&mut request).await;
                let head = "HTTP/1.1 200 OK\r\ncontent-type: application/json\r\ntransfer-encoding: chunked\r\n\r\n";
                if socket.write_all(head.as_bytes()).await.is_err() {
                    return;
                }
                let chunk = vec![b' '; 4096];
                loop {
                    let mut frame = format!("{:x}\r\n", chunk.len()).into_bytes();
                    frame.extend_from_slice(&chunk);
                    frame.extend_from_slice(b"\r\n");
                    if socket.write_all(&frame).await.is_err() {
                        return;
                    }
                }
            });
        }
    });

    format!("http://{addr}")
}

/// Raw TCP server that accepts connections and never answers. Returns its base URL.
pub async fn spawn_silent_server() -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        let mut held = Vec::new();
        while let Ok((socket, _)) = listener.accept().await {
            held.push(socket);
        }
    });

    format!("http://{addr}")
}
