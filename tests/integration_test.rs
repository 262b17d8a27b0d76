//! Tests de integración para el gateway
//! tests/integration_test.rs
//!
//! Cada test levanta su propio servidor en un puerto efímero, con un motor
//! de prueba, y lo maneja por `TcpStream` como lo haría un cliente real.

use chrono::DateTime;
use flate2::read::GzDecoder;
use optimization_gateway::config::Config;
use optimization_gateway::engine::EngineError;
use optimization_gateway::jobs::{JobManager, JobManagerConfig};
use optimization_gateway::server::{Server, ShutdownHandle};
use serde_json::{json, Value};
use std::io::{Read, Write};
use std::net::{SocketAddr, TcpStream};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

/// Lo que tarda el motor de prueba en cada llamada
const ENGINE_DELAY: Duration = Duration::from_millis(300);

/// Motor de prueba: `{"x": n}` → `{"y": n + 1}` tras `ENGINE_DELAY`; "bad input" si no hay `x`
fn test_engine(input: &Value) -> Result<Value, EngineError> {
    thread::sleep(ENGINE_DELAY);
    match input.get("x").and_then(Value::as_i64) {
        Some(x) => Ok(json!({"y": x + 1})),
        None => Err(EngineError::failed("bad input")),
    }
}

struct TestServer {
    addr: SocketAddr,
    shutdown: ShutdownHandle,
    manager: Arc<JobManager>,
    thread: Option<JoinHandle<std::io::Result<()>>>,
}

impl TestServer {
    fn start(jobs: JobManagerConfig) -> Self {
        let mut config = Config::default();
        config.port = 0;
        config.retry_after_ms = 2_000;

        let manager = Arc::new(JobManager::new(jobs, Arc::new(test_engine)).unwrap());
        let server = Server::bind(config, Arc::clone(&manager)).unwrap();
        let addr = server.local_addr().unwrap();
        let shutdown = server.shutdown_handle().unwrap();
        let thread = thread::spawn(move || server.run());

        Self {
            addr,
            shutdown,
            manager,
            thread: Some(thread),
        }
    }

    /// Envía un request crudo y retorna (status, headers, body)
    fn send(&self, raw: &[u8]) -> (u16, String, Vec<u8>) {
        let mut stream = TcpStream::connect(self.addr).unwrap();
        stream.set_read_timeout(Some(Duration::from_secs(5))).unwrap();
        stream.write_all(raw).unwrap();
        stream.flush().unwrap();

        let mut response = Vec::new();
        stream.read_to_end(&mut response).unwrap();

        let split = response
            .windows(4)
            .position(|w| w == b"\r\n\r\n")
            .expect("response without header terminator");
        let head = String::from_utf8_lossy(&response[..split]).into_owned();
        let body = response[split + 4..].to_vec();
        let status = head
            .split_whitespace()
            .nth(1)
            .and_then(|code| code.parse().ok())
            .unwrap();

        (status, head, body)
    }

    fn get(&self, path: &str) -> (u16, Value) {
        let (status, _, body) = self.send(format!("GET {} HTTP/1.1\r\n\r\n", path).as_bytes());
        (status, serde_json::from_slice(&body).unwrap())
    }

    fn post_json(&self, body: &str) -> (u16, String, Value) {
        let raw = format!(
            "POST /run HTTP/1.1\r\nContent-Type: application/json\r\nContent-Length: {}\r\n\r\n{}",
            body.len(),
            body
        );
        let (status, head, body) = self.send(raw.as_bytes());
        (status, head, serde_json::from_slice(&body).unwrap())
    }

    fn wait_terminal(&self, job_id: &str) -> Value {
        let deadline = Instant::now() + Duration::from_secs(5);
        loop {
            let (_, record) = self.get(&format!("/status/{}", job_id));
            if record["status"] != "processing" || Instant::now() > deadline {
                return record;
            }
            thread::sleep(Duration::from_millis(10));
        }
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.shutdown.shutdown();
        if let Some(thread) = self.thread.take() {
            let _ = thread.join();
        }
        self.manager.shutdown();
    }
}

#[test]
fn test_submit_then_poll_until_completed() {
    let server = TestServer::start(JobManagerConfig::default());

    let started = Instant::now();
    let (status, _, body) = server.post_json(r#"{"x": 1}"#);
    assert_eq!(status, 202);
    // Responde sin esperar al motor
    assert!(started.elapsed() < ENGINE_DELAY / 2);
    assert_eq!(body["message"], "Optimization job started");
    let job_id = body["job_id"].as_str().unwrap().to_string();

    let (status, record) = server.get(&format!("/status/{}", job_id));
    assert_eq!(status, 200);
    assert_eq!(record["status"], "processing");
    assert!(record.get("result").is_none());

    let record = server.wait_terminal(&job_id);
    assert_eq!(record["status"], "completed");
    assert_eq!(record["result"], json!({"y": 2}));
    assert!(record.get("error").is_none());
    assert!(record["execution_time"].as_f64().unwrap() >= ENGINE_DELAY.as_secs_f64());

    let created = DateTime::parse_from_rfc3339(record["created_at"].as_str().unwrap()).unwrap();
    let updated = DateTime::parse_from_rfc3339(record["updated_at"].as_str().unwrap()).unwrap();
    assert!(created <= updated);
}

#[test]
fn test_engine_failure_is_reported() {
    let server = TestServer::start(JobManagerConfig::default());

    let (status, _, body) = server.post_json(r#"{"z": 1}"#);
    assert_eq!(status, 202);

    let record = server.wait_terminal(body["job_id"].as_str().unwrap());
    assert_eq!(record["status"], "failed");
    assert_eq!(record["error"], "bad input");
    assert_eq!(record["error_kind"], "engine");
    assert!(record.get("result").is_none());
}

#[test]
fn test_unknown_job_id() {
    let server = TestServer::start(JobManagerConfig::default());

    let (status, body) = server.get("/status/00000000-0000-4000-8000-000000000000");
    assert_eq!(status, 404);
    assert_eq!(body, json!({"error": "Job ID not found"}));
}

#[test]
fn test_concurrent_submissions_are_listed() {
    let server = Arc::new(TestServer::start(JobManagerConfig::default()));

    let handles: Vec<_> = (0..2)
        .map(|i| {
            let server = Arc::clone(&server);
            thread::spawn(move || server.post_json(&format!(r#"{{"x": {}}}"#, i)).2)
        })
        .collect();
    let ids: Vec<String> = handles
        .into_iter()
        .map(|h| h.join().unwrap()["job_id"].as_str().unwrap().to_string())
        .collect();

    assert_ne!(ids[0], ids[1]);

    let (status, listing) = server.get("/jobs");
    assert_eq!(status, 200);
    assert_eq!(listing["total_jobs"], 2);
    for id in &ids {
        assert!(listing["jobs"].get(id).is_some());
    }
}

#[test]
fn test_rejects_bad_submissions() {
    let server = TestServer::start(JobManagerConfig::default());

    let (status, _, _) = server.send(b"POST /run HTTP/1.1\r\nContent-Type: text/plain\r\nContent-Length: 8\r\n\r\n{\"x\": 1}");
    assert_eq!(status, 415);

    let (status, _, body) = server.post_json("");
    assert_eq!(status, 400);
    assert_eq!(body["error"], "Request body cannot be empty");

    let (status, _, _) = server.post_json("{broken");
    assert_eq!(status, 400);

    let (_, listing) = server.get("/jobs");
    assert_eq!(listing["total_jobs"], 0);
}

#[test]
fn test_queue_full_returns_503_with_retry_after() {
    let server = TestServer::start(JobManagerConfig {
        workers: 1,
        queue_capacity: 1,
        ..JobManagerConfig::default()
    });

    let results: Vec<(u16, String)> = (0..5)
        .map(|i| {
            let (status, head, _) = server.post_json(&format!(r#"{{"x": {}}}"#, i));
            (status, head)
        })
        .collect();

    let accepted = results.iter().filter(|(status, _)| *status == 202).count();
    let rejected: Vec<&String> = results
        .iter()
        .filter(|(status, _)| *status == 503)
        .map(|(_, head)| head)
        .collect();

    assert!(accepted >= 1);
    assert_eq!(accepted + rejected.len(), 5);
    assert!(!rejected.is_empty());
    assert!(rejected[0].contains("Retry-After: 2"));

    let (_, listing) = server.get("/jobs");
    assert_eq!(listing["total_jobs"], accepted);
}

#[test]
fn test_health_and_method_not_allowed() {
    let server = TestServer::start(JobManagerConfig::default());

    let (status, body) = server.get("/health");
    assert_eq!(status, 200);
    assert_eq!(body["status"], "healthy");

    let (status, head, _) = server.send(b"DELETE /health HTTP/1.1\r\n\r\n");
    assert_eq!(status, 405);
    assert!(head.contains("Allow: GET"));

    let (status, body) = server.get("/does-not-exist");
    assert_eq!(status, 404);
    assert_eq!(body["error"], "Resource not found");
}

#[test]
fn test_large_listing_is_gzipped() {
    let server = TestServer::start(JobManagerConfig::default());

    for i in 0..20 {
        server.post_json(&format!(r#"{{"x": {}}}"#, i));
    }

    let (status, head, body) =
        server.send(b"GET /jobs HTTP/1.1\r\nAccept-Encoding: gzip\r\n\r\n");
    assert_eq!(status, 200);
    assert!(head.contains("Content-Encoding: gzip"));

    let mut decoded = String::new();
    GzDecoder::new(&body[..]).read_to_string(&mut decoded).unwrap();
    let listing: Value = serde_json::from_str(&decoded).unwrap();
    assert_eq!(listing["total_jobs"], 20);
}
