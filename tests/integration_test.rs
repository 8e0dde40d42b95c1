//! Full integration test: real listener, filesystem store, HTTP client.
//!
//! Exercises upload (fast and timed out), the visitor counter and the
//! phrase checker over TCP.

use cachicamo::blob::{BlobStore, Delayed, FsBlobStore};
use cachicamo::counter::VisitorCounter;
use cachicamo::runner::BoundedRunner;
use cachicamo::server::{AppState, serve};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::oneshot;

struct TestServer {
    base: String,
    shutdown: Option<oneshot::Sender<()>>,
    handle: tokio::task::JoinHandle<()>,
}

impl TestServer {
    async fn start(store: Arc<dyn BlobStore>, deadline: Duration) -> Self {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let state = AppState::new(
            BoundedRunner::new(store, deadline),
            Arc::new(VisitorCounter::new()),
        );
        let (tx, rx) = oneshot::channel::<()>();
        let handle = tokio::spawn(async move {
            serve(listener, state, async {
                rx.await.ok();
            })
            .await
            .expect("server run");
        });
        Self {
            base: format!("http://{addr}"),
            shutdown: Some(tx),
            handle,
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base)
    }

    async fn stop(mut self) {
        if let Some(tx) = self.shutdown.take() {
            tx.send(()).ok();
        }
        let _ = tokio::time::timeout(Duration::from_secs(2), self.handle).await;
    }
}

fn file_form(name: &str, bytes: &'static [u8]) -> reqwest::multipart::Form {
    reqwest::multipart::Form::new().part(
        "file",
        reqwest::multipart::Part::bytes(bytes).file_name(name.to_string()),
    )
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn full_lifecycle_over_tcp() {
    let dir = tempfile::tempdir().unwrap();
    let server = TestServer::start(
        Arc::new(FsBlobStore::new(dir.path().join("Uploads"))),
        Duration::from_secs(2),
    )
    .await;
    let client = reqwest::Client::new();

    // Upload
    let response = client
        .post(server.url("/api/upload"))
        .multipart(file_form("hello.txt", b"hello world"))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), reqwest::StatusCode::OK);
    assert_eq!(response.text().await.unwrap(), "'hello.txt' uploaded!");
    let written = std::fs::read(dir.path().join("Uploads").join("hello.txt")).unwrap();
    assert_eq!(written, b"hello world");

    // Visitors: five concurrent adds
    let adds: Vec<_> = (0..5)
        .map(|_| {
            let client = client.clone();
            let url = server.url("/api/addVisitor");
            tokio::spawn(async move { client.get(url).send().await.unwrap().status() })
        })
        .collect();
    for add in adds {
        assert_eq!(add.await.unwrap(), reqwest::StatusCode::OK);
    }
    let response = client
        .get(server.url("/api/subtractVisitor"))
        .send()
        .await
        .unwrap();
    assert_eq!(response.text().await.unwrap(), "Visitor Count: 4\n");

    // Phrase
    let response = client
        .post(server.url("/api/testPhrase"))
        .json(&serde_json::json!({"phrase": "FIZZ:FUZZ:TOOR"}))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), reqwest::StatusCode::OK);

    server.stop().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn timed_out_upload_still_lands_on_disk() {
    let dir = tempfile::tempdir().unwrap();
    let store = Delayed::new(FsBlobStore::new(dir.path()), Duration::from_millis(1000));
    let server = TestServer::start(Arc::new(store), Duration::from_millis(300)).await;
    let client = reqwest::Client::new();

    let started = std::time::Instant::now();
    let response = client
        .post(server.url("/api/upload"))
        .multipart(file_form("late.txt", b"eventually"))
        .send()
        .await
        .unwrap();
    let waited = started.elapsed();

    assert_eq!(response.status(), reqwest::StatusCode::GATEWAY_TIMEOUT);
    let body: serde_json::Value = response.json().await.unwrap();
    assert_eq!(body["code"], "TIMED_OUT");
    assert!(waited < Duration::from_millis(900), "waited {waited:?}");
    assert!(!dir.path().join("late.txt").exists());

    tokio::time::sleep(Duration::from_millis(1200)).await;
    let written = std::fs::read(dir.path().join("late.txt")).unwrap();
    assert_eq!(written, b"eventually");

    server.stop().await;
}
