//! Integration tests for the deadline-bounded upload runner.

use cachicamo::blob::{BlobStore, Delayed, MemoryBlobStore};
use cachicamo::error::{Error, Result};
use cachicamo::runner::{BoundedRunner, Task, TaskOutcome};
use std::sync::Arc;
use std::time::Duration;

struct FailingStore;

impl BlobStore for FailingStore {
    fn save(&self, _name: &str, _bytes: &[u8]) -> Result<()> {
        Err(Error::Other("disk full".to_string()))
    }
}

struct PanickingStore;

impl BlobStore for PanickingStore {
    fn save(&self, _name: &str, _bytes: &[u8]) -> Result<()> {
        panic!("store blew up");
    }
}

fn slow_store(delay: Duration) -> (Arc<MemoryBlobStore>, Arc<dyn BlobStore>) {
    let inner = Arc::new(MemoryBlobStore::new());
    let store: Arc<dyn BlobStore> = Arc::new(Delayed::new(Arc::clone(&inner), delay));
    (inner, store)
}

// ---------------------------------------------------------------------------
// Completion wins
// ---------------------------------------------------------------------------

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn fast_save_reports_its_outcome() {
    let (inner, store) = slow_store(Duration::from_millis(50));
    let runner = BoundedRunner::new(store, Duration::from_secs(2));

    let exec = runner.execute(Task::new("fast.txt", b"hello".to_vec())).await;

    assert_eq!(exec.outcome, TaskOutcome::Saved);
    assert!(!exec.timed_out);
    assert!(exec.elapsed >= Duration::from_millis(50));
    assert!(exec.elapsed < Duration::from_secs(1), "took {:?}", exec.elapsed);
    assert_eq!(inner.get("fast.txt").as_deref(), Some(&b"hello"[..]));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn save_runs_exactly_once() {
    let store = Arc::new(MemoryBlobStore::new());
    let runner = BoundedRunner::new(store.clone(), Duration::from_secs(2));

    let exec = runner.execute(Task::new("once.txt", b"1".to_vec())).await;
    assert_eq!(exec.outcome, TaskOutcome::Saved);

    // Give a stray second save time to show up.
    tokio::time::sleep(Duration::from_millis(200)).await;
    assert_eq!(store.save_count(), 1);
    assert_eq!(runner.in_flight(), 0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn save_failure_is_not_a_timeout() {
    let runner = BoundedRunner::new(Arc::new(FailingStore), Duration::from_secs(2));

    let exec = runner.execute(Task::new("doomed.txt", b"x".to_vec())).await;

    assert!(!exec.timed_out);
    match &exec.outcome {
        TaskOutcome::SaveFailed(reason) => assert!(reason.contains("disk full")),
        other => panic!("expected SaveFailed, got {other:?}"),
    }
    assert!(matches!(exec.into_result(), Err(Error::SaveFailed(_))));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn panicking_worker_surfaces_as_save_failure() {
    let runner = BoundedRunner::new(Arc::new(PanickingStore), Duration::from_secs(2));

    let exec = runner.execute(Task::new("boom.txt", b"x".to_vec())).await;

    assert!(!exec.timed_out);
    assert!(matches!(exec.outcome, TaskOutcome::SaveFailed(_)));
    assert_eq!(runner.in_flight(), 0);
}

// ---------------------------------------------------------------------------
// Deadline wins
// ---------------------------------------------------------------------------

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn slow_save_times_out_at_deadline_and_still_lands() {
    // deadline 3 units, save 10 units (1 unit = 100ms)
    let (inner, store) = slow_store(Duration::from_millis(1000));
    let runner = BoundedRunner::new(store, Duration::from_millis(300));

    let exec = runner.execute(Task::new("slow.bin", vec![7u8; 64])).await;

    assert_eq!(exec.outcome, TaskOutcome::TimedOut);
    assert!(exec.timed_out);
    assert!(exec.elapsed >= Duration::from_millis(300));
    assert!(exec.elapsed < Duration::from_millis(800), "took {:?}", exec.elapsed);
    assert!(matches!(exec.into_result(), Err(Error::TimedOut)));

    // The worker is still saving in the background.
    assert_eq!(runner.in_flight(), 1);
    assert!(inner.get("slow.bin").is_none());

    tokio::time::sleep(Duration::from_millis(1200)).await;

    assert_eq!(inner.get("slow.bin").as_deref(), Some(&[7u8; 64][..]));
    assert_eq!(inner.save_count(), 1);
    assert_eq!(runner.in_flight(), 0, "worker leaked after late completion");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn timeout_latency_does_not_depend_on_save_duration() {
    let (_inner, store) = slow_store(Duration::from_secs(3));
    let runner = BoundedRunner::new(store, Duration::from_millis(100));

    let exec = runner.execute(Task::new("glacial.bin", vec![0u8; 8])).await;

    assert!(exec.timed_out);
    assert!(exec.elapsed < Duration::from_millis(600), "took {:?}", exec.elapsed);
}

#[test]
fn worker_skips_save_when_waiter_is_already_gone() {
    let rt = tokio::runtime::Builder::new_multi_thread()
        .worker_threads(1)
        .max_blocking_threads(1)
        .enable_all()
        .build()
        .unwrap();

    rt.block_on(async {
        let store = Arc::new(MemoryBlobStore::new());
        let runner = BoundedRunner::new(store.clone(), Duration::from_millis(100));

        // Occupy the only blocking thread so the worker cannot start in time.
        let blocker = tokio::task::spawn_blocking(|| {
            std::thread::sleep(Duration::from_millis(400));
        });

        let exec = runner.execute(Task::new("late.txt", b"x".to_vec())).await;
        assert!(exec.timed_out);

        blocker.await.unwrap();
        tokio::time::sleep(Duration::from_millis(300)).await;

        assert_eq!(store.save_count(), 0);
        assert!(store.get("late.txt").is_none());
        assert_eq!(runner.in_flight(), 0);
    });
}
