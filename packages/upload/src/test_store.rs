//! In-memory [`ObjectStore`] and filesystem fixtures for tests.

use std::collections::{BTreeMap, BTreeSet};
use std::path::PathBuf;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use doc_archive_r2::{ObjectStore, R2Error};
use doc_archive_upload_models::progress::ProgressCallback;
use doc_archive_upload_models::{BatchResult, TaskOutcome};

/// An object held by [`MemoryStore`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredObject {
    pub body: Vec<u8>,
    pub content_type: String,
}

/// Object store backed by a map, with injectable failures.
///
/// Every `exists` and `put` yields once before answering so that all
/// pipelines in a group are in flight together.
#[derive(Default)]
pub struct MemoryStore {
    objects: Mutex<BTreeMap<String, StoredObject>>,
    probe_failures: Mutex<BTreeMap<String, u32>>,
    put_failures: Mutex<BTreeMap<String, u32>>,
    hanging_puts: Mutex<BTreeSet<String>>,
    events: Mutex<Vec<String>>,
    bucket_denied: AtomicBool,
    puts: AtomicUsize,
    active: AtomicUsize,
    peak: AtomicUsize,
}

impl MemoryStore {
    pub fn insert(&self, key: &str, body: &[u8]) {
        self.objects.lock().unwrap().insert(
            key.to_string(),
            StoredObject {
                body: body.to_vec(),
                content_type: "application/octet-stream".to_string(),
            },
        );
    }

    /// Fails the next `times` probes of `key`. `u32::MAX` fails forever.
    pub fn fail_probe(&self, key: &str, times: u32) {
        self.probe_failures
            .lock()
            .unwrap()
            .insert(key.to_string(), times);
    }

    /// Fails the next `times` puts of `key`. `u32::MAX` fails forever.
    pub fn fail_put(&self, key: &str, times: u32) {
        self.put_failures
            .lock()
            .unwrap()
            .insert(key.to_string(), times);
    }

    /// Makes the bucket check fail, as with a wrong bucket or bad credentials.
    pub fn deny_bucket(&self) {
        self.bucket_denied.store(true, Ordering::SeqCst);
    }

    /// Makes every put of `key` wait forever.
    pub fn hang_put(&self, key: &str) {
        self.hanging_puts.lock().unwrap().insert(key.to_string());
    }

    pub fn object(&self, key: &str) -> Option<StoredObject> {
        self.objects.lock().unwrap().get(key).cloned()
    }

    pub fn object_count(&self) -> usize {
        self.objects.lock().unwrap().len()
    }

    /// Number of `put` calls that reached the store, including failed ones.
    pub fn put_calls(&self) -> usize {
        self.puts.load(Ordering::SeqCst)
    }

    /// `probe:{key}` and `stored:{key}` entries in call order.
    pub fn events(&self) -> Vec<String> {
        self.events.lock().unwrap().clone()
    }

    /// Highest number of store calls in flight at once.
    ///
    /// A pipeline has at most one call outstanding, so this is also a lower
    /// bound on how many pipelines ran together.
    pub fn peak(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }

    fn take_failure(failures: &Mutex<BTreeMap<String, u32>>, key: &str) -> bool {
        let mut failures = failures.lock().unwrap();
        let Some(remaining) = failures.get_mut(key) else {
            return false;
        };
        match *remaining {
            0 => false,
            u32::MAX => true,
            _ => {
                *remaining -= 1;
                true
            }
        }
    }
}

/// Counts one store call as in flight until dropped, including when the
/// call errors or its future is cancelled by a timeout.
struct InFlight<'a>(&'a MemoryStore);

impl<'a> InFlight<'a> {
    fn enter(store: &'a MemoryStore) -> Self {
        let now = store.active.fetch_add(1, Ordering::SeqCst) + 1;
        store.peak.fetch_max(now, Ordering::SeqCst);
        Self(store)
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.active.fetch_sub(1, Ordering::SeqCst);
    }
}

#[async_trait::async_trait]
impl ObjectStore for MemoryStore {
    async fn check_bucket(&self) -> Result<(), R2Error> {
        if self.bucket_denied.load(Ordering::SeqCst) {
            return Err(R2Error::Bucket {
                bucket: "test".to_string(),
                source: "no such bucket".into(),
            });
        }
        Ok(())
    }

    async fn exists(&self, key: &str) -> Result<bool, R2Error> {
        self.events.lock().unwrap().push(format!("probe:{key}"));
        let _in_flight = InFlight::enter(self);

        tokio::task::yield_now().await;

        if Self::take_failure(&self.probe_failures, key) {
            return Err(R2Error::Head {
                bucket: "test".to_string(),
                key: key.to_string(),
                source: "connection reset".into(),
            });
        }

        Ok(self.objects.lock().unwrap().contains_key(key))
    }

    async fn put(&self, key: &str, body: Vec<u8>, content_type: &str) -> Result<(), R2Error> {
        self.puts.fetch_add(1, Ordering::SeqCst);
        let _in_flight = InFlight::enter(self);
        tokio::task::yield_now().await;

        if self.hanging_puts.lock().unwrap().contains(key) {
            std::future::pending::<()>().await;
        }

        if Self::take_failure(&self.put_failures, key) {
            return Err(R2Error::Upload {
                bucket: "test".to_string(),
                key: key.to_string(),
                source: "access denied".into(),
            });
        }

        self.objects.lock().unwrap().insert(
            key.to_string(),
            StoredObject {
                body,
                content_type: content_type.to_string(),
            },
        );
        self.events.lock().unwrap().push(format!("stored:{key}"));
        Ok(())
    }
}

/// Progress sink that remembers everything the scheduler reported.
#[derive(Default)]
pub struct RecordingProgress {
    pub total: Mutex<Option<u64>>,
    pub outcomes: Mutex<Vec<TaskOutcome>>,
    pub checkpoints: Mutex<Vec<String>>,
    pub finished: Mutex<Option<BatchResult>>,
}

impl ProgressCallback for RecordingProgress {
    fn set_total(&self, total: u64) {
        *self.total.lock().unwrap() = Some(total);
    }

    fn task_done(&self, outcome: &TaskOutcome) {
        self.outcomes.lock().unwrap().push(outcome.clone());
    }

    fn checkpoint(&self, line: &str) {
        self.checkpoints.lock().unwrap().push(line.to_string());
    }

    fn finish(&self, result: &BatchResult) {
        *self.finished.lock().unwrap() = Some(*result);
    }
}

/// Creates a fresh directory under the system temp dir holding `files`,
/// each containing its own name as bytes.
pub fn fixture_dir(name: &str, files: &[&str]) -> PathBuf {
    let dir = std::env::temp_dir().join(format!("doc_archive_upload_{name}"));
    let _ = std::fs::remove_dir_all(&dir);
    std::fs::create_dir_all(&dir).unwrap();
    for file in files {
        std::fs::write(dir.join(file), file.as_bytes()).unwrap();
    }
    dir
}

/// The 25 files `a.png` .. `l.png`, `m.jpg` .. `y.jpg`.
pub fn alphabet_files() -> Vec<String> {
    ('a'..='y')
        .map(|c| {
            if c < 'm' {
                format!("{c}.png")
            } else {
                format!("{c}.jpg")
            }
        })
        .collect()
}

mod tests {
    use super::*;

    #[tokio::test]
    async fn counted_failures_run_out_but_permanent_ones_do_not() {
        let store = MemoryStore::default();
        store.insert("images/a.png", b"a");
        store.fail_probe("images/a.png", 2);
        store.fail_probe("images/b.png", u32::MAX);

        assert!(store.exists("images/a.png").await.is_err());
        assert!(store.exists("images/a.png").await.is_err());
        assert!(store.exists("images/a.png").await.unwrap());

        for _ in 0..5 {
            assert!(store.exists("images/b.png").await.is_err());
        }
    }

    #[tokio::test]
    async fn failed_calls_leave_nothing_in_flight() {
        let store = MemoryStore::default();
        store.fail_probe("images/a.png", u32::MAX);
        store.fail_put("images/a.png", u32::MAX);

        for _ in 0..3 {
            let _ = store.exists("images/a.png").await;
            let _ = store.put("images/a.png", vec![1], "image/png").await;
        }

        assert_eq!(store.active.load(Ordering::SeqCst), 0);
        assert_eq!(store.peak(), 1);
    }
}
