use std::collections::VecDeque;
use std::fs;
use std::path::PathBuf;
use std::sync::Mutex;

use anyhow::Context;
use chrono::{DateTime, Utc};
use tracing::{debug, warn};
use uuid::Uuid;

/// Reference to one persisted audio artifact.
#[derive(Debug, Clone)]
pub struct ArtifactHandle {
    pub id: Uuid,
    pub path: PathBuf,
    pub created_at: DateTime<Utc>,
}

/// A deletion that did not go through. Callers log these; they never fail
/// the request path.
#[derive(Debug)]
pub struct CleanupFailure {
    pub path: PathBuf,
    pub reason: String,
}

/// Bounds the number of generated audio files kept on disk. Insertion order
/// is eviction order (FIFO); artifacts are not touched on re-read.
///
/// One mutex guards both the retention list and its filesystem effects, so
/// concurrent `put` / `sweep_excess` calls from parallel requests stay
/// serialized relative to each other.
pub struct AudioCache {
    dir: PathBuf,
    retention: usize,
    entries: Mutex<VecDeque<ArtifactHandle>>,
}

impl AudioCache {
    pub fn new(dir: impl Into<PathBuf>, retention: usize) -> anyhow::Result<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir)
            .with_context(|| format!("Failed to create audio cache dir {}", dir.display()))?;
        Ok(Self {
            dir,
            retention,
            entries: Mutex::new(VecDeque::new()),
        })
    }

    /// Persists audio bytes under a fresh unique handle and appends it to the
    /// retention list. A write failure leaves the list untouched; it is fatal
    /// only to the calling request's TTS path.
    pub fn put(&self, bytes: &[u8]) -> anyhow::Result<ArtifactHandle> {
        let id = Uuid::new_v4();
        let path = self.dir.join(format!("{}.mp3", id));

        let mut entries = self.entries.lock().unwrap();
        fs::write(&path, bytes)
            .with_context(|| format!("Failed to write audio artifact {}", path.display()))?;

        let handle = ArtifactHandle {
            id,
            path,
            created_at: Utc::now(),
        };
        entries.push_back(handle.clone());
        debug!(
            "Stored audio artifact {} ({} bytes) at {}",
            handle.id,
            bytes.len(),
            handle.created_at
        );
        Ok(handle)
    }

    /// Evicts oldest-inserted artifacts until at most `retention` remain.
    /// File removal is best-effort; failures are returned so callers can log
    /// or assert on them.
    pub fn sweep_excess(&self) -> Vec<CleanupFailure> {
        let mut entries = self.entries.lock().unwrap();
        let mut failures = Vec::new();

        while entries.len() > self.retention {
            let Some(evicted) = entries.pop_front() else {
                break;
            };
            debug!("Evicting audio artifact {}", evicted.id);
            if let Err(e) = fs::remove_file(&evicted.path) {
                warn!(
                    "Failed to delete evicted artifact {}: {}",
                    evicted.path.display(),
                    e
                );
                failures.push(CleanupFailure {
                    path: evicted.path,
                    reason: e.to_string(),
                });
            }
        }
        failures
    }

    /// Startup sweep: anything in the scratch dir is stale output of a prior
    /// run and gets removed before new requests are accepted.
    pub fn purge_all(&self) -> Vec<CleanupFailure> {
        let mut entries = self.entries.lock().unwrap();
        entries.clear();

        let mut failures = Vec::new();
        let listing = match fs::read_dir(&self.dir) {
            Ok(l) => l,
            Err(e) => {
                warn!(
                    "Failed to read audio cache dir {}: {}",
                    self.dir.display(),
                    e
                );
                return vec![CleanupFailure {
                    path: self.dir.clone(),
                    reason: e.to_string(),
                }];
            }
        };

        for entry in listing.flatten() {
            let path = entry.path();
            if path.extension().map(|ext| ext == "mp3") != Some(true) {
                continue;
            }
            if let Err(e) = fs::remove_file(&path) {
                warn!("Failed to purge stale artifact {}: {}", path.display(), e);
                failures.push(CleanupFailure {
                    path,
                    reason: e.to_string(),
                });
            }
        }
        failures
    }

    pub fn len(&self) -> usize {
        self.entries.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Paths of currently retained artifacts, oldest first.
    pub fn retained_paths(&self) -> Vec<PathBuf> {
        self.entries
            .lock()
            .unwrap()
            .iter()
            .map(|h| h.path.clone())
            .collect()
    }
}
