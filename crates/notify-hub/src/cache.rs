//! Recently uploaded artifacts.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use parking_lot::Mutex;

pub const DEFAULT_ARTIFACT_TTL: Duration = Duration::from_secs(600);

/// Remembers artifact paths for `ttl` so the same screenshot is not uploaded
/// twice in a row. Owned by the sink that uploads.
#[derive(Debug)]
pub struct ArtifactCache {
    ttl: Duration,
    sent: Mutex<HashMap<PathBuf, Instant>>,
}

impl Default for ArtifactCache {
    fn default() -> Self {
        Self::new(DEFAULT_ARTIFACT_TTL)
    }
}

impl ArtifactCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            sent: Mutex::new(HashMap::new()),
        }
    }

    /// Whether `path` may be uploaded now; records it when it may.
    pub fn claim(&self, path: &Path) -> bool {
        self.claim_at(path, Instant::now())
    }

    pub fn claim_at(&self, path: &Path, now: Instant) -> bool {
        let mut sent = self.sent.lock();
        let ttl = self.ttl;
        sent.retain(|_, at| now.saturating_duration_since(*at) < ttl);
        if sent.contains_key(path) {
            return false;
        }
        sent.insert(path.to_path_buf(), now);
        true
    }

    /// Forget `paths` so a failed upload can be retried before the TTL ends.
    pub fn release(&self, paths: &[PathBuf]) {
        let mut sent = self.sent.lock();
        for path in paths {
            sent.remove(path);
        }
    }

    pub fn len(&self) -> usize {
        self.sent.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.sent.lock().is_empty()
    }
}
