use crate::sentence::Sentence;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info};

pub const DEFAULT_TTL: Duration = Duration::from_secs(24 * 60 * 60);

const FILE_PREFIX: &str = "temp_practice_";

/// Wall clock in epoch milliseconds
pub trait Clock: Send + Sync {
    fn now_millis(&self) -> u64;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_millis(&self) -> u64 {
        chrono::Utc::now().timestamp_millis().max(0) as u64
    }
}

/// Manually advanced clock
#[derive(Debug, Default)]
pub struct FixedClock(AtomicU64);

impl FixedClock {
    pub fn new(millis: u64) -> Self {
        Self(AtomicU64::new(millis))
    }

    pub fn advance(&self, by: Duration) {
        self.0.fetch_add(by.as_millis() as u64, Ordering::SeqCst);
    }
}

impl Clock for FixedClock {
    fn now_millis(&self) -> u64 {
        self.0.load(Ordering::SeqCst)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct HandoffId(pub u64);

impl fmt::Display for HandoffId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HandoffPayload {
    pub sentences: Vec<Sentence>,
    pub timestamp: u64,
}

#[derive(Error, Debug)]
pub enum HandoffError {
    #[error("practice set {0} not found")]
    NotFound(HandoffId),
    #[error("practice set {0} has expired")]
    Expired(HandoffId),
    #[error("no sentences to hand off")]
    Empty,
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Short-lived practice sets passed from one invocation to another.
///
/// Ids come from the store's clock; payloads older than the TTL can no
/// longer be read and are deleted by `purge_expired`.
pub trait HandoffStore {
    fn put(&self, sentences: Vec<Sentence>) -> Result<HandoffId, HandoffError>;
    /// Reading leaves the payload in place so the same id can be reopened
    fn get(&self, id: HandoffId) -> Result<HandoffPayload, HandoffError>;
    fn remove(&self, id: HandoffId) -> Result<(), HandoffError>;
    fn purge_expired(&self) -> Result<usize, HandoffError>;
}

fn is_expired(payload: &HandoffPayload, now: u64, ttl: Duration) -> bool {
    now.saturating_sub(payload.timestamp) > u64::try_from(ttl.as_millis()).unwrap_or(u64::MAX)
}

pub struct FileHandoffStore {
    dir: PathBuf,
    ttl: Duration,
    clock: Arc<dyn Clock>,
}

impl FileHandoffStore {
    pub fn new<P: AsRef<Path>>(dir: P, ttl: Duration, clock: Arc<dyn Clock>) -> Self {
        Self {
            dir: dir.as_ref().to_path_buf(),
            ttl,
            clock,
        }
    }

    fn path(&self, id: HandoffId) -> PathBuf {
        self.dir.join(format!("{FILE_PREFIX}{id}.json"))
    }

    fn read(&self, path: &Path) -> Result<HandoffPayload, HandoffError> {
        let bytes = fs::read(path)?;
        Ok(serde_json::from_slice(&bytes)?)
    }
}

impl HandoffStore for FileHandoffStore {
    fn put(&self, sentences: Vec<Sentence>) -> Result<HandoffId, HandoffError> {
        if sentences.is_empty() {
            return Err(HandoffError::Empty);
        }
        fs::create_dir_all(&self.dir)?;

        let timestamp = self.clock.now_millis();
        let mut id = HandoffId(timestamp);
        while self.path(id).exists() {
            id = HandoffId(id.0 + 1);
        }

        let payload = HandoffPayload {
            sentences,
            timestamp,
        };
        fs::write(self.path(id), serde_json::to_vec_pretty(&payload)?)?;
        info!(%id, count = payload.sentences.len(), "practice set handed off");
        Ok(id)
    }

    fn get(&self, id: HandoffId) -> Result<HandoffPayload, HandoffError> {
        let path = self.path(id);
        if !path.exists() {
            return Err(HandoffError::NotFound(id));
        }
        let payload = self.read(&path)?;
        if is_expired(&payload, self.clock.now_millis(), self.ttl) {
            return Err(HandoffError::Expired(id));
        }
        Ok(payload)
    }

    fn remove(&self, id: HandoffId) -> Result<(), HandoffError> {
        match fs::remove_file(self.path(id)) {
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            other => Ok(other?),
        }
    }

    fn purge_expired(&self) -> Result<usize, HandoffError> {
        let entries = match fs::read_dir(&self.dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(0),
            Err(e) => return Err(e.into()),
        };

        let now = self.clock.now_millis();
        let mut purged = 0;
        for entry in entries {
            let path = entry?.path();
            let is_handoff = path
                .file_name()
                .and_then(|n| n.to_str())
                .is_some_and(|n| n.starts_with(FILE_PREFIX) && n.ends_with(".json"));
            if !is_handoff {
                continue;
            }
            // unreadable payloads can never be opened again
            let stale = self
                .read(&path)
                .map(|p| is_expired(&p, now, self.ttl))
                .unwrap_or(true);
            if stale {
                fs::remove_file(&path)?;
                purged += 1;
            }
        }
        if purged > 0 {
            debug!(purged, "removed expired practice sets");
        }
        Ok(purged)
    }
}

pub struct MemoryHandoffStore {
    entries: Mutex<BTreeMap<HandoffId, HandoffPayload>>,
    ttl: Duration,
    clock: Arc<dyn Clock>,
}

impl MemoryHandoffStore {
    pub fn new(ttl: Duration, clock: Arc<dyn Clock>) -> Self {
        Self {
            entries: Mutex::new(BTreeMap::new()),
            ttl,
            clock,
        }
    }

    fn entries(&self) -> std::sync::MutexGuard<'_, BTreeMap<HandoffId, HandoffPayload>> {
        self.entries.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl HandoffStore for MemoryHandoffStore {
    fn put(&self, sentences: Vec<Sentence>) -> Result<HandoffId, HandoffError> {
        if sentences.is_empty() {
            return Err(HandoffError::Empty);
        }
        let timestamp = self.clock.now_millis();
        let mut entries = self.entries();
        let mut id = HandoffId(timestamp);
        while entries.contains_key(&id) {
            id = HandoffId(id.0 + 1);
        }
        entries.insert(
            id,
            HandoffPayload {
                sentences,
                timestamp,
            },
        );
        Ok(id)
    }

    fn get(&self, id: HandoffId) -> Result<HandoffPayload, HandoffError> {
        let entries = self.entries();
        let payload = entries.get(&id).ok_or(HandoffError::NotFound(id))?;
        if is_expired(payload, self.clock.now_millis(), self.ttl) {
            return Err(HandoffError::Expired(id));
        }
        Ok(payload.clone())
    }

    fn remove(&self, id: HandoffId) -> Result<(), HandoffError> {
        self.entries().remove(&id);
        Ok(())
    }

    fn purge_expired(&self) -> Result<usize, HandoffError> {
        let now = self.clock.now_millis();
        let mut entries = self.entries();
        let before = entries.len();
        entries.retain(|_, p| !is_expired(p, now, self.ttl));
        Ok(before - entries.len())
    }
}
