pub mod http;
pub mod local;

pub use http::HttpSentenceSource;
pub use local::LocalSentenceSource;

use crate::sentence::{Sentence, SentenceId};
use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum SourceError {
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("server returned {status}: {message}")]
    Status { status: u16, message: String },
    #[error("sentence {0} not found")]
    NotFound(SentenceId),
    #[error("no sentences available")]
    Empty,
    #[error("unsupported file type, expected {expected}")]
    UnsupportedFile { expected: &'static str },
    #[error("no valid rows")]
    NoValidRows,
    #[error("missing bundled deck {0}")]
    MissingDeck(String),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Server verdict on a submitted answer
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckResult {
    pub is_correct: bool,
    pub correct_answer: String,
    pub user_answer: String,
}

/// Sentences accepted from an uploaded deck
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Upload {
    pub sentences: Vec<Sentence>,
    pub total: usize,
}

/// Where sentences come from and where answers are checked.
///
/// Every call blocks; the app runs them on a worker thread (see `fetch`).
/// An empty `difficulties` slice means "no filter".
pub trait SentenceSource: Send + Sync {
    fn random(&self, difficulties: &[String]) -> Result<Sentence, SourceError>;
    fn list(&self, difficulties: &[String]) -> Result<Vec<Sentence>, SourceError>;
    fn by_id(&self, id: SentenceId) -> Result<Sentence, SourceError>;
    fn check(&self, id: SentenceId, answer: &str) -> Result<CheckResult, SourceError>;
    fn upload(&self, path: &Path) -> Result<Upload, SourceError>;
}

/// Checks the file extension (case-insensitive) against an allow-list
pub(crate) fn require_extension(path: &Path, allowed: &[&str], expected: &'static str) -> Result<(), SourceError> {
    let ok = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| allowed.iter().any(|a| a.eq_ignore_ascii_case(e)))
        .unwrap_or(false);
    if ok {
        Ok(())
    } else {
        Err(SourceError::UnsupportedFile { expected })
    }
}
