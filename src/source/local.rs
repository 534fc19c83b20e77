use super::{require_extension, CheckResult, SentenceSource, SourceError, Upload};
use crate::deck;
use crate::sentence::{Sentence, SentenceId};
use rand::seq::SliceRandom;
use std::path::Path;

/// In-memory sentence pool: the bundled decks, an imported CSV deck or ad hoc pairs
#[derive(Debug, Clone, Default)]
pub struct LocalSentenceSource {
    pool: Vec<Sentence>,
}

impl LocalSentenceSource {
    pub fn new(pool: Vec<Sentence>) -> Self {
        Self { pool }
    }

    /// The decks compiled into the binary
    pub fn builtin() -> Result<Self, SourceError> {
        Ok(Self::new(deck::builtin_sentences()?))
    }

    pub fn len(&self) -> usize {
        self.pool.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pool.is_empty()
    }

    fn filtered<'a>(&'a self, difficulties: &'a [String]) -> impl Iterator<Item = &'a Sentence> + 'a {
        self.pool
            .iter()
            .filter(move |s| difficulties.is_empty() || difficulties.contains(&s.difficulty))
    }
}

/// Lowercase, collapse whitespace runs and trim
pub fn normalize_answer(text: &str) -> String {
    text.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

impl SentenceSource for LocalSentenceSource {
    fn random(&self, difficulties: &[String]) -> Result<Sentence, SourceError> {
        let candidates: Vec<&Sentence> = self.filtered(difficulties).collect();
        candidates
            .choose(&mut rand::thread_rng())
            .map(|s| (*s).clone())
            .ok_or(SourceError::Empty)
    }

    fn list(&self, difficulties: &[String]) -> Result<Vec<Sentence>, SourceError> {
        Ok(self.filtered(difficulties).cloned().collect())
    }

    fn by_id(&self, id: SentenceId) -> Result<Sentence, SourceError> {
        self.pool
            .iter()
            .find(|s| s.id == id)
            .cloned()
            .ok_or(SourceError::NotFound(id))
    }

    fn check(&self, id: SentenceId, answer: &str) -> Result<CheckResult, SourceError> {
        let sentence = self.by_id(id)?;
        Ok(CheckResult {
            is_correct: normalize_answer(answer) == normalize_answer(&sentence.target_text),
            correct_answer: sentence.target_text,
            user_answer: answer.to_string(),
        })
    }

    fn upload(&self, path: &Path) -> Result<Upload, SourceError> {
        require_extension(path, &["csv"], ".csv")?;
        let sentences = deck::read_csv_file(path)?;
        Ok(Upload {
            total: sentences.len(),
            sentences,
        })
    }
}
