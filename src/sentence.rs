use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Opaque sentence identifier as issued by the sentence source
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SentenceId(pub u64);

impl fmt::Display for SentenceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A practice item: the prompt shown to the learner and the text they must type.
///
/// On the wire the source text travels as `chinese` and the target text as
/// `english`; `difficulty` is optional because the by-id endpoint omits it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Sentence {
    pub id: SentenceId,
    #[serde(rename = "chinese")]
    pub source_text: String,
    #[serde(rename = "english")]
    pub target_text: String,
    #[serde(default)]
    pub difficulty: String,
}

impl Sentence {
    pub fn new(
        id: u64,
        source_text: impl Into<String>,
        target_text: impl Into<String>,
        difficulty: impl Into<String>,
    ) -> Self {
        Self {
            id: SentenceId(id),
            source_text: source_text.into(),
            target_text: target_text.into(),
            difficulty: difficulty.into(),
        }
    }
}

#[derive(
    Debug,
    Copy,
    Clone,
    PartialEq,
    Eq,
    Hash,
    ValueEnum,
    Serialize,
    Deserialize,
    strum_macros::Display,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum Difficulty {
    Cet4,
    Cet6,
    Ielts,
    Custom,
}

impl Difficulty {
    pub const STANDARD: [Difficulty; 3] = [Difficulty::Cet4, Difficulty::Cet6, Difficulty::Ielts];

    /// Tag used by sentence sources to filter by difficulty
    pub fn tag(&self) -> String {
        self.to_string()
    }

    pub fn is_custom(&self) -> bool {
        matches!(self, Difficulty::Custom)
    }
}

pub fn tags(difficulties: &[Difficulty]) -> Vec<String> {
    difficulties.iter().map(Difficulty::tag).collect()
}
