use crate::sentence::{Difficulty, Sentence};
use crate::source::SourceError;
use include_dir::{include_dir, Dir};
use serde::Deserialize;
use std::io::Read;
use std::path::Path;

static DECK_DIR: Dir = include_dir!("src/decks");

#[derive(Deserialize, Clone, Debug)]
struct DeckEntry {
    chinese: String,
    english: String,
}

/// A named set of sentence pairs bundled with the binary
#[derive(Deserialize, Clone, Debug)]
pub struct Deck {
    pub name: String,
    sentences: Vec<DeckEntry>,
}

impl Deck {
    pub fn len(&self) -> usize {
        self.sentences.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sentences.is_empty()
    }
}

fn read_deck(difficulty: Difficulty) -> Result<Deck, SourceError> {
    let file_name = format!("{difficulty}.json");
    let file = DECK_DIR
        .get_file(&file_name)
        .ok_or_else(|| SourceError::MissingDeck(file_name.clone()))?;
    let contents = file
        .contents_utf8()
        .ok_or_else(|| SourceError::MissingDeck(file_name.clone()))?;
    Ok(serde_json::from_str(contents)?)
}

/// Every bundled sentence, tagged with its deck's difficulty.
///
/// Ids are assigned in deck order (cet4, cet6, ielts) starting at 1, so they
/// are stable for a given build.
pub fn builtin_sentences() -> Result<Vec<Sentence>, SourceError> {
    let mut sentences = Vec::new();
    for difficulty in Difficulty::STANDARD {
        let deck = read_deck(difficulty)?;
        for entry in deck.sentences {
            let id = sentences.len() as u64 + 1;
            sentences.push(Sentence::new(
                id,
                entry.chinese,
                entry.english,
                difficulty.tag(),
            ));
        }
    }
    Ok(sentences)
}

/// Reads a two-column CSV deck (source text, target text) without a header.
///
/// Rows with a blank column are skipped; ids are row numbers starting at 1
/// and every sentence is tagged `custom`.
pub fn read_csv<R: Read>(reader: R) -> Result<Vec<Sentence>, SourceError> {
    let mut rdr = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(reader);

    let mut sentences = Vec::new();
    for (row, record) in rdr.records().enumerate() {
        let record = record?;
        let source = record.get(0).unwrap_or_default();
        let target = record.get(1).unwrap_or_default();
        if source.is_empty() || target.is_empty() {
            continue;
        }
        sentences.push(Sentence::new(
            row as u64 + 1,
            source,
            target,
            Difficulty::Custom.tag(),
        ));
    }

    if sentences.is_empty() {
        return Err(SourceError::NoValidRows);
    }
    Ok(sentences)
}

pub fn read_csv_file(path: &Path) -> Result<Vec<Sentence>, SourceError> {
    let file = std::fs::File::open(path)?;
    read_csv(file)
}
