use crate::handoff::HandoffId;
use crate::sentence::{Difficulty, Sentence};
use itertools::Itertools;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SettingsError {
    #[error("select at least one difficulty or provide a deck")]
    NoDifficulty,
    #[error("custom cannot be combined with other difficulties")]
    CustomExclusive,
    #[error("custom practice needs a deck file or sentence pairs")]
    CustomNeedsDeck,
    #[error("both source and target text are required")]
    IncompletePair,
    #[error("add at least one sentence pair to hand off")]
    NoPairs,
}

/// What the learner asked for on the command line, before validation
#[derive(Debug, Clone, Default)]
pub struct Selection {
    /// Difficulties given explicitly for this run
    pub difficulties: Vec<Difficulty>,
    /// Difficulties remembered from earlier runs
    pub saved_difficulties: Vec<Difficulty>,
    pub deck: Option<PathBuf>,
    pub pairs: Vec<String>,
    pub hand_off: bool,
    pub temp_practice: Option<HandoffId>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StartPlan {
    /// Draw from the sentence source filtered by difficulty
    Standard(Vec<Difficulty>),
    /// Import a deck file through the sentence source
    Deck(PathBuf),
    /// Practice the given pairs
    AdHoc(Vec<Sentence>),
    /// Store the pairs for a later `--temp-practice` run
    HandOff(Vec<Sentence>),
    Resume(HandoffId),
}

/// Splits `"source=target"`; both sides must be non-blank
pub fn parse_pair(raw: &str) -> Result<(String, String), SettingsError> {
    let (source, target) = raw.split_once('=').ok_or(SettingsError::IncompletePair)?;
    let (source, target) = (source.trim(), target.trim());
    if source.is_empty() || target.is_empty() {
        return Err(SettingsError::IncompletePair);
    }
    Ok((source.to_string(), target.to_string()))
}

fn pair_sentences(pairs: &[String]) -> Result<Vec<Sentence>, SettingsError> {
    pairs
        .iter()
        .enumerate()
        .map(|(i, raw)| {
            let (source, target) = parse_pair(raw)?;
            Ok(Sentence::new(i as u64 + 1, source, target, Difficulty::Custom.tag()))
        })
        .collect()
}

fn check_difficulties(difficulties: &[Difficulty]) -> Result<(), SettingsError> {
    let has_custom = difficulties.iter().any(Difficulty::is_custom);
    if has_custom && difficulties.iter().any(|d| !d.is_custom()) {
        return Err(SettingsError::CustomExclusive);
    }
    Ok(())
}

/// Validates a selection before anything touches the network
pub fn plan(selection: &Selection) -> Result<StartPlan, SettingsError> {
    if let Some(id) = selection.temp_practice {
        return Ok(StartPlan::Resume(id));
    }

    check_difficulties(&selection.difficulties)?;

    if !selection.pairs.is_empty() {
        let sentences = pair_sentences(&selection.pairs)?;
        return Ok(if selection.hand_off {
            StartPlan::HandOff(sentences)
        } else {
            StartPlan::AdHoc(sentences)
        });
    }
    if selection.hand_off {
        return Err(SettingsError::NoPairs);
    }

    if let Some(deck) = &selection.deck {
        if selection.difficulties.iter().any(|d| !d.is_custom()) {
            return Err(SettingsError::CustomExclusive);
        }
        return Ok(StartPlan::Deck(deck.clone()));
    }

    let difficulties = if selection.difficulties.is_empty() {
        &selection.saved_difficulties
    } else {
        &selection.difficulties
    };
    check_difficulties(difficulties)?;
    if difficulties.iter().any(Difficulty::is_custom) {
        return Err(SettingsError::CustomNeedsDeck);
    }
    if difficulties.is_empty() {
        return Err(SettingsError::NoDifficulty);
    }
    Ok(StartPlan::Standard(difficulties.iter().copied().unique().collect()))
}
