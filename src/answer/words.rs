use super::entry::AnswerState;
use super::position::Position;
use itertools::Itertools;
use std::ops::Range;

/// A maximal run of letter slots between separators.
///
/// Derived from the positions every time it is needed, never cached.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WordUnit {
    pub slots: Range<usize>,
    pub expected: Vec<char>,
}

impl WordUnit {
    pub fn expected_text(&self) -> String {
        self.expected.iter().collect()
    }

    fn is_locked(&self, state: &AnswerState) -> bool {
        self.slots.clone().all(|i| state.locked[i])
    }

    fn has_input(&self, state: &AnswerState) -> bool {
        self.slots.clone().any(|i| state.slots[i].is_some())
    }

    /// Typed characters, or None while any slot is empty
    fn typed(&self, state: &AnswerState) -> Option<Vec<char>> {
        self.slots.clone().map(|i| state.slots[i]).collect()
    }

    fn matches(&self, typed: &[char]) -> bool {
        typed.len() == self.expected.len()
            && typed
                .iter()
                .zip(&self.expected)
                .all(|(t, e)| t.to_lowercase().eq(e.to_lowercase()))
    }
}

pub fn word_units(positions: &[Position]) -> Vec<WordUnit> {
    positions
        .iter()
        .chunk_by(|p| p.is_letter())
        .into_iter()
        .filter(|(is_letter, _)| *is_letter)
        .filter_map(|(_, letters)| {
            let letters: Vec<&Position> = letters.collect();
            let start = letters.first()?.slot?;
            let end = letters.last()?.slot? + 1;
            Some(WordUnit {
                slots: start..end,
                expected: letters.iter().map(|p| p.ch).collect(),
            })
        })
        .collect()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WordOutcome {
    /// Confirmed on an earlier pass
    Locked,
    Correct,
    Incorrect,
    /// At least one slot still empty
    Incomplete,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Evaluation {
    pub all_correct: bool,
    pub words: Vec<WordOutcome>,
}

impl Evaluation {
    pub fn count(&self, outcome: WordOutcome) -> usize {
        self.words.iter().filter(|w| **w == outcome).count()
    }

    /// Units that are locked or correct
    pub fn words_right(&self) -> usize {
        self.count(WordOutcome::Locked) + self.count(WordOutcome::Correct)
    }
}

/// Grades every word unit; comparisons ignore case.
///
/// The sentence is correct iff every unit is locked or fully typed and
/// matching. Nothing is stored: the result follows from positions and state.
pub fn evaluate(state: &AnswerState, positions: &[Position]) -> Evaluation {
    let words: Vec<WordOutcome> = word_units(positions)
        .iter()
        .map(|unit| {
            if unit.is_locked(state) {
                return WordOutcome::Locked;
            }
            match unit.typed(state) {
                None => WordOutcome::Incomplete,
                Some(typed) if unit.matches(&typed) => WordOutcome::Correct,
                Some(_) => WordOutcome::Incorrect,
            }
        })
        .collect();

    let all_correct = words
        .iter()
        .all(|w| matches!(w, WordOutcome::Locked | WordOutcome::Correct));

    Evaluation { all_correct, words }
}

/// Keeps the words the learner got right and clears the rest for retyping.
///
/// Units with no input are left alone. A fully typed matching unit is locked
/// with the expected characters restored when `partial_credit` is on, or left
/// as typed otherwise; any other unit with input is cleared. Focus then moves
/// to the first empty unlocked slot.
pub fn continue_after_incorrect(state: &mut AnswerState, positions: &[Position], partial_credit: bool) {
    for unit in word_units(positions) {
        if unit.is_locked(state) || !unit.has_input(state) {
            continue;
        }

        let correct = unit
            .typed(state)
            .is_some_and(|typed| unit.matches(&typed));

        if correct && partial_credit {
            for (i, expected) in unit.slots.clone().zip(&unit.expected) {
                state.slots[i] = Some(*expected);
                state.locked[i] = true;
            }
        } else if !correct {
            for i in unit.slots.clone() {
                state.slots[i] = None;
            }
        }
    }

    state.refocus();
}
