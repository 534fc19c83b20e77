pub mod entry;
pub mod position;
pub mod words;

pub use entry::{AnswerState, DeleteMode, Direction};
pub use position::{parse, Position, PositionKind};
pub use words::{continue_after_incorrect, evaluate, word_units, Evaluation, WordOutcome, WordUnit};

use crate::sentence::Sentence;

/// One loaded sentence: its parsed cells plus the learner's input.
///
/// Rebuilt from scratch on every sentence load, retry and history move.
#[derive(Debug, Clone)]
pub struct AnswerCard {
    pub sentence: Sentence,
    pub positions: Vec<Position>,
    pub state: AnswerState,
    pub partial_credit: bool,
}

impl AnswerCard {
    pub fn new(sentence: Sentence, partial_credit: bool) -> Self {
        let positions = parse(&sentence.target_text);
        let state = AnswerState::for_positions(&positions);
        Self {
            sentence,
            positions,
            state,
            partial_credit,
        }
    }

    pub fn type_input(&mut self, raw: &str) {
        self.state.type_input(raw);
    }

    pub fn move_focus(&mut self, direction: Direction) {
        self.state.move_focus(direction);
    }

    pub fn delete_at_focus(&mut self, mode: DeleteMode) {
        self.state.delete_at_focus(mode);
    }

    pub fn select(&mut self, slot: usize) -> bool {
        self.state.select(slot)
    }

    pub fn evaluate(&self) -> Evaluation {
        evaluate(&self.state, &self.positions)
    }

    pub fn continue_after_incorrect(&mut self) {
        continue_after_incorrect(&mut self.state, &self.positions, self.partial_credit);
    }

    pub fn reset(&mut self) {
        self.state.reset();
    }

    pub fn answer_text(&self) -> String {
        self.state.answer_text(&self.positions)
    }

    /// A sentence with letter slots needs at least one filled slot to submit
    pub fn can_submit(&self) -> bool {
        self.state.is_empty() || self.state.has_input()
    }
}
