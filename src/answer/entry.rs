use super::position::{Position, PositionKind};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Left,
    Right,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeleteMode {
    Backspace,
    ForwardDelete,
}

/// Learner input over the letter slots of one sentence.
///
/// `slots` and `locked` always have one entry per letter position. A locked
/// slot holds the expected character and is never edited again until `reset`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnswerState {
    pub slots: Vec<Option<char>>,
    pub locked: Vec<bool>,
    pub focus: usize,
}

impl AnswerState {
    pub fn new(slot_count: usize) -> Self {
        Self {
            slots: vec![None; slot_count],
            locked: vec![false; slot_count],
            focus: 0,
        }
    }

    pub fn for_positions(positions: &[Position]) -> Self {
        Self::new(super::position::letter_count(positions))
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    fn is_open(&self, i: usize) -> bool {
        !self.locked[i] && self.slots[i].is_none()
    }

    fn focus_is_editable(&self) -> bool {
        self.focus < self.len() && !self.locked[self.focus]
    }

    pub fn is_locked(&self, slot: usize) -> bool {
        self.locked.get(slot).copied().unwrap_or(false)
    }

    pub fn all_locked(&self) -> bool {
        self.locked.iter().all(|l| *l)
    }

    /// True if any slot carries a character, typed or locked
    pub fn has_input(&self) -> bool {
        self.slots.iter().any(Option::is_some)
    }

    pub fn first_open(&self) -> Option<usize> {
        (0..self.len()).find(|&i| self.is_open(i))
    }

    pub fn first_unlocked(&self) -> Option<usize> {
        self.locked.iter().position(|l| !l)
    }

    pub fn last_unlocked(&self) -> Option<usize> {
        self.locked.iter().rposition(|l| !l)
    }

    /// Applies the raw contents of a text-input event.
    ///
    /// Only ASCII letters and digits survive, lowercased. An event that
    /// filters down to nothing clears the focused slot; otherwise the last
    /// surviving character fills the focused slot and focus moves on to the
    /// next empty unlocked slot (wrapping to the first one, else staying on
    /// the last unlocked slot).
    pub fn type_input(&mut self, raw: &str) {
        let typed = raw
            .chars()
            .filter(char::is_ascii_alphanumeric)
            .map(|c| c.to_ascii_lowercase())
            .last();

        let Some(c) = typed else {
            if self.focus_is_editable() {
                self.slots[self.focus] = None;
            }
            return;
        };

        if !self.focus_is_editable() {
            return;
        }

        self.slots[self.focus] = Some(c);

        let next = (self.focus + 1..self.len())
            .find(|&i| self.is_open(i))
            .or_else(|| self.first_open())
            .or_else(|| self.last_unlocked());

        if let Some(i) = next {
            self.focus = i;
        }
    }

    /// Moves focus one unlocked slot over, stopping at the ends
    pub fn move_focus(&mut self, direction: Direction) {
        let target = match direction {
            Direction::Left => (0..self.focus.min(self.len()))
                .rev()
                .find(|&i| !self.locked[i]),
            Direction::Right => (self.focus + 1..self.len()).find(|&i| !self.locked[i]),
        };

        if let Some(i) = target {
            self.focus = i;
        }
    }

    pub fn delete_at_focus(&mut self, mode: DeleteMode) {
        if !self.focus_is_editable() {
            return;
        }

        match mode {
            DeleteMode::ForwardDelete => self.slots[self.focus] = None,
            DeleteMode::Backspace => {
                if self.slots[self.focus].is_some() {
                    self.slots[self.focus] = None;
                } else if let Some(prev) = (0..self.focus).rev().find(|&i| !self.locked[i]) {
                    self.slots[prev] = None;
                    self.focus = prev;
                }
            }
        }
    }

    /// Focuses a slot directly (a click on a cell); locked slots refuse focus
    pub fn select(&mut self, slot: usize) -> bool {
        if slot < self.len() && !self.locked[slot] {
            self.focus = slot;
            true
        } else {
            false
        }
    }

    /// Clears every slot and lock
    pub fn reset(&mut self) {
        self.slots.iter_mut().for_each(|s| *s = None);
        self.locked.iter_mut().for_each(|l| *l = false);
        self.focus = 0;
    }

    /// Moves focus to the first empty unlocked slot, else the first unlocked one
    pub fn refocus(&mut self) {
        if let Some(i) = self.first_open().or_else(|| self.first_unlocked()) {
            self.focus = i;
        }
    }

    /// The sentence as the learner currently has it: letters in slot order,
    /// literal punctuation, one space per whitespace run, trimmed.
    pub fn answer_text(&self, positions: &[Position]) -> String {
        let mut out = String::new();
        for p in positions {
            match p.kind {
                PositionKind::Letter => {
                    if let Some(c) = p.slot.and_then(|s| self.slots.get(s).copied().flatten()) {
                        out.push(c);
                    }
                }
                PositionKind::Punctuation => out.push(p.ch),
                PositionKind::Space => out.push(' '),
                PositionKind::Spacing => {}
            }
        }
        out.trim().to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::answer::position::parse;

    fn filled(state: &AnswerState) -> String {
        state
            .slots
            .iter()
            .map(|s| s.unwrap_or('_'))
            .collect()
    }

    #[test]
    fn test_new_state_matches_letter_count() {
        let positions = parse("I am fine.");
        let state = AnswerState::for_positions(&positions);

        assert_eq!(state.slots.len(), 7);
        assert_eq!(state.locked.len(), 7);
        assert_eq!(state.focus, 0);
        assert!(!state.has_input());
    }

    #[test]
    fn test_type_fills_and_advances() {
        let mut state = AnswerState::new(3);

        state.type_input("C");
        assert_eq!(filled(&state), "c__");
        assert_eq!(state.focus, 1);

        state.type_input("a");
        state.type_input("t");
        assert_eq!(filled(&state), "cat");
        // nothing empty left: stays on the last unlocked slot
        assert_eq!(state.focus, 2);
    }

    #[test]
    fn test_type_keeps_only_last_alphanumeric() {
        let mut state = AnswerState::new(2);

        state.type_input("xY!");
        assert_eq!(filled(&state), "y_");

        state.type_input("-,.");
        // filtered to nothing: clears focused slot (already empty)
        assert_eq!(filled(&state), "y_");
        assert_eq!(state.focus, 1);
    }

    #[test]
    fn test_empty_input_clears_focused_slot() {
        let mut state = AnswerState::new(3);
        state.type_input("a");
        state.select(0);

        state.type_input("");
        assert_eq!(filled(&state), "___");
        assert_eq!(state.focus, 0);
    }

    #[test]
    fn test_empty_input_does_not_clear_locked_slot() {
        let mut state = AnswerState::new(2);
        state.slots[0] = Some('A');
        state.locked[0] = true;
        state.focus = 0;

        state.type_input("");
        assert_eq!(state.slots[0], Some('A'));
    }

    #[test]
    fn test_type_wraps_to_first_empty() {
        let mut state = AnswerState::new(4);
        state.select(2);
        state.type_input("a");
        state.type_input("b");
        // slots 2 and 3 filled, wraps back to slot 0
        assert_eq!(filled(&state), "__ab");
        assert_eq!(state.focus, 0);
    }

    #[test]
    fn test_type_skips_locked_and_filled() {
        let mut state = AnswerState::new(5);
        state.locked[1] = true;
        state.slots[1] = Some('X');
        state.slots[2] = Some('q');

        state.type_input("a");
        assert_eq!(state.focus, 3);
    }

    #[test]
    fn test_type_on_locked_focus_is_noop() {
        let mut state = AnswerState::new(2);
        state.locked[0] = true;
        state.slots[0] = Some('H');

        state.type_input("z");
        assert_eq!(state.slots, vec![Some('H'), None]);
        assert_eq!(state.focus, 0);
    }

    #[test]
    fn test_type_with_no_slots_is_noop() {
        let mut state = AnswerState::new(0);
        state.type_input("a");
        state.type_input("");
        state.delete_at_focus(DeleteMode::Backspace);
        state.move_focus(Direction::Right);
        assert!(state.is_empty());
    }

    #[test]
    fn test_move_focus_bounds() {
        let mut state = AnswerState::new(3);

        state.move_focus(Direction::Left);
        assert_eq!(state.focus, 0);

        state.move_focus(Direction::Right);
        state.move_focus(Direction::Right);
        assert_eq!(state.focus, 2);

        state.move_focus(Direction::Right);
        assert_eq!(state.focus, 2);
    }

    #[test]
    fn test_move_focus_skips_locked() {
        let mut state = AnswerState::new(5);
        state.locked[1] = true;
        state.locked[2] = true;

        state.move_focus(Direction::Right);
        assert_eq!(state.focus, 3);

        state.move_focus(Direction::Left);
        assert_eq!(state.focus, 0);
    }

    #[test]
    fn test_move_focus_stays_when_only_locked_beyond() {
        let mut state = AnswerState::new(3);
        state.locked[1] = true;
        state.locked[2] = true;

        state.move_focus(Direction::Right);
        assert_eq!(state.focus, 0);
    }

    #[test]
    fn test_backspace_clears_current_then_previous() {
        let mut state = AnswerState::new(3);
        state.type_input("a");
        state.type_input("b");
        assert_eq!(state.focus, 2);

        // current empty: clears previous and moves there
        state.delete_at_focus(DeleteMode::Backspace);
        assert_eq!(filled(&state), "a__");
        assert_eq!(state.focus, 1);

        state.delete_at_focus(DeleteMode::Backspace);
        assert_eq!(filled(&state), "___");
        assert_eq!(state.focus, 0);

        state.delete_at_focus(DeleteMode::Backspace);
        assert_eq!(state.focus, 0);
    }

    #[test]
    fn test_backspace_clears_filled_focus_in_place() {
        let mut state = AnswerState::new(3);
        state.type_input("a");
        state.type_input("b");
        state.select(1);

        state.delete_at_focus(DeleteMode::Backspace);
        assert_eq!(filled(&state), "a__");
        assert_eq!(state.focus, 1);
    }

    #[test]
    fn test_backspace_skips_locked_previous() {
        let mut state = AnswerState::new(3);
        state.slots[0] = Some('q');
        state.slots[1] = Some('W');
        state.locked[1] = true;
        state.focus = 2;

        state.delete_at_focus(DeleteMode::Backspace);
        assert_eq!(state.slots, vec![None, Some('W'), None]);
        assert_eq!(state.focus, 0);
    }

    #[test]
    fn test_forward_delete_clears_in_place() {
        let mut state = AnswerState::new(2);
        state.type_input("a");
        state.select(0);

        state.delete_at_focus(DeleteMode::ForwardDelete);
        assert_eq!(filled(&state), "__");
        assert_eq!(state.focus, 0);
    }

    #[test]
    fn test_delete_on_locked_focus_is_noop() {
        let mut state = AnswerState::new(2);
        state.slots[0] = Some('A');
        state.locked[0] = true;

        state.delete_at_focus(DeleteMode::ForwardDelete);
        state.delete_at_focus(DeleteMode::Backspace);
        assert_eq!(state.slots[0], Some('A'));
    }

    #[test]
    fn test_select_refuses_locked_and_out_of_range() {
        let mut state = AnswerState::new(3);
        state.locked[1] = true;

        assert!(!state.select(1));
        assert!(!state.select(7));
        assert_eq!(state.focus, 0);

        assert!(state.select(2));
        assert_eq!(state.focus, 2);
    }

    #[test]
    fn test_reset_clears_everything() {
        let mut state = AnswerState::new(3);
        state.type_input("a");
        state.locked[2] = true;
        state.slots[2] = Some('Z');

        state.reset();
        assert_eq!(state, AnswerState::new(3));
    }

    #[test]
    fn test_answer_text_includes_punctuation() {
        let positions = parse("I am fine.");
        let mut state = AnswerState::for_positions(&positions);
        for c in ["i", "a", "m", "f", "i", "n", "e"] {
            state.type_input(c);
        }
        assert_eq!(state.answer_text(&positions), "i am fine.");
    }

    #[test]
    fn test_answer_text_for_blank_sentence_is_punctuation_only() {
        let positions = parse("Yes, sir.");
        let state = AnswerState::for_positions(&positions);
        assert_eq!(state.answer_text(&positions), ", .");
    }
}
