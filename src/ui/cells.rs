use unicode_width::UnicodeWidthChar;

use crate::answer::{word_units, AnswerCard, Evaluation, PositionKind, WordOutcome};

pub const PLACEHOLDER: char = '_';

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CellKind {
    Empty,
    Typed,
    Locked,
    /// Graded letter on the result screen
    Graded(WordOutcome),
    /// Punctuation or gap, never typed
    Literal,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Cell {
    pub ch: char,
    pub kind: CellKind,
    pub focused: bool,
    /// Lines may wrap after this cell
    pub breakable: bool,
}

impl Cell {
    pub fn width(&self) -> usize {
        self.ch.width().unwrap_or(0)
    }
}

/// One display cell per position of the card
pub fn card_cells(card: &AnswerCard, evaluation: Option<&Evaluation>, show_focus: bool) -> Vec<Cell> {
    let mut outcomes: Vec<Option<WordOutcome>> = vec![None; card.state.len()];
    if let Some(evaluation) = evaluation {
        for (unit, outcome) in word_units(&card.positions).iter().zip(&evaluation.words) {
            for slot in unit.slots.clone() {
                outcomes[slot] = Some(*outcome);
            }
        }
    }

    card.positions
        .iter()
        .map(|p| match (p.kind, p.slot) {
            (PositionKind::Letter, Some(slot)) => {
                let typed = card.state.slots[slot];
                let kind = match (outcomes[slot], card.state.is_locked(slot), typed) {
                    (Some(outcome), _, _) => CellKind::Graded(outcome),
                    (None, true, _) => CellKind::Locked,
                    (None, false, Some(_)) => CellKind::Typed,
                    (None, false, None) => CellKind::Empty,
                };
                Cell {
                    ch: typed.unwrap_or(PLACEHOLDER),
                    kind,
                    focused: show_focus && card.state.focus == slot && !card.state.is_locked(slot),
                    breakable: false,
                }
            }
            (kind, _) => Cell {
                ch: p.ch,
                kind: CellKind::Literal,
                focused: false,
                breakable: matches!(kind, PositionKind::Spacing | PositionKind::Space),
            },
        })
        .collect()
}

/// Greedy wrap between words; trailing gaps may overhang the width and a
/// word wider than `width` gets a line to itself
pub fn wrap(cells: &[Cell], width: usize) -> Vec<Vec<Cell>> {
    let mut segments: Vec<&[Cell]> = Vec::new();
    let mut start = 0;
    for (i, cell) in cells.iter().enumerate() {
        let gap_ends = cell.breakable && cells.get(i + 1).map_or(true, |next| !next.breakable);
        if gap_ends || i + 1 == cells.len() {
            segments.push(&cells[start..=i]);
            start = i + 1;
        }
    }

    let mut lines: Vec<Vec<Cell>> = Vec::new();
    let mut line: Vec<Cell> = Vec::new();
    let mut line_width = 0;
    for segment in segments {
        let content: usize = segment
            .iter()
            .filter(|c| !c.breakable)
            .map(Cell::width)
            .sum();
        if line_width > 0 && line_width + content > width {
            lines.push(std::mem::take(&mut line));
            line_width = 0;
        }
        line.extend_from_slice(segment);
        line_width += segment.iter().map(Cell::width).sum::<usize>();
    }
    if !line.is_empty() {
        lines.push(line);
    }
    lines
}
