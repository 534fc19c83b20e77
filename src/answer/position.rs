/// Punctuation rendered literally between word cells; never typed by the learner
pub const PUNCTUATION: [char; 11] = ['.', ',', '!', '?', ';', ':', '\'', '"', '(', ')', '-'];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PositionKind {
    Letter,
    /// Synthetic gap after a word, sized by the word's length
    Spacing,
    /// Literal whitespace run from the sentence
    Space,
    Punctuation,
}

/// One cell of a parsed target sentence
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Position {
    pub kind: PositionKind,
    pub ch: char,
    /// Index into the flat letter sequence; only letters have one
    pub slot: Option<usize>,
}

impl Position {
    fn letter(ch: char, slot: usize) -> Self {
        Self {
            kind: PositionKind::Letter,
            ch,
            slot: Some(slot),
        }
    }

    fn spacing() -> Self {
        Self {
            kind: PositionKind::Spacing,
            ch: ' ',
            slot: None,
        }
    }

    fn space() -> Self {
        Self {
            kind: PositionKind::Space,
            ch: ' ',
            slot: None,
        }
    }

    fn punctuation(ch: char) -> Self {
        Self {
            kind: PositionKind::Punctuation,
            ch,
            slot: None,
        }
    }

    pub fn is_letter(&self) -> bool {
        self.kind == PositionKind::Letter
    }
}

pub fn is_punctuation(c: char) -> bool {
    PUNCTUATION.contains(&c)
}

/// Number of synthetic spacing cells emitted after a word of `len` characters
pub fn spacing_for(len: usize) -> usize {
    match len {
        0 => 0,
        1..=5 => 1,
        6..=8 => 2,
        _ => 3,
    }
}

enum Token<'a> {
    Whitespace,
    Punctuation(char),
    Word(&'a str),
}

fn tokenize(text: &str) -> Vec<Token<'_>> {
    let mut tokens = Vec::new();
    let mut word_start: Option<usize> = None;
    let mut in_whitespace = false;

    for (i, c) in text.char_indices() {
        let is_ws = c.is_whitespace();
        let is_punct = is_punctuation(c);

        if is_ws || is_punct {
            if let Some(start) = word_start.take() {
                tokens.push(Token::Word(&text[start..i]));
            }
        }

        if is_ws {
            if !in_whitespace {
                tokens.push(Token::Whitespace);
                in_whitespace = true;
            }
            continue;
        }
        in_whitespace = false;

        if is_punct {
            tokens.push(Token::Punctuation(c));
        } else if word_start.is_none() {
            word_start = Some(i);
        }
    }

    if let Some(start) = word_start {
        tokens.push(Token::Word(&text[start..]));
    }

    tokens
}

struct Builder {
    positions: Vec<Position>,
    next_slot: usize,
    pending_word_len: usize,
}

impl Builder {
    fn close_word(&mut self) {
        for _ in 0..spacing_for(self.pending_word_len) {
            self.positions.push(Position::spacing());
        }
        self.pending_word_len = 0;
    }

    fn word(&mut self, word: &str) {
        self.close_word();
        for c in word.chars() {
            self.positions.push(Position::letter(c, self.next_slot));
            self.next_slot += 1;
        }
        self.pending_word_len = word.chars().count();
    }
}

/// Splits a target sentence into fillable letter cells and literal separators.
///
/// Whitespace runs collapse to a single `Space`, punctuation characters each
/// become a `Punctuation`, anything else is a word whose characters become
/// `Letter`s with consecutive slot indices. Each closed word is followed by
/// `spacing_for(len)` synthetic `Spacing` cells.
pub fn parse(text: &str) -> Vec<Position> {
    let mut b = Builder {
        positions: Vec::new(),
        next_slot: 0,
        pending_word_len: 0,
    };

    for token in tokenize(text) {
        match token {
            Token::Whitespace => {
                b.close_word();
                b.positions.push(Position::space());
            }
            Token::Punctuation(c) => {
                b.close_word();
                b.positions.push(Position::punctuation(c));
            }
            Token::Word(w) => b.word(w),
        }
    }
    b.close_word();

    b.positions
}

pub fn letter_count(positions: &[Position]) -> usize {
    positions.iter().filter(|p| p.is_letter()).count()
}

/// Literal sentence text recovered from the positions (spacing skipped)
pub fn reconstruct(positions: &[Position]) -> String {
    positions
        .iter()
        .filter(|p| p.kind != PositionKind::Spacing)
        .map(|p| p.ch)
        .collect()
}
