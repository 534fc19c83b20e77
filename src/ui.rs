pub mod cells;

use ratatui::{
    buffer::Buffer,
    layout::{Alignment, Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Clear, Paragraph, Widget, Wrap},
};
use unicode_width::UnicodeWidthStr;

use crate::answer::WordOutcome;
use crate::app::{App, AppState, Review};
use cells::{card_cells, wrap, Cell, CellKind};

const HORIZONTAL_MARGIN: u16 = 5;
const VERTICAL_MARGIN: u16 = 1;

fn cell_style(cell: &Cell) -> Style {
    let bold = Style::default().add_modifier(Modifier::BOLD);
    let style = match cell.kind {
        CellKind::Empty => Style::default().add_modifier(Modifier::DIM),
        CellKind::Typed => bold,
        CellKind::Locked => bold.fg(Color::Green),
        CellKind::Graded(WordOutcome::Locked | WordOutcome::Correct) => bold.fg(Color::Green),
        CellKind::Graded(WordOutcome::Incorrect) => bold.fg(Color::Red),
        CellKind::Graded(WordOutcome::Incomplete) => bold.fg(Color::Yellow),
        CellKind::Literal => Style::default().fg(Color::Gray),
    };
    if cell.focused {
        style.add_modifier(Modifier::REVERSED)
    } else {
        style
    }
}

fn status_line(app: &App) -> Line<'static> {
    let dim = Style::default().add_modifier(Modifier::DIM);
    let mut spans = vec![Span::styled(format!("{} mode", app.session.mode()), dim)];

    if let Some(progress) = app.session.progress() {
        spans.push(Span::styled(
            format!("   {}/{}", progress.current, progress.total),
            Style::default().fg(Color::Cyan),
        ));
    }
    if let Some(card) = &app.card {
        if !card.sentence.difficulty.is_empty() {
            spans.push(Span::styled(format!("   {}", card.sentence.difficulty), dim));
        }
    }
    if app.speech.is_playing() {
        spans.push(Span::styled(
            "   ♪ speaking",
            Style::default().fg(Color::Magenta),
        ));
    }
    if app.is_loading() {
        spans.push(Span::styled(
            "   loading…",
            Style::default().fg(Color::Yellow),
        ));
    }
    Line::from(spans)
}

fn review_lines(review: &Review) -> Vec<Line<'static>> {
    let bold = Style::default().add_modifier(Modifier::BOLD);
    let evaluation = &review.evaluation;
    let verdict = if evaluation.all_correct {
        Span::styled("✓ correct", bold.fg(Color::Green))
    } else {
        Span::styled(
            format!(
                "✗ {} of {} words right",
                evaluation.words_right(),
                evaluation.words.len()
            ),
            bold.fg(Color::Red),
        )
    };

    vec![
        Line::from(verdict),
        Line::from(vec![
            Span::styled("answer:  ", Style::default().add_modifier(Modifier::DIM)),
            Span::styled(review.correct_answer.clone(), bold),
        ]),
        Line::from(vec![
            Span::styled("you:     ", Style::default().add_modifier(Modifier::DIM)),
            Span::raw(review.user_answer.clone()),
        ]),
    ]
}

fn legend(app: &App) -> String {
    let play = if app.speech.is_playing() { "playing…" } else { "(^p) play" };
    match (app.state, app.review.as_ref().map(|r| r.evaluation.all_correct)) {
        (AppState::Reviewing, Some(true)) => {
            format!("(enter) next / (^r) retry / {play} / (^b) back / (esc) quit")
        }
        (AppState::Reviewing, _) => {
            format!("(enter) continue / (^r) retry / {play} / (^n) skip / (esc) quit")
        }
        (AppState::Answering, _) => {
            format!("(enter) submit / {play} / (^n) next / (^b) back / (esc) quit")
        }
    }
}

/// Centered rectangle of at most `width` x `height` inside `area`
fn centered(area: Rect, width: u16, height: u16) -> Rect {
    let width = width.min(area.width);
    let height = height.min(area.height);
    Rect::new(
        area.x + (area.width - width) / 2,
        area.y + (area.height - height) / 2,
        width,
        height,
    )
}

fn render_notice(message: &str, area: Rect, buf: &mut Buffer) {
    let width = u16::try_from(message.width())
        .unwrap_or(u16::MAX)
        .saturating_add(6)
        .max(30);
    let rect = centered(area, width, 5);
    Clear.render(rect, buf);
    Paragraph::new(vec![
        Line::from(Span::styled(
            message.to_string(),
            Style::default().add_modifier(Modifier::BOLD),
        )),
        Line::from(Span::styled(
            "press any key",
            Style::default().add_modifier(Modifier::DIM | Modifier::ITALIC),
        )),
    ])
    .alignment(Alignment::Center)
    .wrap(Wrap { trim: true })
    .block(
        Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::Yellow))
            .title("notice"),
    )
    .render(rect, buf);
}

impl Widget for &App {
    fn render(self, area: Rect, buf: &mut Buffer) {
        let chunks = Layout::default()
            .direction(Direction::Vertical)
            .horizontal_margin(HORIZONTAL_MARGIN)
            .vertical_margin(VERTICAL_MARGIN)
            .constraints([
                Constraint::Length(1), // status
                Constraint::Length(1),
                Constraint::Length(2), // source text
                Constraint::Min(3),    // cells
                Constraint::Length(3), // review
                Constraint::Length(1), // legend
            ])
            .split(area);

        Paragraph::new(status_line(self)).render(chunks[0], buf);

        match &self.card {
            Some(card) => {
                Paragraph::new(Span::styled(
                    card.sentence.source_text.clone(),
                    Style::default()
                        .fg(Color::Cyan)
                        .add_modifier(Modifier::BOLD),
                ))
                .alignment(Alignment::Center)
                .wrap(Wrap { trim: true })
                .render(chunks[2], buf);

                let reviewing = self.state == AppState::Reviewing;
                let evaluation = self.review.as_ref().map(|r| &r.evaluation);
                let cells = card_cells(card, evaluation.filter(|_| reviewing), !reviewing);
                let lines: Vec<Line> = wrap(&cells, chunks[3].width as usize)
                    .into_iter()
                    .map(|line| {
                        Line::from(
                            line.iter()
                                .map(|c| Span::styled(c.ch.to_string(), cell_style(c)))
                                .collect::<Vec<_>>(),
                        )
                    })
                    .collect();
                Paragraph::new(lines)
                    .alignment(Alignment::Center)
                    .render(chunks[3], buf);
            }
            None => {
                let text = if self.is_loading() {
                    "loading…"
                } else {
                    "no sentence loaded"
                };
                Paragraph::new(Span::styled(
                    text,
                    Style::default().add_modifier(Modifier::DIM | Modifier::ITALIC),
                ))
                .alignment(Alignment::Center)
                .render(chunks[3], buf);
            }
        }

        if let (AppState::Reviewing, Some(review)) = (self.state, &self.review) {
            Paragraph::new(review_lines(review))
                .alignment(Alignment::Center)
                .render(chunks[4], buf);
        }

        Paragraph::new(Span::styled(
            legend(self),
            Style::default().add_modifier(Modifier::ITALIC),
        ))
        .alignment(Alignment::Center)
        .render(chunks[5], buf);

        if let Some(message) = &self.notice {
            render_notice(message, area, buf);
        }
    }
}
