use crate::answer::{AnswerCard, DeleteMode, Direction, Evaluation};
use crate::fetch::Fetcher;
use crate::runtime::AppEvent;
use crate::session::{Completion, Session, Step};
use crate::source::{CheckResult, SourceError};
use crate::speech::{self, SpeechPlayer};
use crate::stats::{Attempt, PracticeLog};
use chrono::Local;
use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
use std::time::Instant;
use tracing::{info, warn};

pub const EMPTY_ANSWER: &str = "please type an answer first";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppState {
    Answering,
    Reviewing,
}

/// Outcome of the latest submission
#[derive(Debug, Clone, PartialEq)]
pub struct Review {
    pub evaluation: Evaluation,
    pub correct_answer: String,
    pub user_answer: String,
    /// Verdict from the sentence source, once it answers
    pub checked: Option<CheckResult>,
}

pub struct App {
    pub session: Session,
    pub card: Option<AnswerCard>,
    pub state: AppState,
    pub review: Option<Review>,
    /// Blocking message; the next key press dismisses it
    pub notice: Option<String>,
    pub partial_credit: bool,
    pub speech: SpeechPlayer,
    pub should_quit: bool,
    fetcher: Fetcher,
    log: Option<PracticeLog>,
    attempts: u32,
}

impl App {
    pub fn new(
        session: Session,
        fetcher: Fetcher,
        speech: SpeechPlayer,
        log: Option<PracticeLog>,
        partial_credit: bool,
    ) -> Self {
        Self {
            session,
            card: None,
            state: AppState::Answering,
            review: None,
            notice: None,
            partial_credit,
            speech,
            should_quit: false,
            fetcher,
            log,
            attempts: 0,
        }
    }

    pub fn is_loading(&self) -> bool {
        self.session.is_loading()
    }

    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    pub fn start(&mut self, now: Instant) {
        let step = self.session.start();
        self.run(step, now);
    }

    fn run(&mut self, step: Result<Step, SourceError>, now: Instant) {
        match step {
            Ok(Step::Show(sentence)) => self.load(sentence, now),
            Ok(Step::Fetch(ticket)) => self.fetcher.dispatch(ticket),
            Ok(Step::Idle) => {}
            Err(e) => self.fail(e),
        }
    }

    fn fail(&mut self, error: SourceError) {
        warn!(%error, "sentence source failed");
        self.notice = Some(error.to_string());
    }

    fn load(&mut self, sentence: crate::sentence::Sentence, now: Instant) {
        self.speech
            .schedule(&sentence.target_text, speech::DELAY_AFTER_LOAD, now);
        self.card = Some(AnswerCard::new(sentence, self.partial_credit));
        self.state = AppState::Answering;
        self.review = None;
        self.attempts = 0;
    }

    pub fn next(&mut self, now: Instant) {
        let step = self.session.next();
        self.run(step, now);
    }

    pub fn previous(&mut self, now: Instant) {
        let step = self.session.previous();
        self.run(Ok(step), now);
    }

    pub fn submit(&mut self, now: Instant) {
        let Some(card) = &self.card else { return };
        if !card.can_submit() {
            self.notice = Some(EMPTY_ANSWER.to_string());
            return;
        }

        let evaluation = card.evaluate();
        let user_answer = card.answer_text();
        let correct_answer = card.sentence.target_text.clone();
        self.attempts += 1;
        info!(
            id = %card.sentence.id,
            attempt = self.attempts,
            all_correct = evaluation.all_correct,
            "answer submitted"
        );

        if let Some(log) = &self.log {
            let attempt = Attempt {
                sentence_id: card.sentence.id,
                difficulty: card.sentence.difficulty.clone(),
                attempt: self.attempts,
                words_total: evaluation.words.len(),
                words_correct: evaluation.words_right(),
                all_correct: evaluation.all_correct,
                timestamp: Local::now(),
            };
            if let Err(e) = log.record(&attempt) {
                warn!(error = %e, "could not record attempt");
            }
        }

        self.speech
            .schedule(&correct_answer, speech::DELAY_AFTER_RESULT, now);
        self.review = Some(Review {
            evaluation,
            correct_answer,
            user_answer: user_answer.clone(),
            checked: None,
        });
        self.state = AppState::Reviewing;

        let step = self.session.check(user_answer);
        self.run(Ok(step), now);
    }

    /// Enter on a result: move on when right, otherwise keep the right words and retype
    pub fn proceed(&mut self, now: Instant) {
        let Some(review) = &self.review else { return };
        if review.evaluation.all_correct {
            self.next(now);
        } else if let Some(card) = &mut self.card {
            card.continue_after_incorrect();
            self.review = None;
            self.state = AppState::Answering;
        }
    }

    /// Start the sentence over with nothing locked
    pub fn retry(&mut self, now: Instant) {
        let Some(card) = &self.card else { return };
        let sentence = card.sentence.clone();
        self.speech
            .schedule(&sentence.target_text, speech::DELAY_AFTER_RETRY, now);
        self.card = Some(AnswerCard::new(sentence, self.partial_credit));
        self.review = None;
        self.state = AppState::Answering;
    }

    /// Speaks the current text again unless audio is already playing
    pub fn replay(&mut self, now: Instant) {
        if self.speech.is_playing() {
            return;
        }
        let text = match (&self.review, &self.card) {
            (Some(review), _) => review.correct_answer.clone(),
            (None, Some(card)) => card.sentence.target_text.clone(),
            (None, None) => return,
        };
        self.speech.play(&text, now);
    }

    pub fn handle_event(&mut self, event: AppEvent, now: Instant) {
        match event {
            AppEvent::Key(key) => self.handle_key(key, now),
            AppEvent::Tick => self.speech.on_tick(now),
            AppEvent::Resize => {}
            AppEvent::Response { token, result } => match self.session.complete(token, result) {
                Ok(Completion::Show(sentence)) => self.load(sentence, now),
                Ok(Completion::Checked(result)) => {
                    if let Some(review) = &mut self.review {
                        review.correct_answer = result.correct_answer.clone();
                        review.checked = Some(result);
                    }
                }
                Ok(Completion::Stale) => {}
                Err(e) => self.fail(e),
            },
            AppEvent::Speech(ev) => self.speech.on_event(ev, now),
        }
    }

    pub fn handle_key(&mut self, key: KeyEvent, now: Instant) {
        let ctrl = key.modifiers.contains(KeyModifiers::CONTROL);

        if ctrl && key.code == KeyCode::Char('c') {
            self.should_quit = true;
            return;
        }
        if self.notice.take().is_some() {
            return;
        }
        if key.code == KeyCode::Esc {
            self.should_quit = true;
            return;
        }
        if ctrl && key.code == KeyCode::Char('p') {
            self.replay(now);
            return;
        }
        if self.is_loading() {
            return;
        }

        match key.code {
            KeyCode::Char('n') if ctrl => return self.next(now),
            KeyCode::Char('b') if ctrl => return self.previous(now),
            KeyCode::PageUp => return self.previous(now),
            KeyCode::Char('r') if ctrl => {
                if self.state == AppState::Reviewing {
                    self.retry(now);
                }
                return;
            }
            _ => {}
        }

        match self.state {
            AppState::Answering => self.handle_answer_key(key, ctrl, now),
            AppState::Reviewing => {
                if key.code == KeyCode::Enter {
                    self.proceed(now);
                }
            }
        }
    }

    fn handle_answer_key(&mut self, key: KeyEvent, ctrl: bool, now: Instant) {
        if key.code == KeyCode::Enter {
            return self.submit(now);
        }
        let Some(card) = &mut self.card else { return };
        match key.code {
            KeyCode::Char(c) if !ctrl => card.type_input(&c.to_string()),
            KeyCode::Backspace => card.delete_at_focus(DeleteMode::Backspace),
            KeyCode::Delete => card.delete_at_focus(DeleteMode::ForwardDelete),
            KeyCode::Left => card.move_focus(Direction::Left),
            KeyCode::Right => card.move_focus(Direction::Right),
            KeyCode::Home => {
                if let Some(slot) = card.state.first_unlocked() {
                    card.select(slot);
                }
            }
            KeyCode::End => {
                if let Some(slot) = card.state.last_unlocked() {
                    card.select(slot);
                }
            }
            _ => {}
        }
    }
}
