use crate::sentence::{Sentence, SentenceId};
use crate::source::{CheckResult, SentenceSource, SourceError};
use clap::ValueEnum;
use rand::Rng;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

#[derive(
    Debug,
    Copy,
    Clone,
    Default,
    PartialEq,
    Eq,
    ValueEnum,
    Serialize,
    Deserialize,
    strum_macros::Display,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum PlayMode {
    /// Draw each sentence independently from the pool
    #[default]
    Random,
    /// Walk a fixed list in order, wrapping at the end
    Sequential,
}

#[derive(Debug, Clone)]
pub struct SessionConfig {
    pub mode: PlayMode,
    pub difficulties: Vec<String>,
}

/// Position in a sequential run, 1-based
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Progress {
    pub current: usize,
    pub total: usize,
}

/// Visited sentence ids with a cursor for stepping back
#[derive(Debug, Clone, Default)]
pub struct History {
    ids: Vec<SentenceId>,
    cursor: usize,
}

impl History {
    /// Records a newly loaded sentence, dropping anything after the cursor
    pub fn push(&mut self, id: SentenceId) {
        if !self.ids.is_empty() {
            self.ids.truncate(self.cursor + 1);
        }
        self.ids.push(id);
        self.cursor = self.ids.len() - 1;
    }

    pub fn can_go_back(&self) -> bool {
        self.cursor > 0
    }

    pub fn previous_id(&self) -> Option<SentenceId> {
        if self.can_go_back() {
            self.ids.get(self.cursor - 1).copied()
        } else {
            None
        }
    }

    pub fn back(&mut self) {
        if self.can_go_back() {
            self.cursor -= 1;
        }
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    pub fn cursor(&self) -> usize {
        self.cursor
    }
}

/// A blocking call to the sentence source
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Request {
    Random(Vec<String>),
    List(Vec<String>),
    ById(SentenceId),
    Check { id: SentenceId, answer: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Response {
    Sentence(Sentence),
    List(Vec<Sentence>),
    Checked(CheckResult),
}

impl Request {
    pub fn execute(&self, source: &dyn SentenceSource) -> Result<Response, SourceError> {
        match self {
            Request::Random(difficulties) => source.random(difficulties).map(Response::Sentence),
            Request::List(difficulties) => source.list(difficulties).map(Response::List),
            Request::ById(id) => source.by_id(*id).map(Response::Sentence),
            Request::Check { id, answer } => source.check(*id, answer).map(Response::Checked),
        }
    }
}

/// A request tagged with the token its response must carry
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Ticket {
    pub token: u64,
    pub request: Request,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Step {
    /// Sentence ready without a round trip
    Show(Sentence),
    Fetch(Ticket),
    Idle,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Completion {
    Show(Sentence),
    Checked(CheckResult),
    /// Response for a superseded request; dropped
    Stale,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Intent {
    Start,
    Next,
    Previous,
    Check,
}

#[derive(Debug, Clone, Copy)]
struct Pending {
    token: u64,
    intent: Intent,
}

/// Sequences sentence loads, history navigation and progress.
///
/// Every request gets a fresh token and only the latest token's response is
/// applied, so at most one request is ever in flight from the session's view.
#[derive(Debug, Clone)]
pub struct Session {
    pub config: SessionConfig,
    list: Vec<Sentence>,
    index: usize,
    preloaded: bool,
    current: Option<Sentence>,
    history: History,
    next_token: u64,
    pending: Option<Pending>,
}

impl Session {
    pub fn new(config: SessionConfig) -> Self {
        Self {
            config,
            list: Vec::new(),
            index: 0,
            preloaded: false,
            current: None,
            history: History::default(),
            next_token: 0,
            pending: None,
        }
    }

    /// Session over a fixed list (imported deck, handoff or ad hoc pairs).
    ///
    /// Random mode draws from the list locally instead of asking the source.
    pub fn with_list(sentences: Vec<Sentence>, mode: PlayMode) -> Self {
        let mut session = Self::new(SessionConfig {
            mode,
            difficulties: Vec::new(),
        });
        session.list = sentences;
        session.preloaded = true;
        session
    }

    pub fn mode(&self) -> PlayMode {
        self.config.mode
    }

    pub fn current(&self) -> Option<&Sentence> {
        self.current.as_ref()
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn list(&self) -> &[Sentence] {
        &self.list
    }

    pub fn history(&self) -> &History {
        &self.history
    }

    pub fn is_loading(&self) -> bool {
        self.pending.is_some()
    }

    pub fn can_go_back(&self) -> bool {
        self.history.can_go_back()
    }

    /// Only sequential runs report progress; `None` means "hide it"
    pub fn progress(&self) -> Option<Progress> {
        match self.config.mode {
            PlayMode::Sequential if !self.list.is_empty() && self.current.is_some() => {
                Some(Progress {
                    current: self.index + 1,
                    total: self.list.len(),
                })
            }
            _ => None,
        }
    }

    fn issue(&mut self, intent: Intent, request: Request) -> Step {
        self.next_token += 1;
        let token = self.next_token;
        if let Some(old) = self.pending.replace(Pending { token, intent }) {
            debug!(old = old.token, new = token, "superseding in-flight request");
        }
        Step::Fetch(Ticket { token, request })
    }

    fn show_index(&mut self, index: usize) -> Result<Sentence, SourceError> {
        let sentence = self.list.get(index).cloned().ok_or(SourceError::Empty)?;
        self.index = index;
        self.history.push(sentence.id);
        Ok(self.load(sentence))
    }

    fn draw(&mut self) -> Result<Sentence, SourceError> {
        if self.list.is_empty() {
            return Err(SourceError::Empty);
        }
        let index = rand::thread_rng().gen_range(0..self.list.len());
        self.show_index(index)
    }

    fn load(&mut self, sentence: Sentence) -> Sentence {
        info!(id = %sentence.id, difficulty = %sentence.difficulty, "sentence loaded");
        self.current = Some(sentence.clone());
        sentence
    }

    pub fn start(&mut self) -> Result<Step, SourceError> {
        match self.config.mode {
            PlayMode::Sequential if self.preloaded => Ok(Step::Show(self.show_index(0)?)),
            PlayMode::Sequential => Ok(self.issue(
                Intent::Start,
                Request::List(self.config.difficulties.clone()),
            )),
            PlayMode::Random if self.preloaded => Ok(Step::Show(self.draw()?)),
            PlayMode::Random => Ok(self.issue(
                Intent::Start,
                Request::Random(self.config.difficulties.clone()),
            )),
        }
    }

    pub fn next(&mut self) -> Result<Step, SourceError> {
        match self.config.mode {
            PlayMode::Sequential => {
                if self.list.is_empty() {
                    return Err(SourceError::Empty);
                }
                let index = if self.current.is_some() {
                    (self.index + 1) % self.list.len()
                } else {
                    0
                };
                Ok(Step::Show(self.show_index(index)?))
            }
            PlayMode::Random if self.preloaded => Ok(Step::Show(self.draw()?)),
            PlayMode::Random => Ok(self.issue(
                Intent::Next,
                Request::Random(self.config.difficulties.clone()),
            )),
        }
    }

    pub fn previous(&mut self) -> Step {
        let Some(id) = self.history.previous_id() else {
            return Step::Idle;
        };
        match self.list.iter().position(|s| s.id == id) {
            Some(index) => {
                self.history.back();
                self.index = index;
                Step::Show(self.load(self.list[index].clone()))
            }
            None => self.issue(Intent::Previous, Request::ById(id)),
        }
    }

    pub fn check(&mut self, answer: impl Into<String>) -> Step {
        let Some(id) = self.current.as_ref().map(|s| s.id) else {
            return Step::Idle;
        };
        self.issue(
            Intent::Check,
            Request::Check {
                id,
                answer: answer.into(),
            },
        )
    }

    /// Applies a response if `token` is the latest issued; anything else is stale.
    ///
    /// A failed request leaves the session exactly as it was before it was issued.
    pub fn complete(
        &mut self,
        token: u64,
        result: Result<Response, SourceError>,
    ) -> Result<Completion, SourceError> {
        let pending = match self.pending {
            Some(p) if p.token == token => p,
            _ => {
                debug!(token, latest = self.next_token, "discarding stale response");
                return Ok(Completion::Stale);
            }
        };
        self.pending = None;

        match (pending.intent, result?) {
            (Intent::Start, Response::List(sentences)) => {
                self.list = sentences;
                Ok(Completion::Show(self.show_index(0)?))
            }
            (Intent::Start | Intent::Next, Response::Sentence(sentence)) => {
                self.history.push(sentence.id);
                Ok(Completion::Show(self.load(sentence)))
            }
            (Intent::Previous, Response::Sentence(sentence)) => {
                self.history.back();
                if let Some(index) = self.list.iter().position(|s| s.id == sentence.id) {
                    self.index = index;
                }
                Ok(Completion::Show(self.load(sentence)))
            }
            (Intent::Check, Response::Checked(result)) => Ok(Completion::Checked(result)),
            (intent, response) => {
                warn!(?intent, ?response, "response does not match request");
                Ok(Completion::Stale)
            }
        }
    }
}
