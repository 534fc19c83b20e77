use crate::runtime::AppEvent;
use crate::session::Ticket;
use crate::source::SentenceSource;
use std::sync::mpsc::Sender;
use std::sync::Arc;
use std::thread;
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchMode {
    /// One worker thread per request (network sources)
    Background,
    /// Run on the calling thread; the response is still queued as an event
    Inline,
}

/// Runs session requests against a sentence source and posts the tagged
/// response back into the event queue.
#[derive(Clone)]
pub struct Fetcher {
    source: Arc<dyn SentenceSource>,
    tx: Sender<AppEvent>,
    mode: FetchMode,
}

impl Fetcher {
    pub fn new(source: Arc<dyn SentenceSource>, tx: Sender<AppEvent>, mode: FetchMode) -> Self {
        Self { source, tx, mode }
    }

    pub fn source(&self) -> &Arc<dyn SentenceSource> {
        &self.source
    }

    pub fn dispatch(&self, ticket: Ticket) {
        debug!(token = ticket.token, request = ?ticket.request, "dispatching request");
        match self.mode {
            FetchMode::Inline => {
                let result = ticket.request.execute(self.source.as_ref());
                let _ = self.tx.send(AppEvent::Response {
                    token: ticket.token,
                    result,
                });
            }
            FetchMode::Background => {
                let source = Arc::clone(&self.source);
                let tx = self.tx.clone();
                thread::spawn(move || {
                    let result = ticket.request.execute(source.as_ref());
                    // receiver gone means the app is shutting down
                    let _ = tx.send(AppEvent::Response {
                        token: ticket.token,
                        result,
                    });
                });
            }
        }
    }
}
