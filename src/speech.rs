use crate::runtime::AppEvent;
use std::process::{Child, Command, Stdio};
use std::sync::mpsc::Sender;
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};
use thiserror::Error;
use tracing::{debug, warn};

/// Extra attempts after a transient failure
pub const MAX_RETRIES: u8 = 2;
pub const RETRY_DELAY: Duration = Duration::from_millis(500);

pub const DELAY_AFTER_LOAD: Duration = Duration::from_millis(300);
pub const DELAY_AFTER_RESULT: Duration = Duration::from_millis(800);
pub const DELAY_AFTER_RETRY: Duration = Duration::from_millis(100);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpeechErrorKind {
    Network,
    SynthesisUnavailable,
    SynthesisFailed,
    AudioBusy,
    Interrupted,
    Canceled,
    NotAllowed,
}

impl SpeechErrorKind {
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Network | Self::SynthesisUnavailable)
    }

    /// Raised by our own cancellation; not worth reporting
    pub fn is_silent(&self) -> bool {
        matches!(self, Self::Interrupted | Self::Canceled)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpeechEventKind {
    Start,
    End,
    Pause,
    Error(SpeechErrorKind),
}

/// Callback from a speaker, tagged with the utterance it belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SpeechEvent {
    pub utterance: u64,
    pub kind: SpeechEventKind,
}

#[derive(Error, Debug)]
pub enum SpeechError {
    #[error("could not start speech program {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },
    #[error("speech output is busy")]
    Busy,
}

impl SpeechError {
    pub fn kind(&self) -> SpeechErrorKind {
        match self {
            SpeechError::Spawn { .. } => SpeechErrorKind::SynthesisUnavailable,
            SpeechError::Busy => SpeechErrorKind::AudioBusy,
        }
    }
}

/// Text-to-speech backend.
///
/// `speak` returns once playback has been started; progress is reported
/// later as `SpeechEvent`s carrying the same utterance id.
pub trait Speaker: Send {
    fn speak(&mut self, utterance: u64, text: &str) -> Result<(), SpeechError>;
    fn cancel(&mut self);
    fn is_speaking(&self) -> bool;
}

#[derive(Debug, Clone)]
struct Scheduled {
    text: String,
    at: Instant,
    retries_left: u8,
}

#[derive(Debug, Clone)]
struct Utterance {
    id: u64,
    text: String,
    retries_left: u8,
}

/// Drives a `Speaker`: cancel-before-speak, delayed playback, transient
/// retries, and an `is_playing` flag fed by both events and polling.
pub struct SpeechPlayer {
    speaker: Box<dyn Speaker>,
    is_playing: bool,
    last_id: u64,
    current: Option<Utterance>,
    scheduled: Option<Scheduled>,
}

impl SpeechPlayer {
    pub fn new(speaker: Box<dyn Speaker>) -> Self {
        Self {
            speaker,
            is_playing: false,
            last_id: 0,
            current: None,
            scheduled: None,
        }
    }

    pub fn silent() -> Self {
        Self::new(Box::new(SilentSpeaker))
    }

    pub fn is_playing(&self) -> bool {
        self.is_playing
    }

    pub fn has_scheduled(&self) -> bool {
        self.scheduled.is_some()
    }

    pub fn play(&mut self, text: &str, now: Instant) {
        self.scheduled = None;
        self.speak_now(text.to_string(), MAX_RETRIES, now);
    }

    /// Replaces any pending delayed playback
    pub fn schedule(&mut self, text: &str, delay: Duration, now: Instant) {
        self.scheduled = Some(Scheduled {
            text: text.to_string(),
            at: now + delay,
            retries_left: MAX_RETRIES,
        });
    }

    pub fn stop(&mut self) {
        self.scheduled = None;
        self.current = None;
        self.speaker.cancel();
        self.is_playing = false;
    }

    fn speak_now(&mut self, text: String, retries_left: u8, now: Instant) {
        self.speaker.cancel();
        self.last_id += 1;
        let id = self.last_id;
        debug!(utterance = id, retries_left, "speaking");

        match self.speaker.speak(id, &text) {
            Ok(()) => {
                self.current = Some(Utterance {
                    id,
                    text,
                    retries_left,
                });
            }
            Err(e) => {
                self.current = Some(Utterance {
                    id,
                    text,
                    retries_left,
                });
                self.fail(e.kind(), now);
            }
        }
    }

    fn fail(&mut self, kind: SpeechErrorKind, now: Instant) {
        self.is_playing = false;
        let Some(utterance) = self.current.take() else {
            return;
        };

        if kind.is_transient() && utterance.retries_left > 0 {
            debug!(?kind, retries_left = utterance.retries_left, "retrying speech");
            self.scheduled = Some(Scheduled {
                text: utterance.text,
                at: now + RETRY_DELAY,
                retries_left: utterance.retries_left - 1,
            });
        } else if kind.is_silent() {
            debug!(?kind, "speech interrupted");
        } else {
            warn!(?kind, "speech failed");
        }
    }

    pub fn on_event(&mut self, event: SpeechEvent, now: Instant) {
        if event.utterance != self.last_id {
            debug!(utterance = event.utterance, "ignoring event for superseded utterance");
            return;
        }
        match event.kind {
            SpeechEventKind::Start => self.is_playing = true,
            SpeechEventKind::Pause => self.is_playing = false,
            SpeechEventKind::End => {
                self.is_playing = false;
                self.current = None;
            }
            SpeechEventKind::Error(kind) => self.fail(kind, now),
        }
    }

    /// Fires due playback and reconciles `is_playing` with the speaker
    pub fn on_tick(&mut self, now: Instant) {
        if self.scheduled.as_ref().is_some_and(|s| s.at <= now) {
            if let Some(s) = self.scheduled.take() {
                self.speak_now(s.text, s.retries_left, now);
            }
        }
        self.is_playing = self.speaker.is_speaking();
    }
}

/// Speaks by running an external program with the text as its last argument
pub struct CommandSpeaker {
    program: String,
    args: Vec<String>,
    child: Arc<Mutex<Option<(u64, Child)>>>,
    tx: Sender<AppEvent>,
}

pub fn default_program() -> &'static str {
    if cfg!(target_os = "macos") {
        "say"
    } else {
        "espeak"
    }
}

impl CommandSpeaker {
    pub fn new(program: impl Into<String>, args: Vec<String>, tx: Sender<AppEvent>) -> Self {
        Self {
            program: program.into(),
            args,
            child: Arc::new(Mutex::new(None)),
            tx,
        }
    }

    fn watch(&self, utterance: u64) {
        let slot = Arc::clone(&self.child);
        let tx = self.tx.clone();
        thread::spawn(move || loop {
            let finished = {
                let Ok(mut guard) = slot.lock() else { break };
                let status = match guard.as_mut() {
                    Some((id, child)) if *id == utterance => child.try_wait(),
                    // cancelled or replaced
                    _ => break,
                };
                let kind = match status {
                    Ok(None) => None,
                    Ok(Some(status)) if status.success() => Some(SpeechEventKind::End),
                    Ok(Some(_)) | Err(_) => {
                        Some(SpeechEventKind::Error(SpeechErrorKind::SynthesisFailed))
                    }
                };
                if kind.is_some() {
                    *guard = None;
                }
                kind
            };
            if let Some(kind) = finished {
                let _ = tx.send(AppEvent::Speech(SpeechEvent { utterance, kind }));
                break;
            }
            thread::sleep(Duration::from_millis(50));
        });
    }
}

impl Speaker for CommandSpeaker {
    fn speak(&mut self, utterance: u64, text: &str) -> Result<(), SpeechError> {
        let child = Command::new(&self.program)
            .args(&self.args)
            .arg(text)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
            .map_err(|source| SpeechError::Spawn {
                program: self.program.clone(),
                source,
            })?;

        {
            let mut guard = self.child.lock().map_err(|_| SpeechError::Busy)?;
            *guard = Some((utterance, child));
        }
        let _ = self.tx.send(AppEvent::Speech(SpeechEvent {
            utterance,
            kind: SpeechEventKind::Start,
        }));
        self.watch(utterance);
        Ok(())
    }

    fn cancel(&mut self) {
        if let Ok(mut guard) = self.child.lock() {
            if let Some((_, mut child)) = guard.take() {
                let _ = child.kill();
                let _ = child.wait();
            }
        }
    }

    fn is_speaking(&self) -> bool {
        match self.child.lock() {
            Ok(mut guard) => match guard.as_mut() {
                Some((_, child)) => matches!(child.try_wait(), Ok(None)),
                None => false,
            },
            Err(_) => false,
        }
    }
}

impl Drop for CommandSpeaker {
    fn drop(&mut self) {
        self.cancel();
    }
}

/// Speaker used when speech is disabled
#[derive(Debug, Default, Clone, Copy)]
pub struct SilentSpeaker;

impl Speaker for SilentSpeaker {
    fn speak(&mut self, _utterance: u64, _text: &str) -> Result<(), SpeechError> {
        Ok(())
    }

    fn cancel(&mut self) {}

    fn is_speaking(&self) -> bool {
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct Log {
        spoken: Vec<(u64, String)>,
        cancels: usize,
        speaking: bool,
        refuse: bool,
    }

    #[derive(Clone, Default)]
    struct FakeSpeaker(Arc<Mutex<Log>>);

    impl Speaker for FakeSpeaker {
        fn speak(&mut self, utterance: u64, text: &str) -> Result<(), SpeechError> {
            let mut log = self.0.lock().unwrap();
            if log.refuse {
                return Err(SpeechError::Busy);
            }
            log.spoken.push((utterance, text.to_string()));
            log.speaking = true;
            Ok(())
        }

        fn cancel(&mut self) {
            let mut log = self.0.lock().unwrap();
            log.cancels += 1;
            log.speaking = false;
        }

        fn is_speaking(&self) -> bool {
            self.0.lock().unwrap().speaking
        }
    }

    fn player() -> (SpeechPlayer, Arc<Mutex<Log>>) {
        let fake = FakeSpeaker::default();
        let log = Arc::clone(&fake.0);
        (SpeechPlayer::new(Box::new(fake)), log)
    }

    fn event(utterance: u64, kind: SpeechEventKind) -> SpeechEvent {
        SpeechEvent { utterance, kind }
    }

    #[test]
    fn test_play_cancels_before_speaking() {
        let (mut p, log) = player();
        let now = Instant::now();
        p.play("one", now);
        p.play("two", now);

        let log = log.lock().unwrap();
        assert_eq!(log.cancels, 2);
        assert_eq!(log.spoken, vec![(1, "one".into()), (2, "two".into())]);
    }

    #[test]
    fn test_events_drive_playing_flag() {
        let (mut p, _log) = player();
        let now = Instant::now();
        p.play("hi", now);
        assert!(!p.is_playing());

        p.on_event(event(1, SpeechEventKind::Start), now);
        assert!(p.is_playing());
        p.on_event(event(1, SpeechEventKind::Pause), now);
        assert!(!p.is_playing());
        p.on_event(event(1, SpeechEventKind::Start), now);
        p.on_event(event(1, SpeechEventKind::End), now);
        assert!(!p.is_playing());
    }

    #[test]
    fn test_superseded_events_are_ignored() {
        let (mut p, _log) = player();
        let now = Instant::now();
        p.play("first", now);
        p.play("second", now);
        p.on_event(event(1, SpeechEventKind::Start), now);
        assert!(!p.is_playing());
    }

    #[test]
    fn test_schedule_fires_after_delay() {
        let (mut p, log) = player();
        let t0 = Instant::now();
        p.schedule("later", DELAY_AFTER_LOAD, t0);

        p.on_tick(t0 + Duration::from_millis(100));
        assert!(log.lock().unwrap().spoken.is_empty());
        assert!(p.has_scheduled());

        p.on_tick(t0 + Duration::from_millis(300));
        assert_eq!(log.lock().unwrap().spoken.len(), 1);
        assert!(!p.has_scheduled());
        assert!(p.is_playing());
    }

    #[test]
    fn test_poll_reconciles_lost_end_event() {
        let (mut p, log) = player();
        let now = Instant::now();
        p.play("hi", now);
        p.on_event(event(1, SpeechEventKind::Start), now);
        assert!(p.is_playing());

        log.lock().unwrap().speaking = false;
        p.on_tick(now);
        assert!(!p.is_playing());
    }

    #[test]
    fn test_transient_errors_retry_twice() {
        let (mut p, log) = player();
        let mut now = Instant::now();
        p.play("hello", now);

        for attempt in 1..=3u64 {
            p.on_event(
                event(attempt, SpeechEventKind::Error(SpeechErrorKind::Network)),
                now,
            );
            now += RETRY_DELAY;
            p.on_tick(now);
        }

        let log = log.lock().unwrap();
        assert_eq!(log.spoken.len(), 3);
        assert!(log.spoken.iter().all(|(_, t)| t == "hello"));
        assert!(!p.has_scheduled());
    }

    #[test]
    fn test_retry_waits_for_delay() {
        let (mut p, log) = player();
        let now = Instant::now();
        p.play("hello", now);
        p.on_event(
            event(1, SpeechEventKind::Error(SpeechErrorKind::SynthesisUnavailable)),
            now,
        );
        p.on_tick(now + Duration::from_millis(499));
        assert_eq!(log.lock().unwrap().spoken.len(), 1);
        p.on_tick(now + RETRY_DELAY);
        assert_eq!(log.lock().unwrap().spoken.len(), 2);
    }

    #[test]
    fn test_non_transient_error_is_not_retried() {
        let (mut p, log) = player();
        let now = Instant::now();
        p.play("hello", now);
        p.on_event(event(1, SpeechEventKind::Start), now);
        p.on_event(
            event(1, SpeechEventKind::Error(SpeechErrorKind::NotAllowed)),
            now,
        );

        assert!(!p.is_playing());
        assert!(!p.has_scheduled());
        p.on_tick(now + Duration::from_secs(5));
        assert_eq!(log.lock().unwrap().spoken.len(), 1);
    }

    #[test]
    fn test_synchronous_failure_is_handled_like_an_event() {
        let (mut p, log) = player();
        log.lock().unwrap().refuse = true;
        p.play("hello", Instant::now());
        assert!(!p.is_playing());
        assert!(!p.has_scheduled());
    }

    #[test]
    fn test_stop_drops_schedule() {
        let (mut p, log) = player();
        let now = Instant::now();
        p.schedule("later", DELAY_AFTER_RESULT, now);
        p.stop();
        p.on_tick(now + Duration::from_secs(1));
        assert!(log.lock().unwrap().spoken.is_empty());
    }

    #[test]
    fn test_error_kind_classes() {
        assert!(SpeechErrorKind::Network.is_transient());
        assert!(SpeechErrorKind::SynthesisUnavailable.is_transient());
        assert!(!SpeechErrorKind::SynthesisFailed.is_transient());
        assert!(SpeechErrorKind::Canceled.is_silent());
        assert_eq!(
            SpeechError::Spawn {
                program: "x".into(),
                source: std::io::Error::from(std::io::ErrorKind::NotFound)
            }
            .kind(),
            SpeechErrorKind::SynthesisUnavailable
        );
    }

    #[test]
    fn test_silent_player_never_plays() {
        let mut p = SpeechPlayer::silent();
        let now = Instant::now();
        p.play("hello", now);
        p.on_tick(now);
        assert!(!p.is_playing());
    }

    #[test]
    fn test_missing_program_reports_unavailable() {
        let (tx, _rx) = std::sync::mpsc::channel();
        let mut speaker = CommandSpeaker::new("definitely-not-a-tts-program", vec![], tx);
        let err = speaker.speak(1, "hello").unwrap_err();
        assert_eq!(err.kind(), SpeechErrorKind::SynthesisUnavailable);
        assert!(!speaker.is_speaking());
    }
}
