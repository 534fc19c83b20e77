use clap::{error::ErrorKind, CommandFactory, Parser};
use crossterm::{
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
    tty::IsTty,
};
use dictate::{
    app::App,
    app_dirs::AppDirs,
    config::{Config, ConfigStore, FileConfigStore},
    fetch::{FetchMode, Fetcher},
    handoff::{FileHandoffStore, HandoffError, HandoffId, HandoffStore, SystemClock},
    logging,
    runtime::{AppEventSource, CrosstermEventSource, FixedTicker, Runner, Ticker},
    sentence::{tags, Difficulty, Sentence},
    session::{PlayMode, Session, SessionConfig},
    settings::{self, Selection, StartPlan},
    source::{HttpSentenceSource, LocalSentenceSource, SentenceSource},
    speech::{CommandSpeaker, SpeechPlayer},
    stats::PracticeLog,
};
use ratatui::{
    backend::{Backend, CrosstermBackend},
    Terminal,
};
use std::{
    error::Error,
    fmt::Display,
    io::{self, stdin},
    path::PathBuf,
    sync::Arc,
    time::{Duration, Instant},
};
use tracing::{info, warn};

const TICK_RATE_MS: u64 = 100;

/// terminal dictation trainer
#[derive(Parser, Debug, Clone)]
#[clap(
    version,
    about,
    long_about = "Hear a sentence, read its translation and type it back word by word. Right words lock in place while you fix the rest."
)]
pub struct Cli {
    /// difficulties to draw sentences from, comma separated (remembered between runs)
    #[clap(short = 'd', long, value_enum, value_delimiter = ',')]
    difficulty: Vec<Difficulty>,

    /// order in which sentences are served
    #[clap(short = 'm', long, value_enum)]
    mode: Option<PlayMode>,

    /// practice server base URL; the bundled decks are used when unset
    #[clap(long)]
    server: Option<String>,

    /// practice a deck file (.csv offline, .xlsx/.xls with --server)
    #[clap(long)]
    deck: Option<PathBuf>,

    /// ad hoc sentence pair "source=target", repeatable
    #[clap(short = 'p', long = "pair")]
    pairs: Vec<String>,

    /// store the --pair sentences and print the command that opens them
    #[clap(long)]
    hand_off: bool,

    /// open a practice set stored with --hand-off
    #[clap(long)]
    temp_practice: Option<u64>,

    /// clear every wrong or unfinished word after a submission instead of locking the right ones
    #[clap(long)]
    no_partial_credit: bool,

    /// disable text to speech
    #[clap(long)]
    no_speech: bool,

    /// text to speech program; the sentence is passed as its last argument
    #[clap(long)]
    speech_program: Option<String>,

    /// print practice statistics and exit
    #[clap(long)]
    stats: bool,
}

impl Cli {
    /// Flags override the saved defaults
    fn apply(&self, config: &mut Config) {
        if let Some(mode) = self.mode {
            config.play_mode = mode;
        }
        if let Some(server) = &self.server {
            config.server_url = Some(server.clone());
        }
        if self.no_partial_credit {
            config.partial_credit = false;
        }
        if self.no_speech {
            config.speech.enabled = false;
        }
        if let Some(program) = &self.speech_program {
            config.speech.program = program.clone();
        }
    }

    fn selection(&self, config: &Config) -> Selection {
        Selection {
            difficulties: self.difficulty.clone(),
            saved_difficulties: config.difficulties.clone(),
            deck: self.deck.clone(),
            pairs: self.pairs.clone(),
            hand_off: self.hand_off,
            temp_practice: self.temp_practice.map(HandoffId),
        }
    }
}

fn exit_with(kind: ErrorKind, message: impl Display) -> ! {
    Cli::command().error(kind, message).exit()
}

fn remote_source(config: &Config) -> Option<Arc<dyn SentenceSource>> {
    config
        .server_url
        .as_ref()
        .map(|url| Arc::new(HttpSentenceSource::new(url.as_str())) as Arc<dyn SentenceSource>)
}

/// Session plus the source that answers its requests
fn prepare(
    plan: StartPlan,
    config: &mut Config,
    handoff: &dyn HandoffStore,
) -> Result<Option<(Session, Arc<dyn SentenceSource>)>, Box<dyn Error>> {
    let fixed = |sentences: Vec<Sentence>, mode: PlayMode| {
        let source: Arc<dyn SentenceSource> = Arc::new(LocalSentenceSource::new(sentences.clone()));
        (Session::with_list(sentences, mode), source)
    };

    let prepared = match plan {
        StartPlan::Standard(difficulties) => {
            config.difficulties = difficulties.clone();
            let source: Arc<dyn SentenceSource> = match remote_source(config) {
                Some(source) => source,
                None => Arc::new(LocalSentenceSource::builtin()?),
            };
            let session = Session::new(SessionConfig {
                mode: config.play_mode,
                difficulties: tags(&difficulties),
            });
            (session, source)
        }
        StartPlan::Deck(path) => {
            let remote = remote_source(config);
            let importer: Arc<dyn SentenceSource> = match &remote {
                Some(remote) => Arc::clone(remote),
                None => Arc::new(LocalSentenceSource::default()),
            };
            let upload = importer
                .upload(&path)
                .unwrap_or_else(|e| exit_with(ErrorKind::InvalidValue, e));
            info!(path = %path.display(), total = upload.total, "deck imported");
            match remote {
                Some(remote) => (Session::with_list(upload.sentences, config.play_mode), remote),
                None => fixed(upload.sentences, config.play_mode),
            }
        }
        StartPlan::AdHoc(sentences) => fixed(sentences, config.play_mode),
        StartPlan::HandOff(sentences) => {
            let id = handoff.put(sentences)?;
            println!("dictate --temp-practice {id}");
            return Ok(None);
        }
        StartPlan::Resume(id) => fixed(handoff.get(id)?.sentences, PlayMode::Sequential),
    };
    Ok(Some(prepared))
}

fn is_missing_set(e: &(dyn Error + 'static)) -> bool {
    matches!(
        e.downcast_ref::<HandoffError>(),
        Some(HandoffError::NotFound(_) | HandoffError::Expired(_))
    )
}

fn purge_handoffs(handoff: &dyn HandoffStore) {
    match handoff.purge_expired() {
        Ok(0) => {}
        Ok(n) => info!(removed = n, "expired practice sets purged"),
        Err(e) => warn!(error = %e, "could not purge practice sets"),
    }
}

fn main() -> Result<(), Box<dyn Error>> {
    let cli = Cli::parse();

    if cli.stats {
        println!("{}", PracticeLog::new()?.summary()?);
        return Ok(());
    }

    if let Some(path) = AppDirs::log_path() {
        logging::init(&path)?;
    }

    let store = FileConfigStore::new();
    let mut config = store.load();
    cli.apply(&mut config);

    let plan = settings::plan(&cli.selection(&config))
        .unwrap_or_else(|e| exit_with(ErrorKind::ValueValidation, e));

    let handoff = FileHandoffStore::new(
        AppDirs::handoff_dir().unwrap_or_else(|| PathBuf::from("dictate_handoff")),
        config.handoff_ttl(),
        Arc::new(SystemClock),
    );

    let needs_tty = !matches!(plan, StartPlan::HandOff(_));
    if needs_tty && !stdin().is_tty() {
        exit_with(ErrorKind::Io, "stdin must be a tty");
    }

    // purge only after a resumed set has been read, so a stale id reports as expired
    let prepared = prepare(plan, &mut config, &handoff);
    purge_handoffs(&handoff);
    let prepared = match prepared {
        Err(e) if is_missing_set(e.as_ref()) => exit_with(ErrorKind::InvalidValue, e),
        other => other?,
    };
    let Some((session, source)) = prepared else {
        return Ok(());
    };
    if let Err(e) = store.save(&config) {
        warn!(error = %e, "could not save config");
    }

    let log = match PracticeLog::new() {
        Ok(log) => Some(log),
        Err(e) => {
            warn!(error = %e, "practice log disabled");
            None
        }
    };

    enable_raw_mode()?;

    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let runner = Runner::new(
        CrosstermEventSource::new(),
        FixedTicker::new(Duration::from_millis(TICK_RATE_MS)),
    );
    let fetch_mode = if config.server_url.is_some() {
        FetchMode::Background
    } else {
        FetchMode::Inline
    };
    let fetcher = Fetcher::new(source, runner.sender(), fetch_mode);
    let speech = if config.speech.enabled {
        SpeechPlayer::new(Box::new(CommandSpeaker::new(
            config.speech.program.clone(),
            config.speech.args.clone(),
            runner.sender(),
        )))
    } else {
        SpeechPlayer::silent()
    };

    let mut app = App::new(session, fetcher, speech, log, config.partial_credit);
    let result = start_tui(&mut terminal, &mut app, &runner);

    app.speech.stop();
    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen,)?;
    terminal.show_cursor()?;

    result
}

fn start_tui<B: Backend, E: AppEventSource, T: Ticker>(
    terminal: &mut Terminal<B>,
    app: &mut App,
    runner: &Runner<E, T>,
) -> Result<(), Box<dyn Error>> {
    app.start(Instant::now());

    while !app.should_quit {
        terminal.draw(|f| f.render_widget(&*app, f.area()))?;
        let event = runner.step();
        app.handle_event(event, Instant::now());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
    use dictate::handoff::{FixedClock, MemoryHandoffStore};
    use dictate::runtime::{AppEvent, TestEventSource};
    use ratatui::backend::TestBackend;

    #[test]
    fn test_cli_default_values() {
        let cli = Cli::parse_from(["dictate"]);

        assert!(cli.difficulty.is_empty());
        assert_eq!(cli.mode, None);
        assert_eq!(cli.server, None);
        assert!(cli.pairs.is_empty());
        assert!(!cli.hand_off);
        assert!(!cli.stats);
    }

    #[test]
    fn test_cli_difficulties_are_comma_separated() {
        let cli = Cli::parse_from(["dictate", "-d", "cet4,ielts"]);
        assert_eq!(cli.difficulty, vec![Difficulty::Cet4, Difficulty::Ielts]);

        let cli = Cli::parse_from(["dictate", "--difficulty", "cet6", "-d", "custom"]);
        assert_eq!(cli.difficulty, vec![Difficulty::Cet6, Difficulty::Custom]);

        assert!(Cli::try_parse_from(["dictate", "-d", "toefl"]).is_err());
    }

    #[test]
    fn test_cli_pairs_and_handoff() {
        let cli = Cli::parse_from([
            "dictate",
            "--pair",
            "你好=Hello",
            "-p",
            "谢谢=Thanks",
            "--hand-off",
        ]);
        assert_eq!(cli.pairs.len(), 2);
        assert!(cli.hand_off);

        let cli = Cli::parse_from(["dictate", "--temp-practice", "1700000000000"]);
        assert_eq!(cli.temp_practice, Some(1_700_000_000_000));
    }

    #[test]
    fn test_cli_overrides_config() {
        let cli = Cli::parse_from([
            "dictate",
            "-m",
            "sequential",
            "--server",
            "http://localhost:3000",
            "--no-partial-credit",
            "--no-speech",
        ]);
        let mut config = Config::default();
        cli.apply(&mut config);

        assert_eq!(config.play_mode, PlayMode::Sequential);
        assert_eq!(config.server_url.as_deref(), Some("http://localhost:3000"));
        assert!(!config.partial_credit);
        assert!(!config.speech.enabled);
    }

    #[test]
    fn test_flags_left_out_keep_saved_values() {
        let cli = Cli::parse_from(["dictate"]);
        let mut config = Config {
            play_mode: PlayMode::Sequential,
            ..Config::default()
        };
        cli.apply(&mut config);
        assert_eq!(config.play_mode, PlayMode::Sequential);
        assert!(config.partial_credit);
    }

    #[test]
    fn test_selection_carries_saved_difficulties() {
        let cli = Cli::parse_from(["dictate", "--temp-practice", "5"]);
        let selection = cli.selection(&Config::default());
        assert_eq!(selection.saved_difficulties, vec![Difficulty::Cet4]);
        assert_eq!(selection.temp_practice, Some(HandoffId(5)));
    }

    fn memory_store() -> MemoryHandoffStore {
        MemoryHandoffStore::new(
            Duration::from_secs(60),
            Arc::new(FixedClock::new(1_000)),
        )
    }

    #[test]
    fn test_prepare_standard_remembers_difficulties() {
        let mut config = Config::default();
        let prepared = prepare(
            StartPlan::Standard(vec![Difficulty::Ielts]),
            &mut config,
            &memory_store(),
        )
        .unwrap();

        let (session, _source) = prepared.unwrap();
        assert_eq!(session.config.difficulties, vec!["ielts".to_string()]);
        assert_eq!(config.difficulties, vec![Difficulty::Ielts]);
    }

    #[test]
    fn test_prepare_hand_off_then_resume() {
        let store = memory_store();
        let mut config = Config::default();
        let sentences = vec![Sentence::new(1, "你好", "Hello", "custom")];

        let prepared = prepare(StartPlan::HandOff(sentences.clone()), &mut config, &store).unwrap();
        assert!(prepared.is_none());

        let (session, source) = prepare(StartPlan::Resume(HandoffId(1_000)), &mut config, &store)
            .unwrap()
            .unwrap();
        assert_eq!(session.list(), sentences.as_slice());
        assert_eq!(session.mode(), PlayMode::Sequential);
        assert_matches!(source.check(sentences[0].id, "hello"), Ok(r) if r.is_correct);
    }

    #[test]
    fn test_prepare_ad_hoc_follows_play_mode() {
        let store = memory_store();
        let run = |args: &[&str]| {
            let cli = Cli::parse_from(args);
            let mut config = Config::default();
            cli.apply(&mut config);
            let plan = settings::plan(&cli.selection(&config)).unwrap();
            assert_matches!(plan, StartPlan::AdHoc(_));
            prepare(plan, &mut config, &store).unwrap().unwrap().0
        };

        let mut session = run(&["dictate", "-m", "random", "-p", "a=Hello", "-p", "b=World"]);
        assert_eq!(session.mode(), PlayMode::Random);
        assert_eq!(session.list().len(), 2);
        assert_matches!(session.start(), Ok(dictate::session::Step::Show(_)));
        assert!(!session.is_loading());
        assert!(session.progress().is_none());

        let session = run(&["dictate", "-m", "sequential", "-p", "a=Hello", "-p", "b=World"]);
        assert_eq!(session.mode(), PlayMode::Sequential);
    }

    #[test]
    fn test_resume_of_stale_set_reports_expired_before_purge() {
        let clock = Arc::new(FixedClock::new(1_000));
        let store = MemoryHandoffStore::new(Duration::from_secs(60), clock.clone());
        let mut config = Config::default();
        let id = store
            .put(vec![Sentence::new(1, "你好", "Hello", "custom")])
            .unwrap();
        clock.advance(Duration::from_secs(61));

        let err = prepare(StartPlan::Resume(id), &mut config, &store).err().unwrap();
        assert!(is_missing_set(err.as_ref()));
        assert_matches!(err.downcast_ref::<HandoffError>(), Some(HandoffError::Expired(_)));

        purge_handoffs(&store);
        assert_matches!(store.get(id), Err(HandoffError::NotFound(_)));
    }

    #[test]
    fn test_draws_and_quits_through_the_loop() {
        let (events, tx) = TestEventSource::new();
        let runner = Runner::new(events, FixedTicker::new(Duration::from_millis(5)));
        let sentences = vec![Sentence::new(1, "你好", "Hello", "custom")];
        let source = Arc::new(LocalSentenceSource::new(sentences.clone()));
        let mut app = App::new(
            Session::with_list(sentences, PlayMode::Sequential),
            Fetcher::new(source, runner.sender(), FetchMode::Inline),
            SpeechPlayer::silent(),
            None,
            true,
        );

        tx.send(AppEvent::Key(KeyEvent::new(KeyCode::Char('h'), KeyModifiers::NONE)))
            .unwrap();
        tx.send(AppEvent::Key(KeyEvent::new(KeyCode::Esc, KeyModifiers::NONE)))
            .unwrap();

        let mut terminal = Terminal::new(TestBackend::new(80, 24)).unwrap();
        start_tui(&mut terminal, &mut app, &runner).unwrap();

        assert!(app.should_quit);
        assert_eq!(app.card.as_ref().unwrap().state.slots[0], Some('h'));
    }
}
