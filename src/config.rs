use crate::app_dirs::AppDirs;
use crate::sentence::Difficulty;
use crate::session::PlayMode;
use crate::speech;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct SpeechConfig {
    pub enabled: bool,
    pub program: String,
    /// Passed before the text, which is always the last argument
    pub args: Vec<String>,
}

impl Default for SpeechConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            program: speech::default_program().to_string(),
            args: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Config {
    pub difficulties: Vec<Difficulty>,
    pub play_mode: PlayMode,
    pub partial_credit: bool,
    /// Practice server base URL; bundled decks are used when unset
    pub server_url: Option<String>,
    pub speech: SpeechConfig,
    pub handoff_ttl_hours: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            difficulties: vec![Difficulty::Cet4],
            play_mode: PlayMode::Random,
            partial_credit: true,
            server_url: None,
            speech: SpeechConfig::default(),
            handoff_ttl_hours: 24,
        }
    }
}

impl Config {
    pub fn handoff_ttl(&self) -> Duration {
        Duration::from_secs(self.handoff_ttl_hours.saturating_mul(60 * 60))
    }
}

pub trait ConfigStore {
    fn load(&self) -> Config;
    fn save(&self, cfg: &Config) -> std::io::Result<()>;
}

#[derive(Debug, Clone)]
pub struct FileConfigStore {
    path: PathBuf,
}

impl FileConfigStore {
    #[allow(clippy::new_without_default)]
    pub fn new() -> Self {
        let path = AppDirs::config_path().unwrap_or_else(|| PathBuf::from("dictate_config.json"));
        Self { path }
    }

    pub fn with_path<P: AsRef<Path>>(p: P) -> Self {
        Self {
            path: p.as_ref().to_path_buf(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Default for FileConfigStore {
    fn default() -> Self {
        Self::new()
    }
}

impl ConfigStore for FileConfigStore {
    fn load(&self) -> Config {
        if let Ok(bytes) = fs::read(&self.path) {
            if let Ok(cfg) = serde_json::from_slice::<Config>(&bytes) {
                return cfg;
            }
        }
        Config::default()
    }

    fn save(&self, cfg: &Config) -> std::io::Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        let data = serde_json::to_vec_pretty(cfg)?;
        fs::write(&self.path, data)
    }
}
