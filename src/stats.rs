use crate::app_dirs::AppDirs;
use crate::sentence::SentenceId;
use chrono::{DateTime, Local};
use rusqlite::{params, Connection, Result};
use std::fmt;
use std::path::{Path, PathBuf};

/// One graded submission
#[derive(Debug, Clone, PartialEq)]
pub struct Attempt {
    pub sentence_id: SentenceId,
    pub difficulty: String,
    /// 1 for the first submission of a sentence, counting continues across retries
    pub attempt: u32,
    pub words_total: usize,
    pub words_correct: usize,
    pub all_correct: bool,
    pub timestamp: DateTime<Local>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Summary {
    pub sentences: usize,
    pub submissions: usize,
    /// Percentage of sentences solved on their first submission
    pub first_try_rate: f64,
    /// Percentage of graded word units that were right
    pub word_accuracy: f64,
}

impl fmt::Display for Summary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "sentences practiced: {}", self.sentences)?;
        writeln!(f, "submissions:         {}", self.submissions)?;
        writeln!(f, "first-try success:   {:.1}%", self.first_try_rate)?;
        write!(f, "word accuracy:       {:.1}%", self.word_accuracy)
    }
}

/// SQLite-backed log of practice submissions
#[derive(Debug)]
pub struct PracticeLog {
    conn: Connection,
}

impl PracticeLog {
    /// Open the log under the state directory, creating it if needed
    pub fn new() -> Result<Self> {
        let path = AppDirs::db_path().unwrap_or_else(|| PathBuf::from("dictate_practice.db"));
        Self::open(&path)
    }

    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                rusqlite::Error::SqliteFailure(
                    rusqlite::ffi::Error::new(rusqlite::ffi::SQLITE_CANTOPEN),
                    Some(format!("Failed to create directory: {}", e)),
                )
            })?;
        }
        Self::init(Connection::open(path)?)
    }

    pub fn open_in_memory() -> Result<Self> {
        Self::init(Connection::open_in_memory()?)
    }

    fn init(conn: Connection) -> Result<Self> {
        conn.execute(
            r#"
            CREATE TABLE IF NOT EXISTS attempts (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                sentence_id INTEGER NOT NULL,
                difficulty TEXT NOT NULL,
                attempt INTEGER NOT NULL,
                words_total INTEGER NOT NULL,
                words_correct INTEGER NOT NULL,
                all_correct BOOLEAN NOT NULL,
                timestamp TEXT NOT NULL
            )
            "#,
            [],
        )?;

        conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_attempts_sentence ON attempts(difficulty, sentence_id)",
            [],
        )?;

        Ok(Self { conn })
    }

    pub fn record(&self, attempt: &Attempt) -> Result<()> {
        self.conn.execute(
            r#"
            INSERT INTO attempts
            (sentence_id, difficulty, attempt, words_total, words_correct, all_correct, timestamp)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
            "#,
            params![
                attempt.sentence_id.0 as i64,
                attempt.difficulty,
                attempt.attempt,
                attempt.words_total as i64,
                attempt.words_correct as i64,
                attempt.all_correct,
                attempt.timestamp.to_rfc3339(),
            ],
        )?;
        Ok(())
    }

    /// Most recent first
    pub fn recent(&self, limit: usize) -> Result<Vec<Attempt>> {
        let mut stmt = self.conn.prepare(
            r#"
            SELECT sentence_id, difficulty, attempt, words_total, words_correct, all_correct, timestamp
            FROM attempts
            ORDER BY id DESC
            LIMIT ?1
            "#,
        )?;

        let rows = stmt.query_map(params![limit as i64], |row| {
            let timestamp: String = row.get(6)?;
            let timestamp = DateTime::parse_from_rfc3339(&timestamp)
                .map(|t| t.with_timezone(&Local))
                .map_err(|e| {
                    rusqlite::Error::FromSqlConversionFailure(
                        6,
                        rusqlite::types::Type::Text,
                        Box::new(e),
                    )
                })?;
            Ok(Attempt {
                sentence_id: SentenceId(row.get::<_, i64>(0)? as u64),
                difficulty: row.get(1)?,
                attempt: row.get(2)?,
                words_total: row.get::<_, i64>(3)? as usize,
                words_correct: row.get::<_, i64>(4)? as usize,
                all_correct: row.get(5)?,
                timestamp,
            })
        })?;

        let attempts = rows.collect::<Result<Vec<_>>>()?;
        Ok(attempts)
    }

    pub fn summary(&self) -> Result<Summary> {
        let (submissions, words_total, words_correct): (i64, i64, i64) = self.conn.query_row(
            "SELECT COUNT(*), COALESCE(SUM(words_total), 0), COALESCE(SUM(words_correct), 0) FROM attempts",
            [],
            |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
        )?;

        let sentences: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM (SELECT DISTINCT difficulty, sentence_id FROM attempts)",
            [],
            |row| row.get(0),
        )?;

        let first_try: Option<f64> = self.conn.query_row(
            "SELECT AVG(CASE WHEN all_correct THEN 100.0 ELSE 0.0 END) FROM attempts WHERE attempt = 1",
            [],
            |row| row.get(0),
        )?;

        let word_accuracy = if words_total > 0 {
            words_correct as f64 / words_total as f64 * 100.0
        } else {
            0.0
        };

        Ok(Summary {
            sentences: sentences as usize,
            submissions: submissions as usize,
            first_try_rate: first_try.unwrap_or(0.0),
            word_accuracy,
        })
    }

    pub fn clear(&self) -> Result<()> {
        self.conn.execute("DELETE FROM attempts", [])?;
        Ok(())
    }
}
