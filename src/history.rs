use chrono::{DateTime, Local};
use rusqlite::{params, Connection};
use std::path::{Path, PathBuf};

use crate::app_dirs::AppDirs;
use crate::error::EngineError;
use crate::plan::{Discipline, WorkoutPlan};
use crate::session::CompletionPayload;

/// Receives finished sessions
pub trait HistorySink {
    fn record(&mut self, payload: &CompletionPayload) -> Result<(), EngineError>;
}

/// One finished workout as stored
#[derive(Debug, Clone, PartialEq)]
pub struct HistoryEntry {
    pub discipline: Discipline,
    pub duration_seconds: u64,
    pub calories_estimate: u32,
    pub plan: WorkoutPlan,
    pub notes: Option<String>,
    pub completed_at: DateTime<Local>,
}

/// Workout history on SQLite
#[derive(Debug)]
pub struct HistoryDb {
    conn: Connection,
}

impl HistoryDb {
    /// Open the database in the state directory, creating it if needed
    pub fn open_default() -> Result<Self, EngineError> {
        let path = AppDirs::db_path().unwrap_or_else(|| PathBuf::from("bellwork_history.db"));
        Self::open(path)
    }

    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, EngineError> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                rusqlite::Error::SqliteFailure(
                    rusqlite::ffi::Error::new(rusqlite::ffi::SQLITE_CANTOPEN),
                    Some(format!("Failed to create directory: {}", e)),
                )
            })?;
        }
        let db = Self {
            conn: Connection::open(path)?,
        };
        db.init()?;
        tracing::debug!(path = %path.display(), "history database opened");
        Ok(db)
    }

    pub fn open_in_memory() -> Result<Self, EngineError> {
        let db = Self {
            conn: Connection::open_in_memory()?,
        };
        db.init()?;
        Ok(db)
    }

    fn init(&self) -> Result<(), EngineError> {
        self.conn.execute(
            r#"
            CREATE TABLE IF NOT EXISTS workout_history (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                discipline TEXT NOT NULL,
                duration_seconds INTEGER NOT NULL,
                calories INTEGER NOT NULL,
                plan TEXT NOT NULL,
                notes TEXT,
                completed_at TEXT NOT NULL
            )
            "#,
            [],
        )?;
        self.conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_workout_history_completed ON workout_history(completed_at)",
            [],
        )?;
        Ok(())
    }

    pub fn record_at(
        &self,
        payload: &CompletionPayload,
        completed_at: DateTime<Local>,
    ) -> Result<(), EngineError> {
        let plan = serde_json::to_string(&payload.plan_snapshot)?;
        self.conn.execute(
            r#"
            INSERT INTO workout_history
            (discipline, duration_seconds, calories, plan, notes, completed_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            "#,
            params![
                payload.discipline.to_string(),
                payload.duration_seconds as i64,
                payload.calories_estimate,
                plan,
                payload.notes,
                completed_at.to_rfc3339(),
            ],
        )?;
        tracing::info!(
            discipline = %payload.discipline,
            duration = payload.duration_seconds,
            "workout recorded"
        );
        Ok(())
    }

    /// Newest first
    pub fn recent(&self, limit: usize) -> Result<Vec<HistoryEntry>, EngineError> {
        let mut stmt = self.conn.prepare(
            r#"
            SELECT duration_seconds, calories, plan, notes, completed_at
            FROM workout_history
            ORDER BY completed_at DESC, id DESC
            LIMIT ?1
            "#,
        )?;

        let rows = stmt.query_map([limit as i64], |row| {
            let completed: String = row.get(4)?;
            let completed_at = DateTime::parse_from_rfc3339(&completed)
                .map_err(|_| {
                    rusqlite::Error::InvalidColumnType(
                        4,
                        "completed_at".to_string(),
                        rusqlite::types::Type::Text,
                    )
                })?
                .with_timezone(&Local);
            let raw_plan: String = row.get(2)?;
            let plan: WorkoutPlan = serde_json::from_str(&raw_plan).map_err(|e| {
                rusqlite::Error::FromSqlConversionFailure(2, rusqlite::types::Type::Text, Box::new(e))
            })?;
            Ok(HistoryEntry {
                discipline: plan.discipline(),
                duration_seconds: row.get::<_, i64>(0)?.max(0) as u64,
                calories_estimate: row.get(1)?,
                plan,
                notes: row.get(3)?,
                completed_at,
            })
        })?;

        let mut entries = Vec::new();
        for entry in rows {
            entries.push(entry?);
        }
        Ok(entries)
    }

    pub fn count(&self) -> Result<usize, EngineError> {
        let n: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM workout_history", [], |row| row.get(0))?;
        Ok(n.max(0) as usize)
    }
}

impl HistorySink for HistoryDb {
    fn record(&mut self, payload: &CompletionPayload) -> Result<(), EngineError> {
        self.record_at(payload, Local::now())
    }
}
