use crate::app_dirs::AppDirs;
use crate::stats::DistributionStats;
use chrono::{DateTime, Local, TimeZone};
use rusqlite::{params, Connection, Result};
use std::path::PathBuf;

/// Summary row for one finished practice session.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionSummary {
    pub finished_at: DateTime<Local>,
    pub throws: usize,
    pub mean_x: f64,
    pub mean_y: f64,
    pub var_x: f64,
    pub var_y: f64,
    pub cov_xy: f64,
    /// Mean distance of the group center from the board center, a quick
    /// bias indicator across sessions.
    pub center_offset_mm: f64,
}

impl SessionSummary {
    pub fn from_stats(finished_at: DateTime<Local>, throws: usize, stats: &DistributionStats) -> Self {
        Self {
            finished_at,
            throws,
            mean_x: stats.mean.0,
            mean_y: stats.mean.1,
            var_x: stats.var_x,
            var_y: stats.var_y,
            cov_xy: stats.cov_xy,
            center_offset_mm: stats.mean.0.hypot(stats.mean.1),
        }
    }
}

/// Database of practice-session summaries, so accuracy trends survive the
/// per-session CSV logs.
#[derive(Debug)]
pub struct HistoryDb {
    conn: Connection,
}

impl HistoryDb {
    /// Initialize the database connection and create tables if needed
    pub fn new() -> Result<Self> {
        let db_path = Self::get_db_path().unwrap_or_else(|| PathBuf::from("dartbridge_history.db"));

        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                rusqlite::Error::SqliteFailure(
                    rusqlite::ffi::Error::new(rusqlite::ffi::SQLITE_CANTOPEN),
                    Some(format!("Failed to create directory: {}", e)),
                )
            })?;
        }

        let conn = Connection::open(&db_path)?;
        Self::with_connection(conn)
    }

    /// In-memory database, used by tests.
    pub fn in_memory() -> Result<Self> {
        Self::with_connection(Connection::open_in_memory()?)
    }

    fn with_connection(conn: Connection) -> Result<Self> {
        conn.execute(
            r#"
            CREATE TABLE IF NOT EXISTS training_sessions (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                finished_at INTEGER NOT NULL,
                throws INTEGER NOT NULL,
                mean_x REAL NOT NULL,
                mean_y REAL NOT NULL,
                var_x REAL NOT NULL,
                var_y REAL NOT NULL,
                cov_xy REAL NOT NULL,
                center_offset_mm REAL NOT NULL,
                created_at DATETIME DEFAULT CURRENT_TIMESTAMP
            )
            "#,
            [],
        )?;

        conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_training_sessions_finished_at ON training_sessions(finished_at)",
            [],
        )?;

        Ok(HistoryDb { conn })
    }

    fn get_db_path() -> Option<PathBuf> {
        AppDirs::db_path()
    }

    /// Record one finished session
    pub fn record_session(&self, summary: &SessionSummary) -> Result<()> {
        self.conn.execute(
            r#"
            INSERT INTO training_sessions
            (finished_at, throws, mean_x, mean_y, var_x, var_y, cov_xy, center_offset_mm)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
            "#,
            params![
                // Unix milliseconds; sorts chronologically no matter what
                // offset the wall clock had when the session ended.
                summary.finished_at.timestamp_millis(),
                summary.throws as i64,
                summary.mean_x,
                summary.mean_y,
                summary.var_x,
                summary.var_y,
                summary.cov_xy,
                summary.center_offset_mm,
            ],
        )?;

        Ok(())
    }

    /// All recorded sessions, most recent first.
    pub fn session_summaries(&self) -> Result<Vec<SessionSummary>> {
        let mut stmt = self.conn.prepare(
            r#"
            SELECT finished_at, throws, mean_x, mean_y, var_x, var_y, cov_xy, center_offset_mm
            FROM training_sessions
            ORDER BY finished_at DESC
            "#,
        )?;

        let rows = stmt.query_map([], |row| {
            let finished_at_ms: i64 = row.get(0)?;
            let finished_at = Local
                .timestamp_millis_opt(finished_at_ms)
                .single()
                .ok_or_else(|| {
                    rusqlite::Error::InvalidColumnType(
                        0,
                        "finished_at".to_string(),
                        rusqlite::types::Type::Integer,
                    )
                })?;
            let throws: i64 = row.get(1)?;

            Ok(SessionSummary {
                finished_at,
                throws: throws as usize,
                mean_x: row.get(2)?,
                mean_y: row.get(3)?,
                var_x: row.get(4)?,
                var_y: row.get(5)?,
                cov_xy: row.get(6)?,
                center_offset_mm: row.get(7)?,
            })
        })?;

        rows.collect()
    }
}
