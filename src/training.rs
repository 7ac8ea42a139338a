use crate::dart::{DartCode, ThrowEvent};
use crate::stats::DistributionStats;
use chrono::{DateTime, Local, NaiveDateTime};
use itertools::Itertools;
use log::warn;
use std::fmt;
use std::path::{Path, PathBuf};

const CSV_HEADER: [&str; 5] = ["timestamp", "code", "x_mm", "y_mm", "turn_state"];
const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// One logged practice throw. Insertion order is chronological order.
#[derive(Clone, Debug, PartialEq)]
pub struct ThrowRecord {
    pub timestamp: DateTime<Local>,
    pub code: DartCode,
    pub x_mm: f64,
    pub y_mm: f64,
}

#[derive(Debug)]
pub enum TrainingError {
    /// The board did not report impact coordinates for this dart.
    MissingCoords,
    /// Writing the log failed; the in-memory session is unaffected.
    Persist(csv::Error),
}

impl fmt::Display for TrainingError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TrainingError::MissingCoords => write!(f, "dart event carries no coordinates"),
            TrainingError::Persist(err) => write!(f, "could not write practice log: {}", err),
        }
    }
}

impl std::error::Error for TrainingError {}

impl From<csv::Error> for TrainingError {
    fn from(err: csv::Error) -> Self {
        TrainingError::Persist(err)
    }
}

/// A practice-logging session: an append-only throw list persisted to CSV,
/// with undo, selection, positional nudge, and distribution stats recomputed
/// after every mutation.
#[derive(Debug)]
pub struct TrainingSession {
    log_path: PathBuf,
    pub throws: Vec<ThrowRecord>,
    pub selected: Option<usize>,
    pub nudge_step_mm: f64,
    stats: DistributionStats,
}

impl TrainingSession {
    /// Opens a session over `log_path`, loading any existing log.
    /// An unreadable log starts the session fresh rather than failing.
    pub fn open<P: AsRef<Path>>(log_path: P) -> Self {
        let mut session = Self {
            log_path: log_path.as_ref().to_path_buf(),
            throws: Vec::new(),
            selected: None,
            nudge_step_mm: 0.2,
            stats: DistributionStats::default(),
        };
        if session.log_path.exists() {
            if let Err(err) = session.load_records() {
                warn!("could not read existing practice log, starting fresh: {}", err);
                session.throws.clear();
                session.selected = None;
            }
        }
        session.recompute();
        session
    }

    pub fn log_path(&self) -> &Path {
        &self.log_path
    }

    pub fn len(&self) -> usize {
        self.throws.len()
    }

    pub fn is_empty(&self) -> bool {
        self.throws.is_empty()
    }

    /// Current distribution over all logged impact points.
    pub fn stats(&self) -> DistributionStats {
        self.stats
    }

    /// Records a detected throw. The new record is selected so it can be
    /// nudged immediately.
    pub fn log_throw(&mut self, event: &ThrowEvent) -> Result<(), TrainingError> {
        let (x_mm, y_mm) = match (event.x, event.y) {
            (Some(x), Some(y)) => (x, y),
            _ => return Err(TrainingError::MissingCoords),
        };
        self.throws.push(ThrowRecord {
            timestamp: event.timestamp,
            code: event.code,
            x_mm,
            y_mm,
        });
        self.selected = Some(self.throws.len() - 1);
        self.after_change()
    }

    /// Removes the most recent throw.
    pub fn undo_last(&mut self) -> Result<(), TrainingError> {
        if self.throws.pop().is_none() {
            return Ok(());
        }
        self.selected = match self.throws.len() {
            0 => None,
            n => self.selected.map(|s| s.min(n - 1)),
        };
        self.after_change()
    }

    pub fn select(&mut self, index: usize) {
        if index < self.throws.len() {
            self.selected = Some(index);
        }
    }

    /// Moves the selected record by (dx, dy) millimetres.
    pub fn nudge(&mut self, dx_mm: f64, dy_mm: f64) -> Result<(), TrainingError> {
        let Some(idx) = self.selected else {
            return Ok(());
        };
        if let Some(record) = self.throws.get_mut(idx) {
            record.x_mm += dx_mm;
            record.y_mm += dy_mm;
        }
        self.after_change()
    }

    /// Switches the session to another log file and loads it.
    pub fn load_csv<P: AsRef<Path>>(&mut self, path: P) -> Result<usize, TrainingError> {
        self.log_path = path.as_ref().to_path_buf();
        self.throws.clear();
        self.selected = None;
        self.load_records()?;
        self.recompute();
        Ok(self.throws.len())
    }

    /// Hit counts per dart code, most frequent first.
    pub fn code_counts(&self) -> Vec<(DartCode, usize)> {
        self.throws
            .iter()
            .map(|r| r.code)
            .counts()
            .into_iter()
            .sorted_by(|a, b| b.1.cmp(&a.1))
            .collect()
    }

    fn after_change(&mut self) -> Result<(), TrainingError> {
        self.recompute();
        self.persist()
    }

    fn recompute(&mut self) {
        let points: Vec<(f64, f64)> = self.throws.iter().map(|r| (r.x_mm, r.y_mm)).collect();
        self.stats = DistributionStats::from_points(&points);
    }

    fn persist(&self) -> Result<(), TrainingError> {
        if self.throws.is_empty() {
            if self.log_path.exists() {
                let _ = std::fs::remove_file(&self.log_path);
            }
            return Ok(());
        }
        if let Some(parent) = self.log_path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).map_err(csv::Error::from)?;
            }
        }

        let mut writer = csv::Writer::from_path(&self.log_path)?;
        writer.write_record(CSV_HEADER)?;
        for record in &self.throws {
            writer.write_record([
                record.timestamp.format(TIMESTAMP_FORMAT).to_string(),
                record.code.to_string(),
                format!("{:.3}", record.x_mm),
                format!("{:.3}", record.y_mm),
                format!("dart:{} {:.3} {:.3}", record.code, record.x_mm, record.y_mm),
            ])?;
        }
        writer.flush().map_err(csv::Error::from)?;
        Ok(())
    }

    fn load_records(&mut self) -> Result<(), TrainingError> {
        let mut reader = csv::Reader::from_path(&self.log_path)?;
        let headers = reader.headers()?.clone();
        let coords = headers.iter().any(|h| h == "x_mm");
        let legacy = !coords && headers.iter().any(|h| h == "turn_state");

        for row in reader.records() {
            let row = row?;
            let record = if coords {
                Self::record_from_row(&row)
            } else if legacy {
                row.get(1)
                    .and_then(|state| Self::record_from_turn_state(state, row.get(0)))
            } else {
                None
            };
            match record {
                Some(record) => self.throws.push(record),
                None => warn!("skipping malformed practice log row"),
            }
        }
        if !self.throws.is_empty() {
            self.selected = Some(self.throws.len() - 1);
        }
        Ok(())
    }

    fn record_from_row(row: &csv::StringRecord) -> Option<ThrowRecord> {
        Some(ThrowRecord {
            timestamp: parse_timestamp(row.get(0)?),
            code: row.get(1)?.parse().ok()?,
            x_mm: row.get(2)?.parse().ok()?,
            y_mm: row.get(3)?.parse().ok()?,
        })
    }

    /// Legacy log rows encode the throw as `dart:CODE x y` in a single
    /// `turn_state` column.
    fn record_from_turn_state(state: &str, timestamp: Option<&str>) -> Option<ThrowRecord> {
        let payload = state.strip_prefix("dart:")?;
        let mut parts = payload.split_whitespace();
        let code = parts.next()?.parse().ok()?;
        let x_mm = parts.next()?.parse().ok()?;
        let y_mm = parts.next()?.parse().ok()?;
        Some(ThrowRecord {
            timestamp: timestamp.map(parse_timestamp).unwrap_or_else(Local::now),
            code,
            x_mm,
            y_mm,
        })
    }
}

fn parse_timestamp(s: &str) -> DateTime<Local> {
    NaiveDateTime::parse_from_str(s, TIMESTAMP_FORMAT)
        .ok()
        .and_then(|naive| naive.and_local_timezone(Local).earliest())
        .unwrap_or_else(Local::now)
}
