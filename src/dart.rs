use chrono::{DateTime, Local};
use serde::Deserialize;
use std::fmt;
use std::str::FromStr;

/// Canonical dart code as produced by normalization: `S20`, `D18`, `T17`,
/// the outer bull (`25`), the inner bull (`Bull`), or `Miss`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum DartCode {
    Single(u8),
    Double(u8),
    Triple(u8),
    OuterBull,
    Bull,
    Miss,
}

impl DartCode {
    /// x01 point value of a single dart.
    pub fn value(&self) -> u32 {
        match *self {
            DartCode::Single(n) => n as u32,
            DartCode::Double(n) => 2 * n as u32,
            DartCode::Triple(n) => 3 * n as u32,
            DartCode::OuterBull => 25,
            DartCode::Bull => 50,
            DartCode::Miss => 0,
        }
    }

    pub fn is_double(&self) -> bool {
        matches!(self, DartCode::Double(_))
    }
}

impl fmt::Display for DartCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            DartCode::Single(n) => write!(f, "S{}", n),
            DartCode::Double(n) => write!(f, "D{}", n),
            DartCode::Triple(n) => write!(f, "T{}", n),
            DartCode::OuterBull => write!(f, "25"),
            DartCode::Bull => write!(f, "Bull"),
            DartCode::Miss => write!(f, "Miss"),
        }
    }
}

impl FromStr for DartCode {
    type Err = ();

    /// Parses the textual code format used in practice logs. Anything that
    /// does not name a board segment comes back as `Miss`; only an empty
    /// string is rejected.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.is_empty() {
            return Err(());
        }
        if !s.is_ascii() {
            return Ok(DartCode::Miss);
        }
        match s {
            "25" => return Ok(DartCode::OuterBull),
            "Bull" => return Ok(DartCode::Bull),
            _ => {}
        }
        let sector = s[1..].parse::<u8>().ok().filter(|n| (1..=20).contains(n));
        match (s.as_bytes()[0], sector) {
            (b'S', Some(n)) => Ok(DartCode::Single(n)),
            (b'D', Some(n)) => Ok(DartCode::Double(n)),
            (b'T', Some(n)) => Ok(DartCode::Triple(n)),
            _ => Ok(DartCode::Miss),
        }
    }
}

/// Raw segment description as the board manager reports it.
#[derive(Clone, Debug, Default, Deserialize)]
pub struct RawSegment {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub number: Option<u8>,
    #[serde(default)]
    pub bed: Option<String>,
}

/// Converts a raw segment into a canonical dart code. Unknown or partial
/// input maps to `Miss` rather than erroring so a flaky sensor cannot stall
/// the event stream.
pub fn normalize(segment: &RawSegment) -> DartCode {
    match segment.name.as_deref() {
        Some("25") => return DartCode::OuterBull,
        Some("Bull") => return DartCode::Bull,
        _ => {}
    }

    let number = match segment.number {
        Some(n) if (1..=20).contains(&n) => n,
        _ => return DartCode::Miss,
    };
    let bed = segment.bed.as_deref().unwrap_or("").to_lowercase();

    if bed.contains("triple") {
        DartCode::Triple(number)
    } else if bed.contains("double") {
        DartCode::Double(number)
    } else if bed.contains("single") {
        DartCode::Single(number)
    } else {
        DartCode::Miss
    }
}

/// One detected dart impact. Coordinates are millimetres from board center
/// when the board reports them; `dart_index` is the position in the board's
/// per-turn throw list when the feed carries one.
#[derive(Clone, Debug, PartialEq)]
pub struct ThrowEvent {
    pub code: DartCode,
    pub x: Option<f64>,
    pub y: Option<f64>,
    pub dart_index: Option<usize>,
    pub timestamp: DateTime<Local>,
}

impl ThrowEvent {
    pub fn new(code: DartCode, x: Option<f64>, y: Option<f64>) -> Self {
        Self {
            code,
            x,
            y,
            dart_index: None,
            timestamp: Local::now(),
        }
    }

    pub fn with_index(mut self, index: usize) -> Self {
        self.dart_index = Some(index);
        self
    }
}

/// Turn-lifecycle markers emitted by the board controller, independent of
/// dart identity.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TurnSignal {
    /// Takeout in progress.
    TurnEnding,
    /// Takeout finished; the turn should be submitted.
    TurnComplete,
    /// Takeout aborted or retracted.
    TurnIncomplete,
}

/// Unified event type consumed by the game runner.
#[derive(Clone, Debug, PartialEq)]
pub enum BoardEvent {
    Throw(ThrowEvent),
    Signal(TurnSignal),
    Connected,
    Disconnected,
    Tick,
}
