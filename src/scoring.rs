use crate::dart::DartCode;
use std::fmt;

/// One of the seven segments that score in Cricket.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum CricketTarget {
    Number(u8),
    Bull,
}

impl fmt::Display for CricketTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            CricketTarget::Number(n) => write!(f, "{}", n),
            CricketTarget::Bull => write!(f, "bull"),
        }
    }
}

/// A Cricket-scoring dart: which bucket it landed in and how many marks it
/// is worth (single=1, double=2, triple=3; outer bull=1, inner bull=2).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CricketHit {
    pub target: CricketTarget,
    pub marks: u8,
}

/// Sums a turn of up to three darts under x01 rules. Order-independent.
pub fn score_x01(codes: &[DartCode]) -> u32 {
    codes.iter().map(DartCode::value).sum()
}

/// Maps a dart to its Cricket bucket, or `None` for darts that never score
/// in Cricket (sectors 1-14 and misses).
pub fn cricket_target(code: DartCode) -> Option<CricketHit> {
    match code {
        DartCode::Single(n) if (15..=20).contains(&n) => Some(CricketHit {
            target: CricketTarget::Number(n),
            marks: 1,
        }),
        DartCode::Double(n) if (15..=20).contains(&n) => Some(CricketHit {
            target: CricketTarget::Number(n),
            marks: 2,
        }),
        DartCode::Triple(n) if (15..=20).contains(&n) => Some(CricketHit {
            target: CricketTarget::Number(n),
            marks: 3,
        }),
        DartCode::OuterBull => Some(CricketHit {
            target: CricketTarget::Bull,
            marks: 1,
        }),
        DartCode::Bull => Some(CricketHit {
            target: CricketTarget::Bull,
            marks: 2,
        }),
        _ => None,
    }
}

/// Whether this dart opens the 301 double-in gate. The gate is sticky: the
/// session keeps it open once any dart satisfies it.
pub fn opens_double_in(code: DartCode) -> bool {
    code.is_double() || code == DartCode::Bull
}
