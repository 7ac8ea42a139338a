use crate::scoring::{CricketHit, CricketTarget};
use log::info;
use std::collections::HashMap;
use std::fmt;

/// Failure reported by the scoring surface. The game state machine is the
/// only interpreter of these; it treats them as "the remote game is likely
/// no longer active."
#[derive(Debug, Clone, PartialEq)]
pub enum ScoreboardError {
    Unavailable(String),
}

impl fmt::Display for ScoreboardError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ScoreboardError::Unavailable(msg) => write!(f, "scoring surface unavailable: {}", msg),
        }
    }
}

impl std::error::Error for ScoreboardError {}

/// The third-party scoring surface. Implementations drive whatever UI or
/// API sits behind it; callers rely only on these contracts.
pub trait Scoreboard {
    /// Enter the x01 points for a single dart and commit them.
    fn enter_x01_score(&mut self, score: u32) -> Result<(), ScoreboardError>;

    /// Press the Cricket segment button matching the hit.
    fn enter_cricket_hit(&mut self, hit: CricketHit) -> Result<(), ScoreboardError>;

    /// Submit the current turn.
    fn end_turn(&mut self) -> Result<(), ScoreboardError>;

    /// Handle any end-of-game prompt. `darts_this_turn` is needed because
    /// the surface may ask which dart (1-3) achieved the win. Returns
    /// whether the game is over; a failed call is a distinct outcome and
    /// must not be collapsed into `Ok(false)`.
    fn check_end_game(&mut self, darts_this_turn: u8) -> Result<bool, ScoreboardError>;
}

/// DartConnect element ids, kept as data so the UI specifics stay out of the
/// scoring logic and can be overridden when the site markup changes.
#[derive(Clone, Debug)]
pub struct ButtonMap {
    pub digits: HashMap<char, String>,
    pub cricket: HashMap<(CricketTarget, u8), String>,
    pub plus: String,
    pub end_turn: String,
    pub confirm_win: String,
    /// Template with `{n}` for the winning dart number, 1-3.
    pub winning_dart: String,
}

impl ButtonMap {
    pub fn digit(&self, d: char) -> Option<&str> {
        self.digits.get(&d).map(String::as_str)
    }

    pub fn cricket_button(&self, hit: CricketHit) -> Option<&str> {
        self.cricket
            .get(&(hit.target, hit.marks))
            .map(String::as_str)
    }

    pub fn winning_dart_button(&self, dart_number: u8) -> String {
        self.winning_dart.replace("{n}", &dart_number.to_string())
    }
}

impl Default for ButtonMap {
    fn default() -> Self {
        let digits = ('0'..='9')
            .map(|d| (d, format!("kp-p-0{}", d)))
            .collect::<HashMap<_, _>>();

        // Cricket board rows: b1=20 down to b6=15, b7=bull; column by marks.
        let mut cricket = HashMap::new();
        for (row, sector) in (1..=6).zip((15..=20).rev()) {
            for (marks, col) in [(1, 'S'), (2, 'D'), (3, 'T')] {
                cricket.insert(
                    (CricketTarget::Number(sector), marks),
                    format!("sb-c-b{}{}", row, col),
                );
            }
        }
        cricket.insert((CricketTarget::Bull, 1), "sb-c-b7S".to_string());
        cricket.insert((CricketTarget::Bull, 2), "sb-c-b7D".to_string());

        Self {
            digits,
            cricket,
            plus: "kp-p-plus".to_string(),
            end_turn: "mb-ig-funcr".to_string(),
            confirm_win: "confirm-ok".to_string(),
            winning_dart: "swdm-dart-{n}".to_string(),
        }
    }
}

/// Scoreboard that only logs the buttons it would press. Useful for running
/// the bridge against a board without touching a live game.
#[derive(Debug, Default)]
pub struct DryRunScoreboard {
    buttons: ButtonMap,
}

impl DryRunScoreboard {
    pub fn new(buttons: ButtonMap) -> Self {
        Self { buttons }
    }
}

impl Scoreboard for DryRunScoreboard {
    fn enter_x01_score(&mut self, score: u32) -> Result<(), ScoreboardError> {
        if score == 0 {
            return Ok(());
        }
        let presses: Vec<&str> = score
            .to_string()
            .chars()
            .filter_map(|d| self.buttons.digit(d))
            .chain(std::iter::once(self.buttons.plus.as_str()))
            .collect();
        info!("x01 score {}: would press {:?}", score, presses);
        Ok(())
    }

    fn enter_cricket_hit(&mut self, hit: CricketHit) -> Result<(), ScoreboardError> {
        match self.buttons.cricket_button(hit) {
            Some(id) => info!("cricket {} x{}: would press {:?}", hit.target, hit.marks, id),
            None => info!("cricket {} x{}: no button mapped", hit.target, hit.marks),
        }
        Ok(())
    }

    fn end_turn(&mut self) -> Result<(), ScoreboardError> {
        info!("end turn: would press {:?}", self.buttons.end_turn);
        Ok(())
    }

    fn check_end_game(&mut self, darts_this_turn: u8) -> Result<bool, ScoreboardError> {
        info!(
            "end-game check (darts this turn: {}): would look for {:?}",
            darts_this_turn, self.buttons.confirm_win
        );
        Ok(false)
    }
}

/// One action submitted to a scoreboard, for test assertions.
#[derive(Clone, Debug, PartialEq)]
pub enum ScoreAction {
    X01(u32),
    Cricket(CricketHit),
    EndTurn,
    CheckEndGame(u8),
}

/// Test scoreboard that records every action and plays back scripted
/// end-game responses.
#[derive(Debug, Default)]
pub struct RecordingScoreboard {
    pub actions: Vec<ScoreAction>,
    /// Drained front-to-back on each `check_end_game`; `Ok(false)` once empty.
    pub end_game_script: Vec<Result<bool, ScoreboardError>>,
    /// When set, every call fails.
    pub fail_all: bool,
}

impl RecordingScoreboard {
    fn gate(&self) -> Result<(), ScoreboardError> {
        if self.fail_all {
            Err(ScoreboardError::Unavailable("scripted failure".into()))
        } else {
            Ok(())
        }
    }
}

impl Scoreboard for RecordingScoreboard {
    fn enter_x01_score(&mut self, score: u32) -> Result<(), ScoreboardError> {
        self.gate()?;
        self.actions.push(ScoreAction::X01(score));
        Ok(())
    }

    fn enter_cricket_hit(&mut self, hit: CricketHit) -> Result<(), ScoreboardError> {
        self.gate()?;
        self.actions.push(ScoreAction::Cricket(hit));
        Ok(())
    }

    fn end_turn(&mut self) -> Result<(), ScoreboardError> {
        self.gate()?;
        self.actions.push(ScoreAction::EndTurn);
        Ok(())
    }

    fn check_end_game(&mut self, darts_this_turn: u8) -> Result<bool, ScoreboardError> {
        self.gate()?;
        self.actions.push(ScoreAction::CheckEndGame(darts_this_turn));
        if self.end_game_script.is_empty() {
            Ok(false)
        } else {
            self.end_game_script.remove(0)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dart::DartCode;
    use crate::scoring::cricket_target;

    #[test]
    fn test_default_button_map_digits() {
        let map = ButtonMap::default();
        assert_eq!(map.digit('0'), Some("kp-p-00"));
        assert_eq!(map.digit('7'), Some("kp-p-07"));
        assert_eq!(map.digit('x'), None);
        assert_eq!(map.plus, "kp-p-plus");
    }

    #[test]
    fn test_default_button_map_cricket() {
        let map = ButtonMap::default();
        let t20 = cricket_target(DartCode::Triple(20)).unwrap();
        assert_eq!(map.cricket_button(t20), Some("sb-c-b1T"));
        let s15 = cricket_target(DartCode::Single(15)).unwrap();
        assert_eq!(map.cricket_button(s15), Some("sb-c-b6S"));
        let bull = cricket_target(DartCode::Bull).unwrap();
        assert_eq!(map.cricket_button(bull), Some("sb-c-b7D"));
        let outer = cricket_target(DartCode::OuterBull).unwrap();
        assert_eq!(map.cricket_button(outer), Some("sb-c-b7S"));
    }

    #[test]
    fn test_winning_dart_button() {
        let map = ButtonMap::default();
        assert_eq!(map.winning_dart_button(2), "swdm-dart-2");
    }

    #[test]
    fn test_recording_scoreboard_scripted_end_game() {
        let mut board = RecordingScoreboard {
            end_game_script: vec![Ok(true)],
            ..Default::default()
        };
        assert_eq!(board.check_end_game(3), Ok(true));
        assert_eq!(board.check_end_game(3), Ok(false));
        assert_eq!(
            board.actions,
            vec![ScoreAction::CheckEndGame(3), ScoreAction::CheckEndGame(3)]
        );
    }

    #[test]
    fn test_recording_scoreboard_fail_all() {
        let mut board = RecordingScoreboard {
            fail_all: true,
            ..Default::default()
        };
        assert!(board.enter_x01_score(20).is_err());
        assert!(board.actions.is_empty());
    }
}
