use crate::dart::{BoardEvent, ThrowEvent, TurnSignal};
use crate::scoreboard::Scoreboard;
use crate::scoring::{cricket_target, opens_double_in, score_x01};
use log::{debug, info, warn};
use std::time::{Duration, Instant};

pub const DEFAULT_TURN_TIMEOUT: Duration = Duration::from_secs(3);

#[derive(
    Debug, Copy, Clone, PartialEq, Eq, strum_macros::Display, serde::Serialize, serde::Deserialize,
)]
pub enum GameType {
    #[strum(serialize = "501")]
    #[serde(rename = "501")]
    FiveOhOne,
    #[strum(serialize = "301")]
    #[serde(rename = "301")]
    ThreeOhOne,
    #[strum(serialize = "Cricket")]
    Cricket,
    #[strum(serialize = "Training")]
    Training,
}

/// Where the machine is within the current turn.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum TurnPhase {
    Idle,
    TurnActive,
    /// Takeout detected; `since` anchors the watchdog timeout.
    TurnEnding { since: Instant },
    GameOver,
}

impl TurnPhase {
    pub fn is_ending(&self) -> bool {
        matches!(self, TurnPhase::TurnEnding { .. })
    }
}

/// Mutable per-game state. `doubled_in` is sticky for the whole session;
/// `darts_this_turn` resets to 0 exactly when a new turn begins.
#[derive(Debug)]
pub struct GameSession {
    pub game_type: GameType,
    pub phase: TurnPhase,
    pub darts_this_turn: u8,
    pub doubled_in: bool,
    pub active: bool,
    pub last_signal: Option<TurnSignal>,
    /// Last throw seen this turn, for duplicate-event suppression.
    last_throw: Option<ThrowEvent>,
}

impl GameSession {
    pub fn new(game_type: GameType) -> Self {
        Self {
            game_type,
            phase: TurnPhase::Idle,
            darts_this_turn: 0,
            doubled_in: false,
            active: true,
            last_signal: None,
            last_throw: None,
        }
    }
}

/// Requests the state machine cannot carry out itself; the caller routes
/// them to the practice logger or the event source.
#[derive(Clone, Debug, PartialEq)]
pub enum GameRequest {
    /// Training mode: record this throw in the practice log.
    LogThrow(ThrowEvent),
    /// Watchdog fired: reset the device session.
    ResetDevice,
}

/// The turn/game reconciliation engine. Consumes one board event at a time,
/// applies the scoring rules for the active game type, and drives the
/// scoring surface. Adapter failures never propagate; they are logged and
/// interpreted as the game having ended.
#[derive(Debug)]
pub struct Game<S: Scoreboard> {
    pub session: GameSession,
    pub scoreboard: S,
    pub turn_timeout: Duration,
}

impl<S: Scoreboard> Game<S> {
    pub fn new(game_type: GameType, scoreboard: S) -> Self {
        Self {
            session: GameSession::new(game_type),
            scoreboard,
            turn_timeout: DEFAULT_TURN_TIMEOUT,
        }
    }

    pub fn with_turn_timeout(mut self, timeout: Duration) -> Self {
        self.turn_timeout = timeout;
        self
    }

    pub fn is_over(&self) -> bool {
        self.session.phase == TurnPhase::GameOver || !self.session.active
    }

    /// Feed the next event through the machine. Must be called from a single
    /// thread, in arrival order.
    pub fn on_event(&mut self, event: BoardEvent) -> Option<GameRequest> {
        match event {
            BoardEvent::Throw(throw) => self.on_throw(throw),
            BoardEvent::Signal(signal) => self.on_signal(signal),
            BoardEvent::Tick => self.on_tick_at(Instant::now()),
            BoardEvent::Connected => {
                info!("board event feed connected");
                None
            }
            BoardEvent::Disconnected => {
                warn!("board event feed disconnected, feed will retry");
                None
            }
        }
    }

    fn on_throw(&mut self, throw: ThrowEvent) -> Option<GameRequest> {
        if self.is_over() {
            debug!("ignoring throw {} outside an active game", throw.code);
            return None;
        }
        // The feed occasionally redelivers the current detection.
        if self
            .session
            .last_throw
            .as_ref()
            .is_some_and(|prev| same_detection(prev, &throw))
        {
            debug!("suppressing duplicate throw event {}", throw.code);
            return None;
        }

        match self.session.phase {
            TurnPhase::Idle => {
                self.session.phase = TurnPhase::TurnActive;
            }
            TurnPhase::TurnEnding { .. } => {
                // A dart landing during takeout means the takeout was not
                // real; resume the turn.
                debug!("throw during takeout, resuming turn");
                self.session.phase = TurnPhase::TurnActive;
            }
            TurnPhase::TurnActive => {}
            TurnPhase::GameOver => return None,
        }

        if self.session.darts_this_turn < 3 {
            self.session.darts_this_turn += 1;
        }
        let code = throw.code;
        self.session.last_throw = Some(throw.clone());

        match self.session.game_type {
            GameType::Training => return Some(GameRequest::LogThrow(throw)),
            GameType::FiveOhOne => {
                let score = score_x01(&[code]);
                info!("dart {}: {} points", code, score);
                if let Err(err) = self.scoreboard.enter_x01_score(score) {
                    self.fail_game(&err.to_string());
                }
            }
            GameType::ThreeOhOne => {
                if !self.session.doubled_in && opens_double_in(code) {
                    info!("double-in gate opened by {}", code);
                    self.session.doubled_in = true;
                }
                if self.session.doubled_in {
                    let score = score_x01(&[code]);
                    info!("dart {}: {} points", code, score);
                    if let Err(err) = self.scoreboard.enter_x01_score(score) {
                        self.fail_game(&err.to_string());
                    }
                } else {
                    info!("dart {} not scored, double-in gate closed", code);
                }
            }
            GameType::Cricket => {
                if let Some(hit) = cricket_target(code) {
                    info!("dart {}: cricket {} x{}", code, hit.target, hit.marks);
                    if let Err(err) = self.scoreboard.enter_cricket_hit(hit) {
                        self.fail_game(&err.to_string());
                    }
                } else {
                    info!("dart {} scores nothing in cricket", code);
                }
            }
        }
        None
    }

    fn on_signal(&mut self, signal: TurnSignal) -> Option<GameRequest> {
        if self.is_over() {
            return None;
        }
        self.session.last_signal = Some(signal);

        match signal {
            TurnSignal::TurnEnding => {
                if self.session.phase == TurnPhase::TurnActive {
                    debug!("takeout in progress, arming watchdog");
                    self.session.phase = TurnPhase::TurnEnding {
                        since: Instant::now(),
                    };
                }
            }
            TurnSignal::TurnIncomplete => {
                if self.session.phase.is_ending() {
                    debug!("takeout retracted, turn continues");
                    self.session.phase = TurnPhase::TurnActive;
                }
            }
            TurnSignal::TurnComplete => {
                if self.session.phase.is_ending() || self.session.phase == TurnPhase::TurnActive {
                    self.complete_turn();
                }
            }
        }
        None
    }

    /// Watchdog poll. Public so callers with their own clock (and tests)
    /// can drive it; `on_event(Tick)` uses the real one.
    pub fn on_tick_at(&mut self, now: Instant) -> Option<GameRequest> {
        if let TurnPhase::TurnEnding { since } = self.session.phase {
            if now.duration_since(since) > self.turn_timeout {
                warn!(
                    "takeout stuck for more than {:?}, forcing turn submission and device reset",
                    self.turn_timeout
                );
                self.begin_new_turn();
                if let Err(err) = self.scoreboard.end_turn() {
                    warn!("best-effort turn submission failed: {}", err);
                }
                return Some(GameRequest::ResetDevice);
            }
        }
        None
    }

    fn complete_turn(&mut self) {
        let darts = self.session.darts_this_turn;
        if self.session.game_type == GameType::Training {
            debug!("training turn of {} darts complete", darts);
            self.begin_new_turn();
            return;
        }

        if let Err(err) = self.scoreboard.end_turn() {
            self.fail_game(&err.to_string());
            return;
        }
        match self.scoreboard.check_end_game(darts) {
            Ok(true) => {
                info!("game over confirmed by scoring surface");
                self.session.phase = TurnPhase::GameOver;
            }
            Ok(false) => {
                self.begin_new_turn();
            }
            Err(err) => {
                // Failure here is the expected signature of the remote UI
                // leaving its active-game state.
                self.fail_game(&err.to_string());
            }
        }
    }

    fn begin_new_turn(&mut self) {
        self.session.phase = TurnPhase::Idle;
        self.session.darts_this_turn = 0;
        self.session.last_throw = None;
    }

    fn fail_game(&mut self, reason: &str) {
        warn!("scoring surface failure, assuming game ended: {}", reason);
        self.session.phase = TurnPhase::GameOver;
    }

    /// Unconditionally stops the session. Safe from any state.
    pub fn stop(&mut self) {
        self.session.active = false;
        self.begin_new_turn();
    }
}

/// Whether `next` is a redelivery of `prev` rather than a new dart. The
/// board's throw-list index is authoritative when both events carry one.
/// Otherwise exact coordinates are the only usable identity; a
/// coordinate-less event can never be called a redelivery, since a second
/// dart into the same segment would look identical. Arrival timestamps are
/// ignored, frames are re-stamped on receipt.
fn same_detection(prev: &ThrowEvent, next: &ThrowEvent) -> bool {
    if prev.code != next.code {
        return false;
    }
    match (prev.dart_index, next.dart_index) {
        (Some(a), Some(b)) => a == b,
        _ => prev.x.is_some() && prev.y.is_some() && prev.x == next.x && prev.y == next.y,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dart::DartCode;
    use crate::scoreboard::{RecordingScoreboard, ScoreAction, ScoreboardError};
    use assert_matches::assert_matches;

    fn throw(code: DartCode) -> BoardEvent {
        BoardEvent::Throw(ThrowEvent::new(code, Some(1.0), Some(2.0)))
    }

    fn game(game_type: GameType) -> Game<RecordingScoreboard> {
        Game::new(game_type, RecordingScoreboard::default())
    }

    #[test]
    fn test_first_throw_activates_turn() {
        let mut g = game(GameType::FiveOhOne);
        assert_eq!(g.session.phase, TurnPhase::Idle);

        g.on_event(throw(DartCode::Triple(20)));
        assert_eq!(g.session.phase, TurnPhase::TurnActive);
        assert_eq!(g.session.darts_this_turn, 1);
        assert_eq!(g.scoreboard.actions, vec![ScoreAction::X01(60)]);
    }

    #[test]
    fn test_darts_capped_at_three() {
        let mut g = game(GameType::FiveOhOne);
        for n in [1u8, 2, 5, 9] {
            g.on_event(throw(DartCode::Single(n)));
        }
        assert_eq!(g.session.darts_this_turn, 3);
    }

    #[test]
    fn test_duplicate_event_not_rescored() {
        let mut g = game(GameType::FiveOhOne);
        let ev = ThrowEvent::new(DartCode::Single(20), Some(3.0), None);

        g.on_event(BoardEvent::Throw(ev.clone()));
        g.on_event(BoardEvent::Throw(ev));
        assert_eq!(g.scoreboard.actions, vec![ScoreAction::X01(20)]);
        assert_eq!(g.session.darts_this_turn, 1);
    }

    #[test]
    fn test_duplicate_detection_ignores_timestamp() {
        let mut g = game(GameType::FiveOhOne);
        // Redelivered frames get re-stamped on arrival; same code and
        // coordinates still count as one dart.
        g.on_event(BoardEvent::Throw(ThrowEvent::new(
            DartCode::Single(20),
            Some(3.0),
            Some(4.0),
        )));
        g.on_event(BoardEvent::Throw(ThrowEvent::new(
            DartCode::Single(20),
            Some(3.0),
            Some(4.0),
        )));
        assert_eq!(g.scoreboard.actions, vec![ScoreAction::X01(20)]);

        // A different landing point is a genuinely new dart
        g.on_event(BoardEvent::Throw(ThrowEvent::new(
            DartCode::Single(20),
            Some(3.5),
            Some(4.0),
        )));
        assert_eq!(g.session.darts_this_turn, 2);
    }

    #[test]
    fn test_coordinate_less_darts_both_score() {
        let mut g = game(GameType::FiveOhOne);
        // Without coordinates or an index there is nothing to tell a second
        // dart in the same segment apart from a redelivery; score both.
        g.on_event(BoardEvent::Throw(ThrowEvent::new(DartCode::Single(20), None, None)));
        g.on_event(BoardEvent::Throw(ThrowEvent::new(DartCode::Single(20), None, None)));

        assert_eq!(
            g.scoreboard.actions,
            vec![ScoreAction::X01(20), ScoreAction::X01(20)]
        );
        assert_eq!(g.session.darts_this_turn, 2);
    }

    #[test]
    fn test_board_index_disambiguates_same_segment() {
        let mut g = game(GameType::FiveOhOne);
        let dart = |idx: usize| {
            BoardEvent::Throw(ThrowEvent::new(DartCode::Single(20), None, None).with_index(idx))
        };

        // Redelivery of the same list position is one dart
        g.on_event(dart(0));
        g.on_event(dart(0));
        assert_eq!(g.session.darts_this_turn, 1);

        // The next list position is a new dart, same segment or not
        g.on_event(dart(1));
        assert_eq!(g.session.darts_this_turn, 2);
        assert_eq!(
            g.scoreboard.actions,
            vec![ScoreAction::X01(20), ScoreAction::X01(20)]
        );
    }

    #[test]
    fn test_301_double_in_scenario() {
        let mut g = game(GameType::ThreeOhOne);

        g.on_event(throw(DartCode::Single(5)));
        assert!(g.scoreboard.actions.is_empty());
        assert!(!g.session.doubled_in);

        g.on_event(throw(DartCode::Double(10)));
        assert!(g.session.doubled_in);
        assert_eq!(g.scoreboard.actions, vec![ScoreAction::X01(20)]);

        g.on_event(throw(DartCode::Single(5)));
        assert_eq!(
            g.scoreboard.actions,
            vec![ScoreAction::X01(20), ScoreAction::X01(5)]
        );
    }

    #[test]
    fn test_301_gate_stays_open_across_turns() {
        let mut g = game(GameType::ThreeOhOne);
        g.on_event(throw(DartCode::Bull));
        assert!(g.session.doubled_in);

        g.on_event(BoardEvent::Signal(TurnSignal::TurnEnding));
        g.on_event(BoardEvent::Signal(TurnSignal::TurnComplete));
        assert!(g.session.doubled_in);
        assert_eq!(g.session.darts_this_turn, 0);
    }

    #[test]
    fn test_cricket_routing() {
        let mut g = game(GameType::Cricket);
        g.on_event(throw(DartCode::Triple(20)));
        g.on_event(throw(DartCode::Single(5)));

        assert_eq!(g.scoreboard.actions.len(), 1);
        assert_matches!(g.scoreboard.actions[0], ScoreAction::Cricket(hit) => {
            assert_eq!(hit.marks, 3);
        });
    }

    #[test]
    fn test_turn_complete_submits_and_resets() {
        let mut g = game(GameType::FiveOhOne);
        g.on_event(throw(DartCode::Single(20)));
        g.on_event(throw(DartCode::Single(19)));
        g.on_event(BoardEvent::Signal(TurnSignal::TurnEnding));
        assert!(g.session.phase.is_ending());

        g.on_event(BoardEvent::Signal(TurnSignal::TurnComplete));
        assert_eq!(g.session.phase, TurnPhase::Idle);
        assert_eq!(g.session.darts_this_turn, 0);
        assert_eq!(
            g.scoreboard.actions[2..],
            [ScoreAction::EndTurn, ScoreAction::CheckEndGame(2)]
        );
    }

    #[test]
    fn test_turn_incomplete_keeps_dart_count() {
        let mut g = game(GameType::FiveOhOne);
        g.on_event(throw(DartCode::Single(20)));
        g.on_event(throw(DartCode::Single(1)));
        g.on_event(BoardEvent::Signal(TurnSignal::TurnEnding));
        g.on_event(BoardEvent::Signal(TurnSignal::TurnIncomplete));

        assert_eq!(g.session.phase, TurnPhase::TurnActive);
        assert_eq!(g.session.darts_this_turn, 2);
    }

    #[test]
    fn test_throw_during_takeout_resumes_turn() {
        let mut g = game(GameType::FiveOhOne);
        g.on_event(throw(DartCode::Single(20)));
        g.on_event(BoardEvent::Signal(TurnSignal::TurnEnding));
        g.on_event(throw(DartCode::Single(19)));

        assert_eq!(g.session.phase, TurnPhase::TurnActive);
        assert_eq!(g.session.darts_this_turn, 2);
    }

    #[test]
    fn test_watchdog_fires_exactly_once() {
        let mut g = game(GameType::FiveOhOne);
        g.on_event(throw(DartCode::Single(20)));
        g.on_event(BoardEvent::Signal(TurnSignal::TurnEnding));

        let later = Instant::now() + Duration::from_secs(4);
        assert_eq!(g.on_tick_at(later), Some(GameRequest::ResetDevice));
        assert_eq!(g.session.phase, TurnPhase::Idle);
        assert_eq!(g.session.darts_this_turn, 0);
        // Recovery submitted the turn once
        assert_eq!(g.scoreboard.actions[1..], [ScoreAction::EndTurn]);

        // Second poll does nothing
        assert_eq!(g.on_tick_at(later + Duration::from_secs(1)), None);
        assert_eq!(g.scoreboard.actions.len(), 2);
    }

    #[test]
    fn test_watchdog_quiet_within_timeout() {
        let mut g = game(GameType::FiveOhOne);
        g.on_event(throw(DartCode::Single(20)));
        g.on_event(BoardEvent::Signal(TurnSignal::TurnEnding));

        let soon = Instant::now() + Duration::from_secs(1);
        assert_eq!(g.on_tick_at(soon), None);
        assert!(g.session.phase.is_ending());
    }

    #[test]
    fn test_end_game_confirmed() {
        let mut g = Game::new(
            GameType::FiveOhOne,
            RecordingScoreboard {
                end_game_script: vec![Ok(true)],
                ..Default::default()
            },
        );
        g.on_event(throw(DartCode::Double(20)));
        g.on_event(BoardEvent::Signal(TurnSignal::TurnEnding));
        g.on_event(BoardEvent::Signal(TurnSignal::TurnComplete));

        assert_eq!(g.session.phase, TurnPhase::GameOver);
        assert!(g.is_over());
        // Dart count at the win is passed through for the winning-dart prompt
        assert!(g
            .scoreboard
            .actions
            .contains(&ScoreAction::CheckEndGame(1)));
    }

    #[test]
    fn test_end_game_check_failure_assumes_game_over() {
        let mut g = Game::new(
            GameType::FiveOhOne,
            RecordingScoreboard {
                end_game_script: vec![Err(ScoreboardError::Unavailable("gone".into()))],
                ..Default::default()
            },
        );
        g.on_event(throw(DartCode::Single(20)));
        g.on_event(BoardEvent::Signal(TurnSignal::TurnComplete));

        assert_eq!(g.session.phase, TurnPhase::GameOver);
    }

    #[test]
    fn test_scoring_failure_assumes_game_over() {
        let mut g = Game::new(
            GameType::FiveOhOne,
            RecordingScoreboard {
                fail_all: true,
                ..Default::default()
            },
        );
        g.on_event(throw(DartCode::Single(20)));
        assert_eq!(g.session.phase, TurnPhase::GameOver);

        // Later events are ignored without panicking
        assert_eq!(g.on_event(throw(DartCode::Single(19))), None);
    }

    #[test]
    fn test_training_routes_to_log_and_resets_locally() {
        let mut g = game(GameType::Training);
        let req = g.on_event(throw(DartCode::Triple(19)));
        assert_matches!(req, Some(GameRequest::LogThrow(ev)) => {
            assert_eq!(ev.code, DartCode::Triple(19));
        });
        assert!(g.scoreboard.actions.is_empty());

        g.on_event(BoardEvent::Signal(TurnSignal::TurnEnding));
        g.on_event(BoardEvent::Signal(TurnSignal::TurnComplete));
        assert_eq!(g.session.phase, TurnPhase::Idle);
        assert!(g.scoreboard.actions.is_empty());
    }

    #[test]
    fn test_stop_is_safe_from_any_state() {
        let mut g = game(GameType::FiveOhOne);
        g.on_event(throw(DartCode::Single(20)));
        g.on_event(BoardEvent::Signal(TurnSignal::TurnEnding));
        g.stop();

        assert!(!g.session.active);
        assert_eq!(g.session.phase, TurnPhase::Idle);
        assert_eq!(g.session.darts_this_turn, 0);
        assert_eq!(g.on_event(throw(DartCode::Single(20))), None);
    }

    #[test]
    fn test_dedup_clears_at_turn_boundary() {
        let mut g = game(GameType::FiveOhOne);
        let ev = ThrowEvent::new(DartCode::Single(20), None, None);
        g.on_event(BoardEvent::Throw(ev.clone()));
        g.on_event(BoardEvent::Signal(TurnSignal::TurnEnding));
        g.on_event(BoardEvent::Signal(TurnSignal::TurnComplete));

        // Same payload next turn is a genuinely new dart
        g.on_event(BoardEvent::Throw(ev));
        assert_eq!(
            g.scoreboard
                .actions
                .iter()
                .filter(|a| matches!(a, ScoreAction::X01(20)))
                .count(),
            2
        );
    }
}
