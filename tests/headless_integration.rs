use std::sync::mpsc;
use std::time::Duration;

use dartbridge::dart::{BoardEvent, DartCode, ThrowEvent, TurnSignal};
use dartbridge::game::{Game, GameRequest, GameType};
use dartbridge::runtime::{FixedTicker, Runner, TestEventSource};
use dartbridge::scoreboard::{RecordingScoreboard, ScoreAction};

// Headless integration using the internal runtime + Game without a board.
// Verifies that a full turn flows through Runner/TestEventSource.
#[test]
fn headless_turn_flow_completes() {
    let mut game = Game::new(GameType::FiveOhOne, RecordingScoreboard::default());

    let (tx, rx) = mpsc::channel();
    let es = TestEventSource::new(rx);
    let ticker = FixedTicker::new(Duration::from_millis(5));
    let runner = Runner::new(es, ticker);

    // Producer: one full turn as a board would emit it
    for code in [DartCode::Triple(20), DartCode::Single(20), DartCode::Single(5)] {
        tx.send(BoardEvent::Throw(ThrowEvent::new(code, None, None)))
            .unwrap();
    }
    tx.send(BoardEvent::Signal(TurnSignal::TurnEnding)).unwrap();
    tx.send(BoardEvent::Signal(TurnSignal::TurnComplete)).unwrap();

    // Act: drive the event loop until the turn is submitted (or bounded steps)
    for _ in 0..100u32 {
        let event = runner.step();
        if let Some(GameRequest::ResetDevice) = game.on_event(event) {
            runner.request_reset();
        }
        if game
            .scoreboard
            .actions
            .contains(&ScoreAction::CheckEndGame(3))
        {
            break;
        }
    }

    assert_eq!(
        game.scoreboard.actions,
        vec![
            ScoreAction::X01(60),
            ScoreAction::X01(20),
            ScoreAction::X01(5),
            ScoreAction::EndTurn,
            ScoreAction::CheckEndGame(3),
        ]
    );
    assert_eq!(game.session.darts_this_turn, 0);
    assert!(!game.is_over());
}

// Ticks from an otherwise silent channel must drive the takeout watchdog.
#[test]
fn headless_watchdog_recovers_stuck_takeout() {
    let mut game = Game::new(GameType::FiveOhOne, RecordingScoreboard::default())
        .with_turn_timeout(Duration::from_millis(20));

    let (tx, rx) = mpsc::channel();
    let runner = Runner::new(
        TestEventSource::new(rx),
        FixedTicker::new(Duration::from_millis(5)),
    );

    tx.send(BoardEvent::Throw(ThrowEvent::new(
        DartCode::Single(20),
        None,
        None,
    )))
    .unwrap();
    tx.send(BoardEvent::Signal(TurnSignal::TurnEnding)).unwrap();
    // No TurnComplete ever arrives; only ticks follow.

    let mut resets = 0;
    for _ in 0..50u32 {
        let event = runner.step();
        if let Some(GameRequest::ResetDevice) = game.on_event(event) {
            resets += 1;
        }
    }

    assert_eq!(resets, 1, "watchdog must fire exactly once");
    assert_eq!(
        game.scoreboard.actions,
        vec![ScoreAction::X01(20), ScoreAction::EndTurn]
    );
    assert!(!game.is_over());
}
