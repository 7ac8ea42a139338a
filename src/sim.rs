use crate::dart::{BoardEvent, DartCode, ThrowEvent, TurnSignal};
use crate::runtime::BoardEventSource;
use log::info;
use rand::Rng;
use std::sync::mpsc::{self, Receiver, RecvTimeoutError};
use std::time::Duration;

/// Sector order around the board, clockwise from the top.
const SECTORS: [u8; 20] = [
    20, 1, 18, 4, 13, 6, 10, 15, 2, 17, 3, 19, 7, 16, 8, 11, 14, 9, 12, 5,
];

// Standard ring radii in millimetres.
const BULL_RADIUS: f64 = 6.35;
const OUTER_BULL_RADIUS: f64 = 15.9;
const TRIPLE_INNER: f64 = 99.0;
const TRIPLE_OUTER: f64 = 107.0;
const DOUBLE_INNER: f64 = 162.0;
const DOUBLE_OUTER: f64 = 170.0;

/// Which dart code an impact at (x, y) millimetres from board center
/// produces. The inverse of what the board's sensors report.
pub fn code_at(x_mm: f64, y_mm: f64) -> DartCode {
    let radius = x_mm.hypot(y_mm);
    if radius <= BULL_RADIUS {
        return DartCode::Bull;
    }
    if radius <= OUTER_BULL_RADIUS {
        return DartCode::OuterBull;
    }
    if radius > DOUBLE_OUTER {
        return DartCode::Miss;
    }

    // Angle clockwise from straight up; each sector spans 18 degrees,
    // centered on its spoke.
    let angle = x_mm.atan2(y_mm).to_degrees().rem_euclid(360.0);
    let index = ((angle + 9.0) / 18.0) as usize % SECTORS.len();
    let sector = SECTORS[index];

    if (TRIPLE_INNER..=TRIPLE_OUTER).contains(&radius) {
        DartCode::Triple(sector)
    } else if (DOUBLE_INNER..=DOUBLE_OUTER).contains(&radius) {
        DartCode::Double(sector)
    } else {
        DartCode::Single(sector)
    }
}

#[derive(Clone, Copy, Debug)]
pub struct SimConfig {
    /// Aim point in millimetres; the default aims at the triple 20 bed.
    pub aim_mm: (f64, f64),
    /// Standard deviation of the throw scatter.
    pub spread_mm: f64,
    /// Number of turns to play; `None` keeps throwing until dropped.
    pub turns: Option<usize>,
    pub throw_delay: Duration,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            aim_mm: (0.0, 103.0),
            spread_mm: 20.0,
            turns: None,
            throw_delay: Duration::from_millis(500),
        }
    }
}

/// Offline stand-in for a physical board: throws three jittered darts per
/// turn and emits the takeout signals a real board would.
pub struct SimulatedBoard {
    rx: Receiver<BoardEvent>,
}

impl SimulatedBoard {
    pub fn start(config: SimConfig) -> Self {
        let (tx, rx) = mpsc::channel();

        std::thread::spawn(move || {
            let mut rng = rand::thread_rng();
            if tx.send(BoardEvent::Connected).is_err() {
                return;
            }
            let mut turn = 0usize;
            loop {
                if let Some(limit) = config.turns {
                    if turn >= limit {
                        let _ = tx.send(BoardEvent::Disconnected);
                        return;
                    }
                }
                turn += 1;

                for dart in 0..3 {
                    std::thread::sleep(config.throw_delay);
                    let x = config.aim_mm.0 + gaussian(&mut rng, config.spread_mm);
                    let y = config.aim_mm.1 + gaussian(&mut rng, config.spread_mm);
                    let event = BoardEvent::Throw(
                        ThrowEvent::new(code_at(x, y), Some(x), Some(y)).with_index(dart),
                    );
                    if tx.send(event).is_err() {
                        return;
                    }
                }

                std::thread::sleep(config.throw_delay);
                if tx.send(BoardEvent::Signal(TurnSignal::TurnEnding)).is_err() {
                    return;
                }
                std::thread::sleep(config.throw_delay);
                if tx
                    .send(BoardEvent::Signal(TurnSignal::TurnComplete))
                    .is_err()
                {
                    return;
                }
            }
        });

        Self { rx }
    }
}

impl BoardEventSource for SimulatedBoard {
    fn recv_timeout(&self, timeout: Duration) -> Result<BoardEvent, RecvTimeoutError> {
        self.rx.recv_timeout(timeout)
    }

    fn request_reset(&self) {
        info!("simulated board reset requested");
    }
}

/// Approximate a normal sample by the Irwin-Hall construction; good enough
/// for throw scatter.
fn gaussian<R: Rng>(rng: &mut R, sigma: f64) -> f64 {
    let sum: f64 = (0..12).map(|_| rng.gen_range(0.0..1.0)).sum();
    (sum - 6.0) * sigma
}
