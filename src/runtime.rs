use std::sync::mpsc::{Receiver, RecvTimeoutError};
use std::time::Duration;

use crate::dart::BoardEvent;

/// Source of board events (throws, takeout signals, connection state).
///
/// All state-machine mutation happens on the thread draining this source,
/// one event at a time; implementations may produce events from their own
/// threads but must never invoke the consumer re-entrantly.
pub trait BoardEventSource: Send + 'static {
    /// Block for up to `timeout` waiting for an event.
    /// Returns Ok(event) if an event arrives before the timeout, or Err(Timeout) if it expires.
    fn recv_timeout(&self, timeout: Duration) -> Result<BoardEvent, RecvTimeoutError>;

    /// Best-effort request to reset/reconnect the underlying device session,
    /// used when the board sticks in a takeout state.
    fn request_reset(&self) {}
}

/// Supplies the poll interval that paces the event loop.
pub trait Ticker: Send + Sync + 'static {
    fn interval(&self) -> Duration;
}

/// Ticker with a constant interval.
#[derive(Clone, Copy, Debug)]
pub struct FixedTicker {
    interval: Duration,
}

impl FixedTicker {
    pub fn new(interval: Duration) -> Self {
        Self { interval }
    }
}

impl Ticker for FixedTicker {
    fn interval(&self) -> Duration {
        self.interval
    }
}

/// Channel-backed source, lets tests script a board.
pub struct TestEventSource {
    rx: Receiver<BoardEvent>,
}

impl TestEventSource {
    pub fn new(rx: Receiver<BoardEvent>) -> Self {
        Self { rx }
    }
}

impl BoardEventSource for TestEventSource {
    fn recv_timeout(&self, timeout: Duration) -> Result<BoardEvent, RecvTimeoutError> {
        self.rx.recv_timeout(timeout)
    }
}

/// Drains the event source one step at a time, substituting a tick whenever
/// the source has nothing to say within the poll interval.
pub struct Runner<E: BoardEventSource, T: Ticker> {
    event_source: E,
    ticker: T,
}

impl<E: BoardEventSource, T: Ticker> Runner<E, T> {
    pub fn new(event_source: E, ticker: T) -> Self {
        Self {
            event_source,
            ticker,
        }
    }

    /// Next event from the board, or `Tick` after one poll interval of
    /// silence. Never blocks longer than the interval.
    pub fn step(&self) -> BoardEvent {
        match self.event_source.recv_timeout(self.ticker.interval()) {
            Ok(ev) => ev,
            Err(RecvTimeoutError::Timeout) | Err(RecvTimeoutError::Disconnected) => {
                BoardEvent::Tick
            }
        }
    }

    /// Forwards a reset request to the event source.
    pub fn request_reset(&self) {
        self.event_source.request_reset();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dart::TurnSignal;
    use std::sync::mpsc;

    #[test]
    fn silent_board_yields_ticks() {
        let (_tx, rx) = mpsc::channel();
        let runner = Runner::new(
            TestEventSource::new(rx),
            FixedTicker::new(Duration::from_millis(1)),
        );

        assert_eq!(runner.step(), BoardEvent::Tick);
        assert_eq!(runner.step(), BoardEvent::Tick);
    }

    #[test]
    fn queued_events_arrive_before_any_tick() {
        let (tx, rx) = mpsc::channel();
        tx.send(BoardEvent::Signal(TurnSignal::TurnEnding)).unwrap();
        tx.send(BoardEvent::Signal(TurnSignal::TurnComplete)).unwrap();
        let runner = Runner::new(
            TestEventSource::new(rx),
            FixedTicker::new(Duration::from_millis(10)),
        );

        assert_eq!(runner.step(), BoardEvent::Signal(TurnSignal::TurnEnding));
        assert_eq!(runner.step(), BoardEvent::Signal(TurnSignal::TurnComplete));
        assert_eq!(runner.step(), BoardEvent::Tick);
    }
}
