use crate::dart::{normalize, BoardEvent, RawSegment, ThrowEvent, TurnSignal};
use crate::runtime::BoardEventSource;
use log::{debug, info, warn};
use serde::Deserialize;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError};
use std::sync::Arc;
use std::time::Duration;
use tungstenite::Message;

const RECONNECT_DELAY: Duration = Duration::from_secs(2);

/// Wire shape of the board manager's event stream.
#[derive(Debug, Deserialize)]
struct WsMessage {
    #[serde(rename = "type", default)]
    kind: Option<String>,
    #[serde(default)]
    data: Option<WsData>,
}

#[derive(Debug, Deserialize)]
struct WsData {
    #[serde(default)]
    event: Option<String>,
    #[serde(default)]
    throws: Vec<WsThrow>,
}

#[derive(Debug, Deserialize)]
struct WsThrow {
    #[serde(default)]
    segment: RawSegment,
    #[serde(default)]
    coords: Option<WsCoords>,
}

#[derive(Debug, Deserialize)]
struct WsCoords {
    #[serde(default)]
    x: Option<f64>,
    #[serde(default)]
    y: Option<f64>,
}

/// Translates one websocket text frame into a board event. Frames that are
/// not state updates, and state updates we do not recognize, yield `None`
/// so the stream keeps flowing.
fn parse_message(text: &str) -> Option<BoardEvent> {
    let msg: WsMessage = match serde_json::from_str(text) {
        Ok(msg) => msg,
        Err(err) => {
            debug!("ignoring non-JSON frame: {}", err);
            return None;
        }
    };
    if msg.kind.as_deref() != Some("state") {
        return None;
    }
    let data = msg.data?;

    match data.event.as_deref() {
        Some("Throw detected") => {
            let throw = data.throws.last()?;
            let index = data.throws.len() - 1;
            let code = normalize(&throw.segment);
            let (x, y) = throw
                .coords
                .as_ref()
                .map(|c| (c.x, c.y))
                .unwrap_or((None, None));
            Some(BoardEvent::Throw(ThrowEvent::new(code, x, y).with_index(index)))
        }
        Some("Takeout in progress") => Some(BoardEvent::Signal(TurnSignal::TurnEnding)),
        Some("Takeout finished") => Some(BoardEvent::Signal(TurnSignal::TurnComplete)),
        Some("Takeout cancelled") => Some(BoardEvent::Signal(TurnSignal::TurnIncomplete)),
        other => {
            debug!("ignoring board event {:?}", other);
            None
        }
    }
}

/// Derive the events websocket URL from the board manager base URL.
/// `http://host:3180` becomes `ws://host:3180/api/events` (and https, wss).
fn ws_url(base_url: &str) -> String {
    let trimmed = base_url.trim_end_matches('/');
    format!("{}/api/events", trimmed.replacen("http", "ws", 1))
}

/// Live event feed from an Autodarts board manager. A background thread
/// owns the websocket and pushes parsed events into a channel; dropped
/// connections are retried indefinitely. `request_reset` forces the socket
/// to be dropped and reopened, which resets the board's detection session.
pub struct AutodartsFeed {
    rx: Receiver<BoardEvent>,
    reset: Arc<AtomicBool>,
}

impl AutodartsFeed {
    pub fn connect(base_url: &str) -> Self {
        let url = ws_url(base_url);
        let (tx, rx) = mpsc::channel();
        let reset = Arc::new(AtomicBool::new(false));
        let thread_reset = Arc::clone(&reset);

        std::thread::spawn(move || {
            let mut was_connected = false;
            loop {
                match tungstenite::connect(url.as_str()) {
                    Ok((mut socket, _response)) => {
                        info!("connected to board event stream at {}", url);
                        was_connected = true;
                        if tx.send(BoardEvent::Connected).is_err() {
                            return;
                        }
                        loop {
                            if thread_reset.swap(false, Ordering::SeqCst) {
                                info!("resetting board session");
                                let _ = socket.close(None);
                                break;
                            }
                            match socket.read() {
                                Ok(Message::Text(text)) => {
                                    if let Some(event) = parse_message(&text) {
                                        if tx.send(event).is_err() {
                                            return;
                                        }
                                    }
                                }
                                Ok(Message::Close(_)) => break,
                                Ok(_) => {}
                                Err(err) => {
                                    warn!("board event stream error: {}", err);
                                    break;
                                }
                            }
                        }
                    }
                    Err(err) => {
                        debug!("could not reach board manager at {}: {}", url, err);
                    }
                }
                if was_connected {
                    was_connected = false;
                    if tx.send(BoardEvent::Disconnected).is_err() {
                        return;
                    }
                }
                std::thread::sleep(RECONNECT_DELAY);
            }
        });

        Self { rx, reset }
    }
}

impl BoardEventSource for AutodartsFeed {
    fn recv_timeout(&self, timeout: Duration) -> Result<BoardEvent, RecvTimeoutError> {
        self.rx.recv_timeout(timeout)
    }

    fn request_reset(&self) {
        self.reset.store(true, Ordering::SeqCst);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dart::DartCode;

    #[test]
    fn test_parse_throw_event() {
        let frame = r#"{
            "type": "state",
            "data": {
                "event": "Throw detected",
                "throws": [
                    {"segment": {"name": "S20", "number": 20, "bed": "SingleOuter"},
                     "coords": {"x": 1.5, "y": -2.0}},
                    {"segment": {"name": "T19", "number": 19, "bed": "Triple"},
                     "coords": {"x": 0.25, "y": 3.125}}
                ]
            }
        }"#;

        match parse_message(frame) {
            Some(BoardEvent::Throw(ev)) => {
                assert_eq!(ev.code, DartCode::Triple(19));
                assert_eq!(ev.x, Some(0.25));
                assert_eq!(ev.y, Some(3.125));
                assert_eq!(ev.dart_index, Some(1));
            }
            other => panic!("expected throw, got {:?}", other),
        }
    }

    #[test]
    fn test_parse_throw_without_coords() {
        let frame = r#"{
            "type": "state",
            "data": {
                "event": "Throw detected",
                "throws": [{"segment": {"name": "Bull"}}]
            }
        }"#;

        match parse_message(frame) {
            Some(BoardEvent::Throw(ev)) => {
                assert_eq!(ev.code, DartCode::Bull);
                assert_eq!(ev.x, None);
                assert_eq!(ev.y, None);
                // Coordinate-less throws still carry their list position so
                // duplicate suppression never drops a repeat hit.
                assert_eq!(ev.dart_index, Some(0));
            }
            other => panic!("expected throw, got {:?}", other),
        }
    }

    #[test]
    fn test_parse_takeout_signals() {
        let frame = |event: &str| {
            format!(r#"{{"type": "state", "data": {{"event": "{}"}}}}"#, event)
        };
        assert_eq!(
            parse_message(&frame("Takeout in progress")),
            Some(BoardEvent::Signal(TurnSignal::TurnEnding))
        );
        assert_eq!(
            parse_message(&frame("Takeout finished")),
            Some(BoardEvent::Signal(TurnSignal::TurnComplete))
        );
        assert_eq!(
            parse_message(&frame("Takeout cancelled")),
            Some(BoardEvent::Signal(TurnSignal::TurnIncomplete))
        );
    }

    #[test]
    fn test_unknown_frames_are_dropped() {
        assert_eq!(parse_message("not json"), None);
        assert_eq!(parse_message(r#"{"type": "metrics"}"#), None);
        assert_eq!(
            parse_message(r#"{"type": "state", "data": {"event": "Calibration started"}}"#),
            None
        );
        assert_eq!(
            parse_message(r#"{"type": "state", "data": {"event": "Throw detected", "throws": []}}"#),
            None
        );
    }

    #[test]
    fn test_ws_url_derivation() {
        assert_eq!(
            ws_url("http://10.0.0.127:3180"),
            "ws://10.0.0.127:3180/api/events"
        );
        assert_eq!(
            ws_url("https://board.local/"),
            "wss://board.local/api/events"
        );
    }
}
