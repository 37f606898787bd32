//! Polling glove reader
//!
//! Owns the consumer side of the byte link, the frame assembler, and the
//! latest hand state. One `poll` per tick: a bounded-wait read, a synchronous
//! parse of whatever arrived, and event emission for every completed frame.
//! Nothing here blocks beyond the read window and nothing panics on bad
//! input; a glove that streams continuously must never be stalled by one
//! corrupt packet.

use crate::domain::frame::{FrameAssembler, FrameStats};
use crate::domain::models::{
    ConnectionStatus, GloveEvent, HandState, MessageSeverity, StatusMessage,
};
use crate::domain::settings::SettingsService;
use crate::infrastructure::link::{GloveLink, LinkError};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tokio::sync::mpsc;
use tracing::{info, trace, warn};

/// Outcome of one polling tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollOutcome {
    /// This many frames were parsed this tick.
    Frames(usize),
    /// No data inside the read window, or a fragment that completed nothing.
    Idle,
    /// The transport is gone; polling is over.
    Closed,
}

pub struct GloveReader {
    link: GloveLink,
    assembler: FrameAssembler,
    state: HandState,
    event_sender: mpsc::UnboundedSender<GloveEvent>,
    settings: Arc<Mutex<SettingsService>>,
    /// Time of the last parsed frame; rearmed after each stale warning so the
    /// log is not spammed once per tick.
    last_frame: Option<Instant>,
    closed: bool,
}

impl GloveReader {
    pub fn new(
        link: GloveLink,
        event_sender: mpsc::UnboundedSender<GloveEvent>,
        settings: Arc<Mutex<SettingsService>>,
    ) -> Self {
        Self {
            link,
            assembler: FrameAssembler::new(),
            state: HandState::default(),
            event_sender,
            settings,
            last_frame: None,
            closed: false,
        }
    }

    /// Poll until the transport closes.
    pub async fn run(&mut self) {
        info!("glove reader started");
        if self.link.is_open() {
            self.send_status(ConnectionStatus::Connected);
            self.send_log("Glove connected", MessageSeverity::Info);
        }
        while self.poll().await != PollOutcome::Closed {}
    }

    /// One tick: bounded read, parse, emit.
    pub async fn poll(&mut self) -> PollOutcome {
        if self.closed {
            return PollOutcome::Closed;
        }

        let (wait, stale_after) = {
            let settings = self.settings.lock().unwrap();
            let s = settings.get();
            (
                Duration::from_millis(s.read_timeout_ms),
                Duration::from_secs(s.stale_data_warn_secs),
            )
        };

        match self.link.recv(wait).await {
            Ok(Some(chunk)) => {
                let frames = self.assembler.feed(&chunk);
                for frame in &frames {
                    self.state.apply(frame);
                    let _ = self.event_sender.send(GloveEvent::Frame(*frame));
                }
                if frames.is_empty() {
                    trace!(
                        pending = self.assembler.pending_len(),
                        "fragment buffered, message still in flight"
                    );
                    PollOutcome::Idle
                } else {
                    self.last_frame = Some(Instant::now());
                    PollOutcome::Frames(frames.len())
                }
            }
            Ok(None) => {
                if let Some(last) = self.last_frame {
                    if last.elapsed() >= stale_after {
                        warn!(elapsed_secs = last.elapsed().as_secs(), "no frames from glove");
                        self.send_log(
                            &format!("No glove data for {}s", last.elapsed().as_secs()),
                            MessageSeverity::Warning,
                        );
                        self.last_frame = Some(Instant::now());
                    }
                }
                PollOutcome::Idle
            }
            Err(LinkError::Closed) => {
                warn!("glove link closed");
                self.closed = true;
                self.send_log("Connection lost", MessageSeverity::Warning);
                self.send_status(ConnectionStatus::Disconnected);
                PollOutcome::Closed
            }
        }
    }

    /// Latest parsed hand state.
    pub fn state(&self) -> HandState {
        self.state
    }

    pub fn stats(&self) -> FrameStats {
        self.assembler.stats()
    }

    fn send_status(&self, status: ConnectionStatus) {
        let _ = self
            .event_sender
            .send(GloveEvent::ConnectionStatus(status));
    }

    fn send_log(&self, message: &str, severity: MessageSeverity) {
        let _ = self.event_sender.send(GloveEvent::LogMessage(StatusMessage {
            message: message.to_string(),
            severity,
        }));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::settings::Settings;
    use crate::infrastructure::link::{link, LinkSender};
    use std::path::PathBuf;

    fn reader_with_link() -> (
        GloveReader,
        LinkSender,
        mpsc::UnboundedReceiver<GloveEvent>,
    ) {
        let settings = Settings {
            read_timeout_ms: 10,
            ..Settings::default()
        };
        let service = SettingsService::with_settings(settings, PathBuf::from("unused"));
        let (tx, glove_link) = link();
        let (event_tx, event_rx) = mpsc::unbounded_channel();
        let reader = GloveReader::new(glove_link, event_tx, Arc::new(Mutex::new(service)));
        (reader, tx, event_rx)
    }

    #[tokio::test]
    async fn frames_update_state_and_emit_events() {
        let (mut reader, tx, mut events) = reader_with_link();
        tx.push(b"512,300,700,900,100\n".to_vec());

        assert_eq!(reader.poll().await, PollOutcome::Frames(1));
        assert_eq!(reader.state().fingers(), [512, 300, 700, 900, 100]);

        match events.try_recv().unwrap() {
            GloveEvent::Frame(frame) => assert_eq!(frame.thumb, 512),
            other => panic!("unexpected event: {other:?}"),
        }
    }

    #[tokio::test]
    async fn fragments_poll_as_idle_until_complete() {
        let (mut reader, tx, mut events) = reader_with_link();
        tx.push(b"Flex: T:512 I:300".to_vec());
        assert_eq!(reader.poll().await, PollOutcome::Idle);

        tx.push(b" M:700 R:900 P:100 Th:14500".to_vec());
        assert_eq!(reader.poll().await, PollOutcome::Frames(1));
        assert_eq!(reader.state().temperature, Some(14500));
        assert!(matches!(events.try_recv(), Ok(GloveEvent::Frame(_))));
    }

    #[tokio::test]
    async fn temperature_persists_across_frames() {
        let (mut reader, tx, _events) = reader_with_link();
        tx.push(b"T:1 I:2 M:3 R:4 P:5 Th:14500\n".to_vec());
        reader.poll().await;
        tx.push(b"9,8,7,6,5\n".to_vec());
        reader.poll().await;

        assert_eq!(reader.state().fingers(), [9, 8, 7, 6, 5]);
        assert_eq!(reader.state().temperature, Some(14500));
    }

    #[tokio::test]
    async fn closed_link_disconnects_exactly_once() {
        let (mut reader, tx, mut events) = reader_with_link();
        drop(tx);

        assert_eq!(reader.poll().await, PollOutcome::Closed);
        assert_eq!(reader.poll().await, PollOutcome::Closed);

        let mut disconnects = 0;
        while let Ok(event) = events.try_recv() {
            if matches!(
                event,
                GloveEvent::ConnectionStatus(ConnectionStatus::Disconnected)
            ) {
                disconnects += 1;
            }
        }
        assert_eq!(disconnects, 1);
    }

    #[tokio::test]
    async fn empty_window_polls_idle() {
        let (mut reader, tx, _events) = reader_with_link();
        assert_eq!(reader.poll().await, PollOutcome::Idle);
        drop(tx);
    }

    #[tokio::test]
    async fn silence_after_frames_emits_stale_warning() {
        let settings = Settings {
            read_timeout_ms: 10,
            stale_data_warn_secs: 0,
            ..Settings::default()
        };
        let service = SettingsService::with_settings(settings, PathBuf::from("unused"));
        let (tx, glove_link) = link();
        let (event_tx, mut events) = mpsc::unbounded_channel();
        let mut reader = GloveReader::new(glove_link, event_tx, Arc::new(Mutex::new(service)));

        tx.push(b"1,2,3,4,5\n".to_vec());
        assert_eq!(reader.poll().await, PollOutcome::Frames(1));
        assert_eq!(reader.poll().await, PollOutcome::Idle);

        let mut warned = false;
        while let Ok(event) = events.try_recv() {
            if let GloveEvent::LogMessage(msg) = event {
                warned |= msg.severity == MessageSeverity::Warning;
            }
        }
        assert!(warned);
        drop(tx);
    }
}
