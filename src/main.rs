mod domain;
mod infrastructure;

use crate::domain::hand::HandProcessor;
use crate::domain::models::{ConnectionStatus, GloveEvent, HandState, MessageSeverity};
use crate::domain::settings::SettingsService;
use crate::infrastructure::link;
use crate::infrastructure::reader::GloveReader;
use anyhow::Result;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

/// BLE notification payloads top out around 20 bytes at the default MTU.
const REPLAY_CHUNK_LEN: usize = 20;
const REPLAY_CHUNK_INTERVAL: Duration = Duration::from_millis(15);

#[tokio::main]
async fn main() -> Result<()> {
    let settings_service = SettingsService::new()?;
    let _logging_guard =
        infrastructure::logging::init_logger(&settings_service.get().log_settings)?;

    info!("Starting Flex Glove Bridge");
    info!(
        device = %settings_service.get().device_name,
        "configured for glove"
    );
    let settings = Arc::new(Mutex::new(settings_service));

    // Without a real transport attached, replay a capture file (first
    // argument) or a built-in sample stream through the link.
    let capture = match std::env::args().nth(1) {
        Some(path) => {
            info!(path = %path, "replaying capture file");
            std::fs::read(&path)?
        }
        None => {
            info!("no capture file given, replaying built-in sample stream");
            sample_capture()
        }
    };

    let (event_tx, mut event_rx) = mpsc::unbounded_channel();
    let (byte_tx, glove_link) = link::link();

    let _ = event_tx.send(GloveEvent::ConnectionStatus(ConnectionStatus::Connecting));
    link::spawn_replay(byte_tx, capture, REPLAY_CHUNK_LEN, REPLAY_CHUNK_INTERVAL);

    let mut reader = GloveReader::new(glove_link, event_tx, settings.clone());
    let reader_task = tokio::spawn(async move {
        reader.run().await;
        reader
    });

    let hand = HandProcessor::new(settings);
    let mut state = HandState::default();

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                info!("ctrl-c received, shutting down");
                reader_task.abort();
                return Ok(());
            }
            event = event_rx.recv() => match event {
                Some(GloveEvent::Frame(frame)) => {
                    state.apply(&frame);
                    info!(
                        thumb = frame.thumb,
                        index = frame.index,
                        middle = frame.middle,
                        ring = frame.ring,
                        pinky = frame.pinky,
                        temperature = ?state.temperature,
                        "frame"
                    );
                    let norm = hand.normalize(&state);
                    debug!(
                        thumb = norm.thumb,
                        index = norm.index,
                        middle = norm.middle,
                        ring = norm.ring,
                        pinky = norm.pinky,
                        "normalized hand"
                    );
                }
                Some(GloveEvent::ConnectionStatus(status)) => {
                    info!(?status, "connection status");
                    if status == ConnectionStatus::Disconnected {
                        break;
                    }
                }
                Some(GloveEvent::LogMessage(msg)) => match msg.severity {
                    MessageSeverity::Warning => warn!("{}", msg.message),
                    MessageSeverity::Info => info!("{}", msg.message),
                },
                None => break,
            }
        }
    }

    if let Ok(reader) = reader_task.await {
        let stats = reader.stats();
        info!(
            frames = stats.frames,
            discarded_lines = stats.discarded_lines,
            discarded_messages = stats.discarded_messages,
            overflow_resets = stats.overflow_resets,
            last_hand = ?reader.state().fingers(),
            "session complete"
        );
    }

    Ok(())
}

/// A plausible stretch of glove output: serial-style CSV lines, BLE-style
/// tagged messages, and the odd corrupt line the parser has to ride through.
fn sample_capture() -> Vec<u8> {
    let mut capture = Vec::new();
    for step in 0..40i32 {
        let flex = |finger: i32| (step * 97 + finger * 531) % 4096;
        if step % 7 == 5 {
            capture.extend_from_slice(b"<noise>\n");
        } else if step % 3 == 0 {
            capture.extend_from_slice(
                format!(
                    "{},{},{},{},{}\n",
                    flex(0),
                    flex(1),
                    flex(2),
                    flex(3),
                    flex(4)
                )
                .as_bytes(),
            );
        } else {
            let temperature = 14000 + (step * 17) % 800;
            capture.extend_from_slice(
                format!(
                    "Flex: T:{} I:{} M:{} R:{} P:{} Th:{}\n",
                    flex(0),
                    flex(1),
                    flex(2),
                    flex(3),
                    flex(4),
                    temperature
                )
                .as_bytes(),
            );
        }
    }
    capture
}
