//! Byte rendezvous between a transport and the polling reader
//!
//! The platform BLE (or serial) layer delivers received bytes from its own
//! callback context; the reader consumes them from a polling loop. The pair
//! created by [`link`] is the single synchronization point between the two:
//! the transport pushes chunks through a [`LinkSender`], the reader drains
//! them from the [`GloveLink`] with a bounded wait.
//!
//! [`GloveLink::recv`] keeps the three situations a caller must tell apart
//! distinct: data arrived, nothing arrived within the wait, or the transport
//! is gone for good.

use std::time::Duration;
use thiserror::Error;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::debug;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum LinkError {
    /// Every sender is gone; no more data will ever arrive.
    #[error("glove link closed")]
    Closed,
}

/// Producer half, held by the transport receive callback (or a replay task).
#[derive(Clone)]
pub struct LinkSender {
    tx: mpsc::UnboundedSender<Vec<u8>>,
}

impl LinkSender {
    /// Hand a freshly received chunk to the reader. Returns `false` once the
    /// reader side has been dropped.
    pub fn push(&self, chunk: Vec<u8>) -> bool {
        self.tx.send(chunk).is_ok()
    }
}

/// Consumer half: a bounded-wait read view of the received byte stream.
pub struct GloveLink {
    rx: mpsc::UnboundedReceiver<Vec<u8>>,
}

/// Create a connected sender/consumer pair.
pub fn link() -> (LinkSender, GloveLink) {
    let (tx, rx) = mpsc::unbounded_channel();
    (LinkSender { tx }, GloveLink { rx })
}

impl GloveLink {
    /// Wait up to `wait` for received bytes.
    ///
    /// `Ok(None)` means no data inside the window. Everything already queued
    /// is coalesced into one chunk so a slow poller catches up in a single
    /// call, the way the platform bridge accumulates notifications between
    /// polls.
    pub async fn recv(&mut self, wait: Duration) -> Result<Option<Vec<u8>>, LinkError> {
        let mut chunk = match tokio::time::timeout(wait, self.rx.recv()).await {
            Err(_) => return Ok(None),
            Ok(None) => return Err(LinkError::Closed),
            Ok(Some(chunk)) => chunk,
        };
        while let Ok(more) = self.rx.try_recv() {
            chunk.extend_from_slice(&more);
        }
        Ok(Some(chunk))
    }

    /// Whether the transport side can still deliver data.
    pub fn is_open(&self) -> bool {
        !self.rx.is_closed()
    }
}

/// Feed a capture through the link in small timed chunks, the way the BLE
/// stack hands out notification payloads. The sender is dropped when the
/// capture runs out, which closes the link.
pub fn spawn_replay(
    sender: LinkSender,
    capture: Vec<u8>,
    chunk_len: usize,
    interval: Duration,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        for chunk in capture.chunks(chunk_len.max(1)) {
            if !sender.push(chunk.to_vec()) {
                debug!("reader side dropped, stopping replay");
                return;
            }
            tokio::time::sleep(interval).await;
        }
        debug!("replay complete");
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn recv_returns_pushed_bytes() {
        let (tx, mut rx) = link();
        tx.push(b"T:512".to_vec());
        let chunk = rx.recv(Duration::from_millis(50)).await.unwrap();
        assert_eq!(chunk, Some(b"T:512".to_vec()));
    }

    #[tokio::test]
    async fn recv_coalesces_queued_chunks() {
        let (tx, mut rx) = link();
        tx.push(b"T:512 ".to_vec());
        tx.push(b"I:300".to_vec());
        let chunk = rx.recv(Duration::from_millis(50)).await.unwrap();
        assert_eq!(chunk, Some(b"T:512 I:300".to_vec()));
    }

    #[tokio::test]
    async fn recv_times_out_without_data() {
        let (tx, mut rx) = link();
        let outcome = rx.recv(Duration::from_millis(5)).await;
        assert_eq!(outcome, Ok(None));
        assert!(rx.is_open());
        drop(tx);
    }

    #[tokio::test]
    async fn recv_reports_closure() {
        let (tx, mut rx) = link();
        drop(tx);
        let outcome = rx.recv(Duration::from_millis(5)).await;
        assert_eq!(outcome, Err(LinkError::Closed));
    }

    #[tokio::test]
    async fn replay_delivers_whole_capture_then_closes() {
        let (tx, mut rx) = link();
        spawn_replay(tx, b"512,300,700,900,100\n".to_vec(), 4, Duration::ZERO);
        let mut received = Vec::new();
        loop {
            match rx.recv(Duration::from_millis(100)).await {
                Ok(Some(chunk)) => received.extend_from_slice(&chunk),
                Ok(None) => continue,
                Err(LinkError::Closed) => break,
            }
        }
        assert_eq!(received, b"512,300,700,900,100\n");
    }
}
