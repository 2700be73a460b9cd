//! farhand-transport-mem: In-process transport for farhand.
//!
//! This is the semantic reference transport. Characteristics:
//! - No serialization: frames move as values
//! - One FIFO queue per direction, no ordering across directions
//! - Clean-close detection: `recv` drains buffered frames, then `Ok(None)`

#![deny(unsafe_code)]

use std::io;

use parking_lot::Mutex;
use tokio::sync::mpsc;

use farhand_core::{Frame, Transport};

/// One endpoint of an in-process channel pair.
///
/// `send` is non-blocking (the queue is unbounded); `recv` is serialized
/// behind an async mutex so only one receive loop drains the endpoint,
/// matching the single-reader discipline of the demux loops.
pub struct InProcTransport {
    tx: Mutex<Option<mpsc::UnboundedSender<Frame>>>,
    rx: tokio::sync::Mutex<mpsc::UnboundedReceiver<Frame>>,
}

impl InProcTransport {
    /// Create a cross-wired pair of endpoints.
    pub fn pair() -> (InProcTransport, InProcTransport) {
        let (a_tx, b_rx) = mpsc::unbounded_channel();
        let (b_tx, a_rx) = mpsc::unbounded_channel();
        (
            InProcTransport {
                tx: Mutex::new(Some(a_tx)),
                rx: tokio::sync::Mutex::new(a_rx),
            },
            InProcTransport {
                tx: Mutex::new(Some(b_tx)),
                rx: tokio::sync::Mutex::new(b_rx),
            },
        )
    }
}

impl Transport for InProcTransport {
    async fn send(&self, frame: Frame) -> io::Result<()> {
        let tx = self.tx.lock().clone();
        match tx {
            Some(tx) => tx
                .send(frame)
                .map_err(|_| io::Error::new(io::ErrorKind::BrokenPipe, "peer closed")),
            None => Err(io::Error::new(
                io::ErrorKind::BrokenPipe,
                "transport closed",
            )),
        }
    }

    async fn recv(&self) -> io::Result<Option<Frame>> {
        Ok(self.rx.lock().await.recv().await)
    }

    fn close(&self) {
        // Dropping our sender closes the peer's receive queue once drained;
        // closing our receiver makes the peer's sends fail fast.
        self.tx.lock().take();
        if let Ok(mut rx) = self.rx.try_lock() {
            rx.close();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use farhand_core::{Call, CallId};
    use serde_json::json;

    fn call_frame(id: u64) -> Frame {
        Frame::Call(Call {
            id: CallId::new(id),
            method: "m".into(),
            params: vec![json!(id)],
            sequence: None,
        })
    }

    #[tokio::test]
    async fn frames_arrive_in_send_order() {
        let (a, b) = InProcTransport::pair();
        a.send(call_frame(1)).await.unwrap();
        a.send(call_frame(2)).await.unwrap();
        assert_eq!(b.recv().await.unwrap(), Some(call_frame(1)));
        assert_eq!(b.recv().await.unwrap(), Some(call_frame(2)));
    }

    #[tokio::test]
    async fn directions_are_independent() {
        let (a, b) = InProcTransport::pair();
        b.send(call_frame(9)).await.unwrap();
        a.send(call_frame(1)).await.unwrap();
        assert_eq!(a.recv().await.unwrap(), Some(call_frame(9)));
        assert_eq!(b.recv().await.unwrap(), Some(call_frame(1)));
    }

    #[tokio::test]
    async fn close_drains_then_signals_end() {
        let (a, b) = InProcTransport::pair();
        a.send(call_frame(1)).await.unwrap();
        a.close();
        assert!(a.send(call_frame(2)).await.is_err());
        assert_eq!(b.recv().await.unwrap(), Some(call_frame(1)));
        assert_eq!(b.recv().await.unwrap(), None);
    }

    #[tokio::test]
    async fn send_to_closed_peer_fails() {
        let (a, b) = InProcTransport::pair();
        b.close();
        assert!(a.send(call_frame(1)).await.is_err());
    }
}
