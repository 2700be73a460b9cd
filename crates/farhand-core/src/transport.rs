//! Message transport abstraction.
//!
//! [`Transport`] abstracts the bidirectional channel between the controller
//! and the execution context. Each direction is a FIFO; there is no
//! ordering guarantee across directions and no shared memory.
//!
//! Implementations take `&self` so a transport can be shared behind an
//! `Arc` between the demux loop and concurrently spawned senders.

use std::future::Future;
use std::io;

use crate::Frame;

/// Trait for transports that can send and receive frames.
pub trait Transport: Send + Sync {
    /// Send a frame. Frames sent from one side arrive in order on the
    /// other.
    fn send(&self, frame: Frame) -> impl Future<Output = io::Result<()>> + Send;

    /// Receive the next frame.
    ///
    /// Returns `Ok(None)` when the channel has closed cleanly and no
    /// buffered frames remain.
    fn recv(&self) -> impl Future<Output = io::Result<Option<Frame>>> + Send;

    /// Tear down the channel. Subsequent sends fail; buffered frames may
    /// still be drained by `recv`.
    fn close(&self);
}
