//! Blocking FIFO queue for raw input frames
//!
//! The producer pushes frames without blocking; the backend's pull
//! callback blocks in [`FrameQueue::next`] until a frame arrives or the
//! queue is torn down. Teardown is the only cancellation path: it wakes
//! every blocked waiter and makes subsequent reads report end of stream.
//!
//! FIFO order is the only ordering guarantee.

use std::sync::Arc;

use crossbeam_channel::{unbounded, Receiver, Sender};
use parking_lot::Mutex;

use crate::frame::VideoFrame;

/// Thread-safe FIFO of frames awaiting encoding.
pub struct FrameQueue {
    tx: Mutex<Option<Sender<Arc<dyn VideoFrame>>>>,
    rx: Receiver<Arc<dyn VideoFrame>>,
}

impl FrameQueue {
    /// Create an empty queue.
    pub fn new() -> Self {
        let (tx, rx) = unbounded();
        Self {
            tx: Mutex::new(Some(tx)),
            rx,
        }
    }

    /// Enqueue a frame without blocking.
    ///
    /// Returns `false` once the queue has been torn down; the caller still
    /// owns the frame in that case.
    pub fn push(&self, frame: Arc<dyn VideoFrame>) -> bool {
        match &*self.tx.lock() {
            Some(tx) => tx.send(frame).is_ok(),
            None => false,
        }
    }

    /// Remove and return the oldest frame, blocking until one is
    /// available. Returns `None` once the queue is torn down and drained.
    pub fn next(&self) -> Option<Arc<dyn VideoFrame>> {
        self.rx.recv().ok()
    }

    /// Close the queue without draining it.
    ///
    /// Refuses further pushes and wakes every blocked [`FrameQueue::next`]
    /// caller once the buffered frames run out; frames already queued stay
    /// readable until drained.
    pub fn close(&self) {
        self.tx.lock().take();
    }

    /// Tear the queue down, waking every blocked [`FrameQueue::next`]
    /// caller, and return the frames that were never consumed.
    pub fn teardown(&self) -> Vec<Arc<dyn VideoFrame>> {
        self.close();

        let mut leftover = Vec::new();
        while let Ok(frame) = self.rx.try_recv() {
            leftover.push(frame);
        }
        leftover
    }

    /// Whether the queue has been torn down.
    pub fn is_torn_down(&self) -> bool {
        self.tx.lock().is_none()
    }

    /// Number of frames currently queued.
    pub fn len(&self) -> usize {
        self.rx.len()
    }

    /// Whether the queue currently holds no frames.
    pub fn is_empty(&self) -> bool {
        self.rx.is_empty()
    }
}

impl Default for FrameQueue {
    fn default() -> Self {
        Self::new()
    }
}
