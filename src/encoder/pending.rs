//! In-flight buffer tracking
//!
//! While the backend holds a packed input buffer, the source frame that
//! produced it must stay alive (a wrapped native handle borrows the
//! frame's storage). [`PendingBuffers`] keys each outstanding frame by
//! its buffer id so the return path resolves it in constant time instead
//! of scanning for pointer identity.

use std::collections::HashMap;
use std::sync::Arc;

use thiserror::Error;

use crate::backend::BufferId;
use crate::frame::VideoFrame;

/// A buffer id was tracked twice without being resolved in between.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
#[error("buffer {0} is already tracked")]
pub(crate) struct AlreadyTracked(pub(crate) BufferId);

/// Map of in-flight buffer ids to the frames backing them.
#[derive(Default)]
pub(crate) struct PendingBuffers {
    entries: HashMap<BufferId, Arc<dyn VideoFrame>>,
}

impl PendingBuffers {
    /// Create an empty tracker.
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Associate a frame with an outstanding buffer id.
    pub(crate) fn track(
        &mut self,
        id: BufferId,
        frame: Arc<dyn VideoFrame>,
    ) -> Result<(), AlreadyTracked> {
        use std::collections::hash_map::Entry;
        match self.entries.entry(id) {
            Entry::Occupied(_) => Err(AlreadyTracked(id)),
            Entry::Vacant(slot) => {
                slot.insert(frame);
                Ok(())
            }
        }
    }

    /// Remove and return the frame for a returned buffer, or `None` for
    /// an id that was never tracked.
    pub(crate) fn resolve(&mut self, id: BufferId) -> Option<Arc<dyn VideoFrame>> {
        self.entries.remove(&id)
    }

    /// Remove and return all tracked frames, in no particular order.
    pub(crate) fn drain(&mut self) -> Vec<Arc<dyn VideoFrame>> {
        self.entries.drain().map(|(_, frame)| frame).collect()
    }

    /// Number of in-flight buffers.
    pub(crate) fn len(&self) -> usize {
        self.entries.len()
    }
}
