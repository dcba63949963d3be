//! Pipeline counters

use std::sync::atomic::{AtomicU64, Ordering};

/// Snapshot of pipeline activity since construction.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, serde::Serialize)]
pub struct EncoderStats {
    /// Frames accepted into the input queue.
    pub frames_queued: u64,
    /// Frames packed into backend input buffers.
    pub frames_packed: u64,
    /// Frames dropped before reaching the backend.
    pub frames_dropped: u64,
    /// Encoded buffers delivered to the delegate.
    pub buffers_encoded: u64,
    /// Delivered buffers carrying codec configuration data.
    pub codec_config_buffers: u64,
}

/// Lock-free counters shared between pipeline threads.
#[derive(Debug, Default)]
pub(crate) struct StatsCounters {
    frames_queued: AtomicU64,
    frames_packed: AtomicU64,
    frames_dropped: AtomicU64,
    buffers_encoded: AtomicU64,
    codec_config_buffers: AtomicU64,
}

impl StatsCounters {
    pub(crate) fn record_queued(&self) {
        self.frames_queued.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_packed(&self) {
        self.frames_packed.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_dropped(&self) {
        self.frames_dropped.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_encoded(&self, codec_config: bool) {
        self.buffers_encoded.fetch_add(1, Ordering::Relaxed);
        if codec_config {
            self.codec_config_buffers.fetch_add(1, Ordering::Relaxed);
        }
    }

    /// Consistent-enough snapshot for logging and metrics.
    pub(crate) fn snapshot(&self) -> EncoderStats {
        EncoderStats {
            frames_queued: self.frames_queued.load(Ordering::Relaxed),
            frames_packed: self.frames_packed.load(Ordering::Relaxed),
            frames_dropped: self.frames_dropped.load(Ordering::Relaxed),
            buffers_encoded: self.buffers_encoded.load(Ordering::Relaxed),
            codec_config_buffers: self.codec_config_buffers.load(Ordering::Relaxed),
        }
    }
}
