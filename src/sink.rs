//! Output sinks
//!
//! Two observation surfaces hang off the pipeline:
//!
//! - [`EncoderDelegate`]: receives encoded output buffers. Held weakly;
//!   a dropped delegate silently ends delivery without keeping the
//!   consumer alive.
//! - [`EncoderReport`]: lifecycle and per-frame timing notifications,
//!   for metrics or supervision. [`NullReport`] is the default no-op
//!   sink.

use crate::frame::OutputBuffer;

/// Consumer of encoded output.
///
/// Both callbacks run on the thread driving `execute`. A buffer flagged
/// as codec configuration is delivered through
/// `on_buffer_with_codec_config` first and then through
/// `on_buffer_available` like any other buffer.
#[cfg_attr(test, mockall::automock)]
pub trait EncoderDelegate: Send + Sync {
    /// One encoded buffer is ready.
    fn on_buffer_available(&self, buffer: &OutputBuffer);

    /// An encoded buffer carrying codec configuration data is ready.
    fn on_buffer_with_codec_config(&self, buffer: &OutputBuffer) {
        let _ = buffer;
    }
}

/// Lifecycle and per-frame timing sink.
#[cfg_attr(test, mockall::automock)]
pub trait EncoderReport: Send + Sync {
    /// The encoder started.
    fn started(&self) {}

    /// The encoder stopped.
    fn stopped(&self) {}

    /// An input frame entered the queue.
    fn received_input_buffer(&self, timestamp_us: i64) {
        let _ = timestamp_us;
    }

    /// An input frame was packed and handed to the backend.
    fn began_frame(&self, timestamp_us: i64) {
        let _ = timestamp_us;
    }

    /// An encoded buffer for the given source timestamp came back.
    fn finished_frame(&self, timestamp_us: i64) {
        let _ = timestamp_us;
    }
}

/// Report sink that discards every notification.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullReport;

impl EncoderReport for NullReport {}
