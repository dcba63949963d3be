//! Frame capability interfaces
//!
//! The producer side hands raw frames to the pipeline as [`VideoFrame`]
//! capability objects; the pipeline borrows them until it signals
//! [`VideoFrame::release`], exactly once per frame it accepted. Encoded
//! output leaves the pipeline as immutable [`OutputBuffer`] values whose
//! bytes are decoupled from the backend's transient buffers.

use bytes::Bytes;

/// Opaque platform buffer handle attached to a frame.
///
/// The handle is a token only; ownership never transfers to the pipeline
/// or the backend. In passthrough mode it is wrapped into a backend input
/// buffer without copying any pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NativeHandle(u64);

impl NativeHandle {
    /// Wrap a raw platform handle value.
    pub const fn from_raw(raw: u64) -> Self {
        Self(raw)
    }

    /// Get the raw platform handle value.
    pub const fn as_raw(&self) -> u64 {
        self.0
    }
}

/// A raw input frame borrowed from the producer.
///
/// Implemented by the capture/compositor stage that owns the frame memory.
/// The pipeline calls [`VideoFrame::release`] exactly once when it is done
/// with a frame it accepted, returning ownership to the producer.
pub trait VideoFrame: Send + Sync {
    /// Length of the raw pixel data in bytes.
    fn len(&self) -> u32;

    /// Whether the frame carries no data.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Raw pixel data (interleaved RGBX in readout mode).
    fn data(&self) -> &[u8];

    /// Platform buffer handle, if the producer can share one.
    fn native_handle(&self) -> Option<NativeHandle>;

    /// Capture timestamp in microseconds.
    fn timestamp_us(&self) -> i64;

    /// Whether the frame holds valid data.
    fn is_valid(&self) -> bool;

    /// Return ownership of the frame to the producer.
    fn release(&self);
}

/// One encoded bitstream unit surfaced by the pipeline.
///
/// The payload is copied out of the backend's transient buffer, so the
/// value is self-contained and cheap to hand to multiple consumers.
#[derive(Debug, Clone)]
pub struct OutputBuffer {
    /// Encoded bitstream bytes.
    pub data: Bytes,

    /// Timestamp of the source frame in microseconds.
    pub timestamp_us: i64,

    /// Whether this unit carries codec configuration data (parameter
    /// sets) rather than picture data.
    pub codec_config: bool,
}

impl OutputBuffer {
    /// Create a new output buffer value.
    pub fn new(data: Bytes, timestamp_us: i64, codec_config: bool) -> Self {
        Self {
            data,
            timestamp_us,
            codec_config,
        }
    }

    /// Encoded payload size in bytes.
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Whether the payload is empty.
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_native_handle_roundtrip() {
        let handle = NativeHandle::from_raw(0xdead_beef);
        assert_eq!(handle.as_raw(), 0xdead_beef);
    }

    #[test]
    fn test_output_buffer_accessors() {
        let buffer = OutputBuffer::new(Bytes::from_static(&[0, 0, 0, 1, 0x67]), 42_000, true);
        assert_eq!(buffer.len(), 5);
        assert!(!buffer.is_empty());
        assert_eq!(buffer.timestamp_us, 42_000);
        assert!(buffer.codec_config);
    }

    #[test]
    fn test_output_buffer_clone_shares_payload() {
        let buffer = OutputBuffer::new(Bytes::from(vec![1u8; 1024]), 0, false);
        let clone = buffer.clone();
        assert_eq!(buffer.data, clone.data);
    }
}
