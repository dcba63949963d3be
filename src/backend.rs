//! Backend capability interfaces
//!
//! The hardware encoder backend is a black box behind [`EncoderBackend`].
//! The pipeline drives it with value-level format descriptions built from
//! [`MediaFormat`] and implements the pull-model callbacks itself:
//!
//! - [`FrameSource`]: the backend pulls packed input buffers through
//!   `on_read` on its own thread(s).
//! - [`BufferReturnObserver`]: the backend hands a delivered buffer back
//!   once it is done with it.
//!
//! State is bound through the capability objects registered at session
//! creation; there are no global callback contexts. Configuration keys are
//! passed through verbatim, so a backend wrapping a MediaCodec-style API
//! can forward them untouched.

use std::fmt;
use std::sync::{Arc, Weak};

use thiserror::Error;

use crate::frame::NativeHandle;

/// MIME type of the encoded output stream.
pub const H264_MIME_TYPE: &str = "video/avc";

/// MIME type describing the raw input source.
pub const RAW_MIME_TYPE: &str = "video/raw";

/// Opaque color format: the backend derives the real format from the
/// incoming buffers itself.
pub const COLOR_FORMAT_OPAQUE: i32 = 0x7F00_0789;

/// Constant-bitrate rate control.
pub const BITRATE_MODE_CONSTANT: i32 = 2;

/// Metadata buffer type markers for the store-metadata format keys.
pub mod metadata_buffer_type {
    /// No metadata buffers; input is plain (converted) pixel data.
    pub const INVALID: i32 = -1;

    /// Input buffers carry a wrapped native window buffer handle.
    pub const NATIVE_WINDOW_BUFFER: i32 = 2;
}

/// Format keys passed through to the backend verbatim.
pub mod format_keys {
    /// Stream MIME type.
    pub const MIME: &str = "mime";
    /// Input metadata-buffer mode.
    pub const STORE_METADATA_IN_BUFFERS: &str = "store-metadata-in-buffers";
    /// Output metadata-buffer mode (always off).
    pub const STORE_METADATA_IN_BUFFERS_OUTPUT: &str = "store-metadata-in-buffers-output";
    /// Vendor-prefixed alias for the input metadata-buffer mode.
    pub const INPUT_METADATA_BUFFER_TYPE: &str = "android._input-metadata-buffer-type";
    /// Vendor-prefixed alias for the output metadata-buffer mode.
    pub const ANDROID_STORE_METADATA_IN_BUFFERS_OUTPUT: &str =
        "android._store-metadata-in-buffers-output";
    /// Frame width in pixels.
    pub const WIDTH: &str = "width";
    /// Frame height in pixels.
    pub const HEIGHT: &str = "height";
    /// Row stride in pixels.
    pub const STRIDE: &str = "stride";
    /// Plane height in rows.
    pub const SLICE_HEIGHT: &str = "slice-height";
    /// Input color format.
    pub const COLOR_FORMAT: &str = "color-format";
    /// Target bitrate in bits per second.
    pub const BITRATE: &str = "bitrate";
    /// Rate-control mode.
    pub const BITRATE_MODE: &str = "bitrate-mode";
    /// Target framerate.
    pub const FRAMERATE: &str = "frame-rate";
    /// Intra-refresh mode.
    pub const INTRA_REFRESH_MODE: &str = "intra-refresh-mode";
    /// Cyclic intra-refresh macroblock count.
    pub const INTRA_REFRESH_CIR_MBS: &str = "intra-refresh-CIR-mbs";
    /// Keyframe interval in seconds.
    pub const I_FRAME_INTERVAL: &str = "i-frame-interval";
    /// H.264 profile indication.
    pub const PROFILE_IDC: &str = "profile-idc";
    /// H.264 level indication.
    pub const LEVEL_IDC: &str = "level-idc";
    /// H.264 constraint-set flags.
    pub const CONSTRAINT_SET: &str = "constraint-set";
    /// Ask the backend to prepend parameter sets to IDR frames.
    pub const PREPEND_SPS_PPS_TO_IDR_FRAMES: &str = "prepend-sps-pps-to-idr-frames";
}

/// A value stored in a [`MediaFormat`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MediaValue {
    /// 32-bit integer value.
    Int32(i32),
    /// String value.
    Str(String),
}

/// Insertion-ordered string/int32 key-value format description.
///
/// Setting an existing key replaces its value in place so the key order a
/// backend observes matches the order the pipeline wrote them in.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MediaFormat {
    entries: Vec<(String, MediaValue)>,
}

impl MediaFormat {
    /// Create an empty format description.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set an integer value.
    pub fn set_i32(&mut self, key: &str, value: i32) {
        self.set(key, MediaValue::Int32(value));
    }

    /// Set a string value.
    pub fn set_str(&mut self, key: &str, value: &str) {
        self.set(key, MediaValue::Str(value.to_string()));
    }

    fn set(&mut self, key: &str, value: MediaValue) {
        if let Some(entry) = self.entries.iter_mut().find(|(k, _)| k == key) {
            entry.1 = value;
        } else {
            self.entries.push((key.to_string(), value));
        }
    }

    /// Look up an integer value.
    pub fn int32(&self, key: &str) -> Option<i32> {
        match self.get(key) {
            Some(MediaValue::Int32(value)) => Some(*value),
            _ => None,
        }
    }

    /// Look up a string value.
    pub fn string(&self, key: &str) -> Option<&str> {
        match self.get(key) {
            Some(MediaValue::Str(value)) => Some(value.as_str()),
            _ => None,
        }
    }

    fn get(&self, key: &str) -> Option<&MediaValue> {
        self.entries.iter().find(|(k, _)| k == key).map(|(_, v)| v)
    }

    /// Whether the format contains the given key.
    pub fn contains(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    /// Iterate over entries in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &MediaValue)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the format holds no entries.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Identity of a backend input buffer while it is in flight.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BufferId(pub u64);

impl fmt::Display for BufferId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Status codes the pull callback reports back to the backend.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum SourceReadError {
    /// The encoder behind the source is not running.
    #[error("source is not connected")]
    NotConnected,

    /// The backend's destination descriptor cannot hold an input buffer.
    /// Reserved for backends whose read path carries such a descriptor;
    /// this pipeline's pull signature cannot present one.
    #[error("destination buffer too small")]
    BufferTooSmall,

    /// No more input frames will arrive.
    #[error("end of stream")]
    EndOfStream,
}

/// Observer notified when the backend is done with a delivered buffer.
pub trait BufferReturnObserver: Send + Sync {
    /// The backend hands ownership of a previously delivered input buffer
    /// back to the observer.
    fn on_buffer_returned(&self, buffer: Box<dyn InputBuffer>);
}

/// A backend-allocated input buffer packed by the pipeline.
///
/// Created by [`EncoderBackend::allocate_buffer`] (converted pixels) or
/// [`EncoderBackend::wrap_native_handle`] (zero-copy handle reference),
/// handed to the backend by returning it from [`FrameSource::on_read`],
/// and given back through the registered [`BufferReturnObserver`].
pub trait InputBuffer: Send {
    /// Identity used to match the buffer when it is returned.
    fn id(&self) -> BufferId;

    /// Payload size in bytes.
    fn len(&self) -> usize;

    /// Whether the buffer holds no payload.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Payload bytes.
    fn data(&self) -> &[u8];

    /// Mutable payload bytes (conversion target).
    fn data_mut(&mut self) -> &mut [u8];

    /// The wrapped native handle, for buffers created by
    /// [`EncoderBackend::wrap_native_handle`].
    fn native_handle(&self) -> Option<NativeHandle>;

    /// Stamp the buffer with the source frame's timestamp.
    fn set_timestamp_us(&mut self, timestamp_us: i64);

    /// The stamped timestamp in microseconds.
    fn timestamp_us(&self) -> i64;

    /// Install or clear the return observer. The backend must not invoke
    /// a cleared observer when the buffer is released.
    fn set_return_observer(&mut self, observer: Option<Weak<dyn BufferReturnObserver>>);

    /// The currently installed return observer.
    fn return_observer(&self) -> Option<Weak<dyn BufferReturnObserver>>;
}

/// One encoded output unit owned by the backend.
///
/// The view is transient; callers copy the bytes out before the next
/// read.
pub trait EncodedBuffer: Send {
    /// Encoded payload bytes.
    fn data(&self) -> &[u8];

    /// Timestamp of the source frame in microseconds.
    fn timestamp_us(&self) -> i64;

    /// Whether the unit carries codec configuration data.
    fn is_codec_config(&self) -> bool;
}

/// Input pulled by the backend on its own schedule.
///
/// Implemented by the pipeline; registered with the backend at session
/// creation. All callbacks may be invoked from the backend's threads.
pub trait FrameSource: Send + Sync {
    /// The backend's source started.
    fn on_start(&self) {}

    /// The backend's source stopped.
    fn on_stop(&self) {}

    /// The backend's source paused.
    fn on_pause(&self) {}

    /// The backend wants the next packed input buffer. Blocks until input
    /// is available or the stream ends.
    fn on_read(&self) -> Result<Box<dyn InputBuffer>, SourceReadError>;
}

/// Errors surfaced by the backend.
#[derive(Debug, Error)]
pub enum BackendError {
    /// Creating the encoder session failed.
    #[error("failed to create encoder session: {0}")]
    SessionCreationFailed(String),

    /// Starting the encoder failed.
    #[error("failed to start encoder: {0}")]
    StartFailed(String),

    /// Stopping the encoder failed.
    #[error("failed to stop encoder: {0}")]
    StopFailed(String),

    /// Reading an encoded output buffer failed.
    #[error("failed to read encoded output: {0}")]
    ReadFailed(String),
}

/// The opaque hardware encoder behind the pipeline.
///
/// A session is created once per backend instance; the pipeline owns the
/// backend exclusively and drives start/stop/read from the owning thread
/// while the backend pulls input through the registered [`FrameSource`].
pub trait EncoderBackend: Send + Sync {
    /// Build the encoder session from the output format, the raw source
    /// format and the pull-callback capability object. Must leave no
    /// backend state behind on failure.
    fn create_session(
        &self,
        format: MediaFormat,
        source_format: MediaFormat,
        source: Arc<dyn FrameSource>,
    ) -> Result<(), BackendError>;

    /// Start encoding. May synchronously invoke
    /// [`FrameSource::on_read`] before returning.
    fn start(&self) -> Result<(), BackendError>;

    /// Stop encoding. Buffers still in flight are returned through their
    /// observers before or after this call at the backend's discretion.
    fn stop(&self) -> Result<(), BackendError>;

    /// Pull one encoded output buffer, blocking at the backend's
    /// discretion.
    fn read_output(&self) -> Result<Box<dyn EncodedBuffer>, BackendError>;

    /// Best-effort request for a keyframe at the next opportunity.
    fn request_keyframe(&self);

    /// Allocate an input buffer of the given payload size. `None` when
    /// the buffer pool is exhausted.
    fn allocate_buffer(&self, len: usize) -> Option<Box<dyn InputBuffer>>;

    /// Allocate a minimal input buffer wrapping a reference to a native
    /// handle. Ownership of the handle stays with the producer; the
    /// backend must not release it.
    fn wrap_native_handle(&self, handle: NativeHandle) -> Option<Box<dyn InputBuffer>>;
}
