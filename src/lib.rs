//! # hwcodec-pipeline
//!
//! Asynchronous hardware-backed H.264 encoding pipeline.
//!
//! The pipeline sits between a frame producer (screen capture, compositor
//! readout) and an opaque hardware encoder backend that pulls its input on
//! its own threads:
//!
//! ```text
//! producer ──queue_buffer──> FrameQueue ──on_read──> backend
//!                                │                      │
//!                        (convert or wrap)      (encode, return buffer)
//!                                │                      │
//! delegate <──on_buffer_available── execute <──read_output
//! ```
//!
//! # Data Flow
//!
//! **Input path:** producer → [`queue::FrameQueue`] → pull callback →
//! pack (CPU conversion or native-handle passthrough) → backend
//!
//! **Output path:** driver `execute` → backend read → [`frame::OutputBuffer`]
//! → [`sink::EncoderDelegate`]
//!
//! **Return path:** backend → release callback → pending-buffer tracker →
//! frame released to the producer
//!
//! The backend is abstracted behind [`backend::EncoderBackend`]; the
//! pipeline itself never touches codec hardware.

#![warn(missing_docs)]
#![warn(clippy::all)]

/// Backend capability traits and the media format builder
pub mod backend;

/// Encoder configuration and derived rate-control parameters
pub mod config;

/// RGB to planar YUV 4:2:0 conversion
pub mod convert;

/// Encoder state machine and the pull/release callback implementations
pub mod encoder;

/// Pipeline error types
pub mod error;

/// Input frame and encoded output buffer types
pub mod frame;

/// Blocking input frame queue with teardown-as-cancellation
pub mod queue;

/// Delegate and report sinks
pub mod sink;

pub use backend::{EncoderBackend, MediaFormat};
pub use config::EncoderConfig;
pub use encoder::{EncoderStats, H264Encoder};
pub use error::{EncoderError, EncoderResult};
pub use frame::{NativeHandle, OutputBuffer, VideoFrame};
pub use sink::{EncoderDelegate, EncoderReport, NullReport};
