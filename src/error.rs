//! Pipeline error types

use thiserror::Error;

use crate::backend::BackendError;
use crate::convert::ConvertError;

/// Errors surfaced by the encoder pipeline.
#[derive(Debug, Error)]
pub enum EncoderError {
    /// `configure` was called on an already configured encoder.
    #[error("encoder is already configured")]
    AlreadyConfigured,

    /// An operation requiring configuration ran before `configure`.
    #[error("encoder is not configured")]
    NotConfigured,

    /// An operation requiring a running encoder ran while stopped.
    #[error("encoder is not running")]
    NotRunning,

    /// `start` was called on an already running encoder.
    #[error("encoder is already running")]
    AlreadyRunning,

    /// The encoder stopped while the operation was in flight.
    #[error("encoder stopped")]
    Stopped,

    /// The backend reported a failure.
    #[error(transparent)]
    Backend(#[from] BackendError),

    /// Pixel conversion of an input frame failed.
    #[error(transparent)]
    Convert(#[from] ConvertError),
}

/// Convenience alias for pipeline results.
pub type EncoderResult<T> = Result<T, EncoderError>;
