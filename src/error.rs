//! Error types for TP operations.

use thiserror::Error;

/// Errors that can occur during TP segmentation and reassembly.
///
/// Two classes share this enum. Usage errors (invalid id, busy session,
/// short buffers, bad configuration) are rejected at the call boundary and
/// leave no session state modified. Protocol errors (sequencing,
/// consistency, buffer or collaborator failures) abort exactly the one
/// affected session; the engine stays usable for every other id.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TpError {
    /// The SDU id is outside the configured id range.
    #[error("Invalid SDU id: {0}")]
    InvalidSduId(u16),

    /// A transmit was requested while the session is not idle.
    #[error("Transmit session busy for SDU id {0}")]
    Busy(u16),

    /// The operation is not legal in the session's current state.
    #[error("Session for SDU id {0} is not ready for this operation")]
    NotReady(u16),

    /// SDU shorter than the mandatory header + metadata prefix.
    #[error("SDU too short: expected at least {expected} bytes, got {actual}")]
    SduTooShort { expected: usize, actual: usize },

    /// Frame shorter than the mandatory header + metadata length.
    #[error("Frame too short: expected at least {expected} bytes, got {actual}")]
    FrameTooShort { expected: usize, actual: usize },

    /// A confirmation arrived for a session that is not awaiting one.
    #[error("Unexpected transmit confirmation for SDU id {0}")]
    UnexpectedConfirmation(u16),

    /// Invalid static configuration.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// The lower transport rejected a frame.
    #[error("Frame transport rejected the frame for SDU id {0}")]
    TransportRejected(u16),

    /// The upper producer rejected a data pull.
    #[error("Producer rejected the data pull for SDU id {0}")]
    ProducerRejected(u16),

    /// The producer-reported available length disagrees with the
    /// engine's remaining byte count.
    #[error(
        "Available data mismatch: engine expects {expected} bytes remaining, producer reports {reported}"
    )]
    AvailableMismatch { expected: usize, reported: usize },

    /// The upper consumer rejected a reception or a data push.
    #[error("Consumer rejected reception for SDU id {0}")]
    ConsumerRejected(u16),

    /// The consumer accepted reception but granted too little buffer.
    #[error("Insufficient receive buffer: need {needed} bytes, granted {granted}")]
    InsufficientBuffer { needed: usize, granted: usize },

    /// Segment offset does not match the bytes reassembled so far.
    #[error("Segment out of sequence: expected byte offset {expected}, got {actual}")]
    OutOfSequence { expected: usize, actual: usize },

    /// A segment's short header differs from the first segment's.
    #[error("Header mismatch between segments of one reassembly")]
    HeaderMismatch,

    /// A segment's metadata differs from the first segment's.
    #[error("Metadata mismatch between segments of one reassembly")]
    MetadataMismatch,

    /// Segment payload exceeds the consumer's remaining buffer.
    #[error("Receive buffer exhausted: segment of {needed} bytes, {available} available")]
    BufferExhausted { needed: usize, available: usize },

    /// A non-final segment payload is not a multiple of 16 bytes.
    #[error("Misaligned segment payload: {len} bytes is not a multiple of 16")]
    Misaligned { len: usize },

    /// A non-segmented frame arrived while a reassembly was running.
    #[error("Unsegmented frame while reassembly in progress")]
    UnexpectedFrame,

    /// Decoding a segment frame failed.
    #[error("Invalid segment: {0}")]
    InvalidSegment(String),
}

/// Result type alias for TP operations.
pub type Result<T> = std::result::Result<T, TpError>;

impl TpError {
    /// Create a new invalid configuration error.
    pub fn invalid_config(msg: impl Into<String>) -> Self {
        Self::InvalidConfig(msg.into())
    }

    /// Check if this error belongs to the usage class (rejected at the
    /// call boundary without touching session state).
    pub fn is_usage(&self) -> bool {
        matches!(
            self,
            Self::InvalidSduId(_)
                | Self::Busy(_)
                | Self::NotReady(_)
                | Self::SduTooShort { .. }
                | Self::FrameTooShort { .. }
                | Self::UnexpectedConfirmation(_)
                | Self::InvalidConfig(_)
        )
    }
}
