//! Transceiver error types

use thiserror::Error;

/// Result type for transceiver operations
pub type TrxResult<T> = Result<T, TrxError>;

/// Errors that can occur while driving a transmit front-end
#[derive(Error, Debug)]
pub enum TrxError {
    /// Transport context could not be opened
    #[error("failed to open context {0}")]
    ContextOpenFailed(String),

    /// Required PHY or streaming sub-device not present in the context
    #[error("device '{0}' not present in context")]
    DeviceMissing(String),

    /// Required channel not present on a device
    #[error("channel '{0}' not present")]
    ChannelMissing(String),

    /// Attribute read failed at the transport layer
    #[error("failed to read attribute '{0}'")]
    AttributeReadFailed(String),

    /// Attribute write failed at the transport layer
    #[error("failed to write attribute '{0}'")]
    AttributeWriteFailed(String),

    /// DMA buffer could not be allocated
    #[error("failed to allocate a {0}-sample buffer")]
    BufferAllocFailed(usize),

    /// Setter argument outside the cached range; no hardware call made
    #[error("value {value} outside [{min}, {max}]")]
    OutOfRange { value: f64, min: f64, max: f64 },

    /// Operation not supported by this device family
    #[error("unsupported operation: {0}")]
    Unsupported(&'static str),

    /// No variant selected; all operations are rejected
    #[error("no transmit device selected")]
    NoDevice,

    /// No signal data loaded for streaming
    #[error("no signal data loaded")]
    NoSignal,
}
