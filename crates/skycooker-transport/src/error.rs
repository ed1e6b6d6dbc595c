//! Error types for transport operations.

/// Result type alias for transport operations.
pub type Result<T> = std::result::Result<T, TransportError>;

/// Errors raised by a [`Transport`](crate::Transport) implementation.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// No open link to the device.
    #[error("Device disconnected: {device}")]
    Disconnected { device: String },

    /// The link could not be established.
    #[error("Connect to {device} failed: {message}")]
    ConnectFailed { device: String, message: String },

    /// A characteristic write was not acknowledged.
    #[error("Write failed: {message}")]
    WriteFailed { message: String },

    /// The operation did not complete in time.
    #[error("Operation timeout after {duration_ms}ms")]
    Timeout { duration_ms: u64 },

    /// Generic I/O error from a backend.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl TransportError {
    /// Create a new disconnected error.
    pub fn disconnected(device: impl Into<String>) -> Self {
        Self::Disconnected {
            device: device.into(),
        }
    }

    /// Create a new connect failure.
    pub fn connect_failed(device: impl Into<String>, message: impl Into<String>) -> Self {
        Self::ConnectFailed {
            device: device.into(),
            message: message.into(),
        }
    }

    /// Create a new write failure.
    pub fn write_failed(message: impl Into<String>) -> Self {
        Self::WriteFailed {
            message: message.into(),
        }
    }

    /// Create a new timeout error.
    pub fn timeout(duration_ms: u64) -> Self {
        Self::Timeout { duration_ms }
    }
}

impl From<TransportError> for skycooker_core::Error {
    fn from(error: TransportError) -> Self {
        match error {
            TransportError::Disconnected { .. } => skycooker_core::Error::NotConnected,
            TransportError::Timeout { duration_ms } => skycooker_core::Error::timeout(duration_ms),
            other => skycooker_core::Error::transport(other.to_string()),
        }
    }
}
