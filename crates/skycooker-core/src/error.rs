use std::fmt;

use thiserror::Error;

/// Coarse classification of an [`Error`].
///
/// Callers branch on the kind instead of matching every variant: the
/// update cycle retries `Transport`, `Protocol` and `Timeout`, stops on
/// `Auth` and `Disposed`, and never retries `Usage`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Operation on a terminated connection.
    Disposed,
    /// Authentication rejected by the device.
    Auth,
    /// Link missing or write failed.
    Transport,
    /// Malformed or unexpected frame.
    Protocol,
    /// No correlated response within the window.
    Timeout,
    /// Invalid arguments or configuration supplied by the caller.
    Usage,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ErrorKind::Disposed => "disposed",
            ErrorKind::Auth => "auth",
            ErrorKind::Transport => "transport",
            ErrorKind::Protocol => "protocol",
            ErrorKind::Timeout => "timeout",
            ErrorKind::Usage => "usage",
        };
        f.write_str(name)
    }
}

#[derive(Error, Debug)]
pub enum Error {
    // Lifecycle errors
    #[error("Connection is disposed")]
    Disposed,

    #[error("Authentication rejected, enable pairing mode on the cooker")]
    Auth,

    // Transport errors
    #[error("Not connected to device")]
    NotConnected,

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Invalid state transition from {from} to {to}")]
    InvalidStateTransition { from: String, to: String },

    // Protocol errors
    #[error("Invalid frame magic: expected 0x55/0xAA, got 0x{first:02X}/0x{last:02X}")]
    InvalidMagic { first: u8, last: u8 },

    #[error("Frame too short: {len} bytes, need at least {min}")]
    FrameTooShort { len: usize, min: usize },

    #[error("Payload too short: expected {expected} bytes, got {actual}")]
    PayloadTooShort { expected: usize, actual: usize },

    #[error("Unexpected response command: expected 0x{expected:02X}, got 0x{actual:02X}")]
    UnexpectedCommand { expected: u8, actual: u8 },

    #[error("Device rejected command 0x{command:02X}")]
    CommandRejected { command: u8 },

    #[error("Receive timeout after {duration_ms}ms")]
    Timeout { duration_ms: u64 },

    #[error("Command 0x{command:02X} failed after {attempts} attempt(s): {source}")]
    CommandFailed {
        command: u8,
        attempts: u32,
        #[source]
        source: Box<Error>,
    },

    // Usage errors
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Unsupported cooker model: {0}")]
    UnsupportedModel(String),
}

impl Error {
    /// Create a new transport error.
    pub fn transport(message: impl Into<String>) -> Self {
        Self::Transport(message.into())
    }

    /// Create a new timeout error.
    pub fn timeout(duration_ms: u64) -> Self {
        Self::Timeout { duration_ms }
    }

    /// Create a new invalid argument error.
    pub fn invalid_argument(message: impl Into<String>) -> Self {
        Self::InvalidArgument(message.into())
    }

    /// Create a new configuration error.
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    /// Classify this error.
    ///
    /// `CommandFailed` reports the kind of the last attempt's error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::Disposed => ErrorKind::Disposed,
            Error::Auth => ErrorKind::Auth,
            Error::NotConnected | Error::Transport(_) | Error::InvalidStateTransition { .. } => {
                ErrorKind::Transport
            }
            Error::InvalidMagic { .. }
            | Error::FrameTooShort { .. }
            | Error::PayloadTooShort { .. }
            | Error::UnexpectedCommand { .. }
            | Error::CommandRejected { .. } => ErrorKind::Protocol,
            Error::Timeout { .. } => ErrorKind::Timeout,
            Error::CommandFailed { source, .. } => source.kind(),
            Error::InvalidArgument(_) | Error::Config(_) | Error::UnsupportedModel(_) => {
                ErrorKind::Usage
            }
        }
    }

    /// Whether a higher layer may retry the operation that produced this error.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self.kind(),
            ErrorKind::Transport | ErrorKind::Protocol | ErrorKind::Timeout
        )
    }
}

pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(Error::Disposed, ErrorKind::Disposed)]
    #[case(Error::Auth, ErrorKind::Auth)]
    #[case(Error::NotConnected, ErrorKind::Transport)]
    #[case(Error::transport("write failed"), ErrorKind::Transport)]
    #[case(Error::InvalidMagic { first: 0, last: 0 }, ErrorKind::Protocol)]
    #[case(Error::UnexpectedCommand { expected: 6, actual: 1 }, ErrorKind::Protocol)]
    #[case(Error::timeout(1500), ErrorKind::Timeout)]
    #[case(Error::invalid_argument("hours"), ErrorKind::Usage)]
    fn test_error_kind(#[case] error: Error, #[case] expected: ErrorKind) {
        assert_eq!(error.kind(), expected);
    }

    #[test]
    fn test_command_failed_reports_last_kind() {
        let error = Error::CommandFailed {
            command: 0x06,
            attempts: 3,
            source: Box::new(Error::timeout(1500)),
        };
        assert_eq!(error.kind(), ErrorKind::Timeout);
        assert!(error.is_retryable());
        assert_eq!(
            error.to_string(),
            "Command 0x06 failed after 3 attempt(s): Receive timeout after 1500ms"
        );
    }

    #[test]
    fn test_auth_and_disposed_not_retryable() {
        assert!(!Error::Auth.is_retryable());
        assert!(!Error::Disposed.is_retryable());
        assert!(!Error::config("bad key").is_retryable());
    }

    #[test]
    fn test_auth_message_mentions_pairing() {
        assert!(Error::Auth.to_string().contains("pairing mode"));
    }

    #[test]
    fn test_invalid_magic_display() {
        let error = Error::InvalidMagic {
            first: 0x12,
            last: 0xAB,
        };
        assert_eq!(
            error.to_string(),
            "Invalid frame magic: expected 0x55/0xAA, got 0x12/0xAB"
        );
    }
}
