//! Global error types for the PoolWatch client.
//!
//! All error categories across the workspace are unified into a single
//! `PwError` enum with conversions from underlying library errors.

use thiserror::Error;

/// Convenience type alias for Results using PwError.
pub type PwResult<T> = Result<T, PwError>;

/// Unified error type covering all error categories in PoolWatch.
#[derive(Error, Debug)]
pub enum PwError {
    // -- Configuration errors --
    /// Failed to load or parse application configuration.
    #[error("configuration error: {0}")]
    Config(String),

    /// A required configuration value is missing.
    #[error("missing configuration: {0}")]
    MissingConfig(String),

    // -- Connection errors --
    /// Websocket or transport-level failure.
    #[error("connection error: {0}")]
    Connection(String),

    /// A send was attempted while no connection is open.
    #[error("not connected")]
    NotConnected,

    /// An operation did not complete in time.
    #[error("timeout after {0}ms")]
    Timeout(u64),

    /// The client has been shut down and accepts no further requests.
    #[error("client closed")]
    ClientClosed,

    // -- File/IO errors --
    /// File system operation failed.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization/deserialization error.
    #[error("serialization error: {0}")]
    Serialization(String),

    // -- Generic --
    /// An unexpected internal error.
    #[error("internal error: {0}")]
    Internal(String),

    /// Wrapping anyhow errors for interop.
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl From<serde_json::Error> for PwError {
    fn from(e: serde_json::Error) -> Self {
        PwError::Serialization(e.to_string())
    }
}

impl From<toml::de::Error> for PwError {
    fn from(e: toml::de::Error) -> Self {
        PwError::Config(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pw_error_display() {
        let err = PwError::Config("bad value".to_string());
        assert_eq!(err.to_string(), "configuration error: bad value");
    }

    #[test]
    fn test_not_connected_display() {
        assert_eq!(PwError::NotConnected.to_string(), "not connected");
        assert_eq!(PwError::Timeout(1500).to_string(), "timeout after 1500ms");
    }

    #[test]
    fn test_serde_json_conversion() {
        let parse_err = serde_json::from_str::<serde_json::Value>("{{").unwrap_err();
        let err: PwError = parse_err.into();
        assert!(matches!(err, PwError::Serialization(_)));
    }

    #[test]
    fn test_io_conversion() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "gone");
        let err: PwError = io_err.into();
        assert!(err.to_string().starts_with("io error:"));
    }
}
