//! Error types for nilscan-facts

use std::fmt;
use thiserror::Error;

/// Fact error kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Encoding errors (msgpack serialization)
    Encode,
    /// Decoding errors (msgpack deserialization)
    Decode,
    /// Envelope framing errors (magic, version, length)
    Framing,
    /// Payload digest mismatch
    Digest,
    /// I/O errors
    IO,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::Encode => "encode",
            ErrorKind::Decode => "decode",
            ErrorKind::Framing => "framing",
            ErrorKind::Digest => "digest",
            ErrorKind::IO => "io",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Fact error type
#[derive(Debug, Error)]
#[error("[{kind}] {message}")]
pub struct FactError {
    #[source]
    pub source: Option<Box<dyn std::error::Error + Send + Sync>>,
    pub kind: ErrorKind,
    pub message: String,
}

impl FactError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            source: None,
        }
    }

    pub fn with_source(mut self, source: impl std::error::Error + Send + Sync + 'static) -> Self {
        self.source = Some(Box::new(source));
        self
    }

    // Convenience constructors
    pub fn encode(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Encode, message)
    }

    pub fn decode(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Decode, message)
    }

    pub fn framing(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Framing, message)
    }

    pub fn digest(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Digest, message)
    }
}

impl From<std::io::Error> for FactError {
    fn from(err: std::io::Error) -> Self {
        FactError::new(ErrorKind::IO, format!("I/O error: {}", err)).with_source(err)
    }
}

impl From<rmp_serde::encode::Error> for FactError {
    fn from(err: rmp_serde::encode::Error) -> Self {
        FactError::encode(format!("msgpack encode error: {}", err)).with_source(err)
    }
}

impl From<rmp_serde::decode::Error> for FactError {
    fn from(err: rmp_serde::decode::Error) -> Self {
        FactError::decode(format!("msgpack decode error: {}", err)).with_source(err)
    }
}

/// Result type alias
pub type Result<T> = std::result::Result<T, FactError>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error;

    #[test]
    fn test_error_display() {
        let err = FactError::framing("bad magic");
        assert_eq!(format!("{}", err), "[framing] bad magic");
    }

    #[test]
    fn test_with_source() {
        use std::io;

        let io_err = io::Error::new(io::ErrorKind::UnexpectedEof, "truncated");
        let err = FactError::framing("short envelope").with_source(io_err);

        assert_eq!(err.kind, ErrorKind::Framing);
        assert!(err.source().unwrap().to_string().contains("truncated"));
    }

    #[test]
    fn test_error_kind_as_str() {
        assert_eq!(ErrorKind::Encode.as_str(), "encode");
        assert_eq!(ErrorKind::Decode.as_str(), "decode");
        assert_eq!(ErrorKind::Framing.as_str(), "framing");
        assert_eq!(ErrorKind::Digest.as_str(), "digest");
        assert_eq!(ErrorKind::IO.as_str(), "io");
    }
}
