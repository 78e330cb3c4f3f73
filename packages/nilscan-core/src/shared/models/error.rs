//! Error types for the nilscan-core crate
//!
//! One unified error type across all pipeline stages. The orchestrator's
//! contract is that analysis never crashes the driver: internal failures are
//! converted to errors here and then degraded to diagnostics at the top.

use std::fmt;

/// Error kind categorization
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// CFG preprocessing errors
    Preprocess,
    /// Contract inference errors
    ContractInference,
    /// Backpropagation errors
    Backprop,
    /// Inference engine errors
    Inference,
    /// Diagnostic construction errors
    Diagnostics,
    /// Fact import/export errors
    Facts,
    /// Configuration errors
    Config,
    /// Per-function timeout or cancellation
    Timeout,
    /// Caught panics and other bugs
    Internal,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::Preprocess => "preprocess",
            ErrorKind::ContractInference => "contract_inference",
            ErrorKind::Backprop => "backprop",
            ErrorKind::Inference => "inference",
            ErrorKind::Diagnostics => "diagnostics",
            ErrorKind::Facts => "facts",
            ErrorKind::Config => "config",
            ErrorKind::Timeout => "timeout",
            ErrorKind::Internal => "internal",
        }
    }
}

/// Unified error type
#[derive(Debug)]
pub struct NilscanError {
    pub kind: ErrorKind,
    pub message: String,
    pub file: Option<String>,
    pub line: Option<u32>,
    /// Index of the function the error arose in, when per-function
    pub func_index: Option<u32>,
    pub source: Option<Box<dyn std::error::Error + Send + Sync>>,
}

impl NilscanError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            file: None,
            line: None,
            func_index: None,
            source: None,
        }
    }

    pub fn with_file(mut self, file: impl Into<String>) -> Self {
        self.file = Some(file.into());
        self
    }

    pub fn with_line(mut self, line: u32) -> Self {
        self.line = Some(line);
        self
    }

    pub fn with_func_index(mut self, index: u32) -> Self {
        self.func_index = Some(index);
        self
    }

    pub fn with_source(mut self, source: impl std::error::Error + Send + Sync + 'static) -> Self {
        self.source = Some(Box::new(source));
        self
    }

    // Convenience constructors
    pub fn preprocess(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Preprocess, message)
    }

    pub fn contract_inference(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::ContractInference, message)
    }

    pub fn backprop(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Backprop, message)
    }

    pub fn inference(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Inference, message)
    }

    pub fn facts(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Facts, message)
    }

    pub fn config(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Config, message)
    }

    pub fn timeout(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Timeout, message)
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Internal, message)
    }
}

impl fmt::Display for NilscanError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.kind.as_str(), self.message)?;
        if let Some(ref file) = self.file {
            write!(f, " in {}", file)?;
            if let Some(line) = self.line {
                write!(f, ":{}", line)?;
            }
        }
        if let Some(idx) = self.func_index {
            write!(f, " (function #{})", idx)?;
        }
        Ok(())
    }
}

impl std::error::Error for NilscanError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.source
            .as_ref()
            .map(|e| e.as_ref() as &(dyn std::error::Error + 'static))
    }
}

impl From<nilscan_facts::FactError> for NilscanError {
    fn from(err: nilscan_facts::FactError) -> Self {
        NilscanError::facts(format!("fact codec error: {}", err)).with_source(err)
    }
}

impl From<serde_json::Error> for NilscanError {
    fn from(err: serde_json::Error) -> Self {
        NilscanError::facts(format!("JSON error: {}", err)).with_source(err)
    }
}

/// Result type alias
pub type Result<T> = std::result::Result<T, NilscanError>;
