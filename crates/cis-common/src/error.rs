//! Error types shared by every CIS crate.

use thiserror::Error;

/// Result type alias using CisError.
pub type Result<T> = std::result::Result<T, CisError>;

/// Coarse classification of a [`CisError`], used by frontends to pick a
/// message style and an exit code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    InvalidInput,
    InvalidOptions,
    CoordinateNotFound,
    EmptyResult,
    Io,
}

/// Primary error type for data-model, collocation and aggregation operations.
#[derive(Debug, Error)]
pub enum CisError {
    // === Input Errors ===
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Variable '{variable}' not found in {file}")]
    VariableNotFound { variable: String, file: String },

    #[error("Invalid data shape: {0}")]
    ShapeMismatch(String),

    #[error("Invalid time specification: {0}")]
    InvalidTime(String),

    // === Option Errors ===
    #[error("Invalid options: {0}")]
    InvalidOptions(String),

    #[error("Unknown {kind} '{name}'; available: {available}")]
    UnknownPlugin {
        kind: &'static str,
        name: String,
        available: String,
    },

    #[error("Missing required parameter '{param}' for {context}")]
    MissingParameter { param: String, context: String },

    #[error("Invalid value for parameter '{param}': {message}")]
    InvalidParameter { param: String, message: String },

    // === Coordinate Errors ===
    #[error("Coordinate not found: {0}")]
    CoordinateNotFound(String),

    // === Result Errors ===
    #[error("No valid output points: {0}")]
    EmptyResult(String),

    // === Infrastructure Errors ===
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl CisError {
    /// Create a MissingParameter error.
    pub fn missing_parameter(param: impl Into<String>, context: impl Into<String>) -> Self {
        Self::MissingParameter {
            param: param.into(),
            context: context.into(),
        }
    }

    /// Create an InvalidParameter error.
    pub fn invalid_parameter(param: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidParameter {
            param: param.into(),
            message: message.into(),
        }
    }

    /// Create an InvalidOptions error.
    pub fn invalid_options(msg: impl Into<String>) -> Self {
        Self::InvalidOptions(msg.into())
    }

    /// Create a CoordinateNotFound error.
    pub fn coordinate_not_found(msg: impl Into<String>) -> Self {
        Self::CoordinateNotFound(msg.into())
    }

    /// Create a ShapeMismatch error.
    pub fn shape_mismatch(msg: impl Into<String>) -> Self {
        Self::ShapeMismatch(msg.into())
    }

    /// Classify this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            CisError::InvalidInput(_)
            | CisError::VariableNotFound { .. }
            | CisError::ShapeMismatch(_)
            | CisError::InvalidTime(_) => ErrorKind::InvalidInput,

            CisError::InvalidOptions(_)
            | CisError::UnknownPlugin { .. }
            | CisError::MissingParameter { .. }
            | CisError::InvalidParameter { .. } => ErrorKind::InvalidOptions,

            CisError::CoordinateNotFound(_) => ErrorKind::CoordinateNotFound,
            CisError::EmptyResult(_) => ErrorKind::EmptyResult,
            CisError::Io(_) => ErrorKind::Io,
        }
    }

    /// Get the process exit code for this error.
    pub fn exit_code(&self) -> i32 {
        match self.kind() {
            ErrorKind::InvalidInput => 2,
            ErrorKind::InvalidOptions => 3,
            ErrorKind::CoordinateNotFound => 4,
            ErrorKind::EmptyResult => 5,
            ErrorKind::Io => 6,
        }
    }
}

impl From<serde_json::Error> for CisError {
    fn from(err: serde_json::Error) -> Self {
        CisError::InvalidInput(format!("JSON error: {}", err))
    }
}

impl From<ndarray::ShapeError> for CisError {
    fn from(err: ndarray::ShapeError) -> Self {
        CisError::ShapeMismatch(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kinds_and_exit_codes() {
        let err = CisError::UnknownPlugin {
            kind: "kernel",
            name: "median".to_string(),
            available: "mean, moments".to_string(),
        };
        assert_eq!(err.kind(), ErrorKind::InvalidOptions);
        assert_eq!(err.exit_code(), 3);

        let err = CisError::coordinate_not_found("axis T in 'aod550'");
        assert_eq!(err.kind(), ErrorKind::CoordinateNotFound);
        assert_eq!(err.exit_code(), 4);

        let err = CisError::EmptyResult("subset of 'aod550'".to_string());
        assert_eq!(err.exit_code(), 5);
    }

    #[test]
    fn test_message_names_variable_and_file() {
        let err = CisError::VariableNotFound {
            variable: "AOD550".to_string(),
            file: "aeronet.json".to_string(),
        };
        let msg = err.to_string();
        assert!(msg.contains("AOD550"));
        assert!(msg.contains("aeronet.json"));
    }

    #[test]
    fn test_io_error_conversion() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "missing.json");
        let err: CisError = io.into();
        assert_eq!(err.kind(), ErrorKind::Io);
    }
}
