use std::io;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum EncoderError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("Invalid sequence at position {position}: {message}")]
    InvalidSequence { position: usize, message: String },

    #[error("Peptide {index} has length {found}, expected {expected}")]
    LengthMismatch {
        index: usize,
        expected: usize,
        found: usize,
    },

    #[error("Empty peptide set")]
    EmptyPeptideSet,

    #[error("Zero total weight at position {position}")]
    ZeroPositionWeight { position: usize },

    #[error("Unknown encoding scheme: {0}")]
    UnknownScheme(String),

    #[error("Invalid file format: {0}")]
    InvalidFileFormat(String),

    #[error("Data error: {0}")]
    DataError(String),

    #[error("Invalid parameter: {name} = {value}, {message}")]
    InvalidParameter {
        name: String,
        value: String,
        message: String,
    },

    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

/// Type alias for Result with EncoderError
pub type Result<T> = std::result::Result<T, EncoderError>;

impl EncoderError {
    /// Create a new InvalidSequence error
    pub fn invalid_sequence(position: usize, message: impl Into<String>) -> Self {
        EncoderError::InvalidSequence {
            position,
            message: message.into(),
        }
    }

    /// Create a new InvalidFileFormat error
    pub fn invalid_file_format(message: impl Into<String>) -> Self {
        EncoderError::InvalidFileFormat(message.into())
    }

    /// Create a new InvalidParameter error
    pub fn invalid_parameter(
        name: impl Into<String>,
        value: impl ToString,
        message: impl Into<String>,
    ) -> Self {
        EncoderError::InvalidParameter {
            name: name.into(),
            value: value.to_string(),
            message: message.into(),
        }
    }
}
