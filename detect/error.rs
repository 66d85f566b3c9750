//! Request-level errors.
//!
//! Every failure while serving one prediction request collapses into a
//! `PredictionError`. The presentation layer dispatches on [`ErrorKind`] to pick
//! a user message; no kind is ever fatal to the process.

use crate::config::ConfigError;
use crate::data::DataError;
use crate::input::InputError;
use crate::model::ModelError;
use thiserror::Error;

/// The closed set of failure categories a caller has to handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// The reference dataset could not be read with any supported delimiter.
    DataUnavailable,
    /// Wrong arity, a non-numeric token or an out-of-range value.
    InvalidInput,
    /// The model rejected the vector it was given.
    Inference,
    /// Anything else, such as an unreadable model artifact or configuration file.
    Other,
}

impl ErrorKind {
    /// Short heading shown in front of the detailed message.
    pub fn headline(self) -> &'static str {
        match self {
            ErrorKind::DataUnavailable => "Reference data unavailable",
            ErrorKind::InvalidInput => "Invalid input",
            ErrorKind::Inference => "Prediction failed",
            ErrorKind::Other => "Unexpected error",
        }
    }
}

#[derive(Error, Debug)]
pub enum PredictionError {
    #[error(transparent)]
    DataUnavailable(#[from] DataError),
    #[error(transparent)]
    InvalidInput(#[from] InputError),
    #[error(transparent)]
    Inference(#[from] ModelError),
    #[error("Could not load model artifact '{path}': {source}")]
    ModelUnavailable {
        path: String,
        #[source]
        source: ModelError,
    },
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("{0}")]
    Other(String),
}

impl PredictionError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            PredictionError::DataUnavailable(_) => ErrorKind::DataUnavailable,
            PredictionError::InvalidInput(_) => ErrorKind::InvalidInput,
            PredictionError::Inference(_) => ErrorKind::Inference,
            PredictionError::ModelUnavailable { .. }
            | PredictionError::Config(_)
            | PredictionError::Other(_) => ErrorKind::Other,
        }
    }

    /// `"<headline>: <details>"`, ready to show to a user.
    pub fn user_message(&self) -> String {
        format!("{}: {}", self.kind().headline(), self)
    }
}
