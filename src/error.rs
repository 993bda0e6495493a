//! Error types for the attack pipeline.
//!
//! Each variant carries the offending parameter or path plus a
//! human-readable cause; no stack traces are part of the contract.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum AttackError {
    #[error("parameter error ({parameter}): {message}")]
    Parameter { parameter: String, message: String },

    #[error("corpus error: {message}")]
    Corpus { message: String },

    #[error("persistence error for {path}: {message}")]
    Persistence { path: String, message: String },

    #[error("worker failure: {message}")]
    Worker { message: String },
}

impl AttackError {
    pub fn parameter(parameter: impl Into<String>, message: impl Into<String>) -> Self {
        AttackError::Parameter {
            parameter: parameter.into(),
            message: message.into(),
        }
    }

    pub fn corpus(message: impl Into<String>) -> Self {
        AttackError::Corpus {
            message: message.into(),
        }
    }

    pub fn persistence(path: impl Into<String>, message: impl Into<String>) -> Self {
        AttackError::Persistence {
            path: path.into(),
            message: message.into(),
        }
    }

    pub fn worker(message: impl Into<String>) -> Self {
        AttackError::Worker {
            message: message.into(),
        }
    }

    /// Process exit code associated with this error kind, per the CLI's
    /// documented contract (0 success is the absence of an error).
    pub fn exit_code(&self) -> i32 {
        match self {
            AttackError::Parameter { .. } | AttackError::Corpus { .. } => 2,
            AttackError::Persistence { .. } => 3,
            AttackError::Worker { .. } => 4,
        }
    }
}

pub type Result<T> = std::result::Result<T, AttackError>;
