use thiserror::Error;

use crate::graph::QuestionId;

/// Application-level errors
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error("Question graph error: {0}")]
    Graph(#[from] GraphError),

    #[error("Snapshot sink error: {0}")]
    Sink(#[from] SinkError),

    #[error("Protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Internal error: {message}")]
    Internal { message: String },
}

/// Question graph construction errors
#[derive(Debug, Error, PartialEq, Eq)]
pub enum GraphError {
    #[error("Graph '{name}' has no questions")]
    Empty { name: String },

    #[error("Question id must be positive")]
    InvalidId,

    #[error("Duplicate question id: {id}")]
    DuplicateId { id: QuestionId },

    #[error("Question {id} depends on unknown question {depends_on}")]
    UnknownDependency {
        id: QuestionId,
        depends_on: QuestionId,
    },

    #[error("Question {id} depends on question {depends_on}, which is declared after it")]
    ForwardDependency {
        id: QuestionId,
        depends_on: QuestionId,
    },

    #[error("Question {id} references the score field but the graph has no score question")]
    MissingScoreQuestion { id: QuestionId },

    #[error("Score question {id} must be a scale question")]
    ScoreNotScale { id: QuestionId },

    #[error("Scale question {id} has min {min} greater than max {max}")]
    InvalidScale { id: QuestionId, min: i64, max: i64 },

    #[error("Choice question {id} has no options")]
    NoOptions { id: QuestionId },

    #[error("Option '{option}' of question {id} contains the list delimiter")]
    DelimiterInOption { id: QuestionId, option: String },
}

/// Snapshot sink transport errors
#[derive(Debug, Error)]
pub enum SinkError {
    #[error("Sink rejected snapshot: {status} - {message}")]
    Api { status: u16, message: String },

    #[error("Sink request timeout after {timeout_ms}ms")]
    Timeout { timeout_ms: u64 },

    #[error("Sink worker stopped")]
    Closed,

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
}

/// Malformed resume-link input
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ResumeError {
    #[error("Unknown question: {raw}")]
    UnknownQuestion { raw: String },

    #[error("Value for question {id} is not numeric: {raw}")]
    NotNumeric { id: QuestionId, raw: String },

    #[error("Value {value} for question {id} is outside {min}..={max}")]
    OutOfRange {
        id: QuestionId,
        value: i64,
        min: i64,
        max: i64,
    },

    #[error("'{raw}' is not an option of question {id}")]
    UnknownOption { id: QuestionId, raw: String },

    #[error("Question {id} cannot be prefilled")]
    NotPrefillable { id: QuestionId },
}

/// Driver protocol errors
#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("Unknown method: {method}")]
    UnknownMethod { method: String },

    #[error("Invalid parameters for {method}: {message}")]
    InvalidParameters { method: String, message: String },

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Result type alias for application errors
pub type AppResult<T> = Result<T, AppError>;

/// Result type alias for graph construction
pub type GraphResult<T> = Result<T, GraphError>;

/// Result type alias for sink operations
pub type SinkResult<T> = Result<T, SinkError>;

/// Result type alias for resume-link parsing
pub type ResumeResult<T> = Result<T, ResumeError>;

/// Result type alias for driver requests
pub type ProtocolResult<T> = Result<T, ProtocolError>;
