//! Low-level engines
//!
//! Process execution, timing, buffered I/O, and the text formats HMMER
//! reads and writes. Nothing in here knows about search orchestration.

pub mod core;
pub mod storage;

/// Engine operation result type
pub type EngineResult<T> = Result<T, EngineError>;

/// Error types for engine operations
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Parse error at line {line}: {message}")]
    Parse { line: usize, message: String },

    #[error("Unknown format: {0}")]
    UnknownFormat(String),
}

impl EngineError {
    /// Build a parse error for a 1-based line number
    pub fn parse(line: usize, message: impl Into<String>) -> Self {
        EngineError::Parse {
            line,
            message: message.into(),
        }
    }
}
