//! Sequence module
//!
//! Alphabets and digitally encoded sequences.

pub mod alphabet;
pub mod digital;

use crate::engines::EngineError;

/// Convenience re-exports
pub use alphabet::Alphabet;
pub use digital::DigitalSequence;

/// Error types for sequence handling
#[derive(Debug, thiserror::Error)]
pub enum SequenceError {
    #[error("Invalid sequence: {0}")]
    InvalidSequence(String),

    #[error("Engine error: {0}")]
    EngineError(#[from] EngineError),
}

/// Result type for sequence operations
pub type SequenceResult<T> = Result<T, SequenceError>;
