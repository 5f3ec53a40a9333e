//! I/O module
//!
//! Reading and writing biological sequence files.

pub mod fasta;

/// Convenience re-exports
pub use fasta::{read_fasta, read_fasta_string, write_fasta_string, FastaRecord};
