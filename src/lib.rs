//! HMMER 双路径搜索
//!
//! Runs `hmmscan` / `hmmsearch` as external processes and returns their
//! parsed results, optionally repeating each search through an embedded
//! search library for timing and output comparison.
//!
//! ```no_run
//! use hmmer_bridge::{DualPathSearch, HmmerConfig};
//!
//! let search = DualPathSearch::new(HmmerConfig::default())?;
//! let results = search.run_hmmscan("Pfam-A.hmm", ">seq1\nMKVLAAGIVG\n", &["--cut_tc"], None)?;
//! for query in &results {
//!     println!("{}: {} hits", query.id, query.hits.len());
//! }
//! # Ok::<(), hmmer_bridge::HmmerError>(())
//! ```

pub mod engines;
pub mod modules;

pub use engines::core::process::{ExecutionResult, ProcessRunner, RunnerError, SystemProcessRunner};
pub use engines::core::timing::{ExecutionPath, TimingLedger};
pub use engines::storage::{Domain, Hit, HmmFile, HmmProfile, QueryResult, ResultFormat};
pub use modules::hmmer::{
    DualPathSearch, EmbeddedSearchLibrary, HmmerConfig, HmmerError, HmmerResult, HmmerTool,
    LibraryError, SearchRequest, ShadowOutcome,
};
pub use modules::seq::{Alphabet, DigitalSequence};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
