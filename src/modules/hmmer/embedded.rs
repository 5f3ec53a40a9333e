//! Embedded-library shadow path
//!
//! Repeats a search through an in-process HMMER library so its speed and
//! output can be compared with the external tools. The query is written
//! to its own artifact, profiles and sequences go through the digital
//! readers, and the library's hits are written as a domain table next to
//! it. Each run works in its own directory, removed when the run ends
//! unless `shadow.keep_artifacts` is set. Nothing here reaches the caller:
//! every failure, panics included, is logged and reported as a
//! [`ShadowOutcome::Failed`].

use std::any::Any;
use std::fs;
use std::io;
use std::panic::{self, AssertUnwindSafe};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use tempfile::TempDir;

use crate::engines::core::io::{write_text_file, FastWriter};
use crate::engines::core::timing::{ExecutionPath, Stopwatch, TimingLedger};
use crate::engines::storage::{DomainTableWriter, HmmFile, HmmProfile, QueryResult};
use crate::engines::EngineError;
use crate::modules::hmmer::config::HmmerConfig;
use crate::modules::hmmer::{HmmerTool, SearchRequest};
use crate::modules::io::read_fasta;
use crate::modules::seq::{Alphabet, DigitalSequence, SequenceError};

/// Query artifact inside a run directory
const QUERY_ARTIFACT_NAME: &str = "query.fa";
/// Domain table artifact inside a run directory
const OUTPUT_ARTIFACT_NAME: &str = "result.domtab";

/// Failure reported by an embedded search library
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{0}")]
pub struct LibraryError(pub String);

/// An in-process implementation of the HMMER searches
pub trait EmbeddedSearchLibrary: Send + Sync {
    /// Name used in log messages
    fn name(&self) -> &str;

    /// Run `tool`'s search of `sequences` against `profiles` on `cpus`
    /// worker threads
    fn search(
        &self,
        tool: HmmerTool,
        profiles: &[HmmProfile],
        sequences: &[DigitalSequence],
        cpus: usize,
    ) -> Result<Vec<QueryResult>, LibraryError>;
}

/// Why a shadow run did not complete
#[derive(Debug, thiserror::Error)]
pub enum ShadowError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("cannot read models: {0}")]
    Model(#[source] EngineError),

    #[error("cannot read query: {0}")]
    Sequence(#[from] SequenceError),

    #[error("model {model} uses the {alphabet} alphabet, queries are amino")]
    AlphabetMismatch { model: String, alphabet: String },

    #[error("{library} failed: {source}")]
    Library {
        library: String,
        #[source]
        source: LibraryError,
    },

    #[error("library returned no results")]
    NoHits,

    #[error("library panicked: {0}")]
    Panicked(String),
}

/// Files a kept shadow run left on disk
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShadowArtifacts {
    pub query: PathBuf,
    pub output: PathBuf,
}

/// Summary of a completed shadow run
#[derive(Debug, Clone, PartialEq)]
pub struct ShadowReport {
    /// Present only when `shadow.keep_artifacts` is set
    pub artifacts: Option<ShadowArtifacts>,
    /// Number of result sets the library returned
    pub queries: usize,
    /// Domain table rows written
    pub rows: usize,
    pub elapsed: Duration,
}

/// Result of a shadow run; informational only
#[derive(Debug)]
pub enum ShadowOutcome {
    Completed(ShadowReport),
    Failed(ShadowError),
}

impl ShadowOutcome {
    pub fn is_completed(&self) -> bool {
        matches!(self, ShadowOutcome::Completed(_))
    }
}

/// Where artifacts go
enum ArtifactDir {
    Configured(PathBuf),
    Private(TempDir),
}

impl ArtifactDir {
    fn path(&self) -> &Path {
        match self {
            ArtifactDir::Configured(path) => path,
            ArtifactDir::Private(dir) => dir.path(),
        }
    }
}

/// Runs shadow searches through an [`EmbeddedSearchLibrary`]
pub struct EmbeddedExecutor {
    config: Arc<HmmerConfig>,
    library: Arc<dyn EmbeddedSearchLibrary>,
    timings: Arc<TimingLedger>,
    artifacts: ArtifactDir,
}

impl EmbeddedExecutor {
    /// Create an executor writing to `shadow.output_dir`, or to a private
    /// temporary directory removed when the executor is dropped
    pub fn new(
        config: Arc<HmmerConfig>,
        library: Arc<dyn EmbeddedSearchLibrary>,
        timings: Arc<TimingLedger>,
    ) -> io::Result<Self> {
        let artifacts = match &config.shadow.output_dir {
            Some(dir) => {
                fs::create_dir_all(dir)?;
                ArtifactDir::Configured(dir.clone())
            }
            None => ArtifactDir::Private(
                tempfile::Builder::new()
                    .prefix("hmmer-shadow-")
                    .tempdir()?,
            ),
        };

        Ok(Self {
            config,
            library,
            timings,
            artifacts,
        })
    }

    /// Directory shadow artifacts are written to
    pub fn artifact_dir(&self) -> &Path {
        self.artifacts.path()
    }

    /// Repeat `request` through the library. Never fails.
    pub fn run_shadow(&self, tool: HmmerTool, request: &SearchRequest) -> ShadowOutcome {
        let stopwatch = Stopwatch::start();
        let attempt = panic::catch_unwind(AssertUnwindSafe(|| self.search(tool, request)));
        let elapsed = stopwatch.stop(&self.timings, tool.name(), ExecutionPath::Embedded);

        let result = attempt.unwrap_or_else(|payload| {
            Err(ShadowError::Panicked(panic_message(payload.as_ref())))
        });
        match result {
            Ok(mut report) => {
                report.elapsed = elapsed;
                log::info!(
                    "{} shadow run via {}: {} rows",
                    tool,
                    self.library.name(),
                    report.rows
                );
                if let Some(artifacts) = &report.artifacts {
                    log::debug!("kept shadow output {}", artifacts.output.display());
                }
                ShadowOutcome::Completed(report)
            }
            Err(e) => {
                log::warn!("{} shadow run via {} failed: {}", tool, self.library.name(), e);
                ShadowOutcome::Failed(e)
            }
        }
    }

    fn search(
        &self,
        tool: HmmerTool,
        request: &SearchRequest,
    ) -> Result<ShadowReport, ShadowError> {
        // Removed on drop unless kept below
        let run_dir = tempfile::Builder::new()
            .prefix(&format!("{}_shadow_", tool.name()))
            .tempdir_in(self.artifacts.path())?;
        let query_artifact = run_dir.path().join(QUERY_ARTIFACT_NAME);
        let output_artifact = run_dir.path().join(OUTPUT_ARTIFACT_NAME);

        // The library reads the query back from disk, like any other file
        write_text_file(&query_artifact, request.query())?;

        let profiles = HmmFile::open(request.model_path())
            .map_err(ShadowError::Model)?
            .into_profiles();
        if let Some(profile) = profiles
            .iter()
            .find(|p| Alphabet::from_hmm_tag(&p.alphabet) != Some(Alphabet::Amino))
        {
            return Err(ShadowError::AlphabetMismatch {
                model: profile.name.clone(),
                alphabet: profile.alphabet.clone(),
            });
        }

        let records = read_fasta(&query_artifact)?;
        let sequences = DigitalSequence::from_fasta(&records, Alphabet::Amino)?;

        let results = self
            .library
            .search(tool, &profiles, &sequences, self.config.shadow_cpus())
            .map_err(|source| ShadowError::Library {
                library: self.library.name().to_string(),
                source,
            })?;
        if results.is_empty() {
            return Err(ShadowError::NoHits);
        }

        let mut writer = FastWriter::new(&output_artifact, None)?;
        let rows = DomainTableWriter::new().write_all(&mut writer, &results)?;
        writer.finish()?;

        let artifacts = if self.config.shadow.keep_artifacts {
            let kept = run_dir.into_path();
            Some(ShadowArtifacts {
                query: kept.join(QUERY_ARTIFACT_NAME),
                output: kept.join(OUTPUT_ARTIFACT_NAME),
            })
        } else {
            None
        };

        Ok(ShadowReport {
            artifacts,
            queries: results.len(),
            rows,
            elapsed: Duration::ZERO,
        })
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "non-string panic payload".to_string()
    }
}
