//! HMMER search layer
//!
//! Runs `hmmscan` / `hmmsearch` two ways against the same inputs: as an
//! external process (the result callers get) and through an embedded
//! search library (a shadow run kept only for timing and output
//! comparison). [`DualPathSearch`] composes the two.

pub mod aggregate;
pub mod capability;
pub mod classify;
pub mod command;
pub mod config;
pub mod embedded;
pub mod external;
pub mod orchestrator;

use std::fmt;
use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::engines::core::process::RunnerError;
use crate::engines::storage::ResultFormat;
use crate::engines::EngineError;

/// Convenience re-exports
pub use aggregate::ResultAggregator;
pub use capability::{CapabilityCache, CapabilityProbe};
pub use classify::{classify, classify_output};
pub use command::{CommandBuilder, QueryInput};
pub use config::HmmerConfig;
pub use embedded::{
    EmbeddedExecutor, EmbeddedSearchLibrary, LibraryError, ShadowArtifacts, ShadowError,
    ShadowOutcome, ShadowReport,
};
pub use external::{ExecutionStage, RawOutput, SubprocessExecutor};
pub use orchestrator::{DualPathSearch, SearchOutcome};

/// Longest query prefix quoted in error messages
const QUERY_CONTEXT_CHARS: usize = 100;

/// The supported HMMER programs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum HmmerTool {
    /// Sequences against a profile database
    Hmmscan,
    /// A profile against a sequence database
    Hmmsearch,
}

/// Where a tool's parseable output ends up
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputSource {
    /// The plain-text report on stdout
    Stdout,
    /// A `--domtblout` file in the working directory
    DomainTable,
}

impl HmmerTool {
    pub fn name(&self) -> &'static str {
        match self {
            HmmerTool::Hmmscan => "hmmscan",
            HmmerTool::Hmmsearch => "hmmsearch",
        }
    }

    /// Prefix every genuine `-h` output starts with
    pub fn banner(&self) -> &'static str {
        match self {
            HmmerTool::Hmmscan => "# hmmscan",
            HmmerTool::Hmmsearch => "# hmmsearch",
        }
    }

    pub fn output_source(&self) -> OutputSource {
        match self {
            HmmerTool::Hmmscan => OutputSource::Stdout,
            HmmerTool::Hmmsearch => OutputSource::DomainTable,
        }
    }

    /// Grammar of the tool's parseable output
    pub fn result_format(&self) -> ResultFormat {
        match self {
            HmmerTool::Hmmscan => ResultFormat::Hmmer3Text,
            HmmerTool::Hmmsearch => ResultFormat::HmmsearchDomtab,
        }
    }
}

impl fmt::Display for HmmerTool {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Error types for HMMER searches
#[derive(Debug, thiserror::Error)]
pub enum HmmerError {
    #[error("cannot run {tool} on an empty sequence")]
    EmptyInput { tool: HmmerTool },

    #[error("unexpected output from {tool}: {}, check path ({reason})", .path.display())]
    ToolInvocation {
        tool: HmmerTool,
        path: PathBuf,
        reason: String,
    },

    #[error("{tool} returned {exit_code}: '{diagnostic}' while scanning {context:?}...")]
    ExternalTool {
        tool: HmmerTool,
        exit_code: i32,
        diagnostic: String,
        context: String,
    },

    #[error("failed to parse {what}: {detail}")]
    Parse { what: String, detail: String },

    #[error("could not run {tool}: {source}")]
    Launch {
        tool: HmmerTool,
        #[source]
        source: RunnerError,
    },

    #[error("{tool} did not finish within {timeout:?}")]
    ProcessTimeout { tool: HmmerTool, timeout: Duration },

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

impl HmmerError {
    /// Wrap a process runner failure for `tool`
    pub(crate) fn from_runner(tool: HmmerTool, err: RunnerError) -> Self {
        match err {
            RunnerError::TimedOut { timeout, .. } => HmmerError::ProcessTimeout { tool, timeout },
            other => HmmerError::Launch { tool, source: other },
        }
    }

    /// Wrap an engine failure while reading `what`
    pub(crate) fn from_engine(what: &str, err: EngineError) -> Self {
        match err {
            EngineError::Io(e) => HmmerError::Io(e),
            other => HmmerError::Parse {
                what: what.to_string(),
                detail: other.to_string(),
            },
        }
    }
}

/// Result type for HMMER searches
pub type HmmerResult<T> = Result<T, HmmerError>;

/// One search to run. Built once, then only read.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchRequest {
    model_path: PathBuf,
    query: String,
    extra_args: Vec<String>,
    results_file: Option<PathBuf>,
    use_temporary_file: bool,
}

impl SearchRequest {
    /// Search `query` (FASTA text) against the profile file at `model_path`
    pub fn new(model_path: impl Into<PathBuf>, query: impl Into<String>) -> Self {
        Self {
            model_path: model_path.into(),
            query: query.into(),
            extra_args: Vec::new(),
            results_file: None,
            use_temporary_file: false,
        }
    }

    /// Arguments appended verbatim after the default flags
    pub fn with_extra_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.extra_args.extend(args.into_iter().map(Into::into));
        self
    }

    /// Keep a copy of the raw tool output at `path`
    pub fn with_results_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.results_file = Some(path.into());
        self
    }

    /// Write the query to a file instead of piping it on stdin
    pub fn with_temporary_file(mut self, enabled: bool) -> Self {
        self.use_temporary_file = enabled;
        self
    }

    pub fn model_path(&self) -> &Path {
        &self.model_path
    }

    pub fn query(&self) -> &str {
        &self.query
    }

    pub fn extra_args(&self) -> &[String] {
        &self.extra_args
    }

    pub fn results_file(&self) -> Option<&Path> {
        self.results_file.as_deref()
    }

    pub fn use_temporary_file(&self) -> bool {
        self.use_temporary_file
    }

    /// Start of the query, for error messages
    pub fn query_context(&self) -> String {
        self.query.chars().take(QUERY_CONTEXT_CHARS).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_builder() {
        let request = SearchRequest::new("models/test.hmm", ">seq1\nMKV\n")
            .with_extra_args(["--cut_tc"])
            .with_extra_args(vec!["-E".to_string(), "0.01".to_string()])
            .with_results_file("out.txt")
            .with_temporary_file(true);

        assert_eq!(request.model_path(), Path::new("models/test.hmm"));
        assert_eq!(request.extra_args(), ["--cut_tc", "-E", "0.01"]);
        assert_eq!(request.results_file(), Some(Path::new("out.txt")));
        assert!(request.use_temporary_file());
    }

    #[test]
    fn test_query_context_is_truncated_on_char_boundaries() {
        let long = format!(">seq1\n{}", "é".repeat(200));
        let request = SearchRequest::new("m.hmm", long);
        let context = request.query_context();

        assert_eq!(context.chars().count(), 100);
        assert!(context.starts_with(">seq1\n"));
    }

    #[test]
    fn test_external_tool_message_quotes_diagnostic() {
        let err = HmmerError::ExternalTool {
            tool: HmmerTool::Hmmscan,
            exit_code: 1,
            diagnostic: "Error: file not found".to_string(),
            context: ">seq1\nMKV".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "hmmscan returned 1: 'Error: file not found' while scanning \">seq1\\nMKV\"..."
        );
    }

    #[test]
    fn test_runner_timeouts_map_to_process_timeout() {
        let err = HmmerError::from_runner(
            HmmerTool::Hmmsearch,
            RunnerError::TimedOut {
                program: "hmmsearch".to_string(),
                timeout: Duration::from_secs(5),
            },
        );
        assert!(matches!(err, HmmerError::ProcessTimeout { .. }));

        let err = HmmerError::from_runner(HmmerTool::Hmmsearch, RunnerError::EmptyCommand);
        assert!(matches!(err, HmmerError::Launch { .. }));
    }

    #[test]
    fn test_tool_properties() {
        assert_eq!(HmmerTool::Hmmscan.banner(), "# hmmscan");
        assert_eq!(HmmerTool::Hmmsearch.output_source(), OutputSource::DomainTable);
        assert_eq!(HmmerTool::Hmmscan.result_format(), ResultFormat::Hmmer3Text);
        assert_eq!(HmmerTool::Hmmsearch.to_string(), "hmmsearch");
    }
}
