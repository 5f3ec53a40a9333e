//! Subprocess search path
//!
//! Runs the HMMER binary on a request and returns the parsed results.
//! Each run moves through
//! `NotStarted -> InputWritten -> ProcessLaunched -> Succeeded -> Parsed`
//! or ends in `Failed`. There are no retries.
//!
//! Files a run needs (the query in tempfile mode, hmmsearch's domain
//! table) live in a private temporary directory that is passed to the
//! child as its working directory and removed when the run ends, however
//! it ends. The current directory of this process is never changed.

use std::fmt;
use std::path::Path;
use std::sync::Arc;

use itertools::Itertools;
use tempfile::TempDir;

use crate::engines::core::io::{read_text_file, write_text_file};
use crate::engines::core::process::ProcessRunner;
use crate::engines::core::timing::{ExecutionPath, Stopwatch, TimingLedger};
use crate::engines::storage::{QueryResult, ResultFormat};
use crate::modules::hmmer::aggregate::ResultAggregator;
use crate::modules::hmmer::capability::CapabilityCache;
use crate::modules::hmmer::classify::classify_output;
use crate::modules::hmmer::command::{CommandBuilder, QueryInput};
use crate::modules::hmmer::config::HmmerConfig;
use crate::modules::hmmer::{HmmerError, HmmerResult, HmmerTool, OutputSource, SearchRequest};

/// File the query is written to in tempfile mode
const QUERY_FILE_NAME: &str = "input.fa";
/// File hmmsearch writes its domain table to
const DOMAIN_TABLE_FILE_NAME: &str = "result.domtab";

/// Progress of one subprocess run
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExecutionStage {
    NotStarted,
    InputWritten,
    ProcessLaunched,
    Succeeded,
    Parsed,
    Failed { exit_code: i32, diagnostic: String },
}

impl ExecutionStage {
    fn can_advance_to(&self, next: &ExecutionStage) -> bool {
        use ExecutionStage::*;
        matches!(
            (self, next),
            (NotStarted, InputWritten)
                | (InputWritten, ProcessLaunched)
                | (ProcessLaunched, Succeeded)
                | (ProcessLaunched, Failed { .. })
                | (Succeeded, Parsed)
        )
    }
}

impl fmt::Display for ExecutionStage {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            ExecutionStage::NotStarted => write!(f, "not started"),
            ExecutionStage::InputWritten => write!(f, "input written"),
            ExecutionStage::ProcessLaunched => write!(f, "process launched"),
            ExecutionStage::Succeeded => write!(f, "succeeded"),
            ExecutionStage::Parsed => write!(f, "parsed"),
            ExecutionStage::Failed { exit_code, .. } => write!(f, "failed ({})", exit_code),
        }
    }
}

struct StageTracker {
    tool: HmmerTool,
    stage: ExecutionStage,
}

impl StageTracker {
    fn new(tool: HmmerTool) -> Self {
        Self {
            tool,
            stage: ExecutionStage::NotStarted,
        }
    }

    fn advance(&mut self, next: ExecutionStage) {
        debug_assert!(
            self.stage.can_advance_to(&next),
            "illegal transition {} -> {}",
            self.stage,
            next
        );
        log::debug!("{}: {} -> {}", self.tool, self.stage, next);
        self.stage = next;
    }
}

/// Raw parseable output of a successful run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawOutput {
    pub text: String,
    pub format: ResultFormat,
}

/// Runs searches through the external HMMER executables
pub struct SubprocessExecutor {
    config: Arc<HmmerConfig>,
    runner: Arc<dyn ProcessRunner>,
    capabilities: Arc<CapabilityCache>,
    timings: Arc<TimingLedger>,
    aggregator: ResultAggregator,
}

impl SubprocessExecutor {
    pub fn new(
        config: Arc<HmmerConfig>,
        runner: Arc<dyn ProcessRunner>,
        capabilities: Arc<CapabilityCache>,
        timings: Arc<TimingLedger>,
    ) -> Self {
        Self {
            config,
            runner,
            capabilities,
            timings,
            aggregator: ResultAggregator::new(),
        }
    }

    /// Use `aggregator` instead of the built-in parsers
    pub fn with_aggregator(mut self, aggregator: ResultAggregator) -> Self {
        self.aggregator = aggregator;
        self
    }

    /// Run `request` through `tool` and parse the output
    pub fn run(&self, tool: HmmerTool, request: &SearchRequest) -> HmmerResult<Vec<QueryResult>> {
        let mut tracker = StageTracker::new(tool);
        let raw = self.execute(tool, request, &mut tracker)?;
        let results = self.aggregator.parse(&raw.text, raw.format)?;
        tracker.advance(ExecutionStage::Parsed);
        Ok(results)
    }

    /// Run `request` through `tool` and return the unparsed output
    pub fn run_raw(&self, tool: HmmerTool, request: &SearchRequest) -> HmmerResult<RawOutput> {
        self.execute(tool, request, &mut StageTracker::new(tool))
    }

    fn execute(
        &self,
        tool: HmmerTool,
        request: &SearchRequest,
        tracker: &mut StageTracker,
    ) -> HmmerResult<RawOutput> {
        if request.query().is_empty() {
            return Err(HmmerError::EmptyInput { tool });
        }

        let executable = self.config.executable(tool);
        let capabilities = self
            .capabilities
            .get_or_probe(tool, executable, self.runner.as_ref())?;

        let needs_workdir =
            request.use_temporary_file() || tool.output_source() == OutputSource::DomainTable;
        let workdir = if needs_workdir {
            Some(
                tempfile::Builder::new()
                    .prefix(&format!("{}-", tool.name()))
                    .tempdir()?,
            )
        } else {
            None
        };
        let workdir_path = workdir.as_ref().map(TempDir::path);

        // Write the query where the tool will read it
        let (input, stdin) = match workdir_path {
            Some(dir) if request.use_temporary_file() => {
                let path = dir.join(QUERY_FILE_NAME);
                write_text_file(&path, request.query())?;
                (QueryInput::File(path), None)
            }
            _ => (QueryInput::Stdin, Some(request.query())),
        };
        tracker.advance(ExecutionStage::InputWritten);

        let domain_table = match (tool.output_source(), workdir_path) {
            (OutputSource::DomainTable, Some(dir)) => Some(dir.join(DOMAIN_TABLE_FILE_NAME)),
            _ => None,
        };

        let command = CommandBuilder::new(&self.config, &capabilities).build(
            tool,
            request,
            &input,
            domain_table.as_deref(),
        );
        log::debug!("running {}", command.iter().join(" "));

        let stopwatch = Stopwatch::start();
        tracker.advance(ExecutionStage::ProcessLaunched);
        let outcome = self.runner.execute(&command, stdin, workdir_path);
        stopwatch.stop(&self.timings, tool.name(), ExecutionPath::Subprocess);
        let result = outcome.map_err(|e| HmmerError::from_runner(tool, e))?;

        if !result.successful() {
            let failing_output = if result.stderr.is_empty() {
                &result.stdout
            } else {
                &result.stderr
            };
            let diagnostic = classify_output(failing_output);
            log::error!(
                "{} returned {}: {} while searching {}",
                tool,
                result.exit_code,
                result.stderr.trim_end(),
                request.model_path().display()
            );
            tracker.advance(ExecutionStage::Failed {
                exit_code: result.exit_code,
                diagnostic: diagnostic.clone(),
            });
            return Err(HmmerError::ExternalTool {
                tool,
                exit_code: result.exit_code,
                diagnostic,
                context: request.query_context(),
            });
        }

        let text = match domain_table {
            Some(path) => read_text_file(&path)?,
            None => result.stdout,
        };
        tracker.advance(ExecutionStage::Succeeded);

        if let Some(path) = request.results_file() {
            persist_raw_output(path, &text)?;
        }

        Ok(RawOutput {
            text,
            format: tool.result_format(),
        })
    }
}

fn persist_raw_output(path: &Path, text: &str) -> HmmerResult<()> {
    let written = write_text_file(path, text)?;
    log::debug!("kept {} bytes of raw output in {}", written, path.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engines::core::process::testing::ScriptedRunner;
    use crate::engines::core::process::{ExecutionResult, RunnerError};
    use crate::engines::storage::formats::fixtures::{HMMSCAN_ONE_HIT, HMMSEARCH_DOMTAB};
    use crate::engines::storage::parse_results;
    use crate::modules::hmmer::capability::fixtures::{
        HMMSCAN_HELP, HMMSCAN_HELP_SINGLE_THREADED, HMMSEARCH_HELP,
    };
    use std::path::PathBuf;
    use std::time::Duration;
    use tempfile::tempdir;

    const QUERY: &str = ">seq1\nMKVLAAGIVGLLLA\n";

    fn executor(runner: Arc<ScriptedRunner>) -> (SubprocessExecutor, Arc<TimingLedger>) {
        let mut config = HmmerConfig::default();
        config.cpus = 4;
        let timings = Arc::new(TimingLedger::new());
        let executor = SubprocessExecutor::new(
            Arc::new(config),
            runner,
            Arc::new(CapabilityCache::new()),
            Arc::clone(&timings),
        );
        (executor, timings)
    }

    #[test]
    fn test_hmmscan_success_matches_direct_parse() {
        let runner = Arc::new(ScriptedRunner::exiting(HMMSCAN_HELP, 0, HMMSCAN_ONE_HIT, ""));
        let (executor, timings) = executor(Arc::clone(&runner));
        let request = SearchRequest::new("models/test.hmm", QUERY);

        let results = executor.run(HmmerTool::Hmmscan, &request).unwrap();

        assert_eq!(results, parse_results(HMMSCAN_ONE_HIT, ResultFormat::Hmmer3Text).unwrap());
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].hits.len(), 1);
        assert_eq!(results[0].hits[0].id, "PF00001");

        let searches = runner.search_calls();
        assert_eq!(searches.len(), 1);
        assert_eq!(searches[0].stdin.as_deref(), Some(QUERY));
        assert!(searches[0].working_dir.is_none());
        assert_eq!(
            searches[0].command,
            vec!["hmmscan", "--cpu", "4", "--nobias", "models/test.hmm", "-"]
        );
        let recorded = timings.snapshot();
        assert_eq!(recorded.len(), 1);
        assert_eq!(recorded[0].0, "hmmscan");
        assert_eq!(recorded[0].1, ExecutionPath::Subprocess);
    }

    #[test]
    fn test_empty_query_launches_nothing() {
        let runner = Arc::new(ScriptedRunner::exiting(HMMSCAN_HELP, 0, HMMSCAN_ONE_HIT, ""));
        let (executor, _) = executor(Arc::clone(&runner));

        for tool in [HmmerTool::Hmmscan, HmmerTool::Hmmsearch] {
            let err = executor.run(tool, &SearchRequest::new("models/test.hmm", "")).unwrap_err();
            assert!(matches!(err, HmmerError::EmptyInput { .. }));
        }
        assert!(runner.calls().is_empty());
    }

    #[test]
    fn test_nonzero_exit_reports_classified_stderr() {
        let stderr = "Error: file not found\n  models/test.hmm\n";
        let runner = Arc::new(ScriptedRunner::exiting(HMMSCAN_HELP, 1, "", stderr));
        let (executor, _) = executor(runner);
        let request = SearchRequest::new("models/test.hmm", QUERY);

        match executor.run(HmmerTool::Hmmscan, &request).unwrap_err() {
            HmmerError::ExternalTool {
                tool,
                exit_code,
                diagnostic,
                context,
            } => {
                assert_eq!(tool, HmmerTool::Hmmscan);
                assert_eq!(exit_code, 1);
                assert_eq!(diagnostic, "Error: file not found   models/test.hmm");
                assert_eq!(diagnostic, classify_output(stderr));
                assert_eq!(context, QUERY);
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn test_nonzero_exit_falls_back_to_stdout() {
        let runner = Arc::new(ScriptedRunner::exiting(HMMSCAN_HELP, 2, "\nsomething broke\n", ""));
        let (executor, _) = executor(runner);

        match executor.run(HmmerTool::Hmmscan, &SearchRequest::new("m.hmm", QUERY)).unwrap_err() {
            HmmerError::ExternalTool { diagnostic, .. } => {
                assert_eq!(diagnostic, "something broke")
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn test_long_query_context_is_truncated() {
        let runner = Arc::new(ScriptedRunner::exiting(HMMSCAN_HELP, 1, "", "Error: boom\n"));
        let (executor, _) = executor(runner);
        let query = format!(">seq1\n{}\n", "M".repeat(500));

        let request = SearchRequest::new("m.hmm", query.as_str());
        match executor.run(HmmerTool::Hmmscan, &request).unwrap_err() {
            HmmerError::ExternalTool { context, .. } => {
                assert_eq!(context.len(), 100);
                assert!(query.starts_with(&context));
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn test_bad_banner_is_tool_invocation_error() {
        let runner = Arc::new(ScriptedRunner::exiting("Usage: something else\n", 0, "", ""));
        let (executor, _) = executor(Arc::clone(&runner));

        let err = executor
            .run(HmmerTool::Hmmscan, &SearchRequest::new("m.hmm", QUERY))
            .unwrap_err();
        assert!(matches!(err, HmmerError::ToolInvocation { .. }));
        assert!(runner.search_calls().is_empty());
    }

    #[test]
    fn test_probe_runs_once_across_searches() {
        let runner = Arc::new(ScriptedRunner::exiting(
            HMMSCAN_HELP_SINGLE_THREADED,
            0,
            HMMSCAN_ONE_HIT,
            "",
        ));
        let (executor, _) = executor(Arc::clone(&runner));

        for _ in 0..3 {
            executor.run(HmmerTool::Hmmscan, &SearchRequest::new("m.hmm", QUERY)).unwrap();
        }

        assert_eq!(runner.help_calls(), 1);
        for call in runner.search_calls() {
            assert!(!call.command.iter().any(|arg| arg == "--cpu"));
        }
    }

    #[test]
    fn test_tempfile_mode_uses_private_directory() {
        let seen_dir: Arc<parking_lot::Mutex<Option<PathBuf>>> = Arc::default();
        let seen = Arc::clone(&seen_dir);
        let runner = Arc::new(ScriptedRunner::new(HMMSCAN_HELP, move |call| {
            let dir = call.working_dir.clone().expect("working directory");
            let input = dir.join(QUERY_FILE_NAME);
            // The query is on disk before launch and named on the command line
            assert_eq!(std::fs::read_to_string(&input).unwrap(), QUERY);
            assert_eq!(call.command.last().map(PathBuf::from), Some(input));
            assert!(call.stdin.is_none());
            *seen.lock() = Some(dir);
            Ok(ExecutionResult {
                exit_code: 0,
                stdout: HMMSCAN_ONE_HIT.to_string(),
                stderr: String::new(),
            })
        }));
        let (executor, _) = executor(runner);
        let cwd_before = std::env::current_dir().unwrap();

        let request = SearchRequest::new("m.hmm", QUERY).with_temporary_file(true);
        executor.run(HmmerTool::Hmmscan, &request).unwrap();

        let dir = seen_dir.lock().clone().unwrap();
        assert!(dir.is_absolute());
        assert!(!dir.exists());
        assert_eq!(std::env::current_dir().unwrap(), cwd_before);
    }

    #[test]
    fn test_tempfile_directory_removed_on_failure() {
        let seen_dir: Arc<parking_lot::Mutex<Option<PathBuf>>> = Arc::default();
        let seen = Arc::clone(&seen_dir);
        let runner = Arc::new(ScriptedRunner::new(HMMSCAN_HELP, move |call| {
            *seen.lock() = call.working_dir.clone();
            Ok(ExecutionResult {
                exit_code: 1,
                stdout: String::new(),
                stderr: "Error: parse failed\n".to_string(),
            })
        }));
        let (executor, _) = executor(runner);

        let request = SearchRequest::new("m.hmm", QUERY).with_temporary_file(true);
        assert!(executor.run(HmmerTool::Hmmscan, &request).is_err());

        assert!(!seen_dir.lock().clone().unwrap().exists());
    }

    #[test]
    fn test_hmmsearch_reads_domain_table() {
        let runner = Arc::new(ScriptedRunner::new(HMMSEARCH_HELP, |call| {
            let at = call.command.iter().position(|a| a == "--domtblout").expect("--domtblout");
            write_text_file(&call.command[at + 1], HMMSEARCH_DOMTAB).unwrap();
            Ok(ExecutionResult {
                exit_code: 0,
                stdout: String::new(),
                stderr: String::new(),
            })
        }));
        let (executor, _) = executor(Arc::clone(&runner));
        let dir = tempdir().unwrap();
        let keep = dir.path().join("kept.domtab");

        let request = SearchRequest::new("/data/Lant.hmm", QUERY).with_results_file(&keep);
        let results = executor.run(HmmerTool::Hmmsearch, &request).unwrap();

        assert_eq!(results.len(), 1);
        assert_eq!(results[0].id, "Lant_dehydr_N");
        assert_eq!(results[0].hits.len(), 2);
        assert_eq!(read_text_file(&keep).unwrap(), HMMSEARCH_DOMTAB);

        let call = &runner.search_calls()[0];
        assert_eq!(call.stdin.as_deref(), Some(QUERY));
        assert_eq!(call.command.last().map(String::as_str), Some("-"));
        assert!(call.command.iter().any(|a| a == "-o"));
    }

    #[test]
    fn test_results_file_keeps_stdout_verbatim() {
        let runner = Arc::new(ScriptedRunner::exiting(HMMSCAN_HELP, 0, HMMSCAN_ONE_HIT, ""));
        let (executor, _) = executor(runner);
        let dir = tempdir().unwrap();
        let keep = dir.path().join("hmmscan.txt");

        let request = SearchRequest::new("m.hmm", QUERY).with_results_file(&keep);
        executor.run(HmmerTool::Hmmscan, &request).unwrap();

        assert_eq!(read_text_file(&keep).unwrap(), HMMSCAN_ONE_HIT);
    }

    #[test]
    fn test_launch_failure_and_timeout_propagate() {
        let runner = Arc::new(ScriptedRunner::new(HMMSCAN_HELP, |_| {
            Err(RunnerError::TimedOut {
                program: "hmmscan".to_string(),
                timeout: Duration::from_secs(1),
            })
        }));
        let (executor, _) = executor(runner);

        let err = executor
            .run(HmmerTool::Hmmscan, &SearchRequest::new("m.hmm", QUERY))
            .unwrap_err();
        assert!(matches!(err, HmmerError::ProcessTimeout { .. }));
    }

    #[test]
    fn test_unparseable_output_is_parse_error() {
        let runner = Arc::new(ScriptedRunner::exiting(HMMSCAN_HELP, 0, "Query: seq1 [L=3]\n", ""));
        let (executor, _) = executor(runner);

        let err = executor
            .run(HmmerTool::Hmmscan, &SearchRequest::new("m.hmm", QUERY))
            .unwrap_err();
        assert!(matches!(err, HmmerError::Parse { .. }));
    }

    #[test]
    fn test_run_raw_returns_unparsed_text() {
        let runner = Arc::new(ScriptedRunner::exiting(HMMSCAN_HELP, 0, "raw text", ""));
        let (executor, _) = executor(runner);

        let raw = executor
            .run_raw(HmmerTool::Hmmscan, &SearchRequest::new("m.hmm", QUERY))
            .unwrap();
        assert_eq!(raw.text, "raw text");
        assert_eq!(raw.format, ResultFormat::Hmmer3Text);
    }

    #[test]
    fn test_stage_transitions() {
        use ExecutionStage::*;
        assert!(NotStarted.can_advance_to(&InputWritten));
        assert!(ProcessLaunched.can_advance_to(&Failed {
            exit_code: 1,
            diagnostic: String::new()
        }));
        assert!(!NotStarted.can_advance_to(&Parsed));
        assert!(!Parsed.can_advance_to(&Succeeded));
    }
}
