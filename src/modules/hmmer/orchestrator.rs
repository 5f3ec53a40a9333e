//! Dual-path search orchestration
//!
//! [`DualPathSearch`] owns the shared state of both paths (capability
//! cache, timing ledger, process runner) and hands it to the two
//! executors. A search runs the external tool first; once the tool has
//! actually run, the same request is repeated through the embedded
//! library if one is attached. Only the external result is returned.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::engines::core::process::{ProcessRunner, SystemProcessRunner};
use crate::engines::core::timing::TimingLedger;
use crate::engines::storage::QueryResult;
use crate::modules::hmmer::capability::{CapabilityCache, CapabilityProbe};
use crate::modules::hmmer::config::HmmerConfig;
use crate::modules::hmmer::embedded::{EmbeddedExecutor, EmbeddedSearchLibrary, ShadowOutcome};
use crate::modules::hmmer::external::SubprocessExecutor;
use crate::modules::hmmer::{HmmerError, HmmerResult, HmmerTool, SearchRequest};

/// Everything one search produced
#[derive(Debug)]
pub struct SearchOutcome {
    /// What callers of [`DualPathSearch::search`] get
    pub results: HmmerResult<Vec<QueryResult>>,
    /// Shadow run, if one was attempted
    pub shadow: Option<ShadowOutcome>,
}

/// Runs HMMER searches through the external tools, shadowed by an
/// optional embedded library
pub struct DualPathSearch {
    config: Arc<HmmerConfig>,
    runner: Arc<dyn ProcessRunner>,
    capabilities: Arc<CapabilityCache>,
    timings: Arc<TimingLedger>,
    subprocess: SubprocessExecutor,
    shadow: Option<EmbeddedExecutor>,
}

impl DualPathSearch {
    /// Search with the system process runner, bounded by the configured
    /// timeout
    pub fn new(config: HmmerConfig) -> HmmerResult<Self> {
        let runner = SystemProcessRunner::new().with_timeout(config.timeout());
        Self::with_runner(config, Arc::new(runner))
    }

    /// Search with a caller-supplied process runner
    pub fn with_runner(config: HmmerConfig, runner: Arc<dyn ProcessRunner>) -> HmmerResult<Self> {
        config.validate()?;

        let config = Arc::new(config);
        let capabilities = Arc::new(CapabilityCache::new());
        let timings = Arc::new(TimingLedger::new());
        let subprocess = SubprocessExecutor::new(
            Arc::clone(&config),
            Arc::clone(&runner),
            Arc::clone(&capabilities),
            Arc::clone(&timings),
        );

        Ok(Self {
            config,
            runner,
            capabilities,
            timings,
            subprocess,
            shadow: None,
        })
    }

    /// Shadow every search with `library`. Ignored when the configuration
    /// disables shadow runs.
    pub fn with_embedded_library(
        mut self,
        library: Arc<dyn EmbeddedSearchLibrary>,
    ) -> HmmerResult<Self> {
        if !self.config.shadow.enabled {
            log::debug!("shadow runs disabled, not attaching {}", library.name());
            return Ok(self);
        }

        let executor =
            EmbeddedExecutor::new(Arc::clone(&self.config), library, Arc::clone(&self.timings))?;
        log::debug!("shadow artifacts go to {}", executor.artifact_dir().display());
        self.shadow = Some(executor);
        Ok(self)
    }

    pub fn config(&self) -> &HmmerConfig {
        &self.config
    }

    /// Accumulated time per tool and path
    pub fn timings(&self) -> &TimingLedger {
        &self.timings
    }

    /// Directory the shadow path writes to, when one is attached
    pub fn shadow_artifact_dir(&self) -> Option<&Path> {
        self.shadow.as_ref().map(EmbeddedExecutor::artifact_dir)
    }

    /// Run `request` through `tool` and return the external tool's results
    pub fn search(
        &self,
        tool: HmmerTool,
        request: &SearchRequest,
    ) -> HmmerResult<Vec<QueryResult>> {
        self.search_with_shadow(tool, request).results
    }

    /// Like [`search`](Self::search), also returning the shadow outcome
    pub fn search_with_shadow(&self, tool: HmmerTool, request: &SearchRequest) -> SearchOutcome {
        let results = self.subprocess.run(tool, request);

        let shadow = match &self.shadow {
            Some(executor) if tool_ran(&results) => Some(executor.run_shadow(tool, request)),
            _ => None,
        };

        SearchOutcome { results, shadow }
    }

    /// Scan `query` (FASTA text) against the profiles in `model`, keeping
    /// the raw report at `results_file` if given
    pub fn run_hmmscan(
        &self,
        model: impl Into<PathBuf>,
        query: &str,
        extra_args: &[&str],
        results_file: Option<&Path>,
    ) -> HmmerResult<Vec<QueryResult>> {
        let mut request =
            SearchRequest::new(model, query).with_extra_args(extra_args.iter().copied());
        if let Some(path) = results_file {
            request = request.with_results_file(path);
        }
        self.search(HmmerTool::Hmmscan, &request)
    }

    /// Search the profile in `model` against `sequences` (FASTA text)
    pub fn run_hmmsearch(
        &self,
        model: impl Into<PathBuf>,
        sequences: &str,
        use_temporary_file: bool,
    ) -> HmmerResult<Vec<QueryResult>> {
        let request = SearchRequest::new(model, sequences).with_temporary_file(use_temporary_file);
        self.search(HmmerTool::Hmmsearch, &request)
    }

    /// Help output of the configured `tool` executable
    pub fn help_text(&self, tool: HmmerTool) -> HmmerResult<String> {
        Ok(self.probe(tool)?.help_text.clone())
    }

    /// Version of the configured `tool` executable, e.g. `3.3.2`
    pub fn version(&self, tool: HmmerTool) -> HmmerResult<String> {
        Ok(self.probe(tool)?.version()?.to_string())
    }

    fn probe(&self, tool: HmmerTool) -> HmmerResult<Arc<CapabilityProbe>> {
        self.capabilities
            .get_or_probe(tool, self.config.executable(tool), self.runner.as_ref())
    }

    /// Run every request through `tool`, returning results in request
    /// order. Requests run concurrently with the `parallel` feature.
    pub fn search_many(
        &self,
        tool: HmmerTool,
        requests: &[SearchRequest],
    ) -> Vec<HmmerResult<Vec<QueryResult>>> {
        #[cfg(feature = "parallel")]
        {
            use crate::engines::core::parallel;

            // Each search already runs `cpus` tool threads
            let workers = (parallel::default_num_threads() / self.config.cpus).max(1);
            match parallel::build_pool(workers) {
                Ok(pool) => {
                    return parallel::map_ordered(&pool, requests, |request| {
                        self.search(tool, request)
                    })
                }
                Err(e) => log::warn!("cannot start batch pool, searching sequentially: {}", e),
            }
        }

        requests.iter().map(|request| self.search(tool, request)).collect()
    }
}

/// Whether the external tool got as far as running to completion
fn tool_ran(results: &HmmerResult<Vec<QueryResult>>) -> bool {
    matches!(
        results,
        Ok(_) | Err(HmmerError::ExternalTool { .. }) | Err(HmmerError::Parse { .. })
    )
}
