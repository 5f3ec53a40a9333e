//! Command-line assembly
//!
//! Layout: executable, `--cpu <n>` (when allowed), the tool's default
//! flags, caller-supplied extras in order, the model path, then the query
//! input (`-` for stdin or a file path).

use std::path::{Path, PathBuf};

use crate::modules::hmmer::capability::CapabilityProbe;
use crate::modules::hmmer::config::HmmerConfig;
use crate::modules::hmmer::{HmmerTool, SearchRequest};

const NULL_DEVICE: &str = if cfg!(windows) { "NUL" } else { "/dev/null" };

/// How the query reaches the tool
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QueryInput {
    Stdin,
    File(PathBuf),
}

impl QueryInput {
    /// Positional argument naming the input
    pub fn placeholder(&self) -> String {
        match self {
            QueryInput::Stdin => "-".to_string(),
            QueryInput::File(path) => path.to_string_lossy().into_owned(),
        }
    }
}

/// Builds argument vectors for one configured tool build
pub struct CommandBuilder<'a> {
    config: &'a HmmerConfig,
    capabilities: &'a CapabilityProbe,
}

impl<'a> CommandBuilder<'a> {
    pub fn new(config: &'a HmmerConfig, capabilities: &'a CapabilityProbe) -> Self {
        Self { config, capabilities }
    }

    /// Whether `--cpu` may be passed
    pub fn use_threads(&self) -> bool {
        // Builds without threading reject the flag outright
        self.capabilities.supports_multithreading && self.config.hmmer3.multithreading
    }

    /// Full argument vector for `request`.
    ///
    /// `domain_table` is where hmmsearch writes its `--domtblout` table;
    /// it is ignored for hmmscan.
    pub fn build(
        &self,
        tool: HmmerTool,
        request: &SearchRequest,
        input: &QueryInput,
        domain_table: Option<&Path>,
    ) -> Vec<String> {
        let mut command = vec![self.config.executable(tool).to_string_lossy().into_owned()];

        if self.use_threads() {
            command.push("--cpu".to_string());
            command.push(self.config.cpus.to_string());
        }

        match tool {
            HmmerTool::Hmmscan => command.push("--nobias".to_string()),
            HmmerTool::Hmmsearch => {
                // The verbose report is not needed, only the table
                command.push("-o".to_string());
                command.push(NULL_DEVICE.to_string());
                if let Some(table) = domain_table {
                    command.push("--domtblout".to_string());
                    command.push(table.to_string_lossy().into_owned());
                }
            }
        }

        command.extend(request.extra_args().iter().cloned());
        command.push(request.model_path().to_string_lossy().into_owned());
        command.push(input.placeholder());
        command
    }
}
