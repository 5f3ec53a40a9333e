//! Tool capability probing
//!
//! Runs a tool once with `-h`, checks that the output really comes from
//! the expected program, and records what the build supports. Results are
//! cached per (tool, executable) for the lifetime of the cache.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use parking_lot::Mutex;

use crate::engines::core::process::ProcessRunner;
use crate::modules::hmmer::{HmmerError, HmmerResult, HmmerTool};

/// Token a multithreaded build lists in its help text
const THREAD_FLAG_TOKEN: &str = " --cpu ";

/// What a tool's help output says about it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CapabilityProbe {
    pub help_text: String,
    pub supports_multithreading: bool,
    version: Option<String>,
}

impl CapabilityProbe {
    /// Interpret `help_text` from `tool`, rejecting output that does not
    /// start with the tool's banner
    pub fn from_help_text(
        tool: HmmerTool,
        executable: &Path,
        help_text: String,
    ) -> HmmerResult<Self> {
        if !help_text.starts_with(tool.banner()) {
            return Err(HmmerError::ToolInvocation {
                tool,
                path: executable.to_path_buf(),
                reason: format!("help output does not start with {:?}", tool.banner()),
            });
        }

        let supports_multithreading = help_text.contains(THREAD_FLAG_TOKEN);
        let version = extract_version(&help_text);

        Ok(Self {
            help_text,
            supports_multithreading,
            version,
        })
    }

    /// Version reported on the second help line, e.g. `3.3.2` from
    /// `# HMMER 3.3.2 (Nov 2020); http://hmmer.org/`
    pub fn version(&self) -> HmmerResult<&str> {
        self.version.as_deref().ok_or_else(|| HmmerError::Parse {
            what: "help text".to_string(),
            detail: format!(
                "no version in second line {:?}",
                self.help_text.lines().nth(1).unwrap_or_default()
            ),
        })
    }
}

/// Third field of the second line, if it looks like a version number
fn extract_version(help_text: &str) -> Option<String> {
    let token = help_text.split('\n').nth(1)?.split_whitespace().nth(2)?;
    if token.starts_with(|c: char| c.is_ascii_digit()) {
        Some(token.to_string())
    } else {
        None
    }
}

/// Run `executable -h` and interpret the output
pub fn probe(
    tool: HmmerTool,
    executable: &Path,
    runner: &dyn ProcessRunner,
) -> HmmerResult<CapabilityProbe> {
    let command = vec![executable.to_string_lossy().into_owned(), "-h".to_string()];
    let result = runner
        .execute(&command, None, None)
        .map_err(|e| HmmerError::from_runner(tool, e))?;

    log::debug!("probed {} at {}", tool, executable.display());
    CapabilityProbe::from_help_text(tool, executable, result.stdout)
}

type CacheKey = (HmmerTool, PathBuf);
type Slot = Arc<Mutex<Option<Arc<CapabilityProbe>>>>;

/// Probe results keyed by (tool, executable path).
///
/// Each key has its own lock: concurrent first callers for the same key
/// wait for a single probe, callers for other keys are not blocked. A
/// failed probe leaves the key empty so the next call tries again.
#[derive(Debug, Default)]
pub struct CapabilityCache {
    slots: Mutex<HashMap<CacheKey, Slot>>,
}

impl CapabilityCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Cached probe for `tool` at `executable`, probing on first use
    pub fn get_or_probe(
        &self,
        tool: HmmerTool,
        executable: &Path,
        runner: &dyn ProcessRunner,
    ) -> HmmerResult<Arc<CapabilityProbe>> {
        let slot = {
            let mut slots = self.slots.lock();
            Arc::clone(slots.entry((tool, executable.to_path_buf())).or_default())
        };

        let mut cached = slot.lock();
        if let Some(probe_result) = cached.as_ref() {
            return Ok(Arc::clone(probe_result));
        }

        let fresh = Arc::new(probe(tool, executable, runner)?);
        *cached = Some(Arc::clone(&fresh));
        Ok(fresh)
    }

    /// Probe already cached for `tool` at `executable`
    pub fn cached(&self, tool: HmmerTool, executable: &Path) -> Option<Arc<CapabilityProbe>> {
        let slot = self.slots.lock().get(&(tool, executable.to_path_buf())).cloned()?;
        let cached = slot.lock().clone();
        cached
    }
}
