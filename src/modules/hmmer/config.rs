//! Search configuration
//!
//! Loaded from TOML; every field has a default so partial files work.
//!
//! ```toml
//! cpus = 8
//! timeout_secs = 3600
//!
//! [executables]
//! hmmscan = "/opt/hmmer/bin/hmmscan"
//!
//! [hmmer3]
//! multithreading = false
//!
//! [shadow]
//! enabled = true
//! cpus = 4
//! output_dir = "/var/tmp/hmmer-shadow"
//! keep_artifacts = true
//! ```

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::engines::core::io::read_text_file;
use crate::modules::hmmer::{HmmerError, HmmerResult, HmmerTool};

/// Paths to the HMMER executables
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Executables {
    pub hmmscan: PathBuf,
    pub hmmsearch: PathBuf,
}

impl Default for Executables {
    fn default() -> Self {
        Self {
            hmmscan: PathBuf::from("hmmscan"),
            hmmsearch: PathBuf::from("hmmsearch"),
        }
    }
}

/// HMMER3 feature toggles
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Hmmer3Options {
    /// Pass `--cpu` to the tools at all
    pub multithreading: bool,
}

impl Default for Hmmer3Options {
    fn default() -> Self {
        Self {
            multithreading: true,
        }
    }
}

/// Embedded-library comparison run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ShadowConfig {
    pub enabled: bool,
    /// Worker threads for the library; falls back to the top-level `cpus`
    pub cpus: Option<usize>,
    /// Where shadow artifacts are written; a private temporary directory
    /// when unset
    pub output_dir: Option<PathBuf>,
    /// Leave each run's query and domain table on disk
    pub keep_artifacts: bool,
}

impl Default for ShadowConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            cpus: None,
            output_dir: None,
            keep_artifacts: false,
        }
    }
}

/// Configuration for both search paths
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HmmerConfig {
    pub executables: Executables,
    /// Worker threads passed to the external tools
    pub cpus: usize,
    pub hmmer3: Hmmer3Options,
    /// Upper bound on a single external process run
    pub timeout_secs: Option<u64>,
    pub shadow: ShadowConfig,
}

impl Default for HmmerConfig {
    fn default() -> Self {
        Self {
            executables: Executables::default(),
            cpus: num_cpus::get(),
            hmmer3: Hmmer3Options::default(),
            timeout_secs: None,
            shadow: ShadowConfig::default(),
        }
    }
}

impl HmmerConfig {
    /// Parse a TOML document
    pub fn from_toml_str(text: &str) -> HmmerResult<Self> {
        let config: Self = toml::from_str(text).map_err(|e| HmmerError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Load a TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> HmmerResult<Self> {
        let text = read_text_file(path.as_ref()).map_err(|e| {
            HmmerError::Config(format!("cannot read {}: {}", path.as_ref().display(), e))
        })?;
        Self::from_toml_str(&text)
    }

    /// Reject settings no search could run with
    pub fn validate(&self) -> HmmerResult<()> {
        if self.cpus == 0 {
            return Err(HmmerError::Config("cpus must be at least 1".to_string()));
        }
        if self.shadow.cpus == Some(0) {
            return Err(HmmerError::Config("shadow.cpus must be at least 1".to_string()));
        }
        if self.timeout_secs == Some(0) {
            return Err(HmmerError::Config("timeout_secs must be positive".to_string()));
        }
        Ok(())
    }

    /// Executable configured for `tool`
    pub fn executable(&self, tool: HmmerTool) -> &Path {
        match tool {
            HmmerTool::Hmmscan => &self.executables.hmmscan,
            HmmerTool::Hmmsearch => &self.executables.hmmsearch,
        }
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_secs.map(Duration::from_secs)
    }

    /// Worker threads for the embedded library
    pub fn shadow_cpus(&self) -> usize {
        self.shadow.cpus.unwrap_or(self.cpus)
    }
}
