//! HMMER3 profile file reader
//!
//! Reads the header block of every model in a HMMER3 save file (`NAME`,
//! `ACC`, `DESC`, `LENG`, `ALPH`). Model bodies are skipped; only what is
//! needed to identify and sanity-check the profiles is kept.

use std::path::{Path, PathBuf};

use crate::engines::core::io::FastReader;
use crate::engines::{EngineError, EngineResult};

/// Header information of one profile HMM
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HmmProfile {
    pub name: String,
    pub accession: Option<String>,
    pub description: Option<String>,
    /// Number of match states
    pub length: usize,
    /// Alphabet tag as written in the file (`amino`, `DNA`, `RNA`)
    pub alphabet: String,
}

/// All profiles of a HMMER3 file
#[derive(Debug, Clone)]
pub struct HmmFile {
    path: PathBuf,
    profiles: Vec<HmmProfile>,
}

#[derive(Default)]
struct PartialProfile {
    name: Option<String>,
    accession: Option<String>,
    description: Option<String>,
    length: Option<usize>,
    alphabet: Option<String>,
}

impl PartialProfile {
    fn finish(self, line: usize) -> EngineResult<HmmProfile> {
        Ok(HmmProfile {
            name: self
                .name
                .ok_or_else(|| EngineError::parse(line, "model without NAME"))?,
            accession: self.accession,
            description: self.description,
            length: self
                .length
                .ok_or_else(|| EngineError::parse(line, "model without LENG"))?,
            alphabet: self
                .alphabet
                .ok_or_else(|| EngineError::parse(line, "model without ALPH"))?,
        })
    }
}

impl HmmFile {
    /// Read the profile headers of the file at `path`
    pub fn open<P: AsRef<Path>>(path: P) -> EngineResult<Self> {
        let mut reader = FastReader::new(path.as_ref(), None)?;

        let mut profiles = Vec::new();
        let mut current: Option<PartialProfile> = None;
        let mut in_body = false;
        let mut last_line = 0;

        for (idx, line) in reader.read_lines().enumerate() {
            let line = line?;
            let line_no = idx + 1;
            last_line = line_no;

            if current.is_none() {
                if line.trim().is_empty() {
                    continue;
                }
                if !line.starts_with("HMMER3") {
                    return Err(EngineError::parse(line_no, "expected a HMMER3 format line"));
                }
                current = Some(PartialProfile::default());
                in_body = false;
                continue;
            }

            if line.starts_with("//") {
                if let Some(partial) = current.take() {
                    profiles.push(partial.finish(line_no)?);
                }
                continue;
            }
            if in_body {
                continue;
            }

            let (tag, value) = match line.split_once(char::is_whitespace) {
                Some((tag, value)) => (tag, value.trim()),
                None => (line.as_str(), ""),
            };
            let Some(partial) = current.as_mut() else {
                continue;
            };
            match tag {
                "NAME" => partial.name = Some(value.to_string()),
                "ACC" => partial.accession = Some(value.to_string()),
                "DESC" => partial.description = Some(value.to_string()),
                "LENG" => {
                    let length = value
                        .parse()
                        .map_err(|_| EngineError::parse(line_no, format!("bad LENG {:?}", value)))?;
                    partial.length = Some(length);
                }
                "ALPH" => partial.alphabet = Some(value.to_string()),
                // The emission table ends the header block
                "HMM" => in_body = true,
                _ => {}
            }
        }

        if current.is_some() {
            return Err(EngineError::parse(last_line, "truncated model: missing '//'"));
        }
        if profiles.is_empty() {
            return Err(EngineError::parse(last_line, "no models found"));
        }

        Ok(Self {
            path: path.as_ref().to_path_buf(),
            profiles,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn profiles(&self) -> &[HmmProfile] {
        &self.profiles
    }

    pub fn into_profiles(self) -> Vec<HmmProfile> {
        self.profiles
    }
}
