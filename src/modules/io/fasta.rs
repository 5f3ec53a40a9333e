//! FASTA format I/O
//!
//! Reading query FASTA text into records, and writing records back out.

use std::fmt;
use std::path::Path;

use crate::engines::core::io::FastReader;
use crate::engines::EngineError;
use crate::modules::seq::SequenceResult;

/// Residues per line when writing
const LINE_WIDTH: usize = 60;

/// A FASTA record
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FastaRecord {
    /// Sequence identifier
    pub id: String,
    /// Optional sequence description
    pub description: Option<String>,
    /// Residues, with line breaks removed
    pub sequence: String,
}

impl FastaRecord {
    /// Create a new FASTA record
    pub fn new(id: &str, description: Option<&str>, sequence: &str) -> Self {
        Self {
            id: id.to_string(),
            description: description.map(|s| s.to_string()),
            sequence: sequence.to_string(),
        }
    }
}

impl fmt::Display for FastaRecord {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match &self.description {
            Some(desc) => writeln!(f, ">{} {}", self.id, desc)?,
            None => writeln!(f, ">{}", self.id)?,
        }

        let residues: Vec<char> = self.sequence.chars().collect();
        for line in residues.chunks(LINE_WIDTH) {
            writeln!(f, "{}", line.iter().collect::<String>())?;
        }
        Ok(())
    }
}

/// Accumulates records line by line
#[derive(Default)]
struct FastaBuilder {
    records: Vec<FastaRecord>,
    current: Option<FastaRecord>,
}

impl FastaBuilder {
    fn push_line(&mut self, line: &str, line_no: usize) -> SequenceResult<()> {
        let line = line.trim();

        // Skip empty lines
        if line.is_empty() {
            return Ok(());
        }

        if let Some(header) = line.strip_prefix('>') {
            self.records.extend(self.current.take());

            let mut parts = header.splitn(2, char::is_whitespace);
            let id = parts.next().unwrap_or_default();
            if id.is_empty() {
                return Err(
                    EngineError::parse(line_no, "FASTA header without an identifier").into(),
                );
            }
            let description = parts.next().map(str::trim).filter(|d| !d.is_empty());
            self.current = Some(FastaRecord::new(id, description, ""));
            return Ok(());
        }

        match self.current.as_mut() {
            Some(record) => {
                record.sequence.push_str(line);
                Ok(())
            }
            None => Err(
                EngineError::parse(line_no, "sequence data before the first FASTA header").into(),
            ),
        }
    }

    fn finish(mut self) -> Vec<FastaRecord> {
        self.records.extend(self.current.take());
        self.records
    }
}

/// Read sequences from a FASTA string
pub fn read_fasta_string(content: &str) -> SequenceResult<Vec<FastaRecord>> {
    let mut builder = FastaBuilder::default();
    for (idx, line) in content.lines().enumerate() {
        builder.push_line(line, idx + 1)?;
    }
    Ok(builder.finish())
}

/// Read sequences from a FASTA file
pub fn read_fasta<P: AsRef<Path>>(path: P) -> SequenceResult<Vec<FastaRecord>> {
    let mut reader = FastReader::new(path, None).map_err(EngineError::from)?;
    let mut builder = FastaBuilder::default();
    for (idx, line) in reader.read_lines().enumerate() {
        let line = line.map_err(EngineError::from)?;
        builder.push_line(&line, idx + 1)?;
    }
    Ok(builder.finish())
}

/// Write sequences to a FASTA string
pub fn write_fasta_string(records: &[FastaRecord]) -> String {
    records.iter().map(|record| record.to_string()).collect()
}
