//! Structured search results
//!
//! One [`QueryResult`] per query (a sequence for hmmscan, a profile for
//! hmmsearch), holding its [`Hit`]s in report order. Each hit carries the
//! [`Domain`]s that were aligned for it.

use serde::Serialize;

/// A single aligned domain of a hit
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Domain {
    /// 1-based domain number within the hit
    pub index: usize,
    /// Conditional E-value
    pub c_evalue: f64,
    /// Independent E-value
    pub i_evalue: f64,
    pub bitscore: f64,
    pub bias: f64,
    pub hmm_from: u64,
    pub hmm_to: u64,
    pub ali_from: u64,
    pub ali_to: u64,
    pub env_from: u64,
    pub env_to: u64,
    /// Mean posterior probability of the aligned residues
    pub accuracy: f64,
}

/// A target that scored against the query
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Hit {
    pub id: String,
    pub accession: Option<String>,
    pub description: Option<String>,
    /// Target length, when the report states it
    pub length: Option<u64>,
    /// Full-sequence E-value
    pub evalue: f64,
    /// Full-sequence bit score
    pub bitscore: f64,
    pub bias: f64,
    /// Number of domains the tool reported for this target
    pub domain_count: usize,
    pub domains: Vec<Domain>,
}

impl Hit {
    /// Create a hit with no domains yet
    pub fn new(id: &str, evalue: f64, bitscore: f64, bias: f64) -> Self {
        Self {
            id: id.to_string(),
            accession: None,
            description: None,
            length: None,
            evalue,
            bitscore,
            bias,
            domain_count: 0,
            domains: Vec::new(),
        }
    }
}

/// All hits for one query, in the order the tool reported them
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QueryResult {
    pub id: String,
    pub accession: Option<String>,
    pub description: Option<String>,
    /// Query length, when the report states it
    pub length: Option<u64>,
    pub hits: Vec<Hit>,
}

impl QueryResult {
    /// Create a result with no hits
    pub fn new(id: &str) -> Self {
        Self {
            id: id.to_string(),
            accession: None,
            description: None,
            length: None,
            hits: Vec::new(),
        }
    }

    /// First hit against the target `id`
    pub fn hit(&self, id: &str) -> Option<&Hit> {
        self.hits.iter().find(|hit| hit.id == id)
    }

    /// Total number of domains across all hits
    pub fn domain_count(&self) -> usize {
        self.hits.iter().map(|hit| hit.domains.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.hits.is_empty()
    }
}

/// Treat HMMER's `-` placeholder as absent
pub(crate) fn optional_field(value: &str) -> Option<String> {
    let value = value.trim();
    if value.is_empty() || value == "-" {
        None
    } else {
        Some(value.to_string())
    }
}
