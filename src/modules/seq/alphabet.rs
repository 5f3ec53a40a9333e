//! Biological alphabets
//!
//! Symbol tables in the order HMMER's digital encoding uses: canonical
//! residues first, then gap, degenerate codes, and the not-a-residue and
//! missing-data markers.

use std::fmt;

/// Sequence alphabet
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Alphabet {
    Amino,
    Dna,
    Rna,
}

const AMINO_SYMBOLS: &[u8] = b"ACDEFGHIKLMNPQRSTVWY-BJZOUX*~";
const DNA_SYMBOLS: &[u8] = b"ACGT-RYMKSWHBVDN*~";
const RNA_SYMBOLS: &[u8] = b"ACGU-RYMKSWHBVDN*~";

impl Alphabet {
    /// Parse the `ALPH` tag of a HMMER3 model
    pub fn from_hmm_tag(tag: &str) -> Option<Self> {
        match tag.trim().to_ascii_lowercase().as_str() {
            "amino" => Some(Alphabet::Amino),
            "dna" => Some(Alphabet::Dna),
            "rna" => Some(Alphabet::Rna),
            _ => None,
        }
    }

    /// All symbols, indexed by their digital code
    pub fn symbols(&self) -> &'static [u8] {
        match self {
            Alphabet::Amino => AMINO_SYMBOLS,
            Alphabet::Dna => DNA_SYMBOLS,
            Alphabet::Rna => RNA_SYMBOLS,
        }
    }

    /// Number of canonical residues
    pub fn canonical_size(&self) -> usize {
        match self {
            Alphabet::Amino => 20,
            Alphabet::Dna | Alphabet::Rna => 4,
        }
    }

    /// Digital code of `symbol`, case-insensitive
    pub fn digitize(&self, symbol: u8) -> Option<u8> {
        let upper = symbol.to_ascii_uppercase();
        self.symbols()
            .iter()
            .position(|&s| s == upper)
            .map(|code| code as u8)
    }

    /// Symbol for a digital code
    pub fn textize(&self, code: u8) -> Option<char> {
        self.symbols().get(code as usize).map(|&s| s as char)
    }

    /// Whether every character of `sequence` belongs to this alphabet
    pub fn is_valid_sequence(&self, sequence: &str) -> bool {
        sequence.bytes().all(|b| self.digitize(b).is_some())
    }

    pub fn name(&self) -> &'static str {
        match self {
            Alphabet::Amino => "amino",
            Alphabet::Dna => "DNA",
            Alphabet::Rna => "RNA",
        }
    }
}

impl fmt::Display for Alphabet {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hmm_tags() {
        assert_eq!(Alphabet::from_hmm_tag("amino"), Some(Alphabet::Amino));
        assert_eq!(Alphabet::from_hmm_tag("DNA"), Some(Alphabet::Dna));
        assert_eq!(Alphabet::from_hmm_tag(" rna "), Some(Alphabet::Rna));
        assert_eq!(Alphabet::from_hmm_tag("coins"), None);
    }

    #[test]
    fn test_digitize_is_case_insensitive_and_reversible() {
        let amino = Alphabet::Amino;
        assert_eq!(amino.digitize(b'A'), Some(0));
        assert_eq!(amino.digitize(b'y'), Some(19));
        assert_eq!(amino.digitize(b'-'), Some(20));
        assert_eq!(amino.digitize(b'1'), None);

        for code in 0..amino.symbols().len() as u8 {
            let symbol = amino.textize(code).unwrap();
            assert_eq!(amino.digitize(symbol as u8), Some(code));
        }
    }

    #[test]
    fn test_sequence_validation() {
        assert!(Alphabet::Amino.is_valid_sequence("MKVLAAGX"));
        assert!(!Alphabet::Dna.is_valid_sequence("ACGTU"));
        assert!(Alphabet::Rna.is_valid_sequence("acgun"));
        assert_eq!(Alphabet::Amino.canonical_size(), 20);
        assert_eq!(Alphabet::Dna.canonical_size(), 4);
    }
}
