//! Digitally encoded sequences
//!
//! The embedded search library works on residues already mapped to
//! alphabet codes, the way HMMER's own readers hand them over.

use crate::modules::io::FastaRecord;
use crate::modules::seq::{Alphabet, SequenceError, SequenceResult};

/// A named sequence encoded against an [`Alphabet`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DigitalSequence {
    pub name: String,
    pub description: Option<String>,
    pub alphabet: Alphabet,
    residues: Vec<u8>,
}

impl DigitalSequence {
    /// Encode `record` against `alphabet`, rejecting unknown symbols
    pub fn from_record(record: &FastaRecord, alphabet: Alphabet) -> SequenceResult<Self> {
        let residues = record
            .sequence
            .bytes()
            .enumerate()
            .map(|(pos, symbol)| {
                alphabet.digitize(symbol).ok_or_else(|| {
                    SequenceError::InvalidSequence(format!(
                        "{}: symbol {:?} at position {} is not {}",
                        record.id,
                        symbol as char,
                        pos + 1,
                        alphabet
                    ))
                })
            })
            .collect::<SequenceResult<Vec<u8>>>()?;

        Ok(Self {
            name: record.id.clone(),
            description: record.description.clone(),
            alphabet,
            residues,
        })
    }

    /// Encode every record of a FASTA text
    pub fn from_fasta(records: &[FastaRecord], alphabet: Alphabet) -> SequenceResult<Vec<Self>> {
        records
            .iter()
            .map(|record| Self::from_record(record, alphabet))
            .collect()
    }

    /// Residue codes
    pub fn residues(&self) -> &[u8] {
        &self.residues
    }

    pub fn len(&self) -> usize {
        self.residues.len()
    }

    pub fn is_empty(&self) -> bool {
        self.residues.is_empty()
    }

    /// Decode back to text
    pub fn to_text(&self) -> String {
        self.residues
            .iter()
            .filter_map(|&code| self.alphabet.textize(code))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encodes_and_decodes() {
        let record = FastaRecord::new("seq1", Some("test protein"), "mkvLA");
        let digital = DigitalSequence::from_record(&record, Alphabet::Amino).unwrap();

        assert_eq!(digital.name, "seq1");
        assert_eq!(digital.description.as_deref(), Some("test protein"));
        assert_eq!(digital.len(), 5);
        assert_eq!(digital.to_text(), "MKVLA");
    }

    #[test]
    fn test_rejects_foreign_symbols() {
        let record = FastaRecord::new("seq1", None, "ACGT1");
        let err = DigitalSequence::from_record(&record, Alphabet::Dna).unwrap_err();

        match err {
            SequenceError::InvalidSequence(msg) => assert!(msg.contains("position 5")),
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn test_from_fasta_stops_at_first_bad_record() {
        let records = vec![
            FastaRecord::new("ok", None, "MKV"),
            FastaRecord::new("bad", None, "MK#"),
        ];
        assert!(DigitalSequence::from_fasta(&records, Alphabet::Amino).is_err());
    }
}
