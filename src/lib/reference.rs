//! Reference genome access for the BAQ adapter.
//!
//! The adapter consumes references through the [`ReferenceSource`] trait:
//! a windowed fetch over 1-based inclusive coordinates plus a contig length
//! query, which is all the window-extension logic needs. [`ReferenceReader`]
//! is the bundled implementation: following fgbio's approach the entire FASTA
//! is loaded into memory at startup so every fetch is an O(1) lookup followed
//! by a slice copy.

use crate::errors::BaqError;
use anyhow::{Context, Result};
use log::debug;
use noodles::core::Position;
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

/// Windowed access to reference sequences.
///
/// Coordinates are 1-based inclusive throughout, matching SAM conventions.
pub trait ReferenceSource {
    /// Fetches the bases of `[start, end]` on the named contig.
    ///
    /// # Errors
    ///
    /// Returns an error if the contig is unknown or the window falls outside
    /// of it.
    fn fetch(&self, name: &str, start: Position, end: Position) -> Result<Vec<u8>>;

    /// Returns the length of the named contig, or `None` if unknown.
    fn contig_length(&self, name: &str) -> Option<usize>;
}

/// A thread-safe reference reader with all sequences preloaded into memory.
///
/// Loading a full mammalian reference takes a few seconds and a few gigabytes;
/// in exchange every per-read fetch during BAQ calculation is a map lookup,
/// which matters when the same contigs are hit millions of times.
#[derive(Clone)]
pub struct ReferenceReader {
    /// All sequences keyed by name, shared across clones
    sequences: Arc<HashMap<String, Vec<u8>>>,
}

impl ReferenceReader {
    /// Creates a new reference reader, loading all sequences into memory.
    ///
    /// # Errors
    ///
    /// Returns an error if the file does not exist or cannot be parsed as
    /// FASTA.
    pub fn new<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        debug!("Reading reference FASTA into memory: {}", path.display());

        let mut reader = noodles::fasta::io::reader::Builder
            .build_from_path(path)
            .with_context(|| format!("Failed to open reference FASTA: {}", path.display()))?;

        let mut sequences = HashMap::new();
        for result in reader.records() {
            let record = result?;
            let name = std::str::from_utf8(record.name())?.to_string();
            let bases: &[u8] = record.sequence().as_ref();
            sequences.insert(name, bases.to_vec());
        }

        debug!("Loaded {} contigs into memory", sequences.len());
        Ok(Self { sequences: Arc::new(sequences) })
    }

    /// Creates a reader directly from named sequences, bypassing the
    /// filesystem.
    #[must_use]
    pub fn from_sequences<I, N, S>(sequences: I) -> Self
    where
        I: IntoIterator<Item = (N, S)>,
        N: Into<String>,
        S: Into<Vec<u8>>,
    {
        let map = sequences.into_iter().map(|(name, seq)| (name.into(), seq.into())).collect();
        Self { sequences: Arc::new(map) }
    }

    /// Number of contigs held by the reader.
    #[must_use]
    pub fn len(&self) -> usize {
        self.sequences.len()
    }

    /// Returns true if the reader holds no contigs.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.sequences.is_empty()
    }
}

impl ReferenceSource for ReferenceReader {
    fn fetch(&self, name: &str, start: Position, end: Position) -> Result<Vec<u8>> {
        let sequence = self
            .sequences
            .get(name)
            .ok_or_else(|| BaqError::ReferenceNotFound { ref_name: name.to_string() })?;

        // 1-based inclusive to 0-based half-open
        let start_idx = usize::from(start) - 1;
        let end_idx = usize::from(end);

        if end_idx > sequence.len() || start_idx >= end_idx {
            return Err(BaqError::RegionOutOfBounds {
                ref_name: name.to_string(),
                start: usize::from(start),
                end: usize::from(end),
                length: sequence.len(),
            }
            .into());
        }

        Ok(sequence[start_idx..end_idx].to_vec())
    }

    fn contig_length(&self, name: &str) -> Option<usize> {
        self.sequences.get(name).map(Vec::len)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sam::builder::create_test_fasta;

    #[test]
    fn test_fetch_subsequence() -> Result<()> {
        let fasta = create_test_fasta(&[("chr1", "ACGTACGTACGT"), ("chr2", "GGGGCCCCAAAA")])?;
        let reader = ReferenceReader::new(fasta.path())?;

        let seq = reader.fetch("chr1", Position::try_from(1)?, Position::try_from(4)?)?;
        assert_eq!(seq, b"ACGT");

        let seq = reader.fetch("chr2", Position::try_from(5)?, Position::try_from(8)?)?;
        assert_eq!(seq, b"CCCC");

        Ok(())
    }

    #[test]
    fn test_contig_length() -> Result<()> {
        let fasta = create_test_fasta(&[("chr1", "ACGTACGTACGT")])?;
        let reader = ReferenceReader::new(fasta.path())?;

        assert_eq!(reader.contig_length("chr1"), Some(12));
        assert_eq!(reader.contig_length("chr9"), None);

        Ok(())
    }

    #[test]
    fn test_fetch_single_base_and_full_sequence() -> Result<()> {
        let fasta = create_test_fasta(&[("chr1", "ACGTN")])?;
        let reader = ReferenceReader::new(fasta.path())?;

        let seq = reader.fetch("chr1", Position::try_from(5)?, Position::try_from(5)?)?;
        assert_eq!(seq, b"N");

        let seq = reader.fetch("chr1", Position::try_from(1)?, Position::try_from(5)?)?;
        assert_eq!(seq, b"ACGTN");

        Ok(())
    }

    #[test]
    fn test_nonexistent_sequence() {
        let reader = ReferenceReader::from_sequences([("chr1", b"ACGT".to_vec())]);
        let result =
            reader.fetch("chr999", Position::try_from(1).unwrap(), Position::try_from(4).unwrap());
        assert!(result.is_err());
    }

    #[test]
    fn test_out_of_bounds() {
        let reader = ReferenceReader::from_sequences([("chr1", b"ACGTACGTACGT".to_vec())]);
        let result =
            reader.fetch("chr1", Position::try_from(1).unwrap(), Position::try_from(100).unwrap());
        assert!(result.is_err());
    }

    #[test]
    fn test_from_sequences() {
        let reader = ReferenceReader::from_sequences([
            ("chr1", b"AAAA".to_vec()),
            ("chr2", b"CCCC".to_vec()),
        ]);
        assert_eq!(reader.len(), 2);
        assert!(!reader.is_empty());
        assert_eq!(reader.contig_length("chr2"), Some(4));
    }

    #[test]
    fn test_case_preserved() -> Result<()> {
        let fasta = create_test_fasta(&[("chr1", "AcGtNn")])?;
        let reader = ReferenceReader::new(fasta.path())?;
        let seq = reader.fetch("chr1", Position::try_from(1)?, Position::try_from(6)?)?;
        assert_eq!(seq, b"AcGtNn");
        Ok(())
    }
}
