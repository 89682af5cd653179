//! Builders for creating test SAM records and reference files.
//!
//! [`RecordBuilder`] offers a fluent API for constructing single `RecordBuf`
//! values in tests; `create_test_header` and `create_test_fasta` build the
//! matching header and on-disk reference fixtures.

use bstr::BString;
use noodles::core::Position;
use noodles::sam::Header;
use noodles::sam::alignment::record::cigar::Op;
use noodles::sam::alignment::record::cigar::op::Kind;
use noodles::sam::alignment::record::data::field::Tag;
use noodles::sam::alignment::record::{Flags, MappingQuality};
use noodles::sam::alignment::record_buf::data::field::Value as BufValue;
use noodles::sam::alignment::record_buf::{QualityScores, RecordBuf, Sequence};
use noodles::sam::header::record::value::Map;
use noodles::sam::header::record::value::map::ReferenceSequence;
use std::num::NonZeroUsize;
use tempfile::NamedTempFile;

/// Default base quality assigned when no qualities are given.
pub const DEFAULT_BASE_QUALITY: u8 = 30;

/// Default mapping quality for mapped records.
pub const DEFAULT_MAPQ: u8 = 60;

/// Builder for creating individual SAM/BAM records.
///
/// All fields have sensible defaults; a record is mapped when an alignment
/// start is set and unmapped otherwise.
///
/// # Examples
///
/// ```rust
/// use fgbaq_lib::sam::builder::RecordBuilder;
/// use noodles::sam::alignment::record::cigar::Cigar;
///
/// let record = RecordBuilder::mapped_read()
///     .name("read1")
///     .sequence("ACGTACGT")
///     .alignment_start(100)
///     .build();
///
/// assert_eq!(record.reference_sequence_id(), Some(0));
/// assert!(!record.cigar().is_empty()); // auto-generated as "8M"
/// ```
#[derive(Debug, Default)]
pub struct RecordBuilder {
    name: Option<String>,
    flags: Flags,
    reference_sequence_id: Option<usize>,
    alignment_start: Option<usize>,
    cigar: Option<String>,
    sequence: Vec<u8>,
    qualities: Vec<u8>,
    tags: Vec<(Tag, BufValue)>,
}

impl RecordBuilder {
    /// Creates a new builder for an unmapped record.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a builder pre-configured for a mapped read on the first
    /// reference sequence.
    #[must_use]
    pub fn mapped_read() -> Self {
        Self { reference_sequence_id: Some(0), ..Self::default() }
    }

    /// Sets the read name.
    #[must_use]
    pub fn name(mut self, name: &str) -> Self {
        self.name = Some(name.to_string());
        self
    }

    /// Sets the bases; qualities default to Q30 if not set explicitly.
    #[must_use]
    pub fn sequence(mut self, bases: &str) -> Self {
        self.sequence = bases.as_bytes().to_vec();
        if self.qualities.is_empty() {
            self.qualities = vec![DEFAULT_BASE_QUALITY; bases.len()];
        }
        self
    }

    /// Sets the quality scores.
    #[must_use]
    pub fn qualities(mut self, quals: &[u8]) -> Self {
        self.qualities = quals.to_vec();
        self
    }

    /// Sets the CIGAR string; defaults to all-match over the sequence.
    #[must_use]
    pub fn cigar(mut self, cigar: &str) -> Self {
        self.cigar = Some(cigar.to_string());
        self
    }

    /// Sets the reference sequence index.
    #[must_use]
    pub fn reference_sequence_id(mut self, id: usize) -> Self {
        self.reference_sequence_id = Some(id);
        self
    }

    /// Sets the 1-based alignment start, marking the record as mapped.
    #[must_use]
    pub fn alignment_start(mut self, start: usize) -> Self {
        self.alignment_start = Some(start);
        self
    }

    /// Marks the record as a duplicate.
    #[must_use]
    pub fn duplicate(mut self) -> Self {
        self.flags |= Flags::DUPLICATE;
        self
    }

    /// Marks the record as failing vendor quality checks.
    #[must_use]
    pub fn qc_fail(mut self) -> Self {
        self.flags |= Flags::QC_FAIL;
        self
    }

    /// Adds a string attribute.
    #[must_use]
    pub fn tag(mut self, tag: &str, value: &str) -> Self {
        assert_eq!(tag.len(), 2, "tag names are two characters");
        let tag = Tag::new(tag.as_bytes()[0], tag.as_bytes()[1]);
        self.tags.push((tag, BufValue::from(value.to_string())));
        self
    }

    /// Builds the record.
    ///
    /// # Panics
    ///
    /// Panics if the alignment start or CIGAR string is invalid.
    #[must_use]
    pub fn build(self) -> RecordBuf {
        let name = self.name.unwrap_or_else(|| "read".to_string());
        let cigar = self.cigar.unwrap_or_else(|| format!("{}M", self.sequence.len()));
        let mapped = self.alignment_start.is_some();

        let mut record = RecordBuf::default();
        *record.name_mut() = Some(BString::from(name.as_bytes()));
        *record.sequence_mut() = Sequence::from(self.sequence);
        *record.quality_scores_mut() = QualityScores::from(self.qualities);

        let mut flags = self.flags;
        if !mapped {
            flags |= Flags::UNMAPPED;
        }
        *record.flags_mut() = flags;

        if mapped {
            *record.reference_sequence_id_mut() = Some(self.reference_sequence_id.unwrap_or(0));
            *record.alignment_start_mut() =
                Some(Position::try_from(self.alignment_start.unwrap()).unwrap());
            *record.cigar_mut() = parse_cigar(&cigar).into_iter().collect();
            *record.mapping_quality_mut() = Some(MappingQuality::try_from(DEFAULT_MAPQ).unwrap());
        }

        for (tag, value) in self.tags {
            record.data_mut().insert(tag, value);
        }

        record
    }
}

/// Parses a CIGAR string into a vector of operations.
///
/// # Panics
///
/// Panics if the CIGAR string contains invalid characters or formatting.
#[must_use]
pub fn parse_cigar(cigar_str: &str) -> Vec<Op> {
    let mut ops = Vec::new();
    let mut num_str = String::new();

    for c in cigar_str.chars() {
        if c.is_ascii_digit() {
            num_str.push(c);
        } else {
            let len: usize = num_str.parse().expect("Invalid CIGAR: expected number");
            let kind = match c {
                'M' => Kind::Match,
                'I' => Kind::Insertion,
                'D' => Kind::Deletion,
                'N' => Kind::Skip,
                'S' => Kind::SoftClip,
                'H' => Kind::HardClip,
                'P' => Kind::Pad,
                '=' => Kind::SequenceMatch,
                'X' => Kind::SequenceMismatch,
                _ => panic!("Unknown CIGAR operation: {c}"),
            };
            ops.push(Op::new(kind, len));
            num_str.clear();
        }
    }

    ops
}

/// Creates a SAM header carrying the given reference sequences.
///
/// # Panics
///
/// Panics if a reference sequence length is zero.
#[must_use]
pub fn create_test_header(reference_sequences: &[(&str, usize)]) -> Header {
    let mut builder = Header::builder();
    for (name, length) in reference_sequences {
        let map = Map::<ReferenceSequence>::new(NonZeroUsize::new(*length).unwrap());
        builder = builder.add_reference_sequence(BString::from(*name), map);
    }
    builder.build()
}

/// Creates a temporary FASTA file with the given named sequences.
///
/// # Errors
///
/// Returns an error if the temporary file cannot be created or written.
pub fn create_test_fasta(sequences: &[(&str, &str)]) -> std::io::Result<NamedTempFile> {
    use std::io::Write;
    let mut file = NamedTempFile::new()?;
    for (name, seq) in sequences {
        writeln!(file, ">{name}")?;
        writeln!(file, "{seq}")?;
    }
    file.flush()?;
    Ok(file)
}
