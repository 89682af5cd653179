//! Base Alignment Quality (BAQ) calculation for aligned reads.
//!
//! BAQ caps each base quality by the phred-scaled posterior probability that
//! the base is correctly aligned, computed by the banded HMM in
//! [`crate::hmm`]. Bases near indels or inside ambiguously placed stretches
//! get their qualities pulled down; confidently placed bases keep their raw
//! quality. The result is either written back to the record as the `BQ`
//! attribute, copied over the record's qualities, or returned to the caller,
//! depending on the configured [`QualityMode`].
//!
//! The `BQ` attribute stores one byte per read base: `rawQual[i] + 64 -
//! bq[i]`, so a byte of 64 (`@`) means "no adjustment". The codec in this
//! module round-trips losslessly whenever each delta fits in a byte.

use crate::dna::encode_bases;
use crate::errors::BaqError;
use crate::hmm::{
    DEFAULT_BAND_WIDTH, DEFAULT_GAP_EXTEND, DEFAULT_GAP_OPEN, DEFAULT_MIN_BASE_QUAL, HmmGlocal,
    state_aligned_position, state_is_indel,
};
use crate::reference::ReferenceSource;
use anyhow::{Context, Result};
use bstr::BString;
use noodles::core::Position;
use noodles::sam::Header;
use noodles::sam::alignment::RecordBuf;
use noodles::sam::alignment::record::cigar::op::Kind;
use noodles::sam::alignment::record::data::field::Tag;
use noodles::sam::alignment::record_buf::QualityScores;
use noodles::sam::alignment::record_buf::data::field::Value;

/// The attribute under which BAQ deltas are persisted.
fn baq_tag() -> Tag {
    Tag::new(b'B', b'Q')
}

/// Whether and when the BAQ is computed for a read.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CalculationMode {
    /// Do not apply BAQ at all
    None,
    /// Run the HMM only for reads that carry no `BQ` tag
    AsNecessary,
    /// Run the HMM for every read, regardless of any existing tag
    Recalculate,
}

/// What to do with a computed BAQ vector.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QualityMode {
    /// Store the deltas as the `BQ` attribute, leaving qualities alone
    AddTag,
    /// Overwrite the record's base qualities directly
    OverwriteQuals,
    /// Leave the record untouched and only return the capped qualities
    DontModify,
}

/// Per-read output of the HMM adapter.
#[derive(Debug, Clone)]
pub struct BaqResult {
    /// The reference window handed to the decoder
    pub ref_bases: Vec<u8>,
    /// The read's original base qualities
    pub raw_quals: Vec<u8>,
    /// The read's bases
    pub read_bases: Vec<u8>,
    /// Window start relative to the alignment start; non-positive when the
    /// window extends left of the alignment
    pub ref_offset: i64,
    /// Packed state word per read base
    pub state: Vec<i32>,
    /// Capped per-base qualities
    pub bq: Vec<u8>,
}

/// Returns true if the read is ineligible for BAQ: unmapped, failing vendor
/// quality checks, or a duplicate.
#[must_use]
pub fn exclude_read_from_baq(record: &RecordBuf) -> bool {
    let flags = record.flags();
    flags.is_unmapped() || flags.is_qc_fail() || flags.is_duplicate()
}

/// Returns the raw bytes of the read's `BQ` attribute, if present.
#[must_use]
pub fn get_baq_tag(record: &RecordBuf) -> Option<Vec<u8>> {
    match record.data().get(&baq_tag()) {
        Some(Value::String(s)) => Some(s.to_vec()),
        _ => None,
    }
}

/// Returns true if the read carries a `BQ` attribute.
#[must_use]
pub fn has_baq_tag(record: &RecordBuf) -> bool {
    matches!(record.data().get(&baq_tag()), Some(Value::String(_)))
}

/// Encodes capped qualities as `BQ` tag bytes: `rawQual[i] + 64 - bq[i]`.
#[must_use]
pub fn encode_baq_tag(raw_quals: &[u8], bq: &[u8]) -> Vec<u8> {
    raw_quals
        .iter()
        .zip(bq)
        .map(|(&raw, &capped)| (i32::from(raw) + 64 - i32::from(capped)) as u8)
        .collect()
}

/// Encodes `bq` against the record's qualities and stores it as the `BQ`
/// attribute.
pub fn add_baq_tag(record: &mut RecordBuf, bq: &[u8]) {
    let tag_bytes = encode_baq_tag(record.quality_scores().as_ref(), bq);
    record.data_mut().insert(baq_tag(), Value::String(BString::from(tag_bytes)));
}

/// Decodes the read's `BQ` attribute into capped qualities.
///
/// When `overwrite_quals` is set the decoded qualities also replace the
/// record's quality scores. Without a tag, the raw qualities are returned
/// unchanged if `use_raw_if_no_tag` is set.
///
/// # Errors
///
/// Returns [`BaqError::MissingBaqTag`] when the tag is absent and
/// `use_raw_if_no_tag` is false, and [`BaqError::InvalidInput`] when the tag
/// length disagrees with the read length.
pub fn calc_baq_from_tag(
    record: &mut RecordBuf,
    overwrite_quals: bool,
    use_raw_if_no_tag: bool,
) -> Result<Vec<u8>> {
    let raw_quals = record.quality_scores().as_ref().to_vec();

    let Some(tag) = get_baq_tag(record) else {
        if use_raw_if_no_tag {
            return Ok(raw_quals);
        }
        return Err(BaqError::MissingBaqTag { read_name: read_name(record) }.into());
    };

    if tag.len() != raw_quals.len() {
        return Err(BaqError::InvalidInput {
            reason: format!(
                "BQ tag length {} != read length {} on read '{}'",
                tag.len(),
                raw_quals.len(),
                read_name(record)
            ),
        }
        .into());
    }

    let new_quals: Vec<u8> = raw_quals
        .iter()
        .zip(&tag)
        .map(|(&raw, &t)| {
            let val = i32::from(raw) - (i32::from(t) - 64);
            if val < 0 { 0 } else { val as u8 }
        })
        .collect();

    if overwrite_quals {
        *record.quality_scores_mut() = QualityScores::from(new_quals.clone());
    }

    Ok(new_quals)
}

/// Display name for error messages.
fn read_name(record: &RecordBuf) -> String {
    record.name().map_or_else(|| "<unnamed>".to_string(), |n| n.to_string())
}

/// BAQ calculator: owns the HMM configuration and drives the per-read
/// calculation.
///
/// Stateless between reads; a single instance may be shared across worker
/// threads as long as each worker owns the record it is updating.
#[derive(Debug, Clone)]
pub struct BaqCalculator {
    hmm: HmmGlocal,
}

impl Default for BaqCalculator {
    fn default() -> Self {
        Self::new(DEFAULT_GAP_OPEN, DEFAULT_GAP_EXTEND, DEFAULT_BAND_WIDTH, DEFAULT_MIN_BASE_QUAL)
    }
}

impl BaqCalculator {
    /// Creates a calculator with explicit gap open/extension probabilities,
    /// band width, and quality floor.
    #[must_use]
    pub fn new(gap_open: f64, gap_extend: f64, band_width: usize, min_base_qual: u8) -> Self {
        Self { hmm: HmmGlocal::new(gap_open, gap_extend, band_width, min_base_qual) }
    }

    /// The underlying HMM decoder.
    #[must_use]
    pub fn hmm(&self) -> &HmmGlocal {
        &self.hmm
    }

    /// Computes the BAQ for a read, fetching the reference window from
    /// `reference`.
    ///
    /// The window is the alignment span widened by half the band width plus
    /// any leading/trailing insertion, so the decoder can consider placements
    /// either side of the reported alignment. Returns `Ok(None)` when the
    /// widened window would run past the end of the contig or the CIGAR
    /// contains an operator the calculation cannot handle; callers treat that
    /// as "skip this read".
    ///
    /// # Errors
    ///
    /// Returns an error when the record's reference sequence is not known to
    /// the header or the provider, or when the decoder rejects its inputs.
    pub fn calc_baq_from_hmm<R: ReferenceSource>(
        &self,
        record: &RecordBuf,
        header: &Header,
        reference: &R,
    ) -> Result<Option<BaqResult>> {
        let Some(align_start) = record.alignment_start().map(usize::from) else {
            return Ok(None);
        };
        let Some(align_end) = crate::sam::record_utils::alignment_end(record) else {
            return Ok(None);
        };
        let ref_name = reference_name(record, header)?;

        let offset = (self.hmm.band_width() / 2) as i64;
        let leading = crate::sam::record_utils::leading_insertion_length(record) as i64;
        let trailing = crate::sam::record_utils::trailing_insertion_length(record) as i64;
        let start = (align_start as i64 - offset - leading).max(1);
        let stop = align_end as i64 + offset + trailing;

        let contig_length = reference
            .contig_length(&ref_name)
            .ok_or_else(|| BaqError::ReferenceNotFound { ref_name: ref_name.clone() })?;
        if stop > contig_length as i64 {
            return Ok(None);
        }

        let window = reference.fetch(
            &ref_name,
            Position::try_from(start as usize)?,
            Position::try_from(stop as usize)?,
        )?;

        self.calc_baq_from_hmm_at(record, &window, start - align_start as i64)
    }

    /// Computes the BAQ for a read against an already-fetched reference
    /// window.
    ///
    /// `ref_offset` is the window start relative to the alignment start
    /// (non-positive when the window begins left of the alignment). After
    /// decoding, the CIGAR walk caps each base: inserted and soft-clipped
    /// bases keep their raw quality, and an aligned base whose most probable
    /// state is an insertion or a different column is zeroed outright.
    ///
    /// # Errors
    ///
    /// Returns an error when the CIGAR's read length disagrees with the
    /// sequence or the decoder rejects its inputs.
    pub fn calc_baq_from_hmm_at(
        &self,
        record: &RecordBuf,
        ref_bases: &[u8],
        ref_offset: i64,
    ) -> Result<Option<BaqResult>> {
        let read_bases = record.sequence().as_ref().to_vec();
        let raw_quals = record.quality_scores().as_ref().to_vec();

        let cigar_read_len: usize = record
            .cigar()
            .as_ref()
            .iter()
            .filter_map(|op| match op.kind() {
                Kind::Match
                | Kind::SequenceMatch
                | Kind::SequenceMismatch
                | Kind::Insertion
                | Kind::SoftClip => Some(op.len()),
                _ => None,
            })
            .sum();
        if cigar_read_len != read_bases.len() {
            return Err(BaqError::InvalidInput {
                reason: format!(
                    "CIGAR read length {cigar_read_len} != sequence length {} on read '{}'",
                    read_bases.len(),
                    read_name(record)
                ),
            }
            .into());
        }

        let mut state = vec![0i32; read_bases.len()];
        let mut bq = vec![0u8; read_bases.len()];
        self.hmm.decode(
            &encode_bases(ref_bases),
            &encode_bases(&read_bases),
            &raw_quals,
            &mut state,
            &mut bq,
        )?;

        // Cap the posterior qualities while walking the CIGAR.
        let mut read_i = 0usize;
        let mut ref_i = 0i64;
        for op in record.cigar().as_ref() {
            let len = op.len();
            match op.kind() {
                // Cannot handle reference skips
                Kind::Skip => return Ok(None),
                Kind::HardClip | Kind::Pad => {}
                Kind::Insertion | Kind::SoftClip => {
                    // Inserted and soft-clipped bases keep their raw quality.
                    bq[read_i..read_i + len].copy_from_slice(&raw_quals[read_i..read_i + len]);
                    read_i += len;
                }
                Kind::Deletion => ref_i += len as i64,
                Kind::Match | Kind::SequenceMatch | Kind::SequenceMismatch => {
                    for i in read_i..read_i + len {
                        let expected = ref_i - ref_offset + (i - read_i) as i64;
                        let aligned = i64::from(state_aligned_position(state[i]));
                        if state_is_indel(state[i]) || aligned != expected {
                            // The base aligns best through an indel or to a
                            // different column than its CIGAR placement.
                            bq[i] = 0;
                        } else {
                            bq[i] = bq[i].min(raw_quals[i]);
                        }
                    }
                    read_i += len;
                    ref_i += len as i64;
                }
            }
        }

        Ok(Some(BaqResult {
            ref_bases: ref_bases.to_vec(),
            raw_quals,
            read_bases,
            ref_offset,
            state,
            bq,
        }))
    }

    /// Applies the BAQ calculation to a read according to the calculation and
    /// quality modes, returning the capped qualities for use when the record
    /// itself is not modified.
    ///
    /// Reads excluded by [`exclude_read_from_baq`], reads whose reference
    /// window cannot be fetched, and reads with unusable CIGARs pass through
    /// unchanged; a batch is never aborted because of a single read.
    ///
    /// # Errors
    ///
    /// Propagates decoder and provider errors; callers processing batches
    /// should log and continue.
    pub fn baq_read<R: ReferenceSource>(
        &self,
        record: &mut RecordBuf,
        header: &Header,
        reference: &R,
        calculation: CalculationMode,
        quality_mode: QualityMode,
    ) -> Result<Vec<u8>> {
        let mut baq_quals = record.quality_scores().as_ref().to_vec();

        if calculation == CalculationMode::None || exclude_read_from_baq(record) {
            return Ok(baq_quals);
        }

        if calculation == CalculationMode::Recalculate || !has_baq_tag(record) {
            if let Some(result) = self.calc_baq_from_hmm(record, header, reference)? {
                match quality_mode {
                    QualityMode::AddTag => add_baq_tag(record, &result.bq),
                    QualityMode::OverwriteQuals => {
                        *record.quality_scores_mut() = QualityScores::from(result.bq.clone());
                        baq_quals = result.bq;
                    }
                    QualityMode::DontModify => baq_quals = result.bq,
                }
            }
        } else if quality_mode == QualityMode::OverwriteQuals {
            // A tag is already present; take the capped qualities from it.
            baq_quals = calc_baq_from_tag(record, true, false)?;
        }

        Ok(baq_quals)
    }
}

/// Resolves the record's reference sequence name through the header.
fn reference_name(record: &RecordBuf, header: &Header) -> Result<String> {
    let id = record
        .reference_sequence_id()
        .context("mapped record has no reference sequence id")?;
    let (name, _) = header
        .reference_sequences()
        .get_index(id)
        .with_context(|| format!("reference sequence id {id} not present in header"))?;
    Ok(String::from_utf8(name.to_vec())?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reference::ReferenceReader;
    use crate::sam::builder::{RecordBuilder, create_test_header};

    // Contig with the read target ACGTA in the middle so default window
    // widening stays in bounds.
    const CONTIG: &str = "TTTTTACGTATTTTT";

    fn test_reference() -> ReferenceReader {
        ReferenceReader::from_sequences([("chr1", CONTIG.as_bytes().to_vec())])
    }

    fn test_header() -> Header {
        create_test_header(&[("chr1", CONTIG.len())])
    }

    fn perfect_read() -> RecordBuf {
        RecordBuilder::mapped_read()
            .name("perfect")
            .sequence("ACGTA")
            .alignment_start(6)
            .cigar("5M")
            .build()
    }

    #[test]
    fn test_encode_baq_tag_values() {
        // S5: literal codec bytes
        let tag = encode_baq_tag(&[40, 40, 40], &[40, 20, 10]);
        assert_eq!(tag, vec![64, 84, 94]);
    }

    #[test]
    fn test_tag_codec_round_trip() {
        // Any bq with bq[i] <= raw[i] and raw[i] - bq[i] <= 64 survives the
        // round trip exactly.
        let raw = [40u8, 40, 40, 93, 64, 2];
        let bq = [40u8, 20, 10, 29, 0, 0];
        let mut record = RecordBuilder::mapped_read()
            .name("codec")
            .sequence("ACGTAC")
            .qualities(&raw)
            .alignment_start(1)
            .build();
        add_baq_tag(&mut record, &bq);

        let decoded = calc_baq_from_tag(&mut record, false, false).unwrap();
        assert_eq!(decoded, bq.to_vec());
        // Qualities untouched without overwrite
        assert_eq!(record.quality_scores().as_ref(), &raw);
    }

    #[test]
    fn test_tag_decode_overwrites_quals() {
        let mut record = RecordBuilder::mapped_read()
            .name("codec")
            .sequence("ACG")
            .qualities(&[40, 40, 40])
            .alignment_start(1)
            .build();
        add_baq_tag(&mut record, &[40, 20, 10]);

        let decoded = calc_baq_from_tag(&mut record, true, false).unwrap();
        assert_eq!(decoded, vec![40, 20, 10]);
        assert_eq!(record.quality_scores().as_ref(), &[40, 20, 10]);
    }

    #[test]
    fn test_tag_decode_clamps_at_zero() {
        let mut record = RecordBuilder::mapped_read()
            .name("codec")
            .sequence("AC")
            .qualities(&[10, 10])
            .alignment_start(1)
            .build();
        // Deltas larger than the raw quality decode to zero, not negative
        record
            .data_mut()
            .insert(baq_tag(), Value::String(BString::from(vec![64 + 20, 64])));
        let decoded = calc_baq_from_tag(&mut record, false, false).unwrap();
        assert_eq!(decoded, vec![0, 10]);
    }

    #[test]
    fn test_missing_tag_strict_and_lenient() {
        let mut record = RecordBuilder::mapped_read()
            .name("untagged")
            .sequence("ACG")
            .qualities(&[30, 30, 30])
            .alignment_start(1)
            .build();

        let quals = calc_baq_from_tag(&mut record, false, true).unwrap();
        assert_eq!(quals, vec![30, 30, 30]);

        let err = calc_baq_from_tag(&mut record, false, false).unwrap_err();
        assert!(err.to_string().contains("untagged"));
    }

    #[test]
    fn test_tag_length_mismatch_rejected() {
        let mut record = RecordBuilder::mapped_read()
            .name("short_tag")
            .sequence("ACGT")
            .alignment_start(1)
            .build();
        record.data_mut().insert(baq_tag(), Value::String(BString::from("@@")));
        assert!(calc_baq_from_tag(&mut record, false, false).is_err());
    }

    #[test]
    fn test_exclusion_predicate() {
        let unmapped = RecordBuilder::new().name("u").sequence("ACGT").build();
        assert!(exclude_read_from_baq(&unmapped));

        let dup = RecordBuilder::mapped_read()
            .name("d")
            .sequence("ACGT")
            .alignment_start(1)
            .duplicate()
            .build();
        assert!(exclude_read_from_baq(&dup));

        let qc = RecordBuilder::mapped_read()
            .name("q")
            .sequence("ACGT")
            .alignment_start(1)
            .qc_fail()
            .build();
        assert!(exclude_read_from_baq(&qc));

        let ok = RecordBuilder::mapped_read()
            .name("ok")
            .sequence("ACGT")
            .alignment_start(1)
            .build();
        assert!(!exclude_read_from_baq(&ok));
    }

    #[test]
    fn test_perfect_match_keeps_raw_qualities() {
        // S1 through the adapter: every base capped back to its raw quality.
        let calculator = BaqCalculator::default();
        let result = calculator
            .calc_baq_from_hmm(&perfect_read(), &test_header(), &test_reference())
            .unwrap()
            .expect("window fits the contig");

        assert_eq!(result.ref_offset, -3);
        assert_eq!(result.bq, vec![30; 5]);
        for (i, &st) in result.state.iter().enumerate() {
            assert!(!state_is_indel(st));
            // Window starts three bases left of the alignment
            assert_eq!(state_aligned_position(st) as i64, i as i64 + 3);
        }
    }

    #[test]
    fn test_mismatch_is_downweighted_but_capped_elsewhere() {
        // S2 through the adapter
        let record = RecordBuilder::mapped_read()
            .name("mismatch")
            .sequence("ACATA")
            .alignment_start(6)
            .cigar("5M")
            .build();
        let calculator = BaqCalculator::default();
        let result = calculator
            .calc_baq_from_hmm(&record, &test_header(), &test_reference())
            .unwrap()
            .unwrap();

        assert!(result.bq[2] < 30, "mismatched base got bq {}", result.bq[2]);
        for (i, &bq) in result.bq.iter().enumerate() {
            if i != 2 {
                assert!(result.bq[2] < bq, "mismatch should carry the weakest posterior");
            }
        }
        // Monotone cap holds everywhere
        for (bq, raw) in result.bq.iter().zip(&result.raw_quals) {
            assert!(bq <= raw);
        }
    }

    #[test]
    fn test_insertion_run_passes_raw_quality_through() {
        // S3: the inserted base keeps its raw quality after the CIGAR walk.
        let record = RecordBuilder::mapped_read()
            .name("ins")
            .sequence("ACGGTA")
            .qualities(&[30, 30, 25, 30, 30, 30])
            .alignment_start(1)
            .cigar("2M1I3M")
            .build();
        let calculator = BaqCalculator::default();
        let result = calculator
            .calc_baq_from_hmm_at(&record, b"ACGTA", 0)
            .unwrap()
            .unwrap();

        assert_eq!(result.bq[2], 25);
        for (bq, raw) in result.bq.iter().zip(&result.raw_quals) {
            assert!(bq <= raw);
        }
    }

    #[test]
    fn test_soft_clip_passes_raw_quality_through() {
        // Property 6: soft-clipped runs behave exactly like insertions.
        let record = RecordBuilder::mapped_read()
            .name("clip")
            .sequence("TTACGTA")
            .qualities(&[11, 12, 30, 30, 30, 30, 30])
            .alignment_start(6)
            .cigar("2S5M")
            .build();
        let calculator = BaqCalculator::default();
        let result = calculator
            .calc_baq_from_hmm(&record, &test_header(), &test_reference())
            .unwrap()
            .unwrap();

        assert_eq!(result.bq[0], 11);
        assert_eq!(result.bq[1], 12);
    }

    #[test]
    fn test_ambiguous_reference_column_keeps_raw_quality() {
        // S4: an N column carries no evidence against the base.
        let record = RecordBuilder::mapped_read()
            .name("ambig")
            .sequence("ACGTA")
            .alignment_start(1)
            .cigar("5M")
            .build();
        let calculator = BaqCalculator::default();
        let result = calculator
            .calc_baq_from_hmm_at(&record, b"ACNTA", 0)
            .unwrap()
            .unwrap();
        assert_eq!(result.bq[2], 30);
    }

    #[test]
    fn test_skip_operator_returns_no_result() {
        // S6: an N CIGAR operator aborts the calculation.
        let record = RecordBuilder::mapped_read()
            .name("skip")
            .sequence("ACGTA")
            .alignment_start(6)
            .cigar("2M10N3M")
            .build();
        let calculator = BaqCalculator::default();
        let result = calculator.calc_baq_from_hmm_at(&record, CONTIG.as_bytes(), -5).unwrap();
        assert!(result.is_none());
    }

    #[test]
    fn test_window_past_contig_end_skips_read() {
        // The widened window would run past the contig, so the read is
        // skipped rather than failed.
        let record = RecordBuilder::mapped_read()
            .name("edge")
            .sequence("TTTTT")
            .alignment_start(11)
            .cigar("5M")
            .build();
        let calculator = BaqCalculator::default();
        let result =
            calculator.calc_baq_from_hmm(&record, &test_header(), &test_reference()).unwrap();
        assert!(result.is_none());
    }

    #[test]
    fn test_deletion_read_respects_monotone_cap() {
        // Property 1 on an indel read: never increase a quality.
        let contig = "TTTTTACGTACGTATTTTT";
        let reference = ReferenceReader::from_sequences([("chr1", contig.as_bytes().to_vec())]);
        let header = create_test_header(&[("chr1", contig.len())]);
        // Read matches ACGTACGTA with the central A deleted
        let record = RecordBuilder::mapped_read()
            .name("del")
            .sequence("ACGTCGTA")
            .alignment_start(6)
            .cigar("4M1D4M")
            .build();
        let calculator = BaqCalculator::default();
        let result = calculator.calc_baq_from_hmm(&record, &header, &reference).unwrap().unwrap();

        assert_eq!(result.bq.len(), 8);
        for (bq, raw) in result.bq.iter().zip(&result.raw_quals) {
            assert!(bq <= raw, "bq {bq} exceeds raw {raw}");
        }
    }

    #[test]
    fn test_cigar_sequence_length_mismatch_rejected() {
        let record = RecordBuilder::mapped_read()
            .name("bad")
            .sequence("ACGTA")
            .alignment_start(6)
            .cigar("3M")
            .build();
        let calculator = BaqCalculator::default();
        let err = calculator.calc_baq_from_hmm_at(&record, CONTIG.as_bytes(), -5);
        assert!(err.is_err());
    }

    #[test]
    fn test_baq_read_none_mode_is_identity() {
        let mut record = perfect_read();
        let calculator = BaqCalculator::default();
        let quals = calculator
            .baq_read(
                &mut record,
                &test_header(),
                &test_reference(),
                CalculationMode::None,
                QualityMode::OverwriteQuals,
            )
            .unwrap();
        assert_eq!(quals, vec![30; 5]);
        assert!(!has_baq_tag(&record));
        assert_eq!(record.quality_scores().as_ref(), &[30; 5]);
    }

    #[test]
    fn test_baq_read_excluded_read_is_untouched() {
        let mut record = RecordBuilder::mapped_read()
            .name("dup")
            .sequence("ACGTA")
            .alignment_start(6)
            .duplicate()
            .build();
        let calculator = BaqCalculator::default();
        let quals = calculator
            .baq_read(
                &mut record,
                &test_header(),
                &test_reference(),
                CalculationMode::Recalculate,
                QualityMode::AddTag,
            )
            .unwrap();
        assert_eq!(quals, vec![30; 5]);
        assert!(!has_baq_tag(&record));
    }

    #[test]
    fn test_baq_read_add_tag() {
        let mut record = perfect_read();
        let calculator = BaqCalculator::default();
        calculator
            .baq_read(
                &mut record,
                &test_header(),
                &test_reference(),
                CalculationMode::Recalculate,
                QualityMode::AddTag,
            )
            .unwrap();

        // Perfect match: every delta is zero, every tag byte is '@'
        assert_eq!(get_baq_tag(&record), Some(vec![b'@'; 5]));
        // Qualities themselves untouched
        assert_eq!(record.quality_scores().as_ref(), &[30; 5]);
    }

    #[test]
    fn test_baq_read_overwrite_quals() {
        let mut record = RecordBuilder::mapped_read()
            .name("mismatch")
            .sequence("ACATA")
            .alignment_start(6)
            .cigar("5M")
            .build();
        let calculator = BaqCalculator::default();
        let quals = calculator
            .baq_read(
                &mut record,
                &test_header(),
                &test_reference(),
                CalculationMode::Recalculate,
                QualityMode::OverwriteQuals,
            )
            .unwrap();

        assert_eq!(record.quality_scores().as_ref(), quals.as_slice());
        assert!(quals[2] < 30);
    }

    #[test]
    fn test_baq_read_dont_modify() {
        let mut record = RecordBuilder::mapped_read()
            .name("mismatch")
            .sequence("ACATA")
            .alignment_start(6)
            .cigar("5M")
            .build();
        let calculator = BaqCalculator::default();
        let quals = calculator
            .baq_read(
                &mut record,
                &test_header(),
                &test_reference(),
                CalculationMode::Recalculate,
                QualityMode::DontModify,
            )
            .unwrap();

        assert!(quals[2] < 30);
        // Record fully untouched
        assert_eq!(record.quality_scores().as_ref(), &[30; 5]);
        assert!(!has_baq_tag(&record));
    }

    #[test]
    fn test_baq_read_as_necessary_uses_existing_tag() {
        let mut record = perfect_read();
        add_baq_tag(&mut record, &[25, 25, 25, 25, 25]);
        let calculator = BaqCalculator::default();
        let quals = calculator
            .baq_read(
                &mut record,
                &test_header(),
                &test_reference(),
                CalculationMode::AsNecessary,
                QualityMode::OverwriteQuals,
            )
            .unwrap();

        // The tag decodes to 25s; no HMM run happened
        assert_eq!(quals, vec![25; 5]);
        assert_eq!(record.quality_scores().as_ref(), &[25; 5]);
    }

    #[test]
    fn test_baq_read_as_necessary_without_tag_runs_hmm() {
        let mut record = perfect_read();
        let calculator = BaqCalculator::default();
        calculator
            .baq_read(
                &mut record,
                &test_header(),
                &test_reference(),
                CalculationMode::AsNecessary,
                QualityMode::AddTag,
            )
            .unwrap();
        assert!(has_baq_tag(&record));
    }

    #[test]
    fn test_baq_read_skipped_window_leaves_read_unchanged() {
        // S6 companion: a read that cannot be processed passes through.
        let mut record = RecordBuilder::mapped_read()
            .name("edge")
            .sequence("TTTTT")
            .alignment_start(11)
            .cigar("5M")
            .build();
        let calculator = BaqCalculator::default();
        let quals = calculator
            .baq_read(
                &mut record,
                &test_header(),
                &test_reference(),
                CalculationMode::Recalculate,
                QualityMode::AddTag,
            )
            .unwrap();
        assert_eq!(quals, vec![30; 5]);
        assert!(!has_baq_tag(&record));
    }
}
