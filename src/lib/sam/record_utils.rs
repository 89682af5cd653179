//! Record-level utilities for SAM/BAM records.
//!
//! CIGAR arithmetic used when mapping a read onto its reference window:
//! reference span, alignment end, and the leading/trailing insertion lengths
//! that widen the window the BAQ decoder sees.

use noodles::sam::alignment::RecordBuf;
use noodles::sam::alignment::record::cigar::op::Kind;

/// Returns the number of reference bases consumed by the record's CIGAR.
///
/// Alignment matches, deletions, and skips consume reference; insertions,
/// clips, and pads do not.
#[must_use]
pub fn reference_length(record: &RecordBuf) -> usize {
    record
        .cigar()
        .as_ref()
        .iter()
        .filter_map(|op| match op.kind() {
            Kind::Match
            | Kind::SequenceMatch
            | Kind::SequenceMismatch
            | Kind::Deletion
            | Kind::Skip => Some(op.len()),
            _ => None,
        })
        .sum()
}

/// Returns the 1-based inclusive reference position of the last aligned base,
/// or `None` for unmapped records.
#[must_use]
pub fn alignment_end(record: &RecordBuf) -> Option<usize> {
    let start = usize::from(record.alignment_start()?);
    let ref_len = reference_length(record);
    if ref_len == 0 { None } else { Some(start + ref_len - 1) }
}

/// Length of the record's leading insertion, or 0 when the CIGAR does not
/// begin with an insertion element.
#[must_use]
pub fn leading_insertion_length(record: &RecordBuf) -> usize {
    match record.cigar().as_ref().first() {
        Some(op) if op.kind() == Kind::Insertion => op.len(),
        _ => 0,
    }
}

/// Length of the record's trailing insertion, or 0 when the CIGAR does not
/// end with an insertion element.
#[must_use]
pub fn trailing_insertion_length(record: &RecordBuf) -> usize {
    match record.cigar().as_ref().last() {
        Some(op) if op.kind() == Kind::Insertion => op.len(),
        _ => 0,
    }
}
