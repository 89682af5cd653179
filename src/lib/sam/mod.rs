//! SAM/BAM record utilities.
//!
//! `record_utils` holds the CIGAR arithmetic the BAQ adapter needs;
//! `builder` provides fluent test-record construction.

pub mod builder;
pub mod record_utils;

pub use builder::{RecordBuilder, create_test_fasta, create_test_header, parse_cigar};
pub use record_utils::{
    alignment_end, leading_insertion_length, reference_length, trailing_insertion_length,
};
