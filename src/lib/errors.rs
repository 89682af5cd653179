//! Custom error types for BAQ operations.

use thiserror::Error;

/// Result type alias for BAQ operations
pub type Result<T> = std::result::Result<T, BaqError>;

/// Error type for BAQ operations
#[derive(Error, Debug)]
pub enum BaqError {
    /// Buffers handed to the decoder disagree in length, or are unusable
    #[error("Invalid decoder input: {reason}")]
    InvalidInput {
        /// Explanation of what disagreed
        reason: String,
    },

    /// Required reference sequence not found
    #[error("Reference sequence '{ref_name}' not found")]
    ReferenceNotFound {
        /// The reference sequence name
        ref_name: String,
    },

    /// Requested reference window falls outside the contig
    #[error("Requested region {ref_name}:{start}-{end} exceeds sequence length {length}")]
    RegionOutOfBounds {
        /// The reference sequence name
        ref_name: String,
        /// 1-based inclusive window start
        start: usize,
        /// 1-based inclusive window end
        end: usize,
        /// Length of the contig
        length: usize,
    },

    /// A BQ tag was required but the read does not carry one
    #[error("Required BQ tag to be present, but none was on read '{read_name}'")]
    MissingBaqTag {
        /// The read name
        read_name: String,
    },
}
