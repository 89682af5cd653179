//! Phred score utilities and probability calculations.
//!
//! The BAQ decoder works in linear probability space with per-row rescaling,
//! so the conversions here are plain powers of ten rather than the log-space
//! arithmetic consensus callers use. Quality-to-probability lookups go through
//! a process-wide 256-entry table materialised on first use.

use std::sync::LazyLock;

/// Maximum Phred score stored in SAM/BAM quality strings (Q93)
pub const MAX_PHRED: u8 = 93;

/// Saturation value for phred-scaled posteriors produced by the decoder
pub const MAX_POSTERIOR_PHRED: u8 = 99;

/// Phred score type
pub type PhredScore = u8;

/// Table of `10^(-q/10)` for every byte-valued quality score.
static QUAL_TO_ERROR_PROB: LazyLock<[f64; 256]> = LazyLock::new(|| {
    let mut table = [0.0_f64; 256];
    for (qual, prob) in table.iter_mut().enumerate() {
        *prob = 10f64.powf(-(qual as f64) / 10.0);
    }
    table
});

/// Converts a Phred score to its error probability via the lookup table.
///
/// # Examples
/// ```
/// use fgbaq_lib::phred::error_probability;
///
/// // Q10 corresponds to 10% error rate
/// assert!((error_probability(10) - 0.1).abs() < 1e-12);
///
/// // Q30 corresponds to 0.1% error rate
/// assert!((error_probability(30) - 0.001).abs() < 1e-12);
/// ```
#[inline]
#[must_use]
pub fn error_probability(qual: PhredScore) -> f64 {
    QUAL_TO_ERROR_PROB[qual as usize]
}

/// Converts an error probability to a phred-scaled byte.
///
/// Rounds with the samtools `+0.499` convention and saturates at
/// [`MAX_POSTERIOR_PHRED`]. Non-positive probabilities (which only arise from
/// floating point degeneracy in the caller) also saturate rather than diverge.
#[inline]
#[must_use]
pub fn error_prob_to_phred(prob: f64) -> PhredScore {
    if prob <= 0.0 {
        return MAX_POSTERIOR_PHRED;
    }
    let phred = -10.0 * prob.log10() + 0.499;
    if phred >= f64::from(MAX_POSTERIOR_PHRED) {
        MAX_POSTERIOR_PHRED
    } else if phred < 0.0 {
        0
    } else {
        phred as PhredScore
    }
}
