//! Banded glocal profile-HMM posterior decoder.
//!
//! This module implements the forward-backward decoder at the heart of the
//! BAQ calculation. The model is a profile HMM over the reference window with
//! Match, Insert, and Delete states per reference column: the begin state may
//! enter at any Match or Insert column and every Match or Insert column may
//! exit to the end state, so the query aligns globally while the reference is
//! consumed locally ("glocal").
//!
//! The dynamic program is banded: at query row `i` only reference columns
//! `k` in `[i - b, i + b]` are evaluated, where `b` is the effective band
//! width. Rows are rescaled by their sum after each pass so the arithmetic
//! stays in linear probability space without underflow; the retained sums
//! form the scaling vector that the backward pass and posterior step consume.
//!
//! Output is one packed state word and one phred-scaled posterior per query
//! base. The state word stores the 0-based reference column in the upper 30
//! bits and a Match/Insert tag in the low two bits; the posterior byte is the
//! phred-scaled probability that the reported state is wrong.

use crate::errors::{BaqError, Result};
use crate::phred;

/// Default gap open probability
pub const DEFAULT_GAP_OPEN: f64 = 1e-3;

/// Default gap extension probability
pub const DEFAULT_GAP_EXTEND: f64 = 0.1;

/// Default band width
pub const DEFAULT_BAND_WIDTH: usize = 7;

/// Default quality floor: qualities below this are raised to it before use
pub const DEFAULT_MIN_BASE_QUAL: u8 = 4;

/// Match emission partition constant for a mismatching base (one of three
/// alternative bases)
const EM: f64 = 1.0 / 3.0;

/// Insert state emission constant (uniform over four bases)
const EI: f64 = 0.25;

/// Returns true if the state word tags an insertion rather than a match.
#[inline]
#[must_use]
pub const fn state_is_indel(state: i32) -> bool {
    (state & 3) != 0
}

/// Extracts the 0-based reference column from a packed state word.
#[inline]
#[must_use]
pub const fn state_aligned_position(state: i32) -> i32 {
    state >> 2
}

/// Offset of the (Match, Insert, Delete) triple for column `k` within the
/// banded row buffer of query row `i`.
///
/// Rows are flat buffers of `3 * (2b + 1) + 6` values: one triple per banded
/// column plus a zeroed guard triple at each end, so reads three cells to
/// either side of the band edges stay in bounds and contribute nothing.
#[inline]
fn band_offset(band: usize, i: usize, k: usize) -> usize {
    let x = i.saturating_sub(band);
    (k + 1 - x) * 3
}

/// Banded glocal HMM decoder with fixed gap and band parameters.
///
/// The decoder is re-entrant: `decode` allocates its matrices per call and
/// never mutates its inputs, so a single instance may be shared freely across
/// worker threads as long as each call gets its own output buffers.
#[derive(Debug, Clone)]
pub struct HmmGlocal {
    /// Gap open probability
    gap_open: f64,
    /// Gap extension probability
    gap_extend: f64,
    /// Configured band width; the effective band also respects the sequence
    /// length difference
    band_width: usize,
    /// Quality floor applied to input qualities
    min_base_qual: u8,
}

impl Default for HmmGlocal {
    fn default() -> Self {
        Self {
            gap_open: DEFAULT_GAP_OPEN,
            gap_extend: DEFAULT_GAP_EXTEND,
            band_width: DEFAULT_BAND_WIDTH,
            min_base_qual: DEFAULT_MIN_BASE_QUAL,
        }
    }
}

impl HmmGlocal {
    /// Creates a decoder with explicit gap open/extension probabilities, band
    /// width, and quality floor.
    #[must_use]
    pub fn new(gap_open: f64, gap_extend: f64, band_width: usize, min_base_qual: u8) -> Self {
        Self { gap_open, gap_extend, band_width, min_base_qual }
    }

    /// Gap open probability.
    #[must_use]
    pub fn gap_open(&self) -> f64 {
        self.gap_open
    }

    /// Gap extension probability.
    #[must_use]
    pub fn gap_extend(&self) -> f64 {
        self.gap_extend
    }

    /// Configured band width.
    #[must_use]
    pub fn band_width(&self) -> usize {
        self.band_width
    }

    /// Quality floor applied to input base qualities.
    #[must_use]
    pub fn min_base_qual(&self) -> u8 {
        self.min_base_qual
    }

    /// Runs forward-backward posterior decoding of `query` against
    /// `ref_bases`.
    ///
    /// Both sequences must be in the 0-4 index encoding produced by
    /// [`crate::dna::encode_bases`]; index 4 marks an ambiguous base that
    /// emits with probability 1 against every column. `quals` holds one phred
    /// byte per query base (floored at the configured minimum before use).
    ///
    /// On success `state[i]` holds the packed state word for query base `i`
    /// and `bq[i]` the phred-scaled posterior error probability of that
    /// state, saturated at 99.
    ///
    /// # Errors
    ///
    /// Returns [`BaqError::InvalidInput`] when either sequence is empty or
    /// any buffer length disagrees with the query length. The arithmetic
    /// itself cannot fail: per-row rescaling keeps every value in range for
    /// all realistic read and window sizes.
    #[allow(clippy::too_many_lines)]
    pub fn decode(
        &self,
        ref_bases: &[u8],
        query: &[u8],
        quals: &[u8],
        state: &mut [i32],
        bq: &mut [u8],
    ) -> Result<()> {
        let l_ref = ref_bases.len();
        let l_query = query.len();

        if l_ref == 0 || l_query == 0 {
            return Err(BaqError::InvalidInput {
                reason: "reference and query must be non-empty".to_string(),
            });
        }
        if quals.len() != l_query {
            return Err(BaqError::InvalidInput {
                reason: format!("query length {l_query} != qual length {}", quals.len()),
            });
        }
        if state.len() != l_query {
            return Err(BaqError::InvalidInput {
                reason: format!("state length {} != query length {l_query}", state.len()),
            });
        }
        if bq.len() != l_query {
            return Err(BaqError::InvalidInput {
                reason: format!("output quality length {} != query length {l_query}", bq.len()),
            });
        }

        // Shift both sequences to 1-based indexing and convert qualities to
        // error probabilities, applying the quality floor.
        let mut rseq = vec![0u8; l_ref + 1];
        rseq[1..].copy_from_slice(ref_bases);
        let mut qseq = vec![0u8; l_query + 1];
        qseq[1..].copy_from_slice(query);
        let mut qual = vec![0f64; l_query + 1];
        for (i, &q) in quals.iter().enumerate() {
            qual[i + 1] = phred::error_probability(q.max(self.min_base_qual));
        }

        // Effective band width: capped by the configured band, but never
        // narrower than the length difference (and never zero).
        let mut bw = l_ref.max(l_query);
        if bw > self.band_width {
            bw = self.band_width;
        }
        if bw < l_ref.abs_diff(l_query) {
            bw = l_ref.abs_diff(l_query);
        }
        let bw = bw.max(1);
        let bw2 = bw * 2 + 1;
        let row_len = bw2 * 3 + 6;

        let mut f = vec![vec![0f64; row_len]; l_query + 1];
        let mut b = vec![vec![0f64; row_len]; l_query + 1];
        let mut s = vec![0f64; l_query + 2];

        // Boundary and transition probabilities. The transition matrix is laid
        // out row-major as m[from * 3 + to] with states 0=Match, 1=Insert,
        // 2=Delete.
        let (cd, ce) = (self.gap_open, self.gap_extend);
        let s_m = 1.0 / (2 * l_query + 2) as f64;
        let s_i = s_m;
        let b_m = (1.0 - cd) / l_query as f64;
        let b_i = cd / l_query as f64;
        let mut m = [0f64; 9];
        m[0] = (1.0 - cd - cd) * (1.0 - s_m);
        m[1] = cd * (1.0 - s_m);
        m[2] = cd * (1.0 - s_m);
        m[3] = (1.0 - ce) * (1.0 - s_i);
        m[4] = ce * (1.0 - s_i);
        m[5] = 0.0;
        m[6] = 1.0 - ce;
        m[7] = 0.0;
        m[8] = ce;

        // Columns of the final row whose offsets land inside the row buffer.
        let x_last = l_query.saturating_sub(bw);
        let last_row_beg = x_last.max(1);
        let last_row_end = (x_last + 2 * bw).min(l_ref);

        // *** Forward ***
        f[0][band_offset(bw, 0, 0)] = 1.0;
        s[0] = 1.0;
        {
            // Row 1 enters from the begin state.
            let fi = &mut f[1];
            let beg = 1;
            let end = l_ref.min(bw + 1);
            let mut sum = 0.0;
            for k in beg..=end {
                let e = emission(rseq[k], qseq[1], qual[1]);
                let u = band_offset(bw, 1, k);
                fi[u] = e * b_m;
                fi[u + 1] = EI * b_i;
                sum += fi[u] + fi[u + 1];
            }
            s[1] = sum;
            let lo = band_offset(bw, 1, beg);
            let hi = band_offset(bw, 1, end) + 2;
            for cell in &mut fi[lo..=hi] {
                *cell /= sum;
            }
        }
        for i in 2..=l_query {
            let (prev_rows, cur_rows) = f.split_at_mut(i);
            let fi1 = &prev_rows[i - 1];
            let fi = &mut cur_rows[0];
            let qli = qual[i];
            let qyi = qseq[i];
            let beg = 1.max(i.saturating_sub(bw));
            let end = l_ref.min(i + bw);
            let mut sum = 0.0;
            for k in beg..=end {
                let e = emission(rseq[k], qyi, qli);
                let u = band_offset(bw, i, k);
                let v11 = band_offset(bw, i - 1, k - 1);
                let v10 = band_offset(bw, i - 1, k);
                let v01 = band_offset(bw, i, k - 1);
                fi[u] = e * (m[0] * fi1[v11] + m[3] * fi1[v11 + 1] + m[6] * fi1[v11 + 2]);
                fi[u + 1] = EI * (m[1] * fi1[v10] + m[4] * fi1[v10 + 1]);
                fi[u + 2] = m[2] * fi[v01] + m[8] * fi[v01 + 2];
                sum += fi[u] + fi[u + 1] + fi[u + 2];
            }
            s[i] = sum;
            let lo = band_offset(bw, i, beg);
            let hi = band_offset(bw, i, end) + 2;
            let inv = 1.0 / sum;
            for cell in &mut fi[lo..=hi] {
                *cell *= inv;
            }
        }
        {
            // Terminal scale: exits from the last row into the end state.
            let mut sum = 0.0;
            for k in last_row_beg..=last_row_end {
                let u = band_offset(bw, l_query, k);
                sum += f[l_query][u] * s_m + f[l_query][u + 1] * s_i;
            }
            s[l_query + 1] = sum;
        }

        // *** Backward ***
        for k in last_row_beg..=last_row_end {
            let u = band_offset(bw, l_query, k);
            let bi = &mut b[l_query];
            bi[u] = s_m / s[l_query] / s[l_query + 1];
            bi[u + 1] = s_i / s[l_query] / s[l_query + 1];
        }
        for i in (1..l_query).rev() {
            let (cur_rows, next_rows) = b.split_at_mut(i + 1);
            let bi = &mut cur_rows[i];
            let bi1 = &next_rows[0];
            // No deletion may precede the first query base.
            let y = if i > 1 { 1.0 } else { 0.0 };
            let qli1 = qual[i + 1];
            let qyi1 = qseq[i + 1];
            let beg = 1.max(i.saturating_sub(bw));
            let end = l_ref.min(i + bw);
            for k in (beg..=end).rev() {
                let u = band_offset(bw, i, k);
                let v11 = band_offset(bw, i + 1, k + 1);
                let v10 = band_offset(bw, i + 1, k);
                let v01 = band_offset(bw, i, k + 1);
                // The next row's Match contribution is folded into e.
                let e = if k >= l_ref {
                    0.0
                } else {
                    emission(rseq[k + 1], qyi1, qli1) * bi1[v11]
                };
                bi[u] = e * m[0] + EI * m[1] * bi1[v10 + 1] + m[2] * bi[v01 + 2];
                bi[u + 1] = e * m[3] + EI * m[4] * bi1[v10 + 1];
                bi[u + 2] = (e * m[6] + m[8] * bi[v01 + 2]) * y;
            }
            let lo = band_offset(bw, i, beg);
            let hi = band_offset(bw, i, end) + 2;
            let inv = 1.0 / s[i];
            for cell in &mut bi[lo..=hi] {
                *cell *= inv;
            }
        }

        // *** Posterior maximisation ***
        for i in 1..=l_query {
            let fi = &f[i];
            let bi = &b[i];
            let beg = 1.max(i.saturating_sub(bw));
            let end = l_ref.min(i + bw);
            let mut sum = 0.0;
            let mut max = 0.0;
            let mut max_k: i32 = -1;
            for k in beg..=end {
                let u = band_offset(bw, i, k);
                let z_m = fi[u] * bi[u];
                sum += z_m;
                if z_m > max {
                    max = z_m;
                    max_k = (k as i32 - 1) << 2;
                }
                let z_i = fi[u + 1] * bi[u + 1];
                sum += z_i;
                if z_i > max {
                    max = z_i;
                    max_k = ((k as i32 - 1) << 2) | 1;
                }
            }
            // Forward/backward consistency: the posterior mass of a row is the
            // reciprocal of its scale factor.
            debug_assert!((sum * s[i] - 1.0).abs() < 1e-6);
            max /= sum;
            state[i - 1] = max_k;
            bq[i - 1] = phred::error_prob_to_phred(1.0 - max);
        }

        Ok(())
    }
}

/// Match state emission probability for reference base `r` against query base
/// `q` with error probability `qual`. Ambiguous bases emit with probability 1.
#[inline]
fn emission(r: u8, q: u8, qual: f64) -> f64 {
    if r > 3 || q > 3 {
        1.0
    } else if r == q {
        1.0 - qual
    } else {
        qual * EM
    }
}
