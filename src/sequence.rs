//! PRACH sequence engine
//!
//! Builds the 64 preamble sequences of a cell from the logical root
//! sequence index, the cyclic shift step and the high speed flag
//! (TS 36.211 Section 5.7.2). Preambles are grouped by root: each group
//! shares one Zadoff-Chu root and differs by the cyclic shift C_v; a new
//! root is acquired from the logical order whenever the shift set of the
//! current root is exhausted.

use crate::tables::{PRACH_ZC_ROOTS, PRACH_ZC_ROOTS_FORMAT4};
use num_complex::Complex32;
use std::f64::consts::PI;
use tracing::debug;

/// Number of preamble sequences per cell
pub const N_SEQS: usize = 64;

/// The 64 time domain preamble sequences of one cell, with the root
/// bookkeeping the detector needs to correlate once per root.
#[derive(Debug, Clone)]
pub struct PreambleSet {
    /// Time domain sequences, `N_SEQS` rows of `N_zc` samples
    pub seqs: Vec<Vec<Complex32>>,
    /// Preamble index of the first sequence of each root group
    pub root_seqs_idx: Vec<usize>,
}

impl PreambleSet {
    /// Number of distinct roots backing the 64 preambles
    pub fn n_roots(&self) -> usize {
        self.root_seqs_idx.len()
    }
}

/// Restricted set shift parameters for one root, Section 5.7.2
#[derive(Debug, Clone, Copy, Default)]
struct ShiftSet {
    n_shift: u32,
    d_start: u32,
    n_group: u32,
    n_neg_shift: u32,
}

impl ShiftSet {
    /// Number of usable cyclic shifts minus one
    fn v_max(&self) -> u32 {
        (self.n_shift * self.n_group + self.n_neg_shift).saturating_sub(1)
    }

    fn c_v(&self, v: u32, n_cs: u32) -> u32 {
        if self.n_shift == 0 {
            0
        } else {
            self.d_start * (v / self.n_shift) + (v % self.n_shift) * n_cs
        }
    }
}

/// Cyclic shift restrictions for root `u`: the restricted set depends on
/// the Doppler distance d_u, the modular offset between the root and its
/// frequency-shifted image.
fn restricted_shift_set(u: u32, n_zc: u32, n_cs: u32) -> ShiftSet {
    debug_assert!(n_cs > 0);

    // Smallest p with (p * u) mod N_zc = 1
    let mut p = 1;
    for q in 1..=n_zc {
        if (q * u) % n_zc == 1 {
            p = q;
            break;
        }
    }
    let d_u = if p < n_zc / 2 { p } else { n_zc - p };

    let mut set = ShiftSet::default();
    if n_cs <= d_u && d_u < n_zc / 3 {
        set.n_shift = d_u / n_cs;
        set.d_start = 2 * d_u + set.n_shift * n_cs;
        set.n_group = n_zc / set.d_start;
        if n_zc > 2 * d_u + set.n_group * set.d_start {
            set.n_neg_shift = (n_zc - 2 * d_u - set.n_group * set.d_start) / n_cs;
        }
    } else if n_zc / 3 <= d_u && d_u <= (n_zc - n_cs) / 2 {
        set.n_shift = (n_zc - 2 * d_u) / n_cs;
        set.d_start = n_zc - 2 * d_u + set.n_shift * n_cs;
        set.n_group = d_u / set.d_start;
        if d_u > set.n_group * set.d_start {
            set.n_neg_shift = ((d_u - set.n_group * set.d_start) / n_cs).min(set.n_shift);
        }
    }
    set
}

/// Time domain Zadoff-Chu root: x_u(j) = exp(-j pi u j (j + 1) / N_zc)
fn fill_root(u: u32, n_zc: u32, root: &mut [Complex32]) {
    for (j, sample) in root.iter_mut().enumerate() {
        let j = j as f64;
        let phase = -PI * u as f64 * j * (j + 1.0) / n_zc as f64;
        *sample = Complex32::new(phase.cos() as f32, phase.sin() as f32);
    }
}

/// Generate the 64 preamble sequences for a cell.
///
/// `format` selects the logical root order (format 4 uses the short
/// table), `rsi` the starting logical index, and `hs` the restricted
/// shift set. `n_cs` = 0 means a single shift per root.
pub fn generate(format: u32, rsi: u32, n_zc: u32, n_cs: u32, hs: bool) -> PreambleSet {
    let len = n_zc as usize;
    let mut seqs = vec![vec![Complex32::default(); len]; N_SEQS];
    let mut root_seqs_idx = Vec::new();
    let mut root = vec![Complex32::default(); len];

    // v starts past v_max to force a root acquisition at i = 0
    let mut v: u32 = 1;
    let mut v_max: u32 = 0;
    let mut shift = ShiftSet::default();

    for i in 0..N_SEQS {
        if v > v_max {
            let n_roots = root_seqs_idx.len() as u32;
            let u = if format == 4 {
                PRACH_ZC_ROOTS_FORMAT4[((rsi + n_roots) % 138) as usize] as u32
            } else {
                PRACH_ZC_ROOTS[((rsi + n_roots) % 838) as usize] as u32
            };
            fill_root(u, n_zc, &mut root);
            root_seqs_idx.push(i);

            v_max = if hs {
                shift = restricted_shift_set(u, n_zc, n_cs);
                shift.v_max()
            } else if n_cs == 0 {
                0
            } else {
                n_zc / n_cs - 1
            };
            v = 0;
        }

        let c_v = (if hs { shift.c_v(v, n_cs) } else { v * n_cs }) as usize;
        for j in 0..len {
            seqs[i][j] = root[(j + c_v) % len];
        }
        v += 1;
    }

    debug!(
        n_roots = root_seqs_idx.len(),
        n_zc, n_cs, hs, "generated preamble sequence set"
    );
    PreambleSet { seqs, root_seqs_idx }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_roots_have_unit_magnitude() {
        let mut root = vec![Complex32::default(); 839];
        fill_root(129, 839, &mut root);
        for sample in &root {
            assert_relative_eq!(sample.norm(), 1.0, epsilon = 1e-6);
        }
    }

    #[test]
    fn test_single_root_covers_all_preambles() {
        // N_cs = 13: 839 / 13 = 64 shifts, one root serves the whole set
        let set = generate(0, 22, 839, 13, false);
        assert_eq!(set.n_roots(), 1);
        assert_eq!(set.root_seqs_idx, vec![0]);
    }

    #[test]
    fn test_multiple_roots_when_shifts_run_out() {
        // N_cs = 93: 9 shifts per root, 64 = 7 * 9 + 1 needs 8 roots
        let set = generate(0, 22, 839, 93, false);
        assert_eq!(set.n_roots(), 8);
        for (r, &idx) in set.root_seqs_idx.iter().enumerate() {
            assert_eq!(idx, r * 9);
        }
    }

    #[test]
    fn test_root_group_heads_are_unshifted() {
        // A zero cyclic shift leaves sample 0 at exp(0) = 1
        for set in [
            generate(0, 22, 839, 93, false),
            generate(0, 0, 839, 15, true),
            generate(4, 0, 139, 12, false),
        ] {
            for &idx in &set.root_seqs_idx {
                assert_relative_eq!(set.seqs[idx][0].re, 1.0, epsilon = 1e-5);
                assert_relative_eq!(set.seqs[idx][0].im, 0.0, epsilon = 1e-5);
            }
        }
    }

    #[test]
    fn test_sequences_distinct_when_shifted() {
        let set = generate(0, 22, 839, 119, false);
        for a in 0..N_SEQS {
            for b in (a + 1)..N_SEQS {
                let same = set.seqs[a]
                    .iter()
                    .zip(set.seqs[b].iter())
                    .all(|(x, y)| (x - y).norm_sqr() < 1e-10);
                assert!(!same, "preambles {} and {} are identical", a, b);
            }
        }
    }

    #[test]
    fn test_zero_ncs_repeats_the_root() {
        let set = generate(0, 0, 839, 0, false);
        assert_eq!(set.n_roots(), N_SEQS);
        assert_eq!(set.root_seqs_idx, (0..N_SEQS).collect::<Vec<_>>());
    }

    #[test]
    fn test_restricted_set_from_logical_index_zero() {
        // The first 24 logical roots pair to Doppler distances outside
        // every usable shift branch (d_u of 129/710 is 13, of 1/838 is 1,
        // of 2/837 is 419, ...), so each consumes a fresh root. Root 56
        // then has d_u = 15 = N_cs: N_shift = 1, d_start = 45,
        // N_group = 18, giving 18 preambles per root from there on.
        let set = generate(0, 0, 839, 15, true);
        let mut expected: Vec<usize> = (0..24).collect();
        expected.extend([24, 42, 60]);
        assert_eq!(set.root_seqs_idx, expected);
        assert_eq!(set.n_roots(), 27);
    }

    #[test]
    fn test_restricted_shift_set_branches() {
        // u = 1: d_u = 1 < N_cs, no usable shift
        let set = restricted_shift_set(1, 839, 15);
        assert_eq!(set.n_shift, 0);
        assert_eq!(set.v_max(), 0);

        // u = 2: p = 420, d_u = 419 exceeds (N_zc - N_cs) / 2
        let set = restricted_shift_set(2, 839, 15);
        assert_eq!(set.n_shift, 0);

        // u = 419: p = 837, d_u = 2 below N_cs
        let set = restricted_shift_set(419, 839, 15);
        assert_eq!(set.n_shift, 0);

        // Roots with usable shifts must keep every C_v inside the
        // sequence
        let mut found = false;
        for u in 2..839 {
            let s = restricted_shift_set(u, 839, 119);
            if s.n_shift > 0 {
                // Shift pattern must stay inside the sequence
                let v_max = s.v_max();
                let c_max = s.c_v(v_max, 119);
                assert!(c_max < 839, "u={}: C_v(v_max)={}", u, c_max);
                found = true;
            }
        }
        assert!(found, "no root with usable restricted shifts");
    }

    #[test]
    fn test_format4_uses_short_root_table() {
        let set = generate(4, 0, 139, 2, false);
        assert_eq!(set.seqs[0].len(), 139);
        // rsi = 0 maps to u = 1
        let mut expected = vec![Complex32::default(); 139];
        fill_root(1, 139, &mut expected);
        for (a, b) in set.seqs[0].iter().zip(expected.iter()) {
            assert_relative_eq!(a.re, b.re, epsilon = 1e-6);
            assert_relative_eq!(a.im, b.im, epsilon = 1e-6);
        }
    }
}
