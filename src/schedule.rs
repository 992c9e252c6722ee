//! PRACH schedule oracle
//!
//! Decides whether a TTI is a PRACH opportunity and where the PRACH sits
//! in frequency, from the configuration index and, for TDD cells, the
//! resource quadruples of Table 5.7.1-4. All decisions are pure functions
//! of their inputs.

use crate::common::{SubframeType, TddConfig};
use crate::tables::{TddLoc, PRACH_SF_CONFIG, PRACH_TDD_LOC_TABLE};
use crate::PrachError;

/// System frame number constraint of a PRACH configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SfnPattern {
    /// PRACH only in even radio frames
    Even,
    /// PRACH in any radio frame
    Any,
}

/// Preamble format for a PRACH configuration index
pub fn preamble_format(config_idx: u32) -> u32 {
    config_idx / 16
}

/// SFN constraint for a PRACH configuration index
pub fn sfn_pattern(config_idx: u32) -> SfnPattern {
    if (config_idx % 16) < 3 || (config_idx % 16) == 15 {
        SfnPattern::Even
    } else {
        SfnPattern::Any
    }
}

/// True if `current_tti` is a PRACH opportunity for an FDD cell.
///
/// When `allowed_subframe` is given, the matched subframe must equal it.
pub fn tti_opportunity_fdd(
    config_idx: u32,
    current_tti: u32,
    allowed_subframe: Option<u32>,
) -> bool {
    // The only configuration providing an opportunity in every subframe
    if config_idx == 14 {
        return true;
    }

    let sfn_ok = match sfn_pattern(config_idx) {
        SfnPattern::Any => true,
        SfnPattern::Even => (current_tti / 10) % 2 == 0,
    };
    if !sfn_ok {
        return false;
    }

    let sf_idx = current_tti % 10;
    PRACH_SF_CONFIG[(config_idx % 16) as usize]
        .iter()
        .any(|&sf| sf == sf_idx && allowed_subframe.map_or(true, |allowed| allowed == sf_idx))
}

fn tdd_row(config_idx: u32, tdd_ul_dl_config: u32) -> Result<&'static [TddLoc], PrachError> {
    if config_idx >= 64 || tdd_ul_dl_config >= 7 {
        return Err(PrachError::ConfigOutOfRange(format!(
            "config_idx={}, tdd_ul_dl_config={}",
            config_idx, tdd_ul_dl_config
        )));
    }
    Ok(PRACH_TDD_LOC_TABLE[config_idx as usize][tdd_ul_dl_config as usize].elems())
}

/// TDD opportunity decision.
///
/// Scans the Table 5.7.1-4 row for the configuration pair; the first
/// matching resource wins and its row index is returned so the caller can
/// resolve the frequency allocation for this TTI.
pub fn tti_opportunity_tdd(
    config_idx: u32,
    tdd_ul_dl_config: u32,
    current_tti: u32,
) -> Result<Option<u32>, PrachError> {
    let row = tdd_row(config_idx, tdd_ul_dl_config)?;
    let sfn = current_tti / 10;
    let sf_idx = current_tti % 10;

    for (i, loc) in row.iter().enumerate() {
        let frame_ok =
            loc.t0 == 0 || (loc.t0 == 1 && sfn % 2 == 0) || (loc.t0 == 2 && sfn % 2 == 1);
        let half_ok = (sf_idx < 5 && loc.t1 == 0) || (sf_idx >= 5 && loc.t1 == 1);
        if !frame_ok || !half_ok {
            continue;
        }
        if config_idx < 48 {
            // Formats 0-3 start t2 + 2 subframes into the half-frame
            if sf_idx % 5 == loc.t2 + 2 {
                return Ok(Some(i as u32));
            }
        } else {
            // Format 4 goes in UpPTS only
            let tdd = TddConfig { sf_config: tdd_ul_dl_config, special_sf_config: 0 };
            if tdd.subframe_type(sf_idx) == SubframeType::Special {
                return Ok(Some(i as u32));
            }
        }
    }
    Ok(None)
}

/// Number of frequency-multiplexed PRACH resources for a TDD
/// configuration pair
pub fn nof_f_idx_tdd(config_idx: u32, tdd_ul_dl_config: u32) -> Result<u32, PrachError> {
    Ok(tdd_row(config_idx, tdd_ul_dl_config)?.len() as u32)
}

/// Raw frequency resource index of one Table 5.7.1-4 row element
pub fn f_id_tdd(config_idx: u32, tdd_ul_dl_config: u32, prach_idx: u32) -> Result<u32, PrachError> {
    let row = tdd_row(config_idx, tdd_ul_dl_config)?;
    row.get(prach_idx as usize).map(|loc| loc.f).ok_or_else(|| {
        PrachError::InvalidInputs(format!(
            "prach_idx={} out of range for config_idx={}, tdd_ul_dl_config={}",
            prach_idx, config_idx, tdd_ul_dl_config
        ))
    })
}

/// First PRB of the PRACH frequency resource for a TDD cell
pub fn f_ra_tdd(
    config_idx: u32,
    tdd_ul_dl_config: u32,
    current_tti: u32,
    prach_idx: u32,
    prach_offset: u32,
    n_rb_ul: u32,
) -> Result<u32, PrachError> {
    let row = tdd_row(config_idx, tdd_ul_dl_config)?;
    let loc = row.get(prach_idx as usize).ok_or_else(|| {
        PrachError::InvalidInputs(format!(
            "prach_idx={} out of range for config_idx={}, tdd_ul_dl_config={}",
            prach_idx, config_idx, tdd_ul_dl_config
        ))
    })?;

    if config_idx < 48 {
        if loc.f % 2 == 0 {
            Ok(prach_offset + 6 * (loc.f / 2))
        } else {
            Ok(n_rb_ul - 6 - prach_offset + 6 * (loc.f / 2))
        }
    } else {
        let n_sp = if (3..=5).contains(&tdd_ul_dl_config) { 1 } else { 2 };
        let sfn = current_tti / 10;
        if ((sfn % 2) * (2 - n_sp) + loc.t1) % 2 == 0 {
            Ok(6 * loc.f)
        } else {
            Ok(n_rb_ul - 6 * (loc.f + 1))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_preamble_format() {
        assert_eq!(preamble_format(0), 0);
        assert_eq!(preamble_format(15), 0);
        assert_eq!(preamble_format(16), 1);
        assert_eq!(preamble_format(47), 2);
        assert_eq!(preamble_format(63), 3);
    }

    #[test]
    fn test_sfn_pattern() {
        for idx in [0, 1, 2, 15, 16, 31] {
            assert_eq!(sfn_pattern(idx), SfnPattern::Even, "config_idx={}", idx);
        }
        for idx in [3, 7, 14, 19, 30] {
            assert_eq!(sfn_pattern(idx), SfnPattern::Any, "config_idx={}", idx);
        }
    }

    #[test]
    fn test_fdd_config_0() {
        // Even frames, subframe 1
        assert!(tti_opportunity_fdd(0, 1, None));
        assert!(!tti_opportunity_fdd(0, 11, None));
        assert!(!tti_opportunity_fdd(0, 2, None));
        assert!(tti_opportunity_fdd(0, 21, None));
        // Subframe filter
        assert!(tti_opportunity_fdd(0, 1, Some(1)));
        assert!(!tti_opportunity_fdd(0, 1, Some(2)));
    }

    #[test]
    fn test_fdd_config_14_always() {
        for tti in 0..10240 {
            assert!(tti_opportunity_fdd(14, tti, None));
        }
    }

    #[test]
    fn test_fdd_multi_subframe() {
        // Configuration 12: any frame, even subframes
        for sf in [0, 2, 4, 6, 8] {
            assert!(tti_opportunity_fdd(12, 30 + sf, None));
        }
        for sf in [1, 3, 5, 7, 9] {
            assert!(!tti_opportunity_fdd(12, 30 + sf, None));
        }
    }

    #[test]
    fn test_tdd_rejects_bad_inputs() {
        assert!(tti_opportunity_tdd(64, 0, 0).is_err());
        assert!(tti_opportunity_tdd(0, 7, 0).is_err());
        assert!(f_ra_tdd(64, 0, 0, 0, 0, 50).is_err());
        assert!(nof_f_idx_tdd(3, 7).is_err());
    }

    #[test]
    fn test_tdd_config_3_ul_dl_0() {
        // Single resource (0, 0, 0, 2): every frame, first half, subframe 4
        for tti in 0..10240 {
            let hit = tti_opportunity_tdd(3, 0, tti).unwrap();
            if tti % 10 == 4 {
                assert_eq!(hit, Some(0), "tti={}", tti);
            } else {
                assert_eq!(hit, None, "tti={}", tti);
            }
        }
    }

    #[test]
    fn test_tdd_first_match_wins() {
        // Configuration 6 in UL/DL 0 carries (0,0,0,2) then (0,0,1,2):
        // subframe 4 resolves to row 0, subframe 9 to row 1
        assert_eq!(tti_opportunity_tdd(6, 0, 4).unwrap(), Some(0));
        assert_eq!(tti_opportunity_tdd(6, 0, 9).unwrap(), Some(1));
        assert_eq!(tti_opportunity_tdd(6, 0, 2).unwrap(), None);
    }

    #[test]
    fn test_f_id_tdd_reads_row_elements() {
        // Configuration 6 in UL/DL 0 multiplexes in time: both rows sit
        // on frequency resource 0
        assert_eq!(nof_f_idx_tdd(6, 0).unwrap(), 2);
        assert_eq!(f_id_tdd(6, 0, 0).unwrap(), 0);
        assert_eq!(f_id_tdd(6, 0, 1).unwrap(), 0);
        // In UL/DL 5 the single uplink subframe forces frequency
        // stacking: the second row moves to resource 1
        assert_eq!(f_id_tdd(6, 5, 0).unwrap(), 0);
        assert_eq!(f_id_tdd(6, 5, 1).unwrap(), 1);
        // Out-of-range row index and configuration pair
        assert!(f_id_tdd(6, 0, 2).is_err());
        assert!(f_id_tdd(64, 0, 0).is_err());
    }

    #[test]
    fn test_tdd_format4_upts_only() {
        // Configuration 51 (format 4, all frames) in UL/DL 4: only
        // subframe 1 is special
        for tti in 0..200 {
            let hit = tti_opportunity_tdd(51, 4, tti).unwrap();
            assert_eq!(hit.is_some(), tti % 10 == 1, "tti={}", tti);
        }
        // UL/DL 0 has a second special subframe at 6, but the single
        // resource lives in the first half-frame
        for tti in 0..200 {
            let hit = tti_opportunity_tdd(51, 0, tti).unwrap();
            assert_eq!(hit.is_some(), tti % 10 == 1, "tti={}", tti);
        }
    }

    #[test]
    fn test_tdd_opportunity_is_pure() {
        for tti in [0, 14, 5120, 10239] {
            let a = tti_opportunity_tdd(48, 4, tti).unwrap();
            let b = tti_opportunity_tdd(48, 4, tti).unwrap();
            assert_eq!(a, b);
        }
    }

    #[test]
    fn test_f_ra_format0() {
        // Even f: grows from prach_offset upward
        assert_eq!(f_ra_tdd(3, 0, 0, 0, 4, 50).unwrap(), 4);
        // Frequency-stacked resource with odd f mirrors from the top edge
        // (configuration 6 in UL/DL 5 is (0,...), (1,...))
        assert_eq!(f_ra_tdd(6, 5, 2, 0, 4, 50).unwrap(), 4);
        assert_eq!(f_ra_tdd(6, 5, 2, 1, 4, 50).unwrap(), 50 - 6 - 4);
    }

    #[test]
    fn test_f_ra_format4_alternates_with_sfn() {
        // UL/DL 4 has N_sp = 1, so the PRB edge alternates with frame
        // parity for the t1 = 0 resource
        let even = f_ra_tdd(51, 4, 0, 0, 0, 50).unwrap();
        let odd = f_ra_tdd(51, 4, 10, 0, 0, 50).unwrap();
        assert_eq!(even, 0);
        assert_eq!(odd, 50 - 6);
    }
}
