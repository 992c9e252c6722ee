//! PRACH cell configuration
//!
//! The SIB2-shaped PRACH parameters as the RRC layer hands them down,
//! deserializable straight from the cell configuration file.

use crate::common::TddConfig;
use serde::{Deserialize, Serialize};

/// PRACH configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PrachConfig {
    /// PRACH configuration index (0-63)
    pub config_idx: u32,
    /// Logical root sequence index
    pub root_seq_idx: u32,
    /// Zero correlation zone configuration
    pub zero_corr_zone: u32,
    /// PRACH frequency offset in PRBs
    pub freq_offset: u32,
    /// Total number of RA preambles
    #[serde(default = "default_num_ra_preambles")]
    pub num_ra_preambles: u32,
    /// High speed (restricted set) flag
    #[serde(default)]
    pub hs_flag: bool,
    /// TDD configuration, absent for FDD cells
    #[serde(default)]
    pub tdd_config: Option<TddConfig>,
}

fn default_num_ra_preambles() -> u32 {
    64
}

impl Default for PrachConfig {
    fn default() -> Self {
        Self {
            config_idx: 0,
            root_seq_idx: 0,
            zero_corr_zone: 11,
            freq_offset: 2,
            num_ra_preambles: 64,
            hs_flag: false,
            tdd_config: None,
        }
    }
}
