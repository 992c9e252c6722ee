//! Common LTE numerology
//!
//! Sampling constants, the symbol size to PRB mapping for the uplink OFDM
//! grid, and the TDD frame structure helpers shared by the schedule logic
//! and the PRACH engine.

use crate::PrachError;
use serde::{Deserialize, Serialize};

/// Number of subcarriers per resource block
pub const N_RB_SC: u32 = 12;

/// Normal uplink subcarrier spacing in Hz
pub const DELTA_F: u32 = 15_000;

/// Basic LTE time unit Ts = 1 / (15000 * 2048) seconds
pub const LTE_TS: f64 = 1.0 / (15_000.0 * 2048.0);

/// Supported (nof_prb, symbol size) pairs for the uplink grid
const SYMBOL_SZ_TABLE: [(u32, u32); 6] =
    [(6, 128), (15, 256), (25, 512), (50, 1024), (75, 1536), (100, 2048)];

/// OFDM symbol size for a given uplink bandwidth in PRBs
pub fn symbol_size(nof_prb: u32) -> Result<u32, PrachError> {
    SYMBOL_SZ_TABLE
        .iter()
        .find(|(prb, _)| *prb == nof_prb)
        .map(|(_, sz)| *sz)
        .ok_or_else(|| {
            PrachError::ConfigOutOfRange(format!("unsupported bandwidth: {} PRB", nof_prb))
        })
}

/// Number of usable uplink PRBs for a given OFDM symbol size
pub fn nof_prb(symbol_sz: u32) -> Result<u32, PrachError> {
    SYMBOL_SZ_TABLE
        .iter()
        .find(|(_, sz)| *sz == symbol_sz)
        .map(|(prb, _)| *prb)
        .ok_or_else(|| {
            PrachError::ConfigOutOfRange(format!("unsupported symbol size: {}", symbol_sz))
        })
}

/// Subframe type within a TDD radio frame
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubframeType {
    Downlink,
    Special,
    Uplink,
}

/// TDD UL/DL subframe patterns, Table 4.2-2
const TDD_SF_PATTERN: [[SubframeType; 10]; 7] = {
    use SubframeType::{Downlink as D, Special as S, Uplink as U};
    [
        [D, S, U, U, U, D, S, U, U, U],
        [D, S, U, U, D, D, S, U, U, D],
        [D, S, U, D, D, D, S, U, D, D],
        [D, S, U, U, U, D, D, D, D, D],
        [D, S, U, U, D, D, D, D, D, D],
        [D, S, U, D, D, D, D, D, D, D],
        [D, S, U, U, U, D, S, U, U, D],
    ]
};

/// TDD cell configuration from SIB1
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
pub struct TddConfig {
    /// UL/DL configuration (0-6)
    pub sf_config: u32,
    /// Special subframe configuration (0-8)
    #[serde(default)]
    pub special_sf_config: u32,
}

impl TddConfig {
    /// Type of a subframe under this UL/DL configuration.
    ///
    /// `sf_config` must be < 7 and `sf_idx` < 10; both are validated when
    /// the configuration enters the PRACH context.
    pub fn subframe_type(&self, sf_idx: u32) -> SubframeType {
        TDD_SF_PATTERN[self.sf_config as usize][sf_idx as usize]
    }
}
