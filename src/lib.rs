//! LTE Physical Random Access Channel (PRACH) Engine
//!
//! Implements uplink PRACH preamble generation and detection according to
//! 3GPP TS 36.211 Release 10 Section 5.7: preamble formats 0-4, FDD and TDD
//! opportunity scheduling, and both the unrestricted and the restricted
//! (high speed) cyclic shift sets.
//!
//! The [`Prach`] context owns the 64 preamble sequences of a cell, their
//! DFT duals and four DFT plans. It is reconfigured with
//! [`Prach::set_cell_fdd`] / [`Prach::set_cell_tdd`] and then driven once
//! per TTI: [`Prach::gen`] produces the uplink baseband waveform,
//! [`Prach::detect_offset`] locates received preambles and their timing
//! offsets. A context must not be shared between threads; one context per
//! uplink carrier worker is the intended deployment, and any number of
//! contexts may run in parallel since each owns its plans and scratch
//! buffers.
//!
//! Diagnostics are emitted through `tracing`; the embedding application
//! decides where they go by installing a subscriber.

pub mod common;
pub mod config;
pub mod dft;
pub mod prach;
pub mod schedule;
pub mod sequence;
pub mod tables;

use thiserror::Error;

/// Errors reported by the PRACH engine
#[derive(Error, Debug)]
pub enum PrachError {
    #[error("Invalid inputs: {0}")]
    InvalidInputs(String),

    #[error("Configuration out of range: {0}")]
    ConfigOutOfRange(String),

    #[error("Allocation failure: {0}")]
    AllocationFailure(String),

    #[error("DFT backend error: {0}")]
    DftBackendError(String),
}

// Re-export commonly used types
pub use common::{nof_prb, symbol_size, SubframeType, TddConfig};
pub use config::PrachConfig;
pub use dft::{DftBackend, DftDirection, DftPlan, RustFftBackend};
pub use prach::{Prach, PreambleDetection};
pub use schedule::{preamble_format, sfn_pattern, SfnPattern};
