//! PRACH context: preamble generation and detection
//!
//! The [`Prach`] context carries one cell's preamble sequences, their DFT
//! duals, four DFT plans and the scratch buffers of the correlator. It is
//! created once per uplink carrier worker with [`Prach::new`] and then
//! reconfigured through the `set_cell` entry points; generation and
//! detection must not run concurrently on the same context.
//!
//! Detection multiplies the received PRACH bins with the conjugate root
//! spectra, inverse transforms into the cyclic shift domain and searches
//! one window per shift. A preamble is reported when its window peak
//! exceeds `detect_factor` times the correlation average.

use crate::common::{self, TddConfig, DELTA_F, LTE_TS, N_RB_SC};
use crate::config::PrachConfig;
use crate::dft::{DftBackend, DftDirection, DftPlan, RustFftBackend};
use crate::schedule;
use crate::sequence::{self, PreambleSet, N_SEQS};
use crate::tables::{
    MAX_N_ZC, MAX_ROOTS, PRACH_NCS_FORMAT4, PRACH_NCS_RESTRICTED, PRACH_NCS_UNRESTRICTED,
    PRACH_T_CP, PRACH_T_SEQ,
};
use crate::PrachError;
use num_complex::Complex32;
use tracing::{debug, trace};

/// PRACH subcarrier spacing in Hz, preamble formats 0-3
const DELTA_F_RA: u32 = 1250;
/// PRACH subcarrier spacing in Hz, preamble format 4
const DELTA_F_RA_4: u32 = 7500;
/// First PRACH bin offset, preamble formats 0-3
const PHI: i64 = 7;
/// First PRACH bin offset, preamble format 4
const PHI_4: i64 = 2;
/// Detection threshold is detect_factor times the correlation average
const DEFAULT_DETECT_FACTOR: f32 = 18.0;

/// One detected preamble
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PreambleDetection {
    /// Detected preamble index
    pub preamble_idx: u32,
    /// Estimated timing offset in seconds
    pub time_offset_secs: f32,
    /// Window peak over correlation average
    pub peak_to_avg: f32,
}

/// PRACH engine for one uplink carrier
pub struct Prach {
    // Cell parameters from higher layers
    config_idx: u32,
    format: u32,
    rsi: u32,
    hs: bool,
    zczc: u32,
    tdd_config: Option<TddConfig>,
    num_ra_preambles: u32,
    current_prach_idx: u32,

    // Derived parameters
    max_n_ifft_ul: u32,
    n_ifft_ul: u32,
    n_ifft_prach: u32,
    delta_f_ra: u32,
    n_zc: u32,
    n_cs: u32,
    n_seq: u32,
    n_cp: u32,
    t_seq: f32,
    t_tot: f32,

    detect_factor: f32,
    deadzone: u32,
    configured: bool,

    // Sequence tables
    preambles: PreambleSet,
    dft_seqs: Vec<Vec<Complex32>>,

    // DFT plans: ZC-length pair and PRACH IFFT/FFT pair
    zc_fft: Box<dyn DftPlan>,
    zc_ifft: Box<dyn DftPlan>,
    ifft: Box<dyn DftPlan>,
    fft: Box<dyn DftPlan>,

    // Scratch buffers, sized at init and reused per TTI
    ifft_in: Vec<Complex32>,
    ifft_out: Vec<Complex32>,
    signal_fft: Vec<Complex32>,
    prach_bins: Vec<Complex32>,
    corr_spec: Vec<Complex32>,
    corr_time: Vec<Complex32>,
    corr: Vec<f32>,
    peak_values: Vec<f32>,
    peak_offsets: Vec<u32>,
}

fn alloc_cf(len: usize) -> Result<Vec<Complex32>, PrachError> {
    let mut v = Vec::new();
    v.try_reserve_exact(len)
        .map_err(|_| PrachError::AllocationFailure(format!("{} complex samples", len)))?;
    v.resize(len, Complex32::default());
    Ok(v)
}

impl Prach {
    /// Create a context able to serve uplink IFFT sizes up to
    /// `max_n_ifft_ul`, using the default rustfft backend.
    pub fn new(max_n_ifft_ul: u32) -> Result<Self, PrachError> {
        Self::with_backend(Box::new(RustFftBackend::new()), max_n_ifft_ul)
    }

    /// Create a context driven by a caller-provided DFT backend.
    pub fn with_backend(
        mut backend: Box<dyn DftBackend>,
        max_n_ifft_ul: u32,
    ) -> Result<Self, PrachError> {
        if max_n_ifft_ul == 0 || max_n_ifft_ul > 2048 {
            return Err(PrachError::ConfigOutOfRange(format!(
                "max_N_ifft_ul={} not in 1..=2048",
                max_n_ifft_ul
            )));
        }
        let fft_size_alloc = (max_n_ifft_ul * (DELTA_F / DELTA_F_RA)) as usize;

        let mut zc_fft = backend.plan(MAX_N_ZC, DftDirection::Forward)?;
        zc_fft.set_mirror(false);
        zc_fft.set_norm(true);
        let mut zc_ifft = backend.plan(MAX_N_ZC, DftDirection::Backward)?;
        zc_ifft.set_mirror(false);
        zc_ifft.set_norm(false);
        let mut ifft = backend.plan(fft_size_alloc, DftDirection::Backward)?;
        ifft.set_mirror(true);
        ifft.set_norm(true);
        let mut fft = backend.plan(fft_size_alloc, DftDirection::Forward)?;
        fft.set_mirror(true);
        fft.set_norm(false);

        Ok(Self {
            config_idx: 0,
            format: 0,
            rsi: 0,
            hs: false,
            zczc: 0,
            tdd_config: None,
            num_ra_preambles: 0,
            current_prach_idx: 0,
            max_n_ifft_ul,
            n_ifft_ul: 0,
            n_ifft_prach: 0,
            delta_f_ra: DELTA_F_RA,
            n_zc: 0,
            n_cs: 0,
            n_seq: 0,
            n_cp: 0,
            t_seq: 0.0,
            t_tot: 0.0,
            detect_factor: DEFAULT_DETECT_FACTOR,
            deadzone: 0,
            configured: false,
            preambles: PreambleSet { seqs: Vec::new(), root_seqs_idx: Vec::new() },
            dft_seqs: Vec::new(),
            zc_fft,
            zc_ifft,
            ifft,
            fft,
            ifft_in: alloc_cf(fft_size_alloc)?,
            ifft_out: alloc_cf(fft_size_alloc)?,
            signal_fft: alloc_cf(fft_size_alloc)?,
            prach_bins: alloc_cf(MAX_N_ZC)?,
            corr_spec: alloc_cf(MAX_N_ZC)?,
            corr_time: alloc_cf(MAX_N_ZC)?,
            corr: vec![0.0; MAX_N_ZC],
            peak_values: Vec::new(),
            peak_offsets: Vec::new(),
        })
    }

    /// Configure for an FDD cell, clearing any prior TDD configuration.
    pub fn set_cell_fdd(
        &mut self,
        n_ifft_ul: u32,
        config_idx: u32,
        root_seq_index: u32,
        high_speed_flag: bool,
        zero_corr_zone_config: u32,
    ) -> Result<(), PrachError> {
        self.set_cell(
            n_ifft_ul,
            config_idx,
            root_seq_index,
            high_speed_flag,
            zero_corr_zone_config,
            None,
            0,
        )
    }

    /// Configure for a TDD cell.
    pub fn set_cell_tdd(
        &mut self,
        n_ifft_ul: u32,
        config_idx: u32,
        root_seq_index: u32,
        high_speed_flag: bool,
        zero_corr_zone_config: u32,
        tdd_config: TddConfig,
    ) -> Result<(), PrachError> {
        self.set_cell(
            n_ifft_ul,
            config_idx,
            root_seq_index,
            high_speed_flag,
            zero_corr_zone_config,
            Some(tdd_config),
            0,
        )
    }

    /// Configure from a [`PrachConfig`], deriving the uplink IFFT size
    /// from the cell bandwidth.
    pub fn set_cfg(&mut self, cfg: &PrachConfig, nof_prb: u32) -> Result<(), PrachError> {
        let n_ifft_ul = common::symbol_size(nof_prb)?;
        self.set_cell(
            n_ifft_ul,
            cfg.config_idx,
            cfg.root_seq_idx,
            cfg.hs_flag,
            cfg.zero_corr_zone,
            cfg.tdd_config,
            cfg.num_ra_preambles,
        )
    }

    #[allow(clippy::too_many_arguments)]
    fn set_cell(
        &mut self,
        n_ifft_ul: u32,
        config_idx: u32,
        root_seq_index: u32,
        high_speed_flag: bool,
        zero_corr_zone_config: u32,
        tdd_config: Option<TddConfig>,
        num_ra_preambles: u32,
    ) -> Result<(), PrachError> {
        if config_idx >= 64 {
            return Err(PrachError::ConfigOutOfRange(format!(
                "config_idx={} not below 64",
                config_idx
            )));
        }
        if n_ifft_ul > self.max_n_ifft_ul {
            return Err(PrachError::ConfigOutOfRange(format!(
                "N_ifft_ul={} exceeds max_N_ifft_ul={} given at init",
                n_ifft_ul, self.max_n_ifft_ul
            )));
        }
        // The symbol size must map to an uplink bandwidth for the
        // frequency mapping of gen and detect
        common::nof_prb(n_ifft_ul)?;
        if let Some(tdd) = &tdd_config {
            if tdd.sf_config >= 7 {
                return Err(PrachError::ConfigOutOfRange(format!(
                    "tdd_ul_dl_config={} not below 7",
                    tdd.sf_config
                )));
            }
        }

        // Configuration indices 48-63 of the frame structure type 2
        // tables carry the short format 4 preamble; FDD keeps the
        // config_idx / 16 mapping
        let format = if config_idx >= 48 && tdd_config.is_some() {
            4
        } else {
            schedule::preamble_format(config_idx)
        };
        let max_roots = if format == 4 { 138 } else { MAX_ROOTS as u32 };
        if root_seq_index >= max_roots {
            return Err(PrachError::ConfigOutOfRange(format!(
                "rootSequenceIndex={} not below {} for format {}",
                root_seq_index, max_roots, format
            )));
        }

        let zczc = zero_corr_zone_config as usize;
        let (n_zc, n_cs) = if format == 4 {
            match PRACH_NCS_FORMAT4.get(zczc) {
                Some(&n_cs) => (139u32, n_cs),
                None => {
                    return Err(PrachError::ConfigOutOfRange(format!(
                        "zeroCorrelationZoneConfig={} invalid for format 4",
                        zczc
                    )))
                }
            }
        } else if high_speed_flag {
            match PRACH_NCS_RESTRICTED.get(zczc) {
                Some(&n_cs) => (MAX_N_ZC as u32, n_cs),
                None => {
                    return Err(PrachError::ConfigOutOfRange(format!(
                        "zeroCorrelationZoneConfig={} invalid for the restricted set",
                        zczc
                    )))
                }
            }
        } else {
            match PRACH_NCS_UNRESTRICTED.get(zczc) {
                Some(&n_cs) => (MAX_N_ZC as u32, n_cs),
                None => {
                    return Err(PrachError::ConfigOutOfRange(format!(
                        "zeroCorrelationZoneConfig={} invalid",
                        zczc
                    )))
                }
            }
        };

        let delta_f_ra = if format == 4 { DELTA_F_RA_4 } else { DELTA_F_RA };
        let n_ifft_prach = n_ifft_ul * DELTA_F / delta_f_ra;

        // Reconfiguration starts here; an error below leaves the context
        // unconfigured but reusable
        self.configured = false;

        self.zc_fft.resize(n_zc as usize)?;
        self.zc_ifft.resize(n_zc as usize)?;
        self.ifft.resize(n_ifft_prach as usize)?;
        self.fft.resize(n_ifft_prach as usize)?;

        let preambles = sequence::generate(format, root_seq_index, n_zc, n_cs, high_speed_flag);
        let n_roots = preambles.n_roots() as u32;

        let mut dft_seqs = Vec::with_capacity(N_SEQS);
        for seq in &preambles.seqs {
            let mut spec = alloc_cf(n_zc as usize)?;
            self.zc_fft.run(seq, &mut spec)?;
            dft_seqs.push(spec);
        }

        let winsize = if n_cs != 0 { n_cs } else { n_zc };
        let n_wins = (n_zc / winsize) as usize;
        self.peak_values = vec![0.0; n_wins];
        self.peak_offsets = vec![0; n_wins];

        self.config_idx = config_idx;
        self.format = format;
        self.rsi = root_seq_index;
        self.hs = high_speed_flag;
        self.zczc = zero_corr_zone_config;
        self.tdd_config = tdd_config;
        self.current_prach_idx = 0;
        // Clamp the preamble count the detector correlates against
        self.num_ra_preambles = if num_ra_preambles < 4 || num_ra_preambles > n_roots {
            n_roots
        } else {
            num_ra_preambles
        };
        self.n_ifft_ul = n_ifft_ul;
        self.n_ifft_prach = n_ifft_prach;
        self.delta_f_ra = delta_f_ra;
        self.n_zc = n_zc;
        self.n_cs = n_cs;
        let f = format as usize;
        self.n_seq = PRACH_T_SEQ[f] * n_ifft_ul / 2048;
        self.n_cp = PRACH_T_CP[f] * n_ifft_ul / 2048;
        self.t_seq = (PRACH_T_SEQ[f] as f64 * LTE_TS) as f32;
        self.t_tot = ((PRACH_T_SEQ[f] + PRACH_T_CP[f]) as f64 * LTE_TS) as f32;
        self.preambles = preambles;
        self.dft_seqs = dft_seqs;
        self.configured = true;

        debug!(
            config_idx,
            format,
            root_seq_index,
            high_speed_flag,
            n_zc,
            n_cs,
            n_roots,
            n_ifft_prach,
            tdd = tdd_config.is_some(),
            "PRACH cell configured"
        );
        Ok(())
    }

    /// First PRACH bin of the mapped preamble for a frequency offset in
    /// PRBs; shared by generation and detection so both sides agree.
    fn freq_begin(&self, freq_offset: u32) -> Result<usize, PrachError> {
        let n_rb_ul = common::nof_prb(self.n_ifft_ul)?;
        if freq_offset > n_rb_ul - 6 {
            return Err(PrachError::InvalidInputs(format!(
                "no space for PRACH: freq_offset={}, N_rb_ul={}",
                freq_offset, n_rb_ul
            )));
        }
        let k = (DELTA_F / self.delta_f_ra) as i64;
        let phi = if self.format == 4 { PHI_4 } else { PHI };
        let k_0 = freq_offset as i64 * N_RB_SC as i64 - n_rb_ul as i64 * N_RB_SC as i64 / 2
            + self.n_ifft_ul as i64 / 2;
        let begin = phi + k * k_0 + k / 2;
        debug_assert!(begin >= 0 && (begin as usize + self.n_zc as usize) <= self.n_ifft_prach as usize);
        Ok(begin as usize)
    }

    fn check_configured(&self) -> Result<(), PrachError> {
        if self.configured {
            Ok(())
        } else {
            Err(PrachError::InvalidInputs("cell not configured".into()))
        }
    }

    /// Generate the baseband preamble waveform for `seq_index` into
    /// `signal`, which must hold at least [`Prach::gen_len`] samples.
    pub fn gen(
        &mut self,
        seq_index: u32,
        freq_offset: u32,
        signal: &mut [Complex32],
    ) -> Result<(), PrachError> {
        self.check_configured()?;
        if seq_index >= N_SEQS as u32 {
            return Err(PrachError::InvalidInputs(format!(
                "seq_index={} not below {}",
                seq_index, N_SEQS
            )));
        }
        let out_len = (self.n_cp + self.n_seq) as usize;
        if signal.len() < out_len {
            return Err(PrachError::InvalidInputs(format!(
                "output holds {} samples, preamble needs {}",
                signal.len(),
                out_len
            )));
        }
        let begin = self.freq_begin(freq_offset)?;

        let n = self.n_ifft_prach as usize;
        let n_zc = self.n_zc as usize;
        trace!(
            n_zc,
            n_cp = self.n_cp,
            n_seq = self.n_seq,
            n_ifft_prach = n,
            begin,
            "generating PRACH preamble"
        );

        // Map the DFT-precoded sequence into the centered PRACH spectrum
        self.ifft_in[..n].fill(Complex32::default());
        self.ifft_in[begin..begin + n_zc].copy_from_slice(&self.dft_seqs[seq_index as usize]);
        self.ifft.run(&self.ifft_in, &mut self.ifft_out)?;

        // Cyclic prefix, then the sequence repeated modulo the IFFT size
        let n_cp = self.n_cp as usize;
        signal[..n_cp].copy_from_slice(&self.ifft_out[n - n_cp..n]);
        for i in 0..self.n_seq as usize {
            signal[n_cp + i] = self.ifft_out[i % n];
        }
        Ok(())
    }

    /// Detect preamble indices in `signal`; see [`Prach::detect_offset`].
    pub fn detect(&mut self, freq_offset: u32, signal: &[Complex32]) -> Result<Vec<u32>, PrachError> {
        Ok(self
            .detect_offset(freq_offset, signal)?
            .into_iter()
            .map(|d| d.preamble_idx)
            .collect())
    }

    /// Detect preambles in `signal` with timing offsets and peak-to-average
    /// ratios. `signal` must hold at least `n_ifft_prach` samples; a clean
    /// signal yields an empty result.
    pub fn detect_offset(
        &mut self,
        freq_offset: u32,
        signal: &[Complex32],
    ) -> Result<Vec<PreambleDetection>, PrachError> {
        self.check_configured()?;
        if signal.is_empty() {
            return Err(PrachError::InvalidInputs("empty signal".into()));
        }
        if signal.len() < self.n_ifft_prach as usize {
            return Err(PrachError::InvalidInputs(format!(
                "signal length {} below N_ifft_prach {}",
                signal.len(),
                self.n_ifft_prach
            )));
        }

        self.fft.run(signal, &mut self.signal_fft)?;

        let begin = self.freq_begin(freq_offset)?;
        let n_zc = self.n_zc as usize;
        self.prach_bins[..n_zc].copy_from_slice(&self.signal_fft[begin..begin + n_zc]);

        let winsize = if self.n_cs != 0 { self.n_cs } else { self.n_zc } as usize;
        let n_wins = n_zc / winsize;
        let deadzone = self.deadzone as usize;
        let mut detections = Vec::new();

        for r in 0..self.num_ra_preambles as usize {
            let root_spec = &self.dft_seqs[self.preambles.root_seqs_idx[r]];

            // Cross-correlation spectrum against this root
            for j in 0..n_zc {
                self.corr_spec[j] = self.prach_bins[j] * root_spec[j].conj();
            }
            self.zc_ifft.run(&self.corr_spec, &mut self.corr_time)?;
            for j in 0..n_zc {
                self.corr[j] = self.corr_time[j].norm_sqr();
            }
            let corr_ave = self.corr[..n_zc].iter().sum::<f32>() / n_zc as f32;

            // Peak per cyclic shift window
            let mut max_peak = 0.0f32;
            for j in 0..n_wins {
                let mut start = (n_zc - j * self.n_cs as usize) % n_zc;
                let mut end = start + winsize;
                if end > deadzone {
                    end -= deadzone;
                }
                start += deadzone;
                self.peak_values[j] = 0.0;
                self.peak_offsets[j] = 0;
                for k in start..end {
                    if self.corr[k] > self.peak_values[j] {
                        self.peak_values[j] = self.corr[k];
                        self.peak_offsets[j] = (k - start) as u32;
                        if self.peak_values[j] > max_peak {
                            max_peak = self.peak_values[j];
                        }
                    }
                }
            }

            let threshold = self.detect_factor * corr_ave;
            if max_peak > threshold {
                for j in 0..n_wins {
                    if self.peak_values[j] > threshold {
                        let peak_offset = self.peak_offsets[j];
                        // Empirical compensation for correlator asymmetry
                        let factor = if peak_offset > 250 {
                            1.91
                        } else if peak_offset > 30 {
                            1.9
                        } else {
                            1.8
                        };
                        let detection = PreambleDetection {
                            preamble_idx: (r * n_wins + j) as u32,
                            time_offset_secs: factor * peak_offset as f32
                                / (self.delta_f_ra as f32 * self.n_zc as f32),
                            peak_to_avg: self.peak_values[j] / corr_ave,
                        };
                        trace!(
                            preamble_idx = detection.preamble_idx,
                            peak_to_avg = detection.peak_to_avg,
                            time_offset_secs = detection.time_offset_secs,
                            "PRACH preamble detected"
                        );
                        detections.push(detection);
                    }
                }
            }
        }

        if !detections.is_empty() {
            debug!(count = detections.len(), "PRACH detection complete");
        }
        Ok(detections)
    }

    /// True if `current_tti` is a PRACH opportunity for the configured
    /// cell. In TDD mode the matching Table 5.7.1-4 row is remembered and
    /// readable through [`Prach::current_prach_idx`].
    pub fn tti_opportunity(&mut self, current_tti: u32, allowed_subframe: Option<u32>) -> bool {
        match &self.tdd_config {
            None => schedule::tti_opportunity_fdd(self.config_idx, current_tti, allowed_subframe),
            Some(tdd) => {
                match schedule::tti_opportunity_tdd(self.config_idx, tdd.sf_config, current_tti) {
                    Ok(Some(prach_idx)) => {
                        self.current_prach_idx = prach_idx;
                        true
                    }
                    _ => false,
                }
            }
        }
    }

    /// Override the detection threshold factor (default 18).
    pub fn set_detect_factor(&mut self, factor: f32) {
        self.detect_factor = factor;
    }

    /// Samples trimmed from both ends of each correlation window
    /// (default 0).
    pub fn set_deadzone(&mut self, deadzone: u32) {
        self.deadzone = deadzone;
    }

    /// Preamble length in samples, N_cp + N_seq.
    pub fn gen_len(&self) -> usize {
        (self.n_cp + self.n_seq) as usize
    }

    /// PRACH configuration index of the configured cell.
    pub fn config_idx(&self) -> u32 {
        self.config_idx
    }

    /// Preamble format of the configured cell (0-4).
    pub fn format(&self) -> u32 {
        self.format
    }

    /// Logical root sequence index of the configured cell.
    pub fn root_seq_index(&self) -> u32 {
        self.rsi
    }

    /// True when the restricted cyclic shift set is active.
    pub fn high_speed_flag(&self) -> bool {
        self.hs
    }

    /// Zero correlation zone configuration of the cell.
    pub fn zero_corr_zone_config(&self) -> u32 {
        self.zczc
    }

    pub fn n_zc(&self) -> u32 {
        self.n_zc
    }

    pub fn n_cs(&self) -> u32 {
        self.n_cs
    }

    pub fn n_seq(&self) -> u32 {
        self.n_seq
    }

    pub fn n_cp(&self) -> u32 {
        self.n_cp
    }

    pub fn n_ifft_prach(&self) -> u32 {
        self.n_ifft_prach
    }

    pub fn n_roots(&self) -> u32 {
        self.preambles.n_roots() as u32
    }

    pub fn num_ra_preambles(&self) -> u32 {
        self.num_ra_preambles
    }

    /// Preamble sequence duration in seconds.
    pub fn t_seq_secs(&self) -> f32 {
        self.t_seq
    }

    /// Total preamble duration including the cyclic prefix, in seconds.
    pub fn t_tot_secs(&self) -> f32 {
        self.t_tot
    }

    /// Table 5.7.1-4 row matched by the last TDD opportunity.
    pub fn current_prach_idx(&self) -> u32 {
        self.current_prach_idx
    }
}
