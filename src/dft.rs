//! DFT backend
//!
//! The PRACH engine runs four DFT plans: a forward/inverse pair at the
//! Zadoff-Chu sequence length and a forward/inverse pair at the PRACH
//! IFFT size. The backend is pluggable: any FFT library exposing a
//! create/resize/run plan lifecycle can drive the engine through the
//! [`DftBackend`] and [`DftPlan`] traits. The default backend wraps
//! rustfft.
//!
//! Plans carry the two options the PRACH math relies on: half-spectrum
//! mirroring (centered-spectrum input for inverse transforms, centered
//! output for forward transforms) and 1/sqrt(N) output normalization.

use crate::PrachError;
use num_complex::Complex32;
use rustfft::{Fft, FftDirection, FftPlanner};
use std::sync::Arc;

/// Transform direction
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DftDirection {
    Forward,
    Backward,
}

/// A sized DFT plan
pub trait DftPlan {
    /// Current transform length
    fn size(&self) -> usize;

    /// Re-plan for a new length, keeping direction and options
    fn resize(&mut self, size: usize) -> Result<(), PrachError>;

    /// Swap spectrum halves: before the transform for backward plans,
    /// after the transform for forward plans
    fn set_mirror(&mut self, mirror: bool);

    /// Scale the output by 1/sqrt(N)
    fn set_norm(&mut self, norm: bool);

    /// Run the transform over the first `size()` elements of `input`
    fn run(&mut self, input: &[Complex32], output: &mut [Complex32]) -> Result<(), PrachError>;
}

/// Factory for DFT plans
pub trait DftBackend {
    fn plan(
        &mut self,
        size: usize,
        direction: DftDirection,
    ) -> Result<Box<dyn DftPlan>, PrachError>;
}

/// Default software backend built on rustfft
#[derive(Default)]
pub struct RustFftBackend;

impl RustFftBackend {
    pub fn new() -> Self {
        Self
    }
}

impl DftBackend for RustFftBackend {
    fn plan(
        &mut self,
        size: usize,
        direction: DftDirection,
    ) -> Result<Box<dyn DftPlan>, PrachError> {
        Ok(Box::new(RustFftPlan::new(size, direction)?))
    }
}

/// rustfft-backed plan
pub struct RustFftPlan {
    size: usize,
    direction: DftDirection,
    mirror: bool,
    norm: bool,
    fft: Arc<dyn Fft<f32>>,
    work: Vec<Complex32>,
}

impl RustFftPlan {
    fn new(size: usize, direction: DftDirection) -> Result<Self, PrachError> {
        if size == 0 {
            return Err(PrachError::DftBackendError("zero-length DFT plan".into()));
        }
        let fft = plan_fft(size, direction);
        let mut work = Vec::new();
        work.try_reserve_exact(size)
            .map_err(|_| PrachError::AllocationFailure(format!("DFT work buffer ({size})")))?;
        work.resize(size, Complex32::default());
        Ok(Self {
            size,
            direction,
            mirror: false,
            norm: false,
            fft,
            work,
        })
    }
}

fn plan_fft(size: usize, direction: DftDirection) -> Arc<dyn Fft<f32>> {
    let mut planner = FftPlanner::new();
    match direction {
        DftDirection::Forward => planner.plan_fft(size, FftDirection::Forward),
        DftDirection::Backward => planner.plan_fft(size, FftDirection::Inverse),
    }
}

impl DftPlan for RustFftPlan {
    fn size(&self) -> usize {
        self.size
    }

    fn resize(&mut self, size: usize) -> Result<(), PrachError> {
        if size == 0 {
            return Err(PrachError::DftBackendError("zero-length DFT plan".into()));
        }
        if size != self.size {
            self.fft = plan_fft(size, self.direction);
            self.work
                .try_reserve_exact(size.saturating_sub(self.work.len()))
                .map_err(|_| PrachError::AllocationFailure(format!("DFT work buffer ({size})")))?;
            self.work.resize(size, Complex32::default());
            self.size = size;
        }
        Ok(())
    }

    fn set_mirror(&mut self, mirror: bool) {
        self.mirror = mirror;
    }

    fn set_norm(&mut self, norm: bool) {
        self.norm = norm;
    }

    fn run(&mut self, input: &[Complex32], output: &mut [Complex32]) -> Result<(), PrachError> {
        let n = self.size;
        if input.len() < n || output.len() < n {
            return Err(PrachError::InvalidInputs(format!(
                "DFT buffers too short: input={}, output={}, plan={}",
                input.len(),
                output.len(),
                n
            )));
        }

        let work = &mut self.work[..n];
        if self.mirror && self.direction == DftDirection::Backward {
            // Centered spectrum in, FFT bin order for the transform
            let h = n / 2;
            work[..n - h].copy_from_slice(&input[h..n]);
            work[n - h..].copy_from_slice(&input[..h]);
        } else {
            work.copy_from_slice(&input[..n]);
        }

        self.fft.process(work);

        if self.mirror && self.direction == DftDirection::Forward {
            // FFT bin order out of the transform, centered spectrum out
            let h = n.div_ceil(2);
            output[..n - h].copy_from_slice(&work[h..n]);
            output[n - h..n].copy_from_slice(&work[..h]);
        } else {
            output[..n].copy_from_slice(work);
        }

        if self.norm {
            let scale = 1.0 / (n as f32).sqrt();
            for v in output[..n].iter_mut() {
                *v *= scale;
            }
        }
        Ok(())
    }
}
