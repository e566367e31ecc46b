// SPDX-License-Identifier: LGPL-3.0-or-later

//! Minimum-phase band-limited correction tables.
//!
//! Two read-only tables, oversampled by [`MINBLEP_PHASES`] in the phase
//! dimension, drive all discontinuity corrections:
//!
//! - the **step residual**: a minimum-phase band-limited step minus the
//!   naive unit step, stored as value/delta pairs for linear
//!   interpolation, [`STEP_DD_PULSE_LENGTH`] output samples long;
//! - the **slope residual**: a minimum-phase band-limited ramp minus the
//!   naive unit ramp, stored as raw samples interpolated between
//!   adjacent entries, [`SLOPE_DD_PULSE_LENGTH`] output samples long.
//!
//! Both residuals are aligned so that the naive discontinuity falls
//! exactly [`DD_SAMPLE_DELAY`] samples into the pulse, which is where
//! the oscillators write the ideal waveform value into the correction
//! buffer. The tables are process-lifetime constants, built once on
//! first use and shared read-only by every oscillator instance.
//!
//! Construction is the classic minBLEP recipe: a Blackman-windowed sinc
//! is made minimum-phase through the real cepstrum (FFT by `rustfft`),
//! integrated into a band-limited step, shifted so its delay lands
//! exactly on the discontinuity row, then differenced against the naive
//! step and ramp. All of this runs in `f64`; only the final residuals
//! are stored as `f32`.

use num_complex::Complex;
use once_cell::sync::Lazy;
use rustfft::{Fft, FftPlanner};

use crate::consts::{
    DD_SAMPLE_DELAY, MINBLEP_PHASES, SLOPE_DD_PULSE_LENGTH, STEP_DD_PULSE_LENGTH,
};

/// Zero crossings on each side of the windowed sinc kernel.
const KERNEL_ZERO_CROSSINGS: usize = 32;

/// Oversampled length of the windowed sinc kernel.
const KERNEL_LEN: usize = 2 * KERNEL_ZERO_CROSSINGS * MINBLEP_PHASES;

/// FFT length for the cepstral minimum-phase transform. Generous
/// zero-padding keeps cepstral aliasing below the table quantization.
const FFT_LEN: usize = 32768;

/// Number of step-residual entries.
pub(crate) const STEP_TABLE_LEN: usize = STEP_DD_PULSE_LENGTH * MINBLEP_PHASES;

/// Number of slope-residual entries walked by the injector. One extra
/// entry is stored so `slope[i + 1]` is always valid.
pub(crate) const SLOPE_TABLE_LEN: usize = SLOPE_DD_PULSE_LENGTH * MINBLEP_PHASES;

/// The correction tables. See the module documentation.
pub struct MinBlepTables {
    /// Step residual values, [`STEP_TABLE_LEN`] entries.
    pub(crate) step_value: Vec<f32>,
    /// First differences of the step residual, one per value entry.
    pub(crate) step_delta: Vec<f32>,
    /// Slope residual samples, [`SLOPE_TABLE_LEN`] + 1 entries.
    pub(crate) slope: Vec<f32>,
}

static TABLES: Lazy<MinBlepTables> = Lazy::new(MinBlepTables::build);

/// Access the shared correction tables, building them on first use.
pub fn tables() -> &'static MinBlepTables {
    &TABLES
}

impl MinBlepTables {
    fn build() -> Self {
        let p = MINBLEP_PHASES as f64;

        // Blackman-windowed sinc with cutoff at the output Nyquist rate.
        let mut kernel = vec![0.0f64; KERNEL_LEN];
        let half = (KERNEL_LEN / 2) as f64;
        for (e, k) in kernel.iter_mut().enumerate() {
            let t = (e as f64 - half) / p;
            *k = sinc(t) * blackman(e as f64 / (KERNEL_LEN - 1) as f64);
        }

        let impulse = minimum_phase(&kernel);

        // Unit DC gain, so the integrated step settles at exactly 1.
        let scale = 1.0 / impulse.iter().sum::<f64>();

        let mut step = vec![0.0f64; FFT_LEN];
        let mut acc = 0.0f64;
        for (e, s) in step.iter_mut().enumerate() {
            acc += impulse[e] * scale;
            *s = acc;
        }

        // Delay of the band-limited step, in output samples, under the
        // same rectangle-rule quadrature used for the ramp below.
        let raw_delay = step.iter().map(|s| 1.0 - s).sum::<f64>() / p;

        // Shift the step so its delay lands exactly on DD_SAMPLE_DELAY.
        // A linear-interpolation shift moves the rectangle-rule delay by
        // exactly the fractional amount, so the slope residual's tail
        // settles at zero rather than a constant.
        let shift = ((DD_SAMPLE_DELAY as f64 - raw_delay) * p).max(0.0);
        let whole = shift.floor() as usize;
        let frac = shift - whole as f64;
        let sample = |e: isize| -> f64 {
            if e < 0 {
                0.0
            } else {
                step[(e as usize).min(FFT_LEN - 1)]
            }
        };
        let len = STEP_TABLE_LEN.max(SLOPE_TABLE_LEN) + 2;
        let mut aligned = vec![0.0f64; len];
        for (e, a) in aligned.iter_mut().enumerate() {
            let i = e as isize - whole as isize;
            *a = (1.0 - frac) * sample(i) + frac * sample(i - 1);
        }

        // Step residual: band-limited step minus the naive step placed
        // at the discontinuity row.
        let boundary = DD_SAMPLE_DELAY * MINBLEP_PHASES;
        let residual = |e: usize| -> f64 {
            aligned[e] - if e >= boundary { 1.0 } else { 0.0 }
        };
        let mut step_value = vec![0.0f32; STEP_TABLE_LEN];
        let mut step_delta = vec![0.0f32; STEP_TABLE_LEN];
        for e in 0..STEP_TABLE_LEN {
            step_value[e] = residual(e) as f32;
            step_delta[e] = (residual(e + 1) - residual(e)) as f32;
        }

        // Slope residual: band-limited ramp minus the naive ramp. The
        // rectangle-rule integral matches the delay computation above.
        let mut slope = vec![0.0f32; SLOPE_TABLE_LEN + 1];
        let mut ramp = 0.0f64;
        for (e, s) in slope.iter_mut().enumerate() {
            let naive = (e as f64 / p - DD_SAMPLE_DELAY as f64).max(0.0);
            *s = (ramp - naive) as f32;
            ramp += aligned[e] / p;
        }

        Self {
            step_value,
            step_delta,
            slope,
        }
    }
}

/// Normalized sinc.
fn sinc(t: f64) -> f64 {
    let x = std::f64::consts::PI * t;
    if x.abs() < 1e-9 {
        1.0
    } else {
        x.sin() / x
    }
}

/// Blackman window over `x` in [0, 1].
fn blackman(x: f64) -> f64 {
    let w = 2.0 * std::f64::consts::PI * x;
    0.42 - 0.5 * w.cos() + 0.08 * (2.0 * w).cos()
}

/// Minimum-phase reconstruction of `kernel` via the real cepstrum.
///
/// The magnitude spectrum is kept and the phase replaced by the unique
/// minimum-phase response: fold the cepstrum onto positive quefrencies,
/// exponentiate, and transform back. Returns [`FFT_LEN`] samples with
/// the pulse energy packed at the front.
fn minimum_phase(kernel: &[f64]) -> Vec<f64> {
    let n = FFT_LEN;
    let mut planner = FftPlanner::<f64>::new();
    let fwd = planner.plan_fft_forward(n);
    let inv = planner.plan_fft_inverse(n);
    let norm = 1.0 / n as f64;

    let mut buf: Vec<Complex<f64>> = kernel.iter().map(|&x| Complex::new(x, 0.0)).collect();
    buf.resize(n, Complex::new(0.0, 0.0));
    fwd.process(&mut buf);

    // Log magnitude, floored to keep the cepstrum finite in the stopband.
    let floor = buf.iter().map(|c| c.norm()).fold(0.0f64, f64::max) * 1e-10;
    for c in buf.iter_mut() {
        *c = Complex::new(c.norm().max(floor).ln(), 0.0);
    }

    // Real cepstrum (rustfft's inverse is unnormalized).
    inv.process(&mut buf);
    for c in buf.iter_mut() {
        *c *= norm;
    }

    // Fold onto positive quefrencies.
    for q in 1..n / 2 {
        buf[q] *= 2.0;
    }
    for q in n / 2 + 1..n {
        buf[q] = Complex::new(0.0, 0.0);
    }

    fwd.process(&mut buf);
    for c in buf.iter_mut() {
        *c = c.exp();
    }
    inv.process(&mut buf);

    buf.iter().map(|c| c.re * norm).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tables_are_finite() {
        let t = tables();
        assert_eq!(t.step_value.len(), STEP_TABLE_LEN);
        assert_eq!(t.step_delta.len(), STEP_TABLE_LEN);
        assert_eq!(t.slope.len(), SLOPE_TABLE_LEN + 1);
        for &v in t.step_value.iter().chain(&t.step_delta).chain(&t.slope) {
            assert!(v.is_finite(), "table entry is not finite: {v}");
        }
    }

    #[test]
    fn test_step_residual_shape() {
        let t = tables();

        // The pulse starts from (near) zero and the truncated tail has
        // decayed to (near) zero.
        assert!(
            t.step_value[0].abs() < 1e-3,
            "step residual should start near zero, got {}",
            t.step_value[0]
        );
        assert!(
            t.step_value[STEP_TABLE_LEN - 1].abs() < 1e-3,
            "step residual tail should be near zero, got {}",
            t.step_value[STEP_TABLE_LEN - 1]
        );

        // The residual drops by one full step where the naive edge is
        // subtracted, one discontinuity-delay into the pulse.
        let boundary = DD_SAMPLE_DELAY * MINBLEP_PHASES;
        let jump = t.step_delta[boundary - 1];
        assert!(
            (jump + 1.0).abs() < 0.05,
            "expected a unit drop at the discontinuity row, got {jump}"
        );

        // Residual magnitudes stay within the band-limited overshoot.
        for (e, &v) in t.step_value.iter().enumerate() {
            assert!(v.abs() < 1.3, "step residual out of range at {e}: {v}");
        }
    }

    #[test]
    fn test_step_residual_delay_alignment() {
        let t = tables();

        // Reconstruct the band-limited step and check its delay: the
        // area above the step must equal the discontinuity delay.
        let boundary = DD_SAMPLE_DELAY * MINBLEP_PHASES;
        let mut area = 0.0f64;
        for (e, &v) in t.step_value.iter().enumerate() {
            let step = v as f64 + if e >= boundary { 1.0 } else { 0.0 };
            area += 1.0 - step;
        }
        let delay = area / MINBLEP_PHASES as f64;
        assert!(
            (delay - DD_SAMPLE_DELAY as f64).abs() < 0.02,
            "band-limited step delay should be {DD_SAMPLE_DELAY}, got {delay}"
        );
    }

    #[test]
    fn test_slope_residual_shape() {
        let t = tables();

        assert!(
            t.slope[0].abs() < 1e-6,
            "slope residual must start at zero, got {}",
            t.slope[0]
        );
        assert!(
            t.slope[SLOPE_TABLE_LEN].abs() < 1e-2,
            "slope residual tail should be near zero, got {}",
            t.slope[SLOPE_TABLE_LEN]
        );
        for (e, &v) in t.slope.iter().enumerate() {
            assert!(v.abs() < 4.0, "slope residual out of range at {e}: {v}");
        }
    }

    #[test]
    fn test_step_deltas_are_first_differences() {
        let t = tables();
        for e in 0..STEP_TABLE_LEN - 1 {
            let d = t.step_value[e + 1] - t.step_value[e];
            assert!(
                (d - t.step_delta[e]).abs() < 1e-6,
                "delta mismatch at {e}"
            );
        }
    }

    #[test]
    fn test_shared_instance() {
        let a = tables() as *const MinBlepTables;
        let b = tables() as *const MinBlepTables;
        assert_eq!(a, b, "tables must be a single shared instance");
    }
}
