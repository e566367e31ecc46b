// SPDX-License-Identifier: LGPL-3.0-or-later

//! Correction-table geometry and oscillator parameter limits.
//!
//! The minBLEP correction tables are oversampled in the phase dimension
//! by [`MINBLEP_PHASES`] and truncated to a fixed number of output
//! samples per pulse. All oscillator variants share these constants, so
//! they live here rather than in the table module.

/// Oversampling factor of the correction tables in the phase dimension.
/// Must be a power of two so that out-of-range indices can be masked.
pub const MINBLEP_PHASES: usize = 64;

/// [`MINBLEP_PHASES`] minus one, used to mask a computed table index
/// back into the valid phase range.
pub const MINBLEP_PHASE_MASK: i32 = 63;

/// Length in output samples of the (truncated) step-discontinuity pulse.
pub const STEP_DD_PULSE_LENGTH: usize = 72;

/// Length in output samples of the (truncated) slope-discontinuity pulse.
pub const SLOPE_DD_PULSE_LENGTH: usize = 71;

/// The longer of the two pulse lengths; sizes the correction buffer tail.
pub const LONGEST_DD_PULSE_LENGTH: usize = STEP_DD_PULSE_LENGTH;

/// Delay in samples between the start of a correction pulse and the
/// discontinuity itself. The naive waveform is written this many samples
/// ahead of the read position, so each pulse has both a pre- and a
/// post-discontinuity tail.
pub const DD_SAMPLE_DELAY: usize = 4;

/// Number of samples between cursor resets of the correction buffer.
/// The per-sample indexing inside one fold period needs no modulo.
pub const FOLD_PERIOD: usize = 256;

/// Number of samples between control-rate parameter recomputations.
pub const CONTROL_INTERVAL: usize = 16;

/// Minimum phase increment per sample. Forbids zero and negative rates.
pub const W_MIN: f32 = 1e-5;

/// Maximum phase increment per sample (the Nyquist limit).
pub const W_MAX: f32 = 0.5;

/// Sentinel added to an encoded sync offset so that a sync event at
/// exactly phase zero is distinguishable from "no sync this sample".
pub const SYNC_EPS: f32 = 1e-20;

/// Default sample rate (Hz) before [`set_sample_rate`] is called.
///
/// [`set_sample_rate`]: crate::vco::SawVco::set_sample_rate
pub const DEFAULT_SAMPLE_RATE: f32 = 48000.0;

/// Default oscillator frequency (Hz).
pub const DEFAULT_FREQUENCY: f32 = 440.0;

#[cfg(test)]
#[allow(clippy::assertions_on_constants)]
mod tests {
    use super::*;

    #[test]
    fn test_phase_mask_matches_oversampling() {
        assert!(MINBLEP_PHASES.is_power_of_two());
        assert_eq!(MINBLEP_PHASE_MASK as usize, MINBLEP_PHASES - 1);
    }

    #[test]
    fn test_pulse_lengths() {
        assert!(LONGEST_DD_PULSE_LENGTH >= STEP_DD_PULSE_LENGTH);
        assert!(LONGEST_DD_PULSE_LENGTH >= SLOPE_DD_PULSE_LENGTH);
        assert!(DD_SAMPLE_DELAY < SLOPE_DD_PULSE_LENGTH);
    }

    #[test]
    fn test_increment_limits() {
        assert!(W_MIN > 0.0);
        assert!(W_MAX <= 0.5);
        assert!(W_MIN < W_MAX);
    }
}
