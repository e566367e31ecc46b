// SPDX-License-Identifier: LGPL-3.0-or-later

//! Forward-looking correction buffer and discontinuity injector.
//!
//! Oscillators do not emit their naive waveform directly. Each sample,
//! the naive value is accumulated [`DD_SAMPLE_DELAY`] samples ahead of
//! the read cursor, and every detected discontinuity smears a correction
//! pulse into the samples ahead of the cursor. The delayed read-out is
//! therefore the sum of the naive waveform and all overlapping
//! correction pulses, i.e. the band-limited waveform.
//!
//! The buffer owns `FOLD_PERIOD + LONGEST_DD_PULSE_LENGTH` samples. The
//! cursor walks the first `FOLD_PERIOD` positions without any index
//! wrapping; pulses spill into the tail region. When the cursor reaches
//! the end of the fold region, the still-pending tail is copied to the
//! front and the rest zeroed. This keeps the per-sample path free of
//! modulo arithmetic while bounding the storage.

use crate::consts::{
    DD_SAMPLE_DELAY, FOLD_PERIOD, LONGEST_DD_PULSE_LENGTH, MINBLEP_PHASES, MINBLEP_PHASE_MASK,
};
use crate::tables::{tables, SLOPE_TABLE_LEN, STEP_TABLE_LEN};

/// Accumulation buffer into which correction pulses are written ahead of
/// the read cursor.
///
/// Storage is allocated once at construction; processing never
/// reallocates and never fails.
#[derive(Debug, Clone)]
pub struct CorrectionBuffer {
    data: Vec<f32>,
    pos: usize,
}

impl Default for CorrectionBuffer {
    fn default() -> Self {
        Self::new()
    }
}

impl CorrectionBuffer {
    /// Create a cleared buffer with the cursor at the front.
    pub fn new() -> Self {
        Self {
            data: vec![0.0; FOLD_PERIOD + LONGEST_DD_PULSE_LENGTH],
            pos: 0,
        }
    }

    /// Zero the buffer and rewind the cursor.
    pub fn clear(&mut self) {
        self.data.fill(0.0);
        self.pos = 0;
    }

    /// Inject a step-discontinuity correction of the given magnitude.
    ///
    /// `phase` is how far past the discontinuity the oscillator phase
    /// has already advanced (so `phase / w` is the sub-sample position
    /// of the edge), `w` the current phase increment, and `scale` the
    /// height of the step.
    pub fn place_step(&mut self, phase: f32, w: f32, scale: f32) {
        let t = tables();
        let r = MINBLEP_PHASES as f32 * phase / w;
        let mut i = (r - 0.5).round_ties_even() as i32;
        let r = r - i as f32;
        // Extreme modulation can push the index out of range; mask it
        // back rather than fail.
        i &= MINBLEP_PHASE_MASK;

        let mut i = i as usize;
        let mut at = self.pos;
        while i < STEP_TABLE_LEN {
            self.data[at] += scale * (t.step_value[i] + r * t.step_delta[i]);
            i += MINBLEP_PHASES;
            at += 1;
        }
    }

    /// Inject a slope-discontinuity correction.
    ///
    /// `slope_delta` is the change of slope in value units per unit
    /// phase; its audible magnitude over one sample scales with `w`, so
    /// the injected pulse is weighted by `slope_delta * w`.
    pub fn place_slope(&mut self, phase: f32, w: f32, slope_delta: f32) {
        let t = tables();
        let r = MINBLEP_PHASES as f32 * phase / w;
        let mut i = (r - 0.5).round_ties_even() as i32;
        let r = r - i as f32;
        i &= MINBLEP_PHASE_MASK;

        let scale = slope_delta * w;
        let mut i = i as usize;
        let mut at = self.pos;
        while i < SLOPE_TABLE_LEN {
            self.data[at] += scale * (t.slope[i] + r * (t.slope[i + 1] - t.slope[i]));
            i += MINBLEP_PHASES;
            at += 1;
        }
    }

    /// Accumulate the current naive waveform value, one discontinuity
    /// delay ahead of the read cursor.
    #[inline]
    pub fn feed(&mut self, value: f32) {
        self.data[self.pos + DD_SAMPLE_DELAY] += value;
    }

    /// Read the corrected sample at the cursor.
    #[inline]
    pub fn read(&self) -> f32 {
        self.data[self.pos]
    }

    /// Advance the cursor, folding the pending tail back to the front
    /// when the fold region is exhausted.
    #[inline]
    pub fn advance(&mut self) {
        self.pos += 1;
        if self.pos == FOLD_PERIOD {
            self.pos = 0;
            self.data
                .copy_within(FOLD_PERIOD..FOLD_PERIOD + LONGEST_DD_PULSE_LENGTH, 0);
            self.data[LONGEST_DD_PULSE_LENGTH..].fill(0.0);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::consts::{SLOPE_DD_PULSE_LENGTH, STEP_DD_PULSE_LENGTH};

    #[test]
    fn test_feed_arrives_after_discontinuity_delay() {
        let mut buf = CorrectionBuffer::new();
        buf.feed(1.0);
        for _ in 0..DD_SAMPLE_DELAY {
            assert_eq!(buf.read(), 0.0, "value must not appear early");
            buf.advance();
            buf.feed(0.0);
        }
        assert_eq!(buf.read(), 1.0, "value must appear after the delay");
    }

    #[test]
    fn test_place_step_reconstructs_band_limited_step() {
        let mut buf = CorrectionBuffer::new();
        let w = 0.1;

        // Edge exactly on the sample boundary, rising from 0 to 1. The
        // naive value is already 1 on the sample that detects the edge,
        // so every feed from here on is 1; the correction fills in the
        // band-limited transition around the discontinuity row.
        buf.place_step(0.0, w, 1.0);
        let mut out = Vec::new();
        for _ in 0..STEP_DD_PULSE_LENGTH + 8 {
            buf.feed(1.0);
            out.push(buf.read());
            buf.advance();
        }

        assert!(out[0].abs() < 0.05, "step should start near 0");
        let tail = out[STEP_DD_PULSE_LENGTH + 4];
        assert!(
            (tail - 1.0).abs() < 0.01,
            "step should settle at 1, got {tail}"
        );
        // Band-limited rise passes through the midpoint region around
        // the discontinuity delay.
        let mid = out[DD_SAMPLE_DELAY];
        assert!(
            mid > 0.1 && mid < 1.2,
            "rise should be underway at the discontinuity row, got {mid}"
        );
        for &v in &out {
            assert!(v.is_finite() && v.abs() < 1.5);
        }
    }

    #[test]
    fn test_place_step_sub_sample_offset_shifts_pulse() {
        let w = 0.1;

        let render = |offset: f32| -> Vec<f32> {
            let mut buf = CorrectionBuffer::new();
            buf.place_step(offset, w, 1.0);
            (0..16)
                .map(|_| {
                    let v = buf.read();
                    buf.advance();
                    v
                })
                .collect()
        };

        // A later sub-sample position (smaller `phase` past the edge)
        // delays the correction energy.
        let early = render(0.09);
        let late = render(0.01);
        let lead_early: f32 = early[..DD_SAMPLE_DELAY].iter().sum();
        let lead_late: f32 = late[..DD_SAMPLE_DELAY].iter().sum();
        assert!(
            lead_early > lead_late,
            "pulse lead-in should grow with the edge offset ({lead_early} vs {lead_late})"
        );
    }

    #[test]
    fn test_out_of_range_index_is_masked() {
        let mut buf = CorrectionBuffer::new();
        // phase/w far outside [0, 1): the index is masked, not a panic.
        buf.place_step(25.0, 0.01, 1.0);
        buf.place_slope(-3.0, 0.01, 2.0);
        for &v in &buf.data {
            assert!(v.is_finite());
        }
    }

    #[test]
    fn test_fold_preserves_pending_tail() {
        let mut a = CorrectionBuffer::new();
        let mut b = CorrectionBuffer::new();

        // Walk `a` to just before the fold, then inject the same pulse
        // into both and compare read-outs across the fold boundary.
        for _ in 0..FOLD_PERIOD - 1 {
            a.advance();
        }
        a.place_step(0.05, 0.1, 1.0);
        b.place_step(0.05, 0.1, 1.0);

        for n in 0..STEP_DD_PULSE_LENGTH {
            assert_eq!(
                a.read(),
                b.read(),
                "fold changed the pending tail at sample {n}"
            );
            a.advance();
            b.advance();
        }
    }

    #[test]
    fn test_slope_injection_decays_to_naive_level() {
        let mut buf = CorrectionBuffer::new();
        let w = 0.05;

        // A ramp that bends flat exactly on this sample: from here on
        // the naive value holds still, and the slope correction rounds
        // off the corner. Far past the bend the corrected signal must
        // sit back on the naive level.
        buf.place_slope(0.0, w, -1.0);
        let mut out = Vec::new();
        for _ in 0..SLOPE_DD_PULSE_LENGTH + 8 {
            buf.feed(0.0);
            out.push(buf.read());
            buf.advance();
        }

        for &v in &out {
            assert!(v.is_finite());
        }
        assert!(
            out.iter().any(|v| v.abs() > 1e-4),
            "slope correction should inject some energy"
        );
        let tail = out[SLOPE_DD_PULSE_LENGTH + 4];
        assert!(
            tail.abs() < 0.01,
            "slope residual should vanish at the tail, got {tail}"
        );
    }
}
