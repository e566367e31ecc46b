// SPDX-License-Identifier: LGPL-3.0-or-later

//! Band-limited triangle oscillator with variable peak position.
//!
//! The ideal waveform ramps from -0.5 to +0.5 over the rising segment
//! (length `duty`) and back down over the falling segment. Segment
//! transitions change the derivative, not the value, so they are
//! corrected with slope pulses of magnitude `1/duty + 1/(1 - duty)`,
//! keeping the output continuous while removing the aliasing of the
//! corner. A hard-sync reset is the one place a triangle also jumps in
//! value, so the reset additionally injects a step covering the gap
//! between the pre-reset value and the new cycle's start.

use crate::buffer::CorrectionBuffer;
use crate::consts::{
    CONTROL_INTERVAL, DEFAULT_FREQUENCY, DEFAULT_SAMPLE_RATE, SYNC_EPS, W_MAX, W_MIN,
};
use crate::control::ControlRamp;

/// Active segment of the triangle cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Slope {
    /// Ramping from -0.5 up to +0.5 over `duty`.
    Rising,
    /// Ramping from +0.5 down to -0.5 over `1 - duty`.
    Falling,
}

/// Band-limited, hard-sync-capable triangle oscillator.
///
/// # Examples
/// ```
/// use minblep_vco::vco::TriVco;
///
/// let mut osc = TriVco::new(330.0);
/// osc.set_sample_rate(48000.0);
/// osc.set_duty_bias(0.6); // saw-leaning ramp, peak at 80% of the cycle
///
/// let mut audio = [0.0f32; 128];
/// let mut sync = [0.0f32; 128];
/// osc.process(&mut audio, &mut sync, &[], &[], &[]);
/// ```
#[derive(Debug, Clone)]
pub struct TriVco {
    sample_rate: f32,
    default_frequency: f32,
    duty_bias: f32,
    lowpass: f32,
    phase: f32,
    w: ControlRamp,
    duty: ControlRamp,
    segment: Slope,
    filter: f32,
    buffer: CorrectionBuffer,
    init: bool,
}

impl Default for TriVco {
    fn default() -> Self {
        Self::new(DEFAULT_FREQUENCY)
    }
}

impl TriVco {
    /// Create an oscillator. `default_frequency` (Hz) is used whenever
    /// the frequency input is left unconnected (an empty slice).
    pub fn new(default_frequency: f32) -> Self {
        Self {
            sample_rate: DEFAULT_SAMPLE_RATE,
            default_frequency,
            duty_bias: 0.0,
            lowpass: 0.5,
            phase: 0.0,
            w: ControlRamp::new(W_MIN),
            duty: ControlRamp::new(0.5),
            segment: Slope::Rising,
            filter: 0.0,
            buffer: CorrectionBuffer::new(),
            init: false,
        }
    }

    /// Set the sample rate in Hz.
    pub fn set_sample_rate(&mut self, sr: f32) -> &mut Self {
        self.sample_rate = sr.max(1.0);
        self
    }

    /// Set the control-rate peak-position bias. The per-sample duty
    /// target is `0.5 * (1 + bias + duty_mod[i])`, clamped so neither
    /// segment is shorter than one phase increment; 0 gives a symmetric
    /// triangle.
    pub fn set_duty_bias(&mut self, bias: f32) -> &mut Self {
        self.duty_bias = bias;
        self
    }

    /// Set the output brightness in [0, 1]. The one-pole smoothing
    /// coefficient is `0.2 + 0.8 * amount`, so some smoothing always
    /// remains.
    pub fn set_lowpass(&mut self, amount: f32) -> &mut Self {
        self.lowpass = amount.clamp(0.0, 1.0);
        self
    }

    /// Current phase in [0, 1).
    pub fn phase(&self) -> f32 {
        self.phase
    }

    /// Current phase increment per sample.
    pub fn increment(&self) -> f32 {
        self.w.value()
    }

    /// Current effective duty cycle (peak position).
    pub fn duty(&self) -> f32 {
        self.duty.value()
    }

    /// Sample rate in Hz.
    pub fn sample_rate(&self) -> f32 {
        self.sample_rate
    }

    /// Forget all running state; the next processed sample re-runs the
    /// first-sample bootstrap.
    pub fn reset(&mut self) {
        self.phase = 0.0;
        self.w = ControlRamp::new(W_MIN);
        self.duty = ControlRamp::new(0.5);
        self.segment = Slope::Rising;
        self.filter = 0.0;
        self.buffer.clear();
        self.init = false;
    }

    /// Process one block.
    ///
    /// `output` receives the band-limited waveform and `sync_out` the
    /// derived sync signal (the wrap's sub-sample position, or 0). The
    /// block length is the shorter of the two. `frequency` (Hz),
    /// `sync_in` and `duty_mod` are sample-rate signals covering the
    /// block; any of them may be empty, meaning "unconnected" (default
    /// frequency, no sync, no duty modulation).
    pub fn process(
        &mut self,
        output: &mut [f32],
        sync_out: &mut [f32],
        frequency: &[f32],
        sync_in: &[f32],
        duty_mod: &[f32],
    ) {
        let n = output.len().min(sync_out.len());
        assert!(frequency.is_empty() || frequency.len() >= n);
        assert!(sync_in.is_empty() || sync_in.len() >= n);
        assert!(duty_mod.is_empty() || duty_mod.len() >= n);

        let fs = self.sample_rate;

        if !self.init && n > 0 {
            let hz = frequency.first().copied().unwrap_or(self.default_frequency);
            let w0 = (hz / fs).clamp(W_MIN, W_MAX);
            let m0 = duty_mod.first().copied().unwrap_or(0.0);
            let b0 = (0.5 * (1.0 + self.duty_bias + m0)).clamp(w0, 1.0 - w0);
            // Start mid-way up the rising segment, at value zero.
            self.phase = 0.5 * b0;
            self.w.jump(w0);
            self.duty.jump(b0);
            self.segment = Slope::Rising;
            self.init = true;
        }

        let a = 0.2 + 0.8 * self.lowpass;
        let mut p = self.phase;
        let mut seg = self.segment;
        let mut z = self.filter;

        for i in 0..n {
            if i % CONTROL_INTERVAL == 0 {
                let hz = if frequency.is_empty() {
                    self.default_frequency
                } else {
                    frequency[i]
                };
                self.w.retarget((hz / fs).clamp(W_MIN, W_MAX), n - i);

                let m = if duty_mod.is_empty() { 0.0 } else { duty_mod[i] };
                let w = self.w.value();
                self.duty.retarget(
                    (0.5 * (1.0 + self.duty_bias + m)).clamp(w, 1.0 - w),
                    n - i,
                );
            }

            let w = self.w.tick();
            let b = self.duty.tick();
            let b1 = 1.0 - b;
            p += w;

            let x;
            let sync = if sync_in.is_empty() { 0.0 } else { sync_in[i] };
            if sync >= SYNC_EPS {
                // Sync to master.
                let eof_offset = (sync - SYNC_EPS) * w;
                let mut p_at_reset = p - eof_offset;
                p = eof_offset;

                // Replay the slope breaks the old cycle crossed in the
                // sub-sample before the reset, in segment order, and
                // track the value it would have reached.
                let mut xr;
                match seg {
                    Slope::Rising => {
                        xr = -0.5 + p_at_reset / b;
                        if p_at_reset >= b {
                            xr = 0.5 - (p_at_reset - b) / b1;
                            self.buffer.place_slope(
                                p_at_reset - b + eof_offset,
                                w,
                                -1.0 / b1 - 1.0 / b,
                            );
                            seg = Slope::Falling;
                        }
                        if p_at_reset >= 1.0 {
                            p_at_reset -= 1.0;
                            xr = -0.5 + p_at_reset / b;
                            self.buffer
                                .place_slope(p_at_reset + eof_offset, w, 1.0 / b + 1.0 / b1);
                            seg = Slope::Rising;
                        }
                    }
                    Slope::Falling => {
                        xr = 0.5 - (p_at_reset - b) / b1;
                        if p_at_reset >= 1.0 {
                            p_at_reset -= 1.0;
                            xr = -0.5 + p_at_reset / b;
                            self.buffer
                                .place_slope(p_at_reset + eof_offset, w, 1.0 / b + 1.0 / b1);
                            seg = Slope::Rising;
                        }
                        if seg == Slope::Rising && p_at_reset >= b {
                            xr = 0.5 - (p_at_reset - b) / b1;
                            self.buffer.place_slope(
                                p_at_reset - b + eof_offset,
                                w,
                                -1.0 / b1 - 1.0 / b,
                            );
                            seg = Slope::Falling;
                        }
                    }
                }

                // The reset itself: restore the rising slope if needed,
                // then step over the value gap down to the new cycle's
                // start. Unlike the free-running corners, a sync reset
                // is a genuine value discontinuity.
                if seg == Slope::Falling {
                    self.buffer.place_slope(p, w, 1.0 / b + 1.0 / b1);
                }
                self.buffer.place_step(p, w, -0.5 - xr);
                seg = Slope::Rising;
                let mut v = -0.5 + p / b;
                if p >= b {
                    v = 0.5 - (p - b) / b1;
                    self.buffer.place_slope(p - b, w, -1.0 / b1 - 1.0 / b);
                    seg = Slope::Falling;
                }
                x = v;

                sync_out[i] = sync;
            } else {
                match seg {
                    Slope::Rising => {
                        let mut v = -0.5 + p / b;
                        if p >= b {
                            v = 0.5 - (p - b) / b1;
                            self.buffer.place_slope(p - b, w, -1.0 / b1 - 1.0 / b);
                            seg = Slope::Falling;
                        }
                        if p >= 1.0 {
                            p -= 1.0;
                            sync_out[i] = p / w + SYNC_EPS;
                            v = -0.5 + p / b;
                            self.buffer.place_slope(p, w, 1.0 / b + 1.0 / b1);
                            seg = Slope::Rising;
                        } else {
                            sync_out[i] = 0.0;
                        }
                        x = v;
                    }
                    Slope::Falling => {
                        let mut v = 0.5 - (p - b) / b1;
                        if p >= 1.0 {
                            p -= 1.0;
                            sync_out[i] = p / w + SYNC_EPS;
                            v = -0.5 + p / b;
                            self.buffer.place_slope(p, w, 1.0 / b + 1.0 / b1);
                            seg = Slope::Rising;
                        } else {
                            sync_out[i] = 0.0;
                        }
                        if seg == Slope::Rising && p >= b {
                            v = 0.5 - (p - b) / b1;
                            self.buffer.place_slope(p - b, w, -1.0 / b1 - 1.0 / b);
                            seg = Slope::Falling;
                        }
                        x = v;
                    }
                }
            }

            self.buffer.feed(x);

            z += a * (self.buffer.read() - z);
            output[i] = z;
            self.buffer.advance();
        }

        self.phase = p;
        self.segment = seg;
        self.filter = z;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use float_cmp::assert_approx_eq;

    #[test]
    fn test_triangle_is_bounded_and_finite() {
        let mut osc = TriVco::new(1000.0);
        osc.set_sample_rate(48000.0);

        let mut audio = vec![0.0f32; 4096];
        let mut sync = vec![0.0f32; 4096];
        osc.process(&mut audio, &mut sync, &[], &[], &[]);

        for (i, &v) in audio.iter().enumerate() {
            assert!(v.is_finite(), "sample {i} is not finite");
            assert!(v.abs() < 0.8, "sample {i} out of range: {v}");
        }
    }

    #[test]
    fn test_triangle_is_continuous() {
        let mut osc = TriVco::new(480.0); // w = 0.01
        osc.set_sample_rate(48000.0);

        let mut audio = vec![0.0f32; 2000];
        let mut sync = vec![0.0f32; 2000];
        osc.process(&mut audio, &mut sync, &[], &[], &[]);

        // The free-running triangle has no value discontinuities; with
        // slope 0.02 per sample, consecutive outputs stay close.
        for i in 1..audio.len() {
            let step = (audio[i] - audio[i - 1]).abs();
            assert!(
                step < 0.1,
                "triangle output jumped by {step} at sample {i}"
            );
        }
    }

    #[test]
    fn test_symmetric_triangle_peaks_once_per_cycle() {
        let mut osc = TriVco::new(480.0); // period 100
        osc.set_sample_rate(48000.0);

        let mut audio = vec![0.0f32; 1100];
        let mut sync = vec![0.0f32; 1100];
        osc.process(&mut audio, &mut sync, &[], &[], &[]);

        let settled = &audio[100..];
        let mut maxima = 0;
        for i in 1..settled.len() - 1 {
            if settled[i] > settled[i - 1] && settled[i] >= settled[i + 1] && settled[i] > 0.2 {
                maxima += 1;
            }
        }
        assert!(
            (9..=11).contains(&maxima),
            "expected ~10 peaks over 10 cycles, got {maxima}"
        );
    }

    #[test]
    fn test_triangle_amplitude_and_dc() {
        let mut osc = TriVco::new(480.0);
        osc.set_sample_rate(48000.0);

        let mut audio = vec![0.0f32; 2100];
        let mut sync = vec![0.0f32; 2100];
        osc.process(&mut audio, &mut sync, &[], &[], &[]);

        let settled = &audio[100..];
        let max = settled.iter().copied().fold(f32::NEG_INFINITY, f32::max);
        let min = settled.iter().copied().fold(f32::INFINITY, f32::min);
        assert!(
            (max - 0.5).abs() < 0.1,
            "triangle peak should be near +0.5, got {max}"
        );
        assert!(
            (min + 0.5).abs() < 0.1,
            "triangle trough should be near -0.5, got {min}"
        );

        let dc: f32 = settled.iter().sum::<f32>() / settled.len() as f32;
        assert!(dc.abs() < 0.05, "triangle should be DC-free, got {dc}");
    }

    #[test]
    fn test_duty_is_clamped_against_the_increment() {
        let mut osc = TriVco::new(480.0);
        osc.set_sample_rate(48000.0);
        osc.set_duty_bias(100.0);

        let mut audio = [0.0f32; 4];
        let mut sync = [0.0f32; 4];
        osc.process(&mut audio, &mut sync, &[], &[], &[]);

        assert_approx_eq!(f32, osc.duty(), 1.0 - osc.increment(), epsilon = 1e-6);
    }

    #[test]
    fn test_skewed_triangle_stays_continuous() {
        let mut osc = TriVco::new(960.0);
        osc.set_sample_rate(48000.0);
        osc.set_duty_bias(0.9); // peak at 95% of the cycle

        let mut audio = vec![0.0f32; 2000];
        let mut sync = vec![0.0f32; 2000];
        osc.process(&mut audio, &mut sync, &[], &[], &[]);

        for i in 1..audio.len() {
            let step = (audio[i] - audio[i - 1]).abs();
            assert!(
                step < 0.3,
                "skewed triangle jumped by {step} at sample {i}"
            );
        }
    }

    #[test]
    fn test_empty_block_is_safe() {
        let mut osc = TriVco::default();
        let mut audio: [f32; 0] = [];
        let mut sync: [f32; 0] = [];
        osc.process(&mut audio, &mut sync, &[], &[], &[]);
    }
}
