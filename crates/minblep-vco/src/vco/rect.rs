// SPDX-License-Identifier: LGPL-3.0-or-later

//! Band-limited rectangle (variable-duty pulse) oscillator.
//!
//! The ideal waveform alternates between +0.5 for the first `duty` of a
//! cycle and -0.5 for the rest, giving two step discontinuities per
//! cycle: a falling edge at `phase == duty` and a rising edge at the
//! wrap. Which edge is tested first each sample depends on the current
//! segment, so that when both fall into the same sample they are
//! injected in phase order.
//!
//! No DC compensation is applied for asymmetric duty; the output stays
//! within [-0.5, 0.5] even under heavy sync modulation.

use crate::buffer::CorrectionBuffer;
use crate::consts::{
    CONTROL_INTERVAL, DEFAULT_FREQUENCY, DEFAULT_SAMPLE_RATE, SYNC_EPS, W_MAX, W_MIN,
};
use crate::control::ControlRamp;

/// Output segment of the rectangle cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Segment {
    /// First part of the cycle, value +0.5.
    High,
    /// Remainder of the cycle, value -0.5.
    Low,
}

/// Band-limited, hard-sync-capable rectangle oscillator.
///
/// # Examples
/// ```
/// use minblep_vco::vco::RectVco;
///
/// let mut osc = RectVco::new(220.0);
/// osc.set_sample_rate(48000.0);
/// osc.set_duty_bias(-0.5); // 25% duty
///
/// let mut audio = [0.0f32; 128];
/// let mut sync = [0.0f32; 128];
/// osc.process(&mut audio, &mut sync, &[], &[], &[]);
/// ```
#[derive(Debug, Clone)]
pub struct RectVco {
    sample_rate: f32,
    default_frequency: f32,
    duty_bias: f32,
    lowpass: f32,
    phase: f32,
    w: ControlRamp,
    duty: ControlRamp,
    segment: Segment,
    value: f32,
    filter: f32,
    buffer: CorrectionBuffer,
    init: bool,
}

impl Default for RectVco {
    fn default() -> Self {
        Self::new(DEFAULT_FREQUENCY)
    }
}

impl RectVco {
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
            segment: Segment::High,
            value: 0.5,
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

    /// Set the control-rate duty bias. The per-sample duty target is
    /// `0.5 * (1 + bias + duty_mod[i])`, clamped so neither segment is
    /// shorter than one phase increment; a bias of 0 with no modulation
    /// gives a square wave.
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

    /// Current effective duty cycle.
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
        self.segment = Segment::High;
        self.value = 0.5;
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
            self.phase = 0.0;
            self.w.jump(w0);
            self.duty
                .jump((0.5 * (1.0 + self.duty_bias + m0)).clamp(w0, 1.0 - w0));
            self.segment = Segment::High;
            self.value = 0.5;
            self.init = true;
        }

        let a = 0.2 + 0.8 * self.lowpass;
        let mut p = self.phase;
        let mut seg = self.segment;
        let mut x = self.value;
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
            p += w;

            let sync = if sync_in.is_empty() { 0.0 } else { sync_in[i] };
            if sync >= SYNC_EPS {
                // Sync to master.
                let eof_offset = (sync - SYNC_EPS) * w;
                let mut p_at_reset = p - eof_offset;
                p = eof_offset;

                // Replay the edges the old cycle crossed in the
                // sub-sample before the reset, in segment order.
                match seg {
                    Segment::High => {
                        if p_at_reset >= b {
                            self.buffer
                                .place_step(p_at_reset - b + eof_offset, w, -1.0);
                            seg = Segment::Low;
                            x = -0.5;
                        }
                        if p_at_reset >= 1.0 {
                            p_at_reset -= 1.0;
                            self.buffer.place_step(p_at_reset + eof_offset, w, 1.0);
                            seg = Segment::High;
                            x = 0.5;
                        }
                    }
                    Segment::Low => {
                        if p_at_reset >= 1.0 {
                            p_at_reset -= 1.0;
                            self.buffer.place_step(p_at_reset + eof_offset, w, 1.0);
                            seg = Segment::High;
                            x = 0.5;
                        }
                        if seg == Segment::High && p_at_reset >= b {
                            self.buffer
                                .place_step(p_at_reset - b + eof_offset, w, -1.0);
                            seg = Segment::Low;
                            x = -0.5;
                        }
                    }
                }

                // The reset itself: jump to the new cycle's level, and
                // fall again if the reset lands past the duty boundary.
                if seg == Segment::Low {
                    self.buffer.place_step(p, w, 1.0);
                    seg = Segment::High;
                    x = 0.5;
                }
                if p >= b {
                    self.buffer.place_step(p - b, w, -1.0);
                    seg = Segment::Low;
                    x = -0.5;
                }

                sync_out[i] = sync;
            } else {
                match seg {
                    Segment::High => {
                        if p >= b {
                            self.buffer.place_step(p - b, w, -1.0);
                            seg = Segment::Low;
                            x = -0.5;
                        }
                        if p >= 1.0 {
                            p -= 1.0;
                            sync_out[i] = p / w + SYNC_EPS;
                            self.buffer.place_step(p, w, 1.0);
                            seg = Segment::High;
                            x = 0.5;
                        } else {
                            sync_out[i] = 0.0;
                        }
                    }
                    Segment::Low => {
                        if p >= 1.0 {
                            p -= 1.0;
                            sync_out[i] = p / w + SYNC_EPS;
                            self.buffer.place_step(p, w, 1.0);
                            seg = Segment::High;
                            x = 0.5;
                        } else {
                            sync_out[i] = 0.0;
                        }
                        if seg == Segment::High && p >= b {
                            self.buffer.place_step(p - b, w, -1.0);
                            seg = Segment::Low;
                            x = -0.5;
                        }
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
        self.value = x;
        self.filter = z;
    }
}
