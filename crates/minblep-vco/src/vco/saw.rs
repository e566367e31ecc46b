// SPDX-License-Identifier: LGPL-3.0-or-later

//! Band-limited sawtooth oscillator.
//!
//! The ideal waveform is `0.5 - phase`, a downward ramp with a single
//! step discontinuity per cycle at the phase wrap. Every wrap injects a
//! unit step correction at its exact sub-sample position and emits a
//! sync event for downstream oscillators; hard sync replays the wrap
//! the old cycle would have crossed before the reset, then injects a
//! step matching the value gap the reset leaves behind.

use crate::buffer::CorrectionBuffer;
use crate::consts::{
    CONTROL_INTERVAL, DEFAULT_FREQUENCY, DEFAULT_SAMPLE_RATE, SYNC_EPS, W_MAX, W_MIN,
};
use crate::control::ControlRamp;

/// Band-limited, hard-sync-capable sawtooth oscillator.
///
/// # Examples
/// ```
/// use minblep_vco::vco::SawVco;
///
/// let mut osc = SawVco::new(880.0);
/// osc.set_sample_rate(48000.0);
///
/// let mut audio = [0.0f32; 128];
/// let mut sync = [0.0f32; 128];
/// // Empty slices: default frequency, no incoming sync.
/// osc.process(&mut audio, &mut sync, &[], &[]);
/// ```
#[derive(Debug, Clone)]
pub struct SawVco {
    sample_rate: f32,
    default_frequency: f32,
    lowpass: f32,
    phase: f32,
    w: ControlRamp,
    filter: f32,
    buffer: CorrectionBuffer,
    init: bool,
}

impl Default for SawVco {
    fn default() -> Self {
        Self::new(DEFAULT_FREQUENCY)
    }
}

impl SawVco {
    /// Create an oscillator. `default_frequency` (Hz) is used whenever
    /// the frequency input is left unconnected (an empty slice).
    pub fn new(default_frequency: f32) -> Self {
        Self {
            sample_rate: DEFAULT_SAMPLE_RATE,
            default_frequency,
            lowpass: 0.5,
            phase: 0.0,
            w: ControlRamp::new(W_MIN),
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

    /// Sample rate in Hz.
    pub fn sample_rate(&self) -> f32 {
        self.sample_rate
    }

    /// Forget all running state; the next processed sample re-runs the
    /// first-sample bootstrap.
    pub fn reset(&mut self) {
        self.phase = 0.0;
        self.w = ControlRamp::new(W_MIN);
        self.filter = 0.0;
        self.buffer.clear();
        self.init = false;
    }

    /// Process one block.
    ///
    /// `output` receives the band-limited waveform and `sync_out` the
    /// derived sync signal (the wrap's sub-sample position, or 0). The
    /// block length is the shorter of the two. `frequency` (Hz) and
    /// `sync_in` are sample-rate signals covering the block; either may
    /// be empty, meaning "unconnected" (the default frequency is used,
    /// no sync is applied).
    pub fn process(
        &mut self,
        output: &mut [f32],
        sync_out: &mut [f32],
        frequency: &[f32],
        sync_in: &[f32],
    ) {
        let n = output.len().min(sync_out.len());
        assert!(frequency.is_empty() || frequency.len() >= n);
        assert!(sync_in.is_empty() || sync_in.len() >= n);

        let fs = self.sample_rate;

        if !self.init && n > 0 {
            let hz = frequency.first().copied().unwrap_or(self.default_frequency);
            self.phase = 0.5;
            self.w.jump((hz / fs).clamp(W_MIN, W_MAX));
            self.init = true;
        }

        let a = 0.2 + 0.8 * self.lowpass;
        let mut p = self.phase;
        let mut z = self.filter;

        for i in 0..n {
            if i % CONTROL_INTERVAL == 0 {
                let hz = if frequency.is_empty() {
                    self.default_frequency
                } else {
                    frequency[i]
                };
                self.w.retarget((hz / fs).clamp(W_MIN, W_MAX), n - i);
            }

            let w = self.w.tick();
            p += w;

            let sync = if sync_in.is_empty() { 0.0 } else { sync_in[i] };
            if sync >= SYNC_EPS {
                // Sync to master.
                let eof_offset = (sync - SYNC_EPS) * w;
                let mut p_at_reset = p - eof_offset;
                p = eof_offset;

                // Replay the wrap the old cycle may have crossed in the
                // sub-sample before the reset.
                if p_at_reset >= 1.0 {
                    p_at_reset -= 1.0;
                    self.buffer.place_step(p_at_reset + eof_offset, w, 1.0);
                }

                // Step over the value gap the reset leaves behind.
                self.buffer.place_step(p, w, p_at_reset);

                sync_out[i] = sync;
            } else if p >= 1.0 {
                // Normal phase wrap.
                p -= 1.0;
                sync_out[i] = p / w + SYNC_EPS;
                self.buffer.place_step(p, w, 1.0);
            } else {
                sync_out[i] = 0.0;
            }

            self.buffer.feed(0.5 - p);

            z += a * (self.buffer.read() - z);
            output[i] = z;
            self.buffer.advance();
        }

        self.phase = p;
        self.filter = z;
    }
}
