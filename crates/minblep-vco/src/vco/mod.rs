// SPDX-License-Identifier: LGPL-3.0-or-later

//! Oscillator variants.
//!
//! All three share the same shape: a phase accumulator with control-rate
//! parameter smoothing, discontinuity detection with segment-dependent
//! edge ordering, correction injection into a forward-looking buffer,
//! and a one-pole brightness filter on the delayed read-out. They differ
//! in their ideal waveform and the kind and count of discontinuities per
//! cycle:
//!
//! - [`RectVco`] — two step discontinuities (falling edge, wrap);
//! - [`SawVco`] — one step discontinuity (wrap);
//! - [`TriVco`] — two slope discontinuities (peak, trough), plus a value
//!   step under hard sync only.
//!
//! Every variant emits a sync signal at its phase wrap and accepts one,
//! so any oscillator can act as hard-sync master for any other.

pub mod rect;
pub mod saw;
pub mod tri;

pub use rect::RectVco;
pub use saw::SawVco;
pub use tri::TriVco;
