// SPDX-License-Identifier: LGPL-3.0-or-later

//! # minblep-vco
//!
//! Band-limited, hard-sync-capable audio oscillators built on
//! minimum-phase band-limited step (minBLEP) and slope corrections.
//!
//! Naive rectangle, sawtooth and triangle waveforms alias badly: their
//! discontinuities have unbounded bandwidth. Instead of oversampling,
//! these oscillators locate every discontinuity at its exact sub-sample
//! position and add a short precomputed correction pulse into a
//! forward-looking buffer, which removes the aliasing at a fraction of
//! the cost. The same mechanism makes mid-sample hard sync clean: the
//! edges a reset interrupts are replayed at their true positions before
//! the reset's own discontinuity is injected.
//!
//! - [`vco`] — the oscillators: [`RectVco`], [`SawVco`], [`TriVco`]
//! - [`buffer`] — correction injector and delay buffer
//! - [`tables`] — the shared minBLEP/minBLAMP residual tables
//! - [`control`] — control-rate parameter smoothing
//! - [`consts`] — table geometry and parameter limits
//!
//! All processing is `f32`, block-based, allocation-free after
//! construction, and infallible: parameters are clamped, never
//! rejected, so a block of audio is always produced.
//!
//! [`RectVco`]: vco::RectVco
//! [`SawVco`]: vco::SawVco
//! [`TriVco`]: vco::TriVco

pub mod buffer;
pub mod consts;
pub mod control;
pub mod tables;
pub mod vco;
