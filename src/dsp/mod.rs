//! # DSP (Digital Signal Processing) Core
//!
//! This module contains the building blocks for our delay effect:
//!
//! - **`delay_line`**: A circular buffer that stores past audio samples
//!   and retrieves them — at fractional positions, via linear
//!   interpolation — after a specified delay. This is the heart of any
//!   time-based audio effect.
//!
//! - **`smoother`**: A one-pole smoother that slews the delay-time
//!   parameter toward its target, so knob movements glide the read head
//!   instead of teleporting it (which would click).
//!
//! - **`engine`**: The stereo engine tying the pieces together — the
//!   per-sample feedback/mix algorithm, the `configure`/`process`/
//!   `release` lifecycle, and the [`ParamSource`](engine::ParamSource)
//!   contract through which parameters are polled.

pub mod delay_line;
pub mod engine;
pub mod smoother;
