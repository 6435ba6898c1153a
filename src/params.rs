//! # Plugin Parameters
//!
//! Parameters are the knobs and sliders the user sees in the DAW. Each
//! parameter has:
//!
//! - A **unique string ID** (`#[id = "..."]`) that the host uses to
//!   save and recall presets. Once published, never change these IDs
//!   or existing presets will break.
//! - A **human-readable name** shown in the DAW's UI.
//! - A **range** (min, max).
//! - A **default value**.
//!
//! ## Why No Host-Side Smoothing?
//!
//! nih-plug can attach a smoother to each parameter, but this plugin
//! reads every parameter *raw*, once per sample. Dry/wet and feedback are
//! plain gains — an instant change to either is benign. Delay time is the
//! one control whose jumps are audible (the read head would teleport),
//! and the engine slews it internally with its own fixed-coefficient
//! one-pole smoother. Adding a second, host-side ramp on top would change
//! the glide character.

use nih_plug::prelude::*;

use crate::dsp::engine::{ParamSource, MAX_DELAY_SECONDS};

/// All user-facing parameters for the Loveless Echo plugin.
///
/// The `#[derive(Params)]` macro automatically generates the code that
/// registers these parameters with the host DAW, handles serialization
/// for presets, and exposes them to host automation.
#[derive(Params)]
pub struct PluginParams {
    /// **Dry/Wet** — the balance between original and delayed signal.
    ///
    /// - 0% = fully dry (you hear only the original, no delay at all)
    /// - 50% = equal blend
    /// - 100% = fully wet (you hear only the delayed signal)
    ///
    /// Defaults to fully dry, so inserting the plugin is inaudible until
    /// the user dials it in. When used as a send effect in a DAW
    /// (aux/bus routing), you'd typically set this to 100% because the
    /// DAW handles the dry/wet balance.
    #[id = "dryWet"]
    pub dry_wet: FloatParam,

    /// **Feedback** — how many times the echo repeats.
    ///
    /// Controls how much of the delayed output is fed back into the delay
    /// input. This creates the recursive loop that produces multiple echoes.
    ///
    /// - 0% = one echo only ("slapback")
    /// - 50% = several echoes, halving in volume each time
    /// - 98% = very long, slowly decaying repeats
    ///
    /// The range stops at 0.98, below 1.0, and the engine *relies* on
    /// that: at 1.0 the repeats would never decay, and above it they
    /// would grow until they clip. The engine treats "feedback < 1" as a
    /// precondition rather than re-checking it every sample, so this
    /// range is the enforcement point.
    #[id = "feedback"]
    pub feedback: FloatParam,

    /// **Delay Time** — how long before you hear the echo.
    ///
    /// Controls the distance (in time) between the original signal and
    /// the first repeat. Musically, shorter delays (100-300ms) create
    /// slapback effects, while longer delays (500-2000ms) create
    /// distinct, separated echoes.
    ///
    /// Range: 0.1 to 2.0 seconds. The upper end of the range is what
    /// sizes the engine's delay buffers at configure time.
    #[id = "delayTime"]
    pub delay_time: FloatParam,
}

impl Default for PluginParams {
    fn default() -> Self {
        Self {
            dry_wet: FloatParam::new(
                "Dry Wet",
                0.0, // Default: fully dry
                FloatRange::Linear { min: 0.0, max: 1.0 },
            )
            .with_unit("%")
            // Display as percentage: 0.40 → "40.0%"
            .with_value_to_string(formatters::v2s_f32_percentage(1))
            .with_string_to_value(formatters::s2v_f32_percentage()),

            feedback: FloatParam::new(
                "Feedback",
                0.0, // Default: a single echo
                FloatRange::Linear {
                    min: 0.0,
                    max: 0.98, // Capped below 1.0 for stability
                },
            )
            .with_unit("%")
            .with_value_to_string(formatters::v2s_f32_percentage(1))
            .with_string_to_value(formatters::s2v_f32_percentage()),

            delay_time: FloatParam::new(
                "Delay Time",
                0.1, // Default: a tight slapback
                FloatRange::Linear {
                    min: 0.1,
                    max: MAX_DELAY_SECONDS,
                },
            )
            .with_unit(" s"),
        }
    }
}

/// The engine polls its three controls through this trait, once per
/// sample. `FloatParam::value()` is a plain atomic load of the current
/// value, which is exactly the torn-read-tolerant access the audio
/// thread needs while the host or UI writes the parameter from another
/// thread.
impl ParamSource for PluginParams {
    fn dry_wet(&self) -> f32 {
        self.dry_wet.value()
    }

    fn feedback(&self) -> f32 {
        self.feedback.value()
    }

    fn delay_time_seconds(&self) -> f32 {
        self.delay_time.value()
    }
}
