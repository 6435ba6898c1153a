//! # Loveless Echo — A VST3/CLAP Feedback Delay Plugin
//!
//! A feedback delay effect plugin built with
//! [nih-plug](https://github.com/robbert-vdh/nih-plug) for learning DSP
//! fundamentals. Every algorithm is implemented from scratch with thorough
//! comments explaining the "why" behind each line of DSP code.
//!
//! ## Signal Flow
//!
//! ```text
//! Input ──┬──────────────────────────────────── × (1 - dry/wet) ───┐
//!         │                                                        │
//!         │    ┌──────────────────────────────────────────┐        │
//!         │    │              FEEDBACK LOOP               │        │
//!         │    │                                          │        │
//!         └──►(+)──► [Circular Buffer / Delay Line]       │        │
//!              ▲      (stores & retrieves past            │        │
//!              │       samples after N seconds)           │        │
//!              │                    │                     │        │
//!              │                    ▼                     │        │
//!              │              delayed_sample ── × feedback┘        │
//!              │                    │                              │
//!              └────────────────────│                              │
//!                                   │                              │
//!                                   └──── × dry/wet ─────────────►(+)──► Output
//! ```
//!
//! The delay-time knob does not steer the read head directly: its value is
//! run through a one-pole smoother inside the engine, so automation jumps
//! glide rather than click. See [`dsp::smoother`] for the details.

mod dsp;
mod params;

use std::num::NonZeroU32;
use std::sync::Arc;

use dsp::engine::DelayEngine;
use nih_plug::prelude::*;
use params::PluginParams;

/// The main plugin struct.
///
/// This holds all the audio-rate state that persists between calls to
/// `process()`. The DAW calls `process()` hundreds of times per second,
/// each time passing a small buffer of audio samples (typically 64-1024
/// samples). Our state must survive between these calls.
///
/// ## Why separate state from parameters?
///
/// Parameters (`PluginParams`) are shared with the host via `Arc` and can
/// be read from any thread (the audio thread, the UI thread, the host's
/// automation thread). The engine (delay lines, smoother, feedback
/// accumulators) is owned exclusively by the audio thread and only
/// accessed in `process()`. This separation makes the design thread-safe
/// without locks: the engine *polls* the shared parameters with plain
/// atomic loads and never waits on anybody.
struct LovelessEcho {
    /// Shared reference to the plugin parameters. The `Arc` (Atomic
    /// Reference Counted pointer) allows both the plugin and the host
    /// to hold references to the same parameter data without copying.
    params: Arc<PluginParams>,

    /// The current sample rate in Hz (e.g., 44100.0 or 48000.0).
    /// Set during `initialize()`. The engine keeps its own copy for the
    /// seconds-to-samples conversion; this one feeds the tail-length
    /// report at the end of `process()`.
    sample_rate: f32,

    /// The stereo delay engine: both channels' circular buffers, the
    /// delay-time smoother, and the feedback state.
    engine: DelayEngine,
}

impl Default for LovelessEcho {
    fn default() -> Self {
        Self {
            params: Arc::new(PluginParams::default()),
            // 44100 Hz is a placeholder. The real sample rate is set in
            // initialize() when the host tells us the actual configuration.
            sample_rate: 44100.0,
            // Unconfigured engine — it allocates its buffers in
            // initialize() when we know the sample rate.
            engine: DelayEngine::new(),
        }
    }
}

impl Plugin for LovelessEcho {
    const NAME: &'static str = "Loveless Echo";
    const VENDOR: &'static str = "Loveless Audio";
    const URL: &'static str = "";
    const EMAIL: &'static str = "steve.loveless@gmail.com";
    const VERSION: &'static str = env!("CARGO_PKG_VERSION");

    // Supported audio channel layouts. The host will pick the first
    // layout that matches the track configuration.
    //
    // The delay engine is a stereo pair — two delay lines sharing one
    // smoothed delay time — so stereo (2 in → 2 out) is the only layout
    // we advertise.
    const AUDIO_IO_LAYOUTS: &'static [AudioIOLayout] = &[AudioIOLayout {
        main_input_channels: NonZeroU32::new(2),
        main_output_channels: NonZeroU32::new(2),
        aux_input_ports: &[],
        aux_output_ports: &[],
        names: PortNames::const_default(),
    }];

    // We don't use MIDI, so disable it to keep things simple.
    const MIDI_INPUT: MidiConfig = MidiConfig::None;

    // Process parameter changes at sample-accurate timing. This means
    // when the host sends an automation point at sample 37 of a buffer,
    // the parameter actually changes at sample 37 (not at the start
    // of the buffer). The engine polls every parameter once per sample
    // anyway, so this just ensures the values it sees line up.
    const SAMPLE_ACCURATE_AUTOMATION: bool = true;

    type SysExMessage = ();
    type BackgroundTask = ();

    fn params(&self) -> Arc<dyn Params> {
        self.params.clone()
    }

    /// Called when the plugin is first loaded, or when the audio
    /// configuration changes (e.g., sample rate change). This is where
    /// the engine allocates its delay buffers.
    ///
    /// # Why allocate here instead of in `default()`?
    ///
    /// The buffer size depends on the sample rate (2 seconds of audio is
    /// 88200 samples at 44.1 kHz but 96000 at 48 kHz), and the sample
    /// rate is only known when the host calls `initialize()`.
    ///
    /// # Return value
    ///
    /// Return `true` if initialization succeeded. Returning `false`
    /// tells the host the plugin can't work with this configuration
    /// (here: a non-positive sample rate), and the host won't load it.
    fn initialize(
        &mut self,
        _audio_io_layout: &AudioIOLayout,
        buffer_config: &BufferConfig,
        _context: &mut impl InitContext<Self>,
    ) -> bool {
        self.sample_rate = buffer_config.sample_rate;

        // The host's maximum block size is advisory: the engine
        // processes whatever block length each process() call brings.
        self.engine.configure(
            buffer_config.sample_rate,
            buffer_config.max_buffer_size as usize,
            self.params.as_ref(),
        )
    }

    /// Called when playback stops or the plugin is bypassed.
    ///
    /// We clear the delay buffers and feedback accumulators so that
    /// stale audio doesn't bleed into the next playback. Without this,
    /// pressing "play" after "stop" might produce a burst of old echoes.
    fn reset(&mut self) {
        self.engine.reset(self.params.as_ref());
    }

    /// The core audio processing function.
    ///
    /// The host calls this function repeatedly, passing small buffers
    /// of audio samples. A typical buffer might be 256 samples long at
    /// 44100 Hz, meaning this function is called ~172 times per second.
    /// The block length can differ from call to call.
    ///
    /// All of the actual DSP lives in [`DelayEngine::process_block`]:
    /// this method just hands it the two channel slices to transform in
    /// place, with the shared parameters to poll. See the engine docs
    /// for the per-sample algorithm.
    fn process(
        &mut self,
        buffer: &mut Buffer,
        _aux: &mut AuxiliaryBuffers,
        _context: &mut impl ProcessContext<Self>,
    ) -> ProcessStatus {
        match buffer.as_slice() {
            [left, right] => {
                self.engine
                    .process_block(left, right, self.params.as_ref());
            }
            // Can't happen with our stereo-only layout table, but a
            // mismatched host buffer must not reach the engine.
            _ => return ProcessStatus::Error("expected a stereo buffer"),
        }

        // Tell the host how long our effect tail is so it keeps calling
        // process() after the input goes silent (e.g., when a region ends
        // or the track is muted). Without this, the delay echoes would be
        // cut off abruptly.
        //
        // The tail length depends on how many repeats it takes for the
        // feedback loop to decay to -60 dB (inaudible). Each repeat is
        // attenuated by the feedback factor, so after N repeats the level
        // is feedback^N. Solving feedback^N = 0.001 (-60 dB):
        //
        //   N = log(0.001) / log(feedback)
        //
        // Multiply N by the delay time in samples to get the tail length.
        let delay_samples = self.params.delay_time.value() * self.sample_rate;
        let feedback = self.params.feedback.value();

        let tail_samples = if feedback > 0.001 {
            let repeats = -3.0 / feedback.log10(); // log10(0.001) = -3
            (repeats * delay_samples) as u32
        } else {
            // With no feedback, just one delay period for the single echo.
            delay_samples as u32
        };

        ProcessStatus::Tail(tail_samples)
    }

    /// Called when the host deactivates the plugin — processing has
    /// stopped and won't resume without another `initialize()`.
    ///
    /// The engine gives back its buffer storage here. Nothing is flushed
    /// or faded: stopping playback discards buffered state, and the next
    /// `initialize()` starts from silence.
    fn deactivate(&mut self) {
        self.engine.release();
    }
}

// ─────────────────────────────────────────────────────────────────────
// Plugin format trait implementations
// ─────────────────────────────────────────────────────────────────────
//
// These traits tell nih-plug how to package the plugin for different
// plugin formats. We support both CLAP and VST3.

impl ClapPlugin for LovelessEcho {
    // A reverse-domain-notation ID, unique to this plugin.
    const CLAP_ID: &'static str = "com.loveless-audio.loveless-echo-v1";
    const CLAP_DESCRIPTION: Option<&'static str> =
        Some("A feedback delay plugin built for learning DSP");
    const CLAP_MANUAL_URL: Option<&'static str> = None;
    const CLAP_SUPPORT_URL: Option<&'static str> = None;
    const CLAP_FEATURES: &'static [ClapFeature] = &[
        ClapFeature::AudioEffect,
        ClapFeature::Stereo,
        ClapFeature::Delay,
    ];
}

impl Vst3Plugin for LovelessEcho {
    // A 16-byte class ID that must be globally unique across all VST3
    // plugins ever made. For a production plugin, use a proper UUID.
    // For our learning project, this ASCII-based ID is sufficient.
    //
    // The `*b"..."` syntax creates a `[u8; 16]` from a 16-character
    // ASCII string literal. Each character becomes one byte.
    const VST3_CLASS_ID: [u8; 16] = *b"LvlssEcho___v001";

    // Tell the host this is a delay effect so it appears in the
    // correct category in the plugin browser.
    const VST3_SUBCATEGORIES: &'static [Vst3SubCategory] =
        &[Vst3SubCategory::Fx, Vst3SubCategory::Delay];
}

// ─────────────────────────────────────────────────────────────────────
// Export macros
// ─────────────────────────────────────────────────────────────────────
//
// These macros generate the C-compatible entry points that the host
// DAW uses to discover and load the plugin. Without these, the compiled
// shared library would have no externally visible symbols and the host
// wouldn't know it's a plugin.
//
// nih_export_clap! exports the `clap_entry` symbol for CLAP hosts.
// nih_export_vst3! exports `GetPluginFactory` for VST3 hosts.

nih_export_clap!(LovelessEcho);
nih_export_vst3!(LovelessEcho);
