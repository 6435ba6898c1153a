//! # Delay Engine
//!
//! The stereo processing core: two delay lines (one per channel), a shared
//! delay-time smoother, and one feedback accumulator per channel, tied
//! together by the per-sample algorithm.
//!
//! ## Per-Sample Order of Operations
//!
//! For every sample, in this order:
//!
//! 1. **Smooth** the delay-time parameter one step toward its live value.
//! 2. **Convert** the smoothed time to a (fractional) sample count.
//! 3. **Write** `input + feedback accumulator` into the delay line. This
//!    is the only buffer write for the sample — feedback enters the loop
//!    at write time, not at read time.
//! 4. **Read** the delayed sample from `write head − delay samples`, with
//!    linear interpolation for the fractional part.
//! 5. **Update** the feedback accumulator: `delayed × feedback gain`. It
//!    is added to the *next* sample's write, which is what makes the loop
//!    a true recursive filter instead of an open-loop echo.
//! 6. **Advance** the write head.
//! 7. **Mix** `input × (1 − dry/wet) + delayed × dry/wet` back in place.
//!
//! Writing before reading matters: because the delay is always at least a
//! sample long, the freshly written input only becomes visible to a read
//! one full loop later, never within the same sample.
//!
//! ## Real-Time Rules
//!
//! `process_block` runs on the host's audio callback thread. It must not
//! allocate, block, lock, or perform I/O — a missed deadline is an audible
//! dropout. All storage is allocated in `configure()`, which the host
//! guarantees never runs concurrently with processing.

use super::delay_line::DelayLine;
use super::smoother::{OnePoleSmoother, DELAY_TIME_SMOOTHING};

/// The longest supported delay, in seconds. Determines the delay line
/// allocation: `round(sample_rate * MAX_DELAY_SECONDS)` samples per channel.
pub const MAX_DELAY_SECONDS: f32 = 2.0;

/// The engine's view of the three user-facing controls.
///
/// Parameters are owned elsewhere (the plugin parameter structs, a test
/// harness) and *polled* by the engine — once per sample, not once per
/// block, so an automation move becomes audible within one sample rather
/// than lagging by a whole buffer. Implementations are read on the audio
/// thread while another thread writes the values, so each getter should be
/// a single atomic load (nih-plug's parameter storage already is).
///
/// # Contract
///
/// - `dry_wet` in `[0.0, 1.0]`
/// - `feedback` in `[0.0, 0.98]` — the engine does NOT re-clamp this.
///   Feedback ≥ 1.0 makes the loop gain non-decaying and the output grows
///   without bound; keeping the value below 1.0 is the caller's job.
/// - `delay_time_seconds` in `[0.1, MAX_DELAY_SECONDS]` — values outside
///   the range are clamped after smoothing, so a sloppy implementation
///   degrades gracefully instead of corrupting the read-head arithmetic.
pub trait ParamSource {
    /// Dry/wet mix: 0.0 = only the input, 1.0 = only the delayed signal.
    fn dry_wet(&self) -> f32;

    /// Fraction of the delayed signal fed back into the delay line.
    fn feedback(&self) -> f32;

    /// Target delay time in seconds.
    fn delay_time_seconds(&self) -> f32;
}

/// Per-channel delay state: the delay line plus the feedback accumulator.
///
/// Left and right are fully independent — if only the left channel has
/// audio, only the left delay line produces echoes — but they share the
/// same smoothed delay time, so the stereo image stays coherent while the
/// delay knob moves.
struct DelayChannel {
    line: DelayLine,

    /// The previous sample's delayed output, scaled by the feedback gain.
    /// Added to the *next* write into the delay line.
    feedback: f32,
}

impl DelayChannel {
    fn unallocated() -> Self {
        Self {
            line: DelayLine::unallocated(),
            feedback: 0.0,
        }
    }

    fn allocated(length: usize) -> Self {
        Self {
            line: DelayLine::new(length),
            feedback: 0.0,
        }
    }

    fn clear(&mut self) {
        self.line.clear();
        self.feedback = 0.0;
    }

    /// Run one sample through this channel and return the mixed output.
    fn tick(&mut self, input: f32, delay_samples: f32, feedback_gain: f32, dry_wet: f32) -> f32 {
        // The input enters the loop together with last sample's feedback.
        self.line.write(input + self.feedback);

        let delayed = self.line.read_fractional(delay_samples);

        // Computed now, consumed by the write on the *next* sample.
        self.feedback = delayed * feedback_gain;

        self.line.advance();

        input * (1.0 - dry_wet) + delayed * dry_wet
    }
}

/// The stereo feedback delay engine.
///
/// Lifecycle: [`configure()`](Self::configure) →
/// [`process_block()`](Self::process_block) (repeatedly) →
/// [`release()`](Self::release). Configure may be called again at any time
/// the host has paused processing (e.g., a sample-rate change); it resets
/// the engine to silence rather than trying to preserve buffered audio.
pub struct DelayEngine {
    /// Sample rate in Hz, set by `configure()`. Converts the smoothed
    /// delay time from seconds to samples each sample.
    sample_rate: f32,

    /// One-pole smoother slewing the delay-time parameter. One instance
    /// for both channels: left and right always read at the same offset.
    delay_time: OnePoleSmoother,

    left: DelayChannel,
    right: DelayChannel,
}

impl Default for DelayEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl DelayEngine {
    /// Create an unconfigured engine holding no audio storage.
    pub fn new() -> Self {
        Self {
            sample_rate: 0.0,
            delay_time: OnePoleSmoother::new(DELAY_TIME_SMOOTHING),
            left: DelayChannel::unallocated(),
            right: DelayChannel::unallocated(),
        }
    }

    /// Whether `configure()` has allocated the delay lines.
    pub fn is_configured(&self) -> bool {
        self.left.line.capacity() > 0
    }

    /// Prepare the engine for processing at `sample_rate`.
    ///
    /// Allocates both channel buffers at `round(sample_rate *
    /// MAX_DELAY_SECONDS)` samples, zero-filled, resets the write heads
    /// and feedback accumulators, and primes the delay-time smoother from
    /// the parameter's current raw value so playback starts at the
    /// requested delay instead of gliding in from a stale one.
    ///
    /// Calling this again — even with the same sample rate — resets the
    /// engine to silence. Returns `false` (leaving any previous
    /// configuration untouched) if the sample rate is not a positive
    /// finite number; the engine never ends up with a zero-length buffer.
    ///
    /// `block_size_hint` is the host's advertised maximum block size. It
    /// is advisory only: the per-sample loop makes no fixed-block-size
    /// assumption, so nothing here depends on it.
    pub fn configure(
        &mut self,
        sample_rate: f32,
        _block_size_hint: usize,
        params: &impl ParamSource,
    ) -> bool {
        if !(sample_rate.is_finite() && sample_rate > 0.0) {
            return false;
        }

        // f64 keeps the product exact for any realistic rate before
        // rounding. The max(1) floor covers degenerate sub-Hz rates.
        let buffer_len = ((f64::from(sample_rate) * f64::from(MAX_DELAY_SECONDS)).round()
            as usize)
            .max(1);

        self.sample_rate = sample_rate;
        self.left = DelayChannel::allocated(buffer_len);
        self.right = DelayChannel::allocated(buffer_len);
        self.delay_time.prime(params.delay_time_seconds());

        true
    }

    /// Clear all delay state back to silence without reallocating.
    ///
    /// Called when the user stops playback so stale echoes don't bleed
    /// into the next play session. The smoother re-primes from the
    /// current parameter value, same as `configure()`.
    pub fn reset(&mut self, params: &impl ParamSource) {
        self.left.clear();
        self.right.clear();
        self.delay_time.prime(params.delay_time_seconds());
    }

    /// Process one block of stereo audio in place.
    ///
    /// Both slices must be the same length; the length is the block size
    /// and may differ from call to call. Parameters are polled from
    /// `params` once per sample.
    ///
    /// # Panics
    ///
    /// Panics if called before a successful `configure()` (or after
    /// `release()`). That is a caller sequencing bug, not a runtime
    /// condition — the host contract delivers no audio outside the
    /// configured window.
    pub fn process_block(
        &mut self,
        left: &mut [f32],
        right: &mut [f32],
        params: &impl ParamSource,
    ) {
        assert!(
            self.is_configured(),
            "process_block called on an unconfigured engine"
        );
        debug_assert_eq!(left.len(), right.len(), "stereo halves differ in length");

        for (l, r) in left.iter_mut().zip(right.iter_mut()) {
            // Poll all three controls fresh for this sample.
            let dry_wet = params.dry_wet();
            let feedback = params.feedback();
            let delay_target = params.delay_time_seconds();

            // One smoothing step, then clamp before converting to samples
            // so the read head can never be asked to reach further back
            // than the buffer holds (the single-wrap invariant).
            let delay_seconds = self.delay_time.next(delay_target).clamp(0.0, MAX_DELAY_SECONDS);
            let delay_samples = self.sample_rate * delay_seconds;

            *l = self.left.tick(*l, delay_samples, feedback, dry_wet);
            *r = self.right.tick(*r, delay_samples, feedback, dry_wet);
        }
    }

    /// Relinquish the delay line storage.
    ///
    /// Rust frees the buffers automatically when the engine drops; this
    /// exists for hosts that deactivate a plugin and keep it loaded for a
    /// long time — no point holding megabytes of sample memory while
    /// idle. Nothing is flushed or faded: stopping discards buffered
    /// state. A later `configure()` starts fresh.
    pub fn release(&mut self) {
        self.sample_rate = 0.0;
        self.left = DelayChannel::unallocated();
        self.right = DelayChannel::unallocated();
    }
}

// ─────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    /// Stand-in for the plugin parameters: three values stored as f32 bit
    /// patterns in atomics, published the way a UI/automation thread
    /// would. The engine side only ever sees plain loads.
    struct TestParams {
        dry_wet: AtomicU32,
        feedback: AtomicU32,
        delay_time: AtomicU32,
    }

    impl TestParams {
        fn new(dry_wet: f32, feedback: f32, delay_time: f32) -> Self {
            Self {
                dry_wet: AtomicU32::new(dry_wet.to_bits()),
                feedback: AtomicU32::new(feedback.to_bits()),
                delay_time: AtomicU32::new(delay_time.to_bits()),
            }
        }

        fn set_delay_time(&self, seconds: f32) {
            self.delay_time.store(seconds.to_bits(), Ordering::Relaxed);
        }
    }

    impl ParamSource for TestParams {
        fn dry_wet(&self) -> f32 {
            f32::from_bits(self.dry_wet.load(Ordering::Relaxed))
        }

        fn feedback(&self) -> f32 {
            f32::from_bits(self.feedback.load(Ordering::Relaxed))
        }

        fn delay_time_seconds(&self) -> f32 {
            f32::from_bits(self.delay_time.load(Ordering::Relaxed))
        }
    }

    const SAMPLE_RATE: f32 = 48000.0;

    fn configured_engine(params: &TestParams) -> DelayEngine {
        let mut engine = DelayEngine::new();
        assert!(engine.configure(SAMPLE_RATE, 512, params));
        engine
    }

    /// Run a whole signal through the engine using uneven block sizes, to
    /// make sure nothing assumes a fixed block length.
    fn process_chunked(
        engine: &mut DelayEngine,
        params: &TestParams,
        left: &mut [f32],
        right: &mut [f32],
    ) {
        let chunk_sizes = [512usize, 1, 64, 1000, 3];
        let mut offset = 0;
        let mut i = 0;
        while offset < left.len() {
            let size = chunk_sizes[i % chunk_sizes.len()].min(left.len() - offset);
            let end = offset + size;
            engine.process_block(&mut left[offset..end], &mut right[offset..end], params);
            offset = end;
            i += 1;
        }
    }

    #[test]
    fn test_configure_rejects_bad_sample_rates() {
        let params = TestParams::new(0.5, 0.5, 0.5);
        let mut engine = DelayEngine::new();

        assert!(!engine.configure(0.0, 512, &params));
        assert!(!engine.configure(-44100.0, 512, &params));
        assert!(!engine.configure(f32::NAN, 512, &params));
        assert!(!engine.configure(f32::INFINITY, 512, &params));
        assert!(!engine.is_configured());

        assert!(engine.configure(44100.0, 512, &params));
        assert!(engine.is_configured());
    }

    /// Buffer length is round(sample_rate * MAX_DELAY_SECONDS):
    /// 48000 Hz * 2 s = 96000 samples per channel.
    #[test]
    fn test_buffer_length_from_sample_rate() {
        let params = TestParams::new(0.0, 0.0, 0.5);
        let engine = configured_engine(&params);
        assert_eq!(engine.left.line.capacity(), 96000);
        assert_eq!(engine.right.line.capacity(), 96000);
    }

    /// Silence in, silence out: with zero input and zero feedback, the
    /// output is zero no matter where dry/wet and delay time sit.
    #[test]
    fn test_silence_invariant() {
        let params = TestParams::new(0.7, 0.0, 0.5);
        let mut engine = configured_engine(&params);

        let mut left = vec![0.0f32; 4096];
        let mut right = vec![0.0f32; 4096];
        process_chunked(&mut engine, &params, &mut left, &mut right);

        assert!(left.iter().all(|s| s.abs() < 1e-9));
        assert!(right.iter().all(|s| s.abs() < 1e-9));
    }

    /// At dry/wet = 0 the output equals the input exactly, whatever the
    /// delay line is doing internally.
    #[test]
    fn test_fully_dry_is_pass_through() {
        let params = TestParams::new(0.0, 0.5, 0.25);
        let mut engine = configured_engine(&params);

        let input: Vec<f32> = (0..8192).map(|i| (i as f32 * 0.01).sin() * 0.8).collect();
        let mut left = input.clone();
        let mut right = input.clone();
        process_chunked(&mut engine, &params, &mut left, &mut right);

        for (out, inp) in left.iter().zip(&input) {
            assert!((out - inp).abs() < 1e-6, "dry path altered the signal");
        }
        for (out, inp) in right.iter().zip(&input) {
            assert!((out - inp).abs() < 1e-6, "dry path altered the signal");
        }
    }

    /// Fully wet, no feedback, constant 0.5 s delay at 48 kHz: a unit
    /// impulse comes out exactly 24000 samples later, once, at unit
    /// amplitude. The smoother is primed at configure time, so a constant
    /// parameter means the delay is exact from the very first sample.
    #[test]
    fn test_full_wet_impulse_single_echo() {
        let params = TestParams::new(1.0, 0.0, 0.5);
        let mut engine = configured_engine(&params);

        let len = 30000;
        let mut left = vec![0.0f32; len];
        let mut right = vec![0.0f32; len];
        left[0] = 1.0;
        right[0] = 1.0;
        process_chunked(&mut engine, &params, &mut left, &mut right);

        for ch in [&left, &right] {
            for (i, s) in ch.iter().enumerate() {
                if i == 24000 {
                    assert!((s - 1.0).abs() < 1e-6, "echo at {i} was {s}");
                } else {
                    assert!(s.abs() < 1e-6, "unexpected output {s} at sample {i}");
                }
            }
        }
    }

    /// With feedback 0.5 the echoes decay geometrically: 1.0, 0.5, 0.25.
    ///
    /// The echo spacing drifts by one sample per feedback trip: the
    /// accumulator computed when an echo is read only enters the buffer
    /// on the *next* sample's write, so the second echo lands at
    /// 2 × 24000 + 1 and the third at 3 × 24000 + 2.
    #[test]
    fn test_feedback_produces_geometric_echoes() {
        let params = TestParams::new(1.0, 0.5, 0.5);
        let mut engine = configured_engine(&params);

        let len = 80000;
        let mut left = vec![0.0f32; len];
        let mut right = vec![0.0f32; len];
        left[0] = 1.0;
        right[0] = 1.0;
        process_chunked(&mut engine, &params, &mut left, &mut right);

        for ch in [&left, &right] {
            assert!((ch[24000] - 1.0).abs() < 1e-4, "first echo: {}", ch[24000]);
            assert!((ch[48001] - 0.5).abs() < 1e-4, "second echo: {}", ch[48001]);
            assert!((ch[72002] - 0.25).abs() < 1e-4, "third echo: {}", ch[72002]);

            // Between echoes: nothing.
            for i in [12000, 36000, 48000, 60000, 72000] {
                assert!(ch[i].abs() < 1e-6, "unexpected output between echoes at {i}");
            }
        }
    }

    /// Minimum delay time (0.1 s) still reads strictly behind the write
    /// head: the impulse never leaks through in the same sample, and the
    /// echo lands exactly 4800 samples later.
    #[test]
    fn test_minimum_delay_time() {
        let params = TestParams::new(1.0, 0.0, 0.1);
        let mut engine = configured_engine(&params);

        let len = 6000;
        let mut left = vec![0.0f32; len];
        let mut right = vec![0.0f32; len];
        left[0] = 1.0;
        right[0] = 1.0;
        process_chunked(&mut engine, &params, &mut left, &mut right);

        assert!(left[0].abs() < 1e-9, "impulse leaked through at sample 0");
        assert!((left[4800] - 1.0).abs() < 1e-4);
        assert!((right[4800] - 1.0).abs() < 1e-4);
    }

    /// Stability: with feedback below 1.0 the impulse response stays
    /// bounded over a long run (10 seconds here). Each round trip through
    /// the loop scales by the feedback gain, so the envelope can only
    /// decay.
    #[test]
    fn test_high_feedback_remains_bounded() {
        let params = TestParams::new(1.0, 0.97, 0.1);
        let mut engine = configured_engine(&params);

        let mut peak = 0.0f32;
        let mut first = true;
        let mut left = vec![0.0f32; 4800];
        let mut right = vec![0.0f32; 4800];

        // 100 blocks of 0.1 s = 10 seconds of audio.
        for _ in 0..100 {
            left.fill(0.0);
            right.fill(0.0);
            if first {
                left[0] = 1.0;
                right[0] = 1.0;
                first = false;
            }
            engine.process_block(&mut left, &mut right, &params);
            for s in left.iter().chain(right.iter()) {
                assert!(s.is_finite(), "output diverged to non-finite values");
                peak = peak.max(s.abs());
            }
        }

        assert!(peak <= 1.0 + 1e-4, "impulse response grew: peak {peak}");
    }

    /// Sweeping the delay-time parameter mid-stream must keep the output
    /// finite and reasonably bounded — the smoother turns the jumps into
    /// glides instead of read-head teleports.
    #[test]
    fn test_delay_automation_stays_well_behaved() {
        let params = TestParams::new(0.5, 0.5, 0.1);
        let mut engine = configured_engine(&params);

        let mut left = vec![0.0f32; 1000];
        let mut right = vec![0.0f32; 1000];
        let mut toggle = false;

        for block in 0..50 {
            for (i, (l, r)) in left.iter_mut().zip(right.iter_mut()).enumerate() {
                let s = (((block * 1000 + i) as f32) * 0.05).sin() * 0.5;
                *l = s;
                *r = s;
            }
            engine.process_block(&mut left, &mut right, &params);
            for s in left.iter().chain(right.iter()) {
                assert!(s.is_finite());
                assert!(s.abs() < 4.0, "output blew up during automation: {s}");
            }

            // Yank the parameter between its extremes every block.
            toggle = !toggle;
            params.set_delay_time(if toggle { 2.0 } else { 0.1 });
        }
    }

    /// Reconfiguring — even at the same sample rate — resets to silence:
    /// no echoes survive from before the configure call.
    #[test]
    fn test_reconfigure_resets_to_silence() {
        let params = TestParams::new(1.0, 0.9, 0.5);
        let mut engine = configured_engine(&params);

        let mut left = vec![1.0f32; 1024];
        let mut right = vec![1.0f32; 1024];
        engine.process_block(&mut left, &mut right, &params);

        assert!(engine.configure(SAMPLE_RATE, 512, &params));

        let mut left = vec![0.0f32; 30000];
        let mut right = vec![0.0f32; 30000];
        process_chunked(&mut engine, &params, &mut left, &mut right);
        assert!(left.iter().all(|s| s.abs() < 1e-9), "stale echo after reconfigure");
        assert!(right.iter().all(|s| s.abs() < 1e-9));
    }

    /// `reset()` clears buffered audio and accumulators the same way.
    #[test]
    fn test_reset_clears_state() {
        let params = TestParams::new(1.0, 0.9, 0.5);
        let mut engine = configured_engine(&params);

        let mut left = vec![1.0f32; 1024];
        let mut right = vec![1.0f32; 1024];
        engine.process_block(&mut left, &mut right, &params);

        engine.reset(&params);

        let mut left = vec![0.0f32; 30000];
        let mut right = vec![0.0f32; 30000];
        process_chunked(&mut engine, &params, &mut left, &mut right);
        assert!(left.iter().all(|s| s.abs() < 1e-9), "stale echo after reset");
        assert!(right.iter().all(|s| s.abs() < 1e-9));
    }

    /// `release()` drops the storage; a later `configure()` builds a
    /// fresh, silent engine.
    #[test]
    fn test_release_then_reconfigure() {
        let params = TestParams::new(1.0, 0.5, 0.5);
        let mut engine = configured_engine(&params);

        engine.release();
        assert!(!engine.is_configured());

        assert!(engine.configure(SAMPLE_RATE, 512, &params));
        let mut left = vec![0.0f32; 512];
        let mut right = vec![0.0f32; 512];
        engine.process_block(&mut left, &mut right, &params);
        assert!(left.iter().all(|s| s.abs() < 1e-9));
    }

    #[test]
    #[should_panic(expected = "unconfigured engine")]
    fn test_process_before_configure_panics() {
        let params = TestParams::new(0.5, 0.5, 0.5);
        let mut engine = DelayEngine::new();

        let mut left = vec![0.0f32; 16];
        let mut right = vec![0.0f32; 16];
        engine.process_block(&mut left, &mut right, &params);
    }
}
