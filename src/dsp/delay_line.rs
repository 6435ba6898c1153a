//! # Delay Line (Circular Buffer)
//!
//! A delay line stores audio samples and lets you read them back after a
//! specified time delay. This is the fundamental building block of all
//! delay, reverb, chorus, and flanger effects.
//!
//! ## How a Circular Buffer Works
//!
//! Imagine a circular tape loop. A "write head" records incoming audio
//! onto the tape, and a "read head" plays it back from a position further
//! behind on the tape. The distance between the two heads determines the
//! delay time.
//!
//! In code, we use a `Vec<f32>` as our "tape" and an integer index as the
//! write head position. Each time we process one audio sample:
//!
//! 1. Write the new sample at `write_pos`.
//! 2. Read the delayed sample from `write_pos - delay_in_samples`,
//!    wrapping around to the end of the buffer if the result is negative.
//! 3. Advance `write_pos` by 1, wrapping back to 0 at the end.
//!
//! The "circular" comes from this wrapping behavior: the buffer has no
//! beginning or end, just a continuously moving window of stored samples.
//!
//! ## Linear Interpolation
//!
//! When the delay time isn't an exact whole number of samples (e.g., 441.3
//! samples for a 10.007ms delay at 44100 Hz), the read head lands *between*
//! two stored samples. Without interpolation, the delay time would snap
//! between whole sample positions, causing audible artifacts called
//! "zipper noise."
//!
//! Linear interpolation blends the two neighbors of the read position:
//!
//! ```text
//! result = buffer[x0] * (1 - frac) + buffer[x1] * frac
//! ```
//!
//! where `x0 = floor(read_pos)`, `x1 = x0 + 1` (wrapped), and `frac` is the
//! fractional part of the read position. For read position 441.3:
//! - `buffer[441]` contributes with weight 0.7
//! - `buffer[442]` contributes with weight 0.3

/// A circular buffer that functions as an audio delay line.
///
/// The buffer is pre-allocated to the maximum possible delay length
/// during `configure()`, so no memory allocation ever happens during
/// audio processing. This is critical for real-time audio: memory
/// allocation can block (waiting for a lock), causing audio dropouts.
pub struct DelayLine {
    /// The circular buffer storing audio samples. All values start at
    /// 0.0 (silence).
    buffer: Vec<f32>,

    /// Current write position — where the next incoming sample will be
    /// stored. Advances by 1 each sample, wrapping to 0 at `buffer_len`.
    write_pos: usize,

    /// Cached buffer length, stored to avoid repeated `.len()` calls
    /// and to make the wrapping arithmetic clearer in the code.
    buffer_len: usize,
}

impl DelayLine {
    /// Create a new delay line with the given length in samples.
    ///
    /// # Arguments
    /// * `length` - Number of samples to store. For a 2-second maximum
    ///   delay at 48000 Hz, this would be 96000.
    ///
    /// # Why pre-allocate?
    /// We allocate the full buffer up front so that changing the delay
    /// time parameter never triggers a memory allocation. The buffer
    /// stays the same size; only the read position changes.
    pub fn new(length: usize) -> Self {
        Self {
            buffer: vec![0.0; length],
            write_pos: 0,
            buffer_len: length,
        }
    }

    /// Create an unallocated delay line that holds no storage.
    ///
    /// Used as the engine's initial and released state. A delay line in
    /// this state must not be processed — `configure()` replaces it with
    /// an allocated one before any audio flows.
    pub fn unallocated() -> Self {
        Self::new(0)
    }

    /// The buffer length in samples. Zero for an unallocated line.
    pub fn capacity(&self) -> usize {
        self.buffer_len
    }

    /// Write a sample into the delay line at the current write position.
    ///
    /// **Important:** This does NOT advance the write position. Call
    /// [`advance()`](Self::advance) after both `write()` and
    /// [`read_fractional()`](Self::read_fractional) are complete for the
    /// current sample. This separation lets the same write position serve
    /// as the reference point for the read-head arithmetic.
    pub fn write(&mut self, sample: f32) {
        self.buffer[self.write_pos] = sample;
    }

    /// Read a delayed sample from the buffer using linear interpolation.
    ///
    /// # Arguments
    /// * `delay_samples` - How many samples behind the write head to read.
    ///   Can be fractional (e.g., 441.3) for smooth delay time changes.
    ///
    /// # How the index math works
    ///
    /// The read head is a floating-point position behind the write head:
    ///
    /// ```text
    /// read_pos = write_pos - delay_samples
    /// if read_pos < 0 { read_pos += buffer_len }
    /// ```
    ///
    /// One wrap is always enough: `delay_samples` is clamped to less than
    /// the buffer length, so the subtraction can go below zero by at most
    /// one buffer's worth.
    ///
    /// Example: `write_pos = 5`, `delay_samples = 10.0`, `buffer_len = 100`:
    /// ```text
    /// 5 - 10 = -5  →  -5 + 100 = 95
    /// ```
    /// Position 95 is indeed 10 steps behind position 5 on a ring of 100.
    ///
    /// The integer part of `read_pos` picks the first buffer slot, the
    /// fractional part blends it with the next slot (wrapped to 0 when it
    /// reaches the end of the buffer).
    pub fn read_fractional(&self, delay_samples: f32) -> f32 {
        // Clamp to valid range: at least 0 samples, at most the full buffer.
        let delay_clamped = delay_samples.clamp(0.0, (self.buffer_len - 1) as f32);

        let buffer_len = self.buffer_len as f32;
        let mut read_pos = self.write_pos as f32 - delay_clamped;
        if read_pos < 0.0 {
            read_pos += buffer_len;
        }
        // Float rounding can land exactly on buffer_len for delays a hair
        // above zero; fold that boundary case back onto position 0.
        if read_pos >= buffer_len {
            read_pos -= buffer_len;
        }

        // Split into integer and fractional parts.
        //
        // For read_pos = 441.3:
        //   index_a = 441   (first buffer slot to look at)
        //   frac    = 0.3   (how much of the *next* slot to blend in)
        let index_a = read_pos as usize;
        let frac = read_pos - index_a as f32;

        // The second slot is one step further forward (one sample newer),
        // wrapping to the start of the buffer at the end.
        let index_b = if index_a + 1 >= self.buffer_len {
            0
        } else {
            index_a + 1
        };

        let sample_a = self.buffer[index_a];
        let sample_b = self.buffer[index_b];

        // Linear interpolation: blend between the two adjacent samples
        // based on the fractional part of the read position.
        //
        // When frac = 0.0 → result = sample_a (exact position)
        // When frac = 0.5 → result = average of a and b
        // When frac → 1.0 → result ≈ sample_b (next position)
        //
        // This ensures smooth, artifact-free output when the delay time
        // is changed continuously (e.g., by automating the knob).
        sample_a * (1.0 - frac) + sample_b * frac
    }

    /// Advance the write position by one sample.
    ///
    /// Call this once per sample, after both `write()` and
    /// `read_fractional()` are done. The modulo wraps the position back
    /// to 0 when it reaches the end of the buffer, creating the circular
    /// behavior.
    pub fn advance(&mut self) {
        self.write_pos = (self.write_pos + 1) % self.buffer_len;
    }

    /// Clear the entire buffer to silence and reset the write position.
    ///
    /// Called during plugin `reset()` (when the user stops playback)
    /// to prevent stale audio from bleeding into the next play session.
    pub fn clear(&mut self) {
        self.buffer.fill(0.0);
        self.write_pos = 0;
    }
}

// ─────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────
