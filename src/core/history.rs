//! Fixed-capacity history ring for lookback analysis and grain extraction.
//!
//! Unlike a FIFO queue, pushes never fail: the ring always overwrites its
//! oldest content, and samples are addressed by their absolute position in the
//! stream (a monotonic counter since the last `clear()`). Reads outside the
//! retained range return silence, so callers never observe uninitialized or
//! evicted memory.

/// Absolute-indexed sample history with power-of-two wraparound.
///
/// Never allocates after construction. All reads and writes are O(1) per
/// sample with deterministic upper bounds.
#[derive(Debug, Clone)]
pub struct HistoryBuffer {
    data: Vec<f32>,
    mask: usize,
    /// Absolute index of the next sample to be written.
    head: i64,
}

impl HistoryBuffer {
    /// Creates a history buffer retaining at least `min_capacity` samples.
    ///
    /// The actual capacity is rounded up to the next power of two so index
    /// wraparound is a mask instead of a modulo.
    pub fn with_capacity(min_capacity: usize) -> Self {
        let capacity = min_capacity.max(2).next_power_of_two();
        Self {
            data: vec![0.0; capacity],
            mask: capacity - 1,
            head: 0,
        }
    }

    /// Returns the fixed capacity in samples.
    #[inline]
    pub fn capacity(&self) -> usize {
        self.data.len()
    }

    /// Absolute index of the next sample to be written.
    ///
    /// Samples at indices `oldest()..head()` are readable.
    #[inline]
    pub fn head(&self) -> i64 {
        self.head
    }

    /// Absolute index of the oldest retained sample.
    #[inline]
    pub fn oldest(&self) -> i64 {
        (self.head - self.capacity() as i64).max(0)
    }

    /// Number of samples currently retained.
    #[inline]
    pub fn len(&self) -> usize {
        (self.head - self.oldest()) as usize
    }

    /// Returns true when nothing has been written since the last clear.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.head == 0
    }

    /// Zeroes the contents and restarts absolute indexing at zero.
    pub fn clear(&mut self) {
        self.data.fill(0.0);
        self.head = 0;
    }

    /// Appends one sample, overwriting the oldest when full.
    #[inline]
    pub fn push(&mut self, sample: f32) {
        self.data[(self.head as usize) & self.mask] = sample;
        self.head += 1;
    }

    /// Reads the sample at an absolute index; silence outside the retained
    /// range (evicted, unwritten, or negative).
    #[inline]
    pub fn get(&self, index: i64) -> f32 {
        if index < self.oldest() || index >= self.head {
            return 0.0;
        }
        self.data[(index as usize) & self.mask]
    }

    /// Copies the samples `[start, start + out.len())` into `out`, writing
    /// silence where the range falls outside the retained history.
    pub fn copy_range(&self, start: i64, out: &mut [f32]) {
        for (k, slot) in out.iter_mut().enumerate() {
            *slot = self.get(start + k as i64);
        }
    }

    /// Copies the most recent `out.len()` samples (ending at the head) into
    /// `out`, zero-padding the front when less history exists.
    pub fn copy_latest(&self, out: &mut [f32]) {
        self.copy_range(self.head - out.len() as i64, out);
    }
}
