//! Fixed-Capacity Sample Buffer for One Acquisition Cycle
//!
//! ## Overview
//!
//! Samples of the running cycle are kept in a single block allocated once
//! at boot. The capacity is chosen from the memory the device has (PSRAM on
//! the S3) and never changes afterwards: [`SampleBuffer::append`] only ever
//! writes into storage reserved up front, and [`SampleBuffer::reset`] only
//! rewinds the count.
//!
//! ## Overflow Policy
//!
//! Appending to a full buffer is a silent no-op. Acquisition keeps running
//! on schedule; the session simply holds the first `capacity` samples of
//! the cycle.
//!
//! ```text
//! capacity = 4
//! append(s0..s5)  →  [s0][s1][s2][s3]   count = 4, s4 and s5 dropped
//! reset()         →  [  ][  ][  ][  ]   count = 0, storage kept
//! ```
//!
//! ## Thread Safety
//!
//! Not synchronized. The cooperative loop is the only writer; the dual-task
//! variant hands samples over through [`crate::concurrent`] instead of
//! sharing the buffer.

use alloc::collections::TryReserveError;
use alloc::vec::Vec;

use crate::sample::Sample;

/// Append-only sample store with a capacity fixed at construction
#[derive(Debug, Clone)]
pub struct SampleBuffer {
    /// Storage; `len()` is the sample count, `capacity` the hard limit
    samples: Vec<Sample>,

    /// Maximum number of samples, independent of what the allocator granted
    capacity: usize,
}

impl SampleBuffer {
    /// Allocate storage for exactly `capacity` samples
    ///
    /// Fails instead of aborting when the allocation cannot be satisfied,
    /// so the caller can report the boot error.
    pub fn try_with_capacity(capacity: usize) -> Result<Self, TryReserveError> {
        let mut samples = Vec::new();
        samples.try_reserve_exact(capacity)?;
        Ok(Self { samples, capacity })
    }

    /// Buffer with no storage; every append is dropped
    ///
    /// Stands in for a buffer whose boot allocation failed.
    pub const fn unallocated() -> Self {
        Self {
            samples: Vec::new(),
            capacity: 0,
        }
    }

    /// Append a sample, dropping it if the buffer is full
    pub fn append(&mut self, sample: Sample) {
        if self.samples.len() < self.capacity {
            self.samples.push(sample);
        }
    }

    /// Forget all samples, keeping capacity and storage
    pub fn reset(&mut self) {
        self.samples.clear();
    }

    /// Number of stored samples
    pub fn count(&self) -> usize {
        self.samples.len()
    }

    /// Maximum number of samples
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Sample at position `index` (0 = oldest)
    pub fn at(&self, index: usize) -> Option<&Sample> {
        self.samples.get(index)
    }

    /// Check if buffer is empty
    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Check if buffer is full
    pub fn is_full(&self) -> bool {
        self.samples.len() >= self.capacity
    }

    /// Samples in insertion (time) order
    pub fn as_slice(&self) -> &[Sample] {
        &self.samples
    }

    /// Iterate from oldest to newest
    pub fn iter(&self) -> core::slice::Iter<'_, Sample> {
        self.samples.iter()
    }
}

impl<'a> IntoIterator for &'a SampleBuffer {
    type Item = &'a Sample;
    type IntoIter = core::slice::Iter<'a, Sample>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}
