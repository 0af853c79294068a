//! Sample records and the fixed-capacity sample buffer.
//!
//! A slot whose `timestamp` is 0 is empty. Records are appended contiguously
//! from index 0, so the first empty slot marks the end of the live data. There
//! is no separate length counter: after a reset the buffer is all zeroes and
//! reads as empty instead of carrying a stale length.

use serde::{Deserialize, Serialize};

/// Number of slots in the telemetry buffer.
pub const BATCH_CAPACITY: usize = 100;

/// Timestamp value reserved for an unused slot.
pub const EMPTY_TIMESTAMP: u32 = 0;

/// One timestamped pair of temperature readings.
///
/// Field names on the wire are `t1`, `t2` and `time`.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct SampleRecord {
    /// First probe, °C
    #[serde(rename = "t1")]
    pub reading1: f32,
    /// Second probe, °C
    #[serde(rename = "t2")]
    pub reading2: f32,
    /// Seconds since the unix epoch
    #[serde(rename = "time")]
    pub timestamp: u32,
}

impl SampleRecord {
    /// The empty-slot value.
    pub const EMPTY: Self = Self {
        reading1: 0.0,
        reading2: 0.0,
        timestamp: EMPTY_TIMESTAMP,
    };

    pub const fn new(reading1: f32, reading2: f32, timestamp: u32) -> Self {
        Self {
            reading1,
            reading2,
            timestamp,
        }
    }

    /// Whether this slot holds a reading.
    pub const fn is_live(&self) -> bool {
        self.timestamp != EMPTY_TIMESTAMP
    }

    /// Mean of the two readings.
    pub fn average(&self) -> f32 {
        (self.reading1 + self.reading2) / 2.0
    }

    /// Reset the slot to the empty value.
    pub fn clear(&mut self) {
        *self = Self::EMPTY;
    }
}

/// Fixed-length buffer of [`SampleRecord`] slots.
///
/// The live prefix is found by [`SampleBuffer::live_len`], which scans from
/// the start and stops at the first empty slot.
#[derive(Debug, Clone)]
pub struct SampleBuffer<const N: usize> {
    slots: [SampleRecord; N],
}

/// The buffer size the firmware and simulator run with.
pub type TelemetryBuffer = SampleBuffer<BATCH_CAPACITY>;

impl<const N: usize> SampleBuffer<N> {
    /// Create a buffer with every slot empty.
    pub const fn new() -> Self {
        Self {
            slots: [SampleRecord::EMPTY; N],
        }
    }

    /// Total number of slots.
    pub const fn capacity(&self) -> usize {
        N
    }

    /// Reset every slot to the empty value.
    pub fn clear(&mut self) {
        self.slots.iter_mut().for_each(SampleRecord::clear);
    }

    /// Write one slot.
    ///
    /// The caller appends in order starting at 0. Writing a timestamp of 0
    /// empties the slot and cuts the live prefix there.
    ///
    /// # Panics
    ///
    /// Panics if `index >= N`.
    pub fn set(&mut self, index: usize, reading1: f32, reading2: f32, timestamp: u32) {
        self.slots[index] = SampleRecord::new(reading1, reading2, timestamp);
    }

    /// Number of consecutive live slots from index 0.
    ///
    /// O(N) scan; this is the only source of truth for how many records are
    /// waiting to upload.
    pub fn live_len(&self) -> usize {
        self.slots
            .iter()
            .position(|slot| !slot.is_live())
            .unwrap_or(N)
    }

    /// The live prefix as a slice.
    pub fn live(&self) -> &[SampleRecord] {
        &self.slots[..self.live_len()]
    }

    /// Whether no slot is live.
    pub fn is_empty(&self) -> bool {
        self.live_len() == 0
    }

    /// Whether every slot is live.
    pub fn is_full(&self) -> bool {
        self.live_len() == N
    }

    /// Raw access to a slot, live or not.
    pub fn get(&self, index: usize) -> Option<&SampleRecord> {
        self.slots.get(index)
    }

    /// Iterate over every slot in insertion order, including empty ones.
    pub fn iter(&self) -> core::slice::Iter<'_, SampleRecord> {
        self.slots.iter()
    }
}

impl<const N: usize> Default for SampleBuffer<N> {
    fn default() -> Self {
        Self::new()
    }
}
