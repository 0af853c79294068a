//! JSON batch encoding for the upload endpoint.
//!
//! Wire format:
//!
//! ```text
//! {"data":[{"t1":25.01,"t2":25.02,"time":1351824120}, ...]}
//! ```
//!
//! Both the document and the text buffer are sized from [`BATCH_CAPACITY`]
//! and the worst-case width of each field, so a full buffer always fits.

use heapless::{String, Vec};
use serde::Serialize;
use thiserror_no_std::Error;

use crate::sample::{BATCH_CAPACITY, SampleBuffer, SampleRecord};

const DATA_KEY: &str = "data";
const READING1_KEY: &str = "t1";
const READING2_KEY: &str = "t2";
const TIME_KEY: &str = "time";

/// Longest text serde_json writes for an `f32`.
///
/// Finite values use the shortest round-trip form. The widest is a small
/// negative value still written in decimal, e.g. `-0.0000010000008` (16
/// chars); scientific forms such as `-1.17549435e-38` are shorter. Non-finite
/// values become `null`.
const MAX_F32_CHARS: usize = 16;

/// `u32::MAX` is `4294967295`.
const MAX_U32_CHARS: usize = 10;

/// `"key":`
const fn key_chars(key: &str) -> usize {
    key.len() + 3
}

/// Worst-case characters for one serialized record, trailing comma included.
pub const RECORD_TEXT_CAPACITY: usize = 1 // {
    + key_chars(READING1_KEY)
    + MAX_F32_CHARS
    + 1 // ,
    + key_chars(READING2_KEY)
    + MAX_F32_CHARS
    + 1 // ,
    + key_chars(TIME_KEY)
    + MAX_U32_CHARS
    + 1 // }
    + 1; // ,

/// Worst-case characters for a batch of `records` entries.
pub const fn batch_text_capacity(records: usize) -> usize {
    // {"data":[ ... ]}
    1 + key_chars(DATA_KEY) + 1 + records * RECORD_TEXT_CAPACITY + 1 + 1
}

/// Size of the text buffer the encoder serializes into.
pub const BATCH_TEXT_CAPACITY: usize = batch_text_capacity(BATCH_CAPACITY);

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum EncodeError {
    /// The batch did not fit the statically sized buffers.
    ///
    /// Unreachable for buffers of at most [`BATCH_CAPACITY`] slots; the
    /// capacity constants are derived so that a full buffer fits.
    #[error("Batch exceeds its static capacity")]
    CapacityExceeded,
    #[error("Batch serialization failed")]
    Serialize,
}

#[derive(Debug, Serialize)]
struct BatchDocument {
    data: Vec<SampleRecord, BATCH_CAPACITY>,
}

/// Converts the live prefix of a [`SampleBuffer`] into JSON text.
///
/// The document and text buffer are owned and reused between calls.
#[derive(Debug)]
pub struct BatchEncoder {
    document: BatchDocument,
    text: String<BATCH_TEXT_CAPACITY>,
}

impl BatchEncoder {
    pub const fn new() -> Self {
        Self {
            document: BatchDocument { data: Vec::new() },
            text: String::new(),
        }
    }

    /// Encode the live prefix of `buffer` and return the JSON text.
    ///
    /// Iteration stops at the first empty slot; everything after it is
    /// ignored. An empty buffer encodes to `{"data":[]}`.
    pub fn encode<const N: usize>(&mut self, buffer: &SampleBuffer<N>) -> Result<&str, EncodeError> {
        const {
            assert!(
                N <= BATCH_CAPACITY,
                "sample buffer is larger than the batch capacity"
            )
        };

        self.document.data.clear();
        self.text.clear();

        for record in buffer.iter() {
            if !record.is_live() {
                break;
            }
            self.document
                .data
                .push(*record)
                .map_err(|_| EncodeError::CapacityExceeded)?;
        }

        // serde_json only writes into a heap String without std; the result is
        // bounded by the copy into `text` below.
        let json = serde_json::to_string(&self.document).map_err(|_| EncodeError::Serialize)?;
        self.text
            .push_str(&json)
            .map_err(|_| EncodeError::CapacityExceeded)?;

        Ok(self.text.as_str())
    }

    /// Number of records in the most recent batch.
    pub fn record_count(&self) -> usize {
        self.document.data.len()
    }

    /// Text of the most recent batch.
    pub fn text(&self) -> &str {
        self.text.as_str()
    }
}

impl Default for BatchEncoder {
    fn default() -> Self {
        Self::new()
    }
}
