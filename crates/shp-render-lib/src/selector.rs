//! Record iteration for one render pass
//!
//! The selector starts in one of two modes and never switches back:
//! - **Indexed**: candidates from the spatial index, visited in ascending file offset
//! - **Sequential**: every record, found by walking the record headers
//!
//! Both end in **Exhausted**. An index query failure demotes the pass to Sequential.

use crate::header::RECORD_HEADER_LEN;
use crate::{BinaryCursor, Envelope, IndexHandle, RecordHeader, Result};
use std::io::{Read, Seek};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Location of one record in the geometry file
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct RecordHandle {
    /// 0-based position of the record in the file
    pub index: usize,
    /// Absolute offset of the record header
    pub offset: u64,
    /// Content length in bytes, shape type included
    pub content_length: u64,
}

impl RecordHandle {
    /// Absolute offset of the shape type field
    #[inline]
    pub fn content_start(&self) -> u64 {
        self.offset + RECORD_HEADER_LEN
    }

    /// Absolute offset one past the last byte of the record
    #[inline]
    pub fn end(&self) -> u64 {
        self.content_start() + self.content_length
    }
}

/// Externally visible selector state
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum SelectorMode {
    Indexed,
    Sequential,
    Exhausted,
}

#[derive(Debug)]
enum State {
    Indexed(std::vec::IntoIter<RecordHandle>),
    Sequential { next_offset: u64, next_index: usize },
    Exhausted,
}

/// Iterator over the records a pass has to look at
#[derive(Debug)]
pub struct RecordSelector {
    state: State,
    /// End of the record area in the geometry file
    end: u64,
}

#[cfg_attr(feature = "profiling", profiling::all_functions)]
impl RecordSelector {
    /// Select the records for `viewport`
    ///
    /// Queries `index` once. A failed query closes the index for the rest of the pass.
    pub fn new(index: &mut IndexHandle, viewport: &Envelope, start: u64, end: u64) -> Self {
        let state = if index.is_open() {
            match index.query(viewport) {
                Ok(mut candidates) => {
                    candidates.sort_unstable_by_key(|handle| handle.offset);
                    candidates.dedup_by_key(|handle| handle.offset);
                    tracing::debug!(
                        "{} index selected {} candidate records",
                        index.kind(),
                        candidates.len()
                    );
                    State::Indexed(candidates.into_iter())
                }
                Err(err) => {
                    tracing::warn!(
                        "{} index query failed, falling back to a full scan: {err}",
                        index.kind()
                    );
                    index.close();
                    State::Sequential {
                        next_offset: start,
                        next_index: 0,
                    }
                }
            }
        } else {
            State::Sequential {
                next_offset: start,
                next_index: 0,
            }
        };
        Self { state, end }
    }

    /// Walk every record from `start` to `end`
    pub fn sequential(start: u64, end: u64) -> Self {
        Self {
            state: State::Sequential {
                next_offset: start,
                next_index: 0,
            },
            end,
        }
    }

    pub fn mode(&self) -> SelectorMode {
        match self.state {
            State::Indexed(_) => SelectorMode::Indexed,
            State::Sequential { .. } => SelectorMode::Sequential,
            State::Exhausted => SelectorMode::Exhausted,
        }
    }

    pub fn has_next(&self) -> bool {
        match &self.state {
            State::Indexed(candidates) => !candidates.as_slice().is_empty(),
            State::Sequential { next_offset, .. } => next_offset + RECORD_HEADER_LEN <= self.end,
            State::Exhausted => false,
        }
    }

    /// Next record to visit, or `None` once exhausted
    ///
    /// In sequential mode this reads the record header at the current offset; the cursor
    /// position afterwards is unspecified.
    pub fn next<R: Read + Seek>(
        &mut self,
        cursor: &mut BinaryCursor<R>,
    ) -> Result<Option<RecordHandle>> {
        let handle = match &mut self.state {
            State::Indexed(candidates) => candidates.next(),
            State::Sequential {
                next_offset,
                next_index,
            } => {
                if *next_offset + RECORD_HEADER_LEN > self.end {
                    None
                } else {
                    cursor.clear_limit();
                    cursor.seek(*next_offset)?;
                    let header = RecordHeader::read(cursor)?;
                    let handle = RecordHandle {
                        index: *next_index,
                        offset: *next_offset,
                        content_length: header.content_length,
                    };
                    *next_offset = handle.end();
                    *next_index += 1;
                    Some(handle)
                }
            }
            State::Exhausted => None,
        };
        if handle.is_none() {
            self.state = State::Exhausted;
        }
        Ok(handle)
    }
}
