//! Record position table (`.shx`)
//!
//! Same 100-byte header as the geometry file, then one fixed 8-byte entry per record:
//! offset and content length, both big-endian and in 16-bit words.

use crate::header::FILE_HEADER_LEN;
use crate::{BinaryCursor, FileHeader, RecordHandle, Result, ShapeError};
use std::fs::File;
use std::io::{BufReader, Read, Seek};
use std::path::Path;

const ENTRY_LEN: u64 = 8;

/// Random-access reader over a position table
#[derive(Debug)]
pub struct PositionTable<R = BufReader<File>> {
    cursor: BinaryCursor<R>,
    len: usize,
}

impl PositionTable {
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        Self::new(BinaryCursor::open(path)?)
    }
}

impl<R: Read + Seek> PositionTable<R> {
    pub fn new(mut cursor: BinaryCursor<R>) -> Result<Self> {
        let header = FileHeader::read(&mut cursor)?;
        let end = header.effective_length(cursor.len());
        let len = (end.saturating_sub(FILE_HEADER_LEN) / ENTRY_LEN) as usize;
        Ok(Self { cursor, len })
    }

    /// Number of records listed
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Position of record `index` (0-based)
    pub fn entry(&mut self, index: usize) -> Result<RecordHandle> {
        if index >= self.len {
            return Err(ShapeError::IndexUnavailable(format!(
                "record {index} is not in the position table ({} entries)",
                self.len
            )));
        }
        let at = FILE_HEADER_LEN + index as u64 * ENTRY_LEN;
        self.cursor.seek(at)?;
        let offset = self.cursor.read_i32_be()?;
        let length = self.cursor.read_i32_be()?;
        if offset < 0 || length < 0 {
            return Err(ShapeError::MalformedRecord {
                offset: at,
                reason: format!("negative position entry ({offset}, {length})"),
            });
        }
        Ok(RecordHandle {
            index,
            offset: offset as u64 * 2,
            content_length: length as u64 * 2,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::ShpBuilder;
    use crate::{Dimension, ShapeType};

    #[test]
    fn test_entries_match_records() {
        let mut builder = ShpBuilder::new(ShapeType::MultiPoint(Dimension::Xy));
        builder
            .multipoint(&[(0.0, 0.0), (1.0, 1.0)])
            .multipoint(&[(5.0, 5.0)]);
        let (shp, shx) = builder.finish();

        let mut table = PositionTable::new(BinaryCursor::from_bytes(shx)).unwrap();
        assert_eq!(table.len(), 2);

        let first = table.entry(0).unwrap();
        assert_eq!(first.offset, 100);
        assert_eq!(first.content_length, 4 + 32 + 4 + 32);
        let second = table.entry(1).unwrap();
        assert_eq!(second.offset, first.end());
        assert_eq!(second.end(), shp.len() as u64);
    }

    #[test]
    fn test_entry_out_of_range() {
        let mut builder = ShpBuilder::new(ShapeType::Point(Dimension::Xy));
        builder.point(0.0, 0.0);
        let (_, shx) = builder.finish();

        let mut table = PositionTable::new(BinaryCursor::from_bytes(shx)).unwrap();
        assert!(matches!(
            table.entry(1),
            Err(ShapeError::IndexUnavailable(_))
        ));
    }
}
