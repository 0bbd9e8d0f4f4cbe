//! Typed, bounded binary reader with an explicit read position

use crate::{Envelope, Result, ShapeError};
use byteorder::{BigEndian, LittleEndian, ReadBytesExt};
use std::fs::File;
use std::io::{BufReader, Cursor, Read, Seek, SeekFrom};
use std::path::Path;

/// Reader over a geometry or index file that tracks its own position
///
/// Reads are little-endian unless the method name says otherwise. The cursor never moves
/// past its limit: by default the end of the stream, or the end of the current record
/// while a record body is being decoded. Any attempt fails with [`ShapeError::Truncated`]
/// and leaves the position untouched.
#[derive(Debug)]
pub struct BinaryCursor<R> {
    reader: R,
    position: u64,
    len: u64,
    limit: u64,
    fenced: bool,
}

impl BinaryCursor<BufReader<File>> {
    /// Open a file for buffered reading
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let file = File::open(path).map_err(|source| ShapeError::ResourceIo {
            path: path.to_path_buf(),
            source,
        })?;
        Self::new(BufReader::new(file))
    }
}

impl BinaryCursor<Cursor<Vec<u8>>> {
    /// Wrap an in-memory buffer
    pub fn from_bytes(bytes: Vec<u8>) -> Self {
        let len = bytes.len() as u64;
        Self {
            reader: Cursor::new(bytes),
            position: 0,
            len,
            limit: len,
            fenced: false,
        }
    }
}

impl<R: Read + Seek> BinaryCursor<R> {
    /// Wrap a seekable reader, positioned at its start
    pub fn new(mut reader: R) -> Result<Self> {
        let len = reader.seek(SeekFrom::End(0))?;
        reader.seek(SeekFrom::Start(0))?;
        Ok(Self {
            reader,
            position: 0,
            len,
            limit: len,
            fenced: false,
        })
    }

    /// Current absolute position in bytes
    #[inline]
    pub fn position(&self) -> u64 {
        self.position
    }

    /// Total stream length in bytes
    #[inline]
    pub fn len(&self) -> u64 {
        self.len
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Bytes left before the active limit
    #[inline]
    pub fn remaining(&self) -> u64 {
        self.limit.saturating_sub(self.position)
    }

    /// Restrict reads to end at `end` (absolute); used to fence a single record
    pub fn set_limit(&mut self, end: u64) -> Result<()> {
        if end > self.len || end < self.position {
            return Err(ShapeError::Truncated {
                offset: self.position,
                needed: end.saturating_sub(self.position),
                available: self.len.saturating_sub(self.position),
            });
        }
        self.limit = end;
        self.fenced = true;
        Ok(())
    }

    /// Lift any record fence; reads are bounded by the stream end again
    #[inline]
    pub fn clear_limit(&mut self) {
        self.limit = self.len;
        self.fenced = false;
    }

    /// Whether [`BinaryCursor::set_limit`] is in effect
    #[inline]
    pub fn is_fenced(&self) -> bool {
        self.fenced
    }

    #[inline]
    fn ensure(&self, needed: u64) -> Result<()> {
        if needed > self.remaining() {
            return Err(ShapeError::Truncated {
                offset: self.position,
                needed,
                available: self.remaining(),
            });
        }
        Ok(())
    }

    /// Move to an absolute position, which may not lie past the limit
    pub fn seek(&mut self, position: u64) -> Result<()> {
        if position > self.limit {
            return Err(ShapeError::Truncated {
                offset: self.position,
                needed: position.saturating_sub(self.position),
                available: self.remaining(),
            });
        }
        if position != self.position {
            let delta = position as i64 - self.position as i64;
            self.reader.seek_relative(delta)?;
            self.position = position;
        }
        Ok(())
    }

    /// Advance by `n` bytes without reading them
    pub fn skip(&mut self, n: u64) -> Result<()> {
        self.ensure(n)?;
        if n > 0 {
            self.reader.seek_relative(n as i64)?;
            self.position += n;
        }
        Ok(())
    }

    #[inline]
    pub fn read_f64(&mut self) -> Result<f64> {
        self.ensure(8)?;
        let value = self.reader.read_f64::<LittleEndian>()?;
        self.position += 8;
        Ok(value)
    }

    #[inline]
    pub fn read_i32(&mut self) -> Result<i32> {
        self.ensure(4)?;
        let value = self.reader.read_i32::<LittleEndian>()?;
        self.position += 4;
        Ok(value)
    }

    #[inline]
    pub fn read_f64_be(&mut self) -> Result<f64> {
        self.ensure(8)?;
        let value = self.reader.read_f64::<BigEndian>()?;
        self.position += 8;
        Ok(value)
    }

    #[inline]
    pub fn read_i32_be(&mut self) -> Result<i32> {
        self.ensure(4)?;
        let value = self.reader.read_i32::<BigEndian>()?;
        self.position += 4;
        Ok(value)
    }

    pub fn read_u8(&mut self) -> Result<u8> {
        self.ensure(1)?;
        let value = self.reader.read_u8()?;
        self.position += 1;
        Ok(value)
    }

    /// Read an `(x, y)` pair
    #[inline]
    pub fn read_xy(&mut self) -> Result<(f64, f64)> {
        self.ensure(16)?;
        let x = self.read_f64()?;
        let y = self.read_f64()?;
        Ok((x, y))
    }

    /// Read a `minX, minY, maxX, maxY` bounding box
    pub fn read_envelope(&mut self) -> Result<Envelope> {
        self.ensure(32)?;
        Ok(Envelope {
            min_x: self.read_f64()?,
            min_y: self.read_f64()?,
            max_x: self.read_f64()?,
            max_y: self.read_f64()?,
        })
    }
}
