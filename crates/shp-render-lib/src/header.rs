//! Shapefile file and record headers
//!
//! The file header is 100 bytes: a big-endian file code and length (in 16-bit words),
//! followed by the little-endian version, shape type and bounding box. Every record starts
//! with a big-endian record number and content length, then the little-endian shape type.

use crate::{BinaryCursor, Envelope, Result, ShapeError, ShapeKind};
use std::io::{Read, Seek};

/// Magic number at the start of `.shp` and `.shx` files
pub const FILE_CODE: i32 = 9994;

/// The only defined format version
pub const FILE_VERSION: i32 = 1000;

/// Size of the fixed file header
pub const FILE_HEADER_LEN: u64 = 100;

/// Size of the per-record header (record number + content length)
pub const RECORD_HEADER_LEN: u64 = 8;

/// Coordinate dimensions stored for a shape type
///
/// Only X/Y are ever decoded; the other measures are skipped.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Dimension {
    Xy,
    /// X/Y plus an optional M block
    Xym,
    /// X/Y plus a mandatory Z block and an optional M block
    Xyzm,
}

/// Shape type code as stored on disk
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ShapeType {
    Null,
    Point(Dimension),
    Polyline(Dimension),
    Polygon(Dimension),
    MultiPoint(Dimension),
}

impl ShapeType {
    pub fn from_code(code: i32) -> Result<Self> {
        use Dimension::*;
        Ok(match code {
            0 => ShapeType::Null,
            1 => ShapeType::Point(Xy),
            3 => ShapeType::Polyline(Xy),
            5 => ShapeType::Polygon(Xy),
            8 => ShapeType::MultiPoint(Xy),
            11 => ShapeType::Point(Xyzm),
            13 => ShapeType::Polyline(Xyzm),
            15 => ShapeType::Polygon(Xyzm),
            18 => ShapeType::MultiPoint(Xyzm),
            21 => ShapeType::Point(Xym),
            23 => ShapeType::Polyline(Xym),
            25 => ShapeType::Polygon(Xym),
            28 => ShapeType::MultiPoint(Xym),
            other => return Err(ShapeError::UnsupportedShapeType(other)),
        })
    }

    pub fn code(&self) -> i32 {
        use Dimension::*;
        match self {
            ShapeType::Null => 0,
            ShapeType::Point(Xy) => 1,
            ShapeType::Polyline(Xy) => 3,
            ShapeType::Polygon(Xy) => 5,
            ShapeType::MultiPoint(Xy) => 8,
            ShapeType::Point(Xyzm) => 11,
            ShapeType::Polyline(Xyzm) => 13,
            ShapeType::Polygon(Xyzm) => 15,
            ShapeType::MultiPoint(Xyzm) => 18,
            ShapeType::Point(Xym) => 21,
            ShapeType::Polyline(Xym) => 23,
            ShapeType::Polygon(Xym) => 25,
            ShapeType::MultiPoint(Xym) => 28,
        }
    }

    /// Output geometry kind, or `None` for null shapes
    pub fn kind(&self) -> Option<ShapeKind> {
        match self {
            ShapeType::Null => None,
            ShapeType::Point(_) => Some(ShapeKind::Point),
            ShapeType::MultiPoint(_) => Some(ShapeKind::MultiPoint),
            ShapeType::Polyline(_) => Some(ShapeKind::Polyline),
            ShapeType::Polygon(_) => Some(ShapeKind::Polygon),
        }
    }

    pub fn dimension(&self) -> Dimension {
        match self {
            ShapeType::Null => Dimension::Xy,
            ShapeType::Point(d)
            | ShapeType::Polyline(d)
            | ShapeType::Polygon(d)
            | ShapeType::MultiPoint(d) => *d,
        }
    }

    /// Whether the layer holds point-like geometry (eligible for screen dedup)
    pub fn is_point_like(&self) -> bool {
        matches!(self, ShapeType::Point(_) | ShapeType::MultiPoint(_))
    }
}

/// The fixed 100-byte header of a `.shp` or `.shx` file
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct FileHeader {
    /// Declared file length in bytes
    pub file_length: u64,
    pub shape_type: ShapeType,
    /// Bounding box of every record in the file
    pub bbox: Envelope,
}

impl FileHeader {
    /// Read and validate the header at the start of the stream
    pub fn read<R: Read + Seek>(cursor: &mut BinaryCursor<R>) -> Result<Self> {
        if cursor.len() < FILE_HEADER_LEN {
            return Err(ShapeError::InvalidHeader(format!(
                "file is {} bytes, shorter than the {FILE_HEADER_LEN}-byte header",
                cursor.len()
            )));
        }
        cursor.seek(0)?;

        let code = cursor.read_i32_be()?;
        if code != FILE_CODE {
            return Err(ShapeError::InvalidHeader(format!(
                "bad file code {code}, expected {FILE_CODE}"
            )));
        }
        cursor.skip(20)?; // unused
        let length_words = cursor.read_i32_be()?;
        if length_words < 0 {
            return Err(ShapeError::InvalidHeader(format!(
                "negative file length {length_words}"
            )));
        }
        let version = cursor.read_i32()?;
        if version != FILE_VERSION {
            return Err(ShapeError::InvalidHeader(format!(
                "unsupported version {version}, expected {FILE_VERSION}"
            )));
        }
        let shape_type = ShapeType::from_code(cursor.read_i32()?)?;
        let bbox = cursor.read_envelope()?;
        cursor.seek(FILE_HEADER_LEN)?; // Z and M ranges are not used

        Ok(Self {
            file_length: length_words as u64 * 2,
            shape_type,
            bbox,
        })
    }

    /// Length to iterate over: the declared length, capped by what is really on disk
    pub fn effective_length(&self, stream_len: u64) -> u64 {
        self.file_length.min(stream_len)
    }
}

/// Header preceding every record in a `.shp` file
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RecordHeader {
    /// 1-based record number as written by the producer
    pub record_number: i32,
    /// Content length in bytes (shape type + body)
    pub content_length: u64,
}

impl RecordHeader {
    pub fn read<R: Read + Seek>(cursor: &mut BinaryCursor<R>) -> Result<Self> {
        let offset = cursor.position();
        let record_number = cursor.read_i32_be()?;
        let length_words = cursor.read_i32_be()?;
        if length_words < 0 {
            return Err(ShapeError::MalformedRecord {
                offset,
                reason: format!("negative content length {length_words}"),
            });
        }
        Ok(Self {
            record_number,
            content_length: length_words as u64 * 2,
        })
    }
}
