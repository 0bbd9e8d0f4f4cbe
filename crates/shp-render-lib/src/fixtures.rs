//! Test fixtures: in-memory writers for shapefiles, position tables and quad-tree files

use crate::{Dimension, Envelope, ShapeType};
use std::path::{Path, PathBuf};

/// Builds `.shp` and matching `.shx` bytes record by record
pub struct ShpBuilder {
    shape_type: ShapeType,
    /// Whether optional M blocks are written for Z and M variants
    write_m: bool,
    records: Vec<Vec<u8>>,
    bbox: Envelope,
}

impl ShpBuilder {
    pub fn new(shape_type: ShapeType) -> Self {
        Self {
            shape_type,
            write_m: true,
            records: Vec::new(),
            bbox: Envelope::empty(),
        }
    }

    pub fn without_m(mut self) -> Self {
        self.write_m = false;
        self
    }

    fn dimension(&self) -> Dimension {
        self.shape_type.dimension()
    }

    fn trailing(&self, content: &mut Vec<u8>, n: usize) {
        let z_block = self.dimension() == Dimension::Xyzm;
        let m_block = self.write_m && self.dimension() != Dimension::Xy;
        if z_block {
            put_f64(content, 0.0);
            put_f64(content, 100.0);
            for i in 0..n {
                put_f64(content, i as f64);
            }
        }
        if m_block {
            put_f64(content, 0.0);
            put_f64(content, 1.0);
            for _ in 0..n {
                put_f64(content, 0.5);
            }
        }
    }

    pub fn null(&mut self) -> &mut Self {
        let mut content = Vec::new();
        put_i32(&mut content, 0);
        self.records.push(content);
        self
    }

    pub fn point(&mut self, x: f64, y: f64) -> &mut Self {
        let mut content = Vec::new();
        put_i32(&mut content, self.shape_type.code());
        put_f64(&mut content, x);
        put_f64(&mut content, y);
        match self.dimension() {
            Dimension::Xy => {}
            Dimension::Xym => {
                if self.write_m {
                    put_f64(&mut content, 0.5);
                }
            }
            Dimension::Xyzm => {
                put_f64(&mut content, 10.0);
                if self.write_m {
                    put_f64(&mut content, 0.5);
                }
            }
        }
        self.bbox.expand_to_include(x, y);
        self.records.push(content);
        self
    }

    pub fn multipoint(&mut self, points: &[(f64, f64)]) -> &mut Self {
        let bbox = envelope_of(points.iter());
        let mut content = Vec::new();
        put_i32(&mut content, self.shape_type.code());
        put_envelope(&mut content, &bbox);
        put_i32(&mut content, points.len() as i32);
        for &(x, y) in points {
            put_f64(&mut content, x);
            put_f64(&mut content, y);
        }
        self.trailing(&mut content, points.len());
        self.bbox.expand_to_include_envelope(&bbox);
        self.records.push(content);
        self
    }

    /// Polyline or polygon record, depending on the builder's shape type
    pub fn parts(&mut self, parts: &[&[(f64, f64)]]) -> &mut Self {
        let bbox = envelope_of(parts.iter().flat_map(|p| p.iter()));
        let total: usize = parts.iter().map(|p| p.len()).sum();
        let mut content = Vec::new();
        put_i32(&mut content, self.shape_type.code());
        put_envelope(&mut content, &bbox);
        put_i32(&mut content, parts.len() as i32);
        put_i32(&mut content, total as i32);
        let mut offset = 0;
        for part in parts {
            put_i32(&mut content, offset);
            offset += part.len() as i32;
        }
        for part in parts {
            for &(x, y) in part.iter() {
                put_f64(&mut content, x);
                put_f64(&mut content, y);
            }
        }
        self.trailing(&mut content, total);
        self.bbox.expand_to_include_envelope(&bbox);
        self.records.push(content);
        self
    }

    /// Raw record content (shape type + body), for malformed-input tests
    pub fn raw(&mut self, content: Vec<u8>) -> &mut Self {
        self.records.push(content);
        self
    }

    /// Returns `(shp, shx)` bytes
    pub fn finish(&self) -> (Vec<u8>, Vec<u8>) {
        let shp_len: usize = 100 + self.records.iter().map(|r| 8 + r.len()).sum::<usize>();
        let shx_len = 100 + 8 * self.records.len();

        let mut shp = header_bytes(shp_len, self.shape_type, &self.bbox);
        let mut shx = header_bytes(shx_len, self.shape_type, &self.bbox);
        for (i, content) in self.records.iter().enumerate() {
            put_i32_be(&mut shx, (shp.len() / 2) as i32);
            put_i32_be(&mut shx, (content.len() / 2) as i32);

            put_i32_be(&mut shp, i as i32 + 1);
            put_i32_be(&mut shp, (content.len() / 2) as i32);
            shp.extend_from_slice(content);
        }
        (shp, shx)
    }

    /// Write `<stem>.shp` and `<stem>.shx` into `dir`, returning the `.shp` path
    pub fn write_to(&self, dir: &Path, stem: &str) -> PathBuf {
        let (shp, shx) = self.finish();
        let shp_path = dir.join(format!("{stem}.shp"));
        std::fs::write(&shp_path, shp).unwrap();
        std::fs::write(dir.join(format!("{stem}.shx")), shx).unwrap();
        shp_path
    }
}

/// One node of a `.qix` quad-tree
pub struct QixNode {
    pub bbox: Envelope,
    pub ids: Vec<i32>,
    pub children: Vec<QixNode>,
}

impl QixNode {
    pub fn leaf(bbox: Envelope, ids: Vec<i32>) -> Self {
        Self {
            bbox,
            ids,
            children: Vec::new(),
        }
    }

    pub fn branch(bbox: Envelope, children: Vec<QixNode>) -> Self {
        Self {
            bbox,
            ids: Vec::new(),
            children,
        }
    }

    fn size(&self) -> usize {
        4 + 32 + 4 + 4 * self.ids.len() + 4 + self.children_size()
    }

    fn children_size(&self) -> usize {
        self.children.iter().map(QixNode::size).sum()
    }

    fn write(&self, out: &mut Vec<u8>, big_endian: bool) {
        let int = |out: &mut Vec<u8>, v: i32| {
            if big_endian {
                out.extend_from_slice(&v.to_be_bytes());
            } else {
                out.extend_from_slice(&v.to_le_bytes());
            }
        };
        let float = |out: &mut Vec<u8>, v: f64| {
            if big_endian {
                out.extend_from_slice(&v.to_be_bytes());
            } else {
                out.extend_from_slice(&v.to_le_bytes());
            }
        };
        int(out, self.children_size() as i32);
        float(out, self.bbox.min_x);
        float(out, self.bbox.min_y);
        float(out, self.bbox.max_x);
        float(out, self.bbox.max_y);
        int(out, self.ids.len() as i32);
        for &id in &self.ids {
            int(out, id);
        }
        int(out, self.children.len() as i32);
        for child in &self.children {
            child.write(out, big_endian);
        }
    }
}

/// Serialize a complete `.qix` file
pub fn qix_bytes(root: &QixNode, num_shapes: i32, big_endian: bool) -> Vec<u8> {
    let mut out = b"SQT".to_vec();
    out.push(if big_endian { 2 } else { 1 });
    out.push(1); // version
    out.extend_from_slice(&[0, 0, 0]);
    if big_endian {
        out.extend_from_slice(&num_shapes.to_be_bytes());
        out.extend_from_slice(&4i32.to_be_bytes());
    } else {
        out.extend_from_slice(&num_shapes.to_le_bytes());
        out.extend_from_slice(&4i32.to_le_bytes());
    }
    root.write(&mut out, big_endian);
    out
}

/// A root covering `bbox` with one leaf per record, each at the record's own envelope
pub fn flat_qix(records: &[Envelope]) -> QixNode {
    let mut bbox = Envelope::empty();
    for env in records {
        bbox.expand_to_include_envelope(env);
    }
    let children = records
        .iter()
        .enumerate()
        .map(|(i, env)| QixNode::leaf(*env, vec![i as i32]))
        .collect();
    QixNode::branch(bbox, children)
}

fn envelope_of<'a>(points: impl Iterator<Item = &'a (f64, f64)>) -> Envelope {
    let mut env = Envelope::empty();
    for &(x, y) in points {
        env.expand_to_include(x, y);
    }
    env
}

fn header_bytes(total_len: usize, shape_type: ShapeType, bbox: &Envelope) -> Vec<u8> {
    let mut out = Vec::with_capacity(total_len);
    put_i32_be(&mut out, 9994);
    out.extend_from_slice(&[0u8; 20]);
    put_i32_be(&mut out, (total_len / 2) as i32);
    put_i32(&mut out, 1000);
    put_i32(&mut out, shape_type.code());
    let bbox = if bbox.is_empty() {
        Envelope::new(0.0, 0.0, 0.0, 0.0)
    } else {
        *bbox
    };
    put_envelope(&mut out, &bbox);
    out.extend_from_slice(&[0u8; 32]); // Z and M ranges
    out
}

pub fn put_i32(out: &mut Vec<u8>, v: i32) {
    out.extend_from_slice(&v.to_le_bytes());
}

pub fn put_i32_be(out: &mut Vec<u8>, v: i32) {
    out.extend_from_slice(&v.to_be_bytes());
}

pub fn put_f64(out: &mut Vec<u8>, v: f64) {
    out.extend_from_slice(&v.to_le_bytes());
}

pub fn put_envelope(out: &mut Vec<u8>, env: &Envelope) {
    put_f64(out, env.min_x);
    put_f64(out, env.min_y);
    put_f64(out, env.max_x);
    put_f64(out, env.max_y);
}

/// Locate record `index` in `.shp` bytes; returns `(body_start, record_end)` where the body
/// starts right after the shape type
pub fn record_body(shp: &[u8], index: usize) -> (u64, u64) {
    let mut offset = 100usize;
    for _ in 0..index {
        let words = i32::from_be_bytes(shp[offset + 4..offset + 8].try_into().unwrap());
        offset += 8 + words as usize * 2;
    }
    let words = i32::from_be_bytes(shp[offset + 4..offset + 8].try_into().unwrap());
    let end = offset + 8 + words as usize * 2;
    ((offset + 12) as u64, end as u64)
}

/// Identity transform: source coordinates are already screen pixels
pub struct Identity;

impl crate::CoordinateTransform for Identity {
    fn forward(
        &self,
        coord: geo::Coord<f64>,
    ) -> std::result::Result<geo::Coord<f64>, crate::TransformError> {
        Ok(coord)
    }

    fn inverse(
        &self,
        coord: geo::Coord<f64>,
    ) -> std::result::Result<geo::Coord<f64>, crate::TransformError> {
        Ok(coord)
    }
}

/// Context with an identity transform and explicit pixel spans
pub fn identity_context(viewport: Envelope, span: f64) -> crate::DecodeContext {
    crate::DecodeContext::with_spans(
        viewport,
        crate::CoordinateTransformer::new(std::sync::Arc::new(Identity)),
        span,
        span,
    )
}

/// Cursor over `shp`, fenced to record `index` and positioned after its shape type
pub fn record_cursor(
    shp: &[u8],
    index: usize,
) -> (crate::BinaryCursor<std::io::Cursor<Vec<u8>>>, u64) {
    let (start, end) = record_body(shp, index);
    let mut cursor = crate::BinaryCursor::from_bytes(shp.to_vec());
    cursor.seek(start).unwrap();
    cursor.set_limit(end).unwrap();
    (cursor, end)
}

/// Counts `WARN` events emitted from one module
struct WarningCounter {
    target: &'static str,
    count: std::sync::Arc<std::sync::atomic::AtomicUsize>,
}

impl<S: tracing::Subscriber> tracing_subscriber::Layer<S> for WarningCounter {
    fn on_event(
        &self,
        event: &tracing::Event<'_>,
        _ctx: tracing_subscriber::layer::Context<'_, S>,
    ) {
        let meta = event.metadata();
        if *meta.level() == tracing::Level::WARN && meta.target() == self.target {
            self.count.fetch_add(1, std::sync::atomic::Ordering::Relaxed);
        }
    }
}

/// Run `f` on this thread and count the warnings logged by module `target` meanwhile
pub fn count_warnings<T>(target: &'static str, f: impl FnOnce() -> T) -> (T, usize) {
    use tracing_subscriber::layer::SubscriberExt;

    let count = std::sync::Arc::new(std::sync::atomic::AtomicUsize::new(0));
    let subscriber = tracing_subscriber::registry().with(WarningCounter {
        target,
        count: count.clone(),
    });
    let result = tracing::subscriber::with_default(subscriber, f);
    (result, count.load(std::sync::atomic::Ordering::Relaxed))
}
