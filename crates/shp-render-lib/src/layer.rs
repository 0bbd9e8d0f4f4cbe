//! ShapefileLayer - Top-level manager for one geometry file and its render passes
//!
//! A pass opens the geometry file and the best available index, selects candidate records
//! for the viewport, and decodes them with inline culling into screen geometry.

use crate::header::{FILE_HEADER_LEN, RECORD_HEADER_LEN};
use crate::{
    BinaryCursor, CoordinateTransform, CoordinateTransformer, DecodeContext, DecodeScratch,
    DecodeStats, Envelope, FileHeader, IndexHandle, IndexKind, RTreeIndex, RecordHandle,
    RecordSelector, Result, ScreenMap, ShapeDecoder, ShapeError, ShapeType, SimpleGeometry,
};

use rayon::prelude::*;
#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};
use std::io::{Read, Seek};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock};

/// Configuration for rendering a layer
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Config {
    /// Use a spatial index when one is available (default true).
    /// When false every pass walks all records.
    pub use_spatial_index: bool,
    /// Build an in-memory R-tree when the layer has no quad-tree file (default true).
    /// The tree is built on the first pass and reused by later ones.
    pub build_rtree: bool,
    /// Drop point records that land on an already drawn pixel (default true)
    pub screen_dedup: bool,
    /// Decimation bias factor (default 1.0).
    /// Divides the source-space size of a device pixel: higher values keep more detail,
    /// 1.0 merges everything closer than one pixel.
    pub decimation_bias: f64,
}

#[cfg_attr(feature = "profiling", profiling::all_functions)]
impl Default for Config {
    fn default() -> Self {
        Self {
            use_spatial_index: true,
            build_rtree: true,
            screen_dedup: true,
            decimation_bias: 1.0,
        }
    }
}

/// Counters for one render pass
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct PassStats {
    /// Records handed out by the selector
    pub visited: usize,
    /// Geometries returned
    pub emitted: usize,
    /// Points whose transform failed and were substituted or dropped
    pub transform_failures: usize,
    #[cfg_attr(feature = "serde", serde(flatten))]
    pub decode: DecodeStats,
}

/// What to render: the visible area, the device and the source-to-screen transform
#[derive(Clone)]
pub struct RenderRequest {
    /// Visible area in source coordinates
    pub viewport: Envelope,
    /// Device size in pixels
    pub screen_size: (u32, u32),
    pub transform: Arc<dyn CoordinateTransform>,
    /// Checked once per record; setting it ends the pass early
    pub stop: Arc<AtomicBool>,
}

impl RenderRequest {
    pub fn new(
        viewport: Envelope,
        screen_size: (u32, u32),
        transform: Arc<dyn CoordinateTransform>,
    ) -> Self {
        Self {
            viewport,
            screen_size,
            transform,
            stop: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn with_stop(mut self, stop: Arc<AtomicBool>) -> Self {
        self.stop = stop;
        self
    }
}

/// Result of one render pass
#[derive(Debug, Clone, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct RenderedLayer {
    /// Visible geometry in ascending file order
    pub geometries: Vec<SimpleGeometry>,
    pub stats: PassStats,
    pub index_kind: Option<IndexKind>,
    /// The stop flag ended the pass before every record was visited
    pub cancelled: bool,
}

/// One shapefile layer
///
/// Holds the validated file header and the cached R-tree; the files themselves are only
/// open during a pass.
#[derive(Debug)]
pub struct ShapefileLayer {
    path: PathBuf,
    header: FileHeader,
    config: Config,
    rtree: RwLock<Option<RTreeIndex>>,
}

#[cfg_attr(feature = "profiling", profiling::all_functions)]
impl ShapefileLayer {
    /// Open a `.shp` file and validate its header
    pub fn open(path: impl AsRef<Path>, config: Config) -> Result<Self> {
        #[cfg(feature = "profiling")]
        profiling::scope!("layer::open");

        let path = path.as_ref().to_path_buf();
        let mut cursor = BinaryCursor::open(&path)?;
        let header = FileHeader::read(&mut cursor)?;
        tracing::debug!(
            "Opened {} ({:?}, {} bytes)",
            path.display(),
            header.shape_type,
            header.file_length
        );
        Ok(Self {
            path,
            header,
            config,
            rtree: RwLock::new(None),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn header(&self) -> &FileHeader {
        &self.header
    }

    pub fn shape_type(&self) -> ShapeType {
        self.header.shape_type
    }

    /// Bounding box of all records, from the file header
    pub fn bbox(&self) -> Envelope {
        self.header.bbox
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Path of the position table next to the geometry file
    pub fn shx_path(&self) -> PathBuf {
        self.sibling("shx")
    }

    /// Path of the quad-tree file next to the geometry file
    pub fn qix_path(&self) -> PathBuf {
        self.sibling("qix")
    }

    /// Sibling path, keeping the case of the geometry file's extension
    fn sibling(&self, extension: &str) -> PathBuf {
        let upper = self
            .path
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| e.chars().all(|c| c.is_ascii_uppercase()));
        if upper {
            self.path.with_extension(extension.to_ascii_uppercase())
        } else {
            self.path.with_extension(extension)
        }
    }

    /// The layer's R-tree, built from `cursor` on first use
    pub fn rtree<R: Read + Seek>(&self, cursor: &mut BinaryCursor<R>) -> Result<RTreeIndex> {
        if let Some(index) = self.rtree.read().ok().and_then(|cache| cache.clone()) {
            return Ok(index);
        }
        let index = RTreeIndex::build(cursor, &self.header)?;
        if let Ok(mut cache) = self.rtree.write() {
            *cache = Some(index.clone());
        }
        Ok(index)
    }

    /// Drop the cached R-tree, e.g. after the file was rewritten
    pub fn clear_cache(&self) {
        if let Ok(mut cache) = self.rtree.write() {
            *cache = None;
        }
    }

    /// Run one render pass for `request`
    ///
    /// Errors abort this layer only. The index and geometry files are closed on every
    /// exit path.
    pub fn render(&self, request: &RenderRequest) -> Result<RenderedLayer> {
        #[cfg(feature = "profiling")]
        profiling::scope!("layer::render");

        let mut cursor = BinaryCursor::open(&self.path)?;
        let header = FileHeader::read(&mut cursor)?;

        if !header.bbox.intersects(&request.viewport) {
            tracing::debug!("{} is outside the viewport", self.path.display());
            return Ok(RenderedLayer::default());
        }

        let mut index = IndexHandle::open(self, &mut cursor);
        let end = header.effective_length(cursor.len());
        let mut selector =
            RecordSelector::new(&mut index, &request.viewport, FILE_HEADER_LEN, end);
        let index_kind = index.kind();

        let transform = CoordinateTransformer::new(request.transform.clone());
        let mut ctx = DecodeContext::new(
            request.viewport,
            transform,
            request.screen_size,
            self.config.decimation_bias,
        );
        if self.config.screen_dedup && header.shape_type.is_point_like() {
            let (width, height) = request.screen_size;
            ctx = ctx.with_screen_map(ScreenMap::new(width, height));
        }

        let mut scratch = DecodeScratch::new();
        let mut geometries = Vec::new();
        let mut stats = PassStats::default();
        let mut cancelled = false;

        while selector.has_next() {
            if request.stop.load(Ordering::Relaxed) {
                cancelled = true;
                break;
            }
            let Some(handle) = selector.next(&mut cursor)? else {
                break;
            };
            stats.visited += 1;
            if let Some(geometry) =
                decode_record(&mut cursor, &handle, header.shape_type, &mut ctx, &mut scratch)?
            {
                geometries.push(geometry);
            }
        }
        index.close();

        stats.emitted = geometries.len();
        stats.transform_failures = ctx.transform.failures();
        stats.decode = ctx.stats;
        tracing::debug!(
            "{}: {} of {} visited records emitted ({} index, {:?})",
            self.path.display(),
            stats.emitted,
            stats.visited,
            index_kind,
            stats.decode
        );

        Ok(RenderedLayer {
            geometries,
            stats,
            index_kind: Some(index_kind),
            cancelled,
        })
    }
}

/// Decode the record at `handle`, checking that the decoder consumed it exactly
fn decode_record<R: Read + Seek>(
    cursor: &mut BinaryCursor<R>,
    handle: &RecordHandle,
    layer_type: ShapeType,
    ctx: &mut DecodeContext,
    scratch: &mut DecodeScratch,
) -> Result<Option<SimpleGeometry>> {
    if handle.content_length < 4 {
        return Err(ShapeError::MalformedRecord {
            offset: handle.offset,
            reason: format!("content length {} is too short", handle.content_length),
        });
    }
    cursor.clear_limit();
    cursor.seek(handle.offset + RECORD_HEADER_LEN)?;
    cursor.set_limit(handle.end())?;

    let shape_type = ShapeType::from_code(cursor.read_i32()?)?;
    if shape_type != ShapeType::Null && shape_type != layer_type {
        return Err(ShapeError::MalformedRecord {
            offset: handle.offset,
            reason: format!(
                "record of shape type {} in a layer of type {}",
                shape_type.code(),
                layer_type.code()
            ),
        });
    }

    let geometry = ShapeDecoder::new(shape_type).decode_with(cursor, ctx, scratch)?;
    if cursor.position() != handle.end() {
        return Err(ShapeError::MalformedRecord {
            offset: handle.offset,
            reason: format!(
                "{} unread bytes at the end of record {}",
                handle.end() - cursor.position(),
                handle.index
            ),
        });
    }
    cursor.clear_limit();
    Ok(geometry)
}

/// Render several layers in parallel, one single-threaded pass per layer
///
/// Returns one result per layer, in input order; a failing layer does not affect the others.
pub fn render_layers(
    layers: &[ShapefileLayer],
    request: &RenderRequest,
) -> Vec<Result<RenderedLayer>> {
    #[cfg(feature = "profiling")]
    profiling::scope!("layer::render_layers");

    layers
        .par_iter()
        .map(|layer| {
            let result = layer.render(request);
            if let Err(err) = &result {
                tracing::warn!("Layer {} failed: {err}", layer.path().display());
            }
            result
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::{Identity, QixNode, ShpBuilder, flat_qix, qix_bytes};
    use crate::{Dimension, ShapeKind};
    use tempfile::TempDir;

    fn request(viewport: Envelope) -> RenderRequest {
        RenderRequest::new(viewport, (100, 100), Arc::new(Identity))
    }

    /// A 10×10 grid of small squares, one polygon record each
    fn grid_builder() -> (ShpBuilder, Vec<Envelope>) {
        let mut builder = ShpBuilder::new(ShapeType::Polygon(Dimension::Xy));
        let mut envelopes = Vec::new();
        for j in 0..10 {
            for i in 0..10 {
                let (x, y) = (i as f64 * 10.0, j as f64 * 10.0);
                let ring = [
                    (x, y),
                    (x, y + 5.0),
                    (x + 5.0, y + 5.0),
                    (x + 5.0, y),
                    (x, y),
                ];
                builder.parts(&[&ring]);
                envelopes.push(Envelope::new(x, y, x + 5.0, y + 5.0));
            }
        }
        (builder, envelopes)
    }

    fn write_layer(
        dir: &TempDir,
        stem: &str,
        qix: Option<Vec<u8>>,
        config: Config,
    ) -> ShapefileLayer {
        let (builder, _) = grid_builder();
        let path = builder.write_to(dir.path(), stem);
        if let Some(qix) = qix {
            std::fs::write(dir.path().join(format!("{stem}.qix")), qix).unwrap();
        }
        ShapefileLayer::open(path, config).unwrap()
    }

    fn fine_config() -> Config {
        Config {
            decimation_bias: 100.0,
            ..Config::default()
        }
    }

    #[test]
    fn test_config_default() {
        let config = Config::default();
        assert!(config.use_spatial_index);
        assert!(config.build_rtree);
        assert!(config.screen_dedup);
        assert_eq!(config.decimation_bias, 1.0);
    }

    #[test]
    fn test_index_and_full_scan_agree() {
        let dir = TempDir::new().unwrap();
        let (_, envelopes) = grid_builder();
        let viewport = Envelope::new(12.0, 3.0, 47.0, 38.0);

        let qix = qix_bytes(&flat_qix(&envelopes), 100, false);
        let quad = write_layer(&dir, "quad", Some(qix), fine_config());
        let rtree = write_layer(&dir, "rtree", None, fine_config());
        let scan = write_layer(
            &dir,
            "scan",
            None,
            Config {
                use_spatial_index: false,
                ..fine_config()
            },
        );

        let quad = quad.render(&request(viewport)).unwrap();
        let rtree = rtree.render(&request(viewport)).unwrap();
        let scan = scan.render(&request(viewport)).unwrap();

        assert_eq!(quad.index_kind, Some(IndexKind::QuadTree));
        assert_eq!(rtree.index_kind, Some(IndexKind::RTree));
        assert_eq!(scan.index_kind, Some(IndexKind::None));

        // Squares starting at x in {10, 20, 30, 40} and y in {0, 10, 20, 30}
        assert_eq!(scan.geometries.len(), 16);
        assert_eq!(quad.geometries, scan.geometries);
        assert_eq!(rtree.geometries, scan.geometries);

        assert_eq!(scan.stats.visited, 100);
        assert_eq!(quad.stats.visited, 16);
        assert_eq!(scan.stats.decode.rejected_bbox, 84);
    }

    #[test]
    fn test_non_finite_record_bbox_is_skipped_with_and_without_index() {
        let dir = TempDir::new().unwrap();
        let mut content = Vec::new();
        crate::fixtures::put_i32(&mut content, 3);
        crate::fixtures::put_envelope(
            &mut content,
            &Envelope::new(f64::NEG_INFINITY, 0.0, f64::INFINITY, 10.0),
        );
        crate::fixtures::put_i32(&mut content, 1);
        crate::fixtures::put_i32(&mut content, 2);
        crate::fixtures::put_i32(&mut content, 0);
        for v in [2.0, 2.0, 3.0, 3.0] {
            crate::fixtures::put_f64(&mut content, v);
        }
        let mut builder = ShpBuilder::new(ShapeType::Polyline(Dimension::Xy));
        builder.parts(&[&[(1.0, 1.0), (4.0, 4.0)]]);
        builder.raw(content);
        let path = builder.write_to(dir.path(), "unbounded");
        let viewport = Envelope::new(0.0, 0.0, 10.0, 10.0);

        let indexed = ShapefileLayer::open(&path, fine_config()).unwrap();
        let scan = ShapefileLayer::open(
            &path,
            Config {
                use_spatial_index: false,
                ..fine_config()
            },
        )
        .unwrap();
        let indexed = indexed.render(&request(viewport)).unwrap();
        let scan = scan.render(&request(viewport)).unwrap();

        assert_eq!(indexed.index_kind, Some(IndexKind::RTree));
        assert_eq!(scan.geometries.len(), 1);
        assert_eq!(indexed.geometries, scan.geometries);
        assert_eq!(scan.stats.decode.rejected_bbox, 1);
    }

    #[test]
    fn test_output_is_in_file_order() {
        let dir = TempDir::new().unwrap();
        let (_, envelopes) = grid_builder();
        // Ids listed in reverse: the pass must still visit records by ascending offset
        let children = envelopes
            .iter()
            .enumerate()
            .rev()
            .map(|(i, env)| QixNode::leaf(*env, vec![i as i32]))
            .collect();
        let root = QixNode::branch(Envelope::new(0.0, 0.0, 100.0, 100.0), children);
        let qix = qix_bytes(&root, 100, true);
        let layer = write_layer(&dir, "reverse", Some(qix), fine_config());

        let rendered = layer
            .render(&request(Envelope::new(0.0, 0.0, 100.0, 100.0)))
            .unwrap();
        assert_eq!(rendered.index_kind, Some(IndexKind::QuadTree));
        assert_eq!(rendered.geometries.len(), 100);
        for pair in rendered.geometries.windows(2) {
            let (a, b) = (&pair[0].bbox, &pair[1].bbox);
            assert!((a.min_y, a.min_x) < (b.min_y, b.min_x));
        }
    }

    #[test]
    fn test_corrupt_quadtree_falls_back() {
        let dir = TempDir::new().unwrap();
        let viewport = Envelope::new(0.0, 0.0, 25.0, 25.0);
        let qix = b"not a quad-tree".to_vec();
        let layer = write_layer(&dir, "corrupt", Some(qix), fine_config());
        let rendered = layer.render(&request(viewport)).unwrap();
        assert_eq!(rendered.index_kind, Some(IndexKind::RTree));
        assert_eq!(rendered.geometries.len(), 9);

        let no_rtree = write_layer(
            &dir,
            "corrupt2",
            Some(b"SQT".to_vec()),
            Config {
                build_rtree: false,
                ..fine_config()
            },
        );
        let rendered = no_rtree.render(&request(viewport)).unwrap();
        assert_eq!(rendered.index_kind, Some(IndexKind::None));
        assert_eq!(rendered.geometries.len(), 9);
    }

    #[test]
    fn test_broken_quadtree_query_demotes_to_full_scan() {
        let dir = TempDir::new().unwrap();
        // Valid header, but the root lists a record that does not exist
        let root = QixNode::leaf(Envelope::new(0.0, 0.0, 100.0, 100.0), vec![0, 500]);
        let qix = qix_bytes(&root, 100, false);
        let layer = write_layer(&dir, "stale", Some(qix), fine_config());

        let rendered = layer
            .render(&request(Envelope::new(0.0, 0.0, 25.0, 25.0)))
            .unwrap();
        assert_eq!(rendered.stats.visited, 100);
        assert_eq!(rendered.geometries.len(), 9);
    }

    #[test]
    fn test_rtree_is_cached_between_passes() {
        let dir = TempDir::new().unwrap();
        let layer = write_layer(&dir, "cached", None, fine_config());
        let mut cursor = BinaryCursor::open(layer.path()).unwrap();
        let first = layer.rtree(&mut cursor).unwrap();
        assert_eq!(first.len(), 100);

        // A cached tree never reads from the cursor
        let mut empty = BinaryCursor::from_bytes(Vec::new());
        let second = layer.rtree(&mut empty).unwrap();
        assert_eq!(second.len(), 100);

        layer.clear_cache();
        assert!(layer.rtree(&mut empty).unwrap().is_empty());
    }

    #[test]
    fn test_layer_outside_viewport_is_skipped() {
        let dir = TempDir::new().unwrap();
        let layer = write_layer(&dir, "far", None, fine_config());
        let rendered = layer
            .render(&request(Envelope::new(500.0, 500.0, 600.0, 600.0)))
            .unwrap();
        assert!(rendered.geometries.is_empty());
        assert_eq!(rendered.stats.visited, 0);
        assert_eq!(rendered.index_kind, None);
    }

    #[test]
    fn test_stop_flag_cancels_pass() {
        let dir = TempDir::new().unwrap();
        let layer = write_layer(&dir, "stopped", None, fine_config());
        let stop = Arc::new(AtomicBool::new(true));
        let request = request(Envelope::new(0.0, 0.0, 100.0, 100.0)).with_stop(stop);

        let rendered = layer.render(&request).unwrap();
        assert!(rendered.cancelled);
        assert!(rendered.geometries.is_empty());
        assert_eq!(rendered.stats.visited, 0);
    }

    /// Identity transform that raises the stop flag after a number of points
    struct StopAfter {
        points: std::sync::atomic::AtomicUsize,
        limit: usize,
        stop: Arc<AtomicBool>,
    }

    impl CoordinateTransform for StopAfter {
        fn forward(
            &self,
            coord: geo::Coord<f64>,
        ) -> std::result::Result<geo::Coord<f64>, crate::TransformError> {
            if self.points.fetch_add(1, Ordering::Relaxed) + 1 >= self.limit {
                self.stop.store(true, Ordering::Relaxed);
            }
            Ok(coord)
        }

        fn inverse(
            &self,
            coord: geo::Coord<f64>,
        ) -> std::result::Result<geo::Coord<f64>, crate::TransformError> {
            Ok(coord)
        }
    }

    #[test]
    fn test_stop_flag_raised_during_pass() {
        let dir = TempDir::new().unwrap();
        let layer = write_layer(&dir, "interrupted", None, fine_config());
        let stop = Arc::new(AtomicBool::new(false));
        // Each square has 5 vertices: the flag goes up while decoding the 10th record
        let transform = StopAfter {
            points: Default::default(),
            limit: 50,
            stop: stop.clone(),
        };
        let request = RenderRequest::new(
            Envelope::new(0.0, 0.0, 100.0, 100.0),
            (100, 100),
            Arc::new(transform),
        )
        .with_stop(stop);

        let rendered = layer.render(&request).unwrap();
        assert!(rendered.cancelled);
        assert!(rendered.stats.visited > 0);
        assert!(rendered.stats.visited < 100);
        assert_eq!(rendered.geometries.len(), rendered.stats.visited);
    }

    /// Identity transform failing on the left edge of the grid
    struct FailLeftEdge;

    impl CoordinateTransform for FailLeftEdge {
        fn forward(
            &self,
            coord: geo::Coord<f64>,
        ) -> std::result::Result<geo::Coord<f64>, crate::TransformError> {
            if coord.x < 1.0 {
                Err(crate::TransformError {
                    x: coord.x,
                    y: coord.y,
                })
            } else {
                Ok(coord)
            }
        }

        fn inverse(
            &self,
            coord: geo::Coord<f64>,
        ) -> std::result::Result<geo::Coord<f64>, crate::TransformError> {
            Ok(coord)
        }
    }

    #[test]
    fn test_transform_failures_are_counted_and_logged_once() {
        let dir = TempDir::new().unwrap();
        let layer = write_layer(
            &dir,
            "left-edge",
            None,
            Config {
                use_spatial_index: false,
                ..fine_config()
            },
        );
        let request = RenderRequest::new(
            Envelope::new(0.0, 0.0, 100.0, 100.0),
            (100, 100),
            Arc::new(FailLeftEdge),
        );

        let (rendered, warnings) =
            crate::fixtures::count_warnings("shp_render_lib::transform", || {
                layer.render(&request).unwrap()
            });
        // Ten squares at x = 0, three of their five vertices each on the failing edge
        assert_eq!(rendered.stats.transform_failures, 30);
        assert_eq!(rendered.geometries.len(), 100);
        assert_eq!(warnings, 1);

        // Substituted vertices take the neighbour that did transform
        let first = &rendered.geometries[0].parts[0];
        assert!(first.chunks(2).all(|xy| xy[0] >= 1.0));
    }

    #[test]
    fn test_point_layer_screen_dedup() {
        let dir = TempDir::new().unwrap();
        let mut builder = ShpBuilder::new(ShapeType::Point(Dimension::Xy));
        builder.point(10.2, 10.2).point(10.7, 10.9).point(30.0, 30.0);
        let path = builder.write_to(dir.path(), "points");

        let viewport = Envelope::new(0.0, 0.0, 100.0, 100.0);
        let layer = ShapefileLayer::open(&path, Config::default()).unwrap();
        let rendered = layer.render(&request(viewport)).unwrap();
        assert_eq!(rendered.geometries.len(), 2);
        assert_eq!(rendered.stats.decode.screen_duplicates, 1);
        assert!(rendered.geometries.iter().all(|g| g.kind == ShapeKind::Point));

        let config = Config {
            screen_dedup: false,
            ..Config::default()
        };
        let layer = ShapefileLayer::open(&path, config).unwrap();
        let rendered = layer.render(&request(viewport)).unwrap();
        assert_eq!(rendered.geometries.len(), 3);
    }

    #[test]
    fn test_sub_pixel_records_collapse() {
        let dir = TempDir::new().unwrap();
        let layer = write_layer(&dir, "coarse", None, Config::default());
        // 100 screen pixels over 1000 source units: every 5×5 square is sub-pixel
        let request = RenderRequest::new(
            Envelope::new(0.0, 0.0, 1000.0, 1000.0),
            (100, 100),
            Arc::new(crate::AffineScreenTransform::new(
                Envelope::new(0.0, 0.0, 1000.0, 1000.0),
                (100, 100),
            )),
        );
        let rendered = layer.render(&request).unwrap();
        assert_eq!(rendered.geometries.len(), 100);
        assert_eq!(rendered.stats.decode.collapsed, 100);
        assert!(
            rendered
                .geometries
                .iter()
                .all(|g| g.parts.len() == 1 && g.parts[0].len() == 4)
        );
    }

    #[test]
    fn test_malformed_record_fails_only_its_layer() {
        let dir = TempDir::new().unwrap();
        let good = write_layer(&dir, "good", None, fine_config());

        // A polygon record claiming more points than it holds
        let mut content = Vec::new();
        crate::fixtures::put_i32(&mut content, 5);
        crate::fixtures::put_envelope(&mut content, &Envelope::new(0.0, 0.0, 10.0, 10.0));
        crate::fixtures::put_i32(&mut content, 1);
        crate::fixtures::put_i32(&mut content, 40);
        crate::fixtures::put_i32(&mut content, 0);
        let mut builder = ShpBuilder::new(ShapeType::Polygon(Dimension::Xy));
        builder.parts(&[&[(0.0, 0.0), (0.0, 1.0), (1.0, 1.0), (0.0, 0.0)]]);
        builder.raw(content);
        let bad_path = builder.write_to(dir.path(), "bad");
        let bad = ShapefileLayer::open(bad_path, fine_config()).unwrap();

        let results = render_layers(&[bad, good], &request(Envelope::new(0.0, 0.0, 8.0, 8.0)));
        assert_eq!(results.len(), 2);
        assert!(matches!(results[0], Err(ShapeError::Truncated { .. })));
        assert_eq!(results[1].as_ref().unwrap().geometries.len(), 1);
    }

    #[test]
    fn test_mixed_shape_type_is_malformed() {
        let dir = TempDir::new().unwrap();
        let mut content = Vec::new();
        crate::fixtures::put_i32(&mut content, 1);
        crate::fixtures::put_f64(&mut content, 1.0);
        crate::fixtures::put_f64(&mut content, 1.0);
        let mut builder = ShpBuilder::new(ShapeType::Polygon(Dimension::Xy));
        builder.parts(&[&[(0.0, 0.0), (0.0, 1.0), (1.0, 1.0), (0.0, 0.0)]]);
        builder.raw(content);
        let path = builder.write_to(dir.path(), "mixed");
        let layer = ShapefileLayer::open(path, fine_config()).unwrap();

        let err = layer
            .render(&request(Envelope::new(0.0, 0.0, 10.0, 10.0)))
            .unwrap_err();
        assert!(matches!(err, ShapeError::MalformedRecord { .. }));
    }

    #[test]
    fn test_open_missing_file() {
        let dir = TempDir::new().unwrap();
        let err =
            ShapefileLayer::open(dir.path().join("missing.shp"), Config::default()).unwrap_err();
        assert!(matches!(err, ShapeError::ResourceIo { .. }));
    }

    #[test]
    fn test_sibling_paths_follow_extension_case() {
        let dir = TempDir::new().unwrap();
        let mut builder = ShpBuilder::new(ShapeType::Point(Dimension::Xy));
        builder.point(0.0, 0.0);
        let (shp, _) = builder.finish();
        let path = dir.path().join("UPPER.SHP");
        std::fs::write(&path, shp).unwrap();

        let layer = ShapefileLayer::open(&path, Config::default()).unwrap();
        assert_eq!(layer.qix_path(), dir.path().join("UPPER.QIX"));
        assert_eq!(layer.shx_path(), dir.path().join("UPPER.SHX"));
    }
}
