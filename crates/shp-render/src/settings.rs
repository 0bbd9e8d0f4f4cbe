use clap::Parser;
use shp_render_lib::{Config, Envelope};
use std::path::PathBuf;

#[derive(Parser, Debug, Clone)]
#[clap(author, version, about, long_about = None)]
/// Shapefile renderer - decode the visible part of one or more layers for a viewport
pub struct Settings {
    /// Shapefiles (.shp) to render, drawn in the given order
    #[clap(value_name = "FILE", required = true)]
    pub layers: Vec<PathBuf>,

    /// Viewport as minx,miny,maxx,maxy in source coordinates (default: all layers)
    #[clap(long, value_parser = parse_bbox, allow_hyphen_values = true)]
    pub bbox: Option<Envelope>,

    /// Screen width in pixels
    #[clap(long, default_value = "1024")]
    pub width: u32,

    /// Screen height in pixels
    #[clap(long, default_value = "768")]
    pub height: u32,

    /// Source coordinates are WGS84 longitude/latitude, drawn in Web Mercator
    #[clap(long, default_value = "false")]
    pub mercator: bool,

    /// Ignore spatial index files and always scan every record
    #[clap(long, default_value = "false")]
    pub no_index: bool,

    /// Do not build an in-memory R-tree for layers without a quad-tree file
    #[clap(long, default_value = "false")]
    pub no_rtree: bool,

    /// Keep point records that land on an already drawn pixel
    #[clap(long, default_value = "false")]
    pub no_dedup: bool,

    /// Decimation bias (higher = more detail, 1.0 = one device pixel)
    #[clap(short, long, default_value = "1.0")]
    pub bias: f64,

    /// Print the rendered geometry as JSON instead of a summary
    #[clap(long, default_value = "false")]
    pub json: bool,

    /// More logging (-v debug, -vv trace)
    #[clap(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,
}

impl Settings {
    /// Layer configuration selected by the flags
    pub fn config(&self) -> Config {
        Config {
            use_spatial_index: !self.no_index,
            build_rtree: !self.no_rtree,
            screen_dedup: !self.no_dedup,
            decimation_bias: self.bias,
        }
    }

    pub fn screen_size(&self) -> (u32, u32) {
        (self.width.max(1), self.height.max(1))
    }
}

/// Parse `minx,miny,maxx,maxy`
fn parse_bbox(value: &str) -> Result<Envelope, String> {
    let numbers = value
        .split(',')
        .map(|part| part.trim().parse::<f64>())
        .collect::<Result<Vec<_>, _>>()
        .map_err(|err| format!("invalid number in bbox: {err}"))?;
    match numbers.as_slice() {
        &[min_x, min_y, max_x, max_y] if numbers.iter().all(|v| v.is_finite()) => {
            Ok(Envelope::new(min_x, min_y, max_x, max_y))
        }
        _ => Err(format!(
            "expected 4 finite numbers (minx,miny,maxx,maxy), got {value:?}"
        )),
    }
}
