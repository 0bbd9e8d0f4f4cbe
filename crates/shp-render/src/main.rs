//! Command-line driver: render shapefile layers for one viewport and report the result

mod logging;
mod settings;

use clap::Parser;
use serde::Serialize;
use settings::Settings;
use shp_render_lib::{
    AffineScreenTransform, CoordinateTransform, Envelope, MercatorScreenTransform,
    RenderRequest, RenderedLayer, ShapeError, ShapefileLayer, render_layers,
};
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Instant;

#[derive(Debug, thiserror::Error)]
enum DriverError {
    #[error("None of the {0} layers could be opened")]
    NoLayers(usize),

    #[error("The viewport is empty; pass --bbox")]
    EmptyViewport,

    #[error("Cannot write JSON output: {0}")]
    Json(#[from] serde_json::Error),
}

/// Outcome of one layer, as printed
#[derive(Debug, Serialize)]
struct LayerReport {
    path: PathBuf,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
    #[serde(flatten)]
    rendered: Option<RenderedLayer>,
}

impl LayerReport {
    fn failed(path: PathBuf, err: &ShapeError) -> Self {
        Self {
            path,
            error: Some(err.to_string()),
            rendered: None,
        }
    }

    fn summary(&self) -> String {
        match (&self.rendered, &self.error) {
            (Some(rendered), _) => {
                let points: usize = rendered.geometries.iter().map(|g| g.num_points()).sum();
                let index = rendered
                    .index_kind
                    .map_or_else(|| "skipped".to_string(), |kind| format!("{kind} index"));
                format!(
                    "{}: {} geometries, {} points from {} records ({index}{})",
                    self.path.display(),
                    rendered.stats.emitted,
                    points,
                    rendered.stats.visited,
                    if rendered.cancelled { ", cancelled" } else { "" }
                )
            }
            (None, Some(err)) => format!("{}: FAILED: {err}", self.path.display()),
            (None, None) => format!("{}: not rendered", self.path.display()),
        }
    }
}

fn main() -> ExitCode {
    let settings = Settings::parse();
    logging::setup_logging(settings.verbose);

    match run(&settings) {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::from(2),
        Err(err) => {
            tracing::error!("{err}");
            ExitCode::FAILURE
        }
    }
}

/// Render every layer; `Ok(false)` if some layer failed
fn run(settings: &Settings) -> Result<bool, DriverError> {
    let config = settings.config();
    let mut reports = Vec::new();
    let mut layers = Vec::new();
    for path in &settings.layers {
        match ShapefileLayer::open(path, config.clone()) {
            Ok(layer) => layers.push(layer),
            Err(err) => {
                tracing::error!("Cannot open {}: {err}", path.display());
                reports.push(LayerReport::failed(path.clone(), &err));
            }
        }
    }
    if layers.is_empty() {
        return Err(DriverError::NoLayers(settings.layers.len()));
    }

    let viewport = settings.bbox.unwrap_or_else(|| {
        layers.iter().fold(Envelope::empty(), |mut acc, layer| {
            acc.expand_to_include_envelope(&layer.bbox());
            acc
        })
    });
    if viewport.is_empty() {
        return Err(DriverError::EmptyViewport);
    }

    let screen_size = settings.screen_size();
    let transform: Arc<dyn CoordinateTransform> = if settings.mercator {
        Arc::new(MercatorScreenTransform::new(viewport, screen_size))
    } else {
        Arc::new(AffineScreenTransform::new(viewport, screen_size))
    };
    tracing::debug!(
        "Rendering {} layers, viewport {viewport:?}, screen {}x{}",
        layers.len(),
        screen_size.0,
        screen_size.1
    );

    let start = Instant::now();
    let request = RenderRequest::new(viewport, screen_size, transform);
    let results = render_layers(&layers, &request);
    tracing::info!(
        "Rendered {} layers in {:.1} ms",
        layers.len(),
        start.elapsed().as_secs_f64() * 1000.0
    );

    for (layer, result) in layers.iter().zip(results) {
        let path = layer.path().to_path_buf();
        reports.push(match result {
            Ok(rendered) => LayerReport {
                path,
                error: None,
                rendered: Some(rendered),
            },
            Err(err) => LayerReport::failed(path, &err),
        });
    }

    if settings.json {
        println!("{}", serde_json::to_string_pretty(&reports)?);
    } else {
        for report in &reports {
            println!("{}", report.summary());
        }
    }

    Ok(reports.iter().all(|report| report.error.is_none()))
}
