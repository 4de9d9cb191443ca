//! Record the path of a single pixel's ray, for plotting outside the tracer.

use std::path::Path;

use serde::Serialize;

use crate::error::{Error, ExportError, Result};
use crate::geodesic::GeodesicState;
use crate::output::Resolution;
use crate::params::SimulationParameters;
use crate::ray_tracer::{RayTracer, Termination};

/// One accepted integration step.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct PathSample {
    pub lambda: f64,
    pub t: f64,
    pub r: f64,
    pub theta: f64,
    pub phi: f64,
    pub x: f64,
    pub y: f64,
    pub z: f64,
    pub radial_sign: f64,
    pub polar_sign: f64,
}

impl PathSample {
    pub fn from_state(state: &GeodesicState, a: f64) -> PathSample {
        let [x, y, z] = state.cartesian(a);
        PathSample {
            lambda: state.lambda,
            t: state.t(),
            r: state.r(),
            theta: state.theta(),
            phi: state.phi(),
            x,
            y,
            z,
            radial_sign: state.radial_sign,
            polar_sign: state.polar_sign,
        }
    }
}

/// Trace the ray through pixel `(x, y)` and keep every position it visits,
/// starting at the camera.
pub fn trace_pixel(
    tracer: &RayTracer,
    params: &SimulationParameters,
    resolution: Resolution,
    x: u32,
    y: u32,
) -> Result<(Vec<PathSample>, Termination)> {
    if x >= resolution.width || y >= resolution.height {
        return Err(Error::PixelOutOfRange {
            x,
            y,
            width: resolution.width,
            height: resolution.height,
        });
    }

    let scene = tracer.scene(params, resolution);
    let a = scene.metric.a;
    let mut ray = scene.spawn_ray(x, y);

    let mut samples = vec![PathSample::from_state(&ray.state, a)];
    ray.trace_with(&scene, |state| samples.push(PathSample::from_state(state, a)));

    let termination = ray.termination().unwrap_or(Termination::BudgetExhausted);
    log::info!(
        "Pixel ({}, {}): {:?} after {} steps, {} samples",
        x,
        y,
        termination,
        ray.steps,
        samples.len()
    );
    Ok((samples, termination))
}

pub fn save_to_csv<S: Serialize>(rows: &[S], path: &Path) -> std::result::Result<(), ExportError> {
    let mut wtr = csv::Writer::from_path(path)?;
    for row in rows {
        wtr.serialize(row)?;
    }
    wtr.flush()?;
    log::info!("Wrote {} rows to {}", rows.len(), path.display());
    Ok(())
}
