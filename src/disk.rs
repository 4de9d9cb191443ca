////////////////////////////////////////////////////////////////////
// thin equatorial accretion disk
////////////////////////////////////////////////////////////////////

use crate::black_body::BlackBodyPalette;
use crate::config::DiskConfig;
use crate::curved_space::KerrMetric;
use crate::geodesic::{ConstantsOfMotion, GeodesicState};
use crate::ray_tracer::{Collision, CollisionObject};

// floor on 1 - Omega * lambda
const DOPPLER_FLOOR: f64 = 1e-3;

/// Where a ray went through the disk plane.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DiskCrossing {
    pub radius: f64,
    pub phi: f64,
    pub constants: ConstantsOfMotion,
}

/// Disk geometry and emission for one frame. Read-only while rays are traced.
#[derive(Debug, Clone)]
pub struct DiskModel<'a> {
    pub inner_radius: f64,
    pub outer_radius: f64,
    metric: KerrMetric,
    config: DiskConfig,
    palette: &'a BlackBodyPalette,
}

impl<'a> DiskModel<'a> {
    pub fn new(metric: KerrMetric, config: &DiskConfig, palette: &'a BlackBodyPalette) -> DiskModel<'a> {
        // the disk never reaches inside the horizon, whatever the multiples say
        let inner_radius = (config.inner_isco_multiple * metric.isco_radius())
            .max(metric.horizon_radius() * 1.01);
        let outer_radius = (config.outer_inner_multiple * inner_radius).max(inner_radius);

        DiskModel {
            inner_radius,
            outer_radius,
            metric,
            config: config.clone(),
            palette,
        }
    }

    pub fn contains(&self, r: f64) -> bool {
        r >= self.inner_radius && r <= self.outer_radius
    }

    /// Emitted temperature, hottest at the inner edge.
    pub fn temperature(&self, r: f64) -> f64 {
        self.config.inner_temperature * (self.inner_radius / r).powf(self.config.temperature_index)
    }

    /// Emitted intensity, brightest at the inner edge.
    pub fn emissivity(&self, r: f64) -> f64 {
        self.config.brightness * (self.inner_radius / r).powf(self.config.emissivity_index)
    }

    /// `1 / u^t` of the orbiting gas: the redshift a static observer far away
    /// would see without any Doppler motion. Grows towards one with radius.
    pub fn gravitational_shift(&self, r: f64) -> f64 {
        self.metric.circular_orbit_ut(r).map_or(0.0, |ut| 1.0 / ut)
    }

    /// `1 / (1 - Omega * lambda)` for a photon with impact parameter `lambda`.
    /// Above one for photons co-rotating with the gas.
    pub fn doppler_shift(&self, r: f64, impact_parameter: f64) -> f64 {
        let omega = self.metric.keplerian_angular_velocity(r);
        1.0 / (1.0 - omega * impact_parameter).max(DOPPLER_FLOOR)
    }

    /// Frequency ratio between the camera and the emitting gas, clamped to
    /// `[0, max_shift]`.
    pub fn redshift(&self, r: f64, constants: &ConstantsOfMotion) -> f64 {
        let observer = 1.0 / constants.energy;
        let shift = self.gravitational_shift(r)
            * self.doppler_shift(r, constants.impact_parameter())
            * observer;

        if shift.is_finite() {
            shift.max(0.0).min(self.config.max_shift)
        } else {
            0.0
        }
    }

    /// Azimuthal brightness modulation carried around at the local orbital speed.
    pub fn pattern(&self, r: f64, phi: f64, time: f64) -> f64 {
        let omega = self.metric.keplerian_angular_velocity(r);
        let arms = self.config.pattern_arms as f64;
        (1.0 + self.config.pattern_amplitude * (arms * (phi - omega * time)).cos()).max(0.0)
    }

    /// Radiance emitted towards the camera at one crossing.
    pub fn shade(&self, crossing: &DiskCrossing, time: f64) -> [f64; 3] {
        let r = crossing.radius;
        let shift = self.redshift(r, &crossing.constants);

        let color = self.palette.color(self.temperature(r) * shift);
        let intensity = self.emissivity(r)
            * self.pattern(r, crossing.phi, time)
            * shift.powf(self.config.shift_exponent);

        [color[0] * intensity, color[1] * intensity, color[2] * intensity]
    }

    pub fn transmittance(&self) -> f64 {
        self.config.transmittance
    }
}

impl<'a> CollisionObject for DiskModel<'a> {
    fn detect_collision(&self, old: &GeodesicState, new: &GeodesicState) -> Option<Collision> {
        let c0 = old.theta().cos();
        let c1 = new.theta().cos();

        let crossed = c0 * c1 < 0.0 || (c1 == 0.0 && c0 != 0.0);
        if !crossed {
            return None;
        }

        let f = c0 / (c0 - c1);
        let radius = old.r() + f * (new.r() - old.r());
        if !self.contains(radius) {
            return None;
        }

        Some(Collision::Disk(DiskCrossing {
            radius,
            phi: old.phi() + f * (new.phi() - old.phi()),
            constants: new.constants,
        }))
    }
}
