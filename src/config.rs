//! Static configuration with defaults for every tunable and RON persistence.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::params::SimulationParameters;

/// Top-level configuration, loaded once at startup.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Config {
    /// `error`, `warn`, `info`, `debug` or `trace`.
    pub log_level: String,
    /// Also write log lines to this file.
    pub log_file: Option<String>,
    pub render: RenderConfig,
    /// Initial simulation parameters, also the target of `reset`.
    pub defaults: SimulationParameters,
    pub integrator: IntegratorConfig,
    pub disk: DiskConfig,
    pub sky: SkyConfig,
    pub post: PostConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_file: None,
            render: RenderConfig::default(),
            defaults: SimulationParameters::default(),
            integrator: IntegratorConfig::default(),
            disk: DiskConfig::default(),
            sky: SkyConfig::default(),
            post: PostConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct RenderConfig {
    pub width: u32,
    pub height: u32,
    /// Vertical field of view in degrees.
    pub fov: f64,
    /// Show a progress bar while tracing. Off for library use; the command
    /// line turns it on unless `--no-progress` is given.
    pub progress: bool,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            width: 640,
            height: 360,
            fov: 60.0,
            progress: false,
        }
    }
}

/// Adaptive step control for the geodesic integrator.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct IntegratorConfig {
    pub tolerance: f64,
    pub initial_step: f64,
    pub min_step: f64,
    pub max_step: f64,
    /// Largest fraction of the distance to the horizon covered by one step.
    pub horizon_step_fraction: f64,
    /// Rays closer than this to the horizon are captured.
    pub horizon_margin: f64,
    /// Escape radius is `max(escape_radius, escape_distance_factor * camera_distance)`.
    pub escape_radius: f64,
    pub escape_distance_factor: f64,
    /// Hard cap on step attempts per ray.
    pub step_budget: u32,
}

impl Default for IntegratorConfig {
    fn default() -> Self {
        Self {
            tolerance: 1e-6,
            initial_step: 1.0,
            min_step: 1e-4,
            max_step: 4.0,
            horizon_step_fraction: 0.25,
            horizon_margin: 0.02,
            escape_radius: 100.0,
            escape_distance_factor: 2.0,
            step_budget: 3000,
        }
    }
}

/// Thin equatorial disk and its emission profile.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct DiskConfig {
    /// Inner edge as a multiple of the prograde ISCO radius.
    pub inner_isco_multiple: f64,
    /// Outer edge as a multiple of the inner edge.
    pub outer_inner_multiple: f64,
    /// Temperature at the inner edge in Kelvin.
    pub inner_temperature: f64,
    /// `T = inner_temperature * (r_in / r)^temperature_index`.
    pub temperature_index: f64,
    /// `I = brightness * (r_in / r)^emissivity_index`.
    pub emissivity_index: f64,
    pub brightness: f64,
    /// Observed intensity scales with `shift^shift_exponent`.
    pub shift_exponent: f64,
    pub max_shift: f64,
    /// Fraction of light that continues through the disk after a crossing.
    pub transmittance: f64,
    pub pattern_amplitude: f64,
    pub pattern_arms: u32,
}

impl Default for DiskConfig {
    fn default() -> Self {
        Self {
            inner_isco_multiple: 1.0,
            outer_inner_multiple: 4.0,
            inner_temperature: 12_000.0,
            temperature_index: 0.75,
            emissivity_index: 3.0,
            brightness: 1.0,
            shift_exponent: 3.0,
            max_shift: 3.0,
            transmittance: 0.5,
            pattern_amplitude: 0.15,
            pattern_arms: 2,
        }
    }
}

/// Hashed starfield over a dim background.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct SkyConfig {
    pub background: [f64; 3],
    /// Fraction of sky cells holding a star.
    pub star_density: f64,
    pub star_brightness: f64,
    /// Number of cells along the polar direction.
    pub resolution: u32,
}

impl Default for SkyConfig {
    fn default() -> Self {
        Self {
            background: [0.005, 0.005, 0.008],
            star_density: 0.004,
            star_brightness: 1.0,
            resolution: 400,
        }
    }
}

/// Bright-pass blur composite.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct PostConfig {
    /// Luminance above which pixels feed the bloom.
    pub bloom_threshold: f32,
    /// Gaussian radius in pixels.
    pub bloom_radius: u32,
    pub gamma: f32,
}

impl Default for PostConfig {
    fn default() -> Self {
        Self {
            bloom_threshold: 0.8,
            bloom_radius: 8,
            gamma: 2.2,
        }
    }
}

impl Config {
    /// Read a config file; a missing or malformed file is an error.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path).map_err(ConfigError::ReadError)?;
        let config: Config = ron::from_str(&contents).map_err(ConfigError::ParseError)?;
        config.validate()?;
        log::info!("Loaded config from {}", path.display());
        Ok(config)
    }

    /// Load `path` if given, otherwise fall back to defaults.
    pub fn load_or_default(path: Option<&Path>) -> Result<Self, ConfigError> {
        match path {
            Some(path) => Self::load(path),
            None => {
                log::debug!("No config file given, using defaults");
                Ok(Self::default())
            }
        }
    }

    /// Reject values the tracer cannot work with. NaN fails every check.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let r = &self.render;
        let i = &self.integrator;
        check("render.width", r.width, r.width > 0, "must be positive")?;
        check("render.height", r.height, r.height > 0, "must be positive")?;
        check("render.fov", r.fov, r.fov > 0.0 && r.fov < 180.0, "must lie in (0, 180) degrees")?;
        check("integrator.tolerance", i.tolerance, i.tolerance > 0.0, "must be positive")?;
        check("integrator.initial_step", i.initial_step, i.initial_step > 0.0, "must be positive")?;
        check("integrator.min_step", i.min_step, i.min_step > 0.0, "must be positive")?;
        check("integrator.max_step", i.max_step, i.max_step >= i.min_step, "must be at least min_step")?;
        check(
            "integrator.horizon_step_fraction",
            i.horizon_step_fraction,
            i.horizon_step_fraction > 0.0 && i.horizon_step_fraction <= 1.0,
            "must lie in (0, 1]",
        )?;
        check("integrator.escape_radius", i.escape_radius, i.escape_radius > 0.0, "must be positive")?;
        check("integrator.step_budget", i.step_budget, i.step_budget > 0, "must be positive")?;
        let t = self.disk.transmittance;
        check("disk.transmittance", t, (0.0..=1.0).contains(&t), "must lie in [0, 1]")?;
        Ok(())
    }

    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        if let Some(dir) = path.parent().filter(|dir| !dir.as_os_str().is_empty()) {
            std::fs::create_dir_all(dir).map_err(ConfigError::WriteError)?;
        }

        let pretty = ron::ser::PrettyConfig::new()
            .depth_limit(3)
            .separate_tuple_members(true)
            .enumerate_arrays(false);

        let serialized =
            ron::ser::to_string_pretty(self, pretty).map_err(ConfigError::SerializeError)?;

        std::fs::write(path, serialized).map_err(ConfigError::WriteError)?;
        log::info!("Wrote config to {}", path.display());
        Ok(())
    }
}

fn check<T: ToString>(field: &'static str, value: T, ok: bool, reason: &'static str) -> Result<(), ConfigError> {
    if ok {
        Ok(())
    } else {
        Err(ConfigError::InvalidValue {
            field,
            value: value.to_string(),
            reason,
        })
    }
}
