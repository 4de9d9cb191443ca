use std::time::Instant;

use indicatif::{ParallelProgressIterator, ProgressBar, ProgressStyle};
use rayon::prelude::*;

use crate::black_body::BlackBodyPalette;
use crate::camera::Camera;
use crate::config::{Config, IntegratorConfig};
use crate::curved_space::{new_kerr_metric, KerrMetric};
use crate::disk::{DiskCrossing, DiskModel};
use crate::geodesic::{GeodesicState, Integrator, StepOutcome};
use crate::output::{OutputImage, Resolution};
use crate::params::SimulationParameters;
use crate::post;
use crate::sky::Sky;

/// What a ray ran into during its last accepted step.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Collision {
    Captured,
    Escaped,
    Disk(DiskCrossing),
}

pub trait CollisionObject: Send + Sync {
    fn detect_collision(&self, old: &GeodesicState, new: &GeodesicState) -> Option<Collision>;
}

/// Sphere just outside the event horizon.
#[derive(Debug, Clone, Copy)]
pub struct Horizon {
    pub radius: f64,
}

impl CollisionObject for Horizon {
    fn detect_collision(&self, _: &GeodesicState, new: &GeodesicState) -> Option<Collision> {
        if new.r() <= self.radius {
            Some(Collision::Captured)
        } else {
            None
        }
    }
}

/// Sphere beyond which a ray counts as gone to infinity.
#[derive(Debug, Clone, Copy)]
pub struct CelestialSphere {
    pub radius: f64,
}

impl CollisionObject for CelestialSphere {
    fn detect_collision(&self, _: &GeodesicState, new: &GeodesicState) -> Option<Collision> {
        if new.r() >= self.radius {
            Some(Collision::Escaped)
        } else {
            None
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Termination {
    Captured,
    Escaped,
    /// Absorbed by the disk after the last allowed bounce.
    DiskCrossing,
    /// Step budget ran out; shaded like an escaped ray.
    BudgetExhausted,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RayStatus {
    InFlight,
    Terminated(Termination),
}

/// Everything one frame's rays read. Shared immutably by all rays.
pub struct Scene<'a> {
    pub metric: KerrMetric,
    pub camera: Camera,
    pub integrator: Integrator,
    pub disk: DiskModel<'a>,
    pub sky: Sky<'a>,
    pub horizon: Horizon,
    pub celestial_sphere: CelestialSphere,
    pub time: f64,
    pub max_bounces: u32,
    settings: IntegratorConfig,
}

impl<'a> Scene<'a> {
    pub fn new(
        params: &SimulationParameters,
        resolution: Resolution,
        config: &Config,
        palette: &'a BlackBodyPalette,
    ) -> Scene<'a> {
        let params = params.clamped();
        let metric = new_kerr_metric(params.spin);
        let settings = config.integrator.clone();

        let escape_radius = settings
            .escape_radius
            .max(settings.escape_distance_factor * params.camera_distance);

        let disk = DiskModel::new(metric, &config.disk, palette);
        log::debug!(
            "a = {:.3}: horizon {:.4}, photon orbit {:.4}, disk {:.3}..{:.3}, escape radius {:.1}",
            metric.a,
            metric.horizon_radius(),
            metric.prograde_photon_orbit(),
            disk.inner_radius,
            disk.outer_radius,
            escape_radius
        );

        Scene {
            metric,
            camera: Camera::new(&params, resolution, config.render.fov),
            integrator: Integrator::new(metric, &settings),
            disk,
            sky: Sky::new(&config.sky, palette),
            horizon: Horizon {
                radius: metric.horizon_radius() + settings.horizon_margin,
            },
            celestial_sphere: CelestialSphere {
                radius: escape_radius,
            },
            time: params.time,
            max_bounces: params.max_bounces,
            settings,
        }
    }

    // first match wins
    fn collision_objects(&self) -> [&dyn CollisionObject; 3] {
        [&self.horizon, &self.celestial_sphere, &self.disk]
    }

    pub fn spawn_ray(&self, x: u32, y: u32) -> Ray {
        let state = self.camera.initial_state(&self.metric, x, y);
        Ray::new(state, self.max_bounces, self.settings.initial_step)
    }

    /// Largest step that closes at most a fixed fraction of the remaining
    /// distance to the horizon.
    pub fn step_limit(&self, state: &GeodesicState) -> f64 {
        let speed = self.integrator.radial_speed(state);
        let gap = state.r() - self.metric.horizon_radius();
        if speed <= 1e-12 || gap <= 0.0 {
            return self.settings.max_step;
        }
        self.settings.horizon_step_fraction * gap / speed
    }

    pub fn step_budget(&self) -> u32 {
        self.settings.step_budget
    }

    /// Polar and azimuthal angle of the direction a ray is heading in, as
    /// seen in the asymptotically flat Cartesian frame.
    ///
    /// Falls back to the position angles when the momentum is undefined.
    pub fn escape_direction(&self, state: &GeodesicState) -> [f64; 2] {
        let (r, theta, phi) = (state.r(), state.theta(), state.phi());
        let d = match self.integrator.derivative(&state.coordinates, state) {
            Ok(d) => d,
            Err(_) => return [theta, phi],
        };

        // local radial, polar and azimuthal velocity
        let v_r = d[1];
        let v_theta = r * d[2];
        let v_phi = r * theta.sin() * d[3];

        let (st, ct) = theta.sin_cos();
        let (sp, cp) = phi.sin_cos();
        let x = v_r * st * cp + v_theta * ct * cp - v_phi * sp;
        let y = v_r * st * sp + v_theta * ct * sp + v_phi * cp;
        let z = v_r * ct - v_theta * st;

        if !(x.is_finite() && y.is_finite() && z.is_finite()) || (x == 0.0 && y == 0.0 && z == 0.0) {
            return [theta, phi];
        }
        [(x * x + y * y).sqrt().atan2(z), y.atan2(x)]
    }

    /// Background seen along the direction the ray leaves in.
    pub fn sample_sky(&self, state: &GeodesicState) -> [f64; 3] {
        let [theta, phi] = self.escape_direction(state);
        self.sky.sample(theta, phi)
    }
}

/// One pixel's photon, traced backwards from the camera.
#[derive(Debug, Clone)]
pub struct Ray {
    pub state: GeodesicState,
    pub radiance: [f64; 3],
    /// Fraction of light still carried after passing through the disk.
    pub throughput: f64,
    /// Disk crossings the ray may still pass through; the next one past
    /// zero absorbs it.
    pub bounces_left: u32,
    /// Step attempts so far, accepted or not.
    pub steps: u32,
    pub status: RayStatus,
    step_size: f64,
}

impl Ray {
    pub fn new(state: GeodesicState, max_bounces: u32, initial_step: f64) -> Ray {
        Ray {
            state,
            radiance: [0.0; 3],
            throughput: 1.0,
            bounces_left: max_bounces,
            steps: 0,
            status: RayStatus::InFlight,
            step_size: initial_step,
        }
    }

    pub fn termination(&self) -> Option<Termination> {
        match self.status {
            RayStatus::InFlight => None,
            RayStatus::Terminated(t) => Some(t),
        }
    }

    pub fn trace(&mut self, scene: &Scene) {
        self.trace_with(scene, |_| {});
    }

    /// Integrate until a terminal condition, calling `on_step` after every
    /// accepted step.
    pub fn trace_with<F>(&mut self, scene: &Scene, mut on_step: F)
    where
        F: FnMut(&GeodesicState),
    {
        while self.status == RayStatus::InFlight {
            if self.steps >= scene.step_budget() || !self.state.r().is_finite() {
                self.add(scene.sample_sky(&self.state));
                self.status = RayStatus::Terminated(Termination::BudgetExhausted);
                break;
            }
            self.steps += 1;

            let previous = self.state;
            let limit = scene.step_limit(&self.state);
            if scene.integrator.advance(&mut self.state, &mut self.step_size, limit) != StepOutcome::Accepted {
                continue;
            }
            on_step(&self.state);

            let hit = scene
                .collision_objects()
                .iter()
                .find_map(|object| object.detect_collision(&previous, &self.state));
            if let Some(collision) = hit {
                self.handle(scene, collision);
            }
        }
    }

    fn handle(&mut self, scene: &Scene, collision: Collision) {
        match collision {
            Collision::Captured => {
                self.status = RayStatus::Terminated(Termination::Captured);
            }
            Collision::Escaped => {
                self.add(scene.sample_sky(&self.state));
                self.status = RayStatus::Terminated(Termination::Escaped);
            }
            Collision::Disk(crossing) => {
                self.add(scene.disk.shade(&crossing, scene.time));
                if self.bounces_left > 0 {
                    self.bounces_left -= 1;
                    self.throughput *= scene.disk.transmittance();
                } else {
                    self.status = RayStatus::Terminated(Termination::DiskCrossing);
                }
            }
        }
    }

    fn add(&mut self, emission: [f64; 3]) {
        for c in 0..3 {
            let value = self.throughput * emission[c];
            if value.is_finite() && value > 0.0 {
                self.radiance[c] += value;
            }
        }
    }
}

/// Termination histogram of one frame.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RenderStats {
    pub captured: usize,
    pub escaped: usize,
    pub disk: usize,
    pub budget_exhausted: usize,
    pub total_steps: u64,
}

impl RenderStats {
    fn from_rays(rays: &[Ray]) -> RenderStats {
        let mut stats = RenderStats::default();
        for ray in rays {
            stats.total_steps += ray.steps as u64;
            match ray.termination() {
                Some(Termination::Captured) => stats.captured += 1,
                Some(Termination::Escaped) => stats.escaped += 1,
                Some(Termination::DiskCrossing) => stats.disk += 1,
                Some(Termination::BudgetExhausted) | None => stats.budget_exhausted += 1,
            }
        }
        stats
    }

    pub fn rays(&self) -> usize {
        self.captured + self.escaped + self.disk + self.budget_exhausted
    }

    pub fn mean_steps(&self) -> f64 {
        if self.rays() == 0 {
            return 0.0;
        }
        self.total_steps as f64 / self.rays() as f64
    }
}

/// Traced radiance of one frame, before exposure and bloom.
#[derive(Debug, Clone)]
pub struct RenderOutput {
    pub image: OutputImage,
    /// Row-major terminal state of every pixel's ray.
    pub terminations: Vec<Termination>,
    pub stats: RenderStats,
}

impl RenderOutput {
    pub fn termination_at(&self, x: u32, y: u32) -> Termination {
        self.terminations[(y * self.image.width() + x) as usize]
    }
}

pub struct RayTracer {
    config: Config,
    palette: BlackBodyPalette,
    show_progress: bool,
}

impl RayTracer {
    pub fn new(config: &Config) -> RayTracer {
        RayTracer {
            config: config.clone(),
            palette: BlackBodyPalette::new(),
            show_progress: config.render.progress,
        }
    }

    pub fn with_progress(mut self, show_progress: bool) -> RayTracer {
        self.show_progress = show_progress;
        self
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn scene(&self, params: &SimulationParameters, resolution: Resolution) -> Scene<'_> {
        Scene::new(params, resolution, &self.config, &self.palette)
    }

    fn progress_bar(&self, len: u64) -> ProgressBar {
        if !self.show_progress {
            return ProgressBar::hidden();
        }
        let style = ProgressStyle::with_template("[{elapsed_precise}] {bar:40} {pos}/{len} rays ({eta})")
            .unwrap_or_else(|_| ProgressStyle::default_bar());
        ProgressBar::new(len).with_style(style)
    }

    /// Trace one ray per pixel in parallel and collect their radiance.
    pub fn trace(&self, params: &SimulationParameters, resolution: Resolution) -> RenderOutput {
        let start = Instant::now();
        let scene = self.scene(params, resolution);
        let width = resolution.width;

        let mut rays: Vec<Ray> = (0..resolution.pixel_count())
            .into_par_iter()
            .map(|i| scene.spawn_ray(i as u32 % width, i as u32 / width))
            .collect();

        let bar = self.progress_bar(rays.len() as u64);
        rays.par_iter_mut()
            .progress_with(bar.clone())
            .for_each(|ray| ray.trace(&scene));
        bar.finish_and_clear();

        let stats = RenderStats::from_rays(&rays);
        log::debug!(
            "Traced {}x{} in {:.2?}: {} captured, {} escaped, {} absorbed by the disk, {} out of budget, {:.1} steps per ray",
            resolution.width,
            resolution.height,
            start.elapsed(),
            stats.captured,
            stats.escaped,
            stats.disk,
            stats.budget_exhausted,
            stats.mean_steps()
        );

        let terminations = rays
            .iter()
            .map(|ray| ray.termination().unwrap_or(Termination::BudgetExhausted))
            .collect();
        let image = OutputImage::from_radiance(resolution, rays.iter().map(|ray| ray.radiance));

        RenderOutput {
            image,
            terminations,
            stats,
        }
    }

    /// Full frame: traced radiance with exposure and bloom applied.
    pub fn render(&self, params: &SimulationParameters, resolution: Resolution) -> OutputImage {
        let traced = self.trace(params, resolution);
        post::post_process(&traced.image, &params.clamped(), &self.config.post)
    }
}

/// Render one frame with the default configuration.
pub fn render(params: SimulationParameters, resolution: Resolution) -> OutputImage {
    RayTracer::new(&Config::default()).render(&params, resolution)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scene_config() -> Config {
        let mut config = Config::default();
        config.sky.star_density = 0.0;
        config
    }

    #[test]
    fn every_ray_terminates_within_budget() {
        let config = scene_config();
        let tracer = RayTracer::new(&config);
        let budget = config.integrator.step_budget;

        for &spin in &[0.0, 0.7, 0.998] {
            for &inclination in &[0.1, 45.0, 89.9] {
                for &camera_distance in &[10.0, 50.0] {
                    let params = SimulationParameters {
                        spin,
                        inclination,
                        camera_distance,
                        ..SimulationParameters::default()
                    };
                    let out = tracer.trace(&params, Resolution::new(12, 8));
                    assert_eq!(out.stats.rays(), 96);
                    assert!(out.stats.total_steps <= 96 * budget as u64);
                    assert!(out.image.pixels().iter().all(|p| p.iter().all(|v| v.is_finite())));
                }
            }
        }
    }

    #[test]
    fn central_ray_falls_into_the_hole() {
        let tracer = RayTracer::new(&scene_config());
        let params = SimulationParameters {
            spin: 0.5,
            inclination: 30.0,
            ..SimulationParameters::default()
        };
        let scene = tracer.scene(&params, Resolution::new(3, 3));
        let mut ray = scene.spawn_ray(1, 1);
        ray.trace(&scene);

        assert_eq!(ray.termination(), Some(Termination::Captured));
        assert_eq!(ray.radiance, [0.0; 3]);
    }

    #[test]
    fn corner_ray_escapes_to_the_sky() {
        let mut config = scene_config();
        config.sky.background = [0.1, 0.2, 0.3];
        let tracer = RayTracer::new(&config);
        let scene = tracer.scene(&SimulationParameters::default(), Resolution::new(64, 36));

        let mut ray = scene.spawn_ray(0, 0);
        ray.trace(&scene);
        assert_eq!(ray.termination(), Some(Termination::Escaped));
        assert_eq!(ray.radiance, [0.1, 0.2, 0.3]);
    }

    #[test]
    fn single_bounce_passes_through_the_disk_once() {
        let tracer = RayTracer::new(&scene_config());
        let params = SimulationParameters {
            max_bounces: 1,
            inclination: 60.0,
            ..SimulationParameters::default()
        };
        let scene = tracer.scene(&params, Resolution::new(64, 36));

        // just below the shadow, looking at the near side of the disk
        let mut ray = scene.spawn_ray(32, 24);
        ray.trace(&scene);
        assert_eq!(ray.bounces_left, 0);
        assert_eq!(ray.throughput, 0.5);
        assert!(ray.radiance.iter().sum::<f64>() > 0.0);
    }

    #[test]
    fn disk_absorbs_the_crossing_after_the_last_bounce() {
        let tracer = RayTracer::new(&scene_config());
        let params = SimulationParameters {
            max_bounces: 1,
            ..SimulationParameters::default()
        };
        let scene = tracer.scene(&params, Resolution::new(8, 8));
        let crossing = DiskCrossing {
            radius: 2.0 * scene.disk.inner_radius,
            phi: 0.3,
            constants: scene.spawn_ray(0, 0).state.constants,
        };
        let shade = scene.disk.shade(&crossing, scene.time);
        assert!(shade.iter().sum::<f64>() > 0.0);

        let mut ray = scene.spawn_ray(0, 0);
        ray.handle(&scene, Collision::Disk(crossing));
        assert_eq!(ray.status, RayStatus::InFlight);
        assert_eq!(ray.bounces_left, 0);

        ray.handle(&scene, Collision::Disk(crossing));
        assert_eq!(ray.termination(), Some(Termination::DiskCrossing));
        for c in 0..3 {
            assert!((ray.radiance[c] - 1.5 * shade[c]).abs() <= 1e-12 * (1.0 + shade[c]));
        }
    }

    #[test]
    fn sky_direction_does_not_depend_on_the_cutoff_radius() {
        let direction = |escape_radius: f64| {
            let mut config = scene_config();
            config.integrator.escape_radius = escape_radius;
            config.integrator.max_step = 50.0;
            config.integrator.step_budget = 20_000;
            let tracer = RayTracer::new(&config);
            let params = SimulationParameters {
                spin: 0.0,
                camera_distance: 50.0,
                ..SimulationParameters::default()
            };
            let scene = tracer.scene(&params, Resolution::new(64, 36));
            let mut ray = scene.spawn_ray(0, 18);
            ray.trace(&scene);
            assert_eq!(ray.termination(), Some(Termination::Escaped));

            let [theta, phi] = scene.escape_direction(&ray.state);
            [theta.sin() * phi.cos(), theta.sin() * phi.sin(), theta.cos()]
        };

        let near = direction(100.0);
        let far = direction(1e4);
        let dot: f64 = (0..3).map(|i| near[i] * far[i]).sum();
        assert!(dot.min(1.0).acos() < 0.01, "directions differ by {} rad", dot.min(1.0).acos());
    }

    #[test]
    fn radial_ray_leaves_along_its_position() {
        let tracer = RayTracer::new(&scene_config());
        let scene = tracer.scene(&SimulationParameters::default(), Resolution::new(3, 3));
        let mut state = scene.spawn_ray(1, 1).state;
        // outgoing and purely radial: L = 0, on the polar turning point
        state.radial_sign = -1.0;
        state.constants.angular_momentum = 0.0;
        state.constants.carter = -(scene.metric.a * state.constants.energy * state.theta().cos()).powi(2);
        state.coordinates[1] = 80.0;

        let [theta, phi] = scene.escape_direction(&state);
        assert!((theta - state.theta()).abs() < 1e-6);
        assert!((phi - state.phi()).abs() < 1e-2);
    }

    #[test]
    fn tiny_budget_degrades_to_escape() {
        let mut config = scene_config();
        config.integrator.step_budget = 3;
        config.sky.background = [0.5, 0.5, 0.5];
        let tracer = RayTracer::new(&config);
        let out = tracer.trace(&SimulationParameters::default(), Resolution::new(4, 4));

        assert_eq!(out.stats.budget_exhausted, 16);
        assert!(out
            .image
            .pixels()
            .iter()
            .all(|p| p[0] == 0.5 && p[1] == 0.5 && p[2] == 0.5));
    }

    #[test]
    fn step_limit_shrinks_near_the_horizon() {
        let tracer = RayTracer::new(&scene_config());
        let scene = tracer.scene(&SimulationParameters::default(), Resolution::new(3, 3));
        let mut near = scene.spawn_ray(1, 1).state;
        let far = near;
        near.coordinates[1] = scene.metric.horizon_radius() + 0.1;

        assert!(scene.step_limit(&near) < 0.1);
        assert!(scene.step_limit(&near) < scene.step_limit(&far));
    }
}
