////////////////////////////////////////////////////////////////////
// pinhole camera carried by a locally non-rotating observer
////////////////////////////////////////////////////////////////////

use crate::curved_space::KerrMetric;
use crate::geodesic::{ConstantsOfMotion, GeodesicState};
use crate::output::Resolution;
use crate::params::SimulationParameters;

// below this |L| the ray is taken to pass over the pole
const AXIAL_EPSILON: f64 = 1e-12;

/// Observer at `(distance, inclination, phi = 0)` looking at the hole.
///
/// In the observer's frame the view axis is `-e_r`, image up is `-e_theta`
/// (towards the spin axis) and image right is `e_phi`.
#[derive(Debug, Clone, Copy)]
pub struct Camera {
    pub distance: f64,
    /// Polar angle in radians.
    pub inclination: f64,
    pub x_res: u32,
    pub y_res: u32,
    tan_half_fov: f64,
}

impl Camera {
    pub fn new(params: &SimulationParameters, resolution: Resolution, fov_degrees: f64) -> Camera {
        Camera {
            distance: params.camera_distance,
            inclination: params.inclination_radians(),
            x_res: resolution.width.max(1),
            y_res: resolution.height.max(1),
            tan_half_fov: (0.5 * fov_degrees.to_radians()).tan(),
        }
    }

    /// Pixel center in normalized device coordinates, both in `(-1, 1)`.
    ///
    /// Mirrored pixels map to exactly negated `u`.
    pub fn screen_coordinates(&self, x: u32, y: u32) -> [f64; 2] {
        let (w, h) = (self.x_res as f64, self.y_res as f64);
        let u = (2.0 * x as f64 + 1.0 - w) / w;
        let v = (h - 2.0 * y as f64 - 1.0) / h;
        [u, v]
    }

    /// Unit view direction as `(right, up, forward)` components.
    pub fn view_direction(&self, x: u32, y: u32) -> [f64; 3] {
        let [u, v] = self.screen_coordinates(x, y);
        let aspect = self.x_res as f64 / self.y_res as f64;
        let right = u * self.tan_half_fov * aspect;
        let up = v * self.tan_half_fov;
        let norm = (right * right + up * up + 1.0).sqrt();
        [right / norm, up / norm, 1.0 / norm]
    }

    /// Backward-traced photon arriving at the camera through pixel `(x, y)`.
    pub fn initial_state(&self, metric: &KerrMetric, x: u32, y: u32) -> GeodesicState {
        let (r, theta) = (self.distance, self.inclination);
        let [right, up, forward] = self.view_direction(x, y);

        // the photon travels against the view direction
        let k_r = forward;
        let k_theta = up;
        let k_phi = -right;

        let frame = metric.zamo(r, theta);
        let g = metric.g_lower(r, theta);

        let p_t_up = 1.0 / frame.lapse;
        let p_r_up = k_r * frame.e_r;
        let p_theta_up = k_theta * frame.e_theta;
        let p_phi_up = frame.omega / frame.lapse + k_phi * frame.e_phi;

        let p_t = g.g_tt * p_t_up + g.g_tphi * p_phi_up;
        let p_phi = g.g_tphi * p_t_up + g.g_phiphi * p_phi_up;
        let p_theta = g.g_thth * p_theta_up;

        let energy = -p_t;
        let angular_momentum = if p_phi.abs() < AXIAL_EPSILON { 0.0 } else { p_phi };

        let sin2 = theta.sin().powi(2);
        let carter = p_theta.powi(2)
            + theta.cos().powi(2)
                * (angular_momentum.powi(2) / sin2 - (metric.a * energy).powi(2));

        let constants = ConstantsOfMotion {
            energy,
            angular_momentum,
            carter,
        };

        GeodesicState::new(
            [0.0, r, theta, 0.0],
            constants,
            if p_r_up >= 0.0 { 1.0 } else { -1.0 },
            if p_theta_up >= 0.0 { 1.0 } else { -1.0 },
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::curved_space::new_kerr_metric;
    use approx::assert_relative_eq;

    fn camera(spin: f64, width: u32, height: u32) -> Camera {
        let params = SimulationParameters {
            spin,
            ..SimulationParameters::default()
        };
        Camera::new(&params, Resolution { width, height }, 60.0)
    }

    #[test]
    fn center_ray_has_no_axial_momentum() {
        let metric = new_kerr_metric(0.9);
        let state = camera(0.9, 5, 3).initial_state(&metric, 2, 1);
        assert_eq!(state.constants.angular_momentum, 0.0);
        assert_eq!(state.radial_sign, 1.0);
    }

    #[test]
    fn every_pixel_starts_on_allowed_potentials() {
        for &a in &[0.0, 0.5, 0.998] {
            let metric = new_kerr_metric(a);
            let cam = camera(a, 16, 9);
            for y in 0..9 {
                for x in 0..16 {
                    let state = cam.initial_state(&metric, x, y);
                    let c = state.constants;
                    let scale = c.carter.abs() + c.angular_momentum.powi(2) + 1.0;
                    assert!(c.energy > 0.0);
                    assert!(metric.radial_potential(state.r(), &c) >= 0.0);
                    assert!(metric.polar_potential(state.theta(), &c) > -1e-9 * scale);
                }
            }
        }
    }

    #[test]
    fn static_observer_energy_is_the_lapse() {
        let metric = new_kerr_metric(0.0);
        let state = camera(0.0, 16, 9).initial_state(&metric, 3, 7);
        assert_relative_eq!(state.constants.energy, (1.0 - 2.0 / 25.0f64).sqrt(), epsilon = 1e-12);
    }

    #[test]
    fn mirrored_pixels_mirror_angular_momentum_without_spin() {
        let metric = new_kerr_metric(0.0);
        let cam = camera(0.0, 16, 9);
        for x in 0..8 {
            let left = cam.initial_state(&metric, x, 2);
            let right = cam.initial_state(&metric, 15 - x, 2);
            assert_eq!(left.constants.angular_momentum, -right.constants.angular_momentum);
            assert_eq!(left.constants.carter, right.constants.carter);
            assert!(left.constants.angular_momentum > 0.0);
        }
    }

    #[test]
    fn image_up_points_towards_the_spin_axis() {
        let metric = new_kerr_metric(0.5);
        let cam = camera(0.5, 9, 9);
        assert_eq!(cam.initial_state(&metric, 4, 0).polar_sign, 1.0);
        assert_eq!(cam.initial_state(&metric, 4, 8).polar_sign, -1.0);
    }
}
