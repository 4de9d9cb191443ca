
////////////////////////////////////////////////////////////////////
// Kerr spacetime in Boyer-Lindquist coordinates (t, r, theta, phi)
// geometric units, M = 1
////////////////////////////////////////////////////////////////////

use crate::geodesic::ConstantsOfMotion;

// keeps 1/sin^2(theta) finite on the spin axis
const MIN_SIN2: f64 = 1e-12;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct KerrMetric {
    pub a: f64,
}

pub fn new_kerr_metric(a: f64) -> KerrMetric {
    KerrMetric { a }
}

/// Non-zero covariant components of the Kerr metric at one point.
#[derive(Debug, Clone, Copy)]
pub struct MetricComponents {
    pub g_tt: f64,
    pub g_tphi: f64,
    pub g_rr: f64,
    pub g_thth: f64,
    pub g_phiphi: f64,
}

/// Locally non-rotating (ZAMO) frame at one point.
///
/// The orthonormal legs are
/// `e_t = (d_t + omega d_phi) / lapse`, `e_r = sqrt(delta/sigma) d_r`,
/// `e_theta = d_theta / sqrt(sigma)` and `e_phi = sqrt(sigma/A) / sin(theta) d_phi`.
#[derive(Debug, Clone, Copy)]
pub struct ZamoFrame {
    pub lapse: f64,
    pub omega: f64,
    pub e_r: f64,
    pub e_theta: f64,
    pub e_phi: f64,
}

impl KerrMetric {
    pub fn sigma(&self, r: f64, theta: f64) -> f64 {
        r.powi(2) + (self.a * theta.cos()).powi(2)
    }

    pub fn delta(&self, r: f64) -> f64 {
        r.powi(2) - 2.0 * r + self.a.powi(2)
    }

    // (r^2 + a^2)^2 - a^2 delta sin^2(theta)
    pub fn big_a(&self, r: f64, theta: f64) -> f64 {
        (r.powi(2) + self.a.powi(2)).powi(2) - (self.a * theta.sin()).powi(2) * self.delta(r)
    }

    /// Outer event horizon `1 + sqrt(1 - a^2)`.
    pub fn horizon_radius(&self) -> f64 {
        1.0 + (1.0 - self.a.powi(2)).max(0.0).sqrt()
    }

    /// Innermost stable circular orbit for prograde equatorial motion.
    pub fn isco_radius(&self) -> f64 {
        let a = self.a;
        let z1 = 1.0
            + (1.0 - a * a).max(0.0).cbrt() * ((1.0 + a).cbrt() + (1.0 - a).max(0.0).cbrt());
        let z2 = (3.0 * a * a + z1 * z1).sqrt();
        3.0 + z2 - ((3.0 - z1) * (3.0 + z1 + 2.0 * z2)).max(0.0).sqrt()
    }

    /// Radius of the prograde circular photon orbit in the equatorial plane.
    pub fn prograde_photon_orbit(&self) -> f64 {
        2.0 * (1.0 + ((2.0 / 3.0) * (-self.a).acos()).cos())
    }

    pub fn g_lower(&self, r: f64, theta: f64) -> MetricComponents {
        let sigma = self.sigma(r, theta);
        let sin2 = theta.sin().powi(2);

        MetricComponents {
            g_tt: -(1.0 - 2.0 * r / sigma),
            g_tphi: -2.0 * self.a * r * sin2 / sigma,
            g_rr: sigma / self.delta(r),
            g_thth: sigma,
            g_phiphi: self.big_a(r, theta) * sin2 / sigma,
        }
    }

    pub fn zamo(&self, r: f64, theta: f64) -> ZamoFrame {
        let sigma = self.sigma(r, theta);
        let delta = self.delta(r);
        let big_a = self.big_a(r, theta);
        let sin_theta = theta.sin().abs().max(MIN_SIN2.sqrt());

        ZamoFrame {
            lapse: (sigma * delta / big_a).sqrt(),
            omega: 2.0 * self.a * r / big_a,
            e_r: (delta / sigma).sqrt(),
            e_theta: 1.0 / sigma.sqrt(),
            e_phi: (sigma / big_a).sqrt() / sin_theta,
        }
    }

    // P = E (r^2 + a^2) - a L
    fn p_term(&self, r: f64, c: &ConstantsOfMotion) -> f64 {
        c.energy * (r.powi(2) + self.a.powi(2)) - self.a * c.angular_momentum
    }

    /// Radial potential `R(r)`; `sigma dr/dlambda = +-sqrt(R)`.
    pub fn radial_potential(&self, r: f64, c: &ConstantsOfMotion) -> f64 {
        let p = self.p_term(r, c);
        p.powi(2)
            - self.delta(r)
                * ((c.angular_momentum - self.a * c.energy).powi(2) + c.carter)
    }

    /// Polar potential `Theta(theta)`; `sigma dtheta/dlambda = +-sqrt(Theta)`.
    pub fn polar_potential(&self, theta: f64, c: &ConstantsOfMotion) -> f64 {
        let cos2 = theta.cos().powi(2);
        let sin2 = theta.sin().powi(2).max(MIN_SIN2);
        c.carter - cos2 * (c.angular_momentum.powi(2) / sin2 - (self.a * c.energy).powi(2))
    }

    pub fn radial_potential_slope(&self, r: f64, c: &ConstantsOfMotion) -> f64 {
        let k = (c.angular_momentum - self.a * c.energy).powi(2) + c.carter;
        4.0 * c.energy * r * self.p_term(r, c) - (2.0 * r - 2.0) * k
    }

    pub fn polar_potential_slope(&self, theta: f64, c: &ConstantsOfMotion) -> f64 {
        let (sin, cos) = theta.sin_cos();
        let sin3 = sin.abs().max(MIN_SIN2.sqrt()).powi(3);
        2.0 * c.angular_momentum.powi(2) * cos / sin3
            - 2.0 * (self.a * c.energy).powi(2) * cos * sin
    }

    /// `sigma dt/dlambda` and `sigma dphi/dlambda` for a geodesic with constants `c`.
    pub fn azimuthal_rates(&self, r: f64, theta: f64, c: &ConstantsOfMotion) -> [f64; 2] {
        let sin2 = theta.sin().powi(2).max(MIN_SIN2);
        let p = self.p_term(r, c);
        let delta = self.delta(r);

        let t_rate = -self.a * (self.a * c.energy * sin2 - c.angular_momentum)
            + (r.powi(2) + self.a.powi(2)) * p / delta;
        let phi_rate = -(self.a * c.energy - c.angular_momentum / sin2) + self.a * p / delta;

        [t_rate, phi_rate]
    }

    /// Angular velocity `dphi/dt` of a prograde circular equatorial orbit.
    pub fn keplerian_angular_velocity(&self, r: f64) -> f64 {
        1.0 / (r.powf(1.5) + self.a)
    }

    /// `u^t` of a prograde circular equatorial orbit, `None` inside the photon orbit.
    pub fn circular_orbit_ut(&self, r: f64) -> Option<f64> {
        let radicand = r.powf(1.5) - 3.0 * r.sqrt() + 2.0 * self.a;
        if radicand <= 0.0 {
            return None;
        }
        Some((r.powf(1.5) + self.a) / (r.powf(0.75) * radicand.sqrt()))
    }
}

// Boyer-Lindquist to the Cartesian frame the Kerr-Schild form is written in
pub fn kerr_to_cart(coor: &[f64; 3], a: f64) -> [f64; 3] {
    let [r, theta, phi] = *coor;
    let a_r = (r.powi(2) + a.powi(2)).sqrt();

    [
        a_r * theta.sin() * phi.cos(),
        a_r * theta.sin() * phi.sin(),
        r * theta.cos(),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn schwarzschild_limits() {
        let metric = new_kerr_metric(0.0);
        assert_relative_eq!(metric.horizon_radius(), 2.0);
        assert_relative_eq!(metric.isco_radius(), 6.0, epsilon = 1e-12);
        assert_relative_eq!(metric.prograde_photon_orbit(), 3.0, epsilon = 1e-12);
    }

    #[test]
    fn near_extremal_radii_shrink_towards_one() {
        let metric = new_kerr_metric(0.998);
        assert!(metric.horizon_radius() < 1.1);
        assert_relative_eq!(metric.isco_radius(), 1.237, epsilon = 1e-3);
        assert!(metric.prograde_photon_orbit() < metric.isco_radius());
        assert!(metric.horizon_radius() < metric.prograde_photon_orbit());
    }

    #[test]
    fn zamo_frame_is_orthonormal() {
        let metric = new_kerr_metric(0.9);
        let (r, theta) = (7.5, 1.1);
        let g = metric.g_lower(r, theta);
        let z = metric.zamo(r, theta);

        // e_t . e_t = -1
        let ut = 1.0 / z.lapse;
        let uphi = z.omega / z.lapse;
        let norm_t = g.g_tt * ut * ut + 2.0 * g.g_tphi * ut * uphi + g.g_phiphi * uphi * uphi;
        assert_relative_eq!(norm_t, -1.0, epsilon = 1e-10);

        // e_t . e_phi = 0 and e_phi . e_phi = 1
        let dot = g.g_tphi * ut * z.e_phi + g.g_phiphi * uphi * z.e_phi;
        assert_relative_eq!(dot, 0.0, epsilon = 1e-10);
        assert_relative_eq!(g.g_phiphi * z.e_phi * z.e_phi, 1.0, epsilon = 1e-10);
        assert_relative_eq!(g.g_rr * z.e_r * z.e_r, 1.0, epsilon = 1e-10);
        assert_relative_eq!(g.g_thth * z.e_theta * z.e_theta, 1.0, epsilon = 1e-10);
    }

    #[test]
    fn circular_orbits_exist_down_to_isco() {
        for &a in &[0.0, 0.5, 0.9, 0.998] {
            let metric = new_kerr_metric(a);
            let ut = metric.circular_orbit_ut(metric.isco_radius());
            assert!(ut.map_or(false, |ut| ut.is_finite() && ut > 1.0));
        }
        assert!(new_kerr_metric(0.0).circular_orbit_ut(2.9).is_none());
    }

    #[test]
    fn cartesian_conversion_reduces_to_spherical() {
        let p = kerr_to_cart(&[2.0, std::f64::consts::FRAC_PI_2, 0.0], 0.0);
        assert_relative_eq!(p[0], 2.0);
        assert_relative_eq!(p[1], 0.0);
        assert_relative_eq!(p[2], 0.0, epsilon = 1e-12);
    }
}
