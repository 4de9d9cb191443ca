////////////////////////////////////////////////////////////////////
// null geodesics in Kerr spacetime, integrated backwards from the
// observer with an embedded Runge-Kutta-Fehlberg 4(5) pair
////////////////////////////////////////////////////////////////////

use std::f64::consts::PI;

use crate::config::IntegratorConfig;
use crate::curved_space::{kerr_to_cart, KerrMetric};

const BUTCHER_TABLEAU: [[f64; 5]; 5] = [
    [1.0 / 4.0, 0.0, 0.0, 0.0, 0.0],
    [3.0 / 32.0, 9.0 / 32.0, 0.0, 0.0, 0.0],
    [1932.0 / 2197.0, -7200.0 / 2197.0, 7296.0 / 2197.0, 0.0, 0.0],
    [439.0 / 216.0, -8.0, 3680.0 / 513.0, -845.0 / 4104.0, 0.0],
    [-8.0 / 27.0, 2.0, -3544.0 / 2565.0, 1859.0 / 4104.0, -11.0 / 40.0],
];

const B_COEFF: [f64; 6] = [
    16.0 / 135.0,
    0.0,
    6656.0 / 12825.0,
    28561.0 / 56430.0,
    -9.0 / 50.0,
    2.0 / 55.0,
];

const B_STAR_COEFF: [f64; 6] = [
    25.0 / 216.0,
    0.0,
    1408.0 / 2565.0,
    2197.0 / 4104.0,
    -1.0 / 5.0,
    0.0,
];

// relative slack before a negative potential counts as a turning-point overshoot
const POTENTIAL_SLACK: f64 = 1e-9;
// distance moved past a turning point when leaving it
const RELEASE_PUSH: f64 = 1e-9;

/// Conserved quantities of a photon: energy `E`, axial angular momentum `L`
/// and the Carter constant `Q`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ConstantsOfMotion {
    pub energy: f64,
    pub angular_momentum: f64,
    pub carter: f64,
}

impl ConstantsOfMotion {
    /// `L / E`
    pub fn impact_parameter(&self) -> f64 {
        self.angular_momentum / self.energy
    }
}

/// The effective potential that went negative inside a trial step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Overshoot {
    Radial,
    Polar,
}

/// Per-ray integration state.
///
/// `radial_sign` and `polar_sign` are the signs of `dr/dlambda` and
/// `dtheta/dlambda` of the physical photon, which travels towards the
/// observer. Integration runs in the opposite direction, so `lambda`
/// decreases from zero at the camera.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GeodesicState {
    /// `(t, r, theta, phi)`
    pub coordinates: [f64; 4],
    pub constants: ConstantsOfMotion,
    pub radial_sign: f64,
    pub polar_sign: f64,
    pub lambda: f64,
}

impl GeodesicState {
    pub fn new(
        coordinates: [f64; 4],
        constants: ConstantsOfMotion,
        radial_sign: f64,
        polar_sign: f64,
    ) -> GeodesicState {
        GeodesicState {
            coordinates,
            constants,
            radial_sign,
            polar_sign,
            lambda: 0.0,
        }
    }

    pub fn t(&self) -> f64 {
        self.coordinates[0]
    }

    pub fn r(&self) -> f64 {
        self.coordinates[1]
    }

    pub fn theta(&self) -> f64 {
        self.coordinates[2]
    }

    pub fn phi(&self) -> f64 {
        self.coordinates[3]
    }

    pub fn cartesian(&self, a: f64) -> [f64; 3] {
        kerr_to_cart(&[self.r(), self.theta(), self.phi()], a)
    }

    /// Reverse the momentum component whose potential reached zero.
    pub fn flip(&mut self, turning: Overshoot) {
        match turning {
            Overshoot::Radial => self.radial_sign = -self.radial_sign,
            Overshoot::Polar => self.polar_sign = -self.polar_sign,
        }
    }

    /// Reflect a step that ran through the spin axis back into `[0, pi]`.
    pub fn sanitize_coordinates(&mut self) {
        let coor = &mut self.coordinates;

        if coor[2] < 0.0 {
            coor[2] = -coor[2];
            coor[3] -= PI;
            self.polar_sign = -self.polar_sign;
        } else if coor[2] > PI {
            coor[2] = 2.0 * PI - coor[2];
            coor[3] += PI;
            self.polar_sign = -self.polar_sign;
        }
    }
}

/// A completed but not yet accepted step.
#[derive(Debug, Clone, Copy)]
pub struct TrialStep {
    pub state: GeodesicState,
    /// Local error estimate relative to the tolerance; `<= 1` is acceptable.
    pub error: f64,
}

/// What `Integrator::advance` did with one attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepOutcome {
    Accepted,
    Rejected,
    Bisected(Overshoot),
    TurnedAround(Overshoot),
}

#[derive(Debug, Clone, Copy)]
pub struct Integrator {
    metric: KerrMetric,
    pub tolerance: f64,
    pub min_step: f64,
    pub max_step: f64,
}

impl Integrator {
    pub fn new(metric: KerrMetric, settings: &IntegratorConfig) -> Integrator {
        Integrator {
            metric,
            tolerance: settings.tolerance,
            min_step: settings.min_step,
            max_step: settings.max_step.max(settings.min_step),
        }
    }

    pub fn metric(&self) -> &KerrMetric {
        &self.metric
    }

    // R and Theta at a point, clipped at zero unless they are clearly negative
    fn potentials(&self, coor: &[f64; 4], c: &ConstantsOfMotion) -> Result<[f64; 2], Overshoot> {
        let metric = &self.metric;
        let (r, theta) = (coor[1], coor[2]);

        let radial = metric.radial_potential(r, c);
        let p = c.energy * (r.powi(2) + metric.a.powi(2)) - metric.a * c.angular_momentum;
        let radial_scale = p.powi(2)
            + metric.delta(r).abs()
                * ((c.angular_momentum - metric.a * c.energy).powi(2) + c.carter.abs());
        if radial < -POTENTIAL_SLACK * radial_scale.max(1.0) {
            return Err(Overshoot::Radial);
        }

        let polar = metric.polar_potential(theta, c);
        let polar_scale = c.carter.abs() + c.angular_momentum.powi(2) + (metric.a * c.energy).powi(2);
        if polar < -POTENTIAL_SLACK * polar_scale.max(1.0) {
            return Err(Overshoot::Polar);
        }

        Ok([radial.max(0.0), polar.max(0.0)])
    }

    /// Derivative of `(t, r, theta, phi)` with respect to `-lambda`.
    pub fn derivative(
        &self,
        coor: &[f64; 4],
        state: &GeodesicState,
    ) -> Result<[f64; 4], Overshoot> {
        let c = &state.constants;
        let (r, theta) = (coor[1], coor[2]);
        let [radial, polar] = self.potentials(coor, c)?;

        let sigma = self.metric.sigma(r, theta);
        let [t_rate, phi_rate] = self.metric.azimuthal_rates(r, theta, c);

        Ok([
            -t_rate / sigma,
            -state.radial_sign * radial.sqrt() / sigma,
            -state.polar_sign * polar.sqrt() / sigma,
            -phi_rate / sigma,
        ])
    }

    /// `|dr/dlambda|` at the current position.
    pub fn radial_speed(&self, state: &GeodesicState) -> f64 {
        let radial = self
            .metric
            .radial_potential(state.r(), &state.constants)
            .max(0.0);
        radial.sqrt() / self.metric.sigma(state.r(), state.theta())
    }

    /// One Fehlberg step of size `h`; fails if any stage or the result
    /// lies beyond a turning point.
    pub fn trial_step(&self, state: &GeodesicState, h: f64) -> Result<TrialStep, Overshoot> {
        let y0 = state.coordinates;
        let mut k_i: [[f64; 4]; 6] = [[0.0; 4]; 6];

        for i in 0..6 {
            let mut arg = y0;
            for j in 0..i {
                let fact = BUTCHER_TABLEAU[i - 1][j];
                for s in 0..4 {
                    arg[s] += fact * k_i[j][s];
                }
            }

            let mut new_k_i = self.derivative(&arg, state)?;
            for s in 0..4 {
                new_k_i[s] *= h;
            }
            k_i[i] = new_k_i;
        }

        let mut next = *state;
        let mut delta = [0.0; 4];
        for j in 0..6 {
            for s in 0..4 {
                next.coordinates[s] += B_COEFF[j] * k_i[j][s];
                delta[s] += (B_COEFF[j] - B_STAR_COEFF[j]) * k_i[j][s];
            }
        }
        next.lambda -= h;

        self.potentials(&next.coordinates, &next.constants)?;

        let err_r = delta[1].abs() / next.r().max(1.0);
        let err_theta = delta[2].abs();
        let err_phi = delta[3].abs() * next.theta().sin().abs();
        let error = err_r.max(err_theta).max(err_phi) / self.tolerance;

        Ok(TrialStep { state: next, error })
    }

    // standard step controller, growth limited to a factor 4 per step
    fn resize(&self, h: f64, error: f64) -> f64 {
        let factor = if error <= 0.0 {
            4.0
        } else {
            (0.9 * error.powf(-0.2)).max(0.2).min(4.0)
        };
        h * factor
    }

    // At a turning point the first-order equations have a fixed point where the
    // potential vanishes. Project back onto the root, step just inside the
    // allowed region and point the momentum into it.
    fn release(&self, state: &mut GeodesicState) -> Option<Overshoot> {
        let metric = &self.metric;
        let c = state.constants;
        let mut flipped = None;

        let radial = metric.radial_potential(state.r(), &c);
        let slope = metric.radial_potential_slope(state.r(), &c);
        if radial <= 0.0 && slope.abs() > POTENTIAL_SLACK {
            let side = slope.signum();
            state.coordinates[1] += side * (radial.abs() / slope.abs() + RELEASE_PUSH * state.r().max(1.0));
            if state.radial_sign != -side {
                state.radial_sign = -side;
                flipped = Some(Overshoot::Radial);
            }
        }

        let polar = metric.polar_potential(state.theta(), &c);
        let slope = metric.polar_potential_slope(state.theta(), &c);
        let polar_scale = c.carter.abs() + c.angular_momentum.powi(2) + (metric.a * c.energy).powi(2);
        if polar <= 0.0 && slope.abs() > POTENTIAL_SLACK * polar_scale.max(1.0) {
            let side = slope.signum();
            state.coordinates[2] += side * (polar.abs() / slope.abs() + RELEASE_PUSH);
            if state.polar_sign != -side {
                state.polar_sign = -side;
                flipped = flipped.or(Some(Overshoot::Polar));
            }
        }

        flipped
    }

    /// Attempt one step of at most `min(step, limit)` and update `step` for
    /// the next attempt.
    ///
    /// A trial that runs past a turning point is retried at half the size;
    /// once the step cannot shrink any further the corresponding momentum
    /// sign is reversed instead. Steps at the minimum size are always
    /// accepted.
    pub fn advance(&self, state: &mut GeodesicState, step: &mut f64, limit: f64) -> StepOutcome {
        if let Some(turning) = self.release(state) {
            *step = self.min_step;
            return StepOutcome::TurnedAround(turning);
        }

        let h = step.min(limit).min(self.max_step).max(self.min_step);

        match self.trial_step(state, h) {
            Err(turning) if h > self.min_step => {
                *step = (0.5 * h).max(self.min_step);
                StepOutcome::Bisected(turning)
            }
            Err(turning) => {
                state.flip(turning);
                StepOutcome::TurnedAround(turning)
            }
            Ok(trial) if trial.error > 1.0 && h > self.min_step => {
                *step = self.resize(h, trial.error).max(self.min_step);
                StepOutcome::Rejected
            }
            Ok(trial) => {
                *state = trial.state;
                state.sanitize_coordinates();
                *step = self
                    .resize(h, trial.error)
                    .max(self.min_step)
                    .min(self.max_step);
                StepOutcome::Accepted
            }
        }
    }
}
