//! Simulation parameters, the commands that adjust them, and the store that
//! applies those commands between frames.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::CommandParseError;

pub const SPIN_RANGE: (f64, f64) = (0.0, 0.998);
pub const SPIN_STEP: f64 = 0.05;
pub const INCLINATION_RANGE: (f64, f64) = (0.1, 89.9);
pub const INCLINATION_STEP: f64 = 2.0;
pub const DISTANCE_RANGE: (f64, f64) = (10.0, 50.0);
pub const DISTANCE_STEP: f64 = 1.0;
pub const EXPOSURE_RANGE: (f64, f64) = (0.01, 100.0);
pub const EXPOSURE_FACTOR: f64 = 1.1;
pub const BOUNCES_RANGE: (u32, u32) = (1, 5);
pub const BLOOM_RANGE: (f64, f64) = (0.0, 2.0);
pub const BLOOM_STEP: f64 = 0.1;

fn clamp(value: f64, range: (f64, f64)) -> f64 {
    if value.is_nan() {
        return range.0;
    }
    value.max(range.0).min(range.1)
}

/// Everything one frame of the tracer depends on.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulationParameters {
    /// Dimensionless Kerr spin `a`.
    pub spin: f64,
    /// Observer polar angle in degrees.
    pub inclination: f64,
    /// Boyer-Lindquist radius of the observer.
    pub camera_distance: f64,
    pub exposure: f64,
    pub max_bounces: u32,
    pub bloom_strength: f64,
    pub bloom_enabled: bool,
    /// Simulation clock, drives the disk pattern.
    pub time: f64,
}

impl Default for SimulationParameters {
    fn default() -> Self {
        Self {
            spin: 0.9,
            inclination: 85.0,
            camera_distance: 25.0,
            exposure: 1.2,
            max_bounces: 3,
            bloom_strength: 0.5,
            bloom_enabled: true,
            time: 0.0,
        }
    }
}

impl SimulationParameters {
    /// Copy with every field pulled into its valid range.
    pub fn clamped(mut self) -> Self {
        self.spin = clamp(self.spin, SPIN_RANGE);
        self.inclination = clamp(self.inclination, INCLINATION_RANGE);
        self.camera_distance = clamp(self.camera_distance, DISTANCE_RANGE);
        self.exposure = clamp(self.exposure, EXPOSURE_RANGE);
        self.max_bounces = self.max_bounces.max(BOUNCES_RANGE.0).min(BOUNCES_RANGE.1);
        self.bloom_strength = clamp(self.bloom_strength, BLOOM_RANGE);
        self.time = if self.time.is_finite() { self.time.max(0.0) } else { 0.0 };
        self
    }

    pub fn inclination_radians(&self) -> f64 {
        self.inclination.to_radians()
    }

    /// Bloom contribution actually applied, zero when bloom is switched off.
    pub fn effective_bloom(&self) -> f64 {
        if self.bloom_enabled {
            self.bloom_strength
        } else {
            0.0
        }
    }
}

/// A discrete adjustment requested by the input side.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Command {
    TogglePause,
    IncreaseSpin,
    DecreaseSpin,
    IncreaseInclination,
    DecreaseInclination,
    IncreaseDistance,
    DecreaseDistance,
    IncreaseExposure,
    DecreaseExposure,
    IncreaseBounces,
    DecreaseBounces,
    IncreaseBloom,
    DecreaseBloom,
    ToggleBloom,
    Reset,
}

impl Command {
    pub const ALL: [Command; 15] = [
        Command::TogglePause,
        Command::IncreaseSpin,
        Command::DecreaseSpin,
        Command::IncreaseInclination,
        Command::DecreaseInclination,
        Command::IncreaseDistance,
        Command::DecreaseDistance,
        Command::IncreaseExposure,
        Command::DecreaseExposure,
        Command::IncreaseBounces,
        Command::DecreaseBounces,
        Command::IncreaseBloom,
        Command::DecreaseBloom,
        Command::ToggleBloom,
        Command::Reset,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Command::TogglePause => "pause",
            Command::IncreaseSpin => "spin+",
            Command::DecreaseSpin => "spin-",
            Command::IncreaseInclination => "inclination+",
            Command::DecreaseInclination => "inclination-",
            Command::IncreaseDistance => "distance+",
            Command::DecreaseDistance => "distance-",
            Command::IncreaseExposure => "exposure+",
            Command::DecreaseExposure => "exposure-",
            Command::IncreaseBounces => "bounces+",
            Command::DecreaseBounces => "bounces-",
            Command::IncreaseBloom => "bloom+",
            Command::DecreaseBloom => "bloom-",
            Command::ToggleBloom => "bloom-toggle",
            Command::Reset => "reset",
        }
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Command {
    type Err = CommandParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_ascii_lowercase();
        Command::ALL
            .iter()
            .copied()
            .find(|command| command.name() == wanted)
            .ok_or_else(|| CommandParseError(s.to_string()))
    }
}

/// Owner of the live parameters. Mutated only between frames.
#[derive(Debug, Clone)]
pub struct ParameterStore {
    current: SimulationParameters,
    defaults: SimulationParameters,
    paused: bool,
}

impl ParameterStore {
    pub fn new(defaults: SimulationParameters) -> ParameterStore {
        let defaults = defaults.clamped();
        ParameterStore {
            current: defaults,
            defaults,
            paused: false,
        }
    }

    /// Snapshot handed to the renderer for one frame.
    pub fn params(&self) -> SimulationParameters {
        self.current
    }

    pub fn is_paused(&self) -> bool {
        self.paused
    }

    pub fn apply(&mut self, command: Command) {
        match command {
            Command::TogglePause => self.toggle_pause(),
            Command::IncreaseSpin => self.increase_spin(),
            Command::DecreaseSpin => self.decrease_spin(),
            Command::IncreaseInclination => self.increase_inclination(),
            Command::DecreaseInclination => self.decrease_inclination(),
            Command::IncreaseDistance => self.increase_distance(),
            Command::DecreaseDistance => self.decrease_distance(),
            Command::IncreaseExposure => self.increase_exposure(),
            Command::DecreaseExposure => self.decrease_exposure(),
            Command::IncreaseBounces => self.increase_bounces(),
            Command::DecreaseBounces => self.decrease_bounces(),
            Command::IncreaseBloom => self.increase_bloom(),
            Command::DecreaseBloom => self.decrease_bloom(),
            Command::ToggleBloom => self.toggle_bloom(),
            Command::Reset => self.reset(),
        }
    }

    pub fn toggle_pause(&mut self) {
        self.paused = !self.paused;
        log::info!("Animation {}", if self.paused { "paused" } else { "resumed" });
    }

    pub fn set_spin(&mut self, spin: f64) {
        self.current.spin = clamp(spin, SPIN_RANGE);
        log::info!("Spin a: {:.3}", self.current.spin);
    }

    pub fn increase_spin(&mut self) {
        self.set_spin(self.current.spin + SPIN_STEP);
    }

    pub fn decrease_spin(&mut self) {
        self.set_spin(self.current.spin - SPIN_STEP);
    }

    pub fn set_inclination(&mut self, degrees: f64) {
        self.current.inclination = clamp(degrees, INCLINATION_RANGE);
        log::info!("Inclination: {:.1} deg", self.current.inclination);
    }

    pub fn increase_inclination(&mut self) {
        self.set_inclination(self.current.inclination + INCLINATION_STEP);
    }

    pub fn decrease_inclination(&mut self) {
        self.set_inclination(self.current.inclination - INCLINATION_STEP);
    }

    pub fn set_distance(&mut self, distance: f64) {
        self.current.camera_distance = clamp(distance, DISTANCE_RANGE);
        log::info!("Distance: {:.1}", self.current.camera_distance);
    }

    pub fn increase_distance(&mut self) {
        self.set_distance(self.current.camera_distance + DISTANCE_STEP);
    }

    pub fn decrease_distance(&mut self) {
        self.set_distance(self.current.camera_distance - DISTANCE_STEP);
    }

    pub fn set_exposure(&mut self, exposure: f64) {
        self.current.exposure = clamp(exposure, EXPOSURE_RANGE);
        log::info!("Exposure: {:.3}", self.current.exposure);
    }

    pub fn increase_exposure(&mut self) {
        self.set_exposure(self.current.exposure * EXPOSURE_FACTOR);
    }

    pub fn decrease_exposure(&mut self) {
        self.set_exposure(self.current.exposure / EXPOSURE_FACTOR);
    }

    pub fn set_max_bounces(&mut self, bounces: u32) {
        self.current.max_bounces = bounces.max(BOUNCES_RANGE.0).min(BOUNCES_RANGE.1);
        log::info!("Max bounces: {}", self.current.max_bounces);
    }

    pub fn increase_bounces(&mut self) {
        self.set_max_bounces(self.current.max_bounces.saturating_add(1));
    }

    pub fn decrease_bounces(&mut self) {
        self.set_max_bounces(self.current.max_bounces.saturating_sub(1));
    }

    pub fn set_bloom_strength(&mut self, strength: f64) {
        self.current.bloom_strength = clamp(strength, BLOOM_RANGE);
        log::info!("Bloom: {:.2}", self.current.bloom_strength);
    }

    pub fn increase_bloom(&mut self) {
        self.set_bloom_strength(self.current.bloom_strength + BLOOM_STEP);
    }

    pub fn decrease_bloom(&mut self) {
        self.set_bloom_strength(self.current.bloom_strength - BLOOM_STEP);
    }

    pub fn set_bloom_enabled(&mut self, enabled: bool) {
        self.current.bloom_enabled = enabled;
        log::info!("Bloom {}", if enabled { "enabled" } else { "disabled" });
    }

    pub fn toggle_bloom(&mut self) {
        self.set_bloom_enabled(!self.current.bloom_enabled);
    }

    pub fn set_time(&mut self, time: f64) {
        self.current.time = if time.is_finite() { time.max(0.0) } else { 0.0 };
    }

    /// Restore the adjustable parameters. The clock, pause state and bloom
    /// switch are left alone.
    pub fn reset(&mut self) {
        let time = self.current.time;
        let bloom_enabled = self.current.bloom_enabled;
        self.current = self.defaults;
        self.current.time = time;
        self.current.bloom_enabled = bloom_enabled;
        log::info!("Parameters reset to defaults");
    }

    /// Move the clock forward by `dt` unless paused.
    pub fn advance_time(&mut self, dt: f64) {
        if !self.paused && dt.is_finite() && dt > 0.0 {
            self.current.time += dt;
        }
    }
}

impl Default for ParameterStore {
    fn default() -> Self {
        ParameterStore::new(SimulationParameters::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn spin_never_leaves_its_range() {
        let mut store = ParameterStore::default();
        for _ in 0..100 {
            store.increase_spin();
        }
        assert_relative_eq!(store.params().spin, 0.998);
        assert!(store.params().spin < 1.0);

        for _ in 0..100 {
            store.decrease_spin();
        }
        assert_eq!(store.params().spin, 0.0);
    }

    #[test]
    fn every_command_keeps_parameters_clamped() {
        let mut store = ParameterStore::default();
        for round in 0..60 {
            for command in Command::ALL.iter() {
                if round % 2 == 0 || *command != Command::Reset {
                    store.apply(*command);
                }
                let params = store.params();
                assert_eq!(params, params.clamped());
            }
        }
    }

    #[test]
    fn inclination_distance_bounces_and_bloom_stop_at_bounds() {
        let mut store = ParameterStore::default();
        for _ in 0..50 {
            store.increase_inclination();
            store.decrease_distance();
            store.increase_bounces();
            store.increase_bloom();
            store.increase_exposure();
        }
        let params = store.params();
        assert_relative_eq!(params.inclination, 89.9);
        assert_relative_eq!(params.camera_distance, 10.0);
        assert_eq!(params.max_bounces, 5);
        assert_relative_eq!(params.bloom_strength, 2.0);
        assert!(params.exposure <= 100.0);

        for _ in 0..200 {
            store.decrease_bounces();
            store.decrease_exposure();
        }
        assert_eq!(store.params().max_bounces, 1);
        assert_relative_eq!(store.params().exposure, 0.01);
    }

    #[test]
    fn pause_freezes_the_clock() {
        let mut store = ParameterStore::default();
        store.advance_time(0.5);
        store.apply(Command::TogglePause);
        for _ in 0..10 {
            store.advance_time(0.1);
            store.increase_spin();
        }
        assert_eq!(store.params().time, 0.5);

        store.apply(Command::TogglePause);
        store.advance_time(0.25);
        assert_eq!(store.params().time, 0.75);
    }

    #[test]
    fn reset_restores_defaults_but_keeps_the_clock() {
        let mut store = ParameterStore::default();
        store.advance_time(3.0);
        store.increase_spin();
        store.decrease_inclination();
        store.increase_exposure();
        store.apply(Command::Reset);

        let expected = SimulationParameters {
            time: 3.0,
            ..SimulationParameters::default()
        };
        assert_eq!(store.params(), expected);
    }

    #[test]
    fn toggled_off_bloom_has_no_strength() {
        let mut store = ParameterStore::default();
        store.apply(Command::ToggleBloom);
        assert_eq!(store.params().effective_bloom(), 0.0);
        assert_relative_eq!(store.params().bloom_strength, 0.5);
    }

    #[test]
    fn commands_parse_from_their_names() {
        for command in Command::ALL.iter() {
            assert_eq!(command.to_string().parse::<Command>(), Ok(*command));
        }
        assert_eq!(" Spin+ ".parse::<Command>(), Ok(Command::IncreaseSpin));
        assert_eq!(
            "warp".parse::<Command>(),
            Err(CommandParseError("warp".to_string()))
        );
    }

    #[test]
    fn out_of_range_defaults_are_clamped() {
        let wild = SimulationParameters {
            spin: 1.5,
            inclination: 120.0,
            camera_distance: 2.0,
            exposure: -1.0,
            max_bounces: 0,
            bloom_strength: f64::NAN,
            bloom_enabled: true,
            time: -4.0,
        };
        let params = ParameterStore::new(wild).params();
        assert_relative_eq!(params.spin, 0.998);
        assert_relative_eq!(params.inclination, 89.9);
        assert_relative_eq!(params.camera_distance, 10.0);
        assert_relative_eq!(params.exposure, 0.01);
        assert_eq!(params.max_bounces, 1);
        assert_eq!(params.bloom_strength, 0.0);
        assert_eq!(params.time, 0.0);
    }
}
