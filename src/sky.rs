//! Static background for rays that leave the scene.

use std::f64::consts::PI;

use crate::black_body::BlackBodyPalette;
use crate::config::SkyConfig;

fn hash(p: [f64; 2]) -> f64 {
    ((p[0] * 12.9898 + p[1] * 78.233).sin() * 43758.5453).abs().fract()
}

/// Starfield on a fixed `(theta, phi)` grid: each cell holds at most one
/// star whose presence, brightness and temperature come from a hash of the
/// cell index. Everything else is a flat dim background.
#[derive(Debug, Clone)]
pub struct Sky<'a> {
    config: SkyConfig,
    palette: &'a BlackBodyPalette,
}

impl<'a> Sky<'a> {
    pub fn new(config: &SkyConfig, palette: &'a BlackBodyPalette) -> Sky<'a> {
        Sky {
            config: config.clone(),
            palette,
        }
    }

    fn cell(&self, theta: f64, phi: f64) -> [f64; 2] {
        let rows = self.config.resolution.max(1) as f64;
        let theta = theta.max(0.0).min(PI);
        let phi = phi.rem_euclid(2.0 * PI);
        [
            (theta / PI * rows).floor().min(rows - 1.0),
            (phi / (2.0 * PI) * 2.0 * rows).floor(),
        ]
    }

    /// Radiance arriving from direction `(theta, phi)`.
    pub fn sample(&self, theta: f64, phi: f64) -> [f64; 3] {
        let background = self.config.background;
        if !theta.is_finite() || !phi.is_finite() {
            return background;
        }

        let cell = self.cell(theta, phi);
        let h = hash(cell);
        let threshold = 1.0 - self.config.star_density;
        if self.config.star_density <= 0.0 || h <= threshold {
            return background;
        }

        let brightness = self.config.star_brightness * (h - threshold) / self.config.star_density;
        let temperature = 2500.0 + 25_000.0 * hash([cell[1] + 17.0, cell[0] - 31.0]);
        let color = self.palette.color(temperature);

        [
            background[0] + color[0] * brightness,
            background[1] + color[1] * brightness,
            background[2] + color[2] * brightness,
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sampling_is_deterministic_and_never_below_background() {
        let palette = BlackBodyPalette::new();
        let config = SkyConfig::default();
        let sky = Sky::new(&config, &palette);

        let mut stars = 0;
        for i in 0..200 {
            for j in 0..200 {
                let theta = PI * (i as f64 + 0.5) / 200.0;
                let phi = 2.0 * PI * (j as f64 + 0.5) / 200.0 - PI;
                let c = sky.sample(theta, phi);
                assert_eq!(c, sky.sample(theta, phi));
                for k in 0..3 {
                    assert!(c[k] >= config.background[k]);
                }
                if c != config.background {
                    stars += 1;
                }
            }
        }

        assert!(stars > 0);
        assert!(stars < 200 * 200 / 10);
    }

    #[test]
    fn azimuth_wraps_around() {
        let palette = BlackBodyPalette::new();
        let sky = Sky::new(&SkyConfig::default(), &palette);
        assert_eq!(sky.sample(1.0, 0.3), sky.sample(1.0, 0.3 + 2.0 * PI * 3.0));
    }

    #[test]
    fn empty_sky_is_the_background() {
        let palette = BlackBodyPalette::new();
        let config = SkyConfig {
            background: [0.0; 3],
            star_density: 0.0,
            ..SkyConfig::default()
        };
        let sky = Sky::new(&config, &palette);
        assert_eq!(sky.sample(0.7, 2.0), [0.0; 3]);
        assert_eq!(sky.sample(f64::NAN, 2.0), [0.0; 3]);
    }
}
