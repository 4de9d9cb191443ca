const LAMBDA_START: f64 = 380.0;
const LAMBDA_END: f64 = 780.0;
const LAMBDA_DELTA: f64 = 5.0;

const MIN_TEMPERATURE: f64 = 1000.0;
const MAX_TEMPERATURE: f64 = 40_000.0;
const TABLE_STEPS: usize = 512;

/// Color matching functions of the CIE 1931 standard observer at one wavelength.
#[allow(non_snake_case)]
#[derive(Debug, Clone, Copy, PartialEq)]
struct XYZ {
    lambda: f64,
    X: f64,
    Y: f64,
    Z: f64,
}

// piecewise gaussian, different widths left and right of the peak
fn lobe(lambda: f64, mu: f64, sigma_left: f64, sigma_right: f64) -> f64 {
    let sigma = if lambda < mu { sigma_left } else { sigma_right };
    (-0.5 * ((lambda - mu) / sigma).powi(2)).exp()
}

impl XYZ {
    // multi-lobe fit of the tabulated CIE 1931 curves (Wyman, Sloan, Shirley 2013)
    fn at(lambda: f64) -> XYZ {
        XYZ {
            lambda,
            X: 1.056 * lobe(lambda, 599.8, 37.9, 31.0) + 0.362 * lobe(lambda, 442.0, 16.0, 26.7)
                - 0.065 * lobe(lambda, 501.1, 20.4, 26.2),
            Y: 0.821 * lobe(lambda, 568.8, 46.9, 40.5) + 0.286 * lobe(lambda, 530.9, 16.3, 31.1),
            Z: 1.217 * lobe(lambda, 437.0, 11.8, 36.0) + 0.681 * lobe(lambda, 459.0, 26.0, 13.8),
        }
    }
}

/// Spectral radiance of a black body, `lambda` in nm and `temp` in Kelvin.
pub fn planck(lambda: f64, temp: f64) -> f64 {
    5.0 * 1.0E15 * lambda.powi(-5) / ((1.43877E7 / (temp * lambda)).exp() - 1.0)
}

/// Black-body colors tabulated on a logarithmic temperature grid.
///
/// Each entry is the chromaticity of a Planck spectrum integrated against the
/// CIE observer, scaled so that its brightest channel is 1. Hot temperatures
/// come out blue-white, cool ones orange to red.
#[derive(Debug, Clone)]
pub struct BlackBodyPalette {
    table: Vec<[f64; 3]>,
}

impl BlackBodyPalette {
    pub fn new() -> BlackBodyPalette {
        let observer: Vec<XYZ> = (0..)
            .map(|i| LAMBDA_START + LAMBDA_DELTA * i as f64)
            .take_while(|lambda| *lambda <= LAMBDA_END)
            .map(XYZ::at)
            .collect();

        let table = (0..TABLE_STEPS)
            .map(|i| {
                let temp = Self::temperature_at(i as f64);
                Self::integrate(&observer, temp)
            })
            .collect();

        BlackBodyPalette { table }
    }

    fn temperature_at(index: f64) -> f64 {
        let span = (MAX_TEMPERATURE / MIN_TEMPERATURE).ln();
        MIN_TEMPERATURE * (span * index / (TABLE_STEPS - 1) as f64).exp()
    }

    fn integrate(observer: &[XYZ], temp: f64) -> [f64; 3] {
        let mut res_x: f64 = 0.0;
        let mut res_y: f64 = 0.0;
        let mut res_z: f64 = 0.0;

        for xyz in observer {
            let pl = planck(xyz.lambda, temp);
            res_x += pl * xyz.X;
            res_y += pl * xyz.Y;
            res_z += pl * xyz.Z;
        }

        xyz_to_rgb(res_x, res_y, res_z)
    }

    /// Normalized color of a black body at `temp` Kelvin, clamped to the table range.
    pub fn color(&self, temp: f64) -> [f64; 3] {
        let temp = if temp.is_nan() { MIN_TEMPERATURE } else { temp };
        let temp = temp.max(MIN_TEMPERATURE).min(MAX_TEMPERATURE);
        let span = (MAX_TEMPERATURE / MIN_TEMPERATURE).ln();
        let position = (temp / MIN_TEMPERATURE).ln() / span * (TABLE_STEPS - 1) as f64;

        let low = (position.floor() as usize).min(TABLE_STEPS - 2);
        let frac = position - low as f64;
        let (c1, c2) = (self.table[low], self.table[low + 1]);

        [
            (1.0 - frac) * c1[0] + frac * c2[0],
            (1.0 - frac) * c1[1] + frac * c2[1],
            (1.0 - frac) * c1[2] + frac * c2[2],
        ]
    }
}

impl Default for BlackBodyPalette {
    fn default() -> Self {
        BlackBodyPalette::new()
    }
}

/// CIE XYZ to linear CIE RGB, negative lobes clipped, brightest channel scaled to 1.
pub fn xyz_to_rgb(x: f64, y: f64, z: f64) -> [f64; 3] {
    //https://en.wikipedia.org/wiki/CIE_1931_color_space
    let big_r = (0.41847 * x + -0.15866 * y + -0.082835 * z).max(0.0);
    let big_g = (-0.091169 * x + 0.25243 * y + 0.015708 * z).max(0.0);
    let big_b = (0.00092090 * x + -0.0025498 * y + 0.17860 * z).max(0.0);

    let peak = big_r.max(big_g).max(big_b);
    if peak <= 0.0 || !peak.is_finite() {
        return [0.0, 0.0, 0.0];
    }

    [big_r / peak, big_g / peak, big_b / peak]
}
