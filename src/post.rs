//! Exposure and bloom, applied to the traced radiance before display.

use rayon::prelude::*;

use crate::config::PostConfig;
use crate::output::OutputImage;
use crate::params::SimulationParameters;

/// Rec. 709 luminance weights.
const LUMA: [f32; 3] = [0.2126, 0.7152, 0.0722];

pub fn luminance(pixel: &[f32; 4]) -> f32 {
    LUMA[0] * pixel[0] + LUMA[1] * pixel[1] + LUMA[2] * pixel[2]
}

/// Linear scale of every color channel.
pub fn apply_exposure(image: &mut OutputImage, exposure: f32) {
    image.pixels_mut().par_iter_mut().for_each(|p| {
        for c in 0..3 {
            p[c] *= exposure;
        }
    });
}

/// Keep only the part of each pixel brighter than `threshold`.
pub fn bright_pass(image: &OutputImage, threshold: f32) -> OutputImage {
    let mut bright = image.clone();
    bright.pixels_mut().par_iter_mut().for_each(|p| {
        let lum = luminance(p);
        let factor = if lum > threshold {
            (lum - threshold) / lum
        } else {
            0.0
        };
        for c in 0..3 {
            p[c] *= factor;
        }
    });
    bright
}

/// Normalized taps `w[0..=radius]` of a Gaussian with sigma `radius / 3`.
pub fn gaussian_kernel(radius: u32) -> Vec<f32> {
    let sigma = (radius as f32 / 3.0).max(0.5);
    let mut weights: Vec<f32> = (0..=radius)
        .map(|i| (-(i as f32).powi(2) / (2.0 * sigma * sigma)).exp())
        .collect();

    let total = weights[0] + 2.0 * weights[1..].iter().sum::<f32>();
    for w in weights.iter_mut() {
        *w /= total;
    }
    weights
}

/// Separable Gaussian blur with clamp-to-edge sampling, one row per task.
pub fn gaussian_blur(image: &OutputImage, radius: u32) -> OutputImage {
    if radius == 0 {
        return image.clone();
    }
    let kernel = gaussian_kernel(radius);
    let width = image.width() as usize;
    let height = image.height() as usize;
    let r = radius as isize;

    let source = image.pixels();
    let mut horizontal = image.clone();
    horizontal
        .pixels_mut()
        .par_chunks_mut(width)
        .enumerate()
        .for_each(|(y, row)| {
            for (x, out) in row.iter_mut().enumerate() {
                let mut sum = [0.0f32; 3];
                for k in -r..=r {
                    let sx = (x as isize + k).max(0).min(width as isize - 1) as usize;
                    let w = kernel[k.unsigned_abs()];
                    let p = source[y * width + sx];
                    for c in 0..3 {
                        sum[c] += w * p[c];
                    }
                }
                out[..3].copy_from_slice(&sum);
            }
        });

    let source = horizontal.pixels();
    let mut blurred = image.clone();
    blurred
        .pixels_mut()
        .par_chunks_mut(width)
        .enumerate()
        .for_each(|(y, row)| {
            for (x, out) in row.iter_mut().enumerate() {
                let mut sum = [0.0f32; 3];
                for k in -r..=r {
                    let sy = (y as isize + k).max(0).min(height as isize - 1) as usize;
                    let w = kernel[k.unsigned_abs()];
                    let p = source[sy * width + x];
                    for c in 0..3 {
                        sum[c] += w * p[c];
                    }
                }
                out[..3].copy_from_slice(&sum);
            }
        });

    blurred
}

/// Add `strength` times the blurred bright pass back onto `image`.
pub fn apply_bloom(image: &mut OutputImage, strength: f32, config: &PostConfig) {
    if strength <= 0.0 || image.pixels().is_empty() {
        return;
    }
    let glow = gaussian_blur(&bright_pass(image, config.bloom_threshold), config.bloom_radius);
    image
        .pixels_mut()
        .par_iter_mut()
        .zip(glow.pixels().par_iter())
        .for_each(|(p, g)| {
            for c in 0..3 {
                p[c] += strength * g[c];
            }
        });
}

/// Exposure, then bloom if it is switched on.
pub fn post_process(image: &OutputImage, params: &SimulationParameters, config: &PostConfig) -> OutputImage {
    let mut out = image.clone();
    apply_exposure(&mut out, params.exposure as f32);
    apply_bloom(&mut out, params.effective_bloom() as f32, config);
    out
}
