//! Frame buffer handed to presentation, plus still-frame export.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use image::codecs::pnm::{PnmEncoder, PnmSubtype, SampleEncoding};
use image::{ColorType, ImageBuffer, ImageEncoder, ImageFormat, RgbImage};

use crate::error::ExportError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Resolution {
    pub width: u32,
    pub height: u32,
}

impl Resolution {
    pub fn new(width: u32, height: u32) -> Resolution {
        Resolution { width, height }
    }

    pub fn pixel_count(&self) -> usize {
        self.width as usize * self.height as usize
    }
}

/// Linear RGBA radiance, row-major, one entry per pixel.
#[derive(Debug, Clone, PartialEq)]
pub struct OutputImage {
    width: u32,
    height: u32,
    pixels: Vec<[f32; 4]>,
}

impl OutputImage {
    pub fn new(resolution: Resolution) -> OutputImage {
        OutputImage {
            width: resolution.width,
            height: resolution.height,
            pixels: vec![[0.0, 0.0, 0.0, 1.0]; resolution.pixel_count()],
        }
    }

    /// Build from per-pixel RGB radiance in row-major order. Non-finite or
    /// negative samples become black.
    pub fn from_radiance<I>(resolution: Resolution, radiance: I) -> OutputImage
    where
        I: IntoIterator<Item = [f64; 3]>,
    {
        let mut image = OutputImage::new(resolution);
        for (pixel, rgb) in image.pixels.iter_mut().zip(radiance) {
            for c in 0..3 {
                let value = rgb[c] as f32;
                pixel[c] = if value.is_finite() { value.max(0.0) } else { 0.0 };
            }
        }
        image
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn resolution(&self) -> Resolution {
        Resolution::new(self.width, self.height)
    }

    pub fn pixel(&self, x: u32, y: u32) -> [f32; 4] {
        self.pixels[(y * self.width + x) as usize]
    }

    pub fn pixels(&self) -> &[[f32; 4]] {
        &self.pixels
    }

    pub fn pixels_mut(&mut self) -> &mut [[f32; 4]] {
        &mut self.pixels
    }

    /// Sum of the RGB channels over the whole frame.
    pub fn total_radiance(&self) -> f64 {
        self.pixels
            .iter()
            .map(|p| p[0] as f64 + p[1] as f64 + p[2] as f64)
            .sum()
    }

    /// Clamp to `[0, 1]`, gamma encode and quantize to 8-bit RGB.
    pub fn to_rgb8(&self, gamma: f32) -> Vec<u8> {
        let inv_gamma = 1.0 / gamma.max(1e-3);
        self.pixels
            .iter()
            .flat_map(|p| {
                let encode = |v: f32| (v.max(0.0).min(1.0).powf(inv_gamma) * 255.0).round() as u8;
                vec![encode(p[0]), encode(p[1]), encode(p[2])]
            })
            .collect()
    }

    pub fn to_rgb_image(&self, gamma: f32) -> RgbImage {
        let bytes = self.to_rgb8(gamma);
        let width = self.width;
        ImageBuffer::from_fn(self.width, self.height, |x, y| {
            let i = 3 * (y * width + x) as usize;
            image::Rgb([bytes[i], bytes[i + 1], bytes[i + 2]])
        })
    }

    /// Binary PPM: `P6`, width, height, 255, then row-major RGB bytes.
    pub fn write_ppm<W: Write>(&self, writer: W, gamma: f32) -> Result<(), ExportError> {
        let encoder = PnmEncoder::new(writer).with_subtype(PnmSubtype::Pixmap(SampleEncoding::Binary));
        encoder.write_image(&self.to_rgb8(gamma), self.width, self.height, ColorType::Rgb8)?;
        Ok(())
    }

    /// Save with the format implied by the file extension (ppm, png, bmp).
    pub fn save(&self, path: &Path, gamma: f32) -> Result<(), ExportError> {
        let format = ImageFormat::from_path(path)?;

        if format == ImageFormat::Pnm {
            let mut writer = BufWriter::new(File::create(path)?);
            self.write_ppm(&mut writer, gamma)?;
            writer.flush()?;
        } else {
            self.to_rgb_image(gamma).save_with_format(path, format)?;
        }

        log::info!("Saved {}x{} frame to {}", self.width, self.height, path.display());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn gradient() -> OutputImage {
        let resolution = Resolution::new(4, 2);
        let radiance = (0..8).map(|i| {
            let v = i as f64 / 7.0;
            [v, 1.0 - v, 2.0]
        });
        OutputImage::from_radiance(resolution, radiance)
    }

    #[test]
    fn display_mapping_clamps_and_encodes_gamma() {
        let mut image = OutputImage::new(Resolution::new(3, 1));
        image.pixels_mut()[0] = [1.0, 0.0, 0.5, 1.0];
        image.pixels_mut()[1] = [7.5, -3.0, 0.0, 1.0];
        image.pixels_mut()[2] = [0.25, 0.25, 0.25, 1.0];

        let bytes = image.to_rgb8(2.2);
        assert_eq!(&bytes[0..6], &[255, 0, 186, 255, 0, 0]);
        assert_eq!(bytes[6], 136);
        assert_eq!(image.to_rgb8(1.0)[6], 64);
    }

    #[test]
    fn non_finite_radiance_becomes_black() {
        let image = OutputImage::from_radiance(
            Resolution::new(2, 1),
            vec![[f64::NAN, f64::INFINITY, -1.0], [0.5, 0.5, 0.5]],
        );
        assert_eq!(image.pixel(0, 0), [0.0, 0.0, 0.0, 1.0]);
        assert_eq!(image.pixel(1, 0), [0.5, 0.5, 0.5, 1.0]);
    }

    #[test]
    fn ppm_stream_is_header_then_row_major_rgb() {
        let image = gradient();
        let mut bytes = Vec::new();
        image.write_ppm(&mut bytes, 2.2).unwrap();

        let rgb = image.to_rgb8(2.2);
        assert_eq!(rgb.len(), 4 * 2 * 3);
        assert!(bytes.ends_with(&rgb));

        let header = String::from_utf8_lossy(&bytes[..bytes.len() - rgb.len()]).to_string();
        let fields: Vec<&str> = header.split_ascii_whitespace().collect();
        assert_eq!(fields, vec!["P6", "4", "2", "255"]);
    }

    #[test]
    fn save_picks_format_from_extension() {
        let dir = tempfile::tempdir().unwrap();
        let image = gradient();

        let png = dir.path().join("frame.png");
        image.save(&png, 2.2).unwrap();
        let decoded = image::open(&png).unwrap().to_rgb8();
        assert_eq!(decoded.dimensions(), (4, 2));
        assert_eq!(decoded.into_raw(), image.to_rgb8(2.2));

        let ppm = dir.path().join("frame.ppm");
        image.save(&ppm, 2.2).unwrap();
        assert!(std::fs::read(&ppm).unwrap().starts_with(b"P6"));
    }

    #[test]
    fn unknown_extension_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = gradient().save(&dir.path().join("frame.xyz"), 2.2).unwrap_err();
        assert!(matches!(err, ExportError::Image(_)));
    }
}
