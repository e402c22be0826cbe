//! Texture and environment-map decoding.

use crate::AssetId;
use enigma_common::Color;
use image::{DynamicImage, Rgba32FImage};

/// Decoded RGBA8 texture.
#[derive(Debug, Clone)]
pub struct Texture {
    pub id: AssetId,
    /// Registry key the texture was loaded under.
    pub name: String,
    pub width: u32,
    pub height: u32,
    pub pixels: Vec<u8>,
}

impl Texture {
    pub(crate) fn decode(id: AssetId, name: &str, bytes: &[u8]) -> Result<Self, image::ImageError> {
        let rgba = image::load_from_memory(bytes)?.to_rgba8();
        Ok(Self {
            id,
            name: name.to_string(),
            width: rgba.width(),
            height: rgba.height(),
            pixels: rgba.into_raw(),
        })
    }
}

/// One level of a prefiltered environment.
#[derive(Debug, Clone, PartialEq)]
pub struct EnvironmentLevel {
    pub width: u32,
    pub height: u32,
    /// Linear RGBA, row-major.
    pub texels: Vec<[f32; 4]>,
}

impl EnvironmentLevel {
    fn from_image(image: &Rgba32FImage) -> Self {
        Self {
            width: image.width(),
            height: image.height(),
            texels: image.pixels().map(|p| p.0).collect(),
        }
    }

    /// 2x2 box filter. Odd edges clamp to the last row/column.
    fn downsample(&self) -> Self {
        let width = (self.width / 2).max(1);
        let height = (self.height / 2).max(1);
        let at = |x: u32, y: u32| {
            let x = x.min(self.width - 1);
            let y = y.min(self.height - 1);
            self.texels[(y * self.width + x) as usize]
        };
        let mut texels = Vec::with_capacity((width * height) as usize);
        for y in 0..height {
            for x in 0..width {
                let samples = [
                    at(2 * x, 2 * y),
                    at(2 * x + 1, 2 * y),
                    at(2 * x, 2 * y + 1),
                    at(2 * x + 1, 2 * y + 1),
                ];
                let mut sum = [0.0f32; 4];
                for s in samples {
                    for c in 0..4 {
                        sum[c] += s[c];
                    }
                }
                texels.push(sum.map(|v| v * 0.25));
            }
        }
        Self {
            width,
            height,
            texels,
        }
    }
}

/// Equirectangular environment prefiltered into a mip chain, finest first.
/// The decoded source image is not kept.
#[derive(Debug, Clone)]
pub struct EnvironmentMap {
    pub id: AssetId,
    pub name: String,
    pub levels: Vec<EnvironmentLevel>,
}

impl EnvironmentMap {
    pub(crate) fn decode(id: AssetId, name: &str, bytes: &[u8]) -> Result<Self, image::ImageError> {
        let source: DynamicImage = image::load_from_memory(bytes)?;
        Ok(Self::prefilter(id, name, &source.to_rgba32f()))
    }

    pub(crate) fn prefilter(id: AssetId, name: &str, source: &Rgba32FImage) -> Self {
        let mut levels = vec![EnvironmentLevel::from_image(source)];
        while let Some(last) = levels.last() {
            if last.width <= 1 && last.height <= 1 {
                break;
            }
            let next = last.downsample();
            levels.push(next);
        }
        Self {
            id,
            name: name.to_string(),
            levels,
        }
    }

    pub fn mip_count(&self) -> usize {
        self.levels.len()
    }

    /// Mean radiance, read from the 1x1 level.
    pub fn average_color(&self) -> Color {
        match self.levels.last().and_then(|l| l.texels.first()) {
            Some([r, g, b, _]) => Color::rgb(*r, *g, *b),
            None => Color::BLACK,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgba, RgbaImage};

    fn png_bytes(image: &RgbaImage) -> Vec<u8> {
        let mut out = std::io::Cursor::new(Vec::new());
        image.write_to(&mut out, image::ImageOutputFormat::Png).unwrap();
        out.into_inner()
    }

    #[test]
    fn texture_keeps_name_and_size() {
        let img = RgbaImage::from_pixel(3, 2, Rgba([10, 20, 30, 255]));
        let tex = Texture::decode(AssetId(1), "albedo", &png_bytes(&img)).unwrap();
        assert_eq!(tex.name, "albedo");
        assert_eq!((tex.width, tex.height), (3, 2));
        assert_eq!(tex.pixels.len(), 3 * 2 * 4);
        assert_eq!(&tex.pixels[..4], &[10, 20, 30, 255]);
    }

    #[test]
    fn garbage_is_an_image_error() {
        assert!(Texture::decode(AssetId(1), "x", b"not an image").is_err());
    }

    #[test]
    fn mip_chain_halves_down_to_one_texel() {
        let mut src = Rgba32FImage::new(4, 2);
        for (x, _, p) in src.enumerate_pixels_mut() {
            let v = if x < 2 { 0.0 } else { 1.0 };
            *p = Rgba([v, v, v, 1.0]);
        }
        let env = EnvironmentMap::prefilter(AssetId(7), "sky", &src);
        let sizes: Vec<_> = env.levels.iter().map(|l| (l.width, l.height)).collect();
        assert_eq!(sizes, vec![(4, 2), (2, 1), (1, 1)]);
        assert_eq!(env.levels[1].texels, vec![[0.0, 0.0, 0.0, 1.0], [1.0, 1.0, 1.0, 1.0]]);
        assert_eq!(env.average_color(), Color::rgb(0.5, 0.5, 0.5));
    }

    #[test]
    fn single_texel_source_has_one_level() {
        let src = Rgba32FImage::from_pixel(1, 1, Rgba([0.2, 0.4, 0.6, 1.0]));
        let env = EnvironmentMap::prefilter(AssetId(2), "flat", &src);
        assert_eq!(env.mip_count(), 1);
        assert_eq!(env.average_color(), Color::rgb(0.2, 0.4, 0.6));
    }
}
