use std::path::Path;

use tracing::{info, warn};

use super::AssetError;

/// Stop offsets of the sky gradient, paired index-wise with
/// [`BACKGROUND_GRADIENT_COLORS`]. Offset 0 is the bottom of the sky dome.
pub const BACKGROUND_GRADIENT_OFFSETS: [f32; 4] = [0.75, 0.6, 0.4, 0.25];
pub const BACKGROUND_GRADIENT_COLORS: [u32; 4] = [0x1B1D1E, 0x3D4143, 0x72797D, 0x0B1018];
pub const BACKGROUND_TEXTURE_ROWS: usize = 256;

const FIVE_TONE_LEVELS: [f32; 5] = [0.18, 0.38, 0.58, 0.79, 1.0];

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GradientStop {
    pub offset: f32,
    pub color: u32,
}

/// Linear color ramp with the stops kept in declaration order, so a stop can
/// be addressed by the index it was declared with. Sampling clamps to the
/// end colors outside the first and last offsets.
#[derive(Debug, Clone, PartialEq)]
pub struct GradientRamp {
    stops: Vec<GradientStop>,
    sorted: Vec<usize>,
    baked: Vec<[u8; 3]>,
}

impl Default for GradientRamp {
    fn default() -> Self {
        Self::new(
            BACKGROUND_GRADIENT_OFFSETS
                .iter()
                .zip(BACKGROUND_GRADIENT_COLORS)
                .map(|(&offset, color)| GradientStop { offset, color })
                .collect(),
        )
    }
}

impl GradientRamp {
    pub fn new(stops: Vec<GradientStop>) -> Self {
        let mut ramp = Self {
            stops,
            sorted: Vec::new(),
            baked: Vec::new(),
        };
        ramp.rebuild();
        ramp
    }

    pub fn stops(&self) -> &[GradientStop] {
        &self.stops
    }

    pub fn color(&self, index: usize) -> Option<u32> {
        self.stops.get(index).map(|stop| stop.color)
    }

    /// Changes one stop color and rebakes the texture rows.
    pub fn set_color(&mut self, index: usize, color: u32) -> bool {
        let Some(stop) = self.stops.get_mut(index) else {
            return false;
        };
        stop.color = color & 0x00FF_FFFF;
        self.rebuild();
        true
    }

    /// Baked rows, bottom (index 0) to top.
    pub fn baked_rows(&self) -> &[[u8; 3]] {
        &self.baked
    }

    /// Row of the baked texture for a normalized height, clamped to `[0, 1]`.
    pub fn baked_at(&self, t: f32) -> [u8; 3] {
        if self.baked.is_empty() {
            return [0, 0, 0];
        }
        let t = if t.is_finite() { t.clamp(0.0, 1.0) } else { 0.0 };
        let index = (t * (self.baked.len() - 1) as f32).round() as usize;
        self.baked[index.min(self.baked.len() - 1)]
    }

    pub fn sample(&self, t: f32) -> [u8; 3] {
        let Some(&first) = self.sorted.first() else {
            return [0, 0, 0];
        };
        let first = self.stops[first];
        if !t.is_finite() || t <= first.offset {
            return unpack_rgb(first.color);
        }
        for pair in self.sorted.windows(2) {
            let (lo, hi) = (self.stops[pair[0]], self.stops[pair[1]]);
            if t <= hi.offset {
                let span = hi.offset - lo.offset;
                let f = if span <= f32::EPSILON {
                    1.0
                } else {
                    (t - lo.offset) / span
                };
                return lerp_rgb(unpack_rgb(lo.color), unpack_rgb(hi.color), f);
            }
        }
        let last = self.stops[self.sorted[self.sorted.len() - 1]];
        unpack_rgb(last.color)
    }

    fn rebuild(&mut self) {
        let mut sorted: Vec<usize> = (0..self.stops.len()).collect();
        sorted.sort_by(|&a, &b| self.stops[a].offset.total_cmp(&self.stops[b].offset));
        self.sorted = sorted;

        let last = (BACKGROUND_TEXTURE_ROWS - 1) as f32;
        self.baked = (0..BACKGROUND_TEXTURE_ROWS)
            .map(|row| self.sample(row as f32 / last))
            .collect();
    }
}

/// Discrete light bands used to quantize diffuse lighting into toon steps.
#[derive(Debug, Clone, PartialEq)]
pub struct ToneMap {
    levels: Vec<f32>,
}

impl Default for ToneMap {
    fn default() -> Self {
        Self::five_tone()
    }
}

impl ToneMap {
    pub fn five_tone() -> Self {
        Self {
            levels: FIVE_TONE_LEVELS.to_vec(),
        }
    }

    pub fn from_levels(levels: Vec<f32>) -> Option<Self> {
        if levels.is_empty() || levels.iter().any(|level| !level.is_finite()) {
            return None;
        }
        Some(Self {
            levels: levels.into_iter().map(|level| level.clamp(0.0, 1.0)).collect(),
        })
    }

    /// Reads the first row of a gradient map image; each pixel is one band.
    pub fn load(path: &Path) -> Result<Self, AssetError> {
        let image = image::open(path).map_err(|source| AssetError::Image {
            path: path.to_path_buf(),
            source,
        })?;
        let luma = image.to_luma8();
        if luma.width() == 0 || luma.height() == 0 {
            return Err(AssetError::EmptyImage {
                path: path.to_path_buf(),
            });
        }
        let mut levels: Vec<f32> = (0..luma.width())
            .map(|x| f32::from(luma.get_pixel(x, 0).0[0]) / 255.0)
            .collect();
        levels.dedup_by(|a, b| (*a - *b).abs() < 1.0 / 512.0);
        Self::from_levels(levels).ok_or_else(|| AssetError::EmptyImage {
            path: path.to_path_buf(),
        })
    }

    pub fn load_or_fallback(path: &Path) -> Self {
        match Self::load(path) {
            Ok(tone_map) => {
                info!(path = %path.display(), bands = tone_map.band_count(), "tone_map_loaded");
                tone_map
            }
            Err(error) => {
                warn!(path = %path.display(), error = %error, "tone_map_fallback");
                Self::five_tone()
            }
        }
    }

    pub fn band_count(&self) -> usize {
        self.levels.len()
    }

    /// Maps a lighting factor in `[0, 1]` to its band level, nearest filtering.
    pub fn quantize(&self, factor: f32) -> f32 {
        let factor = if factor.is_finite() {
            factor.clamp(0.0, 1.0)
        } else {
            0.0
        };
        let count = self.levels.len();
        let index = ((factor * count as f32) as usize).min(count - 1);
        self.levels[index]
    }
}

pub(crate) fn unpack_rgb(color: u32) -> [u8; 3] {
    [
        ((color >> 16) & 0xFF) as u8,
        ((color >> 8) & 0xFF) as u8,
        (color & 0xFF) as u8,
    ]
}

fn lerp_rgb(a: [u8; 3], b: [u8; 3], t: f32) -> [u8; 3] {
    let t = t.clamp(0.0, 1.0);
    let mix = |x: u8, y: u8| (f32::from(x) + (f32::from(y) - f32::from(x)) * t).round() as u8;
    [mix(a[0], b[0]), mix(a[1], b[1]), mix(a[2], b[2])]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ramp_clamps_outside_stops() {
        let ramp = GradientRamp::default();
        assert_eq!(ramp.sample(0.0), unpack_rgb(0x0B1018));
        assert_eq!(ramp.sample(0.25), unpack_rgb(0x0B1018));
        assert_eq!(ramp.sample(0.9), unpack_rgb(0x1B1D1E));
        assert_eq!(ramp.sample(1.0), unpack_rgb(0x1B1D1E));
    }

    #[test]
    fn ramp_interpolates_between_sorted_stops() {
        let ramp = GradientRamp::new(vec![
            GradientStop {
                offset: 1.0,
                color: 0xFFFFFF,
            },
            GradientStop {
                offset: 0.0,
                color: 0x000000,
            },
        ]);
        assert_eq!(ramp.sample(0.5), [128, 128, 128]);
    }

    #[test]
    fn set_color_rebakes_rows() {
        let mut ramp = GradientRamp::default();
        let before = ramp.baked_at(1.0);
        assert!(ramp.set_color(0, 0xFF0000));
        assert_ne!(ramp.baked_at(1.0), before);
        assert_eq!(ramp.baked_at(1.0), [255, 0, 0]);
        assert_eq!(ramp.color(0), Some(0xFF0000));
        assert!(!ramp.set_color(4, 0x00FF00));
    }

    #[test]
    fn tone_map_quantizes_into_bands() {
        let tone_map = ToneMap::five_tone();
        assert_eq!(tone_map.band_count(), 5);
        assert_eq!(tone_map.quantize(0.0), FIVE_TONE_LEVELS[0]);
        assert_eq!(tone_map.quantize(0.5), FIVE_TONE_LEVELS[2]);
        assert_eq!(tone_map.quantize(1.0), FIVE_TONE_LEVELS[4]);
        assert_eq!(tone_map.quantize(f32::NAN), FIVE_TONE_LEVELS[0]);
    }

    #[test]
    fn tone_map_loads_bands_from_png() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("three_tone.png");
        let image = image::GrayImage::from_fn(3, 1, |x, _| image::Luma([(x * 127) as u8]));
        image.save(&path).expect("save png");

        let tone_map = ToneMap::load(&path).expect("load");
        assert_eq!(tone_map.band_count(), 3);
        assert!((tone_map.quantize(1.0) - 254.0 / 255.0).abs() < 1e-4);
    }

    #[test]
    fn missing_tone_map_falls_back_to_five_tone() {
        let dir = tempfile::tempdir().expect("tempdir");
        let tone_map = ToneMap::load_or_fallback(&dir.path().join("missing.jpg"));
        assert_eq!(tone_map, ToneMap::five_tone());
    }
}
