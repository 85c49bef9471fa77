//! Intensity transforms for decoded native radiographs.
//!
//! A decoded frame goes through VOI (windowing or lookup table), optional
//! MONOCHROME1 inversion, min-max rescale to 8 bits and optional histogram
//! equalization.

use image::{GrayImage, Luma};

use crate::error::TriageError;

/// Value-of-interest transform embedded in a native radiograph.
#[derive(Debug, Clone, PartialEq)]
pub enum VoiTransform {
    /// Linear window (Window Center / Window Width).
    Window { center: f64, width: f64 },
    /// Explicit lookup table: `entries[i]` is the output for input `first_mapped + i`.
    Lut { first_mapped: f64, entries: Vec<f64> },
}

/// Single-channel frame with samples already in modality units.
#[derive(Debug, Clone, PartialEq)]
pub struct GrayFrame {
    pub width: u32,
    pub height: u32,
    /// Row-major samples, `width * height` long
    pub samples: Vec<f64>,
    /// True for MONOCHROME1 (low values displayed bright)
    pub inverted: bool,
    pub voi: Option<VoiTransform>,
}

/// Which of the optional intensity steps to run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RenderOptions {
    pub apply_voi: bool,
    pub fix_monochrome: bool,
}

/// Apply a VOI transform to every sample.
pub fn apply_voi(samples: &[f64], voi: &VoiTransform) -> Vec<f64> {
    match voi {
        VoiTransform::Window { center, width } => {
            if *width < 1.0 {
                return samples.to_vec();
            }
            let c = center - 0.5;
            let half = (width - 1.0) / 2.0;
            samples
                .iter()
                .map(|&x| {
                    if x <= c - half {
                        0.0
                    } else if x > c + half {
                        255.0
                    } else {
                        ((x - c) / (width - 1.0) + 0.5) * 255.0
                    }
                })
                .collect()
        }
        VoiTransform::Lut {
            first_mapped,
            entries,
        } => {
            if entries.is_empty() {
                return samples.to_vec();
            }
            let last = entries.len() - 1;
            samples
                .iter()
                .map(|&x| {
                    let index = (x - first_mapped).round().clamp(0.0, last as f64) as usize;
                    entries[index]
                })
                .collect()
        }
    }
}

/// Flip intensities in place: `new = max(data) - data`.
pub fn invert(samples: &mut [f64]) {
    let max = samples.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    if !max.is_finite() {
        return;
    }
    for v in samples.iter_mut() {
        *v = max - *v;
    }
}

/// Stretch samples to fill 0..=255: `(data - min) / max(data - min) * 255`.
/// A constant input maps to all zeros.
pub fn rescale_to_u8(samples: &[f64]) -> Vec<u8> {
    let min = samples.iter().copied().fold(f64::INFINITY, f64::min);
    let max = samples.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let range = max - min;

    if !range.is_finite() || range <= 0.0 {
        return vec![0; samples.len()];
    }

    samples
        .iter()
        .map(|&v| ((v - min) * 255.0 / range).round().clamp(0.0, 255.0) as u8)
        .collect()
}

/// Turn a decoded frame into a viewable 8-bit grayscale image.
pub fn render(frame: &GrayFrame, options: RenderOptions) -> Result<GrayImage, TriageError> {
    let expected = frame.width as usize * frame.height as usize;
    if frame.samples.len() != expected {
        return Err(TriageError::Decode(format!(
            "Frame has {} samples, expected {} for {}x{}",
            frame.samples.len(),
            expected,
            frame.width,
            frame.height
        )));
    }

    let mut data = match (&frame.voi, options.apply_voi) {
        (Some(voi), true) => apply_voi(&frame.samples, voi),
        _ => frame.samples.clone(),
    };

    if options.fix_monochrome && frame.inverted {
        invert(&mut data);
    }

    GrayImage::from_raw(frame.width, frame.height, rescale_to_u8(&data))
        .ok_or_else(|| TriageError::Decode("Pixel buffer does not match frame size".to_string()))
}

/// Global histogram equalization.
pub fn equalize_global(image: &GrayImage) -> GrayImage {
    imageproc::contrast::equalize_histogram(image)
}

/// Contrast-limited adaptive histogram equalization (CLAHE).
///
/// The image is split into roughly `tiles x tiles` regions; each gets a
/// clipped, redistributed histogram and the per-tile mappings are blended
/// bilinearly between tile centers.
pub fn equalize_adaptive(image: &GrayImage, clip_limit: f32, tiles: u32) -> GrayImage {
    let (width, height) = image.dimensions();
    if width == 0 || height == 0 {
        return image.clone();
    }

    let tiles = tiles.max(1);
    let tile_w = width.div_ceil(tiles.min(width));
    let tile_h = height.div_ceil(tiles.min(height));
    let tiles_x = width.div_ceil(tile_w);
    let tiles_y = height.div_ceil(tile_h);

    let mut luts: Vec<[u8; 256]> = Vec::with_capacity((tiles_x * tiles_y) as usize);
    for ty in 0..tiles_y {
        for tx in 0..tiles_x {
            let x0 = tx * tile_w;
            let y0 = ty * tile_h;
            let x1 = (x0 + tile_w).min(width);
            let y1 = (y0 + tile_h).min(height);
            luts.push(tile_lut(image, x0, y0, x1, y1, clip_limit));
        }
    }

    let lut_at = |tx: u32, ty: u32| &luts[(ty * tiles_x + tx) as usize];

    GrayImage::from_fn(width, height, |x, y| {
        let v = image.get_pixel(x, y)[0] as usize;

        let fx = (x as f32 + 0.5) / tile_w as f32 - 0.5;
        let fy = (y as f32 + 0.5) / tile_h as f32 - 0.5;
        let tx0 = fx.floor().clamp(0.0, (tiles_x - 1) as f32) as u32;
        let ty0 = fy.floor().clamp(0.0, (tiles_y - 1) as f32) as u32;
        let tx1 = (tx0 + 1).min(tiles_x - 1);
        let ty1 = (ty0 + 1).min(tiles_y - 1);
        let ax = (fx - tx0 as f32).clamp(0.0, 1.0);
        let ay = (fy - ty0 as f32).clamp(0.0, 1.0);

        let top = lut_at(tx0, ty0)[v] as f32 * (1.0 - ax) + lut_at(tx1, ty0)[v] as f32 * ax;
        let bottom = lut_at(tx0, ty1)[v] as f32 * (1.0 - ax) + lut_at(tx1, ty1)[v] as f32 * ax;
        let blended = top * (1.0 - ay) + bottom * ay;

        Luma([blended.round().clamp(0.0, 255.0) as u8])
    })
}

/// Clipped-histogram mapping for one tile `[x0, x1) x [y0, y1)`.
fn tile_lut(image: &GrayImage, x0: u32, y0: u32, x1: u32, y1: u32, clip_limit: f32) -> [u8; 256] {
    let mut hist = [0u32; 256];
    for y in y0..y1 {
        for x in x0..x1 {
            hist[image.get_pixel(x, y)[0] as usize] += 1;
        }
    }
    let area = (x1 - x0) * (y1 - y0);

    if clip_limit > 0.0 {
        let clip = ((clip_limit * area as f32 / 256.0) as u32).max(1);
        let mut excess = 0u32;
        for bin in hist.iter_mut() {
            if *bin > clip {
                excess += *bin - clip;
                *bin = clip;
            }
        }
        let share = excess / 256;
        let remainder = (excess % 256) as usize;
        for (i, bin) in hist.iter_mut().enumerate() {
            *bin += share + u32::from(i < remainder);
        }
    }

    let mut lut = [0u8; 256];
    let mut cdf = 0u32;
    for (i, &count) in hist.iter().enumerate() {
        cdf += count;
        lut[i] = ((cdf as f32 * 255.0 / area as f32).round()).clamp(0.0, 255.0) as u8;
    }
    lut
}
