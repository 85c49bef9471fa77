//! Radiograph normalization: decode, intensity-correct, resize, encode.
//!
//! Every accepted upload ends up as a 3-channel 8-bit image (square when a
//! target size is configured) plus its JPEG encoding.

use std::io::Cursor;
use std::path::Path;

use image::codecs::jpeg::JpegEncoder;
use image::imageops::FilterType;
use image::{DynamicImage, GrayImage, RgbImage};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use super::format::{detect_format, InputFormat};
use super::intensity::{self, GrayFrame, RenderOptions};
use super::native;
use crate::error::TriageError;

/// Default square edge for normalized images.
pub const DEFAULT_TARGET_SIZE: u32 = 1024;
pub const DEFAULT_JPEG_QUALITY: u8 = 85;

// ====== CONFIGURATION TYPES ======

/// Contrast enhancement applied to native radiographs after rescaling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Equalization {
    None,
    #[default]
    Global,
    /// CLAHE
    Adaptive,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NormalizerConfig {
    /// Square edge length; `None` keeps the decoded size
    pub target_size: Option<u32>,
    /// Whether raster uploads are resized too
    pub resize_raster: bool,
    pub equalization: Equalization,
    pub clahe_clip_limit: f32,
    pub clahe_tiles: u32,
    pub apply_voi_lut: bool,
    pub fix_monochrome: bool,
    pub jpeg_quality: u8,
}

impl Default for NormalizerConfig {
    fn default() -> Self {
        Self {
            target_size: Some(DEFAULT_TARGET_SIZE),
            resize_raster: true,
            equalization: Equalization::Global,
            clahe_clip_limit: 2.0,
            clahe_tiles: 8,
            apply_voi_lut: true,
            fix_monochrome: true,
            jpeg_quality: DEFAULT_JPEG_QUALITY,
        }
    }
}

impl NormalizerConfig {
    pub fn validate(&self) -> Result<(), TriageError> {
        if self.target_size == Some(0) {
            return Err(TriageError::Config("target_size must be greater than zero".to_string()));
        }
        if !(1..=100).contains(&self.jpeg_quality) {
            return Err(TriageError::Config(format!(
                "jpeg_quality must be between 1 and 100, got {}",
                self.jpeg_quality
            )));
        }
        if self.clahe_tiles == 0 {
            return Err(TriageError::Config("clahe_tiles must be greater than zero".to_string()));
        }
        if !(self.clahe_clip_limit.is_finite() && self.clahe_clip_limit >= 0.0) {
            return Err(TriageError::Config(format!(
                "clahe_clip_limit must be a non-negative number, got {}",
                self.clahe_clip_limit
            )));
        }
        Ok(())
    }
}

// ====== OUTPUT ======

/// A decoded, corrected radiograph ready for detection and display.
#[derive(Debug, Clone)]
pub struct NormalizedImage {
    pub pixels: RgbImage,
    pub jpeg: Vec<u8>,
    pub source: InputFormat,
}

impl NormalizedImage {
    pub fn width(&self) -> u32 {
        self.pixels.width()
    }

    pub fn height(&self) -> u32 {
        self.pixels.height()
    }

    /// Media type of [`NormalizedImage::jpeg`].
    pub fn media_type(&self) -> &'static str {
        "image/jpeg"
    }
}

// ====== NORMALIZER ======

pub struct ImageNormalizer {
    config: NormalizerConfig,
}

impl Default for ImageNormalizer {
    fn default() -> Self {
        Self::new(NormalizerConfig::default())
    }
}

impl ImageNormalizer {
    pub fn new(config: NormalizerConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &NormalizerConfig {
        &self.config
    }

    /// Whether this build can decode native radiographs.
    pub fn native_supported() -> bool {
        cfg!(feature = "dicom")
    }

    /// Normalize an upload. `file_name` is only used for format detection.
    ///
    /// # Errors
    /// - `Decode` when the bytes are not a readable image of the detected format
    /// - `UnsupportedFormat` for compressed native inputs or builds without
    ///   native support
    pub fn normalize(&self, file_name: &Path, bytes: &[u8]) -> Result<NormalizedImage, TriageError> {
        let source = detect_format(file_name, bytes);
        debug!("Detected {:?} for '{}'", source, file_name.display());

        let pixels = match source {
            InputFormat::NativeRadiograph => {
                let frame = native::decode_native(bytes)?;
                info!("Decoded native radiograph: {}x{}", frame.width, frame.height);
                self.normalize_frame(&frame)?
            }
            InputFormat::StandardRaster => self.normalize_raster(bytes)?,
        };

        let jpeg = encode_jpeg(&pixels, self.config.jpeg_quality)?;
        info!(
            "Normalized '{}' to {}x{} ({} JPEG bytes)",
            file_name.display(),
            pixels.width(),
            pixels.height(),
            jpeg.len()
        );

        Ok(NormalizedImage {
            pixels,
            jpeg,
            source,
        })
    }

    /// Read a file from disk and normalize it.
    pub fn normalize_file(&self, path: &Path) -> Result<NormalizedImage, TriageError> {
        let bytes = std::fs::read(path)?;
        self.normalize(path, &bytes)
    }

    /// Post-decode pipeline for native frames: VOI, inversion, rescale,
    /// equalization, channel replication and resize.
    pub fn normalize_frame(&self, frame: &GrayFrame) -> Result<RgbImage, TriageError> {
        let gray = intensity::render(
            frame,
            RenderOptions {
                apply_voi: self.config.apply_voi_lut,
                fix_monochrome: self.config.fix_monochrome,
            },
        )?;

        let gray = self.equalize(gray);
        let rgb = DynamicImage::ImageLuma8(gray).to_rgb8();

        Ok(match self.config.target_size {
            Some(size) => resize_square(rgb, size),
            None => rgb,
        })
    }

    fn equalize(&self, gray: GrayImage) -> GrayImage {
        match self.config.equalization {
            Equalization::None => gray,
            Equalization::Global => intensity::equalize_global(&gray),
            Equalization::Adaptive => {
                intensity::equalize_adaptive(&gray, self.config.clahe_clip_limit, self.config.clahe_tiles)
            }
        }
    }

    fn normalize_raster(&self, bytes: &[u8]) -> Result<RgbImage, TriageError> {
        let img = image::load_from_memory(bytes)
            .map_err(|e| TriageError::Decode(format!("Failed to load image: {}", e)))?;
        info!("Loaded raster image: {}x{}", img.width(), img.height());

        let rgb = img.to_rgb8();
        Ok(match self.config.target_size {
            Some(size) if self.config.resize_raster => resize_square(rgb, size),
            _ => rgb,
        })
    }
}

/// Resize to `size x size` with Lanczos3. Already-square images of the
/// right size are returned untouched.
fn resize_square(img: RgbImage, size: u32) -> RgbImage {
    if img.dimensions() == (size, size) {
        return img;
    }
    image::imageops::resize(&img, size, size, FilterType::Lanczos3)
}

/// Encode an RGB image as baseline JPEG.
pub fn encode_jpeg(img: &RgbImage, quality: u8) -> Result<Vec<u8>, TriageError> {
    let mut buffer = Cursor::new(Vec::new());
    img.write_with_encoder(JpegEncoder::new_with_quality(&mut buffer, quality))
        .map_err(|e| TriageError::Decode(format!("Failed to encode image to JPEG: {}", e)))?;
    Ok(buffer.into_inner())
}
