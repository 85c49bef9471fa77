//! Radiograph ingestion.
//!
//! Accepts DICOM or standard raster uploads and produces the normalized
//! 3-channel image the detector and visualizer work on.
//!
//! # Example
//!
//! ```ignore
//! use std::path::Path;
//! use pulmo_triage::imaging::{ImageNormalizer, NormalizerConfig};
//!
//! let normalizer = ImageNormalizer::new(NormalizerConfig::default());
//! let image = normalizer.normalize_file(Path::new("study/chest.dcm"))?;
//! std::fs::write("chest.jpg", &image.jpeg)?;
//! ```

mod format;
mod intensity;
mod native;
mod normalize;

pub use format::{detect_format, detect_format_path, has_native_marker, InputFormat};
pub use intensity::{
    apply_voi, equalize_adaptive, equalize_global, invert, render, rescale_to_u8, GrayFrame, RenderOptions,
    VoiTransform,
};
pub use native::{
    decode_native, frame_from_pixels, to_luminance, unpack_samples, PixelLayout, NATIVE_TRANSFER_SYNTAXES,
};
pub use normalize::{
    encode_jpeg, Equalization, ImageNormalizer, NormalizedImage, NormalizerConfig, DEFAULT_JPEG_QUALITY,
    DEFAULT_TARGET_SIZE,
};
