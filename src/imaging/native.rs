//! Native radiograph (DICOM) decoding.
//!
//! Only uncompressed transfer syntaxes are accepted. Pixel data is unpacked
//! from its stored bit depth, passed through the modality rescale and
//! reduced to a single luminance channel. Only the first frame is read.

use super::intensity::GrayFrame;
#[cfg(feature = "dicom")]
use super::intensity::VoiTransform;
use crate::error::TriageError;

/// Uncompressed transfer syntaxes the decoder understands.
pub const NATIVE_TRANSFER_SYNTAXES: [&str; 4] = [
    "1.2.840.10008.1.2",
    "1.2.840.10008.1.2.1",
    "1.2.840.10008.1.2.1.99",
    "1.2.840.10008.1.2.2",
];

/// Pixel layout read from the image pixel module.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PixelLayout {
    pub rows: u32,
    pub columns: u32,
    pub samples_per_pixel: u16,
    /// 0 = interleaved (RGBRGB), 1 = planar (RR..GG..BB..)
    pub planar_configuration: u16,
    pub bits_allocated: u16,
    pub bits_stored: u16,
    pub signed: bool,
}

impl PixelLayout {
    fn pixel_count(&self) -> usize {
        self.rows as usize * self.columns as usize
    }
}

/// Unpack little-endian stored samples into numeric values.
///
/// Values are masked to `bits_stored` and sign-extended when `signed`.
/// Exactly `count` samples are read; fewer available bytes is an error.
pub fn unpack_samples(bytes: &[u8], layout: &PixelLayout, count: usize) -> Result<Vec<f64>, TriageError> {
    let width = match layout.bits_allocated {
        8 => 1,
        16 => 2,
        32 => 4,
        other => {
            return Err(TriageError::UnsupportedFormat(format!(
                "Bits Allocated {} is not supported",
                other
            )))
        }
    };

    let needed = count * width;
    if bytes.len() < needed {
        return Err(TriageError::Decode(format!(
            "Pixel data holds {} bytes, need {}",
            bytes.len(),
            needed
        )));
    }

    let stored = u32::from(layout.bits_stored.clamp(1, layout.bits_allocated));
    let mask: u64 = (1u64 << stored) - 1;
    let sign_bit: u64 = 1u64 << (stored - 1);

    let samples = bytes[..needed]
        .chunks_exact(width)
        .map(|chunk| {
            let raw = match width {
                1 => u64::from(chunk[0]),
                2 => u64::from(u16::from_le_bytes([chunk[0], chunk[1]])),
                _ => u64::from(u32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]])),
            } & mask;

            if layout.signed && raw & sign_bit != 0 {
                raw as f64 - (1u64 << stored) as f64
            } else {
                raw as f64
            }
        })
        .collect();

    Ok(samples)
}

/// Collapse multi-sample pixels to luminance by averaging channels.
pub fn to_luminance(samples: &[f64], layout: &PixelLayout) -> Vec<f64> {
    let spp = usize::from(layout.samples_per_pixel.max(1));
    if spp == 1 {
        return samples.to_vec();
    }

    let n = layout.pixel_count();
    (0..n)
        .map(|i| {
            let sum: f64 = if layout.planar_configuration == 1 {
                (0..spp).map(|c| samples[c * n + i]).sum()
            } else {
                samples[i * spp..(i + 1) * spp].iter().sum()
            };
            sum / spp as f64
        })
        .collect()
}

/// Build a grayscale frame from raw first-frame pixel bytes.
pub fn frame_from_pixels(
    bytes: &[u8],
    layout: &PixelLayout,
    slope: f64,
    intercept: f64,
    inverted: bool,
) -> Result<GrayFrame, TriageError> {
    if layout.rows == 0 || layout.columns == 0 {
        return Err(TriageError::Decode("Image has zero rows or columns".to_string()));
    }

    let count = layout.pixel_count() * usize::from(layout.samples_per_pixel.max(1));
    let raw = unpack_samples(bytes, layout, count)?;
    let samples = to_luminance(&raw, layout)
        .into_iter()
        .map(|v| v * slope + intercept)
        .collect();

    Ok(GrayFrame {
        width: layout.columns,
        height: layout.rows,
        samples,
        inverted,
        voi: None,
    })
}

/// Decode the first frame of a DICOM file.
#[cfg(feature = "dicom")]
pub fn decode_native(bytes: &[u8]) -> Result<GrayFrame, TriageError> {
    use dicom_core::Tag;

    const SAMPLES_PER_PIXEL: Tag = Tag(0x0028, 0x0002);
    const PHOTOMETRIC_INTERPRETATION: Tag = Tag(0x0028, 0x0004);
    const PLANAR_CONFIGURATION: Tag = Tag(0x0028, 0x0006);
    const ROWS: Tag = Tag(0x0028, 0x0010);
    const COLUMNS: Tag = Tag(0x0028, 0x0011);
    const BITS_ALLOCATED: Tag = Tag(0x0028, 0x0100);
    const BITS_STORED: Tag = Tag(0x0028, 0x0101);
    const PIXEL_REPRESENTATION: Tag = Tag(0x0028, 0x0103);
    const WINDOW_CENTER: Tag = Tag(0x0028, 0x1050);
    const WINDOW_WIDTH: Tag = Tag(0x0028, 0x1051);
    const RESCALE_INTERCEPT: Tag = Tag(0x0028, 0x1052);
    const RESCALE_SLOPE: Tag = Tag(0x0028, 0x1053);
    const VOI_LUT_SEQUENCE: Tag = Tag(0x0028, 0x3010);
    const LUT_DESCRIPTOR: Tag = Tag(0x0028, 0x3002);
    const LUT_DATA: Tag = Tag(0x0028, 0x3006);
    const PIXEL_DATA: Tag = Tag(0x7FE0, 0x0010);

    let body = if super::format::has_native_marker(bytes) {
        &bytes[128..]
    } else if bytes.starts_with(b"DICM") {
        bytes
    } else {
        return Err(TriageError::Decode("Missing DICM marker".to_string()));
    };

    let meta = dicom_object::FileMetaTable::from_reader(body)
        .map_err(|e| TriageError::Decode(format!("Failed to parse DICOM file meta: {}", e)))?;
    let syntax = meta.transfer_syntax().trim_end_matches(['\0', ' ']);
    if !NATIVE_TRANSFER_SYNTAXES.contains(&syntax) {
        return Err(TriageError::UnsupportedFormat(format!(
            "Compressed transfer syntax {} is not supported",
            syntax
        )));
    }

    let obj = dicom_object::from_reader(body)
        .map_err(|e| TriageError::Decode(format!("Failed to parse DICOM: {}", e)))?;

    let uint = |tag: Tag, default: u16| -> Result<u16, TriageError> {
        match obj.element(tag) {
            Ok(elem) => elem
                .to_int::<u16>()
                .map_err(|e| TriageError::Decode(format!("Bad value for {}: {}", tag, e))),
            Err(_) => Ok(default),
        }
    };
    let float = |tag: Tag| -> Option<f64> {
        obj.element(tag)
            .ok()
            .and_then(|e| e.to_multi_float64().ok())
            .and_then(|v| v.first().copied())
    };

    let rows = obj
        .element(ROWS)
        .map_err(|_| TriageError::Decode("Missing Rows".to_string()))?;
    let columns = obj
        .element(COLUMNS)
        .map_err(|_| TriageError::Decode("Missing Columns".to_string()))?;

    let bits_allocated = uint(BITS_ALLOCATED, 16)?;
    let layout = PixelLayout {
        rows: u32::from(
            rows.to_int::<u16>()
                .map_err(|e| TriageError::Decode(format!("Bad Rows: {}", e)))?,
        ),
        columns: u32::from(
            columns
                .to_int::<u16>()
                .map_err(|e| TriageError::Decode(format!("Bad Columns: {}", e)))?,
        ),
        samples_per_pixel: uint(SAMPLES_PER_PIXEL, 1)?,
        planar_configuration: uint(PLANAR_CONFIGURATION, 0)?,
        bits_allocated,
        bits_stored: uint(BITS_STORED, bits_allocated)?,
        signed: uint(PIXEL_REPRESENTATION, 0)? == 1,
    };

    let photometric = obj
        .element(PHOTOMETRIC_INTERPRETATION)
        .ok()
        .and_then(|e| e.to_str().ok())
        .map(|s| s.trim().to_string())
        .unwrap_or_else(|| "MONOCHROME2".to_string());

    let pixel_data = obj
        .element(PIXEL_DATA)
        .map_err(|_| TriageError::Decode("Missing Pixel Data".to_string()))?
        .to_bytes()
        .map_err(|e| TriageError::Decode(format!("Unreadable Pixel Data: {}", e)))?;

    let mut frame = frame_from_pixels(
        &pixel_data,
        &layout,
        float(RESCALE_SLOPE).unwrap_or(1.0),
        float(RESCALE_INTERCEPT).unwrap_or(0.0),
        photometric == "MONOCHROME1",
    )?;

    let lut = obj
        .element(VOI_LUT_SEQUENCE)
        .ok()
        .and_then(|seq| seq.items().and_then(|items| items.first()))
        .and_then(|item| {
            let descriptor = item.element(LUT_DESCRIPTOR).ok()?.to_multi_int::<i32>().ok()?;
            let entries = item.element(LUT_DATA).ok()?.to_multi_float64().ok()?;
            let first_mapped = f64::from(*descriptor.get(1)?);
            Some(VoiTransform::Lut {
                first_mapped,
                entries,
            })
        });

    frame.voi = lut.or_else(|| {
        Some(VoiTransform::Window {
            center: float(WINDOW_CENTER)?,
            width: float(WINDOW_WIDTH)?,
        })
    });

    Ok(frame)
}

#[cfg(not(feature = "dicom"))]
pub fn decode_native(_bytes: &[u8]) -> Result<GrayFrame, TriageError> {
    Err(TriageError::UnsupportedFormat(
        "DICOM support is not compiled in (enable the `dicom` feature)".to_string(),
    ))
}
