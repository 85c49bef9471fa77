//! Input format detection.
//!
//! Extension wins; header sniffing only runs when the extension is missing
//! or unrecognized.

use std::fs::File;
use std::io::Read;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::TriageError;

/// Extensions routed to the native radiograph decoder.
pub const NATIVE_EXTENSIONS: [&str; 2] = ["dcm", "dicom"];
/// Extensions routed to the standard raster decoder.
pub const RASTER_EXTENSIONS: [&str; 5] = ["jpg", "jpeg", "png", "bmp", "gif"];

const MAGIC_OFFSET: usize = 128;
const MAGIC: &[u8; 4] = b"DICM";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InputFormat {
    /// DICOM radiograph
    NativeRadiograph,
    /// JPEG, PNG, BMP or GIF
    StandardRaster,
}

/// True when the 4-byte `DICM` marker sits right after the 128-byte preamble.
pub fn has_native_marker(header: &[u8]) -> bool {
    header.get(MAGIC_OFFSET..MAGIC_OFFSET + MAGIC.len()) == Some(MAGIC.as_slice())
}

/// Decide how to decode an upload from its name and leading bytes.
pub fn detect_format(file_name: &Path, header: &[u8]) -> InputFormat {
    let extension = file_name
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase());

    match extension.as_deref() {
        Some(ext) if NATIVE_EXTENSIONS.contains(&ext) => InputFormat::NativeRadiograph,
        Some(ext) if RASTER_EXTENSIONS.contains(&ext) => InputFormat::StandardRaster,
        _ if has_native_marker(header) => InputFormat::NativeRadiograph,
        _ => InputFormat::StandardRaster,
    }
}

/// Same as [`detect_format`], reading only the header bytes from disk.
pub fn detect_format_path(path: &Path) -> Result<InputFormat, TriageError> {
    let mut header = Vec::with_capacity(MAGIC_OFFSET + MAGIC.len());
    File::open(path)?
        .take((MAGIC_OFFSET + MAGIC.len()) as u64)
        .read_to_end(&mut header)?;
    Ok(detect_format(path, &header))
}
