use std::io::{Cursor, Write};
use std::path::Path;

use image::{DynamicImage, ImageFormat, RgbImage};
use pulmo_triage::imaging::{
    detect_format, detect_format_path, Equalization, ImageNormalizer, InputFormat, NormalizerConfig,
};
use pulmo_triage::TriageError;

fn dicm_bytes() -> Vec<u8> {
    let mut bytes = vec![0u8; 128];
    bytes.extend_from_slice(b"DICM");
    bytes.extend_from_slice(&[0u8; 256]);
    bytes
}

fn png(width: u32, height: u32) -> Vec<u8> {
    let mut buffer = Cursor::new(Vec::new());
    DynamicImage::ImageRgb8(RgbImage::new(width, height))
        .write_to(&mut buffer, ImageFormat::Png)
        .unwrap();
    buffer.into_inner()
}

#[test]
fn test_png_extension_never_native() {
    assert_eq!(detect_format(Path::new("xray.png"), &dicm_bytes()), InputFormat::StandardRaster);

    let result = ImageNormalizer::default().normalize(Path::new("xray.png"), &dicm_bytes());
    assert!(matches!(result, Err(TriageError::Decode(_))));
}

#[test]
fn test_no_extension_with_marker_is_native() {
    assert_eq!(detect_format(Path::new("xray"), &dicm_bytes()), InputFormat::NativeRadiograph);
}

#[test]
fn test_detect_format_by_path() {
    let dir = tempfile::tempdir().unwrap();

    let native = dir.path().join("upload");
    std::fs::File::create(&native).unwrap().write_all(&dicm_bytes()).unwrap();
    assert_eq!(detect_format_path(&native).unwrap(), InputFormat::NativeRadiograph);

    let raster = dir.path().join("upload.png");
    std::fs::File::create(&raster).unwrap().write_all(&dicm_bytes()).unwrap();
    assert_eq!(detect_format_path(&raster).unwrap(), InputFormat::StandardRaster);
}

#[test]
fn test_raster_normalized_to_square_jpeg() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("chest.png");
    std::fs::write(&path, png(300, 200)).unwrap();

    let normalizer = ImageNormalizer::new(NormalizerConfig {
        target_size: Some(256),
        ..NormalizerConfig::default()
    });
    let image = normalizer.normalize_file(&path).unwrap();

    assert_eq!((image.width(), image.height()), (256, 256));
    assert_eq!(&image.jpeg[..2], &[0xFF, 0xD8]);
    let decoded = image::load_from_memory(&image.jpeg).unwrap();
    assert_eq!((decoded.width(), decoded.height()), (256, 256));
}

#[cfg(feature = "dicom")]
mod native {
    use super::*;

    const EXPLICIT_VR_LE: &str = "1.2.840.10008.1.2.1";
    const JPEG_BASELINE: &str = "1.2.840.10008.1.2.4.50";

    /// One explicit-VR little-endian data element.
    fn element(out: &mut Vec<u8>, group: u16, elem: u16, vr: &[u8; 2], value: &[u8]) {
        let mut value = value.to_vec();
        if value.len() % 2 == 1 {
            value.push(if vr == b"UI" || vr == b"OB" || vr == b"OW" { 0 } else { b' ' });
        }

        out.extend_from_slice(&group.to_le_bytes());
        out.extend_from_slice(&elem.to_le_bytes());
        out.extend_from_slice(vr);
        if matches!(vr, b"OB" | b"OW" | b"SQ" | b"UN" | b"UT") {
            out.extend_from_slice(&[0, 0]);
            out.extend_from_slice(&(value.len() as u32).to_le_bytes());
        } else {
            out.extend_from_slice(&(value.len() as u16).to_le_bytes());
        }
        out.extend_from_slice(&value);
    }

    /// VOI attributes to embed alongside the ramp.
    #[derive(Default)]
    struct Voi<'a> {
        /// Window Center / Window Width as DS strings
        window: Option<(&'a str, &'a str)>,
        /// LUT entries mapped from stored value 0
        lut: Option<&'a [u16]>,
    }

    /// Minimal DX file holding a 12-bit horizontal ramp (0, 16, .., 4080).
    fn ramp_dicom(photometric: &str, transfer_syntax: &str) -> Vec<u8> {
        ramp_dicom_with_voi(photometric, transfer_syntax, Voi::default())
    }

    fn ramp_dicom_with_voi(photometric: &str, transfer_syntax: &str, voi: Voi) -> Vec<u8> {
        let (rows, cols) = (4u16, 256u16);

        let mut meta = Vec::new();
        element(&mut meta, 0x0002, 0x0001, b"OB", &[0, 1]);
        element(&mut meta, 0x0002, 0x0002, b"UI", b"1.2.840.10008.5.1.4.1.1.1.1");
        element(&mut meta, 0x0002, 0x0003, b"UI", b"1.2.826.0.1.3680043.2.1125.1");
        element(&mut meta, 0x0002, 0x0010, b"UI", transfer_syntax.as_bytes());
        element(&mut meta, 0x0002, 0x0012, b"UI", b"1.2.826.0.1.3680043.2.1125.2");

        let pixels: Vec<u8> = (0..rows)
            .flat_map(|_| (0..cols).map(|c| c * 16))
            .flat_map(|v| v.to_le_bytes())
            .collect();

        let mut data = Vec::new();
        element(&mut data, 0x0028, 0x0002, b"US", &1u16.to_le_bytes());
        element(&mut data, 0x0028, 0x0004, b"CS", photometric.as_bytes());
        element(&mut data, 0x0028, 0x0010, b"US", &rows.to_le_bytes());
        element(&mut data, 0x0028, 0x0011, b"US", &cols.to_le_bytes());
        element(&mut data, 0x0028, 0x0100, b"US", &16u16.to_le_bytes());
        element(&mut data, 0x0028, 0x0101, b"US", &12u16.to_le_bytes());
        element(&mut data, 0x0028, 0x0102, b"US", &11u16.to_le_bytes());
        element(&mut data, 0x0028, 0x0103, b"US", &0u16.to_le_bytes());
        if let Some((center, width)) = voi.window {
            element(&mut data, 0x0028, 0x1050, b"DS", center.as_bytes());
            element(&mut data, 0x0028, 0x1051, b"DS", width.as_bytes());
        }
        if let Some(entries) = voi.lut {
            let descriptor: Vec<u8> = [entries.len() as u16, 0, 16].iter().flat_map(|v| v.to_le_bytes()).collect();
            let lut_data: Vec<u8> = entries.iter().flat_map(|v| v.to_le_bytes()).collect();

            let mut item_body = Vec::new();
            element(&mut item_body, 0x0028, 0x3002, b"US", &descriptor);
            element(&mut item_body, 0x0028, 0x3006, b"OW", &lut_data);

            let mut sequence = Vec::new();
            sequence.extend_from_slice(&0xFFFEu16.to_le_bytes());
            sequence.extend_from_slice(&0xE000u16.to_le_bytes());
            sequence.extend_from_slice(&(item_body.len() as u32).to_le_bytes());
            sequence.extend_from_slice(&item_body);
            element(&mut data, 0x0028, 0x3010, b"SQ", &sequence);
        }
        element(&mut data, 0x7FE0, 0x0010, b"OW", &pixels);

        let mut file = vec![0u8; 128];
        file.extend_from_slice(b"DICM");
        element(&mut file, 0x0002, 0x0000, b"UL", &(meta.len() as u32).to_le_bytes());
        file.extend_from_slice(&meta);
        file.extend_from_slice(&data);
        file
    }

    fn plain_normalizer() -> ImageNormalizer {
        ImageNormalizer::new(NormalizerConfig {
            target_size: None,
            equalization: Equalization::None,
            ..NormalizerConfig::default()
        })
    }

    #[test]
    fn test_monochrome1_is_complement_of_monochrome2() {
        let normalizer = plain_normalizer();
        let plain = normalizer
            .normalize(Path::new("ramp.dcm"), &ramp_dicom("MONOCHROME2", EXPLICIT_VR_LE))
            .unwrap();
        let inverted = normalizer
            .normalize(Path::new("ramp.dcm"), &ramp_dicom("MONOCHROME1", EXPLICIT_VR_LE))
            .unwrap();

        assert_eq!(plain.source, InputFormat::NativeRadiograph);
        assert_eq!((plain.width(), plain.height()), (256, 4));
        for (a, b) in plain.pixels.pixels().zip(inverted.pixels.pixels()) {
            for c in 0..3 {
                assert_eq!(u16::from(a[c]) + u16::from(b[c]), 255);
            }
        }
        assert_eq!(plain.pixels.get_pixel(0, 0)[0], 0);
        assert_eq!(plain.pixels.get_pixel(255, 0)[0], 255);
    }

    #[test]
    fn test_window_saturates_outside_range() {
        let bytes = ramp_dicom_with_voi(
            "MONOCHROME2",
            EXPLICIT_VR_LE,
            Voi {
                window: Some(("2048", "96")),
                ..Voi::default()
            },
        );
        let image = plain_normalizer().normalize(Path::new("ramp.dcm"), &bytes).unwrap();

        // Ramp values 0..=2000 sit below the window, 2096.. above it.
        for col in [0, 64, 100, 125] {
            assert_eq!(image.pixels.get_pixel(col, 0)[0], 0, "column {}", col);
        }
        for col in [131, 200, 255] {
            assert_eq!(image.pixels.get_pixel(col, 0)[0], 255, "column {}", col);
        }
        let ramp = (0..256).filter(|&c| !matches!(image.pixels.get_pixel(c, 0)[0], 0 | 255)).count();
        assert!(ramp <= 5, "{} columns inside the window", ramp);
    }

    #[test]
    fn test_voi_lut_wins_over_window() {
        let inverse: Vec<u16> = (0..4096u16).map(|v| 4095 - v).collect();
        let bytes = ramp_dicom_with_voi(
            "MONOCHROME2",
            EXPLICIT_VR_LE,
            Voi {
                window: Some(("2048", "96")),
                lut: Some(&inverse),
            },
        );
        let image = plain_normalizer().normalize(Path::new("ramp.dcm"), &bytes).unwrap();

        assert_eq!(image.pixels.get_pixel(0, 0)[0], 255);
        assert_eq!(image.pixels.get_pixel(255, 0)[0], 0);
        let (a, b) = (image.pixels.get_pixel(100, 0)[0], image.pixels.get_pixel(101, 0)[0]);
        assert!(a > b && a != 0 && a != 255, "LUT ramp expected, got {} {}", a, b);
    }

    #[test]
    fn test_native_detected_without_extension() {
        let image = plain_normalizer()
            .normalize(Path::new("upload"), &ramp_dicom("MONOCHROME2", EXPLICIT_VR_LE))
            .unwrap();
        assert_eq!(image.source, InputFormat::NativeRadiograph);
    }

    #[test]
    fn test_native_resized_to_square() {
        let normalizer = ImageNormalizer::new(NormalizerConfig {
            target_size: Some(64),
            equalization: Equalization::Adaptive,
            ..NormalizerConfig::default()
        });
        let image = normalizer
            .normalize(Path::new("ramp.dcm"), &ramp_dicom("MONOCHROME2", EXPLICIT_VR_LE))
            .unwrap();
        assert_eq!((image.width(), image.height()), (64, 64));
        assert_eq!(&image.jpeg[..2], &[0xFF, 0xD8]);
    }

    #[test]
    fn test_compressed_transfer_syntax_unsupported() {
        let result = plain_normalizer().normalize(Path::new("ramp.dcm"), &ramp_dicom("MONOCHROME2", JPEG_BASELINE));
        assert!(matches!(result, Err(TriageError::UnsupportedFormat(_))));
    }

    #[test]
    fn test_truncated_native_is_decode_error() {
        let mut bytes = ramp_dicom("MONOCHROME2", EXPLICIT_VR_LE);
        bytes.truncate(150);
        let result = plain_normalizer().normalize(Path::new("ramp.dcm"), &bytes);
        assert!(matches!(result, Err(TriageError::Decode(_))));
    }
}
