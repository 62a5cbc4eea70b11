//! Shared test utilities for the shutterprep test suite.
//!
//! Synthesizes camera-like JPEGs on disk, optionally carrying an EXIF
//! orientation tag, so pipeline tests never need binary fixtures.
//!
//! # Usage
//!
//! ```ignore
//! use crate::test_helpers::*;
//!
//! let tmp = tempfile::TempDir::new().unwrap();
//! let path = tmp.path().join("capture.jpg");
//! create_test_jpeg_with_orientation(&path, 400, 300, 6);
//! ```

use image::{ImageEncoder, RgbImage};
use std::path::Path;

// =========================================================================
// Pixel data
// =========================================================================

/// Gradient image so resampling and rotation have something to move.
pub fn gradient(width: u32, height: u32) -> RgbImage {
    RgbImage::from_fn(width, height, |x, y| {
        image::Rgb([(x % 256) as u8, (y % 256) as u8, 128])
    })
}

/// Encode `gradient(width, height)` as JPEG bytes.
pub fn jpeg_bytes(width: u32, height: u32) -> Vec<u8> {
    let img = gradient(width, height);
    let mut bytes = Vec::new();
    image::codecs::jpeg::JpegEncoder::new_with_quality(&mut bytes, 90)
        .write_image(img.as_raw(), width, height, image::ExtendedColorType::Rgb8)
        .unwrap();
    bytes
}

// =========================================================================
// EXIF
// =========================================================================

/// Big-endian TIFF block with a single IFD0 entry: Orientation (0x0112).
pub fn exif_orientation_block(orientation: u16) -> Vec<u8> {
    let mut tiff = Vec::new();
    tiff.extend_from_slice(b"MM\x00\x2A");
    tiff.extend_from_slice(&8u32.to_be_bytes()); // IFD0 offset
    tiff.extend_from_slice(&1u16.to_be_bytes()); // entry count
    tiff.extend_from_slice(&0x0112u16.to_be_bytes());
    tiff.extend_from_slice(&3u16.to_be_bytes()); // SHORT
    tiff.extend_from_slice(&1u32.to_be_bytes());
    tiff.extend_from_slice(&orientation.to_be_bytes());
    tiff.extend_from_slice(&[0, 0]); // value padding
    tiff.extend_from_slice(&0u32.to_be_bytes()); // no next IFD
    tiff
}

/// Insert an APP1 segment carrying `payload` right after SOI.
pub fn with_app1(jpeg: &[u8], payload: &[u8]) -> Vec<u8> {
    assert_eq!(&jpeg[..2], b"\xFF\xD8", "not a JPEG");
    let mut segment = Vec::new();
    segment.extend_from_slice(b"Exif\x00\x00");
    segment.extend_from_slice(payload);

    let mut out = Vec::with_capacity(jpeg.len() + segment.len() + 4);
    out.extend_from_slice(&jpeg[..2]);
    out.extend_from_slice(b"\xFF\xE1");
    out.extend_from_slice(&((segment.len() + 2) as u16).to_be_bytes());
    out.extend_from_slice(&segment);
    out.extend_from_slice(&jpeg[2..]);
    out
}

// =========================================================================
// Fixture files
// =========================================================================

/// Write a plain JPEG with no metadata.
pub fn create_test_jpeg(path: &Path, width: u32, height: u32) {
    std::fs::write(path, jpeg_bytes(width, height)).unwrap();
}

/// Write a JPEG tagged with the given raw EXIF orientation value.
pub fn create_test_jpeg_with_orientation(path: &Path, width: u32, height: u32, exif: u16) {
    let bytes = with_app1(&jpeg_bytes(width, height), &exif_orientation_block(exif));
    std::fs::write(path, bytes).unwrap();
}

/// Write a JPEG whose EXIF segment is truncated garbage but whose pixels decode.
pub fn create_test_jpeg_with_corrupt_exif(path: &Path, width: u32, height: u32) {
    let bytes = with_app1(&jpeg_bytes(width, height), b"MM\x00\x2A\xFF\xFF");
    std::fs::write(path, bytes).unwrap();
}
