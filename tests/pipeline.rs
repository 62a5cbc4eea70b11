//! End-to-end tests through the public API: synthesized camera JPEGs in,
//! upright JPEGs out, with the real pure-Rust backend.
//!
//! Run with: cargo test --test pipeline

use image::ImageEncoder;
use shutterprep::capture::{
    self, ActivationOutcome, CaptureError, CaptureRequest, PendingCapture,
};
use shutterprep::imaging::{
    BackendError, NormalizeRequest, Orientation, Quality, RustBackend, TargetSpec,
    normalize_to_path,
};
use std::path::Path;
use tempfile::TempDir;

fn camera_jpeg(width: u32, height: u32, exif_orientation: Option<u16>) -> Vec<u8> {
    let img = image::RgbImage::from_fn(width, height, |x, y| {
        image::Rgb([(x % 256) as u8, (y % 256) as u8, 64])
    });
    let mut jpeg = Vec::new();
    image::codecs::jpeg::JpegEncoder::new_with_quality(&mut jpeg, 90)
        .write_image(img.as_raw(), width, height, image::ExtendedColorType::Rgb8)
        .unwrap();

    let Some(orientation) = exif_orientation else {
        return jpeg;
    };
    let mut app1 = b"Exif\x00\x00MM\x00\x2A\x00\x00\x00\x08\x00\x01".to_vec();
    app1.extend_from_slice(&[0x01, 0x12, 0x00, 0x03, 0x00, 0x00, 0x00, 0x01]);
    app1.extend_from_slice(&orientation.to_be_bytes());
    app1.extend_from_slice(&[0, 0, 0, 0, 0, 0]);

    let mut out = jpeg[..2].to_vec();
    out.extend_from_slice(&[0xFF, 0xE1]);
    out.extend_from_slice(&((app1.len() + 2) as u16).to_be_bytes());
    out.extend_from_slice(&app1);
    out.extend_from_slice(&jpeg[2..]);
    out
}

fn write_capture(path: &Path, width: u32, height: u32, exif_orientation: Option<u16>) {
    std::fs::write(path, camera_jpeg(width, height, exif_orientation)).unwrap();
}

fn request(quality: u32, width: Option<u32>, height: Option<u32>) -> NormalizeRequest {
    NormalizeRequest {
        quality: Quality::new(quality),
        target: TargetSpec::new(width, height),
    }
}

#[test]
fn rotated_capture_comes_out_upright() {
    let tmp = TempDir::new().unwrap();
    let source = tmp.path().join("raw.jpg");
    let dest = tmp.path().join("out.jpg");
    // Sensor-landscape, tagged "rotate 90 clockwise to display"
    write_capture(&source, 400, 300, Some(6));

    let normalized =
        normalize_to_path(&RustBackend::new(), &source, &dest, &request(80, Some(80), None))
            .unwrap();

    assert_eq!(normalized.orientation, Orientation::Rotate90);
    assert!(normalized.rotated);
    assert_eq!(normalized.sample_factor, 3);
    assert_eq!(image::image_dimensions(&dest).unwrap(), (80, 107));
}

#[test]
fn both_bounds_fit_inside_the_box() {
    let tmp = TempDir::new().unwrap();
    let source = tmp.path().join("raw.jpg");
    let dest = tmp.path().join("out.jpg");
    write_capture(&source, 400, 300, None);

    normalize_to_path(
        &RustBackend::new(),
        &source,
        &dest,
        &request(75, Some(100), Some(100)),
    )
    .unwrap();

    assert_eq!(image::image_dimensions(&dest).unwrap(), (100, 75));
}

#[test]
fn unconstrained_request_keeps_native_size() {
    let tmp = TempDir::new().unwrap();
    let source = tmp.path().join("raw.jpg");
    let dest = tmp.path().join("out.jpg");
    write_capture(&source, 120, 90, Some(8));

    normalize_to_path(&RustBackend::new(), &source, &dest, &request(75, None, None)).unwrap();

    assert_eq!(image::image_dimensions(&dest).unwrap(), (90, 120));
}

#[test]
fn empty_source_fails_without_output() {
    let tmp = TempDir::new().unwrap();
    let source = tmp.path().join("raw.jpg");
    let dest = tmp.path().join("out.jpg");
    std::fs::write(&source, b"").unwrap();

    let err = normalize_to_path(&RustBackend::new(), &source, &dest, &request(75, Some(50), None))
        .unwrap_err();

    assert!(matches!(err, BackendError::Decode(_)), "got {err:?}");
    assert!(!dest.exists());
}

#[test]
fn corrupt_exif_is_treated_as_upright() {
    let tmp = TempDir::new().unwrap();
    let source = tmp.path().join("raw.jpg");
    let dest = tmp.path().join("out.jpg");
    let jpeg = camera_jpeg(200, 100, None);
    let mut bytes = jpeg[..2].to_vec();
    bytes.extend_from_slice(&[0xFF, 0xE1, 0x00, 0x0C]);
    bytes.extend_from_slice(b"Exif\x00\x00MM\x00\x2A");
    bytes.extend_from_slice(&jpeg[2..]);
    std::fs::write(&source, bytes).unwrap();

    let normalized =
        normalize_to_path(&RustBackend::new(), &source, &dest, &request(75, Some(50), None))
            .unwrap();

    assert_eq!(normalized.orientation, Orientation::None);
    assert_eq!(image::image_dimensions(&dest).unwrap(), (50, 25));
}

#[test]
fn capture_session_round_trip() {
    let tmp = TempDir::new().unwrap();
    let cache = tmp.path().join("cache");
    let photos = tmp.path().join("photos");

    let pending =
        PendingCapture::begin(&cache, CaptureRequest::from_raw(70, 60, -1)).unwrap();
    let token = cache.join("pending.json");
    pending.save(&token).unwrap();

    // The camera writes its photo while the process is gone.
    write_capture(&pending.photo_path, 300, 200, Some(3));
    let restored = PendingCapture::restore(&token).unwrap();
    assert_eq!(restored, pending);

    let result = capture::complete(
        &RustBackend::new(),
        Some(&restored),
        ActivationOutcome::Completed,
        &photos,
    )
    .unwrap();

    assert_eq!((result.width, result.height), (60, 40));
    assert!(result.uri.starts_with("file://"));
    assert!(result.path.starts_with(&photos));
    assert!(result.path.exists());
    assert!(!restored.photo_path.exists(), "raw capture should be removed");

    capture::delete_photo(&result.uri).unwrap();
    assert!(!result.path.exists());
}

#[test]
fn cancelled_capture_keeps_raw_file() {
    let tmp = TempDir::new().unwrap();
    let pending = PendingCapture::begin(tmp.path(), CaptureRequest::default()).unwrap();
    write_capture(&pending.photo_path, 64, 48, None);

    let err = capture::complete(
        &RustBackend::new(),
        Some(&pending),
        ActivationOutcome::Cancelled,
        &tmp.path().join("photos"),
    )
    .unwrap_err();

    assert!(matches!(err, CaptureError::Cancelled));
    assert_eq!(err.to_string(), "No Image Selected");
    assert!(pending.photo_path.exists());
}

#[test]
fn missing_session_reports_no_camera() {
    let tmp = TempDir::new().unwrap();
    let err = capture::complete(
        &RustBackend::new(),
        None,
        ActivationOutcome::Completed,
        tmp.path(),
    )
    .unwrap_err();
    assert!(matches!(err, CaptureError::NoCamera));
}
