#![cfg(feature = "mock")]
//! Open, query, close, grab and save, against the in-memory backend.

use framegrab::capture::mock::{bar_at, MockBackend, MockDevice};
use framegrab::output::{BmpSequence, OutputSink};
use framegrab::{Camera, CaptureConfig, CaptureError, PixelFormat, PixelLayout, Resolution};

const DEVICE: &str = "/dev/video0";

fn camera(format: PixelFormat) -> Camera<MockBackend> {
    let backend = MockBackend::new().with_device(
        DEVICE,
        MockDevice::new(Resolution::new(640, 480), format),
    );
    Camera::new(backend, CaptureConfig::default())
}

#[test]
fn query_then_grab_then_save() {
    let camera = camera(PixelFormat::Yuyv);

    let mut handle = camera.open(DEVICE).unwrap();
    let resolution = handle.resolution().unwrap();
    assert_eq!(resolution, Resolution::new(640, 480));
    handle.close().unwrap();
    assert!(matches!(
        handle.close(),
        Err(CaptureError::InvalidHandle { .. })
    ));

    let rgb = camera
        .grab_frame_rgb(DEVICE, resolution.width, resolution.height)
        .unwrap();
    assert_eq!(rgb.shape(), &[480, 640, 3]);

    let gray = camera
        .grab_frame_grayscale(DEVICE, resolution.width, resolution.height)
        .unwrap();
    assert_eq!(gray.shape(), &[480, 640]);
    assert_eq!(camera.backend().live_sources(), 0);

    let dir = tempfile::tempdir().unwrap();
    let mut sink = BmpSequence::new(dir.path().join("test")).unwrap();
    let rgb_path = sink.write_frame(0, "", &rgb).unwrap();
    let gray_path = sink.write_frame(0, "gray", &gray).unwrap();

    let reloaded = image::open(&rgb_path).unwrap().to_rgb8();
    assert_eq!(reloaded.dimensions(), (640, 480));
    assert_eq!(reloaded.as_raw().as_slice(), rgb.as_bytes());

    let reloaded = image::open(&gray_path).unwrap().to_luma8();
    assert_eq!(reloaded.dimensions(), (640, 480));
    assert_eq!(reloaded.as_raw().as_slice(), gray.as_bytes());

    // the device is free again after every grab
    let mut handle = camera.open(DEVICE).unwrap();
    assert_eq!(handle.resolution().unwrap(), resolution);
    handle.close().unwrap();
}

#[test]
fn every_native_format_yields_the_same_geometry() {
    for format in [
        PixelFormat::Yuyv,
        PixelFormat::Uyvy,
        PixelFormat::Rgb24,
        PixelFormat::Bgr24,
        PixelFormat::Grey,
        PixelFormat::Mjpeg,
    ] {
        let camera = camera(format);
        let rgb = camera.grab_frame(DEVICE, Resolution::new(640, 480), PixelLayout::Rgb).unwrap();
        let gray = camera.grab_frame(DEVICE, Resolution::new(640, 480), PixelLayout::Gray).unwrap();
        assert_eq!(rgb.shape(), &[480, 640, 3], "{format}");
        assert_eq!(gray.shape(), &[480, 640], "{format}");
    }
}

#[test]
fn uncompressed_bars_survive_conversion() {
    let camera = camera(PixelFormat::Rgb24);
    let rgb = camera.grab_frame_rgb(DEVICE, 640, 480).unwrap();
    for x in [0, 100, 250, 400, 639] {
        assert_eq!(rgb.pixel(x, 240).unwrap(), &bar_at(x, 640)[..], "column {x}");
    }
}

#[test]
fn wrong_size_is_a_resolution_mismatch() {
    let camera = camera(PixelFormat::Yuyv);
    let err = camera.grab_frame_rgb(DEVICE, 320, 240).unwrap_err();
    match err {
        CaptureError::ResolutionMismatch {
            requested, actual, ..
        } => {
            assert_eq!(requested, Resolution::new(320, 240));
            assert_eq!(actual, Resolution::new(640, 480));
        }
        other => panic!("unexpected error {other:?}"),
    }
    assert!(!camera.is_held(DEVICE));
}

#[test]
fn grabs_fail_while_a_handle_is_open() {
    let camera = camera(PixelFormat::Yuyv);
    let mut handle = camera.open(DEVICE).unwrap();

    assert!(matches!(
        camera.grab_frame_rgb(DEVICE, 640, 480),
        Err(CaptureError::DeviceBusy { .. })
    ));

    handle.close().unwrap();
    camera.grab_frame_rgb(DEVICE, 640, 480).unwrap();
}

#[test]
fn closed_handles_refuse_to_capture() {
    let camera = camera(PixelFormat::Yuyv);
    let mut handle = camera.open(DEVICE).unwrap();
    handle.close().unwrap();

    assert!(matches!(
        handle.capture_rgb(),
        Err(CaptureError::InvalidHandle { .. })
    ));
    assert!(matches!(
        handle.resolution(),
        Err(CaptureError::InvalidHandle { .. })
    ));
}
