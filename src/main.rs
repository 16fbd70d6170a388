use std::path::PathBuf;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use clap::Parser;
use framegrab::capture::CaptureSource;
use framegrab::convert::rgb_to_luma;
use framegrab::output::{BmpSequence, OutputSink};
use framegrab::processing::{self, CropWindow, Direction};
use framegrab::{
    Camera, CaptureConfig, DeviceHandle, FrameBuffer, IoMethod, LumaWeights, PixelFormat,
    PixelLayout, Resolution,
};

const HARRIS_K: f64 = 0.04;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Video capture device
    #[arg(short, long, default_value = "/dev/video0")]
    device: PathBuf,

    /// Number of frames to grab
    #[arg(short, long, default_value_t = 1)]
    count: u32,

    /// Output prefix; frame n is written to PREFIX-n.bmp
    #[arg(short, long, default_value = "frame")]
    output: PathBuf,

    /// Streaming I/O method (mmap or userptr)
    #[arg(long, default_value_t = IoMethod::Mmap)]
    io: IoMethod,

    /// Force a native pixel format (FourCC, e.g. YUYV)
    #[arg(long)]
    format: Option<PixelFormat>,

    /// Frame width; defaults to the device's current format
    #[arg(long, requires = "height")]
    width: Option<u32>,

    /// Frame height; defaults to the device's current format
    #[arg(long, requires = "width")]
    height: Option<u32>,

    /// How long to wait for each frame
    #[arg(long, default_value_t = 2000)]
    timeout_ms: u64,

    /// Driver buffers to queue
    #[arg(long, default_value_t = 4)]
    buffers: u32,

    /// Luma weights: rec709, rec601 or R,G,B
    #[arg(long, default_value = "rec709")]
    luma: LumaWeights,

    /// Also write the grayscale frame
    #[arg(long)]
    gray: bool,

    /// Also write the RGB frame cropped to X0,Y0,X1,Y1
    #[arg(long)]
    crop: Option<CropWindow>,

    /// Also write the grayscale frame blurred with this Gaussian sigma
    #[arg(long)]
    blur: Option<f64>,

    /// Also write the grayscale frame inside a zero border this many pixels wide
    #[arg(long, value_parser = clap::value_parser!(u32).range(1..=1024))]
    pad: Option<u32>,

    /// Also write a Canny edge map
    #[arg(long)]
    edges: bool,

    /// Also write a Harris corner map
    #[arg(long)]
    corners: bool,

    /// Gradient sigma for edges and corners
    #[arg(long, default_value_t = 1.0)]
    sigma: f64,

    /// Gradient magnitude that starts a Canny edge
    #[arg(long, default_value_t = 40.0)]
    edge_high: f64,

    /// Lower hysteresis threshold; weaker pixels never join an edge
    #[arg(long, default_value_t = 20.0)]
    edge_low: f64,

    /// Minimum Harris response for a corner
    #[arg(long, default_value_t = 1e6)]
    corner_threshold: f64,

    /// Enable debug logging
    #[arg(long)]
    debug: bool,
}

impl Args {
    fn config(&self) -> CaptureConfig {
        let config = CaptureConfig::default()
            .with_timeout(Duration::from_millis(self.timeout_ms))
            .with_io_method(self.io)
            .with_buffer_count(self.buffers)
            .with_luma(self.luma);
        match self.format {
            Some(format) => config.with_pixel_format(format),
            None => config,
        }
    }

    fn wants_gray(&self) -> bool {
        self.gray || self.blur.is_some() || self.pad.is_some() || self.edges || self.corners
    }
}

fn main() -> Result<()> {
    let args = Args::parse();

    let log_level = if args.debug {
        tracing::Level::DEBUG
    } else {
        tracing::Level::INFO
    };

    tracing_subscriber::fmt()
        .with_max_level(log_level)
        .with_target(false)
        .init();

    tracing::info!("framegrab starting");
    tracing::info!("Device: {}", args.device.display());
    tracing::info!("I/O method: {}", args.io);

    let camera = Camera::v4l2(args.config());

    let resolution = match (args.width, args.height) {
        (Some(width), Some(height)) => Resolution::new(width, height),
        _ => camera
            .resolution(&args.device)
            .with_context(|| format!("Failed to query {}", args.device.display()))?,
    };
    tracing::info!("Capture: {}", resolution);

    let mut sink = BmpSequence::new(&args.output).context("Invalid output prefix")?;

    let mut handle = camera
        .open(&args.device)
        .with_context(|| format!("Failed to open {}", args.device.display()))?;
    if let Err(e) = log_formats(&handle) {
        tracing::warn!("{:#}", e);
    }
    let result = handle
        .negotiate(resolution)
        .context("Failed to negotiate capture format")
        .and_then(|format| {
            tracing::info!("Native format: {}", format);
            run_capture(&mut handle, &mut sink, &args)
        });
    handle.close().context("Failed to close device")?;
    result
}

/// Logs the native formats the device advertises.
fn log_formats<S: CaptureSource>(handle: &DeviceHandle<S>) -> Result<usize> {
    let formats = handle
        .supported_formats()
        .context("Failed to list native formats")?;
    tracing::info!(
        "{} advertises {} format(s)",
        handle.path().display(),
        formats.len()
    );
    for (format, description) in &formats {
        tracing::info!("  {} ({})", format, description);
    }
    Ok(formats.len())
}

fn run_capture<S, O>(handle: &mut DeviceHandle<S>, sink: &mut O, args: &Args) -> Result<()>
where
    S: CaptureSource,
    O: OutputSink,
{
    let mut total_capture_time = Duration::ZERO;
    let mut total_process_time = Duration::ZERO;
    let mut total_output_time = Duration::ZERO;

    for index in 0..args.count {
        let capture_start = Instant::now();
        let frame = handle
            .capture_rgb()
            .with_context(|| format!("Failed to capture frame {index}"))?;
        let capture_time = capture_start.elapsed();
        total_capture_time += capture_time;

        let process_start = Instant::now();
        let variants = derive_variants(&frame, args)?;
        let process_time = process_start.elapsed();
        total_process_time += process_time;

        let output_start = Instant::now();
        let path = sink
            .write_frame(index, "", &frame)
            .context("Failed to write frame")?;
        tracing::info!("Wrote {}", path.display());
        for (variant, image) in &variants {
            let path = sink
                .write_frame(index, variant, image)
                .with_context(|| format!("Failed to write {variant} frame"))?;
            tracing::debug!("Wrote {}", path.display());
        }
        let output_time = output_start.elapsed();
        total_output_time += output_time;

        tracing::info!(
            "Frame {}: capture={:.1}ms, process={:.1}ms, output={:.1}ms",
            index,
            capture_time.as_secs_f64() * 1000.0,
            process_time.as_secs_f64() * 1000.0,
            output_time.as_secs_f64() * 1000.0
        );
    }

    if args.count > 1 {
        let frames = f64::from(args.count);
        tracing::info!(
            "Average over {} frames: capture={:.1}ms, process={:.1}ms, output={:.1}ms",
            args.count,
            total_capture_time.as_secs_f64() * 1000.0 / frames,
            total_process_time.as_secs_f64() * 1000.0 / frames,
            total_output_time.as_secs_f64() * 1000.0 / frames
        );
    }
    Ok(())
}

/// Extra outputs requested on the command line, keyed by file suffix.
fn derive_variants(rgb: &FrameBuffer, args: &Args) -> Result<Vec<(&'static str, FrameBuffer)>> {
    let mut variants = Vec::new();

    if let Some(window) = args.crop {
        variants.push(("cropped", processing::crop(rgb, window)?));
    }

    if !args.wants_gray() {
        return Ok(variants);
    }
    let gray = FrameBuffer::new(
        rgb.resolution(),
        PixelLayout::Gray,
        rgb_to_luma(rgb.as_bytes(), &args.luma),
    )?;

    if let Some(sigma) = args.blur {
        variants.push(("gray-blurred", processing::gaussian_blur(&gray, sigma)?));
    }
    if let Some(pad) = args.pad {
        let plane = processing::to_plane(&gray)?;
        let padded = processing::zero_pad(plane.view(), pad as usize, Direction::Both);
        variants.push(("gray-padded", processing::from_plane(&padded)?));
    }
    if args.edges {
        let edges = processing::canny_edges(&gray, args.sigma, args.edge_high, args.edge_low)?;
        variants.push(("gray-edges", edges));
    }
    if args.corners {
        let corners = processing::harris_corners(
            &gray,
            args.sigma,
            2.0 * args.sigma,
            HARRIS_K,
            args.corner_threshold,
        )?;
        variants.push(("gray-corners", corners));
    }
    if args.gray {
        variants.push(("gray", gray));
    }
    Ok(variants)
}
