//! CLI application for face detection and pupil localization.
//!
//! Usage:
//!   pico-face <image>...                      # Human-readable output
//!   pico-face <image>... --json               # JSON output
//!   pico-face frames/*.png --video            # Fuse consecutive frames
//!   pico-face <image> --puploc puploc.bin     # Also locate pupils

use clap::Parser;
use pico_face::{pico, DetectorConfig, Face, FaceDetector, ImageBuffer};
use serde::Serialize;
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "pico-face")]
#[command(author, version, about = "PICO face detection and pupil localization", long_about = None)]
struct Args {
    /// Input image files
    #[arg(required = true)]
    images: Vec<PathBuf>,

    /// Output as JSON
    #[arg(short, long)]
    json: bool,

    /// Output file (default: stdout)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Face cascade model path (raw or .bz2)
    #[arg(long, default_value = "facefinder")]
    cascade: PathBuf,

    /// Pupil localizer model path (raw or .bz2)
    #[arg(long)]
    puploc: Option<PathBuf>,

    /// Detector configuration (JSON); flags below override it
    #[arg(long)]
    config: Option<PathBuf>,

    /// Treat the images as consecutive video frames of one session
    #[arg(long)]
    video: bool,

    /// Minimum face size for detection
    #[arg(long)]
    min_size: Option<f64>,

    /// Maximum face size for detection
    #[arg(long)]
    max_size: Option<f64>,

    /// Clusters must score above this to be reported
    #[arg(long)]
    quality: Option<f64>,

    /// Seed for pupil localization jitter
    #[arg(long)]
    seed: Option<u64>,

    /// Show verbose output
    #[arg(short, long)]
    verbose: bool,
}

/// Output structure for JSON serialization
#[derive(Serialize)]
struct Output {
    images: Vec<ImageOutput>,
}

#[derive(Serialize)]
struct ImageOutput {
    image: String,
    width: usize,
    height: usize,
    faces_detected: usize,
    faces: Vec<FaceOutput>,
}

#[derive(Serialize)]
struct FaceOutput {
    /// Face index (1-based)
    index: usize,
    row: f64,
    col: f64,
    /// Window side in pixels
    scale: f64,
    quality: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pupils: Option<PupilsOutput>,
}

#[derive(Serialize)]
struct PupilsOutput {
    left: [f64; 2],
    right: [f64; 2],
}

impl From<(usize, &Face)> for FaceOutput {
    fn from((i, face): (usize, &Face)) -> Self {
        let det = &face.detection;
        Self {
            index: i + 1,
            row: det.row,
            col: det.col,
            scale: det.scale,
            quality: det.quality,
            pupils: face.pupils.map(|[l, r]| PupilsOutput {
                left: [l.row, l.col],
                right: [r.row, r.col],
            }),
        }
    }
}

fn main() {
    let args = Args::parse();

    let default_level = if args.verbose { "debug" } else { "warn" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with_writer(std::io::stderr)
        .init();

    if let Err(e) = run(&args) {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

fn build_config(args: &Args) -> pico_face::Result<DetectorConfig> {
    let mut config = match &args.config {
        Some(path) => DetectorConfig::from_json_file(path)?,
        None => DetectorConfig::default(),
    };
    if let Some(v) = args.min_size {
        config.cascade.min_size = v;
    }
    if let Some(v) = args.max_size {
        config.cascade.max_size = v;
    }
    if let Some(v) = args.quality {
        config.quality_threshold = v;
    }
    if args.seed.is_some() {
        config.seed = args.seed;
    }
    Ok(config)
}

fn load_frame(path: &Path) -> Result<ImageBuffer, Box<dyn std::error::Error>> {
    let rgba = image::open(path)?.to_rgba8();
    let (width, height) = rgba.dimensions();
    Ok(ImageBuffer::from_rgba(rgba.as_raw(), height as usize, width as usize)?)
}

fn run(args: &Args) -> Result<(), Box<dyn std::error::Error>> {
    tracing::info!(path = %args.cascade.display(), "loading face cascade");
    let cascade = pico::load_cascade(&args.cascade)?;

    let mut detector = FaceDetector::new(cascade, build_config(args)?)?;
    if let Some(path) = &args.puploc {
        tracing::info!(path = %path.display(), "loading pupil localizer");
        detector = detector.with_localizer(pico::load_localizer(path)?);
    }

    let mut session = if args.video {
        Some(detector.start_session()?)
    } else {
        None
    };

    let mut images = Vec::with_capacity(args.images.len());
    for path in &args.images {
        let frame = load_frame(path)?;
        let faces = match session.as_mut() {
            Some(session) => session.process_frame(&frame).unwrap_or_default(),
            None => detector.detect_image(&frame),
        };
        tracing::info!(image = %path.display(), faces = faces.len(), "processed image");

        images.push(ImageOutput {
            image: path.display().to_string(),
            width: frame.ncols(),
            height: frame.nrows(),
            faces_detected: faces.len(),
            faces: faces.iter().enumerate().map(FaceOutput::from).collect(),
        });
    }
    if let Some(session) = session.as_mut() {
        session.stop();
    }

    let output = Output { images };

    // Generate output
    let output_str = if args.json {
        serde_json::to_string_pretty(&output)?
    } else {
        format_human_readable(&output)
    };

    // Write output
    if let Some(ref path) = args.output {
        std::fs::write(path, &output_str)?;
        tracing::info!(path = %path.display(), "output written");
    } else {
        println!("{}", output_str);
    }

    Ok(())
}

fn format_human_readable(output: &Output) -> String {
    let mut s = String::new();

    for image in &output.images {
        s.push_str(&format!("Image: {} ({}x{})\n", image.image, image.width, image.height));
        s.push_str(&format!("Faces detected: {}\n", image.faces_detected));

        if image.faces.is_empty() {
            s.push_str("\nNo faces found.\n\n");
            continue;
        }

        for face in &image.faces {
            s.push_str(&format!("\n--- Face {} ---\n", face.index));
            s.push_str(&format!("Center:  ({:.1}, {:.1})\n", face.col, face.row));
            s.push_str(&format!("Size:    {:.1}px\n", face.scale));
            s.push_str(&format!("Quality: {:.2}\n", face.quality));
            if let Some(p) = &face.pupils {
                s.push_str(&format!(
                    "Pupils:  L ({:.1}, {:.1})  R ({:.1}, {:.1})\n",
                    p.left[1], p.left[0], p.right[1], p.right[0]
                ));
            }
        }
        s.push('\n');
    }

    s
}
