use std::{
    path::{Path, PathBuf},
    sync::Arc,
};

use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::Shell;
use colored::Colorize;
use indicatif::{ProgressBar, ProgressStyle};
use serde_json::json;
use videoboost::{
    DEFAULT_SCALE_FACTOR, FailurePolicy, FfmpegLogLevel, FfmpegSource, InferenceProvider,
    PixelLayout, ProgressCallback, ProgressInfo, ResampleProvider, TensorShape, UpscaleOptions,
    VideoCodec, VideoUpscaler,
};

const CLI_AFTER_HELP: &str = "Examples:\n  videoboost upscale input.mp4 --out output.mp4 --progress\n  videoboost upscale input.mov --scale 2 --codec h265 --on-failure retry:2\n  videoboost probe input.mp4 --json\n  videoboost completions zsh > _videoboost";

#[derive(Debug, Parser)]
#[command(
    name = "videoboost",
    version,
    about = "Upscale videos frame by frame through a super-resolution model",
    after_help = CLI_AFTER_HELP
)]
struct Cli {
    #[command(flatten)]
    global: GlobalOptions,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Parser, Clone, Default)]
struct GlobalOptions {
    /// Show debug logging (RUST_LOG takes precedence).
    #[arg(long, global = true)]
    verbose: bool,

    /// Show a progress bar while upscaling.
    #[arg(long, global = true)]
    progress: bool,

    /// Allow overwriting an existing output file.
    #[arg(long, global = true)]
    overwrite: bool,

    /// FFmpeg log level (quiet, panic, fatal, error, warning, info, verbose, debug, trace).
    #[arg(long, global = true, default_value = "quiet")]
    log_level: String,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Upscale a video file.
    #[command(
        about = "Upscale a video",
        after_help = "Examples:\n  videoboost upscale input.mp4 --out big.mp4\n  videoboost upscale input.mp4 --model esrgan.onnx --model-size 256"
    )]
    Upscale {
        /// Input video path.
        input: PathBuf,
        /// Output container path (default: <temp dir>/<stem>_x<scale>.mp4).
        #[arg(long)]
        out: Option<PathBuf>,
        /// Output dimensions are the input dimensions times this factor.
        #[arg(long, default_value_t = DEFAULT_SCALE_FACTOR)]
        scale: u32,
        /// Output codec: h264 | h265 | mpeg4.
        #[arg(long, default_value = "h264")]
        codec: String,
        /// Constant Rate Factor (0-51, lower is better).
        #[arg(long)]
        crf: Option<u32>,
        /// Target bitrate in bits per second. Overrides --crf.
        #[arg(long)]
        bitrate: Option<usize>,
        /// What to do with a frame that fails: skip | abort | hold | retry[:N].
        #[arg(long, default_value = "skip")]
        on_failure: String,
        /// Square model input size in pixels.
        #[arg(long, default_value_t = 256)]
        model_size: usize,
        /// ONNX super-resolution model (requires the `onnx` feature).
        #[arg(long)]
        model: Option<PathBuf>,
    },

    /// Print the video track of a file.
    #[command(
        about = "Print video track metadata",
        visible_alias = "info",
        after_help = "Examples:\n  videoboost probe input.mp4\n  videoboost probe input.mp4 --json"
    )]
    Probe {
        /// Input video path.
        input: PathBuf,
        /// Output metadata as machine-readable JSON.
        #[arg(long)]
        json: bool,
    },

    /// Generate shell completion scripts.
    #[command(about = "Generate shell completions")]
    Completions {
        /// Target shell.
        shell: Shell,
    },
}

fn parse_codec(value: &str) -> Option<VideoCodec> {
    match value.to_ascii_lowercase().as_str() {
        "h264" | "avc" | "x264" => Some(VideoCodec::H264),
        "h265" | "hevc" | "x265" => Some(VideoCodec::H265),
        "mpeg4" | "mp4v" => Some(VideoCodec::Mpeg4),
        _ => None,
    }
}

fn parse_failure_policy(value: &str) -> Option<FailurePolicy> {
    let value = value.to_ascii_lowercase();
    match value.split_once(':') {
        Some(("retry", attempts)) => attempts
            .parse()
            .ok()
            .map(|attempts| FailurePolicy::Retry { attempts }),
        Some(_) => None,
        None => match value.as_str() {
            "skip" | "drop" => Some(FailurePolicy::Skip),
            "abort" | "fail" => Some(FailurePolicy::Abort),
            "hold" | "hold-previous" | "repeat" => Some(FailurePolicy::HoldPrevious),
            "retry" => Some(FailurePolicy::Retry { attempts: 1 }),
            _ => None,
        },
    }
}

fn ensure_writable_path(path: &Path, overwrite: bool) -> Result<(), Box<dyn std::error::Error>> {
    if !path.exists() {
        return Ok(());
    }
    if !overwrite {
        return Err(format!(
            "output already exists: {} (use --overwrite to replace)",
            path.display()
        )
        .into());
    }
    eprintln!(
        "{} {}",
        "warning:".yellow().bold(),
        format!("overwriting {}", path.display()).yellow()
    );
    Ok(())
}

fn apply_global_options(global: &GlobalOptions) -> Result<(), Box<dyn std::error::Error>> {
    let default_filter = if global.verbose { "debug" } else { "warn" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_filter))
        .init();

    let level: FfmpegLogLevel = global
        .log_level
        .parse()
        .map_err(|error: String| format!("unsupported --log-level: {error}"))?;
    videoboost::set_ffmpeg_log_level(level);
    Ok(())
}

fn load_provider(
    model: Option<&Path>,
    model_size: usize,
    scale: u32,
) -> Result<Box<dyn InferenceProvider>, Box<dyn std::error::Error>> {
    if model_size == 0 {
        return Err("--model-size must be greater than 0".into());
    }

    match model {
        #[cfg(feature = "onnx")]
        Some(path) => Ok(Box::new(videoboost::OnnxProvider::load(
            path, model_size, model_size,
        )?)),
        #[cfg(not(feature = "onnx"))]
        Some(_) => Err("--model requires building with the `onnx` feature".into()),
        None => {
            let shape = TensorShape::image(3, model_size, model_size);
            Ok(Box::new(ResampleProvider::new(shape, scale as usize)?))
        }
    }
}

/// Drives an indicatif bar from pipeline progress.
struct TerminalProgress {
    bar: ProgressBar,
}

impl TerminalProgress {
    fn new() -> Result<Self, Box<dyn std::error::Error>> {
        let bar = ProgressBar::new_spinner();
        let style = ProgressStyle::with_template(
            "{spinner:.green} {bar:40.cyan/blue} {pos}/{len} frames ({eta}) {msg}",
        )?;
        bar.set_style(style.progress_chars("##-"));
        Ok(Self { bar })
    }
}

impl ProgressCallback for TerminalProgress {
    fn on_progress(&self, info: &ProgressInfo) {
        if let Some(total) = info.total {
            self.bar.set_length(total.max(info.frames_read));
        }
        self.bar.set_position(info.frames_read);
        if info.frames_dropped > 0 {
            self.bar
                .set_message(format!("{} dropped", info.frames_dropped));
        }
    }
}

fn run() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    apply_global_options(&cli.global)?;

    match cli.command {
        Commands::Upscale {
            input,
            out,
            scale,
            codec,
            crf,
            bitrate,
            on_failure,
            model_size,
            model,
        } => {
            let codec = parse_codec(&codec).ok_or(format!("unsupported --codec: {codec}"))?;
            let policy = parse_failure_policy(&on_failure)
                .ok_or(format!("unsupported --on-failure: {on_failure}"))?;

            let mut options = UpscaleOptions::new()
                .with_scale_factor(scale)
                .with_codec(codec)
                .with_failure_policy(policy);
            if let Some(crf) = crf {
                options = options.with_crf(crf);
            }
            if let Some(bitrate) = bitrate {
                options = options.with_bitrate(bitrate);
            }
            if let Some(out) = out {
                options = options.with_output_path(out);
            }

            let output = options.resolve_output_path(&input);
            ensure_writable_path(&output, cli.global.overwrite)?;

            let progress = if cli.global.progress {
                let progress = Arc::new(TerminalProgress::new()?);
                options = options.with_progress(progress.clone());
                Some(progress)
            } else {
                None
            };

            let provider = load_provider(model.as_deref(), model_size, scale)?;
            if cli.global.verbose {
                eprintln!(
                    "model {}: {} -> {}",
                    provider.name(),
                    provider.input_shape(),
                    provider.output_shape()
                );
            }

            let upscaler = VideoUpscaler::with_options(provider, options);
            let result = upscaler.upscale_blocking(&input);
            if let Some(progress) = progress {
                progress.bar.finish_and_clear();
            }
            let report = result?;

            if report.stats.frames_dropped > 0 {
                eprintln!(
                    "{} {}",
                    "warning:".yellow().bold(),
                    format!("{} frame(s) dropped", report.stats.frames_dropped).yellow()
                );
            }
            println!(
                "{} {}",
                "success:".green().bold(),
                format!(
                    "Upscaled {} frame(s) to {}x{} in {:.1}s -> {}",
                    report.stats.frames_written,
                    report.width,
                    report.height,
                    report.elapsed.as_secs_f64(),
                    report.output.display()
                )
                .green()
            );
        }
        Commands::Probe { input, json } => {
            let source = FfmpegSource::open(&input, PixelLayout::Bgra)?;
            let metadata = videoboost::FrameSource::metadata(&source);
            if json {
                let payload = json!({
                    "width": metadata.width,
                    "height": metadata.height,
                    "frame_rate": metadata.frame_rate.to_string(),
                    "fps": metadata.frame_rate.as_f64(),
                    "codec": metadata.codec,
                    "duration_seconds": metadata.duration.as_secs_f64(),
                    "frame_count": metadata.frame_count,
                });
                println!("{}", serde_json::to_string_pretty(&payload)?);
            } else {
                println!(
                    "Video: {}x{} @ {} fps [{}]",
                    metadata.width, metadata.height, metadata.frame_rate, metadata.codec,
                );
                println!("Duration: {:?}", metadata.duration);
                println!("Frames: {}", metadata.frame_count);
            }
        }
        Commands::Completions { shell } => {
            let mut command = Cli::command();
            clap_complete::generate(shell, &mut command, "videoboost", &mut std::io::stdout());
        }
    }

    Ok(())
}

fn main() {
    if let Err(error) = run() {
        eprintln!("{} {error}", "error:".red().bold());
        std::process::exit(1);
    }
}
