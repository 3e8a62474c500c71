//! Sound Compass CLI Application

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::{info, warn, Level};
use tracing_subscriber::EnvFilter;

use sound_compass::audio::DeviceKind;
use sound_compass::output::format_timestamp;
use sound_compass::{
    Config, ConsoleRenderer, DirectionEstimator, DirectionSnapshot, DirectionTracker, FrameSource,
    KeyboardExit, LoopbackCapture, OutputFormat, Renderer, StopSignal, TrackerStatus, WavRecorder,
    WavSource,
};

/// Sound Compass
#[derive(Parser)]
#[command(name = "sound-compass")]
#[command(about = "Show where the sound you are hearing comes from (left/right)", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Configuration file path
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Verbosity level (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,
}

#[derive(Subcommand)]
enum Commands {
    /// Show the live compass for the audio currently playing
    Run {
        /// Device name (default output device if not specified)
        #[arg(short, long)]
        device: Option<String>,

        /// Capture an input device (e.g. a monitor source) instead of loopback
        #[arg(long)]
        input: bool,

        /// Output format (text, json)
        #[arg(short, long, default_value = "text")]
        format: String,

        /// Smoothing weight of the newest block, 0 < alpha <= 1
        #[arg(long)]
        alpha: Option<f32>,

        /// Balance-to-angle curve exponent
        #[arg(long)]
        gamma: Option<f32>,

        /// Energy below which a block counts as silent
        #[arg(long)]
        silence_threshold: Option<f32>,

        /// Frames per analysis block
        #[arg(short, long)]
        block_size: Option<usize>,
    },

    /// List available capture devices
    Devices,

    /// Record the loopback stream to a stereo WAV file (for testing)
    Record {
        /// Output WAV file path
        #[arg(short, long, default_value = "loopback.wav")]
        output: PathBuf,

        /// Recording duration in seconds
        #[arg(short, long, default_value = "10")]
        duration: u32,

        /// Device name
        #[arg(short = 'D', long)]
        device: Option<String>,
    },

    /// Estimate directions for a stereo WAV file
    Analyze {
        /// Input WAV file path
        input: PathBuf,

        /// Output format (text, json)
        #[arg(short, long, default_value = "text")]
        format: String,

        /// Frames per analysis block
        #[arg(short, long)]
        block_size: Option<usize>,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Setup logging - quiet by default, use -v for more
    let log_level = match cli.verbose {
        0 => Level::ERROR,
        1 => Level::WARN,
        2 => Level::INFO,
        3 => Level::DEBUG,
        _ => Level::TRACE,
    };

    // stdout carries the compass, logs go to stderr
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive(log_level.into()))
        .with_writer(std::io::stderr)
        .init();

    // Load configuration
    let mut config = if let Some(ref config_path) = cli.config {
        Config::from_file(config_path)
            .with_context(|| format!("Failed to load config from {}", config_path.display()))?
    } else {
        Config::default()
    };

    match cli.command {
        Commands::Run {
            device,
            input,
            format,
            alpha,
            gamma,
            silence_threshold,
            block_size,
        } => {
            // Apply CLI overrides
            if let Some(device) = device {
                config.audio.device = Some(device);
            }
            if input {
                config.audio.loopback = false;
            }
            config.display.format = parse_format(&format)?;
            if let Some(alpha) = alpha {
                config.estimator.smoothing_alpha = Some(alpha);
            }
            if let Some(gamma) = gamma {
                config.estimator.angle_curve_gamma = gamma;
            }
            if let Some(threshold) = silence_threshold {
                config.estimator.silence_threshold = threshold;
            }
            if let Some(block_size) = block_size {
                config.audio.block_size_frames = block_size;
            }
            config.validate().context("Invalid settings")?;

            run_live(config)
        }
        Commands::Devices => list_devices(),
        Commands::Record {
            output,
            duration,
            device,
        } => {
            if let Some(device) = device {
                config.audio.device = Some(device);
            }
            record_audio(config, output, duration)
        }
        Commands::Analyze {
            input,
            format,
            block_size,
        } => {
            config.display.format = parse_format(&format)?;
            if let Some(block_size) = block_size {
                config.audio.block_size_frames = block_size;
            }
            config.validate().context("Invalid settings")?;

            analyze_file(config, input)
        }
    }
}

fn parse_format(format: &str) -> Result<OutputFormat> {
    format
        .parse::<OutputFormat>()
        .with_context(|| format!("Unknown output format '{}' (use text or json)", format))
}

/// Run the live compass until Esc / Ctrl+C
fn run_live(config: Config) -> Result<()> {
    info!("Starting sound compass");

    // Setup signal handler for graceful shutdown
    let stop = StopSignal::new();
    let s = stop.clone();
    ctrlc::set_handler(move || {
        info!("Received shutdown signal");
        s.trigger();
    })?;

    info!(
        "Estimator: silence_threshold={}, gamma={}, alpha={}, settle_time={}ms",
        config.estimator.silence_threshold,
        config.estimator.angle_curve_gamma,
        config
            .estimator
            .smoothing_alpha
            .map_or_else(|| "auto".to_string(), |a| a.to_string()),
        config.estimator.settle_time_ms
    );

    // The stream is opened on the tracker thread and reopened after device loss
    let audio_config = config.audio.clone();
    let tracker = DirectionTracker::spawn(&config, move || {
        LoopbackCapture::open(audio_config.clone())
    })
    .context("Failed to start direction tracker")?;

    let keyboard =
        KeyboardExit::install(stop.clone()).context("Failed to set up keyboard exit")?;
    if keyboard.is_some() {
        eprint!("Listening... press Esc to exit\r\n");
    } else {
        eprintln!("Listening... press Ctrl+C to exit");
    }

    let mut renderer = ConsoleRenderer::stdout(config.display.clone(), true);
    let refresh = Duration::from_millis(config.display.refresh_ms);

    // The tracker only finishes on its own when the source cannot be used
    while !stop.is_triggered() && !tracker.is_finished() {
        renderer.render(&tracker.snapshot())?;
        std::thread::sleep(refresh);
    }

    renderer.finish()?;
    drop(keyboard);

    let stats = tracker.stop().context("Direction tracking failed")?;
    stats.log_summary();

    Ok(())
}

/// List available capture devices
fn list_devices() -> Result<()> {
    let capture = LoopbackCapture::new(sound_compass::AudioConfig::default())?;
    let devices = capture.list_devices()?;

    if devices.is_empty() {
        println!("No audio devices found");
        return Ok(());
    }

    for (kind, title) in [
        (DeviceKind::Output, "Output devices (loopback capture):"),
        (DeviceKind::Input, "Input devices (use with --input):"),
    ] {
        println!("{}", title);
        for (i, device) in devices.iter().filter(|d| d.kind == kind).enumerate() {
            let marker = if device.is_default { " (default)" } else { "" };
            println!("  {}. {}{}", i + 1, device.name, marker);
        }
    }

    Ok(())
}

/// Record the loopback stream to a WAV file
fn record_audio(config: Config, output_path: PathBuf, duration_secs: u32) -> Result<()> {
    info!("Recording loopback audio to: {}", output_path.display());

    let stop = StopSignal::new();
    let s = stop.clone();
    ctrlc::set_handler(move || {
        s.trigger();
    })?;

    let mut capture =
        LoopbackCapture::open(config.audio.clone()).context("Failed to open audio capture")?;
    let sample_rate = capture.actual_sample_rate();
    let target_frames = sample_rate as u64 * duration_secs as u64;

    let mut recorder =
        WavRecorder::create(&output_path, sample_rate).context("Failed to create WAV file")?;

    println!(
        "Recording for {} seconds... Press Ctrl+C to stop early",
        duration_secs
    );

    while !stop.is_triggered() && recorder.frames() < target_frames {
        if let Some(block) = capture
            .next_block(Duration::from_millis(100))
            .context("Audio capture failed")?
        {
            recorder.write_block(&block)?;
        }

        // Progress indicator
        let elapsed = recorder.frames() as f32 / sample_rate as f32;
        print!("\rRecording: {:.1}s / {}s", elapsed, duration_secs);
        let _ = std::io::Write::flush(&mut std::io::stdout());
    }
    println!();

    capture.stop();
    recorder.finalize()?;
    info!("Recording saved to: {}", output_path.display());

    Ok(())
}

/// Estimate directions for a WAV file, one line per block
fn analyze_file(config: Config, input_path: PathBuf) -> Result<()> {
    info!("Analyzing: {}", input_path.display());

    let mut source = WavSource::open(&input_path, config.audio.block_size_frames)
        .with_context(|| format!("Failed to open {}", input_path.display()))?;

    let block_period = config.audio.block_period(source.sample_rate());
    let mut estimator = DirectionEstimator::new(&config.estimator, block_period)?;
    info!(
        "Loaded {:.2}s at {} Hz, smoothing alpha {:.3}",
        source.duration().as_secs_f32(),
        source.sample_rate(),
        estimator.alpha()
    );

    let mut renderer = ConsoleRenderer::stdout(config.display.clone(), false);
    let mut updates = 0;

    loop {
        let at = source.position();
        let Some(block) = source.next() else {
            break;
        };

        match estimator.observe(&block) {
            Ok(reading) => {
                updates += 1;
                let snapshot = DirectionSnapshot {
                    reading,
                    status: TrackerStatus::Listening,
                    updates,
                };
                renderer.render_at(at, &snapshot)?;
            }
            Err(e) => warn!("Skipping block at {}: {}", format_timestamp(at), e),
        }
    }

    info!("Analyzed {} blocks", updates);
    Ok(())
}
