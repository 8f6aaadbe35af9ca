use anyhow::Result;
use clap::{Parser, Subcommand};
use pocketcam::device::Resolution;
use pocketcam::events::{EventFilter, EventReceiver};
use pocketcam::pipeline::remove_dir_if_empty;
use pocketcam::{
    CapturePipeline, CaptureSettings, DirectoryGallery, EventBus, InteractiveSession,
    PocketcamConfig, ResolutionGate, SimulatedProvider,
};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

#[derive(Parser, Debug)]
#[command(name = "pocketcam")]
#[command(about = "Camera capture pipeline with gallery export")]
#[command(version)]
#[command(long_about = "Captures photos, bursts and videos, moves every asset into application \
storage under a timestamp name and exports it to the gallery. Runs against a simulated camera \
so the whole pipeline can be driven from a terminal.")]
struct Args {
    /// Path to configuration file
    #[arg(short, long, default_value = "pocketcam.toml", help = "Path to TOML configuration file")]
    config: String,

    /// Enable debug logging (most verbose)
    #[arg(short, long, help = "Enable debug level logging")]
    debug: bool,

    /// Enable verbose logging (info level)
    #[arg(short, long, help = "Enable verbose info level logging")]
    verbose: bool,

    /// Enable quiet mode (errors only)
    #[arg(short, long, help = "Enable quiet mode - only log errors")]
    quiet: bool,

    /// Validate configuration and exit
    #[arg(long, help = "Validate configuration file and exit")]
    validate_config: bool,

    /// Print default configuration and exit
    #[arg(long, help = "Print default configuration in TOML format and exit")]
    print_config: bool,

    /// Override log format (json, pretty, compact)
    #[arg(long, value_name = "FORMAT", help = "Log output format: json, pretty, or compact")]
    log_format: Option<String>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Take a single photo
    Photo {
        #[arg(long, help = "Encode quality in [0, 1]; defaults to capture.photo_quality")]
        quality: Option<f32>,
    },
    /// Take several photos in a row
    Burst {
        #[arg(long, help = "Number of shots; defaults to capture.burst_shots")]
        shots: Option<u32>,
        #[arg(long, help = "Encode quality in [0, 1]; defaults to capture.photo_quality")]
        quality: Option<f32>,
    },
    /// Record a video for a fixed duration
    Record {
        #[arg(long, help = "Recording length in seconds")]
        seconds: f64,
        #[arg(long, help = "Frame rate: 10, 15, 20 or 30")]
        fps: Option<u32>,
    },
    /// Check a capture resolution against the display density threshold
    CheckResolution {
        #[arg(value_parser = parse_resolution, value_name = "WIDTHxHEIGHT")]
        resolution: Resolution,
    },
    /// Drive the camera from the keyboard
    Interactive,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    if args.print_config {
        print_default_config()?;
        return Ok(());
    }

    init_logging(&args)?;

    info!("Starting pocketcam v{}", env!("CARGO_PKG_VERSION"));
    info!("Configuration file: {}", args.config);

    let config = match PocketcamConfig::load_from_file(&args.config) {
        Ok(config) => config,
        Err(e) => {
            error!("Failed to load configuration: {}", e);
            return Err(e.into());
        }
    };

    match config.validate() {
        Ok(()) if args.validate_config => {
            info!("Configuration validation successful");
            println!("✓ Configuration is valid");
            return Ok(());
        }
        Ok(()) => {}
        Err(e) => {
            error!("Configuration validation failed: {}", e);
            eprintln!("✗ Configuration validation failed: {}", e);
            std::process::exit(1);
        }
    }

    let gate = ResolutionGate::from_display(&config.display)?;

    let command = args.command.unwrap_or(Command::Interactive);
    if let Command::CheckResolution { resolution } = command {
        let verdict = gate.evaluate(resolution)?;
        print_json(&serde_json::json!({
            "resolution": resolution,
            "diagonal_inches": gate.diagonal_inches(),
            "result": verdict,
        }))?;
        return Ok(());
    }

    let scratch_dir = std::env::temp_dir().join(format!("pocketcam-{}", Uuid::new_v4()));
    debug!("Simulated camera scratch directory: {}", scratch_dir.display());

    let event_bus = Arc::new(if args.debug {
        EventBus::with_debug_logging(config.system.event_bus_capacity)
    } else {
        EventBus::new(config.system.event_bus_capacity)
    });
    // Verbose runs echo every pipeline event, not just failures
    let alert_filter = if args.debug || args.verbose {
        EventFilter::All
    } else {
        EventFilter::Failures
    };
    spawn_alert_printer(&event_bus, alert_filter);

    let pipeline = CapturePipeline::new(
        &config,
        Arc::new(SimulatedProvider::new(&scratch_dir)),
        Arc::new(DirectoryGallery::new(&config.storage.gallery_dir)),
        Arc::clone(&event_bus),
    );
    pipeline.start().await?;

    let mut settings = CaptureSettings::from_config(&config.camera);
    let result = run_command(command, &config, &pipeline, &mut settings, gate, event_bus).await;

    // Unpersisted captures stay in the scratch directory for recovery
    match remove_dir_if_empty(&scratch_dir).await {
        Ok(true) => debug!("Removed scratch directory {}", scratch_dir.display()),
        Ok(false) => {}
        Err(e) => warn!("Scratch directory not removed: {}", e),
    }

    info!("Pipeline statistics: {:?}", pipeline.stats());
    result
}

async fn run_command(
    command: Command,
    config: &PocketcamConfig,
    pipeline: &CapturePipeline,
    settings: &mut CaptureSettings,
    gate: ResolutionGate,
    event_bus: Arc<EventBus>,
) -> Result<()> {
    match command {
        Command::Photo { quality } => {
            let quality = quality.unwrap_or(config.capture.photo_quality);
            let outcome = pipeline.capture_photo(settings, quality).await;
            print_json(&outcome.summary())
        }
        Command::Burst { shots, quality } => {
            let quality = quality.unwrap_or(config.capture.photo_quality);
            let shots = shots.unwrap_or(config.capture.burst_shots);
            let report = pipeline.capture_burst(settings, quality, shots).await;
            print_json(&report.summary())
        }
        Command::Record { seconds, fps } => {
            if let Some(fps) = fps {
                settings.set_frame_rate(fps)?;
            }
            let duration = Duration::try_from_secs_f64(seconds)?;
            let interrupt = async {
                if let Err(e) = tokio::signal::ctrl_c().await {
                    warn!("Unable to listen for Ctrl-C: {}", e);
                    std::future::pending::<()>().await;
                }
            };

            for summary in record_for(pipeline, settings, duration, interrupt).await {
                print_json(&summary)?;
            }
            Ok(())
        }
        Command::Interactive => {
            let session = InteractiveSession::new(
                pipeline.clone(),
                settings.clone(),
                gate,
                event_bus,
                config.capture.photo_quality,
                config.capture.burst_shots,
            );
            session.run().await?;
            Ok(())
        }
        Command::CheckResolution { .. } => Ok(()),
    }
}

/// Record until `duration` elapses or `interrupt` fires, then finish the video
async fn record_for(
    pipeline: &CapturePipeline,
    settings: &CaptureSettings,
    duration: Duration,
    interrupt: impl Future<Output = ()>,
) -> Vec<serde_json::Value> {
    let started = pipeline.start_recording(settings).await;
    let mut summaries = vec![started.summary()];
    if !pipeline.is_recording() {
        return summaries;
    }

    tokio::select! {
        _ = tokio::time::sleep(duration) => {}
        _ = interrupt => info!("Interrupted, finishing recording"),
    }

    summaries.push(pipeline.stop_recording().await.summary());
    summaries
}

/// Surface failures the way a device would show an alert
fn spawn_alert_printer(event_bus: &EventBus, filter: EventFilter) {
    let mut alerts = EventReceiver::new(event_bus.subscribe(), filter, "alerts".to_string());

    tokio::spawn(async move {
        loop {
            match alerts.recv().await {
                Ok(event) => eprint!("! {}\r\n", event.description()),
                Err(pocketcam::error::EventBusError::Lagged(n)) => {
                    warn!("Alert printer skipped {} events", n)
                }
                Err(_) => break,
            }
        }
    });
}

fn parse_resolution(value: &str) -> std::result::Result<Resolution, String> {
    let (width, height) = value
        .split_once(['x', 'X'])
        .ok_or_else(|| format!("expected WIDTHxHEIGHT, got '{}'", value))?;
    let width = width
        .trim()
        .parse::<u32>()
        .map_err(|e| format!("invalid width '{}': {}", width, e))?;
    let height = height
        .trim()
        .parse::<u32>()
        .map_err(|e| format!("invalid height '{}': {}", height, e))?;
    if width == 0 || height == 0 {
        return Err(format!("resolution must be non-zero, got {}x{}", width, height));
    }
    Ok(Resolution::new(width, height))
}

fn print_json(value: &serde_json::Value) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn init_logging(args: &Args) -> Result<()> {
    use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

    let log_level = if args.debug {
        "debug"
    } else if args.verbose {
        "info"
    } else if args.quiet {
        "error"
    } else {
        "warn"
    };

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("pocketcam={}", log_level)));

    // stdout carries command output, logs go to stderr
    let fmt_layer = match args.log_format.as_deref() {
        Some("json") => fmt::layer()
            .json()
            .with_writer(std::io::stderr)
            .with_target(true)
            .with_thread_ids(true)
            .with_file(true)
            .with_line_number(true)
            .boxed(),
        Some("compact") => fmt::layer()
            .compact()
            .with_writer(std::io::stderr)
            .with_target(false)
            .with_thread_ids(false)
            .with_file(false)
            .with_line_number(false)
            .boxed(),
        Some("pretty") | None => fmt::layer()
            .pretty()
            .with_writer(std::io::stderr)
            .with_target(true)
            .with_thread_ids(args.debug)
            .with_file(args.debug)
            .with_line_number(args.debug)
            .boxed(),
        Some(format) => {
            eprintln!("Warning: Unknown log format '{}', using default", format);
            fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(true)
                .boxed()
        }
    };

    tracing_subscriber::registry()
        .with(fmt_layer)
        .with(env_filter)
        .init();

    Ok(())
}

/// Print default configuration in TOML format
fn print_default_config() -> Result<()> {
    println!("# Pocketcam Configuration File");
    println!("# Every key can be overridden with POCKETCAM_<SECTION>__<KEY>");
    println!();
    println!("{}", toml::to_string_pretty(&PocketcamConfig::default())?);
    Ok(())
}
