use anyhow::Result;
use clap::Parser;
use std::path::Path;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};
use tracing_appender::non_blocking::WorkerGuard;

use timelapse::camera::{build_arbiter, default_backend};
use timelapse::{CaptureScheduler, ControlResponse, OneShotCapture, TimelapseConfig};

#[derive(Parser, Debug)]
#[command(name = "timelapse")]
#[command(about = "Timelapse capture scheduler for a shared Raspberry Pi camera")]
#[command(version)]
#[command(long_about = "Captures a still image at a fixed interval, gated by a time-of-day \
window and an ambient light check, and prunes old image folders daily. The camera is shared \
with the live stream and one-shot captures through a single arbiter.")]
struct Args {
    /// Path to configuration file
    #[arg(short, long, default_value = "timelapse.toml", help = "Path to TOML or JSON configuration file")]
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
    #[arg(long, help = "Validate configuration file and exit without starting the scheduler")]
    validate_config: bool,

    /// Print default configuration and exit
    #[arg(long, help = "Print default configuration in TOML format and exit")]
    print_config: bool,

    /// Dry run mode - build components but don't capture
    #[arg(long, help = "Perform dry run - build components but don't start the scheduler")]
    dry_run: bool,

    /// Take a single picture through the arbiter and exit
    #[arg(long, help = "Capture one image now, print the result as JSON and exit")]
    capture_now: bool,

    /// Override log format (json, pretty, compact)
    #[arg(long, value_name = "FORMAT", help = "Log output format: json, pretty, or compact")]
    log_format: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    if args.print_config {
        print_default_config()?;
        return Ok(());
    }

    let loaded = TimelapseConfig::load_from_file(&args.config);
    let log_path = loaded.as_ref().ok().and_then(|c| c.log_path.clone());
    let _log_guard = init_logging(&args, log_path.as_deref())?;

    info!("Starting timelapse v{}", env!("CARGO_PKG_VERSION"));
    info!("Configuration file: {}", args.config);

    let config = match loaded {
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

    let backend = default_backend(&config);

    if args.capture_now {
        // A one-shot defers to the capture service if it is running
        let arbiter = Arc::new(build_arbiter(&config, backend, true));
        let response = ControlResponse::from_capture(OneShotCapture::new(arbiter, &config).capture().await);
        println!("{}", serde_json::to_string_pretty(&response)?);
        std::process::exit(if response.success { 0 } else { 1 });
    }

    let arbiter = Arc::new(build_arbiter(&config, backend, false));
    let scheduler = CaptureScheduler::new(&config, arbiter).map_err(|e| {
        error!("Failed to build capture scheduler: {}", e);
        e
    })?;

    if args.dry_run {
        info!("Dry run mode - components built but scheduler not started");
        println!("✓ Dry run completed successfully - all components initialized");
        return Ok(());
    }

    log_banner(&config);

    let shutdown = CancellationToken::new();
    setup_signal_handlers(shutdown.clone());

    let stats = scheduler.run(shutdown).await;
    info!("Camera stopped. Goodbye! ({} ticks)", stats.ticks());

    Ok(())
}

fn log_banner(config: &TimelapseConfig) {
    info!("{}", "=".repeat(60));
    info!("Timelapse System Starting");
    info!("{}", "=".repeat(60));
    info!("Capture interval: {}s", config.capture_interval_seconds);
    info!("Lights only mode: {}", config.lights_only_mode);
    info!("Image retention: {} days", config.keep_days);
    info!(
        "Resolution: {}x{}",
        config.resolution.width, config.resolution.height
    );
    if config.capture_window.enabled {
        info!(
            "Capture window: {} - {}",
            config.capture_window.start_time, config.capture_window.end_time
        );
    }
}

/// Cancel `shutdown` on SIGTERM (systemd stop) or SIGINT
fn setup_signal_handlers(shutdown: CancellationToken) {
    #[cfg(unix)]
    {
        let sigterm_shutdown = shutdown.clone();
        tokio::spawn(async move {
            use tokio::signal::unix::{signal, SignalKind};
            match signal(SignalKind::terminate()) {
                Ok(mut sigterm) => {
                    if sigterm.recv().await.is_some() {
                        info!("Received SIGTERM signal");
                        sigterm_shutdown.cancel();
                    }
                }
                Err(e) => error!("Failed to register SIGTERM handler: {}", e),
            }
        });
    }

    tokio::spawn(async move {
        if let Ok(()) = tokio::signal::ctrl_c().await {
            info!("Received SIGINT signal (Ctrl+C)");
            shutdown.cancel();
        }
    });
}

fn init_logging(args: &Args, log_path: Option<&str>) -> Result<Option<WorkerGuard>> {
    use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer, Registry};

    // Determine log level based on flags
    let log_level = if args.debug {
        "debug"
    } else if args.verbose {
        "info"
    } else if args.quiet {
        "error"
    } else {
        "info"
    };

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("timelapse={}", log_level)));

    let mut layers: Vec<Box<dyn Layer<Registry> + Send + Sync>> = Vec::new();

    let fmt_layer = match args.log_format.as_deref() {
        Some("json") => fmt::layer()
            .json()
            .with_target(true)
            .with_thread_ids(true)
            .with_file(true)
            .with_line_number(true)
            .boxed(),
        Some("compact") => fmt::layer()
            .compact()
            .with_target(false)
            .with_thread_ids(false)
            .with_file(false)
            .with_line_number(false)
            .boxed(),
        Some("pretty") => fmt::layer()
            .pretty()
            .with_target(true)
            .with_thread_ids(args.debug)
            .with_file(args.debug)
            .with_line_number(args.debug)
            .boxed(),
        None => fmt::layer()
            .with_target(args.debug)
            .with_thread_ids(args.debug)
            .with_file(args.debug)
            .with_line_number(args.debug)
            .boxed(),
        Some(format) => {
            eprintln!("Warning: Unknown log format '{}', using default", format);
            fmt::layer()
                .with_target(true)
                .with_thread_ids(args.debug)
                .with_file(args.debug)
                .with_line_number(args.debug)
                .boxed()
        }
    };
    layers.push(fmt_layer);

    let mut guard = None;
    if let Some(path) = log_path {
        let path = Path::new(path);
        let dir = path.parent().filter(|p| !p.as_os_str().is_empty()).unwrap_or(Path::new("."));
        let file_name = path
            .file_name()
            .ok_or_else(|| anyhow::anyhow!("log_path '{}' has no file name", path.display()))?;
        std::fs::create_dir_all(dir)?;

        let (writer, worker_guard) = tracing_appender::non_blocking(tracing_appender::rolling::never(dir, file_name));
        layers.push(fmt::layer().with_writer(writer).with_ansi(false).boxed());
        guard = Some(worker_guard);
    }

    tracing_subscriber::registry()
        .with(layers)
        .with(env_filter)
        .init();

    Ok(guard)
}

/// Print default configuration in TOML format
fn print_default_config() -> Result<()> {
    println!("# Timelapse Configuration File");
    println!("# Default configuration with all available options");
    println!();
    println!("{}", toml::to_string_pretty(&TimelapseConfig::default())?);
    Ok(())
}
