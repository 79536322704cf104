use anyhow::Result;
use clap::Parser;
use std::path::Path;
use std::process::ExitCode;
use tracing_appender::non_blocking::{NonBlocking, WorkerGuard};
use tracing::{error, info};

use dcamera::{DCameraApp, DCameraConfig};

#[derive(Parser, Debug)]
#[command(name = "dcamera")]
#[command(about = "Distributed camera source service")]
#[command(version)]
#[command(long_about = "Hosts the source side of distributed cameras: registers remote \
cameras with the local camera provider and drives their session, stream and capture \
lifecycle on behalf of the provider.")]
struct Args {
    /// Path to configuration file
    #[arg(short, long, default_value = "dcamera.toml", help = "Path to TOML configuration file")]
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
    #[arg(long, help = "Validate configuration file and exit without starting the service")]
    validate_config: bool,

    /// Print default configuration and exit
    #[arg(long, help = "Print default configuration in TOML format and exit")]
    print_config: bool,

    /// Dry run mode - build the service but register nothing
    #[arg(long, help = "Perform dry run - create the service but don't register cameras")]
    dry_run: bool,

    /// Override log format (json, pretty, compact)
    #[arg(long, value_name = "FORMAT", help = "Log output format: json, pretty, or compact")]
    log_format: Option<String>,

    /// Also write logs to a daily rotated file in this directory
    #[arg(long, value_name = "DIR", help = "Directory for rotated log files")]
    log_dir: Option<String>,
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let args = Args::parse();

    if args.print_config {
        print_default_config()?;
        return Ok(ExitCode::SUCCESS);
    }

    // Keep the guard alive until main returns so buffered file logs get flushed
    let _log_guard = init_logging(&args)?;

    info!("Starting dcamera v{}", env!("CARGO_PKG_VERSION"));
    info!("Configuration file: {}", args.config);

    let config = match DCameraConfig::load_from_file(&args.config) {
        Ok(config) => config,
        Err(e) => {
            error!("Failed to load configuration: {}", e);
            return Err(e.into());
        }
    };

    if args.validate_config {
        match config.validate() {
            Ok(()) => {
                info!("Configuration validation successful");
                println!("✓ Configuration is valid");
                return Ok(ExitCode::SUCCESS);
            }
            Err(e) => {
                error!("Configuration validation failed: {}", e);
                eprintln!("✗ Configuration validation failed: {}", e);
                return Ok(ExitCode::FAILURE);
            }
        }
    }

    let mut app = DCameraApp::new(config).map_err(|e| {
        error!("Failed to create service: {}", e);
        e
    })?;

    if args.dry_run {
        info!("Dry run mode - service created, no camera registered");
        println!("✓ Dry run completed successfully");
        return Ok(ExitCode::SUCCESS);
    }

    app.start().await.map_err(|e| {
        error!("Failed to start service: {}", e);
        e
    })?;

    let exit_code = app.run().await.map_err(|e| {
        error!("Service error during execution: {}", e);
        e
    })?;

    info!("dcamera exited with code: {}", exit_code);
    Ok(exit_status(exit_code))
}

fn exit_status(code: i32) -> ExitCode {
    match u8::try_from(code) {
        Ok(code) => ExitCode::from(code),
        Err(_) => ExitCode::FAILURE,
    }
}

/// Daily rotated `dcamera.log` in `dir`; lines are flushed when the guard drops
fn file_log_writer<P: AsRef<Path>>(dir: P) -> (NonBlocking, WorkerGuard) {
    let appender = tracing_appender::rolling::daily(dir, "dcamera.log");
    tracing_appender::non_blocking(appender)
}

fn init_logging(args: &Args) -> Result<Option<WorkerGuard>> {
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
        .unwrap_or_else(|_| EnvFilter::new(format!("dcamera={}", log_level)));

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
        Some("pretty") | None => fmt::layer()
            .pretty()
            .with_target(true)
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

    let (file_layer, guard) = match args.log_dir.as_deref() {
        Some(dir) => {
            let (writer, guard) = file_log_writer(dir);
            let layer = fmt::layer()
                .with_ansi(false)
                .with_writer(writer)
                .boxed();
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(fmt_layer)
        .with(file_layer)
        .with(env_filter)
        .init();

    Ok(guard)
}

/// Print default configuration in TOML format
fn print_default_config() -> Result<()> {
    println!("# dcamera configuration file");
    println!("# Every value may be overridden from the environment, e.g.");
    println!("# DCAMERA_LIMITS__DID_MAX_SIZE=128");
    println!();
    println!("{}", toml::to_string_pretty(&DCameraConfig::default())?);
    println!("# Cameras registered at startup:");
    println!("# [[devices]]");
    println!("# dev_id = \"remote-network-id\"");
    println!("# dh_id = \"camera_0\"");
    println!("# attrs = '{{\"CodecType\":[\"avc/h264\"]}}'");
    Ok(())
}
