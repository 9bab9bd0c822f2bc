use clap::{Parser, Subcommand};
use std::sync::atomic::Ordering;
use std::thread;
use std::time::{Duration, Instant};
use tracing::{error, info};
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::fmt;
use tracing_subscriber::fmt::writer::MakeWriterExt;
use tracing_subscriber::EnvFilter;
use trackme::capture::list_devices;
use trackme::{CaptureListener, Config, Context, TrackmeError};

const STATS_INTERVAL: Duration = Duration::from_secs(10);

#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    #[command(subcommand)]
    command: Option<Commands>,

    /// JSON configuration file
    #[arg(short = 'c', long = "config")]
    config: Option<String>,

    /// Capture interface, overrides `device`
    #[arg(short = 'i', long)]
    interface: Option<String>,

    /// TLS port to capture, overrides `tls_port`
    #[arg(short = 'p', long)]
    port: Option<u16>,

    /// Log file path, overrides `log_file`
    #[arg(short = 'l', long = "log-file")]
    log_file: Option<String>,

    /// Replay a pcap file instead of capturing live
    #[arg(long)]
    pcap: Option<String>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Capture on the network until interrupted (default)
    Live,
    /// Replay a pcap file through the capture pipeline
    Pcap {
        #[arg(short = 'f', long)]
        file: String,
    },
    /// List capture interfaces
    Devices,
}

fn initialize_logging(log_file: Option<&str>) {
    let console_writer = std::io::stdout.with_max_level(tracing::Level::INFO);
    let builder = fmt().with_env_filter(EnvFilter::from_default_env());

    let result = match log_file {
        Some(log_file) => {
            let file_appender = RollingFileAppender::new(Rotation::NEVER, ".", log_file)
                .with_max_level(tracing::Level::INFO);
            tracing::subscriber::set_global_default(
                builder.with_writer(console_writer.and(file_appender)).finish(),
            )
        }
        None => tracing::subscriber::set_global_default(builder.with_writer(console_writer).finish()),
    };

    if let Err(e) = result {
        eprintln!("Failed to set subscriber: {e}");
        std::process::exit(1);
    }
}

fn load_config(args: &Args) -> Result<Config, TrackmeError> {
    let mut config = match &args.config {
        Some(path) => Config::load_from_file(path)?,
        None => Config::default(),
    };
    if let Some(interface) = &args.interface {
        config.device = Some(interface.clone());
    }
    if let Some(port) = args.port {
        config.tls_port = port;
    }
    if let Some(log_file) = &args.log_file {
        config.log_file = Some(log_file.clone());
    }
    Ok(config)
}

fn run_live(ctx: &Context) -> Result<(), TrackmeError> {
    let mut handle = CaptureListener::start(ctx)?;

    let cancel_signal = handle.cancel_signal();
    if let Err(e) = ctrlc::set_handler(move || {
        info!("Received signal, initiating graceful shutdown...");
        cancel_signal.store(true, Ordering::Relaxed);
    }) {
        error!("Error setting signal handler: {e}");
        handle.stop();
        return Ok(());
    }

    let mut last_report = Instant::now();
    while handle.is_running() {
        thread::sleep(ctx.store.ttl().min(Duration::from_secs(1)));
        let live = ctx.store.evict_expired();
        if last_report.elapsed() >= STATS_INTERVAL {
            info!("{}: {} ({} live records)", handle.device(), handle.stats(), live);
            last_report = Instant::now();
        }
    }

    let stats = handle.stop();
    info!("Capture shutdown completed: {}", stats);
    Ok(())
}

fn run_pcap(ctx: &Context, file: &str) -> Result<(), TrackmeError> {
    info!("Analyzing PCAP file: {}", file);
    let stats = CaptureListener::replay_pcap(file, ctx)?;
    for record in ctx.store.records() {
        info!("{}", record);
    }
    info!("{}", stats);
    Ok(())
}

fn main() {
    let args = Args::parse();

    let config = match load_config(&args) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Failed to load configuration: {e}");
            std::process::exit(1);
        }
    };
    initialize_logging(config.log_file.as_deref());

    let ctx = match Context::new(config) {
        Ok(ctx) => ctx,
        Err(e) => {
            error!("{e}");
            std::process::exit(1);
        }
    };

    let command = match (args.command, args.pcap) {
        (Some(command), _) => command,
        (None, Some(file)) => Commands::Pcap { file },
        (None, None) => Commands::Live,
    };

    let result = match command {
        Commands::Live => run_live(&ctx),
        Commands::Pcap { file } => run_pcap(&ctx, &file),
        Commands::Devices => {
            for device in list_devices() {
                info!("{}", device);
            }
            Ok(())
        }
    };

    if let Err(e) = result {
        error!("{e}");
        std::process::exit(1);
    }
}
