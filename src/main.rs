//! konamicode - Konami code detector
//!
//! Reads keyboard events, feeds them to the detector and plays the notes it
//! emits. Type Up, Up, Down, Down, Left, Right, Left, Right, B, A, Enter.

use anyhow::{bail, Result};
use clap::Parser;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinSet;
use tracing::{debug, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use konamicode::activation::watch_activations;
use konamicode::config::{AppConfig, SinkKind};
use konamicode::detector::{note_channel, LocalDetector};
use konamicode::input::{discover_keyboards, print_keyboards, read_device, simulate};
use konamicode::paths;
use konamicode::sound::{drain_notes, ConsoleSink, NotePlayer, NoteSink, SpeakerSink};

/// Konami code detector - plays a chime when the Konami code is typed
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Log level (error, warn, info, debug, trace)
    #[arg(short, long, env = "LOG_LEVEL", default_value = "info")]
    log_level: String,

    /// List keyboard devices and exit
    #[arg(long)]
    list_devices: bool,

    /// Type the sequence automatically instead of reading keyboards
    #[arg(long)]
    simulate: bool,

    /// Keyboard device to read (repeatable, overrides config)
    #[arg(short, long = "device")]
    devices: Vec<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment variables
    dotenvy::dotenv().ok();

    let args = Args::parse();

    init_logging(&args.log_level)?;

    info!("Starting konamicode v{}...", env!("CARGO_PKG_VERSION"));

    if args.list_devices {
        print_keyboards();
        return Ok(());
    }

    let config_path = paths::config_path(args.config.as_deref());
    info!("Configuration file: {}", config_path.display());
    let config = AppConfig::load(&config_path).await?;

    run_app(args, config, shutdown_signal()).await?;

    info!("konamicode shutdown complete");
    Ok(())
}

/// Devices from the command line, then config, then discovery
fn resolve_devices(args: &Args, config: &AppConfig) -> Result<Vec<PathBuf>> {
    if !args.devices.is_empty() {
        return Ok(args.devices.clone());
    }
    if !config.input.devices.is_empty() {
        return Ok(config.input.devices.iter().map(PathBuf::from).collect());
    }
    discover_keyboards()
}

async fn run_app(
    args: Args,
    config: AppConfig,
    shutdown: impl std::future::Future<Output = ()>,
) -> Result<()> {
    let devices = if args.simulate {
        Vec::new()
    } else {
        let devices = resolve_devices(&args, &config)?;
        if devices.is_empty() {
            bail!("No keyboards found; pass --device or run with --simulate");
        }
        devices
    };

    // Detector and its note channel
    let (emitter, receiver) = note_channel(config.channel.producers, config.channel.capacity);
    let ctx = Arc::new(LocalDetector::new(emitter, config.matcher.options()));
    info!(
        "Detector ready ({} note rings x {}, fallthrough quirk {})",
        config.channel.producers,
        config.channel.capacity,
        if ctx.options.fallthrough_quirk { "on" } else { "off" }
    );

    // Audio
    let sink: Arc<dyn NoteSink> = match config.audio.sink {
        SinkKind::Console => Arc::new(ConsoleSink::new()),
        SinkKind::Speaker => match SpeakerSink::open(config.audio.format()) {
            Ok(speaker) => Arc::new(speaker),
            Err(e) => {
                warn!("No audio output ({:#}), logging notes instead", e);
                Arc::new(ConsoleSink::new())
            }
        },
    };
    info!("Audio sink: {}", sink.name());
    let player = NotePlayer::spawn(sink);

    // Channel consumer on its own thread
    let running = Arc::new(AtomicBool::new(true));
    let drainer = {
        let queue = player.queue();
        let running = running.clone();
        tokio::task::spawn_blocking(move || drain_notes(&receiver, &queue, &running))
    };

    let watcher = tokio::spawn(watch_activations(
        ctx.clone(),
        player.queue(),
        config.activation.clone(),
    ));

    // Event interceptors
    let mut readers: JoinSet<Result<u64>> = JoinSet::new();
    if args.simulate {
        let ctx = ctx.clone();
        readers.spawn(async move {
            let outcome = simulate(&ctx, 0, Duration::from_millis(300)).await;
            debug!("Simulation finished: {:?}", outcome);
            Ok(0)
        });
    } else {
        for (producer, path) in devices.into_iter().enumerate() {
            let ctx = ctx.clone();
            readers.spawn(async move { read_device(path, producer, &ctx).await });
        }
    }

    info!("=> Ctrl+C to stop");

    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            Some(joined) = readers.join_next() => {
                match joined {
                    Ok(Ok(count)) => debug!("Input reader finished after {} events", count),
                    Ok(Err(e)) => warn!("Input reader stopped: {:#}", e),
                    Err(e) => warn!("Input reader task failed: {}", e),
                }

                if readers.is_empty() && !args.simulate {
                    info!("All input devices closed, stopping");
                    break;
                }
            }

            _ = &mut shutdown => {
                break;
            }
        }
    }

    // Cleanup
    info!("Shutting down...");
    readers.abort_all();
    watcher.abort();
    running.store(false, Ordering::Relaxed);

    match drainer.await {
        Ok(forwarded) => debug!("Forwarded {} notes to the player", forwarded),
        Err(e) => warn!("Note drainer failed: {}", e),
    }
    player.close(Duration::from_secs(5)).await;

    info!(
        "Activations this session: {} ({} notes dropped)",
        ctx.activation_count().unwrap_or(0),
        ctx.notes.dropped()
    );

    Ok(())
}

fn init_logging(level: &str) -> Result<()> {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level));

    tracing_subscriber::registry()
        .with(filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_thread_ids(false)
                .with_thread_names(false),
        )
        .init();

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("Failed to listen for Ctrl+C: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}
