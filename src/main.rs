//! Binary entrypoint for the folder signage player.
//!
//! Wires the library tasks together; host events come from Unix signals and
//! stdin.

use std::io::{self, BufRead, IsTerminal};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{ArgAction, Parser};
use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::Level;
use tracing_subscriber::EnvFilter;

#[cfg(unix)]
use tokio::signal::unix::{SignalKind, signal};

use folder_signage::authorization::AuthorizationGate;
use folder_signage::config::Configuration;
use folder_signage::events::{DisplayCommand, LifecycleEvent, PlaybackEvent, UserAction};
use folder_signage::platform::permissions::FolderPermissions;
use folder_signage::platform::renderer::{CommandSurface, CommandVideo};
use folder_signage::platform::settings::CommandSettings;
use folder_signage::scan::{ContentKind, ContentScanner, ExtensionTable};
use folder_signage::tasks::{display, sequencer, watch};

#[derive(Debug, Parser)]
#[command(
    name = "folder-signage",
    version,
    about = "Plays the images and videos of one folder in a loop"
)]
struct Args {
    /// Path to YAML config (defaults apply when omitted)
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,
    /// Override how long each image stays on screen (e.g. 10s, 1500ms)
    #[arg(long, value_name = "DURATION", value_parser = humantime::parse_duration)]
    image_dwell: Option<Duration>,
    /// Print the playlist order and exit without starting the player
    #[arg(long)]
    dry_run: bool,
    /// Increase log verbosity (repeatable)
    #[arg(short = 'v', long = "verbose", action = ArgAction::Count)]
    verbose: u8,
}

fn init_tracing(verbosity: u8) -> Result<()> {
    // map -v to log level
    let level = match verbosity {
        0 => Level::INFO,
        1 => Level::DEBUG,
        _ => Level::TRACE,
    };
    let filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => EnvFilter::new("warn").add_directive(format!("folder_signage={level}").parse()?),
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .compact()
        .init();
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    init_tracing(args.verbose)?;

    let mut cfg = match &args.config {
        Some(path) => Configuration::from_yaml_file(path)
            .with_context(|| format!("failed to load configuration from {}", path.display()))?,
        None => Configuration::default(),
    };
    if let Some(dwell) = args.image_dwell {
        cfg.image_dwell = dwell;
    }
    let cfg = cfg.validated().context("invalid configuration values")?;
    tracing::info!("Loaded configuration:\n{:#?}", cfg);

    let table = ExtensionTable::new(&cfg.extensions);
    let scanner = ContentScanner::new(&cfg.content_folder, table.clone());

    if args.dry_run {
        return run_dry_run(&scanner);
    }

    // Channels (small/bounded)
    let (lifecycle_tx, lifecycle_rx) = mpsc::channel::<LifecycleEvent>(16); // Host/Watcher -> Sequencer
    let (actions_tx, actions_rx) = mpsc::channel::<UserAction>(16); // Stdin -> Sequencer
    let (display_tx, display_rx) = mpsc::channel::<DisplayCommand>(16); // Sequencer -> Display
    let (playback_tx, playback_rx) = mpsc::channel::<PlaybackEvent>(16); // Display -> Sequencer

    let cancel = CancellationToken::new();

    {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if let Err(err) = tokio::signal::ctrl_c().await {
                tracing::warn!("ctrl-c handler failed: {err}");
                return;
            }
            tracing::info!("ctrl-c received; initiating shutdown");
            cancel.cancel();
        });
    }

    // Lines on an interactive stdin stand in for the on-screen buttons.
    if io::stdin().is_terminal() {
        let cancel = cancel.clone();
        let actions_tx = actions_tx.clone();
        tokio::task::spawn_blocking(move || {
            for line in io::stdin().lock().lines() {
                let line = match line {
                    Ok(line) => line,
                    Err(err) => {
                        tracing::warn!("stdin watcher failed: {err}");
                        break;
                    }
                };
                if line.trim().is_empty() {
                    continue;
                }
                match line.parse::<UserAction>() {
                    Ok(action) => {
                        if actions_tx.blocking_send(action).is_err() {
                            return;
                        }
                    }
                    Err(err) => tracing::warn!("{err}"),
                }
            }
            tracing::info!("stdin closed; initiating shutdown");
            cancel.cancel();
        });
    } else {
        tracing::debug!("stdin is not a terminal; skipping action reader");
    }

    #[cfg(unix)]
    {
        spawn_lifecycle_signal(
            SignalKind::user_defined1(),
            LifecycleEvent::Foreground,
            lifecycle_tx.clone(),
            cancel.clone(),
        );
        spawn_lifecycle_signal(
            SignalKind::user_defined2(),
            LifecycleEvent::Background,
            lifecycle_tx.clone(),
            cancel.clone(),
        );
    }

    let mut tasks = JoinSet::new();

    // Display
    tasks.spawn({
        let surface = CommandSurface::new(&cfg.renderer);
        let videos = CommandVideo::new(&cfg.renderer);
        let cancel = cancel.clone();
        async move {
            display::run(surface, videos, display_rx, playback_tx, cancel)
                .await
                .context("display task failed")
        }
    });

    // Sequencer
    tasks.spawn({
        let gate = AuthorizationGate::new(
            FolderPermissions::new(&cfg.content_folder, &cfg.permissions),
            cfg.permissions.capabilities.clone(),
        );
        let settings = Arc::new(CommandSettings::new(&cfg.settings));
        let sequencer = sequencer::Sequencer::new(
            gate,
            scanner,
            settings,
            sequencer::SequencerOptions::from(&cfg),
            display_tx,
        );
        let cancel = cancel.clone();
        async move {
            sequencer::run(sequencer, lifecycle_rx, actions_rx, playback_rx, cancel)
                .await
                .context("sequencer task failed")
        }
    });

    // Folder watcher (optional). Kept off the JoinSet: losing it only costs
    // live rescans, never the player.
    let watcher = cfg.watch_folder.then(|| {
        let folder = cfg.content_folder.clone();
        let lifecycle_tx = lifecycle_tx.clone();
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if let Err(err) = watch::run(folder, table, lifecycle_tx, cancel).await {
                tracing::warn!("folder watcher unavailable; rescans happen on resume only: {err:?}");
            }
        })
    });

    // The player starts in the foreground.
    lifecycle_tx
        .send(LifecycleEvent::Foreground)
        .await
        .context("sequencer stopped before start")?;

    // Display and sequencer only return on cancel or when their peer is gone,
    // so either one ending stops the player.
    while let Some(res) = tasks.join_next().await {
        match res {
            Ok(Ok(())) => {}
            Ok(Err(e)) => tracing::error!("task error: {e:?}"),
            Err(e) => tracing::error!("join error: {e}"),
        }
        cancel.cancel();
    }

    if let Some(watcher) = watcher {
        if let Err(e) = watcher.await {
            tracing::error!("join error: {e}");
        }
    }

    Ok(())
}

#[cfg(unix)]
fn spawn_lifecycle_signal(
    kind: SignalKind,
    event: LifecycleEvent,
    to_sequencer: mpsc::Sender<LifecycleEvent>,
    cancel: CancellationToken,
) {
    tokio::spawn(async move {
        match signal(kind) {
            Ok(mut stream) => loop {
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    received = stream.recv() => {
                        if received.is_none() {
                            break;
                        }
                        tracing::info!(?event, "lifecycle signal received");
                        if let Err(err) = to_sequencer.send(event).await {
                            tracing::warn!("failed to forward lifecycle event: {err}");
                            break;
                        }
                    }
                }
            },
            Err(err) => tracing::warn!(?event, "failed to register signal handler: {err}"),
        }
    });
}

fn run_dry_run(scanner: &ContentScanner) -> Result<()> {
    let report = scanner.scan();
    println!(
        "# playlist dry run\n# folder: {}\n# entries: {}\n",
        scanner.folder().display(),
        report.entries.len()
    );
    if let Some(err) = report.failure {
        println!("(scan failed: {err})");
        return Ok(());
    }
    if report.entries.is_empty() {
        println!("(no playable files in {})", scanner.folder().display());
        return Ok(());
    }
    for (idx, entry) in report.entries.iter().enumerate() {
        let kind = match entry.kind() {
            ContentKind::Image => "image",
            ContentKind::Video => "video",
        };
        println!("  {:>4}: {kind} {}", idx + 1, entry.locator().display());
    }
    Ok(())
}
