use crate::events::LifecycleEvent;
use crate::scan::ExtensionTable;
use anyhow::Result;
use notify::event::ModifyKind;
use notify::{Event, EventKind, RecursiveMode, Watcher, recommended_watcher};
use std::path::{Path, PathBuf};
use tokio::select;
use tokio::sync::mpsc::{self, Sender};
use tokio::time::{Duration, Instant, sleep_until};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

/// Quiet period used to fold a burst of content edits into one rescan.
const SETTLE: Duration = Duration::from_millis(500);
/// How often a folder that cannot be watched yet is tried again.
const RETRY: Duration = Duration::from_secs(5);

/// Watches the content folder (non-recursive) and emits
/// [`LifecycleEvent::FolderChanged`] once a burst of content edits settles.
///
/// Rules:
/// - The folder is never created here; a missing or unreadable folder is
///   retried every [`RETRY`] until it can be watched.
/// - Only content edits push the settle deadline; other file events never
///   delay a pending rescan.
/// - Returns on cancellation or once the sequencer is gone.
#[instrument(skip(folder, table, to_sequencer, cancel), fields(folder = %folder.display()))]
pub async fn run(
    folder: PathBuf,
    table: ExtensionTable,
    to_sequencer: Sender<LifecycleEvent>,
    cancel: CancellationToken,
) -> Result<()> {
    // Bridge notify callback -> async channel
    let (watch_tx, mut watch_rx) = mpsc::channel::<notify::Result<Event>>(128);
    let mut watcher = recommended_watcher(move |res| {
        let _ = watch_tx.blocking_send(res);
    })?;

    let mut retry_at = match start_watch(&mut watcher, &folder) {
        Ok(()) => None,
        Err(err) => {
            warn!("folder cannot be watched yet; retrying every {RETRY:?}: {err}");
            Some(Instant::now() + RETRY)
        }
    };
    let mut settle_at: Option<Instant> = None;

    loop {
        select! {
            _ = cancel.cancelled() => {
                info!("cancel received; exiting watch task");
                break;
            }

            Some(res) = watch_rx.recv() => match res {
                Ok(event) => {
                    if is_folder_removed(&event, &folder) {
                        warn!("content folder removed; waiting for it to return");
                        let _ = watcher.unwatch(&folder);
                        retry_at = Some(Instant::now() + RETRY);
                        settle_at = Some(Instant::now() + SETTLE);
                    } else if is_content_change(&event, &table) {
                        debug!(kind = ?event.kind, paths = ?event.paths, "content change");
                        settle_at = Some(Instant::now() + SETTLE);
                    } else {
                        debug!(kind = ?event.kind, "fs: ignored");
                    }
                }
                Err(err) => warn!("watch error: {err}"),
            },

            _ = sleep_until(settle_at.unwrap_or_else(Instant::now)), if settle_at.is_some() => {
                settle_at = None;
                if to_sequencer.send(LifecycleEvent::FolderChanged).await.is_err() {
                    debug!("sequencer channel closed");
                    break;
                }
            }

            _ = sleep_until(retry_at.unwrap_or_else(Instant::now)), if retry_at.is_some() => {
                match start_watch(&mut watcher, &folder) {
                    Ok(()) => {
                        retry_at = None;
                        // Files may have arrived while the folder was not watched.
                        settle_at = Some(Instant::now() + SETTLE);
                    }
                    Err(err) => {
                        debug!("folder still cannot be watched: {err}");
                        retry_at = Some(Instant::now() + RETRY);
                    }
                }
            }
        }
    }
    Ok(())
}

fn start_watch(watcher: &mut impl Watcher, folder: &Path) -> notify::Result<()> {
    watcher.watch(folder, RecursiveMode::NonRecursive)?;
    info!("folder watcher initialized");
    Ok(())
}

/// Creations, removals and renames of files that classify as content.
pub fn is_content_change(event: &Event, table: &ExtensionTable) -> bool {
    let relevant = matches!(
        event.kind,
        EventKind::Create(_) | EventKind::Remove(_) | EventKind::Modify(ModifyKind::Name(_))
    );
    relevant && event.paths.iter().any(|p| table.classify(p).is_some())
}

fn is_folder_removed(event: &Event, folder: &Path) -> bool {
    matches!(
        event.kind,
        EventKind::Remove(_) | EventKind::Modify(ModifyKind::Name(_))
    ) && event.paths.iter().any(|p| p == folder)
}
