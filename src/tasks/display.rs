use anyhow::Result;
use std::path::Path;
use tokio::select;
use tokio::sync::mpsc::{Receiver, Sender};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::error::Error;
use crate::events::{DisplayCommand, PlaybackEvent, PlaybackTicket};
use crate::platform::renderer::{Surface, VideoBackend, VideoSession};

/// A playing video. The session is released when this is dropped.
struct ActiveVideo<S: VideoSession> {
    session: S,
    ticket: PlaybackTicket,
}

impl<S: VideoSession> Drop for ActiveVideo<S> {
    fn drop(&mut self) {
        debug!(ticket = %self.ticket, "releasing video session");
        self.session.release();
    }
}

/// Drives the surface and the video renderer from sequencer commands.
///
/// Rules:
/// - Every command replaces the current item; a playing video is released
///   before the next command is rendered.
/// - A video's end or failure is reported once under the ticket it was
///   started with, and the session is released right after.
/// - A video that cannot be loaded or started is reported as failed at once.
/// - On cancellation the held session is released and the surface blanked.
pub async fn run<S, V>(
    mut surface: S,
    mut videos: V,
    mut commands: Receiver<DisplayCommand>,
    to_sequencer: Sender<PlaybackEvent>,
    cancel: CancellationToken,
) -> Result<()>
where
    S: Surface,
    V: VideoBackend,
{
    let mut active: Option<ActiveVideo<V::Session>> = None;

    loop {
        select! {
            _ = cancel.cancelled() => {
                info!("cancel received; exiting display task");
                break;
            }

            maybe_cmd = commands.recv() => {
                let Some(command) = maybe_cmd else {
                    debug!("display command channel closed");
                    break;
                };
                drop(active.take());
                match command {
                    DisplayCommand::PermissionRequest { folder } => surface.permission_request(&folder),
                    DisplayCommand::SettingsPrompt { folder } => surface.settings_prompt(&folder),
                    DisplayCommand::EmptyPlaylist { folder } => surface.empty_playlist(&folder),
                    DisplayCommand::Blank => surface.blank(),
                    DisplayCommand::Image { locator, ticket } => {
                        if let Err(err) = surface.show_image(&locator) {
                            // Images advance on their timer regardless.
                            warn!(path = %locator.display(), %ticket, error = %err, "image could not be shown");
                        }
                    }
                    DisplayCommand::Video { locator, ticket } => {
                        surface.blank();
                        match start_video(&mut videos, &locator) {
                            Ok(session) => active = Some(ActiveVideo { session, ticket }),
                            Err(err) => {
                                let event = PlaybackEvent::Failed { ticket, reason: err.to_string() };
                                if to_sequencer.send(event).await.is_err() {
                                    warn!("sequencer channel closed");
                                    break;
                                }
                            }
                        }
                    }
                }
            }

            outcome = wait_active(&mut active), if active.is_some() => {
                let Some(video) = active.take() else { continue };
                let event = match outcome {
                    Ok(()) => PlaybackEvent::Ended { ticket: video.ticket },
                    Err(err) => PlaybackEvent::Failed { ticket: video.ticket, reason: err.to_string() },
                };
                drop(video);
                debug!(?event, "video finished");
                if to_sequencer.send(event).await.is_err() {
                    warn!("sequencer channel closed");
                    break;
                }
            }
        }
    }

    drop(active);
    surface.blank();
    Ok(())
}

fn start_video<V: VideoBackend>(videos: &mut V, locator: &Path) -> Result<V::Session, Error> {
    let mut session = videos.load(locator)?;
    if let Err(err) = session.play() {
        session.release();
        return Err(err);
    }
    debug!(path = %locator.display(), "video started");
    Ok(session)
}

async fn wait_active<S: VideoSession>(active: &mut Option<ActiveVideo<S>>) -> Result<(), Error> {
    match active {
        Some(video) => video.session.finished().await,
        None => std::future::pending().await,
    }
}
