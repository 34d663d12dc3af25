use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use tokio::select;
use tokio::sync::mpsc::{Receiver, Sender};
use tokio::time::{Instant, sleep_until};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::authorization::{AuthorizationGate, AuthorizationStatus, PermissionPlatform};
use crate::config::Configuration;
use crate::error::Error;
use crate::events::{DisplayCommand, LifecycleEvent, PlaybackEvent, UserAction};
use crate::platform::settings::{SettingsRedirect, open_settings};
use crate::playlist::Playlist;
use crate::scan::{ContentKind, ContentScanner};
use crate::trigger::TriggerSlot;

#[derive(Debug, Clone)]
pub struct SequencerOptions {
    pub image_dwell: Duration,
    pub failure_backoff: Duration,
    pub package_id: String,
    pub permission_group: String,
}

impl From<&Configuration> for SequencerOptions {
    fn from(cfg: &Configuration) -> Self {
        Self {
            image_dwell: cfg.image_dwell,
            failure_backoff: cfg.failure_backoff,
            package_id: cfg.settings.package_id.clone(),
            permission_group: cfg.settings.permission_group.clone(),
        }
    }
}

/// One serialized input to the sequencer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SequencerInput {
    Lifecycle(LifecycleEvent),
    Action(UserAction),
    Playback(PlaybackEvent),
    TimerElapsed,
}

/// Playback controller: authorization, rescans and advance triggers.
pub struct Sequencer<P> {
    gate: AuthorizationGate<P>,
    scanner: ContentScanner,
    playlist: Playlist,
    triggers: TriggerSlot,
    settings: Arc<dyn SettingsRedirect>,
    options: SequencerOptions,
    to_display: Sender<DisplayCommand>,
    consecutive_failures: usize,
    foreground: bool,
}

impl<P: PermissionPlatform> Sequencer<P> {
    pub fn new(
        gate: AuthorizationGate<P>,
        scanner: ContentScanner,
        settings: Arc<dyn SettingsRedirect>,
        options: SequencerOptions,
        to_display: Sender<DisplayCommand>,
    ) -> Self {
        Self {
            gate,
            scanner,
            playlist: Playlist::new(),
            triggers: TriggerSlot::new(),
            settings,
            options,
            to_display,
            consecutive_failures: 0,
            foreground: false,
        }
    }

    pub fn authorization(&self) -> AuthorizationStatus {
        self.gate.status()
    }

    pub fn playlist(&self) -> &Playlist {
        &self.playlist
    }

    /// Deadline of the armed timer trigger, if one is armed.
    pub fn timer_deadline(&self) -> Option<Instant> {
        self.triggers.deadline()
    }

    pub async fn handle(&mut self, input: SequencerInput) -> Result<()> {
        match input {
            SequencerInput::Lifecycle(event) => self.on_lifecycle(event).await,
            SequencerInput::Action(action) => self.on_action(action).await,
            SequencerInput::Playback(event) => self.on_playback(event).await,
            SequencerInput::TimerElapsed => self.on_timer().await,
        }
    }

    /// Drop any armed trigger. The display task releases what it holds on
    /// its own cancellation.
    pub fn shutdown(&mut self) {
        if let Some(armed) = self.triggers.disarm() {
            debug!(ticket = %armed.ticket, index = armed.index, "trigger cancelled on shutdown");
        }
    }

    async fn on_lifecycle(&mut self, event: LifecycleEvent) -> Result<()> {
        match event {
            LifecycleEvent::Foreground => {
                self.foreground = true;
                self.authorize().await
            }
            LifecycleEvent::Background => {
                self.foreground = false;
                self.triggers.disarm();
                info!("moved to background; playback suspended");
                self.show(DisplayCommand::Blank).await
            }
            LifecycleEvent::FolderChanged => {
                if self.foreground && self.gate.status() == AuthorizationStatus::Granted {
                    info!("content folder changed; rescanning");
                    self.rescan().await
                } else {
                    debug!(status = ?self.gate.status(), "folder change ignored");
                    Ok(())
                }
            }
        }
    }

    async fn on_action(&mut self, action: UserAction) -> Result<()> {
        if !self.foreground {
            debug!(?action, "user action ignored while in background");
            return Ok(());
        }
        match (action, self.gate.status()) {
            (_, AuthorizationStatus::Granted) => {
                debug!(?action, "user action ignored; access already granted");
                Ok(())
            }
            (UserAction::RetryPermission, AuthorizationStatus::PermanentlyDenied) => {
                self.show_blocked().await
            }
            (UserAction::RetryPermission, _) => self.request_access().await,
            (UserAction::OpenSettings, _) => {
                self.redirect_to_settings().await;
                self.show_permission_request().await
            }
            (UserAction::DismissSettings, _) => self.show_permission_request().await,
        }
    }

    async fn authorize(&mut self) -> Result<()> {
        match self.gate.refresh() {
            AuthorizationStatus::Granted => self.rescan().await,
            AuthorizationStatus::PermanentlyDenied => self.show_blocked().await,
            AuthorizationStatus::Denied | AuthorizationStatus::Unknown => {
                self.request_access().await
            }
        }
    }

    async fn request_access(&mut self) -> Result<()> {
        self.clear_playlist();
        self.show_permission_request().await?;
        let status = self.gate.request().await;
        match status.ensure_granted() {
            Ok(()) => self.rescan().await,
            Err(err @ Error::PermissionPermanentlyDenied) => {
                warn!(error = %err, "settings redirect required");
                self.show_blocked().await
            }
            Err(err) => {
                warn!(error = %err, ?status, "waiting for retry");
                Ok(())
            }
        }
    }

    async fn rescan(&mut self) -> Result<()> {
        let report = self.scanner.scan_blocking().await;
        if let Some(err) = &report.failure {
            warn!(error = %err, "scan failed; treating folder as empty until the next resume");
        }
        self.playlist.replace(report.entries);
        self.consecutive_failures = 0;
        info!(
            folder = %self.scanner.folder().display(),
            entries = self.playlist.len(),
            "playlist rebuilt"
        );
        self.play_current().await
    }

    /// Show the current entry and arm its trigger, replacing any armed one.
    async fn play_current(&mut self) -> Result<()> {
        self.triggers.disarm();
        let Some(entry) = self.playlist.current() else {
            return self
                .show(DisplayCommand::EmptyPlaylist {
                    folder: self.folder(),
                })
                .await;
        };
        let index = self.playlist.index();
        let locator = entry.locator().to_path_buf();
        let kind = entry.kind();
        let command = match kind {
            ContentKind::Image => {
                self.consecutive_failures = 0;
                let deadline = Instant::now() + self.options.image_dwell;
                let ticket = self.triggers.arm_timer(index, deadline);
                DisplayCommand::Image {
                    locator: locator.clone(),
                    ticket,
                }
            }
            ContentKind::Video => {
                let ticket = self.triggers.arm_signal(index);
                DisplayCommand::Video {
                    locator: locator.clone(),
                    ticket,
                }
            }
        };
        debug!(index, ?kind, path = %locator.display(), "now showing");
        self.show(command).await
    }

    async fn advance(&mut self) -> Result<()> {
        self.playlist.advance();
        self.play_current().await
    }

    async fn on_timer(&mut self) -> Result<()> {
        match self.triggers.take_elapsed(Instant::now()) {
            Some(fired) => {
                debug!(ticket = %fired.ticket, index = fired.index, "timer elapsed");
                self.advance().await
            }
            None => Ok(()),
        }
    }

    async fn on_playback(&mut self, event: PlaybackEvent) -> Result<()> {
        let Some(armed) = self.triggers.take_signal(event.ticket()) else {
            debug!(?event, "stale playback event ignored");
            return Ok(());
        };
        match event {
            PlaybackEvent::Ended { .. } => {
                self.consecutive_failures = 0;
                self.advance().await
            }
            PlaybackEvent::Failed { reason, .. } => {
                self.consecutive_failures += 1;
                warn!(
                    index = armed.index,
                    reason,
                    failures = self.consecutive_failures,
                    "playback failed; advancing"
                );
                let backoff = self.options.failure_backoff;
                if !backoff.is_zero() && self.consecutive_failures >= self.playlist.len() {
                    warn!(?backoff, "every entry failed in a row; backing off");
                    self.triggers.arm_timer(armed.index, Instant::now() + backoff);
                    self.show(DisplayCommand::Blank).await
                } else {
                    self.advance().await
                }
            }
        }
    }

    async fn show_permission_request(&mut self) -> Result<()> {
        self.show(DisplayCommand::PermissionRequest {
            folder: self.folder(),
        })
        .await
    }

    async fn show_blocked(&mut self) -> Result<()> {
        self.clear_playlist();
        self.show(DisplayCommand::SettingsPrompt {
            folder: self.folder(),
        })
        .await
    }

    async fn redirect_to_settings(&self) {
        let settings = Arc::clone(&self.settings);
        let package_id = self.options.package_id.clone();
        let group = self.options.permission_group.clone();
        let opened = tokio::task::spawn_blocking(move || {
            open_settings(settings.as_ref(), &package_id, &group)
        })
        .await;
        match opened {
            Ok(true) => {}
            Ok(false) => warn!("no settings screen could be opened"),
            Err(err) => warn!("settings redirect task failed: {err}"),
        }
    }

    fn clear_playlist(&mut self) {
        self.triggers.disarm();
        self.playlist.replace(Vec::new());
    }

    fn folder(&self) -> PathBuf {
        self.scanner.folder().to_path_buf()
    }

    async fn show(&self, command: DisplayCommand) -> Result<()> {
        self.to_display
            .send(command)
            .await
            .context("display channel closed")
    }
}

/// Serializes lifecycle events, user actions, renderer signals and the
/// image timer onto one sequencer.
///
/// Rules:
/// - Inputs are handled one at a time; a handler (including a pending
///   permission prompt or scan) finishes before the next input is taken.
/// - The timer branch only exists while a timer trigger is armed and is
///   rebuilt from the current trigger on every turn, so a replaced trigger
///   can never fire.
/// - Cancellation interrupts a pending handler and disarms the trigger.
pub async fn run<P: PermissionPlatform>(
    mut sequencer: Sequencer<P>,
    mut lifecycle_rx: Receiver<LifecycleEvent>,
    mut actions_rx: Receiver<UserAction>,
    mut playback_rx: Receiver<PlaybackEvent>,
    cancel: CancellationToken,
) -> Result<()> {
    loop {
        let deadline = sequencer.timer_deadline();
        let input = select! {
            _ = cancel.cancelled() => break,
            Some(event) = lifecycle_rx.recv() => SequencerInput::Lifecycle(event),
            Some(action) = actions_rx.recv() => SequencerInput::Action(action),
            Some(event) = playback_rx.recv() => SequencerInput::Playback(event),
            _ = sleep_until(deadline.unwrap_or_else(Instant::now)), if deadline.is_some() => {
                SequencerInput::TimerElapsed
            }
        };

        select! {
            _ = cancel.cancelled() => break,
            res = sequencer.handle(input) => res?,
        }
    }

    info!("cancel received; exiting sequencer task");
    sequencer.shutdown();
    Ok(())
}
