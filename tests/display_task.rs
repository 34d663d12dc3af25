use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use folder_signage::error::Error;
use folder_signage::events::{DisplayCommand, PlaybackEvent, PlaybackTicket};
use folder_signage::platform::renderer::{Surface, VideoBackend, VideoSession};
use folder_signage::tasks::display;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// Records every view the display task draws.
struct RecordingSurface {
    views: mpsc::UnboundedSender<String>,
}

impl RecordingSurface {
    fn record(&self, view: String) {
        let _ = self.views.send(view);
    }
}

impl Surface for RecordingSurface {
    fn permission_request(&mut self, folder: &Path) {
        self.record(format!("permission {}", folder.display()));
    }

    fn settings_prompt(&mut self, folder: &Path) {
        self.record(format!("settings {}", folder.display()));
    }

    fn empty_playlist(&mut self, folder: &Path) {
        self.record(format!("empty {}", folder.display()));
    }

    fn show_image(&mut self, locator: &Path) -> Result<(), Error> {
        self.record(format!("image {}", locator.display()));
        Ok(())
    }

    fn blank(&mut self) {
        self.record("blank".into());
    }
}

/// Videos finish when the test sends their outcome: `true` ends, `false` fails.
struct ScriptedVideos {
    endings: HashMap<PathBuf, oneshot::Receiver<bool>>,
    released: Arc<AtomicUsize>,
}

struct ScriptedSession {
    ending: oneshot::Receiver<bool>,
    released: Arc<AtomicUsize>,
    done: bool,
}

impl VideoBackend for ScriptedVideos {
    type Session = ScriptedSession;

    fn load(&mut self, locator: &Path) -> Result<ScriptedSession, Error> {
        let ending = self
            .endings
            .remove(locator)
            .ok_or_else(|| Error::Playback(format!("cannot decode {}", locator.display())))?;
        Ok(ScriptedSession {
            ending,
            released: Arc::clone(&self.released),
            done: false,
        })
    }
}

impl VideoSession for ScriptedSession {
    fn play(&mut self) -> Result<(), Error> {
        Ok(())
    }

    async fn finished(&mut self) -> Result<(), Error> {
        match (&mut self.ending).await {
            Ok(true) => Ok(()),
            Ok(false) => Err(Error::Playback("decoder error".into())),
            Err(_) => std::future::pending().await,
        }
    }

    fn release(&mut self) {
        if !self.done {
            self.done = true;
            self.released.fetch_add(1, Ordering::SeqCst);
        }
    }
}

struct Harness {
    commands: mpsc::Sender<DisplayCommand>,
    events: mpsc::Receiver<PlaybackEvent>,
    views: mpsc::UnboundedReceiver<String>,
    released: Arc<AtomicUsize>,
    cancel: CancellationToken,
    task: JoinHandle<anyhow::Result<()>>,
}

fn start(videos: &[&str]) -> (Harness, HashMap<String, oneshot::Sender<bool>>) {
    let mut endings = HashMap::new();
    let mut senders = HashMap::new();
    for name in videos {
        let (tx, rx) = oneshot::channel();
        endings.insert(PathBuf::from(name), rx);
        senders.insert(name.to_string(), tx);
    }
    let released = Arc::new(AtomicUsize::new(0));
    let (views_tx, views) = mpsc::unbounded_channel();
    let (commands, commands_rx) = mpsc::channel(8);
    let (events_tx, events) = mpsc::channel(8);
    let cancel = CancellationToken::new();
    let task = tokio::spawn(display::run(
        RecordingSurface { views: views_tx },
        ScriptedVideos {
            endings,
            released: Arc::clone(&released),
        },
        commands_rx,
        events_tx,
        cancel.clone(),
    ));
    (
        Harness {
            commands,
            events,
            views,
            released,
            cancel,
            task,
        },
        senders,
    )
}

impl Harness {
    async fn send(&self, command: DisplayCommand) {
        self.commands.send(command).await.unwrap();
    }

    async fn view(&mut self) -> String {
        self.views.recv().await.unwrap()
    }

    fn released(&self) -> usize {
        self.released.load(Ordering::SeqCst)
    }
}

fn video(name: &str, ticket: u64) -> DisplayCommand {
    DisplayCommand::Video {
        locator: PathBuf::from(name),
        ticket: PlaybackTicket::new(ticket),
    }
}

#[tokio::test]
async fn finished_video_reports_end_and_releases() {
    let (mut h, mut endings) = start(&["/m/a.mp4"]);
    h.send(video("/m/a.mp4", 1)).await;
    assert_eq!(h.view().await, "blank");

    endings.remove("/m/a.mp4").unwrap().send(true).unwrap();
    assert_eq!(
        h.events.recv().await.unwrap(),
        PlaybackEvent::Ended {
            ticket: PlaybackTicket::new(1)
        }
    );
    assert_eq!(h.released(), 1);
}

#[tokio::test]
async fn renderer_error_reports_failure() {
    let (mut h, mut endings) = start(&["/m/a.mp4"]);
    h.send(video("/m/a.mp4", 4)).await;
    endings.remove("/m/a.mp4").unwrap().send(false).unwrap();
    match h.events.recv().await.unwrap() {
        PlaybackEvent::Failed { ticket, reason } => {
            assert_eq!(ticket, PlaybackTicket::new(4));
            assert!(reason.contains("decoder error"));
        }
        other => panic!("expected failure, got {other:?}"),
    }
    assert_eq!(h.released(), 1);
}

#[tokio::test]
async fn load_failure_is_reported_immediately() {
    let (mut h, _endings) = start(&[]);
    h.send(video("/m/broken.mkv", 9)).await;
    match h.events.recv().await.unwrap() {
        PlaybackEvent::Failed { ticket, reason } => {
            assert_eq!(ticket, PlaybackTicket::new(9));
            assert!(reason.contains("cannot decode"));
        }
        other => panic!("expected failure, got {other:?}"),
    }
    assert_eq!(h.released(), 0);
}

#[tokio::test]
async fn next_command_releases_the_playing_video() {
    let (mut h, _endings) = start(&["/m/a.mp4"]);
    h.send(video("/m/a.mp4", 1)).await;
    assert_eq!(h.view().await, "blank");
    assert_eq!(h.released(), 0);

    h.send(DisplayCommand::Image {
        locator: PathBuf::from("/m/b.jpg"),
        ticket: PlaybackTicket::new(2),
    })
    .await;
    assert_eq!(h.view().await, "image /m/b.jpg");
    assert_eq!(h.released(), 1);

    // The replaced video never reports.
    assert!(h.events.try_recv().is_err());
}

#[tokio::test]
async fn views_are_forwarded_to_the_surface() {
    let (mut h, _endings) = start(&[]);
    let folder = PathBuf::from("/m");
    h.send(DisplayCommand::PermissionRequest {
        folder: folder.clone(),
    })
    .await;
    h.send(DisplayCommand::SettingsPrompt {
        folder: folder.clone(),
    })
    .await;
    h.send(DisplayCommand::EmptyPlaylist { folder }).await;
    assert_eq!(h.view().await, "permission /m");
    assert_eq!(h.view().await, "settings /m");
    assert_eq!(h.view().await, "empty /m");
}

#[tokio::test]
async fn cancel_releases_and_blanks() {
    let (mut h, _endings) = start(&["/m/a.mp4"]);
    h.send(video("/m/a.mp4", 1)).await;
    assert_eq!(h.view().await, "blank");

    h.cancel.cancel();
    (&mut h.task).await.unwrap().unwrap();
    assert_eq!(h.released(), 1);
    assert_eq!(h.views.recv().await.as_deref(), Some("blank"));
    assert!(h.events.try_recv().is_err());
}
