//! Rendering seams and the command-driven host renderer.
//!
//! [`Surface`] draws the full-screen views and still images. Videos go
//! through [`VideoBackend`], whose sessions are native resources: the display
//! task releases them on every exit path, so `release` must be idempotent.

use std::future::Future;
use std::path::Path;

use tokio::process::{Child, Command};
use tracing::{debug, info, warn};

use crate::config::RendererOptions;
use crate::error::Error;

pub trait Surface: Send {
    fn permission_request(&mut self, folder: &Path);

    fn settings_prompt(&mut self, folder: &Path);

    fn empty_playlist(&mut self, folder: &Path);

    fn show_image(&mut self, locator: &Path) -> Result<(), Error>;

    fn blank(&mut self);
}

pub trait VideoBackend: Send {
    type Session: VideoSession;

    fn load(&mut self, locator: &Path) -> Result<Self::Session, Error>;
}

pub trait VideoSession: Send {
    fn play(&mut self) -> Result<(), Error>;

    /// Resolves with `Ok` when playback reached the end and `Err` when the
    /// renderer gave up. Must be cancel safe.
    fn finished(&mut self) -> impl Future<Output = Result<(), Error>> + Send;

    /// Free the decoder. Safe to call any number of times.
    fn release(&mut self);
}

/// Expand `{path}` in a command template, quoting the path for `sh -c`.
fn expand_path(template: &str, path: &Path) -> String {
    template.replace("{path}", &shell_quote(&path.to_string_lossy()))
}

pub(crate) fn shell_quote(raw: &str) -> String {
    format!("'{}'", raw.replace('\'', r"'\''"))
}

fn spawn_shell(command: &str) -> Result<Child, Error> {
    Command::new("sh")
        .arg("-c")
        .arg(command)
        .kill_on_drop(true)
        .spawn()
        .map_err(Error::from)
}

/// Host surface: views are logged, images are handed to an external viewer
/// that stays up until the next command.
#[derive(Debug)]
pub struct CommandSurface {
    image_command: Option<String>,
    viewer: Option<Child>,
}

impl CommandSurface {
    pub fn new(options: &RendererOptions) -> Self {
        Self {
            image_command: options.image_command.clone(),
            viewer: None,
        }
    }

    fn close_viewer(&mut self) {
        if let Some(mut child) = self.viewer.take() {
            if let Err(err) = child.start_kill() {
                debug!("image viewer already gone: {err}");
            }
        }
    }
}

impl Surface for CommandSurface {
    fn permission_request(&mut self, folder: &Path) {
        self.close_viewer();
        info!(
            folder = %folder.display(),
            "storage access required: allow the player to read this folder"
        );
    }

    fn settings_prompt(&mut self, folder: &Path) {
        self.close_viewer();
        info!(
            folder = %folder.display(),
            "storage access is blocked; enter 'settings' to open the permission settings"
        );
    }

    fn empty_playlist(&mut self, folder: &Path) {
        self.close_viewer();
        info!(
            folder = %folder.display(),
            "nothing to play: add videos or images to this folder"
        );
    }

    fn show_image(&mut self, locator: &Path) -> Result<(), Error> {
        self.close_viewer();
        match &self.image_command {
            Some(template) => {
                self.viewer = Some(spawn_shell(&expand_path(template, locator))?);
            }
            None => info!(path = %locator.display(), "showing image"),
        }
        Ok(())
    }

    fn blank(&mut self) {
        self.close_viewer();
    }
}

/// Host video renderer running one external player process per video.
#[derive(Debug, Clone)]
pub struct CommandVideo {
    video_command: Option<String>,
}

impl CommandVideo {
    pub fn new(options: &RendererOptions) -> Self {
        Self {
            video_command: options.video_command.clone(),
        }
    }
}

impl VideoBackend for CommandVideo {
    type Session = CommandSession;

    fn load(&mut self, locator: &Path) -> Result<CommandSession, Error> {
        let template = self
            .video_command
            .as_deref()
            .ok_or_else(|| Error::Playback("no video command configured".into()))?;
        Ok(CommandSession {
            command: expand_path(template, locator),
            child: None,
        })
    }
}

#[derive(Debug)]
pub struct CommandSession {
    command: String,
    child: Option<Child>,
}

impl VideoSession for CommandSession {
    fn play(&mut self) -> Result<(), Error> {
        if self.child.is_none() {
            debug!(command = self.command, "starting video player");
            self.child = Some(spawn_shell(&self.command)?);
        }
        Ok(())
    }

    async fn finished(&mut self) -> Result<(), Error> {
        let Some(child) = self.child.as_mut() else {
            return Err(Error::Playback("video player is not running".into()));
        };
        let status = child.wait().await?;
        if status.success() {
            Ok(())
        } else {
            Err(Error::Playback(format!("video player exited with {status}")))
        }
    }

    fn release(&mut self) {
        if let Some(mut child) = self.child.take() {
            if let Err(err) = child.start_kill() {
                // Already exited on its own.
                debug!("video player already gone: {err}");
            } else {
                warn!(command = self.command, "video player stopped before the end");
            }
        }
    }
}
