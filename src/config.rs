use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result, ensure};
use serde::Deserialize;

use crate::authorization::Capability;

/// Folder created under the movies root when no explicit folder is configured.
pub const APP_FOLDER_NAME: &str = "Display";

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case", default, deny_unknown_fields)]
pub struct Configuration {
    /// Folder whose direct children make up the playlist.
    pub content_folder: PathBuf,
    /// How long a still image stays on screen before the playlist advances.
    #[serde(with = "humantime_serde")]
    pub image_dwell: Duration,
    /// Delay inserted before advancing once every entry failed in a row.
    /// Zero advances immediately on every failure.
    #[serde(with = "humantime_serde")]
    pub failure_backoff: Duration,
    /// Rescan when files appear or disappear while the player is running.
    pub watch_folder: bool,
    pub extensions: ExtensionOptions,
    pub permissions: PermissionOptions,
    pub settings: SettingsOptions,
    pub renderer: RendererOptions,
}

impl Configuration {
    pub fn from_yaml_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let s = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        Ok(serde_yaml::from_str(&s)?)
    }

    /// Validate runtime invariants that cannot be expressed via serde defaults alone.
    pub fn validated(mut self) -> Result<Self> {
        ensure!(
            !self.content_folder.as_os_str().is_empty(),
            "content-folder must not be empty"
        );
        ensure!(
            !self.image_dwell.is_zero(),
            "image-dwell must be greater than zero"
        );
        self.extensions
            .normalize()
            .context("invalid extensions table")?;
        self.permissions.validate()?;
        self.settings.validate()?;
        self.renderer.validate()?;
        Ok(self)
    }
}

impl Default for Configuration {
    fn default() -> Self {
        Self {
            content_folder: default_content_folder(),
            image_dwell: Duration::from_secs(10),
            failure_backoff: Duration::from_secs(5),
            watch_folder: false,
            extensions: ExtensionOptions::default(),
            permissions: PermissionOptions::default(),
            settings: SettingsOptions::default(),
            renderer: RendererOptions::default(),
        }
    }
}

/// `<movies root>/Display`, with the movies root resolved from `$HOME/Videos`.
pub fn default_content_folder() -> PathBuf {
    let movies = match std::env::var_os("HOME") {
        Some(home) => PathBuf::from(home).join("Videos"),
        None => PathBuf::from("Videos"),
    };
    movies.join(APP_FOLDER_NAME)
}

/// File extensions (lowercase, without the dot) per content kind.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case", default, deny_unknown_fields)]
pub struct ExtensionOptions {
    pub video: Vec<String>,
    pub image: Vec<String>,
}

impl ExtensionOptions {
    fn normalize(&mut self) -> Result<()> {
        for ext in self.video.iter_mut().chain(self.image.iter_mut()) {
            let trimmed = ext.trim().trim_start_matches('.').to_ascii_lowercase();
            ensure!(!trimmed.is_empty(), "extensions must not be blank");
            *ext = trimmed;
        }
        ensure!(
            !self.video.is_empty() || !self.image.is_empty(),
            "at least one extension must be configured"
        );
        let videos: HashSet<&str> = self.video.iter().map(String::as_str).collect();
        if let Some(dup) = self.image.iter().find(|e| videos.contains(e.as_str())) {
            anyhow::bail!("extension '{dup}' is listed as both video and image");
        }
        Ok(())
    }
}

impl Default for ExtensionOptions {
    fn default() -> Self {
        Self {
            video: ["mp4", "mkv", "webm"].map(String::from).to_vec(),
            image: ["jpg", "jpeg", "png", "webp"].map(String::from).to_vec(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case", default, deny_unknown_fields)]
pub struct PermissionOptions {
    /// Capability set that must be held before the folder is read.
    pub capabilities: Vec<Capability>,
    /// Shell command run for a permission prompt; exit status 0 grants.
    pub prompt_command: Option<String>,
    /// Denied prompts after which the platform stops asking.
    pub max_prompts: u32,
}

impl PermissionOptions {
    fn validate(&self) -> Result<()> {
        ensure!(
            !self.capabilities.is_empty(),
            "permissions.capabilities must list at least one capability"
        );
        ensure!(
            self.max_prompts >= 1,
            "permissions.max-prompts must be >= 1"
        );
        ensure_not_blank(self.prompt_command.as_deref(), "permissions.prompt-command")
    }
}

impl Default for PermissionOptions {
    fn default() -> Self {
        Self {
            capabilities: vec![Capability::ReadMediaImages, Capability::ReadMediaVideo],
            prompt_command: None,
            max_prompts: 2,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case", default, deny_unknown_fields)]
pub struct SettingsOptions {
    pub package_id: String,
    /// Permission group shown by the capability settings screen.
    pub permission_group: String,
    /// Opens the capability settings; `{package}` and `{group}` are substituted.
    pub capability_command: Option<String>,
    /// Generic app details screen; `{package}` is substituted.
    pub app_details_command: Option<String>,
}

impl SettingsOptions {
    fn validate(&self) -> Result<()> {
        ensure!(
            !self.package_id.trim().is_empty(),
            "settings.package-id must not be empty"
        );
        ensure_not_blank(
            self.capability_command.as_deref(),
            "settings.capability-command",
        )?;
        ensure_not_blank(
            self.app_details_command.as_deref(),
            "settings.app-details-command",
        )
    }
}

impl Default for SettingsOptions {
    fn default() -> Self {
        Self {
            package_id: env!("CARGO_PKG_NAME").to_string(),
            permission_group: "read-media-visual".to_string(),
            capability_command: None,
            app_details_command: None,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "kebab-case", default, deny_unknown_fields)]
pub struct RendererOptions {
    /// Viewer kept running while an image is on screen; `{path}` is substituted.
    pub image_command: Option<String>,
    /// Player run once per video; exit status 0 means the video ended.
    pub video_command: Option<String>,
}

impl RendererOptions {
    fn validate(&self) -> Result<()> {
        ensure_not_blank(self.image_command.as_deref(), "renderer.image-command")?;
        ensure_not_blank(self.video_command.as_deref(), "renderer.video-command")
    }
}

fn ensure_not_blank(command: Option<&str>, what: &str) -> Result<()> {
    if let Some(command) = command {
        ensure!(!command.trim().is_empty(), "{what} must not be blank");
    }
    Ok(())
}
