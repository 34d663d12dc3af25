//! Permission platform for a kiosk host.
//!
//! There is no OS prompt here: a capability counts as granted while the
//! player can read the content folder. A prompt is an optional external
//! command, and after `max-prompts` refusals the platform stops asking.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU32, Ordering};

use tokio::process::Command;
use tracing::{debug, warn};

use crate::authorization::{Capability, PermissionOutcome, PermissionPlatform};
use crate::config::PermissionOptions;
use crate::platform::renderer::shell_quote;

#[derive(Debug)]
pub struct FolderPermissions {
    folder: PathBuf,
    prompt_command: Option<String>,
    max_prompts: u32,
    denials: AtomicU32,
}

impl FolderPermissions {
    pub fn new(folder: impl Into<PathBuf>, options: &PermissionOptions) -> Self {
        Self {
            folder: folder.into(),
            prompt_command: options.prompt_command.clone(),
            max_prompts: options.max_prompts,
            denials: AtomicU32::new(0),
        }
    }

    async fn prompt(&self) -> bool {
        let Some(template) = &self.prompt_command else {
            return true;
        };
        let command =
            template.replace("{folder}", &shell_quote(&self.folder.to_string_lossy()));
        match Command::new("sh").arg("-c").arg(&command).status().await {
            Ok(status) => {
                debug!(command, %status, "permission prompt answered");
                status.success()
            }
            Err(err) => {
                warn!(command, error = %err, "permission prompt could not run");
                false
            }
        }
    }
}

impl PermissionPlatform for FolderPermissions {
    fn is_granted(&self, _capability: Capability) -> bool {
        readable(&self.folder)
    }

    async fn request(&self, capabilities: &[Capability]) -> PermissionOutcome {
        let granted = self.prompt().await && readable(&self.folder);
        if !granted {
            self.denials.fetch_add(1, Ordering::Relaxed);
        }
        capabilities.iter().map(|cap| (*cap, granted)).collect()
    }

    fn can_show_rationale(&self, _capability: Capability) -> bool {
        self.prompt_command.is_some() && self.denials.load(Ordering::Relaxed) < self.max_prompts
    }
}

/// Read access to `folder`, or to its nearest existing ancestor when the
/// folder has not been created yet.
fn readable(folder: &Path) -> bool {
    let Some(target) = folder.ancestors().find(|p| p.exists()) else {
        return false;
    };
    fs::read_dir(target).is_ok()
}
