use std::process::{Command, ExitStatus};
use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::config::SettingsOptions;
use crate::error::Error;
use crate::platform::renderer::shell_quote;

/// Opens the host's permission settings for this player.
pub trait SettingsRedirect: Send + Sync {
    fn open_capability_settings(&self, package_id: &str, group_hint: &str) -> Result<(), Error>;

    fn open_app_details(&self, package_id: &str) -> Result<(), Error>;
}

/// Try the capability settings screen first and fall back to the generic app
/// details screen. Failures are logged; returns whether either screen opened.
pub fn open_settings(redirect: &dyn SettingsRedirect, package_id: &str, group_hint: &str) -> bool {
    match redirect.open_capability_settings(package_id, group_hint) {
        Ok(()) => {
            info!(package_id, group_hint, "opened capability settings");
            return true;
        }
        Err(err) => warn!(
            package_id,
            group_hint,
            error = %err,
            "failed to open capability settings; falling back to app details"
        ),
    }
    match redirect.open_app_details(package_id) {
        Ok(()) => {
            info!(package_id, "opened app details settings");
            true
        }
        Err(err) => {
            warn!(package_id, error = %err, "failed to open app details settings");
            false
        }
    }
}

type CommandRunner = Arc<dyn Fn(&str) -> std::io::Result<ExitStatus> + Send + Sync>;

/// [`SettingsRedirect`] running configured shell commands.
#[derive(Clone)]
pub struct CommandSettings {
    capability_command: Option<String>,
    app_details_command: Option<String>,
    runner: CommandRunner,
}

impl CommandSettings {
    pub fn new(options: &SettingsOptions) -> Self {
        Self::build(options, Arc::new(run_shell))
    }

    fn build(options: &SettingsOptions, runner: CommandRunner) -> Self {
        Self {
            capability_command: options.capability_command.clone(),
            app_details_command: options.app_details_command.clone(),
            runner,
        }
    }

    #[cfg(test)]
    fn with_runner(options: &SettingsOptions, runner: CommandRunner) -> Self {
        Self::build(options, runner)
    }

    fn run(&self, what: &str, command: Option<String>) -> Result<(), Error> {
        let command =
            command.ok_or_else(|| Error::Settings(format!("no {what} command configured")))?;
        debug!(command, "running settings command");
        let status = (self.runner)(&command)?;
        if status.success() {
            Ok(())
        } else {
            Err(Error::Settings(format!("{what} command exited with {status}")))
        }
    }
}

impl SettingsRedirect for CommandSettings {
    fn open_capability_settings(&self, package_id: &str, group_hint: &str) -> Result<(), Error> {
        let command = self.capability_command.as_ref().map(|t| {
            t.replace("{package}", &shell_quote(package_id))
                .replace("{group}", &shell_quote(group_hint))
        });
        self.run("capability settings", command)
    }

    fn open_app_details(&self, package_id: &str) -> Result<(), Error> {
        let command = self
            .app_details_command
            .as_ref()
            .map(|t| t.replace("{package}", &shell_quote(package_id)));
        self.run("app details", command)
    }
}

fn run_shell(command: &str) -> std::io::Result<ExitStatus> {
    Command::new("sh").arg("-c").arg(command).status()
}
