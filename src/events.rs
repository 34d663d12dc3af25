use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

/// Host lifecycle transitions, plus folder edits seen by the watcher.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleEvent {
    Foreground,
    Background,
    FolderChanged,
}

/// Input from the presentation layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UserAction {
    RetryPermission,
    OpenSettings,
    DismissSettings,
}

impl FromStr for UserAction {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "retry" => Ok(Self::RetryPermission),
            "settings" => Ok(Self::OpenSettings),
            "dismiss" => Ok(Self::DismissSettings),
            other => Err(format!(
                "unknown action '{other}' (expected retry, settings or dismiss)"
            )),
        }
    }
}

/// Identifies one armed advance trigger.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct PlaybackTicket(u64);

impl PlaybackTicket {
    pub const fn new(raw: u64) -> Self {
        Self(raw)
    }
}

impl fmt::Display for PlaybackTicket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Sequencer -> display task. Each command replaces whatever is on screen.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DisplayCommand {
    PermissionRequest { folder: PathBuf },
    /// Settings dialog drawn over the permission view.
    SettingsPrompt { folder: PathBuf },
    EmptyPlaylist { folder: PathBuf },
    Image { locator: PathBuf, ticket: PlaybackTicket },
    Video { locator: PathBuf, ticket: PlaybackTicket },
    Blank,
}

/// Display task -> sequencer, for the video started under `ticket`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlaybackEvent {
    Ended { ticket: PlaybackTicket },
    Failed { ticket: PlaybackTicket, reason: String },
}

impl PlaybackEvent {
    pub fn ticket(&self) -> PlaybackTicket {
        match self {
            Self::Ended { ticket } | Self::Failed { ticket, .. } => *ticket,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_user_actions() {
        assert_eq!("retry".parse(), Ok(UserAction::RetryPermission));
        assert_eq!(" Settings\n".parse(), Ok(UserAction::OpenSettings));
        assert_eq!("dismiss".parse(), Ok(UserAction::DismissSettings));
        assert!("reboot".parse::<UserAction>().is_err());
    }

    #[test]
    fn playback_event_exposes_ticket() {
        let ticket = PlaybackTicket::new(7);
        let failed = PlaybackEvent::Failed {
            ticket,
            reason: "decoder".into(),
        };
        assert_eq!(failed.ticket(), ticket);
        assert_eq!(ticket.to_string(), "#7");
    }
}
