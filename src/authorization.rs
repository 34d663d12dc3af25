//! Storage-access gate in front of the content folder.
//!
//! The gate owns the status state machine; the host only answers three
//! questions through [`PermissionPlatform`]: is a capability held, what did
//! the user answer to a prompt, and may the prompt still be shown.

use std::collections::BTreeMap;
use std::fmt;
use std::future::Future;

use serde::Deserialize;
use tracing::{debug, info};

use crate::error::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Capability {
    ReadMediaImages,
    ReadMediaVideo,
    ReadExternalStorage,
}

impl Capability {
    fn as_str(&self) -> &'static str {
        match self {
            Self::ReadMediaImages => "read-media-images",
            Self::ReadMediaVideo => "read-media-video",
            Self::ReadExternalStorage => "read-external-storage",
        }
    }
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthorizationStatus {
    Unknown,
    Granted,
    Denied,
    PermanentlyDenied,
}

impl AuthorizationStatus {
    /// `Ok` only when granted; otherwise the error saying how to recover.
    pub fn ensure_granted(self) -> Result<(), Error> {
        match self {
            Self::Granted => Ok(()),
            Self::PermanentlyDenied => Err(Error::PermissionPermanentlyDenied),
            Self::Unknown | Self::Denied => Err(Error::PermissionDenied),
        }
    }
}

/// Per-capability answer to a permission prompt.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PermissionOutcome {
    grants: BTreeMap<Capability, bool>,
}

impl PermissionOutcome {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&mut self, capability: Capability, granted: bool) {
        self.grants.insert(capability, granted);
    }

    pub fn is_granted(&self, capability: Capability) -> bool {
        self.grants.get(&capability).copied().unwrap_or(false)
    }

    /// True when every capability in `requested` was granted. A capability
    /// the platform did not answer for counts as denied.
    pub fn all_granted(&self, requested: &[Capability]) -> bool {
        requested.iter().all(|cap| self.is_granted(*cap))
    }

    pub fn denied<'a>(&'a self, requested: &'a [Capability]) -> impl Iterator<Item = Capability> + 'a {
        requested
            .iter()
            .copied()
            .filter(|cap| !self.is_granted(*cap))
    }
}

impl FromIterator<(Capability, bool)> for PermissionOutcome {
    fn from_iter<I: IntoIterator<Item = (Capability, bool)>>(iter: I) -> Self {
        Self {
            grants: iter.into_iter().collect(),
        }
    }
}

/// Host permission subsystem.
pub trait PermissionPlatform: Send + Sync {
    /// Current grant state; must not prompt.
    fn is_granted(&self, capability: Capability) -> bool;

    /// Show one prompt for `capabilities` and resolve with the user's answers.
    fn request(
        &self,
        capabilities: &[Capability],
    ) -> impl Future<Output = PermissionOutcome> + Send;

    /// False once the platform would silently ignore further prompts.
    fn can_show_rationale(&self, capability: Capability) -> bool;
}

pub struct AuthorizationGate<P> {
    platform: P,
    capabilities: Vec<Capability>,
    status: AuthorizationStatus,
}

impl<P: PermissionPlatform> AuthorizationGate<P> {
    pub fn new(platform: P, capabilities: Vec<Capability>) -> Self {
        Self {
            platform,
            capabilities,
            status: AuthorizationStatus::Unknown,
        }
    }

    pub fn status(&self) -> AuthorizationStatus {
        self.status
    }

    pub fn capabilities(&self) -> &[Capability] {
        &self.capabilities
    }

    /// Query the platform without touching the gate's state.
    pub fn check(&self) -> AuthorizationStatus {
        if self
            .capabilities
            .iter()
            .all(|cap| self.platform.is_granted(*cap))
        {
            AuthorizationStatus::Granted
        } else {
            AuthorizationStatus::Denied
        }
    }

    /// Re-run [`check`](Self::check) and apply it. A permanent denial only
    /// lifts when the platform reports the capabilities as granted again.
    pub fn refresh(&mut self) -> AuthorizationStatus {
        let next = match (self.status, self.check()) {
            (_, AuthorizationStatus::Granted) => AuthorizationStatus::Granted,
            (AuthorizationStatus::PermanentlyDenied, _) => AuthorizationStatus::PermanentlyDenied,
            _ => AuthorizationStatus::Denied,
        };
        self.transition(next)
    }

    /// Prompt for the capability set. No prompt is issued while permanently
    /// denied since the platform would drop it without asking the user.
    pub async fn request(&mut self) -> AuthorizationStatus {
        if self.status == AuthorizationStatus::PermanentlyDenied {
            debug!("permission prompt suppressed; permanently denied");
            return self.status;
        }
        let outcome = self.platform.request(&self.capabilities).await;
        let next = if outcome.all_granted(&self.capabilities) {
            AuthorizationStatus::Granted
        } else if self.is_permanently_denied(&outcome) {
            AuthorizationStatus::PermanentlyDenied
        } else {
            AuthorizationStatus::Denied
        };
        self.transition(next)
    }

    /// Whether any denied capability can no longer be prompted for.
    pub fn is_permanently_denied(&self, outcome: &PermissionOutcome) -> bool {
        outcome
            .denied(&self.capabilities)
            .any(|cap| !self.platform.can_show_rationale(cap))
    }

    fn transition(&mut self, next: AuthorizationStatus) -> AuthorizationStatus {
        if self.status != next {
            info!(from = ?self.status, to = ?next, "authorization status changed");
            self.status = next;
        }
        next
    }
}
