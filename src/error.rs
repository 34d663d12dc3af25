use std::path::PathBuf;

use thiserror::Error;

/// Library error type for signage operations.
///
/// None of these are fatal to the player: each one is absorbed by the
/// component that detects it and turned into the next state transition.
#[derive(Debug, Error)]
pub enum Error {
    /// Read access to the content folder was refused; a new prompt may help.
    #[error("storage access denied")]
    PermissionDenied,

    /// Read access was refused and the platform will not prompt again.
    #[error("storage access permanently denied; grant it from the system settings")]
    PermissionPermanentlyDenied,

    /// Enumerating the content folder failed.
    #[error("failed to scan content folder {}: {source}", folder.display())]
    ScanIo {
        folder: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The renderer reported an error for the current item.
    #[error("playback failed: {0}")]
    Playback(String),

    /// Neither settings screen could be opened.
    #[error("settings redirect failed: {0}")]
    Settings(String),

    /// Underlying IO error.
    #[error(transparent)]
    Io(#[from] std::io::Error),
}
