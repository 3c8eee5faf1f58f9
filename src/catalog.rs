//! Playback catalog seam: resolve, enqueue and play tracks.

use crate::track::TrackRef;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CatalogError {
    /// The backend cannot be reached at all.
    #[error("Catalog unavailable: {0}")]
    Unavailable(String),

    #[error("Catalog command failed: {0}")]
    CommandFailed(String),
}

/// Player controls that do not involve the catalog.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transport {
    TogglePause,
    Next,
    Previous,
    /// Relative volume change in percent.
    Volume(i8),
}

/// A playback backend the DJ managers can drive.
///
/// Identifiers returned by [`resolve`](Self::resolve) are opaque to callers
/// and only ever passed back to [`enqueue`](Self::enqueue) or
/// [`play_now`](Self::play_now).
pub trait CatalogController: Send + Sync {
    /// Look up a playable identifier; `Ok(None)` means "no match".
    fn resolve(&self, track_name: &str, artist_name: &str) -> Result<Option<String>, CatalogError>;

    /// Append to the playback queue without interrupting playback.
    fn enqueue(&self, identifier: &str) -> Result<(), CatalogError>;

    /// Start playing `identifier` immediately.
    fn play_now(&self, identifier: &str) -> Result<(), CatalogError>;

    /// Currently playing track, if any.
    fn current_track(&self) -> Result<Option<TrackRef>, CatalogError>;

    /// One-line playback summary for display, when the backend has one.
    fn status_line(&self) -> Option<String> {
        None
    }

    /// Apply a player control. Backends without transport support refuse.
    fn transport(&self, action: Transport) -> Result<(), CatalogError> {
        Err(CatalogError::Unavailable(format!(
            "{action:?} is not supported by this backend"
        )))
    }
}
