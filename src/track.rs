//! # Track Types
//!
//! Shared data types for recommendations before and after catalog resolution.
//!
//! - [`TrackRef`]: a (title, artist) pair suggested by the model
//! - [`QueuedTrack`]: a `TrackRef` that was successfully handed to the catalog
//! - [`RecentHistory`]: capped log of tracks seen as "current" by the poller
//! - [`PlaybackMode`]: `smart` vs `playlist` labelling for the caller

use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::fmt;

/// Maximum number of entries kept in [`RecentHistory`].
pub const RECENT_HISTORY_CAP: usize = 100;

/// Unresolved (title, artist) pair suggested by the model.
///
/// Equality is an exact, case-sensitive match on both fields.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TrackRef {
    pub track_name: String,
    pub artist_name: String,
}

impl TrackRef {
    #[must_use]
    pub fn new(track_name: impl Into<String>, artist_name: impl Into<String>) -> Self {
        Self {
            track_name: track_name.into(),
            artist_name: artist_name.into(),
        }
    }

    /// Both fields carry text.
    #[must_use]
    pub fn is_complete(&self) -> bool {
        !self.track_name.is_empty() && !self.artist_name.is_empty()
    }

    #[must_use]
    pub fn matches(&self, track_name: &str, artist_name: &str) -> bool {
        self.track_name == track_name && self.artist_name == artist_name
    }
}

impl fmt::Display for TrackRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} by {}", self.track_name, self.artist_name)
    }
}

/// A track known to have been handed to the catalog's playback queue.
///
/// The local queue is advisory: it reflects "has been queued", not
/// "is still waiting to play".
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueuedTrack {
    pub track: TrackRef,
    /// Catalog identifier the track resolved to.
    pub uri: String,
}

impl QueuedTrack {
    #[must_use]
    pub fn track_name(&self) -> &str {
        &self.track.track_name
    }

    #[must_use]
    pub fn artist_name(&self) -> &str {
        &self.track.artist_name
    }
}

/// Ordered, capped record of tracks that were current at some polling tick.
///
/// Consecutive duplicates are collapsed and the oldest entry is evicted once
/// the cap is reached. Used only as a negative filter for recommendations.
#[derive(Debug, Clone, Default)]
pub struct RecentHistory {
    entries: VecDeque<TrackRef>,
}

impl RecentHistory {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append `track` unless it equals the most recent entry.
    ///
    /// Returns `true` when the track was recorded.
    pub fn record(&mut self, track: TrackRef) -> bool {
        if self.entries.back() == Some(&track) {
            return false;
        }
        self.entries.push_back(track);
        while self.entries.len() > RECENT_HISTORY_CAP {
            self.entries.pop_front();
        }
        true
    }

    #[must_use]
    pub fn contains(&self, track_name: &str, artist_name: &str) -> bool {
        self.entries.iter().any(|t| t.matches(track_name, artist_name))
    }

    #[must_use]
    pub fn last(&self) -> Option<&TrackRef> {
        self.entries.back()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &TrackRef> {
        self.entries.iter()
    }
}

/// How the caller should label the current queue.
///
/// Has no effect on queueing correctness.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PlaybackMode {
    #[default]
    Smart,
    Playlist,
}

impl PlaybackMode {
    #[must_use]
    pub fn toggled(self) -> Self {
        match self {
            Self::Smart => Self::Playlist,
            Self::Playlist => Self::Smart,
        }
    }

    #[must_use]
    pub fn label(self) -> &'static str {
        match self {
            Self::Smart => "smart",
            Self::Playlist => "playlist",
        }
    }
}

impl fmt::Display for PlaybackMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_track_ref_equality_is_case_sensitive() {
        let a = TrackRef::new("Song", "Artist");
        assert_eq!(a, TrackRef::new("Song", "Artist"));
        assert_ne!(a, TrackRef::new("song", "Artist"));
        assert!(a.matches("Song", "Artist"));
        assert!(!a.matches("Song", "artist"));
    }

    #[test]
    fn test_track_ref_completeness() {
        assert!(TrackRef::new("Song", "Artist").is_complete());
        assert!(!TrackRef::new("", "Artist").is_complete());
        assert!(!TrackRef::new("Song", "").is_complete());
    }

    #[test]
    fn test_recent_history_collapses_consecutive_duplicates() {
        let mut history = RecentHistory::new();
        assert!(history.record(TrackRef::new("A", "X")));
        assert!(!history.record(TrackRef::new("A", "X")));
        assert!(history.record(TrackRef::new("B", "Y")));
        // Non-consecutive repeats are kept
        assert!(history.record(TrackRef::new("A", "X")));
        assert_eq!(history.len(), 3);
    }

    #[test]
    fn test_recent_history_evicts_oldest_at_cap() {
        let mut history = RecentHistory::new();
        for i in 0..(RECENT_HISTORY_CAP + 10) {
            history.record(TrackRef::new(format!("Song{i}"), "Artist"));
        }
        assert_eq!(history.len(), RECENT_HISTORY_CAP);
        assert!(!history.contains("Song0", "Artist"));
        assert!(!history.contains("Song9", "Artist"));
        assert!(history.contains("Song10", "Artist"));
        assert_eq!(
            history.last(),
            Some(&TrackRef::new(format!("Song{}", RECENT_HISTORY_CAP + 9), "Artist"))
        );
    }

    #[test]
    fn test_playback_mode_toggle() {
        assert_eq!(PlaybackMode::default(), PlaybackMode::Smart);
        assert_eq!(PlaybackMode::Smart.toggled(), PlaybackMode::Playlist);
        assert_eq!(PlaybackMode::Playlist.toggled(), PlaybackMode::Smart);
        assert_eq!(PlaybackMode::Playlist.to_string(), "playlist");
    }
}
