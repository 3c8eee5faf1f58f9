//! # Up Next: Queue Orchestration
//!
//! [`UpNextManager`] turns model recommendations into a deduplicated playback
//! queue. It owns three pieces of state and nothing else mutates them:
//!
//! - the pending queue of [`QueuedTrack`]s (at most [`QUEUE_CAP`], newest kept)
//! - [`RecentHistory`], fed only by [`maintain_queue`](UpNextManager::maintain_queue)
//! - the [`PlaybackMode`] label
//!
//! ## Polling Contract
//!
//! The caller feeds the current track into `maintain_queue` on every tick.
//! With auto-DJ on, an empty queue triggers exactly one batch request; a
//! non-empty queue makes the call a no-op apart from history bookkeeping, so
//! repeated ticks on the same track never hit the model again.
//!
//! ## Failure Semantics
//!
//! Model failures, catalog failures and unparseable answers all end as
//! "nothing queued" plus a log line and a status [`Notice`]. The only error
//! returned is [`DjError::MissingTemplate`](crate::error::DjError::MissingTemplate),
//! which means the deployment is missing a prompt.
//!
//! ## Notices
//!
//! Intros, commentary, insights and status lines are pushed to an outbox
//! instead of being printed. The caller drains it with
//! [`take_notices`](UpNextManager::take_notices) after each operation.

use crate::catalog::CatalogController;
use crate::config::{DjSettings, Settings};
use crate::error::DjResult;
use crate::model::{CancelFlag, ModelClient, ModelError};
use crate::parser::{parse_batch_with_intro, parse_numbered_list, parse_response, parse_single};
use crate::prompts::{self, PromptTemplates};
use crate::track::{PlaybackMode, QueuedTrack, RecentHistory, TrackRef};
use log::{debug, info, warn};
use std::collections::VecDeque;
use std::sync::Arc;

/// Maximum number of entries kept in the pending queue.
pub const QUEUE_CAP: usize = 5;

/// Oldest notices are dropped past this many undrained entries.
pub const NOTICE_CAP: usize = 50;

/// Intro text used when the intro request comes back empty.
pub const DEAD_AIR_INTRO: &str = "[DJ dead air] No intro available.";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeKind {
    Intro,
    Commentary,
    Insight,
    Status,
}

/// Something the caller should show the listener.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    pub kind: NoticeKind,
    pub text: String,
}

/// Recommendation queue orchestrator.
pub struct UpNextManager {
    model: Arc<dyn ModelClient>,
    catalog: Arc<dyn CatalogController>,
    templates: PromptTemplates,
    settings: DjSettings,
    cancel: Option<CancelFlag>,
    queue: Vec<QueuedTrack>,
    recent: RecentHistory,
    mode: PlaybackMode,
    auto_dj_enabled: bool,
    intros_shown: u32,
    notices: VecDeque<Notice>,
}

impl UpNextManager {
    #[must_use]
    pub fn new(
        model: Arc<dyn ModelClient>,
        catalog: Arc<dyn CatalogController>,
        templates: PromptTemplates,
        settings: DjSettings,
    ) -> Self {
        Self {
            model,
            catalog,
            templates,
            settings,
            cancel: None,
            queue: Vec::new(),
            recent: RecentHistory::new(),
            mode: PlaybackMode::default(),
            auto_dj_enabled: false,
            intros_shown: 0,
            notices: VecDeque::new(),
        }
    }

    /// Manager configured from a loaded settings document.
    #[must_use]
    pub fn from_settings(
        model: Arc<dyn ModelClient>,
        catalog: Arc<dyn CatalogController>,
        settings: &Settings,
    ) -> Self {
        Self::new(model, catalog, settings.templates(), settings.dj.clone())
    }

    /// Issue every model request against `cancel`.
    #[must_use]
    pub fn with_cancel(mut self, cancel: CancelFlag) -> Self {
        self.cancel = Some(cancel);
        self
    }

    #[must_use]
    pub fn queue(&self) -> &[QueuedTrack] {
        &self.queue
    }

    #[must_use]
    pub fn mode(&self) -> PlaybackMode {
        self.mode
    }

    #[must_use]
    pub fn recent(&self) -> &RecentHistory {
        &self.recent
    }

    #[must_use]
    pub fn auto_dj_enabled(&self) -> bool {
        self.auto_dj_enabled
    }

    pub fn set_auto_dj_enabled(&mut self, enabled: bool) {
        info!("Auto-DJ {}", if enabled { "enabled" } else { "disabled" });
        self.auto_dj_enabled = enabled;
    }

    #[must_use]
    pub fn settings(&self) -> &DjSettings {
        &self.settings
    }

    #[must_use]
    pub fn host_name(&self) -> &str {
        &self.settings.host_name
    }

    #[must_use]
    pub fn intro_count(&self) -> u32 {
        self.settings.intro_count
    }

    #[must_use]
    pub fn chatter_level(&self) -> &str {
        &self.settings.chatter_level
    }

    #[must_use]
    pub fn intros_shown(&self) -> u32 {
        self.intros_shown
    }

    /// Drain the notice outbox, oldest first.
    pub fn take_notices(&mut self) -> Vec<Notice> {
        self.notices.drain(..).collect()
    }

    /// Per-tick bookkeeping; may trigger one batch request.
    ///
    /// Records the current track into recent history, asks for a batch when
    /// auto-DJ is on and the queue is empty, then caps the queue.
    ///
    /// # Errors
    ///
    /// [`DjError::MissingTemplate`](crate::error::DjError::MissingTemplate)
    /// when a batch is due and `auto_dj_batch` is not configured.
    pub fn maintain_queue(&mut self, current_track: &str, current_artist: &str) -> DjResult<()> {
        let current = TrackRef::new(current_track, current_artist);
        let known = current.is_complete();

        if known && self.recent.record(current.clone()) {
            debug!("Recorded current track: {current}");
        }

        if self.auto_dj_enabled && self.queue.is_empty() && known {
            self.auto_dj_batch(&current)?;
        }

        self.cap_queue();
        Ok(())
    }

    /// Drop `track` and everything queued before it once playback reaches it.
    ///
    /// Returns `false` when the track was not in the pending queue.
    pub fn consume_played(&mut self, track_name: &str, artist_name: &str) -> bool {
        match self
            .queue
            .iter()
            .position(|q| q.track.matches(track_name, artist_name))
        {
            Some(pos) => {
                self.queue.drain(..=pos);
                debug!("Consumed {track_name} by {artist_name} from the queue");
                true
            }
            None => false,
        }
    }

    fn auto_dj_batch(&mut self, current: &TrackRef) -> DjResult<()> {
        let prompt = self.templates.render(
            prompts::AUTO_DJ_BATCH,
            &[
                ("song_name", current.track_name.as_str()),
                ("artist_name", current.artist_name.as_str()),
                ("host_name", self.settings.host_name.as_str()),
            ],
        )?;
        let Some(response) = self.ask("auto_dj_batch", &prompt) else {
            return Ok(());
        };

        let items = parse_batch_with_intro(&response);
        if items.is_empty() {
            warn!("[auto_dj_batch] Response was not a JSON batch; nothing queued");
            return Ok(());
        }

        for item in items {
            if self.queue_track(&item.track_name, &item.artist_name) {
                if let Some(intro) = item.intro.filter(|text| !text.trim().is_empty()) {
                    if self.intro_allowed() {
                        self.intros_shown += 1;
                        self.push_notice(NoticeKind::Intro, intro);
                    }
                }
            }
            if self.queue.len() >= QUEUE_CAP {
                break;
            }
        }
        Ok(())
    }

    /// Resolve and enqueue one track.
    ///
    /// Returns `false` without touching anything when either field is empty,
    /// the track is in recent history or already queued. A failed lookup or
    /// a failed enqueue also returns `false` and leaves local state alone.
    pub fn queue_track(&mut self, track_name: &str, artist_name: &str) -> bool {
        if track_name.is_empty() || artist_name.is_empty() {
            return false;
        }
        if self.recent.contains(track_name, artist_name) {
            info!("Skipping recently played track: {track_name} by {artist_name}");
            return false;
        }
        if self.queue.iter().any(|q| q.track.matches(track_name, artist_name)) {
            debug!("Already queued: {track_name} by {artist_name}");
            return false;
        }

        let uri = match self.catalog.resolve(track_name, artist_name) {
            Ok(Some(uri)) => uri,
            Ok(None) => {
                warn!("Track not found for queueing: {track_name} by {artist_name}");
                return false;
            }
            Err(e) => {
                warn!("Catalog lookup failed for {track_name} by {artist_name}: {e}");
                return false;
            }
        };

        if let Err(e) = self.catalog.enqueue(&uri) {
            warn!("Failed to enqueue {uri}: {e}");
            return false;
        }

        info!("Queued track: {track_name} by {artist_name}");
        self.queue.push(QueuedTrack {
            track: TrackRef::new(track_name, artist_name),
            uri,
        });
        self.cap_queue();
        true
    }

    /// Ask for a single follow-up track and queue it, with an intro if budget remains.
    ///
    /// # Errors
    ///
    /// Missing `auto_dj` or `generate_radio_intro` template.
    pub fn auto_dj_transition(&mut self, current_track: &str, current_artist: &str) -> DjResult<bool> {
        let prompt = self.templates.render(
            prompts::AUTO_DJ,
            &[
                ("song_name", current_track),
                ("artist_name", current_artist),
                ("host_name", self.settings.host_name.as_str()),
            ],
        )?;
        let Some(response) = self.ask("auto_dj_transition", &prompt) else {
            return Ok(false);
        };

        let Some(track) = parse_response(&response).first().cloned() else {
            warn!("[auto_dj_transition] Missing track data in model response");
            return Ok(false);
        };

        let intro_prompt = if self.intro_allowed() {
            Some(self.intro_prompt(&track)?)
        } else {
            None
        };

        if !self.queue_track(&track.track_name, &track.artist_name) {
            self.push_notice(NoticeKind::Status, format!("Could not find: {track}"));
            return Ok(false);
        }

        if let Some(prompt) = intro_prompt {
            let intro = self
                .ask("generate_radio_intro", &prompt)
                .unwrap_or_else(|| DEAD_AIR_INTRO.to_string());
            self.intros_shown += 1;
            self.push_notice(NoticeKind::Intro, intro);
        }
        Ok(true)
    }

    /// # Errors
    ///
    /// Missing `recommend_next_song` template.
    pub fn queue_one_song(&mut self, song_name: &str, artist_name: &str) -> DjResult<bool> {
        let prompt = self.templates.render(
            prompts::RECOMMEND_NEXT_SONG,
            &[("song_name", song_name), ("artist_name", artist_name)],
        )?;
        let Some(response) = self.ask("queue_one_song", &prompt) else {
            self.push_notice(NoticeKind::Status, "No song queued.");
            return Ok(false);
        };

        let Some(track) = parse_single(&response) else {
            warn!("[queue_one_song] Could not parse a track from the response");
            self.push_notice(NoticeKind::Status, "Failed to parse model response.");
            return Ok(false);
        };

        let queued = self.queue_track(&track.track_name, &track.artist_name);
        let message = if queued {
            format!("Queued: {track}")
        } else {
            format!("Could not find: {track}")
        };
        self.push_notice(NoticeKind::Status, message);
        Ok(queued)
    }

    /// # Errors
    ///
    /// Missing `recommend_next_ten_songs` template.
    pub fn queue_ten_songs(&mut self, song_name: &str, artist_name: &str) -> DjResult<usize> {
        let prompt = self.templates.render(
            prompts::RECOMMEND_NEXT_TEN_SONGS,
            &[("song_name", song_name), ("artist_name", artist_name)],
        )?;
        let Some(response) = self.ask("queue_ten_songs", &prompt) else {
            self.push_notice(NoticeKind::Status, "No songs queued.");
            return Ok(0);
        };

        let count = self.queue_list(&response);
        self.push_notice(NoticeKind::Status, format!("Queued {count} songs."));
        Ok(count)
    }

    /// Playlist seeded by the current track; switches to playlist mode on success.
    ///
    /// # Errors
    ///
    /// Missing `create_playlist` template.
    pub fn queue_playlist(&mut self, song_name: &str, artist_name: &str) -> DjResult<usize> {
        let prompt = self.templates.render(
            prompts::CREATE_PLAYLIST,
            &[("song_name", song_name), ("artist_name", artist_name)],
        )?;
        Ok(self.queue_playlist_prompt("queue_playlist", &prompt))
    }

    /// Playlist around a free-form theme; switches to playlist mode on success.
    ///
    /// # Errors
    ///
    /// Missing `theme_based_playlist` template.
    pub fn queue_theme_playlist(&mut self, theme: &str) -> DjResult<usize> {
        let theme = theme.trim();
        let prompt = self
            .templates
            .render(prompts::THEME_BASED_PLAYLIST, &[("theme", theme)])?;
        if theme.is_empty() {
            self.push_notice(NoticeKind::Status, "No theme given.");
            return Ok(0);
        }
        Ok(self.queue_playlist_prompt("queue_theme_playlist", &prompt))
    }

    fn queue_playlist_prompt(&mut self, op: &str, prompt: &str) -> usize {
        let Some(response) = self.ask(op, prompt) else {
            self.push_notice(NoticeKind::Status, "Playlist creation failed.");
            return 0;
        };

        let count = self.queue_list(&response);
        if count > 0 {
            self.mode = PlaybackMode::Playlist;
        }
        self.push_notice(
            NoticeKind::Status,
            format!("Playlist queued with {count} tracks."),
        );
        count
    }

    fn queue_list(&mut self, response: &str) -> usize {
        let tracks = parse_numbered_list(response);
        if tracks.is_empty() {
            warn!("No numbered 'Title by Artist' lines in model response");
        }
        tracks
            .iter()
            .filter(|track| self.queue_track(&track.track_name, &track.artist_name))
            .count()
    }

    /// Flip between smart and playlist labelling.
    pub fn toggle_playlist_mode(&mut self) -> PlaybackMode {
        self.mode = self.mode.toggled();
        info!("Switched to {} mode", self.mode);
        self.mode
    }

    /// A few facts about a song, surfaced as an insight notice.
    ///
    /// # Errors
    ///
    /// Missing `song_insights` template.
    pub fn song_insight(&mut self, song_name: &str, artist_name: &str) -> DjResult<Option<String>> {
        let prompt = self.templates.render(
            prompts::SONG_INSIGHTS,
            &[("song_name", song_name), ("artist_name", artist_name)],
        )?;
        let response = self.ask("song_insight", &prompt);
        match &response {
            Some(text) => self.push_notice(NoticeKind::Insight, text.clone()),
            None => self.push_notice(NoticeKind::Status, "No insight generated."),
        }
        Ok(response)
    }

    /// Short bridge between the track that ended and the one starting.
    ///
    /// # Errors
    ///
    /// Missing `dj_commentary` template.
    pub fn dj_commentary(&mut self, last: &TrackRef, next: &TrackRef) -> DjResult<Option<String>> {
        let last_song = last.to_string();
        let next_song = next.to_string();
        let prompt = self.templates.render(
            prompts::DJ_COMMENTARY,
            &[
                ("last_song", last_song.as_str()),
                ("next_song", next_song.as_str()),
                ("host_name", self.settings.host_name.as_str()),
            ],
        )?;
        let response = self.ask("dj_commentary", &prompt);
        match &response {
            Some(text) => self.push_notice(NoticeKind::Commentary, text.clone()),
            None => self.push_notice(NoticeKind::Status, "No DJ commentary generated."),
        }
        Ok(response)
    }

    fn intro_prompt(&self, track: &TrackRef) -> DjResult<String> {
        self.templates.render(
            prompts::GENERATE_RADIO_INTRO,
            &[
                ("track_name", track.track_name.as_str()),
                ("artist_name", track.artist_name.as_str()),
                ("host_name", self.settings.host_name.as_str()),
            ],
        )
    }

    fn intro_allowed(&self) -> bool {
        !self.settings.is_silent() && self.intros_shown < self.settings.intro_count
    }

    /// One model round trip; every failure becomes `None`.
    fn ask(&self, op: &str, prompt: &str) -> Option<String> {
        if let Some(cancel) = &self.cancel {
            cancel.clear();
        }
        debug!("[{op}] Prompt:\n{prompt}");

        match self.model.ask(prompt, self.cancel.as_ref()) {
            Ok(text) if !text.trim().is_empty() => {
                debug!("[{op}] Raw response:\n{text}");
                Some(text.trim().to_string())
            }
            Ok(_) | Err(ModelError::EmptyResponse) => {
                warn!("[{op}] Model returned no text");
                None
            }
            Err(ModelError::Cancelled) => {
                info!("[{op}] Request cancelled");
                None
            }
            Err(e) => {
                warn!("[{op}] Model request failed: {e}");
                None
            }
        }
    }

    fn cap_queue(&mut self) {
        if self.queue.len() > QUEUE_CAP {
            let excess = self.queue.len() - QUEUE_CAP;
            self.queue.drain(..excess);
        }
    }

    fn push_notice(&mut self, kind: NoticeKind, text: impl Into<String>) {
        self.notices.push_back(Notice {
            kind,
            text: text.into(),
        });
        while self.notices.len() > NOTICE_CAP {
            self.notices.pop_front();
        }
    }
}
