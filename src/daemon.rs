//! # Interactive DJ Loop
//!
//! `radiofree run`: polls MPD on a fixed cadence, feeds the queue
//! orchestrator, and reacts to single-key commands typed on stdin.
//!
//! ## Architecture
//!
//! ```text
//! stdin thread ──lines──▶ crossbeam channel ──▶ control thread
//!      │                                        ├─ tick(): current track → maintain_queue
//!      └─ "x" sets CancelFlag                   └─ handle_command(): manager operations
//! ```
//!
//! All manager state is owned by the control thread. The stdin thread never
//! touches it; it forwards lines and, on `x`, sets the shared cancel flag so
//! a model request blocking the control thread returns early.
//!
//! ## Track Changes
//!
//! When the current track changes the loop consumes it from the pending
//! queue, appends it to the play history, starts a mystery round when
//! mystery mode is on, and every `commentary_every` changes asks for DJ
//! commentary while auto-DJ is on.

use crate::catalog::{CatalogController, Transport};
use crate::config::PlayerSettings;
use crate::error::DjResult;
use crate::history::{Feedback, HistoryStore, QueuedBy};
use crate::model::CancelFlag;
use crate::mystery::MysteryModeManager;
use crate::track::TrackRef;
use crate::upnext::{Notice, NoticeKind, UpNextManager};
use anyhow::{Context, Result};
use crossbeam_channel::{unbounded, RecvTimeoutError, Sender};
use log::{debug, info, warn};
use std::io::{self, BufRead};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

/// Lower bound on the polling interval.
const MIN_POLL: Duration = Duration::from_millis(100);

/// Percent per volume key press.
const VOLUME_STEP: i8 = 10;

const HELP: &str = "\
Keys:
  1  toggle auto-DJ          2  queue one song
  3  queue ten songs         4  playlist from current track
  5 <theme>  theme playlist  6  song insight
  t  toggle smart/playlist   m  toggle mystery mode
  u  show queue              x  cancel model request
  p  pause/resume            n  next track
  b  previous track          +/-  volume
  l  like current track      d  dislike and skip
  s  save current track
  h  help                    0  quit
While mystery picks are shown, 1-N chooses the next track.";

/// A line of operator input, interpreted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DjCommand {
    ToggleAutoDj,
    QueueOne,
    QueueTen,
    Playlist,
    ThemePlaylist(String),
    Insight,
    ToggleMode,
    ToggleMystery,
    ShowQueue,
    Cancel,
    PickMystery(usize),
    TogglePause,
    Next,
    Previous,
    VolumeUp,
    VolumeDown,
    Like,
    Dislike,
    Save,
    Help,
    Quit,
    Unknown(String),
}

/// Interpret one input line. Blank lines yield `None`.
///
/// While a mystery round awaits a choice, bare numbers other than `0` select
/// an option instead of triggering their usual action.
#[must_use]
pub fn parse_command(line: &str, awaiting_choice: bool) -> Option<DjCommand> {
    let line = line.trim();
    if line.is_empty() {
        return None;
    }

    if awaiting_choice {
        if let Some(choice) = line.parse::<usize>().ok().filter(|choice| *choice > 0) {
            return Some(DjCommand::PickMystery(choice));
        }
    }

    let (key, rest) = match line.split_once(char::is_whitespace) {
        Some((key, rest)) => (key, rest.trim()),
        None => (line, ""),
    };

    let command = match key.to_ascii_lowercase().as_str() {
        "1" => DjCommand::ToggleAutoDj,
        "2" => DjCommand::QueueOne,
        "3" => DjCommand::QueueTen,
        "4" => DjCommand::Playlist,
        "5" => DjCommand::ThemePlaylist(rest.to_string()),
        "6" => DjCommand::Insight,
        "t" => DjCommand::ToggleMode,
        "m" => DjCommand::ToggleMystery,
        "u" => DjCommand::ShowQueue,
        "x" => DjCommand::Cancel,
        "p" => DjCommand::TogglePause,
        "n" => DjCommand::Next,
        "b" => DjCommand::Previous,
        "+" => DjCommand::VolumeUp,
        "-" => DjCommand::VolumeDown,
        "l" => DjCommand::Like,
        "d" => DjCommand::Dislike,
        "s" => DjCommand::Save,
        "h" | "?" | "help" => DjCommand::Help,
        "0" | "q" | "quit" | "exit" => DjCommand::Quit,
        _ => DjCommand::Unknown(line.to_string()),
    };
    Some(command)
}

/// Control-thread state for `radiofree run`.
pub struct DjDaemon {
    upnext: UpNextManager,
    mystery: MysteryModeManager,
    catalog: Arc<dyn CatalogController>,
    history: Option<Arc<HistoryStore>>,
    cancel: CancelFlag,
    player: PlayerSettings,
    current: Option<TrackRef>,
    track_changes: u32,
    /// The listener chose what plays next.
    listener_pick: bool,
}

impl DjDaemon {
    #[must_use]
    pub fn new(
        upnext: UpNextManager,
        mystery: MysteryModeManager,
        catalog: Arc<dyn CatalogController>,
        cancel: CancelFlag,
        player: PlayerSettings,
    ) -> Self {
        Self {
            upnext,
            mystery,
            catalog,
            history: None,
            cancel,
            player,
            current: None,
            track_changes: 0,
            listener_pick: false,
        }
    }

    #[must_use]
    pub fn with_history(mut self, history: Arc<HistoryStore>) -> Self {
        self.history = Some(history);
        self
    }

    #[must_use]
    pub fn upnext(&self) -> &UpNextManager {
        &self.upnext
    }

    #[must_use]
    pub fn mystery(&self) -> &MysteryModeManager {
        &self.mystery
    }

    /// Run until the operator quits or stdin closes.
    pub fn run(&mut self) -> Result<()> {
        let (tx, rx) = unbounded();
        spawn_input_reader(tx, self.cancel.clone());

        println!("{HELP}");
        info!(
            "DJ loop started, polling every {} ms",
            self.player.poll_interval_ms
        );

        let poll = Duration::from_millis(self.player.poll_interval_ms).max(MIN_POLL);
        let mut next_tick = Instant::now();

        loop {
            if Instant::now() >= next_tick {
                self.tick().context("Polling tick failed")?;
                next_tick = Instant::now() + poll;
            }

            match rx.recv_timeout(next_tick.saturating_duration_since(Instant::now())) {
                Ok(line) => {
                    let Some(command) = parse_command(&line, self.mystery.awaiting_choice()) else {
                        continue;
                    };
                    if !self.handle_command(command).context("Command failed")? {
                        break;
                    }
                }
                Err(RecvTimeoutError::Timeout) => {}
                Err(RecvTimeoutError::Disconnected) => {
                    info!("Input closed, leaving DJ loop");
                    break;
                }
            }
        }

        println!("Signing off.");
        Ok(())
    }

    /// One polling step.
    pub fn tick(&mut self) -> DjResult<()> {
        let current = match self.catalog.current_track() {
            Ok(current) => current,
            Err(e) => {
                warn!("Could not read current track: {e}");
                return Ok(());
            }
        };

        if let Some(track) = current {
            if self.current.as_ref() != Some(&track) {
                self.on_track_change(track.clone())?;
            }
            self.upnext
                .maintain_queue(&track.track_name, &track.artist_name)?;
        }

        self.flush_notices();
        Ok(())
    }

    fn on_track_change(&mut self, track: TrackRef) -> DjResult<()> {
        info!("Now playing: {track}");
        println!("Now playing: {track}");

        let previous = self.current.replace(track.clone());
        self.track_changes += 1;
        let from_queue = self
            .upnext
            .consume_played(&track.track_name, &track.artist_name);
        let queued_by = if std::mem::take(&mut self.listener_pick) {
            QueuedBy::User
        } else if from_queue {
            QueuedBy::Dj
        } else {
            QueuedBy::Unknown
        };

        if let Some(history) = &self.history {
            if let Err(e) = history.record_play(&track, queued_by) {
                warn!("Failed to record play: {e}");
            }
        }

        if self.mystery.enabled() {
            self.start_mystery_round(&track);
        }

        if let Some(previous) = previous {
            if self.commentary_due() {
                self.upnext.dj_commentary(&previous, &track)?;
            }
        }
        Ok(())
    }

    fn commentary_due(&self) -> bool {
        let every = self.player.commentary_every;
        self.upnext.auto_dj_enabled()
            && !self.upnext.settings().is_silent()
            && every > 0
            && self.track_changes % every == 0
    }

    fn start_mystery_round(&mut self, track: &TrackRef) {
        match self
            .mystery
            .activate_round(&track.track_name, &track.artist_name, Some(&self.cancel))
        {
            Some(display) => println!("\n{display}\n"),
            None => debug!("No mystery round for {track}"),
        }
    }

    /// Apply one command. Returns `false` when the loop should stop.
    pub fn handle_command(&mut self, command: DjCommand) -> DjResult<bool> {
        debug!("Command: {command:?}");
        match command {
            DjCommand::Quit => return Ok(false),
            DjCommand::Help => println!("{HELP}"),
            DjCommand::Unknown(line) => println!("Unknown command: {line} (h for help)"),
            DjCommand::Cancel => {
                self.cancel.set();
                println!("Cancel requested.");
            }
            DjCommand::ToggleAutoDj => {
                let enabled = !self.upnext.auto_dj_enabled();
                self.upnext.set_auto_dj_enabled(enabled);
                println!("Auto-DJ {}.", if enabled { "on" } else { "off" });
            }
            DjCommand::ToggleMode => {
                let mode = self.upnext.toggle_playlist_mode();
                println!("Switched to {mode} mode.");
            }
            DjCommand::ToggleMystery => {
                let enabled = self.mystery.toggle();
                println!("Mystery mode {}.", if enabled { "on" } else { "off" });
                if let Some(track) = self.current.clone().filter(|_| enabled) {
                    self.start_mystery_round(&track);
                }
            }
            DjCommand::PickMystery(choice) => {
                let (played, message) = self.mystery.play_choice(choice);
                self.listener_pick |= played;
                println!("{message}");
            }
            DjCommand::TogglePause => self.player_control(Transport::TogglePause),
            DjCommand::Next => self.player_control(Transport::Next),
            DjCommand::Previous => self.player_control(Transport::Previous),
            DjCommand::VolumeUp => self.player_control(Transport::Volume(VOLUME_STEP)),
            DjCommand::VolumeDown => self.player_control(Transport::Volume(-VOLUME_STEP)),
            DjCommand::Like => {
                self.feedback(Feedback::Liked);
            }
            DjCommand::Dislike => {
                if self.feedback(Feedback::Skipped) {
                    self.player_control(Transport::Next);
                }
            }
            DjCommand::Save => {
                if let Some((history, track)) = self.history_and_current() {
                    match history.save_track(&track) {
                        Ok(()) => println!("Saved: {track}"),
                        Err(e) => warn!("Failed to save {track}: {e}"),
                    }
                }
            }
            DjCommand::ShowQueue => self.show_queue(),
            DjCommand::ThemePlaylist(theme) => {
                if theme.is_empty() {
                    println!("Usage: 5 <theme>, e.g. 5 late night drive");
                } else {
                    self.upnext.queue_theme_playlist(&theme)?;
                }
            }
            DjCommand::QueueOne
            | DjCommand::QueueTen
            | DjCommand::Playlist
            | DjCommand::Insight => {
                let Some(track) = self.current.clone() else {
                    println!("Nothing is playing.");
                    return Ok(true);
                };
                let (song, artist) = (track.track_name.as_str(), track.artist_name.as_str());
                match command {
                    DjCommand::QueueOne => {
                        self.upnext.queue_one_song(song, artist)?;
                    }
                    DjCommand::QueueTen => {
                        self.upnext.queue_ten_songs(song, artist)?;
                    }
                    DjCommand::Playlist => {
                        self.upnext.queue_playlist(song, artist)?;
                    }
                    _ => {
                        self.upnext.song_insight(song, artist)?;
                    }
                }
            }
        }
        self.flush_notices();
        Ok(true)
    }

    fn player_control(&self, action: Transport) {
        if let Err(e) = self.catalog.transport(action) {
            warn!("Player control {action:?} failed: {e}");
            println!("Player control failed: {e}");
        }
    }

    /// Record like/skip feedback on the current track; `true` when stored.
    fn feedback(&self, feedback: Feedback) -> bool {
        let Some((history, track)) = self.history_and_current() else {
            return false;
        };
        match history.mark_latest(&track, feedback) {
            Ok(()) => {
                match feedback {
                    Feedback::Liked => println!("Liked: {track}"),
                    Feedback::Skipped => println!("Disliked: {track}"),
                }
                true
            }
            Err(e) => {
                warn!("Failed to record feedback for {track}: {e}");
                false
            }
        }
    }

    fn history_and_current(&self) -> Option<(Arc<HistoryStore>, TrackRef)> {
        let Some(track) = self.current.clone() else {
            println!("Nothing is playing.");
            return None;
        };
        let Some(history) = self.history.clone() else {
            println!("Play history is disabled.");
            return None;
        };
        Some((history, track))
    }

    fn show_queue(&self) {
        if let Some(status) = self.catalog.status_line() {
            println!("{status}");
        }
        println!("Mode: {}", self.upnext.mode());
        if self.upnext.queue().is_empty() {
            println!("Queue is empty.");
            return;
        }
        println!("Up Next:");
        for (i, queued) in self.upnext.queue().iter().enumerate() {
            println!("  {}. {}", i + 1, queued.track);
        }
    }

    fn flush_notices(&mut self) {
        let host = self.upnext.host_name().to_string();
        for notice in self.upnext.take_notices() {
            println!("{}", render_notice(&host, &notice));
        }
    }
}

/// Console form of a notice.
#[must_use]
pub fn render_notice(host: &str, notice: &Notice) -> String {
    match notice.kind {
        NoticeKind::Intro => format!("[{host}] {}", notice.text),
        NoticeKind::Commentary => format!("[{host}] {}", notice.text),
        NoticeKind::Insight => format!("Insight:\n{}", notice.text),
        NoticeKind::Status => notice.text.clone(),
    }
}

fn spawn_input_reader(tx: Sender<String>, cancel: CancelFlag) {
    thread::spawn(move || {
        let stdin = io::stdin();
        for line in stdin.lock().lines() {
            let Ok(line) = line else { break };
            if line.trim().eq_ignore_ascii_case("x") {
                cancel.set();
            }
            if tx.send(line).is_err() {
                break;
            }
        }
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DjSettings;
    use crate::prompts::PromptTemplates;
    use crate::test_support::{batch_json, RecordingCatalog, ScriptedModel};

    fn daemon(model: &Arc<ScriptedModel>, catalog: &Arc<RecordingCatalog>) -> DjDaemon {
        let cancel = CancelFlag::new();
        let upnext = UpNextManager::new(
            model.clone(),
            catalog.clone(),
            PromptTemplates::default(),
            DjSettings::default(),
        )
        .with_cancel(cancel.clone());
        let mystery =
            MysteryModeManager::new(model.clone(), catalog.clone(), PromptTemplates::default());
        DjDaemon::new(upnext, mystery, catalog.clone(), cancel, PlayerSettings::default())
    }

    fn play(catalog: &RecordingCatalog, track: &str, artist: &str) {
        *catalog.current.lock().unwrap() = Some(TrackRef::new(track, artist));
    }

    #[test]
    fn test_parse_command_keys() {
        assert_eq!(parse_command("1", false), Some(DjCommand::ToggleAutoDj));
        assert_eq!(parse_command(" 3 ", false), Some(DjCommand::QueueTen));
        assert_eq!(
            parse_command("5 late night drive", false),
            Some(DjCommand::ThemePlaylist("late night drive".to_string()))
        );
        assert_eq!(
            parse_command("5", false),
            Some(DjCommand::ThemePlaylist(String::new()))
        );
        assert_eq!(parse_command("M", false), Some(DjCommand::ToggleMystery));
        assert_eq!(parse_command("quit", false), Some(DjCommand::Quit));
        assert_eq!(parse_command("p", false), Some(DjCommand::TogglePause));
        assert_eq!(parse_command("n", false), Some(DjCommand::Next));
        assert_eq!(parse_command("+", false), Some(DjCommand::VolumeUp));
        assert_eq!(parse_command("d", false), Some(DjCommand::Dislike));
        assert_eq!(parse_command("s", true), Some(DjCommand::Save));
        assert_eq!(parse_command("   ", false), None);
        assert_eq!(
            parse_command("zz", false),
            Some(DjCommand::Unknown("zz".to_string()))
        );
    }

    #[test]
    fn test_parse_command_mystery_digits() {
        assert_eq!(parse_command("1", true), Some(DjCommand::PickMystery(1)));
        assert_eq!(parse_command("4", true), Some(DjCommand::PickMystery(4)));
        assert_eq!(parse_command("0", true), Some(DjCommand::Quit));
        assert_eq!(parse_command("m", true), Some(DjCommand::ToggleMystery));
        assert_eq!(
            parse_command("5 rain", true),
            Some(DjCommand::ThemePlaylist("rain".to_string()))
        );
    }

    #[test]
    fn test_tick_fills_queue_once() {
        let model = Arc::new(ScriptedModel::new(&[batch_json(3).as_str()]));
        let catalog = Arc::new(RecordingCatalog::new());
        let mut dj = daemon(&model, &catalog);
        dj.handle_command(DjCommand::ToggleAutoDj).unwrap();

        play(&catalog, "Current", "Artist");
        dj.tick().unwrap();
        dj.tick().unwrap();
        dj.tick().unwrap();

        assert_eq!(model.calls(), 1);
        assert_eq!(dj.upnext().queue().len(), 3);
    }

    #[test]
    fn test_track_change_consumes_and_records_history() {
        let model = Arc::new(ScriptedModel::new(&[]));
        let catalog = Arc::new(RecordingCatalog::new());
        let history = Arc::new(HistoryStore::open_in_memory().unwrap());
        let mut dj = daemon(&model, &catalog).with_history(history.clone());
        dj.upnext.queue_track("Next", "Band");

        play(&catalog, "First", "Artist");
        dj.tick().unwrap();
        play(&catalog, "Next", "Band");
        dj.tick().unwrap();
        dj.tick().unwrap();

        assert!(dj.upnext().queue().is_empty());
        let plays = history.recent_plays(10).unwrap();
        assert_eq!(plays.len(), 2);
        assert_eq!(plays[0].track, TrackRef::new("Next", "Band"));
        assert_eq!(plays[0].queued_by, "dj");
        assert_eq!(plays[1].queued_by, "unknown");
    }

    #[test]
    fn test_mystery_choice_is_recorded_as_user_pick() {
        let response = r#"{"options": [{"track_name": "Song A", "artist_name": "Artist A"}]}"#;
        let model = Arc::new(ScriptedModel::new(&[response]));
        let catalog = Arc::new(RecordingCatalog::new());
        let history = Arc::new(HistoryStore::open_in_memory().unwrap());
        let mut dj = daemon(&model, &catalog).with_history(history.clone());
        dj.handle_command(DjCommand::ToggleMystery).unwrap();

        play(&catalog, "Now", "Artist");
        dj.tick().unwrap();
        dj.handle_command(DjCommand::PickMystery(1)).unwrap();
        play(&catalog, "Song A", "Artist A");
        dj.tick().unwrap();

        let plays = history.recent_plays(10).unwrap();
        assert_eq!(plays[0].track, TrackRef::new("Song A", "Artist A"));
        assert_eq!(plays[0].queued_by, "user");
    }

    #[test]
    fn test_feedback_and_save_keys() {
        let model = Arc::new(ScriptedModel::new(&[]));
        let catalog = Arc::new(RecordingCatalog::new());
        let history = Arc::new(HistoryStore::open_in_memory().unwrap());
        let mut dj = daemon(&model, &catalog).with_history(history.clone());

        play(&catalog, "Meh", "Band");
        dj.tick().unwrap();
        dj.handle_command(DjCommand::Like).unwrap();
        dj.handle_command(DjCommand::Save).unwrap();
        dj.handle_command(DjCommand::Dislike).unwrap();

        let plays = history.recent_plays(10).unwrap();
        assert_eq!(plays.len(), 1);
        assert!(plays[0].liked && plays[0].skipped);
        assert_eq!(
            history.saved_tracks(10).unwrap()[0].track,
            TrackRef::new("Meh", "Band")
        );
        assert_eq!(*catalog.transports.lock().unwrap(), vec![Transport::Next]);
    }

    #[test]
    fn test_feedback_without_history_does_not_skip() {
        let model = Arc::new(ScriptedModel::new(&[]));
        let catalog = Arc::new(RecordingCatalog::new());
        let mut dj = daemon(&model, &catalog);

        play(&catalog, "Meh", "Band");
        dj.tick().unwrap();
        assert!(dj.handle_command(DjCommand::Dislike).unwrap());
        assert!(catalog.transports.lock().unwrap().is_empty());
    }

    #[test]
    fn test_player_keys_drive_transport() {
        let model = Arc::new(ScriptedModel::new(&[]));
        let catalog = Arc::new(RecordingCatalog::new());
        let mut dj = daemon(&model, &catalog);

        for key in ["p", "n", "b", "+", "-"] {
            let command = parse_command(key, false).unwrap();
            assert!(dj.handle_command(command).unwrap());
        }
        assert_eq!(
            *catalog.transports.lock().unwrap(),
            vec![
                Transport::TogglePause,
                Transport::Next,
                Transport::Previous,
                Transport::Volume(VOLUME_STEP),
                Transport::Volume(-VOLUME_STEP),
            ]
        );
        assert_eq!(model.calls(), 0);
    }

    #[test]
    fn test_mystery_round_starts_on_track_change_and_takes_digits() {
        let response = r#"{"options": [
            {"track_name": "Song A", "artist_name": "Artist A"},
            {"track_name": "Song B", "artist_name": "Artist B"}
        ], "selected_index": 1}"#;
        let model = Arc::new(ScriptedModel::new(&[response]));
        let catalog = Arc::new(RecordingCatalog::new());
        let mut dj = daemon(&model, &catalog);
        dj.handle_command(DjCommand::ToggleMystery).unwrap();

        play(&catalog, "Now", "Artist");
        dj.tick().unwrap();
        assert!(dj.mystery().awaiting_choice());
        assert_eq!(catalog.enqueued(), vec![RecordingCatalog::uri("Song A", "Artist A")]);

        let command = parse_command("2", dj.mystery().awaiting_choice()).unwrap();
        assert!(dj.handle_command(command).unwrap());
        assert_eq!(catalog.played(), vec![RecordingCatalog::uri("Song B", "Artist B")]);
        assert!(!dj.mystery().awaiting_choice());
    }

    #[test]
    fn test_commentary_every_n_changes() {
        let model = Arc::new(ScriptedModel::default());
        let catalog = Arc::new(RecordingCatalog::new());
        let mut dj = daemon(&model, &catalog);
        dj.player.commentary_every = 2;
        dj.upnext.set_auto_dj_enabled(true);
        // Keep the batch path quiet
        for i in 0..5 {
            dj.upnext.queue_track(&format!("Q{i}"), "X");
        }

        for name in ["One", "Two", "Three", "Four"] {
            play(&catalog, name, "Artist");
            dj.tick().unwrap();
        }

        let commentary_prompts = model
            .prompts()
            .iter()
            .filter(|p| p.contains("just finished"))
            .count();
        assert_eq!(commentary_prompts, 2);
    }

    #[test]
    fn test_commands_without_current_track() {
        let model = Arc::new(ScriptedModel::new(&[]));
        let catalog = Arc::new(RecordingCatalog::new());
        let mut dj = daemon(&model, &catalog);

        assert!(dj.handle_command(DjCommand::QueueOne).unwrap());
        assert!(dj.handle_command(DjCommand::ShowQueue).unwrap());
        assert!(!dj.handle_command(DjCommand::Quit).unwrap());
        assert_eq!(model.calls(), 0);
    }

    #[test]
    fn test_cancel_command_sets_flag() {
        let model = Arc::new(ScriptedModel::new(&[]));
        let catalog = Arc::new(RecordingCatalog::new());
        let mut dj = daemon(&model, &catalog);

        dj.handle_command(DjCommand::Cancel).unwrap();
        assert!(dj.cancel.is_set());
    }

    #[test]
    fn test_render_notice() {
        let intro = Notice {
            kind: NoticeKind::Intro,
            text: "Hello night owls".to_string(),
        };
        assert_eq!(render_notice("Sid", &intro), "[Sid] Hello night owls");
    }
}
