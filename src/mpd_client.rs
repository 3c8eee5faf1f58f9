//! # MPD Catalog
//!
//! [`CatalogController`] backed by Music Player Daemon through the `mpc`
//! command-line client.
//!
//! ## Command Mapping
//!
//! | operation       | mpc invocation                                   |
//! |-----------------|--------------------------------------------------|
//! | `resolve`       | `mpc find title <T> artist <A>` (first file)      |
//! | `enqueue`       | `mpc add <file>`                                 |
//! | `play_now`      | `mpc add <file>` then `mpc play <new position>`  |
//! | `current_track` | `mpc current -f "%title%\t%artist%"`             |
//! | `transport`     | `mpc toggle` / `next` / `prev` / `volume +N`     |
//!
//! `mpc find` matches tags exactly, so a model suggestion only resolves when
//! the library carries the same title and artist spelling.

use crate::catalog::{CatalogController, CatalogError, Transport};
use crate::track::TrackRef;
use anyhow::{Context, Result};
use log::{debug, info, warn};
use std::process::{Command, Output};

/// Output format for `mpc current` / `mpc status`.
const TITLE_ARTIST_FORMAT: &str = "%title%\t%artist%";

/// MPD-backed catalog.
#[derive(Debug, Clone, Default)]
pub struct MpdCatalog {
    host: Option<String>,
}

impl MpdCatalog {
    /// Catalog talking to the default MPD (`MPD_HOST` / localhost:6600).
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Catalog talking to `host` (passed to mpc as `--host`).
    #[must_use]
    pub fn with_host(host: Option<String>) -> Self {
        Self {
            host: host.filter(|h| !h.trim().is_empty()),
        }
    }

    fn mpc(&self) -> Command {
        let mut cmd = Command::new("mpc");
        if let Some(host) = &self.host {
            cmd.arg("--host").arg(host);
        }
        cmd
    }

    fn run(&self, args: &[&str]) -> Result<Output, CatalogError> {
        debug!("mpc {}", args.join(" "));
        let output = self
            .mpc()
            .args(args)
            .output()
            .map_err(|e| CatalogError::Unavailable(format!("failed to execute mpc: {e}")))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(CatalogError::CommandFailed(format!(
                "mpc {}: {}",
                args.first().unwrap_or(&""),
                stderr.trim()
            )));
        }
        Ok(output)
    }

    /// Verifies MPD and mpc availability.
    ///
    /// Runs `mpc version`, which fails if mpc is missing or MPD is unreachable.
    pub fn check_connection(&self) -> Result<()> {
        let output = self
            .mpc()
            .arg("version")
            .output()
            .context("Failed to execute mpc command. Please install mpc (MPD client)")?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            anyhow::bail!(
                "Failed to connect to MPD. Make sure MPD is running and reachable.\nError: {}",
                stderr.trim()
            );
        }
        Ok(())
    }

    fn playlist_length(&self) -> Result<usize, CatalogError> {
        let output = self.run(&["playlist"])?;
        Ok(String::from_utf8_lossy(&output.stdout)
            .lines()
            .filter(|line| !line.trim().is_empty())
            .count())
    }

    /// Current playback state as reported by `mpc status`.
    pub fn get_status(&self) -> Result<MpdStatus> {
        let output = self
            .mpc()
            .arg("status")
            .arg("-f")
            .arg(TITLE_ARTIST_FORMAT)
            .output()
            .context("Failed to get MPD status")?;

        if !output.status.success() {
            anyhow::bail!("MPD status command failed");
        }
        Ok(parse_status(&String::from_utf8_lossy(&output.stdout)))
    }
}

impl CatalogController for MpdCatalog {
    fn resolve(&self, track_name: &str, artist_name: &str) -> Result<Option<String>, CatalogError> {
        let output = self.run(&["find", "title", track_name, "artist", artist_name])?;
        let file = String::from_utf8_lossy(&output.stdout)
            .lines()
            .map(str::trim)
            .find(|line| !line.is_empty())
            .map(str::to_string);

        match &file {
            Some(path) => debug!("Resolved '{track_name}' by '{artist_name}' -> {path}"),
            None => debug!("No library match for '{track_name}' by '{artist_name}'"),
        }
        Ok(file)
    }

    fn enqueue(&self, identifier: &str) -> Result<(), CatalogError> {
        self.run(&["add", identifier])?;
        info!("Queued {identifier}");
        Ok(())
    }

    fn play_now(&self, identifier: &str) -> Result<(), CatalogError> {
        self.run(&["add", identifier])?;
        let position = self.playlist_length()?;
        if position == 0 {
            warn!("Playlist empty after adding {identifier}");
            return Err(CatalogError::CommandFailed(format!(
                "{identifier} did not appear in the playlist"
            )));
        }
        self.run(&["play", &position.to_string()])?;
        info!("Playing {identifier}");
        Ok(())
    }

    fn current_track(&self) -> Result<Option<TrackRef>, CatalogError> {
        let output = self.run(&["current", "-f", TITLE_ARTIST_FORMAT])?;
        Ok(parse_title_artist(&String::from_utf8_lossy(&output.stdout)))
    }

    fn transport(&self, action: Transport) -> Result<(), CatalogError> {
        let args = transport_args(action);
        let args: Vec<&str> = args.iter().map(String::as_str).collect();
        self.run(&args)?;
        info!("Player: {action:?}");
        Ok(())
    }

    fn status_line(&self) -> Option<String> {
        match self.get_status() {
            Ok(status) => Some(status.summary()),
            Err(e) => {
                warn!("Could not read MPD status: {e}");
                None
            }
        }
    }
}

/// mpc arguments for a player control.
fn transport_args(action: Transport) -> Vec<String> {
    match action {
        Transport::TogglePause => vec!["toggle".to_string()],
        Transport::Next => vec!["next".to_string()],
        Transport::Previous => vec!["prev".to_string()],
        Transport::Volume(delta) => vec!["volume".to_string(), format!("{delta:+}")],
    }
}

/// Parsed `mpc status` output.
#[derive(Debug, Clone, PartialEq)]
pub struct MpdStatus {
    /// Current track, None if nothing is loaded or tags are missing
    pub current: Option<TrackRef>,
    /// Elapsed time in seconds
    pub elapsed: f64,
    /// Total duration in seconds, None for streams or unknown
    pub duration: Option<f64>,
    /// "play", "pause" or "stop"
    pub state: String,
}

impl MpdStatus {
    /// `[play] 1:23/3:45` style summary line.
    #[must_use]
    pub fn summary(&self) -> String {
        let elapsed = format_time(self.elapsed);
        match self.duration {
            Some(total) => format!("[{}] {elapsed}/{}", self.state, format_time(total)),
            None => format!("[{}] {elapsed}", self.state),
        }
    }
}

/// Parse `mpc current -f "%title%\t%artist%"` output.
///
/// Untagged files print an empty field; those are reported as no track.
fn parse_title_artist(text: &str) -> Option<TrackRef> {
    let line = text.lines().next()?.trim_end_matches(['\r', '\n']);
    let (title, artist) = line.split_once('\t')?;
    let track = TrackRef::new(title.trim(), artist.trim());
    track.is_complete().then_some(track)
}

/// Parse `mpc status -f "%title%\t%artist%"` output.
///
/// ```text
/// Teardrop\tMassive Attack
/// [playing] #5/20   1:23/5:30 (25%)
/// volume: 80%   repeat: off   random: off   single: off   consume: off
/// ```
///
/// When MPD is stopped only the options line is printed.
fn parse_status(text: &str) -> MpdStatus {
    let lines: Vec<&str> = text.lines().collect();
    let has_song_line = lines.len() >= 2 && lines[1].trim_start().starts_with('[');

    let current = if has_song_line {
        parse_title_artist(lines[0])
    } else {
        None
    };

    let mut elapsed = 0.0;
    let mut duration = None;
    let mut state = "stop".to_string();

    for line in lines.iter().skip(usize::from(has_song_line)) {
        if line.contains("[playing]") {
            state = "play".to_string();
        } else if line.contains("[paused]") {
            state = "pause".to_string();
        } else {
            continue;
        }

        if let Some(time_part) = line
            .split_whitespace()
            .find(|s| s.contains('/') && s.contains(':'))
        {
            if let Some((start, end)) = time_part.split_once('/') {
                if let Ok(secs) = parse_time(start) {
                    elapsed = secs;
                }
                duration = parse_time(end).ok();
            }
        }
    }

    MpdStatus {
        current,
        elapsed,
        duration,
        state,
    }
}

/// Parse time string in MM:SS format to seconds
fn parse_time(time_str: &str) -> Result<f64> {
    let parts: Vec<&str> = time_str.split(':').collect();
    match parts.as_slice() {
        [minutes, seconds] if !minutes.is_empty() && !seconds.is_empty() => {
            let minutes: f64 = minutes.parse()?;
            let seconds: f64 = seconds.parse()?;
            Ok(minutes * 60.0 + seconds)
        }
        _ => anyhow::bail!("Invalid time format: {}", time_str),
    }
}

#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn format_time(secs: f64) -> String {
    let total = secs.max(0.0) as u64;
    format!("{}:{:02}", total / 60, total % 60)
}
