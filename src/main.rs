//! # RadioFree - Language-Model DJ for MPD
//!
//! Binary entry point: parses arguments, loads settings, wires the model
//! client and MPD catalog into the managers, and dispatches the subcommand.
//!
//! ## Usage
//!
//! ```bash
//! # Write a settings file, then edit the model section
//! radiofree init-config
//!
//! # Interactive DJ loop
//! radiofree run --auto-dj
//!
//! # One-shot recommendations for whatever MPD is playing
//! radiofree queue-ten
//! radiofree theme "songs about trains"
//! ```

use anyhow::{Context, Result};
use clap::{CommandFactory, Parser};
use log::{info, warn};
use radiofree::catalog::CatalogController;
use radiofree::cli::{self, Command};
use radiofree::completion;
use radiofree::config::{self, Settings};
use radiofree::daemon::{render_notice, DjDaemon};
use radiofree::history::HistoryStore;
use radiofree::model::{CancelFlag, ChatClient, ModelClient};
use radiofree::mpd_client::MpdCatalog;
use radiofree::mystery::MysteryModeManager;
use radiofree::track::TrackRef;
use radiofree::upnext::UpNextManager;
use std::io::{self, BufRead, Write};
use std::sync::Arc;

/// Main entry point for RadioFree.
///
/// Logging is controlled via `RUST_LOG`:
/// - `RUST_LOG=debug radiofree run` - prompts and raw model responses
/// - `RUST_LOG=radiofree::mpd_client=debug radiofree queue-one` - mpc invocations
fn main() -> Result<()> {
    env_logger::init();

    let args = cli::Args::parse();
    let settings_path = config::settings_path(args.config.as_deref())?;

    match args.command {
        Command::InitConfig { force } => {
            Settings::write_default(&settings_path, force)?;
            println!("Wrote default settings to {}", settings_path.display());
        }
        Command::Completion { shell } => {
            let mut cmd = cli::Args::command();
            completion::generate_completions(completion::shell_to_completion_shell(&shell), &mut cmd);
        }
        Command::History { limit, saved } => {
            let path = config::get_history_path()?;
            let store = HistoryStore::open(&path)
                .with_context(|| format!("Failed to open history at {}", path.display()))?;
            if saved {
                print_saved(&store, limit)?;
            } else {
                print_plays(&store, limit)?;
            }
        }
        command => {
            debug_assert!(command.needs_station());
            let settings = Settings::load(&settings_path).with_context(|| {
                format!("Failed to load settings from {}", settings_path.display())
            })?;
            run_station(command, &settings)?;
        }
    }

    Ok(())
}

/// Commands that need the model and MPD.
fn run_station(command: Command, settings: &Settings) -> Result<()> {
    let catalog = Arc::new(MpdCatalog::with_host(settings.player.mpc_host.clone()));
    catalog
        .check_connection()
        .context("Cannot start: MPD connection failed")?;

    let history = match open_history() {
        Ok(store) => Some(Arc::new(store)),
        Err(e) => {
            warn!("Play history disabled: {e:#}");
            None
        }
    };

    let mut client = ChatClient::new(&settings.model).context("Model client is not configured")?;
    if let Some(store) = &history {
        client = client.with_history(store.clone());
    }
    let model: Arc<dyn ModelClient> = Arc::new(client);

    let cancel = CancelFlag::new();
    let mut upnext = UpNextManager::from_settings(model.clone(), catalog.clone(), settings)
        .with_cancel(cancel.clone());

    match command {
        Command::Run { auto_dj, mystery } => {
            let mut mystery_mode =
                MysteryModeManager::new(model, catalog.clone(), settings.templates());
            if mystery {
                mystery_mode.toggle();
            }
            upnext.set_auto_dj_enabled(auto_dj);

            let mut daemon =
                DjDaemon::new(upnext, mystery_mode, catalog, cancel, settings.player.clone());
            if let Some(store) = history {
                daemon = daemon.with_history(store);
            }
            return daemon.run();
        }
        Command::QueueOne => {
            let track = require_current(catalog.as_ref())?;
            upnext.queue_one_song(&track.track_name, &track.artist_name)?;
        }
        Command::QueueTen => {
            let track = require_current(catalog.as_ref())?;
            upnext.queue_ten_songs(&track.track_name, &track.artist_name)?;
        }
        Command::Playlist => {
            let track = require_current(catalog.as_ref())?;
            upnext.queue_playlist(&track.track_name, &track.artist_name)?;
        }
        Command::Theme { theme } => {
            upnext.queue_theme_playlist(&theme.join(" "))?;
        }
        Command::Insight => {
            let track = require_current(catalog.as_ref())?;
            upnext.song_insight(&track.track_name, &track.artist_name)?;
        }
        Command::Mystery => {
            let track = require_current(catalog.as_ref())?;
            let mut mystery_mode = MysteryModeManager::new(model, catalog, settings.templates());
            mystery_mode.toggle();
            run_mystery_once(&mut mystery_mode, &track, &cancel)?;
        }
        Command::History { .. } | Command::InitConfig { .. } | Command::Completion { .. } => {}
    }

    for notice in upnext.take_notices() {
        println!("{}", render_notice(upnext.host_name(), &notice));
    }
    Ok(())
}

fn open_history() -> Result<HistoryStore> {
    let path = config::get_history_path()?;
    info!("Recording plays to {}", path.display());
    Ok(HistoryStore::open(&path)?)
}

fn print_plays(store: &HistoryStore, limit: usize) -> Result<()> {
    let plays = store.recent_plays(limit)?;
    if plays.is_empty() {
        println!("No plays recorded yet. Start `radiofree run` to build history.");
    }
    for play in plays {
        let marks = match (play.liked, play.skipped) {
            (true, true) => "+-",
            (true, false) => "+ ",
            (false, true) => " -",
            (false, false) => "  ",
        };
        println!(
            "{}  {:<7}  {}  {}",
            play.played_at, play.queued_by, marks, play.track
        );
    }
    Ok(())
}

fn print_saved(store: &HistoryStore, limit: usize) -> Result<()> {
    let saved = store.saved_tracks(limit)?;
    if saved.is_empty() {
        println!("No saved tracks. Press `s` during `radiofree run` to save one.");
    }
    for entry in saved {
        println!("{}  {}", entry.saved_at, entry.track);
    }
    Ok(())
}

fn require_current(catalog: &dyn CatalogController) -> Result<TrackRef> {
    catalog
        .current_track()
        .context("Failed to read the current track from MPD")?
        .ok_or_else(|| {
            anyhow::anyhow!("MPD is not playing a track with title and artist tags")
        })
}

/// One mystery round with the choice read from stdin.
fn run_mystery_once(
    mystery: &mut MysteryModeManager,
    track: &TrackRef,
    cancel: &CancelFlag,
) -> Result<()> {
    let Some(display) =
        mystery.activate_round(&track.track_name, &track.artist_name, Some(cancel))
    else {
        println!("No mystery round this time. Try again, or run with RUST_LOG=warn for details.");
        return Ok(());
    };

    println!("{display}");
    print!("Choice (Enter keeps the DJ's secret pick): ");
    io::stdout().flush().context("Failed to flush stdout")?;

    let mut line = String::new();
    io::stdin()
        .lock()
        .read_line(&mut line)
        .context("Failed to read choice")?;

    let line = line.trim();
    if line.is_empty() {
        println!("Keeping the secret pick.");
        return Ok(());
    }
    match line.parse::<usize>() {
        Ok(choice) => println!("{}", mystery.play_choice(choice).1),
        Err(_) => println!("Invalid selection."),
    }
    Ok(())
}
