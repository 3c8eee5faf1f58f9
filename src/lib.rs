//! # RadioFree
//!
//! A language-model DJ for MPD. RadioFree asks a chat model what to play
//! next, resolves the answers against the MPD library, queues them without
//! repeats, and runs an optional "mystery" guessing game where the model's
//! own pick is queued but never revealed.
//!
//! ## Modules
//!
//! - [`upnext`] - Queue orchestration: batch auto-DJ, playlists, intros
//! - [`mystery`] - Mystery rounds with a hidden pre-queued pick
//! - [`parser`] - Tolerant parsing of model output
//! - [`prompts`] - Named prompt templates with placeholder substitution
//! - [`model`] - Model client seam and the OpenAI-compatible [`model::ChatClient`]
//! - [`catalog`] - Catalog seam; [`mpd_client`] implements it over `mpc`
//! - [`daemon`] - Interactive polling loop behind `radiofree run`
//!
//! ### Supporting Modules
//!
//! - [`track`] - Track, queue and history types
//! - [`history`] - SQLite play history and model exchange log
//! - [`config`] - Settings file and data directories
//! - [`error`] - Errors surfaced to callers
//! - [`cli`] / [`completion`] - Command-line definitions and shell completions
//!
//! ## Quick Start Example
//!
//! ```no_run
//! use radiofree::config::Settings;
//! use radiofree::model::ChatClient;
//! use radiofree::mpd_client::MpdCatalog;
//! use radiofree::upnext::UpNextManager;
//! use std::sync::Arc;
//!
//! let settings = Settings::default();
//! let model = Arc::new(ChatClient::new(&settings.model)?);
//! let catalog = Arc::new(MpdCatalog::new());
//! let mut upnext = UpNextManager::from_settings(model, catalog, &settings);
//!
//! upnext.set_auto_dj_enabled(true);
//! upnext.maintain_queue("Teardrop", "Massive Attack")?;
//! for queued in upnext.queue() {
//!     println!("{}", queued.track);
//! }
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

pub mod catalog;
pub mod cli;
pub mod completion;
pub mod config;
pub mod daemon;
pub mod error;
pub mod history;
pub mod model;
pub mod mpd_client;
pub mod mystery;
pub mod parser;
pub mod prompts;
pub mod track;
pub mod upnext;

#[cfg(test)]
mod test_support;

pub use error::{DjError, DjResult};
pub use track::{PlaybackMode, QueuedTrack, TrackRef};
